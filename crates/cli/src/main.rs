use std::process::ExitCode;

fn main() -> ExitCode {
    musicshare_cli::run()
}
