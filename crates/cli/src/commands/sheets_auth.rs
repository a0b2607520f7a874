use std::path::PathBuf;
use std::time::Duration;

use musicshare_core::config::{AppConfig, ConfigError, LoadOptions};
use musicshare_ledger::oauth::{consent_url, exchange_code};
use secrecy::SecretString;

use crate::commands::{runtime, CommandResult};

#[derive(Debug, Clone)]
pub struct SheetsAuthArgs {
    pub client_id: String,
    pub client_secret: String,
    pub code: Option<String>,
    pub redirect_uri: String,
    pub credentials_path: Option<PathBuf>,
}

/// Two-step consent: without `--code` print the URL to open, with it store the refresh grant.
pub fn run(args: SheetsAuthArgs) -> CommandResult {
    if args.client_id.trim().is_empty() || args.client_secret.trim().is_empty() {
        return CommandResult::failure(
            "sheets-auth",
            "config_validation",
            "--client-id and --client-secret must not be empty",
            2,
        );
    }

    match args.code.as_deref().map(str::trim).filter(|code| !code.is_empty()) {
        None => consent_step(&args),
        Some(code) => exchange_step(&args, code),
    }
}

fn consent_step(args: &SheetsAuthArgs) -> CommandResult {
    match consent_url(&args.client_id, &args.redirect_uri) {
        Ok(url) => CommandResult::success(
            "sheets-auth",
            format!(
                "open {url} , approve access, then rerun with --code set to the `code` \
                 parameter of the page you are redirected to"
            ),
        ),
        Err(error) => CommandResult::failure("sheets-auth", "invalid_url", error.to_string(), 2),
    }
}

/// Where the grant is written and which token endpoint issues it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GrantTarget {
    pub credentials_path: PathBuf,
    pub token_url: String,
    pub timeout: Duration,
}

/// Reads the file and env layers so the grant lands where the bot will look for it.
/// `--credentials-path` wins over both.
pub fn resolve_target(args: &SheetsAuthArgs) -> Result<GrantTarget, ConfigError> {
    let config = AppConfig::load_unvalidated(LoadOptions::default())?;
    Ok(GrantTarget {
        credentials_path: args
            .credentials_path
            .clone()
            .unwrap_or(config.ledger.credentials_path),
        token_url: config.ledger.token_url,
        timeout: Duration::from_secs(config.http.timeout_secs.max(1)),
    })
}

fn exchange_step(args: &SheetsAuthArgs, code: &str) -> CommandResult {
    let target = match resolve_target(args) {
        Ok(target) => target,
        Err(error) => {
            return CommandResult::failure("sheets-auth", "config_load", error.to_string(), 2);
        }
    };
    let secret = SecretString::from(args.client_secret.clone());

    let runtime = match runtime("sheets-auth") {
        Ok(runtime) => runtime,
        Err(failure) => return failure,
    };
    let granted = runtime.block_on(async {
        let http = reqwest::Client::builder()
            .timeout(target.timeout)
            .build()
            .map_err(|error| error.to_string())?;
        exchange_code(&http, &target.token_url, &args.client_id, &secret, code, &args.redirect_uri)
            .await
            .map_err(|error| error.to_string())
    });

    let user = match granted {
        Ok(user) => user,
        Err(message) => {
            return CommandResult::failure("sheets-auth", "oauth_exchange", message, 4);
        }
    };

    let path = target.credentials_path;
    match user.save(&path) {
        Ok(()) => CommandResult::success(
            "sheets-auth",
            format!("stored spreadsheet credentials in `{}`", path.display()),
        ),
        Err(error) => {
            CommandResult::failure("sheets-auth", "credential_write", error.to_string(), 5)
        }
    }
}
