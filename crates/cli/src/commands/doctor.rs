use std::time::Duration;

use musicshare_catalog::SpotifyClient;
use musicshare_core::config::{AppConfig, ConfigError, LoadOptions};
use musicshare_core::CatalogApi;
use musicshare_ledger::{AuthorizedUser, SheetsClient};
use musicshare_slack::SlackWebClient;
use serde::Serialize;
use tokio::runtime::Runtime;

use crate::commands::{runtime, CommandResult};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
enum CheckStatus {
    Pass,
    Fail,
    Skipped,
}

#[derive(Debug, Serialize)]
struct DoctorCheck {
    name: &'static str,
    status: CheckStatus,
    details: String,
}

impl DoctorCheck {
    fn pass(name: &'static str, details: impl Into<String>) -> Self {
        Self { name, status: CheckStatus::Pass, details: details.into() }
    }

    fn fail(name: &'static str, details: impl Into<String>) -> Self {
        Self { name, status: CheckStatus::Fail, details: details.into() }
    }

    fn skipped(name: &'static str, reason: &str) -> Self {
        Self { name, status: CheckStatus::Skipped, details: format!("skipped because {reason}") }
    }
}

#[derive(Debug, Serialize)]
struct DoctorReport {
    overall_status: CheckStatus,
    summary: String,
    checks: Vec<DoctorCheck>,
}

const CONFIG_VALIDATION: &str = "config_validation";
const CREDENTIAL_FILE: &str = "sheets_credential_file";
const SLACK_AUTH: &str = "slack_auth";
const CATALOG_TOKEN: &str = "catalog_token";
const SHEETS_TOKEN: &str = "sheets_token";

pub fn run(json_output: bool) -> CommandResult {
    let report = build_report(AppConfig::load(LoadOptions::default()));
    let exit_code = if report.overall_status == CheckStatus::Pass { 0 } else { 1 };

    if json_output {
        let output = serde_json::to_string_pretty(&report).unwrap_or_else(|error| {
            format!(
                "{{\"overall_status\":\"fail\",\"summary\":\"doctor serialization failed\",\"error\":\"{}\"}}",
                escape_json(&error.to_string())
            )
        });
        return CommandResult { exit_code, output };
    }

    CommandResult { exit_code, output: render_human(&report) }
}

fn build_report(loaded: Result<AppConfig, ConfigError>) -> DoctorReport {
    let mut checks = Vec::new();

    match loaded {
        Ok(config) => {
            checks.push(DoctorCheck::pass(CONFIG_VALIDATION, "configuration loaded and validated"));
            checks.extend(check_services(&config));
        }
        Err(error) => {
            checks.push(DoctorCheck::fail(CONFIG_VALIDATION, error.to_string()));
            for name in [CREDENTIAL_FILE, SLACK_AUTH, CATALOG_TOKEN, SHEETS_TOKEN] {
                checks.push(DoctorCheck::skipped(name, "configuration did not load"));
            }
        }
    }

    summarize(checks)
}

fn summarize(checks: Vec<DoctorCheck>) -> DoctorReport {
    let all_pass = checks.iter().all(|check| check.status == CheckStatus::Pass);
    let overall_status = if all_pass { CheckStatus::Pass } else { CheckStatus::Fail };
    let summary = if all_pass {
        "doctor: all readiness checks passed".to_string()
    } else {
        "doctor: one or more readiness checks failed".to_string()
    };

    DoctorReport { overall_status, summary, checks }
}

fn check_services(config: &AppConfig) -> Vec<DoctorCheck> {
    let credentials = AuthorizedUser::load(&config.ledger.credentials_path);
    let credential_check = match &credentials {
        Ok(_) => DoctorCheck::pass(
            CREDENTIAL_FILE,
            format!("loaded `{}`", config.ledger.credentials_path.display()),
        ),
        Err(error) => DoctorCheck::fail(CREDENTIAL_FILE, error.to_string()),
    };

    let runtime = match runtime("doctor") {
        Ok(runtime) => runtime,
        Err(_) => {
            return vec![
                credential_check,
                DoctorCheck::fail(SLACK_AUTH, "failed to initialize async runtime"),
                DoctorCheck::skipped(CATALOG_TOKEN, "the async runtime did not start"),
                DoctorCheck::skipped(SHEETS_TOKEN, "the async runtime did not start"),
            ];
        }
    };

    let timeout = Duration::from_secs(config.http.timeout_secs);
    let sheets_check = match credentials {
        Ok(user) => check_sheets(&runtime, config, user, timeout),
        Err(_) => DoctorCheck::skipped(SHEETS_TOKEN, "the credential file did not load"),
    };

    vec![
        credential_check,
        check_slack(&runtime, config, timeout),
        check_catalog(&runtime, config, timeout),
        sheets_check,
    ]
}

fn check_slack(runtime: &Runtime, config: &AppConfig, timeout: Duration) -> DoctorCheck {
    let identity = runtime.block_on(async {
        let client = SlackWebClient::new(
            &config.slack.api_base_url,
            config.slack.bot_token.clone(),
            timeout,
        )?;
        client.auth_test().await
    });

    match identity {
        Ok(identity) if identity.user_id == config.slack.bot_user_id => DoctorCheck::pass(
            SLACK_AUTH,
            format!("authenticated as `{}` ({})", identity.user, identity.user_id),
        ),
        Ok(identity) => DoctorCheck::fail(
            SLACK_AUTH,
            format!(
                "token belongs to `{}` but slack.bot_user_id is `{}`",
                identity.user_id, config.slack.bot_user_id
            ),
        ),
        Err(error) => DoctorCheck::fail(SLACK_AUTH, error.to_string()),
    }
}

fn check_catalog(runtime: &Runtime, config: &AppConfig, timeout: Duration) -> DoctorCheck {
    let issued = runtime.block_on(async {
        let client = SpotifyClient::new(
            &config.catalog.token_url,
            &config.catalog.api_base_url,
            &config.catalog.client_id,
            config.catalog.client_secret.clone(),
            timeout,
        )?;
        client.issue_token().await
    });

    match issued {
        Ok(_) => DoctorCheck::pass(CATALOG_TOKEN, "client-credentials token issued"),
        Err(error) => DoctorCheck::fail(CATALOG_TOKEN, error.to_string()),
    }
}

fn check_sheets(
    runtime: &Runtime,
    config: &AppConfig,
    credentials: AuthorizedUser,
    timeout: Duration,
) -> DoctorCheck {
    let refreshed = runtime.block_on(async {
        let client = SheetsClient::new(
            &config.ledger.api_base_url,
            &config.ledger.token_url,
            &config.ledger.spreadsheet_id,
            credentials,
            timeout,
        )?;
        client.authorize().await
    });

    match refreshed {
        Ok(()) => DoctorCheck::pass(SHEETS_TOKEN, "refresh token exchanged for an access token"),
        Err(error) => DoctorCheck::fail(SHEETS_TOKEN, error.to_string()),
    }
}

fn render_human(report: &DoctorReport) -> String {
    let mut lines = Vec::new();
    lines.push(report.summary.clone());

    for check in &report.checks {
        let marker = match check.status {
            CheckStatus::Pass => "ok",
            CheckStatus::Fail => "fail",
            CheckStatus::Skipped => "skip",
        };
        lines.push(format!("- [{marker}] {}: {}", check.name, check.details));
    }

    lines.join("\n")
}

fn escape_json(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}
