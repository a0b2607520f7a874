use std::env;
use std::time::Duration;

use musicshare_core::config::AppConfig;
use musicshare_slack::client::SlackUser;
use musicshare_slack::SlackWebClient;
use secrecy::SecretString;

use crate::commands::{runtime, CommandResult};

pub const DEFAULT_BOT_NAME: &str = "music_share";

const TOKEN_KEYS: [&str; 2] = ["MUSICSHARE_SLACK_BOT_TOKEN", "SLACK_BOT_TOKEN"];

/// Runs before `slack.bot_user_id` is known, so it reads only the token instead of loading
/// (and validating) the full config.
pub fn run(name: &str) -> CommandResult {
    let Some(token) = bot_token_from_env() else {
        return CommandResult::failure(
            "bot-id",
            "config_validation",
            "set MUSICSHARE_SLACK_BOT_TOKEN (or SLACK_BOT_TOKEN) to the bot's xoxb- token",
            2,
        );
    };
    let base_url = env::var("MUSICSHARE_SLACK_API_BASE_URL")
        .ok()
        .filter(|value| !value.trim().is_empty())
        .unwrap_or_else(|| AppConfig::default().slack.api_base_url);

    let runtime = match runtime("bot-id") {
        Ok(runtime) => runtime,
        Err(failure) => return failure,
    };

    let users = runtime.block_on(async {
        let client = SlackWebClient::new(base_url, token, Duration::from_secs(30))?;
        client.users_list().await
    });

    match users {
        Ok(users) => match find_bot(&users, name) {
            Some(user) => CommandResult::success(
                "bot-id",
                format!("bot id for `{}` is {}", user.name, user.id),
            ),
            None => CommandResult::failure(
                "bot-id",
                "not_found",
                format!("could not find bot user with the name `{name}`"),
                4,
            ),
        },
        Err(error) => CommandResult::failure("bot-id", "slack_api", error.to_string(), 3),
    }
}

fn bot_token_from_env() -> Option<SecretString> {
    TOKEN_KEYS
        .iter()
        .filter_map(|key| env::var(key).ok())
        .find(|value| !value.trim().is_empty())
        .map(SecretString::from)
}

/// Exact handle match; active accounts win over deleted ones with the same name.
pub fn find_bot<'a>(users: &'a [SlackUser], name: &str) -> Option<&'a SlackUser> {
    let mut matches = users.iter().filter(|user| user.name == name);
    let first = matches.next()?;
    if !first.deleted {
        return Some(first);
    }
    matches.find(|user| !user.deleted).or(Some(first))
}
