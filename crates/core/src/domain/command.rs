use serde::{Deserialize, Serialize};

/// Every catalog link the bot accepts starts with this prefix.
pub const CATALOG_URL_PREFIX: &str = "https://open.spotify.com/track/";

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatEvent {
    pub channel: String,
    pub user: String,
    pub text: String,
    pub timestamp: String,
}

impl ChatEvent {
    pub fn correlation_id(&self) -> String {
        format!("{}:{}", self.channel, self.timestamp)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Command {
    Share { url: String },
    Rate { url: String, rating_text: String },
    Invalid,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CommandKind {
    Share,
    Rate,
}

impl CommandKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Share => "share",
            Self::Rate => "rate",
        }
    }
}

impl Command {
    pub fn kind(&self) -> Option<CommandKind> {
        match self {
            Self::Share { .. } => Some(CommandKind::Share),
            Self::Rate { .. } => Some(CommandKind::Rate),
            Self::Invalid => None,
        }
    }
}

pub fn mention_token(bot_user_id: &str) -> String {
    format!("<@{bot_user_id}>")
}

pub fn is_bot_directed(event: &ChatEvent, mention: &str) -> bool {
    !mention.is_empty() && event.text.contains(mention)
}

pub fn parse(event: &ChatEvent, mention: &str) -> Command {
    if !is_bot_directed(event, mention) {
        return Command::Invalid;
    }
    let Some((_, directed)) = event.text.split_once(mention) else {
        return Command::Invalid;
    };

    let mut tokens = directed.trim().split_whitespace();
    let verb = tokens.next().unwrap_or_default().to_lowercase();
    let args = tokens.collect::<Vec<_>>();
    let Some(url) = args.iter().find_map(|token| catalog_url(token)) else {
        return Command::Invalid;
    };

    match verb.as_str() {
        "share" => Command::Share { url },
        "rate" => match args.get(1) {
            Some(rating_text) => Command::Rate { url, rating_text: (*rating_text).to_owned() },
            None => Command::Invalid,
        },
        _ => Command::Invalid,
    }
}

/// Pulls a catalog URL out of one message token, undoing the `<url|label>` link wrapping.
/// Punctuation typed around the link (`(<url>).`) sits outside the brackets and is dropped.
fn catalog_url(token: &str) -> Option<String> {
    let unwrapped = match token.find('<') {
        Some(open) => {
            let inner = &token[open + 1..];
            inner.find('>').map_or(inner, |close| &inner[..close])
        }
        None => token,
    };
    let unwrapped = unwrapped.split('|').next().unwrap_or(unwrapped);
    let start = unwrapped.to_ascii_lowercase().find(CATALOG_URL_PREFIX)?;
    unwrapped.get(start..).map(str::to_owned)
}
