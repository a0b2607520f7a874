//! Slack integration for the music share bot.
//!
//! - **Client** (`client`) - Slack Web API calls with `ok`/`error` envelope handling
//! - **Events** (`events`) - channel history to chat events, per-channel watermarks
//! - **Gateway** (`gateway`) - the core's event source, user directory and responder
//! - **Block Kit** (`blocks`) - reply rendering
//!
//! # Getting Started
//!
//! 1. Create a Slack app at https://api.slack.com/apps and install it to the workspace
//! 2. Grant bot scopes: `channels:history`, `groups:history`, `channels:read`, `groups:read`,
//!    `chat:write`, `reactions:write`, `users:read`
//! 3. Set `MUSICSHARE_SLACK_BOT_TOKEN` and run `musicshare bot-id` for the bot user id
//! 4. Invite the bot to the music channel
//!
//! # Limits
//!
//! - Without `slack.channels`, the watched set is the bot's memberships at connect time.
//!   Channels it joins later are picked up only after a restart.
//! - A `429` carrying `Retry-After` is retried once after that delay (capped at 30s).
//!   Anything else throttled surfaces as an HTTP status error; the next poll cycle reads again.
//!
//! # Architecture
//!
//! ```text
//! conversations.history -> SlackGateway -> PollLoop -> EventPipeline
//!                                                          |
//!        chat.postMessage / reactions.add <- SlackGateway <-+
//! ```

pub mod blocks;
pub mod client;
pub mod events;
pub mod gateway;

pub use client::SlackWebClient;
pub use gateway::SlackGateway;
