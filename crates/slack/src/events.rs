use std::cmp::Ordering;
use std::collections::BTreeMap;

use chrono::{DateTime, Utc};

use musicshare_core::ChatEvent;

use crate::client::HistoryMessage;

/// Turns a newest-first history page into chat events, oldest first.
///
/// Edits, joins and other subtyped messages are dropped, as is anything the bot itself posted.
pub fn events_from_history(
    channel: &str,
    bot_user_id: &str,
    messages: Vec<HistoryMessage>,
) -> Vec<ChatEvent> {
    let mut events: Vec<ChatEvent> = messages
        .into_iter()
        .filter(|message| message.subtype.is_none() && message.bot_id.is_none())
        .filter_map(|message| {
            let user = message.user?;
            if user == bot_user_id {
                return None;
            }
            Some(ChatEvent {
                channel: channel.to_owned(),
                user,
                text: message.text.unwrap_or_default(),
                timestamp: message.ts,
            })
        })
        .collect();

    events.sort_by(|left, right| compare_ts(&left.timestamp, &right.timestamp));
    events
}

/// Slack timestamps are `seconds.micros` strings; compare them numerically.
pub fn compare_ts(left: &str, right: &str) -> Ordering {
    parse_ts(left).cmp(&parse_ts(right))
}

fn parse_ts(ts: &str) -> (u64, u64) {
    let (seconds, fraction) = ts.split_once('.').unwrap_or((ts, "0"));
    let micros = format!("{fraction:0<6}");
    (seconds.parse().unwrap_or(0), micros.get(..6).and_then(|m| m.parse().ok()).unwrap_or(0))
}

pub fn ts_from_datetime(instant: DateTime<Utc>) -> String {
    format!("{}.{:06}", instant.timestamp(), instant.timestamp_subsec_micros())
}

/// Newest message seen per channel; history is read strictly after it.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Watermarks {
    channels: BTreeMap<String, String>,
}

impl Watermarks {
    pub fn starting_at(channels: &[String], ts: &str) -> Self {
        Self {
            channels: channels.iter().map(|channel| (channel.clone(), ts.to_owned())).collect(),
        }
    }

    pub fn channels(&self) -> impl Iterator<Item = (&str, &str)> {
        self.channels.iter().map(|(channel, ts)| (channel.as_str(), ts.as_str()))
    }

    pub fn oldest(&self, channel: &str) -> Option<&str> {
        self.channels.get(channel).map(String::as_str)
    }

    /// Moves forward only; an older timestamp is ignored.
    pub fn advance(&mut self, channel: &str, ts: &str) {
        match self.channels.get_mut(channel) {
            Some(current) if compare_ts(ts, current) == Ordering::Greater => {
                *current = ts.to_owned();
            }
            Some(_) => {}
            None => {
                self.channels.insert(channel.to_owned(), ts.to_owned());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::cmp::Ordering;

    use chrono::{TimeZone, Utc};

    use super::{compare_ts, events_from_history, ts_from_datetime, Watermarks};
    use crate::client::HistoryMessage;

    fn message(ts: &str, user: Option<&str>, subtype: Option<&str>) -> HistoryMessage {
        HistoryMessage {
            ts: ts.to_owned(),
            user: user.map(str::to_owned),
            text: Some(format!("text {ts}")),
            subtype: subtype.map(str::to_owned),
            bot_id: None,
        }
    }

    #[test]
    fn history_is_filtered_and_reordered_oldest_first() {
        let mut from_other_bot = message("1700000000.000400", Some("UOTHERBOT"), None);
        from_other_bot.bot_id = Some("B1".to_owned());

        let events = events_from_history(
            "C1",
            "UBOT",
            vec![
                from_other_bot,
                message("1700000000.000300", Some("UBOT"), None),
                message("1700000000.000200", Some("U2"), Some("message_changed")),
                message("1700000000.000100", Some("U1"), None),
                message("1699999999.999999", Some("U3"), None),
            ],
        );

        let stamps: Vec<&str> = events.iter().map(|event| event.timestamp.as_str()).collect();
        assert_eq!(stamps, vec!["1699999999.999999", "1700000000.000100"]);
        assert_eq!(events[1].user, "U1");
        assert_eq!(events[1].channel, "C1");
    }

    #[test]
    fn timestamps_compare_numerically() {
        assert_eq!(compare_ts("9.000001", "10.000000"), Ordering::Less);
        assert_eq!(compare_ts("10.5", "10.000005"), Ordering::Greater);
        assert_eq!(compare_ts("10.100000", "10.1"), Ordering::Equal);
    }

    #[test]
    fn watermark_only_moves_forward() {
        let mut marks = Watermarks::starting_at(&["C1".to_owned()], "100.000000");

        marks.advance("C1", "99.000000");
        assert_eq!(marks.oldest("C1"), Some("100.000000"));

        marks.advance("C1", "101.000001");
        assert_eq!(marks.oldest("C1"), Some("101.000001"));
    }

    #[test]
    fn datetime_renders_as_slack_ts() {
        let instant = Utc.timestamp_opt(1_700_000_000, 42_000).single().expect("valid instant");
        assert_eq!(ts_from_datetime(instant), "1700000000.000042");
    }
}
