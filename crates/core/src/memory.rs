//! In-memory collaborators for tests and dry runs.

use std::collections::{HashMap, VecDeque};

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::domain::{command::ChatEvent, reply::Reply, track::TrackMetadata, user::ChatUser};
use crate::errors::{CatalogError, LookupError, Service, TransportError};
use crate::ports::{
    AppendReceipt, CatalogApi, CatalogToken, EventSource, Responder, SpreadsheetService,
    UserDirectory,
};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RecordedReaction {
    pub channel: String,
    pub timestamp: String,
    pub name: String,
}

#[derive(Clone, Debug, PartialEq)]
pub struct RecordedReply {
    pub channel: String,
    pub reply: Reply,
    pub correlation_id: String,
}

/// Chat platform double: scripted event batches, a user table and a record of what was sent.
#[derive(Default)]
pub struct InMemoryChat {
    users: RwLock<HashMap<String, ChatUser>>,
    batches: RwLock<VecDeque<Result<Vec<ChatEvent>, TransportError>>>,
    connect_failure: RwLock<Option<TransportError>>,
    connect_attempts: RwLock<usize>,
    reactions: RwLock<Vec<RecordedReaction>>,
    replies: RwLock<Vec<RecordedReply>>,
}

impl InMemoryChat {
    pub async fn add_user(&self, user: ChatUser) {
        self.users.write().await.insert(user.id.clone(), user);
    }

    pub async fn push_batch(&self, events: Vec<ChatEvent>) {
        self.batches.write().await.push_back(Ok(events));
    }

    pub async fn push_failure(&self, error: TransportError) {
        self.batches.write().await.push_back(Err(error));
    }

    pub async fn fail_connect(&self, error: TransportError) {
        *self.connect_failure.write().await = Some(error);
    }

    pub async fn connect_attempts(&self) -> usize {
        *self.connect_attempts.read().await
    }

    pub async fn reactions(&self) -> Vec<RecordedReaction> {
        self.reactions.read().await.clone()
    }

    pub async fn replies(&self) -> Vec<RecordedReply> {
        self.replies.read().await.clone()
    }
}

#[async_trait]
impl EventSource for InMemoryChat {
    async fn connect(&self) -> Result<(), TransportError> {
        *self.connect_attempts.write().await += 1;
        match self.connect_failure.read().await.clone() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    async fn next_events(&self) -> Result<Vec<ChatEvent>, TransportError> {
        self.batches.write().await.pop_front().unwrap_or_else(|| Ok(Vec::new()))
    }
}

#[async_trait]
impl UserDirectory for InMemoryChat {
    async fn lookup_user(&self, user_id: &str) -> Result<ChatUser, LookupError> {
        self.users.read().await.get(user_id).cloned().ok_or_else(|| LookupError {
            user_id: user_id.to_owned(),
            reason: "user_not_found".to_owned(),
        })
    }
}

#[async_trait]
impl Responder for InMemoryChat {
    async fn add_reaction(
        &self,
        channel: &str,
        timestamp: &str,
        name: &str,
    ) -> Result<(), TransportError> {
        self.reactions.write().await.push(RecordedReaction {
            channel: channel.to_owned(),
            timestamp: timestamp.to_owned(),
            name: name.to_owned(),
        });
        Ok(())
    }

    async fn post_reply(
        &self,
        channel: &str,
        reply: &Reply,
        correlation_id: &str,
    ) -> Result<(), TransportError> {
        self.replies.write().await.push(RecordedReply {
            channel: channel.to_owned(),
            reply: reply.clone(),
            correlation_id: correlation_id.to_owned(),
        });
        Ok(())
    }
}

/// Catalog double. Tokens are numbered in issue order: `memory-token-1`, `memory-token-2`, ...
#[derive(Default)]
pub struct InMemoryCatalog {
    tracks: RwLock<HashMap<String, TrackMetadata>>,
    token_failures: RwLock<VecDeque<TransportError>>,
    issued: RwLock<u32>,
    tokens_seen: RwLock<Vec<String>>,
}

impl InMemoryCatalog {
    pub async fn add_track(&self, track_id: &str, track: TrackMetadata) {
        self.tracks.write().await.insert(track_id.to_owned(), track);
    }

    pub async fn fail_next_token(&self, error: TransportError) {
        self.token_failures.write().await.push_back(error);
    }

    pub async fn tokens_issued(&self) -> u32 {
        *self.issued.read().await
    }

    pub async fn lookups(&self) -> usize {
        self.tokens_seen.read().await.len()
    }

    /// Bearer token presented on each track lookup, in call order.
    pub async fn tokens_seen(&self) -> Vec<String> {
        self.tokens_seen.read().await.clone()
    }
}

#[async_trait]
impl CatalogApi for InMemoryCatalog {
    async fn issue_token(&self) -> Result<CatalogToken, TransportError> {
        if let Some(error) = self.token_failures.write().await.pop_front() {
            return Err(error);
        }
        let mut issued = self.issued.write().await;
        *issued += 1;
        Ok(CatalogToken::new(format!("memory-token-{}", *issued)))
    }

    async fn fetch_track(
        &self,
        track_id: &str,
        token: &CatalogToken,
    ) -> Result<TrackMetadata, CatalogError> {
        self.tokens_seen.write().await.push(token.expose().to_owned());
        self.tracks
            .read()
            .await
            .get(track_id)
            .cloned()
            .ok_or_else(|| CatalogError::Status { track_id: track_id.to_owned(), status: 404 })
    }
}

/// Single-worksheet spreadsheet double that understands the A1 ranges the ledger uses.
#[derive(Default)]
pub struct InMemorySpreadsheet {
    rows: RwLock<Vec<Vec<String>>>,
    zero_updates: RwLock<bool>,
    failures: RwLock<VecDeque<TransportError>>,
    appended_ranges: RwLock<Vec<String>>,
    written_ranges: RwLock<Vec<String>>,
}

impl InMemorySpreadsheet {
    pub fn with_rows(rows: Vec<Vec<String>>) -> Self {
        Self { rows: RwLock::new(rows), ..Self::default() }
    }

    pub async fn rows(&self) -> Vec<Vec<String>> {
        self.rows.read().await.clone()
    }

    /// Accept writes but report zero updated cells, as the service does for a no-op.
    pub async fn report_zero_updates(&self, enabled: bool) {
        *self.zero_updates.write().await = enabled;
    }

    pub async fn fail_next(&self, error: TransportError) {
        self.failures.write().await.push_back(error);
    }

    pub async fn appended_ranges(&self) -> Vec<String> {
        self.appended_ranges.read().await.clone()
    }

    pub async fn written_ranges(&self) -> Vec<String> {
        self.written_ranges.read().await.clone()
    }

    async fn take_failure(&self) -> Result<(), TransportError> {
        match self.failures.write().await.pop_front() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl SpreadsheetService for InMemorySpreadsheet {
    async fn append_rows(
        &self,
        range: &str,
        rows: Vec<Vec<String>>,
    ) -> Result<AppendReceipt, TransportError> {
        self.take_failure().await?;
        self.appended_ranges.write().await.push(range.to_owned());
        if *self.zero_updates.read().await {
            return Ok(AppendReceipt::default());
        }

        let (sheet, _) = split_range(range)?;
        let mut table = self.rows.write().await;
        let first = table.len() + 1;
        let updated_rows = rows.len() as u32;
        let updated_cells = rows.iter().map(Vec::len).sum::<usize>() as u32;
        table.extend(rows);

        Ok(AppendReceipt {
            updated_range: format!("{sheet}!A{first}:E{}", table.len()),
            updated_rows,
            updated_cells,
        })
    }

    async fn read_column(&self, range: &str) -> Result<Vec<String>, TransportError> {
        self.take_failure().await?;
        let (_, cells) = split_range(range)?;
        let letters = cells.split(':').next().unwrap_or_default();
        let column = column_index(letters).ok_or_else(|| invalid_range(range))?;

        Ok(self
            .rows
            .read()
            .await
            .iter()
            .map(|row| row.get(column).cloned().unwrap_or_default())
            .collect())
    }

    async fn write_cells(
        &self,
        range: &str,
        rows: Vec<Vec<String>>,
    ) -> Result<u32, TransportError> {
        self.take_failure().await?;
        self.written_ranges.write().await.push(range.to_owned());
        if *self.zero_updates.read().await {
            return Ok(0);
        }

        let (_, cells) = split_range(range)?;
        let split_at =
            cells.find(|ch: char| ch.is_ascii_digit()).ok_or_else(|| invalid_range(range))?;
        let column = column_index(&cells[..split_at]).ok_or_else(|| invalid_range(range))?;
        let first_row = cells[split_at..].parse::<usize>().map_err(|_| invalid_range(range))?;
        if first_row == 0 {
            return Err(invalid_range(range));
        }

        let mut table = self.rows.write().await;
        let mut updated = 0;
        for (offset, values) in rows.into_iter().enumerate() {
            let row_index = first_row - 1 + offset;
            if table.len() <= row_index {
                table.resize(row_index + 1, Vec::new());
            }
            let row = &mut table[row_index];
            for (column_offset, value) in values.into_iter().enumerate() {
                let target = column + column_offset;
                if row.len() <= target {
                    row.resize(target + 1, String::new());
                }
                row[target] = value;
                updated += 1;
            }
        }

        Ok(updated)
    }
}

fn split_range(range: &str) -> Result<(&str, &str), TransportError> {
    range.rsplit_once('!').ok_or_else(|| invalid_range(range))
}

/// `A` -> 0, `E` -> 4, `AA` -> 26
fn column_index(letters: &str) -> Option<usize> {
    if letters.is_empty() || !letters.chars().all(|ch| ch.is_ascii_uppercase()) {
        return None;
    }
    let number = letters.bytes().fold(0usize, |acc, byte| acc * 26 + usize::from(byte - b'A' + 1));
    Some(number - 1)
}

fn invalid_range(range: &str) -> TransportError {
    TransportError::Api { service: Service::Ledger, code: format!("invalid_range:{range}") }
}

#[cfg(test)]
mod tests {
    use super::{column_index, InMemorySpreadsheet};
    use crate::ports::SpreadsheetService;

    #[test]
    fn column_letters_map_to_zero_based_indexes() {
        assert_eq!(column_index("A"), Some(0));
        assert_eq!(column_index("E"), Some(4));
        assert_eq!(column_index("AA"), Some(26));
        assert_eq!(column_index("e"), None);
    }

    #[tokio::test]
    async fn write_extends_short_rows() {
        let sheet = InMemorySpreadsheet::with_rows(vec![vec!["a".to_owned()]]);

        let updated =
            sheet.write_cells("'Tracks'!E1", vec![vec!["9".to_owned()]]).await.expect("write");

        assert_eq!(updated, 1);
        assert_eq!(sheet.rows().await[0], vec!["a", "", "", "", "9"]);
    }
}
