//! The shared-tracks spreadsheet: one worksheet, columns A-E `[date, title, artists, url, rating]`.

use std::sync::Arc;

use serde::Serialize;
use tracing::{info, warn};

use crate::config::UnmatchedRatingPolicy;
use crate::domain::{ledger::LedgerRow, rating::Rating};
use crate::errors::LedgerError;
use crate::ports::SpreadsheetService;

pub const TABLE_COLUMNS: &str = "A:E";
pub const URL_COLUMN: char = 'D';
pub const RATING_COLUMN: char = 'E';

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct AppendOutcome {
    pub rows_inserted: u32,
    pub sheet_name: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct RatingUpdate {
    /// 1-based worksheet row that received the rating.
    pub row_index: usize,
    pub updated_cells: u32,
    /// False when the row was chosen by the `last_row` fallback.
    pub matched: bool,
}

pub struct LedgerClient {
    sheets: Arc<dyn SpreadsheetService>,
    worksheet: String,
    unmatched: UnmatchedRatingPolicy,
}

impl LedgerClient {
    pub fn new(
        sheets: Arc<dyn SpreadsheetService>,
        worksheet: impl Into<String>,
        unmatched: UnmatchedRatingPolicy,
    ) -> Self {
        Self { sheets, worksheet: worksheet.into(), unmatched }
    }

    /// Appends the row at the end of the table. Not idempotent: the same url twice gives two rows.
    pub async fn append_row(&self, row: &LedgerRow) -> Result<AppendOutcome, LedgerError> {
        let range = self.range(TABLE_COLUMNS);
        let receipt = self.sheets.append_rows(&range, vec![row.cells()]).await?;

        if receipt.updated_cells == 0 {
            return Err(LedgerError::NothingAppended);
        }

        let sheet_name = sheet_name_from_range(&receipt.updated_range)
            .unwrap_or_else(|| self.worksheet.clone());
        info!(
            event_name = "ledger.row.appended",
            sheet_name = %sheet_name,
            updated_range = %receipt.updated_range,
            rows_inserted = receipt.updated_rows,
            "appended ledger row"
        );

        Ok(AppendOutcome { rows_inserted: receipt.updated_rows, sheet_name })
    }

    pub async fn update_rating(
        &self,
        url: &str,
        rating: Rating,
    ) -> Result<RatingUpdate, LedgerError> {
        let url_range = self.range(&format!("{URL_COLUMN}:{URL_COLUMN}"));
        let urls = self.sheets.read_column(&url_range).await?;

        let (row_index, matched) = match (scan_for_url(&urls, url), self.unmatched) {
            (Some(row_index), _) => (row_index, true),
            (None, UnmatchedRatingPolicy::Reject) => {
                return Err(LedgerError::NoMatchingRow { url: url.to_owned() })
            }
            (None, UnmatchedRatingPolicy::LastRow) => {
                if urls.is_empty() {
                    return Err(LedgerError::NoMatchingRow { url: url.to_owned() });
                }
                warn!(
                    event_name = "ledger.rating.unmatched_fallback",
                    url,
                    row_index = urls.len(),
                    "no row matches url; writing rating to last scanned row"
                );
                (urls.len(), false)
            }
        };

        let target = self.range(&format!("{RATING_COLUMN}{row_index}"));
        let updated_cells = self.sheets.write_cells(&target, vec![vec![rating.cell_text()]]).await?;
        if updated_cells == 0 {
            return Err(LedgerError::NothingUpdated { url: url.to_owned() });
        }

        info!(
            event_name = "ledger.rating.updated",
            url,
            row_index,
            updated_cells,
            matched,
            "updated ledger rating"
        );
        Ok(RatingUpdate { row_index, updated_cells, matched })
    }

    fn range(&self, cells: &str) -> String {
        format!("'{}'!{cells}", self.worksheet.replace('\'', "''"))
    }
}

/// 1-based index of the first cell that equals `url` exactly.
pub fn scan_for_url(cells: &[String], url: &str) -> Option<usize> {
    cells.iter().position(|cell| cell == url).map(|index| index + 1)
}

/// `'Bob''s Sheet'!A7:E7` -> `Bob's Sheet`
pub fn sheet_name_from_range(range: &str) -> Option<String> {
    let (sheet, _) = range.rsplit_once('!')?;
    let sheet = match sheet.strip_prefix('\'').and_then(|name| name.strip_suffix('\'')) {
        Some(quoted) => quoted.replace("''", "'"),
        None => sheet.to_owned(),
    };
    (!sheet.is_empty()).then_some(sheet)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::NaiveDate;

    use super::{scan_for_url, sheet_name_from_range, LedgerClient};
    use crate::config::UnmatchedRatingPolicy;
    use crate::domain::{ledger::LedgerRow, rating::validate, track::TrackMetadata};
    use crate::errors::{LedgerError, Service, TransportError};
    use crate::memory::InMemorySpreadsheet;

    const URL: &str = "https://open.spotify.com/track/abc";

    fn row(url: &str) -> LedgerRow {
        let date = NaiveDate::from_ymd_opt(2026, 5, 1).expect("valid date");
        let track =
            TrackMetadata {
                title: "Roygbiv".to_owned(),
                artists: vec!["Boards of Canada".to_owned()],
            };
        LedgerRow::shared(date, &track, url)
    }

    fn client(sheet: Arc<InMemorySpreadsheet>, unmatched: UnmatchedRatingPolicy) -> LedgerClient {
        LedgerClient::new(sheet, "Tracks", unmatched)
    }

    #[test]
    fn scan_returns_first_exact_match_one_based() {
        let cells = vec!["url".to_owned(), URL.to_owned(), URL.to_owned()];
        assert_eq!(scan_for_url(&cells, URL), Some(2));
        assert_eq!(scan_for_url(&cells, "https://open.spotify.com/track/ABC"), None);
    }

    #[test]
    fn sheet_name_is_read_from_quoted_and_bare_ranges() {
        assert_eq!(sheet_name_from_range("'Bob''s Tracks'!A2:E2").as_deref(), Some("Bob's Tracks"));
        assert_eq!(sheet_name_from_range("Tracks!A2:E2").as_deref(), Some("Tracks"));
        assert_eq!(sheet_name_from_range("A2:E2"), None);
    }

    #[tokio::test]
    async fn appended_url_is_found_at_or_after_previous_row_count() {
        let sheet = Arc::new(InMemorySpreadsheet::with_rows(vec![
            vec!["date".into(), "title".into(), "artists".into(), "url".into(), "rating".into()],
            row("https://open.spotify.com/track/old").cells(),
        ]));
        let ledger = client(sheet.clone(), UnmatchedRatingPolicy::Reject);
        let before = sheet.rows().await.len();

        let outcome = ledger.append_row(&row(URL)).await.expect("append succeeds");
        assert_eq!(outcome.rows_inserted, 1);
        assert_eq!(outcome.sheet_name, "Tracks");

        let urls: Vec<String> = sheet
            .rows()
            .await
            .iter()
            .map(|cells| cells.get(3).cloned().unwrap_or_default())
            .collect();
        let found = scan_for_url(&urls, URL).expect("appended url is present");
        assert!(found >= before, "found at {found}, previous count {before}");
    }

    #[tokio::test]
    async fn appending_twice_keeps_both_rows() {
        let sheet = Arc::new(InMemorySpreadsheet::default());
        let ledger = client(sheet.clone(), UnmatchedRatingPolicy::Reject);

        ledger.append_row(&row(URL)).await.expect("first append");
        ledger.append_row(&row(URL)).await.expect("second append");

        let rows = sheet.rows().await;
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0], rows[1]);
        assert_eq!(rows[0][4], "");
    }

    #[tokio::test]
    async fn zero_appended_cells_is_a_ledger_error() {
        let sheet = Arc::new(InMemorySpreadsheet::default());
        sheet.report_zero_updates(true).await;
        let ledger = client(sheet, UnmatchedRatingPolicy::Reject);

        assert_eq!(ledger.append_row(&row(URL)).await, Err(LedgerError::NothingAppended));
    }

    #[tokio::test]
    async fn rating_lands_on_matching_row() {
        let sheet = Arc::new(InMemorySpreadsheet::with_rows(vec![
            row("https://open.spotify.com/track/first").cells(),
            row(URL).cells(),
            row("https://open.spotify.com/track/last").cells(),
        ]));
        let ledger = client(sheet.clone(), UnmatchedRatingPolicy::Reject);

        let update =
            ledger.update_rating(URL, validate("7.5").expect("valid")).await.expect("update");
        assert_eq!(update.row_index, 2);
        assert_eq!(update.updated_cells, 1);
        assert!(update.matched);

        let rows = sheet.rows().await;
        assert_eq!(rows[1][4], "7.5");
        assert_eq!(rows[2][4], "");
        assert_eq!(sheet.written_ranges().await, vec!["'Tracks'!E2".to_owned()]);
    }

    #[tokio::test]
    async fn unmatched_rating_is_rejected_by_default() {
        let sheet = Arc::new(InMemorySpreadsheet::with_rows(vec![
            row("https://open.spotify.com/track/x").cells(),
        ]));
        let ledger = client(sheet.clone(), UnmatchedRatingPolicy::Reject);

        let error = ledger.update_rating(URL, validate("5").expect("valid")).await;
        assert_eq!(error, Err(LedgerError::NoMatchingRow { url: URL.to_owned() }));
        assert!(sheet.written_ranges().await.is_empty());
    }

    #[tokio::test]
    async fn last_row_policy_writes_to_last_scanned_row() {
        let sheet = Arc::new(InMemorySpreadsheet::with_rows(vec![
            row("https://open.spotify.com/track/x").cells(),
            row("https://open.spotify.com/track/y").cells(),
        ]));
        let ledger = client(sheet.clone(), UnmatchedRatingPolicy::LastRow);

        let update =
            ledger.update_rating(URL, validate("3").expect("valid")).await.expect("update");
        assert_eq!(update.row_index, 2);
        assert!(!update.matched);
        assert_eq!(sheet.rows().await[1][4], "3");
    }

    #[tokio::test]
    async fn last_row_policy_still_rejects_an_empty_sheet() {
        let ledger =
            client(Arc::new(InMemorySpreadsheet::default()), UnmatchedRatingPolicy::LastRow);

        let error = ledger.update_rating(URL, validate("3").expect("valid")).await;
        assert!(matches!(error, Err(LedgerError::NoMatchingRow { .. })));
    }

    #[tokio::test]
    async fn transport_failure_passes_through() {
        let sheet = Arc::new(InMemorySpreadsheet::default());
        sheet
            .fail_next(TransportError::Status { service: Service::Ledger, status: 500 })
            .await;
        let ledger = client(sheet, UnmatchedRatingPolicy::Reject);

        let error = ledger.append_row(&row(URL)).await.expect_err("transport failure");
        assert!(matches!(error, LedgerError::Transport(_)));
    }

    #[tokio::test]
    async fn worksheet_names_with_quotes_are_escaped() {
        let sheet = Arc::new(InMemorySpreadsheet::default());
        let ledger = LedgerClient::new(sheet.clone(), "Bob's Picks", UnmatchedRatingPolicy::Reject);

        ledger.append_row(&row(URL)).await.expect("append succeeds");
        assert_eq!(sheet.appended_ranges().await, vec!["'Bob''s Picks'!A:E".to_owned()]);
    }
}
