//! Core domain types for the page table.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The placeholder written into a field when text generation fails.
pub const GENERATION_SENTINEL: &str = "Failed to generate description";

// ---------------------------------------------------------------------------
// Row
// ---------------------------------------------------------------------------

/// One page record in the input table.
///
/// `url` is the work key and never changes after load. `processed` only ever
/// moves from `false` to `true`; the repair path may rewrite the three text
/// fields of a processed row but leaves the flag alone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Row {
    /// Opaque identifier (UUID v7 when assigned on import).
    #[serde(default)]
    pub id: String,
    /// Page URL.
    pub url: String,
    /// Page title (replaced by the scraped title once processed).
    #[serde(default)]
    pub title: String,
    /// Generated SEO title.
    #[serde(default)]
    pub seo_title: String,
    /// Generated meta description.
    #[serde(default)]
    pub meta_description: String,
    /// Whether the row has been enriched.
    #[serde(default)]
    pub processed: bool,
}

impl Row {
    /// Create an unprocessed row with a fresh time-sortable id.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            id: Uuid::now_v7().to_string(),
            url: url.into(),
            title: String::new(),
            seo_title: String::new(),
            meta_description: String::new(),
            processed: false,
        }
    }

    /// Overwrite the generated fields. Does not touch `processed`.
    pub fn apply(&mut self, fields: RowFields) {
        self.title = fields.title;
        self.seo_title = fields.seo_title;
        self.meta_description = fields.meta_description;
    }

    /// Narrow projection used by the QC and finalize outputs.
    pub fn to_qc_row(&self) -> QcRow {
        QcRow {
            url: self.url.clone(),
            title: self.title.clone(),
            seo_title: self.seo_title.clone(),
            meta_description: self.meta_description.clone(),
        }
    }
}

// ---------------------------------------------------------------------------
// RowFields
// ---------------------------------------------------------------------------

/// The three generated fields produced for one row by a worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowFields {
    pub title: String,
    pub seo_title: String,
    pub meta_description: String,
}

impl RowFields {
    /// Whether either generated field holds the failure sentinel.
    pub fn has_sentinel(&self) -> bool {
        self.seo_title == GENERATION_SENTINEL || self.meta_description == GENERATION_SENTINEL
    }
}

// ---------------------------------------------------------------------------
// QcRow
// ---------------------------------------------------------------------------

/// Narrow table shape written by the repair pass (no `processed` column).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QcRow {
    pub url: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub seo_title: String,
    #[serde(default)]
    pub meta_description: String,
}

/// QC rows only ever hold processed rows, so they come back processed.
impl From<QcRow> for Row {
    fn from(qc: QcRow) -> Self {
        Self {
            id: String::new(),
            url: qc.url,
            title: qc.title,
            seo_title: qc.seo_title,
            meta_description: qc.meta_description,
            processed: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_row_is_unprocessed_with_id() {
        let row = Row::new("https://example.com/a");
        assert!(!row.processed);
        assert!(Uuid::parse_str(&row.id).is_ok());
        assert!(row.seo_title.is_empty());
    }

    #[test]
    fn apply_keeps_processed_flag() {
        let mut row = Row::new("https://example.com/a");
        row.processed = true;
        row.apply(RowFields {
            title: "A".into(),
            seo_title: "B".into(),
            meta_description: "C".into(),
        });
        assert!(row.processed);
        assert_eq!(row.meta_description, "C");
        assert_eq!(row.url, "https://example.com/a");
    }

    #[test]
    fn row_deserializes_with_defaults() {
        let row: Row = serde_json::from_str(r#"{"url":"https://example.com/x"}"#).unwrap();
        assert_eq!(row.url, "https://example.com/x");
        assert!(row.id.is_empty());
        assert!(!row.processed);
    }

    #[test]
    fn sentinel_detection() {
        let fields = RowFields {
            title: "T".into(),
            seo_title: GENERATION_SENTINEL.into(),
            meta_description: "fine".into(),
        };
        assert!(fields.has_sentinel());
    }

    #[test]
    fn qc_projection_drops_id_and_flag() {
        let mut row = Row::new("https://example.com/q");
        row.seo_title = "Title".into();
        let qc = row.to_qc_row();
        assert_eq!(qc.url, row.url);
        assert_eq!(qc.seo_title, "Title");
    }

    #[test]
    fn qc_row_loads_back_as_processed() {
        let qc = QcRow {
            url: "https://example.com/q".into(),
            title: "T".into(),
            seo_title: "S".into(),
            meta_description: "M".into(),
        };
        let row = Row::from(qc.clone());
        assert!(row.processed);
        assert_eq!(row.to_qc_row(), qc);
    }
}
