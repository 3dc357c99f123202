//! Translation tunables. Every field has a default so partial JSON is accepted.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TranslateConfig {
    /// Consecutive entries started at most this far apart are chained.
    pub timestamp_sequencing_threshold_ms: i64,
    /// Shortest string value that may be replaced by a template reference.
    pub min_token_length: usize,
    pub layout_column_width: f64,
    pub layout_row_height: f64,
    /// Chain writes to the same folder path in recorded order.
    pub mutation_ordering: bool,
    pub flow_name: String,
}

impl Default for TranslateConfig {
    fn default() -> Self {
        Self {
            timestamp_sequencing_threshold_ms: 50,
            min_token_length: 8,
            layout_column_width: 300.0,
            layout_row_height: 150.0,
            mutation_ordering: true,
            flow_name: "HAR Import".into(),
        }
    }
}
