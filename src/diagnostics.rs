use chrono::NaiveDate;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Soft failures recorded while reconstructing or mapping a statement.
/// None of these abort the request; the caller decides what is usable.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, JsonSchema)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Diagnostic {
    #[schemars(description = "The filing has no presentation rows for the statement")]
    DataAbsent { statement: String },

    #[schemars(description = "Several consolidated facts share tag, date and duration; the first in source order was used")]
    AmbiguousBinding {
        tag: String,
        end_date: NaiveDate,
        quarters: u8,
        candidates: usize,
        conflicting: bool,
    },

    UnresolvedAnchor { anchor: String },

    PatternParseError { pattern: String, message: String },

    #[schemars(description = "No instant date earlier than the period end exists; the beginning balance stays empty")]
    DateInferenceMiss {
        tag: String,
        end_date: NaiveDate,
        quarters: u8,
    },

    #[schemars(description = "The selected beginning date is far from the expected period start")]
    DateInferenceSuspect {
        tag: String,
        end_date: NaiveDate,
        quarters: u8,
        selected: NaiveDate,
        expected: NaiveDate,
        distance_days: i64,
    },

    RollupMismatch {
        line: u32,
        tag: String,
        period: String,
        reported: f64,
        computed: f64,
        difference: f64,
    },

    IdentityMismatch {
        period: String,
        assets: f64,
        liabilities_and_equity: f64,
        difference: f64,
    },
}

impl Diagnostic {
    pub fn kind(&self) -> &'static str {
        match self {
            Diagnostic::DataAbsent { .. } => "data_absent",
            Diagnostic::AmbiguousBinding { .. } => "ambiguous_binding",
            Diagnostic::UnresolvedAnchor { .. } => "unresolved_anchor",
            Diagnostic::PatternParseError { .. } => "pattern_parse_error",
            Diagnostic::DateInferenceMiss { .. } => "date_inference_miss",
            Diagnostic::DateInferenceSuspect { .. } => "date_inference_suspect",
            Diagnostic::RollupMismatch { .. } => "rollup_mismatch",
            Diagnostic::IdentityMismatch { .. } => "identity_mismatch",
        }
    }
}
