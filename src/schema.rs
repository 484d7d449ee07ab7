use crate::error::{ReconstructionError, Result};
use chrono::NaiveDate;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash, JsonSchema,
)]
pub enum StatementType {
    #[serde(rename = "BS")]
    #[schemars(description = "Balance Sheet: instant balances indexed by period-end date")]
    BalanceSheet,

    #[serde(rename = "IS")]
    #[schemars(description = "Income Statement: flows over a number of quarters")]
    IncomeStatement,

    #[serde(rename = "CF")]
    #[schemars(description = "Cash Flow statement: flows plus beginning and ending cash balances")]
    CashFlow,

    #[serde(rename = "EQ")]
    #[schemars(description = "Statement of stockholders' equity")]
    Equity,

    #[serde(rename = "CI")]
    #[schemars(description = "Statement of comprehensive income")]
    ComprehensiveIncome,
}

impl StatementType {
    pub const ALL: [StatementType; 5] = [
        StatementType::BalanceSheet,
        StatementType::IncomeStatement,
        StatementType::CashFlow,
        StatementType::Equity,
        StatementType::ComprehensiveIncome,
    ];

    pub fn code(&self) -> &'static str {
        match self {
            StatementType::BalanceSheet => "BS",
            StatementType::IncomeStatement => "IS",
            StatementType::CashFlow => "CF",
            StatementType::Equity => "EQ",
            StatementType::ComprehensiveIncome => "CI",
        }
    }

    /// Maps a feed `stmt` code. Codes outside the five reconstructed
    /// statements (cover page, schedules of investments, unclassifiable)
    /// yield `None`.
    pub fn from_code(code: &str) -> Option<Self> {
        match code.trim().to_ascii_uppercase().as_str() {
            "BS" => Some(StatementType::BalanceSheet),
            "IS" => Some(StatementType::IncomeStatement),
            "CF" => Some(StatementType::CashFlow),
            "EQ" => Some(StatementType::Equity),
            "CI" => Some(StatementType::ComprehensiveIncome),
            _ => None,
        }
    }

    /// Balance sheets are indexed by instants, every other statement by durations.
    pub fn is_instant(&self) -> bool {
        matches!(self, StatementType::BalanceSheet)
    }
}

impl fmt::Display for StatementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Year and quarter of the source dataset a filing was published in.
#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash, JsonSchema,
)]
pub struct DatasetVintage {
    pub year: i32,
    pub quarter: u8,
}

impl DatasetVintage {
    pub fn new(year: i32, quarter: u8) -> Result<Self> {
        if !(1..=4).contains(&quarter) {
            return Err(ReconstructionError::InvalidVintage { year, quarter });
        }
        Ok(Self { year, quarter })
    }
}

impl fmt::Display for DatasetVintage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}q{}", self.year, self.quarter)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash, JsonSchema)]
pub struct FilingRef {
    #[schemars(description = "Central index key of the reporting entity")]
    pub filer_id: u64,

    #[schemars(description = "Accession number of the submission, e.g. 0000320193-24-000069")]
    pub accession: String,
}

impl FilingRef {
    pub fn new(filer_id: u64, accession: impl Into<String>) -> Self {
        Self {
            filer_id,
            accession: accession.into(),
        }
    }
}

impl fmt::Display for FilingRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.filer_id, self.accession)
    }
}

/// One numeric datum of a filing.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, JsonSchema)]
pub struct Fact {
    pub accession: String,
    pub tag: String,
    pub version: String,
    pub end_date: NaiveDate,

    #[schemars(description = "0 for an instant balance, otherwise the number of quarters the flow spans")]
    pub quarters: u8,
    pub unit: String,
    pub segments: Option<String>,
    pub coregistrant: Option<String>,
    pub value: f64,
}

impl Fact {
    pub fn is_instant(&self) -> bool {
        self.quarters == 0
    }

    /// Facts broken out by a dimension or filed for a co-registrant never
    /// take part in consolidated reconstruction.
    pub fn is_consolidated(&self) -> bool {
        self.segments.is_none() && self.coregistrant.is_none()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, JsonSchema)]
pub struct PresentationEntry {
    pub accession: String,
    pub report: u32,
    pub line: u32,
    pub statement: StatementType,

    #[schemars(description = "Indentation level: 0 = parent, 1 = child, 2 = grandchild")]
    pub indent: u8,
    pub tag: String,
    pub version: String,
    pub label: String,
    pub negating: bool,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum BalanceSide {
    Credit,
    Debit,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, JsonSchema)]
pub struct TagMetadata {
    pub tag: String,
    pub version: String,
    pub is_abstract: bool,

    #[schemars(description = "XBRL item type without the suffix, e.g. monetary, perShare, shares")]
    pub datatype: Option<String>,
    pub is_custom: bool,
    pub balance: Option<BalanceSide>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, JsonSchema)]
pub struct CalcChild {
    pub tag: String,
    pub weight: f64,
    pub label: Option<String>,
}

/// Declared summation: `parent` equals the weighted sum of `children`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, JsonSchema)]
pub struct CalcRelationship {
    pub parent: String,
    pub children: Vec<CalcChild>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, JsonSchema)]
pub struct FilingMetadata {
    pub filer_id: u64,
    pub name: String,

    #[schemars(description = "Standard industrial classification code of the filer")]
    pub sic: Option<u16>,
    pub form: Option<String>,
    pub fiscal_year: Option<i32>,

    #[schemars(description = "Fiscal period code: FY, Q1, Q2, Q3, Q4, H1, H2, M9, ...")]
    pub fiscal_period: Option<String>,

    #[schemars(description = "Fiscal year end as MMDD, e.g. 0928")]
    pub fiscal_year_end: Option<String>,
}

/// A column of a reconstructed statement.
#[derive(
    Debug, Clone, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash, JsonSchema,
)]
pub struct Period {
    pub end_date: NaiveDate,
    pub quarters: u8,
    pub label: String,
}

impl Period {
    pub fn is_instant(&self) -> bool {
        self.quarters == 0
    }

    pub fn key(&self) -> (NaiveDate, u8) {
        (self.end_date, self.quarters)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, JsonSchema)]
pub struct ReconstructionRequest {
    pub vintage: DatasetVintage,
    pub filing: FilingRef,
    pub statement: StatementType,
}

impl ReconstructionRequest {
    pub fn new(vintage: DatasetVintage, filing: FilingRef, statement: StatementType) -> Self {
        Self {
            vintage,
            filing,
            statement,
        }
    }
}
