//! Feed rows as they appear in the tab-separated dataset tables.
//!
//! Every column is read as text so that a malformed value is reported with
//! its table and row number instead of failing the whole deserializer.
//! Reading the files themselves is left to the caller.

use crate::error::{ReconstructionError, Result};
use crate::schema::{
    BalanceSide, CalcChild, CalcRelationship, DatasetVintage, Fact, FilingMetadata,
    PresentationEntry, StatementType, TagMetadata,
};
use crate::store::InMemoryFactStore;
use crate::utils::parse_yyyymmdd;
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NumRow {
    pub adsh: String,
    pub tag: String,
    pub version: String,
    pub ddate: String,
    pub qtrs: String,
    pub uom: String,
    #[serde(default)]
    pub segments: Option<String>,
    #[serde(default)]
    pub coreg: Option<String>,
    #[serde(default)]
    pub value: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PreRow {
    pub adsh: String,
    pub report: String,
    pub line: String,
    pub stmt: String,
    pub inpth: String,
    pub tag: String,
    pub version: String,
    pub plabel: String,
    #[serde(default)]
    pub negating: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TagRow {
    pub tag: String,
    pub version: String,
    #[serde(default)]
    pub custom: Option<String>,
    #[serde(rename = "abstract", default)]
    pub is_abstract: Option<String>,
    #[serde(default)]
    pub datatype: Option<String>,
    #[serde(default)]
    pub crdr: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SubRow {
    pub adsh: String,
    pub cik: String,
    pub name: String,
    #[serde(default)]
    pub sic: Option<String>,
    #[serde(default)]
    pub fye: Option<String>,
    #[serde(default)]
    pub form: Option<String>,
    #[serde(default)]
    pub fy: Option<String>,
    #[serde(default)]
    pub fp: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CalRow {
    pub adsh: String,
    pub grp: String,
    pub arc: String,
    pub negative: String,
    pub ptag: String,
    pub pversion: String,
    pub ctag: String,
    pub cversion: String,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_flag(raw: Option<&str>) -> bool {
    matches!(
        raw.map(|r| r.trim().to_ascii_lowercase()).as_deref(),
        Some("1") | Some("true")
    )
}

fn parse_number<T: std::str::FromStr>(
    raw: &str,
    table: &'static str,
    row: usize,
    column: &str,
) -> Result<T> {
    raw.trim()
        .parse()
        .map_err(|_| ReconstructionError::InvalidRow {
            table,
            row,
            details: format!("{} '{}' is not a valid number", column, raw),
        })
}

impl NumRow {
    /// `Ok(None)` for rows without a numeric value.
    pub fn into_fact(self, row: usize) -> Result<Option<Fact>> {
        let value = match non_empty(self.value) {
            Some(raw) => parse_number::<f64>(&raw, "num", row, "value")?,
            None => return Ok(None),
        };
        let end_date = parse_yyyymmdd(&self.ddate).map_err(|e| ReconstructionError::InvalidRow {
            table: "num",
            row,
            details: e.to_string(),
        })?;

        Ok(Some(Fact {
            accession: self.adsh,
            tag: self.tag,
            version: self.version,
            end_date,
            quarters: parse_number(&self.qtrs, "num", row, "qtrs")?,
            unit: self.uom,
            segments: non_empty(self.segments),
            coregistrant: non_empty(self.coreg),
            value,
        }))
    }
}

impl PreRow {
    /// `Ok(None)` for statements that are not reconstructed (cover page,
    /// schedules, unclassifiable).
    pub fn into_entry(self, row: usize) -> Result<Option<PresentationEntry>> {
        let statement = match StatementType::from_code(&self.stmt) {
            Some(statement) => statement,
            None => return Ok(None),
        };

        Ok(Some(PresentationEntry {
            accession: self.adsh,
            report: parse_number(&self.report, "pre", row, "report")?,
            line: parse_number(&self.line, "pre", row, "line")?,
            statement,
            indent: parse_number(&self.inpth, "pre", row, "inpth")?,
            tag: self.tag,
            version: self.version,
            label: self.plabel,
            negating: parse_flag(self.negating.as_deref()),
        }))
    }
}

impl TagRow {
    pub fn into_metadata(self, row: usize) -> Result<TagMetadata> {
        let balance = match non_empty(self.crdr).as_deref() {
            Some("C") | Some("c") => Some(BalanceSide::Credit),
            Some("D") | Some("d") => Some(BalanceSide::Debit),
            None => None,
            Some(other) => {
                return Err(ReconstructionError::InvalidRow {
                    table: "tag",
                    row,
                    details: format!("crdr '{}' is neither C nor D", other),
                })
            }
        };

        Ok(TagMetadata {
            tag: self.tag,
            version: self.version,
            is_abstract: parse_flag(self.is_abstract.as_deref()),
            datatype: non_empty(self.datatype),
            is_custom: parse_flag(self.custom.as_deref()),
            balance,
        })
    }
}

impl SubRow {
    pub fn into_metadata(self, row: usize) -> Result<(String, FilingMetadata)> {
        let sic = match non_empty(self.sic) {
            Some(raw) => Some(parse_number::<u16>(
                raw.trim_end_matches(".0"),
                "sub",
                row,
                "sic",
            )?),
            None => None,
        };
        let fiscal_year = match non_empty(self.fy) {
            Some(raw) => Some(parse_number::<i32>(
                raw.trim_end_matches(".0"),
                "sub",
                row,
                "fy",
            )?),
            None => None,
        };
        let fiscal_year_end = non_empty(self.fye).map(|fye| format!("{:0>4}", fye));

        Ok((
            self.adsh,
            FilingMetadata {
                filer_id: parse_number(&self.cik, "sub", row, "cik")?,
                name: self.name,
                sic,
                form: non_empty(self.form),
                fiscal_year,
                fiscal_period: non_empty(self.fp),
                fiscal_year_end,
            },
        ))
    }
}

/// Groups calculation arcs into one relationship per (filing, group, parent),
/// children ordered by arc number.
pub fn group_calc_rows(rows: Vec<CalRow>) -> Result<Vec<(String, CalcRelationship)>> {
    let mut groups: BTreeMap<(String, u32, String), Vec<(u32, CalcChild)>> = BTreeMap::new();

    for (index, row) in rows.into_iter().enumerate() {
        let number = index + 1;
        let grp: u32 = parse_number(&row.grp, "cal", number, "grp")?;
        let arc: u32 = parse_number(&row.arc, "cal", number, "arc")?;
        let weight = if parse_flag(Some(&row.negative)) {
            -1.0
        } else {
            1.0
        };

        groups
            .entry((row.adsh, grp, row.ptag))
            .or_default()
            .push((
                arc,
                CalcChild {
                    tag: row.ctag,
                    weight,
                    label: None,
                },
            ));
    }

    Ok(groups
        .into_iter()
        .map(|((adsh, _, parent), mut children)| {
            children.sort_by_key(|(arc, _)| *arc);
            (
                adsh,
                CalcRelationship {
                    parent,
                    children: children.into_iter().map(|(_, child)| child).collect(),
                },
            )
        })
        .collect())
}

/// The raw tables of one dataset vintage.
#[derive(Debug, Clone, Default)]
pub struct FeedRows {
    pub submissions: Vec<SubRow>,
    pub numbers: Vec<NumRow>,
    pub presentation: Vec<PreRow>,
    pub tags: Vec<TagRow>,
    pub calculations: Vec<CalRow>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestionReport {
    pub filings: usize,
    pub facts: usize,
    pub facts_without_value: usize,
    pub presentation_rows: usize,
    pub presentation_rows_skipped: usize,
    pub tags: usize,
    pub calc_relationships: usize,
}

/// Loads a vintage into an in-memory store. Row order of `numbers` is kept
/// as the source order of facts.
pub fn load_feed(
    store: &mut InMemoryFactStore,
    vintage: DatasetVintage,
    rows: FeedRows,
) -> Result<IngestionReport> {
    let mut report = IngestionReport::default();

    for (index, row) in rows.submissions.into_iter().enumerate() {
        let (accession, metadata) = row.into_metadata(index + 1)?;
        store.insert_filing(vintage, accession, metadata);
        report.filings += 1;
    }

    for (index, row) in rows.numbers.into_iter().enumerate() {
        match row.into_fact(index + 1)? {
            Some(fact) => {
                store.insert_fact(vintage, fact);
                report.facts += 1;
            }
            None => report.facts_without_value += 1,
        }
    }

    for (index, row) in rows.presentation.into_iter().enumerate() {
        match row.into_entry(index + 1)? {
            Some(entry) => {
                store.insert_presentation(vintage, entry);
                report.presentation_rows += 1;
            }
            None => report.presentation_rows_skipped += 1,
        }
    }

    for (index, row) in rows.tags.into_iter().enumerate() {
        store.insert_tag(vintage, row.into_metadata(index + 1)?);
        report.tags += 1;
    }

    for (accession, relationship) in group_calc_rows(rows.calculations)? {
        store.insert_calc(vintage, accession, relationship);
        report.calc_relationships += 1;
    }

    if report.facts_without_value > 0 {
        debug!(
            "{} facts without a numeric value skipped for {}",
            report.facts_without_value, vintage
        );
    }
    info!(
        "Loaded {} filings, {} facts, {} presentation rows for {}",
        report.filings, report.facts, report.presentation_rows, vintage
    );

    Ok(report)
}
