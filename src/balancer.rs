use crate::binder::ValueOrigin;
use crate::chart_of_accounts::{ChartOfAccounts, FieldKind, Section};
use crate::config::Tolerance;
use crate::control::{Anchor, AnchorSet, StructuralPattern};
use crate::diagnostics::Diagnostic;
use crate::error::{ReconstructionError, Result};
use crate::hierarchy::StatementForest;
use crate::mapping::{FieldMapping, IndustryClass};
use crate::schema::{DatasetVintage, FilingRef, Period, StatementType};
use log::debug;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, JsonSchema)]
pub struct StandardizedField {
    pub field: String,
    pub section: Section,

    #[schemars(description = "One entry per period; the sum of every line mapped onto the field")]
    pub values: Vec<Option<f64>>,

    /// Lines summed into the field. Empty for residuals.
    pub sources: Vec<u32>,

    #[schemars(description = "Computed from other totals rather than reported")]
    pub derived: bool,
}

impl StandardizedField {
    pub fn value(&self, period_index: usize) -> Option<f64> {
        self.values.get(period_index).copied().flatten()
    }
}

/// A statement expressed in the standardized chart of accounts.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, JsonSchema)]
pub struct StandardizedStatement {
    pub filing: FilingRef,
    pub vintage: DatasetVintage,
    pub statement: StatementType,
    pub periods: Vec<Period>,
    pub structure: Option<StructuralPattern>,
    pub industry: IndustryClass,
    pub anchors: AnchorSet,
    pub mappings: Vec<FieldMapping>,
    pub fields: Vec<StandardizedField>,
    pub diagnostics: Vec<Diagnostic>,
}

impl StandardizedStatement {
    pub fn field(&self, name: &str) -> Option<&StandardizedField> {
        self.fields.iter().find(|f| f.field == name)
    }

    pub fn value(&self, name: &str, period_index: usize) -> Option<f64> {
        self.field(name).and_then(|f| f.value(period_index))
    }

    pub fn missing_anchors(&self) -> Vec<&'static str> {
        self.anchors.missing.iter().map(Anchor::name).collect()
    }

    pub fn verify_accounting_identity(&self, tolerance: &Tolerance) -> Result<()> {
        verify_accounting_identity(&self.fields, &self.periods, tolerance)
    }

    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

pub struct StatementBalancer<'a> {
    forest: &'a StatementForest,
    periods: &'a [Period],
    tolerance: Tolerance,
}

impl<'a> StatementBalancer<'a> {
    pub fn new(forest: &'a StatementForest, periods: &'a [Period], tolerance: Tolerance) -> Self {
        Self {
            forest,
            periods,
            tolerance,
        }
    }

    /// Sums the values of every mapped line per field. Headers and lines
    /// rolled up into another mapped line are skipped so nothing is
    /// counted twice.
    pub fn aggregate(
        &self,
        statement: StatementType,
        mappings: &[FieldMapping],
    ) -> Vec<StandardizedField> {
        let chart = ChartOfAccounts::for_statement(statement);
        let mut by_field: BTreeMap<String, StandardizedField> = BTreeMap::new();

        for mapping in mappings {
            if mapping.rolled_up_into.is_some() {
                continue;
            }
            let Some(name) = mapping.target.field_name() else {
                continue;
            };
            let Some(node) = self.forest.node(mapping.line) else {
                continue;
            };

            let entry = by_field
                .entry(name.to_string())
                .or_insert_with(|| StandardizedField {
                    field: name.to_string(),
                    section: chart.section_of(name).unwrap_or(mapping.section),
                    values: vec![None; self.periods.len()],
                    sources: Vec::new(),
                    derived: false,
                });
            entry.sources.push(mapping.line);
            for (i, slot) in entry.values.iter_mut().enumerate() {
                if let Some(value) = node.value(i) {
                    *slot = Some(slot.unwrap_or(0.0) + value);
                }
            }
        }

        let mut fields: Vec<StandardizedField> = by_field.into_values().collect();
        sort_fields(&chart, &mut fields);
        fields
    }

    /// Fills balance sheet totals the filer did not present:
    ///
    /// - total liabilities = total assets - total equity
    /// - total non-current assets = total assets - total current assets
    /// - total non-current liabilities = total liabilities - total current liabilities
    ///
    /// A presented total keeps its reported periods; only its gaps are filled.
    pub fn derive_residuals(&self, statement: StatementType, fields: &mut Vec<StandardizedField>) {
        if statement != StatementType::BalanceSheet {
            return;
        }

        let residuals: [(&str, &[&str], &[&str]); 3] = [
            (
                "total_liabilities",
                &["total_assets", "total_liabilities_and_total_equity"],
                &["total_equity", "total_stockholders_equity"],
            ),
            (
                "total_non_current_assets",
                &["total_assets"],
                &["total_current_assets"],
            ),
            (
                "total_non_current_liabilities",
                &["total_liabilities"],
                &["total_current_liabilities"],
            ),
        ];

        let chart = ChartOfAccounts::for_statement(statement);
        for (name, minuends, subtrahends) in residuals {
            let Some(values) = residual_values(fields, minuends, subtrahends) else {
                continue;
            };

            match fields.iter_mut().find(|f| f.field == name) {
                Some(existing) => {
                    let mut filled = 0;
                    for (slot, value) in existing.values.iter_mut().zip(&values) {
                        if slot.is_none() && value.is_some() {
                            *slot = *value;
                            filled += 1;
                        }
                    }
                    if filled > 0 {
                        debug!("Filled {} period(s) of {} as a residual", filled, name);
                        existing.derived = true;
                    }
                }
                None => {
                    debug!("Derived {} as a residual", name);
                    fields.push(StandardizedField {
                        field: name.to_string(),
                        section: chart
                            .section_of(name)
                            .unwrap_or(Section::NonCurrentLiabilities),
                        values,
                        sources: Vec::new(),
                        derived: true,
                    });
                }
            }
        }
        sort_fields(&chart, fields);
    }

    /// Sets each balance sheet `other_*` bucket to its section total minus
    /// the named fields of the section, wherever the bucket's own lines do
    /// not already close the gap. Treasury stock counts against equity.
    /// Non-controlling interests leave the equity sum when `total_equity`
    /// carries them.
    pub fn derive_plugs(&self, statement: StatementType, fields: &mut Vec<StandardizedField>) {
        if statement != StatementType::BalanceSheet {
            return;
        }

        let chart = ChartOfAccounts::for_statement(statement);
        let has_total_equity = fields.iter().any(|f| f.field == "total_equity");
        let sections = [
            (Section::CurrentAssets, Anchor::TotalCurrentAssets),
            (Section::NonCurrentAssets, Anchor::TotalNonCurrentAssets),
            (Section::CurrentLiabilities, Anchor::TotalCurrentLiabilities),
            (Section::NonCurrentLiabilities, Anchor::TotalNonCurrentLiabilities),
            (Section::StockholdersEquity, Anchor::TotalStockholdersEquity),
        ];

        for (section, anchor) in sections {
            let Some(total) = fields.iter().find(|f| f.field == anchor.name()) else {
                continue;
            };
            let bucket = section.bucket();

            let items: Vec<(&StandardizedField, f64)> = fields
                .iter()
                .filter(|f| f.section == section && f.field != bucket)
                .filter(|f| {
                    !matches!(
                        chart.get(&f.field).map(|entry| entry.kind),
                        Some(FieldKind::Anchor) | Some(FieldKind::Bucket)
                    )
                })
                .filter(|f| match f.field.as_str() {
                    "total_equity" => false,
                    "minority_interest" | "redeemable_non_controlling_interests" => {
                        !has_total_equity
                    }
                    _ => true,
                })
                .map(|f| {
                    let sign = if f.field == "treasury_stock" { -1.0 } else { 1.0 };
                    (f, sign)
                })
                .collect();

            let plugs: Vec<Option<f64>> = (0..self.periods.len())
                .map(|i| {
                    let total = total.value(i)?;
                    let named: f64 = items
                        .iter()
                        .filter_map(|(f, sign)| f.value(i).map(|v| v * sign))
                        .sum();
                    Some(total - named)
                })
                .collect();

            let existing = fields.iter().position(|f| f.field == bucket);
            let mut replaced = false;
            let mut values = match existing {
                Some(at) => fields[at].values.clone(),
                None => vec![None; self.periods.len()],
            };
            for (slot, plug) in values.iter_mut().zip(&plugs) {
                let Some(plug) = *plug else {
                    continue;
                };
                if self.tolerance.within(slot.unwrap_or(0.0), plug) {
                    continue;
                }
                *slot = if plug.abs() > self.tolerance.absolute {
                    Some(plug)
                } else {
                    None
                };
                replaced = true;
            }
            if !replaced {
                continue;
            }

            debug!("Plugged {} against {}", bucket, total.field);
            match existing {
                Some(at) => {
                    fields[at].values = values;
                    fields[at].derived = true;
                }
                None => fields.push(StandardizedField {
                    field: bucket,
                    section,
                    values,
                    sources: Vec::new(),
                    derived: true,
                }),
            }
        }
        sort_fields(&chart, fields);
    }

    pub fn verify_accounting_identity(&self, fields: &[StandardizedField]) -> Result<()> {
        verify_accounting_identity(fields, self.periods, &self.tolerance)
    }

    pub fn validate_rollups(&self) -> Vec<Diagnostic> {
        validate_rollups(self.forest, self.periods, &self.tolerance)
    }
}

fn sort_fields(chart: &ChartOfAccounts, fields: &mut [StandardizedField]) {
    fields.sort_by(|a, b| {
        let pa = chart.position(&a.field).unwrap_or(usize::MAX);
        let pb = chart.position(&b.field).unwrap_or(usize::MAX);
        pa.cmp(&pb).then_with(|| a.field.cmp(&b.field))
    });
}

/// Per-period difference of the first present minuend and subtrahend.
/// `None` when either is absent or no period resolves.
fn residual_values(
    fields: &[StandardizedField],
    minuends: &[&str],
    subtrahends: &[&str],
) -> Option<Vec<Option<f64>>> {
    let find = |names: &[&str]| {
        names
            .iter()
            .find_map(|n| fields.iter().find(|f| f.field == *n))
    };
    let minuend = find(minuends)?;
    let subtrahend = find(subtrahends)?;

    let values: Vec<Option<f64>> = minuend
        .values
        .iter()
        .zip(&subtrahend.values)
        .map(|(a, b)| Some((*a)? - (*b)?))
        .collect();
    if values.iter().all(Option::is_none) {
        return None;
    }
    Some(values)
}

/// Total assets against total liabilities and equity, period by period.
/// Periods where either side is missing are skipped.
pub fn verify_accounting_identity(
    fields: &[StandardizedField],
    periods: &[Period],
    tolerance: &Tolerance,
) -> Result<()> {
    let side = |name: &str| fields.iter().find(|f| f.field == name);
    let (Some(assets), Some(liabilities_and_equity)) =
        (side("total_assets"), side("total_liabilities_and_total_equity"))
    else {
        return Ok(());
    };

    for (i, period) in periods.iter().enumerate() {
        let (Some(a), Some(le)) = (assets.value(i), liabilities_and_equity.value(i)) else {
            continue;
        };
        if !tolerance.within(a, le) {
            return Err(ReconstructionError::AccountingIdentityViolation {
                date: period.end_date.to_string(),
                assets: a,
                liabilities_and_equity: le,
                difference: a - le,
            });
        }
    }

    Ok(())
}

/// Reported sums against the weighted sum of their presented children.
/// Computed values and sums with any unresolved child are not checked.
pub fn validate_rollups(
    forest: &StatementForest,
    periods: &[Period],
    tolerance: &Tolerance,
) -> Vec<Diagnostic> {
    let mut diagnostics = Vec::new();

    for node in forest.nodes.iter().filter(|n| n.is_sum) {
        if node.calc_children.is_empty() {
            continue;
        }
        for (i, period) in periods.iter().enumerate() {
            let reported = match node.values.get(i) {
                Some(Some(v)) if v.origin == ValueOrigin::Reported => v.value,
                _ => continue,
            };
            let computed: Option<f64> = node
                .calc_children
                .iter()
                .map(|child| {
                    child
                        .line
                        .and_then(|line| forest.node(line))
                        .and_then(|n| n.value(i))
                        .map(|v| v * child.weight)
                })
                .sum();
            let Some(computed) = computed else {
                continue;
            };

            if !tolerance.within(reported, computed) {
                diagnostics.push(Diagnostic::RollupMismatch {
                    line: node.line,
                    tag: node.tag.clone(),
                    period: period.label.clone(),
                    reported,
                    computed,
                    difference: reported - computed,
                });
            }
        }
    }

    diagnostics
}
