//! Control items: the canonical totals that anchor a statement.
//!
//! A balance sheet falls into one of three shapes, computed once per filing
//! and threaded through anchor detection and field mapping:
//!
//! - **A** `NetAssets`: a net-assets aggregator (investment funds) whose
//!   children are the asset and liability totals.
//! - **B** `LiabilitiesAndEquity`: a liabilities-and-equity total ties back
//!   to total assets.
//! - **C** `IndependentRoots`: asset and liability/equity trees with no
//!   connecting total.
//!
//! Anchors resolve by canonical tag first and by label expression second.
//! Missing anchors are reported, never raised.

use crate::chart_of_accounts::Section;
use crate::diagnostics::Diagnostic;
use crate::hierarchy::{BalanceRole, LineItemNode, StatementForest};
use crate::pattern::{EvalContext, Pattern};
use crate::schema::StatementType;
use crate::utils::normalize_label;
use log::{debug, warn};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

const LIABILITIES_AND_EQUITY_TAGS: &[&str] =
    &["LiabilitiesAndStockholdersEquity", "LiabilitiesAndPartnersCapital"];
const NET_ASSETS_TAGS: &[&str] = &["AssetsNet"];

/// Tags one line may legitimately carry for two anchors at once.
const SHARED_TAGS: &[&str] = &["EarningsPerShareBasicAndDiluted"];

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum StructuralPattern {
    #[schemars(description = "A: a net-assets aggregator over assets and liabilities")]
    NetAssets,

    #[schemars(description = "B: a liabilities-and-equity total ties back to total assets")]
    LiabilitiesAndEquity,

    #[schemars(description = "C: independent asset and liability/equity roots")]
    IndependentRoots,
}

impl StructuralPattern {
    pub fn code(&self) -> &'static str {
        match self {
            StructuralPattern::NetAssets => "A",
            StructuralPattern::LiabilitiesAndEquity => "B",
            StructuralPattern::IndependentRoots => "C",
        }
    }

    /// Balance sheets only; every other statement yields `None`.
    pub fn detect(statement: StatementType, forest: &StatementForest) -> Option<Self> {
        if statement != StatementType::BalanceSheet || forest.is_empty() {
            return None;
        }

        let pattern = if tagged_line(forest, LIABILITIES_AND_EQUITY_TAGS).is_some() {
            StructuralPattern::LiabilitiesAndEquity
        } else if net_assets_line(forest).is_some() {
            StructuralPattern::NetAssets
        } else if liabilities_and_equity_line(forest).is_some() {
            StructuralPattern::LiabilitiesAndEquity
        } else {
            StructuralPattern::IndependentRoots
        };
        Some(pattern)
    }
}

fn tagged_line(forest: &StatementForest, tags: &[&str]) -> Option<u32> {
    forest
        .nodes
        .iter()
        .find(|n| !n.is_abstract && tags.contains(&n.tag.as_str()))
        .map(|n| n.line)
}

/// The net-assets aggregator of a fund balance sheet.
pub fn net_assets_line(forest: &StatementForest) -> Option<u32> {
    tagged_line(forest, NET_ASSETS_TAGS).or_else(|| {
        forest
            .nodes
            .iter()
            .find(|n| {
                let label = normalize_label(&n.label);
                !n.is_abstract
                    && n.is_sum
                    && label.contains("net assets")
                    && !label.contains("liabilit")
                    && !label.contains("per share")
            })
            .map(|n| n.line)
    })
}

/// The liabilities-and-equity total, by tag or by label.
pub fn liabilities_and_equity_line(forest: &StatementForest) -> Option<u32> {
    tagged_line(forest, LIABILITIES_AND_EQUITY_TAGS).or_else(|| {
        forest
            .nodes
            .iter()
            .find(|n| {
                let label = normalize_label(&n.label);
                !n.is_abstract
                    && (n.is_sum || label.contains("total"))
                    && label.contains("liabilit")
                    && ["equity", "stockholder", "shareholder", "capital", "deficit"]
                        .iter()
                        .any(|w| label.contains(w))
            })
            .map(|n| n.line)
    })
}

#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash, JsonSchema,
)]
#[serde(rename_all = "snake_case")]
pub enum Anchor {
    TotalCurrentAssets,
    TotalNonCurrentAssets,
    TotalAssets,
    TotalCurrentLiabilities,
    TotalNonCurrentLiabilities,
    TotalLiabilities,
    TotalStockholdersEquity,
    TotalLiabilitiesAndTotalEquity,
    Revenue,
    OperatingIncome,
    IncomeTaxExpense,
    NetIncome,
    Eps,
    EpsDiluted,
    WeightedAverageSharesOutstanding,
    WeightedAverageSharesOutstandingDiluted,
    NetCashProvidedByOperatingActivities,
    NetCashProvidedByInvestingActivities,
    NetCashProvidedByFinancingActivities,
    CashAtBeginningOfPeriod,
    CashAtEndOfPeriod,
}

impl Anchor {
    /// Anchors of a statement in resolution order.
    pub fn for_statement(statement: StatementType) -> &'static [Anchor] {
        match statement {
            StatementType::BalanceSheet => &[
                Anchor::TotalCurrentAssets,
                Anchor::TotalNonCurrentAssets,
                Anchor::TotalAssets,
                Anchor::TotalCurrentLiabilities,
                Anchor::TotalNonCurrentLiabilities,
                Anchor::TotalLiabilities,
                Anchor::TotalStockholdersEquity,
                Anchor::TotalLiabilitiesAndTotalEquity,
            ],
            StatementType::IncomeStatement => &[
                Anchor::Revenue,
                Anchor::OperatingIncome,
                Anchor::IncomeTaxExpense,
                Anchor::NetIncome,
                Anchor::Eps,
                Anchor::EpsDiluted,
                Anchor::WeightedAverageSharesOutstanding,
                Anchor::WeightedAverageSharesOutstandingDiluted,
            ],
            StatementType::CashFlow => &[
                Anchor::NetIncome,
                Anchor::NetCashProvidedByOperatingActivities,
                Anchor::NetCashProvidedByInvestingActivities,
                Anchor::NetCashProvidedByFinancingActivities,
                Anchor::CashAtBeginningOfPeriod,
                Anchor::CashAtEndOfPeriod,
            ],
            StatementType::Equity | StatementType::ComprehensiveIncome => &[],
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Anchor::TotalCurrentAssets => "total_current_assets",
            Anchor::TotalNonCurrentAssets => "total_non_current_assets",
            Anchor::TotalAssets => "total_assets",
            Anchor::TotalCurrentLiabilities => "total_current_liabilities",
            Anchor::TotalNonCurrentLiabilities => "total_non_current_liabilities",
            Anchor::TotalLiabilities => "total_liabilities",
            Anchor::TotalStockholdersEquity => "total_stockholders_equity",
            Anchor::TotalLiabilitiesAndTotalEquity => "total_liabilities_and_total_equity",
            Anchor::Revenue => "revenue",
            Anchor::OperatingIncome => "operating_income",
            Anchor::IncomeTaxExpense => "income_tax_expense",
            Anchor::NetIncome => "net_income",
            Anchor::Eps => "eps",
            Anchor::EpsDiluted => "eps_diluted",
            Anchor::WeightedAverageSharesOutstanding => "weighted_average_shares_outstanding",
            Anchor::WeightedAverageSharesOutstandingDiluted => {
                "weighted_average_shares_outstanding_diluted"
            }
            Anchor::NetCashProvidedByOperatingActivities => {
                "net_cash_provided_by_operating_activities"
            }
            Anchor::NetCashProvidedByInvestingActivities => {
                "net_cash_provided_by_investing_activities"
            }
            Anchor::NetCashProvidedByFinancingActivities => {
                "net_cash_provided_by_financing_activities"
            }
            Anchor::CashAtBeginningOfPeriod => "cash_at_beginning_of_period",
            Anchor::CashAtEndOfPeriod => "cash_at_end_of_period",
        }
    }

    /// Section the anchor closes. Net income closes the non-operating block
    /// of an income statement and opens the operating block of a cash flow.
    pub fn section(&self, statement: StatementType) -> Section {
        match self {
            Anchor::TotalCurrentAssets => Section::CurrentAssets,
            Anchor::TotalNonCurrentAssets | Anchor::TotalAssets => Section::NonCurrentAssets,
            Anchor::TotalCurrentLiabilities => Section::CurrentLiabilities,
            Anchor::TotalNonCurrentLiabilities | Anchor::TotalLiabilities => {
                Section::NonCurrentLiabilities
            }
            Anchor::TotalStockholdersEquity | Anchor::TotalLiabilitiesAndTotalEquity => {
                Section::StockholdersEquity
            }
            Anchor::Revenue | Anchor::OperatingIncome => Section::OperatingItems,
            Anchor::IncomeTaxExpense => Section::NonOperatingItems,
            Anchor::NetIncome => match statement {
                StatementType::CashFlow => Section::OperatingActivities,
                _ => Section::NonOperatingItems,
            },
            Anchor::Eps
            | Anchor::EpsDiluted
            | Anchor::WeightedAverageSharesOutstanding
            | Anchor::WeightedAverageSharesOutstandingDiluted => Section::PerShareItems,
            Anchor::NetCashProvidedByOperatingActivities => Section::OperatingActivities,
            Anchor::NetCashProvidedByInvestingActivities => Section::InvestingActivities,
            Anchor::NetCashProvidedByFinancingActivities => Section::FinancingActivities,
            Anchor::CashAtBeginningOfPeriod | Anchor::CashAtEndOfPeriod => Section::Supplemental,
        }
    }

    fn rule(&self, statement: StatementType) -> AnchorRule {
        let (tags, pattern, role): (&'static [&'static str], &'static str, Option<BalanceRole>) =
            match self {
                Anchor::TotalCurrentAssets => (
                    &["AssetsCurrent"],
                    "[contains 'total current assets'] or [contains 'current assets'] not [contains 'other' or 'non current' or 'noncurrent']",
                    None,
                ),
                Anchor::TotalNonCurrentAssets => (
                    &["NoncurrentAssets", "AssetsNoncurrent"],
                    "[contains 'total'] and [contains 'non current assets' or 'noncurrent assets' or 'long term assets']",
                    None,
                ),
                Anchor::TotalAssets => (
                    &["Assets"],
                    "[equals to 'total assets' or 'assets total' or 'assets']",
                    None,
                ),
                Anchor::TotalCurrentLiabilities => (
                    &["LiabilitiesCurrent"],
                    "[contains 'total current liabilities'] or [contains 'current liabilities'] not [contains 'other' or 'non current' or 'noncurrent']",
                    None,
                ),
                Anchor::TotalNonCurrentLiabilities => (
                    &["LiabilitiesNoncurrent"],
                    "[contains 'total'] and [contains 'non current liabilit' or 'noncurrent liabilit' or 'long term liabilit']",
                    None,
                ),
                Anchor::TotalLiabilities => (
                    &["Liabilities"],
                    "[equals to 'total liabilities' or 'liabilities total' or 'liabilities']",
                    None,
                ),
                Anchor::TotalStockholdersEquity => (
                    &["StockholdersEquity", "PartnersCapital", "MembersEquity"],
                    "[contains 'total' and contains 'equity'] not [contains 'other' or 'liabilit' or equals to 'total equity'] or [contains 'total stockholders' or 'total shareholders'] not [contains 'liabilit']",
                    None,
                ),
                Anchor::TotalLiabilitiesAndTotalEquity => (
                    LIABILITIES_AND_EQUITY_TAGS,
                    "[contains 'liabilit'] and [contains 'equity' or 'stockholder' or 'shareholder' or 'capital' or 'deficit']",
                    None,
                ),
                Anchor::Revenue => (
                    &[
                        "Revenues",
                        "RevenueFromContractWithCustomerExcludingAssessedTax",
                        "SalesRevenueNet",
                        "RevenueFromContractWithCustomerIncludingAssessedTax",
                    ],
                    "[contains 'revenue' or 'sales'] not [contains 'marketing' or 'admini' or 'general' or 'cost' or 'deferred' or 'unearned']",
                    None,
                ),
                Anchor::OperatingIncome => (
                    &["OperatingIncomeLoss"],
                    "[contains 'operating' or 'operation'] and [contains 'income' or 'loss' or 'profit' or 'earnings'] not [contains 'before' or 'per share' or 'other' or 'non operating' or 'nonoperating' or 'discontinued']",
                    None,
                ),
                Anchor::IncomeTaxExpense => (
                    &["IncomeTaxExpenseBenefit"],
                    "[contains 'tax'] and [contains 'provision' or 'benefit' or 'expense'] not [contains 'before' or 'deferred' or 'net of tax']",
                    None,
                ),
                Anchor::NetIncome => match statement {
                    StatementType::CashFlow => (
                        &[
                            "NetIncomeLoss",
                            "ProfitLoss",
                            "NetIncomeLossAvailableToCommonStockholdersBasic",
                        ],
                        "[contains 'net income' or 'net earnings' or 'net loss' or 'net profit'] not [contains 'per share' or 'noncontrolling' or 'non controlling']",
                        None,
                    ),
                    _ => (
                        &["NetIncomeLoss", "ProfitLoss"],
                        "[contains 'net income' or 'net loss' or 'net earnings' or 'net profit'] not [contains 'other' or 'continuing' or 'operating' or 'operation' or 'per share' or 'noncontrolling' or 'non controlling']",
                        None,
                    ),
                },
                Anchor::Eps => (
                    &["EarningsPerShareBasic", "EarningsPerShareBasicAndDiluted"],
                    "min{[contains 'basic'] and [datatype = perShare]}",
                    None,
                ),
                Anchor::EpsDiluted => (
                    &["EarningsPerShareDiluted", "EarningsPerShareBasicAndDiluted"],
                    "min{[contains 'diluted'] and [datatype = perShare]}",
                    None,
                ),
                Anchor::WeightedAverageSharesOutstanding => (
                    &["WeightedAverageNumberOfSharesOutstandingBasic"],
                    "[contains 'basic'] and [datatype = shares]",
                    None,
                ),
                Anchor::WeightedAverageSharesOutstandingDiluted => (
                    &["WeightedAverageNumberOfDilutedSharesOutstanding"],
                    "[contains 'diluted'] and [datatype = shares]",
                    None,
                ),
                Anchor::NetCashProvidedByOperatingActivities => (
                    &[
                        "NetCashProvidedByUsedInOperatingActivities",
                        "NetCashProvidedByUsedInOperatingActivitiesContinuingOperations",
                    ],
                    "[contains 'cash' and (contains 'operating' or 'operations')] not [contains 'other' or 'adjustments' or 'reconcile'] or [contains 'total operating']",
                    None,
                ),
                Anchor::NetCashProvidedByInvestingActivities => (
                    &[
                        "NetCashProvidedByUsedInInvestingActivities",
                        "NetCashProvidedByUsedInInvestingActivitiesContinuingOperations",
                    ],
                    "[contains 'cash' and contains 'investing'] not [contains 'other'] or [contains 'total investing']",
                    None,
                ),
                Anchor::NetCashProvidedByFinancingActivities => (
                    &[
                        "NetCashProvidedByUsedInFinancingActivities",
                        "NetCashProvidedByUsedInFinancingActivitiesContinuingOperations",
                    ],
                    "[contains 'cash' and contains 'financing'] not [contains 'other'] or [contains 'total financing']",
                    None,
                ),
                Anchor::CashAtBeginningOfPeriod => (
                    CASH_BALANCE_TAGS,
                    "[contains 'beginning' or 'begin' or 'start of' or 'opening'] not [contains 'end of']",
                    Some(BalanceRole::Beginning),
                ),
                Anchor::CashAtEndOfPeriod => (
                    CASH_BALANCE_TAGS,
                    "[contains 'end of' or 'ending' or 'close of' or 'closing'] not [contains 'beginning']",
                    Some(BalanceRole::Ending),
                ),
            };
        AnchorRule {
            anchor: *self,
            tags,
            pattern,
            role,
        }
    }
}

const CASH_BALANCE_TAGS: &[&str] = &[
    "CashCashEquivalentsRestrictedCashAndRestrictedCashEquivalents",
    "CashAndCashEquivalentsAtCarryingValue",
    "Cash",
];

struct AnchorRule {
    anchor: Anchor,
    tags: &'static [&'static str],
    pattern: &'static str,

    /// Balance lines of the opposite role are never candidates.
    role: Option<BalanceRole>,
}

impl AnchorRule {
    fn admits(&self, node: &LineItemNode) -> bool {
        if node.is_abstract {
            return false;
        }
        match (self.role, node.balance_role) {
            (Some(wanted), Some(actual)) => wanted == actual,
            _ => true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, JsonSchema)]
pub struct ResolvedAnchor {
    pub anchor: Anchor,
    pub line: u32,
    pub tag: String,
    pub label: String,

    #[schemars(description = "True when the canonical tag identified the line, false for a label match")]
    pub by_tag: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, JsonSchema)]
pub struct AnchorSet {
    pub pattern: Option<StructuralPattern>,
    pub resolved: Vec<ResolvedAnchor>,
    pub missing: Vec<Anchor>,
}

impl AnchorSet {
    pub fn empty() -> Self {
        Self {
            pattern: None,
            resolved: Vec::new(),
            missing: Vec::new(),
        }
    }

    pub fn get(&self, anchor: Anchor) -> Option<&ResolvedAnchor> {
        self.resolved.iter().find(|r| r.anchor == anchor)
    }

    pub fn line(&self, anchor: Anchor) -> Option<u32> {
        self.get(anchor).map(|r| r.line)
    }

    /// Anchor on `line`, if any.
    pub fn at_line(&self, line: u32) -> Option<&ResolvedAnchor> {
        self.resolved.iter().find(|r| r.line == line)
    }

    pub fn is_missing(&self, anchor: Anchor) -> bool {
        self.missing.contains(&anchor)
    }

    /// Anchor name to line position, the reference targets of `position_*`
    /// predicates.
    pub fn targets(&self) -> BTreeMap<String, u32> {
        self.resolved
            .iter()
            .map(|r| (r.anchor.name().to_string(), r.line))
            .collect()
    }

    pub fn diagnostics(&self) -> Vec<Diagnostic> {
        self.missing
            .iter()
            .map(|anchor| Diagnostic::UnresolvedAnchor {
                anchor: anchor.name().to_string(),
            })
            .collect()
    }
}

/// Locates the anchors of one statement.
pub fn detect_anchors(statement: StatementType, forest: &StatementForest) -> AnchorSet {
    let pattern = StructuralPattern::detect(statement, forest);
    let aggregator = match pattern {
        Some(StructuralPattern::NetAssets) => net_assets_line(forest),
        Some(StructuralPattern::LiabilitiesAndEquity) => liabilities_and_equity_line(forest),
        _ => None,
    };

    let mut set = AnchorSet {
        pattern,
        resolved: Vec::new(),
        missing: Vec::new(),
    };
    let mut claimed: BTreeSet<u32> = BTreeSet::new();

    for anchor in Anchor::for_statement(statement) {
        let found = match (anchor, pattern, aggregator) {
            // a fund's equity is its net assets
            (Anchor::TotalStockholdersEquity, Some(StructuralPattern::NetAssets), Some(line))
                if !claimed.contains(&line) =>
            {
                forest.node(line).map(|node| (node, true))
            }
            _ => resolve(&anchor.rule(statement), forest, pattern, aggregator, &claimed),
        };

        match found {
            Some((node, by_tag)) => {
                if !SHARED_TAGS.contains(&node.tag.as_str()) {
                    claimed.insert(node.line);
                }
                set.resolved.push(ResolvedAnchor {
                    anchor: *anchor,
                    line: node.line,
                    tag: node.tag.clone(),
                    label: node.label.clone(),
                    by_tag,
                });
            }
            None => set.missing.push(*anchor),
        }
    }

    debug!(
        "{} anchors: {} resolved, {} missing, pattern {:?}",
        statement,
        set.resolved.len(),
        set.missing.len(),
        set.pattern.map(|p| p.code())
    );
    set
}

fn resolve<'f>(
    rule: &AnchorRule,
    forest: &'f StatementForest,
    pattern: Option<StructuralPattern>,
    aggregator: Option<u32>,
    claimed: &BTreeSet<u32>,
) -> Option<(&'f LineItemNode, bool)> {
    let open = |node: &&LineItemNode| {
        rule.admits(node)
            && (!claimed.contains(&node.line) || SHARED_TAGS.contains(&node.tag.as_str()))
    };

    let by_tag: Vec<&LineItemNode> = forest
        .nodes
        .iter()
        .filter(open)
        .filter(|n| rule.tags.contains(&n.tag.as_str()))
        .collect();
    if !by_tag.is_empty() {
        return pick(rule.anchor, forest, by_tag, pattern, aggregator, false).map(|n| (n, true));
    }

    let compiled = match Pattern::parse(rule.pattern) {
        Ok(compiled) => compiled,
        Err(e) => {
            warn!("anchor {} pattern failed to parse: {}", rule.anchor.name(), e);
            return None;
        }
    };
    let by_label: Vec<&LineItemNode> = forest
        .nodes
        .iter()
        .filter(open)
        .filter(|n| {
            let ctx = EvalContext::new()
                .with_line(n.line)
                .with_datatype(n.datatype.as_deref());
            compiled.evaluate(&n.label, &ctx).matched
        })
        .collect();
    pick(
        rule.anchor,
        forest,
        by_label,
        pattern,
        aggregator,
        compiled.select_min(),
    )
    .map(|n| (n, false))
}

/// `aggregator` is the net-assets line under pattern A and the
/// liabilities-and-equity line under pattern B.
fn pick<'f>(
    anchor: Anchor,
    forest: &StatementForest,
    mut candidates: Vec<&'f LineItemNode>,
    pattern: Option<StructuralPattern>,
    aggregator: Option<u32>,
    select_min: bool,
) -> Option<&'f LineItemNode> {
    let structural = matches!(
        anchor,
        Anchor::TotalAssets | Anchor::TotalLiabilities | Anchor::TotalStockholdersEquity
    );

    if structural {
        let under = |line: u32| {
            candidates
                .iter()
                .copied()
                .filter(|n| forest.ancestors(n.line).contains(&line))
                .collect::<Vec<_>>()
        };
        let preferred: Vec<&LineItemNode> = match (pattern, aggregator) {
            (Some(StructuralPattern::NetAssets), Some(line)) => under(line),
            (Some(StructuralPattern::LiabilitiesAndEquity), Some(line))
                if anchor != Anchor::TotalAssets =>
            {
                under(line)
            }
            (Some(StructuralPattern::IndependentRoots), _) => candidates
                .iter()
                .copied()
                .filter(|n| n.parent_line.is_none())
                .collect(),
            _ => Vec::new(),
        };
        if !preferred.is_empty() {
            candidates = preferred;
        }
    }

    if select_min {
        return candidates.into_iter().min_by_key(|n| n.line);
    }
    candidates
        .into_iter()
        .min_by_key(|n| (forest.depth(n.line), n.line))
}
