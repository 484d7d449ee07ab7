//! Field mapping: every line of a reconstructed statement onto a
//! standardized field, an anchor, a generic bucket, or a header skip.
//!
//! Resolution order per line:
//!
//! 1. the line is an anchor
//! 2. abstract or valueless lines are headers
//! 3. tag identity hints
//! 4. caller supplied rules from configuration
//! 5. opening and closing balances of an equity statement
//! 6. the industry strategy's ordered rule table, scoped by section
//! 7. the section's `other_*` bucket

pub mod depository;
pub mod rules;

pub use rules::{general_rules, tag_hint, FieldRule};

use crate::chart_of_accounts::Section;
use crate::config::{CustomRule, ReconstructionConfig};
use crate::control::{Anchor, AnchorSet, StructuralPattern};
use crate::diagnostics::Diagnostic;
use crate::hierarchy::{BalanceRole, LineItemNode, StatementForest};
use crate::pattern::{EvalContext, Pattern};
use crate::schema::{FilingMetadata, StatementType};
use crate::utils::normalize_label;
use log::{debug, warn};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::Debug;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum IndustryClass {
    General,

    #[schemars(description = "Banks and bank holding companies")]
    Depository,
}

impl IndustryClass {
    /// SIC 6000-6099 (depository institutions) and 6712 (bank holding
    /// companies) select the depository tables.
    pub fn from_sic(sic: Option<u16>) -> Self {
        match sic {
            Some(6000..=6099) | Some(6712) => IndustryClass::Depository,
            _ => IndustryClass::General,
        }
    }

    pub fn select(metadata: Option<&FilingMetadata>, overridden: Option<IndustryClass>) -> Self {
        overridden.unwrap_or_else(|| Self::from_sic(metadata.and_then(|m| m.sic)))
    }

    pub fn strategy(&self) -> Box<dyn MappingStrategy> {
        match self {
            IndustryClass::General => Box::new(GeneralStrategy),
            IndustryClass::Depository => Box::new(DepositoryStrategy),
        }
    }
}

/// Ordered rule tables of one class of filer.
pub trait MappingStrategy: Send + Sync + Debug {
    fn industry(&self) -> IndustryClass;

    /// Rules in priority order; the first applicable match wins.
    fn rules(&self, statement: StatementType) -> Vec<&'static FieldRule>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct GeneralStrategy;

impl MappingStrategy for GeneralStrategy {
    fn industry(&self) -> IndustryClass {
        IndustryClass::General
    }

    fn rules(&self, statement: StatementType) -> Vec<&'static FieldRule> {
        general_rules(statement).iter().collect()
    }
}

/// Bank tables ahead of the general ones.
#[derive(Debug, Clone, Copy, Default)]
pub struct DepositoryStrategy;

impl MappingStrategy for DepositoryStrategy {
    fn industry(&self) -> IndustryClass {
        IndustryClass::Depository
    }

    fn rules(&self, statement: StatementType) -> Vec<&'static FieldRule> {
        depository::depository_rules(statement)
            .iter()
            .chain(general_rules(statement))
            .collect()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, JsonSchema)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MappingTarget {
    Anchor { name: String },
    Field { name: String },
    Bucket { name: String },

    #[schemars(description = "A section title; carries no value of its own")]
    Header,
}

impl MappingTarget {
    pub fn field_name(&self) -> Option<&str> {
        match self {
            MappingTarget::Anchor { name }
            | MappingTarget::Field { name }
            | MappingTarget::Bucket { name } => Some(name),
            MappingTarget::Header => None,
        }
    }

    pub fn is_header(&self) -> bool {
        matches!(self, MappingTarget::Header)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, JsonSchema)]
pub struct FieldMapping {
    pub line: u32,
    pub tag: String,
    pub label: String,
    pub target: MappingTarget,
    pub section: Section,

    #[schemars(description = "0 to 1; anchors by tag score 1.0, generic buckets 0.3")]
    pub confidence: f64,
    pub notes: String,

    #[schemars(
        description = "Line of the mapped parent this line sums into; such lines are left out of standardized totals"
    )]
    pub rolled_up_into: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, JsonSchema)]
pub struct MappingOutcome {
    pub industry: IndustryClass,
    pub mappings: Vec<FieldMapping>,
    pub diagnostics: Vec<Diagnostic>,
}

impl MappingOutcome {
    pub fn for_line(&self, line: u32) -> Option<&FieldMapping> {
        self.mappings.iter().find(|m| m.line == line)
    }
}

#[derive(Debug)]
struct CompiledRule {
    field: String,
    sections: &'static [Section],
    pattern: Pattern,
}

#[derive(Debug)]
pub struct FieldMapper {
    strategy: Box<dyn MappingStrategy>,
    builtin: BTreeMap<StatementType, Vec<CompiledRule>>,
    custom: BTreeMap<StatementType, Vec<CompiledRule>>,
    parse_failures: Vec<Diagnostic>,
}

impl FieldMapper {
    pub fn new(industry: IndustryClass, custom_rules: &[CustomRule]) -> Self {
        Self::with_strategy(industry.strategy(), custom_rules)
    }

    pub fn from_config(config: &ReconstructionConfig, metadata: Option<&FilingMetadata>) -> Self {
        let industry = IndustryClass::select(metadata, config.industry_override);
        Self::new(industry, &config.custom_rules)
    }

    /// Compiles every rule once. A malformed expression drops only its own
    /// rule and is reported with each mapping.
    pub fn with_strategy(strategy: Box<dyn MappingStrategy>, custom_rules: &[CustomRule]) -> Self {
        let mut parse_failures = Vec::new();
        let mut builtin: BTreeMap<StatementType, Vec<CompiledRule>> = BTreeMap::new();
        let mut custom: BTreeMap<StatementType, Vec<CompiledRule>> = BTreeMap::new();

        for statement in StatementType::ALL {
            for rule in strategy.rules(statement) {
                if let Some(compiled) =
                    compile(rule.field, rule.sections, rule.pattern, &mut parse_failures)
                {
                    builtin.entry(statement).or_default().push(compiled);
                }
            }
        }

        for rule in custom_rules {
            if let Some(compiled) = compile(&rule.field, &[], &rule.pattern, &mut parse_failures) {
                custom.entry(rule.statement).or_default().push(compiled);
            }
        }

        Self {
            strategy,
            builtin,
            custom,
            parse_failures,
        }
    }

    pub fn industry(&self) -> IndustryClass {
        self.strategy.industry()
    }

    pub fn map(
        &self,
        statement: StatementType,
        forest: &StatementForest,
        anchors: &AnchorSet,
    ) -> MappingOutcome {
        let targets = anchors.targets();
        let mut mappings: Vec<FieldMapping> = forest
            .nodes
            .iter()
            .map(|node| {
                let section = classify_section(statement, forest, node, anchors);
                let ctx = EvalContext::new()
                    .with_line(node.line)
                    .with_datatype(node.datatype.as_deref())
                    .with_targets(&targets);
                self.map_node(statement, node, section, anchors, &ctx)
            })
            .collect();

        resolve_duplicate_equity_totals(&mut mappings, anchors);
        mark_rollups(&mut mappings, forest);

        let mut diagnostics = self.parse_failures.clone();
        diagnostics.extend(anchors.diagnostics());

        debug!(
            "Mapped {} lines of {} with {:?} rules, {} buckets",
            mappings.len(),
            statement,
            self.industry(),
            mappings
                .iter()
                .filter(|m| matches!(m.target, MappingTarget::Bucket { .. }))
                .count()
        );

        MappingOutcome {
            industry: self.industry(),
            mappings,
            diagnostics,
        }
    }

    fn map_node(
        &self,
        statement: StatementType,
        node: &LineItemNode,
        section: Section,
        anchors: &AnchorSet,
        ctx: &EvalContext,
    ) -> FieldMapping {
        let mapping = |target: MappingTarget, confidence: f64, notes: String| FieldMapping {
            line: node.line,
            tag: node.tag.clone(),
            label: node.label.clone(),
            target,
            section,
            confidence,
            notes,
            rolled_up_into: None,
        };

        if let Some(resolved) = anchors.at_line(node.line) {
            let (confidence, notes) = if resolved.by_tag {
                (1.0, format!("canonical tag {}", resolved.tag))
            } else {
                (0.9, "anchor label".to_string())
            };
            let name = resolved.anchor.name().to_string();
            let mut anchored = mapping(MappingTarget::Anchor { name }, confidence, notes);
            anchored.section = resolved.anchor.section(statement);
            return anchored;
        }

        if node.is_abstract {
            return mapping(MappingTarget::Header, 1.0, "abstract".to_string());
        }
        if !node.values.is_empty() && !node.has_any_value() {
            return mapping(MappingTarget::Header, 0.6, "no value in any period".to_string());
        }

        if let Some(field) = tag_hint(statement, &node.tag, node.negating) {
            let name = field.to_string();
            return mapping(MappingTarget::Field { name }, 0.95, format!("tag {}", node.tag));
        }

        let custom = self.custom.get(&statement).into_iter().flatten();
        if let Some(rule) = custom.into_iter().find(|r| r.pattern.evaluate(&node.label, ctx).matched) {
            let name = rule.field.clone();
            let notes = format!("custom rule {}", rule.pattern.source());
            return mapping(MappingTarget::Field { name }, 0.95, notes);
        }

        if statement == StatementType::Equity {
            let balance = match node.balance_role {
                Some(BalanceRole::Beginning) => Some("total_equity_beginning_of_period"),
                Some(BalanceRole::Ending) => Some("total_equity_end_of_period"),
                None => None,
            };
            if let Some(field) = balance {
                let name = field.to_string();
                return mapping(MappingTarget::Field { name }, 0.9, "balance line".to_string());
            }
        }

        let builtin = self.builtin.get(&statement).into_iter().flatten();
        let matched = builtin
            .into_iter()
            .filter(|r| r.sections.is_empty() || r.sections.contains(&section))
            .find(|r| r.pattern.evaluate(&node.label, ctx).matched);
        if let Some(rule) = matched {
            let confidence = if rule.sections.is_empty() { 0.7 } else { 0.8 };
            let name = rule.field.clone();
            return mapping(
                MappingTarget::Field { name },
                confidence,
                format!("rule {}", rule.pattern.source()),
            );
        }

        let name = section.bucket();
        mapping(MappingTarget::Bucket { name }, 0.3, "no rule matched".to_string())
    }
}

fn compile(
    field: &str,
    sections: &'static [Section],
    source: &str,
    failures: &mut Vec<Diagnostic>,
) -> Option<CompiledRule> {
    match Pattern::parse(source) {
        Ok(pattern) => Some(CompiledRule {
            field: field.to_string(),
            sections,
            pattern,
        }),
        Err(e) => {
            warn!("Skipping rule for {}: {}", field, e);
            failures.push(Diagnostic::PatternParseError {
                pattern: source.to_string(),
                message: e.to_string(),
            });
            None
        }
    }
}

/// Section of a line: calculation ancestry to an anchor first, then
/// position relative to the anchors, then label keywords.
pub fn classify_section(
    statement: StatementType,
    forest: &StatementForest,
    node: &LineItemNode,
    anchors: &AnchorSet,
) -> Section {
    match statement {
        StatementType::ComprehensiveIncome => return Section::ComprehensiveIncomeItems,
        StatementType::Equity => return Section::EquityChanges,
        _ => {}
    }

    if let Some(resolved) = anchors.at_line(node.line) {
        return resolved.anchor.section(statement);
    }

    if statement == StatementType::IncomeStatement && is_per_share(node) {
        return Section::PerShareItems;
    }

    let enclosing = forest
        .ancestors(node.line)
        .into_iter()
        .filter_map(|line| anchors.at_line(line))
        .find_map(|resolved| container_section(resolved.anchor, anchors.pattern));
    if let Some(section) = enclosing {
        return section;
    }

    let line = node.line;
    let label = normalize_label(&node.label);
    match statement {
        StatementType::BalanceSheet => balance_sheet_section(line, &label, anchors),
        StatementType::IncomeStatement => income_statement_section(line, anchors),
        _ => cash_flow_section(line, anchors),
    }
}

/// Anchors whose calculation children all belong to one section. A fund's
/// net assets stand in for equity but sum assets and liabilities.
fn container_section(anchor: Anchor, pattern: Option<StructuralPattern>) -> Option<Section> {
    match anchor {
        Anchor::TotalStockholdersEquity if pattern == Some(StructuralPattern::NetAssets) => None,
        Anchor::TotalCurrentAssets => Some(Section::CurrentAssets),
        Anchor::TotalNonCurrentAssets => Some(Section::NonCurrentAssets),
        Anchor::TotalCurrentLiabilities => Some(Section::CurrentLiabilities),
        Anchor::TotalNonCurrentLiabilities => Some(Section::NonCurrentLiabilities),
        Anchor::TotalStockholdersEquity => Some(Section::StockholdersEquity),
        Anchor::Revenue | Anchor::OperatingIncome => Some(Section::OperatingItems),
        Anchor::NetCashProvidedByOperatingActivities => Some(Section::OperatingActivities),
        Anchor::NetCashProvidedByInvestingActivities => Some(Section::InvestingActivities),
        Anchor::NetCashProvidedByFinancingActivities => Some(Section::FinancingActivities),
        _ => None,
    }
}

fn is_per_share(node: &LineItemNode) -> bool {
    matches!(node.datatype.as_deref(), Some("perShare") | Some("shares"))
}

const CURRENT_ASSET_WORDS: &[&str] = &[
    "cash",
    "receivable",
    "inventor",
    "prepaid",
    "short term",
    "marketable",
];
const CURRENT_LIABILITY_WORDS: &[&str] = &[
    "payable",
    "accrued",
    "short term",
    "current portion",
    "current maturities",
    "deferred revenue",
];
const EQUITY_WORDS: &[&str] = &[
    "equity",
    "stock",
    "capital",
    "retained",
    "accumulated",
    "deficit",
    "treasury",
    "noncontrolling",
    "non controlling",
    "commitments",
];

fn looks_current(label: &str, words: &[&str]) -> bool {
    if label.contains("non current") || label.contains("noncurrent") || label.contains("long term") {
        return false;
    }
    label.contains("current") || words.iter().any(|w| label.contains(w))
}

fn balance_sheet_section(line: u32, label: &str, anchors: &AnchorSet) -> Section {
    let at = |anchor| anchors.line(anchor);

    let assets_end = at(Anchor::TotalAssets).or(at(Anchor::TotalCurrentAssets));
    if assets_end.map_or(false, |end| line <= end) {
        return match at(Anchor::TotalCurrentAssets) {
            Some(tca) if line <= tca => Section::CurrentAssets,
            Some(_) => Section::NonCurrentAssets,
            None if looks_current(label, CURRENT_ASSET_WORDS) => Section::CurrentAssets,
            None => Section::NonCurrentAssets,
        };
    }

    match at(Anchor::TotalLiabilities).or(at(Anchor::TotalNonCurrentLiabilities)) {
        Some(end) if line > end => return Section::StockholdersEquity,
        Some(_) => {}
        None if EQUITY_WORDS.iter().any(|w| label.contains(w)) => {
            return Section::StockholdersEquity
        }
        None => {}
    }

    match at(Anchor::TotalCurrentLiabilities) {
        Some(tcl) if line <= tcl => Section::CurrentLiabilities,
        Some(_) => Section::NonCurrentLiabilities,
        None if looks_current(label, CURRENT_LIABILITY_WORDS) => Section::CurrentLiabilities,
        None => Section::NonCurrentLiabilities,
    }
}

fn income_statement_section(line: u32, anchors: &AnchorSet) -> Section {
    let operating_end = anchors
        .line(Anchor::OperatingIncome)
        .or(anchors.line(Anchor::IncomeTaxExpense));
    match operating_end {
        Some(end) if line <= end => Section::OperatingItems,
        Some(_) => Section::NonOperatingItems,
        None => Section::OperatingItems,
    }
}

fn cash_flow_section(line: u32, anchors: &AnchorSet) -> Section {
    let boundaries = [
        (
            Anchor::NetCashProvidedByOperatingActivities,
            Section::OperatingActivities,
        ),
        (
            Anchor::NetCashProvidedByInvestingActivities,
            Section::InvestingActivities,
        ),
        (
            Anchor::NetCashProvidedByFinancingActivities,
            Section::FinancingActivities,
        ),
    ];
    boundaries
        .iter()
        .find(|(anchor, _)| anchors.line(*anchor).map_or(false, |end| line <= end))
        .map(|(_, section)| *section)
        .unwrap_or(Section::Supplemental)
}

/// Parent-only and noncontrolling-inclusive equity totals both match the
/// stockholders' equity rule; all but the anchor (or the first) become
/// `total_equity`.
fn resolve_duplicate_equity_totals(mappings: &mut [FieldMapping], anchors: &AnchorSet) {
    let anchored = anchors.get(Anchor::TotalStockholdersEquity).is_some();
    let mut keep_first = !anchored;

    for mapping in mappings.iter_mut() {
        let is_equity_total = matches!(
            &mapping.target,
            MappingTarget::Field { name } if name == "total_stockholders_equity"
        );
        if !is_equity_total {
            continue;
        }
        if keep_first {
            keep_first = false;
            continue;
        }
        mapping.target = MappingTarget::Field {
            name: "total_equity".to_string(),
        };
        mapping.notes.push_str("; later equity total");
    }
}

fn mark_rollups(mappings: &mut [FieldMapping], forest: &StatementForest) {
    let aggregating: BTreeMap<u32, bool> = mappings
        .iter()
        .map(|m| {
            let mapped = matches!(
                m.target,
                MappingTarget::Field { .. } | MappingTarget::Bucket { .. }
            );
            (m.line, mapped)
        })
        .collect();

    for mapping in mappings.iter_mut() {
        if !matches!(
            mapping.target,
            MappingTarget::Field { .. } | MappingTarget::Bucket { .. }
        ) {
            continue;
        }
        let parent = forest.node(mapping.line).and_then(|n| n.parent_line);
        if let Some(parent) = parent {
            if aggregating.get(&parent).copied().unwrap_or(false) {
                mapping.rolled_up_into = Some(parent);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binder::PeriodValue;
    use crate::control::detect_anchors;
    use crate::hierarchy::HierarchyBuilder;
    use crate::schema::{CalcChild, CalcRelationship, PresentationEntry};

    fn forest(
        statement: StatementType,
        rows: &[(&str, &str)],
        calcs: &[(&str, &[&str])],
    ) -> StatementForest {
        let entries: Vec<PresentationEntry> = rows
            .iter()
            .enumerate()
            .map(|(i, (tag, label))| PresentationEntry {
                accession: "0001".to_string(),
                report: 2,
                line: i as u32 + 1,
                statement,
                indent: 0,
                tag: tag.to_string(),
                version: "us-gaap/2024".to_string(),
                label: label.to_string(),
                negating: false,
            })
            .collect();
        let relationships: Vec<CalcRelationship> = calcs
            .iter()
            .map(|(parent, children)| CalcRelationship {
                parent: parent.to_string(),
                children: children
                    .iter()
                    .map(|c| CalcChild {
                        tag: c.to_string(),
                        weight: 1.0,
                        label: None,
                    })
                    .collect(),
            })
            .collect();
        HierarchyBuilder::new(false).build(&entries, &relationships, &BTreeMap::new())
    }

    fn field(outcome: &MappingOutcome, line: u32) -> Option<&str> {
        outcome.for_line(line).and_then(|m| m.target.field_name())
    }

    fn balance_sheet() -> StatementForest {
        forest(
            StatementType::BalanceSheet,
            &[
                ("CashAndCashEquivalentsAtCarryingValue", "Cash and cash equivalents"),
                ("AccountsReceivableNetCurrent", "Accounts receivable, net"),
                ("CustomVendorItems", "Vendor non-trade items"),
                ("AssetsCurrent", "Total current assets"),
                ("MarketableSecuritiesNoncurrent", "Marketable securities"),
                ("Assets", "Total assets"),
                ("AccountsPayableCurrent", "Accounts payable"),
                ("CommercialPaper", "Commercial paper"),
                ("LiabilitiesCurrent", "Total current liabilities"),
                ("LongTermDebtNoncurrent", "Term debt"),
                ("Liabilities", "Total liabilities"),
                ("CommitmentsAndContingencies", "Commitments and contingencies"),
                ("RetainedEarningsAccumulatedDeficit", "Accumulated deficit"),
                ("StockholdersEquity", "Total shareholders' equity"),
                (
                    "StockholdersEquityIncludingPortionAttributableToNoncontrollingInterest",
                    "Total equity",
                ),
                ("LiabilitiesAndStockholdersEquity", "Total liabilities and equity"),
            ],
            &[
                (
                    "AssetsCurrent",
                    &[
                        "CashAndCashEquivalentsAtCarryingValue",
                        "AccountsReceivableNetCurrent",
                        "CustomVendorItems",
                    ],
                ),
                ("LiabilitiesCurrent", &["AccountsPayableCurrent", "CommercialPaper"]),
            ],
        )
    }

    #[test]
    fn test_industry_selection() {
        assert_eq!(IndustryClass::from_sic(Some(6022)), IndustryClass::Depository);
        assert_eq!(IndustryClass::from_sic(Some(6712)), IndustryClass::Depository);
        assert_eq!(IndustryClass::from_sic(Some(3571)), IndustryClass::General);
        assert_eq!(IndustryClass::from_sic(None), IndustryClass::General);
        assert_eq!(
            IndustryClass::select(None, Some(IndustryClass::Depository)),
            IndustryClass::Depository
        );
        assert!(DepositoryStrategy.rules(StatementType::BalanceSheet).len()
            > GeneralStrategy.rules(StatementType::BalanceSheet).len());
    }

    #[test]
    fn test_balance_sheet_mapping() {
        let forest = balance_sheet();
        let anchors = detect_anchors(StatementType::BalanceSheet, &forest);
        let mapper = FieldMapper::new(IndustryClass::General, &[]);
        let outcome = mapper.map(StatementType::BalanceSheet, &forest, &anchors);

        assert_eq!(outcome.mappings.len(), forest.nodes.len());
        assert_eq!(field(&outcome, 1), Some("cash_and_cash_equivalents"));
        assert_eq!(field(&outcome, 2), Some("account_receivables_net"));
        assert_eq!(field(&outcome, 3), Some("other_current_assets"));
        assert_eq!(field(&outcome, 4), Some("total_current_assets"));
        assert_eq!(field(&outcome, 5), Some("long_term_investments"));
        assert_eq!(field(&outcome, 8), Some("short_term_debt"));
        assert_eq!(field(&outcome, 10), Some("long_term_debt"));
        assert_eq!(field(&outcome, 12), Some("commitments_and_contingencies"));
        assert_eq!(field(&outcome, 13), Some("retained_earnings"));
        assert_eq!(field(&outcome, 14), Some("total_stockholders_equity"));
        assert_eq!(field(&outcome, 15), Some("total_equity"));

        let bucket = outcome.for_line(3).unwrap();
        assert!(matches!(bucket.target, MappingTarget::Bucket { .. }));
        assert!((bucket.confidence - 0.3).abs() < 0.01);
        assert_eq!(bucket.section, Section::CurrentAssets);

        let anchor = outcome.for_line(6).unwrap();
        assert!(matches!(anchor.target, MappingTarget::Anchor { .. }));
        assert!((anchor.confidence - 1.0).abs() < 0.01);

        assert_eq!(outcome.for_line(10).unwrap().section, Section::NonCurrentLiabilities);
        assert_eq!(outcome.for_line(13).unwrap().section, Section::StockholdersEquity);
        assert_eq!(outcome.diagnostics.len(), 2);
    }

    #[test]
    fn test_duplicate_equity_total_without_anchor() {
        let forest = forest(
            StatementType::BalanceSheet,
            &[
                ("Assets", "Total assets"),
                ("Liabilities", "Total liabilities"),
                ("CustomParentEquity", "Total Company stockholders' equity"),
                ("CustomMinority", "Noncontrolling interests"),
                ("CustomAllEquity", "Total stockholders' equity (deficit)"),
            ],
            &[],
        );
        let mut anchors = detect_anchors(StatementType::BalanceSheet, &forest);
        anchors.resolved.retain(|r| r.anchor != Anchor::TotalStockholdersEquity);

        let outcome = FieldMapper::new(IndustryClass::General, &[]).map(
            StatementType::BalanceSheet,
            &forest,
            &anchors,
        );
        assert_eq!(field(&outcome, 3), Some("total_stockholders_equity"));
        assert_eq!(field(&outcome, 4), Some("minority_interest"));
        assert_eq!(field(&outcome, 5), Some("total_equity"));
    }

    #[test]
    fn test_headers_and_rollups() {
        let mut forest = forest(
            StatementType::BalanceSheet,
            &[
                ("AssetsAbstract", "Assets:"),
                ("CashAndCashEquivalentsAtCarryingValue", "Cash and cash equivalents"),
                ("InventoryFinishedGoods", "Finished goods"),
                ("InventoryRawMaterials", "Raw materials"),
                ("InventoryNet", "Inventories"),
                ("AssetsCurrent", "Total current assets"),
                ("Assets", "Total assets"),
            ],
            &[
                ("InventoryNet", &["InventoryFinishedGoods", "InventoryRawMaterials"]),
                ("AssetsCurrent", &["CashAndCashEquivalentsAtCarryingValue", "InventoryNet"]),
                ("Assets", &["AssetsCurrent"]),
            ],
        );
        forest.nodes[0].is_abstract = true;

        let anchors = detect_anchors(StatementType::BalanceSheet, &forest);
        let outcome = FieldMapper::new(IndustryClass::General, &[]).map(
            StatementType::BalanceSheet,
            &forest,
            &anchors,
        );

        assert!(outcome.for_line(1).unwrap().target.is_header());
        assert_eq!(field(&outcome, 5), Some("inventory"));
        assert_eq!(outcome.for_line(3).unwrap().rolled_up_into, Some(5));
        assert_eq!(outcome.for_line(4).unwrap().rolled_up_into, Some(5));
        assert_eq!(outcome.for_line(5).unwrap().rolled_up_into, None);
        assert_eq!(outcome.for_line(2).unwrap().rolled_up_into, None);
    }

    #[test]
    fn test_valueless_line_is_header() {
        let mut forest = forest(
            StatementType::IncomeStatement,
            &[("Revenues", "Net sales"), ("CustomNote", "Other items")],
            &[],
        );
        forest.nodes[0].values = vec![Some(PeriodValue::reported(10.0))];
        forest.nodes[1].values = vec![None];

        let anchors = detect_anchors(StatementType::IncomeStatement, &forest);
        let outcome = FieldMapper::new(IndustryClass::General, &[]).map(
            StatementType::IncomeStatement,
            &forest,
            &anchors,
        );
        assert_eq!(field(&outcome, 1), Some("revenue"));
        assert!(outcome.for_line(2).unwrap().target.is_header());
    }

    #[test]
    fn test_custom_rules_run_first_and_fail_alone() {
        let forest = forest(
            StatementType::BalanceSheet,
            &[
                ("CustomDigitalAssets", "Digital assets"),
                ("CashAndCashEquivalentsAtCarryingValue", "Cash"),
                ("Assets", "Total assets"),
            ],
            &[],
        );
        let anchors = detect_anchors(StatementType::BalanceSheet, &forest);
        let rules = vec![
            CustomRule {
                statement: StatementType::BalanceSheet,
                pattern: "[contains 'digital'".to_string(),
                field: "broken".to_string(),
            },
            CustomRule {
                statement: StatementType::BalanceSheet,
                pattern: "[contains 'digital' and contains 'assets']".to_string(),
                field: "digital_assets".to_string(),
            },
        ];
        let outcome = FieldMapper::new(IndustryClass::General, &rules).map(
            StatementType::BalanceSheet,
            &forest,
            &anchors,
        );

        assert_eq!(field(&outcome, 1), Some("digital_assets"));
        assert_eq!(field(&outcome, 2), Some("cash_and_cash_equivalents"));
        assert_eq!(
            outcome
                .diagnostics
                .iter()
                .filter(|d| d.kind() == "pattern_parse_error")
                .count(),
            1
        );
    }

    #[test]
    fn test_income_statement_sections() {
        let mut forest = forest(
            StatementType::IncomeStatement,
            &[
                ("Revenues", "Net sales"),
                ("CostOfRevenue", "Cost of sales"),
                ("OtherCostAndExpenseOperating", "Other operating expense"),
                ("OperatingIncomeLoss", "Operating income"),
                ("OtherNonoperatingIncomeExpense", "Other income (expense), net"),
                ("IncomeTaxExpenseBenefit", "Provision for income taxes"),
                ("NetIncomeLoss", "Net income"),
                ("EarningsPerShareBasic", "Basic"),
            ],
            &[],
        );
        forest.nodes[7].datatype = Some("perShare".to_string());

        let anchors = detect_anchors(StatementType::IncomeStatement, &forest);
        let outcome = FieldMapper::new(IndustryClass::General, &[]).map(
            StatementType::IncomeStatement,
            &forest,
            &anchors,
        );
        assert_eq!(field(&outcome, 2), Some("cost_of_revenue"));
        assert_eq!(field(&outcome, 3), Some("other_expenses"));
        assert_eq!(outcome.for_line(3).unwrap().section, Section::OperatingItems);
        assert_eq!(field(&outcome, 5), Some("total_other_income_expenses_net"));
        assert_eq!(outcome.for_line(5).unwrap().section, Section::NonOperatingItems);
        assert_eq!(field(&outcome, 8), Some("eps"));
    }

    #[test]
    fn test_depository_strategy() {
        let forest = forest(
            StatementType::BalanceSheet,
            &[
                ("CashAndDueFromBanks", "Cash and due from banks"),
                ("AvailableForSaleSecuritiesDebtSecurities", "Securities available for sale"),
                ("LoansAndLeasesReceivableNetReportedAmount", "Loans, net of allowance"),
                ("Assets", "Total assets"),
                ("Deposits", "Deposits"),
                ("Liabilities", "Total liabilities"),
            ],
            &[],
        );
        let anchors = detect_anchors(StatementType::BalanceSheet, &forest);
        let bank = FieldMapper::new(IndustryClass::Depository, &[]);
        assert_eq!(bank.industry(), IndustryClass::Depository);
        let outcome = bank.map(StatementType::BalanceSheet, &forest, &anchors);
        assert_eq!(field(&outcome, 1), Some("due_from_bank"));
        assert_eq!(field(&outcome, 2), Some("available_for_sale_securities"));
        assert_eq!(field(&outcome, 3), Some("loans_net_of_allowance"));
        assert_eq!(field(&outcome, 5), Some("customer_deposits"));

        let general = FieldMapper::new(IndustryClass::General, &[]).map(
            StatementType::BalanceSheet,
            &forest,
            &anchors,
        );
        assert_eq!(field(&general, 1), Some("cash_and_cash_equivalents"));
    }

    #[test]
    fn test_equity_statement_balances() {
        let mut forest = forest(
            StatementType::Equity,
            &[
                ("StockholdersEquity", "Balance, beginning of period"),
                ("NetIncomeLoss", "Net income"),
                ("DividendsCommonStock", "Dividends declared"),
                ("StockholdersEquity", "Balance, end of period"),
            ],
            &[],
        );
        forest.nodes[0].balance_role = Some(BalanceRole::Beginning);
        forest.nodes[3].balance_role = Some(BalanceRole::Ending);

        let anchors = detect_anchors(StatementType::Equity, &forest);
        let outcome = FieldMapper::new(IndustryClass::General, &[]).map(
            StatementType::Equity,
            &forest,
            &anchors,
        );
        assert_eq!(field(&outcome, 1), Some("total_equity_beginning_of_period"));
        assert_eq!(field(&outcome, 2), Some("net_income"));
        assert_eq!(field(&outcome, 3), Some("dividends_declared"));
        assert_eq!(field(&outcome, 4), Some("total_equity_end_of_period"));
        assert!(outcome.diagnostics.is_empty());
    }
}
