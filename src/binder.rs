use crate::diagnostics::Diagnostic;
use crate::hierarchy::{BalanceRole, CalcLink, StatementForest};
use crate::schema::{Fact, Period, StatementType};
use crate::utils::normalize_label;
use chrono::NaiveDate;
use log::{debug, warn};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, JsonSchema)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ValueOrigin {
    #[schemars(description = "A fact reported for exactly this tag and period")]
    Reported,

    #[schemars(description = "Signed sum of the line's calculation children")]
    Computed,

    #[schemars(description = "Instant balance at an inferred period start date")]
    BeginningBalance { date: NaiveDate },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, JsonSchema)]
pub struct PeriodValue {
    pub value: f64,
    pub origin: ValueOrigin,
}

impl PeriodValue {
    pub fn reported(value: f64) -> Self {
        Self {
            value,
            origin: ValueOrigin::Reported,
        }
    }

    pub fn computed(value: f64) -> Self {
        Self {
            value,
            origin: ValueOrigin::Computed,
        }
    }
}

type FactKey = (String, NaiveDate, u8);

const PREFERRED_UNIT: &str = "USD";

/// Consolidated facts of a filing indexed by (tag, date, quarters).
/// Candidates for one key keep their source order.
#[derive(Debug, Clone, Default)]
pub struct FactIndex {
    facts: Vec<Fact>,
    by_key: BTreeMap<FactKey, Vec<usize>>,
}

impl FactIndex {
    pub fn new(facts: Vec<Fact>) -> Self {
        let facts: Vec<Fact> = facts.into_iter().filter(Fact::is_consolidated).collect();
        let mut by_key: BTreeMap<FactKey, Vec<usize>> = BTreeMap::new();
        for (i, fact) in facts.iter().enumerate() {
            by_key
                .entry((fact.tag.clone(), fact.end_date, fact.quarters))
                .or_default()
                .push(i);
        }
        Self { facts, by_key }
    }

    pub fn len(&self) -> usize {
        self.facts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.facts.is_empty()
    }

    /// Facts for one key. When any of them is in USD the other units are
    /// dropped.
    pub fn candidates(&self, tag: &str, date: NaiveDate, quarters: u8) -> Vec<&Fact> {
        let all: Vec<&Fact> = self
            .by_key
            .get(&(tag.to_string(), date, quarters))
            .map(|ids| ids.iter().map(|&i| &self.facts[i]).collect())
            .unwrap_or_default();
        if all.iter().any(|f| f.unit == PREFERRED_UNIT) {
            all.into_iter().filter(|f| f.unit == PREFERRED_UNIT).collect()
        } else {
            all
        }
    }

    pub fn lookup(&self, tag: &str, date: NaiveDate, quarters: u8) -> Option<&Fact> {
        self.candidates(tag, date, quarters).into_iter().next()
    }

    fn keys_for<'a>(&'a self, tag: &'a str) -> impl Iterator<Item = &'a FactKey> + 'a {
        self.by_key
            .range((tag.to_string(), NaiveDate::MIN, 0)..)
            .map(|(key, _)| key)
            .take_while(move |(t, _, _)| t == tag)
    }

    pub fn instant_dates(&self, tag: &str) -> BTreeSet<NaiveDate> {
        self.keys_for(tag)
            .filter(|(_, _, q)| *q == 0)
            .map(|(_, d, _)| *d)
            .collect()
    }

    pub fn duration_keys(&self, tag: &str) -> BTreeSet<(NaiveDate, u8)> {
        self.keys_for(tag)
            .filter(|(_, _, q)| *q > 0)
            .map(|(_, d, q)| (*d, *q))
            .collect()
    }

    pub fn has_instant(&self, tag: &str) -> bool {
        self.keys_for(tag).any(|(_, _, q)| *q == 0)
    }

    pub fn has_duration(&self, tag: &str) -> bool {
        self.keys_for(tag).any(|(_, _, q)| *q > 0)
    }
}

const BEGINNING_WORDS: [&str; 4] = ["beginning", "begin", "start", "opening"];

/// Marks instant-only lines of flow statements as beginning or ending
/// balances. Balance sheets are left untouched.
pub fn assign_balance_roles(
    forest: &mut StatementForest,
    facts: &FactIndex,
    statement: StatementType,
) {
    if statement.is_instant() {
        return;
    }

    let mut seen: BTreeMap<String, usize> = BTreeMap::new();
    let mut occurrences: BTreeMap<String, usize> = BTreeMap::new();
    for node in &forest.nodes {
        *occurrences.entry(node.tag.clone()).or_default() += 1;
    }

    for node in &mut forest.nodes {
        if !facts.has_instant(&node.tag) || facts.has_duration(&node.tag) {
            continue;
        }

        let label = normalize_label(&node.label);
        let index = seen.entry(node.tag.clone()).or_default();
        let duplicated = occurrences.get(&node.tag).copied().unwrap_or(0) > 1;

        let by_label = label
            .split(' ')
            .any(|word| BEGINNING_WORDS.contains(&word));
        node.balance_role = if by_label || (duplicated && *index == 0) {
            Some(BalanceRole::Beginning)
        } else {
            Some(BalanceRole::Ending)
        };
        *index += 1;
    }
}

/// Beginning-balance dates keyed by (tag, period index).
pub type BeginningDates = BTreeMap<(String, usize), NaiveDate>;

#[derive(Clone, Copy, PartialEq)]
enum Slot {
    Pending,
    InProgress,
}

pub struct ValueBinder<'a> {
    facts: &'a FactIndex,
    periods: &'a [Period],
    beginning_dates: &'a BeginningDates,
    include_unpresented: bool,
}

impl<'a> ValueBinder<'a> {
    pub fn new(
        facts: &'a FactIndex,
        periods: &'a [Period],
        beginning_dates: &'a BeginningDates,
        include_unpresented: bool,
    ) -> Self {
        Self {
            facts,
            periods,
            beginning_dates,
            include_unpresented,
        }
    }

    /// Fills `values` of every node with one entry per period.
    pub fn bind(&self, forest: &mut StatementForest) -> Vec<Diagnostic> {
        let (matrix, diagnostics) = self.resolve_all(forest);

        for (node, values) in forest.nodes.iter_mut().zip(matrix) {
            node.values = values;
        }

        let gaps = forest
            .nodes
            .iter()
            .filter(|n| !n.is_abstract && !n.has_any_value())
            .count();
        debug!(
            "Bound {} periods over {} line items, {} without any value",
            self.periods.len(),
            forest.nodes.len(),
            gaps
        );
        diagnostics
    }

    fn resolve_all(
        &self,
        forest: &StatementForest,
    ) -> (Vec<Vec<Option<PeriodValue>>>, Vec<Diagnostic>) {
        let mut ambiguous: BTreeSet<FactKey> = BTreeSet::new();
        let mut diagnostics = Vec::new();
        let mut matrix: Vec<Vec<Option<PeriodValue>>> =
            vec![Vec::with_capacity(self.periods.len()); forest.nodes.len()];

        for (index, period) in self.periods.iter().enumerate() {
            let mut pass = PeriodPass {
                binder: self,
                forest,
                period,
                index,
                resolved: vec![None; forest.nodes.len()],
                state: vec![Slot::Pending; forest.nodes.len()],
                tags_in_progress: BTreeSet::new(),
                ambiguous: &mut ambiguous,
                diagnostics: &mut diagnostics,
            };
            for line in 1..=forest.nodes.len() as u32 {
                pass.resolve_line(line);
            }
            for (row, value) in matrix.iter_mut().zip(pass.resolved) {
                row.push(value.flatten());
            }
        }

        (matrix, diagnostics)
    }
}

struct PeriodPass<'b, 'a> {
    binder: &'b ValueBinder<'a>,
    forest: &'b StatementForest,
    period: &'b Period,
    index: usize,
    resolved: Vec<Option<Option<PeriodValue>>>,
    state: Vec<Slot>,
    tags_in_progress: BTreeSet<String>,
    ambiguous: &'b mut BTreeSet<FactKey>,
    diagnostics: &'b mut Vec<Diagnostic>,
}

impl PeriodPass<'_, '_> {
    fn direct(&mut self, tag: &str, date: NaiveDate, quarters: u8) -> Option<f64> {
        let candidates = self.binder.facts.candidates(tag, date, quarters);
        let first = candidates.first()?;
        if candidates.len() > 1 && self.ambiguous.insert((tag.to_string(), date, quarters)) {
            let conflicting = candidates.iter().any(|c| c.value != first.value);
            if conflicting {
                warn!(
                    "{} conflicting facts for {} at {} ({}q); using the first",
                    candidates.len(),
                    tag,
                    date,
                    quarters
                );
            }
            self.diagnostics.push(Diagnostic::AmbiguousBinding {
                tag: tag.to_string(),
                end_date: date,
                quarters,
                candidates: candidates.len(),
                conflicting,
            });
        }
        Some(first.value)
    }

    fn resolve_line(&mut self, line: u32) -> Option<PeriodValue> {
        let slot = line as usize - 1;
        if let Some(done) = &self.resolved[slot] {
            return done.clone();
        }
        if self.state[slot] == Slot::InProgress {
            return None;
        }
        self.state[slot] = Slot::InProgress;

        let forest = self.forest;
        let value = match forest.node(line) {
            Some(node) => match node.balance_role {
                Some(BalanceRole::Beginning) => self
                    .binder
                    .beginning_dates
                    .get(&(node.tag.clone(), self.index))
                    .copied()
                    .and_then(|date| {
                        self.direct(&node.tag, date, 0).map(|value| PeriodValue {
                            value,
                            origin: ValueOrigin::BeginningBalance { date },
                        })
                    }),
                Some(BalanceRole::Ending) => self
                    .direct(&node.tag, self.period.end_date, 0)
                    .map(PeriodValue::reported),
                None => match self.direct(&node.tag, self.period.end_date, self.period.quarters) {
                    Some(value) => Some(PeriodValue::reported(value)),
                    None if node.is_sum => self.sum(&node.calc_children),
                    None => None,
                },
            },
            None => None,
        };

        self.resolved[slot] = Some(value.clone());
        value
    }

    fn resolve_tag(&mut self, tag: &str) -> Option<f64> {
        if let Some(value) = self.direct(tag, self.period.end_date, self.period.quarters) {
            return Some(value);
        }
        let forest = self.forest;
        let children = forest.unpresented_sums.get(tag)?;
        if !self.tags_in_progress.insert(tag.to_string()) {
            return None;
        }
        let value = self.sum(children).map(|v| v.value);
        self.tags_in_progress.remove(tag);
        value
    }

    /// A gap in any child leaves the whole sum unresolved.
    fn sum(&mut self, children: &[CalcLink]) -> Option<PeriodValue> {
        if children.is_empty() {
            return None;
        }
        let mut total = 0.0;
        for child in children {
            let value = match child.line {
                Some(line) => self.resolve_line(line).map(|v| v.value),
                None if self.binder.include_unpresented => self.resolve_tag(&child.tag),
                None => None,
            }?;
            total += value * child.weight;
        }
        Some(PeriodValue::computed(total))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hierarchy::HierarchyBuilder;
    use crate::schema::{CalcChild, CalcRelationship, PresentationEntry};

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn fact(tag: &str, end: NaiveDate, quarters: u8, value: f64) -> Fact {
        Fact {
            accession: "0001".to_string(),
            tag: tag.to_string(),
            version: "us-gaap/2024".to_string(),
            end_date: end,
            quarters,
            unit: "USD".to_string(),
            segments: None,
            coregistrant: None,
            value,
        }
    }

    fn entry(line: u32, tag: &str, label: &str, statement: StatementType) -> PresentationEntry {
        PresentationEntry {
            accession: "0001".to_string(),
            report: 2,
            line,
            statement,
            indent: 0,
            tag: tag.to_string(),
            version: "us-gaap/2024".to_string(),
            label: label.to_string(),
            negating: false,
        }
    }

    fn period(end: NaiveDate, quarters: u8) -> Period {
        Period {
            end_date: end,
            quarters,
            label: String::new(),
        }
    }

    fn current_assets_forest() -> StatementForest {
        let entries = vec![
            entry(1, "Cash", "Cash", StatementType::BalanceSheet),
            entry(2, "InventoryNet", "Inventories", StatementType::BalanceSheet),
            entry(3, "AssetsCurrent", "Total current assets", StatementType::BalanceSheet),
        ];
        let calc = vec![CalcRelationship {
            parent: "AssetsCurrent".to_string(),
            children: vec![
                CalcChild {
                    tag: "Cash".to_string(),
                    weight: 1.0,
                    label: None,
                },
                CalcChild {
                    tag: "InventoryNet".to_string(),
                    weight: 1.0,
                    label: None,
                },
            ],
        }];
        HierarchyBuilder::new(true).build(&entries, &calc, &BTreeMap::new())
    }

    #[test]
    fn test_fact_index_skips_dimensional_facts() {
        let mut segmented = fact("Cash", date(2024, 6, 30), 0, 99.0);
        segmented.segments = Some("Geography=EU;".to_string());
        let index = FactIndex::new(vec![segmented, fact("Cash", date(2024, 6, 30), 0, 10.0)]);
        assert_eq!(index.len(), 1);
        assert!((index.lookup("Cash", date(2024, 6, 30), 0).unwrap().value - 10.0).abs() < 0.01);
        assert!(index.has_instant("Cash"));
        assert!(!index.has_duration("Cash"));
        assert!(index.instant_dates("CashEquivalents").is_empty());
    }

    #[test]
    fn test_direct_and_computed_values() {
        let mut forest = current_assets_forest();
        let facts = FactIndex::new(vec![
            fact("Cash", date(2024, 6, 30), 0, 100.0),
            fact("InventoryNet", date(2024, 6, 30), 0, 50.0),
            fact("Cash", date(2023, 12, 31), 0, 80.0),
            fact("InventoryNet", date(2023, 12, 31), 0, 40.0),
            fact("AssetsCurrent", date(2023, 12, 31), 0, 120.0),
        ]);
        let periods = vec![period(date(2024, 6, 30), 0), period(date(2023, 12, 31), 0)];
        let dates = BeginningDates::new();

        let diagnostics = ValueBinder::new(&facts, &periods, &dates, true).bind(&mut forest);
        assert!(diagnostics.is_empty());

        let total = forest.node(3).unwrap();
        assert_eq!(total.values.len(), 2);
        let current = total.values[0].as_ref().unwrap();
        assert!((current.value - 150.0).abs() < 0.01);
        assert_eq!(current.origin, ValueOrigin::Computed);
        let prior = total.values[1].as_ref().unwrap();
        assert!((prior.value - 120.0).abs() < 0.01);
        assert_eq!(prior.origin, ValueOrigin::Reported);
    }

    #[test]
    fn test_unresolved_child_leaves_gap() {
        let mut forest = current_assets_forest();
        let facts = FactIndex::new(vec![fact("Cash", date(2024, 6, 30), 0, 100.0)]);
        let periods = vec![period(date(2024, 6, 30), 0)];
        let dates = BeginningDates::new();

        ValueBinder::new(&facts, &periods, &dates, true).bind(&mut forest);
        assert!(forest.node(2).unwrap().values[0].is_none());
        assert!(forest.node(3).unwrap().values[0].is_none());
        assert_eq!(forest.nodes.iter().map(|n| n.values.len()).sum::<usize>(), 3);
    }

    #[test]
    fn test_duplicate_facts_use_first_and_flag() {
        let mut forest = current_assets_forest();
        let facts = FactIndex::new(vec![
            fact("Cash", date(2024, 6, 30), 0, 100.0),
            fact("Cash", date(2024, 6, 30), 0, 101.0),
            fact("InventoryNet", date(2024, 6, 30), 0, 50.0),
        ]);
        let periods = vec![period(date(2024, 6, 30), 0)];
        let dates = BeginningDates::new();

        let diagnostics = ValueBinder::new(&facts, &periods, &dates, true).bind(&mut forest);
        assert_eq!(diagnostics.len(), 1);
        assert!(matches!(
            &diagnostics[0],
            Diagnostic::AmbiguousBinding { candidates: 2, conflicting: true, .. }
        ));
        assert!((forest.node(1).unwrap().value(0).unwrap() - 100.0).abs() < 0.01);
    }

    #[test]
    fn test_usd_preferred_over_other_units() {
        let mut forest = current_assets_forest();
        let mut euros = fact("Cash", date(2024, 6, 30), 0, 92.0);
        euros.unit = "EUR".to_string();
        let facts = FactIndex::new(vec![
            euros,
            fact("Cash", date(2024, 6, 30), 0, 100.0),
            fact("InventoryNet", date(2024, 6, 30), 0, 50.0),
        ]);
        assert_eq!(facts.candidates("Cash", date(2024, 6, 30), 0).len(), 1);
        assert_eq!(facts.lookup("Cash", date(2024, 6, 30), 0).unwrap().unit, "USD");

        let periods = vec![period(date(2024, 6, 30), 0)];
        let dates = BeginningDates::new();
        let diagnostics = ValueBinder::new(&facts, &periods, &dates, true).bind(&mut forest);
        assert!(diagnostics.is_empty());
        assert!((forest.node(1).unwrap().value(0).unwrap() - 100.0).abs() < 0.01);
        assert!((forest.node(3).unwrap().value(0).unwrap() - 150.0).abs() < 0.01);

        let mut shares = fact("CustomUnits", date(2024, 6, 30), 0, 7.0);
        shares.unit = "shares".to_string();
        let index = FactIndex::new(vec![shares]);
        assert_eq!(index.candidates("CustomUnits", date(2024, 6, 30), 0).len(), 1);
    }

    #[test]
    fn test_unpresented_children_bind_directly() {
        let entries = vec![entry(1, "Assets", "Total assets", StatementType::BalanceSheet)];
        let calc = vec![CalcRelationship {
            parent: "Assets".to_string(),
            children: vec![
                CalcChild {
                    tag: "AssetsCurrent".to_string(),
                    weight: 1.0,
                    label: None,
                },
                CalcChild {
                    tag: "AssetsNoncurrent".to_string(),
                    weight: 1.0,
                    label: None,
                },
            ],
        }];
        let facts = FactIndex::new(vec![
            fact("AssetsCurrent", date(2024, 6, 30), 0, 10.0),
            fact("AssetsNoncurrent", date(2024, 6, 30), 0, 5.0),
        ]);
        let periods = vec![period(date(2024, 6, 30), 0)];
        let dates = BeginningDates::new();

        let mut forest = HierarchyBuilder::new(true).build(&entries, &calc, &BTreeMap::new());
        ValueBinder::new(&facts, &periods, &dates, true).bind(&mut forest);
        assert!((forest.node(1).unwrap().value(0).unwrap() - 15.0).abs() < 0.01);

        let mut forest = HierarchyBuilder::new(true).build(&entries, &calc, &BTreeMap::new());
        ValueBinder::new(&facts, &periods, &dates, false).bind(&mut forest);
        assert!(forest.node(1).unwrap().value(0).is_none());
    }

    #[test]
    fn test_cyclic_sums_terminate() {
        let entries = vec![
            entry(1, "A", "A", StatementType::BalanceSheet),
            entry(2, "B", "B", StatementType::BalanceSheet),
        ];
        let calc = vec![
            CalcRelationship {
                parent: "A".to_string(),
                children: vec![CalcChild {
                    tag: "B".to_string(),
                    weight: 1.0,
                    label: None,
                }],
            },
            CalcRelationship {
                parent: "B".to_string(),
                children: vec![CalcChild {
                    tag: "A".to_string(),
                    weight: 1.0,
                    label: None,
                }],
            },
        ];
        let mut forest = HierarchyBuilder::new(true).build(&entries, &calc, &BTreeMap::new());
        let facts = FactIndex::default();
        let periods = vec![period(date(2024, 6, 30), 0)];
        let dates = BeginningDates::new();
        ValueBinder::new(&facts, &periods, &dates, true).bind(&mut forest);
        assert!(forest.node(1).unwrap().value(0).is_none());
        assert!(forest.node(2).unwrap().value(0).is_none());
    }

    #[test]
    fn test_cash_flow_balances() {
        let entries = vec![
            entry(1, "NetIncomeLoss", "Net income", StatementType::CashFlow),
            entry(
                2,
                "CashCashEquivalentsRestrictedCashAndRestrictedCashEquivalents",
                "Cash, beginning of period",
                StatementType::CashFlow,
            ),
            entry(
                3,
                "CashCashEquivalentsRestrictedCashAndRestrictedCashEquivalents",
                "Cash, end of period",
                StatementType::CashFlow,
            ),
        ];
        let cash = "CashCashEquivalentsRestrictedCashAndRestrictedCashEquivalents";
        let facts = FactIndex::new(vec![
            fact("NetIncomeLoss", date(2024, 6, 29), 3, 79.0),
            fact(cash, date(2023, 9, 30), 0, 30.0),
            fact(cash, date(2024, 6, 29), 0, 26.0),
        ]);
        let mut forest = HierarchyBuilder::new(true).build(&entries, &[], &BTreeMap::new());
        assign_balance_roles(&mut forest, &facts, StatementType::CashFlow);
        assert_eq!(forest.node(1).unwrap().balance_role, None);
        assert_eq!(forest.node(2).unwrap().balance_role, Some(BalanceRole::Beginning));
        assert_eq!(forest.node(3).unwrap().balance_role, Some(BalanceRole::Ending));

        let periods = vec![period(date(2024, 6, 29), 3)];
        let mut dates = BeginningDates::new();
        dates.insert((cash.to_string(), 0), date(2023, 9, 30));

        ValueBinder::new(&facts, &periods, &dates, true).bind(&mut forest);
        let beginning = forest.node(2).unwrap().values[0].as_ref().unwrap();
        assert!((beginning.value - 30.0).abs() < 0.01);
        assert_eq!(
            beginning.origin,
            ValueOrigin::BeginningBalance {
                date: date(2023, 9, 30)
            }
        );
        assert!((forest.node(3).unwrap().value(0).unwrap() - 26.0).abs() < 0.01);
        assert!((forest.node(1).unwrap().value(0).unwrap() - 79.0).abs() < 0.01);
    }

    #[test]
    fn test_beginning_without_inferred_date_stays_empty() {
        let cash = "CashAndCashEquivalentsAtCarryingValue";
        let entries = vec![
            entry(1, cash, "Cash at beginning of year", StatementType::CashFlow),
            entry(2, cash, "Cash at end of year", StatementType::CashFlow),
        ];
        let facts = FactIndex::new(vec![fact(cash, date(2024, 6, 29), 0, 26.0)]);
        let mut forest = HierarchyBuilder::new(true).build(&entries, &[], &BTreeMap::new());
        assign_balance_roles(&mut forest, &facts, StatementType::CashFlow);

        let periods = vec![period(date(2024, 6, 29), 4)];
        let dates = BeginningDates::new();
        ValueBinder::new(&facts, &periods, &dates, true).bind(&mut forest);
        assert!(forest.node(1).unwrap().value(0).is_none());
        assert!(forest.node(2).unwrap().value(0).is_some());
    }
}
