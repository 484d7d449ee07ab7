use crate::binder::FactIndex;
use crate::hierarchy::StatementForest;
use crate::schema::{Period, StatementType};
use chrono::NaiveDate;
use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Tags that reliably carry every displayed column, in priority order.
pub fn representative_tags(statement: StatementType) -> &'static [&'static str] {
    match statement {
        StatementType::BalanceSheet => &[
            "Assets",
            "AssetsCurrent",
            "CashAndCashEquivalentsAtCarryingValue",
            "LiabilitiesAndStockholdersEquity",
        ],
        StatementType::IncomeStatement => &[
            "Revenues",
            "RevenueFromContractWithCustomerExcludingAssessedTax",
            "SalesRevenueNet",
            "NetIncomeLoss",
        ],
        StatementType::CashFlow => &[
            "NetCashProvidedByUsedInOperatingActivities",
            "NetCashProvidedByUsedInInvestingActivities",
            "NetCashProvidedByUsedInFinancingActivities",
        ],
        StatementType::ComprehensiveIncome => &["ComprehensiveIncomeNetOfTax", "NetIncomeLoss"],
        StatementType::Equity => &["NetIncomeLoss", "ProfitLoss"],
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeriodDiscovery {
    pub periods: Vec<Period>,
    pub representative_tag: Option<String>,
}

fn period_keys(statement: StatementType, tag: &str, facts: &FactIndex) -> BTreeSet<(NaiveDate, u8)> {
    if statement.is_instant() {
        facts
            .instant_dates(tag)
            .into_iter()
            .map(|d| (d, 0))
            .collect()
    } else {
        facts.duration_keys(tag)
    }
}

/// Picks the representative tag of a statement: the first priority tag that
/// is presented and has consolidated facts of the statement's kind, then
/// the first presented tag with such facts, then simply the first
/// presented tag.
pub fn representative_tag(
    statement: StatementType,
    forest: &StatementForest,
    facts: &FactIndex,
) -> Option<String> {
    let presented: Vec<&str> = forest.nodes.iter().map(|n| n.tag.as_str()).collect();
    let qualifies = |tag: &str| !period_keys(statement, tag, facts).is_empty();

    representative_tags(statement)
        .iter()
        .copied()
        .find(|tag| presented.contains(tag) && qualifies(*tag))
        .or_else(|| presented.iter().copied().find(|tag| qualifies(*tag)))
        .or_else(|| presented.first().copied())
        .map(str::to_string)
}

/// Columns of a statement, newest first; shorter durations first on equal dates.
pub fn discover_periods(
    statement: StatementType,
    forest: &StatementForest,
    facts: &FactIndex,
) -> PeriodDiscovery {
    let representative_tag = representative_tag(statement, forest, facts);

    let mut keys: Vec<(NaiveDate, u8)> = representative_tag
        .as_deref()
        .map(|tag| period_keys(statement, tag, facts).into_iter().collect())
        .unwrap_or_default();
    keys.sort_by(|a, b| b.0.cmp(&a.0).then(a.1.cmp(&b.1)));

    let periods: Vec<Period> = keys
        .into_iter()
        .map(|(end_date, quarters)| Period {
            end_date,
            quarters,
            label: period_label(end_date, quarters),
        })
        .collect();

    debug!(
        "{} periods for {} from {:?}",
        periods.len(),
        statement,
        representative_tag
    );

    PeriodDiscovery {
        periods,
        representative_tag,
    }
}

pub fn period_label(end_date: NaiveDate, quarters: u8) -> String {
    let date = end_date.format("%b %-d, %Y");
    match quarters {
        0 => format!("As of {}", date),
        1 => format!("Three Months Ended {}", date),
        2 => format!("Six Months Ended {}", date),
        3 => format!("Nine Months Ended {}", date),
        4 => format!("Year Ended {}", date),
        q => format!("{} Months Ended {}", u32::from(q) * 3, date),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hierarchy::HierarchyBuilder;
    use crate::schema::{Fact, PresentationEntry};
    use std::collections::BTreeMap;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn fact(tag: &str, end: NaiveDate, quarters: u8, segments: Option<&str>) -> Fact {
        Fact {
            accession: "0001".to_string(),
            tag: tag.to_string(),
            version: "us-gaap/2024".to_string(),
            end_date: end,
            quarters,
            unit: "USD".to_string(),
            segments: segments.map(str::to_string),
            coregistrant: None,
            value: 1.0,
        }
    }

    fn forest(statement: StatementType, tags: &[&str]) -> StatementForest {
        let entries: Vec<PresentationEntry> = tags
            .iter()
            .enumerate()
            .map(|(i, tag)| PresentationEntry {
                accession: "0001".to_string(),
                report: 2,
                line: i as u32 + 1,
                statement,
                indent: 0,
                tag: tag.to_string(),
                version: "us-gaap/2024".to_string(),
                label: tag.to_string(),
                negating: false,
            })
            .collect();
        HierarchyBuilder::new(false).build(&entries, &[], &BTreeMap::new())
    }

    #[test]
    fn test_balance_sheet_periods_from_total_assets() {
        let forest = forest(
            StatementType::BalanceSheet,
            &["CashAndCashEquivalentsAtCarryingValue", "Assets"],
        );
        let facts = FactIndex::new(vec![
            fact("Assets", date(2024, 6, 30), 0, None),
            fact("Assets", date(2023, 12, 31), 0, None),
            fact("Assets", date(2023, 12, 31), 0, None),
            fact("Assets", date(2022, 12, 31), 0, Some("Segment=A;")),
            fact("CashAndCashEquivalentsAtCarryingValue", date(2022, 12, 31), 0, None),
        ]);

        let discovery = discover_periods(StatementType::BalanceSheet, &forest, &facts);
        assert_eq!(discovery.representative_tag.as_deref(), Some("Assets"));
        assert_eq!(discovery.periods.len(), facts.instant_dates("Assets").len());
        assert_eq!(discovery.periods.len(), 2);
        assert_eq!(discovery.periods[0].end_date, date(2024, 6, 30));
        assert_eq!(discovery.periods[0].label, "As of Jun 30, 2024");
        assert_eq!(discovery.periods[1].end_date, date(2023, 12, 31));
    }

    #[test]
    fn test_flow_periods_sort_by_date_then_duration() {
        let forest = forest(StatementType::IncomeStatement, &["Revenues", "NetIncomeLoss"]);
        let facts = FactIndex::new(vec![
            fact("Revenues", date(2023, 6, 30), 1, None),
            fact("Revenues", date(2024, 6, 30), 2, None),
            fact("Revenues", date(2024, 6, 30), 1, None),
            fact("Revenues", date(2023, 6, 30), 2, None),
            fact("Revenues", date(2024, 6, 30), 0, None),
        ]);

        let discovery = discover_periods(StatementType::IncomeStatement, &forest, &facts);
        let keys: Vec<(NaiveDate, u8)> = discovery.periods.iter().map(|p| p.key()).collect();
        assert_eq!(
            keys,
            vec![
                (date(2024, 6, 30), 1),
                (date(2024, 6, 30), 2),
                (date(2023, 6, 30), 1),
                (date(2023, 6, 30), 2),
            ]
        );
        assert_eq!(discovery.periods[1].label, "Six Months Ended Jun 30, 2024");
    }

    #[test]
    fn test_falls_back_to_presented_tag() {
        let forest = forest(
            StatementType::CashFlow,
            &["NetIncomeLoss", "DepreciationDepletionAndAmortization"],
        );
        let facts = FactIndex::new(vec![fact(
            "DepreciationDepletionAndAmortization",
            date(2024, 12, 31),
            4,
            None,
        )]);
        let discovery = discover_periods(StatementType::CashFlow, &forest, &facts);
        assert_eq!(
            discovery.representative_tag.as_deref(),
            Some("DepreciationDepletionAndAmortization")
        );
        assert_eq!(discovery.periods[0].label, "Year Ended Dec 31, 2024");

        let empty = discover_periods(StatementType::CashFlow, &forest, &FactIndex::default());
        assert_eq!(empty.representative_tag.as_deref(), Some("NetIncomeLoss"));
        assert!(empty.periods.is_empty());
    }

    #[test]
    fn test_period_labels() {
        assert_eq!(period_label(date(2024, 9, 28), 3), "Nine Months Ended Sep 28, 2024");
        assert_eq!(period_label(date(2024, 1, 5), 0), "As of Jan 5, 2024");
        assert_eq!(period_label(date(2024, 12, 31), 6), "18 Months Ended Dec 31, 2024");
    }
}
