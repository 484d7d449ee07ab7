//! Period-start dates for beginning balances.
//!
//! Flow statements rarely tag the opening balance with its own date; it is
//! the instant fact of the same tag at the previous period end. The start
//! is approximated as `end - quarters * 3 * days_per_month` and the closest
//! earlier instant wins. Fiscal years that do not follow calendar quarters
//! can defeat the approximation, so when the filing's fiscal year end is
//! known and the period is year-to-date, the previous fiscal year end is
//! preferred and far-off selections are reported as suspect.

use crate::config::ReconstructionConfig;
use crate::schema::FilingMetadata;
use crate::utils::{day_distance, parse_fiscal_year_end, previous_fiscal_year_end, subtract_days};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FiscalContext {
    pub year_end_month: u32,
    pub year_end_day: u32,
}

impl FiscalContext {
    pub fn from_metadata(metadata: &FilingMetadata) -> Option<Self> {
        let (year_end_month, year_end_day) =
            parse_fiscal_year_end(metadata.fiscal_year_end.as_deref()?)?;
        Some(Self {
            year_end_month,
            year_end_day,
        })
    }

    pub fn previous_year_end(&self, date: NaiveDate) -> Option<NaiveDate> {
        previous_fiscal_year_end(date, self.year_end_month, self.year_end_day)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InferenceOutcome {
    pub selected: NaiveDate,
    pub approximate: NaiveDate,

    /// Start date the selection is judged against: the previous fiscal year
    /// end when it was used, otherwise the approximation.
    pub expected: NaiveDate,
    pub distance_days: i64,
    pub fiscal_aligned: bool,
    pub suspect: bool,
}

pub struct DateInference {
    days_per_month: f64,
    window_days: i64,
    prefer_fiscal: bool,
}

impl Default for DateInference {
    fn default() -> Self {
        Self::from_config(&ReconstructionConfig::default())
    }
}

impl DateInference {
    pub fn from_config(config: &ReconstructionConfig) -> Self {
        Self {
            days_per_month: config.days_per_month,
            window_days: config.suspect_window_days,
            prefer_fiscal: config.prefer_fiscal_metadata,
        }
    }

    pub fn approximate_start(&self, end: NaiveDate, quarters: u8) -> NaiveDate {
        subtract_days(end, f64::from(quarters) * 3.0 * self.days_per_month)
    }

    /// `None` when no instant earlier than `end` exists.
    pub fn infer(
        &self,
        end: NaiveDate,
        quarters: u8,
        available: &BTreeSet<NaiveDate>,
        fiscal: Option<&FiscalContext>,
    ) -> Option<InferenceOutcome> {
        let earlier: Vec<NaiveDate> = available.range(..end).copied().collect();
        let approximate = self.approximate_start(end, quarters);

        let fiscal_start = fiscal
            .filter(|_| self.prefer_fiscal)
            .and_then(|f| f.previous_year_end(end))
            .filter(|start| self.is_year_to_date(*start, end, quarters));

        if let Some(expected) = fiscal_start {
            if let Some(selected) = closest(&earlier, expected) {
                let distance_days = day_distance(selected, expected);
                if distance_days <= self.window_days {
                    return Some(InferenceOutcome {
                        selected,
                        approximate,
                        expected,
                        distance_days,
                        fiscal_aligned: true,
                        suspect: false,
                    });
                }
            }
        }

        let selected = closest(&earlier, approximate)?;
        let distance_days = day_distance(selected, approximate);
        Some(InferenceOutcome {
            selected,
            approximate,
            expected: approximate,
            distance_days,
            fiscal_aligned: false,
            suspect: distance_days > self.window_days,
        })
    }

    fn is_year_to_date(&self, fiscal_start: NaiveDate, end: NaiveDate, quarters: u8) -> bool {
        let days = day_distance(end, fiscal_start) as f64;
        let measured = (days / (3.0 * self.days_per_month)).round();
        measured == f64::from(quarters)
    }
}

/// Closest date to `target`, earlier date on ties.
fn closest(dates: &[NaiveDate], target: NaiveDate) -> Option<NaiveDate> {
    dates
        .iter()
        .copied()
        .min_by_key(|&d| (day_distance(d, target), d))
}

/// The bare heuristic with default settings and no fiscal metadata.
pub fn infer_beginning_date(
    end: NaiveDate,
    quarters: u8,
    available: &BTreeSet<NaiveDate>,
) -> Option<NaiveDate> {
    DateInference::default()
        .infer(end, quarters, available, None)
        .map(|outcome| outcome.selected)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn dates(list: &[NaiveDate]) -> BTreeSet<NaiveDate> {
        list.iter().copied().collect()
    }

    #[test]
    fn test_half_year_selects_prior_year_end() {
        let available = dates(&[date(2023, 12, 31), date(2024, 3, 31)]);
        let outcome = DateInference::default()
            .infer(date(2024, 6, 30), 2, &available, None)
            .unwrap();
        assert_eq!(outcome.selected, date(2023, 12, 31));
        assert!(!outcome.suspect);
        assert!(day_distance(outcome.approximate, date(2024, 1, 1)) <= 3);

        assert_eq!(
            infer_beginning_date(date(2024, 6, 30), 2, &available),
            Some(date(2023, 12, 31))
        );
    }

    #[test]
    fn test_only_strictly_earlier_dates_qualify() {
        let available = dates(&[date(2024, 6, 30), date(2024, 9, 30)]);
        assert_eq!(infer_beginning_date(date(2024, 6, 30), 1, &available), None);

        let available = dates(&[date(2024, 3, 31), date(2024, 6, 30)]);
        assert_eq!(
            infer_beginning_date(date(2024, 6, 30), 1, &available),
            Some(date(2024, 3, 31))
        );
    }

    #[test]
    fn test_non_calendar_fiscal_year() {
        let fiscal = FiscalContext {
            year_end_month: 9,
            year_end_day: 28,
        };
        let available = dates(&[date(2023, 9, 30), date(2024, 3, 30), date(2024, 6, 29)]);
        let outcome = DateInference::default()
            .infer(date(2024, 6, 29), 3, &available, Some(&fiscal))
            .unwrap();
        assert_eq!(outcome.selected, date(2023, 9, 30));
        assert!(outcome.fiscal_aligned);
        assert_eq!(outcome.expected, date(2023, 9, 28));
    }

    #[test]
    fn test_fiscal_year_end_breaks_ties() {
        let available = dates(&[date(2023, 12, 29), date(2023, 12, 31)]);
        let inference = DateInference::default();

        let plain = inference
            .infer(date(2024, 6, 30), 2, &available, None)
            .unwrap();
        assert_eq!(plain.selected, date(2023, 12, 29));

        let fiscal = FiscalContext {
            year_end_month: 12,
            year_end_day: 31,
        };
        let aligned = inference
            .infer(date(2024, 6, 30), 2, &available, Some(&fiscal))
            .unwrap();
        assert_eq!(aligned.selected, date(2023, 12, 31));
        assert!(aligned.fiscal_aligned);
    }

    #[test]
    fn test_far_selection_is_suspect() {
        let available = dates(&[date(2023, 6, 30), date(2024, 5, 31)]);
        let outcome = DateInference::default()
            .infer(date(2024, 6, 30), 2, &available, None)
            .unwrap();
        assert_eq!(outcome.selected, date(2024, 5, 31));
        assert!(outcome.suspect);
        assert!(outcome.distance_days > 15);
    }

    #[test]
    fn test_fiscal_context_from_metadata() {
        let metadata = FilingMetadata {
            filer_id: 320193,
            name: "APPLE INC".to_string(),
            sic: Some(3571),
            form: Some("10-Q".to_string()),
            fiscal_year: Some(2024),
            fiscal_period: Some("Q3".to_string()),
            fiscal_year_end: Some("0928".to_string()),
        };
        let fiscal = FiscalContext::from_metadata(&metadata).unwrap();
        assert_eq!(fiscal.year_end_month, 9);
        assert_eq!(fiscal.year_end_day, 28);

        let mut missing = metadata.clone();
        missing.fiscal_year_end = None;
        assert!(FiscalContext::from_metadata(&missing).is_none());
    }
}
