//! Many filings at once. Every request is an isolated reconstruction; the
//! only shared state is the read-only store.

use crate::balancer::StandardizedStatement;
use crate::engine::{ReconstructedStatement, ReconstructionEngine};
use crate::error::{ReconstructionError, Result};
use crate::schema::ReconstructionRequest;
use crate::store::FactStore;
use log::{info, warn};
use rayon::prelude::*;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, JsonSchema)]
pub struct BatchSummary {
    pub succeeded: usize,
    pub failed: usize,
}

#[derive(Debug)]
pub struct BatchOutcome<T> {
    pub request: ReconstructionRequest,
    pub result: Result<T>,
}

/// Outcomes in request order.
#[derive(Debug)]
pub struct BatchReport<T> {
    pub outcomes: Vec<BatchOutcome<T>>,
    pub summary: BatchSummary,
}

impl<T> BatchReport<T> {
    pub fn successes(&self) -> impl Iterator<Item = &T> {
        self.outcomes.iter().filter_map(|o| o.result.as_ref().ok())
    }

    pub fn failures(&self) -> impl Iterator<Item = (&ReconstructionRequest, &ReconstructionError)> {
        self.outcomes
            .iter()
            .filter_map(|o| o.result.as_ref().err().map(|e| (&o.request, e)))
    }
}

/// `workers == 0` sizes the pool to the number of cores.
pub fn reconstruct_batch<S: FactStore + Sync + ?Sized>(
    engine: &ReconstructionEngine,
    store: &S,
    requests: &[ReconstructionRequest],
    workers: usize,
) -> Result<BatchReport<ReconstructedStatement>> {
    run(requests, workers, |request| engine.reconstruct(store, request))
}

pub fn standardize_batch<S: FactStore + Sync + ?Sized>(
    engine: &ReconstructionEngine,
    store: &S,
    requests: &[ReconstructionRequest],
    workers: usize,
) -> Result<BatchReport<StandardizedStatement>> {
    run(requests, workers, |request| engine.standardize(store, request))
}

fn run<T, F>(requests: &[ReconstructionRequest], workers: usize, job: F) -> Result<BatchReport<T>>
where
    T: Send,
    F: Fn(&ReconstructionRequest) -> Result<T> + Sync,
{
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(workers)
        .build()
        .map_err(|e| ReconstructionError::WorkerPool(e.to_string()))?;

    info!(
        "Running {} requests on {} workers",
        requests.len(),
        pool.current_num_threads()
    );

    let outcomes: Vec<BatchOutcome<T>> = pool.install(|| {
        requests
            .par_iter()
            .map(|request| BatchOutcome {
                request: request.clone(),
                result: job(request),
            })
            .collect()
    });

    let mut summary = BatchSummary::default();
    for outcome in &outcomes {
        match &outcome.result {
            Ok(_) => summary.succeeded += 1,
            Err(e) => {
                summary.failed += 1;
                warn!(
                    "{} of {} failed: {}",
                    outcome.request.statement, outcome.request.filing, e
                );
            }
        }
    }
    info!(
        "Batch finished: {} succeeded, {} failed",
        summary.succeeded, summary.failed
    );

    Ok(BatchReport { outcomes, summary })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{
        CalcRelationship, DatasetVintage, Fact, FilingMetadata, FilingRef, PresentationEntry,
        StatementType, TagMetadata,
    };
    use crate::store::InMemoryFactStore;
    use chrono::NaiveDate;
    use std::collections::BTreeSet;

    /// Refuses every read of one accession.
    struct UnreachableFiling {
        inner: InMemoryFactStore,
        accession: &'static str,
    }

    impl UnreachableFiling {
        fn check(&self, accession: &str) -> Result<()> {
            if accession == self.accession {
                return Err(ReconstructionError::StoreUnavailable(format!(
                    "{} is offline",
                    accession
                )));
            }
            Ok(())
        }
    }

    impl FactStore for UnreachableFiling {
        fn presentation(
            &self,
            vintage: DatasetVintage,
            accession: &str,
            statement: StatementType,
        ) -> Result<Vec<PresentationEntry>> {
            self.check(accession)?;
            self.inner.presentation(vintage, accession, statement)
        }

        fn facts(
            &self,
            vintage: DatasetVintage,
            accession: &str,
            tags: Option<&BTreeSet<String>>,
        ) -> Result<Vec<Fact>> {
            self.check(accession)?;
            self.inner.facts(vintage, accession, tags)
        }

        fn tag_metadata(
            &self,
            vintage: DatasetVintage,
            tag: &str,
            version: &str,
        ) -> Result<Option<TagMetadata>> {
            self.inner.tag_metadata(vintage, tag, version)
        }

        fn calc_relationships(
            &self,
            vintage: DatasetVintage,
            accession: &str,
        ) -> Result<Vec<CalcRelationship>> {
            self.check(accession)?;
            self.inner.calc_relationships(vintage, accession)
        }

        fn filing_metadata(
            &self,
            vintage: DatasetVintage,
            accession: &str,
        ) -> Result<Option<FilingMetadata>> {
            self.check(accession)?;
            self.inner.filing_metadata(vintage, accession)
        }
    }

    fn vintage() -> DatasetVintage {
        DatasetVintage::new(2024, 3).unwrap()
    }

    fn filing(store: &mut InMemoryFactStore, accession: &str, assets: f64) {
        for (line, tag) in ["Assets", "LiabilitiesAndStockholdersEquity"].iter().enumerate() {
            store.insert_presentation(
                vintage(),
                PresentationEntry {
                    accession: accession.to_string(),
                    report: 2,
                    line: line as u32 + 1,
                    statement: StatementType::BalanceSheet,
                    indent: 0,
                    tag: tag.to_string(),
                    version: "us-gaap/2024".to_string(),
                    label: tag.to_string(),
                    negating: false,
                },
            );
            store.insert_fact(
                vintage(),
                Fact {
                    accession: accession.to_string(),
                    tag: tag.to_string(),
                    version: "us-gaap/2024".to_string(),
                    end_date: NaiveDate::from_ymd_opt(2024, 6, 30).unwrap(),
                    quarters: 0,
                    unit: "USD".to_string(),
                    segments: None,
                    coregistrant: None,
                    value: assets,
                },
            );
        }
    }

    fn requests(accessions: &[&str]) -> Vec<ReconstructionRequest> {
        accessions
            .iter()
            .enumerate()
            .map(|(i, a)| {
                ReconstructionRequest::new(
                    vintage(),
                    FilingRef::new(1000 + i as u64, *a),
                    StatementType::BalanceSheet,
                )
            })
            .collect()
    }

    #[test]
    fn test_batch_keeps_request_order() {
        let mut store = InMemoryFactStore::new();
        let accessions = ["0001", "0002", "0003", "0004", "0005", "0006"];
        for (i, accession) in accessions.iter().enumerate() {
            filing(&mut store, accession, 100.0 * (i + 1) as f64);
        }

        let engine = ReconstructionEngine::default();
        let report = reconstruct_batch(&engine, &store, &requests(&accessions), 3).unwrap();

        assert_eq!(report.summary, BatchSummary { succeeded: 6, failed: 0 });
        for (i, outcome) in report.outcomes.iter().enumerate() {
            assert_eq!(outcome.request.filing.accession, accessions[i]);
            let statement = outcome.result.as_ref().unwrap();
            let assets = statement.line_items()[0].value(0).unwrap();
            assert!((assets - 100.0 * (i + 1) as f64).abs() < 0.01);
        }
    }

    #[test]
    fn test_failing_filing_does_not_abort_batch() {
        let mut inner = InMemoryFactStore::new();
        filing(&mut inner, "0001", 10.0);
        filing(&mut inner, "0002", 20.0);
        filing(&mut inner, "0003", 30.0);
        let store = UnreachableFiling {
            inner,
            accession: "0002",
        };

        let engine = ReconstructionEngine::default();
        let report =
            standardize_batch(&engine, &store, &requests(&["0001", "0002", "0003", "0009"]), 0)
                .unwrap();

        assert_eq!(report.summary, BatchSummary { succeeded: 2, failed: 2 });
        assert!(report.outcomes[0].result.is_ok());
        assert!(matches!(
            report.outcomes[1].result,
            Err(ReconstructionError::StoreUnavailable(_))
        ));
        assert!(report.outcomes[2].result.is_ok());
        assert!(matches!(
            report.outcomes[3].result,
            Err(ReconstructionError::StatementAbsent { .. })
        ));

        let failed: Vec<&str> = report
            .failures()
            .map(|(request, _)| request.filing.accession.as_str())
            .collect();
        assert_eq!(failed, vec!["0002", "0009"]);
        assert_eq!(report.successes().count(), 2);
    }
}
