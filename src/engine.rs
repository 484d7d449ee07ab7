//! Reconstruction of one statement of one filing.
//!
//! The call sequence is fixed: presentation rows, calculation data and tag
//! metadata feed the hierarchy; facts for every referenced tag drive period
//! discovery; balance roles and beginning dates are settled before values
//! are bound. Standardization then detects anchors, maps every line and
//! aggregates the mapped values.

use crate::balancer::{StandardizedStatement, StatementBalancer};
use crate::binder::{assign_balance_roles, BeginningDates, FactIndex, ValueBinder};
use crate::config::ReconstructionConfig;
use crate::control::{detect_anchors, StructuralPattern};
use crate::date_inference::{DateInference, FiscalContext};
use crate::diagnostics::Diagnostic;
use crate::error::{ReconstructionError, Result};
use crate::hierarchy::{BalanceRole, HierarchyBuilder, HierarchySource, LineItemNode, StatementForest};
use crate::mapping::{FieldMapper, IndustryClass};
use crate::periods::discover_periods;
use crate::schema::{
    DatasetVintage, FilingMetadata, FilingRef, Period, ReconstructionRequest, StatementType,
};
use crate::store::FactStore;
use log::{debug, info, warn};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Line items and periods of one statement, with every value bound.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, JsonSchema)]
pub struct ReconstructedStatement {
    pub filing: FilingRef,
    pub vintage: DatasetVintage,
    pub statement: StatementType,
    pub periods: Vec<Period>,
    pub forest: StatementForest,
    pub representative_tag: Option<String>,
    pub filing_metadata: Option<FilingMetadata>,
    pub diagnostics: Vec<Diagnostic>,
}

impl ReconstructedStatement {
    fn absent(request: &ReconstructionRequest, metadata: Option<FilingMetadata>) -> Self {
        Self {
            filing: request.filing.clone(),
            vintage: request.vintage,
            statement: request.statement,
            periods: Vec::new(),
            forest: StatementForest::empty(),
            representative_tag: None,
            filing_metadata: metadata,
            diagnostics: vec![Diagnostic::DataAbsent {
                statement: request.statement.code().to_string(),
            }],
        }
    }

    pub fn line_items(&self) -> &[LineItemNode] {
        &self.forest.nodes
    }

    pub fn hierarchy_source(&self) -> HierarchySource {
        self.forest.source
    }

    pub fn is_empty(&self) -> bool {
        self.forest.is_empty()
    }

    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

#[derive(Debug, Clone, Default)]
pub struct ReconstructionEngine {
    config: ReconstructionConfig,
}

impl ReconstructionEngine {
    pub fn new(config: ReconstructionConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ReconstructionConfig {
        &self.config
    }

    /// A statement the filing does not present is an empty result carrying
    /// a `DataAbsent` diagnostic, not an error. Only store failures are
    /// returned as `Err`.
    pub fn reconstruct<S: FactStore + ?Sized>(
        &self,
        store: &S,
        request: &ReconstructionRequest,
    ) -> Result<ReconstructedStatement> {
        let vintage = request.vintage;
        let accession = request.filing.accession.as_str();
        let statement = request.statement;

        info!(
            "Reconstructing {} of filing {} ({})",
            statement, request.filing, vintage
        );

        let metadata = store.filing_metadata(vintage, accession)?;
        let entries = store.presentation(vintage, accession, statement)?;
        if entries.is_empty() {
            info!("Filing {} presents no {}", request.filing, statement);
            return Ok(ReconstructedStatement::absent(request, metadata));
        }

        let relationships = store.calc_relationships(vintage, accession)?;
        let pairs: Vec<(String, String)> = entries
            .iter()
            .map(|e| (e.tag.clone(), e.version.clone()))
            .collect();
        let tags = store.tag_metadata_batch(vintage, &pairs)?;

        let mut forest = HierarchyBuilder::new(self.config.indentation_fallback).build(
            &entries,
            &relationships,
            &tags,
        );
        debug!(
            "Built {:?} hierarchy of {} lines with {} roots",
            forest.source,
            forest.nodes.len(),
            forest.roots().len()
        );

        let referenced = forest.referenced_tags();
        let facts = FactIndex::new(store.facts(vintage, accession, Some(&referenced))?);
        let discovery = discover_periods(statement, &forest, &facts);

        assign_balance_roles(&mut forest, &facts, statement);

        let mut diagnostics = Vec::new();
        let beginning_dates = self.infer_beginning_dates(
            &forest,
            &facts,
            &discovery.periods,
            metadata.as_ref(),
            &mut diagnostics,
        );

        let binder = ValueBinder::new(
            &facts,
            &discovery.periods,
            &beginning_dates,
            self.config.include_unpresented_calc_children,
        );
        diagnostics.extend(binder.bind(&mut forest));

        info!(
            "Reconstructed {} lines over {} periods for {} of {}, {} diagnostics",
            forest.nodes.len(),
            discovery.periods.len(),
            statement,
            request.filing,
            diagnostics.len()
        );

        Ok(ReconstructedStatement {
            filing: request.filing.clone(),
            vintage,
            statement,
            periods: discovery.periods,
            forest,
            representative_tag: discovery.representative_tag,
            filing_metadata: metadata,
            diagnostics,
        })
    }

    pub fn standardize<S: FactStore + ?Sized>(
        &self,
        store: &S,
        request: &ReconstructionRequest,
    ) -> Result<StandardizedStatement> {
        let reconstructed = self.reconstruct(store, request)?;
        self.standardize_reconstructed(&reconstructed)
    }

    /// Maps a reconstructed statement onto the standardized fields. A
    /// statement without line items cannot be mapped.
    pub fn standardize_reconstructed(
        &self,
        reconstructed: &ReconstructedStatement,
    ) -> Result<StandardizedStatement> {
        let statement = reconstructed.statement;
        if reconstructed.is_empty() {
            return Err(ReconstructionError::StatementAbsent {
                filing: reconstructed.filing.to_string(),
                statement: statement.code().to_string(),
            });
        }

        let forest = &reconstructed.forest;
        let anchors = detect_anchors(statement, forest);
        let mapper = FieldMapper::from_config(&self.config, reconstructed.filing_metadata.as_ref());
        let outcome = mapper.map(statement, forest, &anchors);

        let balancer = StatementBalancer::new(forest, &reconstructed.periods, self.config.tolerance);
        let mut fields = balancer.aggregate(statement, &outcome.mappings);
        balancer.derive_residuals(statement, &mut fields);
        if outcome.industry != IndustryClass::Depository {
            balancer.derive_plugs(statement, &mut fields);
        }

        let mut diagnostics = reconstructed.diagnostics.clone();
        diagnostics.extend(outcome.diagnostics);
        diagnostics.extend(balancer.validate_rollups());

        if anchors.pattern == Some(StructuralPattern::LiabilitiesAndEquity) {
            match balancer.verify_accounting_identity(&fields) {
                Ok(()) => {}
                Err(ReconstructionError::AccountingIdentityViolation {
                    date,
                    assets,
                    liabilities_and_equity,
                    difference,
                }) => {
                    warn!(
                        "{} of {} does not balance on {}: difference {}",
                        statement, reconstructed.filing, date, difference
                    );
                    diagnostics.push(Diagnostic::IdentityMismatch {
                        period: date,
                        assets,
                        liabilities_and_equity,
                        difference,
                    });
                }
                Err(e) => return Err(e),
            }
        }

        info!(
            "Standardized {} of {} into {} fields ({} anchors missing)",
            statement,
            reconstructed.filing,
            fields.len(),
            anchors.missing.len()
        );

        Ok(StandardizedStatement {
            filing: reconstructed.filing.clone(),
            vintage: reconstructed.vintage,
            statement,
            periods: reconstructed.periods.clone(),
            structure: anchors.pattern,
            industry: outcome.industry,
            anchors,
            mappings: outcome.mappings,
            fields,
            diagnostics,
        })
    }

    fn infer_beginning_dates(
        &self,
        forest: &StatementForest,
        facts: &FactIndex,
        periods: &[Period],
        metadata: Option<&FilingMetadata>,
        diagnostics: &mut Vec<Diagnostic>,
    ) -> BeginningDates {
        let inference = DateInference::from_config(&self.config);
        let fiscal = metadata.and_then(FiscalContext::from_metadata);
        let mut dates = BeginningDates::new();
        let mut seen: BTreeSet<&str> = BTreeSet::new();

        let beginning = forest
            .nodes
            .iter()
            .filter(|n| n.balance_role == Some(BalanceRole::Beginning));
        for node in beginning {
            if !seen.insert(node.tag.as_str()) {
                continue;
            }
            let available = facts.instant_dates(&node.tag);

            for (index, period) in periods.iter().enumerate() {
                if period.is_instant() {
                    continue;
                }
                let Some(outcome) =
                    inference.infer(period.end_date, period.quarters, &available, fiscal.as_ref())
                else {
                    diagnostics.push(Diagnostic::DateInferenceMiss {
                        tag: node.tag.clone(),
                        end_date: period.end_date,
                        quarters: period.quarters,
                    });
                    continue;
                };

                if outcome.suspect {
                    diagnostics.push(Diagnostic::DateInferenceSuspect {
                        tag: node.tag.clone(),
                        end_date: period.end_date,
                        quarters: period.quarters,
                        selected: outcome.selected,
                        expected: outcome.expected,
                        distance_days: outcome.distance_days,
                    });
                }
                dates.insert((node.tag.clone(), index), outcome.selected);
            }
        }

        dates
    }
}
