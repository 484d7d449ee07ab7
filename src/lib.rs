//! # Financial Statement Reconstructor
//!
//! A library for rebuilding standardized, multi-period financial statements
//! from the flat fact tables of regulatory filings (numeric facts,
//! presentation rows, tag metadata and declared calculations).
//!
//! ## Core Concepts
//!
//! - **Hierarchy**: presentation rows plus calculation relationships become a
//!   forest of line items, one node per presented row
//! - **Periods**: the columns a statement actually displays, discovered from
//!   the facts of a representative tag
//! - **Binding**: every line gets one value per period, reported when a
//!   consolidated fact exists and summed from its children otherwise
//! - **Anchors**: canonical totals (total assets, net income, ...) located by
//!   tag identity or label patterns, used as landmarks for classification
//! - **Mapping**: every line lands on a standardized field, an `other_*`
//!   bucket of its section, or an explicit header marker
//!
//! ## Example
//!
//! ```rust,ignore
//! use financial_statement_reconstructor::*;
//!
//! let mut store = InMemoryFactStore::new();
//! load_feed(&mut store, vintage, rows)?;
//!
//! let request = ReconstructionRequest::new(
//!     DatasetVintage::new(2024, 4)?,
//!     FilingRef::new(320193, "0000320193-24-000123"),
//!     StatementType::BalanceSheet,
//! );
//!
//! let statement = reconstruct(&store, &request)?;
//! for node in statement.line_items() {
//!     println!("{:>3} {} {:?}", node.line, node.label, node.value(0));
//! }
//!
//! let standardized = standardize(&store, &request)?;
//! println!("{}", standardized.to_json_pretty()?);
//! ```

pub mod balancer;
pub mod batch;
pub mod binder;
pub mod chart_of_accounts;
pub mod config;
pub mod control;
pub mod date_inference;
pub mod diagnostics;
pub mod engine;
pub mod error;
pub mod hierarchy;
pub mod ingestion;
pub mod mapping;
pub mod pattern;
pub mod periods;
pub mod schema;
pub mod store;
pub mod utils;

pub use balancer::{
    validate_rollups, verify_accounting_identity, StandardizedField, StandardizedStatement,
    StatementBalancer,
};
pub use batch::{reconstruct_batch, standardize_batch, BatchOutcome, BatchReport, BatchSummary};
pub use binder::{FactIndex, PeriodValue, ValueBinder, ValueOrigin};
pub use chart_of_accounts::{ChartOfAccounts, FieldEntry, FieldKind, Section};
pub use config::{CustomRule, ReconstructionConfig, Tolerance};
pub use control::{detect_anchors, Anchor, AnchorSet, ResolvedAnchor, StructuralPattern};
pub use date_inference::{infer_beginning_date, DateInference, FiscalContext, InferenceOutcome};
pub use diagnostics::Diagnostic;
pub use engine::{ReconstructedStatement, ReconstructionEngine};
pub use error::{ReconstructionError, Result};
pub use hierarchy::{
    BalanceRole, CalcLink, HierarchyBuilder, HierarchySource, LineItemNode, StatementForest,
};
pub use ingestion::*;
pub use mapping::{
    FieldMapper, FieldMapping, IndustryClass, MappingOutcome, MappingStrategy, MappingTarget,
};
pub use pattern::{evaluate_pattern, EvalContext, Pattern, PatternError, PatternMatch};
pub use periods::{discover_periods, period_label, PeriodDiscovery};
pub use schema::*;
pub use store::{FactStore, InMemoryFactStore};
pub use utils::*;

/// Reconstructs one statement with the default configuration.
pub fn reconstruct<S: FactStore + ?Sized>(
    store: &S,
    request: &ReconstructionRequest,
) -> Result<ReconstructedStatement> {
    ReconstructionEngine::default().reconstruct(store, request)
}

/// Reconstructs and standardizes one statement with the default configuration.
pub fn standardize<S: FactStore + ?Sized>(
    store: &S,
    request: &ReconstructionRequest,
) -> Result<StandardizedStatement> {
    ReconstructionEngine::default().standardize(store, request)
}
