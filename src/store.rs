//! Read-only access to the feed tables of a filing.
//!
//! [`FactStore`] is the only I/O boundary of the crate. Implementations may
//! block (database, files, network); reconstruction performs one bounded
//! read per table per statement. [`InMemoryFactStore`] keeps everything in
//! ordered maps and is what the ingestion helpers load into.

use crate::error::Result;
use crate::schema::{
    CalcRelationship, DatasetVintage, Fact, FilingMetadata, PresentationEntry, StatementType,
    TagMetadata,
};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

pub trait FactStore {
    /// Presentation rows of one statement, ordered by report then line.
    fn presentation(
        &self,
        vintage: DatasetVintage,
        accession: &str,
        statement: StatementType,
    ) -> Result<Vec<PresentationEntry>>;

    /// Facts of a filing in stable source order, optionally restricted to `tags`.
    fn facts(
        &self,
        vintage: DatasetVintage,
        accession: &str,
        tags: Option<&BTreeSet<String>>,
    ) -> Result<Vec<Fact>>;

    fn tag_metadata(
        &self,
        vintage: DatasetVintage,
        tag: &str,
        version: &str,
    ) -> Result<Option<TagMetadata>>;

    /// Declared summation relationships of a filing. Empty when the filing
    /// carries no calculation data.
    fn calc_relationships(
        &self,
        vintage: DatasetVintage,
        accession: &str,
    ) -> Result<Vec<CalcRelationship>>;

    fn filing_metadata(
        &self,
        vintage: DatasetVintage,
        accession: &str,
    ) -> Result<Option<FilingMetadata>>;

    /// Metadata for every distinct (tag, version) pair, keyed by tag.
    ///
    /// Default implementation calls `tag_metadata` once per pair.
    fn tag_metadata_batch(
        &self,
        vintage: DatasetVintage,
        pairs: &[(String, String)],
    ) -> Result<BTreeMap<String, TagMetadata>> {
        let mut out = BTreeMap::new();
        for (tag, version) in pairs {
            if out.contains_key(tag) {
                continue;
            }
            if let Some(meta) = self.tag_metadata(vintage, tag, version)? {
                out.insert(tag.clone(), meta);
            }
        }
        Ok(out)
    }
}

impl<S: FactStore + ?Sized> FactStore for &S {
    fn presentation(
        &self,
        vintage: DatasetVintage,
        accession: &str,
        statement: StatementType,
    ) -> Result<Vec<PresentationEntry>> {
        (**self).presentation(vintage, accession, statement)
    }

    fn facts(
        &self,
        vintage: DatasetVintage,
        accession: &str,
        tags: Option<&BTreeSet<String>>,
    ) -> Result<Vec<Fact>> {
        (**self).facts(vintage, accession, tags)
    }

    fn tag_metadata(
        &self,
        vintage: DatasetVintage,
        tag: &str,
        version: &str,
    ) -> Result<Option<TagMetadata>> {
        (**self).tag_metadata(vintage, tag, version)
    }

    fn calc_relationships(
        &self,
        vintage: DatasetVintage,
        accession: &str,
    ) -> Result<Vec<CalcRelationship>> {
        (**self).calc_relationships(vintage, accession)
    }

    fn filing_metadata(
        &self,
        vintage: DatasetVintage,
        accession: &str,
    ) -> Result<Option<FilingMetadata>> {
        (**self).filing_metadata(vintage, accession)
    }
}

impl<S: FactStore + ?Sized> FactStore for Arc<S> {
    fn presentation(
        &self,
        vintage: DatasetVintage,
        accession: &str,
        statement: StatementType,
    ) -> Result<Vec<PresentationEntry>> {
        (**self).presentation(vintage, accession, statement)
    }

    fn facts(
        &self,
        vintage: DatasetVintage,
        accession: &str,
        tags: Option<&BTreeSet<String>>,
    ) -> Result<Vec<Fact>> {
        (**self).facts(vintage, accession, tags)
    }

    fn tag_metadata(
        &self,
        vintage: DatasetVintage,
        tag: &str,
        version: &str,
    ) -> Result<Option<TagMetadata>> {
        (**self).tag_metadata(vintage, tag, version)
    }

    fn calc_relationships(
        &self,
        vintage: DatasetVintage,
        accession: &str,
    ) -> Result<Vec<CalcRelationship>> {
        (**self).calc_relationships(vintage, accession)
    }

    fn filing_metadata(
        &self,
        vintage: DatasetVintage,
        accession: &str,
    ) -> Result<Option<FilingMetadata>> {
        (**self).filing_metadata(vintage, accession)
    }
}

#[derive(Debug, Clone, Default)]
struct VintageTables {
    facts: BTreeMap<String, Vec<Fact>>,
    presentation: BTreeMap<String, Vec<PresentationEntry>>,
    tags: BTreeMap<(String, String), TagMetadata>,
    calc: BTreeMap<String, Vec<CalcRelationship>>,
    filings: BTreeMap<String, FilingMetadata>,
}

/// Fact store held entirely in memory. Insertion order of facts is the
/// source order duplicate resolution relies on.
#[derive(Debug, Clone, Default)]
pub struct InMemoryFactStore {
    vintages: BTreeMap<DatasetVintage, VintageTables>,
}

impl InMemoryFactStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn tables(&mut self, vintage: DatasetVintage) -> &mut VintageTables {
        self.vintages.entry(vintage).or_default()
    }

    pub fn insert_fact(&mut self, vintage: DatasetVintage, fact: Fact) {
        self.tables(vintage)
            .facts
            .entry(fact.accession.clone())
            .or_default()
            .push(fact);
    }

    pub fn insert_presentation(&mut self, vintage: DatasetVintage, entry: PresentationEntry) {
        self.tables(vintage)
            .presentation
            .entry(entry.accession.clone())
            .or_default()
            .push(entry);
    }

    pub fn insert_tag(&mut self, vintage: DatasetVintage, meta: TagMetadata) {
        self.tables(vintage)
            .tags
            .insert((meta.tag.clone(), meta.version.clone()), meta);
    }

    pub fn insert_calc(
        &mut self,
        vintage: DatasetVintage,
        accession: impl Into<String>,
        relationship: CalcRelationship,
    ) {
        self.tables(vintage)
            .calc
            .entry(accession.into())
            .or_default()
            .push(relationship);
    }

    pub fn insert_filing(
        &mut self,
        vintage: DatasetVintage,
        accession: impl Into<String>,
        metadata: FilingMetadata,
    ) {
        self.tables(vintage).filings.insert(accession.into(), metadata);
    }

    /// Accessions known for a vintage, from any table.
    pub fn accessions(&self, vintage: DatasetVintage) -> BTreeSet<String> {
        let mut out = BTreeSet::new();
        if let Some(tables) = self.vintages.get(&vintage) {
            out.extend(tables.facts.keys().cloned());
            out.extend(tables.presentation.keys().cloned());
            out.extend(tables.filings.keys().cloned());
        }
        out
    }

    pub fn fact_count(&self) -> usize {
        self.vintages
            .values()
            .flat_map(|t| t.facts.values())
            .map(Vec::len)
            .sum()
    }
}

impl FactStore for InMemoryFactStore {
    fn presentation(
        &self,
        vintage: DatasetVintage,
        accession: &str,
        statement: StatementType,
    ) -> Result<Vec<PresentationEntry>> {
        let mut rows: Vec<PresentationEntry> = self
            .vintages
            .get(&vintage)
            .and_then(|t| t.presentation.get(accession))
            .map(|rows| {
                rows.iter()
                    .filter(|r| r.statement == statement)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        rows.sort_by_key(|r| (r.report, r.line));
        Ok(rows)
    }

    fn facts(
        &self,
        vintage: DatasetVintage,
        accession: &str,
        tags: Option<&BTreeSet<String>>,
    ) -> Result<Vec<Fact>> {
        Ok(self
            .vintages
            .get(&vintage)
            .and_then(|t| t.facts.get(accession))
            .map(|facts| {
                facts
                    .iter()
                    .filter(|f| tags.map_or(true, |wanted| wanted.contains(&f.tag)))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    fn tag_metadata(
        &self,
        vintage: DatasetVintage,
        tag: &str,
        version: &str,
    ) -> Result<Option<TagMetadata>> {
        Ok(self
            .vintages
            .get(&vintage)
            .and_then(|t| t.tags.get(&(tag.to_string(), version.to_string())))
            .cloned())
    }

    fn calc_relationships(
        &self,
        vintage: DatasetVintage,
        accession: &str,
    ) -> Result<Vec<CalcRelationship>> {
        Ok(self
            .vintages
            .get(&vintage)
            .and_then(|t| t.calc.get(accession))
            .cloned()
            .unwrap_or_default())
    }

    fn filing_metadata(
        &self,
        vintage: DatasetVintage,
        accession: &str,
    ) -> Result<Option<FilingMetadata>> {
        Ok(self
            .vintages
            .get(&vintage)
            .and_then(|t| t.filings.get(accession))
            .cloned())
    }
}
