use crate::binder::PeriodValue;
use crate::schema::{BalanceSide, CalcRelationship, PresentationEntry, TagMetadata};
use log::debug;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// One summand of a calculated line.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, JsonSchema)]
pub struct CalcLink {
    pub tag: String,
    pub weight: f64,
    pub label: String,

    #[schemars(description = "Line position of the presented child; None when the child is not presented")]
    pub line: Option<u32>,
}

/// How an instant-only line of a flow statement is bound.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum BalanceRole {
    Beginning,
    Ending,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum HierarchySource {
    Calculation,
    Indentation,
    Flat,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, JsonSchema)]
pub struct LineItemNode {
    #[schemars(description = "1-based position across the statement's presentation rows")]
    pub line: u32,
    pub report: u32,
    pub source_line: u32,
    pub label: String,
    pub tag: String,
    pub version: String,
    pub indent: u8,
    pub datatype: Option<String>,
    pub is_abstract: bool,
    pub is_custom: bool,
    pub balance: Option<BalanceSide>,
    pub negating: bool,
    pub is_sum: bool,
    pub parent_line: Option<u32>,
    pub calc_children: Vec<CalcLink>,
    pub balance_role: Option<BalanceRole>,

    #[schemars(description = "One entry per discovered period, in period order")]
    pub values: Vec<Option<PeriodValue>>,
}

impl LineItemNode {
    fn from_entry(line: u32, entry: &PresentationEntry, meta: Option<&TagMetadata>) -> Self {
        Self {
            line,
            report: entry.report,
            source_line: entry.line,
            label: entry.label.clone(),
            tag: entry.tag.clone(),
            version: entry.version.clone(),
            indent: entry.indent,
            datatype: meta.and_then(|m| m.datatype.clone()),
            is_abstract: meta.map(|m| m.is_abstract).unwrap_or(false),
            is_custom: meta.map(|m| m.is_custom).unwrap_or(false),
            balance: meta.and_then(|m| m.balance),
            negating: entry.negating,
            is_sum: false,
            parent_line: None,
            calc_children: Vec::new(),
            balance_role: None,
            values: Vec::new(),
        }
    }

    pub fn value(&self, period_index: usize) -> Option<f64> {
        self.values
            .get(period_index)
            .and_then(|v| v.as_ref())
            .map(|v| v.value)
    }

    pub fn has_any_value(&self) -> bool {
        self.values.iter().any(Option::is_some)
    }
}

/// Line items of one statement of one filing, in presentation order.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, JsonSchema)]
pub struct StatementForest {
    pub nodes: Vec<LineItemNode>,
    pub source: HierarchySource,
    pub main_report: Option<u32>,

    #[schemars(description = "Declared sums whose parent tag is not presented, keyed by parent tag")]
    pub unpresented_sums: BTreeMap<String, Vec<CalcLink>>,
}

impl StatementForest {
    pub fn empty() -> Self {
        Self {
            nodes: Vec::new(),
            source: HierarchySource::Flat,
            main_report: None,
            unpresented_sums: BTreeMap::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn node(&self, line: u32) -> Option<&LineItemNode> {
        line.checked_sub(1)
            .and_then(|index| self.nodes.get(index as usize))
    }

    pub fn node_mut(&mut self, line: u32) -> Option<&mut LineItemNode> {
        line.checked_sub(1)
            .and_then(move |index| self.nodes.get_mut(index as usize))
    }

    pub fn roots(&self) -> Vec<u32> {
        self.nodes
            .iter()
            .filter(|n| n.parent_line.is_none())
            .map(|n| n.line)
            .collect()
    }

    pub fn children_of(&self, line: u32) -> Vec<u32> {
        self.nodes
            .iter()
            .filter(|n| n.parent_line == Some(line))
            .map(|n| n.line)
            .collect()
    }

    /// Ancestors of `line`, nearest first.
    pub fn ancestors(&self, line: u32) -> Vec<u32> {
        let mut out = Vec::new();
        let mut current = self.node(line).and_then(|n| n.parent_line);
        while let Some(parent) = current {
            if out.contains(&parent) {
                break;
            }
            out.push(parent);
            current = self.node(parent).and_then(|n| n.parent_line);
        }
        out
    }

    pub fn depth(&self, line: u32) -> usize {
        self.ancestors(line).len()
    }

    /// Every distinct tag the statement needs facts for: presented tags plus
    /// calculation children that are not presented.
    pub fn referenced_tags(&self) -> BTreeSet<String> {
        let mut tags: BTreeSet<String> = self.nodes.iter().map(|n| n.tag.clone()).collect();
        for node in &self.nodes {
            tags.extend(node.calc_children.iter().map(|c| c.tag.clone()));
        }
        for (parent, children) in &self.unpresented_sums {
            tags.insert(parent.clone());
            tags.extend(children.iter().map(|c| c.tag.clone()));
        }
        tags
    }
}

pub struct HierarchyBuilder {
    indentation_fallback: bool,
}

impl HierarchyBuilder {
    pub fn new(indentation_fallback: bool) -> Self {
        Self {
            indentation_fallback,
        }
    }

    /// Builds the forest of one statement. `entries` must all belong to the
    /// same filing and statement; no entries gives an empty forest.
    pub fn build(
        &self,
        entries: &[PresentationEntry],
        relationships: &[CalcRelationship],
        metadata: &BTreeMap<String, TagMetadata>,
    ) -> StatementForest {
        if entries.is_empty() {
            return StatementForest::empty();
        }

        let mut ordered: Vec<&PresentationEntry> = entries.iter().collect();
        ordered.sort_by_key(|e| (e.report, e.line));

        let nodes: Vec<LineItemNode> = ordered
            .iter()
            .enumerate()
            .map(|(i, entry)| {
                LineItemNode::from_entry(i as u32 + 1, entry, metadata.get(&entry.tag))
            })
            .collect();

        let mut forest = StatementForest {
            main_report: main_report(&nodes),
            nodes,
            source: HierarchySource::Flat,
            unpresented_sums: BTreeMap::new(),
        };

        let linked = self.apply_calculations(&mut forest, relationships);
        if linked {
            forest.source = HierarchySource::Calculation;
        } else if self.indentation_fallback && apply_indentation(&mut forest) {
            forest.source = HierarchySource::Indentation;
        }

        debug!(
            "Built {} line items with {} roots from {:?}",
            forest.nodes.len(),
            forest.roots().len(),
            forest.source
        );
        forest
    }

    /// Returns whether any declared relationship touched a presented line.
    fn apply_calculations(
        &self,
        forest: &mut StatementForest,
        relationships: &[CalcRelationship],
    ) -> bool {
        let mut tag_lines: BTreeMap<String, Vec<u32>> = BTreeMap::new();
        for node in &forest.nodes {
            tag_lines.entry(node.tag.clone()).or_default().push(node.line);
        }

        let mut touched = false;
        for relationship in relationships {
            let parent_line = match tag_lines.get(&relationship.parent) {
                Some(lines) => parent_occurrence(forest, lines),
                None => {
                    let any_child_presented = relationship
                        .children
                        .iter()
                        .any(|c| tag_lines.contains_key(&c.tag));
                    if any_child_presented {
                        let links = relationship
                            .children
                            .iter()
                            .map(|child| CalcLink {
                                tag: child.tag.clone(),
                                weight: child.weight,
                                label: child.label.clone().unwrap_or_else(|| child.tag.clone()),
                                line: None,
                            })
                            .collect::<Vec<_>>();
                        merge_links(
                            forest
                                .unpresented_sums
                                .entry(relationship.parent.clone())
                                .or_default(),
                            links,
                        );
                    }
                    continue;
                }
            };

            touched = true;
            let mut links = Vec::with_capacity(relationship.children.len());
            for child in &relationship.children {
                let child_line = tag_lines
                    .get(&child.tag)
                    .and_then(|lines| child_occurrence(forest, lines, parent_line));

                if let Some(child_line) = child_line {
                    attach(forest, child_line, parent_line);
                }

                let label = child_line
                    .and_then(|l| forest.node(l))
                    .map(|n| n.label.clone())
                    .or_else(|| child.label.clone())
                    .unwrap_or_else(|| child.tag.clone());

                links.push(CalcLink {
                    tag: child.tag.clone(),
                    weight: child.weight,
                    label,
                    line: child_line,
                });
            }

            if let Some(parent) = forest.node_mut(parent_line) {
                parent.is_sum = parent.is_sum || !links.is_empty();
                merge_links(&mut parent.calc_children, links);
            }
        }

        touched
    }
}

fn main_report(nodes: &[LineItemNode]) -> Option<u32> {
    let mut counts: BTreeMap<u32, usize> = BTreeMap::new();
    for node in nodes {
        *counts.entry(node.report).or_default() += 1;
    }
    // ties go to the lower report number
    counts
        .into_iter()
        .max_by(|(ra, ca), (rb, cb)| ca.cmp(cb).then(rb.cmp(ra)))
        .map(|(report, _)| report)
}

fn parent_occurrence(forest: &StatementForest, lines: &[u32]) -> u32 {
    lines
        .iter()
        .copied()
        .find(|&l| forest.node(l).map(|n| n.report) == forest.main_report)
        .unwrap_or(lines[0])
}

/// Occurrences in the parent's own report win over those in other reports
/// (parentheticals, schedules).
fn child_occurrence(forest: &StatementForest, lines: &[u32], parent_line: u32) -> Option<u32> {
    let report = forest.node(parent_line).map(|n| n.report);
    let same_report: Vec<u32> = lines
        .iter()
        .copied()
        .filter(|&l| forest.node(l).map(|n| n.report) == report)
        .collect();
    closest_occurrence(&same_report, parent_line).or_else(|| closest_occurrence(lines, parent_line))
}

/// Occurrence nearest to the parent, preferring one that precedes it on ties.
fn closest_occurrence(lines: &[u32], parent_line: u32) -> Option<u32> {
    lines
        .iter()
        .copied()
        .filter(|&l| l != parent_line)
        .min_by_key(|&l| (l.abs_diff(parent_line), l > parent_line))
}

fn attach(forest: &mut StatementForest, child_line: u32, parent_line: u32) {
    let already_linked = forest
        .node(child_line)
        .map(|n| n.parent_line.is_some())
        .unwrap_or(true);
    if already_linked {
        return;
    }
    if parent_line == child_line || forest.ancestors(parent_line).contains(&child_line) {
        debug!(
            "Dropping link {} -> {}: it would close a cycle",
            parent_line, child_line
        );
        return;
    }
    if let Some(child) = forest.node_mut(child_line) {
        child.parent_line = Some(parent_line);
    }
}

fn merge_links(existing: &mut Vec<CalcLink>, incoming: Vec<CalcLink>) {
    for link in incoming {
        if !existing.iter().any(|l| l.tag == link.tag) {
            existing.push(link);
        }
    }
}

/// Parent of each row is the nearest preceding row with a smaller indent.
/// Non-abstract parents become sums with weights from their balance sides.
fn apply_indentation(forest: &mut StatementForest) -> bool {
    let mut stack: Vec<(u8, u32)> = Vec::new();
    let mut links: Vec<(u32, u32)> = Vec::new();

    for node in &forest.nodes {
        while stack.last().map_or(false, |&(indent, _)| indent >= node.indent) {
            stack.pop();
        }
        if let Some(&(_, parent)) = stack.last() {
            links.push((node.line, parent));
        }
        stack.push((node.indent, node.line));
    }

    if links.is_empty() {
        return false;
    }

    for &(child, parent) in &links {
        let (tag, label, balance) = match forest.node(child) {
            Some(n) => (n.tag.clone(), n.label.clone(), n.balance),
            None => continue,
        };
        if let Some(node) = forest.node_mut(child) {
            node.parent_line = Some(parent);
        }
        if let Some(parent_node) = forest.node_mut(parent) {
            let weight = match (parent_node.balance, balance) {
                (Some(p), Some(c)) if p != c => -1.0,
                _ => 1.0,
            };
            parent_node.is_sum = !parent_node.is_abstract;
            parent_node.calc_children.push(CalcLink {
                tag,
                weight,
                label,
                line: Some(child),
            });
        }
    }

    true
}
