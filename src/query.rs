// query.rs

use std::collections::HashSet;
use std::sync::Arc;

use crate::aggregator::ExpressionAggregator;
use crate::error::Result;
use crate::ids;
use crate::matrix::ExpressionMatrix;

/// Group keys partitioned by genotype, both levels in first-seen order.
pub type GenotypeGroups = Vec<(String, Vec<String>)>;

/// Read-only lookups over the aggregator's matrix.
///
/// Only `matrix` triggers a build. The other queries read whatever is cached
/// and return empty results while nothing has been loaded.
#[derive(Debug, Clone, Copy)]
pub struct QueryFacade<'a> {
    aggregator: &'a ExpressionAggregator,
}

impl<'a> QueryFacade<'a> {
    pub fn new(aggregator: &'a ExpressionAggregator) -> Self {
        Self { aggregator }
    }

    pub fn matrix(&self) -> Result<Arc<ExpressionMatrix>> {
        self.aggregator.load()
    }

    /// Feature ids (transcripts and genes) starting with `prefix`, in row order, without duplicates.
    pub fn isoforms_for_gene(&self, prefix: &str) -> Vec<String> {
        self.aggregator
            .cached()
            .map(|matrix| isoforms_for_gene(&matrix, prefix))
            .unwrap_or_default()
    }

    pub fn sample_groups(&self) -> Vec<String> {
        self.aggregator
            .cached()
            .map(|matrix| matrix.groups().to_vec())
            .unwrap_or_default()
    }

    pub fn groups_by_genotype(&self) -> GenotypeGroups {
        groups_by_genotype(&self.sample_groups())
    }
}

pub fn isoforms_for_gene(matrix: &ExpressionMatrix, prefix: &str) -> Vec<String> {
    let mut seen: HashSet<&str> = HashSet::new();
    matrix
        .features()
        .iter()
        .map(|f| f.id.as_str())
        .filter(|id| id.starts_with(prefix) && seen.insert(*id))
        .map(str::to_string)
        .collect()
}

pub fn groups_by_genotype<S: AsRef<str>>(groups: &[S]) -> GenotypeGroups {
    let mut out: GenotypeGroups = Vec::new();
    for group in groups {
        let group = group.as_ref();
        let genotype = ids::genotype_key(group);
        match out.iter_mut().find(|(g, _)| g == genotype) {
            Some((_, members)) => members.push(group.to_string()),
            None => out.push((genotype.to_string(), vec![group.to_string()])),
        }
    }
    out
}
