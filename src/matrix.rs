// matrix.rs
//
// Typed aggregation pipeline:
//   join_samples -> filter_features -> rollup_genes -> aggregate_groups
// Each stage takes and returns owned values; NaN marks "no measurement".

use log::{debug, info, warn};
use ndarray::{s, Array2, ArrayView1, Axis};
use statrs::statistics::Statistics;
use std::collections::{HashMap, HashSet};

use crate::ids::{self, FeatureFilter};
use crate::quant::SampleTable;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stat {
    Mean,
    Std,
}

impl Stat {
    pub const ALL: [Stat; 2] = [Stat::Mean, Stat::Std];

    pub fn as_str(&self) -> &'static str {
        match self {
            Stat::Mean => "mean",
            Stat::Std => "std",
        }
    }
}

impl std::fmt::Display for Stat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FeatureKind {
    Transcript,
    /// Derived by summing the transcripts that share a gene id.
    Gene,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Feature {
    pub id: String,
    pub kind: FeatureKind,
}

impl Feature {
    fn transcript(id: impl Into<String>) -> Self {
        Self { id: id.into(), kind: FeatureKind::Transcript }
    }

    fn gene(id: impl Into<String>) -> Self {
        Self { id: id.into(), kind: FeatureKind::Gene }
    }
}

/// Feature x sample abundances before replicate grouping.
#[derive(Debug, Clone)]
pub struct SampleMatrix {
    features: Vec<Feature>,
    samples: Vec<String>,
    values: Array2<f64>,
}

impl SampleMatrix {
    pub fn features(&self) -> &[Feature] {
        &self.features
    }

    pub fn samples(&self) -> &[String] {
        &self.samples
    }

    pub fn position(&self, id: &str, kind: FeatureKind) -> Option<usize> {
        self.features.iter().position(|f| f.id == id && f.kind == kind)
    }

    /// Value for one feature in one sample; NaN if the sample did not report it.
    pub fn get(&self, id: &str, kind: FeatureKind, sample: &str) -> Option<f64> {
        let row = self.position(id, kind)?;
        let col = self.samples.iter().position(|s| s == sample)?;
        Some(self.values[[row, col]])
    }
}

/// Outer-joins per-sample tables into one matrix, one column per sample key.
///
/// Columns are ordered by sample key and rows by first appearance, so the
/// result does not depend on the order in which tables were parsed.
pub fn join_samples(mut tables: Vec<SampleTable>) -> SampleMatrix {
    tables.sort_by(|a, b| a.sample_key.cmp(&b.sample_key));

    let mut row_of: HashMap<String, usize> = HashMap::new();
    let mut features: Vec<Feature> = Vec::new();
    for table in &tables {
        for (id, _) in &table.records {
            if !row_of.contains_key(id) {
                row_of.insert(id.clone(), features.len());
                features.push(Feature::transcript(id.clone()));
            }
        }
    }

    let mut values = Array2::<f64>::from_elem((features.len(), tables.len()), f64::NAN);
    for (col, table) in tables.iter().enumerate() {
        for (id, tpm) in &table.records {
            let row = row_of[id];
            if !values[[row, col]].is_nan() {
                debug!(
                    "Transcript {} listed more than once in sample {}; keeping the last value.",
                    id, table.sample_key
                );
            }
            values[[row, col]] = *tpm;
        }
    }

    let samples = tables.into_iter().map(|t| t.sample_key).collect();
    SampleMatrix { features, samples, values }
}

/// Drops every row whose id the filter rejects.
pub fn filter_features(matrix: SampleMatrix, filter: &FeatureFilter) -> SampleMatrix {
    let keep: Vec<usize> = matrix
        .features
        .iter()
        .enumerate()
        .filter(|(_, f)| filter.accepts(&f.id))
        .map(|(idx, _)| idx)
        .collect();

    let dropped = matrix.features.len() - keep.len();
    if dropped > 0 {
        info!(
            "Dropped {} identifier(s) that contain '-' or lack the organism prefix '{}'.",
            dropped,
            filter.organism_prefix()
        );
        debug!(
            "Dropped identifiers (first 5): {:?}",
            matrix
                .features
                .iter()
                .filter(|f| !filter.accepts(&f.id))
                .take(5)
                .map(|f| f.id.as_str())
                .collect::<Vec<_>>()
        );
        let dropped_rows: Vec<usize> = (0..matrix.features.len())
            .filter(|idx| keep.binary_search(idx).is_err())
            .collect();
        for (sample, count) in matrix
            .samples
            .iter()
            .zip(reported_counts(&matrix.values, &dropped_rows))
        {
            debug!("Sample {}: {} dropped identifier(s) reported.", sample, count);
        }
    }

    let values = matrix.values.select(Axis(0), &keep);
    let features = keep.iter().map(|&idx| matrix.features[idx].clone()).collect();
    SampleMatrix {
        features,
        samples: matrix.samples,
        values,
    }
}

/// Non-missing values per sample column, counted over `rows` only.
fn reported_counts(values: &Array2<f64>, rows: &[usize]) -> Vec<usize> {
    values
        .select(Axis(0), rows)
        .axis_iter(Axis(1))
        .map(|column| column.iter().filter(|v| !v.is_nan()).count())
        .collect()
}

/// Appends one gene row per distinct gene id, summing its transcripts per sample.
///
/// Missing transcripts contribute nothing to the sum; a gene with no reported
/// transcript in a sample stays missing there. This differs from
/// `aggregate_groups`, which never counts a missing value.
///
/// A raw id without a dot maps to a gene id equal to itself. Both rows are kept,
/// distinguished by `FeatureKind`, and the collision is logged.
pub fn rollup_genes(matrix: SampleMatrix) -> SampleMatrix {
    let n_samples = matrix.samples.len();

    let mut gene_row_of: HashMap<&str, usize> = HashMap::new();
    let mut gene_ids: Vec<&str> = Vec::new();
    let mut members: Vec<Vec<usize>> = Vec::new();
    for (row, feature) in matrix.features.iter().enumerate() {
        let gene = ids::gene_id(&feature.id);
        let gene_row = *gene_row_of.entry(gene).or_insert_with(|| {
            gene_ids.push(gene);
            members.push(Vec::new());
            gene_ids.len() - 1
        });
        members[gene_row].push(row);
    }

    let raw_ids: HashSet<&str> = matrix.features.iter().map(|f| f.id.as_str()).collect();
    let collisions: Vec<&str> = gene_ids
        .iter()
        .copied()
        .filter(|gene| raw_ids.contains(gene))
        .collect();
    if !collisions.is_empty() {
        warn!(
            "{} gene id(s) also appear as raw transcript ids (e.g. {:?}); both rows are kept.",
            collisions.len(),
            collisions.iter().take(3).collect::<Vec<_>>()
        );
    }

    let mut gene_values = Array2::<f64>::from_elem((gene_ids.len(), n_samples), f64::NAN);
    for (gene_row, rows) in members.iter().enumerate() {
        for col in 0..n_samples {
            let present: Vec<f64> = rows
                .iter()
                .map(|&row| matrix.values[[row, col]])
                .filter(|v| !v.is_nan())
                .collect();
            if !present.is_empty() {
                gene_values[[gene_row, col]] = present.iter().sum();
            }
        }
    }

    let n_transcripts = matrix.features.len();
    let mut values = Array2::<f64>::from_elem((n_transcripts + gene_ids.len(), n_samples), f64::NAN);
    values.slice_mut(s![..n_transcripts, ..]).assign(&matrix.values);
    values.slice_mut(s![n_transcripts.., ..]).assign(&gene_values);

    let mut features = matrix.features.clone();
    features.extend(gene_ids.iter().map(|gene| Feature::gene(*gene)));
    debug!(
        "Gene rollup: {} transcript row(s) -> {} gene row(s).",
        n_transcripts,
        gene_ids.len()
    );
    SampleMatrix {
        features,
        samples: matrix.samples,
        values,
    }
}

/// Replicate-group summary: one mean and one std per feature and group.
#[derive(Debug, Clone)]
pub struct ExpressionMatrix {
    features: Vec<Feature>,
    groups: Vec<String>,
    mean: Array2<f64>,
    std: Array2<f64>,
    row_of: HashMap<String, usize>,
}

impl ExpressionMatrix {
    fn new(features: Vec<Feature>, groups: Vec<String>, mean: Array2<f64>, std: Array2<f64>) -> Self {
        let mut row_of = HashMap::with_capacity(features.len());
        for (row, feature) in features.iter().enumerate() {
            row_of.entry(feature.id.clone()).or_insert(row);
        }
        Self {
            features,
            groups,
            mean,
            std,
            row_of,
        }
    }

    pub fn features(&self) -> &[Feature] {
        &self.features
    }

    /// Group keys in build order.
    pub fn groups(&self) -> &[String] {
        &self.groups
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    /// Row labels as `(feature, stat)` pairs, mean before std for each feature.
    pub fn row_labels(&self) -> impl Iterator<Item = (&Feature, Stat)> + '_ {
        self.features
            .iter()
            .flat_map(|f| Stat::ALL.into_iter().map(move |stat| (f, stat)))
    }

    fn table(&self, stat: Stat) -> &Array2<f64> {
        match stat {
            Stat::Mean => &self.mean,
            Stat::Std => &self.std,
        }
    }

    /// Per-group values for the first row carrying `feature_id`.
    pub fn row(&self, feature_id: &str, stat: Stat) -> Option<ArrayView1<'_, f64>> {
        let row = *self.row_of.get(feature_id)?;
        Some(self.table(stat).row(row))
    }

    pub fn row_at(&self, row: usize, stat: Stat) -> ArrayView1<'_, f64> {
        self.table(stat).row(row)
    }

    /// `None` for an unknown feature or group; `Some(NaN)` for an undefined statistic.
    pub fn get(&self, feature_id: &str, stat: Stat, group: &str) -> Option<f64> {
        let col = self.groups.iter().position(|g| g == group)?;
        self.row(feature_id, stat).map(|row| row[col])
    }

    pub fn get_kind(&self, feature_id: &str, kind: FeatureKind, stat: Stat, group: &str) -> Option<f64> {
        let row = self
            .features
            .iter()
            .position(|f| f.id == feature_id && f.kind == kind)?;
        let col = self.groups.iter().position(|g| g == group)?;
        Some(self.table(stat)[[row, col]])
    }
}

/// Collapses sample columns into replicate groups.
///
/// Missing values are skipped: the mean and the Bessel-corrected std use only
/// the samples that reported the feature. One reported value gives a NaN std,
/// none gives NaN for both.
pub fn aggregate_groups(matrix: SampleMatrix) -> ExpressionMatrix {
    let mut groups: Vec<String> = Vec::new();
    let mut columns: Vec<Vec<usize>> = Vec::new();
    for (col, sample) in matrix.samples.iter().enumerate() {
        let group = ids::group_key(sample);
        match groups.iter().position(|g| g == group) {
            Some(idx) => columns[idx].push(col),
            None => {
                groups.push(group.to_string());
                columns.push(vec![col]);
            }
        }
    }

    let n_features = matrix.features.len();
    let mut mean = Array2::<f64>::from_elem((n_features, groups.len()), f64::NAN);
    let mut std = Array2::<f64>::from_elem((n_features, groups.len()), f64::NAN);
    for (row, sample_values) in matrix.values.axis_iter(Axis(0)).enumerate() {
        for (group_idx, cols) in columns.iter().enumerate() {
            let present: Vec<f64> = cols
                .iter()
                .map(|&col| sample_values[col])
                .filter(|v| !v.is_nan())
                .collect();
            if present.is_empty() {
                continue;
            }
            mean[[row, group_idx]] = present.iter().mean();
            std[[row, group_idx]] = present.iter().std_dev();
        }
    }

    debug!(
        "Aggregated {} sample(s) into {} group(s) over {} feature(s).",
        matrix.samples.len(),
        groups.len(),
        n_features
    );
    ExpressionMatrix::new(matrix.features, groups, mean, std)
}

/// Runs the full pipeline over parsed sample tables.
pub fn build_expression_matrix(tables: Vec<SampleTable>, filter: &FeatureFilter) -> ExpressionMatrix {
    let joined = join_samples(tables);
    let filtered = filter_features(joined, filter);
    let rolled = rollup_genes(filtered);
    aggregate_groups(rolled)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(key: &str, records: &[(&str, f64)]) -> SampleTable {
        SampleTable {
            sample_key: key.to_string(),
            records: records.iter().map(|(id, v)| (id.to_string(), *v)).collect(),
        }
    }

    #[test]
    fn join_marks_absent_transcripts_missing() {
        let joined = join_samples(vec![
            table("g_c_2", &[("AT1.1", 2.0)]),
            table("g_c_1", &[("AT1.1", 1.0), ("AT2.1", 5.0)]),
        ]);
        assert_eq!(joined.samples(), &["g_c_1".to_string(), "g_c_2".to_string()]);
        assert_eq!(joined.get("AT2.1", FeatureKind::Transcript, "g_c_1"), Some(5.0));
        assert!(joined
            .get("AT2.1", FeatureKind::Transcript, "g_c_2")
            .is_some_and(f64::is_nan));
    }

    #[test]
    fn dropped_ids_are_counted_per_sample() {
        let joined = join_samples(vec![
            table("g_c_1", &[("AT1.1", 1.0), ("BT2.1", 2.0), ("AT-3.1", 0.0)]),
            table("g_c_2", &[("AT1.1", 4.0), ("AT-3.1", 1.5)]),
        ]);
        let dropped: Vec<usize> = joined
            .features()
            .iter()
            .enumerate()
            .filter(|(_, f)| !FeatureFilter::default().accepts(&f.id))
            .map(|(idx, _)| idx)
            .collect();
        assert_eq!(reported_counts(&joined.values, &dropped), vec![2, 1]);

        let filtered = filter_features(joined, &FeatureFilter::default());
        let ids: Vec<&str> = filtered.features().iter().map(|f| f.id.as_str()).collect();
        assert_eq!(ids, vec!["AT1.1"]);
    }

    #[test]
    fn rollup_sums_present_isoforms_and_keeps_missing_genes_missing() {
        let joined = join_samples(vec![
            table("g_c_1", &[("AT1.1", 1.0), ("AT1.2", 2.0)]),
            table("g_c_2", &[("AT1.1", 4.0), ("AT3.1", 1.0)]),
        ]);
        let rolled = rollup_genes(joined);
        assert_eq!(rolled.get("AT1", FeatureKind::Gene, "g_c_1"), Some(3.0));
        assert_eq!(rolled.get("AT1", FeatureKind::Gene, "g_c_2"), Some(4.0));
        assert!(rolled.get("AT3", FeatureKind::Gene, "g_c_1").is_some_and(f64::is_nan));
    }

    #[test]
    fn rollup_keeps_colliding_bare_id_as_separate_row() {
        let joined = join_samples(vec![table("g_c_1", &[("AT1", 1.0), ("AT1.1", 2.0)])]);
        let rolled = rollup_genes(joined);
        assert_eq!(rolled.get("AT1", FeatureKind::Transcript, "g_c_1"), Some(1.0));
        assert_eq!(rolled.get("AT1", FeatureKind::Gene, "g_c_1"), Some(3.0));
    }

    #[test]
    fn aggregate_ignores_missing_and_uses_bessel_std() {
        let joined = join_samples(vec![
            table("g_c_1", &[("AT1.1", 1.0), ("AT2.1", 7.0)]),
            table("g_c_2", &[("AT1.1", 3.0)]),
            table("g_c_3", &[("AT1.1", 5.0)]),
        ]);
        let agg = aggregate_groups(joined);
        assert_eq!(agg.groups(), &["g_c".to_string()]);
        let mean = agg.get("AT1.1", Stat::Mean, "g_c").unwrap();
        let std = agg.get("AT1.1", Stat::Std, "g_c").unwrap();
        assert!((mean - 3.0).abs() < 1e-12);
        assert!((std - 2.0).abs() < 1e-12);
        assert_eq!(agg.get("AT2.1", Stat::Mean, "g_c"), Some(7.0));
        assert!(agg.get("AT2.1", Stat::Std, "g_c").unwrap().is_nan());
    }

    #[test]
    fn row_labels_pair_each_feature_with_both_stats() {
        let agg = build_expression_matrix(vec![table("g_c_1", &[("AT1.1", 1.0)])], &FeatureFilter::default());
        let labels: Vec<(String, Stat)> = agg.row_labels().map(|(f, s)| (f.id.clone(), s)).collect();
        assert_eq!(
            labels,
            vec![
                ("AT1.1".to_string(), Stat::Mean),
                ("AT1.1".to_string(), Stat::Std),
                ("AT1".to_string(), Stat::Mean),
                ("AT1".to_string(), Stat::Std),
            ]
        );
    }
}
