// profile.rs
//
// Plot-ready data for one selected gene: one series per matching feature per
// genotype, mean as the point value and std as a symmetric error bar.

use std::collections::HashMap;

use crate::matrix::{ExpressionMatrix, Stat};
use crate::query::{self, GenotypeGroups};

pub const FIRST_POSITION: f64 = 1.0;
pub const INNER_SPACING: f64 = 0.5;
pub const GENOTYPE_SPACING: f64 = 0.25;

const PALETTE: [&str; 10] = [
    "#1f77b4", "#ff7f0e", "#2ca02c", "#d62728", "#9467bd",
    "#8c564b", "#e377c2", "#7f7f7f", "#bcbd22", "#17becf",
];

/// X position per group key.
///
/// Groups of one genotype sit `INNER_SPACING` apart; the next genotype starts
/// `GENOTYPE_SPACING` after the slot following the previous genotype's last group.
pub fn x_positions(groups_by_genotype: &GenotypeGroups) -> HashMap<String, f64> {
    let mut positions = HashMap::new();
    let mut current = FIRST_POSITION;
    for (_, groups) in groups_by_genotype {
        for (i, group) in groups.iter().enumerate() {
            positions.insert(group.clone(), current + i as f64 * INNER_SPACING);
        }
        current += groups.len() as f64 * INNER_SPACING + GENOTYPE_SPACING;
    }
    positions
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProfileSeries {
    pub feature_id: String,
    pub genotype: String,
    pub groups: Vec<String>,
    pub x: Vec<f64>,
    pub mean: Vec<f64>,
    pub std: Vec<f64>,
    pub color: &'static str,
    /// Only the first series of each feature carries a legend entry.
    pub show_in_legend: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExpressionProfile {
    pub title: String,
    /// Set when there is nothing to plot.
    pub message: Option<String>,
    pub ticks: Vec<(f64, String)>,
    pub series: Vec<ProfileSeries>,
}

impl ExpressionProfile {
    pub fn empty(message: impl Into<String>) -> Self {
        Self {
            title: String::new(),
            message: Some(message.into()),
            ticks: Vec::new(),
            series: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.series.is_empty()
    }
}

pub fn build_profile(matrix: &ExpressionMatrix, gene: &str) -> ExpressionProfile {
    if gene.is_empty() {
        return ExpressionProfile::empty("No data to display");
    }
    let features = query::isoforms_for_gene(matrix, gene);
    if features.is_empty() {
        return ExpressionProfile::empty(format!("No expression data found for {}", gene));
    }

    let by_genotype = query::groups_by_genotype(matrix.groups());
    let positions = x_positions(&by_genotype);
    let value = |feature: &str, stat: Stat, group: &str| matrix.get(feature, stat, group).unwrap_or(f64::NAN);

    let mut series = Vec::with_capacity(features.len() * by_genotype.len());
    for (i, feature) in features.iter().enumerate() {
        for (genotype_idx, (genotype, groups)) in by_genotype.iter().enumerate() {
            series.push(ProfileSeries {
                feature_id: feature.clone(),
                genotype: genotype.clone(),
                groups: groups.clone(),
                x: groups.iter().map(|g| positions[g]).collect(),
                mean: groups.iter().map(|g| value(feature.as_str(), Stat::Mean, g.as_str())).collect(),
                std: groups.iter().map(|g| value(feature.as_str(), Stat::Std, g.as_str())).collect(),
                color: PALETTE[i % PALETTE.len()],
                show_in_legend: genotype_idx == 0,
            });
        }
    }

    let ticks = matrix
        .groups()
        .iter()
        .map(|g| (positions[g], g.clone()))
        .collect();

    ExpressionProfile {
        title: format!("Expression Profile: {}", gene),
        message: None,
        ticks,
        series,
    }
}
