// quant.rs

use indicatif::ProgressBar;
use log::{debug, info};
use rayon::prelude::*;
use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};

use crate::config::AggregatorConfig;
use crate::error::{ProfileError, Result};

/// One sample's `transcript id -> abundance` rows, in file order.
#[derive(Debug, Clone, PartialEq)]
pub struct SampleTable {
    pub sample_key: String,
    pub records: Vec<(String, f64)>,
}

/// Supplies parsed per-sample tables to the aggregator.
///
/// Implementors perform the filesystem scan; the aggregator calls `scan` at most
/// once per cached matrix.
pub trait QuantSource: Send + Sync {
    fn scan(&self, config: &AggregatorConfig) -> Result<Vec<SampleTable>>;
}

/// Reads `<root>/<sample>/<quant file>` for every child entry of `root`.
pub struct FsQuantSource {
    root: PathBuf,
    progress: Option<ProgressBar>,
}

impl FsQuantSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            progress: None,
        }
    }

    /// Ticks `progress` once per parsed sample. Its length is set during the scan.
    pub fn with_progress(mut self, progress: ProgressBar) -> Self {
        self.progress = Some(progress);
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl std::fmt::Debug for FsQuantSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FsQuantSource")
            .field("root", &self.root)
            .field("progress", &self.progress.is_some())
            .finish()
    }
}

impl QuantSource for FsQuantSource {
    fn scan(&self, config: &AggregatorConfig) -> Result<Vec<SampleTable>> {
        let sample_dirs = discover_samples(&self.root)?;
        debug!("Scanning samples under {}", self.root.display());
        if let Some(pb) = &self.progress {
            pb.set_length(sample_dirs.len() as u64);
        }

        let tables: Vec<Result<SampleTable>> = sample_dirs
            .par_iter()
            .map(|dir| {
                let result = read_sample_dir(dir, config);
                if let Some(pb) = &self.progress {
                    pb.inc(1);
                }
                result
            })
            .collect();
        if let Some(pb) = &self.progress {
            pb.finish_with_message("Quantification tables parsed.");
        }
        tables.into_iter().collect()
    }
}

/// Every immediate child entry of `root`, sorted by name.
///
/// Each entry counts as a sample; one without a quantification file fails the
/// scan later with `MissingSampleFile`.
pub fn discover_samples(root: &Path) -> Result<Vec<PathBuf>> {
    info!("Discovering sample directories in: {}", root.display());
    let mut dirs: Vec<PathBuf> = Vec::new();
    for entry in fs::read_dir(root)? {
        dirs.push(entry?.path());
    }
    if dirs.is_empty() {
        return Err(ProfileError::NoSamples(root.to_path_buf()));
    }
    dirs.sort();
    info!(
        "Found {} sample(s). First 5: {:?}",
        dirs.len(),
        dirs.iter()
            .take(5)
            .filter_map(|p| p.file_name())
            .collect::<Vec<_>>()
    );
    Ok(dirs)
}

fn read_sample_dir(dir: &Path, config: &AggregatorConfig) -> Result<SampleTable> {
    let sample_key = dir
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    let quant_path = dir.join(&config.quant_file_name);
    if !quant_path.is_file() {
        return Err(ProfileError::MissingSampleFile {
            sample: sample_key,
            path: quant_path,
        });
    }
    debug!("Parsing {}", quant_path.display());
    let file = fs::File::open(&quant_path)?;
    let records = parse_quant_table(file, &quant_path, config)?;
    Ok(SampleTable { sample_key, records })
}

/// Parses a tab-delimited quantification table, keeping only the id and abundance columns.
///
/// Blank lines are skipped. A missing column or a non-numeric abundance is a
/// `MalformedSampleFile` error.
pub fn parse_quant_table<R: Read>(
    reader: R,
    path: &Path,
    config: &AggregatorConfig,
) -> Result<Vec<(String, f64)>> {
    let malformed = |reason: String| ProfileError::MalformedSampleFile {
        path: path.to_path_buf(),
        reason,
    };

    let mut csv_reader = csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .flexible(true)
        .from_reader(reader);

    let header = csv_reader.headers().map_err(|e| malformed(e.to_string()))?.clone();
    let id_idx = header.iter().position(|c| c == config.id_column);
    let tpm_idx = header.iter().position(|c| c == config.abundance_column);
    let (id_idx, tpm_idx) = match (id_idx, tpm_idx) {
        (Some(i), Some(t)) => (i, t),
        _ => {
            let missing: Vec<&str> = [config.id_column.as_str(), config.abundance_column.as_str()]
                .into_iter()
                .filter(|col| !header.iter().any(|c| c == *col))
                .collect();
            return Err(malformed(format!("missing required column(s): {}", missing.join(", "))));
        }
    };

    let mut records = Vec::new();
    for (row_idx, record) in csv_reader.records().enumerate() {
        let record = record.map_err(|e| malformed(e.to_string()))?;
        if record.iter().all(|field| field.trim().is_empty()) {
            continue;
        }
        let id = record
            .get(id_idx)
            .ok_or_else(|| malformed(format!("row {} has no '{}' field", row_idx + 1, config.id_column)))?;
        let raw_tpm = record
            .get(tpm_idx)
            .ok_or_else(|| malformed(format!("row {} has no '{}' field", row_idx + 1, config.abundance_column)))?;
        let tpm: f64 = raw_tpm.trim().parse().map_err(|_| {
            malformed(format!(
                "row {}: '{}' is not a valid {} value",
                row_idx + 1,
                raw_tpm,
                config.abundance_column
            ))
        })?;
        records.push((id.to_string(), tpm));
    }
    Ok(records)
}
