// error.rs

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while loading annotation tables or building the expression matrix.
///
/// Every variant is fatal to the `load` call that produced it; caches are only
/// populated by fully built values, so a failed load never leaves partial state.
#[derive(Error, Debug)]
pub enum ProfileError {
    #[error("{origin} must contain columns: {} (missing: {})", .required.join(", "), .missing.join(", "))]
    Schema {
        origin: String,
        required: Vec<String>,
        missing: Vec<String>,
    },

    #[error("Sample '{sample}' has no quantification file at {}", .path.display())]
    MissingSampleFile { sample: String, path: PathBuf },

    #[error("Malformed quantification file {}: {reason}", .path.display())]
    MalformedSampleFile { path: PathBuf, reason: String },

    #[error("No {0} source configured")]
    NotConfigured(&'static str),

    #[error("No sample directories found in {}", .0.display())]
    NoSamples(PathBuf),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV parsing error: {0}")]
    Csv(#[from] csv::Error),
}

impl ProfileError {
    /// Builds a `Schema` error from the required column set and the header that was found.
    pub(crate) fn schema(origin: impl Into<String>, required: &[&str], header: &[&str]) -> Option<Self> {
        let missing: Vec<String> = required
            .iter()
            .filter(|col| !header.contains(*col))
            .map(|col| col.to_string())
            .collect();
        if missing.is_empty() {
            return None;
        }
        Some(ProfileError::Schema {
            origin: origin.into(),
            required: required.iter().map(|c| c.to_string()).collect(),
            missing,
        })
    }
}

pub type Result<T> = std::result::Result<T, ProfileError>;
