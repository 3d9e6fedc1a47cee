// lib.rs

//! Replicate-group expression profiles from per-sample transcript quantifications.
//!
//! Each sample directory `<genotype>_<condition>_<replicate>` holds a `quant.sf`
//! table. Samples are joined into one transcript x sample matrix, filtered,
//! rolled up to gene level and summarised per `<genotype>_<condition>` group.

pub mod aggregator;
pub mod annotation;
pub mod config;
pub mod error;
pub mod ids;
pub mod manager;
pub mod matrix;
pub mod profile;
pub mod quant;
pub mod query;

pub use aggregator::ExpressionAggregator;
pub use annotation::{AnnotationLoader, AnnotationRow, AnnotationSource, AnnotationTable};
pub use config::AggregatorConfig;
pub use error::{ProfileError, Result};
pub use ids::FeatureFilter;
pub use manager::ExpressionDataManager;
pub use matrix::{ExpressionMatrix, Feature, FeatureKind, Stat};
pub use profile::{ExpressionProfile, ProfileSeries};
pub use quant::{FsQuantSource, QuantSource, SampleTable};
pub use query::{GenotypeGroups, QueryFacade};
