// manager.rs

use std::path::PathBuf;
use std::sync::Arc;

use crate::aggregator::ExpressionAggregator;
use crate::annotation::{AnnotationLoader, AnnotationSource, AnnotationTable};
use crate::config::AggregatorConfig;
use crate::error::Result;
use crate::matrix::ExpressionMatrix;
use crate::profile::{self, ExpressionProfile};
use crate::query::QueryFacade;

/// Composition root: owns both loaders and hands out queries over them.
///
/// Construct one per process and pass it by reference to consumers.
#[derive(Debug)]
pub struct ExpressionDataManager {
    annotations: AnnotationLoader,
    expression: ExpressionAggregator,
}

impl ExpressionDataManager {
    pub fn new(annotations: AnnotationLoader, expression: ExpressionAggregator) -> Self {
        Self { annotations, expression }
    }

    /// Either path may be absent; the matching `load_*` then fails with `NotConfigured`.
    pub fn from_paths(
        annotation_path: Option<PathBuf>,
        quant_dir: Option<PathBuf>,
        config: AggregatorConfig,
    ) -> Self {
        let annotations = match annotation_path {
            Some(path) => AnnotationLoader::new(AnnotationSource::Path(path)),
            None => AnnotationLoader::unconfigured(),
        };
        let expression = match quant_dir {
            Some(dir) => ExpressionAggregator::from_dir(dir, config),
            None => ExpressionAggregator::unconfigured(config),
        };
        Self::new(annotations, expression)
    }

    pub fn load_annotation_data(&self) -> Result<Arc<AnnotationTable>> {
        self.annotations.load()
    }

    pub fn load_quant_data(&self) -> Result<Arc<ExpressionMatrix>> {
        self.expression.load()
    }

    pub fn query(&self) -> QueryFacade<'_> {
        QueryFacade::new(&self.expression)
    }

    /// Loads the matrix if needed and assembles the plot data for `gene`.
    pub fn expression_profile(&self, gene: &str) -> Result<ExpressionProfile> {
        let matrix = self.expression.load()?;
        Ok(profile::build_profile(&matrix, gene))
    }

    pub fn expression(&self) -> &ExpressionAggregator {
        &self.expression
    }

    /// Back to the uninitialized state; the next load re-reads its source.
    pub fn reset(&self) {
        self.annotations.reset();
        self.expression.reset();
    }
}
