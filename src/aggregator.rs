// aggregator.rs

use log::{debug, info};
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Instant;

use crate::config::AggregatorConfig;
use crate::error::{ProfileError, Result};
use crate::matrix::{self, ExpressionMatrix};
use crate::quant::{FsQuantSource, QuantSource};

/// Owns the expression matrix and builds it at most once.
///
/// Lifecycle: uninitialized -> loaded (idempotent) -> reset (uninitialized again).
/// The cache mutex is held for the whole build, so concurrent first calls
/// still trigger a single `QuantSource::scan`.
pub struct ExpressionAggregator {
    source: Option<Box<dyn QuantSource>>,
    config: AggregatorConfig,
    cache: Mutex<Option<Arc<ExpressionMatrix>>>,
}

impl ExpressionAggregator {
    pub fn new(source: impl QuantSource + 'static, config: AggregatorConfig) -> Self {
        Self {
            source: Some(Box::new(source)),
            config,
            cache: Mutex::new(None),
        }
    }

    /// Aggregator over `<quant_dir>/<sample>/quant.sf`.
    pub fn from_dir(quant_dir: impl Into<PathBuf>, config: AggregatorConfig) -> Self {
        Self::new(FsQuantSource::new(quant_dir), config)
    }

    /// An aggregator with no source; `load` fails with `NotConfigured`.
    pub fn unconfigured(config: AggregatorConfig) -> Self {
        Self {
            source: None,
            config,
            cache: Mutex::new(None),
        }
    }

    pub fn config(&self) -> &AggregatorConfig {
        &self.config
    }

    fn lock_cache(&self) -> MutexGuard<'_, Option<Arc<ExpressionMatrix>>> {
        // Only fully built matrices are ever stored, so a poisoned guard is still valid.
        self.cache.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Returns the cached matrix, building it on first use.
    ///
    /// A failed build leaves the cache empty and can be retried.
    ///
    /// The scan runs on the global rayon pool while the cache lock is held. Call
    /// this from a plain thread or from outside any `par_iter`; a rayon task that
    /// calls `load` while another build is in flight can be scheduled onto the
    /// building worker and block on the lock it already holds.
    pub fn load(&self) -> Result<Arc<ExpressionMatrix>> {
        let mut cache = self.lock_cache();
        if let Some(matrix) = cache.as_ref() {
            debug!("Expression matrix served from cache.");
            return Ok(Arc::clone(matrix));
        }

        let source = self
            .source
            .as_ref()
            .ok_or(ProfileError::NotConfigured("quantification"))?;
        let started = Instant::now();
        let tables = source.scan(&self.config)?;
        let n_samples = tables.len();
        let built = matrix::build_expression_matrix(tables, &self.config.feature_filter());
        info!(
            "Expression matrix built from {} sample(s): {} feature(s) x {} group(s) in {:.2?}.",
            n_samples,
            built.features().len(),
            built.groups().len(),
            started.elapsed()
        );

        let built = Arc::new(built);
        *cache = Some(Arc::clone(&built));
        Ok(built)
    }

    /// The cached matrix, without triggering a build.
    pub fn cached(&self) -> Option<Arc<ExpressionMatrix>> {
        self.lock_cache().clone()
    }

    pub fn is_loaded(&self) -> bool {
        self.lock_cache().is_some()
    }

    pub fn reset(&self) {
        if self.lock_cache().take().is_some() {
            info!("Expression matrix cache cleared.");
        }
    }
}

impl std::fmt::Debug for ExpressionAggregator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExpressionAggregator")
            .field("configured", &self.source.is_some())
            .field("config", &self.config)
            .field("loaded", &self.is_loaded())
            .finish()
    }
}
