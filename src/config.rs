// config.rs

use crate::ids::FeatureFilter;

pub const DEFAULT_ORGANISM_PREFIX: &str = "A";
pub const DEFAULT_QUANT_FILE: &str = "quant.sf";
pub const DEFAULT_ID_COLUMN: &str = "Name";
pub const DEFAULT_ABUNDANCE_COLUMN: &str = "TPM";

/// Settings for reading quantification tables and filtering their rows.
#[derive(Debug, Clone)]
pub struct AggregatorConfig {
    pub organism_prefix: String,
    pub quant_file_name: String,
    pub id_column: String,
    pub abundance_column: String,
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        Self {
            organism_prefix: DEFAULT_ORGANISM_PREFIX.to_string(),
            quant_file_name: DEFAULT_QUANT_FILE.to_string(),
            id_column: DEFAULT_ID_COLUMN.to_string(),
            abundance_column: DEFAULT_ABUNDANCE_COLUMN.to_string(),
        }
    }
}

impl AggregatorConfig {
    pub fn with_organism_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.organism_prefix = prefix.into();
        self
    }

    pub fn with_quant_file_name(mut self, name: impl Into<String>) -> Self {
        self.quant_file_name = name.into();
        self
    }

    pub fn with_columns(mut self, id_column: impl Into<String>, abundance_column: impl Into<String>) -> Self {
        self.id_column = id_column.into();
        self.abundance_column = abundance_column.into();
        self
    }

    pub fn feature_filter(&self) -> FeatureFilter {
        FeatureFilter::new(self.organism_prefix.clone())
    }
}
