// ids.rs
//
// Identifier conventions shared by the aggregation pipeline and the query layer.
//   transcript id: AT1G01010.1      -> gene id AT1G01010
//   sample key:    1ko_LL18_2       -> group key 1ko_LL18
//   group key:     1ko_LL18         -> genotype key 1ko

/// Decides which raw transcript ids are admitted into the matrix.
///
/// Ids containing a hyphen (fusion/compound ids) or not starting with the
/// organism prefix are dropped before gene rollup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeatureFilter {
    organism_prefix: String,
}

impl FeatureFilter {
    pub fn new(organism_prefix: impl Into<String>) -> Self {
        Self {
            organism_prefix: organism_prefix.into(),
        }
    }

    pub fn organism_prefix(&self) -> &str {
        &self.organism_prefix
    }

    #[inline]
    pub fn accepts(&self, transcript_id: &str) -> bool {
        !is_compound_id(transcript_id) && transcript_id.starts_with(self.organism_prefix.as_str())
    }
}

impl Default for FeatureFilter {
    fn default() -> Self {
        Self::new(crate::config::DEFAULT_ORGANISM_PREFIX)
    }
}

/// True for fusion or compound ids such as `AT1G01010-AT1G01020.1`.
#[inline]
pub fn is_compound_id(transcript_id: &str) -> bool {
    transcript_id.contains('-')
}

/// Truncates a transcript id at its first dot. Ids without a dot are returned unchanged.
pub fn gene_id(transcript_id: &str) -> &str {
    match transcript_id.find('.') {
        Some(dot) => &transcript_id[..dot],
        None => transcript_id,
    }
}

/// Strips the trailing `_<replicate>` segment. A key with no underscore is its own group.
pub fn group_key(sample_key: &str) -> &str {
    match sample_key.rfind('_') {
        Some(idx) => &sample_key[..idx],
        None => sample_key,
    }
}

/// Leading underscore-delimited token of a group key.
pub fn genotype_key(group_key: &str) -> &str {
    match group_key.find('_') {
        Some(idx) => &group_key[..idx],
        None => group_key,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gene_id_strips_isoform_suffix() {
        assert_eq!(gene_id("AT1G01010.1"), "AT1G01010");
        assert_eq!(gene_id("AT1G01010.12.3"), "AT1G01010");
        assert_eq!(gene_id("AT1G01010"), "AT1G01010");
    }

    #[test]
    fn group_and_genotype_keys() {
        assert_eq!(group_key("1ko_LL18_2"), "1ko_LL18");
        assert_eq!(group_key("norep"), "norep");
        assert_eq!(genotype_key("1ko_LL18"), "1ko");
        assert_eq!(genotype_key(group_key("1ox_LL24_1")), "1ox");
    }

    #[test]
    fn filter_rejects_compound_and_foreign_ids() {
        let filter = FeatureFilter::default();
        assert!(filter.accepts("AT1G01010.1"));
        assert!(!filter.accepts("AT1G01010-AT1G01020.1"));
        assert!(!filter.accepts("ERCC-00002"));
        assert!(!filter.accepts("GFP.1"));

        let custom = FeatureFilter::new("Zm");
        assert!(custom.accepts("Zm00001d027230_T001"));
        assert!(!custom.accepts("AT1G01010.1"));
    }
}
