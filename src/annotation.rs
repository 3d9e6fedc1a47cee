// annotation.rs

use log::{debug, info};
use std::io::Read;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use crate::error::{ProfileError, Result};

pub const AGI_COLUMN: &str = "AGI";
pub const NAME_COLUMN: &str = "Name";
const REQUIRED_COLUMNS: [&str; 2] = [AGI_COLUMN, NAME_COLUMN];

/// Where annotation rows come from.
#[derive(Debug, Clone)]
pub enum AnnotationSource {
    Path(PathBuf),
    /// Already-read text, e.g. an embedded table or a test fixture.
    Text(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnnotationRow {
    pub agi: String,
    /// `None` when the cell was empty; never coerced to an empty string.
    pub name: Option<String>,
}

impl AnnotationRow {
    /// Selection label, `"{AGI}; {Name}"` with `Unknown` for a missing name.
    pub fn label(&self) -> String {
        format!("{}; {}", self.agi, self.name.as_deref().unwrap_or("Unknown"))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AnnotationTable {
    rows: Vec<AnnotationRow>,
}

impl AnnotationTable {
    pub fn rows(&self) -> &[AnnotationRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, AnnotationRow> {
        self.rows.iter()
    }

    /// `(label, value)` pairs in row order, value being the AGI.
    pub fn options(&self) -> Vec<(String, String)> {
        self.rows.iter().map(|row| (row.label(), row.agi.clone())).collect()
    }
}

impl<'a> IntoIterator for &'a AnnotationTable {
    type Item = &'a AnnotationRow;
    type IntoIter = std::slice::Iter<'a, AnnotationRow>;

    fn into_iter(self) -> Self::IntoIter {
        self.rows.iter()
    }
}

/// Parses a semicolon-delimited table with `AGI` and `Name` columns.
///
/// Quoted fields may contain the delimiter. Extra columns are ignored.
pub fn parse_annotation<R: Read>(reader: R, origin: &str) -> Result<AnnotationTable> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .delimiter(b';')
        .flexible(true)
        .from_reader(reader);

    let header: Vec<String> = csv_reader.headers()?.iter().map(str::to_string).collect();
    let header_refs: Vec<&str> = header.iter().map(String::as_str).collect();
    if let Some(err) = ProfileError::schema(origin, &REQUIRED_COLUMNS, &header_refs) {
        return Err(err);
    }
    // Both positions exist, checked above.
    let agi_idx = header_refs.iter().position(|c| *c == AGI_COLUMN).unwrap_or_default();
    let name_idx = header_refs.iter().position(|c| *c == NAME_COLUMN).unwrap_or_default();

    let mut rows = Vec::new();
    for record in csv_reader.records() {
        let record = record?;
        let agi = record.get(agi_idx).unwrap_or_default().to_string();
        let name = record
            .get(name_idx)
            .filter(|value| !value.is_empty())
            .map(str::to_string);
        rows.push(AnnotationRow { agi, name });
    }
    debug!("Parsed {} annotation rows from {}", rows.len(), origin);
    Ok(AnnotationTable { rows })
}

/// Loads the annotation table once and hands out the cached copy afterwards.
#[derive(Debug, Default)]
pub struct AnnotationLoader {
    source: Option<AnnotationSource>,
    cache: Mutex<Option<Arc<AnnotationTable>>>,
}

impl AnnotationLoader {
    pub fn new(source: AnnotationSource) -> Self {
        Self {
            source: Some(source),
            cache: Mutex::new(None),
        }
    }

    /// A loader with no source; `load` fails with `NotConfigured`.
    pub fn unconfigured() -> Self {
        Self::default()
    }

    pub fn load(&self) -> Result<Arc<AnnotationTable>> {
        let mut cache = self.cache.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Some(table) = cache.as_ref() {
            debug!("Annotation table served from cache.");
            return Ok(Arc::clone(table));
        }
        let source = self.source.as_ref().ok_or(ProfileError::NotConfigured("annotation"))?;
        let table = match source {
            AnnotationSource::Path(path) => {
                info!("Loading annotation table from {}", path.display());
                let file = std::fs::File::open(path)?;
                parse_annotation(file, &path.display().to_string())?
            }
            AnnotationSource::Text(text) => parse_annotation(text.as_bytes(), "annotation text")?,
        };
        info!("Annotation table loaded: {} rows.", table.len());
        let table = Arc::new(table);
        *cache = Some(Arc::clone(&table));
        Ok(table)
    }

    pub fn reset(&self) {
        let mut cache = self.cache.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        if cache.take().is_some() {
            info!("Annotation cache cleared.");
        }
    }
}
