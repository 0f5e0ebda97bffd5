//! Waste tracking records
//!
//! Loads the tabular waste source (CSV with at least `batch_id`,
//! `container_id`, `material`, `quantity_kg`) and answers selector lookups:
//! - `C-...` matches the container id exactly
//! - `WB-...` matches the batch id exactly
//! - anything else is a case-insensitive substring match on the material

use esr_common::errors::{AppError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Columns every waste CSV must carry
pub const REQUIRED_COLUMNS: [&str; 4] = ["batch_id", "container_id", "material", "quantity_kg"];

/// One row of the waste source
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WasteRecord {
    pub batch_id: String,
    pub container_id: String,
    pub material: String,
    pub quantity_kg: f64,

    /// Any additional columns, verbatim
    #[serde(flatten)]
    pub extra: BTreeMap<String, String>,
}

impl WasteRecord {
    /// Full attribute bag (core and extra columns) as strings
    pub fn attributes(&self) -> BTreeMap<String, String> {
        let mut attrs = self.extra.clone();
        attrs.insert("batch_id".to_string(), self.batch_id.clone());
        attrs.insert("container_id".to_string(), self.container_id.clone());
        attrs.insert("material".to_string(), self.material.clone());
        attrs.insert("quantity_kg".to_string(), self.quantity_kg.to_string());
        attrs
    }
}

/// In-memory waste table, read-only after load
#[derive(Debug, Clone, Default)]
pub struct WasteTable {
    records: Vec<WasteRecord>,
}

impl WasteTable {
    pub fn new(records: Vec<WasteRecord>) -> Self {
        Self { records }
    }

    /// Load from a CSV file. An absent file yields an empty table.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::info!(path = %path.display(), "Waste source not found, starting empty");
            return Ok(Self::default());
        }

        let text = std::fs::read_to_string(path)?;
        let table = Self::from_csv_str(&text)?;

        tracing::info!(
            path = %path.display(),
            rows = table.len(),
            "Waste source loaded"
        );

        Ok(table)
    }

    /// Parse CSV text with a header row
    pub fn from_csv_str(text: &str) -> Result<Self> {
        let mut lines = text
            .lines()
            .map(|l| l.trim_end_matches('\r'))
            .filter(|l| !l.trim().is_empty());

        let header = match lines.next() {
            Some(h) => split_csv_line(h.trim_start_matches('\u{feff}')),
            None => return Ok(Self::default()),
        };
        let header: Vec<String> = header.into_iter().map(|h| h.trim().to_string()).collect();

        let mut index = BTreeMap::new();
        for column in REQUIRED_COLUMNS {
            let pos = header.iter().position(|h| h == column).ok_or_else(|| {
                AppError::InvalidFormat {
                    message: format!("waste CSV is missing column '{}'", column),
                }
            })?;
            index.insert(column, pos);
        }

        let mut records = Vec::new();
        for (line_no, line) in lines.enumerate() {
            let fields = split_csv_line(line);
            if fields.len() != header.len() {
                tracing::warn!(
                    line = line_no + 2,
                    expected = header.len(),
                    found = fields.len(),
                    "Skipping malformed waste row"
                );
                continue;
            }

            let quantity_raw = fields[index["quantity_kg"]].trim();
            let quantity_kg = quantity_raw.parse::<f64>().unwrap_or_else(|_| {
                tracing::warn!(line = line_no + 2, value = quantity_raw, "Unparseable quantity_kg");
                0.0
            });

            let extra = header
                .iter()
                .zip(fields.iter())
                .filter(|(h, _)| !REQUIRED_COLUMNS.contains(&h.as_str()))
                .map(|(h, v)| (h.clone(), v.trim().to_string()))
                .collect();

            records.push(WasteRecord {
                batch_id: fields[index["batch_id"]].trim().to_string(),
                container_id: fields[index["container_id"]].trim().to_string(),
                material: fields[index["material"]].trim().to_string(),
                quantity_kg,
                extra,
            });
        }

        Ok(Self { records })
    }

    /// All rows in file order
    pub fn records(&self) -> &[WasteRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Rows matching a container id, batch id or material selector
    pub fn lookup(&self, selector: &str) -> Vec<WasteRecord> {
        if selector.starts_with("C-") {
            self.records.iter().filter(|r| r.container_id == selector).cloned().collect()
        } else if selector.starts_with("WB-") {
            self.records.iter().filter(|r| r.batch_id == selector).cloned().collect()
        } else {
            let needle = selector.to_lowercase();
            self.records
                .iter()
                .filter(|r| r.material.to_lowercase().contains(&needle))
                .cloned()
                .collect()
        }
    }
}

/// Split one CSV line, honouring double-quoted fields and `""` escapes
fn split_csv_line(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();

    while let Some(ch) = chars.next() {
        match ch {
            '"' if in_quotes && chars.peek() == Some(&'"') => {
                current.push('"');
                chars.next();
            }
            '"' => in_quotes = !in_quotes,
            ',' if !in_quotes => fields.push(std::mem::take(&mut current)),
            _ => current.push(ch),
        }
    }
    fields.push(current);

    fields
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const SAMPLE: &str = "batch_id,container_id,material,quantity_kg,site\n\
        WB-789,C-456,Lead-acid batteries,120,Site-A\n\
        WB-790,C-222,Lithium-ion batteries,45.5,Site-B\n\
        WB-791,C-456,\"Solvent, chlorinated\",10,Site-A\n";

    #[test]
    fn test_parse_sample() {
        let table = WasteTable::from_csv_str(SAMPLE).unwrap();
        assert_eq!(table.len(), 3);

        let first = &table.records()[0];
        assert_eq!(first.batch_id, "WB-789");
        assert_eq!(first.quantity_kg, 120.0);
        assert_eq!(first.extra.get("site").map(String::as_str), Some("Site-A"));
        assert_eq!(table.records()[2].material, "Solvent, chlorinated");
    }

    #[test]
    fn test_lookup_selectors() {
        let table = WasteTable::from_csv_str(SAMPLE).unwrap();

        let by_container = table.lookup("C-456");
        assert_eq!(by_container.len(), 2);

        let by_batch = table.lookup("WB-790");
        assert_eq!(by_batch.len(), 1);
        assert_eq!(by_batch[0].container_id, "C-222");

        let by_material = table.lookup("BATTERIES");
        assert_eq!(by_material.len(), 2);

        assert!(table.lookup("C-999").is_empty());
    }

    #[test]
    fn test_missing_column_is_error() {
        let err = WasteTable::from_csv_str("batch_id,material\nWB-1,Sand\n").unwrap_err();
        assert!(matches!(err, AppError::InvalidFormat { .. }));
    }

    #[test]
    fn test_malformed_rows_skipped() {
        let text = "batch_id,container_id,material,quantity_kg\nWB-1,C-1,Sand\nWB-2,C-2,Sand,abc\n";
        let table = WasteTable::from_csv_str(text).unwrap();
        assert_eq!(table.len(), 1);
        assert_eq!(table.records()[0].quantity_kg, 0.0);
    }

    #[test]
    fn test_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let table = WasteTable::load(&dir.path().join("absent.csv")).unwrap();
        assert!(table.is_empty());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SAMPLE.as_bytes()).unwrap();
        let table = WasteTable::load(file.path()).unwrap();
        assert_eq!(table.len(), 3);
    }

    #[test]
    fn test_attributes_include_core_columns() {
        let table = WasteTable::from_csv_str(SAMPLE).unwrap();
        let attrs = table.records()[0].attributes();
        assert_eq!(attrs["container_id"], "C-456");
        assert_eq!(attrs["site"], "Site-A");
    }
}
