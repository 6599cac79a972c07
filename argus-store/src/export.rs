//! Export and import
//!
//! JSON export is full-fidelity and sorted by id: exporting, importing into
//! an empty store, and exporting again yields byte-identical output. CSV is
//! a flat convenience view for spreadsheets, not re-importable.

use argus_core::IntelRecord;

use crate::{IntelStore, StoreError};

/// Supported export formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Json,
    Csv,
}

impl std::str::FromStr for ExportFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "json" => Ok(ExportFormat::Json),
            "csv" => Ok(ExportFormat::Csv),
            other => Err(format!("unknown export format '{other}', expected json or csv")),
        }
    }
}

/// Serialize the whole store in the requested format
pub fn export(store: &dyn IntelStore, format: ExportFormat) -> Result<Vec<u8>, StoreError> {
    let records = store.all()?;
    match format {
        ExportFormat::Json => serde_json::to_vec_pretty(&records)
            .map_err(|e| StoreError::Engine(format!("json export: {e}"))),
        ExportFormat::Csv => Ok(to_csv(&records).into_bytes()),
    }
}

/// Load a JSON export into a store. Records go through the validated batch
/// write path, so a tampered export that breaks invariants is rejected
/// whole, never half-loaded.
pub fn import_json(store: &dyn IntelStore, bytes: &[u8]) -> Result<usize, StoreError> {
    let records: Vec<IntelRecord> = serde_json::from_slice(bytes)
        .map_err(|e| StoreError::Engine(format!("json import: {e}")))?;
    let count = records.len();
    store.put_all(records)?;
    Ok(count)
}

fn to_csv(records: &[IntelRecord]) -> String {
    let mut out = String::from(
        "id,collected_at,category,keyword,summary,country,threat_level,threat_score,confidence,lat,lon\n",
    );
    for r in records {
        let lat = r.coordinates.map(|c| c.lat.to_string()).unwrap_or_default();
        let lon = r.coordinates.map(|c| c.lon.to_string()).unwrap_or_default();
        out.push_str(&format!(
            "{},{},{},{},{},{},{},{},{},{},{}\n",
            r.id,
            r.collected_at.to_rfc3339(),
            r.category,
            csv_escape(r.keyword.as_deref().unwrap_or("")),
            csv_escape(&r.summary),
            csv_escape(r.country.as_deref().unwrap_or("")),
            r.threat_level,
            r.threat_score,
            r.confidence,
            lat,
            lon,
        ));
    }
    out
}

fn csv_escape(field: &str) -> String {
    if field.contains(',') || field.contains('"') || field.contains('\n') {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MemoryStore;
    use argus_core::{GeoPoint, IntelCategory, ThreatLevel};

    fn sample(natural_key: &str, score: f64) -> IntelRecord {
        let mut record = IntelRecord::new(
            IntelCategory::Cyber,
            natural_key,
            format!("exploit report, {natural_key}"),
            0.9,
        )
        .with_country("Global")
        .with_coordinates(GeoPoint::new(50.45, 30.52));
        record.threat_score = score;
        record.threat_level = ThreatLevel::from_score(score);
        record
    }

    #[test]
    fn test_json_round_trip_byte_identical() {
        let store = MemoryStore::new();
        store.put(sample("CVE-2024-0001", 95.0)).unwrap();
        store.put(sample("CVE-2024-0002", 61.0)).unwrap();

        let exported = export(&store, ExportFormat::Json).unwrap();

        let fresh = MemoryStore::new();
        let imported = import_json(&fresh, &exported).unwrap();
        assert_eq!(imported, 2);

        let re_exported = export(&fresh, ExportFormat::Json).unwrap();
        assert_eq!(exported, re_exported);
    }

    #[test]
    fn test_import_rejects_invariant_breakage() {
        let mut bad = sample("CVE-2024-0003", 95.0);
        bad.threat_level = ThreatLevel::Info;
        let bytes = serde_json::to_vec(&vec![bad]).unwrap();

        let fresh = MemoryStore::new();
        assert!(import_json(&fresh, &bytes).is_err());
        assert_eq!(fresh.count().unwrap(), 0);
    }

    #[test]
    fn test_csv_escapes_commas() {
        let store = MemoryStore::new();
        let mut record = sample("CVE-2024-0004", 20.0);
        record.summary = "patched, finally".into();
        store.put(record).unwrap();

        let csv = String::from_utf8(export(&store, ExportFormat::Csv).unwrap()).unwrap();
        assert!(csv.contains("\"patched, finally\""));
    }
}
