//! Recovery dump for failed staging loads.
//!
//! When a batch cannot be loaded, the extracted data is the only copy in
//! existence; it gets written to `recovery_<table>.csv` before the error
//! propagates so a failed run never loses scraped rows.

use std::path::{Path, PathBuf};

use lode_core::{Row, Value};

/// Write `rows` to `recovery_<table>.csv` under `dir`.
///
/// The header comes from the field names the rows were extracted under,
/// which may differ from the declared table columns when the failure was a
/// shape mismatch.
pub(crate) fn write_batch(dir: &Path, table: &str, rows: &[Row]) -> Result<PathBuf, csv::Error> {
    let path = dir.join(format!("recovery_{table}.csv"));
    let mut writer = csv::Writer::from_path(&path)?;
    if let Some(first) = rows.first() {
        writer.write_record(first.fields())?;
    }
    for row in rows {
        writer.write_record(row.values().iter().map(csv_field))?;
    }
    writer.flush()?;
    Ok(path)
}

fn csv_field(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::Boolean(b) => b.to_string(),
        Value::Integer(n) => n.to_string(),
        Value::Real(f) => f.to_string(),
        Value::Text(s) => s.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_batch_round_trips_through_csv() {
        let dir = tempfile::tempdir().unwrap();
        let rows = vec![
            Row::new(["id", "label"], vec![1.into(), "plain".into()]),
            Row::new(["id", "label"], vec![2.into(), "with, comma".into()]),
            Row::new(["id", "label"], vec![3.into(), Value::Null]),
        ];

        let path = write_batch(dir.path(), "st_dummy", &rows).unwrap();

        assert!(path.ends_with("recovery_st_dummy.csv"));
        let written = std::fs::read_to_string(&path).unwrap();
        assert_eq!(written, "id,label\n1,plain\n2,\"with, comma\"\n3,\n");
    }
}
