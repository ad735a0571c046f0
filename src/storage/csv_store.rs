//! Flat-file storage: `qos_curves.csv` and `qos_data.csv` in, `qos_output.csv` out.

use csv::{ReaderBuilder, Trim, WriterBuilder};
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::config::QosConfig;
use crate::error::{QosError, Result};
use crate::model::{LinkRecord, QosResult, RawCurve};
use crate::storage::{InputSnapshot, QosStore};

pub const CURVES_FILE: &str = "qos_curves.csv";
pub const DATA_FILE: &str = "qos_data.csv";
pub const OUTPUT_FILE: &str = "qos_output.csv";

#[derive(Debug, Clone)]
pub struct CsvStore {
    input_dir: PathBuf,
    output_dir: PathBuf,
}

impl CsvStore {
    pub fn new(input_dir: impl Into<PathBuf>, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            input_dir: input_dir.into(),
            output_dir: output_dir.into(),
        }
    }

    pub fn from_config(config: &QosConfig) -> Self {
        Self::new(&config.paths.input, &config.paths.output)
    }

    pub fn output_path(&self) -> PathBuf {
        self.output_dir.join(OUTPUT_FILE)
    }
}

#[async_trait::async_trait]
impl QosStore for CsvStore {
    async fn read_inputs(&self) -> Result<InputSnapshot> {
        let curves: Vec<RawCurve> = read_rows(&self.input_dir.join(CURVES_FILE))?;
        let records: Vec<LinkRecord> = read_rows(&self.input_dir.join(DATA_FILE))?;
        info!(
            input = %self.input_dir.display(),
            curves = curves.len(),
            records = records.len(),
            "Inputs loaded from CSV"
        );
        Ok(InputSnapshot { curves, records })
    }

    async fn write_results(&self, results: &[QosResult]) -> Result<()> {
        write_results_csv(&self.output_path(), results)
    }

    async fn read_results(&self) -> Result<Vec<QosResult>> {
        read_rows(&self.output_path())
    }

    fn output_target(&self) -> String {
        self.output_path().display().to_string()
    }
}

/// Deserializes every row of a headered CSV file.
///
/// A missing file is an input-access failure; a row that does not fit `T` is a
/// data-format failure naming the file.
pub fn read_rows<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
    if !path.is_file() {
        return Err(QosError::InputAccess(format!(
            "'{}' does not exist",
            path.display()
        )));
    }
    let mut reader = ReaderBuilder::new()
        .trim(Trim::All)
        .from_path(path)
        .map_err(|e| QosError::InputAccess(format!("'{}': {e}", path.display())))?;

    let table = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();

    let mut rows = Vec::new();
    for row in reader.deserialize() {
        match row {
            Ok(row) => rows.push(row),
            Err(e) if matches!(e.kind(), csv::ErrorKind::Deserialize { .. }) => {
                return Err(QosError::data_format(table, e.to_string()));
            }
            Err(e) => return Err(e.into()),
        }
    }

    debug!(path = %path.display(), rows = rows.len(), "CSV read");
    Ok(rows)
}

/// Writes results with a header row, replacing any previous file.
pub fn write_results_csv(path: &Path, results: &[QosResult]) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let mut writer = WriterBuilder::new().has_headers(true).from_path(path)?;
    for result in results {
        writer.serialize(result)?;
    }
    writer.flush()?;

    info!(path = %path.display(), rows = results.len(), "QoS results written");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use std::fs;

    const CURVES: &str = "\
CURVE_TYPE,CURVE_ID,WEEK_START,X,Y
inventory,1,2023-06-12,\"[0, 10079]\",\"[1, 1]\"
consumption_profile,2,2023-06-12,\"[0, 10079]\",\"[1, 1]\"
";

    const DATA: &str = "\
LOCATION,WEEK_START,PRODUCT_ID,CURVE_ID,CONSUMPTION_PROFILE_CURVE_ID
Lobby,2023-06-12,p1,1,2
";

    fn result(location: &str, qos: f64) -> QosResult {
        QosResult {
            location: location.into(),
            week_start: NaiveDate::from_ymd_opt(2023, 6, 12).unwrap(),
            qos,
        }
    }

    #[tokio::test]
    async fn test_read_inputs() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(CURVES_FILE), CURVES).unwrap();
        fs::write(dir.path().join(DATA_FILE), DATA).unwrap();

        let store = CsvStore::new(dir.path(), dir.path());
        let snapshot = store.read_inputs().await.unwrap();

        assert_eq!(snapshot.curves.len(), 2);
        assert_eq!(snapshot.curves[1].curve_type, "consumption_profile");
        assert_eq!(snapshot.records[0].inventory_curve_id, "1");
    }

    #[tokio::test]
    async fn test_missing_input_file() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(CURVES_FILE), CURVES).unwrap();

        let store = CsvStore::new(dir.path(), dir.path());
        let err = store.read_inputs().await.unwrap_err();
        assert_eq!(err.kind(), "input_access");
    }

    #[tokio::test]
    async fn test_bad_row_is_data_format() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join(CURVES_FILE),
            "CURVE_TYPE,CURVE_ID,WEEK_START,X,Y\ninventory,1,2023-06-12,\"[0, x]\",\"[1, 1]\"\n",
        )
        .unwrap();
        fs::write(dir.path().join(DATA_FILE), DATA).unwrap();

        let store = CsvStore::new(dir.path(), dir.path());
        let err = store.read_inputs().await.unwrap_err();
        assert!(matches!(err, QosError::DataFormat { ref field, .. } if field == CURVES_FILE));
    }

    #[tokio::test]
    async fn test_results_overwrite_and_read_back() {
        let dir = tempfile::tempdir().unwrap();
        let store = CsvStore::new(dir.path(), dir.path().join("out"));

        store.write_results(&[result("Lobby", 0.25), result("Canteen", 1.0)]).await.unwrap();
        store.write_results(&[result("Lobby", 0.5)]).await.unwrap();

        let content = fs::read_to_string(store.output_path()).unwrap();
        assert_eq!(content, "LOCATION,WEEK_START,QOS\nLobby,12.06.2023,0.5\n");
        assert_eq!(store.read_results().await.unwrap(), vec![result("Lobby", 0.5)]);
    }
}
