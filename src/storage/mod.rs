//! Input and output adapters.
//!
//! [`QosStore`] is the async trait the CLI and the API go through.
//! [`CsvStore`] reads and writes flat files under the configured folders.
//! [`PgStore`] reads and writes PostgreSQL tables through `sqlx`.

pub mod csv_store;
pub mod fields;
pub mod postgres;

pub use csv_store::CsvStore;
pub use postgres::PgStore;

use crate::config::QosConfig;
use crate::error::Result;
use crate::model::{LinkRecord, QosResult, RawCurve};

/// Both input tables, exactly as stored.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InputSnapshot {
    pub curves: Vec<RawCurve>,
    pub records: Vec<LinkRecord>,
}

/// Source of curve inputs and sink for computed QoS rows.
#[async_trait::async_trait]
pub trait QosStore: Send + Sync {
    /// Reads `qos_curves` and `qos_data`.
    async fn read_inputs(&self) -> Result<InputSnapshot>;

    /// Replaces the stored results with `results`.
    async fn write_results(&self, results: &[QosResult]) -> Result<()>;

    /// Reads back previously written results.
    async fn read_results(&self) -> Result<Vec<QosResult>>;

    /// Human-readable location of the output, for logs.
    fn output_target(&self) -> String;
}

/// Opens the store selected by `use_db`.
pub async fn open_store(config: &QosConfig) -> Result<Box<dyn QosStore>> {
    if config.use_db {
        Ok(Box::new(PgStore::connect(config).await?))
    } else {
        Ok(Box::new(CsvStore::from_config(config)))
    }
}
