//! PostgreSQL storage.
//!
//! Table names come from configuration and cannot be bound as parameters, so
//! every name is checked by [`validate_identifier`] before it reaches SQL.
//! Rows are read as `to_jsonb(t)` and decoded with the same serde types the
//! CSV reader uses, which keeps both adapters in agreement on column parsing.

use serde::de::DeserializeOwned;
use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use sqlx::{PgPool, Postgres, QueryBuilder};
use tracing::{debug, info};

use crate::config::{QosConfig, validate_identifier};
use crate::error::{QosError, Result};
use crate::model::{LinkRecord, QosResult, RawCurve};
use crate::storage::fields::stringify_ids;
use crate::storage::{InputSnapshot, QosStore};

/// Rows per INSERT statement; keeps binds well under the protocol limit.
const INSERT_CHUNK: usize = 1_000;

pub struct PgStore {
    pool: PgPool,
    curves_table: String,
    data_table: String,
    output_relation: String,
}

impl PgStore {
    pub async fn connect(config: &QosConfig) -> Result<Self> {
        let db = config.db()?;
        let options = PgConnectOptions::new()
            .host(&db.host)
            .port(db.port)
            .database(&db.database)
            .username(&db.username)
            .password(&db.password);

        let pool = PgPoolOptions::new()
            .max_connections(4)
            .connect_with(options)
            .await
            .map_err(|e| {
                QosError::InputAccess(format!(
                    "cannot connect to {}:{}/{}: {e}",
                    db.host, db.port, db.database
                ))
            })?;

        info!(host = %db.host, database = %db.database, "Connected to PostgreSQL");
        Self::with_pool(pool, config)
    }

    pub fn with_pool(pool: PgPool, config: &QosConfig) -> Result<Self> {
        let output_relation = config.output_relation();
        for name in [
            &config.db_qos_curves_table,
            &config.db_qos_data_table,
            &output_relation,
        ] {
            validate_identifier(name)?;
        }

        Ok(Self {
            pool,
            curves_table: config.db_qos_curves_table.clone(),
            data_table: config.db_qos_data_table.clone(),
            output_relation,
        })
    }

    /// Creates the schemas and input tables, then replaces their contents with `snapshot`.
    #[tracing::instrument(skip_all, fields(curves = snapshot.curves.len(), records = snapshot.records.len()))]
    pub async fn load_inputs(&self, snapshot: &InputSnapshot) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        for relation in [&self.curves_table, &self.data_table, &self.output_relation] {
            if let Some(schema) = schema_of(relation) {
                sqlx::query(&format!("CREATE SCHEMA IF NOT EXISTS {schema}"))
                    .execute(&mut *tx)
                    .await?;
            }
        }
        sqlx::query(&create_curves_sql(&self.curves_table))
            .execute(&mut *tx)
            .await?;
        sqlx::query(&create_data_sql(&self.data_table))
            .execute(&mut *tx)
            .await?;
        sqlx::query(&format!("DELETE FROM {}", self.curves_table))
            .execute(&mut *tx)
            .await?;
        sqlx::query(&format!("DELETE FROM {}", self.data_table))
            .execute(&mut *tx)
            .await?;

        for chunk in snapshot.curves.chunks(INSERT_CHUNK) {
            let mut builder: QueryBuilder<Postgres> = QueryBuilder::new(format!(
                r#"INSERT INTO {} ("CURVE_TYPE", "CURVE_ID", "WEEK_START", "X", "Y") "#,
                self.curves_table
            ));
            builder.push_values(chunk, |mut row, curve| {
                row.push_bind(curve.curve_type.clone())
                    .push_bind(curve.curve_id.clone())
                    .push_bind(curve.week_start)
                    .push_bind(curve.x.clone())
                    .push_bind(curve.y.clone());
            });
            builder.build().execute(&mut *tx).await?;
        }

        for chunk in snapshot.records.chunks(INSERT_CHUNK) {
            let mut builder: QueryBuilder<Postgres> = QueryBuilder::new(format!(
                r#"INSERT INTO {} ("LOCATION", "WEEK_START", "PRODUCT_ID", "CURVE_ID", "CONSUMPTION_PROFILE_CURVE_ID") "#,
                self.data_table
            ));
            builder.push_values(chunk, |mut row, record| {
                row.push_bind(record.location.clone())
                    .push_bind(record.week_start)
                    .push_bind(record.product_id.clone())
                    .push_bind(record.inventory_curve_id.clone())
                    .push_bind(record.consumption_profile_curve_id.clone());
            });
            builder.build().execute(&mut *tx).await?;
        }

        tx.commit().await?;
        info!(
            curves_table = %self.curves_table,
            data_table = %self.data_table,
            "Input tables loaded"
        );
        Ok(())
    }

    async fn read_json_rows<T: DeserializeOwned>(&self, table: &str) -> Result<Vec<T>> {
        let sql = select_json_sql(table);
        let rows: Vec<serde_json::Value> = sqlx::query_scalar(&sql)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| match e {
                sqlx::Error::Database(db) => {
                    QosError::InputAccess(format!("cannot read {table}: {db}"))
                }
                other => QosError::Database(other),
            })?;

        let parsed = rows
            .into_iter()
            .map(|mut row| {
                stringify_ids(&mut row);
                serde_json::from_value(row).map_err(|e| QosError::data_format(table, e.to_string()))
            })
            .collect::<Result<Vec<T>>>()?;

        debug!(table, rows = parsed.len(), "Table read");
        Ok(parsed)
    }
}

#[async_trait::async_trait]
impl QosStore for PgStore {
    async fn read_inputs(&self) -> Result<InputSnapshot> {
        let curves: Vec<RawCurve> = self.read_json_rows(&self.curves_table).await?;
        let records: Vec<LinkRecord> = self.read_json_rows(&self.data_table).await?;
        info!(
            curves = curves.len(),
            records = records.len(),
            "Inputs loaded from PostgreSQL"
        );
        Ok(InputSnapshot { curves, records })
    }

    #[tracing::instrument(skip_all, fields(relation = %self.output_relation, rows = results.len()))]
    async fn write_results(&self, results: &[QosResult]) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        if let Some(schema) = schema_of(&self.output_relation) {
            sqlx::query(&format!("CREATE SCHEMA IF NOT EXISTS {schema}"))
                .execute(&mut *tx)
                .await?;
        }
        sqlx::query(&create_output_sql(&self.output_relation))
            .execute(&mut *tx)
            .await?;
        sqlx::query(&format!("DELETE FROM {}", self.output_relation))
            .execute(&mut *tx)
            .await?;

        for chunk in results.chunks(INSERT_CHUNK) {
            let mut builder: QueryBuilder<Postgres> = QueryBuilder::new(format!(
                r#"INSERT INTO {} ("LOCATION", "WEEK_START", "QOS") "#,
                self.output_relation
            ));
            builder.push_values(chunk, |mut row, result| {
                row.push_bind(result.location.clone())
                    .push_bind(result.week_start)
                    .push_bind(result.qos);
            });
            builder.build().execute(&mut *tx).await?;
        }

        tx.commit().await?;
        info!("QoS results written");
        Ok(())
    }

    async fn read_results(&self) -> Result<Vec<QosResult>> {
        self.read_json_rows(&self.output_relation).await
    }

    fn output_target(&self) -> String {
        self.output_relation.clone()
    }
}

/// Schema part of a `schema.table` name.
fn schema_of(relation: &str) -> Option<&str> {
    relation.split_once('.').map(|(schema, _)| schema)
}

fn select_json_sql(table: &str) -> String {
    format!("SELECT to_jsonb(t) AS row FROM {table} t")
}

fn create_output_sql(relation: &str) -> String {
    format!(
        r#"CREATE TABLE IF NOT EXISTS {relation} ("LOCATION" text NOT NULL, "WEEK_START" date NOT NULL, "QOS" double precision NOT NULL)"#
    )
}

fn create_curves_sql(table: &str) -> String {
    format!(
        r#"CREATE TABLE IF NOT EXISTS {table} ("CURVE_TYPE" text NOT NULL, "CURVE_ID" text NOT NULL, "WEEK_START" date, "X" bigint[] NOT NULL, "Y" double precision[] NOT NULL)"#
    )
}

fn create_data_sql(table: &str) -> String {
    format!(
        r#"CREATE TABLE IF NOT EXISTS {table} ("LOCATION" text NOT NULL, "WEEK_START" date, "PRODUCT_ID" text NOT NULL, "CURVE_ID" text NOT NULL, "CONSUMPTION_PROFILE_CURVE_ID" text NOT NULL)"#
    )
}
