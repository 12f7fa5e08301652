use std::sync::Arc;

use async_trait::async_trait;
use tokio_postgres::{types::ToSql, Client, Config, NoTls, SimpleQueryMessage};
use tracing::{error, info};

use crate::config::{ConnectionParameters, MASTER_DATABASE};
use crate::error::{PgConnectorError, Result};
use crate::traits::{Connector, DatabaseDriver};
use crate::types::{RawQueryResult, SqlValue};

use super::text_format::{CellText, TextParam};

/// PostgreSQL driver implementation using tokio-postgres.
pub struct TokioPostgresDriver {
    client: Client,
}

impl TokioPostgresDriver {
    /// Connect to a PostgreSQL database.
    pub async fn connect(params: &ConnectionParameters) -> Result<Self> {
        let mut config = Config::new();
        config
            .host(&params.host)
            .port(params.port)
            .dbname(params.database_name().unwrap_or(MASTER_DATABASE));
        if let Some(user) = params.username.as_deref().filter(|u| !u.is_empty()) {
            config.user(user);
        }
        if let Some(password) = params.password.as_deref().filter(|p| !p.is_empty()) {
            config.password(password);
        }

        let (client, connection) = config
            .connect(NoTls)
            .await
            .map_err(|e| PgConnectorError::Connection(e.to_string()))?;

        // Spawn the connection handler
        tokio::spawn(async move {
            if let Err(e) = connection.await {
                error!(error = %e, "PostgreSQL connection terminated");
            }
        });

        info!(connection = %params.display_string(), "Connected to PostgreSQL");
        Ok(Self { client })
    }

    async fn execute_plain(&self, sql: &str) -> Result<RawQueryResult> {
        let messages = self
            .client
            .simple_query(sql)
            .await
            .map_err(|e| PgConnectorError::query(sql, e.to_string()))?;

        // Only the last statement's rows and count are kept.
        let mut last = None;
        let mut current = RawQueryResult::empty();
        for message in messages {
            match message {
                SimpleQueryMessage::Row(row) => {
                    if current.columns.is_empty() {
                        current.columns = row
                            .columns()
                            .iter()
                            .map(|c| c.name().to_string())
                            .collect();
                    }
                    let values = (0..row.len())
                        .map(|i| row.get(i).map(str::to_string))
                        .collect();
                    current.rows.push(values);
                }
                SimpleQueryMessage::CommandComplete(count) => {
                    current.rows_affected = count;
                    last = Some(std::mem::take(&mut current));
                }
                _ => {}
            }
        }
        Ok(last.unwrap_or(current))
    }

    /// Prepared path. Parameters are bound in text format so the server
    /// coerces them to whatever type it inferred for each `$n`.
    async fn execute_params(&self, sql: &str, params: &[SqlValue]) -> Result<RawQueryResult> {
        let converted_params: Vec<TextParam> = params.iter().map(TextParam::from).collect();

        let param_refs: Vec<&(dyn ToSql + Sync)> = converted_params
            .iter()
            .map(|p| p as &(dyn ToSql + Sync))
            .collect();

        let statement = self
            .client
            .prepare(sql)
            .await
            .map_err(|e| PgConnectorError::query(sql, e.to_string()))?;

        if statement.columns().is_empty() {
            let count = self
                .client
                .execute(&statement, &param_refs)
                .await
                .map_err(|e| PgConnectorError::query(sql, e.to_string()))?;
            return Ok(RawQueryResult::affected(count));
        }

        let rows = self
            .client
            .query(&statement, &param_refs)
            .await
            .map_err(|e| PgConnectorError::query(sql, e.to_string()))?;

        let columns: Vec<String> = statement
            .columns()
            .iter()
            .map(|c| c.name().to_string())
            .collect();

        let result_rows = rows
            .iter()
            .map(|row| {
                (0..row.len())
                    .map(|i| {
                        row.try_get::<_, CellText>(i)
                            .map(|cell| cell.0)
                            .map_err(|e| PgConnectorError::query(sql, e.to_string()))
                    })
                    .collect::<Result<Vec<_>>>()
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(RawQueryResult::new(columns, result_rows))
    }
}

#[async_trait]
impl DatabaseDriver for TokioPostgresDriver {
    async fn execute(&self, sql: &str, params: &[SqlValue]) -> Result<RawQueryResult> {
        if params.is_empty() {
            self.execute_plain(sql).await
        } else {
            self.execute_params(sql, params).await
        }
    }

    fn supports_native_escaping(&self) -> bool {
        true
    }
}

/// Opens a `TokioPostgresDriver` per physical connection.
#[derive(Debug, Default, Clone, Copy)]
pub struct TokioPostgresConnector;

#[async_trait]
impl Connector for TokioPostgresConnector {
    async fn open(&self, params: &ConnectionParameters) -> Result<Arc<dyn DatabaseDriver>> {
        let driver = TokioPostgresDriver::connect(params).await?;
        Ok(Arc::new(driver))
    }
}
