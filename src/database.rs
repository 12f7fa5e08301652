use std::sync::Arc;

use tracing::info;

use crate::config::{
    ConnectionParameters, DatabaseConfig, VirtualizationPolicy, DEFAULT_SCHEMA, MASTER_DATABASE,
};
use crate::drivers::TokioPostgresConnector;
use crate::error::{PgConnectorError, Result};
use crate::session::{OnFailure, Session};
use crate::traits::Connector;
use crate::types::{QueryParam, QueryResult};

/// Logical databases on top of one physical PostgreSQL connection.
///
/// PostgreSQL can't switch databases on an open connection, so depending on
/// the [`VirtualizationPolicy`] a logical database is either the physical
/// database chosen at connect time or a schema inside it. Switching under
/// the first model fails with `UnsupportedOperation` rather than silently
/// reconnecting.
pub struct PostgresDatabase {
    connector: Arc<dyn Connector>,
    policy: VirtualizationPolicy,
    parameters: ConnectionParameters,
    session: Session,
    /// Database named at connect time.
    database_original: String,
    /// Schema named at connect time. Under schema-as-database, selecting
    /// `database_original` goes back to this schema.
    schema_original: String,
    schema: Option<String>,
    logical_database: String,
}

impl PostgresDatabase {
    /// Connect to a real server using tokio-postgres.
    pub async fn connect(config: DatabaseConfig) -> Result<Self> {
        Self::connect_with(Arc::new(TokioPostgresConnector), config).await
    }

    /// Connect using a custom connector.
    ///
    /// Under full access the master database is consulted first and the
    /// target database created if missing. The working connection then
    /// selects the configured schema, creating it unless the policy is
    /// fixed, and applies the time zone if one is configured.
    pub async fn connect_with(connector: Arc<dyn Connector>, config: DatabaseConfig) -> Result<Self> {
        let policy = config.policy();
        let mut parameters = config.connection;

        let database = match parameters.database_name() {
            Some(name) => name.to_string(),
            None if policy.queries_master() => MASTER_DATABASE.to_string(),
            None => {
                return Err(PgConnectorError::configuration(
                    "database",
                    "No database name given and the master database may not be queried",
                ))
            }
        };
        parameters.database = Some(database.clone());
        if parameters.schema.is_empty() {
            parameters.schema = DEFAULT_SCHEMA.to_string();
        }
        let schema = parameters.schema.clone();

        if policy.queries_master() {
            let mut master =
                Session::connect(connector.as_ref(), &parameters.with_database(MASTER_DATABASE))
                    .await?;
            if !database_exists_on(&mut master, &database).await? {
                create_database_on(&mut master, &database).await?;
            }
            master.disconnect();
        }

        let session = Session::connect(connector.as_ref(), &parameters).await?;
        let mut db = Self {
            connector,
            policy,
            parameters,
            session,
            database_original: database.clone(),
            schema_original: schema.clone(),
            schema: None,
            logical_database: database,
        };

        if policy.creates_schemas() && !db.schema_exists(&schema).await? {
            db.create_schema(&schema).await?;
        }
        db.set_schema(&schema).await?;

        if let Some(timezone) = db.parameters.timezone.clone() {
            db.select_timezone(&timezone).await?;
        }

        Ok(db)
    }

    pub fn policy(&self) -> VirtualizationPolicy {
        self.policy
    }

    pub fn parameters(&self) -> &ConnectionParameters {
        &self.parameters
    }

    /// The logical database currently selected.
    pub fn selected_logical_database(&self) -> &str {
        &self.logical_database
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut Session {
        &mut self.session
    }

    pub async fn query(&mut self, sql: &str) -> Result<QueryResult> {
        self.session.query(sql).await
    }

    pub async fn prepared_query(&mut self, sql: &str, params: Vec<QueryParam>) -> Result<QueryResult> {
        self.session.prepared_query(sql, params).await
    }

    pub async fn execute(
        &mut self,
        sql: &str,
        params: Vec<QueryParam>,
        on_failure: OnFailure,
    ) -> Result<Option<QueryResult>> {
        self.session.execute(sql, params, on_failure).await
    }

    /// Select a logical database.
    ///
    /// Re-selecting the current one always succeeds. Under schema-as-database
    /// the matching schema becomes the search path; otherwise switching
    /// needs a new connection and fails with `UnsupportedOperation`.
    pub async fn select_logical_database(&mut self, name: &str) -> Result<bool> {
        if name == self.logical_database {
            return Ok(true);
        }
        match self.policy {
            VirtualizationPolicy::SchemaAsDatabase { .. } => {
                let schema = self.schema_for(name);
                self.set_schema(&schema).await?;
                self.logical_database = name.to_string();
                info!(database = %name, schema = %schema, "Switched logical database");
                Ok(true)
            }
            VirtualizationPolicy::FullAccess | VirtualizationPolicy::Fixed => {
                Err(PgConnectorError::UnsupportedOperation(format!(
                    "can't switch to database '{}' on an open connection; reconnect instead",
                    name
                )))
            }
        }
    }

    /// Whether a logical database exists under the active policy.
    pub async fn logical_database_exists(&mut self, name: &str) -> Result<bool> {
        match self.policy {
            VirtualizationPolicy::SchemaAsDatabase { .. } => {
                let schema = self.schema_for(name);
                self.schema_exists(&schema).await
            }
            VirtualizationPolicy::FullAccess => self.database_exists(name).await,
            VirtualizationPolicy::Fixed => Ok(name == self.database_original),
        }
    }

    /// Create a logical database: a schema under schema-as-database, a real
    /// database under full access.
    pub async fn create_logical_database(&mut self, name: &str) -> Result<()> {
        match self.policy {
            VirtualizationPolicy::SchemaAsDatabase { .. } => {
                let schema = self.schema_for(name);
                self.create_schema(&schema).await
            }
            VirtualizationPolicy::FullAccess => self.create_database(name).await,
            VirtualizationPolicy::Fixed => Err(PgConnectorError::UnsupportedOperation(format!(
                "can't create database '{}' without master database access",
                name
            ))),
        }
    }

    fn schema_for(&self, logical_database: &str) -> String {
        if logical_database == self.database_original {
            self.schema_original.clone()
        } else {
            logical_database.to_string()
        }
    }

    /// Check for a physical database via a short-lived master connection.
    pub async fn database_exists(&self, name: &str) -> Result<bool> {
        let mut master = self.connect_master().await?;
        let exists = database_exists_on(&mut master, name).await;
        master.disconnect();
        exists
    }

    /// Create a physical database via a short-lived master connection.
    pub async fn create_database(&self, name: &str) -> Result<()> {
        let mut master = self.connect_master().await?;
        let created = create_database_on(&mut master, name).await;
        master.disconnect();
        created
    }

    async fn connect_master(&self) -> Result<Session> {
        if !self.policy.queries_master() {
            return Err(PgConnectorError::UnsupportedOperation(
                "querying the master database is not allowed".to_string(),
            ));
        }
        Session::connect(
            self.connector.as_ref(),
            &self.parameters.with_database(MASTER_DATABASE),
        )
        .await
    }

    pub async fn schema_exists(&mut self, name: &str) -> Result<bool> {
        let result = self
            .session
            .prepared_query(
                "SELECT nspname FROM pg_catalog.pg_namespace WHERE nspname = ?",
                vec![name.into()],
            )
            .await?;
        Ok(!result.is_empty())
    }

    pub async fn create_schema(&mut self, name: &str) -> Result<()> {
        let sql = format!("CREATE SCHEMA {}", self.session.quote_identifier(name, ""));
        self.session.query(&sql).await?;
        info!(schema = %name, "Created schema");
        Ok(())
    }

    /// Drop a schema and everything in it.
    ///
    /// Dropping the current schema moves the search path back to the
    /// connect-time schema, or to `public` when that is the one dropped. If
    /// neither is available no schema is recorded as current.
    pub async fn drop_schema(&mut self, name: &str) -> Result<()> {
        let sql = format!("DROP SCHEMA {} CASCADE", self.session.quote_identifier(name, ""));
        self.session.query(&sql).await?;
        if self.schema.as_deref() != Some(name) {
            return Ok(());
        }

        self.schema = None;
        let fallback = if name != self.schema_original {
            self.schema_original.clone()
        } else {
            DEFAULT_SCHEMA.to_string()
        };
        if fallback != name && self.schema_exists(&fallback).await? {
            self.set_search_path(&[fallback.as_str()]).await?;
            info!(dropped = %name, schema = %fallback, "Current schema dropped, search path reset");
            self.schema = Some(fallback);
        }
        Ok(())
    }

    /// The schema in use: the one last set, else whatever the server reports.
    pub async fn current_schema(&mut self) -> Result<Option<String>> {
        if let Some(ref schema) = self.schema {
            return Ok(Some(schema.clone()));
        }
        let result = self.session.query("SELECT current_schema()").await?;
        Ok(result.value().map(str::to_string))
    }

    /// Check a schema exists and make it the only one on the search path.
    /// A missing schema leaves the current one in place.
    pub async fn set_schema(&mut self, name: &str) -> Result<()> {
        if !self.schema_exists(name).await? {
            return Err(PgConnectorError::configuration(name, "Schema does not exist"));
        }
        self.set_search_path(&[name]).await?;
        self.schema = Some(name.to_string());
        Ok(())
    }

    /// Replace the search path. The first schema receives unqualified
    /// `CREATE` statements.
    ///
    /// The ORM only looks for its tables in the primary schema, so extra
    /// entries are mainly useful for raw SQL.
    pub async fn set_search_path<S: AsRef<str>>(&mut self, schemas: &[S]) -> Result<()> {
        if schemas.is_empty() {
            return Err(PgConnectorError::InvalidArgument(
                "at least one schema must be supplied to set a search path".to_string(),
            ));
        }
        let list = schemas
            .iter()
            .map(|s| self.session.quote_identifier(s.as_ref(), ""))
            .collect::<Vec<_>>()
            .join(", ");
        self.session
            .query(&format!("SET search_path TO {}", list))
            .await?;
        Ok(())
    }

    /// Set the session time zone. Empty text is ignored.
    pub async fn select_timezone(&mut self, timezone: &str) -> Result<()> {
        if timezone.is_empty() {
            return Ok(());
        }
        let sql = format!(
            "SET SESSION TIME ZONE {}",
            self.session.quote_literal(timezone)
        );
        self.session.query(&sql).await?;
        Ok(())
    }

    pub async fn server_version(&mut self) -> Result<Option<String>> {
        self.session.server_version().await
    }

    /// Begin a transaction.
    ///
    /// `mode` and `session_characteristics` are SQL fragments such as
    /// `ISOLATION LEVEL SERIALIZABLE`, not values.
    pub async fn transaction_start(
        &mut self,
        mode: Option<&str>,
        session_characteristics: Option<&str>,
    ) -> Result<()> {
        self.session.query("BEGIN").await?;
        if let Some(mode) = mode {
            self.session
                .query(&format!("SET TRANSACTION {}", mode))
                .await?;
        }
        if let Some(characteristics) = session_characteristics {
            self.session
                .query(&format!(
                    "SET SESSION CHARACTERISTICS AS TRANSACTION {}",
                    characteristics
                ))
                .await?;
        }
        Ok(())
    }

    pub async fn transaction_savepoint(&mut self, savepoint: &str) -> Result<()> {
        let sql = format!("SAVEPOINT {}", self.session.quote_identifier(savepoint, ""));
        self.session.query(&sql).await?;
        Ok(())
    }

    /// Roll back the whole transaction, or to `savepoint` if given.
    pub async fn transaction_rollback(&mut self, savepoint: Option<&str>) -> Result<()> {
        let sql = match savepoint {
            Some(name) => format!(
                "ROLLBACK TO SAVEPOINT {}",
                self.session.quote_identifier(name, "")
            ),
            None => "ROLLBACK".to_string(),
        };
        self.session.query(&sql).await?;
        Ok(())
    }

    pub async fn transaction_end(&mut self) -> Result<()> {
        self.session.query("COMMIT").await?;
        Ok(())
    }
}

async fn database_exists_on(master: &mut Session, name: &str) -> Result<bool> {
    let result = master
        .prepared_query(
            "SELECT datname FROM pg_catalog.pg_database WHERE datname = ?",
            vec![name.into()],
        )
        .await?;
    Ok(!result.is_empty())
}

async fn create_database_on(master: &mut Session, name: &str) -> Result<()> {
    let sql = format!("CREATE DATABASE {}", master.quote_identifier(name, ""));
    master.query(&sql).await?;
    info!(database = %name, "Created database");
    Ok(())
}
