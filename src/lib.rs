//! pgconnector - PostgreSQL connectivity for an ORM that speaks `?` templates
//!
//! Templates with `?` markers are rewritten to `$1, $2, ...` (markers inside
//! string literals are left alone), and several logical databases can share
//! one physical connection by mapping them to schemas.
//!
//! # Example
//! ```ignore
//! use pgconnector::{DatabaseConfig, PostgresDatabase, QueryParam};
//!
//! let config = DatabaseConfig::load("database.toml")?;
//! let mut db = PostgresDatabase::connect(config).await?;
//!
//! let title = db
//!     .prepared_query(
//!         "SELECT \"Title\" FROM \"Page\" WHERE \"URLSegment\" = ?",
//!         vec![QueryParam::from("home")],
//!     )
//!     .await?
//!     .value()
//!     .map(str::to_string);
//!
//! // With model_schema_as_database = true this only changes the search path
//! db.select_logical_database("tenant_b").await?;
//! ```

pub mod config;
pub mod drivers;
pub mod error;
pub mod sql;
pub mod traits;
pub mod types;

mod database;
mod session;

// Re-export main types for convenient access
pub use config::{ConnectionParameters, DatabaseConfig, VirtualizationPolicy};
pub use database::PostgresDatabase;
pub use error::{PgConnectorError, Result};
pub use session::{OnFailure, Session};
pub use traits::{Connector, DatabaseDriver};
pub use types::{QueryParam, QueryResult, RawQueryResult, Row, SqlValue};
