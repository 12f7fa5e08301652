mod in_memory_test;
mod text_format;
mod tokio_postgres;

pub use self::in_memory_test::{
    InMemoryTestConnector, InMemoryTestDriver, InMemoryTestResponseBuilder, RecordedQuery,
};
pub use self::tokio_postgres::{TokioPostgresConnector, TokioPostgresDriver};
