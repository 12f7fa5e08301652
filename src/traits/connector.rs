use std::sync::Arc;

use async_trait::async_trait;

use crate::config::ConnectionParameters;
use crate::error::Result;
use crate::traits::DatabaseDriver;

/// Opens physical connections.
///
/// Every new backend session goes through here, so switching logical
/// databases can be checked for whether it reconnected.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn open(&self, params: &ConnectionParameters) -> Result<Arc<dyn DatabaseDriver>>;
}
