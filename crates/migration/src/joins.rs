use crate::error::ImportError;
use crate::profile::DatabaseKind;
use async_trait::async_trait;
use predms_db::Connection;

/// Loads join definitions into the target before `update_joins` runs.
#[async_trait]
pub trait JoinImporter: Send + Sync {
    async fn import(&self, conn: &mut Connection, kind: DatabaseKind) -> Result<(), ImportError>;
}

/// For targets whose join tables are already in place.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoJoinImport;

#[async_trait]
impl JoinImporter for NoJoinImport {
    async fn import(&self, _conn: &mut Connection, kind: DatabaseKind) -> Result<(), ImportError> {
        tracing::debug!(kind = kind.as_str(), "no join import configured");
        Ok(())
    }
}
