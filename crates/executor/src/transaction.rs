use crate::error::ExecutorError;
use predms_db::Connection;
use tracing::warn;

/// Explicit-transaction bracket around a group of statements.
///
/// Entering remembers the connection's autocommit flag and switches it off.
/// [`finish`](Self::finish) commits on `Ok` and rolls back on `Err`, handing the
/// caller's error back untouched. The flag is restored in every case, including
/// when the scope is dropped without being finished. Connections without an
/// autocommit flag are left without one.
///
/// ```ignore
/// let mut scope = TransactionScope::enter(conn);
/// let result = run_phase(scope.conn()).await;
/// scope.finish(result).await?;
/// ```
pub struct TransactionScope<'c> {
    conn: &'c mut Connection,
    saved_autocommit: Option<bool>,
    restored: bool,
}

impl<'c> TransactionScope<'c> {
    pub fn enter(conn: &'c mut Connection) -> Self {
        let saved_autocommit = conn.autocommit();
        if saved_autocommit.is_some() {
            conn.set_autocommit(false);
        }

        Self {
            conn,
            saved_autocommit,
            restored: false,
        }
    }

    pub fn conn(&mut self) -> &mut Connection {
        &mut *self.conn
    }

    pub async fn finish<T, E>(mut self, result: Result<T, E>) -> Result<T, E>
    where
        E: From<ExecutorError> + core::fmt::Display,
    {
        let out = match result {
            Ok(value) => match self.conn.commit().await {
                Ok(()) => Ok(value),
                Err(e) => {
                    if let Err(rb) = self.conn.rollback().await {
                        warn!(error = %rb, "rollback after failed commit also failed");
                    }
                    Err(E::from(ExecutorError::TransactionCommitFailed {
                        context: "transaction scope".to_string(),
                        message: e.to_string(),
                    }))
                }
            },
            Err(err) => {
                if let Err(rb) = self.conn.rollback().await {
                    let rollback_error = ExecutorError::TransactionRollbackFailed {
                        context: "transaction scope".to_string(),
                        message: rb.to_string(),
                        original_error: err.to_string(),
                    };
                    warn!(error = %rollback_error, "transaction scope rollback failed");
                }
                Err(err)
            }
        };

        self.restore();
        out
    }

    fn restore(&mut self) {
        if self.restored {
            return;
        }
        if let Some(previous) = self.saved_autocommit {
            self.conn.set_autocommit(previous);
        }
        self.restored = true;
    }
}

impl Drop for TransactionScope<'_> {
    fn drop(&mut self) {
        self.restore();
    }
}
