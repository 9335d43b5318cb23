use crate::error::ExecutionError;
use core::time::Duration;
use predms_db::{Connection, RowSet, Value};
use tracing::debug;

pub fn statement_kind(sql: &str) -> String {
    let token = sql
        .split_whitespace()
        .next()
        .unwrap_or("")
        .trim_matches(|c: char| !c.is_ascii_alphabetic());

    if token.is_empty() {
        return "UNKNOWN".to_string();
    }

    token.to_ascii_uppercase()
}

pub fn duration_ms(d: Duration) -> u64 {
    let ms = d.as_millis();
    if ms > u64::MAX as u128 {
        u64::MAX
    } else {
        ms as u64
    }
}

/// Runs one statement or batch under a server-side lock timeout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimedExecutor {
    timeout_secs: u64,
}

impl Default for TimedExecutor {
    fn default() -> Self {
        Self::new(crate::DEFAULT_SQL_TIMEOUT)
    }
}

impl TimedExecutor {
    pub fn new(timeout_secs: u64) -> Self {
        Self { timeout_secs }
    }

    pub fn timeout_secs(&self) -> u64 {
        self.timeout_secs
    }

    /// Execute `sql` and return its rows. Never commits.
    ///
    /// Cursor connections first get the dialect's lock-timeout directive; if the
    /// store refuses it the statement still runs. Any driver failure comes back
    /// as an [`ExecutionError`] carrying `sql` and `name`.
    pub async fn execute(
        &self,
        conn: &mut Connection,
        sql: &str,
        params: &[Value],
        name: Option<&str>,
    ) -> Result<RowSet, ExecutionError> {
        let started = std::time::Instant::now();
        let dialect = conn.dialect();

        let result = match conn {
            Connection::Statement(c) => c.execute(sql, params).await,
            Connection::Cursor(c) => {
                let mut cursor = c.cursor();
                let directive = dialect.lock_timeout(self.timeout_secs);
                if let Err(e) = cursor.execute(&directive, &[]).await {
                    debug!(error = %e, "lock timeout directive rejected");
                }
                match cursor.execute(sql, params).await {
                    Ok(()) => cursor.fetch_all().await,
                    Err(e) => Err(e),
                }
            }
        };

        let elapsed_ms = duration_ms(started.elapsed());
        debug!(
            kind = %statement_kind(sql),
            name = name.unwrap_or("statement"),
            elapsed_ms,
            ok = result.is_ok(),
            "statement executed"
        );

        result.map_err(|source| {
            let err = ExecutionError::new(sql, source);
            match name {
                Some(name) => err.with_name(name),
                None => err,
            }
        })
    }
}
