use crate::connection::{Cursor, CursorConnection, StatementConnection};
use crate::dialect::Dialect;
use crate::driver::Driver;
use crate::error::DriverError;
use crate::value::{RowSet, Value};
use async_trait::async_trait;

/// Statement-shaped connection over a driver.
///
/// Like a pooled ORM connection it opens a transaction implicitly on the first
/// statement and keeps it open until `commit` or `rollback`. It has no
/// autocommit flag.
pub struct StatementAdapter {
    driver: Box<dyn Driver>,
    in_transaction: bool,
}

impl StatementAdapter {
    pub fn new(driver: Box<dyn Driver>) -> Self {
        Self {
            driver,
            in_transaction: false,
        }
    }

    pub fn in_transaction(&self) -> bool {
        self.in_transaction
    }
}

#[async_trait]
impl StatementConnection for StatementAdapter {
    fn dialect(&self) -> Dialect {
        self.driver.dialect()
    }

    async fn execute(&mut self, sql: &str, params: &[Value]) -> Result<RowSet, DriverError> {
        if !self.in_transaction {
            let begin = self.driver.dialect().begin();
            self.driver.run(begin, &[]).await?;
            self.in_transaction = true;
        }
        self.driver.run(sql, params).await
    }

    async fn commit(&mut self) -> Result<(), DriverError> {
        if !self.in_transaction {
            return Ok(());
        }
        let commit = self.driver.dialect().commit();
        self.driver.run(commit, &[]).await?;
        self.in_transaction = false;
        Ok(())
    }

    async fn rollback(&mut self) -> Result<(), DriverError> {
        if !self.in_transaction {
            return Ok(());
        }
        self.in_transaction = false;
        let rollback = self.driver.dialect().rollback();
        self.driver.run(rollback, &[]).await?;
        Ok(())
    }
}

/// Cursor-shaped connection over a driver, with a DB-API style autocommit flag.
///
/// With autocommit off, the first statement after a commit or rollback opens a
/// transaction. With autocommit on, statements run in the store's own implicit
/// transactions and `commit` has nothing to do.
pub struct CursorAdapter {
    driver: Box<dyn Driver>,
    autocommit: Option<bool>,
    in_transaction: bool,
}

impl CursorAdapter {
    pub fn new(driver: Box<dyn Driver>) -> Self {
        Self::with_autocommit(driver, Some(false))
    }

    /// `None` builds a connection that does not expose autocommit at all.
    pub fn with_autocommit(driver: Box<dyn Driver>, autocommit: Option<bool>) -> Self {
        Self {
            driver,
            autocommit,
            in_transaction: false,
        }
    }

    async fn ensure_transaction(&mut self) -> Result<(), DriverError> {
        if self.in_transaction || self.autocommit == Some(true) {
            return Ok(());
        }
        let begin = self.driver.dialect().begin();
        self.driver.run(begin, &[]).await?;
        self.in_transaction = true;
        Ok(())
    }
}

#[async_trait]
impl CursorConnection for CursorAdapter {
    fn dialect(&self) -> Dialect {
        self.driver.dialect()
    }

    fn cursor(&mut self) -> Box<dyn Cursor + '_> {
        Box::new(AdapterCursor {
            conn: self,
            rows: None,
        })
    }

    async fn commit(&mut self) -> Result<(), DriverError> {
        if !self.in_transaction {
            return Ok(());
        }
        let commit = self.driver.dialect().commit();
        self.driver.run(commit, &[]).await?;
        self.in_transaction = false;
        Ok(())
    }

    async fn rollback(&mut self) -> Result<(), DriverError> {
        if !self.in_transaction {
            return Ok(());
        }
        self.in_transaction = false;
        let rollback = self.driver.dialect().rollback();
        self.driver.run(rollback, &[]).await?;
        Ok(())
    }

    fn autocommit(&self) -> Option<bool> {
        self.autocommit
    }

    fn set_autocommit(&mut self, enabled: bool) {
        if self.autocommit.is_some() {
            self.autocommit = Some(enabled);
        }
    }
}

struct AdapterCursor<'c> {
    conn: &'c mut CursorAdapter,
    rows: Option<RowSet>,
}

#[async_trait]
impl Cursor for AdapterCursor<'_> {
    async fn execute(&mut self, sql: &str, params: &[Value]) -> Result<(), DriverError> {
        self.conn.ensure_transaction().await?;
        self.rows = Some(self.conn.driver.run(sql, params).await?);
        Ok(())
    }

    async fn fetch_all(&mut self) -> Result<RowSet, DriverError> {
        Ok(self.rows.take().unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::{CursorAdapter, StatementAdapter};
    use crate::connection::{CursorConnection, StatementConnection};
    use crate::testing::ScriptedDriver;

    #[tokio::test]
    async fn statement_adapter_opens_transaction_once() {
        let driver = ScriptedDriver::sqlite();
        let log = driver.log();
        let mut conn = StatementAdapter::new(Box::new(driver));

        conn.execute("INSERT INTO t VALUES (1)", &[]).await.unwrap();
        conn.execute("INSERT INTO t VALUES (2)", &[]).await.unwrap();
        conn.commit().await.unwrap();
        conn.commit().await.unwrap();

        assert_eq!(
            log.calls(),
            vec![
                "BEGIN",
                "INSERT INTO t VALUES (1)",
                "INSERT INTO t VALUES (2)",
                "COMMIT"
            ]
        );
        assert_eq!(conn.autocommit(), None);
    }

    #[tokio::test]
    async fn cursor_adapter_skips_begin_under_autocommit() {
        let driver = ScriptedDriver::sqlite();
        let log = driver.log();
        let mut conn = CursorAdapter::with_autocommit(Box::new(driver), Some(true));

        {
            let mut cur = conn.cursor();
            cur.execute("SELECT 1", &[]).await.unwrap();
        }
        conn.commit().await.unwrap();

        assert_eq!(log.calls(), vec!["SELECT 1"]);
    }

    #[tokio::test]
    async fn cursor_adapter_rollback_resets_transaction() {
        let driver = ScriptedDriver::sqlite();
        let log = driver.log();
        let mut conn = CursorAdapter::new(Box::new(driver));

        {
            let mut cur = conn.cursor();
            cur.execute("DELETE FROM t", &[]).await.unwrap();
        }
        conn.rollback().await.unwrap();
        {
            let mut cur = conn.cursor();
            cur.execute("SELECT 1", &[]).await.unwrap();
        }

        assert_eq!(
            log.calls(),
            vec!["BEGIN", "DELETE FROM t", "ROLLBACK", "BEGIN", "SELECT 1"]
        );
    }

    #[test]
    fn absent_autocommit_stays_absent() {
        let mut conn = CursorAdapter::with_autocommit(Box::new(ScriptedDriver::sqlite()), None);
        conn.set_autocommit(false);
        assert_eq!(conn.autocommit(), None);
    }
}
