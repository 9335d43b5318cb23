#![allow(dead_code)]

use async_trait::async_trait;
use predms_db::{
    Cursor, CursorConnection, Dialect, DriverError, RowSet, StatementConnection, Value,
};
use std::sync::{Arc, Mutex};

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Counts {
    pub executed: Vec<String>,
    pub commits: usize,
    pub rollbacks: usize,
}

#[derive(Clone, Default)]
pub struct Tally(Arc<Mutex<Counts>>);

impl Tally {
    pub fn snapshot(&self) -> Counts {
        self.0.lock().unwrap().clone()
    }

    fn with<R>(&self, f: impl FnOnce(&mut Counts) -> R) -> R {
        f(&mut self.0.lock().unwrap())
    }
}

/// Cursor connection that counts transaction control calls.
pub struct CountingCursorConnection {
    pub tally: Tally,
    pub autocommit: Option<bool>,
    pub fail_on: Option<&'static str>,
}

impl CountingCursorConnection {
    pub fn new(autocommit: Option<bool>) -> Self {
        Self {
            tally: Tally::default(),
            autocommit,
            fail_on: None,
        }
    }
}

struct CountingCursor<'a> {
    tally: &'a Tally,
    fail_on: Option<&'static str>,
}

#[async_trait]
impl Cursor for CountingCursor<'_> {
    async fn execute(&mut self, sql: &str, _params: &[Value]) -> Result<(), DriverError> {
        self.tally.with(|c| c.executed.push(sql.to_string()));
        match self.fail_on {
            Some(needle) if sql.contains(needle) => Err(DriverError::new("forced failure")),
            _ => Ok(()),
        }
    }

    async fn fetch_all(&mut self) -> Result<RowSet, DriverError> {
        Ok(RowSet::empty())
    }
}

#[async_trait]
impl CursorConnection for CountingCursorConnection {
    fn dialect(&self) -> Dialect {
        Dialect::SqlServer
    }

    fn cursor(&mut self) -> Box<dyn Cursor + '_> {
        Box::new(CountingCursor {
            tally: &self.tally,
            fail_on: self.fail_on,
        })
    }

    async fn commit(&mut self) -> Result<(), DriverError> {
        self.tally.with(|c| c.commits += 1);
        Ok(())
    }

    async fn rollback(&mut self) -> Result<(), DriverError> {
        self.tally.with(|c| c.rollbacks += 1);
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

/// Statement connection without an autocommit flag.
pub struct CountingStatementConnection {
    pub tally: Tally,
}

impl CountingStatementConnection {
    pub fn new() -> Self {
        Self {
            tally: Tally::default(),
        }
    }
}

#[async_trait]
impl StatementConnection for CountingStatementConnection {
    fn dialect(&self) -> Dialect {
        Dialect::SqlServer
    }

    async fn execute(&mut self, sql: &str, _params: &[Value]) -> Result<RowSet, DriverError> {
        self.tally.with(|c| c.executed.push(sql.to_string()));
        Ok(RowSet::empty())
    }

    async fn commit(&mut self) -> Result<(), DriverError> {
        self.tally.with(|c| c.commits += 1);
        Ok(())
    }

    async fn rollback(&mut self) -> Result<(), DriverError> {
        self.tally.with(|c| c.rollbacks += 1);
        Ok(())
    }
}
