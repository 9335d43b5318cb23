//! In-memory driver for exercising connection adapters and executors in tests.

use crate::dialect::Dialect;
use crate::driver::Driver;
use crate::error::DriverError;
use crate::value::{RowSet, Value};
use async_trait::async_trait;
use std::sync::{Arc, Mutex};

type Responder = Box<dyn FnMut(&str, &[Value]) -> Result<RowSet, DriverError> + Send>;

/// Shared record of every SQL text a [`ScriptedDriver`] was asked to run.
#[derive(Clone, Default)]
pub struct CallLog(Arc<Mutex<Vec<String>>>);

impl CallLog {
    pub fn calls(&self) -> Vec<String> {
        self.0.lock().map(|v| v.clone()).unwrap_or_default()
    }

    pub fn count(&self, sql: &str) -> usize {
        self.calls().iter().filter(|c| c.as_str() == sql).count()
    }

    pub fn count_matching(&self, needle: &str) -> usize {
        self.calls().iter().filter(|c| c.contains(needle)).count()
    }

    fn push(&self, sql: &str) {
        if let Ok(mut calls) = self.0.lock() {
            calls.push(sql.to_string());
        }
    }
}

pub struct ScriptedDriver {
    dialect: Dialect,
    log: CallLog,
    responder: Responder,
}

impl ScriptedDriver {
    pub fn new(dialect: Dialect) -> Self {
        Self {
            dialect,
            log: CallLog::default(),
            responder: Box::new(|_, _| Ok(RowSet::empty())),
        }
    }

    pub fn sqlite() -> Self {
        Self::new(Dialect::Sqlite)
    }

    pub fn sql_server() -> Self {
        Self::new(Dialect::SqlServer)
    }

    pub fn respond(
        mut self,
        responder: impl FnMut(&str, &[Value]) -> Result<RowSet, DriverError> + Send + 'static,
    ) -> Self {
        self.responder = Box::new(responder);
        self
    }

    pub fn log(&self) -> CallLog {
        self.log.clone()
    }
}

#[async_trait]
impl Driver for ScriptedDriver {
    fn dialect(&self) -> Dialect {
        self.dialect
    }

    async fn run(&mut self, sql: &str, params: &[Value]) -> Result<RowSet, DriverError> {
        self.log.push(sql);
        (self.responder)(sql, params)
    }
}

/// Single-column result with one row per value.
pub fn rows(column: &str, values: Vec<Value>) -> RowSet {
    RowSet::new(
        vec![column.to_string()],
        values.into_iter().map(|v| vec![v]).collect(),
    )
}
