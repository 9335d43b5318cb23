use crate::dialect::Dialect;
use crate::error::DriverError;
use crate::value::{RowSet, Value};
use async_trait::async_trait;

/// Connection that executes SQL directly and returns its rows.
#[async_trait]
pub trait StatementConnection: Send {
    fn dialect(&self) -> Dialect;

    async fn execute(&mut self, sql: &str, params: &[Value]) -> Result<RowSet, DriverError>;

    async fn commit(&mut self) -> Result<(), DriverError>;

    async fn rollback(&mut self) -> Result<(), DriverError>;

    /// `None` when the connection has no autocommit concept.
    fn autocommit(&self) -> Option<bool> {
        None
    }

    fn set_autocommit(&mut self, _enabled: bool) {}
}

/// Cursor opened on a [`CursorConnection`].
#[async_trait]
pub trait Cursor: Send {
    async fn execute(&mut self, sql: &str, params: &[Value]) -> Result<(), DriverError>;

    /// Rows of the last executed statement; empty when it produced no result set.
    async fn fetch_all(&mut self) -> Result<RowSet, DriverError>;
}

/// Connection that executes through cursors and exposes an autocommit flag.
#[async_trait]
pub trait CursorConnection: Send {
    fn dialect(&self) -> Dialect;

    fn cursor(&mut self) -> Box<dyn Cursor + '_>;

    async fn commit(&mut self) -> Result<(), DriverError>;

    async fn rollback(&mut self) -> Result<(), DriverError>;

    fn autocommit(&self) -> Option<bool>;

    fn set_autocommit(&mut self, enabled: bool);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shape {
    Statement,
    Cursor,
}

impl Shape {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "statement" => Some(Shape::Statement),
            "cursor" => Some(Shape::Cursor),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Shape::Statement => "statement",
            Shape::Cursor => "cursor",
        }
    }
}

/// A connection in exactly one of the two shapes.
///
/// The shape is fixed when the connection is wrapped; every operation dispatches
/// on it once and never mixes the two behaviours.
pub enum Connection {
    Statement(Box<dyn StatementConnection>),
    Cursor(Box<dyn CursorConnection>),
}

impl Connection {
    pub fn statement(conn: impl StatementConnection + 'static) -> Self {
        Connection::Statement(Box::new(conn))
    }

    pub fn cursor(conn: impl CursorConnection + 'static) -> Self {
        Connection::Cursor(Box::new(conn))
    }

    pub fn shape(&self) -> Shape {
        match self {
            Connection::Statement(_) => Shape::Statement,
            Connection::Cursor(_) => Shape::Cursor,
        }
    }

    pub fn dialect(&self) -> Dialect {
        match self {
            Connection::Statement(c) => c.dialect(),
            Connection::Cursor(c) => c.dialect(),
        }
    }

    /// Run `sql` and collect its rows without any timeout directive.
    pub async fn query(&mut self, sql: &str, params: &[Value]) -> Result<RowSet, DriverError> {
        match self {
            Connection::Statement(c) => c.execute(sql, params).await,
            Connection::Cursor(c) => {
                let mut cursor = c.cursor();
                cursor.execute(sql, params).await?;
                cursor.fetch_all().await
            }
        }
    }

    pub async fn commit(&mut self) -> Result<(), DriverError> {
        match self {
            Connection::Statement(c) => c.commit().await,
            Connection::Cursor(c) => c.commit().await,
        }
    }

    pub async fn rollback(&mut self) -> Result<(), DriverError> {
        match self {
            Connection::Statement(c) => c.rollback().await,
            Connection::Cursor(c) => c.rollback().await,
        }
    }

    pub fn autocommit(&self) -> Option<bool> {
        match self {
            Connection::Statement(c) => c.autocommit(),
            Connection::Cursor(c) => c.autocommit(),
        }
    }

    pub fn set_autocommit(&mut self, enabled: bool) {
        match self {
            Connection::Statement(c) => c.set_autocommit(enabled),
            Connection::Cursor(c) => c.set_autocommit(enabled),
        }
    }
}

impl core::fmt::Debug for Connection {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Connection")
            .field("shape", &self.shape())
            .field("dialect", &self.dialect())
            .field("autocommit", &self.autocommit())
            .finish()
    }
}
