pub mod adapter;
pub mod any;
pub mod connection;
pub mod dialect;
pub mod driver;
pub mod error;
pub mod mssql;
#[cfg(any(test, feature = "testing"))]
pub mod testing;
pub mod value;

pub use adapter::{CursorAdapter, StatementAdapter};
pub use connection::{Connection, Cursor, CursorConnection, Shape, StatementConnection};
pub use dialect::Dialect;
pub use driver::{connect, open, Driver};
pub use error::DriverError;
pub use mssql::MssqlUrl;
pub use value::{Params, RowRef, RowSet, Value};
