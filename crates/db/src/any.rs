use crate::dialect::Dialect;
use crate::driver::Driver;
use crate::error::DriverError;
use crate::value::{RowSet, Value};
use async_trait::async_trait;
use sqlx::any::{Any, AnyArguments, AnyRow};
use sqlx::AnyConnection;
use sqlx::query::Query;
use sqlx::{Column, Connection, Executor, Row};

/// Postgres and SQLite access through sqlx's `Any` driver.
pub struct SqlxDriver {
    conn: AnyConnection,
    dialect: Dialect,
}

impl SqlxDriver {
    pub async fn connect(url: &str, dialect: Dialect) -> Result<Self, DriverError> {
        sqlx::any::install_default_drivers();
        let conn = AnyConnection::connect(url).await?;
        Ok(Self { conn, dialect })
    }
}

#[async_trait]
impl Driver for SqlxDriver {
    fn dialect(&self) -> Dialect {
        self.dialect
    }

    async fn run(&mut self, sql: &str, params: &[Value]) -> Result<RowSet, DriverError> {
        // Unparameterised text may hold several statements; only the raw path allows that.
        let rows = if params.is_empty() {
            Executor::fetch_all(&mut self.conn, sqlx::raw_sql(sql)).await?
        } else {
            let mut query = sqlx::query(sql);
            for value in params {
                query = bind(query, value);
            }
            Executor::fetch_all(&mut self.conn, query).await?
        };

        Ok(to_row_set(&rows))
    }
}

fn bind<'q>(
    query: Query<'q, Any, AnyArguments<'q>>,
    value: &Value,
) -> Query<'q, Any, AnyArguments<'q>> {
    match value {
        Value::Null => query.bind(Option::<String>::None),
        Value::Bool(v) => query.bind(*v),
        Value::Int(v) => query.bind(*v),
        Value::Float(v) => query.bind(*v),
        Value::Text(v) => query.bind(v.clone()),
        Value::Bytes(v) => query.bind(v.clone()),
    }
}

fn to_row_set(rows: &[AnyRow]) -> RowSet {
    let columns = rows
        .first()
        .map(|row| {
            row.columns()
                .iter()
                .map(|c| c.name().to_string())
                .collect::<Vec<_>>()
        })
        .unwrap_or_default();

    let values = rows
        .iter()
        .map(|row| (0..row.len()).map(|idx| decode(row, idx)).collect())
        .collect();

    RowSet::new(columns, values)
}

fn decode(row: &AnyRow, idx: usize) -> Value {
    if let Ok(v) = row.try_get::<Option<i64>, _>(idx) {
        return v.map(Value::Int).unwrap_or(Value::Null);
    }
    if let Ok(v) = row.try_get::<Option<f64>, _>(idx) {
        return v.map(Value::Float).unwrap_or(Value::Null);
    }
    if let Ok(v) = row.try_get::<Option<String>, _>(idx) {
        return v.map(Value::Text).unwrap_or(Value::Null);
    }
    if let Ok(v) = row.try_get::<Option<bool>, _>(idx) {
        return v.map(Value::Bool).unwrap_or(Value::Null);
    }
    if let Ok(v) = row.try_get::<Option<Vec<u8>>, _>(idx) {
        return v.map(Value::Bytes).unwrap_or(Value::Null);
    }
    Value::Null
}
