use core::fmt;

/// A single column value crossing the driver boundary.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Bytes(Vec<u8>),
}

/// Positional parameters, bound in order to the dialect's placeholders.
pub type Params = Vec<Value>;

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(v) => Some(*v),
            Value::Bool(v) => Some(i64::from(*v)),
            Value::Float(v) if v.fract() == 0.0 => Some(*v as i64),
            Value::Text(v) => v.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(v) => Some(v.as_str()),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(v) => Some(*v),
            Value::Int(v) => Some(*v != 0),
            Value::Text(v) => match v.trim() {
                "1" => Some(true),
                "0" => Some(false),
                other => other.parse().ok(),
            },
            _ => None,
        }
    }

    /// Text rendering used when a value is read as a string column.
    pub fn to_text(&self) -> Option<String> {
        match self {
            Value::Null => None,
            Value::Text(v) => Some(v.clone()),
            Value::Bytes(v) => Some(String::from_utf8_lossy(v).into_owned()),
            other => Some(other.to_string()),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "NULL"),
            Value::Bool(v) => write!(f, "{v}"),
            Value::Int(v) => write!(f, "{v}"),
            Value::Float(v) => write!(f, "{v}"),
            Value::Text(v) => write!(f, "{v}"),
            Value::Bytes(v) => write!(f, "<{} bytes>", v.len()),
        }
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

/// Fully materialised result of one statement.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RowSet {
    columns: Vec<String>,
    rows: Vec<Vec<Value>>,
}

impl RowSet {
    pub fn new(columns: Vec<String>, rows: Vec<Vec<Value>>) -> Self {
        Self { columns, rows }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = RowRef<'_>> {
        self.rows.iter().map(move |values| RowRef {
            columns: &self.columns,
            values,
        })
    }

    pub fn first(&self) -> Option<RowRef<'_>> {
        self.iter().next()
    }
}

#[derive(Debug, Clone, Copy)]
pub struct RowRef<'a> {
    columns: &'a [String],
    values: &'a [Value],
}

impl<'a> RowRef<'a> {
    /// Column lookup is case-insensitive, matching SQL Server's default collation.
    pub fn get(&self, column: &str) -> Option<&'a Value> {
        let idx = self
            .columns
            .iter()
            .position(|c| c.eq_ignore_ascii_case(column))?;
        self.values.get(idx)
    }

    pub fn at(&self, idx: usize) -> Option<&'a Value> {
        self.values.get(idx)
    }

    pub fn text(&self, column: &str) -> Option<String> {
        self.get(column).and_then(Value::to_text)
    }

    pub fn int(&self, column: &str) -> Option<i64> {
        self.get(column).and_then(Value::as_i64)
    }

    pub fn values(&self) -> &'a [Value] {
        self.values
    }
}

#[cfg(test)]
mod tests {
    use super::{RowSet, Value};

    #[test]
    fn column_lookup_ignores_case() {
        let rs = RowSet::new(
            vec!["SchemaName".to_string(), "ScopeRowCount".to_string()],
            vec![vec![Value::from("dbo"), Value::Int(12)]],
        );
        let row = rs.first().unwrap();
        assert_eq!(row.text("schemaname").as_deref(), Some("dbo"));
        assert_eq!(row.int("SCOPEROWCOUNT"), Some(12));
        assert!(row.get("missing").is_none());
    }

    #[test]
    fn numeric_text_reads_as_integer() {
        assert_eq!(Value::from(" 42 ").as_i64(), Some(42));
        assert_eq!(Value::Float(3.0).as_i64(), Some(3));
        assert_eq!(Value::Float(3.5).as_i64(), None);
        assert_eq!(Value::from("1").as_bool(), Some(true));
    }
}
