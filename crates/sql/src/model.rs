/// One executable unit cut from a script, with its 1-based position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SqlBatch {
    pub ordinal: usize,
    pub sql: String,
}

impl SqlBatch {
    pub fn new(ordinal: usize, sql: impl Into<String>) -> Self {
        Self {
            ordinal,
            sql: sql.into(),
        }
    }

    pub fn sql(&self) -> &str {
        &self.sql
    }
}
