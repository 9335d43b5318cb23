/// SQL dialect of the store a driver talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    SqlServer,
    Postgres,
    Sqlite,
}

impl Dialect {
    pub fn detect(url: &str) -> Option<Self> {
        let lower = url.trim().to_ascii_lowercase();
        if lower.starts_with("postgres://") || lower.starts_with("postgresql://") {
            return Some(Dialect::Postgres);
        }
        if lower.starts_with("sqlite:") {
            return Some(Dialect::Sqlite);
        }
        if lower.starts_with("jdbc:sqlserver://")
            || lower.starts_with("sqlserver://")
            || lower.starts_with("mssql://")
            || lower.contains("server=")
        {
            return Some(Dialect::SqlServer);
        }
        None
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Dialect::SqlServer => "sqlserver",
            Dialect::Postgres => "postgres",
            Dialect::Sqlite => "sqlite",
        }
    }

    /// Placeholder for the 1-based positional parameter `n`.
    pub fn placeholder(self, n: usize) -> String {
        match self {
            Dialect::SqlServer => format!("@P{n}"),
            Dialect::Postgres => format!("${n}"),
            Dialect::Sqlite => "?".to_string(),
        }
    }

    pub fn lock_timeout(self, timeout_secs: u64) -> String {
        let ms = timeout_secs.saturating_mul(1000);
        match self {
            Dialect::SqlServer => format!("SET LOCK_TIMEOUT {ms}"),
            Dialect::Postgres => format!("SET lock_timeout = {ms}"),
            Dialect::Sqlite => format!("PRAGMA busy_timeout = {ms}"),
        }
    }

    pub fn begin(self) -> &'static str {
        match self {
            Dialect::SqlServer => "BEGIN TRANSACTION",
            Dialect::Postgres | Dialect::Sqlite => "BEGIN",
        }
    }

    pub fn commit(self) -> &'static str {
        match self {
            Dialect::SqlServer => "COMMIT TRANSACTION",
            Dialect::Postgres | Dialect::Sqlite => "COMMIT",
        }
    }

    pub fn rollback(self) -> &'static str {
        match self {
            Dialect::SqlServer => "IF @@TRANCOUNT > 0 ROLLBACK TRANSACTION",
            Dialect::Postgres | Dialect::Sqlite => "ROLLBACK",
        }
    }

    /// Table hint for reads that must not block behind long-running writers.
    pub fn nolock(self) -> &'static str {
        match self {
            Dialect::SqlServer => " WITH (NOLOCK)",
            Dialect::Postgres | Dialect::Sqlite => "",
        }
    }

    /// Name of a table that lives in `schema` of the target database.
    pub fn table(self, schema: &str, table: &str) -> String {
        match self {
            Dialect::SqlServer | Dialect::Postgres => format!("{schema}.{table}"),
            Dialect::Sqlite => table.to_string(),
        }
    }

    /// Name of a `dbo` table inside `database`, as seen from the target connection.
    pub fn database_table(self, database: &str, table: &str) -> String {
        match self {
            Dialect::SqlServer => format!("{database}.dbo.{table}"),
            Dialect::Postgres | Dialect::Sqlite => table.to_string(),
        }
    }

    /// String concatenation of two text expressions.
    pub fn concat(self, left: &str, right: &str) -> String {
        match self {
            Dialect::SqlServer => format!(
                "CAST(CAST({left} AS NVARCHAR(MAX)) + CAST({right} AS NVARCHAR(MAX)) AS NVARCHAR(MAX))"
            ),
            Dialect::Postgres | Dialect::Sqlite => format!("({left} || {right})"),
        }
    }
}
