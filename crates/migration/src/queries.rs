//! Dialect-aware SQL for the importer's control tables.
//!
//! Every interpolated name has been through `validate_identifier` first.

use predms_db::Dialect;

fn text(dialect: Dialect, expr: &str) -> String {
    match dialect {
        Dialect::SqlServer => format!("CAST({expr} AS NVARCHAR(MAX))"),
        Dialect::Postgres => format!("CAST({expr} AS TEXT)"),
        Dialect::Sqlite => expr.to_string(),
    }
}

/// Rows to convert, in database, schema, table order.
pub fn table_operations(dialect: Dialect, db_name: &str, tables_table: &str) -> String {
    let table = dialect.database_table(db_name, tables_table);
    let drop = text(dialect, "Drop_IfExists");
    let select_into = dialect.concat("Select_Into", "COALESCE(Joins, '')");
    format!(
        "SELECT RowID, DatabaseName, SchemaName, TableName, fConvert, ScopeRowCount, \
{drop} AS Drop_IfExists, {select_into} AS Select_Into \
FROM {table} S WHERE fConvert = 1 ORDER BY DatabaseName, SchemaName, TableName"
    )
}

/// Converted tables that ended up without rows.
pub fn empty_tables(dialect: Dialect, db_name: &str, tables_table: &str) -> String {
    let table = dialect.database_table(db_name, tables_table);
    format!(
        "SELECT SchemaName, TableName FROM {table}{} \
WHERE fConvert = 1 AND COALESCE(ScopeRowCount, 0) = 0",
        dialect.nolock()
    )
}

/// NOT NULL scripts (`TYPEY = 1`) before PK scripts (`TYPEY = 2`) for every converted table.
pub fn primary_keys(dialect: Dialect, db_name: &str, pk_table: &str, tables_table: &str) -> String {
    let pks = dialect.database_table(db_name, pk_table);
    let tables = dialect.database_table(db_name, tables_table);
    let nolock = dialect.nolock();
    format!(
        "WITH CTE_PKS AS (
    SELECT 1 AS TYPEY, S.DatabaseName, S.SchemaName, S.TableName, S.Script
    FROM {pks} S
    WHERE S.ScriptType = 'NOT_NULL'
    UNION
    SELECT 2 AS TYPEY, S.DatabaseName, S.SchemaName, S.TableName, S.Script
    FROM {pks} S
    WHERE S.ScriptType = 'PK'
)
SELECT S.TYPEY, TTC.ScopeRowCount, S.DatabaseName, S.SchemaName, S.TableName,
       REPLACE(S.Script, 'FLAG NOT NULL', 'BIT NOT NULL') AS Script, TTC.fConvert
FROM CTE_PKS S
INNER JOIN {tables} TTC{nolock}
    ON S.SchemaName = TTC.SchemaName AND S.TableName = TTC.TableName
WHERE TTC.fConvert = 1
ORDER BY S.SchemaName, S.TableName, S.TYPEY"
    )
}

/// One row when a `dbo` table named by the first parameter exists.
pub fn table_exists(dialect: Dialect) -> String {
    let p = dialect.placeholder(1);
    match dialect {
        Dialect::SqlServer => format!(
            "SELECT 1 FROM INFORMATION_SCHEMA.TABLES WITH (NOLOCK) WHERE TABLE_SCHEMA = 'dbo' AND TABLE_NAME = {p}"
        ),
        Dialect::Postgres => format!(
            "SELECT 1 FROM information_schema.tables WHERE table_schema = current_schema() AND lower(table_name) = lower({p})"
        ),
        Dialect::Sqlite => {
            format!("SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = {p}")
        }
    }
}

pub fn count_rows(dialect: Dialect, schema: &str, table: &str) -> String {
    format!("SELECT COUNT(*) AS row_count FROM {}", dialect.table(schema, table))
}

/// Parameters: row count, then RowID.
pub fn update_scope_row_count(dialect: Dialect, db_name: &str, tables_table: &str) -> String {
    format!(
        "UPDATE {} SET ScopeRowCount = {} WHERE RowID = {}",
        dialect.database_table(db_name, tables_table),
        dialect.placeholder(1),
        dialect.placeholder(2)
    )
}

pub fn drop_table(dialect: Dialect, schema: &str, table: &str) -> String {
    format!("DROP TABLE IF EXISTS {}", dialect.table(schema, table))
}

fn quoted_list(names: &[&str]) -> String {
    names
        .iter()
        .map(|n| format!("'{n}'"))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Large text columns of the target database, skipping the tables in `excluded`.
///
/// Columns: SchemaName, TableName, ColumnName, DataType, CurrentLength, RowCnt.
/// `RowCnt` is NULL where the catalog has no cheap row count.
pub fn lob_columns(dialect: Dialect, db_name: &str, excluded: &[&str]) -> String {
    let excluded = quoted_list(excluded);
    match dialect {
        Dialect::SqlServer => format!(
            "SELECT s.name AS SchemaName, t.name AS TableName, c.name AS ColumnName,
       TYPE_NAME(c.user_type_id) AS DataType,
       CASE WHEN TYPE_NAME(c.user_type_id) IN ('varchar', 'nvarchar') THEN c.max_length ELSE NULL END AS CurrentLength,
       (SELECT SUM(p.rows) FROM {db_name}.sys.partitions p
        WHERE p.object_id = t.object_id AND p.index_id IN (0, 1)) AS RowCnt
FROM {db_name}.sys.tables t
INNER JOIN {db_name}.sys.schemas s ON t.schema_id = s.schema_id
INNER JOIN {db_name}.sys.columns c ON t.object_id = c.object_id
WHERE t.name NOT IN ({excluded})
AND (
    TYPE_NAME(c.user_type_id) IN ('text', 'ntext')
    OR (TYPE_NAME(c.user_type_id) IN ('varchar', 'nvarchar') AND (c.max_length > 5000 OR c.max_length = -1))
)
ORDER BY s.name, t.name, c.name"
        ),
        Dialect::Postgres => format!(
            "SELECT table_schema AS SchemaName, table_name AS TableName, column_name AS ColumnName,
       data_type AS DataType, character_maximum_length AS CurrentLength, NULL AS RowCnt
FROM information_schema.columns
WHERE table_schema = current_schema() AND table_name NOT IN ({excluded})
AND (data_type = 'text' OR (data_type = 'character varying'
    AND (character_maximum_length IS NULL OR character_maximum_length > 5000)))
ORDER BY table_schema, table_name, column_name"
        ),
        Dialect::Sqlite => format!(
            "SELECT 'main' AS SchemaName, m.name AS TableName, p.name AS ColumnName,
       lower(p.type) AS DataType, NULL AS CurrentLength, NULL AS RowCnt
FROM sqlite_master m JOIN pragma_table_info(m.name) p
WHERE m.type = 'table' AND m.name NOT LIKE 'sqlite_%' AND m.name NOT IN ({excluded})
AND (lower(p.type) IN ('text', 'ntext') OR lower(p.type) LIKE '%varchar(max)')
ORDER BY m.name, p.name"
        ),
    }
}

/// Longest value stored in a text column; `cast` wraps legacy `text`/`ntext` types.
pub fn max_length(dialect: Dialect, schema: &str, table: &str, column: &str, cast: bool) -> String {
    match dialect {
        Dialect::SqlServer if cast => format!(
            "SELECT MAX(LEN(CAST([{column}] AS NVARCHAR(MAX)))) AS max_len FROM [{schema}].[{table}]"
        ),
        Dialect::SqlServer => {
            format!("SELECT MAX(LEN([{column}])) AS max_len FROM [{schema}].[{table}]")
        }
        Dialect::Postgres | Dialect::Sqlite => format!(
            "SELECT MAX(LENGTH({column})) AS max_len FROM {}",
            dialect.table(schema, table)
        ),
    }
}

pub fn insert_lob_update(dialect: Dialect, db_name: &str, lob_table: &str) -> String {
    let placeholders = (1..=8)
        .map(|n| dialect.placeholder(n))
        .collect::<Vec<_>>()
        .join(", ");
    format!(
        "INSERT INTO {} (SchemaName, TableName, ColumnName, DataType, CurrentLength, RowCnt, MaxLen, AlterStatement) \
VALUES ({placeholders})",
        dialect.database_table(db_name, lob_table)
    )
}

/// Recorded ALTER statements, widest columns first, with the trailing ` NULL` turned into `;`.
pub fn lob_alter_statements(dialect: Dialect, db_name: &str, lob_table: &str) -> String {
    format!(
        "SELECT REPLACE(S.AlterStatement, ' NULL', ';') AS Alter_Statement \
FROM {} S WHERE S.TableName NOT LIKE '%LOB_COL%' ORDER BY S.MaxLen DESC",
        dialect.database_table(db_name, lob_table)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_operations_join_select_into_with_joins() {
        let sql = table_operations(Dialect::SqlServer, "TargetDB", "TablesToConvert");
        assert!(sql.contains("FROM TargetDB.dbo.TablesToConvert S WHERE fConvert = 1"));
        assert!(sql.contains("CAST(CAST(Select_Into AS NVARCHAR(MAX)) + CAST(COALESCE(Joins, '') AS NVARCHAR(MAX)) AS NVARCHAR(MAX)) AS Select_Into"));
        assert!(sql.ends_with("ORDER BY DatabaseName, SchemaName, TableName"));

        let sql = table_operations(Dialect::Sqlite, "TargetDB", "TablesToConvert");
        assert!(sql.contains("(Select_Into || COALESCE(Joins, '')) AS Select_Into"));
        assert!(sql.contains("FROM TablesToConvert S"));
    }

    #[test]
    fn primary_keys_rewrite_flag_columns() {
        let sql = primary_keys(
            Dialect::SqlServer,
            "TargetDB",
            "PrimaryKeyScripts_Financial",
            "TablesToConvert_Financial",
        );
        assert!(sql.contains("FROM TargetDB.dbo.PrimaryKeyScripts_Financial S"));
        assert!(sql.contains("INNER JOIN TargetDB.dbo.TablesToConvert_Financial TTC WITH (NOLOCK)"));
        assert!(sql.contains("REPLACE(S.Script, 'FLAG NOT NULL', 'BIT NOT NULL')"));
        assert!(sql.ends_with("ORDER BY S.SchemaName, S.TableName, S.TYPEY"));
    }

    #[test]
    fn drops_and_counts_use_dialect_table_names() {
        assert_eq!(
            drop_table(Dialect::SqlServer, "dbo", "Cases"),
            "DROP TABLE IF EXISTS dbo.Cases"
        );
        assert_eq!(
            count_rows(Dialect::Sqlite, "dbo", "Cases"),
            "SELECT COUNT(*) AS row_count FROM Cases"
        );
        assert_eq!(
            update_scope_row_count(Dialect::Postgres, "db", "TablesToConvert"),
            "UPDATE TablesToConvert SET ScopeRowCount = $1 WHERE RowID = $2"
        );
    }

    #[test]
    fn lob_catalog_skips_control_tables() {
        let sql = lob_columns(
            Dialect::SqlServer,
            "TargetDB",
            &["TablesToConvert", "LOB_COLUMN_UPDATES"],
        );
        assert!(sql.contains("FROM TargetDB.sys.tables t"));
        assert!(sql.contains("WHERE t.name NOT IN ('TablesToConvert', 'LOB_COLUMN_UPDATES')"));
        assert!(sql.contains("c.max_length > 5000 OR c.max_length = -1"));
    }

    #[test]
    fn max_length_casts_legacy_text() {
        assert_eq!(
            max_length(Dialect::SqlServer, "dbo", "Notes", "Body", true),
            "SELECT MAX(LEN(CAST([Body] AS NVARCHAR(MAX)))) AS max_len FROM [dbo].[Notes]"
        );
        assert_eq!(
            max_length(Dialect::Sqlite, "main", "notes", "body", false),
            "SELECT MAX(LENGTH(body)) AS max_len FROM notes"
        );
    }

    #[test]
    fn lob_updates_are_inserted_with_eight_parameters() {
        let sql = insert_lob_update(Dialect::SqlServer, "TargetDB", "LOB_COLUMN_UPDATES");
        assert!(sql.starts_with("INSERT INTO TargetDB.dbo.LOB_COLUMN_UPDATES (SchemaName"));
        assert!(sql.ends_with("VALUES (@P1, @P2, @P3, @P4, @P5, @P6, @P7, @P8)"));
    }
}
