use predms_db::{Connection, CursorAdapter};
use predms_executor::{ExecutorError, TimedExecutor};
use predms_migration::{ErrorLog, ImportError, LobOptions, LobProcessor, GATHER_LOBS_SCRIPT};
use predms_sql::DirectorySource;
use std::fs;
use std::sync::Arc;
use tempfile::TempDir;

const TARGET_TABLES: &str = "CREATE TABLE notes (id INTEGER, body TEXT);
INSERT INTO notes VALUES (1, 'hello'), (2, 'a longer remark');
CREATE TABLE blank (id INTEGER, body TEXT);
INSERT INTO blank VALUES (1, NULL);
CREATE TABLE empty_memos (id INTEGER, memo TEXT);
CREATE TABLE kept (id INTEGER, remark NTEXT);
CREATE TABLE TablesToConvert (RowID INTEGER, Joins TEXT);
INSERT INTO TablesToConvert VALUES (1, 'x');";

const GATHER_LOBS: &str = "DROP TABLE IF EXISTS LOB_COLUMN_UPDATES
GO
CREATE TABLE LOB_COLUMN_UPDATES (
    SchemaName TEXT,
    TableName TEXT,
    ColumnName TEXT,
    DataType TEXT,
    CurrentLength INTEGER,
    RowCnt INTEGER,
    MaxLen INTEGER,
    AlterStatement TEXT
)";

fn scripts() -> TempDir {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("sql").join(GATHER_LOBS_SCRIPT);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, GATHER_LOBS).unwrap();
    dir
}

async fn target() -> Connection {
    let driver = predms_db::open("sqlite::memory:").await.unwrap();
    let mut conn = Connection::cursor(CursorAdapter::new(driver));
    conn.query(TARGET_TABLES, &[]).await.unwrap();
    conn.commit().await.unwrap();
    conn
}

fn processor(dir: &TempDir, include_empty_tables: bool) -> LobProcessor {
    LobProcessor::new(
        LobOptions {
            db_name: "TargetDB".to_string(),
            include_empty_tables,
            always_include_tables: vec!["main.kept".to_string()],
            batch_size: 2,
        },
        TimedExecutor::new(5),
        Arc::new(DirectorySource::new(dir.path().join("sql"))),
        ErrorLog::new(dir.path().join("logs").join("lob_errors.log")),
    )
}

async fn recorded(conn: &mut Connection) -> Vec<(String, i64, String)> {
    let rows = conn
        .query(
            "SELECT TableName, MaxLen, AlterStatement FROM LOB_COLUMN_UPDATES ORDER BY TableName",
            &[],
        )
        .await
        .unwrap();
    rows.iter()
        .map(|r| {
            (
                r.text("TableName").unwrap(),
                r.int("MaxLen").unwrap(),
                r.text("AlterStatement").unwrap(),
            )
        })
        .collect()
}

#[tokio::test]
async fn columns_are_measured_and_recorded_before_any_alter() {
    let dir = scripts();
    let mut conn = target().await;

    // sqlite has no ALTER COLUMN, so the first recorded statement stops the run
    let err = processor(&dir, false).run(&mut conn).await.unwrap_err();
    assert!(matches!(err, ImportError::Executor(ExecutorError::Execution(_))));

    assert_eq!(
        recorded(&mut conn).await,
        vec![
            (
                "blank".to_string(),
                0,
                "ALTER TABLE [main].[blank] ALTER COLUMN [body] CHAR(1) NULL".to_string()
            ),
            (
                "kept".to_string(),
                0,
                "ALTER TABLE [main].[kept] ALTER COLUMN [remark] CHAR(1) NULL".to_string()
            ),
            (
                "notes".to_string(),
                15,
                "ALTER TABLE [main].[notes] ALTER COLUMN [body] VARCHAR(15) NULL".to_string()
            ),
        ]
    );

    let log = fs::read_to_string(dir.path().join("logs").join("lob_errors.log")).unwrap();
    assert!(log.contains("Failed to alter column (statement 1)"), "{log}");
}

#[tokio::test]
async fn include_empty_tables_records_every_column() {
    let dir = scripts();
    let mut conn = target().await;

    let _ = processor(&dir, true).run(&mut conn).await;

    let tables: Vec<String> = recorded(&mut conn).await.into_iter().map(|r| r.0).collect();
    assert_eq!(tables, vec!["blank", "empty_memos", "kept", "notes"]);
}

#[tokio::test]
async fn missing_gather_script_stops_before_the_catalog() {
    let dir = tempfile::tempdir().unwrap();
    let mut conn = target().await;

    let err = processor(&dir, false).run(&mut conn).await.unwrap_err();

    assert!(matches!(err, ImportError::Script(_)));
    let exists = conn
        .query("SELECT 1 FROM sqlite_master WHERE name = 'LOB_COLUMN_UPDATES'", &[])
        .await
        .unwrap();
    assert!(exists.is_empty());
}
