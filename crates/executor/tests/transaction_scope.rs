mod common;

use common::{CountingCursorConnection, CountingStatementConnection};
use predms_db::Connection;
use predms_executor::{ExecutorError, TimedExecutor, TransactionScope};

async fn body(conn: &mut Connection, fail: bool) -> Result<u32, ExecutorError> {
    TimedExecutor::new(5)
        .execute(conn, "UPDATE t SET x = 1", &[], None)
        .await?;
    if fail {
        let err = TimedExecutor::new(5)
            .execute(conn, "FAIL here", &[], Some("phase"))
            .await
            .unwrap_err();
        return Err(err.into());
    }
    Ok(7)
}

#[tokio::test]
async fn success_commits_once_and_restores_autocommit() {
    let inner = CountingCursorConnection::new(Some(true));
    let tally = inner.tally.clone();
    let mut conn = Connection::cursor(inner);

    let mut scope = TransactionScope::enter(&mut conn);
    assert_eq!(scope.conn().autocommit(), Some(false));
    let result = body(scope.conn(), false).await;
    let value = scope.finish(result).await.unwrap();

    assert_eq!(value, 7);
    assert_eq!(conn.autocommit(), Some(true));
    let counts = tally.snapshot();
    assert_eq!((counts.commits, counts.rollbacks), (1, 0));
}

#[tokio::test]
async fn failure_rolls_back_once_and_returns_original_error() {
    let mut inner = CountingCursorConnection::new(Some(true));
    inner.fail_on = Some("FAIL");
    let tally = inner.tally.clone();
    let mut conn = Connection::cursor(inner);

    let mut scope = TransactionScope::enter(&mut conn);
    let result = body(scope.conn(), true).await;
    let err = scope.finish(result).await.unwrap_err();

    match err {
        ExecutorError::Execution(e) => {
            assert_eq!(e.sql(), "FAIL here");
            assert_eq!(e.name(), Some("phase"));
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(conn.autocommit(), Some(true));
    let counts = tally.snapshot();
    assert_eq!((counts.commits, counts.rollbacks), (0, 1));
}

#[tokio::test]
async fn connection_without_autocommit_keeps_it_absent() {
    let inner = CountingStatementConnection::new();
    let tally = inner.tally.clone();
    let mut conn = Connection::statement(inner);

    let mut scope = TransactionScope::enter(&mut conn);
    let result = body(scope.conn(), false).await;
    scope.finish(result).await.unwrap();
    assert_eq!(conn.autocommit(), None);

    let scope = TransactionScope::enter(&mut conn);
    let failed: Result<(), ExecutorError> = Err(ExecutorError::LedgerSetupFailed {
        message: "boom".to_string(),
    });
    assert!(scope.finish(failed).await.is_err());
    assert_eq!(conn.autocommit(), None);

    let counts = tally.snapshot();
    assert_eq!((counts.commits, counts.rollbacks), (1, 1));
}

#[tokio::test]
async fn dropping_an_unfinished_scope_restores_autocommit() {
    let mut conn = Connection::cursor(CountingCursorConnection::new(Some(true)));

    {
        let mut scope = TransactionScope::enter(&mut conn);
        assert_eq!(scope.conn().autocommit(), Some(false));
    }

    assert_eq!(conn.autocommit(), Some(true));
}

#[tokio::test]
async fn autocommit_off_stays_off() {
    let mut conn = Connection::cursor(CountingCursorConnection::new(Some(false)));

    let scope = TransactionScope::enter(&mut conn);
    scope.finish(Ok::<_, ExecutorError>(())).await.unwrap();

    assert_eq!(conn.autocommit(), Some(false));
}
