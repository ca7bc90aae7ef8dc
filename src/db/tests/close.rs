use crate::db::*;
use tempfile::NamedTempFile;

/// Querying the ledger after the pool is closed returns an error rather than hanging.
#[tokio::test]
async fn test_ledger_query_after_pool_close_returns_error() {
    let temp_file = NamedTempFile::new().unwrap();
    let db = Database::new(temp_file.path()).await.unwrap();

    assert!(!db.ledger_contains("abc").await.unwrap());

    db.pool.close().await;

    let result = db.ledger_contains("abc").await;
    assert!(
        result.is_err(),
        "ledger_contains after pool close should return an error, got: {:?}",
        result
    );
}
