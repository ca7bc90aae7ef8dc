use crate::db::*;
use tempfile::NamedTempFile;

#[tokio::test]
async fn test_cycle_lifecycle() {
    let temp_file = NamedTempFile::new().unwrap();
    let db = Database::new(temp_file.path()).await.unwrap();

    let id = db.start_cycle().await.unwrap();
    let open = db.recent_cycles(10).await.unwrap();
    assert_eq!(open.len(), 1);
    assert_eq!(open[0].id, id);
    assert!(open[0].finished_at.is_none());

    db.finish_cycle(id, 2, 3, None).await.unwrap();

    let cycles = db.recent_cycles(10).await.unwrap();
    assert_eq!(cycles[0].retrieved, 2);
    assert_eq!(cycles[0].pages, 3);
    assert!(cycles[0].finished_at.is_some());
    assert!(cycles[0].error_message.is_none());

    db.close().await;
}

#[tokio::test]
async fn test_failed_cycle_keeps_error() {
    let temp_file = NamedTempFile::new().unwrap();
    let db = Database::new(temp_file.path()).await.unwrap();

    let id = db.start_cycle().await.unwrap();
    db.finish_cycle(id, 0, 1, Some("fetch error: https://example.com returned HTTP 503"))
        .await
        .unwrap();

    let cycles = db.recent_cycles(1).await.unwrap();
    assert_eq!(
        cycles[0].error_message.as_deref(),
        Some("fetch error: https://example.com returned HTTP 503")
    );

    db.close().await;
}

#[tokio::test]
async fn test_recent_cycles_newest_first_and_total() {
    let temp_file = NamedTempFile::new().unwrap();
    let db = Database::new(temp_file.path()).await.unwrap();

    assert_eq!(db.total_retrieved().await.unwrap(), 0);

    for retrieved in [1usize, 0, 4] {
        let id = db.start_cycle().await.unwrap();
        db.finish_cycle(id, retrieved, 1, None).await.unwrap();
    }

    let cycles = db.recent_cycles(2).await.unwrap();
    assert_eq!(cycles.len(), 2);
    assert_eq!(cycles[0].retrieved, 4);
    assert_eq!(cycles[1].retrieved, 0);
    assert_eq!(db.total_retrieved().await.unwrap(), 5);

    db.close().await;
}
