//! Assertions over cycle output

use c2c_dl::Event;
use std::path::Path;
use std::time::Duration;
use tokio::sync::broadcast;

/// Drain events until the next `CycleFinished`, returning everything seen
pub async fn events_until_cycle_finished(
    events: &mut broadcast::Receiver<Event>,
    timeout: Duration,
) -> Vec<Event> {
    let mut seen = Vec::new();
    let drained = tokio::time::timeout(timeout, async {
        loop {
            match events.recv().await {
                Ok(event) => {
                    let finished = matches!(event, Event::CycleFinished { .. });
                    seen.push(event);
                    if finished {
                        return;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => return,
            }
        }
    })
    .await;
    assert!(drained.is_ok(), "timed out waiting for CycleFinished");
    seen
}

/// Assert a file exists and contains `needle`
pub fn assert_file_contains(path: &Path, needle: &str) {
    let content = std::fs::read_to_string(path)
        .unwrap_or_else(|e| panic!("failed to read {}: {e}", path.display()));
    assert!(
        content.contains(needle),
        "{} does not contain {needle:?}:\n{content}",
        path.display()
    );
}

/// Names of the files in `dir`, sorted
pub fn list_files(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .map(|entries| {
            entries
                .filter_map(|e| e.ok())
                .map(|e| e.file_name().to_string_lossy().into_owned())
                .collect()
        })
        .unwrap_or_default();
    names.sort();
    names
}
