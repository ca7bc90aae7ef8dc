use super::*;
use tempfile::tempdir;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client_with_temp(temp_dir: &Path) -> HttpClient {
    let source = SourceConfig {
        user_agent: "c2c-dl-test/1.0".to_string(),
        ..SourceConfig::default()
    };
    let retrieval = RetrievalConfig {
        temp_dir: temp_dir.to_path_buf(),
        page_timeout: Duration::from_millis(500),
        download_timeout: Duration::from_secs(5),
        ..RetrievalConfig::default()
    };
    HttpClient::new(&source, &retrieval).unwrap()
}

#[tokio::test]
async fn fetch_sends_configured_user_agent() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/"))
        .and(header("user-agent", "c2c-dl-test/1.0"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>ok</html>"))
        .expect(1)
        .mount(&server)
        .await;

    let temp = tempdir().unwrap();
    let client = client_with_temp(temp.path());
    let body = client.fetch(&format!("{}/", server.uri())).await.unwrap();
    assert_eq!(body, "<html>ok</html>");
}

#[tokio::test]
async fn fetch_maps_non_success_status() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/missing"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let temp = tempdir().unwrap();
    let client = client_with_temp(temp.path());
    let err = client
        .fetch(&format!("{}/missing", server.uri()))
        .await
        .unwrap_err();
    assert!(matches!(err, FetchError::Status { status: 404, .. }));
}

#[tokio::test]
async fn fetch_times_out_on_slow_source() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(3)))
        .mount(&server)
        .await;

    let temp = tempdir().unwrap();
    let client = client_with_temp(temp.path());
    let err = client.fetch(&server.uri()).await.unwrap_err();
    assert!(matches!(err, FetchError::Timeout { .. }), "got {err:?}");
}

#[tokio::test]
async fn retrieve_writes_payload_and_cleans_temp() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/uc"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "video/mp4")
                .set_body_bytes(vec![7u8; 4096]),
        )
        .mount(&server)
        .await;

    let temp = tempdir().unwrap();
    let downloads = tempdir().unwrap();
    let client = client_with_temp(temp.path());
    let destination = downloads.path().join("Coast 2024-01-05.mp4");

    let written = client
        .retrieve(&format!("{}/uc", server.uri()), &destination)
        .await
        .unwrap();

    assert_eq!(written, 4096);
    assert_eq!(std::fs::metadata(&destination).unwrap().len(), 4096);
    assert!(!temp.path().join("Coast 2024-01-05.mp4.part").exists());
}

#[tokio::test]
async fn retrieve_rejects_html_interstitial() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_raw("<html>Google Drive - Virus scan warning</html>", "text/html; charset=utf-8"),
        )
        .mount(&server)
        .await;

    let temp = tempdir().unwrap();
    let downloads = tempdir().unwrap();
    let client = client_with_temp(temp.path());
    let destination = downloads.path().join("episode.mp4");

    let err = client
        .retrieve(&server.uri(), &destination)
        .await
        .unwrap_err();
    assert!(matches!(err, RetrievalError::UnexpectedContent { .. }));
    assert!(!destination.exists());
}

#[tokio::test]
async fn retrieve_rejects_empty_payload() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).insert_header("content-type", "video/mp4"))
        .mount(&server)
        .await;

    let temp = tempdir().unwrap();
    let downloads = tempdir().unwrap();
    let client = client_with_temp(temp.path());
    let destination = downloads.path().join("episode.mp4");

    let err = client
        .retrieve(&server.uri(), &destination)
        .await
        .unwrap_err();
    assert!(matches!(err, RetrievalError::Empty { .. }));
    assert!(!destination.exists());
    assert!(!temp.path().join("episode.mp4.part").exists());
}

#[tokio::test]
async fn retrieve_reports_server_errors() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let temp = tempdir().unwrap();
    let client = client_with_temp(temp.path());
    let err = client
        .retrieve(&server.uri(), &temp.path().join("x.mp4"))
        .await
        .unwrap_err();
    match err {
        RetrievalError::Download { source, .. } => {
            assert!(matches!(source, FetchError::Status { status: 503, .. }))
        }
        other => panic!("unexpected {other:?}"),
    }
}

#[tokio::test]
async fn temp_download_cleanup_tolerates_missing_and_keeps_directories() {
    let dir = tempdir().unwrap();
    let partial = dir.path().join("episode.part");
    std::fs::write(&partial, b"partial").unwrap();

    discard_temp_file(&partial).await;
    assert!(!partial.exists());

    // A missing file and a directory are never raised
    discard_temp_file(&partial).await;
    discard_temp_file(dir.path()).await;
    assert!(dir.path().exists());
}
