//! qBittorrent Web API adapter

use super::PublicationSink;
use crate::config::TorrentClientConfig;
use crate::error::{Error, Result};
use crate::types::EpisodeRecord;
use async_trait::async_trait;
use reqwest::header::{COOKIE, REFERER, SET_COOKIE};
use std::time::Duration;
use tracing::{error, info, warn};

/// Submits resolved links to qBittorrent
///
/// Each publish logs in, logs the client version, then adds one link at a time.
/// A failed login or the first failed add aborts the batch; nothing after it is sent.
#[derive(Clone, Debug)]
pub struct QbittorrentSink {
    client: reqwest::Client,
    base_url: String,
    username: String,
    password: String,
    save_path: Option<String>,
}

impl QbittorrentSink {
    /// Create a sink from connection settings
    ///
    /// # Errors
    /// Missing credentials are a configuration error
    pub fn new(config: &TorrentClientConfig) -> Result<Self> {
        let username = config
            .username
            .clone()
            .filter(|u| !u.is_empty())
            .ok_or_else(|| Error::config("USERNAME must be set", "torrent_client.username"))?;
        let password = config
            .password
            .clone()
            .filter(|p| !p.is_empty())
            .ok_or_else(|| Error::config("PASSWORD must be set", "torrent_client.password"))?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| Error::Other(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: config.base_url(),
            username,
            password,
            save_path: config.download_path.clone(),
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/api/v2/{}", self.base_url, path)
    }

    /// Log in and return the session cookie, if the client issued one
    async fn login(&self) -> Result<Option<String>> {
        info!(user = %self.username, host = %self.base_url, "Logging in to qBittorrent");

        let response = self
            .client
            .post(self.endpoint("auth/login"))
            .header(REFERER, &self.base_url)
            .form(&[
                ("username", self.username.as_str()),
                ("password", self.password.as_str()),
            ])
            .send()
            .await
            .map_err(|e| Error::Authentication {
                message: format!("login request failed: {}", e),
            })?;

        let status = response.status();
        let session = response
            .headers()
            .get_all(SET_COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .filter_map(|v| v.split(';').next())
            .find(|pair| pair.trim_start().starts_with("SID="))
            .map(|pair| pair.trim().to_string());
        let body = response.text().await.unwrap_or_default();

        if !status.is_success() {
            return Err(Error::Authentication {
                message: format!("login returned HTTP {}", status.as_u16()),
            });
        }
        if body.trim() != "Ok." {
            return Err(Error::Authentication {
                message: format!("login rejected: {}", body.trim()),
            });
        }

        info!("Logged in to qBittorrent");
        Ok(session)
    }

    fn with_session(
        &self,
        request: reqwest::RequestBuilder,
        session: Option<&str>,
    ) -> reqwest::RequestBuilder {
        let request = request.header(REFERER, &self.base_url);
        match session {
            Some(cookie) => request.header(COOKIE, cookie),
            None => request,
        }
    }

    async fn version(&self, session: Option<&str>) -> Result<String> {
        let response = self
            .with_session(self.client.get(self.endpoint("app/version")), session)
            .send()
            .await
            .map_err(|e| Error::Sink(format!("version request failed: {}", e)))?;
        if !response.status().is_success() {
            return Err(Error::Sink(format!(
                "version returned HTTP {}",
                response.status().as_u16()
            )));
        }
        response
            .text()
            .await
            .map(|v| v.trim().to_string())
            .map_err(|e| Error::Sink(format!("failed to read version: {}", e)))
    }

    async fn add(&self, session: Option<&str>, link: &str) -> Result<()> {
        let mut form = vec![("urls", link)];
        if let Some(save_path) = self.save_path.as_deref() {
            form.push(("savepath", save_path));
        }

        let response = self
            .with_session(self.client.post(self.endpoint("torrents/add")), session)
            .form(&form)
            .send()
            .await
            .map_err(|e| Error::Sink(format!("failed to add {}: {}", link, e)))?;

        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        if status == reqwest::StatusCode::FORBIDDEN {
            return Err(Error::Authentication {
                message: "session rejected while adding torrents".to_string(),
            });
        }
        if !status.is_success() || body.trim() == "Fails." {
            return Err(Error::Sink(format!(
                "qBittorrent refused {} (HTTP {}): {}",
                link,
                status.as_u16(),
                body.trim()
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl PublicationSink for QbittorrentSink {
    fn name(&self) -> &'static str {
        "qbittorrent"
    }

    async fn publish(&self, episodes: &[EpisodeRecord]) -> Result<()> {
        let links: Vec<&str> = episodes
            .iter()
            .filter_map(|e| e.retrieval_target.as_deref())
            .collect();
        if links.is_empty() {
            return Ok(());
        }

        let session = self.login().await.inspect_err(|e| {
            error!(error = %e, "Failed to log in to qBittorrent");
        })?;

        match self.version(session.as_deref()).await {
            Ok(version) => info!(version = %version, "qBittorrent version"),
            Err(e) => warn!(error = %e, "Could not read qBittorrent version"),
        }

        for link in links {
            if let Err(e) = self.add(session.as_deref(), link).await {
                error!(link = %link, error = %e, "Error adding torrent to qBittorrent");
                return Err(e);
            }
            info!(link = %link, "Added torrent to qBittorrent");
        }
        Ok(())
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_string_contains, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config_for(server: &MockServer) -> TorrentClientConfig {
        let address = server.address();
        TorrentClientConfig {
            host: address.ip().to_string(),
            port: address.port(),
            username: Some("admin".to_string()),
            password: Some("adminadmin".to_string()),
            download_path: Some("/downloads".to_string()),
        }
    }

    fn record(target: &str) -> EpisodeRecord {
        let mut record = EpisodeRecord::new("Coast to Coast AM 2024-02-10", target);
        record.retrieval_target = Some(target.to_string());
        record
    }

    async fn mount_login(server: &MockServer, body: &str) {
        Mock::given(method("POST"))
            .and(path("/api/v2/auth/login"))
            .and(body_string_contains("username=admin"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("set-cookie", "SID=abc123; HttpOnly; path=/")
                    .set_body_string(body),
            )
            .mount(server)
            .await;
    }

    #[test]
    fn missing_credentials_are_fatal() {
        let config = TorrentClientConfig::default();
        let err = QbittorrentSink::new(&config).unwrap_err();
        assert!(err.is_fatal());
    }

    #[tokio::test]
    async fn links_are_added_with_session_cookie() {
        let server = MockServer::start().await;
        mount_login(&server, "Ok.").await;
        Mock::given(method("GET"))
            .and(path("/api/v2/app/version"))
            .respond_with(ResponseTemplate::new(200).set_body_string("v4.6.2"))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/api/v2/torrents/add"))
            .and(header("cookie", "SID=abc123"))
            .and(body_string_contains("savepath=%2Fdownloads"))
            .respond_with(ResponseTemplate::new(200).set_body_string("Ok."))
            .expect(2)
            .mount(&server)
            .await;

        let sink = QbittorrentSink::new(&config_for(&server)).unwrap();
        sink.publish(&[
            record("magnet:?xt=urn:btih:AAA"),
            record("magnet:?xt=urn:btih:BBB"),
        ])
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn rejected_login_aborts_batch() {
        let server = MockServer::start().await;
        mount_login(&server, "Fails.").await;
        Mock::given(method("POST"))
            .and(path("/api/v2/torrents/add"))
            .respond_with(ResponseTemplate::new(200).set_body_string("Ok."))
            .expect(0)
            .mount(&server)
            .await;

        let sink = QbittorrentSink::new(&config_for(&server)).unwrap();
        let err = sink
            .publish(&[record("magnet:?xt=urn:btih:AAA")])
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Authentication { .. }));
        assert!(err.is_fatal());
    }

    #[tokio::test]
    async fn first_failed_add_stops_submission() {
        let server = MockServer::start().await;
        mount_login(&server, "Ok.").await;
        Mock::given(method("POST"))
            .and(path("/api/v2/torrents/add"))
            .respond_with(ResponseTemplate::new(415).set_body_string("Fails."))
            .expect(1)
            .mount(&server)
            .await;

        let sink = QbittorrentSink::new(&config_for(&server)).unwrap();
        let err = sink
            .publish(&[
                record("magnet:?xt=urn:btih:AAA"),
                record("magnet:?xt=urn:btih:BBB"),
            ])
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Sink(_)));
    }

    #[tokio::test]
    async fn empty_batch_skips_login() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/v2/auth/login"))
            .respond_with(ResponseTemplate::new(200).set_body_string("Ok."))
            .expect(0)
            .mount(&server)
            .await;

        let sink = QbittorrentSink::new(&config_for(&server)).unwrap();
        sink.publish(&[]).await.unwrap();
    }
}
