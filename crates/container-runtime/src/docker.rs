//! Docker Engine API client
//!
//! Speaks HTTP/1.1 to the engine over its unix socket, one connection per
//! request. Only the container listing endpoint is used.

use crate::{ContainerRef, ContainerRuntime, HealthStatus, RuntimeError};
use async_trait::async_trait;
use bytes::Bytes;
use http_body_util::{BodyExt, Empty};
use hyper_util::rt::TokioIo;
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;
use tokio::net::UnixStream;
use tracing::{debug, info};

/// Default engine socket
pub const DEFAULT_SOCKET: &str = "/var/run/docker.sock";

/// Docker client configuration
#[derive(Debug, Clone)]
pub struct DockerConfig {
    /// Path of the engine's unix socket
    pub socket_path: PathBuf,
    /// Upper bound for a single API call
    pub request_timeout: Duration,
}

impl Default for DockerConfig {
    fn default() -> Self {
        Self {
            socket_path: PathBuf::from(DEFAULT_SOCKET),
            request_timeout: Duration::from_secs(5),
        }
    }
}

impl DockerConfig {
    /// Honour `DOCKER_HOST=unix:///path` when it is set.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(host) = std::env::var("DOCKER_HOST") {
            if let Some(path) = host.strip_prefix("unix://") {
                config.socket_path = PathBuf::from(path);
            }
        }
        config
    }
}

/// Entry of `GET /containers/json`
#[derive(Debug, Deserialize)]
struct ContainerSummary {
    #[serde(rename = "Id")]
    id: String,
    #[serde(rename = "Names", default)]
    names: Vec<String>,
    #[serde(rename = "Status", default)]
    status: String,
}

impl ContainerSummary {
    fn into_ref(self) -> ContainerRef {
        let name = self
            .names
            .first()
            .map(|n| n.trim_start_matches('/').to_string())
            .unwrap_or_else(|| self.id.chars().take(12).collect());
        ContainerRef {
            health: HealthStatus::from_status_line(&self.status),
            id: self.id,
            name,
        }
    }
}

/// Container runtime backed by the Docker Engine API
pub struct DockerRuntime {
    config: DockerConfig,
}

impl DockerRuntime {
    /// Create a Docker client
    pub fn new(config: DockerConfig) -> Self {
        info!("Using Docker engine at {}", config.socket_path.display());
        Self { config }
    }

    /// List running containers, optionally filtered by health state.
    async fn list(&self, health: Option<&str>) -> Result<Vec<ContainerRef>, RuntimeError> {
        let uri = match health {
            Some(h) => format!("/containers/json?filters={}", health_filter(h)),
            None => "/containers/json".to_string(),
        };
        let body = self.get(&uri).await?;
        let summaries: Vec<ContainerSummary> = serde_json::from_slice(&body)?;
        debug!(%uri, count = summaries.len(), "listed containers");
        Ok(summaries.into_iter().map(ContainerSummary::into_ref).collect())
    }

    async fn get(&self, uri: &str) -> Result<Bytes, RuntimeError> {
        let socket = self.config.socket_path.clone();
        let request = async move {
            let stream = UnixStream::connect(&socket).await?;
            let io = TokioIo::new(stream);
            let (mut sender, conn) = hyper::client::conn::http1::handshake(io)
                .await
                .map_err(|e| RuntimeError::Connection(e.to_string()))?;

            // Drive the connection in the background.
            tokio::spawn(async move {
                if let Err(e) = conn.await {
                    debug!(error = %e, "docker connection closed with error");
                }
            });

            let req = http::Request::builder()
                .method("GET")
                .uri(uri)
                .header("host", "docker")
                .header("user-agent", concat!("watchdog/", env!("CARGO_PKG_VERSION")))
                .body(Empty::<Bytes>::new())
                .map_err(|e| RuntimeError::InvalidResponse(e.to_string()))?;

            let resp = sender
                .send_request(req)
                .await
                .map_err(|e| RuntimeError::Connection(e.to_string()))?;
            let status = resp.status();
            let body = resp
                .into_body()
                .collect()
                .await
                .map_err(|e| RuntimeError::InvalidResponse(e.to_string()))?
                .to_bytes();

            if !status.is_success() {
                return Err(RuntimeError::Api {
                    status: status.as_u16(),
                    body: String::from_utf8_lossy(&body).into_owned(),
                });
            }
            Ok::<Bytes, RuntimeError>(body)
        };

        tokio::time::timeout(self.config.request_timeout, request)
            .await
            .map_err(|_| RuntimeError::Timeout(self.config.request_timeout.as_millis() as u64))?
    }
}

#[async_trait]
impl ContainerRuntime for DockerRuntime {
    async fn list_unhealthy(&self) -> Result<Vec<ContainerRef>, RuntimeError> {
        self.list(Some("unhealthy")).await
    }

    async fn list_healthy(&self) -> Result<Vec<ContainerRef>, RuntimeError> {
        self.list(Some("healthy")).await
    }

    async fn list_all(&self) -> Result<Vec<ContainerRef>, RuntimeError> {
        self.list(None).await
    }
}

/// Percent-encoded `{"health":["<state>"]}` filter.
fn health_filter(state: &str) -> String {
    format!("%7B%22health%22%3A%5B%22{state}%22%5D%7D")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::UnixListener;

    /// Serve one canned HTTP response and hand back the request head.
    fn serve_once(
        listener: UnixListener,
        status: &'static str,
        body: &'static str,
    ) -> tokio::task::JoinHandle<String> {
        tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let mut buf = Vec::new();
            let mut chunk = [0u8; 1024];
            while !buf.windows(4).any(|w| w == b"\r\n\r\n") {
                let n = stream.read(&mut chunk).await.unwrap();
                if n == 0 {
                    break;
                }
                buf.extend_from_slice(&chunk[..n]);
            }
            let response = format!(
                "HTTP/1.1 {status}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                body.len()
            );
            stream.write_all(response.as_bytes()).await.unwrap();
            stream.shutdown().await.unwrap();
            String::from_utf8_lossy(&buf).into_owned()
        })
    }

    fn runtime_at(dir: &tempfile::TempDir) -> (DockerRuntime, UnixListener) {
        let socket_path = dir.path().join("docker.sock");
        let listener = UnixListener::bind(&socket_path).unwrap();
        let runtime = DockerRuntime::new(DockerConfig {
            socket_path,
            request_timeout: Duration::from_secs(2),
        });
        (runtime, listener)
    }

    #[test]
    fn test_health_filter_encoding() {
        assert_eq!(
            health_filter("unhealthy"),
            "%7B%22health%22%3A%5B%22unhealthy%22%5D%7D"
        );
    }

    #[test]
    fn test_summary_uses_first_name_without_slash() {
        let summary: ContainerSummary = serde_json::from_str(
            r#"{"Id":"3f2a9c01d4e5aa","Names":["/web-1"],"State":"running","Status":"Up 5 minutes (unhealthy)"}"#,
        )
        .unwrap();
        let container = summary.into_ref();
        assert_eq!(container.name, "web-1");
        assert_eq!(container.health, HealthStatus::Unhealthy);
    }

    #[test]
    fn test_summary_without_names_falls_back_to_short_id() {
        let summary: ContainerSummary =
            serde_json::from_str(r#"{"Id":"3f2a9c01d4e5aa77","Status":"Up 1 second"}"#).unwrap();
        assert_eq!(summary.into_ref().name, "3f2a9c01d4e5");
    }

    #[tokio::test]
    async fn test_list_unhealthy_sends_filter() {
        let dir = tempfile::tempdir().unwrap();
        let (runtime, listener) = runtime_at(&dir);
        let server = serve_once(
            listener,
            "200 OK",
            r#"[{"Id":"abc","Names":["/web-1"],"Status":"Up 1 minute (unhealthy)"}]"#,
        );

        let containers = runtime.list_unhealthy().await.unwrap();
        assert_eq!(containers.len(), 1);
        assert_eq!(containers[0].name, "web-1");

        let head = server.await.unwrap();
        assert!(head.starts_with("GET /containers/json?filters=%7B%22health%22%3A%5B%22unhealthy%22%5D%7D"));
    }

    #[tokio::test]
    async fn test_api_error_status() {
        let dir = tempfile::tempdir().unwrap();
        let (runtime, listener) = runtime_at(&dir);
        let _server = serve_once(listener, "500 Internal Server Error", r#"{"message":"boom"}"#);

        match runtime.list_all().await {
            Err(RuntimeError::Api { status, body }) => {
                assert_eq!(status, 500);
                assert!(body.contains("boom"));
            }
            other => panic!("expected api error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_missing_socket_is_connection_error() {
        let runtime = DockerRuntime::new(DockerConfig {
            socket_path: PathBuf::from("/nonexistent/docker.sock"),
            request_timeout: Duration::from_millis(200),
        });
        assert!(matches!(
            runtime.list_healthy().await,
            Err(RuntimeError::Connection(_))
        ));
    }
}
