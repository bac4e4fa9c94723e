//! Shared fixtures for integration tests

#![allow(dead_code)]

use chat_relay::transport::{GenerationBackend, LineStream, UpstreamError};
use chat_relay::types::GenerateRequest;
use chat_relay::{GatewayConfig, OutwardFrame};
use futures::stream;
use mockito::{Matcher, Mock, Server, ServerGuard};
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

pub const TEST_API_KEY: &str = "test-secret";
pub const TEST_MODEL: &str = "tinyllama";

pub fn test_config(upstream_url: &str) -> GatewayConfig {
    GatewayConfig::builder()
        .api_key(TEST_API_KEY)
        .model(TEST_MODEL)
        .upstream_url(upstream_url)
        .build()
        .expect("valid test config")
}

/// mockito-backed inference engine.
pub struct MockUpstream {
    pub server: ServerGuard,
}

impl MockUpstream {
    pub async fn new() -> Self {
        Self {
            server: Server::new_async().await,
        }
    }

    pub fn url(&self) -> String {
        self.server.url()
    }

    /// Successful NDJSON generation, one body line per entry.
    pub async fn mock_generate(&mut self, lines: &[&str]) -> Mock {
        let body = lines
            .iter()
            .map(|l| format!("{}\n", l))
            .collect::<String>();
        self.server
            .mock("POST", "/api/generate")
            .match_body(Matcher::PartialJson(json!({
                "model": TEST_MODEL,
                "stream": true,
            })))
            .with_status(200)
            .with_header("content-type", "application/x-ndjson")
            .with_body(body)
            .create_async()
            .await
    }

    pub async fn mock_error(&mut self, status: usize, body: &str) -> Mock {
        self.server
            .mock("POST", "/api/generate")
            .with_status(status)
            .with_header("content-type", "application/json")
            .with_body(body)
            .create_async()
            .await
    }
}

/// An upstream that accepts the connection, optionally writes the response
/// head and some NDJSON lines, and then goes silent.
pub async fn spawn_stalling_upstream(send_head: bool, lines: Vec<&'static str>) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        while let Ok((mut sock, _)) = listener.accept().await {
            let lines = lines.clone();
            tokio::spawn(async move {
                let mut buf = vec![0u8; 16 * 1024];
                let _ = sock.read(&mut buf).await;

                if send_head {
                    let head = "HTTP/1.1 200 OK\r\n\
                                content-type: application/x-ndjson\r\n\
                                transfer-encoding: chunked\r\n\r\n";
                    let _ = sock.write_all(head.as_bytes()).await;
                    for line in lines {
                        let payload = format!("{}\n", line);
                        let chunk = format!("{:x}\r\n{}\r\n", payload.len(), payload);
                        let _ = sock.write_all(chunk.as_bytes()).await;
                    }
                    let _ = sock.flush().await;
                }

                tokio::time::sleep(Duration::from_secs(30)).await;
            });
        }
    });

    format!("http://{}", addr)
}

/// A loopback address nothing is listening on.
pub fn refused_upstream_url() -> String {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{}", addr)
}

/// In-memory backend that records how often it was asked to generate.
pub struct ScriptedBackend {
    pub calls: AtomicUsize,
    pub lines: Vec<&'static str>,
}

impl ScriptedBackend {
    pub fn new(lines: Vec<&'static str>) -> Self {
        Self {
            calls: AtomicUsize::new(0),
            lines,
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl GenerationBackend for ScriptedBackend {
    async fn open_stream(&self, _request: &GenerateRequest) -> Result<LineStream, UpstreamError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let lines: Vec<Result<String, UpstreamError>> =
            self.lines.iter().map(|l| Ok(l.to_string())).collect();
        Ok(Box::pin(stream::iter(lines)))
    }
}

/// Parse an NDJSON body into frames, asserting every line is newline-terminated.
pub fn parse_frames(body: &[u8]) -> Vec<OutwardFrame> {
    let text = std::str::from_utf8(body).expect("utf-8 body");
    assert!(text.is_empty() || text.ends_with('\n'), "body must end with newline: {text:?}");
    text.lines()
        .map(|l| serde_json::from_str(l).unwrap_or_else(|e| panic!("bad frame {l:?}: {e}")))
        .collect()
}
