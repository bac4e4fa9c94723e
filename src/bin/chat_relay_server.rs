//! chat-relay server — 鉴权聊天网关的启动入口
//!
//! Every flag falls back to an environment variable:
//!
//! | Flag | Env | Default |
//! |------|-----|---------|
//! | `--ollama-url` | `OLLAMA_URL` | `http://localhost:11434` |
//! | `--model` | `OLLAMA_MODEL` | `tinyllama` |
//! | `--api-key` | `API_KEY` | required |
//! | `--host` | `HOST` | `0.0.0.0` |
//! | `--port` | `PORT` | `8000` |
//! | `--timeout-secs` | `UPSTREAM_TIMEOUT_SECS` | `60` |

use chat_relay::config::{DEFAULT_MODEL, DEFAULT_PORT, DEFAULT_TIMEOUT_SECS, DEFAULT_UPSTREAM_URL};
use chat_relay::server;
use chat_relay::GatewayConfig;
use clap::Parser;
use std::net::IpAddr;
use std::time::Duration;
use tracing::error;

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Base URL of the inference engine
    #[arg(long, env = "OLLAMA_URL", default_value = DEFAULT_UPSTREAM_URL)]
    ollama_url: String,

    /// Model identifier sent with every generation request
    #[arg(long, env = "OLLAMA_MODEL", default_value = DEFAULT_MODEL)]
    model: String,

    /// Secret callers must present in the X-API-Key header
    #[arg(long, env = "API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    #[arg(long, env = "HOST", default_value = "0.0.0.0")]
    host: IpAddr,

    #[arg(long, env = "PORT", default_value_t = DEFAULT_PORT)]
    port: u16,

    /// Total time allowed for one upstream generation, in seconds
    #[arg(long, env = "UPSTREAM_TIMEOUT_SECS", default_value_t = DEFAULT_TIMEOUT_SECS)]
    timeout_secs: u64,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    let config = GatewayConfig::builder()
        .upstream_url(args.ollama_url)
        .model(args.model)
        .maybe_api_key(args.api_key)
        .host(args.host)
        .port(args.port)
        .request_timeout(Duration::from_secs(args.timeout_secs))
        .build()
        .map_err(|e| {
            error!("refusing to start: {}", e);
            e
        })?;

    server::serve(config, server::shutdown_signal()).await?;
    Ok(())
}
