//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::time::Duration;

use healthgate::config::AppConfig;
use healthgate::health::Registry;
use healthgate::http::HttpServer;
use healthgate::lifecycle::Shutdown;
use tokio::net::TcpListener;
use tokio::sync::mpsc;

/// A running server on an ephemeral port.
pub struct TestServer {
    pub addr: SocketAddr,
    pub shutdown: Shutdown,
    pub updates: mpsc::UnboundedSender<AppConfig>,
}

impl TestServer {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.shutdown.trigger();
    }
}

pub async fn start_server(config: AppConfig) -> TestServer {
    start_server_with(HttpServer::new(config)).await
}

pub async fn start_server_with_registry(config: AppConfig, registry: Registry) -> TestServer {
    start_server_with(HttpServer::new(config).with_registry(registry)).await
}

async fn start_server_with(server: HttpServer) -> TestServer {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let shutdown = Shutdown::new();
    let (updates, config_updates) = mpsc::unbounded_channel();
    let server_shutdown = shutdown.subscribe();

    tokio::spawn(async move {
        if let Err(e) = server.run(listener, config_updates, server_shutdown).await {
            eprintln!("test server failed: {}", e);
        }
    });

    TestServer {
        addr,
        shutdown,
        updates,
    }
}

pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .no_proxy()
        .timeout(Duration::from_secs(10))
        .build()
        .unwrap()
}

/// Accepts TCP connections and never answers.
pub async fn start_silent_server() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let mut held = Vec::new();
        while let Ok((socket, _)) = listener.accept().await {
            held.push(socket);
        }
    });
    addr
}
