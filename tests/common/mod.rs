//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use phased_pipeline::config::ServerConfig;
use phased_pipeline::lifecycle::{build_application, Shutdown};
use phased_pipeline::pipeline::Phase;
use phased_pipeline::HttpServer;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

/// Fresh phases named after `names`, in order.
pub fn phases(names: &[&str]) -> Vec<Phase> {
    names.iter().map(|name| Phase::new(*name)).collect()
}

pub fn flag() -> Arc<AtomicBool> {
    Arc::new(AtomicBool::new(false))
}

/// A running server bound to an ephemeral local port.
pub struct TestServer {
    pub addr: SocketAddr,
    pub shutdown: Shutdown,
    pub handle: JoinHandle<Result<(), std::io::Error>>,
}

impl TestServer {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }
}

/// Build the application from `config` and serve it.
pub async fn start_server(config: ServerConfig) -> TestServer {
    let application = build_application(&config).unwrap();
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let shutdown = Shutdown::new();
    let server = HttpServer::new(config, application);
    let server_shutdown = shutdown.subscribe();
    let handle = tokio::spawn(async move { server.run(listener, server_shutdown).await });

    TestServer { addr, shutdown, handle }
}

/// Client bypassing any system proxy.
pub fn client() -> reqwest::Client {
    reqwest::Client::builder().no_proxy().build().unwrap()
}

/// Client that reports redirects instead of following them.
pub fn non_following_client() -> reqwest::Client {
    reqwest::Client::builder()
        .no_proxy()
        .redirect(reqwest::redirect::Policy::none())
        .build()
        .unwrap()
}
