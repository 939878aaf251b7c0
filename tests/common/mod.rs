//! Shared utilities for integration testing.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

use rest_router::app::build_api;
use rest_router::lifecycle::Shutdown;
use rest_router::observability::AccessLog;
use rest_router::{HttpServer, MultiRouter, ServiceConfig};

/// A running server bound to an ephemeral port.
pub struct TestServer {
    pub addr: SocketAddr,
    pub shutdown: Shutdown,
    pub handle: JoinHandle<Result<(), std::io::Error>>,
}

impl TestServer {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    /// Trigger shutdown and wait for `run` to return.
    pub async fn stop(self, within: Duration) -> Result<(), std::io::Error> {
        self.shutdown.trigger();
        tokio::time::timeout(within, self.handle)
            .await
            .expect("server did not stop in time")
            .expect("server task panicked")
    }
}

/// Start the configured example API.
pub async fn spawn_app(config: ServiceConfig) -> TestServer {
    let api = build_api(&config).expect("routers build");
    spawn_server(config, api, None).await
}

/// Start a server over any composed router set.
pub async fn spawn_server(
    config: ServiceConfig,
    api: MultiRouter,
    access_log: Option<AccessLog>,
) -> TestServer {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let mut server = HttpServer::new(&config, api);
    if let Some(log) = access_log {
        server = server.with_access_log(log);
    }

    let shutdown = Shutdown::new();
    let rx = shutdown.subscribe();
    let handle = tokio::spawn(async move { server.run(listener, rx).await });

    TestServer {
        addr,
        shutdown,
        handle,
    }
}

/// Requests seen by a mock identity service, lowercased.
pub type SeenRequests = Arc<Mutex<Vec<String>>>;

/// Start a mock identity service: `Bearer <token>` resolves to `user_id` when
/// the token is in `accepted`, anything else answers 401.
pub async fn start_identity_service(accepted: &'static [(&'static str, &'static str)]) -> (SocketAddr, SeenRequests) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let seen: SeenRequests = Arc::default();
    let seen_by_task = Arc::clone(&seen);

    tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((mut socket, _)) => {
                    let seen = Arc::clone(&seen_by_task);
                    tokio::spawn(async move {
                        let mut buf = vec![0u8; 8192];
                        let mut read = 0;
                        while !buf[..read].windows(4).any(|w| w == b"\r\n\r\n") && read < buf.len() {
                            match socket.read(&mut buf[read..]).await {
                                Ok(0) | Err(_) => break,
                                Ok(n) => read += n,
                            }
                        }
                        let request = String::from_utf8_lossy(&buf[..read]).to_lowercase();
                        seen.lock().unwrap().push(request.clone());

                        let user = accepted
                            .iter()
                            .find(|(token, _)| request.contains(&format!("authorization: bearer {token}\r\n")))
                            .map(|(_, user)| *user);

                        let response = match user {
                            Some(user) => {
                                let body = format!(r#"{{"user_id":"{user}"}}"#);
                                format!(
                                    "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                                    body.len(),
                                    body
                                )
                            }
                            None => "HTTP/1.1 401 Unauthorized\r\nContent-Length: 0\r\nConnection: close\r\n\r\n".to_string(),
                        };
                        let _ = socket.write_all(response.as_bytes()).await;
                        let _ = socket.shutdown().await;
                    });
                }
                Err(_) => break,
            }
        }
    });

    (addr, seen)
}
