//! Simple mock HTTP server for testing delivery.
//!
//! Unlike a canned-response mock, the server takes a status script: the
//! first N requests are answered with the scripted statuses in order, and
//! every request after that gets the default status. That makes
//! fail-then-succeed retry sequences deterministic.

use std::collections::VecDeque;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::{body::Incoming, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use tokio::net::TcpListener;

#[derive(Clone, Debug)]
pub struct ReceivedRequest {
    pub method: String,
    pub path: String,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl ReceivedRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

#[derive(Clone)]
pub struct MockServer {
    pub addr: SocketAddr,
    received_requests: Arc<Mutex<Vec<ReceivedRequest>>>,
    status_script: Arc<Mutex<VecDeque<u16>>>,
    default_status: u16,
}

impl MockServer {
    /// Start a mock HTTP server on a random port.
    ///
    /// `script` statuses are served one per request, in order, before
    /// falling back to `default_status`.
    pub async fn start(default_status: u16, script: Vec<u16>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind mock server");
        let addr = listener.local_addr().expect("Failed to get local addr");

        let received_requests = Arc::new(Mutex::new(Vec::new()));
        let status_script = Arc::new(Mutex::new(script.into_iter().collect::<VecDeque<u16>>()));

        let requests_clone = received_requests.clone();
        let script_clone = status_script.clone();

        tokio::spawn(async move {
            loop {
                let (stream, _) = match listener.accept().await {
                    Ok(conn) => conn,
                    Err(_) => break,
                };

                let io = TokioIo::new(stream);
                let requests = requests_clone.clone();
                let script = script_clone.clone();

                tokio::spawn(async move {
                    let service = hyper::service::service_fn(move |req: Request<Incoming>| {
                        let requests = requests.clone();
                        let script = script.clone();
                        async move {
                            let method = req.method().to_string();
                            let path = req.uri().path().to_string();
                            let headers: Vec<(String, String)> = req
                                .headers()
                                .iter()
                                .map(|(k, v)| (k.to_string(), v.to_str().unwrap_or("").to_string()))
                                .collect();

                            let body = req
                                .into_body()
                                .collect()
                                .await
                                .map(|collected| collected.to_bytes().to_vec())
                                .unwrap_or_default();

                            requests.lock().unwrap().push(ReceivedRequest {
                                method,
                                path,
                                headers,
                                body,
                            });

                            let status = script
                                .lock()
                                .unwrap()
                                .pop_front()
                                .unwrap_or(default_status);

                            Ok::<_, hyper::http::Error>(
                                Response::builder()
                                    .status(
                                        StatusCode::from_u16(status)
                                            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
                                    )
                                    .body(Full::new(Bytes::from_static(b"{}")))
                                    .unwrap(),
                            )
                        }
                    });

                    let _ = hyper::server::conn::http1::Builder::new()
                        .serve_connection(io, service)
                        .await;
                });
            }
        });

        MockServer {
            addr,
            received_requests,
            status_script,
            default_status,
        }
    }

    /// Get the base URL of the mock server.
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Get all received requests.
    pub fn requests(&self) -> Vec<ReceivedRequest> {
        self.received_requests.lock().unwrap().clone()
    }

    /// Number of requests received so far.
    pub fn request_count(&self) -> usize {
        self.received_requests.lock().unwrap().len()
    }

    /// Scripted statuses not yet served.
    #[allow(dead_code)]
    pub fn remaining_script(&self) -> usize {
        self.status_script.lock().unwrap().len()
    }

    #[allow(dead_code)]
    pub fn default_status(&self) -> u16 {
        self.default_status
    }
}
