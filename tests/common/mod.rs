//! In-process stand-in for the optimizer service and the static UI host.

#![allow(dead_code)]

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use tokio::io::BufReader;
use tokio::net::TcpListener;

use optidash::config::Config;
use optidash::server::{read_request, Request, Response};

type Routes = Arc<Mutex<HashMap<(String, String), (u16, String)>>>;

pub struct MockService {
    pub addr: SocketAddr,
    routes: Routes,
    requests: Arc<Mutex<Vec<Request>>>,
}

impl MockService {
    pub async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let routes: Routes = Arc::new(Mutex::new(HashMap::new()));
        let requests = Arc::new(Mutex::new(Vec::new()));

        let (r, q) = (routes.clone(), requests.clone());
        tokio::spawn(async move {
            loop {
                let Ok((stream, _)) = listener.accept().await else { break };
                let (routes, requests) = (r.clone(), q.clone());
                tokio::spawn(async move {
                    let (read_half, mut write_half) = stream.into_split();
                    let mut reader = BufReader::new(read_half);
                    let Ok(Some(req)) = read_request(&mut reader).await else { return };
                    let reply = routes
                        .lock()
                        .unwrap()
                        .get(&(req.method.clone(), req.path.clone()))
                        .cloned();
                    requests.lock().unwrap().push(req);
                    let response = match reply {
                        Some((status, body)) if body.starts_with('{') || body.starts_with('[') => {
                            Response::new(status, "application/json", body)
                        }
                        Some((status, body)) => Response::html(status, body),
                        None => Response::not_found(),
                    };
                    let _ = response.write_to(&mut write_half).await;
                });
            }
        });

        Self { addr, routes, requests }
    }

    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn route(&self, method: &str, path: &str, status: u16, body: impl Into<String>) {
        self.routes
            .lock()
            .unwrap()
            .insert((method.to_string(), path.to_string()), (status, body.into()));
    }

    pub fn requests_to(&self, path: &str) -> Vec<Request> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.path == path)
            .cloned()
            .collect()
    }

    /// Serve a trivial fragment for every page.
    pub fn serve_fragments(&self) {
        for page in ["home", "ga", "pso", "aco", "tabu", "compare"] {
            self.route(
                "GET",
                &format!("/components/{}.html", page),
                200,
                format!(r#"<div id="{}-fragment"></div>"#, page),
            );
        }
    }

    pub fn config(&self) -> Config {
        Config {
            backend_url: self.url(),
            ui_base_url: self.url(),
            http_timeout_secs: 5,
            retry_max: 1,
            retry_base_ms: 1,
            ..Config::default()
        }
    }
}
