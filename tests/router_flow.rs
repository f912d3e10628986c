//! Navigation, fragment sources and the HTTP host.

mod common;

use async_trait::async_trait;
use common::MockService;
use optidash::config::Config;
use optidash::dashboard::{Dashboard, PageView};
use optidash::error::DashError;
use optidash::router::{FragmentSource, Page, PageState};
use optidash::server;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;

fn dir_config(dir: &std::path::Path, mock: &MockService) -> Config {
    Config { fragment_dir: Some(dir.to_path_buf()), ..mock.config() }
}

// ---------------------------------------------------------------------------
// Directory fragments
// ---------------------------------------------------------------------------

#[tokio::test]
async fn directory_fragments_are_cached_after_first_load() {
    let mock = MockService::start().await;
    let dir = tempfile::tempdir().unwrap();
    std::fs::create_dir_all(dir.path().join("components")).unwrap();
    std::fs::write(dir.path().join("components/home.html"), "<h2>Welcome</h2>").unwrap();
    let dashboard = Dashboard::new(dir_config(dir.path(), &mock));

    let first = dashboard.navigate("home", false).await;
    assert!(first.html().unwrap().contains("<h2>Welcome</h2>"));
    assert_eq!(dashboard.router().fetch_count(), 1);

    // Edits on disk are not picked up; the cache is never invalidated.
    std::fs::write(dir.path().join("components/home.html"), "<h2>Changed</h2>").unwrap();
    let second = dashboard.navigate("home", false).await;
    assert!(second.html().unwrap().contains("<h2>Welcome</h2>"));
    assert_eq!(dashboard.router().fetch_count(), 1);
    assert_eq!(dashboard.router().state(Page::Home), PageState::Rendered);
}

#[tokio::test]
async fn missing_fragment_renders_error_block_and_notifies() {
    let mock = MockService::start().await;
    let dir = tempfile::tempdir().unwrap();
    let dashboard = Dashboard::new(dir_config(dir.path(), &mock));

    let view = dashboard.navigate("ga", false).await;
    match &view {
        PageView::Error { status, html } => {
            assert_eq!(*status, 502);
            assert!(html.contains("Error Loading Page"));
        }
        other => panic!("unexpected view {:?}", other),
    }
    assert_eq!(dashboard.router().state(Page::Ga), PageState::Failed);
    let notes = dashboard.notifications();
    assert_eq!(notes.len(), 1);
    assert!(notes[0].message.starts_with("Failed to load ga page:"));
}

// ---------------------------------------------------------------------------
// HTTP fragments
// ---------------------------------------------------------------------------

#[tokio::test]
async fn http_fragment_failure_reports_status() {
    let mock = MockService::start().await;
    let dashboard = Dashboard::new(mock.config());

    let view = dashboard.navigate("compare", false).await;
    assert!(matches!(view, PageView::Error { status: 502, .. }));
    let notes = dashboard.notifications();
    assert_eq!(notes[0].message, "Failed to load compare page: Failed to load page: 404 Not Found");

    // Failures are not cached; a later load tries again.
    mock.serve_fragments();
    let view = dashboard.navigate("compare", false).await;
    assert!(matches!(view, PageView::Page { page: Page::Compare, .. }));
    assert_eq!(mock.requests_to("/components/compare.html").len(), 2);
}

#[tokio::test]
async fn unknown_page_is_not_found() {
    let mock = MockService::start().await;
    let dashboard = Dashboard::new(mock.config());
    let view = dashboard.navigate("settings", false).await;
    assert!(matches!(view, PageView::Error { status: 404, .. }));
    assert!(mock.requests_to("/components/settings.html").is_empty());
}

#[tokio::test]
async fn superseded_navigation_is_discarded() {
    let mock = MockService::start().await;
    mock.serve_fragments();
    let dashboard = Dashboard::new(mock.config());

    let old = dashboard.router().begin_navigation("viewer");
    let newer = dashboard.router().begin_navigation("viewer");
    assert_eq!(dashboard.navigate_with_token("pso", &old, false).await, PageView::Stale);
    // The fragment fetched for the stale navigation is still cached.
    let view = dashboard.navigate_with_token("pso", &newer, false).await;
    assert!(matches!(view, PageView::Page { page: Page::Pso, .. }));
    assert_eq!(mock.requests_to("/components/pso.html").len(), 1);
}

/// Serves fragments instantly, except `ga` which takes a while.
struct SlowGa;

#[async_trait]
impl FragmentSource for SlowGa {
    async fn fetch(&self, page: Page) -> Result<String, DashError> {
        if page == Page::Ga {
            tokio::time::sleep(Duration::from_millis(300)).await;
        }
        Ok(format!(r#"<div id="{}-fragment"></div>"#, page))
    }

    fn describe(&self) -> String {
        "slow-ga".to_string()
    }
}

#[tokio::test]
async fn other_sessions_do_not_supersede_a_navigation() {
    let mock = MockService::start().await;
    let dashboard = Arc::new(Dashboard::with_source(mock.config(), Arc::new(SlowGa)));

    let first = {
        let dashboard = dashboard.clone();
        tokio::spawn(async move { dashboard.navigate_as("client-a", "ga", false).await })
    };
    tokio::time::sleep(Duration::from_millis(50)).await;
    let second = dashboard.navigate_as("client-b", "pso", false).await;
    assert!(matches!(second, PageView::Page { page: Page::Pso, .. }));

    let first = first.await.unwrap();
    assert!(matches!(first, PageView::Page { page: Page::Ga, .. }));
    assert_eq!(dashboard.router().active_sessions(), 0);
}

#[tokio::test]
async fn same_session_supersedes_its_own_navigation() {
    let mock = MockService::start().await;
    let dashboard = Arc::new(Dashboard::with_source(mock.config(), Arc::new(SlowGa)));

    let first = {
        let dashboard = dashboard.clone();
        tokio::spawn(async move { dashboard.navigate_as("client-a", "ga", false).await })
    };
    tokio::time::sleep(Duration::from_millis(50)).await;
    let second = dashboard.navigate_as("client-a", "pso", false).await;
    assert!(matches!(second, PageView::Page { page: Page::Pso, .. }));

    assert_eq!(first.await.unwrap(), PageView::Stale);
    assert_eq!(dashboard.router().state(Page::Ga), PageState::Idle);
    assert_eq!(dashboard.router().active_sessions(), 0);
}

// ---------------------------------------------------------------------------
// Host
// ---------------------------------------------------------------------------

async fn start_host(config: Config) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let dashboard = Arc::new(Dashboard::new(config));
    tokio::spawn(server::serve(listener, dashboard));
    format!("http://{}", addr)
}

#[tokio::test]
async fn host_serves_pages_runs_and_api() {
    let mock = MockService::start().await;
    mock.serve_fragments();
    mock.route(
        "POST",
        "/api/run/tabu",
        200,
        r#"{"final_accuracy": 0.82, "execution_time": 1.25, "accuracy_history": [0.4, 0.82]}"#,
    );
    let host = start_host(mock.config()).await;
    let http = reqwest::Client::new();

    let health: Value = http.get(format!("{}/api/health", host)).send().await.unwrap().json().await.unwrap();
    assert_eq!(health["status"], "ok");

    let home = http.get(format!("{}/", host)).send().await.unwrap();
    assert_eq!(home.status().as_u16(), 200);
    assert!(home.headers().contains_key("x-fragment-digest"));
    let cookie = home.headers()["set-cookie"].to_str().unwrap().to_string();
    assert!(cookie.starts_with("optidash_session="));
    let session = cookie.split(';').next().unwrap().to_string();

    // A returning viewer keeps its session and is not issued a new one.
    let again = http
        .get(format!("{}/page/ga", host))
        .header("Cookie", session.as_str())
        .send()
        .await
        .unwrap();
    assert_eq!(again.status().as_u16(), 200);
    assert!(!again.headers().contains_key("set-cookie"));
    assert!(home.text().await.unwrap().contains("home-fragment"));

    let run = http
        .post(format!("{}/page/tabu/run", host))
        .header("Content-Type", "application/x-www-form-urlencoded")
        .body("iterations=40&tabu_list_size=5&neighborhood_size=10&step_size=0.2")
        .send()
        .await
        .unwrap();
    assert_eq!(run.status().as_u16(), 200);
    let html = run.text().await.unwrap();
    assert!(html.contains("82.00%"));
    assert!(html.contains("1.25s"));

    let sent: Value = serde_json::from_str(&mock.requests_to("/api/run/tabu")[0].body).unwrap();
    assert_eq!(sent["iterations"], 40);
    assert_eq!(sent["step_size"], 0.2);

    let charts: Value = http
        .get(format!("{}/api/charts/tabu", host))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(charts["tabu-chart-container"]["data"]["datasets"][0]["label"], "Tabu Search Accuracy");

    let missing = http.get(format!("{}/nowhere", host)).send().await.unwrap();
    assert_eq!(missing.status().as_u16(), 404);
}

#[tokio::test]
async fn host_rejects_invalid_forms_with_notification() {
    let mock = MockService::start().await;
    mock.serve_fragments();
    let host = start_host(mock.config()).await;
    let http = reqwest::Client::new();

    let run = http
        .post(format!("{}/page/aco/run", host))
        .header("Content-Type", "application/x-www-form-urlencoded")
        .body("evaporation_rate=1.5")
        .send()
        .await
        .unwrap();
    let html = run.text().await.unwrap();
    assert!(html.contains("Evaporation rate must be a number between 0 and 1"));
    assert!(mock.requests_to("/api/run/aco").is_empty());

    let notes: Value = http
        .get(format!("{}/api/notifications", host))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(notes[0]["level"], "error");
}
