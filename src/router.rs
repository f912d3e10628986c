//! Page navigation: fragment loading, the fragment cache and navigation tokens.

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use serde_json::json;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::algorithm::Algorithm;
use crate::client::endpoint;
use crate::error::DashError;
use crate::logging::{self, ts_epoch_ms, v_str, Domain, ProfileScope};
use crate::notify::Notifier;
use crate::render;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Page {
    Home,
    Ga,
    Pso,
    Aco,
    Tabu,
    Compare,
}

impl Page {
    pub const ALL: [Page; 6] = [Page::Home, Page::Ga, Page::Pso, Page::Aco, Page::Tabu, Page::Compare];

    pub fn name(&self) -> &'static str {
        match self {
            Page::Home => "home",
            Page::Compare => "compare",
            Page::Ga => Algorithm::Ga.id(),
            Page::Pso => Algorithm::Pso.id(),
            Page::Aco => Algorithm::Aco.id(),
            Page::Tabu => Algorithm::Tabu.id(),
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        Page::ALL.into_iter().find(|p| p.name() == name)
    }

    pub fn for_algorithm(algorithm: Algorithm) -> Self {
        match algorithm {
            Algorithm::Ga => Page::Ga,
            Algorithm::Pso => Page::Pso,
            Algorithm::Aco => Page::Aco,
            Algorithm::Tabu => Page::Tabu,
        }
    }

    pub fn algorithm(&self) -> Option<Algorithm> {
        Algorithm::parse(self.name())
    }

    pub fn title(&self) -> &'static str {
        match self {
            Page::Home => "Hybrid AI Optimization",
            Page::Compare => "Algorithm Comparison",
            Page::Ga => Algorithm::Ga.display_name(),
            Page::Pso => Algorithm::Pso.display_name(),
            Page::Aco => Algorithm::Aco.display_name(),
            Page::Tabu => Algorithm::Tabu.display_name(),
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Page::Home => "Train neural networks using nature-inspired optimization algorithms",
            Page::Ga => "Optimization inspired by natural evolution and genetics",
            Page::Pso => "Optimization inspired by social behavior of bird flocking or fish schooling",
            Page::Aco => "Optimization inspired by ants finding paths through pheromone trails",
            Page::Tabu => "Metaheuristic search using memory structures to avoid revisiting previous solutions",
            Page::Compare => "Compare the performance of different optimization algorithms",
        }
    }

    pub fn fragment_path(&self) -> String {
        format!("components/{}.html", self.name())
    }
}

impl fmt::Display for Page {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// =============================================================================
// Fragment sources
// =============================================================================

/// Where page fragments come from.
#[async_trait]
pub trait FragmentSource: Send + Sync {
    async fn fetch(&self, page: Page) -> Result<String, DashError>;
    fn describe(&self) -> String;
}

/// Fragments served over HTTP relative to the UI base URL.
pub struct HttpFragmentSource {
    client: Client,
    base_url: String,
}

impl HttpFragmentSource {
    pub fn new(base_url: &str, timeout_secs: u64) -> Self {
        Self {
            client: Client::builder()
                .timeout(Duration::from_secs(timeout_secs))
                .build()
                .unwrap_or_else(|_| Client::new()),
            base_url: base_url.to_string(),
        }
    }
}

#[async_trait]
impl FragmentSource for HttpFragmentSource {
    async fn fetch(&self, page: Page) -> Result<String, DashError> {
        let url = endpoint(&self.base_url, &page.fragment_path())?;
        let resp = self.client.get(url).send().await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(DashError::Fragment {
                status: status.as_u16(),
                reason: status.canonical_reason().unwrap_or("").to_string(),
            });
        }
        Ok(resp.text().await?)
    }

    fn describe(&self) -> String {
        self.base_url.clone()
    }
}

/// Fragments read from `{root}/components/`.
pub struct DirFragmentSource {
    root: PathBuf,
}

impl DirFragmentSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

#[async_trait]
impl FragmentSource for DirFragmentSource {
    async fn fetch(&self, page: Page) -> Result<String, DashError> {
        Ok(tokio::fs::read_to_string(self.root.join(page.fragment_path())).await?)
    }

    fn describe(&self) -> String {
        self.root.display().to_string()
    }
}

// =============================================================================
// Router
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PageState {
    Idle,
    Loading,
    Rendered,
    Failed,
}

#[derive(Debug, Clone)]
struct CachedFragment {
    html: String,
    digest: String,
}

/// How a navigation ended.
#[derive(Debug, Clone, PartialEq)]
pub enum Navigation {
    Rendered { page: Page, html: String, from_cache: bool },
    /// The fragment could not be loaded; `html` is the inline error block.
    Failed { page_name: String, html: String, message: String },
    /// A newer navigation of the same session started before this one finished.
    Stale { page_name: String, token: NavToken },
}

/// Identifies one navigation of one viewer session. Only a newer token of the
/// same session supersedes it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NavToken {
    session: String,
    seq: u64,
}

impl NavToken {
    pub fn session(&self) -> &str {
        &self.session
    }

    pub fn seq(&self) -> u64 {
        self.seq
    }
}

/// Session used by callers that do not track viewers.
pub const DEFAULT_SESSION: &str = "default";

pub fn fragment_digest(html: &str) -> String {
    hex::encode(Sha256::digest(html.as_bytes()))
}

pub struct PageRouter {
    source: Arc<dyn FragmentSource>,
    notifier: Arc<Notifier>,
    cache: Mutex<HashMap<Page, CachedFragment>>,
    states: Mutex<HashMap<Page, PageState>>,
    /// Latest navigation per session; entries live while a navigation is in flight.
    latest: Mutex<HashMap<String, u64>>,
    next_seq: AtomicU64,
    fetches: AtomicU64,
}

impl PageRouter {
    pub fn new(source: Arc<dyn FragmentSource>, notifier: Arc<Notifier>) -> Self {
        logging::info(Domain::Router, "source", &[("fragments", v_str(&source.describe()))]);
        Self {
            source,
            notifier,
            cache: Mutex::new(HashMap::new()),
            states: Mutex::new(HashMap::new()),
            latest: Mutex::new(HashMap::new()),
            next_seq: AtomicU64::new(0),
            fetches: AtomicU64::new(0),
        }
    }

    /// Start a navigation for `session`; an earlier one of the same session
    /// still in flight becomes stale.
    pub fn begin_navigation(&self, session: &str) -> NavToken {
        let seq = self.next_seq.fetch_add(1, Ordering::SeqCst) + 1;
        if let Ok(mut latest) = self.latest.lock() {
            latest.insert(session.to_string(), seq);
        }
        NavToken { session: session.to_string(), seq }
    }

    pub fn is_current(&self, token: &NavToken) -> bool {
        match self.latest.lock() {
            Ok(latest) => latest.get(&token.session) == Some(&token.seq),
            Err(_) => true,
        }
    }

    /// Forget the session's entry if `token` is still its latest navigation.
    pub fn end_navigation(&self, token: &NavToken) {
        if let Ok(mut latest) = self.latest.lock() {
            if latest.get(&token.session) == Some(&token.seq) {
                latest.remove(&token.session);
            }
        }
    }

    /// Sessions with a navigation in flight.
    pub fn active_sessions(&self) -> usize {
        self.latest.lock().map(|l| l.len()).unwrap_or(0)
    }

    pub fn state(&self, page: Page) -> PageState {
        self.states
            .lock()
            .ok()
            .and_then(|s| s.get(&page).copied())
            .unwrap_or(PageState::Idle)
    }

    fn set_state(&self, page: Page, state: PageState) {
        if let Ok(mut states) = self.states.lock() {
            states.insert(page, state);
        }
    }

    /// Number of fragment fetches issued so far.
    pub fn fetch_count(&self) -> u64 {
        self.fetches.load(Ordering::SeqCst)
    }

    pub fn cached_digest(&self, page: Page) -> Option<String> {
        self.cache.lock().ok()?.get(&page).map(|c| c.digest.clone())
    }

    fn cached(&self, page: Page) -> Option<String> {
        self.cache.lock().ok()?.get(&page).map(|c| c.html.clone())
    }

    /// Load `name` as a navigation of its own, under the default session.
    pub async fn load_page(&self, name: &str) -> Navigation {
        let token = self.begin_navigation(DEFAULT_SESSION);
        let nav = self.load_with_token(name, &token).await;
        self.end_navigation(&token);
        nav
    }

    /// Load `name` under a navigation token obtained from `begin_navigation`.
    pub async fn load_with_token(&self, name: &str, token: &NavToken) -> Navigation {
        let _scope = ProfileScope::with_context("router.load_page", &[("page", v_str(name))]);

        let Some(page) = Page::parse(name) else {
            return self.fail(name, token, &DashError::UnknownPage(name.to_string()));
        };

        if let Some(html) = self.cached(page) {
            logging::debug(
                Domain::Router,
                "cache_hit",
                &[("page", v_str(name)), ("token", json!(token.seq)), ("session", v_str(&token.session))],
            );
            return self.finish(page, token, html, true);
        }

        self.set_state(page, PageState::Loading);
        self.fetches.fetch_add(1, Ordering::SeqCst);
        match self.source.fetch(page).await {
            Ok(html) => {
                let digest = fragment_digest(&html);
                logging::info(
                    Domain::Router,
                    "fragment_cached",
                    &[
                        ("page", v_str(name)),
                        ("bytes", json!(html.len())),
                        ("digest", v_str(&digest)),
                        ("fetched_ms", json!(ts_epoch_ms())),
                    ],
                );
                if let Ok(mut cache) = self.cache.lock() {
                    cache
                        .entry(page)
                        .or_insert_with(|| CachedFragment { html: html.clone(), digest });
                }
                self.finish(page, token, html, false)
            }
            Err(err) => {
                if self.is_current(token) {
                    self.set_state(page, PageState::Failed);
                } else {
                    self.settle_stale(page);
                }
                self.fail(name, token, &err)
            }
        }
    }

    fn finish(&self, page: Page, token: &NavToken, html: String, from_cache: bool) -> Navigation {
        if !self.is_current(token) {
            self.settle_stale(page);
            return self.stale(page.name(), token);
        }
        self.set_state(page, PageState::Rendered);
        Navigation::Rendered { page, html, from_cache }
    }

    /// A discarded navigation renders nothing; undo the load it started.
    fn settle_stale(&self, page: Page) {
        if self.state(page) == PageState::Loading {
            self.set_state(page, PageState::Idle);
        }
    }

    fn fail(&self, name: &str, token: &NavToken, err: &DashError) -> Navigation {
        if !self.is_current(token) {
            return self.stale(name, token);
        }
        let message = err.to_string();
        logging::error(
            Domain::Router,
            "load_failed",
            &[("page", v_str(name)), ("token", json!(token.seq)), ("error", v_str(&message))],
        );
        self.notifier.error(format!("Failed to load {} page: {}", name, message));
        Navigation::Failed {
            page_name: name.to_string(),
            html: render::error_block("Error Loading Page", &message),
            message,
        }
    }

    fn stale(&self, name: &str, token: &NavToken) -> Navigation {
        logging::debug(
            Domain::Router,
            "stale",
            &[("page", v_str(name)), ("token", json!(token.seq)), ("session", v_str(&token.session))],
        );
        Navigation::Stale { page_name: name.to_string(), token: token.clone() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixed(&'static str);

    #[async_trait]
    impl FragmentSource for Fixed {
        async fn fetch(&self, page: Page) -> Result<String, DashError> {
            Ok(format!("{}:{}", self.0, page))
        }

        fn describe(&self) -> String {
            "fixed".to_string()
        }
    }

    fn router() -> PageRouter {
        PageRouter::new(Arc::new(Fixed("frag")), Arc::new(Notifier::default()))
    }

    #[test]
    fn page_names_round_trip() {
        for page in Page::ALL {
            assert_eq!(Page::parse(page.name()), Some(page));
        }
        assert_eq!(Page::parse("settings"), None);
        assert_eq!(Page::Tabu.fragment_path(), "components/tabu.html");
        assert_eq!(Page::Pso.algorithm(), Some(Algorithm::Pso));
        assert_eq!(Page::Home.algorithm(), None);
    }

    #[tokio::test]
    async fn second_load_is_served_from_cache() {
        let router = router();
        assert_eq!(router.state(Page::Ga), PageState::Idle);
        let first = router.load_page("ga").await;
        assert!(matches!(first, Navigation::Rendered { from_cache: false, .. }));
        let second = router.load_page("ga").await;
        assert_eq!(
            second,
            Navigation::Rendered { page: Page::Ga, html: "frag:ga".to_string(), from_cache: true }
        );
        assert_eq!(router.fetch_count(), 1);
        assert_eq!(router.state(Page::Ga), PageState::Rendered);
        assert_eq!(router.cached_digest(Page::Ga), Some(fragment_digest("frag:ga")));
    }

    #[tokio::test]
    async fn superseded_navigation_is_stale_but_cached() {
        let router = router();
        let old = router.begin_navigation("viewer");
        let newer = router.begin_navigation("viewer");
        let nav = router.load_with_token("pso", &old).await;
        assert_eq!(nav, Navigation::Stale { page_name: "pso".to_string(), token: old.clone() });
        assert!(router.cached_digest(Page::Pso).is_some());
        // A discarded navigation renders nothing.
        assert_eq!(router.state(Page::Pso), PageState::Idle);

        assert!(matches!(router.load_with_token("pso", &newer).await, Navigation::Rendered { .. }));
        assert_eq!(router.state(Page::Pso), PageState::Rendered);
    }

    #[tokio::test]
    async fn sessions_do_not_supersede_each_other() {
        let router = router();
        let a = router.begin_navigation("a");
        let b = router.begin_navigation("b");
        assert!(router.is_current(&a));
        assert!(router.is_current(&b));
        assert!(matches!(router.load_with_token("ga", &a).await, Navigation::Rendered { page: Page::Ga, .. }));

        let a2 = router.begin_navigation("a");
        assert!(!router.is_current(&a));
        assert!(router.is_current(&b));
        assert_eq!(a2.session(), "a");
        assert!(a2.seq() > b.seq());
    }

    #[tokio::test]
    async fn finished_navigations_release_their_session() {
        let router = router();
        let old = router.begin_navigation("a");
        let newer = router.begin_navigation("a");
        router.end_navigation(&old);
        assert_eq!(router.active_sessions(), 1);
        router.end_navigation(&newer);
        assert_eq!(router.active_sessions(), 0);
        router.load_page("home").await;
        assert_eq!(router.active_sessions(), 0);
    }

    #[tokio::test]
    async fn unknown_page_fails_with_notification() {
        let notifier = Arc::new(Notifier::default());
        let router = PageRouter::new(Arc::new(Fixed("x")), notifier.clone());
        match router.load_page("settings").await {
            Navigation::Failed { page_name, html, message } => {
                assert_eq!(page_name, "settings");
                assert_eq!(message, "unknown page: settings");
                assert!(html.contains("Error Loading Page"));
            }
            other => panic!("unexpected {:?}", other),
        }
        let active = notifier.active();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].message, "Failed to load settings page: unknown page: settings");
    }

    #[test]
    fn digest_is_hex_sha256() {
        let d = fragment_digest("");
        assert_eq!(d.len(), 64);
        assert!(d.starts_with("e3b0c442"));
    }
}
