//! Ties navigation, page controllers and the optimizer client together.

use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::algorithm::Algorithm;
use crate::client::OptimizerClient;
use crate::config::Config;
use crate::logging::{self, v_str, Domain, ProfileScope};
use crate::normalize::ConvergencePolicy;
use crate::notify::{Notification, Notifier};
use crate::pages::{Controller, RenderOptions};
use crate::params::FormValues;
use crate::render;
use crate::router::{
    DirFragmentSource, FragmentSource, HttpFragmentSource, NavToken, Navigation, Page, PageRouter, DEFAULT_SESSION,
};

/// What a navigation produced for the host.
#[derive(Debug, Clone, PartialEq)]
pub enum PageView {
    Page { page: Page, html: String },
    Error { status: u16, html: String },
    Stale,
}

impl PageView {
    pub fn html(&self) -> Option<&str> {
        match self {
            PageView::Page { html, .. } | PageView::Error { html, .. } => Some(html),
            PageView::Stale => None,
        }
    }
}

/// How a run request ended.
#[derive(Debug, Clone, PartialEq)]
pub enum RunStatus {
    Completed,
    /// Form values failed validation; nothing was sent.
    Rejected(String),
    Failed(String),
}

pub struct Dashboard {
    config: Config,
    policy: ConvergencePolicy,
    router: PageRouter,
    client: OptimizerClient,
    notifier: Arc<Notifier>,
    controllers: HashMap<Page, Arc<Mutex<Controller>>>,
}

impl Dashboard {
    pub fn new(config: Config) -> Self {
        let source: Arc<dyn FragmentSource> = match &config.fragment_dir {
            Some(dir) => Arc::new(DirFragmentSource::new(dir.clone())),
            None => Arc::new(HttpFragmentSource::new(&config.ui_base_url, config.http_timeout_secs)),
        };
        Self::with_source(config, source)
    }

    pub fn with_source(config: Config, source: Arc<dyn FragmentSource>) -> Self {
        let notifier = Arc::new(Notifier::new(config.notify_ttl_ms));
        let controllers = Page::ALL
            .into_iter()
            .map(|page| (page, Arc::new(Mutex::new(Controller::for_page(page)))))
            .collect();
        Self {
            policy: config.convergence_policy(),
            router: PageRouter::new(source, notifier.clone()),
            client: OptimizerClient::new(&config),
            notifier,
            controllers,
            config,
        }
    }

    pub fn router(&self) -> &PageRouter {
        &self.router
    }

    pub fn notifier(&self) -> &Notifier {
        &self.notifier
    }

    pub fn notifications(&self) -> Vec<Notification> {
        self.notifier.active()
    }

    pub fn controller(&self, page: Page) -> Option<Arc<Mutex<Controller>>> {
        self.controllers.get(&page).cloned()
    }

    fn options(&self, show_all: bool) -> RenderOptions {
        RenderOptions {
            max_rows: self.config.max_table_rows,
            show_all,
            policy: self.policy,
        }
    }

    /// Seed a page from the results snapshot. Pages that already hold a result
    /// skip the fetch; a missing snapshot only warns.
    async fn init_controller(&self, page: Page) {
        let Some(controller) = self.controller(page) else {
            logging::warn(Domain::Router, "no_controller", &[("page", v_str(page.name()))]);
            return;
        };
        if !controller.lock().await.needs_snapshot() {
            return;
        }
        match self.client.fetch_results().await {
            Ok(snapshot) => controller.lock().await.as_dyn().init(&snapshot),
            Err(err) => logging::warn(
                Domain::Client,
                "snapshot_unavailable",
                &[("page", v_str(page.name())), ("error", v_str(&err.to_string()))],
            ),
        }
    }

    /// Navigate to `name` and render the full page, under the default session.
    pub async fn navigate(&self, name: &str, show_all: bool) -> PageView {
        self.navigate_as(DEFAULT_SESSION, name, show_all).await
    }

    /// Navigate for one viewer session. Only a later navigation of the same
    /// session can make this one stale.
    pub async fn navigate_as(&self, session: &str, name: &str, show_all: bool) -> PageView {
        let token = self.router.begin_navigation(session);
        let view = self.navigate_with_token(name, &token, show_all).await;
        self.router.end_navigation(&token);
        view
    }

    pub async fn navigate_with_token(&self, name: &str, token: &NavToken, show_all: bool) -> PageView {
        let _scope = ProfileScope::with_context(
            "dashboard.navigate",
            &[("page", v_str(name)), ("session", v_str(token.session()))],
        );
        match self.router.load_with_token(name, token).await {
            Navigation::Rendered { page, html: fragment, .. } => {
                self.init_controller(page).await;
                if !self.router.is_current(token) {
                    return PageView::Stale;
                }
                PageView::Page { page, html: self.render_page(page, &fragment, show_all).await }
            }
            Navigation::Failed { page_name, html, .. } => PageView::Error {
                status: if Page::parse(&page_name).is_some() { 502 } else { 404 },
                html: render::error_page(&html, &self.notifier.active()),
            },
            Navigation::Stale { .. } => PageView::Stale,
        }
    }

    async fn render_page(&self, page: Page, fragment: &str, show_all: bool) -> String {
        let body = match self.controller(page) {
            Some(controller) => controller.lock().await.as_dyn().render(&self.options(show_all)),
            None => String::new(),
        };
        render::page_shell(page, fragment, &body, &self.notifier.active())
    }

    /// Validate the form, run the optimizer and record the outcome on its page.
    pub async fn run_algorithm(&self, algorithm: Algorithm, form: &FormValues) -> RunStatus {
        let Some(controller) = self.controller(Page::for_algorithm(algorithm)) else {
            return RunStatus::Failed(format!("no page for {}", algorithm));
        };

        // Parameters are prepared under the lock; the request runs without it.
        let prepared = match &*controller.lock().await {
            Controller::Algorithm(page) => page.prepare(form),
            _ => return RunStatus::Failed(format!("no page for {}", algorithm)),
        };
        let params = match prepared {
            Ok(params) => params,
            Err(err) => {
                let message = format!("Error running {}: {}", algorithm.display_name(), err);
                self.notifier.error(message.clone());
                return RunStatus::Rejected(message);
            }
        };

        let outcome = self.client.run(&params).await;

        let failure = match &mut *controller.lock().await {
            Controller::Algorithm(page) => page.apply_outcome(outcome),
            _ => None,
        };
        match failure {
            Some(message) => {
                self.notifier.error(message.clone());
                RunStatus::Failed(message)
            }
            None => RunStatus::Completed,
        }
    }

    /// Run every optimizer and show the comparison.
    pub async fn run_all(&self) -> RunStatus {
        let outcome = self.client.run_all().await;
        if let Err(err) = &outcome {
            logging::error(Domain::Client, "run_all_failed", &[("error", v_str(&err.to_string()))]);
        }
        let Some(controller) = self.controller(Page::Compare) else {
            return RunStatus::Failed("no compare page".to_string());
        };
        let failure = match &mut *controller.lock().await {
            Controller::Compare(page) => page.apply_comparison(outcome),
            _ => None,
        };
        match failure {
            Some(message) => {
                self.notifier.error(message.clone());
                RunStatus::Failed(message)
            }
            None => RunStatus::Completed,
        }
    }

    /// Live chart configs of a page, keyed by container.
    pub async fn charts_json(&self, page: Page) -> Value {
        match self.controller(page) {
            Some(controller) => controller.lock().await.charts().to_json(),
            None => json!({}),
        }
    }
}
