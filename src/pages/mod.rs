//! Page controllers. Each page owns its view state; the mapping from page to
//! controller is fixed at compile time.

pub mod algorithm;
pub mod compare;
pub mod home;

use crate::chart::ChartRegistry;
use crate::normalize::{ComparisonResult, ConvergencePolicy};
use crate::router::Page;

pub use algorithm::AlgorithmPage;
pub use compare::ComparePage;
pub use home::HomePage;

/// Settings shared by every render.
#[derive(Debug, Clone, Copy)]
pub struct RenderOptions {
    pub max_rows: usize,
    /// Render every iteration instead of the down-sampled table.
    pub show_all: bool,
    pub policy: ConvergencePolicy,
}

impl RenderOptions {
    pub fn rows_for(&self, len: usize) -> usize {
        if self.show_all {
            len.max(self.max_rows)
        } else {
            self.max_rows
        }
    }
}

pub trait PageController: Send {
    fn page(&self) -> Page;

    /// Seed view state from the results snapshot. Pages that already show a
    /// result keep it.
    fn init(&mut self, snapshot: &ComparisonResult);

    /// Whether `init` would take anything from a snapshot.
    fn needs_snapshot(&self) -> bool;

    /// Page body rendered below the fragment.
    fn render(&mut self, options: &RenderOptions) -> String;

    fn charts(&self) -> &ChartRegistry;
}

/// Controller for a page, resolved statically.
pub enum Controller {
    Home(HomePage),
    Algorithm(AlgorithmPage),
    Compare(ComparePage),
}

impl Controller {
    pub fn for_page(page: Page) -> Self {
        match (page, page.algorithm()) {
            (Page::Home, _) => Controller::Home(HomePage::new()),
            (Page::Compare, _) => Controller::Compare(ComparePage::new()),
            (_, Some(algorithm)) => Controller::Algorithm(AlgorithmPage::new(algorithm)),
            (_, None) => Controller::Home(HomePage::new()),
        }
    }

    pub fn as_dyn(&mut self) -> &mut dyn PageController {
        match self {
            Controller::Home(c) => c,
            Controller::Algorithm(c) => c,
            Controller::Compare(c) => c,
        }
    }

    pub fn needs_snapshot(&self) -> bool {
        match self {
            Controller::Home(c) => c.needs_snapshot(),
            Controller::Algorithm(c) => c.needs_snapshot(),
            Controller::Compare(c) => c.needs_snapshot(),
        }
    }

    pub fn charts(&self) -> &ChartRegistry {
        match self {
            Controller::Home(c) => c.charts(),
            Controller::Algorithm(c) => c.charts(),
            Controller::Compare(c) => c.charts(),
        }
    }
}
