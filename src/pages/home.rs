use crate::algorithm::Algorithm;
use crate::chart::ChartRegistry;
use crate::normalize::ComparisonResult;
use crate::pages::{PageController, RenderOptions};
use crate::router::Page;

/// Landing page: one card per optimizer.
#[derive(Debug, Default)]
pub struct HomePage {
    charts: ChartRegistry,
}

impl HomePage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PageController for HomePage {
    fn page(&self) -> Page {
        Page::Home
    }

    fn init(&mut self, _snapshot: &ComparisonResult) {}

    fn needs_snapshot(&self) -> bool {
        false
    }

    fn render(&mut self, _options: &RenderOptions) -> String {
        let mut html = String::from(r#"<div class="home-container">"#);
        for algo in Algorithm::ALL {
            let page = Page::for_algorithm(algo);
            html.push_str(&format!(
                r#"<div class="algorithm-card {id}-card"><h3>{}</h3><p>{}</p><p class="card-strengths">{}</p><a class="btn" href="/page/{id}">Explore</a></div>"#,
                algo.display_name(),
                page.description(),
                algo.strengths(),
                id = algo.id()
            ));
        }
        html.push_str(r#"<a class="btn btn-primary" href="/page/compare">Compare All Algorithms</a></div>"#);
        html
    }

    fn charts(&self) -> &ChartRegistry {
        &self.charts
    }
}
