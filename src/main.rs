use anyhow::{Context, Result};
use serde_json::json;
use std::sync::Arc;
use tokio::net::TcpListener;

use optidash::config::Config;
use optidash::dashboard::Dashboard;
use optidash::logging::{json_log, obj, v_str};
use optidash::server;

#[tokio::main]
async fn main() -> Result<()> {
    let cfg = Config::from_env();
    json_log(
        "startup",
        obj(&[
            ("backend_url", v_str(&cfg.backend_url)),
            ("ui_base_url", v_str(&cfg.ui_base_url)),
            (
                "fragment_dir",
                json!(cfg.fragment_dir.as_ref().map(|d| d.display().to_string())),
            ),
            ("listen_addr", v_str(&cfg.listen_addr)),
            ("max_table_rows", json!(cfg.max_table_rows)),
            ("convergence_fraction", json!(cfg.convergence_fraction)),
        ]),
    );

    let listener = TcpListener::bind(&cfg.listen_addr)
        .await
        .with_context(|| format!("failed to bind {}", cfg.listen_addr))?;
    println!("Dashboard running at http://{}", cfg.listen_addr);

    let dashboard = Arc::new(Dashboard::new(cfg));
    tokio::select! {
        res = server::serve(listener, dashboard) => res.context("server stopped")?,
        _ = tokio::signal::ctrl_c() => {
            json_log("shutdown", obj(&[("reason", v_str("ctrl_c"))]));
        }
    }
    Ok(())
}
