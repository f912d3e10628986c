//! Structured logging for the dashboard host.
//!
//! Every entry is one JSON object per line:
//! 1. Multi-level granularity (TRACE → FATAL), filtered by `LOG_LEVEL`
//! 2. Domain categories, filtered by `LOG_DOMAINS`
//! 3. Per-process run directory with `events.jsonl` and `trace.jsonl`

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::fs::{create_dir_all, File};
use std::io::{BufWriter, Write};
use std::path::PathBuf;
use std::process;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, OnceLock};
use std::time::Instant;

// =============================================================================
// Log Levels
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Trace = 0,
    Debug = 1,
    Info = 2,
    Warn = 3,
    Error = 4,
    Fatal = 5,
}

impl Level {
    pub fn from_env() -> Self {
        match std::env::var("LOG_LEVEL").as_deref() {
            Ok("trace") => Level::Trace,
            Ok("debug") => Level::Debug,
            Ok("info") => Level::Info,
            Ok("warn") => Level::Warn,
            Ok("error") => Level::Error,
            Ok("fatal") => Level::Fatal,
            _ => Level::Info,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Level::Trace => "trace",
            Level::Debug => "debug",
            Level::Info => "info",
            Level::Warn => "warn",
            Level::Error => "error",
            Level::Fatal => "fatal",
        }
    }
}

// =============================================================================
// Log Domains (categories for filtering)
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Domain {
    Router,  // Fragment fetches, cache, navigation tokens
    Client,  // Optimizer service calls
    Render,  // Page bodies, tables
    Chart,   // Chart bind/dispose
    Params,  // Form validation
    Server,  // Host connections
    System,  // Startup, shutdown
    Profile, // Timing scopes
}

impl Domain {
    pub fn as_str(&self) -> &'static str {
        match self {
            Domain::Router => "router",
            Domain::Client => "client",
            Domain::Render => "render",
            Domain::Chart => "chart",
            Domain::Params => "params",
            Domain::Server => "server",
            Domain::System => "system",
            Domain::Profile => "profile",
        }
    }

    pub fn is_enabled(&self) -> bool {
        // LOG_DOMAINS: comma-separated list or "all"
        match std::env::var("LOG_DOMAINS").as_deref() {
            Ok("all") | Err(_) => true,
            Ok(domains) => domains.split(',').any(|d| d.trim() == self.as_str()),
        }
    }
}

// =============================================================================
// Run context
// =============================================================================

static LOG_SEQ: AtomicU64 = AtomicU64::new(0);
static PROFILE_SEQ: AtomicU64 = AtomicU64::new(0);
static RUN_CONTEXT: OnceLock<RunContext> = OnceLock::new();

fn next_seq() -> u64 {
    LOG_SEQ.fetch_add(1, Ordering::SeqCst)
}

#[derive(Debug)]
struct RunContext {
    run_id: String,
    events: Option<Mutex<BufWriter<File>>>,
    trace: Option<Mutex<BufWriter<File>>>,
}

fn open_log(path: PathBuf) -> Option<Mutex<BufWriter<File>>> {
    match File::create(&path) {
        Ok(file) => Some(Mutex::new(BufWriter::new(file))),
        Err(err) => {
            eprintln!("[log] failed to create {}: {}", path.display(), err);
            None
        }
    }
}

fn ensure_run_context() -> &'static RunContext {
    RUN_CONTEXT.get_or_init(|| {
        let run_id = std::env::var("RUN_ID")
            .unwrap_or_else(|_| format!("r-{}-{}", ts_epoch_ms(), process::id()));
        // Without LOG_DIR the host only logs to stdout.
        let Ok(base) = std::env::var("LOG_DIR") else {
            return RunContext { run_id, events: None, trace: None };
        };
        let mut run_dir = PathBuf::from(base);
        run_dir.push(&run_id);
        if let Err(err) = create_dir_all(&run_dir) {
            eprintln!("[log] failed to create run dir: {}", err);
            return RunContext { run_id, events: None, trace: None };
        }
        let _ = std::fs::write(
            run_dir.join("manifest.json"),
            json!({
                "run_id": run_id,
                "ts": ts_now(),
                "pid": process::id(),
                "log_dir": run_dir.to_string_lossy(),
            })
            .to_string(),
        );
        RunContext {
            events: open_log(run_dir.join("events.jsonl")),
            trace: open_log(run_dir.join("trace.jsonl")),
            run_id,
        }
    })
}

fn split_fields(mut fields: Map<String, Value>) -> (Map<String, Value>, Map<String, Value>) {
    let mut top = Map::new();
    for key in ["page", "algorithm", "token", "msg"] {
        if let Some(value) = fields.remove(key) {
            top.insert(key.to_string(), value);
        }
    }
    (top, fields)
}

fn write_line(writer: &Option<Mutex<BufWriter<File>>>, line: &str) {
    if let Some(writer) = writer {
        if let Ok(mut w) = writer.lock() {
            let _ = writeln!(w, "{}", line);
            let _ = w.flush();
        }
    }
}

// =============================================================================
// Core logging functions
// =============================================================================

/// RFC3339 timestamp with milliseconds
pub fn ts_now() -> String {
    Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}

/// Epoch milliseconds
pub fn ts_epoch_ms() -> u64 {
    Utc::now().timestamp_millis() as u64
}

/// Emit a structured log entry
pub fn log(level: Level, domain: Domain, event: &str, fields: Map<String, Value>) {
    let min_level = Level::from_env();
    if level < min_level || !domain.is_enabled() {
        return;
    }

    emit_record(level, domain.as_str(), event, fields);
}

/// Log under a free-form component name, always at info
pub fn json_log(module: &str, fields: Map<String, Value>) {
    emit_record(Level::Info, module, module, fields);
}

fn emit_record(level: Level, component: &str, event: &str, fields: Map<String, Value>) {
    let ctx = ensure_run_context();
    let (mut top, data) = split_fields(fields);

    let msg = top.remove("msg").unwrap_or(Value::String(String::new()));
    let mut entry = Map::new();
    entry.insert("ts".to_string(), json!(ts_now()));
    entry.insert("run_id".to_string(), json!(ctx.run_id.clone()));
    entry.insert("seq".to_string(), json!(next_seq()));
    entry.insert("lvl".to_string(), json!(level.as_str().to_uppercase()));
    entry.insert("component".to_string(), json!(component));
    entry.insert("event".to_string(), json!(event));
    entry.insert("msg".to_string(), msg);
    for (k, v) in top {
        entry.insert(k, v);
    }
    entry.insert("data".to_string(), Value::Object(data));

    let line = Value::Object(entry).to_string();
    match level {
        Level::Trace | Level::Debug => write_line(&ctx.trace, &line),
        _ => write_line(&ctx.events, &line),
    }
    println!("{}", line);
}

pub fn info(domain: Domain, event: &str, fields: &[(&str, Value)]) {
    log(Level::Info, domain, event, obj(fields));
}

pub fn warn(domain: Domain, event: &str, fields: &[(&str, Value)]) {
    log(Level::Warn, domain, event, obj(fields));
}

pub fn error(domain: Domain, event: &str, fields: &[(&str, Value)]) {
    log(Level::Error, domain, event, obj(fields));
}

pub fn debug(domain: Domain, event: &str, fields: &[(&str, Value)]) {
    log(Level::Debug, domain, event, obj(fields));
}

// =============================================================================
// Field helpers
// =============================================================================

pub fn obj(pairs: &[(&str, Value)]) -> Map<String, Value> {
    let mut map = Map::new();
    for (k, v) in pairs {
        map.insert((*k).to_string(), v.clone());
    }
    map
}

pub fn v_str(s: &str) -> Value {
    Value::String(s.to_string())
}

pub fn v_num(n: f64) -> Value {
    json!(n)
}

// =============================================================================
// Profiling Scope
// =============================================================================

/// Profiling scope that emits structured timing on drop.
pub struct ProfileScope {
    label: &'static str,
    context: Option<Map<String, Value>>,
    started: Instant,
    enabled: bool,
}

impl ProfileScope {
    pub fn new(label: &'static str) -> Self {
        Self {
            label,
            context: None,
            started: Instant::now(),
            enabled: Self::should_sample(),
        }
    }

    pub fn with_context(label: &'static str, fields: &[(&str, Value)]) -> Self {
        let enabled = Self::should_sample();
        Self {
            label,
            context: if enabled { Some(obj(fields)) } else { None },
            started: Instant::now(),
            enabled,
        }
    }

    fn should_sample() -> bool {
        std::env::var("PROFILE_SAMPLE")
            .ok()
            .and_then(|v| v.parse::<f64>().ok())
            .map(|p| {
                if p >= 1.0 {
                    true
                } else if p <= 0.0 {
                    false
                } else {
                    let seq = PROFILE_SEQ.fetch_add(1, Ordering::SeqCst);
                    let bucket = (seq % 10_000) as f64 / 10_000.0;
                    bucket < p
                }
            })
            .unwrap_or(true)
    }
}

impl Drop for ProfileScope {
    fn drop(&mut self) {
        if !self.enabled {
            return;
        }
        let elapsed_ms = self.started.elapsed().as_secs_f64() * 1000.0;
        let mut fields = self.context.take().unwrap_or_default();
        fields.insert("label".to_string(), v_str(self.label));
        fields.insert("elapsed_ms".to_string(), v_num(elapsed_ms));
        log(Level::Trace, Domain::Profile, "profile", fields);
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_ordering() {
        assert!(Level::Trace < Level::Debug);
        assert!(Level::Debug < Level::Info);
        assert!(Level::Info < Level::Warn);
        assert!(Level::Warn < Level::Error);
        assert!(Level::Error < Level::Fatal);
    }

    #[test]
    fn test_obj_helper() {
        let m = obj(&[("key", v_str("value")), ("num", v_num(42.0))]);
        assert_eq!(m.get("key").unwrap(), "value");
        assert_eq!(m.get("num").unwrap(), 42.0);
    }

    #[test]
    fn test_split_fields_lifts_page_and_msg() {
        let (top, data) = split_fields(obj(&[
            ("page", v_str("ga")),
            ("msg", v_str("hello")),
            ("rows", json!(3)),
        ]));
        assert_eq!(top.get("page").unwrap(), "ga");
        assert_eq!(top.get("msg").unwrap(), "hello");
        assert!(data.contains_key("rows"));
        assert!(!data.contains_key("page"));
    }

    #[test]
    fn test_seq_increments() {
        let s1 = next_seq();
        let s2 = next_seq();
        assert!(s2 > s1);
    }

    #[test]
    fn test_domain_names_are_snake_case() {
        assert_eq!(Domain::Router.as_str(), "router");
        assert_eq!(Domain::Profile.as_str(), "profile");
    }
}
