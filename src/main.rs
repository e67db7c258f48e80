//!
//! secretpaths CLI
//! ---------------
//! Loads a secret-store fixture, runs one audit refresh against it and prints one
//! view of the resulting snapshot as JSON on stdout.

use std::env;
use std::path::PathBuf;

use anyhow::{anyhow, Context, Result};
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

use secretpaths::{AuditConfig, Auditor, CancelToken, MemoryStore, Snapshot};

fn print_usage(program: &str) {
    eprintln!(
        "Usage:\n  {program} --snapshot <store.json> [--config <audit.json>] [--mount <m>] [--view <view>] [--level <L>] [--path <p>]\n\nFlags:\n  -s, --snapshot <file>    Store fixture: {{\"mounts\": {{..}}, \"policies\": {{..}}, \"failing_paths\": {{..}}}}\n  --config <file>          Audit config JSON (missing file -> defaults)\n  --mount <m>              KV mount to enumerate (overrides VAULT_KV_ENGINE)\n  --view <view>            graph | tree | paths | level | policies | annotated | lookup | issues (default: graph)\n  --level <L>              Depth for the level view\n  --path <p>               Secret path for the lookup view\n  -h, --help               Show this help\n\nEnvironment:\n  VAULT_KV_ENGINE, SECRETPATHS_MAX_DEPTH, SECRETPATHS_WORKERS, SECRETPATHS_REFRESH_TIMEOUT_MS, RUST_LOG\n\nExit codes:\n  0 ok, 1 refresh failed, 2 usage error or lookup miss"
    );
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum View {
    Graph,
    Tree,
    Paths,
    Level,
    Policies,
    Annotated,
    Lookup,
    Issues,
}

impl View {
    fn parse(s: &str) -> Option<View> {
        match s.to_ascii_lowercase().as_str() {
            "graph" => Some(View::Graph),
            "tree" => Some(View::Tree),
            "paths" => Some(View::Paths),
            "level" => Some(View::Level),
            "policies" => Some(View::Policies),
            "annotated" => Some(View::Annotated),
            "lookup" => Some(View::Lookup),
            "issues" => Some(View::Issues),
            _ => None,
        }
    }
}

fn usage_error(program: &str, msg: &str) -> ! {
    eprintln!("{}", msg);
    print_usage(program);
    std::process::exit(2);
}

fn render(snapshot: &Snapshot, view: View, level: Option<usize>, path: Option<&str>) -> Result<(serde_json::Value, i32)> {
    let value = match view {
        View::Graph => serde_json::to_value(&snapshot.graph)?,
        View::Tree => serde_json::to_value(&snapshot.tree)?,
        View::Paths => serde_json::to_value(&snapshot.leaf_paths)?,
        View::Policies => serde_json::to_value(&snapshot.policies)?,
        View::Annotated => serde_json::to_value(&snapshot.annotation.secrets)?,
        View::Issues => serde_json::to_value(&snapshot.issues)?,
        View::Level => {
            let level = level.ok_or_else(|| anyhow!("--view level requires --level"))?;
            match snapshot.level(level) {
                Some(c) => serde_json::to_value(c)?,
                None => serde_json::Value::Null,
            }
        }
        View::Lookup => {
            let path = path.ok_or_else(|| anyhow!("--view lookup requires --path"))?;
            return Ok(match snapshot.policies_for(path) {
                Some(names) => (serde_json::to_value(names)?, 0),
                None => (serde_json::json!([]), 2),
            });
        }
    };
    Ok((value, 0))
}

/// Program name and the remaining arguments; argv may be empty.
fn split_program(argv: Vec<String>) -> (String, Vec<String>) {
    let program = argv.first().cloned().unwrap_or_else(|| "secretpaths".into());
    (program, argv.into_iter().skip(1).collect())
}

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))?;
    fmt().with_env_filter(filter).with_writer(std::io::stderr).init();

    let (program, args) = split_program(env::args().collect());

    let mut snapshot_file: Option<PathBuf> = None;
    let mut config_file: Option<PathBuf> = None;
    let mut mount: Option<String> = None;
    let mut view = View::Graph;
    let mut level: Option<usize> = None;
    let mut lookup_path: Option<String> = None;

    let mut i = 0;
    while i < args.len() {
        let value = args.get(i + 1).cloned();
        match args[i].as_str() {
            "-s" | "--snapshot" => {
                let Some(v) = value else { usage_error(&program, "--snapshot requires a file") };
                snapshot_file = Some(PathBuf::from(v));
                i += 2; continue;
            }
            "--config" => {
                let Some(v) = value else { usage_error(&program, "--config requires a file") };
                config_file = Some(PathBuf::from(v));
                i += 2; continue;
            }
            "--mount" => {
                let Some(v) = value else { usage_error(&program, "--mount requires a value") };
                mount = Some(v);
                i += 2; continue;
            }
            "--view" => {
                let Some(v) = value else { usage_error(&program, "--view requires a value") };
                view = match View::parse(&v) {
                    Some(view) => view,
                    None => usage_error(&program, &format!("unknown view: {}", v)),
                };
                i += 2; continue;
            }
            "--level" => {
                let Some(v) = value else { usage_error(&program, "--level requires a value") };
                level = match v.parse::<usize>() {
                    Ok(l) => Some(l),
                    Err(_) => usage_error(&program, &format!("--level must be a non-negative integer, got {}", v)),
                };
                i += 2; continue;
            }
            "--path" => {
                let Some(v) = value else { usage_error(&program, "--path requires a value") };
                lookup_path = Some(v);
                i += 2; continue;
            }
            "-h" | "--help" => {
                print_usage(&program);
                return Ok(());
            }
            unk => usage_error(&program, &format!("Unrecognized argument: {}", unk)),
        }
    }

    let Some(snapshot_file) = snapshot_file else { usage_error(&program, "--snapshot is required") };
    if view == View::Level && level.is_none() { usage_error(&program, "--view level requires --level"); }
    if view == View::Lookup && lookup_path.is_none() { usage_error(&program, "--view lookup requires --path"); }

    let mut config = match config_file.as_deref() {
        Some(p) => AuditConfig::load_or_default(p).with_context(|| format!("reading config {}", p.display()))?,
        None => AuditConfig::default(),
    };
    config.apply_env();
    if let Some(m) = mount { config.mount = m; }

    let rust_log = env::var("RUST_LOG").unwrap_or_else(|_| "<unset>".to_string());
    info!(
        target: "secretpaths",
        "secretpaths starting: RUST_LOG='{}', fixture='{}', mount={}, root={}, max_depth={}, workers={}, timeout_ms={}",
        rust_log,
        snapshot_file.display(),
        config.mount,
        config.root_path,
        config.max_depth,
        config.effective_workers(),
        config.refresh_timeout_ms
    );

    let store = MemoryStore::load(&snapshot_file)?;
    let auditor = Auditor::new(store, config);
    let snapshot = match auditor.refresh(&CancelToken::new()).await {
        Ok(s) => s,
        Err(e) => {
            eprintln!("refresh failed ({}): {}", e.code_str(), e);
            std::process::exit(1);
        }
    };

    let (value, code) = render(&snapshot, view, level, lookup_path.as_deref())?;
    println!("{}", serde_json::to_string_pretty(&value)?);
    if code != 0 {
        std::process::exit(code);
    }
    Ok(())
}
