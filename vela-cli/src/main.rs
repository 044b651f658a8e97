use std::io::Read;
use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};

use vela_core::value::params_from_json;
use vela_engine::{Controller, Registry};

#[derive(Parser)]
#[command(name = "vela")]
#[command(about = "Declarative resource engine for Nutanix Prism and NDB", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one invocation: read the parameter map, converge the resource,
    /// print the result map as JSON
    Run {
        /// Resource kind (see `vela kinds`)
        kind: String,

        /// Non-CRUD verb on an existing resource (restore, scale, read, list)
        #[arg(long)]
        verb: Option<String>,

        /// Parameter map as a JSON file; '-' reads stdin
        #[arg(long, default_value = "-")]
        params: PathBuf,

        /// Pretty-print the result map
        #[arg(long)]
        pretty: bool,
    },
    /// List the resource kinds in the catalog
    Kinds,
}

/// `RUST_LOG` wins; otherwise `NUTANIX_DEBUG` bumps the default level to
/// debug. `NUTANIX_LOG_FILE` redirects log lines from stderr to a file.
fn init_logging() {
    let default_level = match std::env::var("NUTANIX_DEBUG") {
        Ok(v) if !v.is_empty() && v != "0" && !v.eq_ignore_ascii_case("false") => "debug",
        _ => "warn",
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);

    let log_file = std::env::var_os("NUTANIX_LOG_FILE").and_then(|path| {
        std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .ok()
    });
    match log_file {
        Some(file) => builder.with_writer(file).with_ansi(false).init(),
        None => builder.with_writer(std::io::stderr).init(),
    }
}

#[tokio::main]
async fn main() {
    init_logging();

    let cli = Cli::parse();
    let outcome = match cli.command {
        Commands::Run {
            kind,
            verb,
            params,
            pretty,
        } => run(&kind, verb.as_deref(), &params, pretty).await,
        Commands::Kinds => list_kinds(),
    };

    match outcome {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            eprintln!("Error: {e:#}");
            std::process::exit(2);
        }
    }
}

async fn run(
    kind: &str,
    verb: Option<&str>,
    params_path: &PathBuf,
    pretty: bool,
) -> anyhow::Result<i32> {
    let text = if params_path.as_os_str() == "-" {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .context("reading parameter map from stdin")?;
        buf
    } else {
        std::fs::read_to_string(params_path)
            .with_context(|| format!("reading {}", params_path.display()))?
    };

    let doc: serde_json::Value =
        serde_json::from_str(&text).context("parameter map is not valid JSON")?;
    let params = params_from_json(&doc)
        .ok_or_else(|| anyhow::anyhow!("parameter map must be a JSON object"))?;

    let registry = Registry::builtin().context("building the resource catalog")?;
    let controller = Controller::new(&registry);
    tracing::debug!(kind, verb = verb.unwrap_or("state"), "running invocation");
    let result = controller.run(kind, verb, &params).await;

    let rendered = if pretty {
        serde_json::to_string_pretty(&result)?
    } else {
        serde_json::to_string(&result)?
    };
    println!("{rendered}");

    Ok(if result.error.is_some() { 1 } else { 0 })
}

fn list_kinds() -> anyhow::Result<i32> {
    let registry = Registry::builtin().context("building the resource catalog")?;
    for kind in registry.kind_names() {
        println!("{kind}");
    }
    Ok(0)
}
