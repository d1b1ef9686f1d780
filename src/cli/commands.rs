use std::io::Write;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde_json::json;

use crate::app::App;
use crate::pattern::PathArgs;
use crate::runtime_config::RuntimeConfig;
use crate::server::{status_reason, MemoryRequest};

/// Command-line interface for routeweave applications
#[derive(Parser, Debug)]
#[command(name = "routeweave")]
#[command(about = "routeweave CLI", version, long_about = None)]
pub struct Cli {
    /// Path to a YAML or TOML config file
    #[arg(short, long, global = true, env = "ROUTEWEAVE_CONFIG")]
    pub config: Option<PathBuf>,

    /// The subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Print every built route and exit
    Routes {
        /// Emit JSON instead of one line per route
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// Dispatch one in-memory request and print the response
    Dispatch {
        /// Request target, may carry a query string
        target: String,

        /// Request method
        #[arg(short = 'X', long, default_value = "GET")]
        method: String,

        /// Request header as `Name: value` (repeatable)
        #[arg(short = 'H', long = "header")]
        headers: Vec<String>,

        /// Cookie as `name=value` (repeatable)
        #[arg(short = 'b', long = "cookie")]
        cookies: Vec<String>,

        /// Request body
        #[arg(short, long)]
        data: Option<String>,

        /// Emit the dispatch outcome and response as JSON
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// Build the path of a named route
    UrlFor {
        /// Route name, e.g. `blog:post`
        name: String,

        /// Capture values as `name=value`
        args: Vec<String>,
    },
    /// Finalize the application and report configuration errors
    Check,
}

fn split_pair<'a>(raw: &'a str, sep: char, shape: &str) -> Result<(&'a str, &'a str)> {
    raw.split_once(sep)
        .map(|(k, v)| (k.trim(), v.trim()))
        .with_context(|| format!("`{raw}` must look like `{shape}`"))
}

/// Build the application with `build`, finalize it and run `cli.command`.
///
/// Output goes to `out`; logging goes wherever the subscriber writes.
pub fn run_cli<F>(cli: Cli, config: RuntimeConfig, build: F, out: &mut dyn Write) -> Result<()>
where
    F: FnOnce(RuntimeConfig) -> Result<App>,
{
    let mut app = build(config).context("failed to build application")?;
    let dispatcher = app.finalize().context("failed to finalize application")?;

    match cli.command {
        Commands::Routes { json } => {
            let listing = app.listing();
            if json {
                serde_json::to_writer_pretty(&mut *out, &listing)?;
                writeln!(out)?;
            } else {
                for row in &listing {
                    writeln!(out, "{row}")?;
                }
            }
        }
        Commands::Dispatch {
            target,
            method,
            headers,
            cookies,
            data,
            json,
        } => {
            let mut req = MemoryRequest::new(method, &target);
            for header in &headers {
                let (name, value) = split_pair(header, ':', "Name: value")?;
                req = req.with_header(name, value);
            }
            for cookie in &cookies {
                let (name, value) = split_pair(cookie, '=', "name=value")?;
                req = req.with_cookie(name, value);
            }
            if let Some(body) = data {
                req = req.with_body(body);
            }

            let outcome = dispatcher.dispatch(&mut req)?;
            let response = req.response().context("dispatcher sent no response")?;
            if json {
                serde_json::to_writer_pretty(&mut *out, &json!({ "outcome": outcome, "response": response }))?;
                writeln!(out)?;
            } else {
                writeln!(out, "HTTP {} {}", response.status, status_reason(response.status))?;
                for (name, value) in &response.headers {
                    writeln!(out, "{name}: {value}")?;
                }
                writeln!(out)?;
                writeln!(out, "{}", response.text())?;
            }
        }
        Commands::UrlFor { name, args } => {
            let args = args
                .iter()
                .map(|a| split_pair(a, '=', "name=value"))
                .collect::<Result<PathArgs>>()?;
            writeln!(out, "{}", app.url_for(&name, args)?)?;
        }
        Commands::Check => {
            writeln!(
                out,
                "ok: {} routes, error status threshold {}",
                dispatcher.routes().len(),
                dispatcher.error_threshold()
            )?;
        }
    }
    Ok(())
}
