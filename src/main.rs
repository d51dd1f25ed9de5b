//! Tabula - a console text editor backed by a relational store.
//!
//! # Usage
//!
//! ```bash
//! tabula
//! tabula --database notes.db
//! tabula --listen 8000 --timeout-ms 2000
//! ```

use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;

use tabula::app::{App, StdConsole};
use tabula::capability::Capabilities;
use tabula::config::{
    ConfigFlags, clear_config_flags, global_config_path, load_config_flags, local_override_path,
    parse_flag_tokens, save_config_flags,
};
use tabula::highlight::SyntectHighlighter;
use tabula::server;
use tabula::session::Session;
use tabula::store::SqliteGateway;

/// A console text editor whose documents live in a database
#[derive(Parser, Debug)]
#[command(name = "tabula", version, about, long_about = None)]
struct Cli {
    /// SQLite database file [default: tabula.db]
    #[arg(long, value_name = "PATH")]
    database: Option<PathBuf>,

    /// Database host
    #[arg(long)]
    host: Option<String>,

    /// Database port
    #[arg(long)]
    port: Option<u16>,

    /// Database name
    #[arg(long)]
    dbname: Option<String>,

    /// Database user
    #[arg(long)]
    user: Option<String>,

    /// Database password (never saved with --save)
    #[arg(long)]
    password: Option<String>,

    /// Serve the remote open endpoint on this port
    #[arg(long, value_name = "PORT")]
    listen: Option<u16>,

    /// Timeout for remote opens, in milliseconds [default: 5000]
    #[arg(long, value_name = "MS")]
    timeout_ms: Option<u64>,

    /// Show content without syntax highlighting
    #[arg(long)]
    no_highlight: bool,

    /// Save current command-line flags as defaults
    #[arg(long)]
    save: bool,

    /// Clear saved defaults
    #[arg(long)]
    clear: bool,
}

fn main() -> Result<()> {
    // Logs go to stderr so they stay out of the console transcript.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let raw_args = std::env::args().collect::<Vec<_>>();
    let cli = Cli::parse();
    let global_path = global_config_path();
    let local_path = local_override_path();
    let cli_flags = parse_flag_tokens(&raw_args);

    if cli.clear {
        clear_config_flags(&global_path)?;
    }
    if cli.save {
        save_config_flags(&global_path, &cli_flags)?;
    }

    let file_flags = if cli.clear {
        ConfigFlags::default()
    } else {
        let global_flags = load_config_flags(&global_path)?;
        let local_flags = load_config_flags(&local_path)?;
        global_flags.union(&local_flags)
    };
    let effective = file_flags.union(&cli_flags);

    let params = effective.connection_params();
    tracing::info!(?params, "starting session");

    let mut capabilities = Capabilities::default();
    if !effective.no_highlight {
        capabilities = capabilities.with_highlighter(Box::new(SyntectHighlighter::default()));
    }
    let session = Session::new(SqliteGateway::new(), params)
        .with_capabilities(capabilities)
        .into_handle();

    if let Some(port) = effective.listen {
        let addr = SocketAddr::from(([127, 0, 0, 1], port));
        server::spawn(session.clone(), addr, effective.timeout())
            .context("Failed to start remote listener")?;
        println!("Remote open endpoint listening on http://{addr}/open_file");
    }

    let mut app = App::new(session, StdConsole);
    app.run();
    Ok(())
}
