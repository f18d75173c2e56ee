mod config;
mod render;

use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use tracing_subscriber::filter::Directive;
use tracing_subscriber::{EnvFilter, Layer};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use logsaw_logs::{
    EventContainer, ExpressionRule, LoggerRule, RowCounts, RuleColorizer, RuleMediator,
    StructureChange,
};
use logsaw_receivers::{EventSink, FileLoader, LoadSummary, ReceiverError, SinkLayer, SocketReceiver, export_to_file};
use logsaw_types::Column;

use crate::config::{Config, parse_sort};
use crate::render::{TailView, TextRenderer};

/// logsaw - collect, filter and tail log events from sockets and files
#[derive(Parser, Debug)]
#[command(name = "logsaw")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// TOML configuration file
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Capacity of the cyclic event buffer
    #[arg(long)]
    buffer_size: Option<usize>,

    /// Keep every event instead of overwriting the oldest
    #[arg(long)]
    unbounded: bool,

    /// TCP port to receive JSON-lines events on
    #[arg(long)]
    port: Option<u16>,

    /// Do not open the TCP receiver
    #[arg(long, conflicts_with = "port")]
    no_listen: bool,

    /// JSON-lines files to load at startup
    #[arg(long, value_name = "PATH")]
    load: Vec<PathBuf>,

    /// Display filter expression, e.g. "level >= WARN && logger like 'org.app.*'"
    #[arg(long, value_name = "EXPR")]
    filter: Option<String>,

    /// Pattern language for the `like` operator (regex or glob)
    #[arg(long, value_name = "SYNTAX")]
    pattern_syntax: Option<String>,

    /// Sort rows by COLUMN or COLUMN:desc
    #[arg(long, value_name = "COLUMN[:desc]")]
    sort: Option<String>,

    /// Hide a logger and its descendants (repeatable)
    #[arg(long, value_name = "LOGGER")]
    hide: Vec<String>,

    /// Write the visible events to this file on exit
    #[arg(long, value_name = "PATH")]
    export: Option<PathBuf>,

    /// Colour rows by level
    #[arg(long)]
    color: bool,

    /// Default directive for logsaw's own diagnostics (RUST_LOG adds to it)
    #[arg(long)]
    log_level: Option<String>,
}

impl Args {
    /// Fold command-line overrides into the file configuration
    fn apply(&self, config: &mut Config) {
        if let Some(size) = self.buffer_size {
            config.buffer.capacity = size;
        }
        if self.unbounded {
            config.buffer.cyclic = false;
        }
        if let Some(port) = self.port {
            config.receiver.port = port;
            config.receiver.enabled = true;
        }
        if self.no_listen {
            config.receiver.enabled = false;
        }
        if self.filter.is_some() {
            config.filter.expression = self.filter.clone();
        }
        if self.pattern_syntax.is_some() {
            config.filter.pattern_syntax = self.pattern_syntax.clone();
        }
        if self.sort.is_some() {
            config.filter.sort = self.sort.clone();
        }
        if let Some(level) = &self.log_level {
            config.logging.level = level.clone();
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let mut config = Config::load_optional(args.config.as_ref())?;
    args.apply(&mut config);

    let container = EventContainer::new(config.buffer.cyclic, config.buffer.capacity)
        .context("invalid buffer configuration")?;
    let sink = EventSink::new(container.clone());

    let directive: Directive = config
        .logging
        .level
        .parse()
        .with_context(|| format!("invalid log level '{}'", config.logging.level))?;
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_filter(EnvFilter::from_default_env().add_directive(directive)),
        )
        .with(SinkLayer::new(sink.clone()))
        .init();

    let result = run_app(args, config, container, sink).await;

    if let Err(e) = &result {
        eprintln!("Error: {:#}", e);
    }

    result
}

async fn run_app(args: Args, config: Config, container: EventContainer, sink: EventSink) -> Result<()> {
    // Display rule: logger tree plus the configured filter expression
    let mediator = RuleMediator::new();
    let loggers = LoggerRule::new();
    for logger in &args.hide {
        loggers.hide(logger);
    }
    mediator.set_logger_rule(Some(Arc::new(loggers)));
    if let Some(expression) = &config.filter.expression {
        let rule = ExpressionRule::compile(expression, config.filter.syntax()?)
            .with_context(|| format!("invalid filter '{}'", expression))?;
        mediator.set_refinement_rule(Some(Arc::new(rule)));
    }
    container.set_display_rule(Some(Arc::new(mediator)));

    if let Some(sort) = &config.filter.sort {
        let (column, ascending) = parse_sort(sort)?;
        container.sort_by(Column::from_name(&column), ascending);
    }

    // Container notifications are queued and handled by this task only
    let (counts_tx, mut counts_rx) = mpsc::unbounded_channel::<RowCounts>();
    let (structure_tx, mut structure_rx) = mpsc::unbounded_channel::<StructureChange>();
    let (keys_tx, mut keys_rx) = mpsc::unbounded_channel();
    let (loads_tx, mut loads_rx) = mpsc::unbounded_channel::<Result<LoadSummary, ReceiverError>>();
    container.count_listeners().forward_to(counts_tx);
    container.structure_listeners().forward_to(structure_tx);
    container.key_listeners().forward_to(keys_tx);

    let mut receiver = if config.receiver.enabled {
        Some(SocketReceiver::bind(&config.receiver.address(), sink.clone()).await?)
    } else {
        None
    };

    let loader = FileLoader::new(sink.clone());
    let mut pending_loads = 0usize;
    for path in &args.load {
        let load = loader.spawn(path.clone())?;
        let loads_tx = loads_tx.clone();
        pending_loads += 1;
        tokio::spawn(async move {
            let _ = loads_tx.send(load.finished().await);
        });
    }

    if receiver.is_none() && pending_loads == 0 {
        anyhow::bail!("nothing to read: the receiver is disabled and no files were given");
    }

    let renderer = if args.color {
        TextRenderer::colored(RuleColorizer::new())
    } else {
        TextRenderer::plain()
    };
    let mut tail = TailView::new(container.clone(), renderer);
    let mut stdout = io::stdout();

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    // Main event loop
    loop {
        tokio::select! {
            _ = &mut shutdown => {
                info!("Interrupted, shutting down");
                break;
            }

            Some(counts) = counts_rx.recv() => {
                // Coalesce a burst of notifications into one pass
                let mut latest = counts;
                while let Ok(next) = counts_rx.try_recv() {
                    latest = next;
                }
                debug!(visible = latest.visible, total = latest.total, "Row counts changed");
                tail.print_new(&mut stdout)?;
            }

            Some(change) = structure_rx.recv() => {
                if let StructureChange::DataChanged(reason) = &change {
                    debug!(?reason, "Table changed");
                }
                tail.apply(&change, &mut stdout)?;
            }

            Some(key) = keys_rx.recv() => {
                info!(key = %key.key, row = key.row, "New property column");
            }

            Some(result) = loads_rx.recv() => {
                pending_loads -= 1;
                match result {
                    Ok(summary) => info!(
                        path = %summary.path.display(),
                        loaded = summary.loaded,
                        skipped = summary.skipped,
                        "Loaded file"
                    ),
                    Err(e) => warn!(error = %e, "File load failed"),
                }
                if receiver.is_none() && pending_loads == 0 {
                    break;
                }
            }
        }
    }

    if let Some(receiver) = receiver.take() {
        receiver.shutdown().await;
    }
    tail.print_new(&mut stdout)?;

    if let Some(path) = &args.export {
        let written = export_to_file(path, &container.filtered_events())?;
        eprintln!("Exported {} events to {}", written, path.display());
    }

    Ok(())
}
