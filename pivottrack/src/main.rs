use anyhow::{anyhow, Result};
use censys_connector::CensysConnector;
use clap::{Args, Parser, Subcommand, ValueEnum};
use pivottrack_core::{
    CanonicalEntity, ConnectorRegistry, OutputStore, QueryResult, Querying, Search, Source, SourceConnector,
};
use results_sqlite::Db;
use shodan_connector::ShodanConnector;
use std::path::PathBuf;
use std::time::Duration;
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;
use tracking::{load_definition_files, FileNotifier, LogNotifier, RunMode, Tracker};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod config;

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum OutputFormat { Text, Json }

#[derive(Debug, Parser)]
#[command(name = "pivottrack", version, about = "Pivot on indicators across OSINT sources and track new results")]
struct Cli {
    /// Optional config file (YAML). If omitted, loads ./pivottrack.yaml if present.
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Debug logging (RUST_LOG takes precedence)
    #[arg(short, long, global = true, default_value_t = false)]
    verbose: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Print version information
    Version,
    /// Query an OSINT source
    Query {
        #[command(subcommand)]
        cmd: QueryCmd,
    },
    /// Run tracking definitions and report new results
    Track {
        /// Definition directory or file (default: tracking.definitions from config, then ./definitions)
        #[arg(long, value_name = "PATH")]
        definitions: Option<PathBuf>,
        /// Run a single cycle and exit
        #[arg(long, default_value_t = false)]
        once: bool,
        /// Seconds between cycles
        #[arg(long)]
        interval: Option<u64>,
        /// Append notifications to this file instead of the log
        #[arg(long, value_name = "FILE")]
        notify: Option<PathBuf>,
    },
    /// Load and list tracking definitions
    Definitions {
        #[arg(long, value_name = "PATH")]
        definitions: Option<PathBuf>,
    },
}

#[derive(Debug, Subcommand)]
enum QueryCmd {
    /// Look up a single host
    Host {
        /// IP address
        host: String,
        #[command(flatten)]
        opts: QueryOpts,
    },
    /// Run a search query
    Generic {
        /// Query in the source's search syntax
        query: String,
        /// Look up every host found by the search
        #[arg(long, default_value_t = false)]
        expand: bool,
        #[command(flatten)]
        opts: QueryOpts,
    },
}

#[derive(Debug, Args)]
struct QueryOpts {
    /// Source to query
    #[arg(long, default_value = "shodan", value_parser = ["shodan", "censys"])]
    service: String,
    /// Print the vendor payload instead of canonical entities
    #[arg(long, default_value_t = false)]
    raw: bool,
    /// Output format
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    format: OutputFormat,
    /// Also write the result to the store
    #[arg(long, default_value_t = false)]
    store: bool,
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| default.into()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr).with_target(false))
        .init();
}

fn registry(cfg: &config::Config) -> ConnectorRegistry {
    let mut registry = ConnectorRegistry::new();
    let shodan = cfg.connectors.shodan.clone();
    let censys = cfg.connectors.censys.clone();
    registry
        .register(Source::Shodan, move || {
            ShodanConnector::new(&shodan).map(|c| Box::new(c) as Box<dyn SourceConnector>)
        })
        .register(Source::Censys, move || {
            CensysConnector::new(&censys).map(|c| Box::new(c) as Box<dyn SourceConnector>)
        });
    registry
}

fn fmt_ts(ts: Option<OffsetDateTime>) -> String {
    ts.and_then(|t| t.format(&Rfc3339).ok()).unwrap_or_else(|| "-".to_string())
}

fn print_entities(entities: &[CanonicalEntity], format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(entities)?),
        OutputFormat::Text => {
            for entity in entities {
                match entity {
                    CanonicalEntity::Host(h) => {
                        let domains: Vec<&str> = h.domains.iter().map(|d| d.domain.as_str()).collect();
                        println!(
                            "{}\t{}\t{}\t{}\t{}",
                            h.ip,
                            fmt_ts(h.first_seen),
                            fmt_ts(h.last_seen),
                            h.source,
                            domains.join(",")
                        );
                    }
                    CanonicalEntity::Domain(d) => println!("{}", d.domain),
                }
            }
        }
    }
    Ok(())
}

fn print_raw(results: &[&QueryResult], format: OutputFormat) -> Result<()> {
    for r in results {
        match format {
            OutputFormat::Json => println!("{}", serde_json::to_string(r.raw())?),
            OutputFormat::Text => println!("{}", serde_json::to_string_pretty(r.raw())?),
        }
    }
    Ok(())
}

fn run_query(cfg: &config::Config, cmd: QueryCmd) -> Result<()> {
    let (opts, search) = match cmd {
        QueryCmd::Host { host, opts } => {
            let mut conn = registry(cfg).build_by_name(&opts.service)?;
            let result = Querying::host(&host, Some(conn.as_mut()))?;
            (opts, result.map(|result| Search { result, expanded: None }))
        }
        QueryCmd::Generic { query, expand, opts } => {
            let mut conn = registry(cfg).build_by_name(&opts.service)?;
            let search = Querying::search(&query, Some(conn.as_mut()), expand)?;
            (opts, search)
        }
    };
    let Some(search) = search else {
        return Err(anyhow!("no data returned by {}", opts.service));
    };

    if opts.store {
        let path = cfg.store_path();
        tracing::info!(path = %path.display(), raw = opts.raw, "storing query result");
        let mut db = Db::open_or_create(&path)?;
        db.query_output(&search.result, opts.raw)?;
        if let Some(expanded) = &search.expanded {
            for r in &expanded.results {
                db.query_output(r, opts.raw)?;
            }
        }
    }

    if opts.raw {
        let mut results = vec![&search.result];
        if let Some(expanded) = &search.expanded {
            results.extend(expanded.results.iter());
        }
        print_raw(&results, opts.format)
    } else {
        print_entities(&search.canonical_entities()?, opts.format)
    }
}

fn run_track(
    cfg: &config::Config,
    definitions: Option<PathBuf>,
    once: bool,
    interval: Option<u64>,
    notify: Option<PathBuf>,
) -> Result<()> {
    let definitions = definitions.unwrap_or_else(|| cfg.definitions_path());
    let connectors = registry(cfg).build_all();
    if connectors.is_empty() {
        return Err(anyhow!("no source connector could be initialized; check the connectors section of the config"));
    }
    let db = Db::open_or_create(cfg.store_path())?;
    let interval = interval.or(cfg.tracking.interval_secs).map(Duration::from_secs).unwrap_or(tracking::engine::DEFAULT_INTERVAL);

    tracing::info!(
        definitions = %definitions.display(),
        interval_secs = interval.as_secs(),
        connectors = connectors.len(),
        once,
        "starting tracker"
    );
    let mut tracker = Tracker::new(definitions, connectors, db).with_interval(interval);
    tracker = match notify.or_else(|| cfg.tracking.notification_file.clone()) {
        Some(path) => tracker.with_notifier(Box::new(FileNotifier::new(path))),
        None => tracker.with_notifier(Box::new(LogNotifier)),
    };
    let mode = if once { RunMode::Once } else { RunMode::Continuous };
    tracker.run(mode)?;
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    let cfg = config::load_config(cli.config.as_deref())?;
    match cli.command {
        Commands::Version => {
            println!("pivottrack {} (core {})", env!("CARGO_PKG_VERSION"), pivottrack_core::version());
        }
        Commands::Query { cmd } => run_query(&cfg, cmd)?,
        Commands::Track { definitions, once, interval, notify } => run_track(&cfg, definitions, once, interval, notify)?,
        Commands::Definitions { definitions } => {
            let path = definitions.unwrap_or_else(|| cfg.definitions_path());
            for def in load_definition_files(&path)? {
                let sources: Vec<String> = def.sources().iter().map(Source::to_string).collect();
                println!("{}\t{}\t{}", def.uuid, def.title.as_deref().unwrap_or("-"), sources.join(","));
            }
        }
    }
    Ok(())
}
