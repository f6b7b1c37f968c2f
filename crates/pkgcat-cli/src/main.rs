use chrono::{Local, NaiveDate};
use clap::{CommandFactory, Parser, Subcommand};
use pkgcat_core::config::{Backend, Config, StoreSettings};
use pkgcat_core::daily::DailySelector;
use pkgcat_core::record::PackageRecord;
use pkgcat_index::catalog::{set_dependents_count, set_upstream_version, Catalog};
use pkgcat_index::ingest::rebuild;
use pkgcat_index::store::{with_store, Datastore, StoreError};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

const CONFIG_ENV: &str = "PKGCAT_CONFIG";
const DEFAULT_CONFIG: &str = "pkgcat.toml";

#[derive(Debug, Parser)]
#[command(name = "pkgcat", version, about = "Catalog of binary repository packages")]
struct Cli {
    #[arg(
        short = 'c',
        long = "config",
        value_name = "PATH",
        help = "Config file (defaults to PKGCAT_CONFIG or ./pkgcat.toml)"
    )]
    config: Option<PathBuf>,
    #[arg(
        short = 'v',
        long = "verbose",
        help = "Increase verbosity",
        conflicts_with = "quiet"
    )]
    verbose: bool,
    #[arg(short = 'q', long = "quiet", help = "Suppress non-error output")]
    quiet: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Build a fresh store from repository indices and publish it")]
    Build {
        #[arg(long, value_name = "YYYY-MM-DD", help = "First date of the daily window")]
        date: Option<NaiveDate>,
    },
    #[command(about = "Show every stored row of a package")]
    Show {
        pkgname: String,
        #[arg(long = "repo", help = "Restrict to repositories (repeatable)")]
        repos: Vec<String>,
    },
    #[command(about = "Find package names containing a term")]
    Search { term: String },
    #[command(about = "List all package names")]
    List,
    #[command(about = "Most recently built packages")]
    Newest {
        #[arg(short = 'n', long, default_value_t = 20)]
        count: usize,
    },
    #[command(about = "Packages with unusually long names")]
    Longest {
        #[arg(short = 'n', long, default_value_t = 10)]
        at_most: usize,
    },
    #[command(about = "Packages of the day")]
    Daily {
        #[arg(long, value_name = "YYYY-MM-DD")]
        date: Option<NaiveDate>,
    },
    #[command(about = "Packages that only pull in dependencies")]
    Metapackages,
    #[command(about = "Record the upstream version of a package")]
    SetUpstream { pkgname: String, version: String },
    #[command(about = "Record how many packages depend on a package")]
    SetDepends { pkgname: String, count: i64 },
    #[command(about = "Print the effective configuration")]
    Config,
    #[command(about = "Generate shell completions")]
    Completions { shell: clap_complete::Shell },
}

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error("config error: {0}")]
    Config(#[from] pkgcat_core::config::ConfigError),
    #[error("store error: {0}")]
    Store(#[from] StoreError),
    #[error("missing store at {0}, run `pkgcat build` first")]
    MissingStore(PathBuf),
    #[error("package not found: {0}")]
    PackageNotFound(String),
    #[error("live store must use the sqlite backend")]
    MemoryLiveStore,
}

#[derive(Debug, Clone, Copy)]
struct Output {
    quiet: bool,
}

impl Output {
    fn info(&self, message: impl AsRef<str>) {
        if !self.quiet {
            println!("{}", message.as_ref());
        }
    }

    fn lines(&self, lines: &[String]) {
        for line in lines {
            self.info(line);
        }
    }
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.quiet);
    let output = Output { quiet: cli.quiet };
    if let Err(err) = run(cli, &output) {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}

fn init_logging(verbose: bool, quiet: bool) {
    let default = if quiet {
        "error"
    } else if verbose {
        "debug"
    } else {
        "info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .without_time()
        .try_init();
}

fn run(cli: Cli, output: &Output) -> Result<(), CliError> {
    let config = load_config(cli.config.as_deref())?;
    match cli.command {
        Command::Build { date } => {
            let today = date.unwrap_or_else(|| Local::now().date_naive());
            let summary = rebuild(&config, today)?;
            for (repo, count) in &summary.repos {
                output.info(format!("{repo}: {count} packages"));
            }
            for repo in &summary.skipped {
                output.info(format!("{repo}: skipped (no index)"));
            }
            if summary.published {
                output.info(format!(
                    "published {} packages to {}",
                    summary.packages(),
                    config.store.live.path.display()
                ));
            }
        }
        Command::Show { pkgname, repos } => {
            let rows = query(&config, |catalog| {
                if repos.is_empty() {
                    catalog.package(&pkgname)
                } else {
                    catalog.package_in_repos(&pkgname, &repos)
                }
            })?;
            if rows.is_empty() {
                return Err(CliError::PackageNotFound(pkgname));
            }
            output.lines(&rows.iter().map(describe_record).collect::<Vec<_>>());
        }
        Command::Search { term } => output.lines(&query(&config, |c| c.search(&term))?),
        Command::List => output.lines(&query(&config, |c| c.names())?),
        Command::Newest { count } => output.lines(&query(&config, |c| c.newest(count))?),
        Command::Longest { at_most } => {
            output.lines(&query(&config, |c| c.longest_names(at_most))?)
        }
        Command::Daily { date } => {
            let names = query(&config, |catalog| match date {
                Some(date) => catalog.of_day(date),
                None => catalog.today(),
            })?;
            output.lines(&names);
        }
        Command::Metapackages => output.lines(&query(&config, |c| c.metapackages())?),
        Command::SetUpstream { pkgname, version } => {
            let changed = enrich(&config, |store| {
                set_upstream_version(store, &pkgname, &version)
            })?;
            report_enriched(output, &pkgname, changed)?;
        }
        Command::SetDepends { pkgname, count } => {
            let changed = enrich(&config, |store| set_dependents_count(store, &pkgname, count))?;
            report_enriched(output, &pkgname, changed)?;
        }
        Command::Config => output.info(config.to_toml()?),
        Command::Completions { shell } => {
            let mut command = Cli::command();
            clap_complete::generate(shell, &mut command, "pkgcat", &mut std::io::stdout());
        }
    }
    Ok(())
}

fn load_config(explicit: Option<&Path>) -> Result<Config, CliError> {
    if let Some(path) = explicit {
        return Ok(Config::load_from_path(path)?);
    }
    let path = std::env::var_os(CONFIG_ENV)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG));
    if path.exists() {
        Ok(Config::load_from_path(&path)?)
    } else {
        tracing::debug!(path = %path.display(), "no config file, using defaults");
        Ok(Config::default())
    }
}

fn live_store(config: &Config) -> Result<&StoreSettings, CliError> {
    let live = config.store_settings(false);
    match live.backend {
        Backend::Memory => Err(CliError::MemoryLiveStore),
        Backend::Sqlite if !live.path.exists() => Err(CliError::MissingStore(live.path.clone())),
        Backend::Sqlite => Ok(live),
    }
}

fn query<T, F>(config: &Config, f: F) -> Result<T, CliError>
where
    F: FnOnce(&Catalog<'_>) -> Result<T, StoreError>,
{
    let live = live_store(config)?;
    let selector = DailySelector::new(config.daily.bits);
    Ok(with_store(live, selector, |store| f(&Catalog::new(store)))?)
}

fn enrich<F>(config: &Config, f: F) -> Result<usize, CliError>
where
    F: FnOnce(&mut dyn Datastore) -> Result<usize, StoreError>,
{
    let live = live_store(config)?;
    let selector = DailySelector::new(config.daily.bits);
    Ok(with_store(live, selector, f)?)
}

fn report_enriched(output: &Output, pkgname: &str, changed: usize) -> Result<(), CliError> {
    if changed == 0 {
        return Err(CliError::PackageNotFound(pkgname.to_string()));
    }
    output.info(format!("updated {changed} rows of {pkgname}"));
    Ok(())
}

fn describe_record(record: &PackageRecord) -> String {
    let mut line = format!(
        "{} {} [{}] repo={} built={}",
        record.name,
        record.version,
        record.arch,
        record.repo,
        if record.build_date.is_empty() {
            "unknown"
        } else {
            record.build_date.as_str()
        }
    );
    if !record.upstream_version.is_empty() {
        line.push_str(&format!(" upstream={}", record.upstream_version));
    }
    if let Some(count) = record.dependents_count {
        line.push_str(&format!(" dependents={count}"));
    }
    line
}
