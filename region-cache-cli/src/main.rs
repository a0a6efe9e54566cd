use anyhow::{Context, Result};
use clap::Parser;
use colored::Colorize;
use region_cache::{
    CacheConfig, Lookup, QueryCache, RegionCache, RegionCacheFactory, SizeScope, StoreBackend,
    WriteOutcome, init_logging,
};
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use serde_json::Value;
use std::path::PathBuf;
use std::time::Instant;
use tracing::debug;

#[derive(Parser, Debug)]
#[command(name = "region-cache-cli")]
#[command(about = "Region cache CLI - inspect and edit cached query regions", long_about = None)]
struct Args {
    /// YAML configuration file
    #[arg(short = 'c', long)]
    config: Option<PathBuf>,

    /// Use a process-local in-memory store instead of the configured backend
    #[arg(long)]
    memory: bool,

    /// Override the store URL from the configuration
    #[arg(short = 'u', long)]
    url: Option<String>,

    /// Region to operate on
    #[arg(short = 'r', long, default_value = "default")]
    region: String,

    /// Report the size of the region only instead of the whole store
    #[arg(long)]
    region_size: bool,

    /// Override the log level from the configuration (e.g. warn, debug)
    #[arg(long)]
    log_level: Option<String>,

    /// Command to execute (if not in interactive mode)
    #[arg(trailing_var_arg = true)]
    command: Vec<String>,
}

struct Session {
    factory: RegionCacheFactory,
    cache: RegionCache,
    target: String,
}

/// Configuration file (or defaults) with the command-line overrides applied
fn load_config(args: &Args) -> Result<CacheConfig> {
    let mut config = match &args.config {
        Some(path) => CacheConfig::from_file(path)
            .with_context(|| format!("Failed to load {}", path.display()))?,
        None => CacheConfig::default(),
    };
    if args.memory {
        config.store.backend = StoreBackend::Memory;
    }
    if let Some(url) = &args.url {
        config.store.url = url.clone();
    }
    if args.region_size {
        config.cache.size_scope = SizeScope::Region;
    }
    if let Some(level) = &args.log_level {
        config.logging.level = level.clone();
    }
    Ok(config)
}

impl Session {
    fn open(config: &CacheConfig, region: &str) -> Result<Self> {
        let factory = RegionCacheFactory::from_config(config)
            .context("Failed to build the cache store")?;
        let cache = factory.create(region)?;

        let target = match config.store.backend {
            StoreBackend::Memory => "memory".to_string(),
            StoreBackend::Redis => config.store.url.clone(),
        };

        Ok(Self {
            factory,
            cache,
            target,
        })
    }

    fn execute_command(&mut self, command: &str, args: &[String]) -> Result<String> {
        let start = Instant::now();
        debug!(command = %command, args = args.len(), "Executing command");

        let response = match command.to_uppercase().as_str() {
            "GET" => self.cmd_get(args)?,
            "PUT" | "SET" => self.cmd_put(args)?,
            "REMOVE" | "DEL" => self.cmd_remove(args)?,
            "CLEAR" => self.cmd_clear()?,
            "SIZE" => self.cmd_size()?,
            "STATS" => self.cmd_stats()?,
            "LOCK" => self.cmd_lock()?,
            "REGION" => self.cmd_region(args)?,
            "HELP" => help_text(),
            _ => return Err(anyhow::anyhow!("Unknown command: {}", command)),
        };

        let elapsed = start.elapsed();
        Ok(format!(
            "{}\n{}",
            response,
            format!("({:.2?})", elapsed).dimmed()
        ))
    }

    fn cmd_get(&self, args: &[String]) -> Result<String> {
        let key = single_key(args, "GET key")?;

        Ok(match self.cache.lookup(key) {
            Lookup::Hit(value) => format_value(&value),
            Lookup::Miss => "(nil)".dimmed().to_string(),
            Lookup::LockBusy => format!("{} (region locked)", "(nil)".dimmed()),
            Lookup::Failed(err) => format!("{} ({})", "(nil)".dimmed(), err.to_string().red()),
        })
    }

    fn cmd_put(&self, args: &[String]) -> Result<String> {
        if args.len() < 2 {
            return Err(anyhow::anyhow!("Usage: PUT key value"));
        }

        let value = parse_value(&args[1..].join(" "));
        Ok(format_outcome(self.cache.try_put(&args[0], Some(value))))
    }

    fn cmd_remove(&self, args: &[String]) -> Result<String> {
        let key = single_key(args, "REMOVE key")?;
        Ok(format_outcome(self.cache.try_remove(key)))
    }

    fn cmd_clear(&self) -> Result<String> {
        Ok(format_outcome(self.cache.try_clear()))
    }

    fn cmd_size(&self) -> Result<String> {
        let size = self.cache.try_size()?;
        let scope = match self.cache.size_scope() {
            SizeScope::Store => "store",
            SizeScope::Region => "region",
        };
        Ok(format!("(integer) {} {}", size, format!("[{}]", scope).dimmed()))
    }

    fn cmd_stats(&self) -> Result<String> {
        let stats = self.cache.stats();
        let lock = self.cache.lock_handle().stats();

        Ok(format!(
            "{}\n  hits: {}\n  misses: {}\n  hit_rate: {:.2}%\n  puts: {}\n  removes: {}\n  clears: {}\n  lock_busy: {}\n  store_errors: {}\n{}\n  acquisitions: {}\n  releases: {}\n  contended: {}",
            format!("# Region {}", self.cache.identifier()).bold(),
            stats.hits,
            stats.misses,
            stats.hit_rate() * 100.0,
            stats.puts,
            stats.removes,
            stats.clears,
            stats.lock_busy,
            stats.store_errors,
            "# Lock".bold(),
            lock.acquisitions,
            lock.releases,
            lock.contended,
        ))
    }

    fn cmd_lock(&self) -> Result<String> {
        let lock = self.cache.lock_handle();
        let state = if lock.is_write_locked() {
            "write-locked".yellow()
        } else if lock.reader_count() > 0 {
            format!("read-locked ({} readers)", lock.reader_count()).yellow()
        } else {
            "unlocked".green()
        };
        Ok(format!("{} {}", state, format!("[{} queued]", lock.queued()).dimmed()))
    }

    fn cmd_region(&mut self, args: &[String]) -> Result<String> {
        match args.first() {
            None => Ok(format!("\"{}\"", self.cache.identifier())),
            Some(id) => {
                let scope = self.cache.size_scope();
                self.cache = self.factory.create(id.as_str())?.with_size_scope(scope);
                Ok("OK".green().to_string())
            }
        }
    }
}

fn single_key<'a>(args: &'a [String], usage: &str) -> Result<&'a str> {
    match args {
        [key] => Ok(key.as_str()),
        _ => Err(anyhow::anyhow!("Usage: {}", usage)),
    }
}

/// Values are stored as JSON; anything that does not parse is kept as a string
fn parse_value(raw: &str) -> Value {
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}

fn format_value(value: &Value) -> String {
    match value {
        Value::String(s) => format!("\"{}\"", s),
        other => serde_json::to_string_pretty(other).unwrap_or_else(|_| other.to_string()),
    }
}

fn format_outcome(outcome: WriteOutcome) -> String {
    match outcome {
        WriteOutcome::Applied { keys } => format!("{} (integer) {}", "OK".green(), keys),
        WriteOutcome::Unchanged => "(integer) 0".to_string(),
        WriteOutcome::LockBusy => "(skipped) region locked".yellow().to_string(),
        WriteOutcome::Failed(err) => format!("{} {}", "(skipped)".yellow(), err.to_string().red()),
    }
}

fn help_text() -> String {
    format!(
        r#"{}

{}
  GET key                    Read a cached value
  PUT key value              Cache a value (JSON, or plain text as a string)
  REMOVE key                 Evict one entry
  CLEAR                      Evict every entry of the current region

{}
  SIZE                       Number of entries (store or region scope)
  STATS                      Hit/miss counters and lock activity
  LOCK                       Current state of the region lock

{}
  REGION [id]                Show or switch the current region
  HELP                       Show this help message
  QUIT                       Exit the CLI
"#,
        "Region Cache CLI - Available Commands".bold().cyan(),
        "Entry Commands:".bold(),
        "Inspection Commands:".bold(),
        "Session Commands:".bold(),
    )
}

fn main() -> Result<()> {
    let args = Args::parse();
    let config = load_config(&args)?;
    init_logging(&config.logging);

    let mut session = Session::open(&config, &args.region)?;

    if !args.command.is_empty() {
        // Command mode: execute single command and exit
        let cmd = &args.command[0];
        let cmd_args: Vec<String> = args.command[1..].to_vec();

        match session.execute_command(cmd, &cmd_args) {
            Ok(output) => {
                println!("{}", output);
                Ok(())
            }
            Err(e) => {
                eprintln!("{}", format!("Error: {}", e).red());
                std::process::exit(1);
            }
        }
    } else {
        run_interactive(session)
    }
}

fn run_interactive(mut session: Session) -> Result<()> {
    println!(
        "{}",
        format!("Region Cache CLI v{}", env!("CARGO_PKG_VERSION"))
            .bold()
            .cyan()
    );
    println!("Store: {}", session.target);
    println!("Type {} for available commands\n", "HELP".bold());

    let mut rl = DefaultEditor::new()?;

    loop {
        let prompt = format!(
            "{}> ",
            format!("region {}", session.cache.identifier()).green()
        );

        match rl.readline(&prompt) {
            Ok(line) => {
                let parts: Vec<String> = line.split_whitespace().map(String::from).collect();
                let Some((cmd, args)) = parts.split_first() else {
                    continue;
                };

                rl.add_history_entry(line.as_str())?;

                if cmd.eq_ignore_ascii_case("QUIT") || cmd.eq_ignore_ascii_case("EXIT") {
                    println!("Goodbye!");
                    break;
                }

                match session.execute_command(cmd, args) {
                    Ok(output) => println!("{}", output),
                    Err(e) => eprintln!("{}", format!("Error: {}", e).red()),
                }
            }
            Err(ReadlineError::Interrupted) => {
                println!("^C");
                continue;
            }
            Err(ReadlineError::Eof) => {
                println!("Goodbye!");
                break;
            }
            Err(err) => {
                eprintln!("{}", format!("Readline error: {:?}", err).red());
                break;
            }
        }
    }

    Ok(())
}
