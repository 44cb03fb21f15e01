mod summary;
mod wizard;

use std::future::Future;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use clap::{Args, Parser, Subcommand};
use mongrate_config::{AppConfig, ConfigLoader};
use mongrate_db::{LocalScriptDir, MongoStore};
use mongrate_migrator::{MigrationError, Migrator, compute_hash};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "mongrate", version, about = "Apply run-once scripts to MongoDB")]
struct Cli {
    /// Config file (YAML or TOML). Defaults to the user config directory.
    #[arg(long, short, global = true, env = "MONGRATE_CONFIG")]
    config: Option<PathBuf>,

    /// Log filter used when RUST_LOG is unset, e.g. `debug`.
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Emit logs as JSON lines.
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Execute every pending script and record it.
    Run(TargetArgs),
    /// Show applied and pending scripts without executing anything.
    Status {
        #[command(flatten)]
        target: TargetArgs,
        /// Print the plan as JSON.
        #[arg(long)]
        json: bool,
    },
    /// Print the content hash recorded for each file.
    Hash {
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
    /// Write a starter config file.
    Init {
        #[arg(long)]
        force: bool,
    },
}

#[derive(Args, Debug, Default)]
struct TargetArgs {
    /// Directory holding the migration scripts.
    #[arg(long, short)]
    dir: Option<PathBuf>,

    /// MongoDB connection string.
    #[arg(long)]
    uri: Option<String>,

    /// Database name.
    #[arg(long)]
    database: Option<String>,

    /// History collection suffix; history goes to `_migration_<suffix>`.
    #[arg(long)]
    suffix: Option<String>,

    /// Fail when an applied script is visited after a pending one.
    #[arg(long, conflicts_with = "lenient")]
    strict: bool,

    /// Skip the order check.
    #[arg(long)]
    lenient: bool,

    /// Abort if the whole run takes longer than this many seconds. Script
    /// files are read with blocking I/O, so a hung script directory is not
    /// interrupted by this deadline; only database waits are.
    #[arg(long, value_name = "SECS")]
    timeout: Option<u64>,
}

impl TargetArgs {
    fn apply(&self, config: &mut AppConfig) {
        if let Some(dir) = &self.dir {
            config.migration.scripts_dir = dir.clone();
        }
        if let Some(uri) = &self.uri {
            config.database.uri = uri.clone();
        }
        if let Some(database) = &self.database {
            config.database.name = database.clone();
        }
        if let Some(suffix) = &self.suffix {
            config.migration.collection_suffix = (!suffix.is_empty()).then(|| suffix.clone());
        }
        if self.strict {
            config.migration.fail_on_order_mismatch = true;
        }
        if self.lenient {
            config.migration.fail_on_order_mismatch = false;
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    match dispatch(cli).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn dispatch(cli: Cli) -> Result<ExitCode> {
    let Cli {
        config,
        log_level,
        json_logs,
        command,
    } = cli;
    let overrides = LogOverrides {
        level: log_level,
        json: json_logs,
    };

    match command {
        Command::Init { force } => {
            init_tracing(overrides.level.as_deref().unwrap_or("info"), overrides.json);
            let path = config.unwrap_or_else(ConfigLoader::default_config_path);
            wizard::run_init(&path, force)?;
            Ok(ExitCode::SUCCESS)
        }
        Command::Hash { files } => {
            for file in &files {
                println!("{}  {}", hash_file(file)?, file.display());
            }
            Ok(ExitCode::SUCCESS)
        }
        Command::Run(target) => {
            let config = load_config(config.as_deref(), &overrides, &target)?;
            run(&config, target.timeout).await
        }
        Command::Status { target, json } => {
            let config = load_config(config.as_deref(), &overrides, &target)?;
            status(&config, target.timeout, json).await
        }
    }
}

/// Logging flags given on the command line.
struct LogOverrides {
    level: Option<String>,
    json: bool,
}

fn load_config(path: Option<&Path>, log: &LogOverrides, target: &TargetArgs) -> Result<AppConfig> {
    let mut config = ConfigLoader::load_or_default(path).context("failed to load config")?;
    target.apply(&mut config);
    if let Some(level) = &log.level {
        config.log.level = level.clone();
    }
    if log.json {
        config.log.json = true;
    }
    init_tracing(&config.log.level, config.log.json);
    Ok(config)
}

fn init_tracing(level: &str, json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

async fn connect(config: &AppConfig) -> Result<MongoStore> {
    MongoStore::connect(
        &config.database.uri,
        &config.database.name,
        config.database.app_name.as_deref(),
    )
    .await
    .context("failed to connect to database")
}

async fn run(config: &AppConfig, timeout: Option<u64>) -> Result<ExitCode> {
    let store = connect(config).await?;
    let source = LocalScriptDir::new(&config.migration.scripts_dir);
    let migrator = Migrator::new(&source, &store)
        .fail_on_order_mismatch(config.migration.fail_on_order_mismatch)
        .collection_suffix(config.migration.collection_suffix.as_deref());

    info!(
        "migrating {} from {}",
        config.database.name,
        config.migration.scripts_dir.display()
    );
    match with_deadline(timeout, migrator.run()).await? {
        Ok(report) => {
            for script in &report.applied {
                println!("applied  {script}");
            }
            println!(
                "{} applied, {} already up to date",
                report.applied.len(),
                report.skipped.len()
            );
            Ok(ExitCode::SUCCESS)
        }
        Err(err) => {
            error!(code = %err.code(), "{err}");
            Ok(exit_code(&err))
        }
    }
}

async fn status(config: &AppConfig, timeout: Option<u64>, json: bool) -> Result<ExitCode> {
    let store = connect(config).await?;
    let source = LocalScriptDir::new(&config.migration.scripts_dir);
    let migrator = Migrator::new(&source, &store)
        .fail_on_order_mismatch(config.migration.fail_on_order_mismatch)
        .collection_suffix(config.migration.collection_suffix.as_deref());

    match with_deadline(timeout, migrator.plan()).await? {
        Ok(plan) if json => {
            println!("{}", serde_json::to_string_pretty(&plan)?);
            Ok(ExitCode::SUCCESS)
        }
        Ok(plan) => {
            summary::print_status(config, migrator.collection(), &plan);
            Ok(ExitCode::SUCCESS)
        }
        Err(err) => {
            error!(code = %err.code(), "{err}");
            Ok(exit_code(&err))
        }
    }
}

/// Bound `fut` by `secs`. The deadline is only observed when `fut` yields, so
/// blocking file reads inside the engine run past it.
async fn with_deadline<T>(secs: Option<u64>, fut: impl Future<Output = T>) -> Result<T> {
    match secs {
        Some(secs) => tokio::time::timeout(Duration::from_secs(secs), fut)
            .await
            .map_err(|_| anyhow!("migration did not finish within {secs}s")),
        None => Ok(fut.await),
    }
}

fn hash_file(path: &Path) -> Result<String> {
    let file =
        std::fs::File::open(path).with_context(|| format!("failed to open {}", path.display()))?;
    compute_hash(file).with_context(|| format!("failed to read {}", path.display()))
}

/// The process exit status carries the error's flag mask.
fn exit_status(err: &MigrationError) -> u8 {
    match u8::try_from(err.code().bits()) {
        Ok(0) | Err(_) => 1,
        Ok(bits) => bits,
    }
}

fn exit_code(err: &MigrationError) -> ExitCode {
    ExitCode::from(exit_status(err))
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;
    use mongrate_migrator::{ErrorCode, MigrationError};

    use super::*;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn target_flags_override_config() {
        let cli = Cli::parse_from([
            "mongrate",
            "run",
            "--dir",
            "db/migrations",
            "--database",
            "orders",
            "--suffix",
            "billing",
            "--strict",
        ]);
        let Command::Run(target) = cli.command else {
            panic!("expected run");
        };

        let mut config = AppConfig::default();
        target.apply(&mut config);
        assert_eq!(config.migration.scripts_dir, PathBuf::from("db/migrations"));
        assert_eq!(config.database.name, "orders");
        assert_eq!(config.migration.collection_suffix.as_deref(), Some("billing"));
        assert!(config.migration.fail_on_order_mismatch);
    }

    #[test]
    fn lenient_flag_disables_order_check() {
        let cli = Cli::parse_from(["mongrate", "status", "--lenient", "--json"]);
        let Command::Status { target, json } = cli.command else {
            panic!("expected status");
        };
        assert!(json);

        let mut config = AppConfig::default();
        config.migration.fail_on_order_mismatch = true;
        target.apply(&mut config);
        assert!(!config.migration.fail_on_order_mismatch);
    }

    #[test]
    fn strict_and_lenient_conflict() {
        assert!(Cli::try_parse_from(["mongrate", "run", "--strict", "--lenient"]).is_err());
    }

    #[test]
    fn hash_requires_a_file() {
        assert!(Cli::try_parse_from(["mongrate", "hash"]).is_err());
    }

    #[test]
    fn hash_file_matches_engine_hash() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("001_init.js");
        std::fs::write(&path, "abc").unwrap();
        assert_eq!(hash_file(&path).unwrap(), "900150983cd24fb0d6963f7d28e17f72");
    }

    #[test]
    fn exit_code_follows_error_flags() {
        let err = MigrationError::new(ErrorCode::ORDER_FAILED, "order");
        assert_eq!(exit_status(&err), 0x08);

        let err = MigrationError::new(
            ErrorCode::DB_ACCESS | ErrorCode::DB_OPERATION,
            "history unreadable",
        );
        assert_eq!(exit_status(&err), 0x06);

        let err = MigrationError::new(ErrorCode::default(), "unknown");
        assert_eq!(exit_status(&err), 1);
    }

    #[test]
    fn timeout_help_states_blocking_read_limit() {
        let cli = Cli::command();
        let run = cli.find_subcommand("run").unwrap();
        let timeout = run
            .get_arguments()
            .find(|arg| arg.get_id() == "timeout")
            .unwrap();
        let help = timeout.get_help().unwrap().to_string();
        assert!(help.contains("hung script directory is not"));
    }

    #[tokio::test]
    async fn deadline_expires() {
        let result = with_deadline(Some(0), std::future::pending::<()>()).await;
        assert!(result.is_err());

        let value = with_deadline(None, async { 7 }).await.unwrap();
        assert_eq!(value, 7);
    }
}
