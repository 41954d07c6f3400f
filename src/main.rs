//! Habit Planner
//!
//! Serves the task/habit planner REST API, or runs one planner operation
//! from the command line against the same database.

use anyhow::{Context, Result};
use clap::Parser;
use habit_planner::api::{parse_date, start_server};
use habit_planner::cli::{AddArgs, Cli, Command, CompleteArgs, ListArgs, ServeArgs};
use habit_planner::clock::{SystemClock, offset_from_minutes};
use habit_planner::config::Config;
use habit_planner::db::Database;
use habit_planner::format::{format_listing, format_task_markdown};
use habit_planner::planner::{Planner, to_response};
use habit_planner::types::NewTask;
use std::fs::OpenOptions;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{Level, info};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// Initialize logging based on `--log` and `--verbose`.
///
/// `RUST_LOG` takes precedence over the verbosity flag when set.
fn init_logging(cli: &Cli) -> Result<()> {
    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    let filter = || {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.as_str()))
    };

    match cli.log.as_str() {
        "0" | "off" => {
            // No logging
        }
        "1" | "stdout" => {
            let subscriber = FmtSubscriber::builder()
                .with_env_filter(filter())
                .with_writer(std::io::stdout)
                .finish();
            tracing::subscriber::set_global_default(subscriber)?;
        }
        "2" | "stderr" => {
            let subscriber = FmtSubscriber::builder()
                .with_env_filter(filter())
                .with_writer(std::io::stderr)
                .finish();
            tracing::subscriber::set_global_default(subscriber)?;
        }
        filename => {
            // Log to file (append mode)
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(filename)
                .with_context(|| format!("opening log file {}", filename))?;
            let subscriber = FmtSubscriber::builder()
                .with_env_filter(filter())
                .with_writer(file)
                .with_ansi(false)
                .finish();
            tracing::subscriber::set_global_default(subscriber)?;
        }
    }
    Ok(())
}

fn parse_date_arg(raw: Option<&str>) -> Result<Option<chrono::NaiveDate>> {
    raw.map(|s| {
        parse_date("date", s)
            .map_err(anyhow::Error::from)
            .with_context(|| format!("invalid --date '{}'", s))
    })
    .transpose()
}

async fn serve(planner: Arc<Planner>, config: &Config, args: ServeArgs) -> Result<()> {
    let host = args.host.unwrap_or_else(|| config.server.host.clone());
    let port = args.port.unwrap_or(config.server.port);
    let addr: SocketAddr = format!("{}:{}", host, port)
        .parse()
        .with_context(|| format!("invalid listen address {}:{}", host, port))?;

    let (shutdown_tx, bound_addr) = start_server(planner, addr).await?;
    info!(addr = %bound_addr, "Habit planner ready");

    tokio::signal::ctrl_c().await?;
    info!("Shutdown requested");
    let _ = shutdown_tx.send(());
    Ok(())
}

fn list(planner: &Planner, args: ListArgs) -> Result<()> {
    let date = parse_date_arg(args.date.as_deref())?;
    let listing = planner.list_for_date(&args.user, date)?;
    println!("{}", format_listing(&listing, args.format)?);
    Ok(())
}

fn add(planner: &Planner, args: AddArgs) -> Result<()> {
    let input = NewTask {
        title: args.title,
        kind: args.kind.into(),
        category: args.category,
        start_time: args.start_time,
        duration_minutes: args.duration,
        repeat: args.repeat.into(),
        scheduled_date: parse_date_arg(args.date.as_deref())?,
    };
    let task = planner.create_task(&args.user, input)?;
    print!("{}", format_task_markdown(&to_response(&task)));
    Ok(())
}

fn complete(planner: &Planner, args: CompleteArgs) -> Result<()> {
    let task = planner.set_completion(&args.user, &args.id, !args.undo)?;
    print!("{}", format_task_markdown(&to_response(&task)));
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli)?;

    let mut config = Config::load_or_default(cli.config.as_deref())?;
    if let Some(db_path) = &cli.database {
        config.server.db_path = db_path.clone();
    }
    config.ensure_db_dir()?;

    let db = Database::open(&config.server.db_path).with_context(|| {
        format!("opening database {}", config.server.db_path.display())
    })?;
    let clock = SystemClock::new(offset_from_minutes(config.planner.utc_offset_minutes));
    let planner = Arc::new(Planner::new(
        Arc::new(db),
        Arc::new(clock),
        config.planner.settings(),
    ));

    match cli
        .command
        .unwrap_or_else(|| Command::Serve(ServeArgs::default()))
    {
        Command::Serve(args) => serve(planner, &config, args).await,
        Command::List(args) => list(&planner, args),
        Command::Add(args) => add(&planner, args),
        Command::Complete(args) => complete(&planner, args),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn date_flag_is_as_strict_as_the_api() {
        assert_eq!(
            parse_date_arg(Some("2024-01-10")).unwrap(),
            chrono::NaiveDate::from_ymd_opt(2024, 1, 10)
        );
        assert_eq!(parse_date_arg(None).unwrap(), None);
        assert!(parse_date_arg(Some("2024-1-10")).is_err());
        assert!(parse_date_arg(Some("2024-02-30")).is_err());
    }
}
