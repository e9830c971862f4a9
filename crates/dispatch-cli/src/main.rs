use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing::debug;
use tracing_subscriber::EnvFilter;

use dispatch_core::{score_at, FixedClock, GeoPoint, Subtree};
use dispatch_runtime::{load_script, Config, Runtime};

#[derive(Parser)]
#[command(name = "dispatch", version)]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Write a default dispatch.toml
    Init {
        #[arg(long)]
        path: Option<PathBuf>,
        /// Overwrite an existing file
        #[arg(long, default_value_t = false)]
        force: bool,
    },

    /// Print the effective configuration
    Config {
        #[arg(long)]
        path: Option<PathBuf>,
    },

    /// Replay an event script against in-memory stores and print the result
    Replay {
        script: PathBuf,
        #[arg(long)]
        config: Option<PathBuf>,
        /// Deliver every event twice
        #[arg(long, default_value_t = false)]
        duplicate: bool,
    },

    /// Score one order against one agent position
    Score {
        #[arg(long)]
        created_at_ms: i64,
        #[arg(long, allow_hyphen_values = true)]
        order_lat: f64,
        #[arg(long, allow_hyphen_values = true)]
        order_lng: f64,
        #[arg(long, allow_hyphen_values = true)]
        agent_lat: f64,
        #[arg(long, allow_hyphen_values = true)]
        agent_lng: f64,
        /// Defaults to the current time
        #[arg(long)]
        now_ms: Option<i64>,
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

fn config_path(path: Option<PathBuf>) -> anyhow::Result<PathBuf> {
    match path {
        Some(p) => Ok(p),
        None => Ok(Config::default_path(&std::env::current_dir()?)),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_env_filter(EnvFilter::from_default_env()).init();

    let cli = Cli::parse();

    match cli.cmd {
        Command::Init { path, force } => {
            let path = config_path(path)?;
            if path.exists() && !force {
                anyhow::bail!("{} already exists (use --force to overwrite)", path.display());
            }
            Config::default().save_to(&path)?;
            println!("Wrote {}", path.display());
        }
        Command::Config { path } => {
            let cfg = Config::load_or_default(&config_path(path)?)?;
            println!("{}", serde_json::to_string_pretty(&cfg)?);
        }
        Command::Replay {
            script,
            config,
            duplicate,
        } => {
            let cfg = Config::load_or_default(&config_path(config)?)?;
            let script = load_script(&script)?;
            debug!(steps = script.steps.len(), start_ms = script.start_ms, "replaying script");
            let mut rt = Runtime::in_memory(&cfg, Arc::new(FixedClock::new(script.start_ms)))?;
            if duplicate {
                rt.set_duplicate_deliveries(true);
            }
            script.run(&mut rt).await?;

            println!("Queue (dispatch order):");
            for (id, item) in rt.ranked_queue()? {
                println!(
                    "- {} [{}] priority={} {}",
                    id,
                    item.status.as_deref().unwrap_or("-"),
                    item.priority.map(|p| p.to_string()).unwrap_or_else(|| "-".into()),
                    item.address.as_deref().unwrap_or("")
                );
            }
            let active = rt.items(Subtree::Active)?;
            println!("Active: {}", active.len());
            for (id, item) in active {
                println!("- {} [{}]", id, item.status.as_deref().unwrap_or("-"));
            }
            println!("Delivery: {}", serde_json::to_string(&rt.stats())?);
            for dl in rt.dead_letters() {
                println!("Dead letter: {} after {} attempts: {}", dl.event.label(), dl.attempts, dl.error);
            }
        }
        Command::Score {
            created_at_ms,
            order_lat,
            order_lng,
            agent_lat,
            agent_lng,
            now_ms,
            config,
        } => {
            let cfg = Config::load_or_default(&config_path(config)?)?;
            let now = now_ms.unwrap_or_else(dispatch_core::now_ms);
            let score = score_at(
                now,
                created_at_ms,
                GeoPoint::new(order_lat, order_lng),
                GeoPoint::new(agent_lat, agent_lng),
                &cfg.scoring,
            );
            println!("{score}");
        }
    }

    Ok(())
}
