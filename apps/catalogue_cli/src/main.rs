use std::{path::PathBuf, process::ExitCode, sync::Arc, time::Duration};

use anyhow::Result;
use catalogue::CatalogueStore;
use chrono::{DateTime, Utc};
use clap::{Args, Parser, Subcommand};
use futures::StreamExt;
use search::{SearchConfig, SearchController, StoreQuerySink};
use serde::Serialize;
use shared::{
    domain::{Category, Item, ItemId, PatronId, Status},
    error::{CatalogueError, ErrorReport},
    lifecycle::Transition,
    protocol::ItemFilter,
};
use tokio::{
    io::{self, AsyncBufReadExt, BufReader},
    sync::broadcast::error::RecvError,
};
use tokio_stream::wrappers::LinesStream;
use tracing::warn;
use tracing_subscriber::EnvFilter;

mod config;
mod seed;

use config::load_settings;

#[derive(Parser, Debug)]
#[command(name = "catalogue", about = "Browse and circulate an in-memory library catalogue")]
struct Cli {
    /// Config file; defaults to ./catalogue.toml when present.
    #[arg(long)]
    config: Option<PathBuf>,
    /// JSON seed file; defaults to the built-in sample catalogue.
    #[arg(long)]
    seed: Option<PathBuf>,
    #[arg(long)]
    debounce_ms: Option<u64>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Args, Debug)]
struct FilterArgs {
    #[arg(long)]
    status: Option<Status>,
    #[arg(long)]
    category: Option<Category>,
    #[arg(long)]
    branch: Option<String>,
}

impl FilterArgs {
    fn into_filter(self) -> ItemFilter {
        ItemFilter {
            text: None,
            status: self.status,
            category: self.category,
            branch: self.branch,
        }
    }
}

#[derive(Serialize)]
#[serde(untagged)]
enum Output {
    Item(Item),
    Items(Vec<Item>),
    Ids(Vec<ItemId>),
}

#[derive(Subcommand, Debug)]
enum Command {
    List {
        #[arg(long)]
        text: Option<String>,
        #[command(flatten)]
        filter: FilterArgs,
    },
    Show {
        id: ItemId,
    },
    Hold {
        id: ItemId,
        #[arg(long)]
        patron: String,
        /// RFC 3339 hold deadline.
        #[arg(long)]
        until: Option<DateTime<Utc>>,
    },
    Checkout {
        id: ItemId,
        #[arg(long)]
        patron: String,
    },
    CancelHold {
        id: ItemId,
    },
    ExpireHolds {
        #[arg(long)]
        now: Option<DateTime<Utc>>,
    },
    Return {
        id: ItemId,
        #[arg(long)]
        branch: Option<String>,
    },
    /// Reads one keystroke value per stdin line and prints every committed result set.
    Search {
        /// Delay inserted after each line, to mimic typing speed.
        #[arg(long, default_value_t = 0)]
        interval_ms: u64,
        #[command(flatten)]
        filter: FilterArgs,
    },
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    let mut settings = load_settings(cli.config.as_deref())?;
    if let Some(seed) = cli.seed {
        settings.seed_path = Some(seed);
    }
    if let Some(debounce_ms) = cli.debounce_ms {
        settings.debounce_ms = debounce_ms;
    }

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&settings.log_filter));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let store = Arc::new(seed::open_store(settings.seed_path.as_deref())?);

    let outcome = match cli.command {
        Command::List { text, filter } => {
            let filter = ItemFilter {
                text,
                ..filter.into_filter()
            };
            Ok(Some(Output::Items(store.query(&filter))))
        }
        Command::Show { id } => store
            .get(id)
            .map(|item| Some(Output::Item(item)))
            .ok_or(CatalogueError::NotFound(id)),
        Command::Hold { id, patron, until } => PatronId::new(patron)
            .map(|patron| match until {
                Some(until) => Transition::hold_until(patron, until),
                None => Transition::hold(patron),
            })
            .and_then(|hold| store.apply_transition(id, &hold))
            .map(|item| Some(Output::Item(item))),
        Command::Checkout { id, patron } => PatronId::new(patron)
            .and_then(|patron| store.apply_transition(id, &Transition::checkout(patron)))
            .map(|item| Some(Output::Item(item))),
        Command::CancelHold { id } => store
            .apply_transition(id, &Transition::CancelHold)
            .map(|item| Some(Output::Item(item))),
        Command::Return { id, branch } => store
            .apply_transition(id, &Transition::Return { branch })
            .map(|item| Some(Output::Item(item))),
        Command::ExpireHolds { now } => Ok(Some(Output::Ids(
            store.expire_holds(now.unwrap_or_else(Utc::now)),
        ))),
        Command::Search {
            interval_ms,
            filter,
        } => {
            run_search(
                store,
                SearchConfig::from_millis(settings.debounce_ms),
                filter.into_filter(),
                Duration::from_millis(interval_ms),
            )
            .await?;
            Ok(None)
        }
    };

    match outcome {
        Ok(output) => {
            if let Some(output) = output {
                print_json(&output)?;
            }
            Ok(ExitCode::SUCCESS)
        }
        Err(error) => {
            print_json(&ErrorReport::from(&error))?;
            Ok(ExitCode::FAILURE)
        }
    }
}

async fn run_search(
    store: Arc<CatalogueStore>,
    config: SearchConfig,
    base: ItemFilter,
    interval: Duration,
) -> Result<()> {
    let sink = StoreQuerySink::with_filter(store, base);
    let mut results = sink.subscribe();
    let controller = SearchController::spawn(config, sink);

    let printer = tokio::spawn(async move {
        loop {
            match results.recv().await {
                Ok(rendered) => {
                    if let Err(error) = print_json(&rendered) {
                        warn!(%error, "failed to print search results");
                    }
                }
                Err(RecvError::Lagged(skipped)) => warn!(skipped, "search results dropped"),
                Err(RecvError::Closed) => break,
            }
        }
    });

    let lines = LinesStream::new(BufReader::new(io::stdin()).lines())
        .filter_map(|line| async move {
            match line {
                Ok(line) => Some(line),
                Err(error) => {
                    warn!(%error, "failed to read stdin");
                    None
                }
            }
        })
        .then(move |line| async move {
            if !interval.is_zero() {
                tokio::time::sleep(interval).await;
            }
            line
        });
    controller.run_stream(lines).await;
    controller.finish().await;

    printer.await?;
    Ok(())
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
