use std::io::Write;

use chrono::Utc;
use clap::{Parser, Subcommand};
use futures::StreamExt;
use tokio_util::sync::CancellationToken;

use termiflow::app::{App, FeedQuery};
use termiflow::config::{Config, ProviderKind};
use termiflow::error::Result;
use termiflow::intelligence::ASK_MAX_SOURCES;
use termiflow::models::{FeedItem, Frequency};

#[derive(Parser)]
#[command(name = "termiflow")]
#[command(about = "Ask questions and follow topics with LLM-curated feeds", long_about = None)]
#[command(version)]
struct Cli {
    /// Show debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Override the configured LLM provider (openai, anthropic, local)
    #[arg(long, global = true, value_parser = parse_provider)]
    provider: Option<ProviderKind>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Follow a topic
    Subscribe {
        topic: String,
        /// hourly, daily, or weekly
        #[arg(short, long, value_parser = parse_frequency)]
        frequency: Option<Frequency>,
        /// Comma-separated source preferences
        #[arg(long, value_delimiter = ',')]
        sources: Vec<String>,
    },
    /// Stop following a topic and delete its items
    Unsubscribe { topic: String },
    /// Stop refreshing a topic but keep its items
    Pause { topic: String },
    /// Resume refreshing a paused topic
    Resume { topic: String },
    /// Mark every item of a topic as read
    MarkRead { topic: String },
    /// List subscriptions, or the predefined categories
    Topics {
        #[arg(short, long)]
        available: bool,
    },
    /// Show curated items
    Feed {
        #[arg(short, long)]
        topic: Option<String>,
        /// Include items already read
        #[arg(short, long)]
        all: bool,
        /// Only items fetched today
        #[arg(long)]
        today: bool,
        /// Only items fetched in the past week
        #[arg(long, conflicts_with = "today")]
        week: bool,
        #[arg(short, long)]
        limit: Option<usize>,
        /// Fetch new items first
        #[arg(short, long)]
        refresh: bool,
        /// Leave shown items unread
        #[arg(long)]
        keep_unread: bool,
        /// Remove items older than 30 days and exit
        #[arg(long)]
        cleanup: bool,
    },
    /// Fetch new items for due subscriptions, or one topic
    Refresh {
        #[arg(short, long)]
        topic: Option<String>,
    },
    /// Ask a one-off question
    Ask {
        question: String,
        /// Answer without web search grounding
        #[arg(long)]
        no_search: bool,
        /// Number of search results to ground the answer in
        #[arg(short, long, default_value_t = ASK_MAX_SOURCES)]
        sources: usize,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::WARN
    };
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()))
        .with_writer(std::io::stderr)
        .init();

    let cancel = CancellationToken::new();
    tokio::spawn({
        let cancel = cancel.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                cancel.cancel();
            }
        }
    });

    let config = Config::load()?;
    let app = App::new(config, cli.provider).await?;

    if let Err(e) = run(&app, cli.command, &cancel).await {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
    Ok(())
}

async fn run(app: &App, command: Commands, cancel: &CancellationToken) -> Result<()> {
    match command {
        Commands::Subscribe {
            topic,
            frequency,
            sources,
        } => {
            let sub = app.subscribe(&topic, frequency, sources).await?;
            println!("Subscribed to {} ({})", sub.topic, sub.frequency);
            if let Some(category) = &sub.category {
                println!("  category: {}", category);
            }
            println!("  sources: {}", sub.sources.join(", "));
            println!("Run `termiflow refresh --topic {:?}` to fetch items now.", sub.topic);
        }

        Commands::Unsubscribe { topic } => {
            app.unsubscribe(&topic).await?;
            println!("Unsubscribed from {}", topic);
        }

        Commands::Pause { topic } => {
            app.set_active(&topic, false).await?;
            println!("Paused {}", topic);
        }

        Commands::Resume { topic } => {
            app.set_active(&topic, true).await?;
            println!("Resumed {}", topic);
        }

        Commands::MarkRead { topic } => {
            app.mark_topic_read(&topic).await?;
            println!("Marked all {} items as read", topic);
        }

        Commands::Topics { available } => {
            if available {
                for category in app.available_categories().await? {
                    println!("{:<22} {}", category.name, category.description);
                }
            } else {
                let topics = app.topics().await?;
                if topics.is_empty() {
                    println!("No subscriptions. See `termiflow topics --available`.");
                }
                let now = Utc::now();
                for t in topics {
                    let last = t
                        .subscription
                        .last_fetched_at
                        .map(|at| format!("{}m ago", (now - at).num_minutes()))
                        .unwrap_or_else(|| "never".to_string());
                    println!(
                        "{:<24} {:<8} {:>3} unread / {:>3} total  fetched {}{}",
                        t.subscription.topic,
                        t.subscription.frequency,
                        t.unread_items,
                        t.total_items,
                        last,
                        if t.subscription.is_active { "" } else { "  (paused)" }
                    );
                }
            }
        }

        Commands::Feed {
            topic,
            all,
            today,
            week,
            limit,
            refresh,
            keep_unread,
            cleanup,
        } => {
            if cleanup {
                let removed = app.cleanup().await?;
                println!("Removed {} old items", removed);
                return Ok(());
            }

            if !app.has_active_subscriptions().await? {
                println!("No active subscriptions. Start with `termiflow subscribe <topic>`.");
                return Ok(());
            }

            if refresh {
                let refreshed = match &topic {
                    Some(topic) => app.refresh_topic(topic, cancel).await.map(|_| ()),
                    None => app.refresh_due(cancel).await.map(|_| ()),
                };
                if let Err(e) = refreshed {
                    eprintln!("Refresh failed: {}", e);
                }
            }

            let query = FeedQuery {
                topic,
                include_read: all,
                today,
                week,
                limit,
            };
            let items = app.feed(query, !keep_unread).await?;
            if items.is_empty() {
                println!("No new items. Run `termiflow feed --refresh` to fetch updates.");
            }
            let now = Utc::now();
            for item in &items {
                print_item(item, now);
            }
        }

        Commands::Refresh { topic } => match topic {
            Some(topic) => {
                let items = app.refresh_topic(&topic, cancel).await?;
                println!("{}: {} curated items", topic, items.len());
            }
            None => {
                let summary = app.refresh_due(cancel).await?;
                println!(
                    "Refreshed {} subscriptions ({} items), {} not due, {} failed",
                    summary.refreshed, summary.items, summary.skipped, summary.failed
                );
            }
        },

        Commands::Ask {
            question,
            no_search,
            sources,
        } => {
            if !no_search && sources > 0 && app.can_search() {
                let result = app.ask(&question, true, sources, cancel).await?;
                println!("{}", result.answer.trim());
                if !result.sources.is_empty() {
                    println!("\nSources:");
                    for (i, source) in result.sources.iter().enumerate() {
                        println!("  [{}] {} - {}", i + 1, source.title, source.url);
                    }
                }
            } else {
                let mut stream = app.ask_streaming(&question, cancel).await?;
                let mut stdout = std::io::stdout();
                while let Some(chunk) = stream.next().await {
                    match chunk {
                        Ok(text) => {
                            write!(stdout, "{}", text)?;
                            stdout.flush()?;
                        }
                        Err(e) => {
                            writeln!(stdout)?;
                            return Err(e);
                        }
                    }
                }
                writeln!(stdout)?;
            }
        }
    }

    Ok(())
}

fn print_item(item: &FeedItem, now: chrono::DateTime<Utc>) {
    println!("{}", item.title);
    println!("  {} · {} · {:.2}", item.source_name, item.time_ago(now), item.relevance_score);
    if !item.summary.is_empty() {
        println!("  {}", item.summary);
    }
    if !item.tags.is_empty() {
        let tags: Vec<String> = item.tags.iter().map(|t| format!("#{}", t)).collect();
        println!("  {}", tags.join(" "));
    }
    println!("  {}\n", item.source_url);
}

fn parse_provider(s: &str) -> std::result::Result<ProviderKind, String> {
    match s.to_lowercase().as_str() {
        "openai" => Ok(ProviderKind::OpenAi),
        "anthropic" | "claude" => Ok(ProviderKind::Anthropic),
        "local" | "ollama" => Ok(ProviderKind::Local),
        other => Err(format!("unknown provider {:?}", other)),
    }
}

fn parse_frequency(s: &str) -> std::result::Result<Frequency, String> {
    match Frequency::from(s.to_lowercase().as_str()) {
        Frequency::Other(other) => Err(format!(
            "unknown frequency {:?} (expected hourly, daily, or weekly)",
            other
        )),
        frequency => Ok(frequency),
    }
}
