// src/main.rs
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use infinity_stats::{
    config::load_config, utils::setup_logging, BotStats, InfinityClient, ShardId,
};
use log::{info, LevelFilter};
use serde_json::Value;

#[derive(Parser, Debug)]
#[command(name = "infinity-stats", version, about = "Infinity Bot List stats poster")]
struct Cli {
    /// Log at debug level
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    #[command(flatten)]
    Api(ApiCommand),
    /// Spread totals evenly over shards 0..N and print the analysis (offline)
    Report {
        #[arg(long)]
        servers: u64,
        #[arg(long)]
        users: u64,
        #[arg(long)]
        shards: ShardId,
    },
}

/// Commands that talk to the Infinity API
#[derive(Subcommand, Debug)]
enum ApiCommand {
    /// Post bot-wide statistics
    Post {
        #[arg(long)]
        servers: u64,
        #[arg(long)]
        users: Option<u64>,
        #[arg(long)]
        shards: Option<u64>,
        /// Comma separated shard ids
        #[arg(long, value_delimiter = ',')]
        shard_list: Option<Vec<ShardId>>,
    },
    /// Post statistics for one shard
    PostShard {
        shard_id: ShardId,
        #[arg(long)]
        servers: u64,
        #[arg(long)]
        users: Option<u64>,
    },
    /// Show this bot's listing
    BotInfo,
    /// Show a user's profile
    UserInfo { user_id: String },
    /// Show what the list knows about one shard
    ShardInfo { shard_id: ShardId },
    /// Show every shard
    Shards,
}

fn print_json(value: &Value) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let level = if cli.verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    setup_logging(level).context("Failed to initialize logging")?;

    match cli.command {
        Command::Report {
            servers,
            users,
            shards,
        } => {
            let shard_ids: Vec<ShardId> = (0..shards).collect();
            let stats = infinity_stats::calculate_shard_stats(servers, users, &shard_ids);
            println!("{}", infinity_stats::generate_shard_report(&stats));
            Ok(())
        }
        Command::Api(command) => run_api(command).await,
    }
}

async fn run_api(command: ApiCommand) -> Result<()> {
    // One-shot commands have no use for the hourly refresh.
    let config = load_config()?.with_auto_refresh(false);
    let client = InfinityClient::with_config(config);

    let response = client
        .with_session(|client| async move {
            match command {
                ApiCommand::Post {
                    servers,
                    users,
                    shards,
                    shard_list,
                } => {
                    let stats = BotStats {
                        server_count: servers,
                        user_count: users,
                        shard_count: shards,
                        shard_list,
                    };
                    client.post_bot_stats(stats).await
                }
                ApiCommand::PostShard {
                    shard_id,
                    servers,
                    users,
                } => client.post_shard_stats(shard_id, servers, users).await,
                ApiCommand::BotInfo => client.get_bot_info().await,
                ApiCommand::UserInfo { user_id } => client.get_user_info(&user_id).await,
                ApiCommand::ShardInfo { shard_id } => client.get_shard_info(shard_id).await,
                ApiCommand::Shards => client.get_all_shard_info().await,
            }
        })
        .await?;

    print_json(&response)?;

    let rate_limit = client.get_rate_limit_info();
    info!(
        "📊 Rate limit: {} requests remaining, resets in {:.0}s",
        rate_limit.remaining, rate_limit.reset_in_seconds
    );
    Ok(())
}
