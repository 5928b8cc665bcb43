//! # CLI Execution Functions
//!
//! Execution logic for each subcommand, kept out of `main.rs`. Database-backed
//! commands build a Tokio runtime and block on it.

use anyhow::Result;
use brainbet::db::Database;
use brainbet::server::{self, ServeConfig};
use brainbet::{reward, RewardPolicy};
use tracing::info;

use super::{Cli, LevelAction};

fn database_url(cli: &Cli) -> Result<&str> {
    cli.database_url
        .as_deref()
        .ok_or_else(|| anyhow::anyhow!("DATABASE_URL is required (set via --database-url or env)"))
}

fn connect(cli: &Cli, rt: &tokio::runtime::Runtime) -> Result<Database> {
    let url = database_url(cli)?;
    rt.block_on(Database::connect(url, cli.db_max_connections))
}

pub fn run_serve(
    cli: &Cli,
    port: u16,
    jwt_secret: Option<&str>,
    jwt_audience: Option<String>,
    pay_invalidated_sessions: bool,
) -> Result<()> {
    let jwt_secret = jwt_secret
        .filter(|s| !s.trim().is_empty())
        .ok_or_else(|| anyhow::anyhow!("JWT_SECRET is required (set via --jwt-secret or env)"))?;
    let database_url = database_url(cli)?;

    let config = ServeConfig {
        port,
        database_url: database_url.to_string(),
        max_connections: cli.db_max_connections,
        jwt_secret: jwt_secret.to_string(),
        jwt_audience,
        policy: RewardPolicy {
            pay_invalidated_sessions,
        },
    };
    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(server::run(config))
}

pub fn run_migrate(cli: &Cli) -> Result<()> {
    let rt = tokio::runtime::Runtime::new()?;
    let database = connect(cli, &rt)?;
    rt.block_on(database.migrate())?;
    info!("schema applied");
    Ok(())
}

pub fn run_award(elapsed_seconds: i64, level: i32) -> Result<()> {
    let award = reward::award(elapsed_seconds, level);
    println!("elapsed:    {}s", elapsed_seconds.max(0));
    println!("blocks:     {}", award.full_blocks);
    println!("base:       {}", award.base_coins);
    println!("level:      {}", award.level);
    println!("multiplier: {}", award.multiplier);
    println!("earned:     {}", award.earned_coins);
    Ok(())
}

pub fn run_level(cli: &Cli, action: &LevelAction) -> Result<()> {
    let rt = tokio::runtime::Runtime::new()?;
    let database = connect(cli, &rt)?;
    match action {
        LevelAction::Get { user } => {
            let level = rt.block_on(database.get_user_level(user))?;
            println!(
                "{}: level {} ({})",
                user,
                level,
                reward::level_to_multiplier(level)
            );
        }
        LevelAction::Set { user, level } => {
            rt.block_on(database.set_user_level(user, *level))?;
            info!(user = %user, level, "level assigned");
            println!(
                "{}: level {} ({})",
                user,
                level,
                reward::level_to_multiplier(*level)
            );
        }
    }
    Ok(())
}

pub fn run_wallet(cli: &Cli, user: &str) -> Result<()> {
    let rt = tokio::runtime::Runtime::new()?;
    let database = connect(cli, &rt)?;
    let balance = rt.block_on(database.get_wallet_balance(user))?;
    println!("{}: {} coins", user, balance);
    Ok(())
}
