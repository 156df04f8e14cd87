use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use chrono::Utc;
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use scopegate::config::{self, Config, LogFormat};
use scopegate::errors::AppError;
use scopegate::middleware::gate::TokenGate;
use scopegate::models::token::{generate_access_token, Token};
use scopegate::resolver::cached::CachedResolver;
use scopegate::store::memory::MemoryStore;
use scopegate::store::postgres::PgStore;
use scopegate::store::{Backend, TokenStore};

mod cli;

type Gate = TokenGate<CachedResolver<Arc<dyn Backend>>, Arc<dyn Backend>>;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cfg = config::load()?;
    init_tracing(cfg.log_format);

    let args = cli::Cli::parse();

    let backend: Arc<dyn Backend> = match cfg.database_url.as_deref() {
        Some(url) => {
            tracing::info!("Connecting to database...");
            Arc::new(PgStore::connect(url, &cfg.public_schema_name).await?)
        }
        None => {
            tracing::warn!("DATABASE_URL not set, tokens are kept in memory and lost on exit");
            Arc::new(MemoryStore::new(&cfg.public_schema_name))
        }
    };

    let resolver = CachedResolver::new(
        backend.clone(),
        Duration::from_secs(cfg.schema_cache_ttl),
    );
    let gate = TokenGate::new(resolver, backend);

    let result = match args.command {
        cli::Commands::Token { command } => handle_token_command(command, &gate, &cfg).await,
    };

    if let Err(ref e) = result {
        eprintln!("Error: {:?}", e);
    }
    result
}

fn init_tracing(format: LogFormat) {
    let filter = tracing_subscriber::EnvFilter::new(
        std::env::var("RUST_LOG").unwrap_or_else(|_| "scopegate=debug".into()),
    );
    let registry = tracing_subscriber::registry().with(filter);

    match format {
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init(),
        LogFormat::Text => registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init(),
    }
}

async fn handle_token_command(
    cmd: cli::TokenCommands,
    gate: &Gate,
    cfg: &Config,
) -> anyhow::Result<()> {
    match cmd {
        cli::TokenCommands::Create {
            name,
            schema_id,
            expires_in_days,
            disabled,
        } => {
            let mut builder =
                Token::builder(name, generate_access_token(cfg.token_length)).enabled(!disabled);
            if let Some(id) = schema_id {
                builder = builder.schema_id(id);
            }
            if let Some(days) = expires_in_days {
                anyhow::ensure!(days > 0, "--expires-in-days must be positive");
                builder = builder.expiry_date(Utc::now() + chrono::Duration::days(days));
            }
            let mut token = builder.build();

            match gate.save(&mut token).await {
                Ok(()) => {}
                Err(AppError::Validation(errors)) => {
                    for (field, messages) in errors.fields() {
                        for message in messages {
                            eprintln!("  {}: {}", field, message);
                        }
                    }
                    anyhow::bail!("token is invalid");
                }
                Err(e) => return Err(e.into()),
            }

            println!(
                "Token created:\n  ID: {}\n  Name: {}\n  Access token: {}",
                token.id.context("saved token has no id")?,
                token.name,
                token.access_token
            );
        }
        cli::TokenCommands::List => {
            let tokens = gate.store().list_tokens().await?;
            if tokens.is_empty() {
                println!("No tokens.");
            }
            for t in tokens {
                println!(
                    "{:>5}  {:<24}  schema={:<6}  enabled={:<5}  expires={}  last_used={}",
                    t.id,
                    t.name,
                    t.schema_id.map(|id| id.to_string()).unwrap_or_else(|| "-".into()),
                    t.enabled,
                    t.expiry_date.map(|d| d.to_rfc3339()).unwrap_or_else(|| "never".into()),
                    t.last_used.map(|d| d.to_rfc3339()).unwrap_or_else(|| "never".into()),
                );
            }
        }
        cli::TokenCommands::Scope { access_token } => {
            let ctx = gate.authorize(&access_token).await?;
            println!("{}{}", ctx.token_name, if ctx.is_public { " (public)" } else { "" });
            if ctx.scope.is_empty() {
                println!("  (no permissions)");
            }
            for permission in &ctx.scope {
                println!("  {}", permission);
            }
        }
        cli::TokenCommands::Check {
            access_token,
            permission,
        } => {
            let ctx = gate.require(&access_token, &permission).await?;
            println!("{} may use '{}'", ctx.token_name, permission);
        }
        cli::TokenCommands::Delete { id } => {
            if gate.store().delete_token(id).await? {
                println!("Token {} deleted.", id);
            } else {
                anyhow::bail!("Token not found: {}", id);
            }
        }
    }
    Ok(())
}
