use clap::{Parser, Subcommand};

/// scopegate — GraphQL token scope administration
#[derive(Parser)]
#[command(name = "scopegate", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Manage GraphQL access tokens
    Token {
        #[command(subcommand)]
        command: TokenCommands,
    },
}

#[derive(Subcommand)]
pub enum TokenCommands {
    /// Create a token with a freshly generated access token
    Create {
        #[arg(long)]
        name: String,
        /// Schema the token resolves its scope from
        #[arg(long)]
        schema_id: Option<i64>,
        /// Expire the token this many days from now
        #[arg(long)]
        expires_in_days: Option<i64>,
        /// Create the token disabled
        #[arg(long)]
        disabled: bool,
    },
    /// List all tokens
    List,
    /// Print the scope an access token resolves to
    Scope {
        #[arg(long, env = "SCOPEGATE_ACCESS_TOKEN")]
        access_token: String,
    },
    /// Check whether an access token grants a permission
    Check {
        #[arg(long, env = "SCOPEGATE_ACCESS_TOKEN")]
        access_token: String,
        /// Permission to check, e.g. "sections.news:read"
        #[arg(long)]
        permission: String,
    },
    /// Delete a token
    Delete {
        #[arg(long)]
        id: i64,
    },
}
