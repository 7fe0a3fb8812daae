use core::{net::SocketAddr, time::Duration};
use std::path::PathBuf;

use anyhow::{Context, bail};
use clap::{Parser, ValueEnum};
use emz_sku::RuleSet;

/// Runtime configuration for the `emz-sku-server` binary.
///
/// Every value can be given as a CLI argument or an environment variable;
/// `.env` files are loaded before parsing.
#[derive(Parser, Debug, Clone)]
#[command(
    name = "emz-sku-server",
    version,
    about = "Allocates EMZ item numbers over HTTP and gRPC"
)]
pub struct CliArgs {
    /// Address of the HTTP JSON listener.
    ///
    /// Environment variable: `HTTP_ADDR`
    #[arg(long, env = "HTTP_ADDR", default_value_t = String::from("0.0.0.0:8080"))]
    pub http_addr: String,

    /// Address of the gRPC listener.
    ///
    /// Environment variable: `GRPC_ADDR`
    #[arg(long, env = "GRPC_ADDR", default_value_t = String::from("0.0.0.0:50051"))]
    pub grpc_addr: String,

    /// Where counters and items are persisted.
    ///
    /// `memory` loses everything on restart and must not be used to issue
    /// real item numbers.
    ///
    /// Environment variable: `STORE`
    #[arg(long, env = "STORE", value_enum, default_value_t = StoreKind::Memory)]
    pub store: StoreKind,

    /// Postgres connection string, required with `--store postgres`.
    ///
    /// Environment variable: `DATABASE_URL`
    #[arg(long, env = "DATABASE_URL")]
    pub database_url: Option<String>,

    /// Maximum number of pooled Postgres connections.
    ///
    /// Environment variable: `DATABASE_MAX_CONNECTIONS`
    #[arg(long, env = "DATABASE_MAX_CONNECTIONS", default_value_t = 10)]
    pub database_max_connections: u32,

    /// How long to wait for a pooled Postgres connection, in milliseconds.
    ///
    /// Environment variable: `DATABASE_ACQUIRE_TIMEOUT_MS`
    #[arg(long, env = "DATABASE_ACQUIRE_TIMEOUT_MS", default_value_t = 3_000)]
    pub database_acquire_timeout_ms: u64,

    /// Database file, required with `--store redb`.
    ///
    /// Environment variable: `REDB_PATH`
    #[arg(long, env = "REDB_PATH")]
    pub redb_path: Option<PathBuf>,

    /// Upper bound for a single allocation, in milliseconds. `0` disables
    /// the bound.
    ///
    /// A timed-out allocation may or may not have advanced the counter.
    ///
    /// Environment variable: `ALLOCATE_TIMEOUT_MS`
    #[arg(long, env = "ALLOCATE_TIMEOUT_MS", default_value_t = 5_000)]
    pub allocate_timeout_ms: u64,

    /// JSON file with brand/model code rules.
    ///
    /// With `"inherit": true` its rules are checked before the built-in
    /// tables; otherwise they replace them.
    ///
    /// Environment variable: `RULES_FILE`
    #[arg(long, env = "RULES_FILE")]
    pub rules_file: Option<PathBuf>,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreKind {
    Memory,
    Redb,
    Postgres,
}

#[derive(Debug, Clone)]
pub enum StoreConfig {
    Memory,
    Redb {
        path: PathBuf,
    },
    Postgres {
        url: String,
        max_connections: u32,
        acquire_timeout: Duration,
    },
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub http_addr: SocketAddr,
    pub grpc_addr: SocketAddr,
    pub store: StoreConfig,
    pub allocate_timeout: Option<Duration>,
    pub rules: RuleSet,
}

impl TryFrom<CliArgs> for ServerConfig {
    type Error = anyhow::Error;

    fn try_from(args: CliArgs) -> Result<Self, Self::Error> {
        let http_addr = args
            .http_addr
            .parse::<SocketAddr>()
            .with_context(|| format!("HTTP_ADDR `{}` is not a socket address", args.http_addr))?;
        let grpc_addr = args
            .grpc_addr
            .parse::<SocketAddr>()
            .with_context(|| format!("GRPC_ADDR `{}` is not a socket address", args.grpc_addr))?;
        if http_addr == grpc_addr {
            bail!("HTTP_ADDR and GRPC_ADDR must differ (both are {http_addr})");
        }

        let store = match args.store {
            StoreKind::Memory => StoreConfig::Memory,
            StoreKind::Redb => StoreConfig::Redb {
                path: args
                    .redb_path
                    .context("REDB_PATH is required when STORE=redb")?,
            },
            StoreKind::Postgres => {
                if args.database_max_connections == 0 {
                    bail!("DATABASE_MAX_CONNECTIONS must be greater than 0");
                }
                StoreConfig::Postgres {
                    url: args
                        .database_url
                        .context("DATABASE_URL is required when STORE=postgres")?,
                    max_connections: args.database_max_connections,
                    acquire_timeout: Duration::from_millis(args.database_acquire_timeout_ms),
                }
            }
        };

        let allocate_timeout =
            (args.allocate_timeout_ms > 0).then(|| Duration::from_millis(args.allocate_timeout_ms));

        let rules = match &args.rules_file {
            Some(path) => {
                let text = std::fs::read_to_string(path)
                    .with_context(|| format!("failed to read rules file {}", path.display()))?;
                RuleSet::from_json(&text)
                    .with_context(|| format!("invalid rules file {}", path.display()))?
            }
            None => RuleSet::builtin(),
        };

        Ok(Self {
            http_addr,
            grpc_addr,
            store,
            allocate_timeout,
            rules,
        })
    }
}
