//! CLA Server: administrative entry point for the CLA signing store.
//!
//! Connects to SurrealDB, applies pending migrations and runs one
//! command against the store.

use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use cla_core::models::binding::{ApplyTo, BindingFilter, BindingScope};
use cla_core::models::corporation::CorporationSigningFilter;
use cla_core::models::individual::IndividualSigningFilter;
use cla_core::models::signer::SignerFilter;
use cla_db::repository::{
    SurrealBindingRepository, SurrealCorporationManagerRepository, SurrealSignerLedger,
};
use cla_db::{DbConfig, DbManager, StoreConfig};
use cla_signing::{LogNotificationSink, SigningConfig, SigningService};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

/// CLA signing store CLI
#[derive(Parser)]
#[command(name = "cla-server")]
#[command(about = "CLA binding and signing record store", long_about = None)]
#[command(version)]
struct Cli {
    /// SurrealDB WebSocket address
    #[arg(long, env = "CLA_DB_URL", default_value = "127.0.0.1:8000")]
    db_url: String,

    /// SurrealDB namespace
    #[arg(long, env = "CLA_DB_NAMESPACE", default_value = "cla")]
    db_namespace: String,

    /// SurrealDB database
    #[arg(long, env = "CLA_DB_DATABASE", default_value = "main")]
    db_database: String,

    /// SurrealDB root user
    #[arg(long, env = "CLA_DB_USERNAME", default_value = "root")]
    db_username: String,

    /// SurrealDB root password
    #[arg(long, env = "CLA_DB_PASSWORD", default_value = "root", hide_env_values = true)]
    db_password: String,

    /// Deadline for a single store call, in seconds
    #[arg(long, env = "CLA_OPERATION_TIMEOUT_SECS", default_value_t = 10)]
    operation_timeout_secs: u64,

    /// Attempts per ledger write before reporting a conflict
    #[arg(long, env = "CLA_MAX_WRITE_ATTEMPTS", default_value_t = 16)]
    max_write_attempts: u32,

    /// Digits in email verification codes
    #[arg(long, env = "CLA_VERIFICATION_CODE_LENGTH", default_value_t = 6)]
    verification_code_length: usize,

    /// Human-readable logs instead of JSON
    #[arg(long, env = "CLA_PLAIN_LOGS")]
    plain_logs: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Apply pending schema migrations and exit
    Migrate,
    /// List the bindings of an org, or of one of its repositories
    ListBindings {
        #[arg(long)]
        platform: String,
        #[arg(long)]
        org: String,
        /// Only bindings of this repository ("" for org-wide ones)
        #[arg(long)]
        repo: Option<String>,
    },
    /// Report whether a signer holds a CLA signature for a repository
    CheckSigned {
        #[arg(long)]
        platform: String,
        #[arg(long)]
        org: String,
        #[arg(long, default_value = "")]
        repo: String,
        #[arg(long, value_enum)]
        kind: SignerKind,
        #[arg(long)]
        email: String,
    },
    /// List the signing records of one binding
    ListSigners {
        #[arg(long)]
        binding: Uuid,
        #[arg(long, value_enum)]
        kind: SignerKind,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum SignerKind {
    Individual,
    Corporation,
}

impl From<SignerKind> for ApplyTo {
    fn from(kind: SignerKind) -> Self {
        match kind {
            SignerKind::Individual => ApplyTo::Individual,
            SignerKind::Corporation => ApplyTo::Corporation,
        }
    }
}

fn init_tracing(plain: bool) -> anyhow::Result<()> {
    let filter = EnvFilter::from_default_env().add_directive("cla=info".parse()?);
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if plain {
        builder.init();
    } else {
        builder.json().init();
    }
    Ok(())
}

fn print_json(value: &impl serde::Serialize) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.plain_logs)?;

    let db_config = DbConfig {
        url: cli.db_url,
        namespace: cli.db_namespace,
        database: cli.db_database,
        username: cli.db_username,
        password: cli.db_password,
    };
    let store_config = StoreConfig {
        operation_timeout: Duration::from_secs(cli.operation_timeout_secs),
        max_write_attempts: cli.max_write_attempts,
        ..StoreConfig::default()
    };
    let signing_config = SigningConfig {
        verification_code_length: cli.verification_code_length,
        ..SigningConfig::default()
    };

    let manager = DbManager::connect(&db_config)
        .await
        .context("failed to connect to SurrealDB")?;
    let db = manager.client().clone();
    cla_db::run_migrations(&db)
        .await
        .context("failed to apply migrations")?;

    let service = SigningService::new(
        SurrealBindingRepository::with_config(db.clone(), store_config.clone()),
        SurrealSignerLedger::with_config(db.clone(), store_config.clone()),
        SurrealCorporationManagerRepository::with_config(db, store_config),
        LogNotificationSink,
        signing_config,
    );

    match cli.command {
        Command::Migrate => {
            tracing::info!("Schema is up to date");
        }
        Command::ListBindings {
            platform,
            org,
            repo,
        } => {
            let bindings = service
                .list_bindings(BindingFilter {
                    platform: Some(platform),
                    org_id: Some(org),
                    repo_id: repo,
                    ..Default::default()
                })
                .await?;
            print_json(&bindings)?;
        }
        Command::CheckSigned {
            platform,
            org,
            repo,
            kind,
            email,
        } => {
            let signed = service
                .check_signed(BindingScope::new(platform, org, repo), kind.into(), &email)
                .await?;
            print_json(&serde_json::json!({ "signed": signed }))?;
        }
        Command::ListSigners { binding, kind } => {
            let filter = match kind {
                SignerKind::Individual => {
                    SignerFilter::Individual(IndividualSigningFilter::default())
                }
                SignerKind::Corporation => {
                    SignerFilter::Corporation(CorporationSigningFilter::default())
                }
            };
            let signers = service.list_signers(binding, filter).await?;
            print_json(&signers)?;
        }
    }

    Ok(())
}
