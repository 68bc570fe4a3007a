//! Levelset admin CLI.
//!
//! Drives the configuration engine against a local database: environment
//! setup, draft editing, publish/promote/rollback, history and diff
//! inspection, and resolution previews.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use levelset_db::LevelsetDb;
use levelset_engine::{ConfigServices, EngineError};
use levelset_logging::{init_logging, LogConfig};
use levelset_protocol::ResolveMode;

mod commands;

#[derive(Parser, Debug)]
#[command(name = "levelset", about = "Remote configuration backend for game clients")]
struct Cli {
    /// Enable verbose logging (info/debug to stderr)
    #[arg(short = 'v', long, global = true)]
    verbose: bool,

    /// Database path (defaults to ~/.levelset/levelset.sqlite3)
    #[arg(long, global = true, env = "LEVELSET_DB")]
    db: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Environment administration
    Env {
        #[command(subcommand)]
        command: EnvCommands,
    },

    /// Show or edit an environment's draft
    Draft {
        #[command(subcommand)]
        command: DraftCommands,
    },

    /// Publish the draft as a new immutable version
    Publish {
        /// Environment id
        environment: String,

        /// Acting user id
        #[arg(short, long)]
        user: String,

        /// Optional change log entry
        #[arg(short, long)]
        notes: Option<String>,
    },

    /// Promote a version to active (clears the draft)
    Promote {
        environment: String,
        version: String,
        #[arg(short, long)]
        user: String,
    },

    /// Roll back to a previously published version
    Rollback {
        environment: String,
        version: String,
        #[arg(short, long)]
        user: String,
    },

    /// List all versions of an environment
    Versions { environment: String },

    /// Show one version in full, snapshot included
    Version {
        environment: String,
        version: String,
    },

    /// Diff two versions of an environment
    Diff {
        environment: String,
        from: String,
        to: String,
    },

    /// Resolve the effective value set
    Resolve {
        environment: String,

        /// PUBLISHED (what game clients see) or DRAFT (editor preview)
        #[arg(short, long, default_value = "published")]
        mode: String,
    },
}

#[derive(Subcommand, Debug)]
enum EnvCommands {
    /// Create an environment (and its configuration state)
    Create {
        /// Owning project id
        #[arg(short, long)]
        project: String,
        /// Environment name (e.g. production)
        name: String,
    },
    /// List all environments
    List,
}

#[derive(Subcommand, Debug)]
enum DraftCommands {
    /// Fetch the draft, materializing it on first access
    Show { environment: String },
    /// Apply RFC 6902 operations to the draft
    Patch {
        environment: String,

        /// Acting user id
        #[arg(short, long)]
        user: String,

        /// Patch operations: inline JSON array, or @path/to/ops.json
        ops: String,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(e) = init_logging(LogConfig {
        app_name: "levelset",
        verbose: cli.verbose,
    }) {
        eprintln!("Failed to initialize logging: {e:#}");
        return ExitCode::FAILURE;
    }

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            render_error(&e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let db_path = cli.db.unwrap_or_else(levelset_logging::default_db_path);
    tracing::debug!(path = %db_path.display(), "Using database");
    let db = LevelsetDb::open(&db_path)
        .await
        .with_context(|| format!("Failed to open database at {}", db_path.display()))?;
    let services = ConfigServices::new(db.clone());

    match cli.command {
        Commands::Env { command } => match command {
            EnvCommands::Create { project, name } => {
                commands::env_create(&db, &project, &name).await
            }
            EnvCommands::List => commands::env_list(&db).await,
        },
        Commands::Draft { command } => match command {
            DraftCommands::Show { environment } => {
                commands::draft_show(&services, &environment).await
            }
            DraftCommands::Patch {
                environment,
                user,
                ops,
            } => commands::draft_patch(&services, &environment, &user, &ops).await,
        },
        Commands::Publish {
            environment,
            user,
            notes,
        } => commands::publish(&services, &environment, &user, notes).await,
        Commands::Promote {
            environment,
            version,
            user,
        } => commands::promote(&services, &environment, &version, &user).await,
        Commands::Rollback {
            environment,
            version,
            user,
        } => commands::rollback(&services, &environment, &version, &user).await,
        Commands::Versions { environment } => commands::versions(&services, &environment).await,
        Commands::Version {
            environment,
            version,
        } => commands::version_details(&services, &environment, &version).await,
        Commands::Diff {
            environment,
            from,
            to,
        } => commands::diff(&services, &environment, &from, &to).await,
        Commands::Resolve { environment, mode } => {
            let mode = ResolveMode::parse(&mode)
                .with_context(|| format!("Unknown resolve mode: {mode} (PUBLISHED or DRAFT)"))?;
            commands::resolve(&services, &environment, mode).await
        }
    }
}

fn render_error(err: &anyhow::Error) {
    // Validation failures list every violated rule, one per line
    if let Some(EngineError::Validation(violations)) = err.downcast_ref::<EngineError>() {
        eprintln!("Validation failed:");
        for violation in violations {
            eprintln!("  - {violation}");
        }
        return;
    }
    eprintln!("Error: {err:#}");
}
