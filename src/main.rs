use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use studio_sync::{
    api,
    config::Config,
    sync::{DelayedSync, SyncReconciler},
};

#[derive(Parser)]
#[command(name = "studio-sync")]
#[command(about = "Local-first project history and sync for the image studio")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the local project API server
    Serve {
        /// Port for HTTP API (defaults to the configured port)
        #[arg(short, long)]
        port: Option<u16>,
    },
    /// List local projects and their sync status
    List,
    /// Show one local project with its events and revisions
    Show { id: String },
    /// Push one project, or every pending project, to the remote backend
    Sync { id: Option<String> },
}

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::new(
        std::env::var("RUST_LOG").unwrap_or_else(|_| "studio_sync=debug,tower_http=debug".into()),
    );

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing();

    let config = Config::load();
    let db = config.open_database()?;
    let reconciler = Arc::new(
        SyncReconciler::new(db.clone(), Arc::new(config.remote_client()))
            .with_owner(config.owner_id.clone()),
    );

    match cli.command.unwrap_or(Commands::Serve { port: None }) {
        Commands::Serve { port } => {
            let port = port.unwrap_or(config.port);
            tracing::info!("Starting studio-sync server on port {}", port);

            // Held for the server's lifetime; dropping it cancels the sync.
            let _startup_sync = match config.owner_id {
                Some(ref owner) => {
                    let delay = config.sync_delay();
                    tracing::info!("Syncing pending projects for {} in {:?}", owner, delay);
                    Some(DelayedSync::schedule(reconciler.clone(), delay))
                }
                None => None,
            };

            let app = api::create_router(reconciler);

            let listener = tokio::net::TcpListener::bind(format!("127.0.0.1:{}", port)).await?;
            tracing::info!("studio-sync listening on http://127.0.0.1:{}", port);

            axum::serve(listener, app).await?;
        }
        Commands::List => {
            let projects = db.list()?;
            if projects.is_empty() {
                println!("No local projects.");
            }
            for project in projects {
                println!(
                    "{}  {:<8}  {:<24}  {}",
                    project.id,
                    project.status.as_str(),
                    project.name,
                    project.remote_id.as_deref().unwrap_or("-")
                );
            }
        }
        Commands::Show { id } => {
            let project = db
                .get(&id)?
                .ok_or_else(|| anyhow::anyhow!("Local project not found: {}", id))?;
            println!("{}", serde_json::to_string_pretty(&project)?);
        }
        Commands::Sync { id: Some(id) } => {
            let outcome = reconciler.sync_project(&id).await?;
            println!("{}: {:?}", id, outcome);
        }
        Commands::Sync { id: None } => {
            for (id, outcome) in reconciler.sync_pending().await? {
                println!("{}: {:?}", id, outcome);
            }
        }
    }

    Ok(())
}
