use anyhow::Context;
use clap::{Parser, Subcommand};
use shelf_app::Repository;
use shelf_db::TenantId;
use shelf_kernel::settings::Settings;

/// Operate a shelf deployment.
#[derive(Debug, Parser)]
#[command(name = "shelf", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run the HTTP server until ctrl-c or SIGTERM
    Serve,
    /// Check that the configured document store answers
    Ping,
    /// Create the store indexes every module declares
    Migrate,
    /// Create a database seeded with the default collection and print its id
    CreateDb {
        /// Database id to claim; a random one is drawn when omitted
        #[arg(long)]
        id: Option<String>,
    },
    /// Print the effective configuration
    Settings,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let settings = Settings::load().context("failed to load shelf settings")?;
    shelf_telemetry::init(&settings.telemetry)?;

    match cli.command {
        Command::Serve => shelf_app::run(settings).await,
        Command::Ping => {
            let store = shelf_db::connect(&settings.database)
                .await
                .context("failed to open document store")?;
            store.ping().await.context("document store did not answer")?;
            println!("{} store is reachable", store.backend());
            store.close().await?;
            Ok(())
        }
        Command::Migrate => {
            let store = shelf_db::connect(&settings.database)
                .await
                .context("failed to open document store")?;
            let repository = Repository::new(store.clone());
            let migrations = shelf_app::registry(&repository).collect_migrations();
            shelf_db::apply_migrations(store.as_ref(), &migrations)
                .await
                .context("failed to apply index migrations")?;
            println!("applied {} migration(s)", migrations.len());
            store.close().await?;
            Ok(())
        }
        Command::CreateDb { id } => {
            let requested = id
                .as_deref()
                .map(TenantId::parse)
                .transpose()
                .context("invalid database id")?;
            let store = shelf_db::connect(&settings.database)
                .await
                .context("failed to open document store")?;
            let repository = Repository::new(store.clone());
            let tenant = repository
                .create_database(requested)
                .await
                .context("failed to create database")?;
            tracing::info!(db_id = %tenant, "database created from cli");
            println!("{tenant}");
            store.close().await?;
            Ok(())
        }
        Command::Settings => {
            println!("environment: {:?}", settings.environment);
            println!(
                "server:      {}:{} (timeout {} ms)",
                settings.server.host, settings.server.port, settings.server.request_timeout_ms
            );
            println!(
                "database:    {:?} {} @ {}",
                settings.database.backend,
                settings.database.name,
                settings.database.redacted_uri()
            );
            println!(
                "telemetry:   {} ({:?})",
                settings.telemetry.log_level, settings.telemetry.log_format
            );
            Ok(())
        }
    }
}
