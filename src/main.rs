use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use chrono::Utc;
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use dissertation_explorer::db::{self, PgSource};
use dissertation_explorer::report;
use dissertation_explorer::timeseries::{
    build_school_timeseries, select_schools, COMPARE_MAX_SCHOOLS,
};
use dissertation_explorer::{build_router, AppState, CsvSource, RecordSource, Snapshot, SnapshotStore};

#[derive(Parser)]
#[command(name = "explorer-snapshots")]
#[command(about = "Snapshot generator for the dissertation catalog explorer", long_about = None)]
struct Cli {
    /// Postgres connection string for the catalog
    #[arg(long, env = "DATABASE_URL", global = true)]
    database_url: Option<String>,

    /// Directory the explorer reads its JSON snapshots from
    #[arg(long, env = "EXPLORER_DATA_PATH", default_value = "explorer/data", global = true)]
    data_dir: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create or upgrade the database schema
    InitDb,
    /// Load a small sample catalog
    Seed,
    /// Regenerate and publish every snapshot artifact
    Generate {
        /// Read records from a CSV export instead of the database
        #[arg(long)]
        csv: Option<PathBuf>,
    },
    /// Print per-year counts for up to five schools
    Compare {
        #[arg(long = "school", required = true)]
        schools: Vec<String>,
        #[arg(long)]
        csv: Option<PathBuf>,
    },
    /// Generate a markdown summary of the catalog
    Report {
        #[arg(long)]
        csv: Option<PathBuf>,
        #[arg(long, default_value_t = 10)]
        top: usize,
        #[arg(long, default_value = "report.md")]
        out: PathBuf,
    },
    /// Serve the explorer API
    Serve {
        #[arg(long, env = "EXPLORER_BIND", default_value = "127.0.0.1:3001")]
        bind: SocketAddr,
    },
}

impl Cli {
    async fn pool(&self) -> anyhow::Result<sqlx::PgPool> {
        let database_url = self
            .database_url
            .as_deref()
            .context("DATABASE_URL must be set to a production Postgres instance")?;
        db::connect(database_url)
            .await
            .context("failed to connect to Postgres")
    }

    async fn source(&self, csv: Option<PathBuf>) -> anyhow::Result<Arc<dyn RecordSource>> {
        match csv {
            Some(path) => Ok(Arc::new(CsvSource::new(path))),
            None => Ok(Arc::new(PgSource::new(self.pool().await?))),
        }
    }
}

/// `RUST_LOG` directives when set and valid, otherwise `info`.
fn log_filter(directives: Option<&str>) -> EnvFilter {
    directives
        .filter(|raw| !raw.trim().is_empty())
        .and_then(|raw| EnvFilter::try_new(raw).ok())
        .unwrap_or_else(|| EnvFilter::new("info"))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(log_filter(std::env::var("RUST_LOG").ok().as_deref()))
        .init();

    let cli = Cli::parse();

    match &cli.command {
        Commands::InitDb => {
            let pool = cli.pool().await?;
            db::init_db(&pool).await.context("failed to run migrations")?;
            println!("Schema ready.");
        }
        Commands::Seed => {
            let pool = cli.pool().await?;
            let inserted = db::seed(&pool).await.context("failed to seed catalog")?;
            println!("Seed data inserted ({inserted} new dissertations).");
        }
        Commands::Generate { csv } => {
            let source = cli.source(csv.clone()).await?;
            let store = SnapshotStore::new(&cli.data_dir);
            let meta = dissertation_explorer::regenerate(source.as_ref(), &store)
                .await
                .context("snapshot generation failed")?;

            println!("Snapshots written to {}.", store.dir().display());
            println!("{}", serde_json::to_string_pretty(&meta)?);
        }
        Commands::Compare { schools, csv } => {
            let requested = select_schools(schools);
            if requested.len() < schools.len() {
                info!("Comparing at most {} distinct schools", COMPARE_MAX_SCHOOLS);
            }

            let source = cli.source(csv.clone()).await?;
            let records = source.fetch_schools(&requested).await?;
            let series = build_school_timeseries(&records, requested.as_slice());

            for school in series.schools() {
                let years = series.get(school).unwrap_or_default();
                let total: u64 = years.iter().map(|point| point.count).sum();
                println!("{school}: {total} dissertations across {} years", years.len());
                for point in years {
                    println!("  {} {}", point.year, point.count);
                }
            }
        }
        Commands::Report { csv, top, out } => {
            let source = cli.source(csv.clone()).await?;
            let records = source.fetch_all().await?;
            let snapshot = Snapshot::build(&records, Utc::now());
            let report = report::build_report(&records, &snapshot, *top);
            std::fs::write(out, report)
                .with_context(|| format!("failed to write {}", out.display()))?;
            println!("Report written to {}.", out.display());
        }
        Commands::Serve { bind } => {
            let source: Arc<dyn RecordSource> = Arc::new(PgSource::new(cli.pool().await?));
            let store = Arc::new(SnapshotStore::new(&cli.data_dir));
            let app = build_router(AppState::new(source, store));

            let listener = tokio::net::TcpListener::bind(*bind)
                .await
                .with_context(|| format!("failed to bind {bind}"))?;
            info!("Explorer API listening on http://{}", bind);
            info!("Snapshots served from {}", cli.data_dir.display());

            axum::serve(listener, app).await?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing::level_filters::LevelFilter;

    #[test]
    fn rust_log_level_is_respected() {
        assert_eq!(log_filter(Some("debug")).max_level_hint(), Some(LevelFilter::DEBUG));
        assert_eq!(log_filter(Some("warn")).max_level_hint(), Some(LevelFilter::WARN));
        assert_eq!(log_filter(None).max_level_hint(), Some(LevelFilter::INFO));
        assert_eq!(log_filter(Some("  ")).max_level_hint(), Some(LevelFilter::INFO));
    }
}
