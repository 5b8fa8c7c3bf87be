use clap::{Parser, Subcommand};
use miette::{IntoDiagnostic, Result};
use rust_decimal::Decimal;
use std::fs::File;
use std::io;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};
use ussd_market::config::{Overrides, Settings};
use ussd_market::infrastructure::clock::SystemClock;
use ussd_market::interfaces::csv::exchange_reader::ExchangeReader;
use ussd_market::interfaces::csv::reply_writer::ReplyWriter;
use ussd_market::interfaces::http::{AppState, create_router};
use ussd_market::service::Service;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Settings JSON file (optional). Defaults apply to anything it omits.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Marketplace JSON file overriding the bundled demo data.
    #[arg(long, global = true)]
    data: Option<PathBuf>,

    /// Idle seconds before a session expires.
    #[arg(long, global = true)]
    session_timeout: Option<u64>,

    /// Seconds between sweeps of expired sessions.
    #[arg(long, global = true)]
    sweep_interval: Option<u64>,

    /// Share of a conversion that reaches the target source, e.g. 0.95.
    #[arg(long, global = true)]
    conversion_rate: Option<Decimal>,

    #[arg(long, global = true)]
    conversion_min: Option<Decimal>,

    #[arg(long, global = true)]
    conversion_max: Option<Decimal>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Replay recorded exchanges from a CSV file and print the replies
    Replay {
        /// CSV with sessionId,serviceCode,phoneNumber,text rows
        input: PathBuf,
    },
    /// Serve the gateway callback over HTTP
    Serve {
        #[arg(long, default_value = "0.0.0.0:8000")]
        addr: SocketAddr,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "ussd_market=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();

    let cli = Cli::parse();

    let overrides = Overrides {
        session_timeout_secs: cli.session_timeout,
        sweep_interval_secs: cli.sweep_interval,
        conversion_rate: cli.conversion_rate,
        conversion_min: cli.conversion_min,
        conversion_max: cli.conversion_max,
        data_path: cli.data,
    };
    let settings = Settings::load(cli.config.as_deref(), overrides).into_diagnostic()?;
    let service = Service::from_settings(&settings, Arc::new(SystemClock)).into_diagnostic()?;

    match cli.command {
        Command::Replay { input } => replay(&service, &input).await,
        Command::Serve { addr } => serve(&service, addr).await,
    }
}

async fn replay(service: &Service, input: &Path) -> Result<()> {
    let engine = service.engine();
    let file = File::open(input).into_diagnostic()?;
    let reader = ExchangeReader::new(file);

    let stdout = io::stdout();
    let mut writer = ReplyWriter::new(stdout.lock());
    for (row, exchange) in reader.exchanges().enumerate() {
        match exchange {
            Ok(request) => {
                let reply = engine.handle(&request).await;
                writer
                    .write_reply(request.session_id().unwrap_or_default(), &reply)
                    .into_diagnostic()?;
            }
            Err(e) => {
                eprintln!("Skipping malformed exchange on row {}: {}", row + 2, e);
            }
        }
    }
    writer.flush().into_diagnostic()
}

async fn serve(service: &Service, addr: SocketAddr) -> Result<()> {
    let sweeper = service.spawn_sweeper();
    let app = create_router(AppState::new(service.engine()));

    let listener = tokio::net::TcpListener::bind(addr).await.into_diagnostic()?;
    tracing::info!(%addr, "USSD gateway listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await
        .into_diagnostic()?;

    sweeper.abort();
    tracing::info!("Shut down");
    Ok(())
}
