use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::process;
use tokio::net::TcpListener;

use clap_verbosity_flag::{InfoLevel, Verbosity};
use tracing::{error, info};

use i4_lib::constants::FORCE_RELAY_PORT;
use i4_lib::{I4Error, read_force_frame};
use i4_rs::logging::setup_logging;

/// Logging server for force readings relayed by the stream client.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Address to listen on
    #[arg(short, long, default_value = "0.0.0.0")]
    bind: String,
    #[arg(short, long, default_value_t = FORCE_RELAY_PORT)]
    port: u16,
    /// Optional path to a file to write logs to, in addition to the console.
    #[arg(short, long)]
    log_file: Option<PathBuf>,
    #[command(flatten)]
    verbose: Verbosity<InfoLevel>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let _guard = setup_logging(cli.log_file.clone(), &cli.verbose)?;

    tokio::select! {
        result = serve(&cli.bind, cli.port) => {
            if let Err(e) = result {
                error!("Force server failed: {:?}", e);
                process::exit(1);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Ctrl+C received, shutting down");
        }
    }

    Ok(())
}

async fn serve(bind: &str, port: u16) -> Result<()> {
    let listener = TcpListener::bind((bind, port))
        .await
        .with_context(|| format!("Failed to bind {}:{}", bind, port))?;
    info!("Listening on {}", listener.local_addr()?);

    let (mut stream, peer) = listener.accept().await?;
    info!(%peer, "Client connected");

    let mut received = 0u64;
    loop {
        match read_force_frame(&mut stream).await {
            Ok(frame) => {
                received += 1;
                info!("{}", frame);
            }
            Err(I4Error::TransportClosed) => {
                info!(%peer, received, "Client disconnected");
                return Ok(());
            }
            Err(e) => return Err(e.into()),
        }
    }
}
