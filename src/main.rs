use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::process;
use std::sync::Arc;
use tokio::net::TcpStream;
use tokio::sync::watch;

use clap_verbosity_flag::{InfoLevel, Verbosity};
use tracing::{debug, error, info, warn};

use i4_lib::constants::PEAK_STREAM_PORT;
use i4_lib::{CalibrationEngine, FrameData, FrameSequencer, I4Error, ReferenceTable};
use i4_rs::forward::{RELAY_BACKLOG, RelayForwarder};
use i4_rs::logging::setup_logging;

/// Stream client for the I4 optical interrogator: decodes peaks and reports forces.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Interrogator address
    #[arg(long, default_value = "10.100.51.16")]
    host: String,
    /// Stream port (9931 for peaks, 9932 for spectra)
    #[arg(short, long, default_value_t = PEAK_STREAM_PORT)]
    port: u16,
    /// JSON file with reference wavelengths, replaces the built-in I4 table
    #[arg(short, long)]
    references: Option<PathBuf>,
    /// Forward forces to a logging server, e.g. 127.0.0.1:4578
    #[arg(long)]
    relay: Option<String>,
    /// Stop after this many frames
    #[arg(short, long)]
    count: Option<u64>,
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

    if let Err(e) = run_client(cli).await {
        error!("Stream client failed: {:?}", e);
        process::exit(1);
    }

    Ok(())
}

async fn run_client(cli: Cli) -> Result<()> {
    let references = match &cli.references {
        Some(path) => ReferenceTable::from_json_file(path)
            .with_context(|| format!("Failed to load reference table from {:?}", path))?,
        None => ReferenceTable::i4_default(),
    };
    info!("Loaded {} reference wavelengths", references.len());

    let relay = match &cli.relay {
        Some(addr) => Some(connect_relay(addr).await?),
        None => None,
    };

    let address = format!("{}:{}", cli.host, cli.port);
    info!(%address, "Connecting to interrogator");
    let stream = TcpStream::connect(&address)
        .await
        .with_context(|| format!("Failed to connect to {}", address))?;
    stream.set_nodelay(true)?;

    let (stop_tx, stop_rx) = watch::channel(false);
    let ctrlc_stop = stop_tx.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Ctrl+C received, stopping after the current frame");
            ctrlc_stop.send_replace(true);
        }
    });

    let mut sequencer = FrameSequencer::new(stream, CalibrationEngine::new(Arc::new(references)));
    let limit = cli.count;
    let mut seen = 0u64;

    let result = sequencer
        .run(&stop_rx, |frame| {
            seen += 1;
            debug!("{}", frame.header);

            if let Some(error) = &frame.error {
                warn!("{}", error);
            }

            match &frame.data {
                FrameData::Peaks(measurements) => {
                    for measurement in measurements {
                        match &measurement.force {
                            Some(force) => {
                                info!("{}", force);
                                if let Some(forwarder) = &relay {
                                    forwarder.offer(*force);
                                }
                            }
                            None => debug!("{}", measurement.peak),
                        }
                    }
                }
                FrameData::Spectrum(spectrum) => {
                    info!(
                        "{} spectrum: {} points, {} amplitudes received",
                        spectrum.info.id,
                        spectrum.info.point_count,
                        spectrum.samples.len() * 4
                    );
                }
            }

            if limit.is_some_and(|limit| seen >= limit) {
                stop_tx.send_replace(true);
            }
        })
        .await;

    info!(
        frames = sequencer.frames(),
        dropped = sequencer.dropped_packets(),
        "Stream finished"
    );

    if let Some(forwarder) = relay {
        match forwarder.finish().await {
            Ok(sent) => info!("Relayed {} force readings", sent),
            Err(e) => warn!("Relay failed: {}", e),
        }
    }

    match result {
        Ok(_) => Ok(()),
        Err(I4Error::TransportClosed) => {
            info!("Interrogator closed the connection");
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}

async fn connect_relay(addr: &str) -> Result<RelayForwarder> {
    let stream = TcpStream::connect(addr)
        .await
        .with_context(|| format!("Failed to connect to relay server at {}", addr))?;
    info!(%addr, "Relaying forces");
    Ok(RelayForwarder::spawn(stream, RELAY_BACKLOG))
}
