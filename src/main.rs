//! scpid - SCPI/IEEE-488.2 instrument daemon.
//!
//! Reads command lines on stdin, writes replies on stdout and exits with
//! the Status Byte. Which instrument profile runs is chosen by config.

use std::process::ExitCode;
use std::sync::Arc;

use scpid::config::{Config, Profile};
use scpid::drivers::ads1220::HallProbe;
use scpid::drivers::led::Led;
use scpid::instrument::{Diag, Instrument};
use scpid::session::Session;
use scpid::state::ReplyRx;
use tokio::io::{AsyncWriteExt, BufReader};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    // stdout carries instrument replies; tracing goes to stderr.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .with_target(true)
        .init();

    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "config.toml".to_string());

    let config = Config::load(&config_path).map_err(|e| {
        error!(path = %config_path, error = %e, "Failed to load config");
        e
    })?;

    info!(
        profile = ?config.instrument.profile,
        model = %config.identity.model,
        "Starting scpid"
    );

    let code = match config.instrument.profile {
        Profile::Diag => {
            let (instr, reply_rx) = Diag::new(config.identity.clone());
            run(Arc::new(instr), reply_rx).await
        }
        Profile::Led => {
            let (instr, reply_rx) = Led::new(config.identity.clone());
            run(Arc::new(instr), reply_rx).await
        }
        Profile::HallProbe => {
            let (instr, reply_rx) =
                HallProbe::new(config.identity.clone(), &config.adc.calibration_path);
            let instr = Arc::new(instr);
            HallProbe::spawn_display_task(&instr);
            run(instr, reply_rx).await
        }
    };

    info!(code, "Instrument stopped");
    Ok(ExitCode::from(code))
}

/// Drive one instrument over stdin/stdout until it shuts down.
async fn run<T: Instrument>(instr: Arc<T>, reply_rx: ReplyRx) -> u8 {
    let tree = Arc::new(T::command_tree());
    let shutdown = instr.core().subscribe_shutdown();
    let writer = tokio::spawn(write_replies(reply_rx, shutdown));

    let mut session = Session::new(instr, tree);
    let code = session.run(BufReader::new(tokio::io::stdin())).await;

    // The session signalled shutdown; let the writer drain what's queued.
    let _ = writer.await;
    code
}

/// Write reply lines to stdout, draining the queue on shutdown.
async fn write_replies(
    mut reply_rx: ReplyRx,
    mut shutdown: tokio::sync::watch::Receiver<Option<u8>>,
) {
    let mut stdout = tokio::io::stdout();
    loop {
        tokio::select! {
            biased;
            line = reply_rx.recv() => match line {
                Some(line) => {
                    if write_line(&mut stdout, &line).await.is_err() {
                        return;
                    }
                }
                None => return,
            },
            _ = shutdown.changed() => {
                while let Ok(line) = reply_rx.try_recv() {
                    if write_line(&mut stdout, &line).await.is_err() {
                        return;
                    }
                }
                return;
            }
        }
    }
}

async fn write_line(stdout: &mut tokio::io::Stdout, line: &str) -> std::io::Result<()> {
    stdout.write_all(line.as_bytes()).await?;
    stdout.write_all(b"\n").await?;
    stdout.flush().await
}
