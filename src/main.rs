use clap::{Parser, Subcommand};
use market_replay_lib::logging::{setup_logging, LoggingConfig};
use market_replay_lib::market::types::format_clock;
use market_replay_lib::{PlaybackState, ReplayArgs, ReplayError, ReplayRuntime, ReplaySession};
use std::ops::RangeInclusive;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "market-replay")]
#[command(about = "Replay one trading session of trades and five-level depth")]
#[command(version)]
struct Cli {
    /// Base URL of the session data API.
    #[arg(long, global = true)]
    data_url: Option<String>,
    #[arg(long, global = true, default_value = "info")]
    log_level: String,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List trading dates, newest first.
    Dates,
    /// List instruments traded on a date.
    Instruments { date: String },
    /// Build the session timeline and optionally play it back.
    Replay {
        date: String,
        instrument: String,
        /// Read a pre-converted session JSON file instead of calling the API.
        #[arg(long)]
        file: Option<PathBuf>,
        /// Events per second.
        #[arg(long)]
        rate: Option<f64>,
        /// Minimum gap between timeline points; 0 thins only oversized sessions.
        #[arg(long)]
        interval_ms: Option<u64>,
        #[arg(long)]
        play: bool,
    },
}

#[tokio::main]
async fn main() -> Result<(), ReplayError> {
    let cli = Cli::parse();
    setup_logging(&LoggingConfig {
        level: cli.log_level.clone(),
        ..LoggingConfig::default()
    });

    let (rate, interval_ms) = match &cli.command {
        Commands::Replay {
            rate, interval_ms, ..
        } => (*rate, *interval_ms),
        _ => (None, None),
    };
    let config = ReplayArgs {
        playback_rate: rate,
        timeline_interval_ms: interval_ms,
        data_base_url: cli.data_url.clone(),
        ..ReplayArgs::default()
    }
    .normalize()?;
    let runtime = ReplayRuntime::new(config)?;

    match cli.command {
        Commands::Dates => {
            for date in runtime.list_dates().await? {
                println!("{date}");
            }
        }
        Commands::Instruments { date } => {
            for instrument in runtime.list_instruments(&date).await? {
                println!("{instrument}");
            }
        }
        Commands::Replay {
            date,
            instrument,
            file,
            play,
            ..
        } => {
            let session = match file {
                Some(path) => runtime.load_session_file(&path, &date, &instrument).await?,
                None => runtime.load_session(&date, &instrument).await?,
            };

            println!(
                "{date} {instrument}: {} trades, {} depth snapshots, {} timeline points",
                session.trades().len(),
                session.depths().len(),
                session.len()
            );
            if let Some(stats) = session.summary_stats() {
                println!(
                    "open {:.2} close {:.2} high {:.2} low {:.2} vwap {:.2} volume {} ({:+.2}%)",
                    stats.open,
                    stats.current,
                    stats.high,
                    stats.low,
                    stats.average,
                    stats.total_volume,
                    stats.change_pct
                );
            }

            if play {
                play_to_end(&runtime).await;
            }
        }
    }

    Ok(())
}

async fn play_to_end(runtime: &ReplayRuntime) {
    let mut status_rx = runtime.subscribe();
    runtime.play().await;
    let mut last_printed = None;

    loop {
        let status = *status_rx.borrow_and_update();
        let session = runtime.session();
        // the watch channel keeps only the latest status, so catch up on steps it coalesced
        for index in unprinted_steps(last_printed, status.index) {
            print_step(&session, index);
            last_printed = Some(index);
        }

        if status.state == PlaybackState::Stopped || status_rx.changed().await.is_err() {
            break;
        }
    }
}

fn unprinted_steps(last_printed: Option<usize>, index: usize) -> RangeInclusive<usize> {
    let first = last_printed.map_or(index, |printed| printed + 1);
    first..=index
}

fn print_step(session: &ReplaySession, index: usize) {
    let frame = session.state_at(index);
    let last_trade = frame
        .last_trade()
        .map(|trade| format!("{:.2} x {} {}", trade.price, trade.volume, trade.side.as_str()))
        .unwrap_or_else(|| "-".to_string());
    let book = frame
        .depth
        .map(|depth| {
            format!(
                "{:.2} / {:.2}",
                depth.best_bid().unwrap_or(f64::NAN),
                depth.best_ask().unwrap_or(f64::NAN)
            )
        })
        .unwrap_or_else(|| "-".to_string());
    println!(
        "[{} / {}] {} last {last_trade} book {book}",
        frame.index + 1,
        session.len(),
        format_clock(frame.timestamp_us)
    );
}
