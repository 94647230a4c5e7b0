use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use scalelog::config::{parse_seconds, EmptySessionPolicy, SessionConfig};
use scalelog::progress::{Progress, ProgressEvent};
use scalelog::session::SessionState;
use scalelog::signal::{install_interrupt_handler, StopSignals};

/// Logs readings from a benchtop scale (or any device that prints one
/// number per line) to a CSV file, timestamped in seconds since start.
#[derive(Parser, Debug)]
#[command(version)]
struct Args {
    /// Serial port, e.g. COM3 or /dev/ttyUSB0.
    address: Option<String>,

    /// Options file with one `option,value` pair per line. Flags given on
    /// the command line take precedence.
    #[arg(long)]
    config: Option<PathBuf>,

    #[arg(long)]
    baud_rate: Option<u32>,

    /// Read timeout in seconds. Also bounds how long stopping can take.
    #[arg(long, value_parser = parse_seconds)]
    read_timeout_s: Option<std::time::Duration>,

    /// Output file. Defaults to logs/<prefix>_<DDMMYY>_<HHMM>.csv next to
    /// this executable.
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Stop after this many seconds. Logs until Ctrl+C if omitted.
    #[arg(short, long, value_parser = parse_seconds)]
    duration_s: Option<std::time::Duration>,

    /// Units label, for display only.
    #[arg(short, long)]
    units: Option<String>,

    /// Regex used to extract the value from each line. The first capture
    /// group is used if there is one.
    #[arg(long)]
    value_pattern: Option<String>,

    /// Flush the output every N rows.
    #[arg(long)]
    flush_every_n_rows: Option<usize>,

    /// Keep whatever the device queued before logging started.
    #[arg(long)]
    keep_buffer: bool,

    /// What to do with the output when nothing was captured.
    #[arg(long, value_parser = ["header-only", "discard"])]
    empty_session: Option<String>,

    /// Don't ring the terminal bell when the duration elapses.
    #[arg(long)]
    quiet: bool,

    #[arg(long)]
    logs_dir: Option<PathBuf>,

    #[arg(long)]
    file_prefix: Option<String>,
}

impl Args {
    fn into_config(self) -> Result<SessionConfig, String> {
        let mut config = match &self.config {
            Some(path) => {
                let file = std::fs::File::open(path)
                    .map_err(|e| format!("failed to open {}: {e}", path.display()))?;
                let mut reader = std::io::BufReader::new(file);
                SessionConfig::parse_from_csv(&mut reader)
                    .map_err(|e| format!("{}: {e}", path.display()))?
            }
            None => SessionConfig::default(),
        };

        if let Some(address) = self.address {
            config.address = address;
        }
        if let Some(baud_rate) = self.baud_rate {
            config.baud_rate = baud_rate;
        }
        if let Some(read_timeout) = self.read_timeout_s {
            config.read_timeout = read_timeout;
        }
        if self.output.is_some() {
            config.output_path = self.output;
        }
        if self.duration_s.is_some() {
            config.duration = self.duration_s;
        }
        if let Some(units) = self.units {
            config.units = units;
        }
        if let Some(value_pattern) = self.value_pattern {
            config.value_pattern = value_pattern;
        }
        if let Some(flush_every) = self.flush_every_n_rows {
            config.flush_every = flush_every;
        }
        if self.keep_buffer {
            config.clear_buffer_on_start = false;
        }
        if let Some(policy) = self.empty_session {
            config.empty_session = policy.parse::<EmptySessionPolicy>()?;
        }
        if self.quiet {
            config.completion_cue = false;
        }
        if self.logs_dir.is_some() {
            config.logs_dir = self.logs_dir;
        }
        if let Some(prefix) = self.file_prefix {
            config.file_prefix = prefix;
        }
        Ok(config)
    }
}

fn main() -> ExitCode {
    // Logs go to stderr, progress to stdout.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    eprintln!("scalelog (v{})", env!("CARGO_PKG_VERSION"));

    let config = match Args::parse().into_config() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{e}");
            return ExitCode::FAILURE;
        }
    };

    let signals = StopSignals::new();
    if let Err(e) = install_interrupt_handler(signals.interrupt.clone()) {
        eprintln!("Failed to install Ctrl+C handler: {e}");
        return ExitCode::FAILURE;
    }

    let progress = Progress::new(|event: &ProgressEvent| {
        let mut stdout = std::io::stdout().lock();
        // Blank line before terminal notices, like the readings scrolling
        // past had been interrupted.
        let prefix = match event {
            ProgressEvent::Reading { .. } | ProgressEvent::Started { .. } => "",
            _ => "\n",
        };
        let _ = writeln!(stdout, "{prefix}{event}");
        let _ = stdout.flush();
    });

    match scalelog::run(&config, signals, progress) {
        Ok(session) => match session.state() {
            SessionState::Failed => ExitCode::FAILURE,
            _ => ExitCode::SUCCESS,
        },
        Err(e) => {
            eprintln!("{e}");
            ExitCode::FAILURE
        }
    }
}
