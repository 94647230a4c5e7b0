use clap::Parser;

use scalelog::config::SessionConfig;
use scalelog::parser::{decode_line, parse_value, ValuePattern, DEFAULT_VALUE_PATTERN};
use scalelog::signal::{install_interrupt_handler, StopFlag};
use scalelog::transport::{ReadOutcome, Transport};

/// Dumps whatever a scale sends, one line at a time, alongside the value
/// that would be logged for it. Handy for working out a value pattern for an
/// unfamiliar device.
#[derive(Parser, Debug)]
#[command(version)]
struct Args {
    /// Serial port, e.g. COM3 or /dev/ttyUSB0.
    address: String,

    #[arg(long, default_value_t = 9600)]
    baud_rate: u32,

    #[arg(long, default_value = DEFAULT_VALUE_PATTERN)]
    value_pattern: String,
}

fn main() {
    eprintln!(
        "scalelog spy (v{}). Prints raw device output and the value parsed from each line.",
        env!("CARGO_PKG_VERSION")
    );
    let args = Args::parse();

    let pattern = match ValuePattern::new(&args.value_pattern) {
        Ok(pattern) => pattern,
        Err(e) => {
            eprintln!("Invalid value pattern: {e}");
            return;
        }
    };
    let config = SessionConfig {
        baud_rate: args.baud_rate,
        ..SessionConfig::new(args.address)
    };
    let mut transport = match scalelog::open_transport(&config) {
        Ok(transport) => transport,
        Err(e) => {
            eprintln!("{e}");
            return;
        }
    };

    let stop = StopFlag::new();
    if let Err(e) = install_interrupt_handler(stop.clone()) {
        eprintln!("Failed to install Ctrl+C handler: {e}");
        return;
    }

    while !stop.is_raised() {
        match transport.read_line() {
            Ok(ReadOutcome::Line(raw)) => {
                let Some(line) = decode_line(&raw) else {
                    println!("{raw:02x?}\t(no text)");
                    continue;
                };
                match parse_value(&line, &pattern) {
                    Some(value) => println!("{line}\t=> {value}"),
                    None => println!("{line}\t(ignored)"),
                }
            }
            Ok(ReadOutcome::Timeout) => (),
            Ok(ReadOutcome::Closed) => {
                eprintln!("Device closed the connection.");
                return;
            }
            Err(e) => {
                eprintln!("Read failed: {e}");
                return;
            }
        }
    }
}
