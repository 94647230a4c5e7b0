use std::fmt;
use std::path::PathBuf;
use std::sync::mpsc::{self, Receiver};
use std::sync::Arc;
use std::time::Duration;

use crate::session::{Reading, StopReason};

/// Events emitted by the acquisition worker, in the order they happen.
/// Readings are emitted in exactly the order they were written to the sink.
#[derive(Clone, Debug, PartialEq)]
pub enum ProgressEvent {
    Started {
        address: String,
        baud_rate: u32,
        output: Option<PathBuf>,
        duration: Option<Duration>,
    },
    Reading {
        reading: Reading,
        units: String,
    },
    /// The configured duration elapsed. The completion cue fires right after
    /// this event.
    Completed,
    Cancelled,
    Interrupted,
    TransportClosed,
    Failed {
        message: String,
    },
    /// The session ended without a single reading.
    NoData,
    Saved {
        path: PathBuf,
        rows: usize,
    },
    Discarded {
        path: PathBuf,
    },
}

impl ProgressEvent {
    pub(crate) fn stopped(reason: &StopReason) -> ProgressEvent {
        match reason {
            StopReason::Duration => ProgressEvent::Completed,
            StopReason::Cancelled => ProgressEvent::Cancelled,
            StopReason::Interrupted => ProgressEvent::Interrupted,
            StopReason::TransportClosed => ProgressEvent::TransportClosed,
            StopReason::TransportFailed { message } | StopReason::SinkFailed { message } => {
                ProgressEvent::Failed {
                    message: message.clone(),
                }
            }
        }
    }
}

impl fmt::Display for ProgressEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProgressEvent::Started {
                address,
                baud_rate,
                output,
                duration,
            } => {
                write!(f, "Reading {address} @ {baud_rate}.")?;
                if let Some(output) = output {
                    write!(f, " Logging to {}.", output.display())?;
                }
                match duration {
                    Some(duration) => write!(f, " Duration: {}s.", duration.as_secs_f64()),
                    None => write!(f, " Continuous."),
                }
            }
            ProgressEvent::Reading { reading, units } => {
                write!(f, "{:10.3} s | {}", reading.elapsed_seconds, reading.value)?;
                if !units.is_empty() {
                    write!(f, " {units}")?;
                }
                Ok(())
            }
            ProgressEvent::Completed => write!(f, "Timer complete."),
            ProgressEvent::Cancelled => write!(f, "Stopped by supervisor."),
            ProgressEvent::Interrupted => write!(f, "Stopped by user (Ctrl+C)."),
            ProgressEvent::TransportClosed => write!(f, "Device closed the connection."),
            ProgressEvent::Failed { message } => write!(f, "Stopped on error: {message}"),
            ProgressEvent::NoData => write!(f, "No data captured."),
            ProgressEvent::Saved { path, rows } => {
                write!(f, "Saved {rows} rows to {}.", path.display())
            }
            ProgressEvent::Discarded { path } => {
                write!(f, "Nothing to save, removed {}.", path.display())
            }
        }
    }
}

/// Where progress events go. Events are delivered on the worker thread, so
/// callbacks must be quick and must never block - `Progress::channel` is
/// the usual way to hand events to another thread.
#[derive(Clone, Default)]
pub struct Progress {
    callback: Option<Arc<dyn Fn(&ProgressEvent) + Send + Sync + 'static>>,
}

impl Progress {
    pub fn new(callback: impl Fn(&ProgressEvent) + Send + Sync + 'static) -> Progress {
        Progress {
            callback: Some(Arc::new(callback)),
        }
    }

    /// Discards all events.
    pub fn none() -> Progress {
        Progress::default()
    }

    /// Returns a Progress that forwards events into an unbounded channel. The
    /// worker never waits for the receiver, and a dropped receiver is
    /// ignored.
    pub fn channel() -> (Progress, Receiver<ProgressEvent>) {
        let (tx_event, rx_event) = mpsc::channel();
        let progress = Progress::new(move |event: &ProgressEvent| {
            let _ = tx_event.send(event.clone());
        });
        (progress, rx_event)
    }

    pub fn emit(&self, event: &ProgressEvent) {
        if let Some(callback) = &self.callback {
            callback(event);
        }
    }
}

impl fmt::Debug for Progress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Progress")
            .field("callback", &self.callback.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        struct TestCase<'a> {
            name: &'a str,
            input: ProgressEvent,
            expected: &'a str,
        }
        let tests = [
            TestCase {
                name: "ReadingWithUnits",
                input: ProgressEvent::Reading {
                    reading: Reading {
                        elapsed_seconds: 1.23456,
                        value: 12.5,
                    },
                    units: "g".to_string(),
                },
                expected: "     1.235 s | 12.5 g",
            },
            TestCase {
                name: "ReadingWithoutUnits",
                input: ProgressEvent::Reading {
                    reading: Reading {
                        elapsed_seconds: 0.0,
                        value: -0.5,
                    },
                    units: String::new(),
                },
                expected: "     0.000 s | -0.5",
            },
            TestCase {
                name: "StartedTimed",
                input: ProgressEvent::Started {
                    address: "COM3".to_string(),
                    baud_rate: 9600,
                    output: Some(PathBuf::from("out.csv")),
                    duration: Some(Duration::from_secs(60)),
                },
                expected: "Reading COM3 @ 9600. Logging to out.csv. Duration: 60s.",
            },
            TestCase {
                name: "StartedContinuous",
                input: ProgressEvent::Started {
                    address: "/dev/ttyUSB0".to_string(),
                    baud_rate: 9600,
                    output: None,
                    duration: None,
                },
                expected: "Reading /dev/ttyUSB0 @ 9600. Continuous.",
            },
            TestCase {
                name: "Completed",
                input: ProgressEvent::Completed,
                expected: "Timer complete.",
            },
            TestCase {
                name: "Interrupted",
                input: ProgressEvent::Interrupted,
                expected: "Stopped by user (Ctrl+C).",
            },
        ];
        for case in tests {
            let got = case.input.to_string();
            assert_eq!(
                got, case.expected,
                "{}: got={got:?}, want={:?}",
                case.name, case.expected
            );
        }
    }

    #[test]
    fn test_channel_survives_dropped_receiver() {
        let (progress, rx_event) = Progress::channel();
        progress.emit(&ProgressEvent::Completed);
        assert_eq!(rx_event.try_recv(), Ok(ProgressEvent::Completed));
        drop(rx_event);
        // Must not panic.
        progress.emit(&ProgressEvent::NoData);
    }

    #[test]
    fn test_stopped_maps_every_reason() {
        assert_eq!(
            ProgressEvent::stopped(&StopReason::Duration),
            ProgressEvent::Completed
        );
        assert_eq!(
            ProgressEvent::stopped(&StopReason::SinkFailed {
                message: "disk full".to_string()
            }),
            ProgressEvent::Failed {
                message: "disk full".to_string()
            }
        );
    }
}
