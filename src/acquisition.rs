use std::io::Write;
use std::time::Duration;

use tracing::{debug, error, info, trace, warn};

use crate::parser::{decode_line, parse_value, ValuePattern};
use crate::progress::{Progress, ProgressEvent};
use crate::session::{ActiveSession, Session, StopReason};
use crate::signal::StopSignals;
use crate::sink::Sink;
use crate::transport::{ReadOutcome, Transport};

/// Fired exactly once when a timed session reaches its deadline, and never
/// for any other way of stopping.
pub trait CompletionCue: Send {
    fn fire(&self);
}

impl<F: Fn() + Send> CompletionCue for F {
    fn fire(&self) {
        self()
    }
}

/// Rings the terminal bell on stderr.
pub struct TerminalBell;

impl CompletionCue for TerminalBell {
    fn fire(&self) {
        let mut stderr = std::io::stderr();
        // Nobody to tell if this fails.
        let _ = stderr.write_all(b"\x07");
        let _ = stderr.flush();
    }
}

/// The acquisition loop: owns the transport for the lifetime of a session,
/// pulls lines from it, and pushes every line that parses as a value to the
/// sink.
///
/// Every iteration first checks the deadline, then cancellation, then
/// interruption, and only then blocks on a read. Reads are bounded by the
/// transport's timeout, so a silent device delays stopping by at most one
/// read timeout.
///
/// Sessions start (t=0) when `run` is entered, not when the first reading
/// arrives, i.e. elapsed times include however long the device took to start
/// talking.
pub struct AcquisitionLoop<T: Transport> {
    transport: T,
    pattern: ValuePattern,
    duration: Option<Duration>,
    signals: StopSignals,
    units: String,
    cue: Option<Box<dyn CompletionCue>>,
    progress: Progress,
}

impl<T: Transport> AcquisitionLoop<T> {
    pub fn new(transport: T, pattern: ValuePattern) -> AcquisitionLoop<T> {
        AcquisitionLoop {
            transport,
            pattern,
            duration: None,
            signals: StopSignals::default(),
            units: String::new(),
            cue: None,
            progress: Progress::none(),
        }
    }

    /// Stop (as Completed) once `duration` has elapsed. Without a duration
    /// the loop runs until it is cancelled, interrupted, or the transport
    /// fails.
    pub fn duration(mut self, duration: Option<Duration>) -> Self {
        self.duration = duration;
        self
    }

    pub fn signals(mut self, signals: StopSignals) -> Self {
        self.signals = signals;
        self
    }

    /// Display-only units label attached to progress events.
    pub fn units(mut self, units: impl Into<String>) -> Self {
        self.units = units.into();
        self
    }

    pub fn completion_cue(mut self, cue: impl CompletionCue + 'static) -> Self {
        self.cue = Some(Box::new(cue));
        self
    }

    pub fn progress(mut self, progress: Progress) -> Self {
        self.progress = progress;
        self
    }

    /// Runs a whole session, blocking until one of the stop conditions is
    /// met. Always finishes the sink and releases the transport before
    /// returning, whatever the reason for stopping.
    pub fn run<S: Sink + ?Sized>(self, sink: &mut S) -> Session {
        let AcquisitionLoop {
            mut transport,
            pattern,
            duration,
            signals,
            units,
            cue,
            progress,
        } = self;

        let mut session = ActiveSession::begin();
        debug!(?duration, "acquisition started");

        let mut stop_reason = loop {
            if let Some(duration) = duration {
                if session.elapsed() >= duration {
                    break StopReason::Duration;
                }
            }
            if signals.cancel.is_raised() {
                break StopReason::Cancelled;
            }
            if signals.interrupt.is_raised() {
                break StopReason::Interrupted;
            }

            let raw = match transport.read_line() {
                Ok(ReadOutcome::Line(raw)) => raw,
                Ok(ReadOutcome::Timeout) => continue,
                Ok(ReadOutcome::Closed) => break StopReason::TransportClosed,
                // A signal landed while we were blocked in read(). If it was
                // Ctrl+C, the flag is already up; anything else is just
                // retried.
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => {
                    if signals.interrupt.is_raised() {
                        break StopReason::Interrupted;
                    }
                    continue;
                }
                Err(e) => {
                    break StopReason::TransportFailed {
                        message: e.to_string(),
                    }
                }
            };

            let Some(line) = decode_line(&raw) else {
                continue;
            };
            let Some(value) = parse_value(&line, &pattern) else {
                trace!(line = %line, "discarding line without a value");
                continue;
            };

            // Timestamp on receipt: the read above may have blocked for a
            // while.
            let reading = session.stamp(value);
            if let Err(e) = sink.write_reading(&reading) {
                break StopReason::SinkFailed {
                    message: e.to_string(),
                };
            }
            session.push(reading);
            progress.emit(&ProgressEvent::Reading {
                reading,
                units: units.clone(),
            });
        };

        match &stop_reason {
            StopReason::TransportFailed { message } | StopReason::SinkFailed { message } => {
                error!(reason = ?stop_reason, "acquisition failed: {message}")
            }
            _ => info!(reason = ?stop_reason, "acquisition stopped"),
        }
        progress.emit(&ProgressEvent::stopped(&stop_reason));
        if stop_reason == StopReason::Duration {
            if let Some(cue) = &cue {
                cue.fire();
            }
        }

        // Finalization. This is the only exit path.
        if let Err(e) = sink.finish() {
            error!("failed to finish sink: {e}");
            if !stop_reason.is_failure() {
                stop_reason = StopReason::SinkFailed {
                    message: e.to_string(),
                };
                progress.emit(&ProgressEvent::stopped(&stop_reason));
            }
        }
        drop(transport);

        if session.readings().is_empty() {
            warn!("no data captured");
            progress.emit(&ProgressEvent::NoData);
        }
        session.finish(stop_reason)
    }
}

/// Clears the transport's input queue so that t=0 corresponds to fresh data.
/// Failure is logged and otherwise ignored.
pub fn clear_stale_input(transport: &mut impl Transport) {
    if let Err(e) = transport.clear_input_buffer() {
        warn!("failed to clear input buffer: {e}");
    }
}
