use std::path::PathBuf;
use std::time::{Duration, Instant};

/// A single accepted measurement. `elapsed_seconds` is measured from the
/// instant the session entered Running, and is taken after the read that
/// delivered the line returned.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Reading {
    pub elapsed_seconds: f64,
    pub value: f64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Running,
    Completed,
    Cancelled,
    Interrupted,
    Failed,
}

#[derive(Clone, Debug, PartialEq)]
pub enum StopReason {
    /// The configured duration elapsed.
    Duration,
    /// The supervisor raised the cancellation flag.
    Cancelled,
    /// A process-level interrupt (Ctrl+C) was received.
    Interrupted,
    /// The transport reported end-of-stream, e.g. because the device went
    /// away and the OS closed the port.
    TransportClosed,
    TransportFailed { message: String },
    /// Writing to (or the final flush of) the sink failed. Rows written
    /// before the failure are still in the sink.
    SinkFailed { message: String },
}

impl StopReason {
    pub fn state(&self) -> SessionState {
        match self {
            StopReason::Duration => SessionState::Completed,
            StopReason::Cancelled => SessionState::Cancelled,
            StopReason::Interrupted => SessionState::Interrupted,
            StopReason::TransportClosed
            | StopReason::TransportFailed { .. }
            | StopReason::SinkFailed { .. } => SessionState::Failed,
        }
    }

    pub fn is_failure(&self) -> bool {
        self.state() == SessionState::Failed
    }
}

/// A session that is still Running. Only the acquisition loop holds one of
/// these, and it is the only writer of readings.
pub(crate) struct ActiveSession {
    start: Instant,
    readings: Vec<Reading>,
}

impl ActiveSession {
    pub(crate) fn begin() -> ActiveSession {
        ActiveSession {
            start: Instant::now(),
            readings: Vec::new(),
        }
    }

    pub(crate) fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    /// Timestamps `value` against the session start. Callers push the
    /// returned reading once it has been handed to the sink.
    pub(crate) fn stamp(&self, value: f64) -> Reading {
        Reading {
            elapsed_seconds: self.elapsed().as_secs_f64(),
            value,
        }
    }

    pub(crate) fn push(&mut self, reading: Reading) {
        self.readings.push(reading);
    }

    pub(crate) fn readings(&self) -> &[Reading] {
        &self.readings
    }

    pub(crate) fn finish(self, stop_reason: StopReason) -> Session {
        Session {
            start: self.start,
            run_time: self.start.elapsed(),
            stop_reason,
            readings: self.readings,
            output: None,
        }
    }
}

/// A finished session. Readings are in acceptance order, which is also the
/// order they were written to the sink.
#[derive(Clone, Debug)]
pub struct Session {
    pub start: Instant,
    pub run_time: Duration,
    pub stop_reason: StopReason,
    pub readings: Vec<Reading>,
    /// The output artifact, if one was kept.
    pub output: Option<PathBuf>,
}

impl Session {
    pub fn state(&self) -> SessionState {
        self.stop_reason.state()
    }

    pub fn is_empty(&self) -> bool {
        self.readings.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stamps_are_monotonic() {
        let mut session = ActiveSession::begin();
        let mut previous = 0.0;
        for value in 0..100 {
            let reading = session.stamp(value as f64);
            assert!(reading.elapsed_seconds >= previous);
            previous = reading.elapsed_seconds;
            session.push(reading);
        }
        let session = session.finish(StopReason::Cancelled);
        assert_eq!(session.readings.len(), 100);
        assert_eq!(session.state(), SessionState::Cancelled);
        assert!(session.run_time.as_secs_f64() >= previous);
    }

    #[test]
    fn test_stop_reason_state() {
        let tests = [
            (StopReason::Duration, SessionState::Completed),
            (StopReason::Cancelled, SessionState::Cancelled),
            (StopReason::Interrupted, SessionState::Interrupted),
            (StopReason::TransportClosed, SessionState::Failed),
            (
                StopReason::TransportFailed {
                    message: "gone".to_string(),
                },
                SessionState::Failed,
            ),
            (
                StopReason::SinkFailed {
                    message: "disk full".to_string(),
                },
                SessionState::Failed,
            ),
        ];
        for (reason, expected) in tests {
            assert_eq!(reason.state(), expected, "{reason:?}");
            assert_eq!(reason.is_failure(), expected == SessionState::Failed);
        }
    }
}
