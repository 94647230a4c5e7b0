extern crate libc;

use std::collections::VecDeque;
use std::path::PathBuf;
use std::time::Duration;

use crate::config::SessionConfig;
use crate::parser::{parse_value, ValuePattern};
use crate::progress::ProgressEvent;
use crate::session::StopReason;
use crate::signal::StopSignals;
use crate::Acquisition;

#[repr(C)]
#[derive(Debug, PartialEq)]
pub enum ScaleLogEvent {
    Reading {
        #[allow(dead_code)] // Used via FFI
        elapsed_seconds: f64,
        #[allow(dead_code)] // Used via FFI
        value: f64,
    },
    Completed,
    Cancelled,
    Interrupted,
    Failed,
    NoData,
}

#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ScaleLogStopReason {
    Duration,
    Cancelled,
    Interrupted,
    TransportClosed,
    TransportFailed,
    SinkFailed,
    /// The worker thread panicked. Rows flushed before that are still on
    /// disk.
    WorkerPanicked,
}

impl From<&StopReason> for ScaleLogStopReason {
    fn from(reason: &StopReason) -> Self {
        match reason {
            StopReason::Duration => ScaleLogStopReason::Duration,
            StopReason::Cancelled => ScaleLogStopReason::Cancelled,
            StopReason::Interrupted => ScaleLogStopReason::Interrupted,
            StopReason::TransportClosed => ScaleLogStopReason::TransportClosed,
            StopReason::TransportFailed { .. } => ScaleLogStopReason::TransportFailed,
            StopReason::SinkFailed { .. } => ScaleLogStopReason::SinkFailed,
        }
    }
}

impl ScaleLogEvent {
    // Only events a GUI needs to render are exposed; start/save notices are
    // logged instead.
    fn from_progress(event: &ProgressEvent) -> Option<ScaleLogEvent> {
        match event {
            ProgressEvent::Reading { reading, .. } => Some(ScaleLogEvent::Reading {
                elapsed_seconds: reading.elapsed_seconds,
                value: reading.value,
            }),
            ProgressEvent::Completed => Some(ScaleLogEvent::Completed),
            ProgressEvent::Cancelled => Some(ScaleLogEvent::Cancelled),
            ProgressEvent::Interrupted => Some(ScaleLogEvent::Interrupted),
            ProgressEvent::TransportClosed | ProgressEvent::Failed { .. } => {
                Some(ScaleLogEvent::Failed)
            }
            ProgressEvent::NoData => Some(ScaleLogEvent::NoData),
            ProgressEvent::Started { .. }
            | ProgressEvent::Saved { .. }
            | ProgressEvent::Discarded { .. } => None,
        }
    }
}

/// FFI wrapper for Acquisition. Events are buffered here until the host
/// polls for them, so the host can drain on its own schedule (e.g. from a UI
/// timer) and never blocks the worker.
pub struct ScaleLogSession {
    acquisition: Option<Acquisition>,
    pending: VecDeque<ScaleLogEvent>,
    stop_reason: Option<ScaleLogStopReason>,
}

fn string_from_raw(raw: *const libc::c_char) -> Option<String> {
    if raw.is_null() {
        return None;
    }
    let cstr = unsafe { std::ffi::CStr::from_ptr(raw) };
    Some(String::from_utf8_lossy(cstr.to_bytes()).to_string())
}

impl ScaleLogSession {
    /// Opens the scale at `address_raw` with default settings and starts
    /// logging on a worker thread. `output_path_raw` may be NULL to
    /// auto-generate a file name; `duration_s` <= 0 logs until cancelled.
    /// Returns NULL if the port or the output could not be opened.
    /// Non-rust callers must call scalelog_session_free to release the
    /// returned session.
    #[export_name = "scalelog_session_start"]
    pub extern "C" fn start(
        address_raw: *const libc::c_char,
        output_path_raw: *const libc::c_char,
        duration_s: f64,
    ) -> *mut ScaleLogSession {
        let Some(address) = string_from_raw(address_raw) else {
            return std::ptr::null_mut();
        };
        let config = SessionConfig {
            output_path: string_from_raw(output_path_raw).map(PathBuf::from),
            duration: if duration_s > 0.0 {
                Duration::try_from_secs_f64(duration_s).ok()
            } else {
                None
            },
            ..SessionConfig::new(address)
        };
        match Acquisition::spawn(&config, StopSignals::new()) {
            Ok(acquisition) => Box::into_raw(Box::new(ScaleLogSession {
                acquisition: Some(acquisition),
                pending: VecDeque::new(),
                stop_reason: None,
            })),
            Err(e) => {
                tracing::error!("failed to start session: {e}");
                std::ptr::null_mut()
            }
        }
    }

    #[export_name = "scalelog_session_cancel"]
    pub extern "C" fn cancel(&self) {
        if let Some(acquisition) = &self.acquisition {
            acquisition.cancel();
        }
    }

    #[export_name = "scalelog_session_is_finished"]
    pub extern "C" fn is_finished(&self) -> bool {
        self.acquisition
            .as_ref()
            .map_or(true, |acquisition| acquisition.is_finished())
    }

    fn drain(&mut self) {
        if let Some(acquisition) = &self.acquisition {
            self.pending.extend(
                acquisition
                    .drain_events()
                    .iter()
                    .filter_map(ScaleLogEvent::from_progress),
            );
        }
    }

    /// Pops the oldest pending event into `event`. Returns false (leaving
    /// `event` untouched) if there is none. Never blocks.
    #[export_name = "scalelog_session_poll_event"]
    pub extern "C" fn poll_event(&mut self, event: &mut ScaleLogEvent) -> bool {
        self.drain();
        match self.pending.pop_front() {
            Some(next) => {
                *event = next;
                true
            }
            None => false,
        }
    }

    /// Blocks until the session has stopped and returns why. Cancel first to
    /// stop a continuous session. Events remain available via poll_event.
    #[export_name = "scalelog_session_wait"]
    pub extern "C" fn wait(&mut self) -> ScaleLogStopReason {
        if let Some(reason) = self.stop_reason {
            return reason;
        }
        while !self.is_finished() {
            self.drain();
            std::thread::sleep(Duration::from_millis(10));
        }
        // The worker is done, so everything it emitted is in the channel.
        self.drain();
        let reason = match self.acquisition.take().map(Acquisition::join) {
            Some(Ok(session)) => ScaleLogStopReason::from(&session.stop_reason),
            Some(Err(_)) | None => ScaleLogStopReason::WorkerPanicked,
        };
        self.stop_reason = Some(reason);
        reason
    }

    /// Frees the session. A session that is still running is cancelled, and
    /// finishes writing its output in the background.
    #[export_name = "scalelog_session_free"]
    pub extern "C" fn free(&mut self) {
        unsafe {
            drop(Box::from_raw(self));
        }
    }
}

/// Extracts the first number in `line_raw` using the default pattern. Returns
/// false if the line contains no number.
#[export_name = "scalelog_parse_value"]
pub extern "C" fn ffi_parse_value(line_raw: *const libc::c_char, value: &mut f64) -> bool {
    let Some(line) = string_from_raw(line_raw) else {
        return false;
    };
    match parse_value(line.trim(), &ValuePattern::default()) {
        Some(parsed) => {
            *value = parsed;
            true
        }
        None => false,
    }
}
