extern crate libc;
extern crate serialport;

pub mod acquisition;
pub mod config;
pub mod error;
mod ffi;
pub mod naming;
pub mod parser;
pub mod progress;
pub mod session;
pub mod signal;
pub mod sink;
pub mod transport;

use std::path::PathBuf;
use std::sync::mpsc::Receiver;
use std::thread;

use tracing::{debug, error, info};

use acquisition::{clear_stale_input, AcquisitionLoop, TerminalBell};
use config::{EmptySessionPolicy, SessionConfig};
pub use error::{Error, Result};
use progress::{Progress, ProgressEvent};
use session::Session;
use signal::StopSignals;
use sink::CsvFileSink;
use transport::{SerialTransport, Transport};

/// Everything a session needs, opened and ready to go. Building one of these
/// is where all the fatal errors happen, so that a Session only ever exists
/// once the transport is open and the output is writable.
struct PreparedSession<T: Transport> {
    acquisition: AcquisitionLoop<T>,
    sink: CsvFileSink,
    empty_session: EmptySessionPolicy,
    started: ProgressEvent,
}

impl PreparedSession<SerialTransport> {
    fn open(config: &SessionConfig, signals: StopSignals, progress: Progress) -> Result<Self> {
        config.validate()?;
        let pattern = config.compile_pattern()?;

        // The transport goes first: if the device isn't there, no output
        // artifact should be left behind.
        let mut transport =
            SerialTransport::open(&config.address, config.baud_rate, config.read_timeout)
                .map_err(|source| Error::TransportOpen {
                    address: config.address.clone(),
                    source,
                })?;
        if config.clear_buffer_on_start {
            clear_stale_input(&mut transport);
        }

        let sink = match &config.output_path {
            Some(path) => CsvFileSink::create(path, config.flush_every).map_err(|source| {
                Error::Output {
                    path: path.clone(),
                    source,
                }
            })?,
            None => {
                let logs_dir = match &config.logs_dir {
                    Some(dir) => dir.clone(),
                    None => naming::default_logs_dir().map_err(|source| Error::Output {
                        path: PathBuf::from("logs"),
                        source,
                    })?,
                };
                let (path, file) = naming::reserve_output_file(
                    &logs_dir,
                    &config.file_prefix,
                    &config.file_extension,
                    naming::now(),
                )
                .map_err(|source| Error::Output {
                    path: logs_dir.clone(),
                    source,
                })?;
                CsvFileSink::from_file(path, file, config.flush_every)
            }
        };
        debug!(address = %config.address, output = %sink.path().display(), "session prepared");

        let mut acquisition = AcquisitionLoop::new(transport, pattern)
            .duration(config.duration)
            .signals(signals)
            .units(config.units.clone())
            .progress(progress);
        if config.completion_cue {
            acquisition = acquisition.completion_cue(TerminalBell);
        }

        Ok(PreparedSession {
            acquisition,
            started: ProgressEvent::Started {
                address: config.address.clone(),
                baud_rate: config.baud_rate,
                output: Some(sink.path().to_path_buf()),
                duration: config.duration,
            },
            sink,
            empty_session: config.empty_session,
        })
    }

}

impl<T: Transport> PreparedSession<T> {
    fn run(self, progress: &Progress) -> Session {
        let PreparedSession {
            acquisition,
            mut sink,
            empty_session,
            started,
        } = self;

        progress.emit(&started);
        let mut session = acquisition.run(&mut sink);

        if session.is_empty() && empty_session == EmptySessionPolicy::Discard {
            match sink.discard() {
                Ok(path) => progress.emit(&ProgressEvent::Discarded { path }),
                Err(e) => error!("failed to remove empty output: {e}"),
            }
            return session;
        }

        let path = sink.path().to_path_buf();
        info!(rows = sink.rows(), path = %path.display(), "session saved");
        progress.emit(&ProgressEvent::Saved {
            path: path.clone(),
            rows: sink.rows(),
        });
        session.output = Some(path);
        session
    }
}

/// Runs a complete session on the calling thread, returning once it has
/// stopped. Progress events are delivered to `progress` on this thread.
///
/// Errors are only returned for problems that prevent a session from
/// starting. Anything that goes wrong once the session is running ends up in
/// `Session::stop_reason` instead, with the readings captured so far intact.
pub fn run(config: &SessionConfig, signals: StopSignals, progress: Progress) -> Result<Session> {
    let prepared = PreparedSession::open(config, signals, progress.clone())?;
    Ok(prepared.run(&progress))
}

/// A session running on its own worker thread, for callers (GUIs, mostly)
/// that must not block on the device.
///
/// The supervisor only ever talks to the worker through two one-way
/// channels: the cancellation flag going in, and progress events coming out.
/// Neither side blocks on the other.
pub struct Acquisition {
    signals: StopSignals,
    rx_event: Receiver<ProgressEvent>,
    worker: Option<thread::JoinHandle<Session>>,
}

impl Acquisition {
    /// Opens the device and the output on the calling thread - so that open
    /// failures are reported here, before any session exists - and then
    /// starts acquiring on a worker thread.
    pub fn spawn(config: &SessionConfig, signals: StopSignals) -> Result<Acquisition> {
        let (progress, rx_event) = Progress::channel();
        let prepared = PreparedSession::open(config, signals.clone(), progress.clone())?;
        Acquisition::start(prepared, signals, progress, rx_event)
    }

    fn start<T: Transport + Send + 'static>(
        prepared: PreparedSession<T>,
        signals: StopSignals,
        progress: Progress,
        rx_event: Receiver<ProgressEvent>,
    ) -> Result<Acquisition> {
        let worker = thread::Builder::new()
            .name("scalelog-acquisition".to_string())
            .spawn(move || prepared.run(&progress))
            .map_err(Error::Worker)?;
        Ok(Acquisition {
            signals,
            rx_event,
            worker: Some(worker),
        })
    }

    /// Asks the worker to stop. Idempotent; the worker notices within one
    /// read timeout.
    pub fn cancel(&self) {
        self.signals.cancel.raise();
    }

    pub fn is_finished(&self) -> bool {
        self.worker
            .as_ref()
            .map_or(true, |worker| worker.is_finished())
    }

    /// Returns all events emitted since the last call, without blocking.
    pub fn drain_events(&self) -> Vec<ProgressEvent> {
        self.rx_event.try_iter().collect()
    }

    /// Waits for the session to end. Does not cancel it: call `cancel` first
    /// to stop a continuous session.
    pub fn join(mut self) -> thread::Result<Session> {
        match self.worker.take() {
            Some(worker) => worker.join(),
            None => Err(Box::new("acquisition worker already joined")),
        }
    }
}

impl Drop for Acquisition {
    // Dropping the handle stops the session: the worker finishes its current
    // read, finalizes the output, and exits on its own.
    fn drop(&mut self) {
        if self.worker.is_some() {
            self.cancel();
        }
    }
}

/// Opens a transport without starting a session, e.g. for dumping raw device
/// output.
pub fn open_transport(config: &SessionConfig) -> Result<impl Transport> {
    SerialTransport::open(&config.address, config.baud_rate, config.read_timeout).map_err(
        |source| Error::TransportOpen {
            address: config.address.clone(),
            source,
        },
    )
}
