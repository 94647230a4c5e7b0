use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// A one-way, idempotent stop request that can be raised from any thread and
/// is polled (never waited on) by the acquisition worker.
#[derive(Clone, Debug, Default)]
pub struct StopFlag(Arc<AtomicBool>);

impl StopFlag {
    pub fn new() -> StopFlag {
        StopFlag::default()
    }

    pub fn raise(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_raised(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// The two external ways of stopping a session: cancellation by a supervisor
/// (e.g. a Stop button), and process interruption (Ctrl+C). They're kept
/// apart because they end in different terminal states.
#[derive(Clone, Debug, Default)]
pub struct StopSignals {
    pub cancel: StopFlag,
    pub interrupt: StopFlag,
}

impl StopSignals {
    pub fn new() -> StopSignals {
        StopSignals::default()
    }
}

/// Routes Ctrl+C into `flag`. ctrlc only permits one
/// handler per process, so this fails if a handler was already installed.
pub fn install_interrupt_handler(flag: StopFlag) -> Result<(), ctrlc::Error> {
    ctrlc::set_handler(move || {
        flag.raise();
    })
}
