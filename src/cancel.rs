use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Shared interruption flag.
///
/// Cloning yields a handle to the same flag. Long running loops poll
/// [`CancelToken::is_cancelled`] between chunks, rounds and trials; nothing
/// is preempted mid-call.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// Set the flag on Ctrl-C. Only one handler can be installed per process.
    pub fn install_ctrlc_handler(&self) -> Result<(), ctrlc::Error> {
        let token = self.clone();
        ctrlc::set_handler(move || token.cancel())
    }
}
