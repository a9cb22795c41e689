//! rotatelog runtime: operational logging sink and signal-supervised run.

mod error;
pub mod logging;
mod runtime;

pub use error::RuntimeError;
pub use logging::{build_dispatch, LineFormat, LogOutput, RotatingLogFile};
pub use runtime::{
    run, run_until, start_blocking, RunOutcome, ShutdownSignal, SignalListener, Supervisor,
    SHUTDOWN_GRACE,
};
