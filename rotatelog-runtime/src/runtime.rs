use std::future::Future;
use std::time::Duration;

use tracing::Dispatch;

use rotatelog_core::paths::ensure_parent_dir;
use rotatelog_core::{CopyReport, InputSource, Shutdown, StreamConfig, StreamError, StreamRotator};

use crate::error::{io_err, RuntimeError};

/// How long a signalled shutdown waits for the copy loop to reach its next
/// safe point before leaving a blocked read to process exit.
pub const SHUTDOWN_GRACE: Duration = Duration::from_millis(250);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownSignal {
    Interrupt,
    Terminate,
}

impl ShutdownSignal {
    pub fn number(self) -> i32 {
        match self {
            ShutdownSignal::Interrupt => 2,
            ShutdownSignal::Terminate => 15,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            ShutdownSignal::Interrupt => "SIGINT",
            ShutdownSignal::Terminate => "SIGTERM",
        }
    }
}

/// How a run ended without error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// The copy loop returned on its own (end of input).
    Finished(CopyReport),
    /// A signal arrived first.
    Interrupted(ShutdownSignal),
}

/// A tokio runtime whose SIGINT/SIGTERM listeners are registered up front.
///
/// Build it before anything else so a signal arriving during logging setup
/// or input validation is still caught and logged.
pub struct Supervisor {
    runtime: tokio::runtime::Runtime,
    signals: SignalListener,
}

impl Supervisor {
    pub fn install() -> Result<Self, RuntimeError> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| io_err("tokio-runtime", e))?;
        let signals = {
            let _context = runtime.enter();
            SignalListener::install()?
        };
        Ok(Self { runtime, signals })
    }

    /// Run the rotator under `sink` and block the current thread until it exits.
    pub fn run(self, config: StreamConfig, sink: Dispatch) -> Result<RunOutcome, RuntimeError> {
        let Supervisor {
            runtime,
            mut signals,
        } = self;
        let _scope = tracing::dispatcher::set_default(&sink);
        let outcome = runtime.block_on(run_until(
            config,
            sink.clone(),
            Shutdown::new(),
            signals.recv(),
        ));
        // The copy thread may still be parked in a pipe read; don't wait for it.
        runtime.shutdown_background();
        outcome
    }
}

/// [`Supervisor::install`] followed by [`Supervisor::run`].
pub fn start_blocking(config: StreamConfig, sink: Dispatch) -> Result<RunOutcome, RuntimeError> {
    Supervisor::install()?.run(config, sink)
}

/// Copy until end of input, SIGINT or SIGTERM.
pub async fn run(config: StreamConfig, sink: Dispatch) -> Result<RunOutcome, RuntimeError> {
    let mut signals = SignalListener::install()?;
    run_until(config, sink, Shutdown::new(), signals.recv()).await
}

/// Copy until end of input or until `signal` resolves.
///
/// The input is validated before the log directory is touched, so a bad
/// FIFO path leaves the filesystem unchanged.
pub async fn run_until<F>(
    config: StreamConfig,
    sink: Dispatch,
    shutdown: Shutdown,
    signal: F,
) -> Result<RunOutcome, RuntimeError>
where
    F: Future<Output = Result<ShutdownSignal, RuntimeError>>,
{
    config.input.validate()?;
    ensure_parent_dir(&config.log_path)?;
    match &config.input {
        InputSource::Stdin => tracing::info!("Reading from stdin"),
        InputSource::Fifo(path) => tracing::info!(fifo = %path.display(), "Reading from FIFO"),
    }

    let mut copier = {
        let shutdown = shutdown.clone();
        tokio::task::spawn_blocking(move || -> Result<CopyReport, StreamError> {
            let input = config.input.open()?;
            StreamRotator::new(input, config.log_path, config.limit)
                .with_shutdown(shutdown)
                .with_sink(sink)
                .run()
        })
    };

    let received = tokio::select! {
        joined = &mut copier => return Ok(RunOutcome::Finished(handle_join(joined)?)),
        received = signal => received,
    };

    let received = match received {
        Ok(received) => received,
        Err(err) => {
            tracing::warn!(error = %err, "signal handling unavailable, copying until end of input");
            return Ok(RunOutcome::Finished(handle_join(copier.await)?));
        }
    };

    tracing::info!(
        signal = received.number(),
        name = received.name(),
        "Received signal, shutting down",
    );
    shutdown.request();

    match tokio::time::timeout(SHUTDOWN_GRACE, &mut copier).await {
        Ok(joined) => {
            handle_join(joined)?;
        }
        Err(_) => tracing::debug!("copy loop still blocked on input, leaving it to process exit"),
    }
    Ok(RunOutcome::Interrupted(received))
}

/// SIGINT and SIGTERM listeners.
///
/// On unix the handlers are registered by [`SignalListener::install`], so
/// signals received before the first [`SignalListener::recv`] are kept.
/// Must be created inside a tokio runtime.
#[cfg(unix)]
pub struct SignalListener {
    interrupt: tokio::signal::unix::Signal,
    terminate: tokio::signal::unix::Signal,
}

#[cfg(unix)]
impl SignalListener {
    pub fn install() -> Result<Self, RuntimeError> {
        use tokio::signal::unix::{signal, SignalKind};

        let interrupt = signal(SignalKind::interrupt()).map_err(|source| RuntimeError::Signal {
            signal: "SIGINT",
            source,
        })?;
        let terminate = signal(SignalKind::terminate()).map_err(|source| RuntimeError::Signal {
            signal: "SIGTERM",
            source,
        })?;
        Ok(Self {
            interrupt,
            terminate,
        })
    }

    /// Resolve on the first SIGINT or SIGTERM.
    pub async fn recv(&mut self) -> Result<ShutdownSignal, RuntimeError> {
        tokio::select! {
            Some(()) = self.interrupt.recv() => Ok(ShutdownSignal::Interrupt),
            Some(()) = self.terminate.recv() => Ok(ShutdownSignal::Terminate),
            else => Err(RuntimeError::Signal {
                signal: "SIGINT/SIGTERM",
                source: std::io::Error::other("signal driver shut down"),
            }),
        }
    }
}

#[cfg(not(unix))]
pub struct SignalListener;

#[cfg(not(unix))]
impl SignalListener {
    pub fn install() -> Result<Self, RuntimeError> {
        Ok(Self)
    }

    pub async fn recv(&mut self) -> Result<ShutdownSignal, RuntimeError> {
        tokio::signal::ctrl_c()
            .await
            .map_err(|source| RuntimeError::Signal {
                signal: "ctrl-c",
                source,
            })?;
        Ok(ShutdownSignal::Interrupt)
    }
}

fn handle_join(
    result: Result<Result<CopyReport, StreamError>, tokio::task::JoinError>,
) -> Result<CopyReport, RuntimeError> {
    match result {
        Ok(inner) => Ok(inner?),
        Err(err) => Err(RuntimeError::Join(err.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::{self, OpenOptions};
    use std::io::Write;
    use std::path::{Path, PathBuf};

    use rotatelog_core::{CopyOutcome, SizeLimit};
    use tempfile::TempDir;

    fn mkfifo(path: &Path) {
        let status = std::process::Command::new("mkfifo")
            .arg(path)
            .status()
            .expect("run mkfifo");
        assert!(status.success(), "mkfifo failed");
    }

    fn config(input: InputSource, log_path: PathBuf, limit: SizeLimit) -> StreamConfig {
        StreamConfig {
            input,
            log_path,
            limit,
        }
    }

    #[test]
    fn signal_numbers_match_posix() {
        assert_eq!(ShutdownSignal::Interrupt.number(), 2);
        assert_eq!(ShutdownSignal::Terminate.number(), 15);
        assert_eq!(ShutdownSignal::Terminate.name(), "SIGTERM");
    }

    #[tokio::test]
    async fn regular_file_input_fails_before_touching_log_path() {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("not-a-pipe");
        fs::write(&input, b"data\n").unwrap();
        let log = dir.path().join("out").join("app.log");

        let err = run_until(
            config(InputSource::Fifo(input), log.clone(), SizeLimit::DISABLED),
            Dispatch::none(),
            Shutdown::new(),
            std::future::pending(),
        )
        .await
        .unwrap_err();

        assert!(
            matches!(err, RuntimeError::Stream(ref e) if e.is_config_error()),
            "got: {err}"
        );
        assert!(err.to_string().contains("exists and is not a FIFO"));
        assert!(!log.parent().unwrap().exists(), "log directory must not be created");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn fifo_is_copied_until_writer_closes() {
        let dir = TempDir::new().unwrap();
        let fifo = dir.path().join("input.fifo");
        mkfifo(&fifo);
        let log = dir.path().join("logs").join("app.log");

        let writer = {
            let fifo = fifo.clone();
            std::thread::spawn(move || {
                let mut pipe = OpenOptions::new().write(true).open(&fifo).unwrap();
                pipe.write_all(b"a\nb\nc\n").unwrap();
            })
        };

        let outcome = run_until(
            config(InputSource::Fifo(fifo), log.clone(), SizeLimit::from_megabytes(1)),
            Dispatch::none(),
            Shutdown::new(),
            std::future::pending(),
        )
        .await
        .unwrap();
        writer.join().unwrap();

        match outcome {
            RunOutcome::Finished(report) => {
                assert_eq!(report.outcome, CopyOutcome::EndOfInput);
                assert_eq!(report.bytes, 6);
                assert_eq!(report.rotations, 0);
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
        assert_eq!(fs::read(&log).unwrap(), b"a\nb\nc\n");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn signal_interrupts_a_blocked_copy() {
        let dir = TempDir::new().unwrap();
        let fifo = dir.path().join("input.fifo");
        mkfifo(&fifo);
        let log = dir.path().join("app.log");
        let shutdown = Shutdown::new();
        let started = std::time::Instant::now();

        let outcome = run_until(
            config(InputSource::Fifo(fifo.clone()), log.clone(), SizeLimit::DISABLED),
            Dispatch::none(),
            shutdown.clone(),
            async { Ok::<_, RuntimeError>(ShutdownSignal::Terminate) },
        )
        .await
        .unwrap();

        assert_eq!(outcome, RunOutcome::Interrupted(ShutdownSignal::Terminate));
        assert!(shutdown.is_requested());
        assert!(
            started.elapsed() >= SHUTDOWN_GRACE,
            "a copy blocked on input is given the full grace period"
        );

        // Release the copy thread still waiting for a writer so the test
        // runtime can shut down.
        drop(OpenOptions::new().write(true).open(&fifo).unwrap());
        assert!(!log.exists() || fs::read(&log).unwrap().is_empty());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn signal_before_first_poll_is_caught() {
        let mut signals = SignalListener::install().expect("install handlers");

        let status = std::process::Command::new("kill")
            .args(["-TERM", &std::process::id().to_string()])
            .status()
            .expect("run kill");
        assert!(status.success());

        let received = tokio::time::timeout(std::time::Duration::from_secs(5), signals.recv())
            .await
            .expect("SIGTERM delivered before recv() must not be lost")
            .unwrap();
        assert_eq!(received, ShutdownSignal::Terminate);
    }
}
