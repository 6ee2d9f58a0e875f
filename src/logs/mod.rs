//! Log streaming for running containers
//!
//! Follows a container's output until it stops, in passes: drain everything
//! the engine has, check whether the container is still running, sleep and
//! go again. The first pass always runs, so output of a container that exited
//! before streaming started is still printed.

use std::io::Write;
use std::thread;
use std::time::Duration;

use chrono::Utc;
use tracing::debug;

use crate::context::InterruptFlag;
use crate::docker::{ContainerEngine, ContainerHandle};
use crate::error::Result;

/// Pause between passes while the container is still running
pub const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// How a stream ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamOutcome {
    /// The container stopped; exit code if the engine still knows it
    Exited(Option<i64>),
    /// Ctrl+C arrived while streaming
    Interrupted,
}

/// Copies container output to a writer
pub struct LogStreamer<'a, W: Write> {
    engine: &'a dyn ContainerEngine,
    interrupt: &'a InterruptFlag,
    out: W,
    interval: Duration,
}

impl<'a> LogStreamer<'a, std::io::Stdout> {
    /// Stream to stdout
    pub fn stdout(engine: &'a dyn ContainerEngine, interrupt: &'a InterruptFlag) -> Self {
        Self::new(engine, interrupt, std::io::stdout())
    }
}

impl<'a, W: Write> LogStreamer<'a, W> {
    pub fn new(engine: &'a dyn ContainerEngine, interrupt: &'a InterruptFlag, out: W) -> Self {
        Self {
            engine,
            interrupt,
            out,
            interval: POLL_INTERVAL,
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Consume the streamer and return the writer
    pub fn into_inner(self) -> W {
        self.out
    }

    /// Follow `handle` until it stops or an interrupt arrives
    pub fn follow(&mut self, handle: &ContainerHandle) -> Result<StreamOutcome> {
        let mut since = None;

        loop {
            match self.engine.logs(&handle.id, since) {
                Ok(chunks) => {
                    for chunk in chunks {
                        if self.interrupt.take() {
                            return Ok(StreamOutcome::Interrupted);
                        }
                        match chunk {
                            Ok(bytes) => self.write_chunk(bytes)?,
                            Err(e) => {
                                debug!(error = %e, "log stream broke");
                                break;
                            }
                        }
                    }
                }
                Err(e) => debug!(error = %e, "could not open log stream"),
            }
            since = Some(Utc::now());

            if self.interrupt.take() {
                return Ok(StreamOutcome::Interrupted);
            }

            let status = match self.engine.status(&handle.id) {
                Ok(status) => status,
                Err(e) => {
                    debug!(error = %e, "container vanished");
                    return Ok(StreamOutcome::Exited(None));
                }
            };
            if !status.is_running() {
                return Ok(StreamOutcome::Exited(status.exit_code()));
            }

            thread::sleep(self.interval);
        }
    }

    fn write_chunk(&mut self, bytes: Vec<u8>) -> Result<()> {
        match String::from_utf8(bytes) {
            Ok(text) => {
                self.out.write_all(text.as_bytes())?;
                self.out.flush()?;
            }
            Err(_) => debug!("dropping undecodable log chunk"),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::docker::fake::FakeEngine;
    use crate::docker::ContainerStatus;

    fn handle() -> ContainerHandle {
        ContainerHandle {
            id: "abc".into(),
            name: "proj".into(),
        }
    }

    #[test]
    fn test_drains_once_even_if_already_exited() {
        let engine = FakeEngine::new().with_logs(vec![b"hello\n".to_vec(), b"world\n".to_vec()]);
        engine.exit_code.set(0);
        let flag = InterruptFlag::new();

        let mut streamer = LogStreamer::new(&engine, &flag, Vec::new());
        let outcome = streamer.follow(&handle()).unwrap();
        assert_eq!(outcome, StreamOutcome::Exited(Some(0)));
        assert_eq!(String::from_utf8(streamer.into_inner()).unwrap(), "hello\nworld\n");
        assert_eq!(engine.count("logs"), 1);
    }

    #[test]
    fn test_undecodable_chunks_are_dropped() {
        let engine = FakeEngine::new().with_logs(vec![
            b"ok\n".to_vec(),
            vec![0xff, 0xfe, b'\n'],
            b"still ok\n".to_vec(),
        ]);
        let flag = InterruptFlag::new();

        let mut streamer = LogStreamer::new(&engine, &flag, Vec::new());
        streamer.follow(&handle()).unwrap();
        assert_eq!(String::from_utf8(streamer.into_inner()).unwrap(), "ok\nstill ok\n");
    }

    #[test]
    fn test_polls_until_container_stops() {
        let engine = FakeEngine::new();
        engine.statuses.borrow_mut().extend([ContainerStatus::Running, ContainerStatus::Running]);
        engine.exit_code.set(2);
        let flag = InterruptFlag::new();

        let mut streamer =
            LogStreamer::new(&engine, &flag, Vec::new()).with_interval(Duration::from_millis(1));
        let outcome = streamer.follow(&handle()).unwrap();
        assert_eq!(outcome, StreamOutcome::Exited(Some(2)));
        assert_eq!(engine.count("logs"), 3);
        assert_eq!(engine.count("status"), 3);
    }

    #[test]
    fn test_interrupt_returns_without_error() {
        let engine = FakeEngine::new().with_logs(vec![b"line\n".to_vec()]);
        engine.statuses.borrow_mut().push_back(ContainerStatus::Running);
        let flag = InterruptFlag::new();
        flag.raise();

        let mut streamer = LogStreamer::new(&engine, &flag, Vec::new());
        assert_eq!(streamer.follow(&handle()).unwrap(), StreamOutcome::Interrupted);
        assert!(!flag.is_raised());
        assert_eq!(engine.count("status"), 0);
    }

    #[test]
    fn test_vanished_container_ends_stream() {
        let engine = FakeEngine::new().with_logs(vec![b"last words\n".to_vec()]);
        engine.fail_status.set(true);
        let flag = InterruptFlag::new();

        let mut streamer = LogStreamer::new(&engine, &flag, Vec::new());
        assert_eq!(streamer.follow(&handle()).unwrap(), StreamOutcome::Exited(None));
        assert_eq!(String::from_utf8(streamer.into_inner()).unwrap(), "last words\n");
        assert_eq!(engine.count("logs"), 1);
    }
}
