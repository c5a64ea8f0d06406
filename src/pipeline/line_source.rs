//! Line source: one zdb invocation exposed as a bounded stream of raw lines.
//!
//! A reader thread drains the child's stdout and feeds a bounded channel; the
//! channel cap is the only buffering, so a slow parser backpressures zdb
//! through the pipe. Lines keep their trailing newline — the path extractor
//! asserts and strips it.

use std::io::{self, BufRead, BufReader};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread::JoinHandle;

use crossbeam_channel::{Receiver, bounded};
use log::debug;

use crate::error::{ScanError, ScanResult};
use crate::utils::config::LINE_CHANNEL_CAP;

pub struct LineSource {
    child: Child,
    rx: Receiver<io::Result<Vec<u8>>>,
    reader: Option<JoinHandle<()>>,
}

impl LineSource {
    /// Start exactly one external process and begin streaming its stdout.
    /// Failure to start is a `Launch` error; anything the process does after
    /// starting is judged only by its output stream.
    pub fn spawn(argv: &[String]) -> ScanResult<Self> {
        let command = argv.join(" ");
        let launch_err = |source: io::Error| ScanError::Launch {
            command: command.clone(),
            source,
        };
        let (bin, args) = argv
            .split_first()
            .ok_or_else(|| launch_err(io::Error::other("empty argument vector")))?;
        debug!("spawning: {command}");

        let mut child = Command::new(bin)
            .args(args)
            .stdout(Stdio::piped())
            .spawn()
            .map_err(launch_err)?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| launch_err(io::Error::other("stdout not captured")))?;

        let (tx, rx) = bounded::<io::Result<Vec<u8>>>(LINE_CHANNEL_CAP);
        let reader = std::thread::spawn(move || {
            let mut reader = BufReader::new(stdout);
            loop {
                let mut buf = Vec::new();
                match reader.read_until(b'\n', &mut buf) {
                    Ok(0) => break,
                    Ok(_) => {
                        // Receiver dropped: the consumer stopped early.
                        if tx.send(Ok(buf)).is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        let _ = tx.send(Err(e));
                        break;
                    }
                }
            }
        });

        Ok(Self {
            child,
            rx,
            reader: Some(reader),
        })
    }

    /// Blocking iterator over the line stream; ends when the child closes
    /// stdout (or the reader thread stops).
    pub fn lines(&self) -> crossbeam_channel::Iter<'_, io::Result<Vec<u8>>> {
        self.rx.iter()
    }

    fn join_reader(&mut self) {
        if let Some(h) = self.reader.take() {
            let _ = h.join();
        }
    }

    /// Normal completion: the stream was drained. Reaps the child and
    /// returns its exit status for the caller to inspect (or merely log).
    pub fn finish(mut self) -> io::Result<ExitStatus> {
        self.join_reader();
        self.child.wait()
    }

    /// Early termination (record ceiling or Ctrl+C): stop the child, drain
    /// nothing further. Not an error path.
    pub fn abort(mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
        // Unblock the reader thread if it is parked on a full channel.
        drop(std::mem::replace(&mut self.rx, bounded(0).1));
        self.join_reader();
    }
}
