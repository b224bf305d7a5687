use std::collections::VecDeque;
use std::path::PathBuf;
use std::process::Stdio;

use async_trait::async_trait;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tracing::{debug, warn};

use crate::core::error::{InstallerError, InstallerResult};
use crate::core::progress::ProgressSink;

/// Number of trailing output lines kept for failure reports.
pub const OUTPUT_TAIL: usize = 40;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub program: PathBuf,
    pub args: Vec<String>,
    pub working_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessOutput {
    /// `None` when the process was terminated by a signal.
    pub code: Option<i32>,
    pub tail: Vec<String>,
}

impl ProcessOutput {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

/// Runs one external tool to completion, forwarding each output line to
/// the sink.
#[async_trait]
pub trait ProcessRunner: Send + Sync {
    async fn run(&self, invocation: &Invocation, sink: &dyn ProgressSink) -> InstallerResult<ProcessOutput>;
}

/// `tokio::process` runner. stdout and stderr are interleaved line by line.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemRunner;

#[async_trait]
impl ProcessRunner for SystemRunner {
    async fn run(&self, invocation: &Invocation, sink: &dyn ProgressSink) -> InstallerResult<ProcessOutput> {
        let mut command = Command::new(&invocation.program);
        command
            .args(&invocation.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = &invocation.working_dir {
            command.current_dir(dir);
        }

        debug!("Spawning {:?} {:?}", invocation.program, invocation.args);
        let mut child = command
            .spawn()
            .map_err(|e| InstallerError::io(&invocation.program, e))?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| InstallerError::Other("child stdout not captured".into()))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| InstallerError::Other("child stderr not captured".into()))?;

        let mut out = BufReader::new(stdout);
        let mut err = BufReader::new(stderr);
        let (mut out_buf, mut err_buf) = (Vec::new(), Vec::new());
        let (mut out_done, mut err_done) = (false, false);
        let mut tail = VecDeque::with_capacity(OUTPUT_TAIL);

        while !(out_done && err_done) {
            let line = tokio::select! {
                line = read_line(&mut out, &mut out_buf), if !out_done => match line {
                    Some(l) => l,
                    None => {
                        out_done = true;
                        continue;
                    }
                },
                line = read_line(&mut err, &mut err_buf), if !err_done => match line {
                    Some(l) => l,
                    None => {
                        err_done = true;
                        continue;
                    }
                },
            };

            sink.message(&line);
            if tail.len() == OUTPUT_TAIL {
                tail.pop_front();
            }
            tail.push_back(line);
        }

        let status = child
            .wait()
            .await
            .map_err(|e| InstallerError::io(&invocation.program, e))?;

        Ok(ProcessOutput {
            code: status.code(),
            tail: tail.into_iter().collect(),
        })
    }
}

/// Next output line, decoded lossily. `None` at end of stream; a read error
/// also ends the stream so only the exit status decides the outcome.
///
/// `buf` carries partial input across cancelled calls inside `select!`.
async fn read_line<R>(reader: &mut R, buf: &mut Vec<u8>) -> Option<String>
where
    R: AsyncBufRead + Unpin,
{
    let read = match reader.read_until(b'\n', buf).await {
        Ok(n) => n,
        Err(e) => {
            warn!("Stopped reading processor output: {}", e);
            buf.clear();
            return None;
        }
    };
    if read == 0 && buf.is_empty() {
        return None;
    }

    let mut end = buf.len();
    while end > 0 && matches!(buf[end - 1], b'\n' | b'\r') {
        end -= 1;
    }
    let line = String::from_utf8_lossy(&buf[..end]).into_owned();
    buf.clear();
    Some(line)
}

#[cfg(test)]
pub(crate) mod testing {
    use std::collections::HashMap;
    use std::sync::Mutex;

    use super::*;

    /// Records invocations; every program exits 0 unless told otherwise.
    #[derive(Default)]
    pub(crate) struct RecordingRunner {
        exit_codes: HashMap<PathBuf, i32>,
        invocations: Mutex<Vec<Invocation>>,
    }

    impl RecordingRunner {
        pub(crate) fn exiting(mut self, program: impl Into<PathBuf>, code: i32) -> Self {
            self.exit_codes.insert(program.into(), code);
            self
        }

        pub(crate) fn invocations(&self) -> Vec<Invocation> {
            self.invocations.lock().unwrap().clone()
        }

        pub(crate) fn programs(&self) -> Vec<PathBuf> {
            self.invocations().into_iter().map(|i| i.program).collect()
        }
    }

    #[async_trait]
    impl ProcessRunner for RecordingRunner {
        async fn run(&self, invocation: &Invocation, sink: &dyn ProgressSink) -> InstallerResult<ProcessOutput> {
            self.invocations.lock().unwrap().push(invocation.clone());
            let code = self.exit_codes.get(&invocation.program).copied().unwrap_or(0);
            let line = format!("{} exited with {}", invocation.program.display(), code);
            sink.message(&line);
            Ok(ProcessOutput {
                code: Some(code),
                tail: vec![line],
            })
        }
    }
}
