//! External process invocation
//!
//! [`ProcessRunner`] is the single seam through which tasks start programs.
//! [`SystemProcessRunner`] spawns a real child process, streams its output
//! line by line and enforces an optional timeout. A child that outlives its
//! timeout is killed; the caller gets `timed_out: true` and no exit code.

use crate::error::{ExecutionError, ExecutionResult};
use std::env;
use std::io::{self, BufRead, BufReader, Read};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::thread;
use std::time::{Duration, Instant};
use tracing::debug;

const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// How long the pipes must stay quiet after the child exits before output
/// still held open by its descendants is abandoned
const EXIT_GRACE: Duration = Duration::from_millis(200);

/// Upper bound on draining output after the child exits
const EXIT_DRAIN_LIMIT: Duration = Duration::from_secs(2);

/// Which output stream a line came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputStream {
    Stdout,
    Stderr,
}

/// Receives output lines from a running process.
///
/// Lines are delivered on the thread that called [`ProcessRunner::run`], and
/// never after `run` has returned.
pub trait LineSink {
    fn stdout_line(&mut self, _line: &str) {}

    fn stderr_line(&mut self, _line: &str) {}
}

/// Discards all output
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl LineSink for NullSink {}

/// Collects output in memory
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CapturedOutput {
    pub stdout: Vec<String>,
    pub stderr: Vec<String>,
}

impl LineSink for CapturedOutput {
    fn stdout_line(&mut self, line: &str) {
        self.stdout.push(line.to_string());
    }

    fn stderr_line(&mut self, line: &str) {
        self.stderr.push(line.to_string());
    }
}

/// Everything needed to start one program
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessInvocation {
    pub program: PathBuf,
    pub args: Vec<String>,
    pub working_dir: Option<PathBuf>,
    pub timeout: Option<Duration>,
}

impl ProcessInvocation {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        ProcessInvocation {
            program: program.into(),
            args: Vec::new(),
            working_dir: None,
            timeout: None,
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// The directory the child starts in.
    ///
    /// An explicit working directory wins; otherwise a program given with a
    /// directory component starts in that directory. `None` inherits the
    /// current directory.
    pub fn effective_working_dir(&self) -> Option<PathBuf> {
        if let Some(dir) = &self.working_dir {
            return Some(dir.clone());
        }
        program_dir(&self.program).map(Path::to_path_buf)
    }
}

/// What happened to a finished (or abandoned) process
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProcessOutcome {
    /// Exit code, if the process exited normally before the timeout
    pub exit_code: Option<i32>,

    /// The timeout expired and the process was killed
    pub timed_out: bool,
}

impl ProcessOutcome {
    pub fn exited(code: i32) -> Self {
        ProcessOutcome {
            exit_code: Some(code),
            timed_out: false,
        }
    }

    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }
}

/// Runs external programs
pub trait ProcessRunner {
    /// Run one program to completion (or until its timeout), forwarding output to `sink`
    fn run(
        &self,
        invocation: &ProcessInvocation,
        sink: &mut dyn LineSink,
    ) -> ExecutionResult<ProcessOutcome>;
}

/// [`ProcessRunner`] backed by `std::process`.
///
/// The run ends when the child exits, not when its pipes close: output that
/// a left-behind background process keeps writing is dropped once the pipes
/// have been quiet for a short grace period after the exit.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemProcessRunner;

impl ProcessRunner for SystemProcessRunner {
    fn run(
        &self,
        invocation: &ProcessInvocation,
        sink: &mut dyn LineSink,
    ) -> ExecutionResult<ProcessOutcome> {
        let name = invocation.program.display().to_string();
        if name.is_empty() {
            return Err(ExecutionError::Launch {
                program: name,
                source: io::Error::new(io::ErrorKind::InvalidInput, "no program given"),
            });
        }

        let launch_error = |source| ExecutionError::Launch {
            program: name.clone(),
            source,
        };
        let program = absolute_program(&invocation.program).map_err(launch_error)?;

        let mut command = Command::new(&program);
        command
            .args(&invocation.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        if let Some(dir) = invocation.effective_working_dir() {
            command.current_dir(dir);
        }

        debug!(program = %name, args = ?invocation.args, "spawning process");
        let mut child = command.spawn().map_err(launch_error)?;

        let (tx, rx) = mpsc::channel();
        if let Some(stdout) = child.stdout.take() {
            spawn_reader(stdout, OutputStream::Stdout, tx.clone());
        }
        if let Some(stderr) = child.stderr.take() {
            spawn_reader(stderr, OutputStream::Stderr, tx.clone());
        }
        drop(tx);

        let deadline = invocation.timeout.map(|timeout| Instant::now() + timeout);
        let status = pump_output(&mut child, &rx, deadline, sink).map_err(|source| {
            ExecutionError::Wait {
                program: name.clone(),
                source,
            }
        })?;

        let Some(status) = status else {
            debug!(program = %name, "process timed out, killing it");
            kill(&mut child);
            return Ok(ProcessOutcome {
                exit_code: None,
                timed_out: true,
            });
        };

        // Readers still blocked on pipes held by grandchildren end on their
        // own once those close; the receiver is gone so they send nothing.
        debug!(program = %name, code = ?status.code(), "process exited");
        Ok(ProcessOutcome {
            exit_code: status.code(),
            timed_out: false,
        })
    }
}

/// Forward lines to the sink until the child has exited and its output is
/// drained. `None` means the deadline passed with the child still running.
fn pump_output(
    child: &mut Child,
    rx: &Receiver<(OutputStream, String)>,
    deadline: Option<Instant>,
    sink: &mut dyn LineSink,
) -> io::Result<Option<ExitStatus>> {
    let mut status = None;
    let mut exited_at = Instant::now();
    let mut quiet_since = Instant::now();

    loop {
        if status.is_none() {
            status = child.try_wait()?;
            if status.is_some() {
                exited_at = Instant::now();
                quiet_since = exited_at;
            } else if deadline.is_some_and(|d| Instant::now() >= d) {
                return Ok(None);
            }
        }

        match rx.recv_timeout(POLL_INTERVAL) {
            Ok((stream, line)) => {
                match stream {
                    OutputStream::Stdout => sink.stdout_line(&line),
                    OutputStream::Stderr => sink.stderr_line(&line),
                }
                quiet_since = Instant::now();
                if status.is_some() && exited_at.elapsed() >= EXIT_DRAIN_LIMIT {
                    return Ok(status);
                }
            }
            Err(RecvTimeoutError::Disconnected) => {
                return match status {
                    Some(status) => Ok(Some(status)),
                    None => wait_for_exit(child, deadline),
                };
            }
            Err(RecvTimeoutError::Timeout) => {
                if status.is_some() && quiet_since.elapsed() >= EXIT_GRACE {
                    return Ok(status);
                }
            }
        }
    }
}

/// Wait for the child, giving up at the deadline. `None` means it is still running.
fn wait_for_exit(child: &mut Child, deadline: Option<Instant>) -> io::Result<Option<ExitStatus>> {
    let Some(deadline) = deadline else {
        return child.wait().map(Some);
    };

    loop {
        if let Some(status) = child.try_wait()? {
            return Ok(Some(status));
        }
        let now = Instant::now();
        if now >= deadline {
            return Ok(None);
        }
        thread::sleep(POLL_INTERVAL.min(deadline - now));
    }
}

fn kill(child: &mut Child) {
    if let Err(e) = child.kill() {
        debug!(error = %e, "failed to kill process");
    }
    let _ = child.wait();
}

fn spawn_reader<R>(pipe: R, stream: OutputStream, tx: Sender<(OutputStream, String)>)
where
    R: Read + Send + 'static,
{
    thread::spawn(move || {
        let mut reader = BufReader::new(pipe);
        let mut buf = Vec::new();
        loop {
            buf.clear();
            match reader.read_until(b'\n', &mut buf) {
                Ok(0) | Err(_) => break,
                Ok(_) => {
                    let line = String::from_utf8_lossy(&buf)
                        .trim_end_matches(&['\r', '\n'][..])
                        .to_string();
                    if tx.send((stream, line)).is_err() {
                        break;
                    }
                }
            }
        }
    });
}

fn program_dir(program: &Path) -> Option<&Path> {
    program.parent().filter(|dir| !dir.as_os_str().is_empty())
}

/// Relative programs with a directory component are resolved against the
/// current directory, since the child may start somewhere else.
fn absolute_program(program: &Path) -> io::Result<PathBuf> {
    if program.is_relative() && program_dir(program).is_some() {
        Ok(env::current_dir()?.join(program))
    } else {
        Ok(program.to_path_buf())
    }
}
