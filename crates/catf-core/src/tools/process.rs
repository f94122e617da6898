//! External command execution with captured output and a hard deadline.

use std::ffi::OsStr;
use std::ffi::OsString;
use std::io::Read;
use std::path::Path;
use std::path::PathBuf;
use std::process::Child;
use std::process::Command;
use std::process::Stdio;
use std::thread;
use std::thread::JoinHandle;
use std::time::Duration;

use tracing::debug;
use tracing::trace;

use crate::CompareError;
use crate::Result;
use crate::deadline::Deadline;

const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Output of a finished command.
#[derive(Debug, Clone)]
pub struct CommandOutput {
    /// Exit code, or -1 if terminated by a signal.
    pub code: i32,
    /// Captured stdout.
    pub stdout: String,
    /// Captured stderr.
    pub stderr: String,
}

impl CommandOutput {
    /// Returns `true` if the command exited with status 0.
    #[must_use]
    pub const fn success(&self) -> bool {
        self.code == 0
    }
}

/// Builder for an external command.
///
/// The program is located on `PATH` before it is spawned, so a missing tool
/// surfaces as [`CompareError::ToolNotFound`] rather than an I/O error. A
/// command still running when its deadline passes is killed.
#[derive(Debug, Clone)]
pub struct Cmd {
    program: String,
    args: Vec<OsString>,
    current_dir: Option<PathBuf>,
    allowed_codes: Vec<i32>,
    deadline: Option<Deadline>,
}

impl Cmd {
    /// Creates a builder for `program`.
    #[must_use]
    pub fn new(program: impl AsRef<str>) -> Self {
        Self {
            program: program.as_ref().to_string(),
            args: Vec::new(),
            current_dir: None,
            allowed_codes: Vec::new(),
            deadline: None,
        }
    }

    /// Adds one argument.
    #[must_use]
    pub fn arg(mut self, arg: impl AsRef<OsStr>) -> Self {
        self.args.push(arg.as_ref().to_os_string());
        self
    }

    /// Adds several arguments.
    #[must_use]
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        self.args
            .extend(args.into_iter().map(|a| a.as_ref().to_os_string()));
        self
    }

    /// Sets the working directory.
    #[must_use]
    pub fn dir(mut self, dir: &Path) -> Self {
        self.current_dir = Some(dir.to_path_buf());
        self
    }

    /// Treats these non-zero exit codes as success.
    #[must_use]
    pub fn allow_codes(mut self, codes: &[i32]) -> Self {
        self.allowed_codes.extend_from_slice(codes);
        self
    }

    /// Kills the command if it outlives `deadline`.
    #[must_use]
    pub fn deadline(mut self, deadline: Deadline) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Runs the command to completion and captures its output.
    ///
    /// # Errors
    ///
    /// - [`CompareError::ToolNotFound`] if the program cannot be located
    /// - [`CompareError::DeadlineExceeded`] if the deadline passed
    /// - [`CompareError::ToolFailed`] on a disallowed exit code
    pub fn run(self) -> Result<CommandOutput> {
        if let Some(deadline) = self.deadline {
            deadline.check()?;
        }
        let program = self.locate()?;

        let mut command = Command::new(&program);
        command
            .args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        if let Some(dir) = &self.current_dir {
            command.current_dir(dir);
        }

        debug!(program = %self.program, args = ?self.args, "running command");
        let mut child = command.spawn()?;
        let stdout = drain(child.stdout.take());
        let stderr = drain(child.stderr.take());

        let code = match self.wait(&mut child) {
            Ok(code) => code,
            Err(err) => {
                // Reader threads finish once the killed child's pipes close.
                let _ = join(stdout);
                let _ = join(stderr);
                return Err(err);
            }
        };

        let output = CommandOutput {
            code,
            stdout: String::from_utf8_lossy(&join(stdout)?).into_owned(),
            stderr: String::from_utf8_lossy(&join(stderr)?).into_owned(),
        };
        trace!(program = %self.program, code, "command finished");

        if output.success() || self.allowed_codes.contains(&code) {
            Ok(output)
        } else {
            Err(CompareError::ToolFailed {
                program: self.program,
                code,
                stderr: output.stderr,
            })
        }
    }

    fn locate(&self) -> Result<PathBuf> {
        let not_found = || CompareError::ToolNotFound {
            program: self.program.clone(),
        };
        if self.program.contains(std::path::MAIN_SEPARATOR) {
            let path = PathBuf::from(&self.program);
            return if path.is_file() { Ok(path) } else { Err(not_found()) };
        }
        which::which(&self.program).map_err(|_| not_found())
    }

    fn wait(&self, child: &mut Child) -> Result<i32> {
        loop {
            if let Some(status) = child.try_wait()? {
                return Ok(status.code().unwrap_or(-1));
            }

            let pause = match self.deadline.and_then(|d| d.remaining()) {
                Some(left) if left.is_zero() => {
                    debug!(program = %self.program, "deadline passed, killing command");
                    let _ = child.kill();
                    let _ = child.wait();
                    return Err(CompareError::DeadlineExceeded {
                        limit: self.deadline.and_then(|d| d.limit()).unwrap_or_default(),
                    });
                }
                Some(left) => left.min(POLL_INTERVAL),
                None => POLL_INTERVAL,
            };
            thread::sleep(pause);
        }
    }
}

fn drain<R: Read + Send + 'static>(pipe: Option<R>) -> Option<JoinHandle<std::io::Result<Vec<u8>>>> {
    pipe.map(|mut pipe| {
        thread::spawn(move || {
            let mut buffer = Vec::new();
            pipe.read_to_end(&mut buffer)?;
            Ok(buffer)
        })
    })
}

fn join(handle: Option<JoinHandle<std::io::Result<Vec<u8>>>>) -> Result<Vec<u8>> {
    match handle {
        None => Ok(Vec::new()),
        Some(handle) => handle
            .join()
            .map_err(|_| std::io::Error::other("output reader thread panicked"))?
            .map_err(CompareError::from),
    }
}
