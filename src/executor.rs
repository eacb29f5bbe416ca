//! Runs a [`Pipeline`] as a chain of forked children.
//!
//! For `N` stages the parent creates `N - 1` pipes. Stage `i` writes into pipe
//! `i` and stage `i + 1` reads from it. The parent carries at most one pipe
//! from one fork to the next and drops it as soon as the reader has been
//! forked: a write end left open in the parent would keep every downstream
//! reader from seeing end-of-file.
//!
//! Only the head stage may redirect its input from a file and only the tail
//! stage may redirect its output to one; redirections of intermediate stages
//! are ignored.

use crate::command::ExitCode;
use crate::error::ExecError;
use crate::parser::{Pipeline, Stage};
use nix::errno::Errno;
use nix::fcntl::{self, OFlag};
use nix::libc;
use nix::sys::signal::{self, SigHandler, Signal};
use nix::sys::stat::Mode;
use nix::sys::wait::{WaitStatus, waitpid};
use nix::unistd::{self, ForkResult, Pid};
use std::ffi::{CStr, CString};
use std::io::{self, Write};
use std::os::fd::{AsRawFd, FromRawFd, OwnedFd, RawFd};
use tracing::{debug, trace, warn};

/// Status reported by a child that could not set itself up or exec.
const CHILD_FAILURE: i32 = 1;

/// Both ends of an anonymous pipe. Dropping it closes both descriptors.
#[derive(Debug)]
struct Pipe {
    read: OwnedFd,
    write: OwnedFd,
}

impl Pipe {
    fn new() -> Result<Self, ExecError> {
        let (read, write) = unistd::pipe().map_err(ExecError::Pipe)?;
        Ok(Self { read, write })
    }
}

struct OutputTarget {
    path: CString,
    append: bool,
}

/// A stage converted to C strings up front, so that a child does nothing but
/// system calls between `fork` and `exec`.
struct Launch {
    argv: Vec<CString>,
    input: Option<CString>,
    output: Option<OutputTarget>,
}

impl Launch {
    fn new(stage: &Stage, index: usize, is_head: bool, is_tail: bool) -> Result<Self, ExecError> {
        let argv = stage
            .argv
            .iter()
            .map(|arg| c_string(arg))
            .collect::<Result<Vec<_>, _>>()?;

        let input = match &stage.input_file {
            Some(path) if is_head => Some(c_string(path)?),
            Some(path) => {
                debug!(stage = index, path = %path, "input redirection ignored");
                None
            }
            None => None,
        };
        let output = match &stage.output_file {
            Some(file) if is_tail => Some(OutputTarget {
                path: c_string(&file.path)?,
                append: file.append,
            }),
            Some(file) => {
                debug!(stage = index, path = %file.path, "output redirection ignored");
                None
            }
            None => None,
        };

        Ok(Self {
            argv,
            input,
            output,
        })
    }

    fn program(&self) -> &CStr {
        &self.argv[0]
    }
}

fn c_string(s: &str) -> Result<CString, ExecError> {
    CString::new(s).map_err(|_| ExecError::NulByte(s.to_string()))
}

/// Executes `pipeline` and returns its exit status.
///
/// This never fails from the caller's point of view: setup errors are printed
/// on stderr and yield status 1. Otherwise the status is that of the last
/// child that exited non-zero, or 0 when all of them succeeded. Stages without
/// a program are skipped, and an empty pipeline returns 0 immediately.
pub fn execute(pipeline: &Pipeline) -> ExitCode {
    let stages: Vec<&Stage> = pipeline
        .stages()
        .iter()
        .filter(|stage| {
            if stage.argv.is_empty() {
                trace!(?stage, "skipping stage without a program");
            }
            !stage.argv.is_empty()
        })
        .collect();
    if stages.is_empty() {
        return 0;
    }

    let launches = match prepare(&stages) {
        Ok(launches) => launches,
        Err(e) => {
            eprintln!("pipeshell: {e}");
            return 1;
        }
    };

    // Pending shell output has to reach fd 1 before any child writes to it.
    let _ = io::stdout().flush();

    let spawned = spawn(&launches);
    let status = reap_all(&spawned.children);
    match spawned.error {
        Some(e) => {
            warn!(error = %e, forked = spawned.children.len(), "pipeline setup failed");
            eprintln!("pipeshell: {e}");
            1
        }
        None => status,
    }
}

fn prepare(stages: &[&Stage]) -> Result<Vec<Launch>, ExecError> {
    let last = stages.len() - 1;
    stages
        .iter()
        .enumerate()
        .map(|(index, stage)| Launch::new(stage, index, index == 0, index == last))
        .collect()
}

struct Spawned {
    children: Vec<Pid>,
    error: Option<ExecError>,
}

/// Forks one child per launch, wiring pipes between neighbours.
///
/// On a `pipe` or `fork` failure the remaining stages are abandoned. Every
/// pipe end held by the parent is closed on the way out, so the children that
/// were already forked run into end-of-file or `SIGPIPE` and terminate.
fn spawn(launches: &[Launch]) -> Spawned {
    let mut children = Vec::with_capacity(launches.len());
    let mut upstream: Option<Pipe> = None;

    for (index, launch) in launches.iter().enumerate() {
        let downstream = if index + 1 < launches.len() {
            match Pipe::new() {
                Ok(pipe) => Some(pipe),
                Err(e) => {
                    return Spawned {
                        children,
                        error: Some(e),
                    };
                }
            }
        } else {
            None
        };

        // SAFETY: between fork and exec the child only makes system calls
        // on data prepared before the fork and does not allocate.
        match unsafe { unistd::fork() } {
            Ok(ForkResult::Parent { child }) => {
                debug!(pid = %child, stage = index, program = ?launch.program(), "forked");
                children.push(child);
            }
            Ok(ForkResult::Child) => run_child(launch, upstream, downstream),
            Err(e) => {
                return Spawned {
                    children,
                    error: Some(ExecError::Fork(e)),
                };
            }
        }

        // The previous pipe is now owned by its two children only.
        upstream = downstream;
    }

    Spawned {
        children,
        error: None,
    }
}

/// Child side: rebinds stdin/stdout, applies file redirections and replaces
/// the process image. Never returns.
fn run_child(launch: &Launch, upstream: Option<Pipe>, downstream: Option<Pipe>) -> ! {
    // The shell ignores SIGPIPE; an ignored disposition would survive exec.
    // SAFETY: installs the default disposition, no handler code is involved.
    let _ = unsafe { signal::signal(Signal::SIGPIPE, SigHandler::SigDfl) };

    if let Some(pipe) = upstream {
        redirect(pipe.read.as_raw_fd(), libc::STDIN_FILENO);
    }
    if let Some(pipe) = downstream {
        redirect(pipe.write.as_raw_fd(), libc::STDOUT_FILENO);
    }

    if let Some(path) = &launch.input {
        let fd = open_or_exit(path, OFlag::O_RDONLY, Mode::empty(), b"open input");
        redirect(fd.as_raw_fd(), libc::STDIN_FILENO);
    }
    if let Some(target) = &launch.output {
        let mode = if target.append {
            OFlag::O_APPEND
        } else {
            OFlag::O_TRUNC
        };
        let fd = open_or_exit(
            &target.path,
            OFlag::O_WRONLY | OFlag::O_CREAT | mode,
            Mode::from_bits_truncate(0o644),
            b"open output",
        );
        redirect(fd.as_raw_fd(), libc::STDOUT_FILENO);
    }

    let Err(errno) = unistd::execvp(launch.program(), &launch.argv);
    child_exit(launch.program().to_bytes(), errno)
}

fn redirect(fd: RawFd, target: RawFd) {
    if let Err(e) = unistd::dup2(fd, target) {
        child_exit(b"dup2", e);
    }
}

fn open_or_exit(path: &CStr, flags: OFlag, mode: Mode, context: &[u8]) -> OwnedFd {
    match fcntl::open(path, flags, mode) {
        // SAFETY: `open` just returned this descriptor and nothing else owns it.
        Ok(fd) => unsafe { OwnedFd::from_raw_fd(fd) },
        Err(e) => child_exit(context, e),
    }
}

/// Reports `<context>: <error description>` on stderr and terminates the child.
fn child_exit(context: &[u8], errno: Errno) -> ! {
    let stderr = io::stderr();
    let parts: [&[u8]; 4] = [context, b": ", errno.desc().as_bytes(), b"\n"];
    for part in parts {
        let _ = unistd::write(&stderr, part);
    }
    // SAFETY: `_exit` skips atexit handlers and buffered-stream flushing, both
    // of which belong to the parent.
    unsafe { libc::_exit(CHILD_FAILURE) }
}

/// Waits for every child in fork order; returns the last non-zero status.
fn reap_all(children: &[Pid]) -> ExitCode {
    let mut status = 0;
    for &pid in children {
        let code = match wait_for(pid) {
            Ok(code) => code,
            Err(e) => {
                warn!(%pid, error = %e, "could not reap child");
                1
            }
        };
        debug!(%pid, code, "child exited");
        if code != 0 {
            status = code;
        }
    }
    status
}

fn wait_for(pid: Pid) -> Result<ExitCode, ExecError> {
    loop {
        match waitpid(pid, None) {
            Ok(WaitStatus::Exited(_, code)) => return Ok(code),
            Ok(WaitStatus::Signaled(_, signal, _)) => return Ok(128 + signal as i32),
            Ok(_) | Err(Errno::EINTR) => continue,
            Err(e) => return Err(ExecError::Wait(e)),
        }
    }
}
