use nix::errno::Errno;

/// Failure of the shell process itself while setting up or reaping a pipeline.
///
/// Failures inside a child (a missing input file, a program that cannot be
/// executed) are not represented here: the child reports them on stderr and
/// exits with status 1.
#[derive(Debug, thiserror::Error)]
pub enum ExecError {
    #[error("pipe: {0}")]
    Pipe(#[source] Errno),

    #[error("fork: {0}")]
    Fork(#[source] Errno),

    #[error("wait: {0}")]
    Wait(#[source] Errno),

    #[error("{0}: argument contains a NUL byte")]
    NulByte(String),
}
