//! The session's input, output and error streams.

use tokio::io::{AsyncRead, AsyncWrite};

/// Boxed session input.
pub type BoxedReader = Box<dyn AsyncRead + Send + Unpin>;
/// Boxed session output.
pub type BoxedWriter = Box<dyn AsyncWrite + Send + Unpin>;

/// Input/output/error streams owned by a command execution.
///
/// Commands take the bundle by value; whoever runs the data transfer owns
/// the streams for its duration.
pub struct ReadWriter {
    /// Client input (stdin).
    pub input: BoxedReader,
    /// Client output (stdout).
    pub output: BoxedWriter,
    /// Client error output (stderr).
    pub err_output: BoxedWriter,
}

impl ReadWriter {
    /// Bundle arbitrary streams.
    pub fn new(
        input: impl AsyncRead + Send + Unpin + 'static,
        output: impl AsyncWrite + Send + Unpin + 'static,
        err_output: impl AsyncWrite + Send + Unpin + 'static,
    ) -> Self {
        Self {
            input: Box::new(input),
            output: Box::new(output),
            err_output: Box::new(err_output),
        }
    }

    /// The process's standard streams.
    #[must_use]
    pub fn stdio() -> Self {
        Self::new(tokio::io::stdin(), tokio::io::stdout(), tokio::io::stderr())
    }
}

impl std::fmt::Debug for ReadWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReadWriter").finish_non_exhaustive()
    }
}
