use std::any::{Any, type_name};
use std::backtrace::Backtrace;
use std::error::Error;
use std::fmt;

use tracing::error;

use crate::protocol::{BoxError, RequestContext};

/// An application failure.
///
/// Any `std::error::Error` converts into it with `?`, recording the concrete type name as the
/// error kind and capturing a backtrace (subject to `RUST_BACKTRACE`).
pub struct AppError {
    inner: BoxError,
    kind: &'static str,
    backtrace: Backtrace,
}

#[derive(Debug)]
struct Message(String);

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Error for Message {}

impl AppError {
    pub fn from_boxed(inner: BoxError, kind: &'static str) -> Self {
        Self { inner, kind, backtrace: Backtrace::capture() }
    }

    /// An error carrying just a message.
    pub fn msg<M: fmt::Display>(message: M) -> Self {
        Self::from_boxed(Box::new(Message(message.to_string())), "AppError")
    }

    /// Converts a caught panic payload.
    pub fn from_panic(payload: Box<dyn Any + Send>) -> Self {
        let message = match payload.downcast::<String>() {
            Ok(message) => *message,
            Err(payload) => match payload.downcast::<&'static str>() {
                Ok(message) => (*message).to_string(),
                Err(_) => "panic with a non-string payload".to_string(),
            },
        };
        Self::from_boxed(Box::new(Message(message)), "panic")
    }

    pub fn message(&self) -> String {
        self.inner.to_string()
    }

    /// The concrete error type, `panic` for a caught panic.
    pub fn kind(&self) -> &'static str {
        self.kind
    }

    pub fn backtrace(&self) -> &Backtrace {
        &self.backtrace
    }

    pub fn source(&self) -> &(dyn Error + Send + Sync + 'static) {
        self.inner.as_ref()
    }

    /// The chain of underlying causes, outermost first, not including the error itself.
    pub fn causes(&self) -> impl Iterator<Item = &(dyn Error + 'static)> {
        std::iter::successors(self.inner.source(), |&cause| cause.source())
    }
}

impl<E> From<E> for AppError
where
    E: Error + Send + Sync + 'static,
{
    fn from(e: E) -> Self {
        Self::from_boxed(Box::new(e), type_name::<E>())
    }
}

impl fmt::Debug for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppError").field("kind", &self.kind).field("inner", &self.inner).finish_non_exhaustive()
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.inner, self.kind)
    }
}

/// The sink application failures are reported to.
pub trait ErrorReporter: Send + Sync {
    fn report(&self, error: &AppError, env: &RequestContext);
}

/// Reports through `tracing` at error level.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogReporter;

impl ErrorReporter for LogReporter {
    fn report(&self, error: &AppError, env: &RequestContext) {
        error!(
            kind = error.kind(),
            method = %env.method(),
            path = env.path(),
            cause = %error.source(),
            "application failed to handle request"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[derive(Debug, thiserror::Error)]
    #[error("lookup failed")]
    struct LookupError {
        #[source]
        source: io::Error,
    }

    fn lookup() -> Result<(), AppError> {
        Err(LookupError { source: io::Error::other("connection refused") })?;
        Ok(())
    }

    #[test]
    fn question_mark_records_kind_and_causes() {
        let error = lookup().unwrap_err();
        assert!(error.kind().ends_with("LookupError"));
        assert_eq!(error.message(), "lookup failed");
        let causes: Vec<String> = error.causes().map(|cause| cause.to_string()).collect();
        assert_eq!(causes, vec!["connection refused".to_string()]);
    }

    #[test]
    fn panic_payloads() {
        let error = AppError::from_panic(Box::new("boom"));
        assert_eq!(error.kind(), "panic");
        assert_eq!(error.message(), "boom");

        let error = AppError::from_panic(Box::new(format!("index {} out of range", 3)));
        assert_eq!(error.message(), "index 3 out of range");

        let error = AppError::from_panic(Box::new(42u8));
        assert_eq!(error.message(), "panic with a non-string payload");
    }

    #[test]
    fn display_includes_kind() {
        assert_eq!(AppError::msg("bad input").to_string(), "bad input (AppError)");
    }
}
