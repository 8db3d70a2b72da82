//! Engine options supplied by the embedding server.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::connection::cork::{self, CorkStrategy};
use crate::connection::DEFAULT_WRITE_TIMEOUT;
use crate::handler::{ErrorFallback, ErrorReporter, LogReporter, LowlevelErrorHandler};

const DEFAULT_FIRST_DATA_TIMEOUT: Duration = Duration::from_secs(30);
const DEFAULT_PERSISTENT_TIMEOUT: Duration = Duration::from_secs(20);

/// Knobs of the engine, shared by every connection as `Arc<Options>`.
#[derive(Clone)]
pub struct Options {
    quiet: bool,
    leak_stack_on_error: bool,
    lowlevel_error_handler: Option<Arc<dyn LowlevelErrorHandler>>,
    error_reporter: Arc<dyn ErrorReporter>,
    cork: Arc<dyn CorkStrategy>,
    write_timeout: Duration,
    first_data_timeout: Duration,
    persistent_timeout: Duration,
    secure: bool,
    drain_on_shutdown: bool,
    max_body_size: Option<u64>,
}

impl Options {
    pub fn builder() -> OptionsBuilder {
        OptionsBuilder { options: Options::default() }
    }

    /// No informational line per request.
    pub fn quiet(&self) -> bool {
        self.quiet
    }

    pub fn leak_stack_on_error(&self) -> bool {
        self.leak_stack_on_error
    }

    pub fn lowlevel_error_handler(&self) -> Option<&Arc<dyn LowlevelErrorHandler>> {
        self.lowlevel_error_handler.as_ref()
    }

    pub fn error_reporter(&self) -> &Arc<dyn ErrorReporter> {
        &self.error_reporter
    }

    pub fn cork(&self) -> &Arc<dyn CorkStrategy> {
        &self.cork
    }

    pub fn write_timeout(&self) -> Duration {
        self.write_timeout
    }

    /// How long a fresh connection may take to send its first request head.
    pub fn first_data_timeout(&self) -> Duration {
        self.first_data_timeout
    }

    /// How long a kept-alive connection may stay idle between requests.
    pub fn persistent_timeout(&self) -> Duration {
        self.persistent_timeout
    }

    pub fn secure(&self) -> bool {
        self.secure
    }

    pub fn drain_on_shutdown(&self) -> bool {
        self.drain_on_shutdown
    }

    /// Largest request body buffered for the application, unbounded when `None`.
    pub fn max_body_size(&self) -> Option<u64> {
        self.max_body_size
    }

    pub fn error_fallback(&self) -> ErrorFallback {
        ErrorFallback::new(self.lowlevel_error_handler.clone(), self.leak_stack_on_error)
    }
}

impl Default for Options {
    fn default() -> Self {
        Self {
            quiet: false,
            leak_stack_on_error: false,
            lowlevel_error_handler: None,
            error_reporter: Arc::new(LogReporter),
            cork: cork::detect(),
            write_timeout: DEFAULT_WRITE_TIMEOUT,
            first_data_timeout: DEFAULT_FIRST_DATA_TIMEOUT,
            persistent_timeout: DEFAULT_PERSISTENT_TIMEOUT,
            secure: false,
            drain_on_shutdown: false,
            max_body_size: None,
        }
    }
}

impl fmt::Debug for Options {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Options")
            .field("quiet", &self.quiet)
            .field("leak_stack_on_error", &self.leak_stack_on_error)
            .field("lowlevel_error_handler", &self.lowlevel_error_handler.is_some())
            .field("write_timeout", &self.write_timeout)
            .field("first_data_timeout", &self.first_data_timeout)
            .field("persistent_timeout", &self.persistent_timeout)
            .field("secure", &self.secure)
            .field("drain_on_shutdown", &self.drain_on_shutdown)
            .field("max_body_size", &self.max_body_size)
            .finish_non_exhaustive()
    }
}

#[derive(Debug)]
pub struct OptionsBuilder {
    options: Options,
}

impl OptionsBuilder {
    pub fn quiet(mut self, quiet: bool) -> Self {
        self.options.quiet = quiet;
        self
    }

    pub fn leak_stack_on_error(mut self, leak: bool) -> Self {
        self.options.leak_stack_on_error = leak;
        self
    }

    pub fn lowlevel_error_handler(mut self, handler: impl LowlevelErrorHandler + 'static) -> Self {
        self.options.lowlevel_error_handler = Some(Arc::new(handler));
        self
    }

    pub fn error_reporter(mut self, reporter: impl ErrorReporter + 'static) -> Self {
        self.options.error_reporter = Arc::new(reporter);
        self
    }

    pub fn cork(mut self, strategy: impl CorkStrategy + 'static) -> Self {
        self.options.cork = Arc::new(strategy);
        self
    }

    pub fn write_timeout(mut self, timeout: Duration) -> Self {
        self.options.write_timeout = timeout;
        self
    }

    pub fn first_data_timeout(mut self, timeout: Duration) -> Self {
        self.options.first_data_timeout = timeout;
        self
    }

    pub fn persistent_timeout(mut self, timeout: Duration) -> Self {
        self.options.persistent_timeout = timeout;
        self
    }

    pub fn secure(mut self, secure: bool) -> Self {
        self.options.secure = secure;
        self
    }

    pub fn drain_on_shutdown(mut self, drain: bool) -> Self {
        self.options.drain_on_shutdown = drain;
        self
    }

    /// Requests announcing or streaming a larger body are answered with `413` and the connection
    /// is closed.
    pub fn max_body_size(mut self, max_size: u64) -> Self {
        self.options.max_body_size = Some(max_size);
        self
    }

    pub fn build(self) -> Options {
        self.options
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::cork::NoCork;

    #[test]
    fn defaults() {
        let options = Options::default();
        assert!(!options.quiet());
        assert!(!options.leak_stack_on_error());
        assert!(options.lowlevel_error_handler().is_none());
        assert_eq!(options.write_timeout(), Duration::from_secs(10));
        assert_eq!(options.first_data_timeout(), Duration::from_secs(30));
        assert_eq!(options.persistent_timeout(), Duration::from_secs(20));
        assert_eq!(options.max_body_size(), None);
    }

    #[test]
    fn builder() {
        let options = Options::builder()
            .quiet(true)
            .secure(true)
            .cork(NoCork)
            .write_timeout(Duration::from_millis(250))
            .max_body_size(1024)
            .lowlevel_error_handler(|_: &crate::handler::AppError| crate::protocol::Response::ok("sorry"))
            .build();
        assert!(options.quiet());
        assert!(options.secure());
        assert!(options.lowlevel_error_handler().is_some());
        assert_eq!(options.write_timeout(), Duration::from_millis(250));
        assert_eq!(options.max_body_size(), Some(1024));
        assert!(format!("{options:?}").contains("lowlevel_error_handler: true"));
    }
}
