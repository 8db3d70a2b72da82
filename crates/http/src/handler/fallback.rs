use std::fmt::Write;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;

use tracing::warn;

use crate::handler::AppError;
use crate::protocol::body::Body;
use crate::protocol::{Headers, Response};

/// Body of the generic `500` response
pub const GENERIC_ERROR_BODY: &str = "An unhandled lowlevel error occurred. The application logs may have details.\n";

/// Replaces the built-in `500` response for application failures.
pub trait LowlevelErrorHandler: Send + Sync {
    fn handle(&self, error: &AppError) -> Response;
}

impl<F> LowlevelErrorHandler for F
where
    F: Fn(&AppError) -> Response + Send + Sync,
{
    fn handle(&self, error: &AppError) -> Response {
        self(error)
    }
}

/// Turns an application failure into a response. Never fails.
#[derive(Clone, Default)]
pub struct ErrorFallback {
    handler: Option<Arc<dyn LowlevelErrorHandler>>,
    leak_stack: bool,
}

impl ErrorFallback {
    pub fn new(handler: Option<Arc<dyn LowlevelErrorHandler>>, leak_stack: bool) -> Self {
        Self { handler, leak_stack }
    }

    /// The custom handler's response when one is configured, a `500` otherwise.
    ///
    /// With `leak_stack` the `500` body carries the error message, its kind, its causes and the
    /// captured backtrace.
    pub fn handle(&self, error: &AppError) -> Response {
        if let Some(handler) = &self.handler {
            match catch_unwind(AssertUnwindSafe(|| handler.handle(error))) {
                Ok(response) => return response,
                Err(_) => warn!(kind = error.kind(), "lowlevel error handler panicked, using the generic response"),
            }
        }

        let body = if self.leak_stack { Body::from(diagnostic(error)) } else { Body::from(GENERIC_ERROR_BODY) };
        Response::new(500, Headers::new(), body)
    }
}

fn diagnostic(error: &AppError) -> String {
    let mut body = format!("Server caught this error: {} ({})\n", error.message(), error.kind());
    for cause in error.causes() {
        let _ = writeln!(body, "caused by: {cause}");
    }
    let _ = write!(body, "{}", error.backtrace());
    body
}

impl std::fmt::Debug for ErrorFallback {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ErrorFallback")
            .field("custom_handler", &self.handler.is_some())
            .field("leak_stack", &self.leak_stack)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn body_text(response: Response) -> String {
        let (_, _, mut body) = response.into_parts();
        let mut text = Vec::new();
        while let Some(chunk) = body.next_chunk().await {
            text.extend_from_slice(&chunk.unwrap());
        }
        String::from_utf8(text).unwrap()
    }

    #[tokio::test]
    async fn generic_response_hides_the_error() {
        let response = ErrorFallback::default().handle(&AppError::msg("password=hunter2"));
        assert_eq!(response.status(), 500);
        assert!(response.headers().is_empty());
        assert_eq!(body_text(response).await, GENERIC_ERROR_BODY);
    }

    #[tokio::test]
    async fn leaked_diagnostics() {
        let response = ErrorFallback::new(None, true).handle(&AppError::msg("database unreachable"));
        assert_eq!(response.status(), 500);
        let text = body_text(response).await;
        assert!(text.starts_with("Server caught this error: database unreachable (AppError)\n"));
    }

    #[tokio::test]
    async fn custom_handler_is_used_unmodified() {
        let handler: Arc<dyn LowlevelErrorHandler> = Arc::new(|error: &AppError| {
            Response::new(503, [("Retry-After", "5")].into_iter().collect::<Headers>(), Body::from(error.message()))
        });
        let response = ErrorFallback::new(Some(handler), true).handle(&AppError::msg("overloaded"));
        assert_eq!(response.status(), 503);
        assert_eq!(response.headers().get("retry-after"), Some("5"));
        assert_eq!(body_text(response).await, "overloaded");
    }

    #[tokio::test]
    async fn panicking_handler_falls_back() {
        let handler: Arc<dyn LowlevelErrorHandler> = Arc::new(|_: &AppError| -> Response { panic!("handler bug") });
        let response = ErrorFallback::new(Some(handler), false).handle(&AppError::msg("first failure"));
        assert_eq!(response.status(), 500);
        assert_eq!(body_text(response).await, GENERIC_ERROR_BODY);
    }
}
