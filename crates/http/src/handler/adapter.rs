//! One request/response cycle.
//!
//! [`RequestAdapter::handle`] prepares the request context, calls the application inside a
//! failure boundary, interprets the returned `(status, headers, body)` and drives the
//! [`ResponseWriter`]. Whatever happens, the input body and the response body are closed and the
//! queued after-reply callbacks run, in registration order.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use tracing::{debug, trace};

use crate::config::Options;
use crate::connection::{ResponseWriter, WriterState};
use crate::handler::{AppError, Application, ErrorFallback};
use crate::protocol::body::{Body, InputBody};
use crate::protocol::{ASYNC_STATUS, ConnectionError, Headers, HttpError, Outcome, RequestContext, Response};

/// Largest value accepted as an HTTP status
const MAX_STATUS: u16 = 999;

#[derive(Debug)]
pub struct RequestAdapter<A> {
    app: A,
    options: Arc<Options>,
    fallback: ErrorFallback,
}

impl<A: Application> RequestAdapter<A> {
    pub fn new(app: A, options: Arc<Options>) -> Self {
        let fallback = options.error_fallback();
        Self { app, options, fallback }
    }

    pub fn options(&self) -> &Arc<Options> {
        &self.options
    }

    pub fn application(&self) -> &A {
        &self.app
    }

    /// Runs the application for `env` and writes its response through `writer`.
    ///
    /// The head and body are written but the response is not finalized: the caller calls
    /// [`ResponseWriter::finalize`] for [`Outcome::Complete`] and leaves the connection alone
    /// otherwise.
    ///
    /// Application errors and panics become the fallback response and are never returned. A
    /// malformed asynchronous answer or status is returned as [`HttpError::ProtocolViolation`]
    /// after the fallback response was sent with `Connection: close`. Socket failures are
    /// returned as [`HttpError::ResponseError`].
    pub async fn handle(
        &self,
        env: &mut RequestContext,
        input: InputBody,
        writer: &mut ResponseWriter,
    ) -> Result<Outcome, HttpError> {
        let socket = writer.socket().cloned().ok_or_else(|| ConnectionError::invalid_state("writer has no socket"))?;
        env.publish_socket(Arc::clone(&socket));
        env.install_hijack(socket);

        let head = env.header().is_head();
        env.mark_head(head);
        env.attach_input(input);
        env.resolve_url_scheme();
        env.reset_after_reply();

        let result = self.respond(env, writer).await;

        env.input_mut().close();
        env.run_after_reply();
        result
    }

    async fn respond(&self, env: &mut RequestContext, writer: &mut ResponseWriter) -> Result<Outcome, HttpError> {
        let response = match AssertUnwindSafe(self.app.call(env)).catch_unwind().await {
            Ok(Ok(response)) => response,
            Ok(Err(error)) => self.recover(env, error),
            Err(panic) => self.recover(env, AppError::from_panic(panic)),
        };
        let (status, headers, mut body) = response.into_parts();

        let hijacked = env.is_hijacked();
        let result = self.write_response(hijacked, env.path(), writer, status, headers, &mut body).await;
        body.close();

        if let Err(HttpError::ProtocolViolation { reason }) = &result
            && writer.state() == WriterState::Idle
        {
            let response = self.recover(env, AppError::msg(reason.clone()));
            self.write_fallback(writer, response).await;
        }
        result
    }

    /// Sends `response` and closes the connection after it. Failures are only logged, the
    /// connection is dropped anyway.
    async fn write_fallback(&self, writer: &mut ResponseWriter, response: Response) {
        let (status, headers, mut body) = response.into_parts();
        let status = u16::try_from(status).ok().filter(|status| *status <= MAX_STATUS).unwrap_or(500);

        writer.close_connection();
        writer.set_status(status);
        writer.set_content_length(body.single_chunk_len());
        writer.set_headers(headers);

        let written = async {
            writer.write_header().await?;
            writer.write_body(&mut body).await?;
            writer.finalize().await
        }
        .await;
        body.close();

        if let Err(e) = written {
            debug!(cause = %e, "failed to send the fallback response");
        }
    }

    fn recover(&self, env: &RequestContext, error: AppError) -> Response {
        self.options.error_reporter().report(&error, env);
        self.fallback.handle(&error)
    }

    async fn write_response(
        &self,
        hijacked: bool,
        path: &str,
        writer: &mut ResponseWriter,
        status: i32,
        headers: Headers,
        body: &mut Body,
    ) -> Result<Outcome, HttpError> {
        if hijacked {
            debug!(path, "connection hijacked by the application");
            writer.hijack();
            return Ok(Outcome::Hijacked);
        }

        if status == ASYNC_STATUS {
            if !headers.is_empty() || !body.is_empty() {
                return Err(HttpError::protocol_violation("async response must have empty headers and body"));
            }
            trace!(path, "application answers asynchronously");
            return Ok(Outcome::Async);
        }

        let status = u16::try_from(status)
            .ok()
            .filter(|status| *status <= MAX_STATUS)
            .ok_or_else(|| HttpError::protocol_violation(format!("invalid response status {status}")))?;

        writer.set_status(status);
        writer.set_content_length(body.single_chunk_len());
        writer.set_headers(headers);
        writer.write_header().await?;
        writer.write_body(body).await?;

        Ok(Outcome::Complete { keep_alive: writer.keep_alive() })
    }
}
