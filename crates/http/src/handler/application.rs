use std::sync::Arc;

use async_trait::async_trait;

use crate::handler::AppError;
use crate::protocol::{RequestContext, Response};

/// The callable the engine drives for every request.
///
/// Returning a response with status [`ASYNC_STATUS`](crate::protocol::ASYNC_STATUS), no headers
/// and an empty body tells the engine the application answers on its own later. Calling
/// [`RequestContext::hijack`] takes the connection over; whatever is returned afterwards is ignored.
#[async_trait]
pub trait Application: Send + Sync {
    async fn call(&self, env: &mut RequestContext) -> Result<Response, AppError>;
}

#[async_trait]
impl<A: Application + ?Sized> Application for Arc<A> {
    async fn call(&self, env: &mut RequestContext) -> Result<Response, AppError> {
        self.as_ref().call(env).await
    }
}

/// An [`Application`] made of a plain function, see [`make_application`].
#[derive(Debug)]
pub struct AppFn<F> {
    f: F,
}

#[async_trait]
impl<F, E> Application for AppFn<F>
where
    F: Fn(&mut RequestContext) -> Result<Response, E> + Send + Sync,
    E: Into<AppError>,
{
    async fn call(&self, env: &mut RequestContext) -> Result<Response, AppError> {
        (self.f)(env).map_err(Into::into)
    }
}

pub fn make_application<F, E>(f: F) -> AppFn<F>
where
    F: Fn(&mut RequestContext) -> Result<Response, E> + Send + Sync,
    E: Into<AppError>,
{
    AppFn { f }
}
