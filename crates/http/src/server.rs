//! A ready-made accept loop around the engine.

use std::io;
use std::net::{SocketAddr, ToSocketAddrs};
use std::sync::Arc;

use thiserror::Error;
use tokio::net::TcpListener;
use tracing::{debug, error, info, warn};

use crate::config::Options;
use crate::connection::{ConnectionAcceptor, HttpConnection, PeerAddr, Socket};
use crate::handler::{Application, RequestAdapter};

type SharedAdapter = Arc<RequestAdapter<Arc<dyn Application>>>;

pub struct ServerBuilder {
    address: Option<io::Result<Vec<SocketAddr>>>,
    acceptor: Option<ConnectionAcceptor>,
    application: Option<Arc<dyn Application>>,
    options: Options,
}

impl ServerBuilder {
    fn new() -> Self {
        Self { address: None, acceptor: None, application: None, options: Options::default() }
    }

    /// Address to listen on, bound when the server starts.
    pub fn bind<A: ToSocketAddrs>(mut self, address: A) -> Self {
        self.address = Some(address.to_socket_addrs().map(Iterator::collect));
        self
    }

    /// An already listening socket, used instead of [`bind`](ServerBuilder::bind).
    pub fn acceptor(mut self, acceptor: ConnectionAcceptor) -> Self {
        self.acceptor = Some(acceptor);
        self
    }

    pub fn application(mut self, application: impl Application + 'static) -> Self {
        self.application = Some(Arc::new(application));
        self
    }

    pub fn options(mut self, options: Options) -> Self {
        self.options = options;
        self
    }

    pub fn build(self) -> Result<Server, ServerBuildError> {
        let application = self.application.ok_or(ServerBuildError::MissingApplication)?;
        let listen = match (self.acceptor, self.address) {
            (Some(acceptor), _) => Listen::Acceptor(acceptor),
            (None, Some(Ok(address))) if !address.is_empty() => Listen::Address(address),
            (None, Some(Ok(_))) | (None, None) => return Err(ServerBuildError::MissingAddress),
            (None, Some(Err(source))) => return Err(ServerBuildError::InvalidAddress { source }),
        };

        let adapter = Arc::new(RequestAdapter::new(application, Arc::new(self.options)));
        Ok(Server { listen, adapter })
    }
}

enum Listen {
    Address(Vec<SocketAddr>),
    Acceptor(ConnectionAcceptor),
}

#[derive(Error, Debug)]
pub enum ServerBuildError {
    #[error("application must be set")]
    MissingApplication,
    #[error("address must be set")]
    MissingAddress,
    #[error("invalid address: {source}")]
    InvalidAddress { source: io::Error },
}

#[derive(Error, Debug)]
pub enum ServerError {
    #[error("bind server error: {source}")]
    Bind { source: io::Error },
}

/// Accepts connections and serves each one on its own tokio task.
pub struct Server {
    listen: Listen,
    adapter: SharedAdapter,
}

impl Server {
    pub fn builder() -> ServerBuilder {
        ServerBuilder::new()
    }

    /// Serves until the process ends.
    pub async fn start(self) -> Result<(), ServerError> {
        self.run_until(std::future::pending()).await
    }

    /// Serves until `shutdown` completes.
    ///
    /// Connections already being served keep running on their tasks. With
    /// [`drain_on_shutdown`](Options::drain_on_shutdown), connections still pending on the
    /// listener are accepted and served as well.
    pub async fn run_until<F: Future<Output = ()>>(self, shutdown: F) -> Result<(), ServerError> {
        let acceptor = match self.listen {
            Listen::Acceptor(acceptor) => acceptor,
            Listen::Address(address) => {
                let listener = TcpListener::bind(address.as_slice()).await.map_err(|source| ServerError::Bind { source })?;
                ConnectionAcceptor::from(listener)
            }
        };

        match acceptor.local_addr() {
            Ok(addr) => info!(%addr, "start listening"),
            Err(e) => warn!(cause = %e, "start listening on an unknown address"),
        }

        tokio::pin!(shutdown);
        loop {
            tokio::select! {
                biased;
                _ = &mut shutdown => break,
                accepted = acceptor.accept() => match accepted {
                    Ok((socket, peer)) => serve(&self.adapter, socket, peer),
                    Err(e) => warn!(cause = %e, "failed to accept"),
                },
            }
        }

        if self.adapter.options().drain_on_shutdown() {
            let mut drained = 0usize;
            loop {
                match acceptor.try_accept() {
                    Ok(Some((socket, peer))) => {
                        drained += 1;
                        serve(&self.adapter, socket, peer);
                    }
                    Ok(None) => break,
                    Err(e) => {
                        warn!(cause = %e, "failed to accept while draining");
                        break;
                    }
                }
            }
            info!(drained, "drained pending connections");
        }

        info!("stop listening");
        Ok(())
    }
}

fn serve(adapter: &SharedAdapter, socket: Arc<dyn Socket>, peer: PeerAddr) {
    let adapter = Arc::clone(adapter);
    tokio::spawn(async move {
        let connection = HttpConnection::new(socket, peer.clone(), Arc::clone(adapter.options()));
        match connection.process(adapter.as_ref()).await {
            Ok(()) => debug!(%peer, "finished process, connection shutdown"),
            Err(e) => error!(%peer, cause = %e, "service has error, connection shutdown"),
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::cork::NoCork;
    use crate::handler::{AppError, make_application};
    use crate::protocol::{RequestContext, Response};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpStream;
    use tokio::sync::oneshot;

    fn app() -> impl Application {
        make_application(|_: &mut RequestContext| Ok::<_, AppError>(Response::ok("ok")))
    }

    async fn exchange(addr: SocketAddr, request: &[u8]) -> String {
        let mut client = TcpStream::connect(addr).await.unwrap();
        client.write_all(request).await.unwrap();
        let mut response = String::new();
        client.read_to_string(&mut response).await.unwrap();
        response
    }

    #[test]
    fn build_needs_application_and_address() {
        assert!(matches!(Server::builder().bind("127.0.0.1:0").build(), Err(ServerBuildError::MissingApplication)));
        assert!(matches!(Server::builder().application(app()).build(), Err(ServerBuildError::MissingAddress)));
        assert!(matches!(
            Server::builder().application(app()).bind("not an address").build(),
            Err(ServerBuildError::InvalidAddress { .. })
        ));
        assert!(Server::builder().application(app()).bind("127.0.0.1:0").build().is_ok());
    }

    #[tokio::test]
    async fn serves_over_loopback() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let options = Options::builder().cork(NoCork).quiet(true).build();
        let server = Server::builder()
            .acceptor(ConnectionAcceptor::from(listener))
            .application(make_application(|env: &mut RequestContext| {
                Ok::<_, AppError>(Response::ok(format!("hello {}", env.path())))
            }))
            .options(options)
            .build()
            .unwrap();

        let (stop, stopped) = oneshot::channel::<()>();
        let running = tokio::spawn(server.run_until(async {
            let _ = stopped.await;
        }));

        let response = exchange(addr, b"GET /world HTTP/1.1\r\nConnection: close\r\n\r\n").await;
        assert_eq!(response, "HTTP/1.1 200 OK\r\nConnection: close\r\nContent-Length: 12\r\n\r\nhello /world");

        stop.send(()).unwrap();
        assert!(running.await.unwrap().is_ok());
    }

    #[tokio::test]
    async fn drains_pending_connections_on_shutdown() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let options = Options::builder().cork(NoCork).quiet(true).drain_on_shutdown(true).build();
        let server = Server::builder()
            .acceptor(ConnectionAcceptor::try_from(listener).unwrap())
            .application(app())
            .options(options)
            .build()
            .unwrap();

        // queued in the backlog before the server ever runs
        let mut client = TcpStream::connect(addr).await.unwrap();
        server.run_until(async {}).await.unwrap();

        client.write_all(b"GET / HTTP/1.0\r\n\r\n").await.unwrap();
        let mut response = String::new();
        client.read_to_string(&mut response).await.unwrap();
        assert_eq!(response, "HTTP/1.0 200 OK\r\nContent-Length: 2\r\n\r\nok");
    }
}
