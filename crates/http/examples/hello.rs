use plumb_http::handler::{AppError, make_application};
use plumb_http::protocol::body::Body;
use plumb_http::protocol::{Headers, RequestContext, Response};
use plumb_http::{Options, Server};
use tracing::{Level, error};
use tracing_subscriber::FmtSubscriber;

fn hello(env: &mut RequestContext) -> Result<Response, AppError> {
    match env.path() {
        "/" => Ok(Response::ok("Hello World!\r\n").with_header("Content-Type", "text/plain; charset=utf-8")),
        "/stream" => {
            let body = Body::from_chunks(["streamed ", "in ", "chunks\r\n"]);
            Ok(Response::new(200, Headers::new(), body))
        }
        "/fail" => Err(AppError::msg("this endpoint always fails")),
        _ => Ok(Response::new(404, Headers::new(), Body::from("not found\r\n"))),
    }
}

#[tokio::main]
async fn main() {
    let subscriber = FmtSubscriber::builder().with_max_level(Level::INFO).finish();
    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");

    let options = Options::builder().leak_stack_on_error(true).drain_on_shutdown(true).build();
    let server = match Server::builder().bind("127.0.0.1:8080").application(make_application(hello)).options(options).build() {
        Ok(server) => server,
        Err(e) => {
            error!(cause = %e, "invalid server configuration");
            return;
        }
    };

    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(cause = %e, "can't listen for ctrl-c");
        }
    };
    if let Err(e) = server.run_until(shutdown).await {
        error!(cause = %e, "server stopped");
    }
}
