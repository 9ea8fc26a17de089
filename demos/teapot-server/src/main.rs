//! Demo server: every route fails in a different way.
//!
//! ```text
//! curl -i localhost:3000/           # 200 hello
//! curl -i localhost:3000/teapot     # 418 {"errors":["short and stout"]}
//! curl -i localhost:3000/panic      # 500 {"errors":["[teapot_server::route main.rs:..] (i32) 418"]}
//! curl -i localhost:3000/late       # 202, failure only logged
//! ```

use std::net::SocketAddr;

use faultline::middleware::{LoggingLayer, ServiceBuilder};
use faultline::prelude::*;
use hyper::body::Incoming;
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto::Builder;
use hyper_util::service::TowerToHyperService;
use tokio::net::TcpListener;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

async fn route(writer: ResponseWriter, request: http::Request<Incoming>) -> Result<(), BoxError> {
    match request.uri().path() {
        "/" => {
            writer.write(b"hello\n")?;
            Ok(())
        }
        "/teapot" => Err(http_error!(StatusCode::IM_A_TEAPOT, "short and stout").into()),
        "/panic" => std::panic::panic_any(418_i32),
        "/late" => {
            writer.set_status(StatusCode::ACCEPTED);
            Err("failed after the status was sent".into())
        }
        path => Err(http_error!(StatusCode::NOT_FOUND, "no route for {path}").into()),
    }
}

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let dispatcher = Dispatcher::new(DispatchConfig::builder().recover_panic(true).build());
    let service = ServiceBuilder::new()
        .layer(LoggingLayer::new())
        .layer(dispatcher.layer())
        .service(handler_fn(route));

    let addr = SocketAddr::from(([127, 0, 0, 1], 3000));
    let listener = TcpListener::bind(addr).await?;
    info!(%addr, "listening");

    loop {
        let (stream, peer) = match listener.accept().await {
            Ok(accepted) => accepted,
            Err(err) => {
                error!(error = %err, "failed to accept connection");
                continue;
            }
        };

        let service = TowerToHyperService::new(service.clone());
        tokio::spawn(async move {
            if let Err(err) = Builder::new(TokioExecutor::new())
                .serve_connection(TokioIo::new(stream), service)
                .await
            {
                error!(%peer, error = %err, "connection failed");
            }
        });
    }
}
