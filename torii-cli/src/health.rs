use std::convert::Infallible;
use std::net::SocketAddr;

use anyhow::Result;
use hyper::service::{make_service_fn, service_fn};
use hyper::{Body, Method, Request, Response, StatusCode};
use tokio::task::JoinHandle;
use tracing::{error, info};

/// Launch the liveness endpoint. Returns the bound address so callers (and
/// tests) can use port 0.
pub fn spawn_health_server(addr: SocketAddr) -> Result<(SocketAddr, JoinHandle<()>)> {
    let make_svc = make_service_fn(|_| async {
        Ok::<_, Infallible>(service_fn(|req: Request<Body>| async move {
            Ok::<_, Infallible>(route(&req))
        }))
    });
    let server = hyper::Server::try_bind(&addr)?.serve(make_svc);
    let local_addr = server.local_addr();
    let handle = tokio::spawn(async move {
        if let Err(err) = server.await {
            error!(error = %err, "health server terminated");
        } else {
            info!("health server shutdown");
        }
    });
    Ok((local_addr, handle))
}

fn route(req: &Request<Body>) -> Response<Body> {
    match (req.method(), req.uri().path()) {
        (&Method::GET, "/health") => json_response(StatusCode::OK, r#"{"status":"healthy"}"#),
        _ => json_response(StatusCode::NOT_FOUND, r#"{"error":"Not found"}"#),
    }
}

fn json_response(status: StatusCode, body: &'static str) -> Response<Body> {
    Response::builder()
        .status(status)
        .header("Content-Type", "application/json")
        .body(Body::from(body))
        .unwrap_or_else(|_| {
            let mut resp = Response::new(Body::from(r#"{"error":"Internal server error"}"#));
            *resp.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
            resp
        })
}
