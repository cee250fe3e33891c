//! `srwebmq`'s HTTP surface (spec §4.15): `GET /get_next`, returning the
//! oldest pending row's config or an empty body when there is none.

use tiny_http::{Response, Server};

use crate::store::RetentionQueue;

/// Runs the accept loop forever, popping at most one row per request.
pub fn serve(server: Server, queue: &RetentionQueue) {
    loop {
        let request = match server.recv() {
            Ok(r) => r,
            Err(e) => {
                tracing::error!(error = %e, "http accept failed");
                continue;
            }
        };
        handle(request, queue);
    }
}

fn handle(request: tiny_http::Request, queue: &RetentionQueue) {
    if request.url() != "/get_next" {
        let _ = request.respond(Response::from_string("not found").with_status_code(tiny_http::StatusCode(404)));
        return;
    }

    match queue.pop_next() {
        Ok(Some(run)) => {
            let _ = request.respond(Response::from_string(run.config));
        }
        Ok(None) => {
            let _ = request.respond(Response::from_string(""));
        }
        Err(e) => {
            tracing::error!(error = %e, "failed to pop next run");
            let _ = request.respond(Response::from_string(e.to_string()).with_status_code(tiny_http::StatusCode(500)));
        }
    }
}
