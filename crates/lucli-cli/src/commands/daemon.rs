//! `lucli daemon`: a JSON-framed request/response endpoint over a single
//! `tiny_http::Server::incoming_requests()` loop, routed by a `command`
//! field in the request body rather than by URL path.
//!
//! The core orchestrator is invoked per command and keeps no persistent
//! process; this daemon lives entirely in the external-collaborator layer,
//! opening a fresh `Engine` per request exactly as a one-shot CLI
//! invocation would.

use lucli_core::{Engine, StartOptions};
use serde_json::{json, Value};
use std::io::Read as _;
use std::path::PathBuf;
use tiny_http::{Method, Response, Server, StatusCode};
use tracing::{error, info};

fn respond_json(req: tiny_http::Request, body: Value) {
    let rendered = serde_json::to_string(&body).unwrap_or_else(|_| "{}".to_owned());
    let header = tiny_http::Header::from_bytes("Content-Type", "application/json").expect("valid header");
    let _ = req.respond(Response::from_string(rendered).with_header(header));
}

fn dispatch(home: &PathBuf, request: &Value) -> Value {
    let Some(command) = request.get("command").and_then(Value::as_str) else {
        return json!({"ok": false, "error": "missing 'command' field"});
    };

    let engine = match Engine::new(home) {
        Ok(e) => e,
        Err(e) => return json!({"ok": false, "error": e.to_string()}),
    };

    let name = request.get("name").and_then(Value::as_str);

    let result = match command {
        "server.list" => engine.list().map(|views| {
            json!(views
                .iter()
                .map(|v| json!({"name": v.name, "state": v.state.to_string(), "port": v.port}))
                .collect::<Vec<_>>())
        }),
        "server.status" => match name {
            Some(n) => engine
                .status(n)
                .map(|v| json!({"name": v.name, "state": v.state.to_string(), "port": v.port})),
            None => return json!({"ok": false, "error": "'name' is required for server.status"}),
        },
        "server.stop" => match name {
            Some(n) => engine.stop(n).map(|()| json!({"stopped": n})),
            None => return json!({"ok": false, "error": "'name' is required for server.stop"}),
        },
        "server.start" => {
            let project_dir = request
                .get("projectDir")
                .and_then(Value::as_str)
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("."));
            let opts = StartOptions {
                name: name.map(str::to_owned),
                ..Default::default()
            };
            engine
                .start(&project_dir, &opts)
                .map(|o| json!({"name": o.name, "state": o.state.to_string(), "url": o.url}))
        }
        other => return json!({"ok": false, "error": format!("unknown command '{other}'")}),
    };

    match result {
        Ok(payload) => json!({"ok": true, "result": payload}),
        Err(e) => json!({"ok": false, "error": e.to_string()}),
    }
}

fn handle_request(home: &PathBuf, mut req: tiny_http::Request) {
    if *req.method() != Method::Post {
        let _ = req.respond(Response::from_string("only POST is accepted").with_status_code(StatusCode(405)));
        return;
    }
    let mut body = String::new();
    if req.as_reader().read_to_string(&mut body).is_err() {
        let _ = req.respond(Response::from_string("read error").with_status_code(StatusCode(500)));
        return;
    }
    let parsed: Value = match serde_json::from_str(&body) {
        Ok(v) => v,
        Err(e) => {
            respond_json(req, json!({"ok": false, "error": format!("malformed JSON: {e}")}));
            return;
        }
    };
    let response = dispatch(home, &parsed);
    respond_json(req, response);
}

pub fn run(home: &std::path::Path, port: u16) -> u8 {
    let addr = format!("127.0.0.1:{port}");
    let server = match Server::http(&addr) {
        Ok(s) => s,
        Err(e) => {
            error!("failed to bind daemon socket on {addr}: {e}");
            return crate::commands::EXIT_FAILURE;
        }
    };
    info!("lucli daemon listening on {addr}");
    lucli_core::install_signal_handler();
    let home = home.to_path_buf();
    for request in server.incoming_requests() {
        if lucli_core::shutdown_requested() {
            break;
        }
        handle_request(&home, request);
    }
    crate::commands::EXIT_SUCCESS
}
