//! Lamp controller: a JSON settings endpoint and streamed virtual files.
//!
//! ```text
//! cargo run --example lamp --features json
//! curl localhost:8080/parameters
//! curl -X POST localhost:8080/parameters -d '{"on":true,"brightness":80,"color":"warm"}'
//! curl -OJ localhost:8080/files/log.txt
//! ```

use serde::{Deserialize, Serialize};
use simplehttp::{
    limits::ConnLimits, Config, Method, Request, Response, Route, Server, StatusCode, StreamBody,
};
use std::{
    sync::{Arc, Mutex},
    time::Duration,
};
use tracing::info;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Parameters {
    on: bool,
    brightness: u8,
    color: String,
}

struct Lamp {
    parameters: Mutex<Parameters>,
    files: Vec<(&'static str, u64)>,
}

fn parameters(req: &Request, lamp: &Arc<Lamp>) -> Response {
    let Ok(mut current) = lamp.parameters.lock() else {
        return Response::empty(StatusCode::InternalServerError);
    };

    if req.method() == Method::Post {
        match req.json::<Parameters>() {
            Ok(new) => {
                info!(?new, "parameters updated");
                *current = new;
            }
            Err(err) => return Response::text(StatusCode::BadRequest, err.to_string()),
        }
    }

    Response::json(StatusCode::Ok, &*current)
}

fn file(req: &Request, lamp: &Arc<Lamp>) -> Response {
    let Some(name) = req.path_param_decoded(0) else {
        return Response::empty(StatusCode::NotFound);
    };
    let Some(&(_, size)) = lamp.files.iter().find(|(file, _)| *file == name) else {
        return Response::empty(StatusCode::NotFound);
    };

    // Virtual contents: numbered lines, generated as they are sent.
    let body = StreamBody::new(Some(size), move |sent| {
        if sent >= size {
            return None;
        }
        let line = format!("{:015}\n", sent / 16);
        let len = line.len().min((size - sent) as usize);
        Some(line.as_bytes()[..len].to_vec())
    })
    .on_cleanup({
        let name = name.clone();
        move || info!(file = %name, "download finished")
    });

    Response::download_stream(StatusCode::Ok, &name, body)
}

#[tokio::main]
async fn main() -> Result<(), simplehttp::ServerError> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "lamp=info,simplehttp=debug".into()),
        )
        .init();

    let lamp = Arc::new(Lamp {
        parameters: Mutex::new(Parameters {
            on: false,
            brightness: 50,
            color: "white".into(),
        }),
        files: vec![("log.txt", 4096), ("firmware.bin", 64 * 1024)],
    });

    Server::builder()
        .config(Config {
            port: "http-alt".into(),
            append_slashes: true,
            ..Config::default()
        })
        .route(Route::with_context(
            Method::Get | Method::Post,
            "/parameters",
            lamp.clone(),
            parameters,
        ))
        .route(Route::with_context(Method::Get | Method::Head, "/files/?", lamp, file))
        .connection_limits(ConnLimits {
            socket_read_timeout: Some(Duration::from_secs(5)),
            socket_write_timeout: Some(Duration::from_secs(5)),
            ..ConnLimits::default()
        })
        .build()
        .listen()
        .await
}
