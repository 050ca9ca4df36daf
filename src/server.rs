use std::{
    io::{Cursor, ErrorKind, Read},
    path::{Component, Path, PathBuf},
    sync::Arc,
};

use anyhow::anyhow;
use tiny_http::{Header, Request, Response, Server};

use crate::{
    api::{
        router::{self, Route, RouteError},
        Api, ApiResponse,
    },
    store::SpatialStore,
};

type HttpResponse = Response<Cursor<Vec<u8>>>;

/// Largest request body read, in bytes.
const MAX_BODY_BYTES: u64 = 1024 * 1024;

struct Service<S> {
    api: Api<S>,
    static_dir: Option<PathBuf>,
}

/// Serve `api` and the static files on `listen_address` until the process is stopped. Requests
/// are handled on the rayon thread pool.
pub fn serve<S>(api: Api<S>, listen_address: &str, static_dir: Option<PathBuf>) -> anyhow::Result<()>
where
    S: SpatialStore + Send + Sync + 'static,
{
    let server = Server::http(listen_address)
        .map_err(|err| anyhow!("Could not listen on {}: {}", listen_address, err))?;
    log::info!("Listening on http://{}", listen_address);
    if let Some(static_dir) = &static_dir {
        log::info!("Serving static files from {:?}", static_dir);
    }

    let service = Arc::new(Service { api, static_dir });
    for request in server.incoming_requests() {
        let service = Arc::clone(&service);
        rayon::spawn(move || service.respond(request));
    }
    Ok(())
}

impl<S: SpatialStore> Service<S> {
    fn respond(&self, mut request: Request) {
        let method = request.method().clone();
        let url = request.url().to_string();
        let (status, response) = match router::route(&method, &url) {
            Ok(Route::Api(route)) => {
                let api_response = match read_body(request.as_reader(), MAX_BODY_BYTES) {
                    Ok(body) => self.api.handle(&route, &body),
                    Err(api_response) => api_response,
                };
                (api_response.status, json_response(&api_response))
            }
            Ok(Route::Static(path)) => self.static_file(&path),
            Err(err) => {
                let api_response = ApiResponse::error(err.status_code(), &err.to_string());
                (api_response.status, json_response(&api_response))
            }
        };
        log::info!("{} {} {}", method, url, status);
        if let Err(err) = request.respond(response) {
            log::warn!("Could not send response to {} {}: {}", method, url, err);
        }
    }

    fn static_file(&self, request_path: &str) -> (u16, HttpResponse) {
        let not_found = || {
            let api_response = ApiResponse::error(404, &RouteError::NotFound.to_string());
            (404, json_response(&api_response))
        };
        let Some(filepath) = self
            .static_dir
            .as_deref()
            .and_then(|static_dir| static_file_path(static_dir, request_path))
        else {
            return not_found();
        };
        match std::fs::read(&filepath) {
            Ok(contents) => (
                200,
                with_content_type(Response::from_data(contents), content_type(&filepath)),
            ),
            Err(err) if err.kind() == ErrorKind::NotFound => not_found(),
            Err(err) => {
                log::error!("Could not read {:?}: {}", filepath, err);
                let api_response = ApiResponse::error(500, &err.to_string());
                (500, json_response(&api_response))
            }
        }
    }
}

/// Read at most `limit` bytes of UTF-8. Longer bodies are refused without reading the rest.
fn read_body(reader: &mut dyn Read, limit: u64) -> Result<String, ApiResponse> {
    let mut body = String::new();
    reader
        .take(limit + 1)
        .read_to_string(&mut body)
        .map_err(|err| ApiResponse::error(400, &format!("Could not read body: {}", err)))?;
    if body.len() as u64 > limit {
        return Err(ApiResponse::error(
            413,
            &format!("Request body exceeds {} bytes", limit),
        ));
    }
    Ok(body)
}

fn json_response(api_response: &ApiResponse) -> HttpResponse {
    let response = Response::from_string(api_response.body.to_string())
        .with_status_code(api_response.status);
    with_content_type(response, "application/json")
}

fn with_content_type(response: HttpResponse, content_type: &str) -> HttpResponse {
    match Header::from_bytes(&b"Content-Type"[..], content_type.as_bytes()) {
        Ok(header) => response.with_header(header),
        Err(()) => response,
    }
}

/// Location of a requested static file. Only plain path components are accepted, so a request
/// can never leave `static_dir`. Directories resolve to their `index.html`.
fn static_file_path(static_dir: &Path, request_path: &str) -> Option<PathBuf> {
    let relative = Path::new(request_path);
    if !relative
        .components()
        .all(|component| matches!(component, Component::Normal(_)))
    {
        return None;
    }
    let filepath = static_dir.join(relative);
    if request_path.is_empty() || request_path.ends_with('/') || filepath.is_dir() {
        Some(filepath.join("index.html"))
    } else {
        Some(filepath)
    }
}

fn content_type(filepath: &Path) -> &'static str {
    let extension = filepath
        .extension()
        .and_then(|extension| extension.to_str())
        .map(str::to_ascii_lowercase);
    match extension.as_deref() {
        Some("html") | Some("htm") => "text/html; charset=utf-8",
        Some("css") => "text/css; charset=utf-8",
        Some("js") | Some("mjs") => "text/javascript; charset=utf-8",
        Some("json") => "application/json",
        Some("geojson") => "application/geo+json",
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("svg") => "image/svg+xml",
        Some("ico") => "image/x-icon",
        Some("txt") => "text/plain; charset=utf-8",
        _ => "application/octet-stream",
    }
}
