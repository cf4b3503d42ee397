//! HTTP response handlers.

use std::{fs, path::Path};

use anyhow::{Context, Result, anyhow};
use tiny_http::{Header, Method, Request, Response, StatusCode};

use crate::core::{PathError, ServeRoot};
use crate::embed::serve::{INDEX_HTML, IndexVars, PREVIEW_HTML, PreviewVars};
use crate::utils::mime::types::{HTML, PLAIN};

/// Respond with a static file from the serving root.
pub fn respond_file(request: Request, path: &Path) -> Result<()> {
    let content_type = crate::utils::mime::from_path(path);

    if is_head_request(&request) {
        return send_head(request, 200, content_type);
    }

    let body = fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    send_body(request, 200, content_type, body)
}

/// Respond with the preview page for one document.
pub fn respond_preview(request: Request, title: &str, ws_port: u16) -> Result<()> {
    if is_head_request(&request) {
        return send_head(request, 200, HTML);
    }

    let body = PREVIEW_HTML.render(&PreviewVars {
        title: title.to_string(),
        ws_port,
    });
    send_body(request, 200, HTML, body.into_bytes())
}

/// Respond with the list of documents in the root (directory mode).
pub fn respond_index(request: Request, root: &ServeRoot) -> Result<()> {
    if is_head_request(&request) {
        return send_head(request, 200, HTML);
    }

    let documents = root.documents().context("Failed to list documents")?;
    let title = root
        .dir()
        .file_name()
        .map_or_else(|| root.dir().display().to_string(), |n| n.to_string_lossy().into_owned());

    let body = INDEX_HTML.render(&IndexVars { title, documents });
    send_body(request, 200, HTML, body.into_bytes())
}

/// Respond with a 302 redirect.
pub fn respond_redirect(request: Request, location: &str) -> Result<()> {
    let response = Response::empty(StatusCode(302)).with_header(header("Location", location)?);
    request.respond(response)?;
    Ok(())
}

/// Respond to a path that cannot be served (403, 404 or 400).
pub fn respond_path_error(request: Request, err: &PathError) -> Result<()> {
    let status = err.status();
    crate::debug!("serve"; "{} {}: {}", status, request.url(), err);

    if is_head_request(&request) {
        return send_head(request, status, PLAIN);
    }

    let body = match status {
        403 => "403 Forbidden",
        400 => "400 Bad Request",
        _ => "404 Not Found",
    };
    send_body(request, status, PLAIN, body.as_bytes().to_vec())
}

/// Respond with 503 Service Unavailable (server shutting down).
pub fn respond_unavailable(request: Request) -> Result<()> {
    send_body(request, 503, PLAIN, b"503 Service Unavailable".to_vec())
}

fn is_head_request(request: &Request) -> bool {
    request.method() == &Method::Head
}

fn send_head(request: Request, status: u16, content_type: &str) -> Result<()> {
    let response =
        Response::empty(StatusCode(status)).with_header(header("Content-Type", content_type)?);
    request.respond(response)?;
    Ok(())
}

fn send_body(request: Request, status: u16, content_type: &str, body: Vec<u8>) -> Result<()> {
    let response = Response::from_data(body)
        .with_status_code(StatusCode(status))
        .with_header(header("Content-Type", content_type)?)
        .with_header(header("Cache-Control", "no-cache")?);
    request.respond(response)?;
    Ok(())
}

fn header(key: &str, value: &str) -> Result<Header> {
    Header::from_bytes(key, value).map_err(|()| anyhow!("invalid header `{key}: {value}`"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header() {
        let h = header("Location", "/doc.md").unwrap();
        assert_eq!(h.field.as_str().as_str(), "Location");
        assert_eq!(h.value.as_str(), "/doc.md");
        assert!(header("Location", "/ü.md").is_err());
    }
}
