//! Preview server: HTTP pages plus the push endpoint.
//!
//! ```text
//! GET /              -> 302 to the document (single file) or document list
//! GET /<doc>.md      -> preview page, connects to ws://<host>:<ws_port>/<doc>.md/ws
//! GET /<anything>    -> static file from the serving root
//! ```

mod lifecycle;
mod response;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Result;
use tiny_http::{Request, Server};
use tokio_util::sync::CancellationToken;

use crate::config::ServeConfig;
use crate::core::{PathError, ServeRoot, is_markdown, is_shutdown, register_server};
use crate::utils::url::document_href;
use crate::{debug, log};

/// Number of threads answering HTTP requests.
const REQUEST_THREADS: usize = 4;

/// Bind both listeners, start the supervisor and serve until shutdown.
pub fn serve(root: ServeRoot, config: &ServeConfig) -> Result<()> {
    let (host, port) = config.host_port()?;

    let (server, port) = lifecycle::bind_with_retry(host, port)?;
    let server = Arc::new(server);
    let (ws_listener, ws_port) = crate::reload::server::bind(host, config.ws_port)?;
    debug!("ws"; "push endpoint on port {}", ws_port);

    let sessions = CancellationToken::new();
    register_server(Arc::clone(&server), sessions.clone());

    let root = Arc::new(root);
    let supervisor = lifecycle::spawn_supervisor(
        Arc::clone(&root),
        config.session(),
        sessions.clone(),
        ws_listener,
    )?;

    let page = root.document().map_or_else(|| "/".to_string(), document_href);
    log!("serve"; "http://{}:{}{}", display_host(host), port, page);

    run_request_loop(&server, &root, ws_port)?;

    sessions.cancel();
    lifecycle::wait_for_shutdown(supervisor);
    Ok(())
}

/// Bracket IPv6 literals for use in a URL.
fn display_host(host: &str) -> String {
    if host.contains(':') {
        format!("[{host}]")
    } else {
        host.to_string()
    }
}

fn run_request_loop(server: &Server, root: &Arc<ServeRoot>, ws_port: u16) -> Result<()> {
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(REQUEST_THREADS)
        .build()?;

    for request in server.incoming_requests() {
        let root = Arc::clone(root);
        pool.spawn(move || {
            if let Err(e) = handle_request(request, &root, ws_port) {
                log!("serve"; "request error: {e}");
            }
        });
    }
    Ok(())
}

/// What a request path maps to
#[derive(Debug)]
enum Route {
    Redirect(String),
    Index,
    Preview(String),
    Asset(PathBuf),
    Reject(PathError),
}

fn route(url: &str, root: &ServeRoot) -> Route {
    let path = url.split(['?', '#']).next().unwrap_or(url);

    if path == "/" {
        return match root.document() {
            Some(document) => Route::Redirect(document_href(document)),
            None => Route::Index,
        };
    }

    if is_markdown(Path::new(path)) {
        return match root.resolve_document(url) {
            Ok(target) => Route::Preview(root.relative(&target)),
            Err(e) => Route::Reject(e),
        };
    }

    match root.resolve_asset(url) {
        Ok(file) => Route::Asset(file),
        Err(e) => Route::Reject(e),
    }
}

/// Handle a single HTTP request
fn handle_request(request: Request, root: &ServeRoot, ws_port: u16) -> Result<()> {
    if is_shutdown() {
        return response::respond_unavailable(request);
    }

    match route(request.url(), root) {
        Route::Redirect(location) => response::respond_redirect(request, &location),
        Route::Index => response::respond_index(request, root),
        Route::Preview(title) => response::respond_preview(request, &title, ws_port),
        Route::Asset(file) => response::respond_file(request, &file),
        Route::Reject(e) => response::respond_path_error(request, &e),
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use tempfile::TempDir;

    use super::*;

    fn make_dir() -> TempDir {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("doc.md"), "# Hello").unwrap();
        fs::write(temp.path().join("logo.png"), [0u8; 4]).unwrap();
        temp
    }

    #[test]
    fn test_route_root_single_file() {
        let temp = make_dir();
        let root = ServeRoot::new(&temp.path().join("doc.md")).unwrap();
        assert!(matches!(route("/", &root), Route::Redirect(l) if l == "/doc.md"));
    }

    #[test]
    fn test_route_root_directory() {
        let temp = make_dir();
        let root = ServeRoot::new(temp.path()).unwrap();
        assert!(matches!(route("/", &root), Route::Index));
        assert!(matches!(route("/?x=1", &root), Route::Index));
    }

    #[test]
    fn test_route_preview_and_asset() {
        let temp = make_dir();
        let root = ServeRoot::new(temp.path()).unwrap();

        assert!(matches!(route("/doc.md", &root), Route::Preview(t) if t == "doc.md"));
        assert!(matches!(route("/logo.png", &root), Route::Asset(p) if p.ends_with("logo.png")));
    }

    #[test]
    fn test_route_rejections() {
        let temp = make_dir();
        let root = ServeRoot::new(temp.path()).unwrap();

        let status = |url: &str| match route(url, &root) {
            Route::Reject(e) => e.status(),
            other => panic!("{url} should be rejected, got {other:?}"),
        };
        assert_eq!(status("/../secret.md"), 403);
        assert_eq!(status("/%2e%2e/secret.png"), 403);
        assert_eq!(status("/missing.md"), 404);
        assert_eq!(status("/missing.png"), 404);
    }

    #[test]
    fn test_display_host() {
        assert_eq!(display_host("localhost"), "localhost");
        assert_eq!(display_host("::1"), "[::1]");
    }
}
