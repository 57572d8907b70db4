/// HTTP surface for the rulebook site.
///
/// Routes (GET only):
/// - any path: a file under the site root, `/` serving `index.html`
/// - `/api/guides/{stack}/{guide}/html`: the guide body rendered to HTML
/// - `/api/guides/{stack}/{guide}/source`: the guide rebuilt from the snapshot, as a download
///
/// Request paths that resolve outside the site root get 403. Missing files,
/// directories and anything that fails to resolve get a 404 page. No response
/// is cacheable, since the snapshot is replaced on every build.
use std::borrow::Cow;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use axum::extract::{Path as RoutePath, State};
use axum::http::header::{CACHE_CONTROL, CONTENT_DISPOSITION, CONTENT_TYPE};
use axum::http::{Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use tracing::{debug, warn};

use rulebook_common::markdown;
use rulebook_common::model::{Guide, Snapshot};

use crate::mime;

const INDEX_FILE: &str = "index.html";
const NO_CACHE: &str = "no-store, no-cache, must-revalidate";
const NOT_FOUND_PAGE: &str = "<!DOCTYPE html>\n<html lang=\"en\">\n<head><meta charset=\"utf-8\"><title>404 Not Found</title></head>\n<body><h1>404 Not Found</h1><p>The requested page does not exist.</p><p><a href=\"/\">Back to the rulebook</a></p></body>\n</html>\n";

#[derive(Debug, Clone)]
pub struct SiteState {
    pub root: PathBuf,
    pub snapshot_path: PathBuf,
}

pub fn router(state: SiteState) -> Router {
    Router::new()
        .route("/api/guides/{stack}/{guide}/html", get(guide_html))
        .route("/api/guides/{stack}/{guide}/source", get(guide_source))
        .fallback(serve_static)
        .with_state(Arc::new(state))
}

/// Where a request path lands relative to the site root.
#[derive(Debug, PartialEq, Eq)]
pub enum Resolved {
    File(PathBuf),
    Forbidden,
    NotFound,
}

/// Resolve `request_path` (URL path, possibly percent-encoded) against `root`.
///
/// `..` segments are applied lexically and any that climb above the root are
/// forbidden. Existing files are also checked after following symlinks.
pub fn resolve(root: &Path, request_path: &str) -> Resolved {
    let decoded = urlencoding::decode(request_path).unwrap_or(Cow::Borrowed(request_path));
    let relative = decoded.trim_start_matches('/');
    let relative = if relative.is_empty() {
        INDEX_FILE
    } else {
        relative
    };

    let mut resolved = PathBuf::new();
    let mut depth = 0usize;
    for component in Path::new(relative).components() {
        match component {
            Component::Normal(part) => {
                resolved.push(part);
                depth += 1;
            }
            Component::CurDir => {}
            Component::ParentDir => {
                if depth == 0 {
                    return Resolved::Forbidden;
                }
                resolved.pop();
                depth -= 1;
            }
            Component::RootDir | Component::Prefix(_) => return Resolved::Forbidden,
        }
    }

    let candidate = root.join(&resolved);
    if !candidate.is_file() {
        return Resolved::NotFound;
    }

    match (root.canonicalize(), candidate.canonicalize()) {
        (Ok(real_root), Ok(real)) if real.starts_with(&real_root) => Resolved::File(candidate),
        (Ok(_), Ok(_)) => Resolved::Forbidden,
        _ => Resolved::NotFound,
    }
}

async fn serve_static(State(state): State<Arc<SiteState>>, method: Method, uri: Uri) -> Response {
    if method != Method::GET {
        return respond(
            StatusCode::METHOD_NOT_ALLOWED,
            "text/plain; charset=utf-8",
            "405 Method Not Allowed",
        );
    }
    serve_file(&state.root, uri.path()).await
}

pub async fn serve_file(root: &Path, request_path: &str) -> Response {
    debug!(path = request_path, "request");
    match resolve(root, request_path) {
        Resolved::File(path) => match tokio::fs::read(&path).await {
            Ok(bytes) => respond(StatusCode::OK, mime::content_type(&path), bytes),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "failed to read file");
                not_found()
            }
        },
        Resolved::Forbidden => {
            warn!(path = request_path, "rejected path outside site root");
            respond(StatusCode::FORBIDDEN, "text/plain; charset=utf-8", "403 Forbidden")
        }
        Resolved::NotFound => not_found(),
    }
}

async fn guide_html(
    State(state): State<Arc<SiteState>>,
    RoutePath((stack, guide)): RoutePath<(String, String)>,
) -> Response {
    match load_guide(&state, &stack, &guide).await {
        Some(guide) => respond(
            StatusCode::OK,
            "text/html; charset=utf-8",
            markdown::render(&guide.content),
        ),
        None => not_found(),
    }
}

async fn guide_source(
    State(state): State<Arc<SiteState>>,
    RoutePath((stack, guide)): RoutePath<(String, String)>,
) -> Response {
    let Some(guide) = load_guide(&state, &stack, &guide).await else {
        return not_found();
    };
    let disposition = format!(
        "attachment; filename=\"{}\"",
        guide.file_name.replace(['"', '\\'], "_")
    );
    (
        StatusCode::OK,
        [
            (CONTENT_TYPE, "text/plain; charset=utf-8".to_string()),
            (CACHE_CONTROL, NO_CACHE.to_string()),
            (CONTENT_DISPOSITION, disposition),
        ],
        guide.source(),
    )
        .into_response()
}

/// Look a guide up in the current snapshot file. The snapshot is read per
/// request since builds replace it wholesale.
async fn load_guide(state: &SiteState, stack: &str, guide: &str) -> Option<Guide> {
    let path = state.snapshot_path.clone();
    let snapshot = match tokio::task::spawn_blocking(move || Snapshot::load(&path)).await {
        Ok(Ok(snapshot)) => snapshot,
        Ok(Err(e)) => {
            warn!(error = %e, "snapshot unavailable");
            return None;
        }
        Err(e) => {
            warn!(error = %e, "snapshot load task failed");
            return None;
        }
    };
    snapshot.guide(stack, guide).cloned()
}

fn respond(status: StatusCode, content_type: &'static str, body: impl IntoResponse) -> Response {
    (
        status,
        [(CONTENT_TYPE, content_type), (CACHE_CONTROL, NO_CACHE)],
        body,
    )
        .into_response()
}

fn not_found() -> Response {
    respond(StatusCode::NOT_FOUND, "text/html; charset=utf-8", NOT_FOUND_PAGE)
}
