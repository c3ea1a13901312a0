//! Static file serving.
//!
//! GET/HEAD requests are resolved under the configured root. A hit is served
//! directly; a miss falls through to the next stage; any other I/O error is a
//! failure that is logged server-side and reported generically.
//!
//! `ServeDir` answers 404 for unreadable files too, so every 404 is checked
//! against the filesystem before it is treated as a miss.

use std::io;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use axum::{
    body::Body,
    extract::Request,
    http::{Method, StatusCode},
};
use tower_http::services::ServeDir;

use crate::http::error::ApiError;
use crate::http::request::RequestContext;
use crate::pipeline::{Flow, Stage};

#[derive(Debug, Clone)]
pub struct StaticFiles {
    root: PathBuf,
    serve: ServeDir,
}

impl StaticFiles {
    pub fn new(root: impl AsRef<Path>) -> Self {
        let root = root.as_ref().to_path_buf();
        Self {
            serve: ServeDir::new(&root),
            root,
        }
    }

    /// Bodyless copy of the request for the file lookup.
    fn lookup_request(request: &Request) -> Request {
        let mut lookup = Request::new(Body::empty());
        *lookup.method_mut() = request.method().clone();
        *lookup.uri_mut() = request.uri().clone();
        *lookup.version_mut() = request.version();
        *lookup.headers_mut() = request.headers().clone();
        lookup
    }

    /// Filesystem path for a request path, if it stays under the root.
    ///
    /// Percent-encoded paths are left to `ServeDir` alone.
    fn candidate(&self, path: &str) -> Option<PathBuf> {
        if path.contains('%') {
            return None;
        }
        let mut candidate = self.root.clone();
        for segment in path.split('/').filter(|s| !s.is_empty()) {
            if segment == "." || segment == ".." || segment.contains('\\') {
                return None;
            }
            candidate.push(segment);
        }
        Some(candidate)
    }

    /// The I/O error hidden behind a 404, if the path is not simply absent.
    async fn hidden_error(&self, path: &str) -> Option<io::Error> {
        let candidate = self.candidate(path)?;
        match tokio::fs::metadata(&candidate).await {
            Ok(meta) if meta.is_file() => tokio::fs::File::open(&candidate).await.err(),
            Ok(_) => None,
            Err(e) if e.kind() == io::ErrorKind::NotFound => None,
            Err(e) => Some(e),
        }
    }

    fn fail(ctx: &RequestContext, source: io::Error) -> Flow {
        tracing::error!(
            request_id = %ctx.request_id,
            path = ctx.path(),
            error = %source,
            "Static file error"
        );
        Flow::Fail(ApiError::StaticFile {
            path: ctx.path().to_owned(),
            source,
        })
    }
}

#[async_trait]
impl Stage for StaticFiles {
    fn name(&self) -> &'static str {
        "static_files"
    }

    async fn handle(&self, request: Request, ctx: &mut RequestContext) -> Flow {
        if !matches!(*request.method(), Method::GET | Method::HEAD) {
            return Flow::Continue(request);
        }

        match self.serve.clone().try_call(Self::lookup_request(&request)).await {
            Ok(response) if response.status() == StatusCode::NOT_FOUND => {
                match self.hidden_error(request.uri().path()).await {
                    Some(source) => Self::fail(ctx, source),
                    None => Flow::Continue(request),
                }
            }
            Ok(response) => Flow::Respond(response.map(Body::new)),
            Err(source) => Self::fail(ctx, source),
        }
    }
}
