//! The base request handler: route resolution and the four route handlers.
//!
//! Stage calls go through whatever preprocessor, repository, and
//! postprocessor the handler was built with; decoration happens outside.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::header::{CACHE_CONTROL, CONTENT_LENGTH, CONTENT_TYPE, LOCATION};
use axum::http::{HeaderValue, Method, Request, StatusCode};
use breakfast_core::{
    Breakfast, Postprocessor, Preprocessor, Repository, RepositoryError, RequestState,
};
use tower::ServiceExt;
use tower_http::services::ServeDir;

use crate::service::html;
use crate::service::request::ApiRequest;
use crate::service::writer::write_error;
use crate::traits::{ApiHandler, ResponseWriter};

/// Largest image file copied into a response by default.
pub const DEFAULT_MAX_IMAGE_BYTES: usize = 8 * 1024 * 1024;

const IMAGES_PREFIX: &str = "/images";
const BREAKFASTS_PREFIX: &str = "/breakfasts/";

#[derive(Debug, Clone, PartialEq, Eq)]
enum Route {
    Root,
    Breakfast(u64),
    Admin,
    Images,
    /// Trailing-slash variant of a known route; holds the canonical path.
    Redirect(String),
    NotFound,
}

impl Route {
    fn resolve(path: &str) -> Self {
        match path {
            "/" => return Self::Root,
            "/admin" => return Self::Admin,
            "/admin/" => return Self::Redirect("/admin".to_string()),
            _ => {}
        }
        if path == IMAGES_PREFIX
            || path
                .strip_prefix(IMAGES_PREFIX)
                .is_some_and(|rest| rest.starts_with('/'))
        {
            return Self::Images;
        }
        if let Some(rest) = path.strip_prefix(BREAKFASTS_PREFIX) {
            let (digits, slash) = match rest.strip_suffix('/') {
                Some(digits) => (digits, true),
                None => (rest, false),
            };
            if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
                return Self::NotFound;
            }
            return match (digits.parse::<u64>(), slash) {
                (Ok(_), true) => Self::Redirect(format!("{BREAKFASTS_PREFIX}{digits}")),
                (Ok(id), false) => Self::Breakfast(id),
                // Digit strings past u64::MAX name no record.
                (Err(_), _) => Self::NotFound,
            };
        }
        Self::NotFound
    }
}

/// Routes requests to the root, get-by-id, admin, and image handlers.
pub struct Api {
    pre: Arc<dyn Preprocessor>,
    repo: Arc<dyn Repository>,
    post: Arc<dyn Postprocessor>,
    images: ServeDir,
    max_image_bytes: usize,
}

impl Api {
    pub fn new(
        pre: Arc<dyn Preprocessor>,
        repo: Arc<dyn Repository>,
        post: Arc<dyn Postprocessor>,
        image_dir: impl AsRef<Path>,
    ) -> Self {
        Self {
            pre,
            repo,
            post,
            images: ServeDir::new(image_dir.as_ref()),
            max_image_bytes: DEFAULT_MAX_IMAGE_BYTES,
        }
    }

    /// Image files larger than `limit` bytes are answered with a 500.
    #[must_use]
    pub fn with_max_image_bytes(mut self, limit: usize) -> Self {
        self.max_image_bytes = limit;
        self
    }

    async fn root(
        &self,
        state: &mut RequestState,
        request: &ApiRequest,
        writer: &mut dyn ResponseWriter,
    ) {
        let username = request.username();
        self.pre.preprocess(state, request.region()).await;
        let result = self.repo.get_random(state, username).await;
        self.post.postprocess(state, username, result.is_ok()).await;

        match result {
            Ok(breakfast) => {
                writer
                    .headers_mut()
                    .insert(CACHE_CONTROL, HeaderValue::from_static("private"));
                write_page(writer, &breakfast);
            }
            Err(e) => write_repository_error(writer, StatusCode::SERVICE_UNAVAILABLE, &e),
        }
    }

    async fn breakfast(
        &self,
        state: &mut RequestState,
        request: &ApiRequest,
        writer: &mut dyn ResponseWriter,
        id: u64,
    ) {
        let username = request.username();
        self.pre.preprocess(state, request.region()).await;
        let result = self.repo.get_by_id(state, username, id).await;
        self.post.postprocess(state, username, result.is_ok()).await;

        match result {
            Ok(breakfast) => write_page(writer, &breakfast),
            Err(e) => write_repository_error(writer, StatusCode::NOT_FOUND, &e),
        }
    }

    async fn images(&self, request: &ApiRequest, writer: &mut dyn ResponseWriter) {
        let rest = request
            .path()
            .strip_prefix(IMAGES_PREFIX)
            .unwrap_or_default();
        let path = if rest.is_empty() { "/" } else { rest };
        let uri = match request.uri().query() {
            Some(q) => format!("{path}?{q}"),
            None => path.to_string(),
        };

        let mut forwarded = match Request::builder()
            .method(Method::GET)
            .uri(uri)
            .body(Body::empty())
        {
            Ok(req) => req,
            Err(e) => {
                write_error(writer, StatusCode::BAD_REQUEST, &e.to_string());
                return;
            }
        };
        *forwarded.headers_mut() = request.headers().clone();

        let response = match self.images.clone().oneshot(forwarded).await {
            Ok(response) => response,
            Err(never) => match never {},
        };
        let (parts, body) = response.into_parts();
        let declared = parts
            .headers
            .get(CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<u64>().ok());
        let limit = u64::try_from(self.max_image_bytes).unwrap_or(u64::MAX);
        if declared.is_some_and(|len| len > limit) {
            tracing::warn!(path = request.path(), size = declared, "image too large");
            write_error(writer, StatusCode::INTERNAL_SERVER_ERROR, "image too large");
            return;
        }
        let bytes = match axum::body::to_bytes(Body::new(body), self.max_image_bytes).await {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::warn!(error = %e, path = request.path(), "failed to read image");
                write_error(writer, StatusCode::INTERNAL_SERVER_ERROR, "failed to read image");
                return;
            }
        };

        writer.headers_mut().extend(parts.headers);
        writer.write_header(parts.status);
        if !bytes.is_empty() {
            writer.write(&bytes);
        }
    }
}

fn admin(request: &ApiRequest, writer: &mut dyn ResponseWriter) {
    let status = request
        .query("code")
        .and_then(|code| code.parse::<u16>().ok())
        .filter(|code| *code != 0)
        .and_then(|code| StatusCode::from_u16(code).ok())
        .unwrap_or(StatusCode::UNAUTHORIZED);
    write_error(writer, status, &format!("admin returning {}", status.as_u16()));
}

fn redirect(request: &ApiRequest, writer: &mut dyn ResponseWriter, path: &str) {
    let location = match request.uri().query() {
        Some(q) => format!("{path}?{q}"),
        None => path.to_string(),
    };
    match HeaderValue::try_from(location) {
        Ok(location) => {
            writer.headers_mut().insert(LOCATION, location);
            writer.write_header(StatusCode::MOVED_PERMANENTLY);
        }
        Err(_) => write_error(writer, StatusCode::BAD_REQUEST, "invalid redirect target"),
    }
}

fn write_page(writer: &mut dyn ResponseWriter, breakfast: &Breakfast) {
    writer.headers_mut().insert(
        CONTENT_TYPE,
        HeaderValue::from_static("text/html; charset=utf-8"),
    );
    writer.write(html::render(breakfast).as_bytes());
}

fn write_repository_error(
    writer: &mut dyn ResponseWriter,
    status: StatusCode,
    err: &RepositoryError,
) {
    write_error(writer, status, &err.to_string());
}

#[async_trait]
impl ApiHandler for Api {
    async fn serve(
        &self,
        state: &mut RequestState,
        request: &ApiRequest,
        writer: &mut dyn ResponseWriter,
    ) {
        let route = Route::resolve(request.path());
        if !matches!(route, Route::NotFound) && *request.method() != Method::GET {
            write_error(writer, StatusCode::METHOD_NOT_ALLOWED, "405 method not allowed");
            return;
        }
        match route {
            Route::Root => self.root(state, request, writer).await,
            Route::Breakfast(id) => self.breakfast(state, request, writer, id).await,
            Route::Admin => admin(request, writer),
            Route::Images => self.images(request, writer).await,
            Route::Redirect(path) => redirect(request, writer, &path),
            Route::NotFound => write_error(writer, StatusCode::NOT_FOUND, "404 page not found"),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
