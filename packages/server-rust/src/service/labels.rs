//! Bounded metric label values.
//!
//! Operation labels for the HTTP extension point are derived from the request
//! path through [`api_operation`], which maps every path onto a fixed set, so
//! ids, file names and unknown paths never reach the label set.

use axum::http::StatusCode;

/// Component label values.
pub mod component {
    pub const API: &str = "API";
    pub const PREPROCESSOR: &str = "preprocessor";
    pub const DB: &str = "DB";
    pub const POSTPROCESSOR: &str = "postprocessor";
}

/// Operation label values for the stage extension points.
pub mod operation {
    pub const PREPROCESS: &str = "preprocess";
    pub const GET_BREAKFAST: &str = "getBreakfast";
    pub const GET_RANDOM_BREAKFAST: &str = "getRandomBreakfast";
    pub const POSTPROCESS: &str = "postprocess";
}

/// Operation label values for the HTTP extension point.
pub mod route {
    pub const ROOT: &str = "/";
    pub const BREAKFASTS: &str = "/breakfasts";
    pub const ADMIN: &str = "/admin";
    pub const IMAGES: &str = "/images";
    /// Any first segment outside the served routes.
    pub const OTHER: &str = "/other";
}

/// Maps a request path to `/` plus its first non-empty segment when that
/// segment names a served route, and to [`route::OTHER`] otherwise.
///
/// `""` and `"/"` map to `"/"`, as does a path made only of slashes.
#[must_use]
pub fn api_operation(path: &str) -> &'static str {
    match path.split('/').find(|segment| !segment.is_empty()) {
        None => route::ROOT,
        Some("breakfasts") => route::BREAKFASTS,
        Some("admin") => route::ADMIN,
        Some("images") => route::IMAGES,
        Some(_) => route::OTHER,
    }
}

/// The HTTP extension point counts only `200 OK` as success.
#[must_use]
pub fn api_success(status: StatusCode) -> bool {
    status == StatusCode::OK
}
