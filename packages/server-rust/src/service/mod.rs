//! The breakfast request pipeline.
//!
//! 1. **Stages** (`preprocess`, `repository`, `postprocess`): base
//!    implementations of the three extension points
//! 2. **Handler** (`api`): route resolution and the route handlers
//! 3. **Decorators** (`middleware`): logging, metrics, tracing, and access
//!    logging as tower layers, composed in `middleware::pipeline`

pub mod api;
pub mod config;
pub mod html;
pub mod labels;
pub mod middleware;
pub mod postprocess;
pub mod preprocess;
pub mod repository;
pub mod request;
pub mod writer;

pub use api::Api;
pub use config::ServiceConfig;
pub use middleware::build_api;
pub use repository::{JsonRepository, LoadError};
pub use request::ApiRequest;
pub use writer::{BufferedResponse, InterceptingWriter};
