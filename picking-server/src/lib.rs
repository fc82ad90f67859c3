//! HTTP backup server for the picking snapshot.
//!
//! Build a [`Config`] (usually [`Config::from_env`]) and pass it to
//! [`start_blocking`], or to [`run`] from inside an existing runtime.

pub mod auth;
pub mod config;
mod error;
pub mod http;
mod runtime;
mod writer;

pub use config::{AllowedOrigins, AuthMode, Config, ConfigError};
pub use error::ServerError;
pub use http::{app, router, AppState, ApiError};
pub use runtime::{init_tracing, open_service, run, start_blocking};
pub use writer::WriterHandle;
