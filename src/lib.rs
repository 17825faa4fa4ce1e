pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod services;
pub mod session;
pub mod storage;
pub mod store;

#[cfg(feature = "grpc")]
pub mod grpc;
#[cfg(feature = "grpc")]
pub mod middleware;
#[cfg(feature = "grpc")]
pub mod proto;

pub use config::Config;
pub use error::{AppError, AppResult};
