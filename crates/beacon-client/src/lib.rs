//! 看板后端的 HTTP 实现

pub mod auth;
pub mod endpoints;
pub mod http;
pub mod registration;

pub use auth::TokenResponse;
pub use endpoints::BackendOptions;
pub use http::HttpBackend;
pub use registration::{validate_device_name, MIN_DEVICE_NAME_LEN};
