//! Forge HTTP access: the raw transport and the typed endpoint layer.

pub mod api;
pub mod transport;

pub use api::ForgeApi;
pub use transport::{ApiRequest, ApiResponse, HttpTransport, Transport};
