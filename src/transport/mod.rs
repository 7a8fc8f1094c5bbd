pub mod http;
pub mod provider;
pub mod types;

pub use http::HttpTransport;
pub use provider::{Transport, TransportError, TransportRequest};
pub use types::StreamEvent;
