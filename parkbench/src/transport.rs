//! Transport clients used by the workers.
//!
//! A [`Connector`] is shared by every worker and builds one [`Transport`] per worker; a
//! `Transport` is never shared. `query` returns `Ok` for every request which reached the
//! service (successfully or not) and `Err` only for fatal, connection-level problems.
use parkbench_core::Outcome;
use std::future::Future;
use thiserror::Error;

mod http;
mod proto;
mod rpc;

pub use http::{HttpConnector, HttpTransport};
pub use proto::{LookupRequest, LookupResponse};
pub use rpc::{RpcConnector, RpcTransport};

#[trait_variant::make(Transport: Send)]
pub trait LocalTransport {
    /// Issue a lookup for `key`. Timing is done by the caller.
    async fn query(&mut self, key: &str) -> Result<Outcome, TransportError>;
}

pub trait Connector: Send + Sync + 'static {
    type Transport: Transport + Send + 'static;

    /// Establish the transport a single worker uses for its whole batch.
    fn connect(
        &self,
        worker: usize,
    ) -> impl Future<Output = Result<Self::Transport, TransportError>> + Send;
}

/// Fatal transport failure. Aborts the run.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("Invalid endpoint `{0}`")]
    InvalidEndpoint(String),

    #[error("Bearer token is not a valid header value")]
    InvalidToken,

    #[error("Unable to connect to {address}: {reason}")]
    Connect { address: String, reason: String },

    #[error("HTTP transport failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("gRPC transport failed: {0}")]
    Rpc(#[from] tonic::transport::Error),

    #[error("gRPC service unavailable: {0}")]
    Unavailable(Box<tonic::Status>),
}

/// Prefix `address` with `scheme` unless it already names one.
pub(crate) fn with_scheme(address: &str, scheme: &str) -> String {
    if address.starts_with("http://") || address.starts_with("https://") {
        address.trim_end_matches('/').to_string()
    } else {
        format!("{scheme}://{}", address.trim_end_matches('/'))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scheme_is_added_once() {
        assert_eq!(
            with_scheme("localhost:8250", "http"),
            "http://localhost:8250"
        );
        assert_eq!(
            with_scheme("https://parker.example.com/", "http"),
            "https://parker.example.com"
        );
        assert_eq!(
            with_scheme("http://127.0.0.1:9000/v1", "https"),
            "http://127.0.0.1:9000/v1"
        );
    }
}
