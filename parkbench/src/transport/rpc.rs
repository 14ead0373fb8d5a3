use super::proto::{LookupRequest, LookupResponse, LOOKUP_PATH};
use super::{with_scheme, Connector, Transport, TransportError};
use parkbench_core::{Outcome, RequestFailure, Target};
use std::error::Error;
use std::sync::Arc;
use tonic::client::Grpc;
use tonic::codec::ProstCodec;
use tonic::codegen::http::uri::PathAndQuery;
use tonic::metadata::AsciiMetadataValue;
use tonic::transport::{Channel, ClientTlsConfig, Endpoint};
use tonic::{Code, Request, Status};
#[allow(unused)]
use tracing::{debug, error, info, trace, warn};

/// Opens one gRPC channel per worker.
///
/// Addresses without a scheme are dialed over TLS; an explicit `http://` address uses a
/// plaintext channel.
#[derive(Debug, Clone)]
pub struct RpcConnector {
    target: Arc<Target>,
    endpoint: Endpoint,
    authorization: Option<AsciiMetadataValue>,
}

impl RpcConnector {
    pub fn new(target: Target) -> Result<Self, TransportError> {
        let address = with_scheme(&target.address, "https");
        let mut endpoint = Endpoint::from_shared(address.clone())
            .map_err(|_| TransportError::InvalidEndpoint(address.clone()))?;

        if address.starts_with("https://") {
            endpoint = endpoint.tls_config(ClientTlsConfig::new().with_webpki_roots())?;
        }
        if let Some(timeout) = target.timeout {
            endpoint = endpoint.timeout(timeout).connect_timeout(timeout);
        }

        let authorization = target
            .bearer()
            .map(|bearer| bearer.parse::<AsciiMetadataValue>())
            .transpose()
            .map_err(|_| TransportError::InvalidToken)?;

        Ok(Self {
            target: Arc::new(target),
            endpoint,
            authorization,
        })
    }
}

impl Connector for RpcConnector {
    type Transport = RpcTransport;

    async fn connect(&self, worker: usize) -> Result<RpcTransport, TransportError> {
        let channel = self
            .endpoint
            .connect()
            .await
            .map_err(|err| TransportError::Connect {
                address: self.endpoint.uri().to_string(),
                reason: error_chain(&err),
            })?;
        debug!(worker, "Connected to {}", self.endpoint.uri());

        Ok(RpcTransport {
            client: Grpc::new(channel),
            target: self.target.clone(),
            authorization: self.authorization.clone(),
        })
    }
}

#[derive(Debug)]
pub struct RpcTransport {
    client: Grpc<Channel>,
    target: Arc<Target>,
    authorization: Option<AsciiMetadataValue>,
}

impl Transport for RpcTransport {
    async fn query(&mut self, key: &str) -> Result<Outcome, TransportError> {
        let mut request = Request::new(LookupRequest::string_key(
            &self.target.account,
            &self.target.table,
            key,
        ));
        if let Some(authorization) = &self.authorization {
            request
                .metadata_mut()
                .insert("authorization", authorization.clone());
        }

        self.client.ready().await?;
        let codec: ProstCodec<LookupRequest, LookupResponse> = ProstCodec::default();
        match self
            .client
            .unary(request, PathAndQuery::from_static(LOOKUP_PATH), codec)
            .await
        {
            Ok(_) => Ok(Outcome::Success),
            Err(status) => classify(status),
        }
    }
}

fn classify(status: Status) -> Result<Outcome, TransportError> {
    match status.code() {
        Code::Unavailable => Err(TransportError::Unavailable(Box::new(status))),
        Code::DeadlineExceeded | Code::Cancelled => Ok(Outcome::Failure(RequestFailure::Timeout)),
        code => Ok(Outcome::Failure(RequestFailure::Rpc {
            code: code as i32,
            message: status.message().to_string(),
        })),
    }
}

fn error_chain(err: &dyn Error) -> String {
    let mut out = err.to_string();
    let mut source = err.source();
    while let Some(inner) = source {
        out.push_str(": ");
        out.push_str(&inner.to_string());
        source = inner.source();
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn target(address: &str) -> Target {
        Target {
            address: address.to_string(),
            account: "acct".to_string(),
            table: "users".to_string(),
            token: Some("secret".to_string()),
            timeout: Some(Duration::from_secs(1)),
        }
    }

    #[test]
    fn status_classification() {
        assert_eq!(
            classify(Status::not_found("no row")).unwrap(),
            Outcome::Failure(RequestFailure::Rpc {
                code: Code::NotFound as i32,
                message: "no row".to_string(),
            })
        );
        assert_eq!(
            classify(Status::deadline_exceeded("slow")).unwrap(),
            Outcome::Failure(RequestFailure::Timeout)
        );
        assert!(matches!(
            classify(Status::unavailable("connection reset")),
            Err(TransportError::Unavailable(_))
        ));
    }

    #[test]
    fn bare_addresses_use_tls() {
        let connector = RpcConnector::new(target("parker.example.com:443")).unwrap();
        assert_eq!(connector.endpoint.uri().scheme_str(), Some("https"));
        assert_eq!(
            connector.authorization.as_ref().map(|v| v.to_str().unwrap()),
            Some("Bearer secret")
        );
    }

    #[test]
    fn invalid_token_is_rejected() {
        let mut target = target("http://127.0.0.1:9000");
        target.token = Some("line\nbreak".to_string());
        assert!(matches!(
            RpcConnector::new(target),
            Err(TransportError::InvalidToken)
        ));
    }

    #[tokio::test]
    async fn refused_connection_is_fatal() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let connector = RpcConnector::new(target(&format!("http://{addr}"))).unwrap();
        assert!(matches!(
            connector.connect(0).await,
            Err(TransportError::Connect { .. })
        ));
    }
}
