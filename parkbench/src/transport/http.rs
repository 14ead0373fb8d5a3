use super::{with_scheme, Connector, Transport, TransportError};
use parkbench_core::{Outcome, RequestFailure, Target, HTTP_MAX_IDLE_PER_HOST};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use reqwest::{Client, Url};
use std::sync::Arc;
#[allow(unused)]
use tracing::{debug, error, info, trace, warn};

/// Builds one HTTP client per worker. Lookups are `GET {address}/find/{account}/{table}/{id}`.
#[derive(Debug, Clone)]
pub struct HttpConnector {
    target: Arc<Target>,
    base: Url,
}

impl HttpConnector {
    pub fn new(target: Target) -> Result<Self, TransportError> {
        let address = with_scheme(&target.address, "http");
        let base =
            Url::parse(&address).map_err(|_| TransportError::InvalidEndpoint(address.clone()))?;
        if base.cannot_be_a_base() {
            return Err(TransportError::InvalidEndpoint(address));
        }

        Ok(Self {
            target: Arc::new(target),
            base,
        })
    }
}

impl Connector for HttpConnector {
    type Transport = HttpTransport;

    async fn connect(&self, worker: usize) -> Result<HttpTransport, TransportError> {
        let mut headers = HeaderMap::new();
        if let Some(bearer) = self.target.bearer() {
            let value = HeaderValue::from_str(&bearer).map_err(|_| TransportError::InvalidToken)?;
            headers.insert(AUTHORIZATION, value);
        }

        let mut builder = Client::builder()
            .pool_max_idle_per_host(HTTP_MAX_IDLE_PER_HOST)
            .default_headers(headers);
        if let Some(timeout) = self.target.timeout {
            builder = builder.timeout(timeout);
        }

        trace!(worker, "HTTP client ready for {}", self.base);
        Ok(HttpTransport {
            client: builder.build()?,
            base: self.base.clone(),
            target: self.target.clone(),
        })
    }
}

#[derive(Debug)]
pub struct HttpTransport {
    client: Client,
    base: Url,
    target: Arc<Target>,
}

impl HttpTransport {
    fn lookup_url(&self, key: &str) -> Result<Url, TransportError> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|_| TransportError::InvalidEndpoint(self.base.to_string()))?
            .pop_if_empty()
            .extend([
                "find",
                self.target.account.as_str(),
                self.target.table.as_str(),
                key,
            ]);
        Ok(url)
    }
}

impl Transport for HttpTransport {
    async fn query(&mut self, key: &str) -> Result<Outcome, TransportError> {
        let url = self.lookup_url(key)?;

        let response = match self.client.get(url).send().await {
            Ok(response) => response,
            Err(err) if err.is_timeout() => return Ok(Outcome::Failure(RequestFailure::Timeout)),
            Err(err) => return Err(err.into()),
        };

        let status = response.status();
        // NOTE: The body is drained so the connection goes back to the pool.
        if let Err(err) = response.bytes().await {
            let failure = if err.is_timeout() {
                RequestFailure::Timeout
            } else {
                RequestFailure::Response(err.to_string())
            };
            return Ok(Outcome::Failure(failure));
        }

        if status.is_success() {
            Ok(Outcome::Success)
        } else {
            Ok(Outcome::Failure(RequestFailure::Status(status.as_u16())))
        }
    }
}
