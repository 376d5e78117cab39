use crate::domain_model::*;
use crate::domain_port::*;
use std::time::Duration;

/// HTTP transport to the real backend. The timeout covers the whole exchange
/// and applies to refresh calls exactly as to any other request.
pub struct ReqwestTransport {
    http: reqwest::Client,
    base_url: String,
}

impl ReqwestTransport {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, TransportError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(map_reqwest_error)?;
        Ok(Self {
            http,
            base_url: base_url.into(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// `base_url` and `path` joined by exactly one slash.
    pub fn url_for(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }
}

fn to_reqwest_method(method: Method) -> reqwest::Method {
    match method {
        Method::Get => reqwest::Method::GET,
        Method::Post => reqwest::Method::POST,
        Method::Put => reqwest::Method::PUT,
        Method::Patch => reqwest::Method::PATCH,
        Method::Delete => reqwest::Method::DELETE,
    }
}

fn map_reqwest_error(e: reqwest::Error) -> TransportError {
    if e.is_timeout() {
        TransportError::Timeout(e.to_string())
    } else if e.is_connect() {
        TransportError::Connect(e.to_string())
    } else if e.is_builder() {
        TransportError::InvalidRequest(e.to_string())
    } else {
        TransportError::Network(e.to_string())
    }
}

#[async_trait::async_trait]
impl BackendTransport for ReqwestTransport {
    async fn dispatch(&self, request: PreparedRequest) -> Result<ApiResponse, TransportError> {
        let url = self.url_for(&request.path);
        let mut builder = self.http.request(to_reqwest_method(request.method), url);
        for (name, value) in request.headers.iter() {
            builder = builder.header(name, value);
        }
        if request.body != Body::Empty {
            let bytes = request
                .body
                .to_bytes()
                .map_err(|e| TransportError::InvalidRequest(e.to_string()))?;
            builder = builder.body(bytes);
        }

        let res = builder.send().await.map_err(map_reqwest_error)?;
        let status = res.status().as_u16();
        let headers: Headers = res
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|value| (name.as_str().to_string(), value.to_string()))
            })
            .collect();
        let body = res.bytes().await.map_err(map_reqwest_error)?.to_vec();

        Ok(ApiResponse::new(status, headers, body))
    }
}
