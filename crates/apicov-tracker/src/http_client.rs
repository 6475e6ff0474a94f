use apicov_core::{HttpCollaborator, HttpRequest, HttpResponse, TrackingConfig, TransportError};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::time::Duration;

/// [`HttpCollaborator`] backed by `reqwest`.
#[derive(Debug, Clone)]
pub struct ReqwestCollaborator {
    client: reqwest::Client,
    error_on_status: bool,
}

impl Default for ReqwestCollaborator {
    fn default() -> Self {
        Self::new(reqwest::Client::new())
    }
}

impl ReqwestCollaborator {
    pub fn new(client: reqwest::Client) -> Self {
        Self {
            client,
            error_on_status: true,
        }
    }

    pub fn from_config(config: &TrackingConfig) -> Result<Self, reqwest::Error> {
        let mut builder = reqwest::Client::builder();
        if config.request_timeout_ms > 0 {
            builder = builder.timeout(Duration::from_millis(config.request_timeout_ms));
        }
        Ok(Self::new(builder.build()?).error_on_status(config.error_on_status))
    }

    /// When set (the default), non-2xx responses come back as
    /// [`TransportError::Status`].
    pub fn error_on_status(mut self, enabled: bool) -> Self {
        self.error_on_status = enabled;
        self
    }

    fn failed(request: &HttpRequest, message: impl ToString) -> TransportError {
        TransportError::Failed {
            method: request.method.clone(),
            url: request.url.clone(),
            message: message.to_string(),
        }
    }
}

#[async_trait]
impl HttpCollaborator for ReqwestCollaborator {
    async fn perform(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError> {
        let method = reqwest::Method::from_bytes(request.method.as_bytes())
            .map_err(|e| Self::failed(request, e))?;

        let mut builder = self.client.request(method, &request.url);
        if !request.options.query.is_empty() {
            builder = builder.query(&request.options.query);
        }
        for (name, value) in &request.options.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = &request.options.body {
            builder = builder.json(body);
        }

        let response = builder.send().await.map_err(|e| {
            if e.is_timeout() {
                TransportError::Timeout {
                    method: request.method.clone(),
                    url: request.url.clone(),
                    elapsed_ms: 0,
                }
            } else {
                Self::failed(request, e)
            }
        })?;

        let status = response.status();
        let headers: BTreeMap<String, String> = response
            .headers()
            .iter()
            .filter_map(|(k, v)| v.to_str().ok().map(|v| (k.to_string(), v.to_string())))
            .collect();
        let body = response
            .bytes()
            .await
            .map_err(|e| Self::failed(request, e))?;

        if self.error_on_status && !status.is_success() {
            return Err(TransportError::Status {
                method: request.method.clone(),
                url: request.url.clone(),
                status: status.as_u16(),
                body: Some(String::from_utf8_lossy(&body).into_owned()),
            });
        }

        Ok(HttpResponse {
            status: status.as_u16(),
            headers,
            body,
        })
    }
}
