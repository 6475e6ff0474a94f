//! Scripted collaborator for tests that exercise the interceptor without a
//! network.

use apicov_core::{url_path, HttpCollaborator, HttpRequest, HttpResponse, TransportError};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

#[derive(Debug, Clone)]
pub enum MockReply {
    /// Statuses >= 400 are returned as [`TransportError::Status`].
    Status(u16),
    Fail(String),
    /// Never completes.
    Hang,
}

/// Replies by `(METHOD, path)`; unknown routes answer with the default status.
#[derive(Debug)]
pub struct MockCollaborator {
    routes: Mutex<HashMap<(String, String), MockReply>>,
    default_status: u16,
    delay: Option<Duration>,
    calls: AtomicUsize,
}

impl Default for MockCollaborator {
    fn default() -> Self {
        Self::new()
    }
}

impl MockCollaborator {
    pub fn new() -> Self {
        Self {
            routes: Mutex::new(HashMap::new()),
            default_status: 200,
            delay: None,
            calls: AtomicUsize::new(0),
        }
    }

    fn with_reply(self, method: &str, path: &str, reply: MockReply) -> Self {
        self.routes
            .lock()
            .insert((method.to_ascii_uppercase(), path.to_string()), reply);
        self
    }

    pub fn route(self, method: &str, path: &str, status: u16) -> Self {
        self.with_reply(method, path, MockReply::Status(status))
    }

    pub fn failing(self, method: &str, path: &str, message: &str) -> Self {
        self.with_reply(method, path, MockReply::Fail(message.to_string()))
    }

    pub fn hanging(self, method: &str, path: &str) -> Self {
        self.with_reply(method, path, MockReply::Hang)
    }

    pub fn default_status(mut self, status: u16) -> Self {
        self.default_status = status;
        self
    }

    /// Sleep this long before every reply.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl HttpCollaborator for MockCollaborator {
    async fn perform(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let reply = self
            .routes
            .lock()
            .get(&(request.method.clone(), url_path(&request.url)))
            .cloned()
            .unwrap_or(MockReply::Status(self.default_status));

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        match reply {
            MockReply::Status(status) if status >= 400 => Err(TransportError::Status {
                method: request.method.clone(),
                url: request.url.clone(),
                status,
                body: None,
            }),
            MockReply::Status(status) => Ok(HttpResponse::new(status)),
            MockReply::Fail(message) => Err(TransportError::Failed {
                method: request.method.clone(),
                url: request.url.clone(),
                message,
            }),
            MockReply::Hang => std::future::pending().await,
        }
    }
}
