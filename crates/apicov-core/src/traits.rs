use crate::{HttpRequest, HttpResponse, Observation, Result, Scope, TransportError};
use async_trait::async_trait;

/// Performs real HTTP calls on behalf of the interceptor.
#[async_trait]
pub trait HttpCollaborator: Send + Sync {
    async fn perform(
        &self,
        request: &HttpRequest,
    ) -> std::result::Result<HttpResponse, TransportError>;
}

/// Produces a raw specification document.
#[async_trait]
pub trait SpecSource: Send + Sync {
    async fn load(&self) -> Result<serde_json::Value>;

    /// Human-readable location used in logs and error messages.
    fn describe(&self) -> String;
}

/// Read access to recorded observations, by scope.
pub trait ObservationSource: Send + Sync {
    fn snapshot(&self, scope: Scope) -> Vec<Observation>;
}
