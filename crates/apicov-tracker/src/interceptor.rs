use apicov_core::{
    HttpCollaborator, HttpRequest, HttpResponse, Observation, ObservationSource, RequestOptions,
    Scope, TrackingConfig, TransportError,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

use crate::metrics;
use crate::store::{ObservationLog, ObservationStore};

/// Wraps an HTTP collaborator and records an [`Observation`] for every call
/// it makes, whether the call succeeds, fails, times out or is dropped.
pub struct CallInterceptor {
    collaborator: Arc<dyn HttpCollaborator>,
    store: ObservationStore,
    shared_tracking: AtomicBool,
    timeout: Option<Duration>,
    record_headers: bool,
}

impl CallInterceptor {
    /// Interceptor with shared tracking enabled, writing to the process-wide log.
    pub fn new(collaborator: Arc<dyn HttpCollaborator>) -> Self {
        Self::with_shared_tracking(collaborator, true)
    }

    pub fn with_shared_tracking(collaborator: Arc<dyn HttpCollaborator>, enabled: bool) -> Self {
        Self {
            collaborator,
            store: ObservationStore::new(),
            shared_tracking: AtomicBool::new(enabled),
            timeout: None,
            record_headers: true,
        }
    }

    pub fn from_config(collaborator: Arc<dyn HttpCollaborator>, config: &TrackingConfig) -> Self {
        Self::with_shared_tracking(collaborator, config.shared_tracking)
            .with_timeout((config.request_timeout_ms > 0).then(|| {
                Duration::from_millis(config.request_timeout_ms)
            }))
            .with_record_headers(config.record_headers)
    }

    /// Point the shared scope at `shared` instead of the process-wide log.
    pub fn with_shared_store(mut self, shared: Arc<ObservationLog>) -> Self {
        self.store = ObservationStore::with_shared(shared);
        self
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_record_headers(mut self, record: bool) -> Self {
        self.record_headers = record;
        self
    }

    pub async fn get(
        &self,
        url: &str,
        options: RequestOptions,
    ) -> Result<HttpResponse, TransportError> {
        self.fetch("GET", url, options).await
    }

    pub async fn post(
        &self,
        url: &str,
        options: RequestOptions,
    ) -> Result<HttpResponse, TransportError> {
        self.fetch("POST", url, options).await
    }

    pub async fn put(
        &self,
        url: &str,
        options: RequestOptions,
    ) -> Result<HttpResponse, TransportError> {
        self.fetch("PUT", url, options).await
    }

    pub async fn patch(
        &self,
        url: &str,
        options: RequestOptions,
    ) -> Result<HttpResponse, TransportError> {
        self.fetch("PATCH", url, options).await
    }

    pub async fn delete(
        &self,
        url: &str,
        options: RequestOptions,
    ) -> Result<HttpResponse, TransportError> {
        self.fetch("DELETE", url, options).await
    }

    pub async fn head(
        &self,
        url: &str,
        options: RequestOptions,
    ) -> Result<HttpResponse, TransportError> {
        self.fetch("HEAD", url, options).await
    }

    pub async fn options(
        &self,
        url: &str,
        options: RequestOptions,
    ) -> Result<HttpResponse, TransportError> {
        self.fetch("OPTIONS", url, options).await
    }

    /// Generic call with an arbitrary method.
    pub async fn fetch(
        &self,
        method: &str,
        url: &str,
        options: RequestOptions,
    ) -> Result<HttpResponse, TransportError> {
        self.request(HttpRequest::new(method, url, options)).await
    }

    pub async fn request(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        let mut observation = Observation::new(request.method.clone(), request.url.clone())
            .with_query_params(request.options.query.clone());
        if self.record_headers {
            observation = observation.with_headers(request.options.headers.clone());
        }
        let in_flight = InFlight::start(self, observation);

        let outcome = match self.timeout {
            Some(limit) => {
                match tokio::time::timeout(limit, self.collaborator.perform(&request)).await {
                    Ok(result) => result,
                    Err(_) => Err(TransportError::Timeout {
                        method: request.method.clone(),
                        url: request.url.clone(),
                        elapsed_ms: in_flight.elapsed_ms(),
                    }),
                }
            }
            None => self.collaborator.perform(&request).await,
        };

        let status = match &outcome {
            Ok(response) => Some(response.status),
            Err(err) => {
                metrics::TRANSPORT_FAILURES_TOTAL.inc();
                debug!(error = %err, "Intercepted call failed");
                err.status()
            }
        };
        in_flight.finish(status);
        outcome
    }

    pub fn set_shared_tracking(&self, enabled: bool) {
        self.shared_tracking.store(enabled, Ordering::SeqCst);
    }

    pub fn shared_tracking(&self) -> bool {
        self.shared_tracking.load(Ordering::SeqCst)
    }

    pub fn store(&self) -> &ObservationStore {
        &self.store
    }

    pub fn observations(&self, scope: Scope) -> Vec<Observation> {
        self.store.snapshot(scope)
    }

    pub fn clear_local(&self) {
        self.store.clear_local();
    }

    /// Empties the shared scope for every interceptor using the same log.
    pub fn clear_shared(&self) {
        self.store.clear_shared();
    }

    fn record(&self, observation: Observation, share: bool) {
        metrics::OBSERVATIONS_TOTAL.inc();
        if let Some(ms) = observation.duration_ms {
            metrics::REQUEST_LATENCY.observe(ms as f64 / 1000.0);
        }
        self.store.append(observation, share);
    }
}

impl ObservationSource for CallInterceptor {
    fn snapshot(&self, scope: Scope) -> Vec<Observation> {
        self.store.snapshot(scope)
    }
}

/// Pending observation for a call in progress. Dropping it without
/// [`finish`](InFlight::finish) means the call future was cancelled; the
/// observation is then recorded with its elapsed time and no status.
///
/// The shared-tracking flag is captured when the call is issued.
struct InFlight<'a> {
    interceptor: &'a CallInterceptor,
    observation: Option<Observation>,
    share: bool,
    started: Instant,
}

impl<'a> InFlight<'a> {
    fn start(interceptor: &'a CallInterceptor, observation: Observation) -> Self {
        Self {
            interceptor,
            observation: Some(observation),
            share: interceptor.shared_tracking(),
            started: Instant::now(),
        }
    }

    fn elapsed_ms(&self) -> u64 {
        self.started.elapsed().as_millis() as u64
    }

    fn finish(mut self, status: Option<u16>) {
        if let Some(mut observation) = self.observation.take() {
            observation.duration_ms = Some(self.elapsed_ms());
            observation.status = status;
            self.interceptor.record(observation, self.share);
        }
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        if let Some(mut observation) = self.observation.take() {
            observation.duration_ms = Some(self.elapsed_ms());
            warn!(
                method = %observation.method,
                url = %observation.url,
                "Intercepted call dropped before completion"
            );
            metrics::CANCELLED_REQUESTS_TOTAL.inc();
            self.interceptor.record(observation, self.share);
        }
    }
}
