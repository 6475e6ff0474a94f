//! ApiCov call tracking: the interceptor that wraps an HTTP collaborator and
//! the observation store it records into.

pub mod http_client;
pub mod interceptor;
pub mod metrics;
#[cfg(any(test, feature = "test-util"))]
pub mod mock;
pub mod store;

pub use http_client::ReqwestCollaborator;
pub use interceptor::CallInterceptor;
#[cfg(any(test, feature = "test-util"))]
pub use mock::{MockCollaborator, MockReply};
pub use store::{process_observations, ObservationLog, ObservationStore};
