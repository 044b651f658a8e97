//! Vela Client
//!
//! API plumbing for the declarative resource engine: an injected
//! transport, an HTTP adapter with retries and ETag capture, the
//! v3/v4 query translators, the asynchronous task tracker and the
//! name-to-ID entity resolver.

pub mod deadline;
pub mod error;
pub mod http;
pub mod query;
pub mod resolve;
pub mod task;
pub mod transport;

pub use deadline::Deadline;
pub use error::ApiError;
pub use http::{ApiClient, ETAG_KEY, RAW_BODY_KEY, RetryPolicy};
pub use query::{ApiDialect, V3Query, V4Query};
pub use resolve::{EntityRef, ResolveError, Resolver};
pub use task::{PollCadence, TaskError, TaskHandle, TaskStatus, wait_for_task};
pub use transport::{ApiRequest, Credentials, RawResponse, ReqwestTransport, Transport, Verb};
