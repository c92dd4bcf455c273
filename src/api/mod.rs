//! HTTP surface: typed errors, the transport seam, the record CRUD
//! client, and the offline fallback interceptor for framework reads.

pub mod client;
pub mod error;
pub mod fallback;
pub mod interceptor;
pub mod transport;

pub use client::{CreateRecordDto, RecordApi, RecordApiClient, RecordDto};
pub use error::HttpError;
pub use interceptor::OfflineFetcher;
pub use transport::{HttpTransport, ReqwestTransport};
