//! API client core: request construction, authentication, retry on transient
//! failures and response envelope normalization.

mod client;
mod error;
mod params;
mod response;
mod retry;
mod transport;
mod upload;

pub use client::{ApiClient, DEFAULT_TIMEOUT};
pub use error::{ClientError, TransportError};
pub use params::QueryParams;
pub use response::{error_detail, normalize};
pub use retry::{BACKOFF_FACTOR, MAX_RETRIES, RETRY_STATUSES, RetryPolicy};
pub use transport::{
    HttpTransport, MultipartForm, RawResponse, RequestBody, Transport, TransportRequest,
    authorization_header,
};
pub use upload::{FileUpload, UPLOAD_PATH};

#[cfg(test)]
pub use transport::MockTransport;
