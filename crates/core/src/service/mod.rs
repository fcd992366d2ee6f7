//! Remote conversion service interface.
//!
//! The core never converts anything itself. It hands files to a
//! [`ConversionService`], gets a job id back, and asks for that job's status
//! until it settles. [`HttpConversionService`] is the production
//! implementation; `testing::MockConversionService` scripts it for tests.

mod error;
mod http;
mod traits;
mod types;

pub use error::{ServiceError, SubmitError, TransportError, GENERIC_SUBMIT_FAILURE};
pub use http::HttpConversionService;
pub use traits::ConversionService;
pub use types::{FetchedBody, UploadRequest};
