pub mod error;
pub mod retry;

pub use error::{ApiError, LlmError};
pub use retry::{call_with_retry, RetryPolicy};
