pub mod error;

pub use error::{ApiError, ApiResult, ErrorInfo, ErrorResponse};
