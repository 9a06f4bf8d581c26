//! Data models for dacp-link.
//!
//! Request and response bodies of the three DACP endpoints
//! (`/sql/login`, `/sql/execute`, `/sql/getResult`) plus the validated
//! values handed to callers.

pub mod column;
pub mod execute_outcome;
pub mod execute_request;
pub mod execute_response;
pub mod login_request;
pub mod login_response;
pub mod page_request;
pub mod page_response;
pub mod page_result;
pub mod result_code;
pub mod result_mode;


pub use column::Column;
pub use execute_outcome::{ExecuteOutcome, InlineResult};
pub use execute_request::ExecuteRequest;
pub use execute_response::ExecuteResponse;
pub use login_request::LoginRequest;
pub use login_response::LoginResponse;
pub use page_request::PageRequest;
pub use page_response::PageResponse;
pub use page_result::PageResult;
pub use result_code::ResultCode;
pub use result_mode::ResultMode;
