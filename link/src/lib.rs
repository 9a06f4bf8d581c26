//! Client protocol engine for the DACP HTTP/JSON SQL service.
//!
//! The service runs SQL asynchronously: a statement is submitted, the server
//! answers with a task id and the delivery mode it picked, and results are
//! then fetched one of three ways:
//!
//! - **direct** (`result`): the whole result in one response
//! - **cursor** (`cursor`): pages polled from `/sql/getResult`, consumed
//!   lazily through a [`RowStream`]
//! - **delegated** (`olk`): the server rewrites the SQL for an external
//!   engine, reached through a caller-supplied [`DelegatedEngine`]
//!
//! Every value is coerced against its column type ([`coerce`]) because the
//! wire format flattens nested types to plain JSON.
//!
//! ```rust,no_run
//! use dacp_link::DacpLinkClient;
//!
//! # async fn example() -> dacp_link::Result<()> {
//! let client = DacpLinkClient::builder()
//!     .base_url("http://localhost:8080")
//!     .user("alice")
//!     .password("secret")
//!     .build()?;
//!
//! let rows = client.run_query("SELECT 1").await?.collect_rows().await?;
//! println!("{} rows", rows.len());
//! # Ok(())
//! # }
//! ```

pub mod auth;
pub mod client;
pub mod coerce;
pub mod cursor;
pub mod delegated;
pub mod error;
pub mod execute;
pub mod models;
pub mod signature;
pub mod timeouts;
pub mod transport;

pub use auth::{AuthManager, Credentials, SessionSnapshot};
pub use client::{DacpLinkClient, DacpLinkClientBuilder, FacadeState, ResultHandle};
pub use coerce::{fix, fix_value, NumericKind, Row, TypeKind, TypedValue};
pub use cursor::{CursorPager, RowStream};
pub use delegated::{BufferedRows, DelegatedEngine, DelegatedResult, DelegatedRows, DelegatedSession};
pub use error::{DacpLinkError, Result};
pub use execute::ExecuteManager;
pub use models::{
    Column, ExecuteOutcome, ExecuteRequest, ExecuteResponse, InlineResult, LoginRequest,
    LoginResponse, PageRequest, PageResponse, PageResult, ResultCode, ResultMode,
};
pub use signature::TypeSignature;
pub use timeouts::{DacpLinkTimeouts, DacpLinkTimeoutsBuilder};
pub use transport::{HttpReply, HttpTransport, Transport};

/// Crate version, sent in the `User-Agent` header
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
