//! Timeout configuration for DACP client operations.
//!
//! Covers the HTTP layer (connect, receive) and the asynchronous task model
//! (overall task deadline, spacing between result polls).

use std::time::Duration;

/// Timeout configuration for DACP client operations.
///
/// # Examples
///
/// ```rust
/// use dacp_link::DacpLinkTimeouts;
/// use std::time::Duration;
///
/// // Driver defaults: 30s task deadline, 1s between page requests
/// let timeouts = DacpLinkTimeouts::default();
///
/// // Long-running analytical queries
/// let timeouts = DacpLinkTimeouts::builder()
///     .task_timeout(Duration::from_secs(600))
///     .request_interval_millis(250)
///     .build();
///
/// // Local development against a mock server
/// let timeouts = DacpLinkTimeouts::fast();
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DacpLinkTimeouts {
    /// Timeout for establishing connections (TCP + TLS handshake).
    /// Default: 10 seconds
    pub connection_timeout: Duration,

    /// Upper bound for a single HTTP exchange (login, execute, one page).
    /// Default: 30 seconds
    pub receive_timeout: Duration,

    /// Deadline for a whole task, measured from submission. A cursor that
    /// has not delivered its next page by then fails with a timeout.
    /// Set to 0 to wait indefinitely.
    /// Default: 30 seconds
    pub task_timeout: Duration,

    /// Minimum spacing between consecutive result requests of one task.
    /// Default: 1 second
    pub request_interval: Duration,
}

impl Default for DacpLinkTimeouts {
    fn default() -> Self {
        Self {
            connection_timeout: Duration::from_secs(10),
            receive_timeout: Duration::from_secs(30),
            task_timeout: Duration::from_secs(30),
            request_interval: Duration::from_secs(1),
        }
    }
}

impl DacpLinkTimeouts {
    /// Create a new builder for custom timeout configuration.
    pub fn builder() -> DacpLinkTimeoutsBuilder {
        DacpLinkTimeoutsBuilder::new()
    }

    /// Short timeouts and tight polling for localhost servers.
    pub fn fast() -> Self {
        Self {
            connection_timeout: Duration::from_secs(2),
            receive_timeout: Duration::from_secs(5),
            task_timeout: Duration::from_secs(10),
            request_interval: Duration::from_millis(100),
        }
    }

    /// Long timeouts for remote servers and heavy queries.
    pub fn relaxed() -> Self {
        Self {
            connection_timeout: Duration::from_secs(30),
            receive_timeout: Duration::from_secs(120),
            task_timeout: Duration::from_secs(300),
            request_interval: Duration::from_secs(2),
        }
    }

    /// Check if a duration represents "no timeout" (zero or very large).
    pub fn is_no_timeout(duration: Duration) -> bool {
        duration.is_zero() || duration > Duration::from_secs(86400 * 365)
    }
}

/// Builder for creating custom [`DacpLinkTimeouts`] configurations.
#[derive(Debug, Clone)]
pub struct DacpLinkTimeoutsBuilder {
    timeouts: DacpLinkTimeouts,
}

impl DacpLinkTimeoutsBuilder {
    fn new() -> Self {
        Self {
            timeouts: DacpLinkTimeouts::default(),
        }
    }

    /// Set the connection timeout (TCP + TLS handshake).
    pub fn connection_timeout(mut self, timeout: Duration) -> Self {
        self.timeouts.connection_timeout = timeout;
        self
    }

    /// Set the connection timeout in seconds.
    pub fn connection_timeout_secs(self, secs: u64) -> Self {
        self.connection_timeout(Duration::from_secs(secs))
    }

    /// Set the per-request receive timeout.
    pub fn receive_timeout(mut self, timeout: Duration) -> Self {
        self.timeouts.receive_timeout = timeout;
        self
    }

    /// Set the receive timeout in seconds.
    pub fn receive_timeout_secs(self, secs: u64) -> Self {
        self.receive_timeout(Duration::from_secs(secs))
    }

    /// Set the task deadline. Set to 0 to wait indefinitely.
    pub fn task_timeout(mut self, timeout: Duration) -> Self {
        self.timeouts.task_timeout = timeout;
        self
    }

    /// Set the task deadline in seconds.
    pub fn task_timeout_secs(self, secs: u64) -> Self {
        self.task_timeout(Duration::from_secs(secs))
    }

    /// Set the spacing between result requests.
    pub fn request_interval(mut self, interval: Duration) -> Self {
        self.timeouts.request_interval = interval;
        self
    }

    /// Set the spacing between result requests in milliseconds.
    pub fn request_interval_millis(self, millis: u64) -> Self {
        self.request_interval(Duration::from_millis(millis))
    }

    /// Build the timeout configuration.
    pub fn build(self) -> DacpLinkTimeouts {
        self.timeouts
    }
}
