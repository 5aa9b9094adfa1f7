//! Unified error type for applications
//!
//! Every fallible operation in the crate reports an [`ApplicationError`].
//! Behavior supplied by callers (apply phases, finish hooks, adapters) reports
//! failures through the same type so they propagate unchanged to whoever
//! started the application.

/// Boxed error raised by caller-supplied behavior
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Unified error type for target, capability and context operations
#[derive(Debug, thiserror::Error)]
pub enum ApplicationError {
    /// Invalid argument, e.g. an absent target value
    #[error("Invalid: {message}")]
    Invalid {
        /// Error message describing the invalid input
        message: String,
    },

    /// Failure raised by caller-supplied behavior
    #[error("Behavior failed")]
    Behavior {
        /// Underlying failure
        #[source]
        source: BoxError,
    },

    /// Message-only failure raised by caller-supplied behavior
    #[error("Behavior failed: {message}")]
    Failed {
        /// Error message describing the failure
        message: String,
    },

    /// Operation attempted on a context that is already finished
    #[error("Context already finished: cannot {operation}")]
    AlreadyFinished {
        /// Name of the rejected operation
        operation: &'static str,
    },

    /// Finish hook bound reached
    #[error("Finish hook limit of {limit} reached")]
    HookLimit {
        /// Configured maximum number of hooks
        limit: usize,
    },

    /// One or more finish hooks failed while hooks were isolated
    #[error("{} finish hook(s) failed", .failures.len())]
    HooksFailed {
        /// Failures in the order the hooks ran
        failures: Vec<ApplicationError>,
    },

    /// Apply phase failed and its finish phase could not be scheduled
    #[error("{apply} (finish phase not scheduled)")]
    Unscheduled {
        /// Failure of the apply phase
        apply: Box<ApplicationError>,
        /// Why the finish phase was refused
        #[source]
        registration: Box<ApplicationError>,
    },

    /// Configuration could not be loaded or parsed
    #[error("Configuration error: {message}")]
    Config {
        /// Error message describing the configuration problem
        message: String,
    },
}

impl ApplicationError {
    /// Create an invalid argument error
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::Invalid {
            message: message.into(),
        }
    }

    /// Wrap a failure raised by caller-supplied behavior
    pub fn behavior(source: impl Into<BoxError>) -> Self {
        Self::Behavior {
            source: source.into(),
        }
    }

    /// Create a message-only behavior failure
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed {
            message: message.into(),
        }
    }

    /// Create an already-finished error for the named operation
    pub fn already_finished(operation: &'static str) -> Self {
        Self::AlreadyFinished { operation }
    }

    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }
}

/// Standard Result type for application operations
pub type Result<T> = std::result::Result<T, ApplicationError>;
