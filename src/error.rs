use std::fmt::Display;

/// Result alias used across the crate.
pub type DiResult<T> = Result<T, InjectError>;

/// Failures surfaced by resolution and invocation.
///
/// The enum is `Clone` because pending registry values are shared futures:
/// every waiter on the same entry observes the same failure.
#[derive(Debug, Clone, thiserror::Error)]
pub enum InjectError {
    /// A factory was invoked for `name` and its injected call failed.
    #[error("factory for `{name}` failed: {source}")]
    Factory {
        name: String,
        #[source]
        source: Box<InjectError>,
    },
    /// An asynchronous registry value for `name` settled with a failure.
    #[error("async value for `{name}` failed: {source}")]
    Pending {
        name: String,
        #[source]
        source: Box<InjectError>,
    },
    /// A synchronous invocation was requested of an async-bodied function.
    #[error("`{name}` does not have a synchronous body")]
    NotSync { name: String },
    /// A method-call variant named a method the receiver does not have.
    #[error("no method named `{name}` on receiver")]
    UnknownMethod { name: String },
    /// Failure raised by user code: a factory body, an injected function, or
    /// a registered future.
    #[error("{0}")]
    Failure(String),
}

impl InjectError {
    /// Wraps an arbitrary displayable error from user code.
    pub fn failure(message: impl Display) -> Self {
        InjectError::Failure(message.to_string())
    }

    pub(crate) fn factory(name: &str, source: InjectError) -> Self {
        InjectError::Factory {
            name: name.to_string(),
            source: Box::new(source),
        }
    }

    pub(crate) fn pending(name: &str, source: InjectError) -> Self {
        InjectError::Pending {
            name: name.to_string(),
            source: Box::new(source),
        }
    }
}
