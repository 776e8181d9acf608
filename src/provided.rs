//! The value representation and the async-value wrapper for registry entries.

use std::any::Any;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use futures::FutureExt;
use futures::future::{BoxFuture, Shared};

use crate::error::DiResult;

/// A resolved dependency value. Values are type-erased and shared.
pub type Value = Arc<dyn Any + Send + Sync>;

/// Outcome of resolving one name. `None` is the "no binding" outcome:
/// unregistered names resolve to it rather than failing.
pub type ResolvedValue = Option<Value>;

/// Wraps a plain value for registration or for returning from an injected
/// function body.
pub fn value<T: Any + Send + Sync>(v: T) -> Value {
    Arc::new(v)
}

/// Downcasts a [`Value`] back to a concrete type.
pub fn downcast<T: Any + Send + Sync>(v: &Value) -> Option<Arc<T>> {
    v.clone().downcast::<T>().ok()
}

type SharedResolution = Shared<BoxFuture<'static, DiResult<ResolvedValue>>>;

/// A registry entry: either an immediately available value or a pending
/// asynchronous one.
///
/// Pending entries are backed by a [`Shared`] future, so any number of
/// resolutions can await the same entry and they all coalesce on a single
/// underlying computation.
#[derive(Clone)]
pub enum Provided {
    Ready(ResolvedValue),
    Pending(SharedResolution),
}

impl Provided {
    /// An entry holding a plain value.
    pub fn ready<T: Any + Send + Sync>(v: T) -> Self {
        Provided::Ready(Some(Arc::new(v)))
    }

    /// An entry holding an already type-erased value (or the absent value).
    pub fn raw(v: ResolvedValue) -> Self {
        Provided::Ready(v)
    }

    /// An entry holding the absent value. Lookups treat it as unregistered
    /// and fall through to factories and the parent chain.
    pub fn none() -> Self {
        Provided::Ready(None)
    }

    /// An entry backed by a future. The future is polled on first await and
    /// its settled outcome is shared by every later waiter.
    pub fn future<F>(fut: F) -> Self
    where
        F: Future<Output = DiResult<ResolvedValue>> + Send + 'static,
    {
        Provided::Pending(fut.boxed().shared())
    }

    /// Sugar over [`Provided::future`] for an infallible future of a plain
    /// value.
    pub fn future_value<F, T>(fut: F) -> Self
    where
        F: Future<Output = T> + Send + 'static,
        T: Any + Send + Sync,
    {
        Self::future(async move { Ok(Some(value(fut.await))) })
    }

    /// Awaits the entry's value.
    pub async fn get(&self) -> DiResult<ResolvedValue> {
        match self {
            Provided::Ready(v) => Ok(v.clone()),
            Provided::Pending(fut) => fut.clone().await,
        }
    }

    /// Returns the settled outcome without awaiting, when there is one.
    pub fn now(&self) -> Option<DiResult<ResolvedValue>> {
        match self {
            Provided::Ready(v) => Some(Ok(v.clone())),
            Provided::Pending(fut) => fut.peek().cloned(),
        }
    }

    /// Whether [`Provided::now`] would return a value.
    pub fn is_settled(&self) -> bool {
        match self {
            Provided::Ready(_) => true,
            Provided::Pending(fut) => fut.peek().is_some(),
        }
    }
}

impl fmt::Debug for Provided {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Provided::Ready(Some(_)) => f.write_str("Provided::Ready(..)"),
            Provided::Ready(None) => f.write_str("Provided::Ready(None)"),
            Provided::Pending(fut) if fut.peek().is_some() => {
                f.write_str("Provided::Pending(settled)")
            }
            Provided::Pending(_) => f.write_str("Provided::Pending(..)"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn ready_value_round_trips() {
        let provided = Provided::ready(7u32);
        let got = provided.get().await.unwrap().unwrap();
        assert_eq!(*downcast::<u32>(&got).unwrap(), 7);
    }

    #[tokio::test]
    async fn pending_is_shared_between_waiters() {
        let provided = Provided::future_value(async { "late".to_string() });
        assert!(!provided.is_settled());

        let a = provided.get().await.unwrap().unwrap();
        // Settled now; a second get observes the same outcome without
        // recomputing.
        assert!(provided.is_settled());
        let b = provided.now().unwrap().unwrap().unwrap();
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[tokio::test]
    async fn none_entry_is_ready_and_absent() {
        let provided = Provided::none();
        assert!(provided.get().await.unwrap().is_none());
        assert!(provided.is_settled());
    }
}
