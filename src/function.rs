//! Injectable function handles and their metadata.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::{Arc, PoisonError, RwLock};

use async_trait::async_trait;
use futures::FutureExt;
use futures::future::BoxFuture;

use crate::error::{DiResult, InjectError};
use crate::params;
use crate::provided::{ResolvedValue, Value, downcast};

/// What an injected body receives: the resolved dependency values (in
/// declaration order) followed by any manually supplied extras, plus an
/// optional receiver.
pub struct Invocation {
    pub args: Vec<ResolvedValue>,
    pub context: Option<Value>,
}

impl Invocation {
    pub fn new(args: Vec<ResolvedValue>, context: Option<Value>) -> Self {
        Self { args, context }
    }

    /// Typed access to the argument at `index`. `None` when the slot is
    /// absent, holds the no-binding value, or holds a different type.
    pub fn arg<T: Any + Send + Sync>(&self, index: usize) -> Option<Arc<T>> {
        self.args.get(index).and_then(|v| v.as_ref()).and_then(downcast)
    }

    /// Typed access to the receiver.
    pub fn context_as<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        self.context.as_ref().and_then(downcast)
    }
}

type SyncBody = dyn Fn(Invocation) -> DiResult<ResolvedValue> + Send + Sync;
type AsyncBody =
    dyn Fn(Invocation) -> BoxFuture<'static, DiResult<ResolvedValue>> + Send + Sync;

enum Body {
    Sync(Box<SyncBody>),
    Async(Box<AsyncBody>),
}

struct InjectFnInner {
    name: String,
    signature: Option<String>,
    /// Dependency-name list: explicitly set, or computed once from the
    /// signature and cached for the lifetime of the handle. Clones share it.
    names: RwLock<Option<Arc<[String]>>>,
    body: Body,
}

/// A function that can be injected: a sync or async body plus the metadata
/// the resolver needs to feed it.
///
/// Handles are cheap to clone and clones share the body and the cached
/// dependency-name list.
#[derive(Clone)]
pub struct InjectFn {
    inner: Arc<InjectFnInner>,
}

impl InjectFn {
    /// A sync-bodied function. `signature` is source-like text whose declared
    /// parameter names become the dependency names (see [`crate::params`]).
    pub fn new<F>(signature: &str, body: F) -> Self
    where
        F: Fn(Invocation) -> DiResult<ResolvedValue> + Send + Sync + 'static,
    {
        Self::build(
            display_name(signature),
            Some(signature.to_string()),
            None,
            Body::Sync(Box::new(body)),
        )
    }

    /// An async-bodied function, otherwise like [`InjectFn::new`].
    pub fn new_async<F, Fut>(signature: &str, body: F) -> Self
    where
        F: Fn(Invocation) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = DiResult<ResolvedValue>> + Send + 'static,
    {
        Self::build(
            display_name(signature),
            Some(signature.to_string()),
            None,
            Body::Async(Box::new(move |call| body(call).boxed())),
        )
    }

    /// A sync-bodied function with an explicit dependency-name list; the
    /// extractor is never consulted.
    pub fn with_names<I, S, F>(names: I, body: F) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
        F: Fn(Invocation) -> DiResult<ResolvedValue> + Send + Sync + 'static,
    {
        Self::build(
            "<fn>".to_string(),
            None,
            Some(collect_names(names)),
            Body::Sync(Box::new(body)),
        )
    }

    /// An async-bodied function with an explicit dependency-name list.
    pub fn with_names_async<I, S, F, Fut>(names: I, body: F) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
        F: Fn(Invocation) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = DiResult<ResolvedValue>> + Send + 'static,
    {
        Self::build(
            "<fn>".to_string(),
            None,
            Some(collect_names(names)),
            Body::Async(Box::new(move |call| body(call).boxed())),
        )
    }

    /// Wraps a [`Produce`] implementation.
    pub fn from_producer<P: Produce + 'static>(producer: P) -> Self {
        let names = producer.names();
        let producer = Arc::new(producer);
        Self::with_names_async(names, move |call| {
            let producer = Arc::clone(&producer);
            async move { producer.produce(call).await }
        })
    }

    fn build(
        name: String,
        signature: Option<String>,
        names: Option<Arc<[String]>>,
        body: Body,
    ) -> Self {
        Self {
            inner: Arc::new(InjectFnInner {
                name,
                signature,
                names: RwLock::new(names),
                body,
            }),
        }
    }

    /// Diagnostic name, taken from the signature when there is one.
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// The signature text this handle was built from, if any.
    pub fn signature(&self) -> Option<&str> {
        self.inner.signature.as_deref()
    }

    /// The dependency-name list: the explicit list when one was set,
    /// otherwise the extractor's result, computed once and cached.
    ///
    /// Repeated calls hand back the same allocation, so the list is stable
    /// under pointer comparison until [`InjectFn::set_inject`] replaces it.
    pub fn inject(&self) -> Arc<[String]> {
        {
            let cached = self
                .inner
                .names
                .read()
                .unwrap_or_else(PoisonError::into_inner);
            if let Some(names) = cached.as_ref() {
                return Arc::clone(names);
            }
        }
        let mut slot = self
            .inner
            .names
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        // Another clone of this handle may have won the race.
        if let Some(names) = slot.as_ref() {
            return Arc::clone(names);
        }
        let computed: Arc<[String]> = self.params().into();
        *slot = Some(Arc::clone(&computed));
        computed
    }

    /// Replaces the dependency-name list, including a previously
    /// auto-computed one.
    pub fn set_inject<I, S>(&self, names: I) -> &Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut slot = self
            .inner
            .names
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        *slot = Some(collect_names(names));
        self
    }

    /// The raw extractor result for this handle's signature. Never cached,
    /// never overridden; empty when the handle has no signature.
    pub fn params(&self) -> Vec<String> {
        self.inner
            .signature
            .as_deref()
            .map(params::extract)
            .unwrap_or_default()
    }

    /// Whether the body can be invoked without awaiting.
    pub fn is_sync(&self) -> bool {
        matches!(self.inner.body, Body::Sync(_))
    }

    /// Runs the body.
    pub async fn invoke(&self, call: Invocation) -> DiResult<ResolvedValue> {
        match &self.inner.body {
            Body::Sync(f) => f(call),
            Body::Async(f) => f(call).await,
        }
    }

    /// Runs a sync body directly; fails immediately for an async body.
    pub fn invoke_sync(&self, call: Invocation) -> DiResult<ResolvedValue> {
        match &self.inner.body {
            Body::Sync(f) => f(call),
            Body::Async(_) => Err(InjectError::NotSync {
                name: self.name().to_string(),
            }),
        }
    }
}

impl fmt::Debug for InjectFn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InjectFn")
            .field("name", &self.inner.name)
            .field("sync", &self.is_sync())
            .finish()
    }
}

fn collect_names<I, S>(names: I) -> Arc<[String]>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    names.into_iter().map(Into::into).collect()
}

fn display_name(signature: &str) -> String {
    let head = signature.split('(').next().unwrap_or("").trim();
    if head.is_empty() || head.contains('|') {
        return "<fn>".to_string();
    }
    let head = head.rsplit(' ').next().unwrap_or("").trim();
    if head.is_empty() {
        "<fn>".to_string()
    } else {
        head.to_string()
    }
}

/// A struct-shaped factory: declares its dependency names and produces a
/// value from an injected call. Converted into a handle with
/// [`InjectFn::from_producer`].
#[async_trait]
pub trait Produce: Send + Sync {
    /// Ordered dependency names for [`Produce::produce`].
    fn names(&self) -> Vec<String>;

    /// Builds the value from the resolved dependencies.
    async fn produce(&self, call: Invocation) -> DiResult<ResolvedValue>;
}

struct MethodSetInner {
    state: Option<Value>,
    methods: RwLock<HashMap<String, InjectFn>>,
}

/// A receiver for the method-call variants: a shared state value plus a
/// name-to-function method table.
///
/// Each method is invoked with the set's state as its context. Clones alias
/// the same table, and method registration is chainable like injector
/// registration.
#[derive(Clone)]
pub struct MethodSet {
    inner: Arc<MethodSetInner>,
}

impl MethodSet {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(MethodSetInner {
                state: None,
                methods: RwLock::new(HashMap::new()),
            }),
        }
    }

    /// A set whose methods see `state` as their receiver.
    pub fn with_state<T: Any + Send + Sync>(state: T) -> Self {
        Self {
            inner: Arc::new(MethodSetInner {
                state: Some(Arc::new(state)),
                methods: RwLock::new(HashMap::new()),
            }),
        }
    }

    /// Adds or replaces a method.
    pub fn method(&self, name: impl Into<String>, f: InjectFn) -> &Self {
        let mut methods = self
            .inner
            .methods
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        methods.insert(name.into(), f);
        self
    }

    /// Removes a method; no-op when absent.
    pub fn remove_method(&self, name: &str) -> &Self {
        let mut methods = self
            .inner
            .methods
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        methods.remove(name);
        self
    }

    pub fn get(&self, name: &str) -> Option<InjectFn> {
        let methods = self
            .inner
            .methods
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        methods.get(name).cloned()
    }

    pub fn state(&self) -> Option<Value> {
        self.inner.state.clone()
    }
}

impl Default for MethodSet {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for MethodSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let methods = self
            .inner
            .methods
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        f.debug_struct("MethodSet")
            .field("methods", &methods.len())
            .field("has_state", &self.inner.state.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provided::value;

    #[test]
    fn inject_is_computed_once_and_pointer_stable() {
        let f = InjectFn::new("fn combine(left, right)", |_| Ok(None));
        let first = f.inject();
        let second = f.inject();
        assert_eq!(&*first, &["left".to_string(), "right".to_string()]);
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn explicit_names_override_even_after_auto_computation() {
        let f = InjectFn::new("fn combine(left, right)", |_| Ok(None));
        let auto = f.inject();
        assert_eq!(auto.len(), 2);

        f.set_inject(["only"]);
        let overridden = f.inject();
        assert_eq!(&*overridden, &["only".to_string()]);
        assert!(!Arc::ptr_eq(&auto, &overridden));
    }

    #[test]
    fn params_is_never_cached_or_overridden() {
        let f = InjectFn::new("fn combine(left, right)", |_| Ok(None));
        f.set_inject(["only"]);
        assert_eq!(f.params(), ["left", "right"]);
        assert_eq!(&*f.inject(), &["only".to_string()]);
    }

    #[test]
    fn clones_share_the_metadata_cache() {
        let f = InjectFn::new("fn solo(dep)", |_| Ok(None));
        let g = f.clone();
        let from_f = f.inject();
        let from_g = g.inject();
        assert!(Arc::ptr_eq(&from_f, &from_g));
    }

    #[tokio::test]
    async fn async_body_rejects_sync_invocation() {
        let f = InjectFn::new_async("fn later()", |_| async { Ok(None) });
        let err = f.invoke_sync(Invocation::new(Vec::new(), None)).unwrap_err();
        assert!(matches!(err, InjectError::NotSync { .. }));
        assert!(f.invoke(Invocation::new(Vec::new(), None)).await.is_ok());
    }

    #[tokio::test]
    async fn producer_becomes_an_inject_fn() {
        struct Doubler;

        #[async_trait]
        impl Produce for Doubler {
            fn names(&self) -> Vec<String> {
                vec!["n".to_string()]
            }

            async fn produce(&self, call: Invocation) -> DiResult<ResolvedValue> {
                let n = call.arg::<u32>(0).ok_or_else(|| InjectError::failure("n missing"))?;
                Ok(Some(value(*n * 2)))
            }
        }

        let f = InjectFn::from_producer(Doubler);
        assert_eq!(&*f.inject(), &["n".to_string()]);

        let out = f
            .invoke(Invocation::new(vec![Some(value(21u32))], None))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(*crate::provided::downcast::<u32>(&out).unwrap(), 42);
    }

    #[test]
    fn display_names() {
        assert_eq!(InjectFn::new("fn greet(a)", |_| Ok(None)).name(), "greet");
        assert_eq!(InjectFn::new("greet(a)", |_| Ok(None)).name(), "greet");
        assert_eq!(InjectFn::new("|a| a", |_| Ok(None)).name(), "<fn>");
        assert_eq!(InjectFn::with_names(["a"], |_| Ok(None)).name(), "<fn>");
    }
}
