//! The injector: registry, factory table, parent chain, and the resolution
//! algorithm.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::{Arc, PoisonError, RwLock};

use futures::FutureExt;
use futures::future::{BoxFuture, try_join_all};
use tracing::trace;

use crate::error::{DiResult, InjectError};
use crate::function::{InjectFn, Invocation, MethodSet};
use crate::provided::{Provided, ResolvedValue, Value};
use crate::wrappers::{Bound, BoundMethod, Resolved, Resolver};

struct Inner {
    registry: RwLock<HashMap<String, Provided>>,
    factories: RwLock<HashMap<String, InjectFn>>,
    parent: Option<Injector>,
}

/// A hierarchical dependency resolver.
///
/// An injector owns a registry of named values, a table of factories, and an
/// optional parent. Resolution consults the registry first, then the
/// factories, then delegates to the parent; an unregistered name resolves to
/// `None` rather than failing.
///
/// Cloning an `Injector` aliases the same underlying injector, so a child
/// holds a non-owning handle to its parent and registries stay freely
/// mutable through any clone.
#[derive(Clone)]
pub struct Injector {
    inner: Arc<Inner>,
}

impl Injector {
    /// An empty injector with no parent.
    pub fn new() -> Self {
        Self::build(HashMap::new(), HashMap::new(), None)
    }

    /// An empty injector delegating to `parent`.
    pub fn with_parent(parent: &Injector) -> Self {
        Self::build(HashMap::new(), HashMap::new(), Some(parent.clone()))
    }

    /// An injector owning the given maps directly.
    pub fn from_parts(
        registry: HashMap<String, Provided>,
        factories: HashMap<String, InjectFn>,
    ) -> Self {
        Self::build(registry, factories, None)
    }

    /// An injector owning the given maps, delegating to `parent`.
    pub fn from_parts_with_parent(
        registry: HashMap<String, Provided>,
        factories: HashMap<String, InjectFn>,
        parent: &Injector,
    ) -> Self {
        Self::build(registry, factories, Some(parent.clone()))
    }

    /// A new injector seeded with a one-level copy of `other`'s registry and
    /// factory table, delegating to `parent`. Later mutations of `other` are
    /// not reflected.
    pub fn copy_of(other: &Injector, parent: &Injector) -> Self {
        let registry = other
            .inner
            .registry
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        let factories = other
            .inner
            .factories
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        Self::build(registry, factories, Some(parent.clone()))
    }

    /// A new empty child whose parent is this injector.
    pub fn create(&self) -> Injector {
        Injector::with_parent(self)
    }

    /// A new child owning the given maps.
    pub fn create_with(
        &self,
        registry: HashMap<String, Provided>,
        factories: HashMap<String, InjectFn>,
    ) -> Injector {
        Injector::from_parts_with_parent(registry, factories, self)
    }

    fn build(
        registry: HashMap<String, Provided>,
        factories: HashMap<String, InjectFn>,
        parent: Option<Injector>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                registry: RwLock::new(registry),
                factories: RwLock::new(factories),
                parent,
            }),
        }
    }

    pub fn parent(&self) -> Option<&Injector> {
        self.inner.parent.as_ref()
    }

    // --- registration -----------------------------------------------------

    /// Binds `name` to a plain value, silently overwriting any previous
    /// binding. Chainable.
    pub fn register<T: Any + Send + Sync>(&self, name: impl Into<String>, value: T) -> &Self {
        self.register_provided(name, Provided::ready(value))
    }

    /// Binds `name` to a registry entry directly: an async value, a
    /// pre-erased value, or the explicit absent value.
    pub fn register_provided(&self, name: impl Into<String>, entry: Provided) -> &Self {
        let mut registry = self
            .inner
            .registry
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        registry.insert(name.into(), entry);
        self
    }

    /// Binds `name` to the outcome of `fut`. Every resolution of the name
    /// awaits the same shared future.
    pub fn register_future<F>(&self, name: impl Into<String>, fut: F) -> &Self
    where
        F: Future<Output = DiResult<ResolvedValue>> + Send + 'static,
    {
        self.register_provided(name, Provided::future(fut))
    }

    /// Merges `other`'s own registry into this one, one level deep; keys
    /// from `other` overwrite same-named keys here.
    pub fn register_injector(&self, other: &Injector) -> &Self {
        let entries = other
            .inner
            .registry
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        self.register_map(entries)
    }

    /// Merges every entry of `map` into the registry, same overwrite rule.
    pub fn register_map(&self, map: HashMap<String, Provided>) -> &Self {
        let mut registry = self
            .inner
            .registry
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        registry.extend(map);
        self
    }

    /// Removes one binding; no-op when absent.
    pub fn unregister(&self, name: &str) -> &Self {
        let mut registry = self
            .inner
            .registry
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        registry.remove(name);
        self
    }

    /// Registers a factory for `name`. The factory is itself injected when
    /// invoked, with its dependencies resolved against the injector that
    /// originated the resolution.
    pub fn register_factory(&self, name: impl Into<String>, producer: InjectFn) -> &Self {
        let mut factories = self
            .inner
            .factories
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        factories.insert(name.into(), producer);
        self
    }

    /// Alias for [`Injector::register_factory`].
    pub fn factory(&self, name: impl Into<String>, producer: InjectFn) -> &Self {
        self.register_factory(name, producer)
    }

    /// Removes one factory; no-op when absent.
    pub fn unregister_factory(&self, name: &str) -> &Self {
        let mut factories = self
            .inner
            .factories
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        factories.remove(name);
        self
    }

    // --- injection metadata ----------------------------------------------

    /// The dependency-name list for `f` (explicit, or computed once and
    /// cached). Also available as the free function [`crate::inject`].
    pub fn inject(&self, f: &InjectFn) -> Arc<[String]> {
        f.inject()
    }

    /// Sets `f`'s explicit dependency-name list. Chainable.
    pub fn inject_names<I, S>(&self, f: &InjectFn, names: I) -> &Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        f.set_inject(names);
        self
    }

    /// The raw extractor result for `f`, uncached.
    pub fn params(&self, f: &InjectFn) -> Vec<String> {
        f.params()
    }

    // --- resolution -------------------------------------------------------

    /// Resolves each name to a value, in input order.
    ///
    /// Per-name resolutions proceed independently and recombine in order;
    /// the first failure fails the whole call. Dependency cycles through
    /// factories and parents are not detected and recurse unboundedly.
    pub async fn resolve<S: AsRef<str>>(&self, deps: &[S]) -> DiResult<Vec<ResolvedValue>> {
        self.resolve_from(deps, self).await
    }

    /// Like [`Injector::resolve`], but factory dependencies are resolved
    /// against `root` instead of `self`. This is what threads caller
    /// precedence down a delegation chain.
    pub async fn resolve_from<S: AsRef<str>>(
        &self,
        deps: &[S],
        root: &Injector,
    ) -> DiResult<Vec<ResolvedValue>> {
        if self.is_blank() {
            return Ok(vec![None; deps.len()]);
        }
        try_join_all(
            deps.iter()
                .map(|name| self.resolve_name(name.as_ref(), root)),
        )
        .await
    }

    /// Resolves a single name.
    pub async fn resolve_one(&self, name: &str) -> DiResult<ResolvedValue> {
        self.resolve_name(name, self).await
    }

    /// No own bindings, no own factories, no parent: every name resolves to
    /// `None` without touching the maps.
    fn is_blank(&self) -> bool {
        self.inner.parent.is_none()
            && self
                .inner
                .registry
                .read()
                .unwrap_or_else(PoisonError::into_inner)
                .is_empty()
            && self
                .inner
                .factories
                .read()
                .unwrap_or_else(PoisonError::into_inner)
                .is_empty()
    }

    fn resolve_name<'a>(
        &'a self,
        name: &'a str,
        root: &'a Injector,
    ) -> BoxFuture<'a, DiResult<ResolvedValue>> {
        async move {
            // Locks are released before any await.
            let entry = {
                let registry = self
                    .inner
                    .registry
                    .read()
                    .unwrap_or_else(PoisonError::into_inner);
                registry.get(name).cloned()
            };
            match entry {
                // A stored absent value does not satisfy the lookup; it
                // falls through to factories and the parent chain.
                Some(Provided::Ready(None)) | None => {}
                Some(provided) => {
                    trace!(name, "resolved from registry");
                    return provided
                        .get()
                        .await
                        .map_err(|e| InjectError::pending(name, e));
                }
            }

            let producer = {
                let factories = self
                    .inner
                    .factories
                    .read()
                    .unwrap_or_else(PoisonError::into_inner);
                factories.get(name).cloned()
            };
            if let Some(producer) = producer {
                trace!(name, "invoking factory");
                return root
                    .apply(&producer, None, Vec::new())
                    .await
                    .map_err(|e| InjectError::factory(name, e));
            }

            if let Some(parent) = &self.inner.parent {
                trace!(name, "delegating to parent");
                return parent.resolve_name(name, root).await;
            }

            trace!(name, "unresolved");
            Ok(None)
        }
        .boxed()
    }

    // --- invocation wrappers ---------------------------------------------

    /// Resolves `f`'s dependencies fresh and invokes it once, with `args`
    /// appended after the resolved values and `context` as the receiver.
    pub async fn apply(
        &self,
        f: &InjectFn,
        context: Option<Value>,
        args: Vec<ResolvedValue>,
    ) -> DiResult<ResolvedValue> {
        let names = f.inject();
        let mut resolved = self.resolve(&names[..]).await?;
        resolved.extend(args);
        f.invoke(Invocation::new(resolved, context)).await
    }

    /// Same operation as [`Injector::apply`]; both names are part of the
    /// surface.
    pub async fn call(
        &self,
        f: &InjectFn,
        context: Option<Value>,
        args: Vec<ResolvedValue>,
    ) -> DiResult<ResolvedValue> {
        self.apply(f, context, args).await
    }

    /// A reusable handle that re-resolves `f`'s dependencies from the
    /// current registry state on every invocation. Runtime arguments precede
    /// the preset `args`, and both follow the resolved dependencies.
    #[doc(alias = "abind")]
    pub fn bind(&self, f: &InjectFn, context: Option<Value>, args: Vec<ResolvedValue>) -> Bound {
        Bound::new(self.clone(), f.clone(), context, args)
    }

    /// A reusable handle whose dependencies are resolved exactly once, right
    /// here, and frozen; later registry changes are invisible to it. The
    /// preset `args` are frozen after the dependencies, and per-call extras
    /// come last.
    #[doc(alias = "aresolved")]
    pub async fn resolved(
        &self,
        f: &InjectFn,
        context: Option<Value>,
        args: Vec<ResolvedValue>,
    ) -> DiResult<Resolved> {
        let frozen = self.freeze(f, args).await?;
        Ok(Resolved::new(f.clone(), context, frozen))
    }

    /// Like [`Injector::resolved`], but the handle's invocations are plain
    /// synchronous calls with no further async resolution. Fails immediately
    /// with [`InjectError::NotSync`] when `f` has an async body.
    #[doc(alias = "aresolver")]
    pub async fn resolver(
        &self,
        f: &InjectFn,
        context: Option<Value>,
        args: Vec<ResolvedValue>,
    ) -> DiResult<Resolver> {
        if !f.is_sync() {
            return Err(InjectError::NotSync {
                name: f.name().to_string(),
            });
        }
        let frozen = self.freeze(f, args).await?;
        Ok(Resolver::new(f.clone(), context, frozen))
    }

    async fn freeze(&self, f: &InjectFn, args: Vec<ResolvedValue>) -> DiResult<Vec<ResolvedValue>> {
        let names = f.inject();
        let mut frozen = self.resolve(&names[..]).await?;
        frozen.extend(args);
        Ok(frozen)
    }

    // --- method-call variants --------------------------------------------

    /// Invokes the method named `method` on `target`, injected like
    /// [`Injector::apply`] and with the set's state as the receiver.
    pub async fn mapply(
        &self,
        target: &MethodSet,
        method: &str,
        args: Vec<ResolvedValue>,
    ) -> DiResult<ResolvedValue> {
        let f = target.get(method).ok_or_else(|| InjectError::UnknownMethod {
            name: method.to_string(),
        })?;
        self.apply(&f, target.state(), args).await
    }

    /// Same operation as [`Injector::mapply`].
    pub async fn mcall(
        &self,
        target: &MethodSet,
        method: &str,
        args: Vec<ResolvedValue>,
    ) -> DiResult<ResolvedValue> {
        self.mapply(target, method, args).await
    }

    /// A reusable handle with [`Injector::bind`] semantics for a named
    /// method: the method is looked up and its dependencies resolved afresh
    /// on every invocation.
    #[doc(alias = "ambind")]
    pub fn mbind(&self, target: &MethodSet, method: &str, args: Vec<ResolvedValue>) -> BoundMethod {
        BoundMethod::new(self.clone(), target.clone(), method.to_string(), args)
    }
}

impl Default for Injector {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Injector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let registry = self
            .inner
            .registry
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        let factories = self
            .inner
            .factories
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        f.debug_struct("Injector")
            .field("registry", &registry.len())
            .field("factories", &factories.len())
            .field("has_parent", &self.inner.parent.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provided::{downcast, value};

    fn text(v: &ResolvedValue) -> String {
        downcast::<String>(v.as_ref().expect("value present"))
            .expect("string value")
            .to_string()
    }

    #[tokio::test]
    async fn blank_injector_resolves_everything_to_none() {
        let injector = Injector::new();
        let got = injector.resolve(&["a", "b", "c"]).await.unwrap();
        assert_eq!(got.len(), 3);
        assert!(got.iter().all(Option::is_none));
    }

    #[tokio::test]
    async fn registry_lookup_and_overwrite() {
        let injector = Injector::new();
        injector
            .register("bar", "baz".to_string())
            .register("bar", "qux".to_string());
        let got = injector.resolve(&["bar"]).await.unwrap();
        assert_eq!(text(&got[0]), "qux");
    }

    #[tokio::test]
    async fn explicit_none_entry_falls_through_to_parent() {
        let parent = Injector::new();
        parent.register("flag", "from-parent".to_string());

        let child = parent.create();
        child.register_provided("flag", Provided::none());

        let got = child.resolve(&["flag"]).await.unwrap();
        assert_eq!(text(&got[0]), "from-parent");
    }

    #[tokio::test]
    async fn async_registry_value_is_awaited() {
        let injector = Injector::new();
        injector.register_provided("slow", Provided::future_value(async { 11u32 }));
        let got = injector.resolve(&["slow"]).await.unwrap();
        let v = got[0].as_ref().unwrap();
        assert_eq!(*downcast::<u32>(v).unwrap(), 11);
    }

    #[tokio::test]
    async fn failing_async_value_fails_the_aggregate() {
        let injector = Injector::new();
        injector.register("fine", "ok".to_string());
        injector.register_future("broken", async { Err(InjectError::failure("boom")) });

        let err = injector.resolve(&["fine", "broken"]).await.unwrap_err();
        assert!(matches!(err, InjectError::Pending { ref name, .. } if name == "broken"));
    }

    #[tokio::test]
    async fn results_preserve_input_order() {
        let injector = Injector::new();
        injector
            .register("a", "first".to_string())
            .register_provided("b", Provided::future_value(async { "second".to_string() }))
            .register("c", "third".to_string());

        let got = injector.resolve(&["c", "a", "b"]).await.unwrap();
        assert_eq!(text(&got[0]), "third");
        assert_eq!(text(&got[1]), "first");
        assert_eq!(text(&got[2]), "second");
    }

    #[tokio::test]
    async fn copy_of_snapshots_the_source() {
        let parent = Injector::new();
        let source = Injector::new();
        source.register("k", "original".to_string());

        let copy = Injector::copy_of(&source, &parent);
        source.register("k", "mutated".to_string());

        let got = copy.resolve(&["k"]).await.unwrap();
        assert_eq!(text(&got[0]), "original");
    }

    #[tokio::test]
    async fn register_injector_merges_with_overwrite() {
        let target = Injector::new();
        target.register("shared", "mine".to_string());
        target.register("local", "kept".to_string());

        let source = Injector::new();
        source.register("shared", "theirs".to_string());

        target.register_injector(&source);
        let got = target.resolve(&["shared", "local"]).await.unwrap();
        assert_eq!(text(&got[0]), "theirs");
        assert_eq!(text(&got[1]), "kept");
    }

    #[tokio::test]
    async fn unregister_is_a_silent_no_op_when_absent() {
        let injector = Injector::new();
        injector.unregister("ghost").unregister_factory("ghost");
        injector.register("real", 1u8).unregister("real");
        assert!(injector.resolve(&["real"]).await.unwrap()[0].is_none());
    }

    #[tokio::test]
    async fn factory_failure_is_wrapped_with_the_name() {
        let injector = Injector::new();
        injector.factory(
            "doomed",
            InjectFn::new("make_doomed()", |_| Err(InjectError::failure("nope"))),
        );
        let err = injector.resolve(&["doomed"]).await.unwrap_err();
        assert!(matches!(err, InjectError::Factory { ref name, .. } if name == "doomed"));
    }

    #[tokio::test]
    async fn mapply_unknown_method_fails_immediately() {
        let injector = Injector::new();
        let set = MethodSet::new();
        let err = injector.mapply(&set, "missing", Vec::new()).await.unwrap_err();
        assert!(matches!(err, InjectError::UnknownMethod { ref name } if name == "missing"));
    }

    #[tokio::test]
    async fn method_sees_the_set_state_as_context() {
        let injector = Injector::new();
        injector.register("suffix", "!".to_string());

        let set = MethodSet::with_state("shouty".to_string());
        set.method(
            "describe",
            InjectFn::new("describe(suffix)", |call| {
                let suffix = call.arg::<String>(0).expect("suffix");
                let state = call.context_as::<String>().expect("state");
                Ok(Some(value(format!("{state}{suffix}"))))
            }),
        );

        let got = injector.mcall(&set, "describe", Vec::new()).await.unwrap();
        assert_eq!(text(&got), "shouty!");
    }
}
