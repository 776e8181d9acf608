//! Reusable invocation handles returned by `bind`, `resolved`, `resolver`,
//! and `mbind`.

use std::fmt;

use crate::error::DiResult;
use crate::function::{InjectFn, Invocation, MethodSet};
use crate::injector::Injector;
use crate::provided::{ResolvedValue, Value};

/// Handle returned by [`Injector::bind`]. Every invocation re-resolves the
/// target's dependencies from the injector's current state, so registry
/// changes made after creation are observed.
pub struct Bound {
    injector: Injector,
    target: InjectFn,
    context: Option<Value>,
    preset: Vec<ResolvedValue>,
}

impl Bound {
    pub(crate) fn new(
        injector: Injector,
        target: InjectFn,
        context: Option<Value>,
        preset: Vec<ResolvedValue>,
    ) -> Self {
        Self {
            injector,
            target,
            context,
            preset,
        }
    }

    /// Resolves afresh and invokes. `runtime` arguments precede the preset
    /// arguments; both follow the resolved dependencies.
    pub async fn invoke(&self, runtime: Vec<ResolvedValue>) -> DiResult<ResolvedValue> {
        let mut extras = runtime;
        extras.extend(self.preset.iter().cloned());
        self.injector
            .apply(&self.target, self.context.clone(), extras)
            .await
    }
}

impl fmt::Debug for Bound {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Bound").field("target", &self.target).finish()
    }
}

/// Handle returned by [`Injector::resolved`]. The dependency values were
/// resolved once, at creation, and are frozen; registry changes made after
/// creation are invisible.
pub struct Resolved {
    target: InjectFn,
    context: Option<Value>,
    frozen: Vec<ResolvedValue>,
}

impl Resolved {
    pub(crate) fn new(
        target: InjectFn,
        context: Option<Value>,
        frozen: Vec<ResolvedValue>,
    ) -> Self {
        Self {
            target,
            context,
            frozen,
        }
    }

    /// Invokes with the frozen values, appending `extra` after them.
    pub async fn invoke(&self, extra: Vec<ResolvedValue>) -> DiResult<ResolvedValue> {
        let mut args = self.frozen.clone();
        args.extend(extra);
        self.target
            .invoke(Invocation::new(args, self.context.clone()))
            .await
    }
}

impl fmt::Debug for Resolved {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Resolved")
            .field("target", &self.target)
            .field("frozen", &self.frozen.len())
            .finish()
    }
}

/// Handle returned by [`Injector::resolver`]: frozen dependencies baked into
/// a plain synchronous call. Invocation performs no resolution and no
/// awaiting; the target's raw result comes straight back.
pub struct Resolver {
    target: InjectFn,
    context: Option<Value>,
    frozen: Vec<ResolvedValue>,
}

impl Resolver {
    pub(crate) fn new(
        target: InjectFn,
        context: Option<Value>,
        frozen: Vec<ResolvedValue>,
    ) -> Self {
        Self {
            target,
            context,
            frozen,
        }
    }

    /// Invokes the sync body with the frozen values plus `extra`.
    pub fn invoke(&self, extra: Vec<ResolvedValue>) -> DiResult<ResolvedValue> {
        let mut args = self.frozen.clone();
        args.extend(extra);
        self.target
            .invoke_sync(Invocation::new(args, self.context.clone()))
    }
}

impl fmt::Debug for Resolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Resolver")
            .field("target", &self.target)
            .field("frozen", &self.frozen.len())
            .finish()
    }
}

/// Handle returned by [`Injector::mbind`]: [`Bound`] semantics for a named
/// method. The method is looked up on the receiver afresh at each
/// invocation, so replacing it on the set is observed too.
pub struct BoundMethod {
    injector: Injector,
    target: MethodSet,
    method: String,
    preset: Vec<ResolvedValue>,
}

impl BoundMethod {
    pub(crate) fn new(
        injector: Injector,
        target: MethodSet,
        method: String,
        preset: Vec<ResolvedValue>,
    ) -> Self {
        Self {
            injector,
            target,
            method,
            preset,
        }
    }

    /// Looks the method up, resolves afresh, and invokes; same argument
    /// ordering as [`Bound::invoke`].
    pub async fn invoke(&self, runtime: Vec<ResolvedValue>) -> DiResult<ResolvedValue> {
        let mut extras = runtime;
        extras.extend(self.preset.iter().cloned());
        self.injector
            .mapply(&self.target, &self.method, extras)
            .await
    }
}

impl fmt::Debug for BoundMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BoundMethod")
            .field("method", &self.method)
            .finish()
    }
}
