#![doc = include_str!("../README.md")]

mod error;
mod function;
mod injector;
pub mod params;
mod provided;
mod wrappers;

pub use error::{DiResult, InjectError};
pub use function::{InjectFn, Invocation, MethodSet, Produce};
pub use injector::Injector;
pub use provided::{Provided, ResolvedValue, Value, downcast, value};
pub use wrappers::{Bound, BoundMethod, Resolved, Resolver};

pub use async_trait::async_trait;

use std::sync::Arc;

/// Injection metadata for `f`, independent of any injector: the explicit
/// dependency-name list when one is set, otherwise the extractor's result,
/// computed once and cached on the handle.
pub fn inject(f: &InjectFn) -> Arc<[String]> {
    f.inject()
}

/// Sets `f`'s explicit dependency-name list, replacing any previous one.
pub fn inject_names<I, S>(f: &InjectFn, names: I)
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    f.set_inject(names);
}

/// The raw extractor result for `f`'s signature: recomputed on every call,
/// never cached, never overridden.
pub fn params(f: &InjectFn) -> Vec<String> {
    f.params()
}
