#![forbid(unsafe_code)]

//! Helper invocation references.
//!
//! # Design
//!
//! A [`HelperInvocationReference`] memoizes its helper's result the way a
//! lazy computed value does: the result is cached together with a revision
//! snapshot of the reference's own [`UpdatableTag`], and reused while that
//! tag still validates against the snapshot.
//!
//! Recomputing opens a frame on the environment's tracker, resolves every
//! argument inside it (their tags land in the frame), runs the helper,
//! consumes the helper's recompute tag if it has one, and closes the frame.
//! The frame's combined tag becomes the new subtag of the updatable tag, so
//! the reference's tag keeps a stable identity across recomputations.
//!
//! # Invariants
//!
//! 1. A cached value is returned only while nothing it was computed from has
//!    changed.
//! 2. Reading the reference from inside its own computation fails with
//!    [`ReferenceError::CyclicDependency`]; the helper is never re-entered.
//! 3. Errors are not cached. The next read recomputes.
//!
//! # Debug checks
//!
//! With `debug_assertions` or the `debug-checks` feature, the resolved
//! arguments are fingerprinted before and after the helper runs. A helper
//! that mutates them produces an [`ArgumentMutation`] diagnostic; the value
//! it returned is used unchanged. Tags the helper dirties after reading them
//! are reported as deprecations rather than assertions.
//!
//! [`ArgumentMutation`]: trellis_validator::DiagnosticKind::ArgumentMutation

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use trellis_validator::{Revision, Tag, Tracker, UpdatableTag};

use crate::args::{CapturedArguments, NamedValues};
use crate::children::ChildCache;
use crate::environment::{Environment, ReferenceId};
use crate::error::{ReferenceError, Result};
use crate::helper::Helper;
use crate::property::PropertyReference;
use crate::reference::Reference;
use crate::value::Value;

struct Cached {
    value: Value,
    snapshot: Revision,
}

/// A helper bound to its captured arguments.
pub struct HelperInvocationReference {
    env: Environment,
    id: ReferenceId,
    helper: Helper,
    args: CapturedArguments,
    label: Rc<str>,
    tag: UpdatableTag,
    cache: RefCell<Option<Cached>>,
    evaluating: Cell<bool>,
    children: ChildCache,
}

impl HelperInvocationReference {
    pub(crate) fn new(env: &Environment, helper: Helper, args: CapturedArguments) -> Rc<Self> {
        let id = env.next_reference_id();
        let label: Rc<str> = format!("({})", helper.debug_name()).into();
        env.set_template_path_debug_context(id, &label, None);
        Rc::new(Self {
            env: env.clone(),
            id,
            helper,
            args,
            label,
            tag: UpdatableTag::new(),
            cache: RefCell::new(None),
            evaluating: Cell::new(false),
            children: ChildCache::new(env.config().memoize_children),
        })
    }

    #[must_use]
    pub fn id(&self) -> ReferenceId {
        self.id
    }

    #[must_use]
    pub fn environment(&self) -> &Environment {
        &self.env
    }

    #[must_use]
    pub fn helper(&self) -> &Helper {
        &self.helper
    }

    #[must_use]
    pub fn args(&self) -> &CapturedArguments {
        &self.args
    }

    /// The reference's tag. Its identity never changes; its subtag is
    /// replaced on every recomputation.
    #[must_use]
    pub fn tag(&self) -> Tag {
        self.tag.tag()
    }

    /// Whether a cached value exists and is still valid.
    #[must_use]
    pub fn is_fresh(&self) -> bool {
        self.cache
            .borrow()
            .as_ref()
            .is_some_and(|cached| self.tag.tag().validate(cached.snapshot))
    }

    pub(crate) fn value(&self) -> Result<Value> {
        let tracker = self.env.tracker();
        if self.evaluating.get() {
            let reference = self.describe();
            tracing::warn!(message = "reference.cycle", reference = %reference);
            return Err(ReferenceError::CyclicDependency { reference });
        }

        if let Some(value) = self.cached_value() {
            tracker.consume(&self.tag.tag());
            return Ok(value);
        }

        let value = {
            let _evaluating = EvaluatingGuard::enter(&self.evaluating);
            self.recompute(tracker)?
        };
        tracker.consume(&self.tag.tag());
        Ok(value)
    }

    fn cached_value(&self) -> Option<Value> {
        let cache = self.cache.borrow();
        let cached = cache.as_ref()?;
        self.tag
            .tag()
            .validate(cached.snapshot)
            .then(|| cached.value.clone())
    }

    fn recompute(&self, tracker: &Tracker) -> Result<Value> {
        let frame = tracker.begin_frame(Rc::clone(&self.label))?;
        let result = self.compute(tracker);
        let combined = frame.finish();

        let value = match result {
            Ok(value) => value,
            Err(err) => {
                self.cache.borrow_mut().take();
                return Err(err);
            }
        };

        self.tag.update(combined);
        let snapshot = self.tag.revision();
        tracing::trace!(
            message = "helper.recompute",
            helper = self.helper.debug_name(),
            reference = self.id.raw(),
            revision = snapshot.raw()
        );
        *self.cache.borrow_mut() = Some(Cached {
            value: value.clone(),
            snapshot,
        });
        Ok(value)
    }

    fn compute(&self, tracker: &Tracker) -> Result<Value> {
        let positional = self.args.positional.value()?;
        let named = self.args.named.value()?;
        let value = self.invoke(tracker, &positional, &named)?;
        if let Some(tag) = self.helper.recompute_tag() {
            tracker.consume(&tag);
        }
        Ok(value)
    }

    #[cfg(any(debug_assertions, feature = "debug-checks"))]
    fn invoke(&self, tracker: &Tracker, positional: &[Value], named: &NamedValues) -> Result<Value> {
        use crate::value::mutation_fingerprint;
        use trellis_validator::Diagnostic;

        let before = mutation_fingerprint(positional.iter().chain(named.values()));
        let result = tracker.deprecate_mutations(|| self.helper.compute(positional, named));
        let after = mutation_fingerprint(positional.iter().chain(named.values()));
        if before != after {
            tracing::debug!(
                message = "helper.argument_mutation",
                helper = self.helper.debug_name(),
                reference = self.id.raw()
            );
            tracker.report(&Diagnostic::argument_mutation(
                self.helper.debug_name(),
                Some(&*self.label),
            ));
        }
        Ok(result?)
    }

    #[cfg(not(any(debug_assertions, feature = "debug-checks")))]
    #[inline]
    fn invoke(&self, _tracker: &Tracker, positional: &[Value], named: &NamedValues) -> Result<Value> {
        Ok(self.helper.compute(positional, named)?)
    }

    pub(crate) fn get(self: &Rc<Self>, key: &str) -> Reference {
        let parent = Reference::Helper(Rc::clone(self));
        self.children
            .get_or_insert_with(key, || PropertyReference::child(&self.env, parent, key))
    }

    fn describe(&self) -> String {
        self.env
            .template_path(self.id)
            .map_or_else(|| format!("helper reference {}", self.id), |path| format!("`{path}`"))
    }
}

impl fmt::Debug for HelperInvocationReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HelperInvocationReference")
            .field("id", &self.id)
            .field("helper", &self.helper)
            .field("args", &self.args)
            .field("fresh", &self.is_fresh())
            .finish()
    }
}

impl Drop for HelperInvocationReference {
    fn drop(&mut self) {
        self.env.clear_template_path_debug_context(self.id);
    }
}

struct EvaluatingGuard<'a> {
    flag: &'a Cell<bool>,
}

impl<'a> EvaluatingGuard<'a> {
    fn enter(flag: &'a Cell<bool>) -> Self {
        flag.set(true);
        Self { flag }
    }
}

impl Drop for EvaluatingGuard<'_> {
    fn drop(&mut self) {
        self.flag.set(false);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::helper::HelperError;

    fn counting_helper(calls: Rc<Cell<u32>>) -> Helper {
        Helper::simple("count", move |positional, _| {
            calls.set(calls.get() + 1);
            Ok(Value::from(positional.len()))
        })
    }

    #[test]
    fn value_is_memoized_until_arguments_change() {
        let env = Environment::default();
        let calls = Rc::new(Cell::new(0));
        let input = Reference::updatable(&env, "a");
        let reference = Reference::helper(
            &env,
            counting_helper(calls.clone()),
            CapturedArguments::positional([input.clone()]),
        );

        reference.value().unwrap();
        reference.value().unwrap();
        assert_eq!(calls.get(), 1);

        input.update("b").unwrap();
        reference.value().unwrap();
        assert_eq!(calls.get(), 2);
    }

    #[test]
    fn constant_arguments_compute_once() {
        let env = Environment::default();
        let calls = Rc::new(Cell::new(0));
        let reference = Reference::helper(
            &env,
            counting_helper(calls.clone()),
            CapturedArguments::positional([Reference::unbound(&env, 1)]),
        );
        for _ in 0..5 {
            assert_eq!(reference.value().unwrap(), Value::from(1));
        }
        assert_eq!(calls.get(), 1);
        assert!(reference.tag().validate(reference.tag().revision()));
    }

    #[test]
    fn errors_are_not_cached() {
        let env = Environment::default();
        let fail = Rc::new(Cell::new(true));
        let flag = fail.clone();
        let reference = Reference::helper(
            &env,
            Helper::simple("flaky", move |_, _| {
                if flag.get() {
                    Err(HelperError::msg("not yet"))
                } else {
                    Ok(Value::from("ok"))
                }
            }),
            CapturedArguments::default(),
        );

        let err = reference.value().unwrap_err();
        assert_eq!(err.to_string(), "not yet");
        fail.set(false);
        assert_eq!(reference.value().unwrap(), Value::from("ok"));
    }

    #[test]
    fn frame_stack_balanced_after_error() {
        let env = Environment::default();
        let reference = Reference::helper(
            &env,
            Helper::simple("fail", |_, _| Err(HelperError::msg("boom"))),
            CapturedArguments::default(),
        );
        assert!(reference.value().is_err());
        assert_eq!(env.tracker().depth(), 0);
        let Reference::Helper(inner) = &reference else {
            panic!("expected helper reference");
        };
        assert!(!inner.is_fresh());
    }
}
