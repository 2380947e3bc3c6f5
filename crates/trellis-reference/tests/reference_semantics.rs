#![forbid(unsafe_code)]

//! Behavioral tests for the reference kinds and helper invocation.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use trellis_reference::{
    CapturedArguments, Environment, EnvironmentConfig, Helper, HelperInstance,
    HelperResult, List, NamedArguments, NamedValues, Object, PositionalArguments, RecomputeTag,
    Reference, ReferenceError, ReferenceKind, Value, builtins, reference_from_parts,
};
use trellis_validator::{Tracker, TrackingError};

fn jill(env: &Environment) -> Reference {
    let value: Object = [("name", "Jill")].into_iter().collect();
    Reference::unbound(env, value)
}

// ---------------------------------------------------------------------------
// Unbound
// ---------------------------------------------------------------------------

#[test]
fn unbound_property_access() {
    let env = Environment::default();
    let root = jill(&env);

    assert_eq!(root.get("name").value().unwrap(), Value::from("Jill"));
    assert!(root.get("missing").value().unwrap().is_undefined());
    assert!(root.get("missing").get("deeper").value().unwrap().is_undefined());
}

#[test]
fn unbound_value_is_never_reread() {
    let env = Environment::default();
    let object: Object = [("n", 1)].into_iter().collect();
    let root = Reference::unbound(&env, object.clone());
    let n = root.get("n");

    assert_eq!(n.value().unwrap(), Value::from(1));
    object.insert("n", 2);
    // The child captured the value when it was created.
    assert_eq!(n.value().unwrap(), Value::from(1));
    assert!(n.tag().is_constant());
}

#[test]
fn repeated_unbound_get_depends_on_child_memoization() {
    let memoized = Environment::default();
    let object: Object = [("n", 1)].into_iter().collect();
    let root = Reference::unbound(&memoized, object.clone());
    let first = root.get("n");
    object.insert("n", 2);
    assert!(root.get("n").same(&first));
    assert_eq!(root.get("n").value().unwrap(), Value::from(1));

    let fresh = Environment::new(EnvironmentConfig::default().with_memoize_children(false));
    let object: Object = [("n", 1)].into_iter().collect();
    let root = Reference::unbound(&fresh, object.clone());
    assert_eq!(root.get("n").value().unwrap(), Value::from(1));
    object.insert("n", 2);
    assert_eq!(root.get("n").value().unwrap(), Value::from(2));
}

#[test]
fn unbound_reads_do_not_track() {
    let env = Environment::default();
    let root = jill(&env);
    let tracker: &Tracker = env.tracker();

    let (value, tag) = tracker
        .track("render", || root.get("name").value())
        .unwrap();
    assert_eq!(value.unwrap(), Value::from("Jill"));
    assert!(tag.is_constant());
}

// ---------------------------------------------------------------------------
// Readonly
// ---------------------------------------------------------------------------

#[test]
fn readonly_tag_is_aliased() {
    let env = Environment::default();
    let this = Reference::updatable(&env, 1);
    let view = Reference::readonly(&this);

    assert!(view.tag().same(&this.tag()));
    assert_eq!(view.tag(), this.tag());

    let snapshot = view.tag().revision();
    this.update(2).unwrap();
    assert!(!view.tag().validate(snapshot));
    assert_eq!(view.value().unwrap(), Value::from(2));
}

#[test]
fn readonly_is_shallow() {
    let env = Environment::default();
    let this = Reference::updatable(&env, Value::from(Object::new()));
    let view = Reference::readonly(&this);

    let child = view.get("count");
    assert_eq!(child.kind(), ReferenceKind::Property);
    assert!(child.same(&this.get("count")));
    assert!(matches!(
        child.update(3),
        Err(ReferenceError::NotUpdatable {
            kind: ReferenceKind::Property,
            ..
        })
    ));
}

#[test]
fn readonly_write_is_rejected() {
    let env = Environment::default();
    let view = Reference::readonly(&Reference::updatable(&env, 1));
    let err = view.update(5).unwrap_err();
    assert!(matches!(err, ReferenceError::ReadonlyWrite { .. }));
    assert!(err.to_string().contains("read-only"));
    assert_eq!(view.value().unwrap(), Value::from(1));
}

// ---------------------------------------------------------------------------
// Updatable and property chains
// ---------------------------------------------------------------------------

#[test]
fn property_chain_follows_updatable_root() {
    let env = Environment::default();
    let first: Object = [("name", "Jill")].into_iter().collect();
    let this = Reference::updatable(&env, first);
    let name = this.path("name");

    let (value, tag) = env.tracker().track("render", || name.value()).unwrap();
    assert_eq!(value.unwrap(), Value::from("Jill"));
    let snapshot = tag.revision();

    let second: Object = [("name", "Jack")].into_iter().collect();
    this.update(second).unwrap();
    assert!(!tag.validate(snapshot));
    assert_eq!(name.value().unwrap(), Value::from("Jack"));
}

#[test]
fn setting_equal_value_keeps_tag_valid() {
    let env = Environment::default();
    let this = Reference::updatable(&env, "same");
    let snapshot = this.tag().revision();
    this.update("same").unwrap();
    assert!(this.tag().validate(snapshot));
}

#[test]
fn in_place_mutation_needs_notify() {
    let env = Environment::default();
    let object = Object::new();
    let Reference::Updatable(root) = Reference::updatable(&env, object.clone()) else {
        panic!("expected updatable reference");
    };
    let snapshot = root.tag().revision();

    object.insert("k", 1);
    assert!(root.tag().validate(snapshot));
    root.notify();
    assert!(!root.tag().validate(snapshot));
}

#[test]
fn chain_resolution_matches_iterative_get() {
    let env = Environment::default();
    let inner: Object = [("c", 42)].into_iter().collect();
    let middle: Object = [("b", Value::from(inner))].into_iter().collect();
    let outer: Object = [("a", Value::from(middle))].into_iter().collect();

    for root in [
        Reference::unbound(&env, outer.clone()),
        Reference::updatable(&env, outer),
    ] {
        let iterative = root.get("a").get("b").get("c");
        let chained = reference_from_parts(&root, ["a", "b", "c"]);
        assert!(chained.same(&iterative));
        assert_eq!(chained.value().unwrap(), Value::from(42));
    }
}

#[test]
fn list_paths() {
    let env = Environment::default();
    let items = List::from_vec(vec![Value::from("x"), Value::from("y")]);
    let root = Reference::unbound(&env, items);
    assert_eq!(root.path("1").value().unwrap(), Value::from("y"));
    assert_eq!(root.path("length").value().unwrap(), Value::from(2));
    assert!(root.path("7").value().unwrap().is_undefined());
}

// ---------------------------------------------------------------------------
// Helper invocation
// ---------------------------------------------------------------------------

#[test]
fn concat_helper_and_readonly_read_through() {
    let env = Environment::default();
    let args = CapturedArguments::positional([
        Reference::unbound(&env, "a"),
        Reference::unbound(&env, "b"),
    ]);
    let reference = Reference::helper(&env, builtins::concat(), args);
    assert_eq!(reference.value().unwrap(), Value::from("ab"));

    let view = Reference::readonly(&reference);
    assert_eq!(view.value().unwrap(), Value::from("ab"));
    assert!(view.tag().same(&reference.tag()));
}

#[test]
fn helper_receives_named_arguments() {
    let env = Environment::default();
    let named = NamedArguments::new([
        ("greeting", Reference::unbound(&env, "hi")),
        ("name", Reference::updatable(&env, "Jill")),
    ])
    .unwrap();
    let helper = Helper::simple("greet", |_, named: &NamedValues| {
        Ok(Value::str(format!(
            "{}, {}",
            named.get_or_undefined("greeting"),
            named.get_or_undefined("name")
        )))
    });
    let reference = Reference::helper(
        &env,
        helper,
        CapturedArguments::new(PositionalArguments::default(), named),
    );
    assert_eq!(reference.value().unwrap(), Value::from("hi, Jill"));
}

#[test]
fn helper_children_are_properties() {
    let env = Environment::default();
    let helper = Helper::simple("user", |_, _| {
        let user: Object = [("name", "Jill")].into_iter().collect();
        Ok(Value::from(user))
    });
    let reference = Reference::helper(&env, helper, CapturedArguments::default());
    let name = reference.get("name");
    assert_eq!(name.kind(), ReferenceKind::Property);
    assert!(name.tag().same(&reference.tag()));
    assert_eq!(name.value().unwrap(), Value::from("Jill"));
}

#[test]
fn nested_helpers_bubble_dependencies() {
    let env = Environment::default();
    let source = Reference::updatable(&env, "a");
    let inner = Reference::helper(
        &env,
        builtins::concat(),
        CapturedArguments::positional([source.clone(), Reference::unbound(&env, "!")]),
    );
    let outer = Reference::helper(
        &env,
        builtins::concat(),
        CapturedArguments::positional([Reference::unbound(&env, "<"), inner]),
    );

    assert_eq!(outer.value().unwrap(), Value::from("<a!"));
    let snapshot = outer.tag().revision();
    source.update("b").unwrap();
    assert!(!outer.tag().validate(snapshot));
    assert_eq!(outer.value().unwrap(), Value::from("<b!"));
}

struct Clock {
    now: Cell<u64>,
    tag: RecomputeTag,
}

impl Clock {
    fn tick(&self) {
        self.now.set(self.now.get() + 1);
        self.tag.recompute();
    }
}

impl HelperInstance for Clock {
    fn compute(&self, _positional: &[Value], _named: &NamedValues) -> HelperResult {
        Ok(Value::str(format!("tick {}", self.now.get())))
    }

    fn recompute_tag(&self) -> Option<trellis_validator::Tag> {
        Some(self.tag.tag())
    }

    fn debug_name(&self) -> &str {
        "clock"
    }
}

#[test]
fn recompute_tag_invalidates_without_argument_changes() {
    let env = Environment::default();
    let clock = Rc::new(Clock {
        now: Cell::new(0),
        tag: RecomputeTag::new(&env),
    });
    let instance: Rc<dyn HelperInstance> = clock.clone();
    let reference = Reference::helper(&env, Helper::Instance(instance), CapturedArguments::default());

    assert_eq!(reference.value().unwrap(), Value::from("tick 0"));
    let before = reference.tag();
    let snapshot = before.revision();
    assert_eq!(reference.value().unwrap(), Value::from("tick 0"));
    assert!(before.validate(snapshot));

    clock.tick();
    let after = reference.tag();
    assert!(after.same(&before));
    assert!(after.revision() > snapshot);
    assert!(!after.validate(snapshot));
    assert_eq!(reference.value().unwrap(), Value::from("tick 1"));
}

#[derive(Debug)]
struct ParseFailure {
    input: String,
}

impl fmt::Display for ParseFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "cannot parse {:?}", self.input)
    }
}

impl std::error::Error for ParseFailure {}

#[test]
fn helper_errors_propagate_unchanged() {
    let env = Environment::default();
    let helper = Helper::simple("parse", |positional, _| {
        let text = positional.first().cloned().unwrap_or_default().to_string();
        let number: f64 = text.parse().map_err(|_| ParseFailure { input: text.clone() })?;
        Ok(Value::from(number))
    });
    let reference = Reference::helper(
        &env,
        helper,
        CapturedArguments::positional([Reference::unbound(&env, "nope")]),
    );

    let err = reference.value().unwrap_err();
    let original = err
        .helper_error()
        .and_then(|e| e.downcast_ref::<ParseFailure>())
        .expect("original helper error");
    assert_eq!(original.input, "nope");
    assert_eq!(err.to_string(), "cannot parse \"nope\"");
    assert_eq!(env.tracker().depth(), 0);
}

// ---------------------------------------------------------------------------
// Cycles and depth
// ---------------------------------------------------------------------------

fn reads_slot(name: &str, slot: Rc<RefCell<Option<Reference>>>) -> Helper {
    Helper::simple(name, move |_, _| {
        let target = slot.borrow().clone();
        match target {
            Some(reference) => Ok(reference.value()?),
            None => Ok(Value::Undefined),
        }
    })
}

#[test]
fn self_evaluation_is_a_cyclic_dependency() {
    let env = Environment::default();
    let slot: Rc<RefCell<Option<Reference>>> = Rc::default();
    let reference = Reference::helper(&env, reads_slot("me", slot.clone()), CapturedArguments::default());
    *slot.borrow_mut() = Some(reference.clone());

    let err = reference.value().unwrap_err();
    assert!(matches!(err, ReferenceError::CyclicDependency { .. }));
    assert!(err.is_cyclic_dependency());
    assert_eq!(env.tracker().depth(), 0);

    // The reference is usable again once the cycle is broken.
    slot.borrow_mut().take();
    assert!(reference.value().unwrap().is_undefined());
}

#[test]
fn indirect_cycle_is_detected() {
    let env = Environment::default();
    let slot: Rc<RefCell<Option<Reference>>> = Rc::default();
    let first = Reference::helper(&env, reads_slot("first", slot.clone()), CapturedArguments::default());
    let second = Reference::helper(
        &env,
        builtins::concat(),
        CapturedArguments::positional([first.clone()]),
    );
    *slot.borrow_mut() = Some(second.clone());

    let err = second.value().unwrap_err();
    assert!(err.is_cyclic_dependency());
    assert_eq!(env.tracker().depth(), 0);
    slot.borrow_mut().take();
}

#[test]
fn nesting_beyond_max_depth_fails() {
    let env = Environment::new(EnvironmentConfig::default().with_max_depth(2));
    let mut reference = Reference::unbound(&env, "x");
    for _ in 0..3 {
        reference = Reference::helper(
            &env,
            builtins::concat(),
            CapturedArguments::positional([reference]),
        );
    }

    let err = reference.value().unwrap_err();
    assert!(matches!(
        err,
        ReferenceError::Tracking(TrackingError::DepthExceeded { limit: 2, .. })
    ));
    assert_eq!(env.tracker().depth(), 0);
}

// ---------------------------------------------------------------------------
// Debug diagnostics
// ---------------------------------------------------------------------------

#[cfg(any(debug_assertions, feature = "debug-checks"))]
mod diagnostics {
    use super::*;
    use trellis_validator::{DiagnosticKind, RecordingSink, Severity};

    fn recording_env() -> (Environment, Rc<RecordingSink>) {
        let sink = Rc::new(RecordingSink::default());
        let env = Environment::with_sink(EnvironmentConfig::default(), sink.clone());
        (env, sink)
    }

    #[test]
    fn argument_mutation_is_reported() {
        let (env, sink) = recording_env();
        let items = List::from_vec(vec![Value::from(1)]);
        let helper = Helper::simple("push", |positional, _| {
            if let Some(list) = positional.first().and_then(Value::as_list) {
                list.push(2);
            }
            Ok(Value::from("done"))
        });
        let reference = Reference::helper(
            &env,
            helper,
            CapturedArguments::positional([Reference::unbound(&env, items.clone())]),
        );

        assert_eq!(reference.value().unwrap(), Value::from("done"));
        let diagnostics = sink.take();
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].kind, DiagnosticKind::ArgumentMutation);
        assert_eq!(diagnostics[0].severity, Severity::Deprecation);
        assert_eq!(diagnostics[0].frame.as_deref(), Some("(push)"));
        assert_eq!(items.len(), 2);
    }

    #[test]
    fn pure_helpers_report_nothing() {
        let (env, sink) = recording_env();
        let object: Object = [("a", 1)].into_iter().collect();
        let reference = Reference::helper(
            &env,
            builtins::concat(),
            CapturedArguments::positional([Reference::unbound(&env, object)]),
        );
        reference.value().unwrap();
        assert!(sink.is_empty());
    }

    #[test]
    fn mutation_after_read_inside_helper_is_a_deprecation() {
        let (env, sink) = recording_env();
        let counter = Reference::updatable(&env, 0);
        let source = counter.clone();
        let helper = Helper::simple("bump", move |_, _| {
            let current = source.value()?.as_f64().unwrap_or_default();
            source.update(current + 1.0)?;
            Ok(Value::from(current))
        });
        let reference = Reference::helper(&env, helper, CapturedArguments::default());

        assert_eq!(reference.value().unwrap(), Value::from(0));
        let diagnostics = sink.take();
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].kind, DiagnosticKind::MutationAfterConsumption);
        assert_eq!(diagnostics[0].severity, Severity::Deprecation);
        assert_eq!(counter.value().unwrap(), Value::from(1));
    }

    #[test]
    fn updating_an_argument_read_by_a_helper_during_render_is_reported() {
        for arity in [1usize, 2, 3] {
            let (env, sink) = recording_env();
            let inputs: Vec<Reference> =
                (0..arity).map(|_| Reference::updatable(&env, "a")).collect();
            let reference = Reference::helper(
                &env,
                builtins::concat(),
                CapturedArguments::positional(inputs.clone()),
            );

            env.tracker()
                .track("render", || {
                    reference.value().unwrap();
                    inputs[0].update("b").unwrap();
                })
                .unwrap();

            let diagnostics = sink.take();
            assert_eq!(diagnostics.len(), 1, "arity {arity}");
            assert_eq!(diagnostics[0].kind, DiagnosticKind::MutationAfterConsumption);
            assert_eq!(diagnostics[0].severity, Severity::Assertion);
            assert_eq!(diagnostics[0].frame.as_deref(), Some("render"));
        }
    }

    #[test]
    fn template_paths_name_references() {
        let env = Environment::default();
        let root = jill(&env);
        assert_eq!(root.get("name").debug_path().as_deref(), Some("this.name"));

        let reference = Reference::helper(&env, builtins::concat(), CapturedArguments::default());
        assert_eq!(reference.get("length").debug_path().as_deref(), Some("(concat).length"));
    }
}

#[cfg(feature = "json")]
#[test]
fn json_values_resolve_through_paths() {
    let env = Environment::default();
    let json = serde_json::json!({"user": {"tags": ["a", "b"]}});
    let root = Reference::unbound(&env, Value::from(json));
    assert_eq!(root.path("user.tags.1").value().unwrap(), Value::from("b"));
}
