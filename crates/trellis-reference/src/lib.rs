#![forbid(unsafe_code)]

//! Lazy, dependency-tracked references.
//!
//! A [`Reference`] produces a [`Value`] on demand and exposes a validity
//! [`Tag`](trellis_validator::Tag) covering everything the value depends on.
//! Consumers pull values, keep a revision snapshot of the tag, and later ask
//! the tag whether the snapshot still holds instead of being pushed updates.
//!
//! Kinds:
//!
//! - unbound: a fixed value with a constant tag;
//! - updatable: a reactive root, invalidated by [`Reference::update`];
//! - property: `parent[key]` over a reactive parent;
//! - readonly: an alias of another reference that refuses writes;
//! - helper: a memoized helper call over [`CapturedArguments`].
//!
//! # Example
//!
//! ```
//! use trellis_reference::{CapturedArguments, Environment, Reference, Value, builtins};
//!
//! let env = Environment::default();
//! let first = Reference::updatable(&env, "a");
//! let greeting = Reference::helper(
//!     &env,
//!     builtins::concat(),
//!     CapturedArguments::positional([first.clone(), Reference::unbound(&env, "b")]),
//! );
//!
//! assert_eq!(greeting.value().unwrap(), Value::from("ab"));
//! let snapshot = greeting.tag().revision();
//!
//! first.update("x").unwrap();
//! assert!(!greeting.tag().validate(snapshot));
//! assert_eq!(greeting.value().unwrap(), Value::from("xb"));
//! ```

mod children;

pub mod args;
pub mod builtins;
pub mod environment;
pub mod error;
pub mod helper;
pub mod invocation;
pub mod primitive;
pub mod property;
pub mod readonly;
pub mod reference;
pub mod unbound;
pub mod updatable;
pub mod value;

pub use args::{CapturedArguments, NamedArguments, NamedValues, PositionalArguments};
pub use environment::{Environment, EnvironmentConfig, ReferenceId};
pub use error::{ReferenceError, Result};
pub use helper::{
    Helper, HelperError, HelperInstance, HelperResult, MessageError, RecomputeTag, SimpleHelper,
};
pub use invocation::HelperInvocationReference;
pub use primitive::PrimitiveReference;
pub use property::PropertyReference;
pub use readonly::ReadonlyReference;
pub use reference::{Reference, ReferenceKind, reference_from_parts};
pub use unbound::UnboundReference;
pub use updatable::UpdatableReference;
pub use value::{List, Object, Value};
