#![forbid(unsafe_code)]

//! Trellis public facade crate.
//!
//! Re-exports the tag primitive and the reference graph. Most users only
//! need the [`prelude`].
//!
//! ```
//! use trellis::prelude::*;
//!
//! let env = Environment::default();
//! let user = Reference::updatable(&env, Value::from(Object::new()));
//! let name = user.path("name");
//! assert!(name.value().unwrap().is_undefined());
//! ```

pub use trellis_reference as reference;
pub use trellis_validator as validator;

pub mod prelude {
    pub use trellis_reference::{
        CapturedArguments, Environment, EnvironmentConfig, Helper, HelperError, HelperInstance,
        HelperResult, List, NamedArguments, NamedValues, Object, PositionalArguments,
        RecomputeTag, Reference, ReferenceError, ReferenceKind, Value, builtins,
        reference_from_parts,
    };
    pub use trellis_validator::{Revision, Tag, Tracker, TrackerConfig};
}
