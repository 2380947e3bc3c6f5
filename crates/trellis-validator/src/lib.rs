#![forbid(unsafe_code)]

//! Validity tags and tracked transactions.
//!
//! This crate provides the change-tracking primitive the reference graph is
//! built on:
//!
//! - [`Tag`]: an opaque, cheaply clonable validity token. Its
//!   [`revision`](Tag::revision) only ever moves forward.
//! - [`Tracker`]: the explicit tracking context. It owns the revision clock
//!   and the stack of open [`TrackFrame`]s that record every tag read during
//!   a computation.
//! - [`Diagnostic`] / [`DiagnosticsSink`]: side channel for debug-build
//!   warnings such as dirtying a tag that the current computation already
//!   read.
//!
//! # Invariants
//!
//! 1. A tag's revision never decreases.
//! 2. The combined tag returned by a frame has a revision at least as high as
//!    every tag consumed inside it.
//! 3. Closing a frame bubbles its combined tag into the enclosing frame, so
//!    tracking composes through any call depth.
//! 4. Diagnostics never change control flow or returned values.
//!
//! # Example
//!
//! ```
//! use trellis_validator::{DirtyableTag, Tracker};
//!
//! let tracker = Tracker::default();
//! let source = DirtyableTag::new(&tracker);
//!
//! let ((), combined) = tracker
//!     .track("example", || tracker.consume(&source.tag()))
//!     .unwrap();
//! let snapshot = combined.revision();
//! assert!(combined.validate(snapshot));
//!
//! source.dirty();
//! assert!(!combined.validate(snapshot));
//! ```

pub mod diagnostics;
pub mod error;
pub mod revision;
pub mod tag;
pub mod tracker;

pub use diagnostics::{
    Diagnostic, DiagnosticKind, DiagnosticsSink, RecordingSink, Severity, TracingSink,
};
pub use error::{Result, TrackingError};
pub use revision::Revision;
pub use tag::{DirtyableTag, Tag, UpdatableTag, combine};
pub use tracker::{TrackFrame, Tracker, TrackerConfig};

/// Whether debug-only checks are compiled into this build.
pub const DEBUG_CHECKS: bool = cfg!(any(debug_assertions, feature = "debug-checks"));
