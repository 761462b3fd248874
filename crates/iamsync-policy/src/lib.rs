//! # iamsync Policy Diff Engine
//!
//! Pure functions over an in-memory [`PolicyDocument`]. Nothing here performs
//! I/O or suspends; every call receives its own document and is safe to run
//! from any number of reconcilers at once.
//!
//! - [`bind`] / [`unbind`] mutate a document toward a desired binding and
//!   report whether anything changed
//! - [`is_up_to_date`] is the convergence check, rejecting structurally
//!   malformed documents instead of guessing
//! - [`is_empty`] separates "no policy attached" from "policy without our role"
//!
//! ```rust
//! use iamsync_policy::{bind, is_up_to_date};
//! use iamsync_types::{DesiredBindingSpec, PolicyDocument};
//!
//! let spec = DesiredBindingSpec::present("roles/storage.objectViewer", "allUsers");
//! let mut doc = PolicyDocument::new();
//!
//! assert!(bind(&spec, &mut doc));
//! assert!(!bind(&spec, &mut doc));
//! assert!(is_up_to_date(&spec, &doc).unwrap());
//! ```

#![deny(unsafe_code)]
#![cfg_attr(feature = "strict-docs", warn(missing_docs))]
#![cfg_attr(not(feature = "strict-docs"), allow(missing_docs))]

pub mod check;
pub mod diff;
pub mod error;

pub use check::{is_empty, is_up_to_date, validate_document};
pub use diff::{apply, apply_at, bind, bind_at, unbind};
pub use error::{Result, StructuralPolicyError};

#[doc(no_inline)]
pub use iamsync_types::PolicyDocument;
