//! iamsync Types - Core types for IAM policy reconciliation
//!
//! A remote resource (for example a storage bucket) carries a single IAM
//! policy document: a version marker plus a list of role bindings. iamsync
//! reconciles one declared role/member binding against that document.
//!
//! ## Key Concepts
//!
//! - **PolicyDocument**: The full remote access-control state, transferred
//!   as a unit (reads and writes always move the whole document)
//! - **Binding**: A role and the ordered set of members holding it
//! - **DesiredBindingSpec**: The declared intent for one role/member pair
//! - **ResourceId**: Name of the remote resource owning the policy

#![deny(unsafe_code)]
#![cfg_attr(feature = "strict-docs", warn(missing_docs))]
#![cfg_attr(not(feature = "strict-docs"), allow(missing_docs))]

pub mod ids;
pub mod policy;
pub mod spec;

pub use ids::{ResourceId, ResourceIdError};
pub use policy::{Binding, BindingCondition, PolicyDocument, POLICY_VERSION};
pub use spec::{DesiredBindingSpec, Ensure, SpecValidationError};
