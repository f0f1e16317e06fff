//! # sage-config
//!
//! Workflow configuration resolution for the Sage engine.
//!
//! A request's behavior is determined by configuration, not code:
//!
//! 1. A [`Scope`](records::Scope) matches the request's
//!    (service variant, course, location) and names a
//!    [`Profile`](records::Profile).
//! 2. The profile points at an immutable base template and carries an
//!    RFC-7386 merge-patch override.
//! 3. The [`ConfigResolver`](resolver::ConfigResolver) loads the template,
//!    applies the patch, and validates the effective document against the
//!    workflow schema.
//!
//! Templates are authored outside this system and read-only here; effective
//! configurations are derived, never stored.

#![deny(unsafe_code)]

pub mod errors;
pub mod matcher;
pub mod merge;
pub mod records;
pub mod resolver;
pub mod schema;
pub mod templates;

pub use errors::{ResolveError, TemplateError};
pub use matcher::match_scope;
pub use merge::merge_patch;
pub use records::{Profile, Scope, ServiceVariant, WorkflowCatalog};
pub use resolver::{ConfigResolver, EffectiveConfig};
pub use schema::{Validation, validate_effective};
pub use templates::TemplateRoots;
