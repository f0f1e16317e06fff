//! Operator-facing configuration records: profiles, scopes, and the
//! in-memory catalog the matcher and resolver read from.
//!
//! Records are created and edited by operators outside the request path;
//! during resolution they are read-only.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Which physical deployment of the course content a request targets.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceVariant {
    /// The learner-facing deployment.
    #[default]
    Primary,
    /// The authoring/preview deployment of the same content.
    Authoring,
}

impl ServiceVariant {
    /// Wire string representation.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Primary => "primary",
            Self::Authoring => "authoring",
        }
    }
}

impl std::fmt::Display for ServiceVariant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A named override of a template.
///
/// `effective = merge_patch(load_template(base_filepath), content_patch)`
/// is derived, never stored. A profile whose effective configuration fails
/// validation is *broken*: usable for preview and diagnosis, never for
/// execution.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    /// Unique name.
    pub slug: String,
    /// Operator-facing description.
    #[serde(default)]
    pub description: String,
    /// Template path, relative to an allowed template root.
    pub base_filepath: String,
    /// RFC-7386 merge-patch applied over the template.
    #[serde(default = "empty_patch")]
    pub content_patch: Value,
}

fn empty_patch() -> Value {
    Value::Object(serde_json::Map::new())
}

/// A matching rule binding a profile to requests.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Scope {
    /// Stable identifier (sessions are keyed by it).
    pub id: String,
    /// Location pattern (regex, searched against the location id). `None`
    /// makes this a course-level or global default.
    pub location_regex: Option<String>,
    /// Course this scope applies to. `None` plus no pattern makes it the
    /// global default.
    pub course_id: Option<String>,
    /// Deployment variant this scope applies to.
    pub service_variant: ServiceVariant,
    /// Slug of the profile to execute.
    pub profile: String,
    /// Disabled scopes are invisible to resolution.
    pub enabled: bool,
}

/// In-memory catalog of profiles and scopes, assembled at startup by
/// whatever loads operator records.
#[derive(Clone, Debug, Default)]
pub struct WorkflowCatalog {
    profiles: HashMap<String, Profile>,
    scopes: Vec<Scope>,
}

impl WorkflowCatalog {
    /// Create an empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a profile.
    pub fn add_profile(&mut self, profile: Profile) {
        let _ = self.profiles.insert(profile.slug.clone(), profile);
    }

    /// Add a scope.
    pub fn add_scope(&mut self, scope: Scope) {
        self.scopes.push(scope);
    }

    /// Look up a profile by slug.
    #[must_use]
    pub fn profile(&self, slug: &str) -> Option<&Profile> {
        self.profiles.get(slug)
    }

    /// All scopes, in insertion order.
    #[must_use]
    pub fn scopes(&self) -> &[Scope] {
        &self.scopes
    }
}
