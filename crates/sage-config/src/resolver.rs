//! The [`ConfigResolver`]: template + patch → validated effective
//! configuration, with a keyed cache.
//!
//! Effective configurations are derived, never stored. The cache key covers
//! both the template path and the serialized patch, so editing a profile's
//! patch naturally misses the cache; template file edits require an explicit
//! [`ConfigResolver::invalidate`] (or [`ConfigResolver::clear_cache`]).

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::Value;
use tracing::debug;

use crate::errors::{ResolveError, TemplateError};
use crate::merge::merge_patch;
use crate::records::Profile;
use crate::schema::{Validation, validate_effective};
use crate::templates::TemplateRoots;

/// Read-only view over a validated effective configuration.
#[derive(Clone, Debug)]
pub struct EffectiveConfig(Arc<Value>);

impl EffectiveConfig {
    /// The orchestrator class name. Guaranteed present and identifier-safe
    /// by validation.
    #[must_use]
    pub fn orchestrator_class(&self) -> &str {
        self.0
            .get("orchestrator_class")
            .and_then(Value::as_str)
            .unwrap_or_default()
    }

    /// Configuration block for one named processor, if declared.
    #[must_use]
    pub fn processor(&self, name: &str) -> Option<&Value> {
        self.0.get("processor_config")?.get(name)
    }

    /// The `UIComponents` actuator block, if declared.
    #[must_use]
    pub fn ui_components(&self) -> Option<&Value> {
        self.0.get("actuator_config")?.get("UIComponents")
    }

    /// Declared schema version, if any.
    #[must_use]
    pub fn schema_version(&self) -> Option<&str> {
        self.0.get("schema_version").and_then(Value::as_str)
    }

    /// The whole document.
    #[must_use]
    pub fn document(&self) -> &Value {
        &self.0
    }
}

/// Outcome of a non-failing preview computation for operator diagnosis.
#[derive(Debug)]
pub struct EffectivePreview {
    /// The merged document, or `None` when the template could not be
    /// loaded or parsed.
    pub effective: Option<Value>,
    /// Validation outcome (validating `None` reports one error).
    pub validation: Validation,
}

type CacheKey = (String, String);

/// Resolves profiles into validated effective configurations.
pub struct ConfigResolver {
    roots: TemplateRoots,
    cache: Mutex<HashMap<CacheKey, Arc<Value>>>,
}

impl ConfigResolver {
    /// Create a resolver over the given template roots.
    pub fn new(roots: TemplateRoots) -> Self {
        Self {
            roots,
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// Resolve and validate a profile's effective configuration.
    ///
    /// Fails with the complete violation list if the merged document does
    /// not satisfy the schema; a broken profile is never executable.
    pub fn resolve_effective(&self, profile: &Profile) -> Result<EffectiveConfig, ResolveError> {
        let key = cache_key(profile);
        if let Some(cached) = self.cache.lock().get(&key) {
            return Ok(EffectiveConfig(Arc::clone(cached)));
        }

        let base = self.roots.load(&profile.base_filepath)?;
        let effective = merge_patch(&base, &profile.content_patch);
        let validation = validate_effective(Some(&effective));
        if !validation.ok {
            return Err(ResolveError::Invalid(validation.errors));
        }

        debug!(profile = %profile.slug, template = %profile.base_filepath, "effective configuration computed");
        let shared = Arc::new(effective);
        let _ = self.cache.lock().insert(key, Arc::clone(&shared));
        Ok(EffectiveConfig(shared))
    }

    /// Compute the effective document without failing, for preview and
    /// diagnosis of broken profiles.
    pub fn preview_effective(&self, profile: &Profile) -> EffectivePreview {
        let effective = match self.roots.load(&profile.base_filepath) {
            Ok(base) => Some(merge_patch(&base, &profile.content_patch)),
            Err(TemplateError::NotFound(_) | TemplateError::Invalid { .. }) => None,
            Err(e) => {
                debug!(profile = %profile.slug, error = %e, "preview template load failed");
                None
            }
        };
        let validation = validate_effective(effective.as_ref());
        EffectivePreview {
            effective,
            validation,
        }
    }

    /// Drop cached entries for one template path (call after the template
    /// file changes on disk).
    pub fn invalidate(&self, base_filepath: &str) {
        self.cache
            .lock()
            .retain(|(path, _), _| path != base_filepath);
    }

    /// Drop the whole cache.
    pub fn clear_cache(&self) {
        self.cache.lock().clear();
    }
}

fn cache_key(profile: &Profile) -> CacheKey {
    (
        profile.base_filepath.clone(),
        profile.content_patch.to_string(),
    )
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
