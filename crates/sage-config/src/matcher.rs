//! Three-tier scope resolution.
//!
//! Selection order for a (service variant, course, location) lookup:
//!
//! 1. Enabled scopes for the course whose `location_regex` matches the
//!    location id (regex *search*, not full match).
//! 2. The course-level default: an enabled scope for the course with no
//!    pattern.
//! 3. The global default: an enabled scope with no course and no pattern.
//!
//! A malformed pattern is skipped with a warning, never fatal. When several
//! patterned scopes match the same location, the longest pattern string
//! wins, with profile-slug order as the final tie-break — callers must not
//! rely on any ordering beyond that.

use regex::Regex;
use tracing::warn;

use crate::records::{Scope, ServiceVariant};

/// Find the single applicable scope for a lookup key, or `None` if nothing
/// is configured at any tier.
#[must_use]
pub fn match_scope<'a>(
    scopes: &'a [Scope],
    service_variant: ServiceVariant,
    course_id: &str,
    location_id: &str,
) -> Option<&'a Scope> {
    let enabled = || {
        scopes
            .iter()
            .filter(move |s| s.enabled && s.service_variant == service_variant)
    };

    // Tier 1: location-pattern scopes for this course.
    let mut pattern_matches: Vec<&Scope> = enabled()
        .filter(|s| s.course_id.as_deref() == Some(course_id))
        .filter(|s| {
            let Some(pattern) = s.location_regex.as_deref() else {
                return false;
            };
            match Regex::new(pattern) {
                Ok(re) => re.is_match(location_id),
                Err(e) => {
                    warn!(scope_id = %s.id, pattern, error = %e, "skipping malformed location pattern");
                    false
                }
            }
        })
        .collect();
    // Deterministic tie-break: longest pattern first, then slug order.
    pattern_matches.sort_by(|a, b| {
        let len_a = a.location_regex.as_deref().map_or(0, str::len);
        let len_b = b.location_regex.as_deref().map_or(0, str::len);
        len_b.cmp(&len_a).then_with(|| a.profile.cmp(&b.profile))
    });
    if let Some(best) = pattern_matches.first() {
        return Some(best);
    }

    // Tier 2: course-level default.
    let course_default = enabled()
        .filter(|s| s.course_id.as_deref() == Some(course_id) && s.location_regex.is_none())
        .min_by(|a, b| a.profile.cmp(&b.profile));
    if course_default.is_some() {
        return course_default;
    }

    // Tier 3: global default.
    enabled()
        .filter(|s| s.course_id.is_none() && s.location_regex.is_none())
        .min_by(|a, b| a.profile.cmp(&b.profile))
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
