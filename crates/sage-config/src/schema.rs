//! Effective-configuration schema validation.
//!
//! Validation never panics and never short-circuits: the caller always gets
//! the complete list of violations, each naming the offending path.

use serde_json::Value;

/// Characters allowed in an orchestrator class name.
fn is_identifier_safe(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.')
}

/// Outcome of validating an effective configuration.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Validation {
    /// Whether the document satisfies the workflow schema.
    pub ok: bool,
    /// Human-readable violations, one per problem, each naming the path.
    pub errors: Vec<String>,
}

impl Validation {
    fn from_errors(errors: Vec<String>) -> Self {
        Self {
            ok: errors.is_empty(),
            errors,
        }
    }
}

/// Validate an effective configuration document.
///
/// `None` (the template was missing or unparsable, so no effective document
/// exists) fails with a single descriptive error rather than crashing the
/// caller.
#[must_use]
pub fn validate_effective(effective: Option<&Value>) -> Validation {
    let Some(doc) = effective.filter(|v| !v.is_null()) else {
        return Validation::from_errors(vec![
            "effective configuration is null (template missing or unparsable)".to_string(),
        ]);
    };

    let Some(root) = doc.as_object() else {
        return Validation::from_errors(vec![
            "effective configuration must be a JSON object".to_string(),
        ]);
    };

    let mut errors = Vec::new();

    // orchestrator_class: required, identifier-safe string.
    match root.get("orchestrator_class") {
        None => errors.push("orchestrator_class: required field is missing".to_string()),
        Some(Value::String(name)) if is_identifier_safe(name) => {}
        Some(Value::String(name)) if name.is_empty() => {
            errors.push("orchestrator_class: must not be empty".to_string());
        }
        Some(Value::String(name)) => errors.push(format!(
            "orchestrator_class: '{name}' contains characters outside [A-Za-z0-9_.]"
        )),
        Some(_) => errors.push("orchestrator_class: must be a string".to_string()),
    }

    // processor_config: required object with at least one entry, every
    // entry itself an object.
    match root.get("processor_config") {
        None => errors.push("processor_config: required field is missing".to_string()),
        Some(Value::Object(processors)) => {
            if processors.is_empty() {
                errors.push("processor_config: must contain at least one processor".to_string());
            }
            for (name, config) in processors {
                if !config.is_object() {
                    errors.push(format!("processor_config.{name}: must be an object"));
                }
            }
        }
        Some(_) => errors.push("processor_config: must be an object".to_string()),
    }

    // actuator_config: optional, but when provided it must carry
    // UIComponents.request and UIComponents.response as objects.
    if let Some(actuator) = root.get("actuator_config") {
        match actuator.as_object() {
            None => errors.push("actuator_config: must be an object".to_string()),
            Some(actuator_map) => match actuator_map.get("UIComponents") {
                None => errors
                    .push("actuator_config.UIComponents: required field is missing".to_string()),
                Some(Value::Object(components)) => {
                    for part in ["request", "response"] {
                        match components.get(part) {
                            None => errors.push(format!(
                                "actuator_config.UIComponents.{part}: required field is missing"
                            )),
                            Some(v) if !v.is_object() => errors.push(format!(
                                "actuator_config.UIComponents.{part}: must be an object"
                            )),
                            Some(_) => {}
                        }
                    }
                }
                Some(_) => {
                    errors.push("actuator_config.UIComponents: must be an object".to_string());
                }
            },
        }
    }

    Validation::from_errors(errors)
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn valid_doc() -> Value {
        json!({
            "orchestrator_class": "chat",
            "processor_config": {
                "chat": {"model": "gpt-4o-mini", "temperature": 0.3}
            },
            "actuator_config": {
                "UIComponents": {"request": {}, "response": {}}
            }
        })
    }

    #[test]
    fn valid_document_passes() {
        let result = validate_effective(Some(&valid_doc()));
        assert!(result.ok, "unexpected errors: {:?}", result.errors);
    }

    #[test]
    fn null_effective_yields_single_error() {
        let result = validate_effective(None);
        assert!(!result.ok);
        assert_eq!(result.errors.len(), 1);
        assert!(result.errors[0].contains("null"));

        let null = Value::Null;
        assert_eq!(validate_effective(Some(&null)), result);
    }

    #[test]
    fn all_violations_reported_together() {
        let doc = json!({
            "orchestrator_class": "bad name!",
            "processor_config": {"p": "not an object"}
        });
        let result = validate_effective(Some(&doc));
        assert!(!result.ok);
        assert_eq!(result.errors.len(), 2);
        assert!(result.errors[0].contains("orchestrator_class"));
        assert!(result.errors[1].contains("processor_config.p"));
    }

    #[test]
    fn missing_required_fields() {
        let result = validate_effective(Some(&json!({})));
        assert!(!result.ok);
        assert_eq!(result.errors.len(), 2);
    }

    #[test]
    fn empty_orchestrator_class_rejected() {
        let mut doc = valid_doc();
        doc["orchestrator_class"] = json!("");
        let result = validate_effective(Some(&doc));
        assert_eq!(result.errors, vec!["orchestrator_class: must not be empty"]);
    }

    #[test]
    fn dotted_class_name_accepted() {
        let mut doc = valid_doc();
        doc["orchestrator_class"] = json!("sage.orchestrators.ChatOrchestrator");
        assert!(validate_effective(Some(&doc)).ok);
    }

    #[test]
    fn empty_processor_config_rejected() {
        let mut doc = valid_doc();
        doc["processor_config"] = json!({});
        let result = validate_effective(Some(&doc));
        assert_eq!(
            result.errors,
            vec!["processor_config: must contain at least one processor"]
        );
    }

    #[test]
    fn actuator_config_optional_but_checked_when_present() {
        let mut doc = valid_doc();
        let obj = doc.as_object_mut().unwrap();
        let _ = obj.remove("actuator_config");
        assert!(validate_effective(Some(&doc)).ok);

        doc["actuator_config"] = json!({"UIComponents": {"request": {}}});
        let result = validate_effective(Some(&doc));
        assert_eq!(
            result.errors,
            vec!["actuator_config.UIComponents.response: required field is missing"]
        );
    }

    #[test]
    fn validation_is_deterministic() {
        let doc = json!({"orchestrator_class": 7, "processor_config": []});
        let a = validate_effective(Some(&doc));
        let b = validate_effective(Some(&doc));
        assert_eq!(a, b);
    }
}
