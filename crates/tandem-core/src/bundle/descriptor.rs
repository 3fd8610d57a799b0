use serde_json::Value;

use super::types::{Bundle, BundleType};
use crate::error::ValidationError;

/// Array fields every descriptor must carry, in validation order.
const REQUIRED_ARRAYS: [&str; 5] = [
    "agents",
    "skills",
    "automations",
    "dashboardWidgets",
    "memoryCategories",
];

/// Validate a raw descriptor and turn it into a [`Bundle`].
///
/// Fields are checked in a fixed order (id, name, type, then the required
/// arrays) and the first failure is reported. Missing timestamps default to
/// the current time.
pub fn parse_descriptor(value: Value) -> Result<Bundle, ValidationError> {
    let obj = value
        .as_object()
        .ok_or_else(|| ValidationError::new("descriptor", "must be a JSON object"))?;

    for field in ["id", "name"] {
        require_non_empty_str(obj.get(field), field)?;
    }

    let type_str = require_non_empty_str(obj.get("type"), "type")?;
    if BundleType::from_str(type_str).is_none() {
        return Err(ValidationError::new(
            "type",
            format!("has unknown bundle type '{type_str}'"),
        ));
    }

    for field in REQUIRED_ARRAYS {
        match obj.get(field) {
            Some(Value::Array(_)) => {}
            Some(_) => return Err(ValidationError::new(field, "must be an array")),
            None => return Err(ValidationError::new(field, "is missing")),
        }
    }

    let mut value = value;
    if let Some(t) = value.get_mut("type") {
        // Descriptors may spell the type in any case; serde expects lowercase.
        let lowered = t.as_str().unwrap_or_default().to_lowercase();
        *t = Value::String(lowered);
    }

    serde_json::from_value(value).map_err(|e| ValidationError::new("descriptor", e.to_string()))
}

/// Validation for bundles built in code. The required arrays exist by
/// construction, so only the string fields need checking.
pub fn validate_bundle(bundle: &Bundle) -> Result<(), ValidationError> {
    if bundle.id.is_empty() {
        return Err(ValidationError::new("id", "must not be empty"));
    }
    if bundle.name.is_empty() {
        return Err(ValidationError::new("name", "must not be empty"));
    }
    Ok(())
}

fn require_non_empty_str<'a>(
    value: Option<&'a Value>,
    field: &str,
) -> Result<&'a str, ValidationError> {
    match value {
        None | Some(Value::Null) => Err(ValidationError::new(field, "is missing")),
        Some(Value::String(s)) if s.is_empty() => {
            Err(ValidationError::new(field, "must not be empty"))
        }
        Some(Value::String(s)) => Ok(s.as_str()),
        Some(_) => Err(ValidationError::new(field, "must be a string")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn minimal() -> Value {
        json!({
            "id": "research",
            "name": "Research Team",
            "type": "community",
            "agents": [{ "role": "researcher" }],
            "skills": ["web-search"],
            "automations": [],
            "dashboardWidgets": [],
            "memoryCategories": ["notes"]
        })
    }

    fn without(field: &str) -> Value {
        let mut v = minimal();
        v.as_object_mut().unwrap().remove(field);
        v
    }

    #[test]
    fn parses_minimal_descriptor() {
        let bundle = parse_descriptor(minimal()).unwrap();
        assert_eq!(bundle.id, "research");
        assert_eq!(bundle.bundle_type, BundleType::Community);
        assert_eq!(bundle.agents[0].role, "researcher");
        assert!(bundle.tags.is_empty());
        assert!(bundle.author.is_none());
    }

    #[test]
    fn missing_timestamps_default_to_now() {
        let before = chrono::Utc::now();
        let bundle = parse_descriptor(minimal()).unwrap();
        assert!(bundle.created_at >= before);
        assert!(bundle.updated_at >= before);
    }

    #[test]
    fn explicit_timestamps_are_kept() {
        let mut v = minimal();
        v["createdAt"] = json!("2024-03-01T12:00:00Z");
        v["updatedAt"] = json!("2024-04-01T08:30:00Z");
        let bundle = parse_descriptor(v).unwrap();
        assert_eq!(bundle.created_at.to_rfc3339(), "2024-03-01T12:00:00+00:00");
        assert_eq!(bundle.updated_at.to_rfc3339(), "2024-04-01T08:30:00+00:00");
    }

    #[test]
    fn reports_each_missing_array() {
        for field in REQUIRED_ARRAYS {
            let err = parse_descriptor(without(field)).unwrap_err();
            assert_eq!(err.field, field);
        }
    }

    #[test]
    fn empty_arrays_are_valid() {
        let v = json!({
            "id": "empty",
            "name": "Empty",
            "type": "custom",
            "agents": [],
            "skills": [],
            "automations": [],
            "dashboardWidgets": [],
            "memoryCategories": []
        });
        let bundle = parse_descriptor(v).unwrap();
        assert!(bundle.agents.is_empty());
        assert!(bundle.memory_categories.is_empty());
    }

    #[test]
    fn first_missing_field_wins() {
        let v = json!({ "type": "custom" });
        assert_eq!(parse_descriptor(v).unwrap_err().field, "id");

        let v = json!({ "id": "x", "agents": "nope" });
        assert_eq!(parse_descriptor(v).unwrap_err().field, "name");

        let v = json!({ "id": "x", "name": "X" });
        assert_eq!(parse_descriptor(v).unwrap_err().field, "type");
    }

    #[test]
    fn empty_id_rejected() {
        let mut v = minimal();
        v["id"] = json!("");
        let err = parse_descriptor(v).unwrap_err();
        assert_eq!(err.field, "id");
        assert_eq!(err.reason, "must not be empty");
    }

    #[test]
    fn non_array_rejected() {
        let mut v = minimal();
        v["skills"] = json!("web-search");
        let err = parse_descriptor(v).unwrap_err();
        assert_eq!(err.field, "skills");
        assert_eq!(err.reason, "must be an array");
    }

    #[test]
    fn unknown_type_rejected() {
        let mut v = minimal();
        v["type"] = json!("vendor");
        assert_eq!(parse_descriptor(v).unwrap_err().field, "type");
    }

    #[test]
    fn type_is_case_insensitive() {
        let mut v = minimal();
        v["type"] = json!("Official");
        let bundle = parse_descriptor(v).unwrap();
        assert_eq!(bundle.bundle_type, BundleType::Official);
    }

    #[test]
    fn non_object_rejected() {
        let err = parse_descriptor(json!([1, 2, 3])).unwrap_err();
        assert_eq!(err.field, "descriptor");
    }

    #[test]
    fn agent_without_role_is_rejected() {
        let mut v = minimal();
        v["agents"] = json!([{ "name": "Nameless" }]);
        assert_eq!(parse_descriptor(v).unwrap_err().field, "descriptor");
    }

    #[test]
    fn validate_bundle_checks_strings() {
        assert!(validate_bundle(&Bundle::new("a", "A")).is_ok());
        assert_eq!(validate_bundle(&Bundle::new("", "A")).unwrap_err().field, "id");
        assert_eq!(validate_bundle(&Bundle::new("a", "")).unwrap_err().field, "name");
        assert!(validate_bundle(&Bundle::new(" ", " ")).is_ok());
    }

    #[test]
    fn whitespace_id_is_not_empty() {
        let mut v = minimal();
        v["id"] = json!("  ");
        let bundle = parse_descriptor(v).unwrap();
        assert_eq!(bundle.id, "  ");
    }
}
