use std::collections::BTreeMap;

use regex::Regex;

use crate::record::FieldValue;
use crate::schema::{FieldSpec, Rule};

/// Pure local gate: maps the current field values to a field-name → message
/// mapping. An empty map means the form may be submitted. These messages are
/// never logged and never sent to the server.
pub fn validate(
    specs: &[FieldSpec],
    values: &BTreeMap<String, FieldValue>,
) -> BTreeMap<String, String> {
    let mut errors = BTreeMap::new();
    for spec in specs {
        if let Some(message) = check_field(spec, values) {
            errors.insert(spec.name.to_string(), message);
        }
    }
    errors
}

fn check_field(spec: &FieldSpec, values: &BTreeMap<String, FieldValue>) -> Option<String> {
    let value = values.get(spec.name);
    let empty = value.map(|v| v.is_empty()).unwrap_or(true);
    for rule in spec.rules {
        match rule {
            Rule::Required => {
                if empty {
                    return Some("required".to_string());
                }
            }
            Rule::Email => {
                if !empty && !is_well_formed_email(value.map(|v| v.as_text()).unwrap_or("")) {
                    return Some("invalid email address".to_string());
                }
            }
            Rule::MinLen(min) => {
                let text = value.map(|v| v.as_text()).unwrap_or("");
                if !empty && text.chars().count() < *min {
                    return Some(format!("must be at least {min} characters"));
                }
            }
            Rule::Matches(other) => {
                let text = value.map(|v| v.as_text()).unwrap_or("");
                let other_text = values.get(*other).map(|v| v.as_text()).unwrap_or("");
                if (!text.is_empty() || !other_text.is_empty()) && text != other_text {
                    return Some("does not match".to_string());
                }
            }
        }
    }
    None
}

pub fn is_well_formed_email(value: &str) -> bool {
    let re = Regex::new(r"^.+@.+\..+$").expect("email pattern");
    re.is_match(value.trim())
}
