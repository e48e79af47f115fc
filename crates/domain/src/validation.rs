//! Validation engine: checks device documents against the schema registry.
//!
//! Two modes are supported: a complete new device, and a partial update of an
//! existing device whose kind is already known. The top-level field set and
//! the `type` check short-circuit; every other violation is collected.

use std::collections::BTreeSet;
use std::fmt::Display;
use std::sync::LazyLock;

use regex::Regex;
use serde_json::{Map, Value};

use crate::device::{DeviceKind, DeviceStatus};
use crate::error::ValidationError;
use crate::id::DeviceId;
use crate::schema::{KindSchema, SchemaRegistry, ValueKind};

const NEW_DEVICE_FIELDS: [&str; 6] = ["id", "type", "room", "name", "status", "parameters"];
const WRITABLE_FIELDS: [&str; 4] = ["room", "name", "status", "parameters"];

static TIME_OF_DAY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([01][0-9]|2[0-3]):([0-5][0-9])(:[0-5][0-9])?$")
        .expect("time-of-day pattern is valid")
});
static HEX_COLOR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^#([0-9A-Fa-f]{3}|[0-9A-Fa-f]{6})$").expect("hex color pattern is valid")
});

/// What the document is checked as.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationMode<'a> {
    /// A complete device about to be inserted.
    New,
    /// A partial update of the device `id`, whose kind is `kind`.
    Update { id: &'a DeviceId, kind: DeviceKind },
}

/// Outcome of a validation run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Validation {
    violations: Vec<String>,
}

impl Validation {
    #[must_use]
    pub fn is_ok(&self) -> bool {
        self.violations.is_empty()
    }

    /// Violations in the order they were found.
    #[must_use]
    pub fn violations(&self) -> &[String] {
        &self.violations
    }

    /// Convert into a `Result`, failing with every collected violation.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError`] when at least one violation was found.
    pub fn into_result(self) -> Result<(), ValidationError> {
        if self.violations.is_empty() {
            Ok(())
        } else {
            Err(ValidationError::new(self.violations))
        }
    }

    fn push(&mut self, violation: String) {
        self.violations.push(violation);
    }
}

impl SchemaRegistry {
    /// Check `document` against the rules of its kind. Has no side effects.
    #[must_use]
    pub fn validate(&self, document: &Value, mode: ValidationMode<'_>) -> Validation {
        let mut report = Validation::default();
        let Some(fields) = document.as_object() else {
            report.push(format!(
                "A device document must be a JSON object, got {} instead.",
                shown(document)
            ));
            return report;
        };

        let kind = match mode {
            ValidationMode::New => {
                if let Err(violation) = check_new_fields(fields) {
                    report.push(violation);
                    return report;
                }
                match check_kind(&fields["type"]) {
                    Ok(kind) => kind,
                    Err(violation) => {
                        report.push(violation);
                        return report;
                    }
                }
            }
            ValidationMode::Update { id, kind } => {
                let violations = check_update_fields(fields, id);
                if !violations.is_empty() {
                    report.violations = violations;
                    return report;
                }
                kind
            }
        };

        if let (ValidationMode::New, Some(id)) = (mode, fields.get("id")) {
            check_id(id, &mut report);
        }
        for key in ["room", "name"] {
            if let Some(value) = fields.get(key) {
                check_label(key, value, &mut report);
            }
        }
        let schema = self.schema(kind);
        if let Some(status) = fields.get("status") {
            check_status(schema, status, &mut report);
        }
        if let Some(parameters) = fields.get("parameters") {
            check_parameters(schema, parameters, &mut report);
        }
        report
    }
}

/// Read a value as an integer.
///
/// Accepts JSON integers, floats (truncated toward zero) and strings holding a
/// base-10 integer.
#[must_use]
pub fn parse_integer(value: &Value) -> Option<i64> {
    match value {
        Value::Number(number) => number.as_i64().or_else(|| {
            number
                .as_f64()
                .filter(|float| float.is_finite())
                .map(|float| {
                    #[allow(clippy::cast_possible_truncation)]
                    let truncated = float.trunc() as i64;
                    truncated
                })
        }),
        Value::String(text) => text.trim().parse().ok(),
        _ => None,
    }
}

fn check_new_fields(fields: &Map<String, Value>) -> Result<(), String> {
    let supplied: BTreeSet<&str> = fields.keys().map(String::as_str).collect();
    let required: BTreeSet<&str> = NEW_DEVICE_FIELDS.into_iter().collect();
    if supplied == required {
        return Ok(());
    }
    let missing: Vec<_> = required.difference(&supplied).collect();
    let unexpected: Vec<_> = supplied.difference(&required).collect();
    let mut problems = Vec::new();
    if !missing.is_empty() {
        problems.push(format!("missing {}", listed(missing)));
    }
    if !unexpected.is_empty() {
        problems.push(format!("unexpected {}", listed(unexpected)));
    }
    Err(format!(
        "Incorrect field(s) in new device: {}; must be exactly these fields: {}",
        problems.join(", "),
        listed(required)
    ))
}

fn check_update_fields(fields: &Map<String, Value>, id: &DeviceId) -> Vec<String> {
    let mut unknown = Vec::new();
    let mut read_only = Vec::new();
    for (key, value) in fields {
        match key.as_str() {
            "type" => read_only.push(key.as_str()),
            "id" if value.as_str() != Some(id.as_str()) => read_only.push(key.as_str()),
            "id" => {}
            other if WRITABLE_FIELDS.contains(&other) => {}
            other => unknown.push(other),
        }
    }
    let mut violations = Vec::new();
    if !unknown.is_empty() {
        violations.push(format!(
            "Unknown field(s) in device update: {}; writable fields: {}",
            listed(unknown),
            listed(WRITABLE_FIELDS)
        ));
    }
    if !read_only.is_empty() {
        violations.push(format!(
            "Read-only field(s) cannot be changed: {}",
            listed(read_only)
        ));
    }
    violations
}

fn check_kind(value: &Value) -> Result<DeviceKind, String> {
    value
        .as_str()
        .and_then(|raw| raw.parse::<DeviceKind>().ok())
        .ok_or_else(|| {
            format!(
                "Incorrect device type {}, must be one of {}.",
                shown(value),
                listed(DeviceKind::ALL)
            )
        })
}

fn check_id(value: &Value, report: &mut Validation) {
    let valid = value
        .as_str()
        .is_some_and(|raw| DeviceId::from(raw).is_topic_safe());
    if !valid {
        report.push(format!(
            "'id' must be a non-empty string without '/', '+' or '#', got {} instead.",
            shown(value)
        ));
    }
}

fn check_label(key: &str, value: &Value, report: &mut Validation) {
    if !value.as_str().is_some_and(|text| !text.trim().is_empty()) {
        report.push(format!(
            "'{key}' must be a non-empty string, got {} instead.",
            shown(value)
        ));
    }
}

fn check_status(schema: &KindSchema, value: &Value, report: &mut Validation) {
    let valid = value
        .as_str()
        .and_then(|raw| raw.parse::<DeviceStatus>().ok())
        .is_some_and(|status| schema.kind.accepts(status));
    if !valid {
        report.push(format!(
            "'status' must be one of {}, got {} instead.",
            listed(schema.statuses()),
            shown(value)
        ));
    }
}

fn check_parameters(schema: &KindSchema, value: &Value, report: &mut Validation) {
    let Some(parameters) = value.as_object() else {
        report.push(format!(
            "'parameters' must be an object, got {} instead.",
            shown(value)
        ));
        return;
    };

    let disallowed: Vec<&str> = parameters
        .keys()
        .map(String::as_str)
        .filter(|key| schema.rule(key).is_none())
        .collect();
    if !disallowed.is_empty() {
        report.push(format!(
            "Disallowed parameters for {}: {}; allowed parameters: {}",
            schema.kind,
            listed(disallowed),
            listed(schema.allowed_keys())
        ));
    }

    for (key, value) in parameters {
        if let Some(rule) = schema.rule(key)
            && let Err(violation) = check_value(key, rule.value, value)
        {
            report.push(violation);
        }
    }
}

fn check_value(key: &str, kind: ValueKind, value: &Value) -> Result<(), String> {
    match kind {
        ValueKind::Integer(bounds) => {
            let number = parse_integer(value).ok_or_else(|| {
                format!("'{key}' must be an integer, got {} instead.", shown(value))
            })?;
            if bounds.contains(number) {
                Ok(())
            } else {
                Err(format!(
                    "'{key}' must be between {} and {}, got {number} instead.",
                    bounds.min, bounds.max
                ))
            }
        }
        ValueKind::Boolean if value.is_boolean() => Ok(()),
        ValueKind::Boolean => Err(format!(
            "'{key}' must be a boolean, got {} instead.",
            shown(value)
        )),
        ValueKind::OneOf(options) => match value.as_str() {
            Some(raw) if options.contains(&raw) => Ok(()),
            _ => Err(format!(
                "'{key}' must be one of {}, got {} instead.",
                listed(options),
                shown(value)
            )),
        },
        ValueKind::TimeOfDay => match value.as_str() {
            Some(raw) if TIME_OF_DAY.is_match(raw) => Ok(()),
            _ => Err(format!(
                "'{key}' must be a time of day formatted HH:MM or HH:MM:SS, got {} instead.",
                shown(value)
            )),
        },
        ValueKind::HexColor => match value.as_str() {
            Some(raw) if HEX_COLOR.is_match(raw) => Ok(()),
            _ => Err(format!(
                "'{key}' must be a hex color formatted #RGB or #RRGGBB, got {} instead.",
                shown(value)
            )),
        },
    }
}

fn listed<T: Display>(items: impl IntoIterator<Item = T>) -> String {
    let items: Vec<String> = items.into_iter().map(|item| item.to_string()).collect();
    format!("[{}]", items.join(", "))
}

fn shown(value: &Value) -> String {
    match value {
        Value::String(text) => format!("'{text}'"),
        other => other.to_string(),
    }
}
