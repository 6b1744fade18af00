//! Built-in attribute validators
//!
//! Validators only see known, non-null values; the schema skips null and
//! unknown config before calling them.

use crate::schema::{Validator, ValidatorRequest, ValidatorResponse};
use crate::types::{Diagnostic, Dynamic};

fn invalid(request: &ValidatorRequest, summary: String, detail: String) -> ValidatorResponse {
    ValidatorResponse {
        diagnostics: vec![Diagnostic::error(summary, detail).with_attribute(request.path.clone())],
    }
}

fn ok() -> ValidatorResponse {
    ValidatorResponse {
        diagnostics: vec![],
    }
}

pub struct StringLengthValidator {
    pub min: Option<usize>,
    pub max: Option<usize>,
}

impl StringLengthValidator {
    pub fn between(min: usize, max: usize) -> Box<dyn Validator> {
        Box::new(Self {
            min: Some(min),
            max: Some(max),
        })
    }

    pub fn at_least(min: usize) -> Box<dyn Validator> {
        Box::new(Self {
            min: Some(min),
            max: None,
        })
    }
}

impl Validator for StringLengthValidator {
    fn description(&self) -> String {
        format!("string length between {:?} and {:?}", self.min, self.max)
    }

    fn validate(&self, request: ValidatorRequest) -> ValidatorResponse {
        let Some(s) = request.config_value.value.as_str() else {
            return ok();
        };
        let len = s.chars().count();
        if let Some(min) = self.min {
            if len < min {
                return invalid(
                    &request,
                    format!("{} must have minimum length of {}", request.path, min),
                    format!("Got length {}", len),
                );
            }
        }
        if let Some(max) = self.max {
            if len > max {
                return invalid(
                    &request,
                    format!("{} must have maximum length of {}", request.path, max),
                    format!("Got length {}", len),
                );
            }
        }
        ok()
    }
}

pub struct StringPatternValidator {
    pub pattern: regex::Regex,
    pub description: String,
}

impl StringPatternValidator {
    pub fn create(pattern: regex::Regex, description: &str) -> Box<dyn Validator> {
        Box::new(Self {
            pattern,
            description: description.to_string(),
        })
    }
}

impl Validator for StringPatternValidator {
    fn description(&self) -> String {
        self.description.clone()
    }

    fn validate(&self, request: ValidatorRequest) -> ValidatorResponse {
        match request.config_value.value.as_str() {
            Some(s) if !self.pattern.is_match(s) => invalid(
                &request,
                format!("{} must match {}", request.path, self.description),
                format!("Value '{}' does not match pattern", s),
            ),
            _ => ok(),
        }
    }
}

/// Accepts only one of a fixed set of strings
pub struct StringOneOfValidator {
    pub allowed: Vec<String>,
}

impl StringOneOfValidator {
    pub fn create(allowed: &[&str]) -> Box<dyn Validator> {
        Box::new(Self {
            allowed: allowed.iter().map(|s| s.to_string()).collect(),
        })
    }
}

impl Validator for StringOneOfValidator {
    fn description(&self) -> String {
        format!("one of: {}", self.allowed.join(", "))
    }

    fn validate(&self, request: ValidatorRequest) -> ValidatorResponse {
        match request.config_value.value.as_str() {
            Some(s) if !self.allowed.iter().any(|a| a == s) => invalid(
                &request,
                format!("Invalid value for {}", request.path),
                format!("Expected one of [{}], got '{}'", self.allowed.join(", "), s),
            ),
            _ => ok(),
        }
    }
}

/// Accepts strings that parse as UUIDs
pub struct UuidValidator;

impl UuidValidator {
    pub fn create() -> Box<dyn Validator> {
        Box::new(Self)
    }
}

impl Validator for UuidValidator {
    fn description(&self) -> String {
        "a valid UUID".to_string()
    }

    fn validate(&self, request: ValidatorRequest) -> ValidatorResponse {
        match request.config_value.value.as_str() {
            Some(s) if uuid::Uuid::parse_str(s).is_err() => invalid(
                &request,
                format!("{} must be a UUID", request.path),
                format!("Value '{}' is not a valid UUID", s),
            ),
            _ => ok(),
        }
    }
}

pub struct NumberRangeValidator {
    pub min: Option<f64>,
    pub max: Option<f64>,
}

impl NumberRangeValidator {
    pub fn between(min: f64, max: f64) -> Box<dyn Validator> {
        Box::new(Self {
            min: Some(min),
            max: Some(max),
        })
    }

    pub fn at_least(min: f64) -> Box<dyn Validator> {
        Box::new(Self {
            min: Some(min),
            max: None,
        })
    }
}

impl Validator for NumberRangeValidator {
    fn description(&self) -> String {
        format!("number between {:?} and {:?}", self.min, self.max)
    }

    fn validate(&self, request: ValidatorRequest) -> ValidatorResponse {
        let Some(n) = request.config_value.value.as_number() else {
            return ok();
        };
        if let Some(min) = self.min {
            if n < min {
                return invalid(
                    &request,
                    format!("{} must be at least {}", request.path, min),
                    format!("Got {}", n),
                );
            }
        }
        if let Some(max) = self.max {
            if n > max {
                return invalid(
                    &request,
                    format!("{} must be at most {}", request.path, max),
                    format!("Got {}", n),
                );
            }
        }
        ok()
    }
}

pub struct ListLengthValidator {
    pub min: Option<usize>,
    pub max: Option<usize>,
}

impl ListLengthValidator {
    pub fn between(min: usize, max: usize) -> Box<dyn Validator> {
        Box::new(Self {
            min: Some(min),
            max: Some(max),
        })
    }
}

impl Validator for ListLengthValidator {
    fn description(&self) -> String {
        format!("list length between {:?} and {:?}", self.min, self.max)
    }

    fn validate(&self, request: ValidatorRequest) -> ValidatorResponse {
        let Dynamic::List(items) = &request.config_value.value else {
            return ok();
        };
        if let Some(min) = self.min {
            if items.len() < min {
                return invalid(
                    &request,
                    format!("{} must have at least {} items", request.path, min),
                    format!("Got {} items", items.len()),
                );
            }
        }
        if let Some(max) = self.max {
            if items.len() > max {
                return invalid(
                    &request,
                    format!("{} must have at most {} items", request.path, max),
                    format!("Got {} items", items.len()),
                );
            }
        }
        ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{AttributePath, DynamicValue};

    fn request(value: Dynamic) -> ValidatorRequest {
        ValidatorRequest {
            config_value: DynamicValue::new(value),
            path: AttributePath::new("field"),
        }
    }

    #[test]
    fn string_length_validator_accepts_valid_length() {
        let validator = StringLengthValidator::between(3, 10);
        let resp = validator.validate(request(Dynamic::from("hello")));
        assert!(resp.diagnostics.is_empty());
    }

    #[test]
    fn string_length_validator_rejects_too_short() {
        let validator = StringLengthValidator::at_least(5);
        let resp = validator.validate(request(Dynamic::from("hi")));
        assert_eq!(resp.diagnostics.len(), 1);
        assert!(resp.diagnostics[0].summary.contains("minimum length of 5"));
    }

    #[test]
    fn pattern_validator() {
        let validator =
            StringPatternValidator::create(regex::Regex::new(r"^\d+[smh]$").unwrap(), "a duration");
        assert!(validator
            .validate(request(Dynamic::from("10m")))
            .diagnostics
            .is_empty());
        assert_eq!(
            validator
                .validate(request(Dynamic::from("ten")))
                .diagnostics
                .len(),
            1
        );
    }

    #[test]
    fn one_of_validator() {
        let validator = StringOneOfValidator::create(&["enabled", "disabled"]);
        assert!(validator
            .validate(request(Dynamic::from("enabled")))
            .diagnostics
            .is_empty());
        let resp = validator.validate(request(Dynamic::from("paused")));
        assert!(resp.diagnostics[0].detail.contains("paused"));
    }

    #[test]
    fn uuid_validator() {
        let validator = UuidValidator::create();
        assert!(validator
            .validate(request(Dynamic::from("726ecfcc-7fd0-4e30-a86e-7892524aa483")))
            .diagnostics
            .is_empty());
        assert_eq!(
            validator
                .validate(request(Dynamic::from("not-a-uuid")))
                .diagnostics
                .len(),
            1
        );
    }

    #[test]
    fn number_range_validator() {
        let validator = NumberRangeValidator::between(100.0, 599.0);
        assert!(validator
            .validate(request(Dynamic::Number(403.0)))
            .diagnostics
            .is_empty());
        assert_eq!(
            validator
                .validate(request(Dynamic::Number(99.0)))
                .diagnostics
                .len(),
            1
        );
    }

    #[test]
    fn list_length_validator() {
        let validator = ListLengthValidator::between(1, 2);
        let resp = validator.validate(request(Dynamic::List(vec![])));
        assert_eq!(resp.diagnostics.len(), 1);
    }
}
