use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::ValidationErrors;

pub const PASSWORD_MIN: usize = 8;
pub const PASSWORD_MAX: usize = 500;
pub const NAME_MIN: usize = 2;
pub const NAME_MAX: usize = 50;

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

/// Emails are compared case-insensitively: trimmed and lower-cased before
/// they are stored or looked up.
pub(crate) fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

fn check_len(
    errors: &mut ValidationErrors,
    field: &'static str,
    value: &str,
    min: usize,
    max: usize,
) {
    let len = value.chars().count();
    if len < min || len > max {
        errors.add(field, format!("must be between {min} and {max} characters"));
    }
}

/// Request body for user registration.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
}

impl RegisterRequest {
    /// Checks every field and reports all violations at once.
    pub fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        if !is_valid_email(&self.email) {
            errors.add("email", "invalid email");
        }
        check_len(&mut errors, "password", &self.password, PASSWORD_MIN, PASSWORD_MAX);
        check_len(&mut errors, "firstName", &self.first_name, NAME_MIN, NAME_MAX);
        check_len(&mut errors, "lastName", &self.last_name, NAME_MIN, NAME_MAX);
        errors.into_result()
    }
}

/// Request body for login.
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

impl LoginRequest {
    /// Only presence is checked; anything else is a credential failure.
    pub fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        if self.email.trim().is_empty() {
            errors.add("email", "required");
        }
        if self.password.is_empty() {
            errors.add("password", "required");
        }
        errors.into_result()
    }
}

/// Response returned after a successful login.
#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub token: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid() -> RegisterRequest {
        RegisterRequest {
            email: "doe@johndoe.com".into(),
            password: "mypassword123".into(),
            first_name: "John".into(),
            last_name: "Doe".into(),
        }
    }

    fn offending(req: &RegisterRequest) -> Vec<&'static str> {
        match req.validate() {
            Ok(()) => vec![],
            Err(errs) => errs.fields().collect(),
        }
    }

    #[test]
    fn valid_request_passes() {
        assert!(valid().validate().is_ok());
    }

    #[test]
    fn email_shapes() {
        assert!(is_valid_email("doe@johndoe.com"));
        assert!(is_valid_email("first.last+tag@sub.example.org"));
        assert!(!is_valid_email("doe@johndoe"));
        assert!(!is_valid_email("doe.johndoe.com"));
        assert!(!is_valid_email("doe @johndoe.com"));
        assert!(!is_valid_email(""));
    }

    #[test]
    fn normalize_trims_and_lowercases() {
        assert_eq!(normalize_email("  John.Doe@Email.COM "), "john.doe@email.com");
    }

    #[test]
    fn each_bad_field_is_reported_alone() {
        let cases: Vec<(&str, RegisterRequest)> = vec![
            ("email", RegisterRequest { email: "doe@johndoe".into(), ..valid() }),
            ("password", RegisterRequest { password: "aa".into(), ..valid() }),
            ("password", RegisterRequest { password: "a".repeat(501), ..valid() }),
            ("firstName", RegisterRequest { first_name: "J".into(), ..valid() }),
            ("firstName", RegisterRequest { first_name: "J".repeat(51), ..valid() }),
            ("lastName", RegisterRequest { last_name: "x".into(), ..valid() }),
            ("lastName", RegisterRequest { last_name: "x".repeat(51), ..valid() }),
        ];
        for (field, req) in cases {
            assert_eq!(offending(&req), [field], "case for {field}");
        }
    }

    #[test]
    fn boundaries_are_inclusive() {
        let req = RegisterRequest {
            password: "p".repeat(PASSWORD_MIN),
            first_name: "Jo".into(),
            last_name: "D".repeat(NAME_MAX),
            ..valid()
        };
        assert!(req.validate().is_ok());
        let req = RegisterRequest {
            password: "p".repeat(PASSWORD_MAX),
            ..valid()
        };
        assert!(req.validate().is_ok());
    }

    #[test]
    fn lengths_count_characters_not_bytes() {
        // 50 two-byte characters
        let req = RegisterRequest {
            first_name: "é".repeat(50),
            ..valid()
        };
        assert!(req.validate().is_ok());
    }

    #[test]
    fn all_violations_are_accumulated() {
        let req = RegisterRequest {
            email: "nope".into(),
            password: "short".into(),
            first_name: "J".into(),
            last_name: "D".into(),
        };
        assert_eq!(
            offending(&req),
            ["email", "firstName", "lastName", "password"]
        );
    }

    #[test]
    fn login_requires_both_fields() {
        let req = LoginRequest {
            email: " ".into(),
            password: String::new(),
        };
        let errs = req.validate().unwrap_err();
        assert_eq!(errs.fields().collect::<Vec<_>>(), ["email", "password"]);
    }
}
