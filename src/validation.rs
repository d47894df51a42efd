// src/validation.rs

use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

static EMAIL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("email pattern compiles"));

/// Field name -> message, as shown under each form field.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct FieldErrors(BTreeMap<&'static str, String>);

impl FieldErrors {
    pub fn new() -> Self {
        Self::default()
    }

    /// First message for a field wins.
    pub fn add(&mut self, field: &'static str, message: impl Into<String>) {
        self.0.entry(field).or_insert_with(|| message.into());
    }

    pub fn require(&mut self, field: &'static str, value: Option<&str>, message: &str) {
        if is_blank(value) {
            self.add(field, message);
        }
    }

    #[cfg(test)]
    pub fn get(&self, field: &str) -> Option<&str> {
        self.0.get(field).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn into_result(self) -> Result<(), FieldErrors> {
        if self.is_empty() { Ok(()) } else { Err(self) }
    }
}

pub fn is_blank(value: Option<&str>) -> bool {
    value.map(str::trim).is_none_or(str::is_empty)
}

pub fn check_email(errors: &mut FieldErrors, email: &str) {
    let email = email.trim();
    if email.is_empty() {
        errors.add("email", "Enter an email");
    } else if !EMAIL_RE.is_match(email) {
        errors.add("email", "Invalid email");
    }
}

/// Brazilian phone numbers, masked as (00) 00000-0000: 10 or 11 digits.
pub fn check_phone(errors: &mut FieldErrors, field: &'static str, phone: Option<&str>) {
    let Some(phone) = phone.map(str::trim).filter(|p| !p.is_empty()) else {
        errors.add(field, "Enter a contact phone");
        return;
    };
    let digits = phone.chars().filter(char::is_ascii_digit).count();
    if !(10..=11).contains(&digits) {
        errors.add(field, "Phone must have 10 or 11 digits");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn email_rules() {
        let mut errs = FieldErrors::new();
        check_email(&mut errs, "   ");
        assert_eq!(errs.get("email"), Some("Enter an email"));

        let mut errs = FieldErrors::new();
        check_email(&mut errs, "ana@clinic");
        assert_eq!(errs.get("email"), Some("Invalid email"));

        let mut errs = FieldErrors::new();
        check_email(&mut errs, "ana@clinic.com");
        assert!(errs.is_empty());
    }

    #[test]
    fn phone_accepts_masked_and_bare_digits() {
        for ok in ["(11) 98765-4321", "1198765432", "11987654321"] {
            let mut errs = FieldErrors::new();
            check_phone(&mut errs, "contact_phone", Some(ok));
            assert!(errs.is_empty(), "{ok}");
        }

        let mut errs = FieldErrors::new();
        check_phone(&mut errs, "contact_phone", Some("123"));
        assert!(errs.get("contact_phone").is_some());

        let mut errs = FieldErrors::new();
        check_phone(&mut errs, "contact_phone", None);
        assert_eq!(errs.get("contact_phone"), Some("Enter a contact phone"));
    }

    #[test]
    fn first_message_per_field_is_kept() {
        let mut errs = FieldErrors::new();
        errs.add("password", "Enter a password");
        errs.add("password", "Passwords do not match");
        assert_eq!(errs.get("password"), Some("Enter a password"));
        assert!(errs.into_result().is_err());
    }
}
