use serde::{Deserialize, Serialize};

use crate::error::{optional_text, required_text, DomainError, DomainResult};
use crate::value_object::ValueObject;

/// Postal address used for profiles and order shipping.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Address {
    pub line1: String,
    #[serde(default)]
    pub line2: Option<String>,
    pub city: String,
    pub state: String,
    pub postal_code: String,
    #[serde(default = "default_country")]
    pub country: String,
}

impl ValueObject for Address {}

fn default_country() -> String {
    "India".to_string()
}

impl Address {
    /// Return a trimmed, validated copy.
    pub fn validated(&self) -> DomainResult<Address> {
        let postal_code = required_text("postal_code", &self.postal_code, 10)?;
        if postal_code.chars().count() < 4
            || !postal_code.chars().all(|c| c.is_ascii_alphanumeric() || c == ' ' || c == '-')
        {
            return Err(DomainError::validation("postal_code is malformed"));
        }

        let line2 = match &self.line2 {
            Some(l) => Some(optional_text("line2", l, 200)?).filter(|l| !l.is_empty()),
            None => None,
        };

        Ok(Address {
            line1: required_text("line1", &self.line1, 200)?,
            line2,
            city: required_text("city", &self.city, 100)?,
            state: required_text("state", &self.state, 100)?,
            postal_code,
            country: required_text("country", &self.country, 100)?,
        })
    }
}

/// Validate a phone number: digits plus `+`, `-`, spaces; 7..=20 chars.
pub fn validate_phone(raw: &str) -> DomainResult<String> {
    let phone = raw.trim();
    let digits = phone.chars().filter(char::is_ascii_digit).count();
    let allowed = phone
        .chars()
        .all(|c| c.is_ascii_digit() || matches!(c, '+' | '-' | ' '));
    if !allowed || digits < 7 || phone.chars().count() > 20 {
        return Err(DomainError::validation("phone number is malformed"));
    }
    Ok(phone.to_string())
}
