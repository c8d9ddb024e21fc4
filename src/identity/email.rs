//! Mailbox addresses for the ACME account identity.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use validator::ValidateEmail;

use crate::errors::{CertforgotError, Result};

/// A parsed mailbox: an addr-spec with an optional display name.
///
/// Accepted inputs: `user@domain`, `<user@domain>`, `Name <user@domain>` and
/// `"Name" <user@domain>`. The canonical text form is `user@domain` when there is
/// no display name and `"Name" <user@domain>` otherwise.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Email {
    name: Option<String>,
    address: String,
}

impl Email {
    /// Parse and validate a mailbox string
    pub fn parse(input: &str) -> Result<Self> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(CertforgotError::validation_field("email address is empty", "email"));
        }

        let (name, address) = match (trimmed.rfind('<'), trimmed.ends_with('>')) {
            (Some(open), true) => {
                let address = trimmed[open + 1..trimmed.len() - 1].trim();
                let display = parse_display_name(trimmed[..open].trim())?;
                (display, address)
            }
            (None, false) => (None, trimmed),
            _ => {
                return Err(CertforgotError::validation_field(
                    format!("unbalanced angle brackets in '{}'", trimmed),
                    "email",
                ))
            }
        };

        if !address.to_string().validate_email() {
            return Err(CertforgotError::validation_field(
                format!("'{}' is not a valid email address", address),
                "email",
            ));
        }

        Ok(Self { name, address: address.to_string() })
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }
}

fn parse_display_name(raw: &str) -> Result<Option<String>> {
    if raw.is_empty() {
        return Ok(None);
    }

    if let Some(inner) = raw.strip_prefix('"') {
        let inner = inner.strip_suffix('"').ok_or_else(|| {
            CertforgotError::validation_field(format!("unterminated quoted name '{}'", raw), "email")
        })?;
        let mut out = String::with_capacity(inner.len());
        let mut chars = inner.chars();
        while let Some(c) = chars.next() {
            match c {
                '\\' => match chars.next() {
                    Some(escaped) => out.push(escaped),
                    None => {
                        return Err(CertforgotError::validation_field(
                            "dangling escape in quoted name",
                            "email",
                        ))
                    }
                },
                '"' => {
                    return Err(CertforgotError::validation_field(
                        "unescaped quote in display name",
                        "email",
                    ))
                }
                other => out.push(other),
            }
        }
        return Ok(if out.is_empty() { None } else { Some(out) });
    }

    if raw.contains(['"', '<', '>', '@']) {
        return Err(CertforgotError::validation_field(
            format!("display name '{}' must be quoted", raw),
            "email",
        ));
    }
    Ok(Some(raw.to_string()))
}

impl fmt::Display for Email {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.name {
            Some(name) => {
                let escaped = name.replace('\\', "\\\\").replace('"', "\\\"");
                write!(f, "\"{}\" <{}>", escaped, self.address)
            }
            None => f.write_str(&self.address),
        }
    }
}

impl FromStr for Email {
    type Err = CertforgotError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl Serialize for Email {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Email {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::parse(&raw).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_bare_address() {
        let email = Email::parse("test@example.com").unwrap();
        assert_eq!(email.address(), "test@example.com");
        assert_eq!(email.name(), None);
        assert_eq!(email.to_string(), "test@example.com");
    }

    #[test]
    fn test_parse_named_address() {
        let email = Email::parse("Firstname Lastname <test@example.com>").unwrap();
        assert_eq!(email.address(), "test@example.com");
        assert_eq!(email.name(), Some("Firstname Lastname"));
        assert_eq!(email.to_string(), "\"Firstname Lastname\" <test@example.com>");
    }

    #[test]
    fn test_parse_quoted_name_with_escapes() {
        let email = Email::parse(r#""Ops \"Team\"" <ops@example.com>"#).unwrap();
        assert_eq!(email.name(), Some("Ops \"Team\""));
        let reparsed = Email::parse(&email.to_string()).unwrap();
        assert_eq!(reparsed, email);
    }

    #[test]
    fn test_parse_angle_only() {
        let email = Email::parse("<test@example.com>").unwrap();
        assert_eq!(email.name(), None);
        assert_eq!(email.to_string(), "test@example.com");
    }

    #[test]
    fn test_rejects_malformed() {
        for input in ["", "   ", "not-an-email", "a@", "Name <test@example.com", "@example.com"] {
            let err = Email::parse(input).unwrap_err();
            assert!(matches!(err, CertforgotError::Validation { .. }), "input {input:?}");
        }
    }

    #[test]
    fn test_serde_uses_canonical_string() {
        let email = Email::parse("Name <n@example.com>").unwrap();
        let json = serde_json::to_string(&email).unwrap();
        assert_eq!(json, r#""\"Name\" <n@example.com>""#);
        let back: Email = serde_json::from_str(&json).unwrap();
        assert_eq!(back, email);

        assert!(serde_json::from_str::<Email>(r#""nope""#).is_err());
    }
}
