//! Account email addresses.

use core::fmt;

use serde::{Deserialize, Serialize};

/// Why a string was rejected as an [`Email`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum EmailError {
    #[error("email cannot be empty")]
    Empty,
    #[error("email must be at most {max} characters")]
    TooLong { max: usize },
    #[error("email must contain an @ symbol")]
    MissingAtSymbol,
    #[error("email local part cannot be empty")]
    EmptyLocalPart,
    /// Empty, or without a dot separating labels.
    #[error("email domain is not valid")]
    InvalidDomain,
    /// A second @, or whitespace inside the address.
    #[error("email contains invalid characters")]
    InvalidCharacters,
}

/// A mailbox address, stored trimmed and lowercased.
///
/// Accounts are keyed by this value, so `Lan@Example.VN` and
/// `lan@example.vn` are the same customer.
///
/// ```
/// use senmarket_core::Email;
///
/// let email = Email::parse(" Lan@Example.VN ").unwrap();
/// assert_eq!(email.as_str(), "lan@example.vn");
/// assert_eq!(email.local_part(), "lan");
///
/// assert!(Email::parse("khach-hang").is_err());
/// assert!(Email::parse("lan@localhost").is_err());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(try_from = "String", into = "String")]
pub struct Email(String);

impl Email {
    /// RFC 5321 path limit.
    pub const MAX_LENGTH: usize = 254;

    /// Normalise and validate an address.
    ///
    /// # Errors
    ///
    /// Returns the first [`EmailError`] the input trips over.
    pub fn parse(input: &str) -> Result<Self, EmailError> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(EmailError::Empty);
        }
        if trimmed.len() > Self::MAX_LENGTH {
            return Err(EmailError::TooLong {
                max: Self::MAX_LENGTH,
            });
        }
        if trimmed.chars().any(char::is_whitespace) {
            return Err(EmailError::InvalidCharacters);
        }

        let (local, domain) = trimmed
            .split_once('@')
            .ok_or(EmailError::MissingAtSymbol)?;
        if local.is_empty() {
            return Err(EmailError::EmptyLocalPart);
        }
        if domain.contains('@') {
            return Err(EmailError::InvalidCharacters);
        }
        if domain.split('.').count() < 2 || domain.split('.').any(str::is_empty) {
            return Err(EmailError::InvalidDomain);
        }

        Ok(Self(trimmed.to_lowercase()))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
    }

    /// The mailbox name before the @, used as a fallback display name.
    #[must_use]
    pub fn local_part(&self) -> &str {
        self.0.split_once('@').map_or(self.0.as_str(), |(local, _)| local)
    }
}

impl fmt::Display for Email {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::str::FromStr for Email {
    type Err = EmailError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Email {
    type Error = EmailError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Email> for String {
    fn from(email: Email) -> Self {
        email.0
    }
}

#[cfg(feature = "postgres")]
impl sqlx::Type<sqlx::Postgres> for Email {
    fn type_info() -> sqlx::postgres::PgTypeInfo {
        <String as sqlx::Type<sqlx::Postgres>>::type_info()
    }

    fn compatible(ty: &sqlx::postgres::PgTypeInfo) -> bool {
        <String as sqlx::Type<sqlx::Postgres>>::compatible(ty)
    }
}

#[cfg(feature = "postgres")]
impl<'r> sqlx::Decode<'r, sqlx::Postgres> for Email {
    fn decode(value: sqlx::postgres::PgValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        // Rows were normalised on insert.
        Ok(Self(<String as sqlx::Decode<sqlx::Postgres>>::decode(value)?))
    }
}

#[cfg(feature = "postgres")]
impl sqlx::Encode<'_, sqlx::Postgres> for Email {
    fn encode_by_ref(
        &self,
        buf: &mut sqlx::postgres::PgArgumentBuffer,
    ) -> Result<sqlx::encode::IsNull, sqlx::error::BoxDynError> {
        <String as sqlx::Encode<sqlx::Postgres>>::encode_by_ref(&self.0, buf)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_accepts_common_shapes() {
        for input in [
            "khachhang@senmarket.vn",
            "tran.thi.b+don-hang@gmail.com",
            "shop@mail.hcm.edu.vn",
            "a@b.c",
        ] {
            assert!(Email::parse(input).is_ok(), "{input} should parse");
        }
    }

    #[test]
    fn test_normalises_case_and_padding() {
        let email = Email::parse("  Nguyen.Van.A@Gmail.COM ").unwrap();
        assert_eq!(email.as_str(), "nguyen.van.a@gmail.com");
        assert_eq!(email.local_part(), "nguyen.van.a");
    }

    #[test]
    fn test_rejections() {
        assert_eq!(Email::parse("   "), Err(EmailError::Empty));
        assert_eq!(Email::parse("khach-hang"), Err(EmailError::MissingAtSymbol));
        assert_eq!(Email::parse("@senmarket.vn"), Err(EmailError::EmptyLocalPart));
        assert_eq!(Email::parse("lan@"), Err(EmailError::InvalidDomain));
        assert_eq!(Email::parse("lan@localhost"), Err(EmailError::InvalidDomain));
        assert_eq!(Email::parse("lan@shop..vn"), Err(EmailError::InvalidDomain));
        assert_eq!(Email::parse("a@b@c.vn"), Err(EmailError::InvalidCharacters));
        assert_eq!(
            Email::parse("lan anh@example.vn"),
            Err(EmailError::InvalidCharacters)
        );

        let long = format!("{}@senmarket.vn", "x".repeat(250));
        assert_eq!(Email::parse(&long), Err(EmailError::TooLong { max: 254 }));
    }

    #[test]
    fn test_serde_goes_through_parse() {
        let email: Email = serde_json::from_str("\"Mai@Shop.VN\"").unwrap();
        assert_eq!(email.as_str(), "mai@shop.vn");
        assert_eq!(serde_json::to_string(&email).unwrap(), "\"mai@shop.vn\"");

        assert!(serde_json::from_str::<Email>("\"not-an-email\"").is_err());
    }

    #[test]
    fn test_display_and_from_str_agree() {
        let email: Email = "Hoa@SenMarket.vn".parse().unwrap();
        assert_eq!(email.to_string(), "hoa@senmarket.vn");
        assert_eq!(email.into_inner(), "hoa@senmarket.vn");
    }
}
