//! Newtype keys for type-safe billing references.
//!
//! Use the `define_key!` macro to create string wrappers that prevent
//! accidentally passing a purchase token where a product identifier is
//! expected.

use serde::{Deserialize, Serialize};

/// Errors that can occur when parsing a key.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum KeyError {
    /// The input string is empty or whitespace.
    #[error("key cannot be empty")]
    Empty,
    /// The input string is too long.
    #[error("key must be at most {max} characters")]
    TooLong {
        /// Maximum allowed length.
        max: usize,
    },
    /// The input contains a character outside the allowed set.
    #[error("key contains invalid character {0:?}")]
    InvalidCharacter(char),
    /// The first character is not a lowercase letter or digit.
    #[error("key must start with a lowercase letter or digit")]
    InvalidStart,
}

/// Macro to define a type-safe string key wrapper.
///
/// Creates a newtype wrapper around `String` with:
/// - `Serialize`/`Deserialize` with `#[serde(transparent)]`
/// - `Debug`, `Clone`, `PartialEq`, `Eq`, `Hash`
/// - Conversion methods: `new()`, `as_str()`, `into_inner()`
/// - `From<&str>`, `From<String>` and `AsRef<str>` implementations
///
/// # Example
///
/// ```rust
/// # use premium_core::define_key;
/// define_key!(SkuKey);
/// define_key!(OrderKey);
///
/// let sku = SkuKey::new("gold");
/// let order = OrderKey::new("gold");
///
/// // These are different types, so this won't compile:
/// // let _: SkuKey = order;
/// assert_eq!(sku.as_str(), order.as_str());
/// ```
#[macro_export]
macro_rules! define_key {
    ($name:ident) => {
        #[derive(
            Debug,
            Clone,
            PartialEq,
            Eq,
            Hash,
            PartialOrd,
            Ord,
            ::serde::Serialize,
            ::serde::Deserialize
        )]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Create a new key without validation.
            #[must_use]
            pub fn new(key: impl Into<String>) -> Self {
                Self(key.into())
            }

            /// Returns the key as a string slice.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Consumes the key and returns its inner string.
            #[must_use]
            pub fn into_inner(self) -> String {
                self.0
            }
        }

        impl ::core::fmt::Display for $name {
            fn fmt(&self, f: &mut ::core::fmt::Formatter<'_>) -> ::core::fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(key: &str) -> Self {
                Self(key.to_owned())
            }
        }

        impl From<String> for $name {
            fn from(key: String) -> Self {
                Self(key)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

define_key!(PurchaseToken);

/// A product identifier as registered with the billing service.
///
/// ## Constraints (enforced by [`ProductId::parse`])
///
/// - Length: 1-40 characters
/// - Must start with a lowercase letter or digit
/// - Remaining characters: lowercase letters, digits, `_` and `.`
///
/// ## Examples
///
/// ```
/// use premium_core::ProductId;
///
/// assert!(ProductId::parse("basic").is_ok());
/// assert!(ProductId::parse("android.test.purchased").is_ok());
///
/// assert!(ProductId::parse("").is_err());
/// assert!(ProductId::parse("Gold").is_err());
/// assert!(ProductId::parse("_gold").is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProductId(String);

impl ProductId {
    /// Maximum length of a product identifier.
    pub const MAX_LENGTH: usize = 40;

    /// Create a new product identifier without validation.
    ///
    /// Identifiers coming back from the billing service are trusted as-is.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Parse a product identifier supplied by the host.
    ///
    /// Surrounding whitespace is trimmed.
    ///
    /// # Errors
    ///
    /// Returns an error if the input is empty, longer than 40 characters,
    /// starts with something other than a lowercase letter or digit, or
    /// contains a character outside `[a-z0-9_.]`.
    pub fn parse(s: &str) -> Result<Self, KeyError> {
        let s = s.trim();
        let mut chars = s.chars();
        let first = chars.next().ok_or(KeyError::Empty)?;

        if s.len() > Self::MAX_LENGTH {
            return Err(KeyError::TooLong {
                max: Self::MAX_LENGTH,
            });
        }

        if !(first.is_ascii_lowercase() || first.is_ascii_digit()) {
            return Err(KeyError::InvalidStart);
        }

        if let Some(bad) =
            chars.find(|c| !(c.is_ascii_lowercase() || c.is_ascii_digit() || *c == '_' || *c == '.'))
        {
            return Err(KeyError::InvalidCharacter(bad));
        }

        Ok(Self(s.to_owned()))
    }

    /// Returns the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consumes the identifier and returns its inner string.
    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl std::fmt::Display for ProductId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::str::FromStr for ProductId {
    type Err = KeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl From<&str> for ProductId {
    fn from(id: &str) -> Self {
        Self(id.to_owned())
    }
}

impl AsRef<str> for ProductId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl PartialEq<str> for ProductId {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_valid_product_ids() {
        assert!(ProductId::parse("basic").is_ok());
        assert!(ProductId::parse("premium_yearly").is_ok());
        assert!(ProductId::parse("android.test.purchased").is_ok());
        assert!(ProductId::parse("7day_pass").is_ok());
    }

    #[test]
    fn test_parse_trims_whitespace() {
        assert_eq!(ProductId::parse("  basic ").unwrap().as_str(), "basic");
    }

    #[test]
    fn test_parse_empty() {
        assert_eq!(ProductId::parse(""), Err(KeyError::Empty));
        assert_eq!(ProductId::parse("   "), Err(KeyError::Empty));
    }

    #[test]
    fn test_parse_too_long() {
        let long = "a".repeat(41);
        assert!(matches!(
            ProductId::parse(&long),
            Err(KeyError::TooLong { max: 40 })
        ));
    }

    #[test]
    fn test_parse_invalid_start() {
        assert_eq!(ProductId::parse("_gold"), Err(KeyError::InvalidStart));
        assert_eq!(ProductId::parse("Gold"), Err(KeyError::InvalidStart));
    }

    #[test]
    fn test_parse_invalid_character() {
        assert_eq!(
            ProductId::parse("gold-plan"),
            Err(KeyError::InvalidCharacter('-'))
        );
    }

    #[test]
    fn test_serde_transparent() {
        let id = ProductId::new("basic");
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"basic\"");
        let token: PurchaseToken = serde_json::from_str("\"tok-1\"").unwrap();
        assert_eq!(token.as_str(), "tok-1");
    }

    #[test]
    fn test_product_id_compares_with_str() {
        let id = ProductId::new("basic");
        assert!(id == *"basic");
        assert_eq!(id.to_string(), "basic");
    }
}
