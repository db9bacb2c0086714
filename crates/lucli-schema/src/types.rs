//! Newtype wrappers for string identifiers, providing compile-time type safety.
//!
//! All newtypes serialize/deserialize as plain strings for backward compatibility.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::Deref;

macro_rules! string_newtype {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Create a new instance from a string.
            pub fn new(s: impl Into<String>) -> Self {
                Self(s.into())
            }

            /// Return the inner string as a slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Consume self and return the inner `String`.
            pub fn into_inner(self) -> String {
                self.0
            }
        }

        impl Deref for $name {
            type Target = str;
            fn deref(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl PartialEq<str> for $name {
            fn eq(&self, other: &str) -> bool {
                self.0 == other
            }
        }

        impl PartialEq<String> for $name {
            fn eq(&self, other: &String) -> bool {
                self.0 == *other
            }
        }

        impl PartialEq<$name> for String {
            fn eq(&self, other: &$name) -> bool {
                *self == other.0
            }
        }

        impl AsRef<std::path::Path> for $name {
            fn as_ref(&self) -> &std::path::Path {
                std::path::Path::new(&self.0)
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_owned())
            }
        }
    };
}

string_newtype!(
    /// A filesystem-safe instance name; identity of an Instance (spec §3).
    InstanceName
);

string_newtype!(
    /// A named environment overlay tag, stored as display metadata only.
    EnvTag
);

/// Validate an instance name: 1-64 characters, `[a-zA-Z0-9_-]` only.
pub fn validate_instance_name(name: &str) -> bool {
    !name.is_empty()
        && name.len() <= 64
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validate_instance_name_accepts_typical_names() {
        assert!(validate_instance_name("my-app"));
        assert!(validate_instance_name("demo_1"));
    }

    #[test]
    fn validate_instance_name_rejects_empty_and_long_and_symbols() {
        assert!(!validate_instance_name(""));
        assert!(!validate_instance_name(&"a".repeat(65)));
        assert!(!validate_instance_name("my app"));
        assert!(!validate_instance_name("../etc"));
    }

    #[test]
    fn instance_name_display_and_as_ref() {
        let id = InstanceName::new("my-app");
        assert_eq!(id.to_string(), "my-app");
        assert_eq!(id.as_str(), "my-app");
        assert_eq!(AsRef::<str>::as_ref(&id), "my-app");
    }

    #[test]
    fn instance_name_serde_roundtrip() {
        let id = InstanceName::new("demo");
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"demo\"");
        let back: InstanceName = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }

    #[test]
    fn env_tag_from_str() {
        let tag = EnvTag::from("prod");
        assert_eq!(tag.as_str(), "prod");
    }

    #[test]
    fn instance_name_equality() {
        let a = InstanceName::new("same");
        let b = InstanceName::new("same");
        let c = InstanceName::new("diff");
        assert_eq!(a, b);
        assert_ne!(a, c);
    }
}
