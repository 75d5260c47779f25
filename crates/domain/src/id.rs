//! Typed identifier newtypes backed by strings.
//!
//! Identifiers come from the host (entity ids, area ids) or from definitions
//! authored by users (activity and app ids), so they are opaque strings
//! rather than generated UUIDs.

use std::borrow::Borrow;
use std::fmt;

use serde::{Deserialize, Serialize};

macro_rules! define_id {
    ($(#[doc = $doc:expr])* $name:ident) => {
        $(#[doc = $doc])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Wrap an identifier string.
            #[must_use]
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            /// Borrow the identifier as a string slice.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Whether the identifier is the empty string.
            #[must_use]
            pub fn is_empty(&self) -> bool {
                self.0.is_empty()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self::new(value)
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }

        impl Borrow<str> for $name {
            fn borrow(&self) -> &str {
                &self.0
            }
        }
    };
}

define_id!(
    /// Identifier of an [`Area`](crate::area::Area), e.g. `"living_room"`.
    AreaId
);

define_id!(
    /// Identifier of an [`ActivityDefinition`](crate::activity::ActivityDefinition).
    ActivityId
);

define_id!(
    /// Identifier of an automation [`App`](crate::automation::App).
    AppId
);

define_id!(
    /// Host entity identifier in `<domain>.<object>` form, e.g. `"light.kitchen"`.
    EntityId
);

impl EntityId {
    /// The capability domain, i.e. everything before the first `.`.
    ///
    /// Identifiers without a dot are their own domain.
    #[must_use]
    pub fn domain(&self) -> &str {
        self.0.split_once('.').map_or(self.0.as_str(), |(d, _)| d)
    }
}
