use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ModelError;

/// Prefix that namespaces a director record apart from the same individual's
/// cast record.
pub const DIRECTOR_KEY_PREFIX: &str = "director-";

/// Prefix used for films that never resolved a canonical id.
pub const UNRESOLVED_FILM_PREFIX: &str = "source-";

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub fn new(raw: impl Into<String>) -> Self {
                Self(raw.into().trim().to_string())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }

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
                Self::new(value)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

string_id!(
    /// Canonical film id on the index site (site B). Empty until identity
    /// resolution succeeds.
    FilmId
);

string_id!(
    /// Film id native to the box-office catalog (site A).
    SourceId
);

string_id!(
    /// Canonical person id on the index site.
    PersonId
);

/// Which career a [`crate::Person`] record describes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    Cast,
    Director,
}

impl Role {
    pub fn is_director(self) -> bool {
        matches!(self, Role::Director)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Cast => f.write_str("cast"),
            Role::Director => f.write_str("director"),
        }
    }
}

/// Registry and dedup identity of a person in a given role.
///
/// Cast records are keyed by their plain id, director records by
/// `director-<id>`, so one individual can hold two independent careers.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PersonKey {
    pub id: PersonId,
    pub role: Role,
}

impl PersonKey {
    pub fn new(id: PersonId, role: Role) -> Self {
        Self { id, role }
    }

    pub fn cast(id: impl Into<PersonId>) -> Self {
        Self::new(id.into(), Role::Cast)
    }

    pub fn director(id: impl Into<PersonId>) -> Self {
        Self::new(id.into(), Role::Director)
    }
}

impl fmt::Display for PersonKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.role {
            Role::Cast => write!(f, "{}", self.id),
            Role::Director => write!(f, "{}{}", DIRECTOR_KEY_PREFIX, self.id),
        }
    }
}

impl FromStr for PersonKey {
    type Err = ModelError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let raw = raw.trim();
        let key = match raw.strip_prefix(DIRECTOR_KEY_PREFIX) {
            Some(id) => PersonKey::director(id),
            None => PersonKey::cast(raw),
        };
        if key.id.is_empty() {
            return Err(ModelError::InvalidKey(raw.to_string()));
        }
        Ok(key)
    }
}

/// Identity of a film as it moves through the pipeline. Films that failed
/// identity resolution keep flowing under their catalog id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum FilmKey {
    Canonical(FilmId),
    Unresolved(SourceId),
}

impl fmt::Display for FilmKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FilmKey::Canonical(id) => write!(f, "{id}"),
            FilmKey::Unresolved(source) => {
                write!(f, "{}{}", UNRESOLVED_FILM_PREFIX, source)
            }
        }
    }
}
