//! Validated names and string values for DDL text.
//!
//! DDL statements cannot take bind parameters for object names, so every name
//! that ends up in statement text goes through [`Identifier`] and every string
//! value through [`Literal`]. Neither type can be built from unchecked input.

use crate::error::{Error, ObjectKind, Result};
use regex::Regex;
use std::fmt;
use std::sync::LazyLock;

/// Maximum length of a SQL Server `sysname`.
pub const MAX_IDENTIFIER_LEN: usize = 128;

/// Maximum length accepted for a string literal.
pub const MAX_LITERAL_LEN: usize = 4000;

static IDENTIFIER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_@#$\-]*$").expect("identifier pattern"));

/// An object name that is safe to splice into statement text.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Identifier {
    kind: ObjectKind,
    value: String,
}

impl Identifier {
    /// Validate `value` as the name of an object of the given kind.
    pub fn new(kind: ObjectKind, value: &str) -> Result<Self> {
        let reject = |reason| Error::InvalidIdentifier {
            kind,
            value: value.to_string(),
            reason,
        };

        if value.is_empty() {
            return Err(reject("name is empty"));
        }
        if value.chars().count() > MAX_IDENTIFIER_LEN {
            return Err(reject("name is longer than 128 characters"));
        }
        if !IDENTIFIER_RE.is_match(value) {
            return Err(reject(
                "name must start with a letter or _ and contain only letters, digits and _ @ # $ -",
            ));
        }

        Ok(Self {
            kind,
            value: value.to_string(),
        })
    }

    /// The raw name, as stored in the catalogs.
    pub fn as_str(&self) -> &str {
        &self.value
    }

    /// Kind of object this name refers to.
    pub fn kind(&self) -> ObjectKind {
        self.kind
    }

    /// Bracket-quoted form for statement text.
    pub fn quoted(&self) -> String {
        format!("[{}]", self.value.replace(']', "]]"))
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.value)
    }
}

/// A string value that is safe to splice into statement text as `N'...'`.
#[derive(Clone, PartialEq, Eq)]
pub struct Literal {
    kind: ObjectKind,
    value: String,
}

impl Literal {
    /// Validate `value` for use as a string literal.
    pub fn new(kind: ObjectKind, value: &str) -> Result<Self> {
        let reject = |reason| Error::InvalidLiteral { kind, reason };

        if value.is_empty() {
            return Err(reject("value is empty"));
        }
        if value.len() > MAX_LITERAL_LEN {
            return Err(reject("value is longer than 4000 bytes"));
        }
        if value.contains('\'') {
            return Err(reject("value contains a single quote"));
        }
        if value.chars().any(char::is_control) {
            return Err(reject("value contains a control character"));
        }

        Ok(Self {
            kind,
            value: value.to_string(),
        })
    }

    /// The raw value.
    pub fn as_str(&self) -> &str {
        &self.value
    }

    /// Unicode literal form for statement text.
    pub fn quoted(&self) -> String {
        format!("N'{}'", self.value)
    }
}

impl fmt::Debug for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Literal")
            .field("kind", &self.kind)
            .field("value", &self.value)
            .finish()
    }
}

/// A login password. Never printed.
#[derive(Clone, PartialEq, Eq)]
pub struct Password(Literal);

impl Password {
    /// Validate a password for `CREATE LOGIN`.
    pub fn new(value: &str) -> Result<Self> {
        Literal::new(ObjectKind::Password, value).map(Self)
    }

    pub(crate) fn literal(&self) -> &Literal {
        &self.0
    }
}

impl fmt::Debug for Password {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Password(***)")
    }
}
