//! Canonical method signatures.
//!
//! The canonical text is `[visibility ][static ]<return> <type>.<method>(<params>)`,
//! or `[visibility ]<type>(<params>)` for constructors, with parameters joined
//! by `", "` and no visibility keyword for package-private members.
//! Identity-neutral modifiers such as `final` never appear in canonical text.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::graph::{ConstructorDef, MethodDef};

/// Method visibility, ordered from most hidden to most open.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "kebab-case")]
pub enum Visibility {
    Private,
    PackagePrivate,
    Protected,
    #[default]
    Public,
}

impl Visibility {
    /// Keyword used in signature text; package-private has none.
    pub fn keyword(self) -> Option<&'static str> {
        match self {
            Visibility::Private => Some("private"),
            Visibility::PackagePrivate => None,
            Visibility::Protected => Some("protected"),
            Visibility::Public => Some("public"),
        }
    }

    pub fn name(self) -> &'static str {
        self.keyword().unwrap_or("package-private")
    }
}

impl fmt::Display for Visibility {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Canonical textual identity of one method. Equal iff the text is equal.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Signature(String);

impl Signature {
    /// Signature of `method` as declared on `owner`.
    pub fn of_method(owner: &str, method: &MethodDef) -> Self {
        let mut text = with_visibility(method.visibility);
        if method.is_static {
            text.push_str("static ");
        }
        text.push_str(&method.return_type);
        text.push(' ');
        text.push_str(owner);
        text.push('.');
        text.push_str(&method.name);
        push_params(&mut text, &method.params);
        Signature(text)
    }

    /// Signature of a constructor of `owner`, e.g. `public com.acme.Foo(int)`.
    pub fn of_constructor(owner: &str, constructor: &ConstructorDef) -> Self {
        let mut text = with_visibility(constructor.visibility);
        text.push_str(owner);
        push_params(&mut text, &constructor.params);
        Signature(text)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

fn with_visibility(visibility: Visibility) -> String {
    let mut text = String::with_capacity(64);
    if let Some(keyword) = visibility.keyword() {
        text.push_str(keyword);
        text.push(' ');
    }
    text
}

fn push_params(text: &mut String, params: &[String]) {
    text.push('(');
    text.push_str(&params.join(", "));
    text.push(')');
}

impl From<String> for Signature {
    fn from(value: String) -> Self {
        Signature(value)
    }
}

impl From<&str> for Signature {
    fn from(value: &str) -> Self {
        Signature(value.to_string())
    }
}

impl AsRef<str> for Signature {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::borrow::Borrow<str> for Signature {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Signature({:?})", self.0)
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Package part of a fully qualified type name. Nested types (`Outer$Inner`)
/// share their outer type's package.
pub fn package_of(type_name: &str) -> &str {
    type_name
        .rsplit_once('.')
        .map(|(pkg, _)| pkg)
        .unwrap_or_default()
}
