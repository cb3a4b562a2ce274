use tracing::warn;

use crate::{graph::MethodDef, signature::Visibility};

/// Which methods the scanner tracks.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MethodFilter {
    /// Least visible visibility still tracked.
    pub min_visibility: Visibility,
    /// Track getters, setters, `equals` and `hashCode` too.
    pub include_trivial_accessors: bool,
}

impl Default for MethodFilter {
    fn default() -> Self {
        Self {
            min_visibility: Visibility::Public,
            include_trivial_accessors: false,
        }
    }
}

impl MethodFilter {
    pub fn new(min_visibility: Visibility) -> Self {
        Self {
            min_visibility,
            ..Self::default()
        }
    }

    /// Parses a visibility policy. Unknown values log a warning and fall back
    /// to public-only.
    pub fn parse(policy: &str) -> Self {
        let min_visibility = match policy.trim().to_ascii_lowercase().as_str() {
            "public" => Visibility::Public,
            "protected" => Visibility::Protected,
            "package-private" | "packageprivate" | "!private" => Visibility::PackagePrivate,
            "private" | "all" => Visibility::Private,
            other => {
                warn!(policy = other, "unknown method visibility policy, using public");
                Visibility::Public
            }
        };
        Self::new(min_visibility)
    }

    pub fn with_trivial_accessors(mut self, include: bool) -> Self {
        self.include_trivial_accessors = include;
        self
    }

    /// Whether members of this visibility are tracked at all.
    pub fn admits(&self, visibility: Visibility) -> bool {
        visibility >= self.min_visibility
    }

    pub fn should_include(&self, method: &MethodDef) -> bool {
        self.admits(method.visibility)
            && (self.include_trivial_accessors || !is_trivial_accessor(method))
    }
}

fn is_trivial_accessor(method: &MethodDef) -> bool {
    let name = method.name.as_str();
    let params = method.params.len();
    let has_suffix = |prefix: &str| {
        name.strip_prefix(prefix)
            .and_then(|rest| rest.chars().next())
            .is_some_and(char::is_uppercase)
    };
    match (name, params) {
        ("equals", 1) | ("hashCode", 0) => true,
        _ if params == 0 && method.return_type != "void" && has_suffix("get") => true,
        _ if params == 0 && method.return_type == "boolean" && has_suffix("is") => true,
        _ if params == 1 && method.return_type == "void" && has_suffix("set") => true,
        _ => false,
    }
}
