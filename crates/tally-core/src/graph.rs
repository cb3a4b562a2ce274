//! Static type graph the scanner walks.
//!
//! The scanner only needs four questions answered about a type: its kind, its
//! superclass, its declared methods and its nested types. [`TypeGraph`] is that
//! seam; [`DescriptorGraph`] answers it from JSON type descriptors written next
//! to the application's code by the instrumentation collaborator.

use std::{collections::BTreeMap, fs, path::Path};

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::signature::{Visibility, package_of};

fn default_return_type() -> String {
    "void".into()
}

/// One method as declared on a type.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MethodDef {
    pub name: String,
    #[serde(default)]
    pub visibility: Visibility,
    #[serde(default, rename = "static")]
    pub is_static: bool,
    /// Compiler- or framework-generated (bridge methods and the like).
    #[serde(default, rename = "synthetic")]
    pub is_synthetic: bool,
    #[serde(default)]
    pub params: Vec<String>,
    #[serde(default = "default_return_type", rename = "returns")]
    pub return_type: String,
}

impl MethodDef {
    /// Same name and parameter types; return type and modifiers are ignored.
    pub fn same_shape(&self, other: &MethodDef) -> bool {
        self.name == other.name && self.params == other.params
    }
}

/// One constructor as declared on a class.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConstructorDef {
    #[serde(default)]
    pub visibility: Visibility,
    #[serde(default, rename = "synthetic")]
    pub is_synthetic: bool,
    #[serde(default)]
    pub params: Vec<String>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TypeKind {
    #[default]
    Class,
    Interface,
}

/// Descriptor of one type: a class or an interface.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeDef {
    pub name: String,
    #[serde(default)]
    pub kind: TypeKind,
    #[serde(default)]
    pub superclass: Option<String>,
    #[serde(default)]
    pub constructors: Vec<ConstructorDef>,
    #[serde(default)]
    pub methods: Vec<MethodDef>,
    /// Fully qualified names of nested types.
    #[serde(default)]
    pub nested: Vec<String>,
}

impl TypeDef {
    pub fn class(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: TypeKind::Class,
            superclass: None,
            constructors: Vec::new(),
            methods: Vec::new(),
            nested: Vec::new(),
        }
    }

    pub fn package(&self) -> &str {
        package_of(&self.name)
    }

    pub fn is_interface(&self) -> bool {
        self.kind == TypeKind::Interface
    }

    /// The declared method with the same name and parameters as `method`.
    pub fn find(&self, method: &MethodDef) -> Option<&MethodDef> {
        self.methods.iter().find(|m| m.same_shape(method))
    }
}

/// Read access to a resolved set of types.
pub trait TypeGraph {
    /// All type names, in a stable order.
    fn type_names(&self) -> Vec<&str>;

    fn resolve(&self, name: &str) -> Option<&TypeDef>;
}

/// A type descriptor file holds one type or an array of them.
#[derive(Deserialize)]
#[serde(untagged)]
enum DescriptorFile {
    One(TypeDef),
    Many(Vec<TypeDef>),
}

/// In-memory [`TypeGraph`] keyed by type name.
#[derive(Clone, Debug, Default)]
pub struct DescriptorGraph {
    types: BTreeMap<String, TypeDef>,
}

impl DescriptorGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_types(types: impl IntoIterator<Item = TypeDef>) -> Self {
        let mut graph = Self::new();
        for ty in types {
            graph.insert(ty);
        }
        graph
    }

    /// Later definitions of the same name replace earlier ones.
    pub fn insert(&mut self, ty: TypeDef) {
        self.types.insert(ty.name.clone(), ty);
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    /// Adds every type described by the file at `path`. Unreadable or
    /// unparseable files are logged and skipped; returns the number of types
    /// added.
    pub fn load_file(&mut self, path: &Path) -> usize {
        let bytes = match fs::read(path) {
            Ok(bytes) => bytes,
            Err(err) => {
                warn!(path = %path.display(), error = %err, "skipping unreadable type descriptor");
                return 0;
            }
        };
        match serde_json::from_slice::<DescriptorFile>(&bytes) {
            Ok(DescriptorFile::One(ty)) => {
                self.insert(ty);
                1
            }
            Ok(DescriptorFile::Many(types)) => {
                let n = types.len();
                for ty in types {
                    self.insert(ty);
                }
                n
            }
            Err(err) => {
                warn!(path = %path.display(), error = %err, "skipping malformed type descriptor");
                0
            }
        }
    }
}

impl TypeGraph for DescriptorGraph {
    fn type_names(&self) -> Vec<&str> {
        self.types.keys().map(String::as_str).collect()
    }

    fn resolve(&self, name: &str) -> Option<&TypeDef> {
        self.types.get(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn descriptor_defaults_apply() {
        let ty: TypeDef = serde_json::from_str(
            r#"{
                "name": "com.acme.Foo",
                "constructors": [{}, {"visibility": "protected", "params": ["int"]}],
                "methods": [
                    {"name": "a"},
                    {"name": "b", "visibility": "private", "params": ["int"], "returns": "long"}
                ]
            }"#,
        )
        .unwrap();
        assert_eq!(ty.kind, TypeKind::Class);
        assert_eq!(ty.package(), "com.acme");
        assert_eq!(ty.methods[0].visibility, Visibility::Public);
        assert_eq!(ty.methods[0].return_type, "void");
        assert_eq!(ty.methods[1].visibility, Visibility::Private);
        assert_eq!(ty.methods[1].params, vec!["int".to_string()]);
        assert_eq!(ty.constructors[0], ConstructorDef::default());
        assert_eq!(ty.constructors[1].visibility, Visibility::Protected);
    }

    #[test]
    fn loads_single_and_array_files_and_skips_garbage() {
        let tmp = TempDir::new().unwrap();
        let one = tmp.path().join("Foo.type.json");
        let many = tmp.path().join("pkg.type.json");
        let bad = tmp.path().join("Bad.type.json");
        fs::write(&one, r#"{"name":"com.acme.Foo"}"#).unwrap();
        fs::write(
            &many,
            r#"[{"name":"com.acme.Bar"},{"name":"com.acme.Api","kind":"interface"}]"#,
        )
        .unwrap();
        fs::write(&bad, "{not json").unwrap();

        let mut graph = DescriptorGraph::new();
        assert_eq!(graph.load_file(&one), 1);
        assert_eq!(graph.load_file(&many), 2);
        assert_eq!(graph.load_file(&bad), 0);
        assert_eq!(graph.load_file(&tmp.path().join("missing.type.json")), 0);

        assert_eq!(graph.type_names(), vec!["com.acme.Api", "com.acme.Bar", "com.acme.Foo"]);
        assert!(graph.resolve("com.acme.Api").unwrap().is_interface());
    }

    #[test]
    fn same_shape_ignores_return_type_and_modifiers() {
        let a = MethodDef {
            name: "m".into(),
            visibility: Visibility::Public,
            is_static: false,
            is_synthetic: false,
            params: vec!["int".into()],
            return_type: "void".into(),
        };
        let mut b = a.clone();
        b.visibility = Visibility::Protected;
        b.return_type = "java.lang.Object".into();
        assert!(a.same_shape(&b));
        b.params.push("int".into());
        assert!(!a.same_shape(&b));
    }
}
