//! Builds a [`CodeBaseModel`] from a type graph.
//!
//! Constructors are tracked as declared on their class.
//! For every in-scope class the scanner computes, per candidate method, the
//! signature as seen on the class itself and the signature of the closest
//! in-scope ancestor that declares it. Where the two differ (a proxy or AOP
//! subclass re-declaring a base method, or a class inheriting one) the former
//! is recorded as an override of the latter.

use std::{collections::HashSet, time::Instant};

use tracing::{debug, info, warn};

use crate::{
    codebase::CodeBase,
    error::ScanError,
    filter::MethodFilter,
    fingerprint::Fingerprint,
    graph::{MethodDef, TypeDef, TypeGraph},
    model::CodeBaseModel,
    normalize::is_synthetic_type,
    signature::{Signature, Visibility, package_of},
};

/// Marker selecting the unnamed default package, which no prefix covers.
pub const DEFAULT_PACKAGE: &str = "<default>";

/// Package prefixes to scan and to exclude. Matching is per package segment:
/// `com.acme` covers `com.acme` and `com.acme.web`, not `com.acmex`.
/// [`DEFAULT_PACKAGE`] matches types without a package.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ScanScope {
    packages: Vec<String>,
    excludes: Vec<String>,
}

impl ScanScope {
    pub fn new<S: AsRef<str>>(packages: &[S], excludes: &[S]) -> Result<Self, ScanError> {
        let packages = clean_prefixes(packages);
        if packages.is_empty() {
            return Err(ScanError::EmptyScope);
        }
        Ok(Self {
            packages,
            excludes: clean_prefixes(excludes),
        })
    }

    pub fn packages(&self) -> &[String] {
        &self.packages
    }

    pub fn includes(&self, package: &str) -> bool {
        self.packages.iter().any(|p| within(package, p))
    }

    pub fn excludes(&self, package: &str) -> bool {
        self.excludes.iter().any(|p| within(package, p))
    }
}

fn clean_prefixes<S: AsRef<str>>(prefixes: &[S]) -> Vec<String> {
    prefixes
        .iter()
        .map(|p| {
            let p = p.as_ref().trim();
            let p = p.strip_suffix(".*").unwrap_or(p);
            p.trim_end_matches('.').to_string()
        })
        .filter(|p| !p.is_empty())
        .collect()
}

fn within(package: &str, prefix: &str) -> bool {
    if prefix == DEFAULT_PACKAGE {
        return package.is_empty();
    }
    package
        .strip_prefix(prefix)
        .is_some_and(|rest| rest.is_empty() || rest.starts_with('.'))
}

/// The code-base scanner.
#[derive(Clone, Debug)]
pub struct SignatureResolver {
    scope: ScanScope,
    filter: MethodFilter,
}

impl SignatureResolver {
    pub fn new(scope: ScanScope, filter: MethodFilter) -> Self {
        Self { scope, filter }
    }

    /// Loads the code base's descriptors and scans them.
    pub fn scan(&self, code_base: &CodeBase) -> Result<CodeBaseModel, ScanError> {
        let (graph, fingerprint) = code_base.load_graph()?;
        Ok(self.scan_graph(&graph, fingerprint))
    }

    pub fn scan_graph(&self, graph: &dyn TypeGraph, fingerprint: Fingerprint) -> CodeBaseModel {
        let started = Instant::now();
        let mut model = CodeBaseModel::new(fingerprint);
        let mut visited = HashSet::new();
        for name in graph.type_names() {
            if self.scope.includes(package_of(name)) {
                self.scan_type(graph, name, &mut model, &mut visited);
            }
        }

        info!(
            classes = model.num_classes,
            tracked = model.tracked.len(),
            overrides = model.overrides.len(),
            excluded = model.excluded.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "code base scanned"
        );
        if model.tracked.is_empty() {
            warn!(packages = ?self.scope.packages(), "scan found no methods to track");
        }
        model
    }

    fn scan_type(
        &self,
        graph: &dyn TypeGraph,
        name: &str,
        model: &mut CodeBaseModel,
        visited: &mut HashSet<String>,
    ) {
        if !visited.insert(name.to_string()) {
            return;
        }
        let Some(ty) = graph.resolve(name) else {
            warn!(class = name, "skipping class without descriptor");
            return;
        };
        if !ty.is_interface() {
            match self.scan_class(graph, ty, model) {
                Ok(()) => model.num_classes += 1,
                Err(err) => warn!(class = name, error = %err, "skipping class that failed to load"),
            }
        }
        for nested in &ty.nested {
            self.scan_type(graph, nested, model, visited);
        }
    }

    fn scan_class(
        &self,
        graph: &dyn TypeGraph,
        ty: &TypeDef,
        model: &mut CodeBaseModel,
    ) -> Result<(), ScanError> {
        let chain = self.superclass_chain(graph, ty)?;
        if !is_synthetic_type(&ty.name) {
            let excluded = self.scope.excludes(ty.package());
            for ctor in &ty.constructors {
                if ctor.is_synthetic || !self.filter.admits(ctor.visibility) {
                    continue;
                }
                let signature = Signature::of_constructor(&ty.name, ctor);
                if excluded {
                    model.insert_excluded(signature);
                } else {
                    model.insert_tracked(signature);
                }
            }
        }
        for method in candidates(&chain) {
            if method.is_synthetic || !self.filter.should_include(method) {
                continue;
            }
            let Some((owner, declared)) = self.declaring(&chain, method) else {
                debug!(class = %ty.name, method = %method.name, "no in-scope declaring class");
                continue;
            };
            let this = Signature::of_method(&ty.name, method);
            let declaring = Signature::of_method(&owner.name, declared);
            if self.scope.excludes(owner.package()) {
                model.insert_excluded(declaring.clone());
                model.insert_override(this, declaring);
            } else if this != declaring {
                model.insert_override(this, declaring);
            } else {
                model.insert_tracked(declaring);
            }
        }
        Ok(())
    }

    /// `ty` followed by its resolvable superclasses. A missing in-scope
    /// superclass fails the class; a missing out-of-scope one ends the chain.
    fn superclass_chain<'g>(
        &self,
        graph: &'g dyn TypeGraph,
        ty: &'g TypeDef,
    ) -> Result<Vec<&'g TypeDef>, ScanError> {
        let mut chain = vec![ty];
        let mut next = ty.superclass.as_deref();
        while let Some(name) = next {
            if chain.iter().any(|t| t.name == name) {
                break;
            }
            match graph.resolve(name) {
                Some(parent) => {
                    chain.push(parent);
                    next = parent.superclass.as_deref();
                }
                None if self.scope.includes(package_of(name)) => {
                    return Err(ScanError::MissingType(name.to_string()));
                }
                None => break,
            }
        }
        Ok(chain)
    }

    /// Closest in-scope, non-synthetic class in `chain` declaring `method`.
    /// The walk stops at the first class outside the scope.
    fn declaring<'g>(
        &self,
        chain: &[&'g TypeDef],
        method: &MethodDef,
    ) -> Option<(&'g TypeDef, &'g MethodDef)> {
        for ty in chain {
            if !self.scope.includes(ty.package()) {
                return None;
            }
            if is_synthetic_type(&ty.name) {
                continue;
            }
            if let Some(found) = ty.find(method) {
                return Some((*ty, found));
            }
        }
        None
    }
}

/// Methods declared on the class plus public methods inherited from its
/// superclasses; the most derived declaration of each name and parameter
/// list wins.
fn candidates<'g>(chain: &[&'g TypeDef]) -> Vec<&'g MethodDef> {
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for (depth, ty) in chain.iter().enumerate() {
        for method in &ty.methods {
            if depth > 0 && method.visibility != Visibility::Public {
                continue;
            }
            if seen.insert((method.name.as_str(), method.params.as_slice())) {
                out.push(method);
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{ConstructorDef, DescriptorGraph, TypeKind};

    fn m(name: &str, visibility: Visibility) -> MethodDef {
        MethodDef {
            name: name.into(),
            visibility,
            is_static: false,
            is_synthetic: false,
            params: Vec::new(),
            return_type: "void".into(),
        }
    }

    fn class(name: &str, superclass: Option<&str>, methods: Vec<MethodDef>) -> TypeDef {
        TypeDef {
            superclass: superclass.map(str::to_string),
            methods,
            ..TypeDef::class(name)
        }
    }

    fn resolver(packages: &[&str], excludes: &[&str], policy: &str) -> SignatureResolver {
        let scope = ScanScope::new(packages, excludes).unwrap();
        SignatureResolver::new(scope, MethodFilter::parse(policy))
    }

    fn scan(
        graph: &dyn TypeGraph,
        packages: &[&str],
        excludes: &[&str],
        policy: &str,
    ) -> CodeBaseModel {
        resolver(packages, excludes, policy).scan_graph(graph, Fingerprint::default())
    }

    #[test]
    fn scope_matches_whole_segments() {
        let scope = ScanScope::new(&["com.acme.*", "org.x."], &["com.acme.gen"]).unwrap();
        assert!(scope.includes("com.acme"));
        assert!(scope.includes("com.acme.web"));
        assert!(!scope.includes("com.acmex"));
        assert!(scope.includes("org.x"));
        assert!(scope.excludes("com.acme.gen.sub"));
        assert!(!scope.excludes("com.acme.generated"));
    }

    #[test]
    fn default_package_needs_its_marker() {
        let graph = DescriptorGraph::from_types([
            class("Base", None, vec![m("m", Visibility::Public)]),
            class("Base$$Proxy123", Some("Base"), vec![m("m", Visibility::Public)]),
            class("com.acme.Foo", None, vec![m("a", Visibility::Public)]),
        ]);
        let model = scan(&graph, &["com.acme"], &[], "public");
        assert!(!model.tracked.contains("public void Base.m()"));

        let model = scan(&graph, &[DEFAULT_PACKAGE], &[], "public");
        assert_eq!(
            model.tracked.iter().map(Signature::as_str).collect::<Vec<_>>(),
            vec!["public void Base.m()"]
        );
        assert_eq!(
            model.overrides.get("public void Base$$Proxy123.m()").map(Signature::as_str),
            Some("public void Base.m()")
        );
    }

    #[test]
    fn empty_scope_is_rejected() {
        let empty: [&str; 0] = [];
        assert!(matches!(ScanScope::new(&empty, &empty), Err(ScanError::EmptyScope)));
        assert!(matches!(ScanScope::new(&[" ", ".*"], &[]), Err(ScanError::EmptyScope)));
    }

    #[test]
    fn subclass_override_is_tracked_on_itself() {
        let graph = DescriptorGraph::from_types([
            class("com.acme.Base", None, vec![m("m", Visibility::Public)]),
            class("com.acme.Sub", Some("com.acme.Base"), vec![m("m", Visibility::Public)]),
        ]);
        let model = scan(&graph, &["com.acme"], &[], "public");
        assert!(model.tracked.contains("public void com.acme.Base.m()"));
        assert!(model.tracked.contains("public void com.acme.Sub.m()"));
        assert!(model.overrides.is_empty());
        assert_eq!(model.num_classes, 2);
    }

    #[test]
    fn inherited_methods_map_to_their_declaring_class() {
        let graph = DescriptorGraph::from_types([
            class(
                "com.acme.Base",
                None,
                vec![m("m", Visibility::Public), m("p", Visibility::Protected)],
            ),
            class("com.acme.Sub", Some("com.acme.Base"), vec![]),
        ]);
        let model = scan(&graph, &["com.acme"], &[], "protected");
        assert_eq!(
            model.overrides.get("public void com.acme.Sub.m()").map(Signature::as_str),
            Some("public void com.acme.Base.m()")
        );
        // Only public methods are inherited as candidates.
        assert!(!model.overrides.contains_key("protected void com.acme.Sub.p()"));
        assert!(model.tracked.contains("protected void com.acme.Base.p()"));
    }

    #[test]
    fn methods_declared_outside_scope_are_dropped() {
        let graph = DescriptorGraph::from_types([
            class("org.framework.Base", None, vec![m("run", Visibility::Public)]),
            class("com.acme.Job", Some("org.framework.Base"), vec![m("work", Visibility::Public)]),
        ]);
        let model = scan(&graph, &["com.acme"], &[], "public");
        assert_eq!(
            model.tracked.iter().map(Signature::as_str).collect::<Vec<_>>(),
            vec!["public void com.acme.Job.work()"]
        );
        assert!(model.overrides.is_empty());
    }

    #[test]
    fn excluded_packages_are_set_aside() {
        let graph = DescriptorGraph::from_types([
            class("com.acme.gen.Stub", None, vec![m("x", Visibility::Public)]),
            class("com.acme.Impl", Some("com.acme.gen.Stub"), vec![]),
        ]);
        let model = scan(&graph, &["com.acme"], &["com.acme.gen"], "public");
        assert!(model.tracked.is_empty());
        assert!(model.excluded.contains("public void com.acme.gen.Stub.x()"));
        assert_eq!(
            model.overrides.get("public void com.acme.Impl.x()").map(Signature::as_str),
            Some("public void com.acme.gen.Stub.x()")
        );
    }

    #[test]
    fn missing_in_scope_superclass_skips_only_that_class() {
        let graph = DescriptorGraph::from_types([
            class("com.acme.Orphan", Some("com.acme.Gone"), vec![m("a", Visibility::Public)]),
            class("com.acme.Fine", Some("java.lang.Object"), vec![m("b", Visibility::Public)]),
        ]);
        let model = scan(&graph, &["com.acme"], &[], "public");
        assert_eq!(model.num_classes, 1);
        assert!(model.tracked.contains("public void com.acme.Fine.b()"));
        assert!(!model.tracked.contains("public void com.acme.Orphan.a()"));
    }

    #[test]
    fn constructors_are_tracked_on_their_own_class() {
        let ctor = |visibility, params: &[&str]| ConstructorDef {
            visibility,
            is_synthetic: false,
            params: params.iter().map(|p| p.to_string()).collect(),
        };
        let base = TypeDef {
            constructors: vec![
                ctor(Visibility::Public, &[]),
                ctor(Visibility::Private, &["int"]),
            ],
            ..TypeDef::class("com.acme.Base")
        };
        let sub = TypeDef {
            superclass: Some("com.acme.Base".into()),
            constructors: vec![ctor(Visibility::Protected, &["java.lang.String"])],
            ..TypeDef::class("com.acme.Sub")
        };
        let stub = TypeDef {
            constructors: vec![ctor(Visibility::Public, &[])],
            ..TypeDef::class("com.acme.gen.Stub")
        };
        let proxy = TypeDef {
            superclass: Some("com.acme.Base".into()),
            constructors: vec![ctor(Visibility::Public, &[])],
            ..TypeDef::class("com.acme.Base$$Proxy1")
        };
        let graph = DescriptorGraph::from_types([base, sub, stub, proxy]);

        let model = scan(&graph, &["com.acme"], &["com.acme.gen"], "protected");
        assert_eq!(
            model.tracked.iter().map(Signature::as_str).collect::<Vec<_>>(),
            vec!["protected com.acme.Sub(java.lang.String)", "public com.acme.Base()"]
        );
        assert!(model.excluded.contains("public com.acme.gen.Stub()"));
        // Constructors are not inherited.
        assert!(model.overrides.is_empty());

        let model = scan(&graph, &["com.acme"], &[], "all");
        assert!(model.tracked.contains("private com.acme.Base(int)"));
    }

    #[test]
    fn interfaces_and_synthetic_methods_are_skipped_and_nested_types_scanned() {
        let mut bridge = m("compareTo", Visibility::Public);
        bridge.is_synthetic = true;
        let api = TypeDef {
            kind: TypeKind::Interface,
            methods: vec![m("call", Visibility::Public)],
            ..TypeDef::class("com.acme.Api")
        };
        let outer = TypeDef {
            nested: vec!["com.acme.Outer$Inner".into()],
            methods: vec![bridge],
            ..TypeDef::class("com.acme.Outer")
        };
        let inner = class("com.acme.Outer$Inner", None, vec![m("run", Visibility::Public)]);
        // Only the outer class is listed; the nested one is reached through it.
        struct OuterOnly(DescriptorGraph);
        impl TypeGraph for OuterOnly {
            fn type_names(&self) -> Vec<&str> {
                vec!["com.acme.Api", "com.acme.Outer"]
            }
            fn resolve(&self, name: &str) -> Option<&TypeDef> {
                self.0.resolve(name)
            }
        }
        let graph = OuterOnly(DescriptorGraph::from_types([api, outer, inner]));
        let model = scan(&graph, &["com.acme"], &[], "public");
        assert_eq!(
            model.tracked.iter().map(Signature::as_str).collect::<Vec<_>>(),
            vec!["public void com.acme.Outer$Inner.run()"]
        );
        assert_eq!(model.num_classes, 2);
    }
}
