//! Normalization of raw call-site signatures.
//!
//! Instrumentation reports signatures as the runtime sees them, which
//! includes methods of classes generated by proxy and AOP frameworks. The
//! rule table below decides, per pattern, whether such a signature is noise to
//! drop, a modifier to strip, or a proxy class segment to fold back into the
//! declaring type. Supporting a new framework means adding rows, not code.

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::trace;

use crate::signature::Signature;

/// One row of the rule table.
#[derive(Clone, Copy, Debug)]
pub enum Rule {
    /// Synthetic dispatch method with no source counterpart; drop the invocation.
    Noise { name: &'static str, pattern: &'static str },
    /// Modifier that does not affect identity; removed with trailing whitespace.
    Modifier { name: &'static str, pattern: &'static str },
    /// Generated class segment; the match is replaced by `replacement`.
    ProxySegment {
        name: &'static str,
        pattern: &'static str,
        replacement: &'static str,
    },
}

impl Rule {
    fn pattern(&self) -> &'static str {
        match self {
            Rule::Noise { pattern, .. }
            | Rule::Modifier { pattern, .. }
            | Rule::ProxySegment { pattern, .. } => *pattern,
        }
    }
}

pub const RULES: &[Rule] = &[
    Rule::Noise {
        name: "guice-fast-class-get-index",
        pattern: r"(?:\.\.|\$\$)FastClassByGuice.*\.getIndex\(java\.lang\.Class\[\]\)$",
    },
    Rule::Noise {
        name: "guice-fast-class-new-instance",
        pattern: r"(?:\.\.|\$\$)FastClassByGuice.*\.newInstance\(int, java\.lang\.Object\[\]\)$",
    },
    Rule::Noise {
        name: "guice-fast-class-invoke",
        pattern: r"(?:\.\.|\$\$)FastClassByGuice.*\.invoke\(int, java\.lang\.Object, java\.lang\.Object\[\]\)$",
    },
    Rule::Noise {
        name: "guice-cglib-parameters",
        pattern: r"\(com\.google\.inject\.internal\.cglib.*\)$",
    },
    Rule::Noise {
        name: "cglib-fast-class",
        pattern: r"\$\$FastClassBy(?:Spring)?CGLIB\$\$",
    },
    Rule::Noise {
        name: "cglib-callback-hook",
        pattern: r"\.CGLIB\$\w+\(",
    },
    Rule::Noise {
        name: "jdk-dynamic-proxy",
        pattern: r"\.\$Proxy\d+\.",
    },
    Rule::Modifier {
        name: "identity-neutral-modifier",
        pattern: r"\b(?:final|synchronized|native|strictfp)\s+",
    },
    Rule::ProxySegment {
        name: "guice-enhancer",
        pattern: r"(?:\.\.|\$\$)EnhancerByGuice(?:\.\.|\$\$)[0-9a-fA-F]+\.(\w+\()",
        replacement: ".${1}",
    },
    Rule::ProxySegment {
        name: "cglib-enhancer",
        pattern: r"\$\$EnhancerBy(?:Spring)?CGLIB\$\$[0-9a-fA-F]+(?:_\d+)?\.(\w+\()",
        replacement: ".${1}",
    },
    Rule::ProxySegment {
        name: "hibernate-proxy",
        pattern: r"\$HibernateProxy\$\w+\.(\w+\()",
        replacement: ".${1}",
    },
    Rule::ProxySegment {
        name: "byte-buddy",
        pattern: r"\$ByteBuddy\$\w+\.(\w+\()",
        replacement: ".${1}",
    },
    Rule::ProxySegment {
        name: "generic-proxy",
        pattern: r"\$\$Proxy\d*\.(\w+\()",
        replacement: ".${1}",
    },
];

/// Markers identifying classes generated at runtime. The declaring-class walk
/// steps over such classes.
pub const SYNTHETIC_TYPE_MARKERS: &[&str] =
    &["$$", "..EnhancerByGuice..", "$HibernateProxy$", "$ByteBuddy$"];

pub fn is_synthetic_type(type_name: &str) -> bool {
    SYNTHETIC_TYPE_MARKERS
        .iter()
        .any(|marker| type_name.contains(marker))
}

struct Compiled {
    rule: Rule,
    regex: Regex,
}

static COMPILED: Lazy<Vec<Compiled>> = Lazy::new(|| {
    RULES
        .iter()
        .map(|rule| Compiled {
            rule: *rule,
            regex: Regex::new(rule.pattern()).expect("normalization rule patterns must compile"),
        })
        .collect()
});

/// Applies the rule table. Stateless and cheap to clone.
#[derive(Clone, Copy, Debug, Default)]
pub struct Normalizer;

impl Normalizer {
    pub fn new() -> Self {
        Self
    }

    /// Full normalization: `None` for noise, otherwise the apparent declaring form.
    ///
    /// Rewrites are applied until nothing changes. Every rewrite shortens the
    /// text, so this terminates, and the fixpoint makes the result idempotent.
    pub fn normalize(&self, raw: &str) -> Option<Signature> {
        self.run(raw, true)
    }

    /// Drops noise and strips modifiers but keeps proxy segments, yielding the
    /// as-loaded form used as override-map key.
    pub fn strip_modifiers(&self, raw: &str) -> Option<Signature> {
        self.run(raw, false)
    }

    /// Name of the first noise rule matching `text`, if any.
    pub fn noise_rule(&self, text: &str) -> Option<&'static str> {
        COMPILED.iter().find_map(|c| match c.rule {
            Rule::Noise { name, .. } if c.regex.is_match(text) => Some(name),
            _ => None,
        })
    }

    fn run(&self, raw: &str, fold_proxies: bool) -> Option<Signature> {
        let mut text = collapse_whitespace(raw);
        loop {
            if text.is_empty() || self.noise_rule(&text).is_some() {
                return None;
            }
            let next = collapse_whitespace(&self.rewrite_once(&text, fold_proxies));
            if next == text {
                return Some(Signature::from(text));
            }
            text = next;
        }
    }

    fn rewrite_once(&self, text: &str, fold_proxies: bool) -> String {
        let mut out = text.to_string();
        for compiled in COMPILED.iter() {
            let (name, replacement) = match compiled.rule {
                Rule::Noise { .. } => continue,
                Rule::Modifier { name, .. } => (name, ""),
                Rule::ProxySegment {
                    name,
                    replacement,
                    ..
                } if fold_proxies => (name, replacement),
                Rule::ProxySegment { .. } => continue,
            };
            let rewritten = compiled.regex.replace_all(&out, replacement).into_owned();
            if rewritten != out {
                trace!(rule = name, "rewrote signature");
                out = rewritten;
            }
        }
        out
    }
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn norm(raw: &str) -> Option<String> {
        Normalizer::new().normalize(raw).map(Signature::into_string)
    }

    #[test]
    fn every_rule_compiles() {
        assert_eq!(COMPILED.len(), RULES.len());
    }

    #[test]
    fn strips_identity_neutral_modifiers() {
        assert_eq!(
            norm("public final void com.acme.Foo.a()").as_deref(),
            Some("public void com.acme.Foo.a()")
        );
        assert_eq!(
            norm("  public  final synchronized   int com.acme.Foo.count(int)").as_deref(),
            Some("public int com.acme.Foo.count(int)")
        );
        assert_eq!(
            norm("public void com.acme.finals.Foo.a()").as_deref(),
            Some("public void com.acme.finals.Foo.a()")
        );
    }

    #[test]
    fn folds_proxy_segments() {
        assert_eq!(
            norm("public void com.acme.Service..EnhancerByGuice..c1d2e3.save(java.lang.String)")
                .as_deref(),
            Some("public void com.acme.Service.save(java.lang.String)")
        );
        assert_eq!(
            norm("public void com.acme.Service$$EnhancerBySpringCGLIB$$0a1b2c.save()").as_deref(),
            Some("public void com.acme.Service.save()")
        );
        assert_eq!(
            norm("public void com.acme.Base$$Proxy123.m()").as_deref(),
            Some("public void com.acme.Base.m()")
        );
        assert_eq!(
            norm("public void com.acme.Base$$Proxy1$$Proxy2.m()").as_deref(),
            Some("public void com.acme.Base.m()")
        );
    }

    #[test]
    fn drops_synthetic_dispatch_methods() {
        assert_eq!(
            norm("public int com.acme.Foo..FastClassByGuice..1a2b.getIndex(java.lang.Class[])"),
            None
        );
        let invoke = "public java.lang.Object com.acme.Foo..FastClassByGuice..1a2b\
                      .invoke(int, java.lang.Object, java.lang.Object[])";
        assert_eq!(norm(invoke), None);
        let hook = "public static void com.acme.Foo$$EnhancerBySpringCGLIB$$1a2b.CGLIB$STATICHOOK1()";
        assert_eq!(norm(hook), None);
        assert_eq!(norm("public final void com.sun.proxy.$Proxy12.close()"), None);
        assert_eq!(norm("   "), None);
    }

    #[test]
    fn strip_modifiers_keeps_proxy_segments() {
        let sig = Normalizer::new()
            .strip_modifiers("public final void com.acme.Base$$Proxy123.m()")
            .expect("not noise");
        assert_eq!(sig.as_str(), "public void com.acme.Base$$Proxy123.m()");
    }

    #[test]
    fn synthetic_types_are_recognized() {
        assert!(is_synthetic_type("com.acme.Base$$Proxy123"));
        assert!(is_synthetic_type("com.acme.Base$HibernateProxy$x1"));
        assert!(!is_synthetic_type("com.acme.Outer$Inner"));
    }

    proptest! {
        #[test]
        fn normalization_is_idempotent(
            visibility in prop::sample::select(vec!["public ", "protected ", "private ", ""]),
            modifiers in prop::collection::vec(
                prop::sample::select(vec!["final ", "static ", "synchronized ", "  "]),
                0..3,
            ),
            class in "[a-z]{1,6}\\.[A-Z][a-z]{0,6}",
            proxy in prop::sample::select(vec![
                "", "$$Proxy7", "..EnhancerByGuice..ab12", "$$EnhancerByCGLIB$$ff00",
                "$$Proxy1$$Proxy2", "..FastClassByGuice..9c",
            ]),
            method in "[a-z][a-zA-Z]{0,8}",
            params in prop::sample::select(
                vec!["", "int", "int, java.lang.Object[]", "java.lang.Class[]"],
            ),
        ) {
            let modifiers = modifiers.concat();
            let raw = format!("{visibility}{modifiers}void {class}{proxy}.{method}({params})");
            let once = Normalizer::new().normalize(&raw);
            let twice = once.as_ref().and_then(|s| Normalizer::new().normalize(s.as_str()));
            prop_assert_eq!(once, twice);
        }
    }
}
