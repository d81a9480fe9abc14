use std::collections::BTreeSet;

/// Map types recognized out of the box, by fully-qualified name.
pub const DEFAULT_MAP_TYPES: &[&str] = &[
    "java.util.HashMap",
    "java.util.LinkedHashMap",
    "java.util.TreeMap",
    "java.util.Hashtable",
    "java.util.IdentityHashMap",
    "java.util.WeakHashMap",
    "java.util.EnumMap",
    "java.util.concurrent.ConcurrentHashMap",
    "java.util.concurrent.ConcurrentSkipListMap",
    "std::collections::HashMap",
    "std::collections::BTreeMap",
];

/// Simple-name suffixes recognized out of the box.
pub const DEFAULT_MAP_SUFFIXES: &[&str] = &["Map"];

/// Decides which types are rendered and traversed as maps.
///
/// Map-like objects are shown as key/value entries instead of their
/// internal bucket structure. The set of such types depends on the
/// inspected ecosystem, so it is configuration rather than a fixed list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MapTypePolicy {
    exact: BTreeSet<String>,
    suffixes: Vec<String>,
}

impl Default for MapTypePolicy {
    fn default() -> Self {
        Self {
            exact: DEFAULT_MAP_TYPES.iter().map(|t| t.to_string()).collect(),
            suffixes: DEFAULT_MAP_SUFFIXES.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl MapTypePolicy {
    /// A policy that recognizes nothing: every object is an ordinary object.
    pub fn none() -> Self {
        Self {
            exact: BTreeSet::new(),
            suffixes: Vec::new(),
        }
    }

    pub fn with_type(mut self, type_name: impl Into<String>) -> Self {
        self.exact.insert(type_name.into());
        self
    }

    pub fn with_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.suffixes.push(suffix.into());
        self
    }

    /// Parses a comma-separated list. `*Suffix` entries match by simple-name
    /// suffix, anything else by exact name. Blank entries are ignored.
    pub fn from_list(list: &str) -> Self {
        list.split(',')
            .map(str::trim)
            .filter(|entry| !entry.is_empty())
            .fold(Self::none(), |policy, entry| match entry.strip_prefix('*') {
                Some(suffix) if !suffix.is_empty() => policy.with_suffix(suffix),
                Some(_) => policy,
                None => policy.with_type(entry),
            })
    }

    pub fn is_map_type(&self, type_name: &str) -> bool {
        let erased = erase_generics(type_name);
        let simple = simple_type_name(erased);
        self.exact.contains(erased)
            || self.exact.contains(simple)
            || self.suffixes.iter().any(|suffix| simple.ends_with(suffix.as_str()))
    }
}

/// Strips a trailing generic argument list: `HashMap<K, V>` -> `HashMap`.
pub fn erase_generics(type_name: &str) -> &str {
    match type_name.find('<') {
        Some(start) => type_name[..start].trim_end(),
        None => type_name.trim(),
    }
}

/// Drops package or module qualifiers: `java.util.HashMap` -> `HashMap`,
/// `std::collections::BTreeMap` -> `BTreeMap`.
pub fn simple_type_name(type_name: &str) -> &str {
    let erased = erase_generics(type_name);
    let after_path = erased.rsplit("::").next().unwrap_or(erased);
    after_path.rsplit('.').next().unwrap_or(after_path)
}
