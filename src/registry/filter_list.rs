//! The nil/empty/star/list filter semantics shared by every list-valued
//! filter in the core: `toolsToExecute`, `toolsToAutoExecute`, and the
//! per-request include-clients / include-tools filters (spec §4.4).
//!
//! `nil` is deliberately ambiguous in the source: for client-level
//! inclusion it means "allow all", for tool-level gating it means
//! "deny all". [`NameFilter`] carries the list itself; callers supply the
//! default to apply when the filter is [`NameFilter::Unset`], preserving
//! that asymmetry explicitly at each call site rather than hiding it in
//! the type (see the Open Questions in `SPEC_FULL.md`).

use serde::{Deserialize, Serialize};

/// A list-valued filter in source form, before a caller-supplied default
/// resolves the `Unset` case.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum NameFilter {
    /// `nil` in the source: the caller must supply a default.
    Unset,
    /// An explicit list. `[]` denies everything; `["*"]` allows everything;
    /// any other list allows only the named entries.
    List(Vec<String>),
}

impl Default for NameFilter {
    fn default() -> Self {
        NameFilter::Unset
    }
}

impl NameFilter {
    pub fn all() -> Self {
        NameFilter::List(vec!["*".to_string()])
    }

    pub fn none() -> Self {
        NameFilter::List(Vec::new())
    }

    pub fn named<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        NameFilter::List(names.into_iter().map(Into::into).collect())
    }

    /// Resolve whether `name` is allowed. `default_when_unset` is applied
    /// only for [`NameFilter::Unset`]; `List` branches always apply the
    /// nil/empty/star/list rule themselves.
    pub fn allows(&self, name: &str, default_when_unset: bool) -> bool {
        match self {
            NameFilter::Unset => default_when_unset,
            NameFilter::List(list) => {
                if list.is_empty() {
                    false
                } else if list.iter().any(|n| n == "*") {
                    true
                } else {
                    list.iter().any(|n| n == name)
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unset_applies_caller_default() {
        assert!(NameFilter::Unset.allows("add", true));
        assert!(!NameFilter::Unset.allows("add", false));
    }

    #[test]
    fn empty_list_denies_all_regardless_of_default() {
        let f = NameFilter::none();
        assert!(!f.allows("add", true));
        assert!(!f.allows("add", false));
    }

    #[test]
    fn star_allows_all() {
        let f = NameFilter::all();
        assert!(f.allows("add", false));
        assert!(f.allows("anything", false));
    }

    #[test]
    fn explicit_list_allows_only_named() {
        let f = NameFilter::named(["add", "subtract"]);
        assert!(f.allows("add", false));
        assert!(!f.allows("multiply", false));
    }
}
