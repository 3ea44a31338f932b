use std::{collections::BTreeMap, fmt, sync::Arc};

/// Identifies the propagator instance that owns a derived object.
pub const MANAGED_BY: &str = "ingress-propagator.buttah.cloud/managed-by";

/// Names the source ingress that a derived object was produced from.
pub const PROPAGATOR: &str = "ingress-propagator.buttah.cloud/propagator";

#[derive(Clone, Debug, Eq, Default)]
pub struct Labels(Arc<Map>);

pub type Map = BTreeMap<String, String>;

/// An equality-based label selector.
///
/// Derived objects are found by the pair of labels written by
/// [`Selector::propagation`], never by name.
#[derive(Clone, Debug, Eq, PartialEq, Default)]
pub struct Selector {
    match_labels: Map,
}

// === Selector ===

impl Selector {
    pub fn from_map(match_labels: Map) -> Self {
        Self { match_labels }
    }

    /// Selects every object derived by the propagator `identifier` from the
    /// source ingress named `source`.
    pub fn propagation(identifier: &str, source: &str) -> Self {
        Self::from_iter([
            (MANAGED_BY.to_string(), identifier.to_string()),
            (PROPAGATOR.to_string(), source.to_string()),
        ])
    }

    pub fn matches(&self, labels: &Labels) -> bool {
        self.match_labels
            .iter()
            .all(|(k, v)| labels.0.get(k) == Some(v))
    }

    /// The labels an object must carry to be matched by this selector.
    pub fn to_map(&self) -> Map {
        self.match_labels.clone()
    }
}

/// Renders the selector in the `k=v,k=v` form accepted by the API server.
impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (k, v) in &self.match_labels {
            if !first {
                f.write_str(",")?;
            }
            first = false;
            write!(f, "{k}={v}")?;
        }
        Ok(())
    }
}

impl std::iter::FromIterator<(String, String)> for Selector {
    fn from_iter<T: IntoIterator<Item = (String, String)>>(iter: T) -> Self {
        Self::from_map(iter.into_iter().collect())
    }
}

impl std::iter::FromIterator<(&'static str, &'static str)> for Selector {
    fn from_iter<T: IntoIterator<Item = (&'static str, &'static str)>>(iter: T) -> Self {
        Self::from_map(
            iter.into_iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        )
    }
}

// === Labels ===

impl From<Map> for Labels {
    #[inline]
    fn from(labels: Map) -> Self {
        Self(Arc::new(labels))
    }
}

impl From<Option<Map>> for Labels {
    #[inline]
    fn from(labels: Option<Map>) -> Self {
        labels.unwrap_or_default().into()
    }
}

impl AsRef<Map> for Labels {
    #[inline]
    fn as_ref(&self) -> &Map {
        self.0.as_ref()
    }
}

impl<T: AsRef<Map>> std::cmp::PartialEq<T> for Labels {
    #[inline]
    fn eq(&self, t: &T) -> bool {
        self.0.as_ref().eq(t.as_ref())
    }
}

impl std::iter::FromIterator<(String, String)> for Labels {
    fn from_iter<T: IntoIterator<Item = (String, String)>>(iter: T) -> Self {
        Self(Arc::new(iter.into_iter().collect()))
    }
}

impl std::iter::FromIterator<(&'static str, &'static str)> for Labels {
    fn from_iter<T: IntoIterator<Item = (&'static str, &'static str)>>(iter: T) -> Self {
        iter.into_iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use maplit::btreemap;

    #[test]
    fn test_matches() {
        for (selector, labels, matches, msg) in &[
            (Selector::default(), Labels::default(), true, "empty match"),
            (
                Selector::from_iter(Some(("foo", "bar"))),
                Labels::from_iter(Some(("foo", "bar"))),
                true,
                "exact label match",
            ),
            (
                Selector::from_iter(Some(("foo", "bar"))),
                Labels::from_iter(vec![("foo", "bar"), ("bah", "baz")]),
                true,
                "sufficient label match",
            ),
            (
                Selector::propagation("edge", "shop"),
                Labels::from_iter(vec![(MANAGED_BY, "edge"), (PROPAGATOR, "cart")]),
                false,
                "propagator mismatch",
            ),
            (
                Selector::propagation("edge", "shop"),
                Labels::from_iter(vec![(MANAGED_BY, "other"), (PROPAGATOR, "shop")]),
                false,
                "identifier mismatch",
            ),
        ] {
            assert_eq!(selector.matches(labels), *matches, "{}", msg);
        }
    }

    #[test]
    fn renders_label_selector() {
        let selector = Selector::propagation("edge", "shop");
        assert_eq!(
            selector.to_string(),
            "ingress-propagator.buttah.cloud/managed-by=edge,ingress-propagator.buttah.cloud/propagator=shop"
        );
        assert_eq!(
            selector.to_map(),
            btreemap! {
                MANAGED_BY.to_string() => "edge".to_string(),
                PROPAGATOR.to_string() => "shop".to_string(),
            }
        );
    }
}
