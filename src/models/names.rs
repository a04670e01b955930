use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Responsive upload bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Profile {
    Mobile,
    Desktop,
}

impl Profile {
    pub const ALL: [Profile; 2] = [Profile::Mobile, Profile::Desktop];

    pub fn as_str(&self) -> &'static str {
        match self {
            Profile::Mobile => "mobile",
            Profile::Desktop => "desktop",
        }
    }
}

/// size key -> stored file name
pub type SizeNames = BTreeMap<String, String>;

/// The `names` column of a file record.
///
/// Single-source kinds store a flat map; responsive kinds nest one map per
/// profile. Stored untagged, so the JSON is either `{"large": "a.webp"}` or
/// `{"desktop": {"large": "a.webp"}}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum VariantNames {
    Flat(SizeNames),
    Profiled(BTreeMap<Profile, SizeNames>),
}

impl Default for VariantNames {
    fn default() -> Self {
        VariantNames::Flat(SizeNames::new())
    }
}

impl VariantNames {
    pub fn shape(&self) -> &'static str {
        match self {
            VariantNames::Flat(_) => "flat",
            VariantNames::Profiled(_) => "profiled",
        }
    }

    /// Every non-empty file name, in key order.
    pub fn leaves(&self) -> Vec<&str> {
        let names: Box<dyn Iterator<Item = &String> + '_> = match self {
            VariantNames::Flat(map) => Box::new(map.values()),
            VariantNames::Profiled(profiles) => {
                Box::new(profiles.values().flat_map(|map| map.values()))
            }
        };
        names.map(String::as_str).filter(|n| !n.is_empty()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.leaves().is_empty()
    }

    /// Looks up a size. Flat maps ignore `profile`; profiled maps fall back
    /// to the other profile when the requested one lacks the size.
    pub fn get(&self, size: &str, profile: Option<Profile>) -> Option<&str> {
        match self {
            VariantNames::Flat(map) => map.get(size).map(String::as_str),
            VariantNames::Profiled(profiles) => {
                let preferred = profile.unwrap_or(Profile::Desktop);
                std::iter::once(preferred)
                    .chain(Profile::ALL.into_iter().filter(move |p| *p != preferred))
                    .find_map(|p| profiles.get(&p).and_then(|m| m.get(size)))
                    .map(String::as_str)
            }
        }
    }

    /// Layers `incoming` over `self`. Mismatched shapes are not merged:
    /// the incoming names replace the existing ones wholesale.
    pub fn merge(&self, incoming: &VariantNames) -> VariantNames {
        match (self, incoming) {
            (VariantNames::Flat(existing), VariantNames::Flat(new)) => {
                VariantNames::Flat(merge_names(existing, &as_patch(new)))
            }
            (VariantNames::Profiled(existing), VariantNames::Profiled(new)) => {
                let mut merged = existing.clone();
                for (profile, names) in new {
                    let base = merged.remove(profile).unwrap_or_default();
                    merged.insert(*profile, merge_names(&base, &as_patch(names)));
                }
                VariantNames::Profiled(merged)
            }
            _ => incoming.clone(),
        }
    }

    /// File names referenced by `self` that `next` no longer references.
    pub fn superseded_by(&self, next: &VariantNames) -> Vec<String> {
        let kept: BTreeSet<&str> = next.leaves().into_iter().collect();
        self.leaves()
            .into_iter()
            .filter(|name| !kept.contains(name))
            .map(str::to_string)
            .collect()
    }
}

/// Applies `patch` to `existing`: patch values win, keys only in `existing`
/// survive, and a `None` in the patch removes the key.
pub fn merge_names(existing: &SizeNames, patch: &BTreeMap<String, Option<String>>) -> SizeNames {
    let mut merged = existing.clone();
    for (key, value) in patch {
        match value {
            Some(name) => {
                merged.insert(key.clone(), name.clone());
            }
            None => {
                merged.remove(key);
            }
        }
    }
    merged
}

fn as_patch(names: &SizeNames) -> BTreeMap<String, Option<String>> {
    names
        .iter()
        .map(|(k, v)| (k.clone(), Some(v.clone())))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flat(pairs: &[(&str, &str)]) -> SizeNames {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn patch(pairs: &[(&str, Option<&str>)]) -> BTreeMap<String, Option<String>> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.map(str::to_string)))
            .collect()
    }

    #[test]
    fn merge_overrides_adds_and_keeps() {
        let merged = merge_names(
            &flat(&[("a", "A"), ("b", "B")]),
            &patch(&[("b", Some("B2")), ("c", Some("C"))]),
        );
        assert_eq!(merged, flat(&[("a", "A"), ("b", "B2"), ("c", "C")]));
    }

    #[test]
    fn merge_null_removes_key() {
        let merged = merge_names(
            &flat(&[("small", "s.jpg"), ("medium", "m.jpg")]),
            &patch(&[("small", None)]),
        );
        assert_eq!(merged, flat(&[("medium", "m.jpg")]));
    }

    #[test]
    fn merge_null_for_missing_key_is_noop() {
        let merged = merge_names(&flat(&[("a", "A")]), &patch(&[("z", None)]));
        assert_eq!(merged, flat(&[("a", "A")]));
    }

    #[test]
    fn flat_and_profiled_json_shapes() {
        let flat_names: VariantNames =
            serde_json::from_str(r#"{"large":"l.webp","thumb":"t.webp"}"#).unwrap();
        assert!(matches!(flat_names, VariantNames::Flat(ref m) if m.len() == 2));

        let profiled: VariantNames =
            serde_json::from_str(r#"{"mobile":{"large":"m.webp"},"desktop":{"large":"d.webp"}}"#)
                .unwrap();
        match &profiled {
            VariantNames::Profiled(p) => {
                assert_eq!(p[&Profile::Mobile]["large"], "m.webp");
                assert_eq!(p[&Profile::Desktop]["large"], "d.webp");
            }
            other => panic!("expected profiled names, got {other:?}"),
        }

        let back = serde_json::to_value(&profiled).unwrap();
        assert_eq!(back["desktop"]["large"], "d.webp");
    }

    #[test]
    fn empty_object_reads_as_flat() {
        let names: VariantNames = serde_json::from_str("{}").unwrap();
        assert_eq!(names, VariantNames::default());
        assert!(names.is_empty());
    }

    #[test]
    fn leaves_walk_nested_profiles() {
        let mut profiles = BTreeMap::new();
        profiles.insert(Profile::Mobile, flat(&[("large", "m.webp"), ("thumb", "")]));
        profiles.insert(Profile::Desktop, flat(&[("large", "d.webp")]));
        let names = VariantNames::Profiled(profiles);

        let mut leaves = names.leaves();
        leaves.sort();
        assert_eq!(leaves, vec!["d.webp", "m.webp"]);
    }

    #[test]
    fn profiled_lookup_falls_back_to_other_profile() {
        let mut profiles = BTreeMap::new();
        profiles.insert(Profile::Mobile, flat(&[("thumb", "mt.webp")]));
        profiles.insert(Profile::Desktop, flat(&[("large", "dl.webp")]));
        let names = VariantNames::Profiled(profiles);

        assert_eq!(names.get("large", Some(Profile::Mobile)), Some("dl.webp"));
        assert_eq!(names.get("thumb", None), Some("mt.webp"));
        assert_eq!(names.get("missing", None), None);
    }

    #[test]
    fn merge_profiled_per_profile_and_report_superseded() {
        let mut old = BTreeMap::new();
        old.insert(Profile::Mobile, flat(&[("large", "m1"), ("thumb", "mt1")]));
        old.insert(Profile::Desktop, flat(&[("large", "d1")]));
        let old = VariantNames::Profiled(old);

        let mut new = BTreeMap::new();
        new.insert(Profile::Mobile, flat(&[("large", "m2")]));
        let new = VariantNames::Profiled(new);

        let merged = old.merge(&new);
        assert_eq!(merged.get("large", Some(Profile::Mobile)), Some("m2"));
        assert_eq!(merged.get("thumb", Some(Profile::Mobile)), Some("mt1"));
        assert_eq!(merged.get("large", Some(Profile::Desktop)), Some("d1"));
        assert_eq!(old.superseded_by(&merged), vec!["m1".to_string()]);
    }

    #[test]
    fn mismatched_shapes_replace() {
        let old = VariantNames::Flat(flat(&[("large", "a")]));
        let mut p = BTreeMap::new();
        p.insert(Profile::Desktop, flat(&[("large", "b")]));
        let new = VariantNames::Profiled(p);

        assert_eq!(old.merge(&new), new);
        assert_eq!(old.superseded_by(&new), vec!["a".to_string()]);
    }
}
