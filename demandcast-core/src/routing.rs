//! Population routing: known/unknown split and the forecastable predicate.

use crate::domain::{AbcClass, EntityKey, FsnClass, SegmentLabel, XyzClass};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Partition of the entity universe against the reference master list.
///
/// Exhaustive and disjoint over the union of the current universe and the
/// master list: every entity lands in exactly one bucket.
#[derive(Debug, Clone, Default)]
pub struct KnownPartition {
    /// In the current universe and in the master list.
    pub known_active: Vec<EntityKey>,
    /// In the current universe, absent from the master list.
    pub unknown: Vec<EntityKey>,
    /// In the master list, absent from the current universe.
    pub known_inactive: Vec<EntityKey>,
}

impl KnownPartition {
    /// Membership test for the "known" flag: master-list entities, active
    /// or not.
    pub fn is_known(&self, key: &EntityKey) -> bool {
        let canonical = key.canonical();
        self.known_active.iter().any(|k| k.canonical() == canonical)
            || self.known_inactive.iter().any(|k| k.canonical() == canonical)
    }

    /// Membership test for the "active" flag: everything present in the
    /// current universe.
    pub fn is_active(&self, key: &EntityKey) -> bool {
        let canonical = key.canonical();
        self.known_active.iter().any(|k| k.canonical() == canonical)
            || self.unknown.iter().any(|k| k.canonical() == canonical)
    }
}

/// Split the current entity universe against the reference master list.
///
/// Membership is decided on the canonical string form, which normalizes
/// heterogeneous source attribute types before comparison.
pub fn split_known(current: &[EntityKey], master: &[EntityKey]) -> KnownPartition {
    let current_set: BTreeSet<String> = current.iter().map(|k| k.canonical()).collect();
    let master_set: BTreeSet<String> = master.iter().map(|k| k.canonical()).collect();

    let mut seen = BTreeSet::new();
    let mut partition = KnownPartition::default();
    for key in current {
        if !seen.insert(key.canonical()) {
            continue;
        }
        if master_set.contains(&key.canonical()) {
            partition.known_active.push(key.clone());
        } else {
            partition.unknown.push(key.clone());
        }
    }
    let mut seen_master = BTreeSet::new();
    for key in master {
        if !seen_master.insert(key.canonical()) {
            continue;
        }
        if !current_set.contains(&key.canonical()) {
            partition.known_inactive.push(key.clone());
        }
    }
    partition
}

/// Caller-supplied attribute condition: the named key attribute must take
/// one of the allowed values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeFilter {
    pub field: String,
    pub allowed: Vec<String>,
}

impl AttributeFilter {
    pub fn new<I, S>(field: impl Into<String>, allowed: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            field: field.into(),
            allowed: allowed.into_iter().map(Into::into).collect(),
        }
    }

    /// An unknown field name matches nothing, so a typo fails closed.
    pub fn matches(&self, key: &EntityKey) -> bool {
        key.attribute(&self.field)
            .map(|v| self.allowed.iter().any(|a| a == v))
            .unwrap_or(false)
    }
}

/// Conjunctive predicate deciding model-forecastability.
///
/// Every configured segment dimension must take a value in its allowed set
/// and every attribute filter must match. An entity without a segment
/// label fails the segment conditions, so it routes to the fallback
/// population rather than being dropped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoutePredicate {
    pub abc: Vec<AbcClass>,
    pub xyz: Vec<XyzClass>,
    pub fsn: Vec<FsnClass>,
    pub attributes: Vec<AttributeFilter>,
}

impl Default for RoutePredicate {
    fn default() -> Self {
        Self {
            abc: vec![AbcClass::A, AbcClass::B, AbcClass::C],
            xyz: vec![XyzClass::X, XyzClass::Y, XyzClass::Z],
            // N (no turnover) is excluded from the model path by default.
            fsn: vec![FsnClass::F, FsnClass::S],
            attributes: Vec::new(),
        }
    }
}

impl RoutePredicate {
    pub fn matches(&self, key: &EntityKey, label: Option<&SegmentLabel>) -> bool {
        let Some(label) = label else {
            return false;
        };
        self.abc.contains(&label.abc)
            && self.xyz.contains(&label.xyz)
            && self.fsn.contains(&label.fsn)
            && self.attributes.iter().all(|f| f.matches(key))
    }
}

/// The forecastable/fallback split of the current universe.
#[derive(Debug, Clone, Default)]
pub struct RoutedPopulation {
    pub forecastable: Vec<EntityKey>,
    pub fallback: Vec<EntityKey>,
}

/// Partition `entities` by the predicate, using the left-joined labels.
///
/// Exhaustive and disjoint by construction: each entity is either
/// forecastable or fallback, never both, never neither.
pub fn split_forecastable(
    entities: &[EntityKey],
    labels: &[SegmentLabel],
    predicate: &RoutePredicate,
) -> RoutedPopulation {
    let by_key: BTreeMap<String, &SegmentLabel> =
        labels.iter().map(|l| (l.key.canonical(), l)).collect();

    let mut routed = RoutedPopulation::default();
    for key in entities {
        let label = by_key.get(&key.canonical()).copied();
        if predicate.matches(key, label) {
            routed.forecastable.push(key.clone());
        } else {
            routed.fallback.push(key.clone());
        }
    }
    routed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::SegmentLabel;

    fn key(material: &str) -> EntityKey {
        EntityKey::new("CEMENT", "6012", "W001", material, "BAG")
    }

    fn label(key: &EntityKey, abc: AbcClass, xyz: XyzClass, fsn: FsnClass) -> SegmentLabel {
        SegmentLabel {
            key: key.clone(),
            window_months: 12,
            value_total: 100.0,
            cv: 0.1,
            turnover: 6.0,
            abc,
            xyz,
            fsn,
        }
    }

    #[test]
    fn known_split_is_exhaustive_and_disjoint() {
        let current = vec![key("M1"), key("M2"), key("M3")];
        let master = vec![key("M2"), key("M3"), key("M4")];
        let p = split_known(&current, &master);

        assert_eq!(p.known_active.len(), 2);
        assert_eq!(p.unknown, vec![key("M1")]);
        assert_eq!(p.known_inactive, vec![key("M4")]);

        // The three buckets reconstruct the union of both universes.
        let mut all: Vec<String> = p
            .known_active
            .iter()
            .chain(&p.unknown)
            .chain(&p.known_inactive)
            .map(|k| k.canonical())
            .collect();
        all.sort();
        let mut expected: Vec<String> = current
            .iter()
            .chain(&master)
            .map(|k| k.canonical())
            .collect();
        expected.sort();
        expected.dedup();
        assert_eq!(all, expected);
    }

    #[test]
    fn known_split_deduplicates_repeated_keys() {
        let current = vec![key("M1"), key("M1")];
        let p = split_known(&current, &[]);
        assert_eq!(p.unknown.len(), 1);
    }

    #[test]
    fn flags_derive_from_the_partition() {
        let current = vec![key("M1"), key("M2")];
        let master = vec![key("M2"), key("M4")];
        let p = split_known(&current, &master);
        assert!(!p.is_known(&key("M1")));
        assert!(p.is_active(&key("M1")));
        assert!(p.is_known(&key("M4")));
        assert!(!p.is_active(&key("M4")));
    }

    #[test]
    fn predicate_excludes_no_turnover_by_default() {
        let k = key("M1");
        let fast = label(&k, AbcClass::A, XyzClass::X, FsnClass::F);
        let none = label(&k, AbcClass::A, XyzClass::X, FsnClass::N);
        let pred = RoutePredicate::default();
        assert!(pred.matches(&k, Some(&fast)));
        assert!(!pred.matches(&k, Some(&none)));
    }

    #[test]
    fn unlabeled_entity_routes_to_fallback_not_dropped() {
        let labeled = key("M1");
        let unlabeled = key("M2");
        let labels = vec![label(&labeled, AbcClass::A, XyzClass::X, FsnClass::F)];
        let routed = split_forecastable(
            &[labeled.clone(), unlabeled.clone()],
            &labels,
            &RoutePredicate::default(),
        );
        assert_eq!(routed.forecastable, vec![labeled]);
        assert_eq!(routed.fallback, vec![unlabeled]);
    }

    #[test]
    fn attribute_filter_narrows_the_model_path() {
        let bag = key("M1");
        let mut ton = key("M2");
        ton.uom = "TON".into();
        let labels = vec![
            label(&bag, AbcClass::A, XyzClass::X, FsnClass::F),
            label(&ton, AbcClass::A, XyzClass::X, FsnClass::F),
        ];
        let mut pred = RoutePredicate::default();
        pred.attributes.push(AttributeFilter::new("uom", ["BAG"]));
        let routed = split_forecastable(&[bag.clone(), ton.clone()], &labels, &pred);
        assert_eq!(routed.forecastable, vec![bag]);
        assert_eq!(routed.fallback, vec![ton]);
    }

    #[test]
    fn unknown_filter_field_fails_closed() {
        let f = AttributeFilter::new("warehouse", ["W001"]);
        assert!(!f.matches(&key("M1")));
    }
}
