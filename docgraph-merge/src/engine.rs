//! The three-way merge engine.
//!
//! For each container the engine combines local edits (live vs prior) with
//! external edits (incoming vs prior):
//!
//! - **Sequence**: membership merged position-insensitively; incoming's
//!   ordering is adopted when the merged membership coincides with
//!   incoming's (external reordering wins over an unreconcilable local
//!   order), otherwise live order is kept with external additions appended.
//! - **Set**: `(live ∪ (incoming − prior)) − (prior − incoming)`.
//! - **Map / Fields**: keys follow the set rule; a key present on both
//!   sides with different values resolves to incoming only when the live
//!   value is unchanged from prior, otherwise the local writer wins.
//!
//! A prior/incoming container whose shape disagrees with the live one is
//! ignored for that entry (live wins), absorbed locally without error.

use crate::snapshot::{SnapContainer, SnapValue};
use docgraph_types::Scalar;
use std::collections::{BTreeMap, BTreeSet, HashMap};

/// Produces the container value that should actually be written, given the
/// live projection and the prior/incoming snapshot entries.
#[must_use]
pub fn merge_container(
    live: &SnapContainer,
    prior: Option<&SnapContainer>,
    incoming: Option<&SnapContainer>,
) -> SnapContainer {
    let prior = shape_checked(live, prior);
    let incoming = shape_checked(live, incoming);
    match live {
        SnapContainer::Seq(elements) => {
            SnapContainer::Seq(merge_seq(elements, seq_of(prior), seq_of(incoming)))
        }
        SnapContainer::Set(elements) => {
            SnapContainer::Set(merge_set(elements, set_of(prior), set_of(incoming)))
        }
        SnapContainer::Map(entries) => {
            SnapContainer::Map(merge_keyed(entries, map_of(prior), map_of(incoming)))
        }
        SnapContainer::Fields { class, fields } => SnapContainer::Fields {
            class: class.clone(),
            fields: merge_keyed(fields, fields_of(prior), fields_of(incoming)),
        },
    }
}

/// Drops a snapshot entry whose container kind disagrees with the live one.
fn shape_checked<'a>(
    live: &SnapContainer,
    snapshot: Option<&'a SnapContainer>,
) -> Option<&'a SnapContainer> {
    match snapshot {
        Some(other) if !live.same_shape(other) => {
            tracing::debug!("snapshot shape disagrees with live container; live wins");
            None
        }
        other => other,
    }
}

fn seq_of(container: Option<&SnapContainer>) -> Option<&Vec<SnapValue>> {
    match container {
        Some(SnapContainer::Seq(elements)) => Some(elements),
        _ => None,
    }
}

fn set_of(container: Option<&SnapContainer>) -> Option<&BTreeSet<SnapValue>> {
    match container {
        Some(SnapContainer::Set(elements)) => Some(elements),
        _ => None,
    }
}

fn map_of(container: Option<&SnapContainer>) -> Option<&BTreeMap<Scalar, SnapValue>> {
    match container {
        Some(SnapContainer::Map(entries)) => Some(entries),
        _ => None,
    }
}

fn fields_of(container: Option<&SnapContainer>) -> Option<&BTreeMap<String, SnapValue>> {
    match container {
        Some(SnapContainer::Fields { fields, .. }) => Some(fields),
        _ => None,
    }
}

/// Three-way set merge: keep live membership, apply external additions and
/// removals observed between prior and incoming.
fn merge_set(
    live: &BTreeSet<SnapValue>,
    prior: Option<&BTreeSet<SnapValue>>,
    incoming: Option<&BTreeSet<SnapValue>>,
) -> BTreeSet<SnapValue> {
    let (Some(prior), Some(incoming)) = (prior, incoming) else {
        return live.clone();
    };
    let mut result = live.clone();
    for added in incoming.difference(prior) {
        result.insert(added.clone());
    }
    for removed in prior.difference(incoming) {
        result.remove(removed);
    }
    result
}

/// Per-key three-way merge shared by mappings and record field maps.
fn merge_keyed<K: Ord + Clone>(
    live: &BTreeMap<K, SnapValue>,
    prior: Option<&BTreeMap<K, SnapValue>>,
    incoming: Option<&BTreeMap<K, SnapValue>>,
) -> BTreeMap<K, SnapValue> {
    let (Some(prior), Some(incoming)) = (prior, incoming) else {
        return live.clone();
    };

    let mut result = BTreeMap::new();
    for (key, live_value) in live {
        // Externally removed keys disappear regardless of local edits.
        if prior.contains_key(key) && !incoming.contains_key(key) {
            continue;
        }
        let value = match incoming.get(key) {
            Some(incoming_value) if incoming_value != live_value => {
                // Incoming wins only over a locally-unchanged value.
                if prior.get(key) == Some(live_value) {
                    incoming_value.clone()
                } else {
                    live_value.clone()
                }
            }
            _ => live_value.clone(),
        };
        result.insert(key.clone(), value);
    }
    // Externally added keys.
    for (key, incoming_value) in incoming {
        if !prior.contains_key(key) && !live.contains_key(key) {
            result.insert(key.clone(), incoming_value.clone());
        }
    }
    result
}

type Counts = HashMap<SnapValue, usize>;

fn counts(elements: &[SnapValue]) -> Counts {
    let mut counts = Counts::new();
    for element in elements {
        *counts.entry(element.clone()).or_insert(0) += 1;
    }
    counts
}

/// Per-element count of `a − b` (saturating).
fn count_diff(a: &Counts, b: &Counts) -> Counts {
    a.iter()
        .filter_map(|(value, &count)| {
            let remaining = count.saturating_sub(b.get(value).copied().unwrap_or(0));
            (remaining > 0).then(|| (value.clone(), remaining))
        })
        .collect()
}

/// Position-insensitive three-way sequence merge.
///
/// Authority rules first: no prior or no external change means the live
/// sequence wins; an unchanged live sequence adopts incoming wholesale.
/// When both sides edited, membership is merged as a multiset (external
/// removals dropped from live, external additions appended in incoming
/// order, minus additions the local side already made); if the merged
/// membership equals incoming's, incoming's ordering is adopted.
fn merge_seq(
    live: &[SnapValue],
    prior: Option<&Vec<SnapValue>>,
    incoming: Option<&Vec<SnapValue>>,
) -> Vec<SnapValue> {
    let (Some(prior), Some(incoming)) = (prior, incoming) else {
        return live.to_vec();
    };
    if incoming == prior {
        return live.to_vec();
    }
    if live == prior.as_slice() {
        return incoming.clone();
    }

    let live_counts = counts(live);
    let prior_counts = counts(prior);
    let incoming_counts = counts(incoming);

    let externally_removed = count_diff(&prior_counts, &incoming_counts);
    let externally_added = count_diff(&incoming_counts, &prior_counts);
    let locally_added = count_diff(&live_counts, &prior_counts);

    // Drop externally-removed occurrences from the live order.
    let mut removal_budget = externally_removed;
    let mut result: Vec<SnapValue> = Vec::with_capacity(live.len());
    for element in live {
        if let Some(budget) = removal_budget.get_mut(element) {
            if *budget > 0 {
                *budget -= 1;
                continue;
            }
        }
        result.push(element.clone());
    }

    // Append external additions (union with local additions: occurrences
    // the local side already added are not duplicated), in incoming order.
    let mut addition_budget = count_diff(&externally_added, &locally_added);
    for element in incoming {
        if let Some(budget) = addition_budget.get_mut(element) {
            if *budget > 0 {
                *budget -= 1;
                result.push(element.clone());
            }
        }
    }

    // Irreconcilable ordering conflict: same membership, different order.
    if counts(&result) == incoming_counts {
        return incoming.clone();
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ints(values: &[i64]) -> Vec<SnapValue> {
        values
            .iter()
            .map(|&v| SnapValue::Scalar(Scalar::Int(v)))
            .collect()
    }

    #[test]
    fn seq_without_prior_is_live() {
        let live = ints(&[1, 2]);
        let merged = merge_seq(&live, None, Some(&ints(&[9, 9])));
        assert_eq!(merged, live);
    }

    #[test]
    fn seq_both_edited_unions_membership() {
        let prior = ints(&[1, 2, 3]);
        let incoming = ints(&[1, 2, 4]); // 3 removed, 4 added externally
        let live = ints(&[1, 2, 3, 5]); // 5 added locally
        let merged = merge_seq(&live, Some(&prior), Some(&incoming));
        assert_eq!(merged, ints(&[1, 2, 5, 4]));
    }

    #[test]
    fn seq_pure_external_reorder_wins() {
        let prior = ints(&[1, 2, 3]);
        let incoming = ints(&[3, 1, 2]);
        let live = ints(&[2, 1, 3]); // locally reordered too
        let merged = merge_seq(&live, Some(&prior), Some(&incoming));
        assert_eq!(merged, incoming);
    }
}
