//! Rule matching and splicing helpers shared by the strategies

use crate::model::Rule;

use super::Change;

/// Subsets that make up an A/B split
pub const SPLIT_SUBSETS: (&str, &str) = ("v1", "v2");

/// Whether the rule's first predicate is a URI prefix match on `prefix`
pub fn first_prefix_is(rule: &Rule, prefix: &str) -> bool {
    rule.first_uri_prefix() == Some(prefix)
}

/// Whether the rule is a two-way v1/v2 split of `host`, in either order
pub fn is_split_of(rule: &Rule, host: &str) -> bool {
    let [first, second] = rule.route.as_slice() else {
        return false;
    };

    if first.destination.host != host || second.destination.host != host {
        return false;
    }

    let (a, b) = SPLIT_SUBSETS;
    matches!(
        (
            first.destination.subset.as_deref(),
            second.destination.subset.as_deref(),
        ),
        (Some(x), Some(y)) if (x == a && y == b) || (x == b && y == a)
    )
}

/// Insert at the highest-priority position
pub fn prepend(rules: &mut Vec<Rule>, rule: Rule) -> Change {
    rules.insert(0, rule);
    Change::Inserted { index: 0 }
}

/// Insert at the lowest-priority position
pub fn append(rules: &mut Vec<Rule>, rule: Rule) -> Change {
    rules.push(rule);
    Change::Appended {
        index: rules.len() - 1,
    }
}

/// Apply `update` to every rule whose first predicate has URI prefix `prefix`
///
/// Scanning continues past the first hit. Returns the touched indices.
pub fn update_prefixed<F>(rules: &mut [Rule], prefix: &str, mut update: F) -> Vec<usize>
where
    F: FnMut(&mut Rule),
{
    let mut touched = Vec::new();
    for (index, rule) in rules.iter_mut().enumerate() {
        if first_prefix_is(rule, prefix) {
            update(rule);
            touched.push(index);
        }
    }
    touched
}
