use crate::model::SnapshotTree;
use chrono::{DateTime, Utc};

/// Count snapshot nodes created strictly before `cutoff`, at any depth.
pub fn snapshot_count(cutoff: DateTime<Utc>, trees: &[SnapshotTree]) -> usize {
    trees
        .iter()
        .map(|node| usize::from(node.create_time < cutoff) + snapshot_count(cutoff, &node.children))
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn node(name: &str, created: DateTime<Utc>, children: Vec<SnapshotTree>) -> SnapshotTree {
        SnapshotTree {
            name: name.to_string(),
            create_time: created,
            children,
        }
    }

    fn four_nodes(created: DateTime<Utc>) -> Vec<SnapshotTree> {
        vec![node(
            "root",
            created,
            vec![
                node("a", created, vec![node("a1", created, vec![])]),
                node("b", created, vec![]),
            ],
        )]
    }

    #[test]
    fn test_counts_every_older_node() {
        let cutoff = Utc::now();
        assert_eq!(snapshot_count(cutoff, &four_nodes(cutoff - Duration::hours(1))), 4);
    }

    #[test]
    fn test_ignores_newer_nodes() {
        let cutoff = Utc::now();
        assert_eq!(snapshot_count(cutoff, &four_nodes(cutoff + Duration::hours(1))), 0);
    }

    #[test]
    fn test_mixed_ages() {
        let cutoff = Utc::now();
        let old = cutoff - Duration::days(10);
        let new = cutoff + Duration::minutes(5);
        let trees = vec![node("old", old, vec![node("new", new, vec![node("old2", old, vec![])])])];
        assert_eq!(snapshot_count(cutoff, &trees), 2);
        assert_eq!(snapshot_count(cutoff, &[]), 0);
    }
}
