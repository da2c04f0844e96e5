//! Fork provenance: creating forks and reconstructing fork lineage.

use std::collections::{HashMap, HashSet};

use serde::Serialize;
use strategy_core::store::StrategyStore;
use strategy_core::types::{ForkRecord, SavedStrategy};
use strategy_core::{Error, Result};
use tracing::info;
use uuid::Uuid;

/// Clone `source_id`'s operations into a new strategy and record the
/// lineage. The source's direct fork count goes up by one; the fork itself
/// starts with a count of zero.
pub async fn fork_strategy(
    store: &dyn StrategyStore,
    source_id: Uuid,
    name: impl Into<String>,
) -> Result<SavedStrategy> {
    let source = store
        .get_strategy(source_id)
        .await?
        .ok_or(Error::StrategyNotFound(source_id))?;

    let forked = SavedStrategy::new(name, source.operations.clone());
    store.put_strategy(&forked).await?;
    store
        .put_fork_record(&ForkRecord::forked_from(forked.id, source_id))
        .await?;

    let mut source_record = store
        .get_fork_record(source_id)
        .await?
        .unwrap_or_else(|| ForkRecord::original(source_id));
    source_record.fork_count += 1;
    store.put_fork_record(&source_record).await?;

    info!(
        source = %source.name,
        fork = %forked.name,
        fork_count = source_record.fork_count,
        "Forked strategy"
    );

    Ok(forked)
}

/// One node in a fork lineage tree.
#[derive(Debug, Clone, Serialize)]
pub struct ForkNode {
    pub strategy_id: Uuid,
    pub children: Vec<ForkNode>,
}

/// Reconstruct the lineage tree rooted at `root` from flat fork records.
/// The parent-indexed adjacency map is built once; children appear in
/// record order. Each id is expanded at most once, so a cycle in corrupted
/// records cannot recurse forever.
pub fn fork_tree(records: &[ForkRecord], root: Uuid) -> ForkNode {
    let mut children_of: HashMap<Uuid, Vec<Uuid>> = HashMap::new();
    for record in records {
        if let Some(parent) = record.fork_of {
            children_of.entry(parent).or_default().push(record.strategy_id);
        }
    }

    let mut visited = HashSet::from([root]);
    build_node(root, &children_of, &mut visited)
}

fn build_node(
    id: Uuid,
    children_of: &HashMap<Uuid, Vec<Uuid>>,
    visited: &mut HashSet<Uuid>,
) -> ForkNode {
    let mut children = Vec::new();
    if let Some(ids) = children_of.get(&id) {
        for child in ids {
            if visited.insert(*child) {
                children.push(build_node(*child, children_of, visited));
            }
        }
    }

    ForkNode {
        strategy_id: id,
        children,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;
    use strategy_core::store::MemoryStore;
    use strategy_core::types::StrategyOperation;

    fn supply_strategy(name: &str) -> SavedStrategy {
        SavedStrategy::new(
            name,
            vec![StrategyOperation::Supply {
                asset: "USDC".to_string(),
                amount: Decimal::new(1000, 0),
            }],
        )
    }

    #[tokio::test]
    async fn test_fork_copies_operations_and_counts() {
        let store = MemoryStore::new();
        let original = supply_strategy("original");
        store.put_strategy(&original).await.unwrap();

        let fork_a = fork_strategy(&store, original.id, "fork a").await.unwrap();
        let fork_b = fork_strategy(&store, original.id, "fork b").await.unwrap();

        assert_eq!(fork_a.operations, original.operations);
        assert_ne!(fork_a.id, original.id);

        let original_record = store
            .get_fork_record(original.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(original_record.fork_count, 2);
        assert_eq!(original_record.fork_of, None);

        let fork_record = store.get_fork_record(fork_b.id).await.unwrap().unwrap();
        assert_eq!(fork_record.fork_of, Some(original.id));
        assert_eq!(fork_record.fork_count, 0);
    }

    #[tokio::test]
    async fn test_fork_of_missing_strategy_fails() {
        let store = MemoryStore::new();
        let result = fork_strategy(&store, Uuid::new_v4(), "ghost").await;
        assert!(matches!(result, Err(Error::StrategyNotFound(_))));
    }

    #[tokio::test]
    async fn test_fork_count_counts_direct_forks_only() {
        let store = MemoryStore::new();
        let root = supply_strategy("root");
        store.put_strategy(&root).await.unwrap();

        let child = fork_strategy(&store, root.id, "child").await.unwrap();
        fork_strategy(&store, child.id, "grandchild").await.unwrap();

        let root_record = store.get_fork_record(root.id).await.unwrap().unwrap();
        assert_eq!(root_record.fork_count, 1);
        let child_record = store.get_fork_record(child.id).await.unwrap().unwrap();
        assert_eq!(child_record.fork_count, 1);
    }

    #[test]
    fn test_fork_tree_structure() {
        let root = Uuid::new_v4();
        let child_a = Uuid::new_v4();
        let child_b = Uuid::new_v4();
        let grandchild = Uuid::new_v4();

        let records = vec![
            ForkRecord {
                strategy_id: root,
                fork_of: None,
                fork_count: 2,
            },
            ForkRecord::forked_from(child_a, root),
            ForkRecord::forked_from(child_b, root),
            ForkRecord::forked_from(grandchild, child_a),
        ];

        let tree = fork_tree(&records, root);
        assert_eq!(tree.strategy_id, root);
        assert_eq!(tree.children.len(), 2);
        assert_eq!(tree.children[0].strategy_id, child_a);
        assert_eq!(tree.children[0].children.len(), 1);
        assert_eq!(tree.children[0].children[0].strategy_id, grandchild);
        assert!(tree.children[1].children.is_empty());
    }

    #[test]
    fn test_fork_tree_terminates_on_cyclic_records() {
        // A cycle can only come from corrupted store data, never from
        // fork_strategy; reconstruction must still terminate.
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let records = vec![ForkRecord::forked_from(b, a), ForkRecord::forked_from(a, b)];

        let tree = fork_tree(&records, a);
        assert_eq!(tree.strategy_id, a);
        assert_eq!(tree.children.len(), 1);
        assert_eq!(tree.children[0].strategy_id, b);
        // The back-edge to the root is not expanded again.
        assert!(tree.children[0].children.is_empty());
    }

    #[test]
    fn test_fork_tree_leaf_root() {
        let lone = Uuid::new_v4();
        let tree = fork_tree(&[], lone);
        assert_eq!(tree.strategy_id, lone);
        assert!(tree.children.is_empty());
    }
}
