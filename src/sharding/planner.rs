//! Shard placement
//!
//! One shard per node, first come first served in registry order. There is
//! no bin-packing and no load awareness.

use tracing::{debug, warn};

use super::ShardError;
use crate::cluster::NodeRegistry;

/// Shard index -> node name, valid for a single deploy call
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlacementPlan {
    assignments: Vec<String>,
}

impl PlacementPlan {
    /// `(shard index, node)` pairs in index order
    pub fn iter(&self) -> impl Iterator<Item = (usize, &str)> {
        self.assignments
            .iter()
            .enumerate()
            .map(|(i, node)| (i, node.as_str()))
    }

    pub fn node_for(&self, index: usize) -> Option<&str> {
        self.assignments.get(index).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.assignments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assignments.is_empty()
    }
}

// ============================================================================
// SBIO: Pure placement logic
// ============================================================================

/// Assign shard `i` to the `i`-th available node
pub fn plan_from_available(
    available: Vec<String>,
    num_shards: usize,
) -> Result<PlacementPlan, ShardError> {
    if available.len() < num_shards {
        return Err(ShardError::InsufficientCapacity {
            requested: num_shards,
            available: available.len(),
        });
    }

    let mut assignments = available;
    assignments.truncate(num_shards);
    Ok(PlacementPlan { assignments })
}

// ============================================================================
// SBIO: Planner with I/O (queries the registry)
// ============================================================================

/// Picks worker nodes for a sharded deployment
#[derive(Clone)]
pub struct ShardPlanner {
    registry: NodeRegistry,
}

impl ShardPlanner {
    pub fn new(registry: NodeRegistry) -> Self {
        Self { registry }
    }

    /// Plan `num_shards` shards, failing if too few workers are available
    pub async fn plan_shards(&self, num_shards: usize) -> Result<PlacementPlan, ShardError> {
        let available = self.registry.list_available_worker_nodes().await?;

        match plan_from_available(available, num_shards) {
            Ok(plan) => {
                debug!("Planned {} shard(s): {:?}", plan.len(), plan.assignments);
                Ok(plan)
            }
            Err(e) => {
                warn!("Cannot place {} shard(s): {}", num_shards, e);
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::cluster::Node;
    use crate::gateway::InMemoryGateway;

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_plan_takes_first_nodes_in_order() {
        let plan = plan_from_available(names(&["c", "a", "b"]), 2).unwrap();

        let pairs: Vec<_> = plan.iter().collect();
        assert_eq!(pairs, vec![(0, "c"), (1, "a")]);
        assert_eq!(plan.node_for(2), None);
    }

    #[test]
    fn test_plan_exact_capacity() {
        let plan = plan_from_available(names(&["a", "b"]), 2).unwrap();
        assert_eq!(plan.len(), 2);
    }

    #[test]
    fn test_plan_insufficient_capacity() {
        let result = plan_from_available(names(&["a"]), 3);
        assert!(matches!(
            result,
            Err(ShardError::InsufficientCapacity {
                requested: 3,
                available: 1
            })
        ));
    }

    #[test]
    fn test_plan_zero_shards() {
        let plan = plan_from_available(names(&["a"]), 0).unwrap();
        assert!(plan.is_empty());
    }

    #[tokio::test]
    async fn test_planner_uses_available_workers_only() {
        let gateway = Arc::new(InMemoryGateway::with_nodes(vec![
            Node::new("control").ready(true),
            Node::new("cordoned").worker().ready(true).cordon(),
            Node::new("w1").worker().ready(true),
            Node::new("w2").worker().ready(true),
        ]));
        let planner = ShardPlanner::new(NodeRegistry::new(gateway));

        let plan = planner.plan_shards(2).await.unwrap();
        assert_eq!(plan.node_for(0), Some("w1"));
        assert_eq!(plan.node_for(1), Some("w2"));

        let result = planner.plan_shards(3).await;
        assert!(matches!(
            result,
            Err(ShardError::InsufficientCapacity { available: 2, .. })
        ));
    }
}
