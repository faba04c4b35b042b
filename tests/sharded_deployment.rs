//! End-to-end sharded deployment against a simulated cluster

use std::collections::HashSet;
use std::sync::Arc;

use serde_json::json;

use shardnet::cluster::{LifecycleError, Node, NodeLifecycleController, NodeRegistry};
use shardnet::gateway::{GatewayCall, InMemoryGateway, Pod};
use shardnet::sharding::{
    DeploymentOrchestrator, DeploymentStore, InferenceRouter, OrchestratorConfig, ShardError,
    ShardStatus,
};

/// 2 ready workers, 1 cordoned worker, 1 control-plane node
fn four_node_cluster() -> Arc<InMemoryGateway> {
    Arc::new(InMemoryGateway::with_nodes(vec![
        Node::new("worker-a").worker().ready(true),
        Node::new("worker-cordoned").worker().ready(true).cordon(),
        Node::new("control-plane").ready(true),
        Node::new("worker-b").worker().ready(true),
    ]))
}

fn orchestrator(gateway: &Arc<InMemoryGateway>) -> DeploymentOrchestrator {
    DeploymentOrchestrator::new(
        gateway.clone(),
        DeploymentStore::new(),
        OrchestratorConfig::default(),
    )
}

#[tokio::test]
async fn test_four_node_scenario() {
    let gateway = four_node_cluster();
    let mut orch = orchestrator(&gateway);

    let result = orch
        .deploy_distributed_model("llama", "v1", "llama:7b", 2)
        .await;

    assert_eq!(result.len(), 2);
    assert_eq!(result["llama-shard0"], "worker-a");
    assert_eq!(result["llama-shard1"], "worker-b");
    assert_eq!(gateway.create_count(), 2);
}

#[tokio::test]
async fn test_shortfall_never_creates() {
    let gateway = four_node_cluster();
    let mut orch = orchestrator(&gateway);

    let result = orch.deploy_distributed_model("llama", "v1", "img", 3).await;

    assert!(result.is_empty());
    assert_eq!(gateway.create_count(), 0);
}

#[tokio::test]
async fn test_shards_land_on_distinct_nodes() {
    let gateway = Arc::new(InMemoryGateway::with_nodes(
        (0..6)
            .map(|i| Node::new(format!("gpu-{}", i)).worker().ready(true))
            .collect(),
    ));
    let available = NodeRegistry::new(gateway.clone())
        .list_available_worker_nodes()
        .await
        .unwrap();
    let mut orch = orchestrator(&gateway);

    for n in 1..=4 {
        let model = format!("m{}", n);
        let result = orch.deploy_distributed_model(&model, "v1", "img", n).await;

        assert_eq!(result.len(), n);
        let nodes: HashSet<&String> = result.values().collect();
        assert_eq!(nodes.len(), n);
        for i in 0..n {
            let node = &result[&format!("{}-shard{}", model, i)];
            assert_eq!(node, &available[i]);
        }
    }
}

#[tokio::test]
async fn test_deploy_reconcile_route_cleanup() {
    let gateway = four_node_cluster();
    let mut orch = orchestrator(&gateway);
    let router = InferenceRouter::new();

    orch.deploy_distributed_model("llama", "v1", "img", 2).await;

    let result = router.route_inference_request(orch.store(), "llama", &json!({}));
    assert!(matches!(result, Err(ShardError::NoReadyShards(_))));

    // shard0 rolls out, shard1 is still starting
    gateway.set_replicas("llama-shard0-v1", 1, 1);
    let statuses = orch.get_deployment_status(Some("llama")).await;
    assert_eq!(statuses[0].status, ShardStatus::Ready);
    assert_eq!(statuses[1].status, ShardStatus::Failed);

    for _ in 0..3 {
        let decision = router
            .route_inference_request(orch.store(), "llama", &json!({"prompt": "x"}))
            .unwrap();
        assert_eq!(decision.shard, "llama-shard0-v1");
        assert_eq!(decision.node, "worker-a");
    }

    gateway.set_replicas("llama-shard1-v1", 1, 1);
    orch.get_deployment_status(None).await;
    let first = router
        .route_inference_request(orch.store(), "llama", &json!({}))
        .unwrap();
    let second = router
        .route_inference_request(orch.store(), "llama", &json!({}))
        .unwrap();
    assert_ne!(first.node, second.node);

    let report = router.monitor_inference_performance(orch.store(), "llama", 60);
    assert_eq!(report.ready_shards, 2);
    assert!(report.synthetic);

    assert_eq!(orch.cleanup_model_deployment("llama").await.unwrap(), 2);
    assert!(orch.store().is_empty());
    assert!(gateway.deployment_names().is_empty());
}

#[tokio::test]
async fn test_mixed_model_traffic_uses_every_shard() {
    let gateway = Arc::new(InMemoryGateway::with_nodes(vec![
        Node::new("w0").worker().ready(true),
        Node::new("w1").worker().ready(true),
    ]));
    let mut orch = orchestrator(&gateway);
    let router = InferenceRouter::new();

    orch.deploy_distributed_model("llama", "v1", "img", 2).await;
    orch.deploy_distributed_model("bert", "v1", "img", 2).await;
    gateway.mark_all_ready();
    orch.get_deployment_status(None).await;

    let mut llama = Vec::new();
    let mut bert = Vec::new();
    for _ in 0..6 {
        llama.push(
            router
                .route_inference_request(orch.store(), "llama", &json!({}))
                .unwrap()
                .node,
        );
        bert.push(
            router
                .route_inference_request(orch.store(), "bert", &json!({}))
                .unwrap()
                .node,
        );
    }

    for nodes in [&llama, &bert] {
        let used: HashSet<&String> = nodes.iter().collect();
        assert_eq!(used.len(), 2);
        assert!(nodes.windows(2).all(|w| w[0] != w[1]));
    }
}

#[tokio::test]
async fn test_drain_evicts_then_cordons() {
    let gateway = four_node_cluster();
    gateway.add_pod(Pod::new("shard-a", "default", "worker-a"));
    gateway.add_pod(Pod::new("shard-b", "ml", "worker-a"));
    gateway.add_pod(Pod::new("leaving", "default", "worker-a").terminating(30));
    gateway.add_pod(Pod::new("elsewhere", "default", "worker-b"));
    gateway.fail_eviction("shard-a");

    let lifecycle = NodeLifecycleController::new(gateway.clone());
    let result = lifecycle.drain_node("worker-a").await;

    match result {
        Err(LifecycleError::PartialFailure {
            failed_pods,
            cordoned,
            ..
        }) => {
            assert_eq!(failed_pods, vec!["default/shard-a"]);
            assert!(cordoned);
        }
        other => panic!("Expected PartialFailure, got {:?}", other),
    }

    let evictions: Vec<_> = gateway
        .calls()
        .into_iter()
        .filter(|c| matches!(c, GatewayCall::EvictPod { .. } | GatewayCall::PatchNode { .. }))
        .collect();
    assert_eq!(evictions.len(), 3);
    assert!(matches!(evictions[2], GatewayCall::PatchNode { .. }));

    assert!(!gateway.node("worker-a").unwrap().schedulable);
    assert_eq!(gateway.pods_on("worker-b").len(), 1);

    // A drained node is no longer a placement candidate
    let available = NodeRegistry::new(gateway.clone())
        .list_available_worker_nodes()
        .await
        .unwrap();
    assert_eq!(available, vec!["worker-b"]);
}

#[tokio::test]
async fn test_uncordon_makes_node_available_again() {
    let gateway = four_node_cluster();
    let lifecycle = NodeLifecycleController::new(gateway.clone());
    let registry = NodeRegistry::new(gateway.clone());

    lifecycle.uncordon_node("worker-cordoned").await.unwrap();
    assert_eq!(registry.list_available_worker_nodes().await.unwrap().len(), 3);

    lifecycle.cordon_node("worker-cordoned").await.unwrap();
    lifecycle.cordon_node("worker-cordoned").await.unwrap();
    assert_eq!(registry.list_available_worker_nodes().await.unwrap().len(), 2);
}
