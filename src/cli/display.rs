//! Display formatting for CLI output
//!
//! SBIO pattern: Pure functions that format data for display

use super::commands::{node_status, ContextInfo, DemoSummary};
use crate::cluster::{DrainReport, Node};
use crate::metrics::PerformanceReport;
use crate::server::DeployResponse;
use crate::sharding::{InferenceRouteDecision, ShardDeployment};

// ============================================================================
// Table formatting helpers
// ============================================================================

/// Format a simple table with headers and rows
pub fn format_table(headers: &[&str], rows: Vec<Vec<String>>) -> String {
    if rows.is_empty() {
        return "No resources found.\n".to_string();
    }

    let mut widths: Vec<usize> = headers.iter().map(|h| h.len()).collect();
    for row in &rows {
        for (i, cell) in row.iter().enumerate() {
            if i < widths.len() {
                widths[i] = widths[i].max(cell.len());
            }
        }
    }

    let mut output = String::new();

    for (i, header) in headers.iter().enumerate() {
        if i > 0 {
            output.push_str("   ");
        }
        output.push_str(&format!(
            "{:width$}",
            header.to_uppercase(),
            width = widths[i]
        ));
    }
    output.push('\n');

    for row in rows {
        for (i, cell) in row.iter().enumerate() {
            if i > 0 {
                output.push_str("   ");
            }
            if i < widths.len() {
                output.push_str(&format!("{:width$}", cell, width = widths[i]));
            } else {
                output.push_str(cell);
            }
        }
        output.push('\n');
    }

    output
}

// ============================================================================
// Context display
// ============================================================================

/// Format context list for display
pub fn format_context_list(contexts: &[ContextInfo]) -> String {
    let headers = &["", "NAME", "SERVER", "NAMESPACE"];
    let rows: Vec<Vec<String>> = contexts
        .iter()
        .map(|ctx| {
            vec![
                if ctx.is_current { "*" } else { " " }.to_string(),
                ctx.name.clone(),
                ctx.server.clone(),
                ctx.namespace.clone(),
            ]
        })
        .collect();

    format_table(headers, rows)
}

/// Format current context for display
pub fn format_current_context(name: &str, server: &str) -> String {
    format!("Current context: {} ({})\n", name, server)
}

// ============================================================================
// Node display
// ============================================================================

/// Format node list for display
pub fn format_node_list(nodes: &[Node]) -> String {
    let headers = &["NAME", "STATUS", "ROLE", "CONDITIONS"];
    let rows: Vec<Vec<String>> = nodes
        .iter()
        .map(|n| {
            let role = if n.is_worker() { "worker" } else { "<none>" };
            let conditions = n.active_conditions();
            vec![
                n.name.clone(),
                node_status(n).to_string(),
                role.to_string(),
                if conditions.is_empty() {
                    "<none>".to_string()
                } else {
                    conditions.join(",")
                },
            ]
        })
        .collect();

    format_table(headers, rows)
}

/// Format a plain list of names
pub fn format_name_list(header: &str, names: &[String]) -> String {
    let rows = names.iter().map(|n| vec![n.clone()]).collect();
    format_table(&[header], rows)
}

pub fn format_drain_report(report: &DrainReport) -> String {
    let mut output = String::new();
    for pod in &report.evicted {
        output.push_str(&format!("evicting pod {}\n", pod));
    }
    for pod in &report.skipped {
        output.push_str(&format!("skipping terminating pod {}\n", pod));
    }
    output.push_str(&format!("node/{} drained\n", report.node));
    output
}

pub fn format_not_ready(not_ready: &[String]) -> String {
    if not_ready.is_empty() {
        return "All nodes ready.\n".to_string();
    }
    not_ready
        .iter()
        .map(|n| format!("node/{} is not ready\n", n))
        .collect()
}

// ============================================================================
// Shard display
// ============================================================================

/// Format a deploy result
pub fn format_deploy_response(response: &DeployResponse) -> String {
    let mut output = format!(
        "model/{} deployed ({} strategy, {} shard(s))\n",
        response.model,
        response.strategy,
        response.shards.len()
    );

    let rows = response
        .shards
        .iter()
        .map(|(shard, node)| vec![shard.clone(), node.clone()])
        .collect();
    output.push_str(&format_table(&["SHARD", "NODE"], rows));

    if !response.failed.is_empty() {
        output.push_str(&format!("Failed: {}\n", response.failed.join(", ")));
    }
    output
}

/// Format shard deployment status
pub fn format_shard_list(shards: &[ShardDeployment]) -> String {
    let headers = &["NAME", "MODEL", "VERSION", "NODE", "READY", "STATUS"];
    let rows: Vec<Vec<String>> = shards
        .iter()
        .map(|s| {
            vec![
                s.id.clone(),
                s.base_model.clone(),
                s.version.clone(),
                s.node.clone(),
                format!("{}/{}", s.ready_replicas, s.replicas),
                s.status.to_string(),
            ]
        })
        .collect();

    format_table(headers, rows)
}

pub fn format_route_decision(decision: &InferenceRouteDecision) -> String {
    let mut output = String::new();
    output.push_str(&format!("Request:  {}\n", decision.request_id));
    output.push_str(&format!("Shard:    {}\n", decision.shard));
    output.push_str(&format!("Node:     {}\n", decision.node));
    output.push_str(&format!("Time:     {}\n", decision.timestamp.to_rfc3339()));
    output.push_str(&format!("Result:   {}\n", decision.result));
    output
}

/// Format a performance report, flagged as synthetic
pub fn format_performance_report(report: &PerformanceReport) -> String {
    let mut output = String::new();
    output.push_str(&format!(
        "Model:           {} (last {}s)\n",
        report.model, report.window_secs
    ));
    output.push_str(&format!("Ready shards:    {}\n", report.ready_shards));
    output.push_str(&format!("Requests/sec:    {:.1}\n", report.requests_per_second));
    output.push_str(&format!("Total requests:  {}\n", report.total_requests));
    output.push_str(&format!("Avg latency:     {:.1} ms\n", report.avg_latency_ms));
    output.push_str(&format!("P99 latency:     {:.1} ms\n", report.p99_latency_ms));
    output.push_str(&format!("Error rate:      {:.2}\n", report.error_rate));
    if report.synthetic {
        output.push_str("(synthetic figures, not measured)\n");
    }
    output
}

// ============================================================================
// Demo display
// ============================================================================

pub fn format_demo_summary(summary: &DemoSummary) -> String {
    let mut output = String::new();

    output.push_str("Available workers:\n");
    output.push_str(&format_name_list("NAME", &summary.available));

    output.push('\n');
    output.push_str(&format_deploy_response(&summary.deployed));

    output.push_str("\nStatus after rollout:\n");
    output.push_str(&format_shard_list(&summary.statuses));

    output.push_str("\nRouted requests:\n");
    let rows = summary
        .routes
        .iter()
        .map(|d| vec![d.request_id.to_string(), d.shard.clone(), d.node.clone()])
        .collect();
    output.push_str(&format_table(&["REQUEST", "SHARD", "NODE"], rows));

    output.push('\n');
    output.push_str(&format_performance_report(&summary.report));

    output.push_str(&format!(
        "\nCleaned up {} deployment(s)\n",
        summary.deleted
    ));
    output
}
