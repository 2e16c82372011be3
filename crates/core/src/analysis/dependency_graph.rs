//! Dependency graph data: the top-*k* most-connected modules (by resolved,
//! internal file-dependency fan-in) and the import edges between them, for
//! callers that want to render a graph rather than read a ranked list (the
//! way [`super::hotspots`] does). Grounded in the teacher's `graph.rs`,
//! which builds a similar node/edge view over its own call graph for the
//! dashboard's graph endpoint.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::model::ResolvedDependencies;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphNode {
    pub module: String,
    pub connections: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphEdge {
    pub importer: String,
    pub imported: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DependencyGraphData {
    pub nodes: Vec<GraphNode>,
    pub edges: Vec<GraphEdge>,
}

/// `min_connections` filters which modules qualify as nodes at all;
/// `top_k` bounds the node list; `max_edges_per_node` caps the edge count
/// contributed by each node so a highly-connected module in a large repo
/// can't blow up the returned edge list.
pub fn build(
    deps: &ResolvedDependencies,
    min_connections: usize,
    top_k: usize,
    max_edges_per_node: usize,
) -> DependencyGraphData {
    let mut fan_in: BTreeMap<&str, usize> = BTreeMap::new();
    let mut fan_out: BTreeMap<&str, usize> = BTreeMap::new();
    for dep in &deps.file_dependencies {
        if dep.is_resolved && !dep.is_external {
            *fan_in.entry(dep.target.as_str()).or_default() += 1;
            *fan_out.entry(dep.source_file.as_str()).or_default() += 1;
        }
    }

    let mut connections: BTreeMap<&str, usize> = BTreeMap::new();
    for (module, count) in &fan_in {
        *connections.entry(module).or_default() += count;
    }
    for (module, count) in &fan_out {
        *connections.entry(module).or_default() += count;
    }

    let mut ranked: Vec<(&str, usize)> =
        connections.into_iter().filter(|(_, count)| *count >= min_connections).collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
    ranked.truncate(top_k);

    let nodes: Vec<GraphNode> =
        ranked.iter().map(|(module, count)| GraphNode { module: module.to_string(), connections: *count }).collect();
    let node_set: BTreeSet<&str> = ranked.iter().map(|(m, _)| *m).collect();

    let mut edges_per_node: BTreeMap<&str, usize> = BTreeMap::new();
    let mut edges = Vec::new();
    for dep in &deps.file_dependencies {
        if !dep.is_resolved || dep.is_external {
            continue;
        }
        if !node_set.contains(dep.source_file.as_str()) || !node_set.contains(dep.target.as_str()) {
            continue;
        }
        let count = edges_per_node.entry(dep.source_file.as_str()).or_default();
        if *count >= max_edges_per_node {
            continue;
        }
        *count += 1;
        edges.push(GraphEdge { importer: dep.source_file.clone(), imported: dep.target.clone() });
    }

    DependencyGraphData { nodes, edges }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{FileDependency, ImportKind};

    fn dep(source: &str, target: &str) -> FileDependency {
        FileDependency { source_file: source.into(), target: target.into(), is_resolved: true, is_external: false, import_kind: ImportKind::Import, line: 1 }
    }

    #[test]
    fn ranks_nodes_by_total_connections() {
        let deps = ResolvedDependencies {
            file_dependencies: vec![dep("a.py", "util.py"), dep("b.py", "util.py"), dep("c.py", "util.py")],
            function_calls_resolved: vec![],
            circular_dependencies: vec![],
        };
        let graph = build(&deps, 1, 5, 10);
        assert_eq!(graph.nodes[0].module, "util.py");
        assert_eq!(graph.nodes[0].connections, 3);
    }

    #[test]
    fn min_connections_filters_low_degree_nodes() {
        let deps = ResolvedDependencies {
            file_dependencies: vec![dep("a.py", "rarely_used.py")],
            function_calls_resolved: vec![],
            circular_dependencies: vec![],
        };
        let graph = build(&deps, 2, 5, 10);
        assert!(graph.nodes.is_empty());
    }

    #[test]
    fn caps_edges_per_node() {
        let deps = ResolvedDependencies {
            file_dependencies: vec![dep("hub.py", "a.py"), dep("hub.py", "b.py"), dep("hub.py", "c.py")],
            function_calls_resolved: vec![],
            circular_dependencies: vec![],
        };
        let graph = build(&deps, 1, 10, 2);
        let hub_edges = graph.edges.iter().filter(|e| e.importer == "hub.py").count();
        assert_eq!(hub_edges, 2);
    }
}
