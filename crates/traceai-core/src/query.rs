//! Read-only query engine (§4.5): stats, lookup, lineage traversal, impact
//! analysis, component dependencies, and path search. Every traversal is
//! bounded by a visited-node cap so a pathological graph can't hang a caller
//! (§5, §7 LimitExceeded).
//!
//! Edge direction convention for lineage (grounded in §4.5's literal BFS
//! description): a `READS_FROM` edge points from the DataEntity/DataSource
//! to the Component that reads it; a `WRITES_TO` edge points from the
//! Component to the DataEntity/DataSource it writes. This makes downstream
//! traversal a straight walk of outgoing edges: entity --READS_FROM-->
//! component --WRITES_TO--> next entity.

use std::collections::{HashMap, HashSet, VecDeque};

use serde::Serialize;

use crate::error::{CoreError, CoreResult};
use crate::graph::{Graph, GraphEdge, GraphNode};
use crate::model::{normalize_identifier, split_schema, DependencyKind, NodeId};

/// Default traversal cap (§4.5, §5) — overridable per call.
pub const DEFAULT_MAX_VISITED: usize = 100_000;

/// Default BFS depth for `trace_lineage` (§4.5).
pub const DEFAULT_MAX_DEPTH: usize = 8;

#[derive(Debug, Clone, Serialize)]
pub struct GraphStats {
    pub node_count: usize,
    pub edge_count: usize,
    pub by_kind: HashMap<&'static str, usize>,
}

pub fn stats(graph: &Graph) -> GraphStats {
    GraphStats {
        node_count: graph.node_count(),
        edge_count: graph.edge_count(),
        by_kind: graph.by_kind(),
    }
}

/// Find nodes matching an optional kind label and/or name substring (§4.5
/// `find_nodes`), deterministically ordered by `(kind, name, id)`.
pub fn find_nodes<'g>(
    graph: &'g Graph,
    kind: Option<&str>,
    name_substring: Option<&str>,
    limit: Option<usize>,
) -> Vec<&'g GraphNode> {
    let needle = name_substring.map(|s| s.to_lowercase());
    let mut nodes: Vec<&GraphNode> = graph
        .all_nodes()
        .filter(|n| kind.map(|k| n.kind_label().eq_ignore_ascii_case(k)).unwrap_or(true))
        .filter(|n| needle.as_ref().map(|s| n.name().to_lowercase().contains(s)).unwrap_or(true))
        .collect();
    nodes.sort_by(|a, b| (a.kind_label(), a.name(), a.id()).cmp(&(b.kind_label(), b.name(), b.id())));
    if let Some(limit) = limit {
        nodes.truncate(limit);
    }
    nodes
}

/// Case-insensitive substring match over node names (§4.5 `find_by_name`),
/// exact matches first, both buckets tie-broken by id.
pub fn find_by_name<'g>(graph: &'g Graph, pattern: &str) -> Vec<&'g GraphNode> {
    let query_norm = pattern.trim().to_lowercase();
    let mut exact = Vec::new();
    let mut partial = Vec::new();
    for node in graph.all_nodes() {
        let name_norm = node.name().to_lowercase();
        if name_norm == query_norm {
            exact.push(node);
        } else if name_norm.contains(&query_norm) {
            partial.push(node);
        }
    }
    exact.sort_by_key(|n| n.id().clone());
    partial.sort_by_key(|n| n.id().clone());
    exact.extend(partial);
    exact
}

/// Matches a query name against a node's name with its schema prefix (if
/// any) stripped, so `"Customer"` finds a node stored as `"dbo.Customer"` —
/// §4.5 "nodes whose normalized name equals `entity_name`" is schema-blind.
fn starting_entities(graph: &Graph, entity_name: &str) -> Vec<NodeId> {
    let (query_schema, query_name) = split_schema(entity_name);
    let mut ids: Vec<NodeId> = graph
        .all_nodes()
        .filter(|n| matches!(n, GraphNode::DataEntity(_) | GraphNode::DataSource(_)))
        .filter(|n| {
            let (node_schema, node_name) = split_schema(n.name());
            node_name == query_name && (query_schema.is_none() || query_schema == node_schema)
        })
        .map(|n| n.id().clone())
        .collect();
    ids.sort();
    ids
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineageDirection {
    Upstream,
    Downstream,
    Both,
}

#[derive(Debug, Clone, Serialize)]
pub struct LineageNode {
    pub node_id: String,
    pub name: String,
    pub kind: &'static str,
    pub depth: usize,
}

#[derive(Debug, Clone, Serialize, Default)]
pub struct LineageResult {
    pub upstream: Vec<LineageNode>,
    pub downstream: Vec<LineageNode>,
    pub truncated: bool,
}

/// One bounded BFS layer over the bipartite entity/component dataflow graph,
/// alternating `READS_FROM`/`WRITES_TO` hops per §4.5's literal description.
fn bfs_entity_component(
    graph: &Graph,
    roots: &[NodeId],
    upstream: bool,
    max_depth: usize,
    max_visited: usize,
) -> (Vec<LineageNode>, bool) {
    let mut visited: HashSet<NodeId> = roots.iter().cloned().collect();
    let mut queue: VecDeque<(NodeId, usize)> = roots.iter().map(|r| (r.clone(), 0)).collect();
    let mut out = Vec::new();
    let mut truncated = false;

    while let Some((current, depth)) = queue.pop_front() {
        if depth >= max_depth {
            continue;
        }
        // First hop (entity -> component): upstream follows incoming
        // WRITES_TO (the entity's writers); downstream follows outgoing
        // READS_FROM (the entity's readers). Second hop mirrors from a
        // component back to/forward to the next entity.
        let mut next_ids: Vec<NodeId> = if upstream {
            graph
                .edges_to_of_kind(&current, DependencyKind::WritesTo)
                .map(|e| e.from.clone())
                .chain(graph.edges_to_of_kind(&current, DependencyKind::ReadsFrom).map(|e| e.from.clone()))
                .collect()
        } else {
            graph
                .edges_from_of_kind(&current, DependencyKind::ReadsFrom)
                .map(|e| e.to.clone())
                .chain(graph.edges_from_of_kind(&current, DependencyKind::WritesTo).map(|e| e.to.clone()))
                .collect()
        };
        next_ids.sort();
        next_ids.dedup();

        for next in next_ids {
            if visited.contains(&next) {
                continue;
            }
            if visited.len() >= max_visited {
                truncated = true;
                break;
            }
            visited.insert(next.clone());
            if let Some(node) = graph.node(&next) {
                out.push(LineageNode {
                    node_id: next.to_string(),
                    name: node.name().to_string(),
                    kind: node.kind_label(),
                    depth: depth + 1,
                });
            }
            queue.push_back((next, depth + 1));
        }
        if truncated {
            break;
        }
    }

    out.sort_by(|a, b| (a.depth, &a.node_id).cmp(&(b.depth, &b.node_id)));
    (out, truncated)
}

/// §4.5 `trace_lineage`: BFS from every DataEntity/DataSource node whose
/// normalized name matches `entity_name`.
pub fn trace_lineage(
    graph: &Graph,
    entity_name: &str,
    direction: LineageDirection,
    max_depth: usize,
    max_visited: usize,
) -> CoreResult<LineageResult> {
    let roots = starting_entities(graph, entity_name);
    if roots.is_empty() {
        return Err(CoreError::UnknownEntity(entity_name.to_string()));
    }

    let mut result = LineageResult::default();
    if matches!(direction, LineageDirection::Upstream | LineageDirection::Both) {
        let (nodes, truncated) = bfs_entity_component(graph, &roots, true, max_depth, max_visited);
        result.upstream = nodes;
        result.truncated |= truncated;
    }
    if matches!(direction, LineageDirection::Downstream | LineageDirection::Both) {
        let (nodes, truncated) = bfs_entity_component(graph, &roots, false, max_depth, max_visited);
        result.downstream = nodes;
        result.truncated |= truncated;
    }
    Ok(result)
}

#[derive(Debug, Clone, Serialize)]
pub struct ImpactResult {
    pub entity_name: String,
    pub readers: Vec<String>,
    pub writers: Vec<String>,
    pub total: usize,
}

/// §4.5 `analyze_impact`: one-hop readers/writers of every matching entity,
/// via the maintained adjacency (O(degree), no traversal).
pub fn analyze_impact(graph: &Graph, entity_name: &str) -> CoreResult<ImpactResult> {
    let roots = starting_entities(graph, entity_name);
    if roots.is_empty() {
        return Err(CoreError::UnknownEntity(entity_name.to_string()));
    }

    let mut readers: HashSet<NodeId> = HashSet::new();
    let mut writers: HashSet<NodeId> = HashSet::new();
    for root in &roots {
        readers.extend(graph.edges_from_of_kind(root, DependencyKind::ReadsFrom).map(|e| e.to.clone()));
        writers.extend(graph.edges_to_of_kind(root, DependencyKind::WritesTo).map(|e| e.from.clone()));
    }

    let mut reader_names: Vec<String> = readers
        .iter()
        .filter_map(|id| graph.node(id))
        .map(|n| n.name().to_string())
        .collect();
    let mut writer_names: Vec<String> = writers
        .iter()
        .filter_map(|id| graph.node(id))
        .map(|n| n.name().to_string())
        .collect();
    reader_names.sort();
    writer_names.sort();

    Ok(ImpactResult {
        entity_name: entity_name.to_string(),
        total: reader_names.len() + writer_names.len(),
        readers: reader_names,
        writers: writer_names,
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DependencyDirection {
    Upstream,
    Downstream,
}

/// §4.5 `component_dependencies`: PRECEDES + CALLS closure, depth-bounded
/// BFS, cycle-safe (each component appears at most once).
pub fn component_dependencies(
    graph: &Graph,
    component_id: &NodeId,
    direction: DependencyDirection,
    max_depth: usize,
    max_visited: usize,
) -> CoreResult<Vec<String>> {
    if !graph.contains_node(component_id) {
        return Err(CoreError::UnknownEntity(component_id.to_string()));
    }

    let kinds = [DependencyKind::Precedes, DependencyKind::Calls];
    let mut visited: HashSet<NodeId> = HashSet::from([component_id.clone()]);
    let mut queue: VecDeque<(NodeId, usize)> = VecDeque::from([(component_id.clone(), 0)]);
    let mut out = Vec::new();

    while let Some((current, depth)) = queue.pop_front() {
        if depth >= max_depth {
            continue;
        }
        let mut next_ids: Vec<NodeId> = match direction {
            DependencyDirection::Downstream => kinds
                .iter()
                .flat_map(|k| graph.edges_from_of_kind(&current, *k))
                .map(|e| e.to.clone())
                .collect(),
            DependencyDirection::Upstream => kinds
                .iter()
                .flat_map(|k| graph.edges_to_of_kind(&current, *k))
                .map(|e| e.from.clone())
                .collect(),
        };
        next_ids.sort();
        next_ids.dedup();

        for next in next_ids {
            if visited.contains(&next) {
                continue;
            }
            if visited.len() >= max_visited {
                return Err(CoreError::LimitExceeded { visited: visited.len(), cap: max_visited });
            }
            visited.insert(next.clone());
            out.push(next.to_string());
            queue.push_back((next, depth + 1));
        }
    }

    out.sort();
    Ok(out)
}

/// §4.5 `paths_between`: all simple paths up to `max_len`, bounded by
/// `max_visited` total edge expansions.
pub fn paths_between(
    graph: &Graph,
    from: &NodeId,
    to: &NodeId,
    max_len: usize,
    max_visited: usize,
) -> CoreResult<Vec<Vec<String>>> {
    if !graph.contains_node(from) {
        return Err(CoreError::UnknownEntity(from.to_string()));
    }
    if !graph.contains_node(to) {
        return Err(CoreError::UnknownEntity(to.to_string()));
    }

    let mut results = Vec::new();
    let mut path = vec![from.clone()];
    let mut on_path: HashSet<NodeId> = HashSet::from([from.clone()]);
    let mut visited_total = 0usize;

    fn dfs(
        graph: &Graph,
        current: &NodeId,
        to: &NodeId,
        depth: usize,
        max_len: usize,
        max_visited: usize,
        visited_total: &mut usize,
        path: &mut Vec<NodeId>,
        on_path: &mut HashSet<NodeId>,
        results: &mut Vec<Vec<String>>,
    ) -> CoreResult<()> {
        if current == to {
            results.push(path.iter().map(|n| n.to_string()).collect());
            return Ok(());
        }
        if depth >= max_len {
            return Ok(());
        }
        let mut next_ids: Vec<NodeId> =
            graph.all_edges().filter(|e| &e.from == current).map(|e| e.to.clone()).collect();
        next_ids.sort();
        next_ids.dedup();
        for next in next_ids {
            if on_path.contains(&next) {
                continue;
            }
            *visited_total += 1;
            if *visited_total > max_visited {
                return Err(CoreError::LimitExceeded { visited: *visited_total, cap: max_visited });
            }
            path.push(next.clone());
            on_path.insert(next.clone());
            dfs(graph, &next, to, depth + 1, max_len, max_visited, visited_total, path, on_path, results)?;
            on_path.remove(&next);
            path.pop();
        }
        Ok(())
    }

    dfs(graph, from, to, 0, max_len, max_visited, &mut visited_total, &mut path, &mut on_path, &mut results)?;
    // Shorter paths first, then lexicographic by the concatenated node-id
    // string (§4.5 tie-breaking).
    results.sort_by(|a, b| (a.len(), a.concat()).cmp(&(b.len(), b.concat())));
    Ok(results)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::GraphBuilder;
    use crate::model::{
        Component, DataEntity, Dependency, DependencyTarget, Document, DocumentKind,
        ParsedDocument,
    };
    use std::collections::HashMap as Map;

    fn doc(name: &str, path: &str) -> Document {
        Document {
            id: NodeId::document(path, name),
            name: name.to_string(),
            kind: DocumentKind::Ssis,
            source_path: path.to_string(),
            content_hash: name.to_string(),
            parsed_at: chrono::Utc::now(),
            custom: Map::new(),
        }
    }

    fn component(d: &Document, name: &str) -> Component {
        Component {
            id: NodeId::component(&d.id, name),
            document_id: d.id.clone(),
            name: name.to_string(),
            component_type: "DataFlowTask".to_string(),
            description: None,
            source_excerpt: None,
            parse_partial: false,
        }
    }

    fn entity(name: &str) -> DataEntity {
        DataEntity {
            id: NodeId::data_entity(None, &normalize_identifier(name)),
            name: name.to_string(),
            entity_type: "table".to_string(),
            columns: Vec::new(),
            schema: None,
        }
    }

    /// Builds the S1 scenario from spec.md §8: ExtractCustomers/AggregateSales
    /// read Customer; MergeToWarehouse writes Customer.
    fn build_s1() -> GraphBuilder {
        let mut builder = GraphBuilder::new();
        let d = doc("Load", "/ssis/load.dtsx");
        let extract = component(&d, "ExtractCustomers");
        let merge = component(&d, "MergeToWarehouse");
        let aggregate = component(&d, "AggregateSales");
        let customer = entity("Customer");

        let mut parsed = ParsedDocument::empty(d);
        parsed.components = vec![extract.clone(), merge.clone(), aggregate.clone()];
        parsed.data_entities = vec![customer.clone()];
        parsed.dependencies = vec![
            Dependency {
                from_id: customer.id.clone(),
                to_id: DependencyTarget::Id(extract.id.clone()),
                kind: DependencyKind::ReadsFrom,
                properties: Map::new(),
                confidence: 1.0,
            },
            Dependency {
                from_id: customer.id.clone(),
                to_id: DependencyTarget::Id(aggregate.id.clone()),
                kind: DependencyKind::ReadsFrom,
                properties: Map::new(),
                confidence: 1.0,
            },
            Dependency {
                from_id: merge.id.clone(),
                to_id: DependencyTarget::Id(customer.id.clone()),
                kind: DependencyKind::WritesTo,
                properties: Map::new(),
                confidence: 1.0,
            },
        ];
        builder.add_document(parsed).unwrap();
        builder
    }

    #[test]
    fn s1_impact_matches_scenario() {
        let builder = build_s1();
        let impact = analyze_impact(builder.graph(), "Customer").unwrap();
        assert_eq!(impact.readers, vec!["AggregateSales".to_string(), "ExtractCustomers".to_string()]);
        assert_eq!(impact.writers, vec!["MergeToWarehouse".to_string()]);
        assert_eq!(impact.total, 3);
    }

    #[test]
    fn unknown_entity_errors() {
        let builder = build_s1();
        let err = analyze_impact(builder.graph(), "NoSuchThing").unwrap_err();
        assert!(matches!(err, CoreError::UnknownEntity(_)));
    }

    #[test]
    fn downstream_lineage_reaches_writer_component() {
        let builder = build_s1();
        let result = trace_lineage(builder.graph(), "Customer", LineageDirection::Downstream, DEFAULT_MAX_DEPTH, DEFAULT_MAX_VISITED).unwrap();
        assert!(result.downstream.iter().any(|n| n.name == "ExtractCustomers"));
        assert!(!result.truncated);
    }

    #[test]
    fn upstream_lineage_reaches_reader_component() {
        let builder = build_s1();
        let result = trace_lineage(builder.graph(), "Customer", LineageDirection::Upstream, DEFAULT_MAX_DEPTH, DEFAULT_MAX_VISITED).unwrap();
        assert!(result.upstream.iter().any(|n| n.name == "MergeToWarehouse"));
    }

    #[test]
    fn max_depth_zero_returns_no_extra_nodes() {
        let builder = build_s1();
        let result = trace_lineage(builder.graph(), "Customer", LineageDirection::Both, 0, DEFAULT_MAX_VISITED).unwrap();
        assert!(result.upstream.is_empty());
        assert!(result.downstream.is_empty());
    }

    #[test]
    fn component_dependencies_is_cycle_safe() {
        let mut builder = GraphBuilder::new();
        let d = doc("Cyclic", "/jcl/cyclic.jcl");
        let a = component(&d, "A");
        let b = component(&d, "B");
        let c = component(&d, "C");
        let mut parsed = ParsedDocument::empty(d);
        parsed.components = vec![a.clone(), b.clone(), c.clone()];
        parsed.dependencies = vec![
            Dependency { from_id: a.id.clone(), to_id: DependencyTarget::Id(b.id.clone()), kind: DependencyKind::Precedes, properties: Map::new(), confidence: 1.0 },
            Dependency { from_id: b.id.clone(), to_id: DependencyTarget::Id(c.id.clone()), kind: DependencyKind::Precedes, properties: Map::new(), confidence: 1.0 },
            Dependency { from_id: c.id.clone(), to_id: DependencyTarget::Id(a.id.clone()), kind: DependencyKind::Precedes, properties: Map::new(), confidence: 1.0 },
        ];
        builder.add_document(parsed).unwrap();

        let deps = component_dependencies(builder.graph(), &a.id, DependencyDirection::Downstream, 10, DEFAULT_MAX_VISITED).unwrap();
        assert_eq!(deps.len(), 2);
        assert!(deps.contains(&b.id.to_string()));
        assert!(deps.contains(&c.id.to_string()));
    }

    #[test]
    fn paths_between_finds_direct_edge() {
        let builder = build_s1();
        let roots = starting_entities(builder.graph(), "Customer");
        let customer_id = roots[0].clone();
        let extract_id = find_by_name(builder.graph(), "ExtractCustomers")[0].id().clone();
        let paths = paths_between(builder.graph(), &customer_id, &extract_id, 5, DEFAULT_MAX_VISITED).unwrap();
        assert_eq!(paths.len(), 1);
        assert_eq!(paths[0].len(), 2);
    }

    #[test]
    fn find_by_name_ranks_exact_before_partial() {
        let builder = build_s1();
        let results = find_by_name(builder.graph(), "ExtractCustomers");
        assert_eq!(results[0].name(), "ExtractCustomers");
    }

    #[test]
    fn find_nodes_filters_by_kind_and_limit() {
        let builder = build_s1();
        let components = find_nodes(builder.graph(), Some("Component"), None, None);
        assert_eq!(components.len(), 3);
        let limited = find_nodes(builder.graph(), Some("Component"), None, Some(1));
        assert_eq!(limited.len(), 1);
    }
}
