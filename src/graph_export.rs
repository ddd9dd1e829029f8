//! Construction plan export for visualization and debugging.
//!
//! [`export_plan`] turns a built container into a serializable graph: one
//! node per service in construction order, one edge per resolved link.
//! Available with the `graph-export` feature.

use serde::{Deserialize, Serialize};

use crate::dependency::DependencyParam;
use crate::descriptors::ServiceDescriptor;
use crate::error::{DiError, DiResult};
use crate::provider::ServiceProvider;
use crate::scope::Scope;

/// A service in the plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphNode {
    /// Arena id, e.g. `#3`.
    pub id: String,
    pub type_name: String,
    pub qualifier: Option<String>,
    pub scope: String,
    pub markers: Vec<String>,
    /// Position in the construction order.
    pub position: usize,
    pub parent: Option<String>,
    pub proxied: bool,
}

/// A resolved link between two services, or a service and a resolver.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphEdge {
    /// The consuming service.
    pub from: String,
    /// The producing service id, or the resolver name for external edges.
    pub to: String,
    pub dependency_type: DependencyType,
    /// Requested type name.
    pub requested: String,
}

/// Kinds of edges in the plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DependencyType {
    Required,
    Optional,
    /// One edge per member of a collection parameter.
    Collection,
    /// Supplied by an external resolver.
    External,
    /// Parent to bean.
    Bean,
    /// Proxy to the aspect intercepting one of its methods.
    Aspect,
}

/// Metadata about the exported plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphMetadata {
    pub service_count: usize,
    pub singleton_count: usize,
    pub prototype_count: usize,
    pub proxy_count: usize,
    pub bean_count: usize,
    /// RFC 3339 export timestamp.
    pub exported_at: String,
    pub version: String,
}

/// Complete construction plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DependencyGraph {
    pub nodes: Vec<GraphNode>,
    pub edges: Vec<GraphEdge>,
    pub metadata: GraphMetadata,
}

/// Builds the plan of a container.
///
/// ```rust
/// use ferrous_ioc::graph_export::{export_plan, DependencyType};
/// use ferrous_ioc::{Dependency, ServiceCollection, ServiceDescriptor};
///
/// struct Repo;
/// struct Api;
///
/// let mut services = ServiceCollection::new();
/// services.add(ServiceDescriptor::service::<Repo>().constructor(|_| Ok(Repo)));
/// services.add(
///     ServiceDescriptor::service::<Api>()
///         .depends_on(Dependency::of::<Repo>())
///         .constructor(|_| Ok(Api)),
/// );
///
/// let graph = export_plan(&services.build().unwrap());
/// assert_eq!(graph.nodes.len(), 2);
/// assert_eq!(graph.edges.len(), 1);
/// assert_eq!(graph.edges[0].dependency_type, DependencyType::Required);
/// ```
pub fn export_plan(provider: &ServiceProvider) -> DependencyGraph {
    let engine = provider.inner();
    let mut nodes = Vec::new();
    let mut edges = Vec::new();

    for (position, id) in engine.order().iter().enumerate() {
        let d = &engine.arena[id.index()];
        nodes.push(node(d, position));

        if let Some(parent) = d.parent() {
            edges.push(GraphEdge {
                from: parent.to_string(),
                to: id.to_string(),
                dependency_type: DependencyType::Bean,
                requested: d.type_name().to_string(),
            });
        }

        let Some(links) = d.links() else { continue };
        for param in links.params().iter().chain(links.fields()) {
            param_edges(d, param, &mut edges);
        }
        for aspect in links.aspects() {
            edges.push(GraphEdge {
                from: id.to_string(),
                to: aspect.aspect().to_string(),
                dependency_type: DependencyType::Aspect,
                requested: aspect.method().to_string(),
            });
        }
    }

    let count = |scope: Scope| nodes.iter().filter(|n| n.scope == scope.to_string()).count();
    let metadata = GraphMetadata {
        service_count: nodes.len(),
        singleton_count: count(Scope::Singleton),
        prototype_count: count(Scope::Prototype),
        proxy_count: count(Scope::Proxy),
        bean_count: nodes.iter().filter(|n| n.parent.is_some()).count(),
        exported_at: chrono::Utc::now().to_rfc3339(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    };

    DependencyGraph { nodes, edges, metadata }
}

fn node(d: &ServiceDescriptor, position: usize) -> GraphNode {
    GraphNode {
        id: d.id().to_string(),
        type_name: d.type_name().to_string(),
        qualifier: d.qualifier().map(str::to_owned),
        scope: d.scope().to_string(),
        markers: d.markers().iter().map(ToString::to_string).collect(),
        position,
        parent: d.parent().map(|p| p.to_string()),
        proxied: d.slots.facade.read().is_some(),
    }
}

fn param_edges(d: &ServiceDescriptor, param: &DependencyParam, edges: &mut Vec<GraphEdge>) {
    let requested = param.key().display_name().to_string();
    if let Some(resolver) = param.resolver() {
        edges.push(GraphEdge {
            from: d.id().to_string(),
            to: resolver.name().to_string(),
            dependency_type: DependencyType::External,
            requested,
        });
        return;
    }

    let dependency_type = if param.is_collection() {
        DependencyType::Collection
    } else if param.is_required() {
        DependencyType::Required
    } else {
        DependencyType::Optional
    };
    for producer in param.producers() {
        edges.push(GraphEdge {
            from: d.id().to_string(),
            to: producer.to_string(),
            dependency_type,
            requested: requested.clone(),
        });
    }
}

pub fn to_json(provider: &ServiceProvider) -> DiResult<String> {
    serde_json::to_string_pretty(&export_plan(provider)).map_err(|e| DiError::Config(e.to_string()))
}

pub fn to_yaml(provider: &ServiceProvider) -> DiResult<String> {
    serde_yaml::to_string(&export_plan(provider)).map_err(|e| DiError::Config(e.to_string()))
}

/// Graphviz DOT rendering, dependencies pointing at their producers.
pub fn to_dot(provider: &ServiceProvider) -> String {
    let graph = export_plan(provider);
    let mut dot = String::from("digraph plan {\n");
    for node in &graph.nodes {
        let label = match &node.qualifier {
            Some(q) => format!("{} ({})", node.type_name, q),
            None => node.type_name.clone(),
        };
        dot.push_str(&format!("  \"{}\" [label=\"{}\\n{}\"];\n", node.id, label, node.scope));
    }
    for edge in &graph.edges {
        let style = match edge.dependency_type {
            DependencyType::Optional => " [style=dashed]",
            DependencyType::Bean => " [style=bold]",
            DependencyType::External | DependencyType::Aspect => " [style=dotted]",
            _ => "",
        };
        dot.push_str(&format!("  \"{}\" -> \"{}\"{};\n", edge.from, edge.to, style));
    }
    dot.push_str("}\n");
    dot
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Dependency, ServiceCollection, ServiceDescriptor};

    struct Pool;
    struct Conn;
    struct Repo;

    fn provider() -> ServiceProvider {
        let mut sc = ServiceCollection::new();
        sc.add(
            ServiceDescriptor::service::<Pool>()
                .constructor(|_| Ok(Pool))
                .bean(|_: &Pool| Ok(Conn), |b| b),
        );
        sc.add(
            ServiceDescriptor::service::<Repo>()
                .depends_on(Dependency::of::<Conn>())
                .depends_on(Dependency::of::<u8>().optional())
                .constructor(|_| Ok(Repo)),
        );
        sc.build().unwrap()
    }

    #[test]
    fn plan_has_bean_and_required_edges() {
        let graph = export_plan(&provider());

        assert_eq!(graph.metadata.service_count, 3);
        assert_eq!(graph.metadata.bean_count, 1);
        let kinds: Vec<_> = graph.edges.iter().map(|e| e.dependency_type).collect();
        assert_eq!(kinds, vec![DependencyType::Bean, DependencyType::Required]);
        assert_eq!(graph.nodes[1].parent.as_deref(), Some("#0"));
    }

    #[test]
    fn json_and_yaml_round_trip() {
        let provider = provider();
        let json = to_json(&provider).unwrap();
        let back: DependencyGraph = serde_json::from_str(&json).unwrap();
        assert_eq!(back.nodes.len(), 3);

        let yaml = to_yaml(&provider).unwrap();
        assert!(yaml.contains("type_name"));
        assert!(to_dot(&provider).starts_with("digraph plan"));
    }
}
