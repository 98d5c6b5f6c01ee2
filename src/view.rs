//! Graph view: a deduplicated node/edge set ready for rendering.
//!
//! Nodes are keyed by display label by default, so two IRIs with the same
//! label collapse into one node. [`NodeIdentity::Iri`] keys by IRI instead.
//! Edges are emitted class→class first, then instance→instance, then the
//! synthetic instance-of edges.

use std::collections::{BTreeMap, HashMap, HashSet};

use serde::Serialize;

use crate::config::ViewConfig;
use crate::resolve::{Instance, RelationCategory, Resolution, ResolvedModel};
use crate::sparql::QueryResult;
use crate::store::Term;

pub const CLASS_NODE_SIZE: u32 = 30;
pub const INSTANCE_NODE_SIZE: u32 = 20;
/// Size range for result nodes scaled by their value.
pub const RESULT_MIN_SIZE: u32 = 10;
pub const RESULT_MAX_SIZE: u32 = 50;

const CLASS_EDGE_COLOR: &str = "#999999";
const INSTANCE_EDGE_COLOR: &str = "#666666";
const INSTANCE_OF_EDGE_COLOR: &str = "#BBBBBB";
const INSTANCE_OF_LABEL: &str = "instance of";

/// How graph nodes are keyed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeIdentity {
    /// Key by display label; distinct IRIs sharing a label merge.
    #[default]
    Label,
    /// Key by IRI; no merging.
    Iri,
}

#[derive(Debug, Clone)]
pub struct ViewOptions {
    pub include_classes: bool,
    pub identity: NodeIdentity,
    pub default_color: String,
    /// Class label → node color.
    pub class_colors: BTreeMap<String, String>,
}

impl Default for ViewOptions {
    fn default() -> Self {
        Self::from_config(&ViewConfig::default())
    }
}

impl ViewOptions {
    pub fn from_config(config: &ViewConfig) -> Self {
        Self {
            include_classes: true,
            identity: NodeIdentity::Label,
            default_color: config.default_color.clone(),
            class_colors: config.class_colors.clone(),
        }
    }

    pub fn with_classes(mut self, include_classes: bool) -> Self {
        self.include_classes = include_classes;
        self
    }

    pub fn with_identity(mut self, identity: NodeIdentity) -> Self {
        self.identity = identity;
        self
    }

    fn color_for(&self, class_label: &str) -> &str {
        self.class_colors
            .get(class_label)
            .map(String::as_str)
            .unwrap_or(&self.default_color)
    }

    fn key(&self, iri: &Term, label: &str) -> String {
        match self.identity {
            NodeIdentity::Label => label.to_string(),
            NodeIdentity::Iri => iri.display(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    Class,
    Instance,
    /// A row of a query result.
    Result,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GraphNode {
    pub id: String,
    pub label: String,
    pub size: u32,
    pub color: String,
    pub kind: NodeKind,
    /// Class label for instances.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,
    /// Numeric value carried by result nodes.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GraphEdge {
    pub source: String,
    pub target: String,
    pub label: String,
    pub color: String,
    pub category: RelationCategory,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct GraphView {
    pub nodes: Vec<GraphNode>,
    pub edges: Vec<GraphEdge>,
    #[serde(skip)]
    index: HashMap<String, usize>,
}

impl GraphView {
    pub fn node(&self, id: &str) -> Option<&GraphNode> {
        self.index.get(id).map(|&i| &self.nodes[i])
    }

    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    pub fn edges_between<'a>(
        &'a self,
        source: &'a str,
        target: &'a str,
    ) -> impl Iterator<Item = &'a GraphEdge> {
        self.edges
            .iter()
            .filter(move |e| e.source == source && e.target == target)
    }

    /// Insert a node unless one with the same id exists. First insertion wins.
    fn add_node(&mut self, node: GraphNode) -> bool {
        if self.index.contains_key(&node.id) {
            return false;
        }
        self.index.insert(node.id.clone(), self.nodes.len());
        self.nodes.push(node);
        true
    }
}

/// Build the graph view of a resolved model.
pub fn build(model: &ResolvedModel, options: &ViewOptions) -> GraphView {
    let mut view = GraphView::default();

    for instance in model.instances() {
        let Resolution::Resolved(label) = &instance.label else {
            continue;
        };
        view.add_node(instance_node(instance, label, options));
    }

    if options.include_classes {
        for class in model.labeled_classes() {
            let label = class.label.display();
            view.add_node(class_node(options.key(&class.iri, label), label, options));
        }
    }

    let relations = model.relations();
    let push_relations = |view: &mut GraphView, category: RelationCategory, color: &str| {
        for relation in relations.iter().filter(|r| r.category == category) {
            view.edges.push(GraphEdge {
                source: options.key(&relation.source, &relation.source_label),
                target: options.key(&relation.target, &relation.target_label),
                label: relation.predicate_label.clone(),
                color: color.to_string(),
                category,
            });
        }
    };
    if options.include_classes {
        push_relations(&mut view, RelationCategory::ClassToClass, CLASS_EDGE_COLOR);
    }
    push_relations(&mut view, RelationCategory::InstanceToInstance, INSTANCE_EDGE_COLOR);

    if options.include_classes {
        let mut linked = HashSet::new();
        for instance in model.instances() {
            let (Resolution::Resolved(label), Some(class), Resolution::Resolved(class_label)) =
                (&instance.label, &instance.class, &instance.class_label)
            else {
                continue;
            };
            let source = options.key(&instance.iri, label);
            let target = options.key(class, class_label);
            // The class may carry a label without being declared as a class.
            view.add_node(class_node(target.clone(), class_label, options));
            if !linked.insert((source.clone(), target.clone())) {
                continue;
            }
            view.edges.push(GraphEdge {
                source,
                target,
                label: INSTANCE_OF_LABEL.to_string(),
                color: INSTANCE_OF_EDGE_COLOR.to_string(),
                category: RelationCategory::InstanceOf,
            });
        }
    }

    tracing::debug!(
        nodes = view.nodes.len(),
        edges = view.edges.len(),
        identity = ?options.identity,
        "built graph view"
    );
    view
}

fn instance_node(instance: &Instance, label: &str, options: &ViewOptions) -> GraphNode {
    let class_label = instance.class_label.display();
    GraphNode {
        id: options.key(&instance.iri, label),
        label: format!("{label}\n({class_label})"),
        size: INSTANCE_NODE_SIZE,
        color: options.color_for(class_label).to_string(),
        kind: NodeKind::Instance,
        group: Some(class_label.to_string()),
        value: None,
    }
}

fn class_node(id: String, label: &str, options: &ViewOptions) -> GraphNode {
    GraphNode {
        id,
        label: label.to_string(),
        size: CLASS_NODE_SIZE,
        color: options.color_for(label).to_string(),
        kind: NodeKind::Class,
        group: None,
        value: None,
    }
}

/// One node per result row, keyed by `id_column`.
///
/// Rows without an `id_column` binding are skipped; repeated ids keep the
/// first row. `value_column`, when numeric, is carried as the node value.
pub fn from_query_result(
    result: &QueryResult,
    id_column: &str,
    label_column: Option<&str>,
    value_column: Option<&str>,
    options: &ViewOptions,
) -> GraphView {
    let mut view = GraphView::default();
    for row in &result.rows {
        let Some(id) = row.get(id_column) else {
            continue;
        };
        let label = label_column
            .and_then(|column| row.get(column))
            .unwrap_or(id);
        let value = value_column
            .and_then(|column| row.get(column))
            .and_then(|v| v.parse::<f64>().ok());
        view.add_node(GraphNode {
            id: id.clone(),
            label: label.clone(),
            size: INSTANCE_NODE_SIZE,
            color: options.default_color.clone(),
            kind: NodeKind::Result,
            group: None,
            value,
        });
    }
    scale_by_value(&mut view.nodes);
    view
}

/// Size valued nodes between [`RESULT_MIN_SIZE`] and [`RESULT_MAX_SIZE`] on a
/// log scale. Nodes without a value keep their size.
fn scale_by_value(nodes: &mut [GraphNode]) {
    let magnitude = |v: f64| v.max(0.0).ln_1p();
    let (lo, hi) = nodes
        .iter()
        .filter_map(|n| n.value)
        .map(magnitude)
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), m| (lo.min(m), hi.max(m)));
    if lo > hi {
        return;
    }
    let span = f64::from(RESULT_MAX_SIZE - RESULT_MIN_SIZE);
    for node in nodes.iter_mut() {
        let Some(value) = node.value else { continue };
        let fraction = if hi > lo { (magnitude(value) - lo) / (hi - lo) } else { 0.5 };
        node.size = RESULT_MIN_SIZE + (fraction * span).round() as u32;
    }
}
