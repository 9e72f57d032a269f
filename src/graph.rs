//! Assembles the node/edge lineage graph from a parsed document.
//!
//! Nodes are created for every query unit plus, lazily, one per distinct
//! physical source table; joins become their own diamond nodes; a synthetic
//! output node terminates the graph. Edge insertion is idempotent on the
//! `(source, target)` pair. Positioning is delegated to an external
//! [`LayoutEngine`]; the assembler only declares node dimensions.

use indexmap::{IndexMap, IndexSet};
use serde::{Deserialize, Serialize};
use strum_macros::Display;

use crate::classify::match_key;
use crate::model::{JoinType, ParsedSql, SubQuery};

pub const OUTPUT_NODE_ID: &str = "output";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum NodeKind {
    Source,
    Cte,
    Subquery,
    Main,
    Output,
    Temp,
    Join,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum EdgeStyle {
    Plain,
    Union,
    Terminal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Node {
    pub id: String,
    pub kind: NodeKind,
    pub label: String,
    pub width: f64,
    pub height: f64,
    /// Center position, finalized by the external layout engine.
    pub x: f64,
    pub y: f64,
    /// The parsed unit behind a content node.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub query: Option<SubQuery>,
    /// Join-node payload.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub join_type: Option<JoinType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub condition: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Edge {
    pub source: String,
    pub target: String,
    pub style: EdgeStyle,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Graph {
    pub nodes: Vec<Node>,
    pub edges: Vec<Edge>,
}

/// External collaborator that assigns a center position per node id from
/// node dimensions and edges. Treated as a black box; nodes it returns no
/// position for keep their input position.
pub trait LayoutEngine {
    fn layout(&self, graph: &Graph) -> IndexMap<String, (f64, f64)>;
}

impl Graph {
    pub fn apply_layout(&mut self, engine: &dyn LayoutEngine) {
        let positions = engine.layout(self);
        for node in &mut self.nodes {
            if let Some(&(x, y)) = positions.get(&node.id) {
                node.x = x;
                node.y = y;
            }
        }
    }

    pub fn node(&self, id: &str) -> Option<&Node> {
        self.nodes.iter().find(|n| n.id == id)
    }

    pub fn incoming(&self, id: &str) -> impl Iterator<Item = &Edge> {
        self.edges.iter().filter(move |e| e.target == id)
    }
}

/// Builds the lineage graph for one parse result.
pub fn assemble(parsed: &ParsedSql) -> Graph {
    Assembler::new(parsed).run()
}

#[derive(Clone, Copy)]
enum NodeIdSpace {
    Join,
    Source,
}

struct Assembler<'a> {
    parsed: &'a ParsedSql,
    nodes: Vec<Node>,
    edges: Vec<Edge>,
    edge_keys: IndexSet<(String, String)>,
    /// match key of a physical table name -> its source node id.
    sources: IndexMap<String, String>,
    /// Match keys of every node id placed so far. Generated join/source ids
    /// are drawn from this namespace so they never shadow a unit id.
    node_ids: IndexSet<String>,
    next_join: u64,
    next_source: u64,
}

impl<'a> Assembler<'a> {
    fn new(parsed: &'a ParsedSql) -> Self {
        Self {
            parsed,
            nodes: vec![],
            edges: vec![],
            edge_keys: IndexSet::new(),
            sources: IndexMap::new(),
            node_ids: IndexSet::new(),
            next_join: 0,
            next_source: 0,
        }
    }

    fn run(mut self) -> Graph {
        for unit in self.parsed.all_queries() {
            self.node_ids.insert(match_key(&unit.id));
            self.nodes.push(unit_node(unit));
        }
        self.node_ids.insert(match_key(OUTPUT_NODE_ID));
        self.nodes.push(Node {
            id: OUTPUT_NODE_ID.to_owned(),
            kind: NodeKind::Output,
            label: "output".to_owned(),
            width: 140.0,
            height: 48.0,
            x: 0.0,
            y: 0.0,
            query: None,
            join_type: None,
            condition: None,
        });

        let units: Vec<&SubQuery> = self.parsed.all_queries().collect();
        for unit in &units {
            self.connect_unit(unit);
        }

        // The terminal edge goes in last and carries heavier emphasis.
        let main_id = self.parsed.main_query.id.clone();
        self.add_edge(&main_id, OUTPUT_NODE_ID, EdgeStyle::Terminal, None);

        Graph {
            nodes: self.nodes,
            edges: self.edges,
        }
    }

    /// Next free id in the given generated namespace, skipping ids already
    /// held by unit nodes (a CTE may legitimately be named `join_1`).
    fn fresh_node_id(&mut self, space: NodeIdSpace) -> String {
        loop {
            let candidate = match space {
                NodeIdSpace::Join => {
                    self.next_join += 1;
                    format!("join_{}", self.next_join)
                }
                NodeIdSpace::Source => {
                    self.next_source += 1;
                    format!("source_{}", self.next_source)
                }
            };
            if self.node_ids.insert(match_key(&candidate)) {
                return candidate;
            }
        }
    }

    /// Resolves a referenced name to an already-known unit node id. Declared
    /// CTE/temp-table names are tried before raw ids, mirroring the parser's
    /// scope resolution, so a unit whose id was suffixed away from its name
    /// is still found under the name the script used.
    fn unit_node_id(&self, name: &str) -> Option<String> {
        let key = match_key(name);
        self.parsed
            .all_queries()
            .find(|q| (q.is_cte || q.is_temp_table) && match_key(&q.name) == key)
            .or_else(|| self.parsed.all_queries().find(|q| match_key(&q.id) == key))
            .map(|q| q.id.clone())
    }

    /// Source nodes are created lazily on first reference and cached by the
    /// normalized table name.
    fn source_node_id(&mut self, name: &str) -> String {
        let key = match_key(name);
        if let Some(id) = self.sources.get(&key) {
            return id.clone();
        }
        let id = self.fresh_node_id(NodeIdSpace::Source);
        self.nodes.push(Node {
            id: id.clone(),
            kind: NodeKind::Source,
            label: name.to_owned(),
            width: 160.0,
            height: 40.0,
            x: 0.0,
            y: 0.0,
            query: None,
            join_type: None,
            condition: None,
        });
        self.sources.insert(key, id.clone());
        id
    }

    /// Known unit if the name matches one, physical source node otherwise.
    fn resolve_node(&mut self, name: &str) -> String {
        match self.unit_node_id(name) {
            Some(id) => id,
            None => self.source_node_id(name),
        }
    }

    fn add_edge(&mut self, source: &str, target: &str, style: EdgeStyle, label: Option<String>) {
        if source == target {
            return;
        }
        if self
            .edge_keys
            .insert((source.to_owned(), target.to_owned()))
        {
            self.edges.push(Edge {
                source: source.to_owned(),
                target: target.to_owned(),
                style,
                label,
            });
        }
    }

    fn connect_unit(&mut self, unit: &SubQuery) {
        // Table names already wired in, so fallback passes skip them.
        let mut handled: IndexSet<String> = IndexSet::new();
        // Dependency ids already wired in.
        let mut handled_deps: IndexSet<String> = IndexSet::new();

        // The FROM table is the first table not owned by any join clause.
        let from_table = unit.tables.iter().find(|t| {
            !unit
                .joins
                .iter()
                .any(|j| match_key(&j.table.name) == match_key(&t.name))
        });

        for join in &unit.joins {
            let join_id = self.fresh_node_id(NodeIdSpace::Join);
            self.nodes.push(Node {
                id: join_id.clone(),
                kind: NodeKind::Join,
                label: join.join_type.to_string(),
                width: 96.0,
                height: 60.0,
                x: 0.0,
                y: 0.0,
                query: None,
                join_type: Some(join.join_type),
                condition: if join.condition.is_empty() {
                    None
                } else {
                    Some(join.condition.clone())
                },
            });
            if let Some(from) = from_table {
                let from_node = self.resolve_node(&from.name);
                self.add_edge(&from_node, &join_id, EdgeStyle::Plain, None);
                handled.insert(match_key(&from.name));
                handled_deps.insert(match_key(&from_node));
            }
            let target_node = self.resolve_node(&join.table.name);
            self.add_edge(&target_node, &join_id, EdgeStyle::Plain, None);
            self.add_edge(&join_id, &unit.id, EdgeStyle::Plain, None);
            handled.insert(match_key(&join.table.name));
            handled_deps.insert(match_key(&target_node));
        }

        // Union branches backed by physical tables get distinguished edges
        // labelled with the operator; branches that are known units flow
        // through the dependency pass below.
        if let Some(union) = &unit.union_info {
            for source in &union.sources {
                if self.unit_node_id(source).is_some() {
                    continue;
                }
                let node = self.source_node_id(source);
                self.add_edge(
                    &node,
                    &unit.id,
                    EdgeStyle::Union,
                    Some(union.operator.to_string()),
                );
                handled.insert(match_key(source));
            }
        }

        for dep in &unit.depends_on {
            if handled_deps.contains(&match_key(dep)) || handled.contains(&match_key(dep)) {
                continue;
            }
            if let Some(node) = self.unit_node_id(dep) {
                self.add_edge(&node, &unit.id, EdgeStyle::Plain, None);
                handled_deps.insert(match_key(dep));
            }
        }

        // Remaining table references: known unit or physical source.
        for table in &unit.tables {
            let key = match_key(&table.name);
            if handled.contains(&key) || handled_deps.contains(&key) {
                continue;
            }
            let node = self.resolve_node(&table.name);
            self.add_edge(&node, &unit.id, EdgeStyle::Plain, None);
            handled.insert(key);
        }

        // Orphan rescue: a non-main unit that declares tables must end up
        // reachable from at least one of them.
        let is_intermediate = unit.is_cte || unit.is_temp_table || unit.is_sub_query;
        if is_intermediate && !unit.tables.is_empty() {
            let incoming: Vec<String> = self
                .edges
                .iter()
                .filter(|e| e.target == unit.id)
                .map(|e| e.source.clone())
                .collect();
            if incoming.is_empty() {
                log::debug!("unit `{}` has no inbound edges, rescuing from its tables", unit.id);
                for table in &unit.tables {
                    let node = match self.unit_node_id(&table.name) {
                        Some(id) if id != unit.id => id,
                        Some(_) => continue,
                        None => self.source_node_id(&table.name),
                    };
                    self.add_edge(&node, &unit.id, EdgeStyle::Plain, None);
                }
            }
        }
    }
}

fn unit_node(unit: &SubQuery) -> Node {
    let kind = if unit.is_temp_table {
        NodeKind::Temp
    } else if unit.is_cte {
        NodeKind::Cte
    } else if unit.is_sub_query {
        NodeKind::Subquery
    } else {
        NodeKind::Main
    };
    // Height grows with the visible field list, capped for display.
    let rows = unit.fields.len().min(12) as f64;
    Node {
        id: unit.id.clone(),
        kind,
        label: unit.name.clone(),
        width: 200.0,
        height: 46.0 + 18.0 * rows,
        x: 0.0,
        y: 0.0,
        query: Some(unit.clone()),
        join_type: None,
        condition: None,
    }
}
