//! Call-graph data model shared by the builder, the differ and the views.

use pprof_parse::Profile;
use serde::Serialize;
use std::cmp::Reverse;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

use crate::{Error, Result};

/// Position of a node inside its owning [`ProfileView`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct NodeId(pub usize);

/// Identity of a function that is stable across independently decoded
/// profiles: `name|file|start-line`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FunctionKey {
    pub name: String,
    pub filename: String,
    pub start_line: i64,
}

impl FunctionKey {
    pub fn signature(&self) -> String {
        format!("{}|{}|{}", self.name, self.filename, self.start_line)
    }

    /// Id derived from the signature's hash, identical for the same function
    /// no matter which profile it came from.
    pub fn stable_id(&self) -> u64 {
        let hash = blake3::hash(self.signature().as_bytes());
        let mut prefix = [0u8; 8];
        prefix.copy_from_slice(&hash.as_bytes()[..8]);
        u64::from_le_bytes(prefix)
    }
}

impl fmt::Display for FunctionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.signature())
    }
}

/// How a function's presence changed between two profiles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeType {
    Modified,
    New,
    Removed,
}

/// Before/after comparison attached to nodes of a diff view.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DiffStats {
    pub flat_delta: i64,
    pub cum_delta: i64,
    pub flat_ratio: f64,
    pub cum_ratio: f64,
    pub change: ChangeType,
}

/// Category of a view's unit, which decides formatting and wording.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UnitKind {
    Duration,
    Space,
    Count,
}

impl UnitKind {
    pub fn from_unit(unit: &str) -> Self {
        match unit {
            "nanoseconds" => UnitKind::Duration,
            "bytes" => UnitKind::Space,
            _ => UnitKind::Count,
        }
    }
}

/// One function's aggregated cost within a view.
#[derive(Debug, Clone, PartialEq)]
pub struct FuncNode {
    pub id: NodeId,
    /// Decoder-assigned id of the first function record seen with this
    /// identity, or the signature hash in a diff view.
    pub function_id: u64,
    pub name: String,
    pub filename: String,
    pub start_line: i64,
    /// Cost while this function was the running leaf.
    pub flat: i64,
    /// Cost of this function plus everything it called.
    pub cum: i64,
    pub is_project_code: bool,
    pub diff: Option<DiffStats>,
    /// Edges from callers, weighted by the value that flowed over them.
    pub callers: BTreeMap<NodeId, i64>,
    /// Edges to callees.
    pub callees: BTreeMap<NodeId, i64>,
}

impl FuncNode {
    pub fn key(&self) -> FunctionKey {
        FunctionKey {
            name: self.name.clone(),
            filename: self.filename.clone(),
            start_line: self.start_line,
        }
    }

    /// Weight of the self-edge, i.e. value spent in direct recursion.
    pub fn self_weight(&self) -> i64 {
        self.callees.get(&self.id).copied().unwrap_or(0)
    }

    pub fn is_recursive(&self) -> bool {
        self.callees.contains_key(&self.id)
    }
}

/// A caller or callee of some node, with the value that flowed over the edge.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Edge<'a> {
    pub node: &'a FuncNode,
    pub weight: i64,
}

/// One measurement dimension of a profile and its call graph.
#[derive(Debug, Clone, PartialEq)]
pub struct ProfileView {
    /// Display name, `"cpu (nanoseconds)"` or `"Diff: cpu (nanoseconds)"`.
    pub name: String,
    /// Sample type name, used to match views across profiles.
    pub kind: String,
    pub unit: String,
    /// Index of this dimension in the retained profile's sample types.
    pub sample_index: usize,
    /// Sum of all sample values in this dimension (a delta for diff views).
    pub total: i64,
    pub is_diff: bool,
    pub nodes: Vec<FuncNode>,
    by_key: HashMap<FunctionKey, NodeId>,
}

impl ProfileView {
    pub fn new(kind: &str, unit: &str, sample_index: usize) -> Self {
        Self {
            name: format!("{} ({})", kind, unit),
            kind: kind.to_string(),
            unit: unit.to_string(),
            sample_index,
            total: 0,
            is_diff: false,
            nodes: Vec::new(),
            by_key: HashMap::new(),
        }
    }

    pub fn node(&self, id: NodeId) -> &FuncNode {
        &self.nodes[id.0]
    }

    pub fn get(&self, id: NodeId) -> Option<&FuncNode> {
        self.nodes.get(id.0)
    }

    pub fn find_by_function_id(&self, function_id: u64) -> Option<&FuncNode> {
        self.nodes.iter().find(|n| n.function_id == function_id)
    }

    pub fn find_by_key(&self, key: &FunctionKey) -> Option<&FuncNode> {
        self.lookup(key).map(|id| self.node(id))
    }

    /// First node with the given name, in discovery order.
    pub fn find_by_name(&self, name: &str) -> Option<&FuncNode> {
        self.nodes.iter().find(|n| n.name == name)
    }

    pub fn unit_kind(&self) -> UnitKind {
        UnitKind::from_unit(&self.unit)
    }

    pub fn flat_sum(&self) -> i64 {
        self.nodes.iter().map(|n| n.flat).sum()
    }

    /// Callers of `node`, heaviest edge first (largest change in a diff).
    pub fn callers(&self, node: &FuncNode) -> Vec<Edge<'_>> {
        self.edges(&node.callers)
    }

    /// Callees of `node`, heaviest edge first (largest change in a diff).
    pub fn callees(&self, node: &FuncNode) -> Vec<Edge<'_>> {
        self.edges(&node.callees)
    }

    fn edges(&self, map: &BTreeMap<NodeId, i64>) -> Vec<Edge<'_>> {
        let mut edges: Vec<Edge<'_>> = map
            .iter()
            .filter_map(|(&id, &weight)| self.get(id).map(|node| Edge { node, weight }))
            .collect();
        if self.is_diff {
            edges.sort_by_key(|e| Reverse(e.weight.unsigned_abs()));
        } else {
            edges.sort_by_key(|e| Reverse(e.weight));
        }
        edges
    }

    pub(crate) fn lookup(&self, key: &FunctionKey) -> Option<NodeId> {
        self.by_key.get(key).copied()
    }

    /// Get or create the node for a function identity. Records that share a
    /// name, file and start line collapse into one node whatever their
    /// decoder ids.
    pub(crate) fn intern(
        &mut self,
        function_id: u64,
        name: &str,
        filename: &str,
        start_line: i64,
    ) -> NodeId {
        let key = FunctionKey {
            name: name.to_string(),
            filename: filename.to_string(),
            start_line,
        };
        if let Some(&id) = self.by_key.get(&key) {
            return id;
        }
        let id = NodeId(self.nodes.len());
        self.nodes.push(FuncNode {
            id,
            function_id,
            name: name.to_string(),
            filename: filename.to_string(),
            start_line,
            flat: 0,
            cum: 0,
            is_project_code: false,
            diff: None,
            callers: BTreeMap::new(),
            callees: BTreeMap::new(),
        });
        self.by_key.insert(key, id);
        id
    }

    pub(crate) fn node_mut(&mut self, id: NodeId) -> &mut FuncNode {
        &mut self.nodes[id.0]
    }

    pub(crate) fn add_edge(&mut self, caller: NodeId, callee: NodeId, weight: i64) {
        *self.nodes[caller.0].callees.entry(callee).or_insert(0) += weight;
        *self.nodes[callee.0].callers.entry(caller).or_insert(0) += weight;
    }
}

/// A fully decoded profile: every view plus the samples needed to rebuild a
/// flame tree on demand.
#[derive(Debug, Clone)]
pub struct ProfileData {
    pub duration_nanos: i64,
    pub views: Vec<ProfileView>,
    /// Decoded samples; for a diff this is the "after" profile.
    pub profile: Arc<Profile>,
    pub is_diff: bool,
}

impl ProfileData {
    pub fn view_by_kind(&self, kind: &str) -> Option<&ProfileView> {
        self.views.iter().find(|v| v.kind == kind)
    }

    /// Resolve a view selector: a numeric index, a sample type name such as
    /// `alloc_space`, or a full view name.
    pub fn resolve_view(&self, selector: &str) -> Result<usize> {
        if let Ok(idx) = selector.parse::<usize>() {
            if idx < self.views.len() {
                return Ok(idx);
            }
        }
        self.views
            .iter()
            .position(|v| v.kind == selector || v.name == selector)
            .ok_or_else(|| Error::UnknownView(selector.to_string()))
    }

    /// Index of the preferred initial view: the producer's default sample
    /// type when present, else the first view.
    pub fn default_view(&self) -> usize {
        self.profile
            .default_sample_type
            .as_deref()
            .and_then(|kind| self.views.iter().position(|v| v.kind == kind))
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(name: &str) -> FunctionKey {
        FunctionKey {
            name: name.to_string(),
            filename: "/src/main.go".to_string(),
            start_line: 12,
        }
    }

    #[test]
    fn signature_format() {
        assert_eq!(key("main.main").signature(), "main.main|/src/main.go|12");
        assert_eq!(key("main.main").to_string(), "main.main|/src/main.go|12");
    }

    #[test]
    fn stable_id_is_deterministic() {
        assert_eq!(key("main.main").stable_id(), key("main.main").stable_id());
        assert_ne!(key("main.main").stable_id(), key("main.work").stable_id());

        let mut moved = key("main.main");
        moved.start_line = 13;
        assert_ne!(moved.stable_id(), key("main.main").stable_id());
    }

    #[test]
    fn unit_kinds() {
        assert_eq!(UnitKind::from_unit("nanoseconds"), UnitKind::Duration);
        assert_eq!(UnitKind::from_unit("bytes"), UnitKind::Space);
        assert_eq!(UnitKind::from_unit("count"), UnitKind::Count);
        assert_eq!(UnitKind::from_unit("objects"), UnitKind::Count);
    }

    #[test]
    fn intern_and_edges() {
        let mut view = ProfileView::new("cpu", "nanoseconds", 1);
        assert_eq!(view.name, "cpu (nanoseconds)");

        let a = view.intern(10, "a", "a.go", 1);
        let b = view.intern(20, "b", "b.go", 1);
        assert_eq!(view.intern(10, "a", "a.go", 1), a);

        view.add_edge(a, b, 5);
        view.add_edge(a, b, 7);
        view.add_edge(b, b, 3);

        assert_eq!(view.node(a).callees[&b], 12);
        assert_eq!(view.node(b).callers[&a], 12);
        assert!(view.node(b).is_recursive());
        assert_eq!(view.node(b).self_weight(), 3);
        assert!(!view.node(a).is_recursive());
        assert_eq!(view.find_by_function_id(20).map(|n| n.id), Some(b));
        assert_eq!(view.find_by_name("a").map(|n| n.function_id), Some(10));
    }

    #[test]
    fn same_identity_shares_a_node() {
        let mut view = ProfileView::new("cpu", "nanoseconds", 0);
        let first = view.intern(1, "main.work", "/src/w.go", 7);
        let second = view.intern(2, "main.work", "/src/w.go", 7);
        let other_line = view.intern(3, "main.work", "/src/w.go", 8);

        assert_eq!(first, second);
        assert_ne!(first, other_line);
        assert_eq!(view.nodes.len(), 2);
        assert_eq!(view.node(first).function_id, 1);
        assert_eq!(view.find_by_key(&view.node(first).key()).map(|n| n.id), Some(first));
    }

    #[test]
    fn edges_sorted_by_weight() {
        let mut view = ProfileView::new("cpu", "nanoseconds", 0);
        let main = view.intern(1, "main", "main.go", 1);
        let light = view.intern(2, "light", "main.go", 5);
        let heavy = view.intern(3, "heavy", "main.go", 9);
        view.add_edge(main, light, 5);
        view.add_edge(main, heavy, 50);

        let callees: Vec<&str> = view
            .callees(view.node(main))
            .iter()
            .map(|e| e.node.name.as_str())
            .collect();
        assert_eq!(callees, vec!["heavy", "light"]);

        let callers = view.callers(view.node(heavy));
        assert_eq!(callers.len(), 1);
        assert_eq!(callers[0].weight, 50);
        assert_eq!(callers[0].node.id, main);
    }

    #[test]
    fn resolve_view_selectors() {
        let mut builder = pprof_parse::ProfileBuilder::new(&[
            ("alloc_objects", "count"),
            ("alloc_space", "bytes"),
        ]);
        builder.add_stack(&["main"], &[1, 64]);
        builder.set_default_sample_type("alloc_space");
        let data =
            crate::graph::build_profile(Profile::from_raw(builder.into_inner())).unwrap();

        assert_eq!(data.resolve_view("1").unwrap(), 1);
        assert_eq!(data.resolve_view("alloc_objects").unwrap(), 0);
        assert_eq!(data.resolve_view("alloc_space (bytes)").unwrap(), 1);
        assert!(matches!(
            data.resolve_view("cpu"),
            Err(Error::UnknownView(v)) if v == "cpu"
        ));
        assert_eq!(data.default_view(), 1);
        assert!(data.view_by_kind("alloc_space").is_some());
    }
}
