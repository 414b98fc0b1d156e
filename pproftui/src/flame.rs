//! Flame tree: stacks merged by name from the root down.

use pprof_parse::{Profile, Sample};
use std::collections::VecDeque;
use tracing::debug;

use crate::project::ProjectFilter;

/// Index of a node in a [`FlameTree`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FlameNodeId(usize);

#[derive(Debug, Clone, PartialEq)]
pub struct FlameNode {
    pub name: String,
    /// Value of every stack passing through this node.
    pub value: i64,
    pub parent: Option<FlameNodeId>,
    /// Ordered by descending value; ties keep first-seen order.
    pub children: Vec<FlameNodeId>,
}

/// Tree of merged stacks, stored as an arena with parent links.
#[derive(Debug, Clone, PartialEq)]
pub struct FlameTree {
    nodes: Vec<FlameNode>,
}

impl FlameTree {
    fn new() -> Self {
        Self {
            nodes: vec![FlameNode {
                name: "root".to_string(),
                value: 0,
                parent: None,
                children: Vec::new(),
            }],
        }
    }

    pub fn root(&self) -> FlameNodeId {
        FlameNodeId(0)
    }

    pub fn node(&self, id: FlameNodeId) -> &FlameNode {
        &self.nodes[id.0]
    }

    pub fn get(&self, id: FlameNodeId) -> Option<&FlameNode> {
        self.nodes.get(id.0)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.node(self.root()).children.is_empty()
    }

    pub fn parent(&self, id: FlameNodeId) -> Option<FlameNodeId> {
        self.node(id).parent
    }

    pub fn children(&self, id: FlameNodeId) -> &[FlameNodeId] {
        &self.node(id).children
    }

    /// Total value of the tree.
    pub fn total(&self) -> i64 {
        self.node(self.root()).value
    }

    /// Value spent in a node itself rather than in its children.
    pub fn self_value(&self, id: FlameNodeId) -> i64 {
        let node = self.node(id);
        let children: i64 = node.children.iter().map(|&c| self.node(c).value).sum();
        node.value - children
    }

    /// Breadth-first search for the shallowest node with the given name.
    pub fn find_by_name(&self, name: &str) -> Option<FlameNodeId> {
        let mut queue = VecDeque::from([self.root()]);
        while let Some(id) = queue.pop_front() {
            let node = self.node(id);
            if node.name == name {
                return Some(id);
            }
            queue.extend(node.children.iter().copied());
        }
        None
    }

    /// Ids from the root down to and including `id`.
    pub fn path(&self, id: FlameNodeId) -> Vec<FlameNodeId> {
        let mut path = vec![id];
        let mut current = id;
        while let Some(parent) = self.parent(current) {
            path.push(parent);
            current = parent;
        }
        path.reverse();
        path
    }

    /// Names from the root down to `id`, e.g. `["root", "main", "work"]`.
    pub fn breadcrumbs(&self, id: FlameNodeId) -> Vec<&str> {
        self.path(id)
            .into_iter()
            .map(|n| self.node(n).name.as_str())
            .collect()
    }

    /// True when `ancestor` is `id` or lies on its path to the root.
    pub fn is_ancestor_of(&self, ancestor: FlameNodeId, id: FlameNodeId) -> bool {
        let mut current = Some(id);
        while let Some(n) = current {
            if n == ancestor {
                return true;
            }
            current = self.parent(n);
        }
        false
    }

    fn child_named(&self, parent: FlameNodeId, name: &str) -> Option<FlameNodeId> {
        self.node(parent)
            .children
            .iter()
            .copied()
            .find(|&c| self.node(c).name == name)
    }

    fn add_child(&mut self, parent: FlameNodeId, name: &str) -> FlameNodeId {
        let id = FlameNodeId(self.nodes.len());
        self.nodes.push(FlameNode {
            name: name.to_string(),
            value: 0,
            parent: Some(parent),
            children: Vec::new(),
        });
        self.nodes[parent.0].children.push(id);
        id
    }

    fn insert(&mut self, sample: &Sample, value: i64) {
        let mut current = self.root();
        for frame in sample.frames.iter().rev() {
            for ff in frame.functions.iter().rev() {
                let name = ff.function.name.as_str();
                let child = match self.child_named(current, name) {
                    Some(child) => child,
                    None => self.add_child(current, name),
                };
                self.nodes[child.0].value += value;
                current = child;
            }
        }
    }

    fn sort_children(&mut self) {
        for idx in 0..self.nodes.len() {
            let mut children = std::mem::take(&mut self.nodes[idx].children);
            // Stable, so equal values keep their first-seen order.
            children.sort_by(|a, b| self.nodes[b.0].value.cmp(&self.nodes[a.0].value));
            self.nodes[idx].children = children;
        }
    }
}

/// Merge every sample of one sample type into a flame tree.
///
/// With a filter, only samples whose stack contains at least one project
/// function are kept. A sample type index out of range yields an empty tree.
pub fn build_flame_tree(
    profile: &Profile,
    index: usize,
    filter: Option<&ProjectFilter>,
) -> FlameTree {
    let mut tree = FlameTree::new();
    if index >= profile.sample_types.len() {
        return tree;
    }

    let mut total = 0i64;
    let mut dropped = 0usize;
    for sample in &profile.samples {
        let value = sample.value(index);
        if value == 0 {
            continue;
        }
        if let Some(filter) = filter {
            let touches_project = sample
                .frames
                .iter()
                .flat_map(|f| f.functions.iter())
                .any(|ff| filter.matches(&ff.function.filename));
            if !touches_project {
                dropped += 1;
                continue;
            }
        }
        total += value;
        tree.insert(sample, value);
    }

    tree.nodes[0].value = total;
    tree.sort_children();
    debug!(nodes = tree.len(), total, dropped, "built flame tree");
    tree
}

#[cfg(test)]
mod tests {
    use super::*;
    use pprof_parse::ProfileBuilder;

    fn profile(stacks: &[(&[&str], i64)]) -> Profile {
        let mut builder = ProfileBuilder::new(&[("cpu", "nanoseconds")]);
        for (names, value) in stacks {
            builder.add_stack(names, &[*value]);
        }
        Profile::from_raw(builder.into_inner())
    }

    fn names(tree: &FlameTree, ids: &[FlameNodeId]) -> Vec<String> {
        ids.iter().map(|&id| tree.node(id).name.clone()).collect()
    }

    #[test]
    fn merges_stacks_by_name() {
        let p = profile(&[
            (&["a", "main"], 10),
            (&["b", "main"], 30),
            (&["a", "main"], 5),
        ]);
        let tree = build_flame_tree(&p, 0, None);

        let root = tree.root();
        assert_eq!(tree.node(root).name, "root");
        assert_eq!(tree.total(), 45);
        assert_eq!(names(&tree, tree.children(root)), vec!["main"]);

        let main = tree.children(root)[0];
        assert_eq!(tree.node(main).value, 45);
        assert_eq!(names(&tree, tree.children(main)), vec!["b", "a"]);
        assert_eq!(tree.node(tree.children(main)[1]).value, 15);
    }

    #[test]
    fn ties_keep_first_seen_order() {
        let p = profile(&[(&["x", "main"], 10), (&["y", "main"], 10), (&["z", "main"], 10)]);
        let tree = build_flame_tree(&p, 0, None);
        let main = tree.children(tree.root())[0];
        assert_eq!(names(&tree, tree.children(main)), vec!["x", "y", "z"]);
    }

    #[test]
    fn children_never_exceed_parent() {
        let p = profile(&[
            (&["c", "b", "a"], 7),
            (&["b", "a"], 3),
            (&["a"], 4),
            (&["d"], 1),
        ]);
        let tree = build_flame_tree(&p, 0, None);
        for idx in 0..tree.len() {
            let id = FlameNodeId(idx);
            assert!(tree.self_value(id) >= 0, "{}", tree.node(id).name);
        }
        assert_eq!(tree.self_value(tree.root()), 0);
    }

    #[test]
    fn project_filter_keeps_matching_stacks() {
        let mut builder = ProfileBuilder::new(&[("cpu", "nanoseconds")]);
        let main = builder.add_function("main.main", "/src/acme/app/main.go", 1);
        let gc = builder.add_function("runtime.gcBgMarkWorker", "/go/runtime/mgc.go", 1);
        let work = builder.add_function("main.work", "/src/acme/app/work.go", 1);
        let main_loc = builder.add_location(&[(main, 2)]);
        let gc_loc = builder.add_location(&[(gc, 2)]);
        let work_loc = builder.add_location(&[(work, 2)]);
        builder.add_sample(&[work_loc, main_loc], &[20]);
        builder.add_sample(&[gc_loc], &[80]);
        let p = Profile::from_raw(builder.into_inner());

        let full = build_flame_tree(&p, 0, None);
        assert_eq!(full.total(), 100);

        let filter = ProjectFilter::new("acme/app").unwrap();
        let filtered = build_flame_tree(&p, 0, Some(&filter));
        assert_eq!(filtered.total(), 20);
        assert!(filtered.find_by_name("runtime.gcBgMarkWorker").is_none());
        assert!(filtered.find_by_name("main.work").is_some());
    }

    #[test]
    fn find_by_name_is_breadth_first() {
        let p = profile(&[(&["target", "deep", "main"], 5), (&["target"], 1)]);
        let tree = build_flame_tree(&p, 0, None);
        let found = tree.find_by_name("target").unwrap();
        assert_eq!(tree.parent(found), Some(tree.root()));
        assert!(tree.find_by_name("missing").is_none());
    }

    #[test]
    fn breadcrumbs_from_root() {
        let p = profile(&[(&["work", "serve", "main"], 5)]);
        let tree = build_flame_tree(&p, 0, None);
        let work = tree.find_by_name("work").unwrap();

        assert_eq!(tree.breadcrumbs(work), vec!["root", "main", "serve", "work"]);
        assert_eq!(tree.breadcrumbs(tree.root()), vec!["root"]);
        assert!(tree.is_ancestor_of(tree.root(), work));
        assert!(tree.is_ancestor_of(work, work));
        assert!(!tree.is_ancestor_of(work, tree.root()));
    }

    #[test]
    fn out_of_range_index_is_empty() {
        let p = profile(&[(&["main"], 5)]);
        let tree = build_flame_tree(&p, 3, None);
        assert!(tree.is_empty());
        assert_eq!(tree.total(), 0);
    }

    #[test]
    fn root_value_is_sum_of_samples() {
        let p = profile(&[
            (&["a", "main"], 10),
            (&["b"], 0),
            (&["gc"], 7),
            (&["c", "b", "main"], 3),
        ]);
        let tree = build_flame_tree(&p, 0, None);
        assert_eq!(tree.total(), 20);
        let top_level: i64 = tree.children(tree.root()).iter().map(|&c| tree.node(c).value).sum();
        assert_eq!(top_level, tree.total());
        assert!(tree.find_by_name("b").is_some_and(|b| tree.node(b).value == 3));
    }

    #[test]
    fn rebuilding_is_deterministic() {
        let stacks: &[(&[&str], i64)] = &[
            (&["c", "b", "a"], 7),
            (&["x", "main"], 4),
            (&["y", "main"], 4),
            (&["b", "a"], 3),
            (&["a", "b", "a"], 5),
        ];
        let first = build_flame_tree(&profile(stacks), 0, None);
        let second = build_flame_tree(&profile(stacks), 0, None);
        assert_eq!(first, second);

        let main = first.find_by_name("main").unwrap();
        assert_eq!(names(&first, first.children(main)), vec!["x", "y"]);
    }
}
