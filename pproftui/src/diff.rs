//! Comparison of two profiles by function signature.
//!
//! Function ids are assigned independently by each producer, so nodes and
//! edges are matched on the `name|file|start-line` signature instead. A diff
//! node carries the "after" values plus the deltas and ratios against the
//! "before" profile.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tracing::debug;

use crate::format::format_delta;
use crate::graph;
use crate::model::{
    ChangeType, DiffStats, FuncNode, FunctionKey, NodeId, ProfileData, ProfileView, UnitKind,
};
use crate::project::ProjectFilter;
use crate::{Error, Result};

/// `after / before`, with `+inf` for new cost and `1.0` when both are zero.
pub fn ratio(before: i64, after: i64) -> f64 {
    if before == 0 {
        if after == 0 { 1.0 } else { f64::INFINITY }
    } else {
        after as f64 / before as f64
    }
}

/// Describe a ratio: `new`, `removed`, `unchanged`, or `N.Nx slower/faster`
/// for durations and `N.Nx more/less` for other units.
pub fn format_ratio(ratio: f64, unit: &str) -> String {
    if ratio.is_infinite() {
        return "new".to_string();
    }
    if ratio == 0.0 {
        return "removed".to_string();
    }
    if ratio == 1.0 {
        return "unchanged".to_string();
    }

    let (more, less) = match UnitKind::from_unit(unit) {
        UnitKind::Duration => ("slower", "faster"),
        _ => ("more", "less"),
    };
    if ratio > 1.0 {
        format!("{:.1}x {}", ratio, more)
    } else {
        format!("{:.1}x {}", 1.0 / ratio, less)
    }
}

/// Combined delta and ratio, e.g. `+1µs (2.0x slower)`, `-50ns (-5%)` for
/// changes within ten percent, `+1µs (new)`, or `unchanged`.
pub fn format_ratio_display(ratio: f64, delta: i64, unit: &str) -> String {
    if delta == 0 {
        return "unchanged".to_string();
    }
    let delta_str = format_delta(delta, unit);
    if ratio.is_infinite() {
        return format!("{} (new)", delta_str);
    }
    if ratio == 0.0 {
        return format!("{} (removed)", delta_str);
    }

    let percent = (ratio - 1.0) * 100.0;
    if percent.abs() < 10.0 {
        format!("{} ({:+.0}%)", delta_str, percent)
    } else {
        format!("{} ({})", delta_str, format_ratio(ratio, unit))
    }
}

/// Aggregated values of one view keyed by signature.
struct KeyedView<'a> {
    nodes: BTreeMap<FunctionKey, KeyedNode<'a>>,
    edges: BTreeMap<(FunctionKey, FunctionKey), i64>,
}

struct KeyedNode<'a> {
    flat: i64,
    cum: i64,
    template: &'a FuncNode,
}

impl<'a> KeyedView<'a> {
    fn new(view: &'a ProfileView) -> Self {
        let mut nodes: BTreeMap<FunctionKey, KeyedNode<'a>> = BTreeMap::new();
        let mut edges = BTreeMap::new();

        for node in &view.nodes {
            let key = node.key();
            for (&callee, &weight) in &node.callees {
                let callee_key = view.node(callee).key();
                *edges.entry((key.clone(), callee_key)).or_insert(0) += weight;
            }
            let entry = nodes.entry(key).or_insert(KeyedNode {
                flat: 0,
                cum: 0,
                template: node,
            });
            entry.flat += node.flat;
            entry.cum += node.cum;
        }

        Self { nodes, edges }
    }
}

/// Compare two views of the same kind.
pub fn diff_views(before: &ProfileView, after: &ProfileView) -> ProfileView {
    let before_keyed = KeyedView::new(before);
    let after_keyed = KeyedView::new(after);

    let mut view = ProfileView::new(&after.kind, &after.unit, after.sample_index);
    view.name = format!("Diff: {}", after.name);
    view.is_diff = true;
    view.total = after.total - before.total;

    let keys: BTreeSet<&FunctionKey> = before_keyed
        .nodes
        .keys()
        .chain(after_keyed.nodes.keys())
        .collect();

    let mut ids: BTreeMap<&FunctionKey, NodeId> = BTreeMap::new();
    for key in keys {
        let old = before_keyed.nodes.get(key);
        let new = after_keyed.nodes.get(key);
        let (before_flat, before_cum) = old.map(|n| (n.flat, n.cum)).unwrap_or((0, 0));
        let (after_flat, after_cum) = new.map(|n| (n.flat, n.cum)).unwrap_or((0, 0));

        let change = match (old, new) {
            (None, Some(_)) => ChangeType::New,
            (Some(_), None) => ChangeType::Removed,
            _ => ChangeType::Modified,
        };
        let is_project_code = new
            .or(old)
            .map(|n| n.template.is_project_code)
            .unwrap_or(false);

        let id = view.intern(key.stable_id(), &key.name, &key.filename, key.start_line);
        let node = view.node_mut(id);
        node.flat = after_flat;
        node.cum = after_cum;
        node.is_project_code = is_project_code;
        node.diff = Some(DiffStats {
            flat_delta: after_flat - before_flat,
            cum_delta: after_cum - before_cum,
            flat_ratio: ratio(before_flat, after_flat),
            cum_ratio: ratio(before_cum, after_cum),
            change,
        });
        ids.insert(key, id);
    }

    let edge_keys: BTreeSet<&(FunctionKey, FunctionKey)> = before_keyed
        .edges
        .keys()
        .chain(after_keyed.edges.keys())
        .collect();
    for edge in edge_keys {
        let old = before_keyed.edges.get(edge).copied().unwrap_or(0);
        let new = after_keyed.edges.get(edge).copied().unwrap_or(0);
        let delta = new - old;
        if delta == 0 {
            continue;
        }
        if let (Some(&caller), Some(&callee)) = (ids.get(&edge.0), ids.get(&edge.1)) {
            view.add_edge(caller, callee, delta);
        }
    }

    debug!(view = %view.name, nodes = view.nodes.len(), "diffed views");
    view
}

/// Compare every dimension present in both profiles.
///
/// The result keeps the "after" profile's samples and duration. Fails with
/// [`Error::NoCommonDimensions`] when the profiles share no sample type.
pub fn diff_profiles(before: &ProfileData, after: &ProfileData) -> Result<ProfileData> {
    let views: Vec<ProfileView> = after
        .views
        .iter()
        .filter_map(|after_view| {
            before
                .view_by_kind(&after_view.kind)
                .map(|before_view| diff_views(before_view, after_view))
        })
        .collect();

    if views.is_empty() {
        return Err(Error::NoCommonDimensions);
    }

    Ok(ProfileData {
        duration_nanos: after.duration_nanos,
        views,
        profile: Arc::clone(&after.profile),
        is_diff: true,
    })
}

/// Decode and compare two raw profiles.
pub fn diff_bytes(
    before: &[u8],
    after: &[u8],
    filter: Option<&ProjectFilter>,
) -> Result<ProfileData> {
    let before = graph::load_bytes(before, filter).map_err(|e| side_error("before", e))?;
    let after = graph::load_bytes(after, filter).map_err(|e| side_error("after", e))?;
    diff_profiles(&before, &after)
}

fn side_error(side: &'static str, error: Error) -> Error {
    match error {
        Error::Decode(source) => Error::DecodeSide { side, source },
        other => other,
    }
}
