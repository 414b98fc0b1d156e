//! Plain-language descriptions of functions and call edges.

use crate::format::{format_delta, format_percent, format_value};
use crate::model::{FuncNode, ProfileView};

/// One-line summary of a function in the main list.
///
/// Functions that spend nearly all of their cumulative cost on their own
/// work are described as workers; the rest mention their total including
/// callees.
pub fn describe_node(view: &ProfileView, node: &FuncNode) -> String {
    if let Some(diff) = node.diff {
        return format!(
            "own Δ: {} | total Δ: {}",
            format_delta(diff.flat_delta, &view.unit),
            format_delta(diff.cum_delta, &view.unit)
        );
    }

    let own = node.flat;
    let total = node.cum;
    let own_str = format_value(own, &view.unit);
    let total_str = format_value(total, &view.unit);
    let is_worker = total == 0 || own as f64 / total as f64 >= 0.98;
    let with_total = |base: String| {
        if is_worker {
            base
        } else {
            format!("{}; {} total including callees", base, total_str)
        }
    };

    let kind = view.kind.as_str();
    if kind.starts_with("alloc_") {
        let base = if kind.ends_with("objects") {
            format!("created {} objects on its own", own_str)
        } else {
            format!("allocated {} of memory on its own", own_str)
        };
        with_total(base)
    } else if kind.starts_with("inuse_") {
        let noun = if kind.ends_with("objects") {
            "objects"
        } else {
            "of memory"
        };
        with_total(format!("held {} {} on its own", own_str, noun))
    } else if kind == "cpu" || kind == "samples" {
        if node.is_recursive() && !is_worker {
            return format!(
                "is recursive, taking {} total; the top-level call took {}",
                total_str, own_str
            );
        }
        if total > 0 && (own as f64 / total as f64) < 0.15 {
            return format!(
                "mostly delegated work ({} total); did {} itself",
                total_str, own_str
            );
        }
        with_total(format!("spent {} doing its own work", own_str))
    } else {
        with_total(format!("used {} on its own", own_str))
    }
}

/// Which side of the selected function an edge is listed on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgeRole {
    Caller,
    Callee,
}

/// Description of `node` as it appears in the callers or callees of
/// `selected`, where `weight` is the edge value.
pub fn describe_edge(
    view: &ProfileView,
    selected: &FuncNode,
    node: &FuncNode,
    weight: i64,
    role: EdgeRole,
) -> String {
    // A self-edge would otherwise read as "called by itself" with a share
    // that can exceed the node's cumulative value.
    if node.id == selected.id {
        return format!(
            "This function is recursive; its self-calls account for {} ({} of the total)",
            format_value(weight, &view.unit),
            format_percent(weight, node.cum)
        );
    }

    if view.is_diff {
        let delta = format_delta(weight, &view.unit);
        return match role {
            EdgeRole::Caller => {
                format!("this function's call to the selected one changed by {}", delta)
            }
            EdgeRole::Callee => format!(
                "was called by the selected function, and that call changed by {}",
                delta
            ),
        };
    }

    let weight_str = format_value(weight, &view.unit);
    match role {
        EdgeRole::Caller => format!(
            "called the selected function; this call accounts for {} ({} of this function's total)",
            weight_str,
            format_percent(weight, node.cum)
        ),
        EdgeRole::Callee => format!(
            "was called by the selected function, which triggered {} ({} of its total)",
            weight_str,
            format_percent(weight, selected.cum)
        ),
    }
}
