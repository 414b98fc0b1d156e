//! Plain-text rendering of views, tables and flame graphs.

use std::fmt::Write as _;

use crate::describe::{EdgeRole, describe_edge, describe_node};
use crate::diff::format_ratio_display;
use crate::format::{format_percent, format_value};
use crate::model::{Edge, FuncNode, ProfileData, ProfileView};
use crate::navigate::FlameState;
use crate::palette::Palette;
use crate::source::render_source;

/// One line per view with its index and total.
pub fn render_views(data: &ProfileData) -> String {
    let default = data.default_view();
    let mut out = String::new();
    for (idx, view) in data.views.iter().enumerate() {
        let marker = if idx == default { '*' } else { ' ' };
        let _ = writeln!(
            out,
            "{}{:>2}  {:<32} total {}",
            marker,
            idx,
            view.name,
            format_value(view.total, &view.unit)
        );
    }
    out
}

/// Label for a flame bar, shortened to fit `width` columns.
pub fn flame_label(name: &str, percentage: f64, width: usize) -> String {
    let label = format!("{} ({:.1}%)", name, percentage);
    if label.chars().count() <= width {
        return label;
    }
    if name.chars().count() <= width {
        return name.to_string();
    }
    label.chars().take(width).collect()
}

/// Draw the flame graph rows for the current focus, one line per depth.
///
/// Percentages are shares of the whole tree, so they do not change when
/// zooming.
pub fn render_flame(state: &mut FlameState, width: usize, palette: &Palette) -> String {
    let total = state.tree().total();
    if total == 0 {
        return "No data to render in flame graph.\n".to_string();
    }

    let crumbs = state.tree().breadcrumbs(state.focus()).join(" > ");
    let selected = state.selected();
    let hover = state.hover();
    let records = state.layout(width).records().to_vec();
    let tree = state.tree();

    let mut out = String::new();
    let _ = writeln!(out, "{}", palette.dim(&crumbs));

    let mut row_y = None;
    let mut cursor = 0;
    for record in records {
        if row_y != Some(record.y) {
            if row_y.is_some() {
                out.push_str(&" ".repeat(width.saturating_sub(cursor)));
                out.push('\n');
            }
            row_y = Some(record.y);
            cursor = 0;
        }
        out.push_str(&" ".repeat(record.x - cursor));

        let node = tree.node(record.node);
        let percentage = node.value as f64 / total as f64 * 100.0;
        let label = flame_label(&node.name, percentage, record.width);
        let padded = format!("{:<w$}", label, w = record.width);
        out.push_str(&palette.flame_bar(
            &padded,
            percentage,
            selected == Some(record.node),
            hover == Some(record.node),
        ));
        cursor = record.x + record.width;
    }
    if row_y.is_some() {
        out.push_str(&" ".repeat(width.saturating_sub(cursor)));
        out.push('\n');
    }
    out
}

/// Flat/cum table of a regular view.
pub fn render_top(view: &ProfileView, nodes: &[&FuncNode], palette: &Palette) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "{}",
        palette.bold(&format!(
            "{:>12} {:>7} {:>12} {:>7}  {}",
            "flat", "flat%", "cum", "cum%", "function"
        ))
    );
    for node in nodes {
        let _ = writeln!(
            out,
            "{:>12} {:>7} {:>12} {:>7}  {}",
            format_value(node.flat, &view.unit),
            share(node.flat, view.total),
            format_value(node.cum, &view.unit),
            share(node.cum, view.total),
            palette.function_name(&node.name, node.is_project_code)
        );
    }
    out
}

/// Delta table of a diff view.
pub fn render_diff_top(view: &ProfileView, nodes: &[&FuncNode], palette: &Palette) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "{}",
        palette.bold(&format!("{:<28} {:<28} {}", "flat change", "cum change", "function"))
    );
    for node in nodes {
        let Some(diff) = node.diff else {
            continue;
        };
        let _ = writeln!(
            out,
            "{} {} {}",
            change_cell(palette, diff.flat_ratio, diff.flat_delta, &view.unit, 28),
            change_cell(palette, diff.cum_ratio, diff.cum_delta, &view.unit, 28),
            palette.function_name(&node.name, node.is_project_code)
        );
    }
    out
}

/// Callers or callees of `selected` with their descriptions.
pub fn render_edges(
    view: &ProfileView,
    selected: &FuncNode,
    edges: &[Edge<'_>],
    role: EdgeRole,
    palette: &Palette,
) -> String {
    let title = match role {
        EdgeRole::Caller => "Callers",
        EdgeRole::Callee => "Callees",
    };
    let mut out = String::new();
    let _ = writeln!(out, "{}", palette.bold(title));
    if edges.is_empty() {
        let _ = writeln!(out, "  {}", palette.dim("(none)"));
    }
    for edge in edges {
        let _ = writeln!(
            out,
            "  {}\n    {}",
            palette.function_name(&edge.node.name, edge.node.is_project_code),
            describe_edge(view, selected, edge.node, edge.weight, role)
        );
    }
    out
}

/// Detail page for one function: costs, description, callers, callees and
/// an excerpt of its source.
pub fn render_function(
    view: &ProfileView,
    node: &FuncNode,
    palette: &Palette,
    source_context: usize,
) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{}", palette.bold(&palette.function_name(&node.name, node.is_project_code)));
    if !node.filename.is_empty() {
        let _ = writeln!(out, "{}:{}", node.filename, node.start_line);
    }
    match node.diff {
        Some(diff) => {
            let _ = writeln!(
                out,
                "flat {}  cum {}",
                change_cell(palette, diff.flat_ratio, diff.flat_delta, &view.unit, 0),
                change_cell(palette, diff.cum_ratio, diff.cum_delta, &view.unit, 0)
            );
        }
        None => {
            let _ = writeln!(
                out,
                "flat {} ({})  cum {} ({})",
                format_value(node.flat, &view.unit),
                share(node.flat, view.total),
                format_value(node.cum, &view.unit),
                share(node.cum, view.total)
            );
        }
    }
    let _ = writeln!(out, "{}\n", describe_node(view, node));

    out.push_str(&render_edges(view, node, &view.callers(node), EdgeRole::Caller, palette));
    out.push('\n');
    out.push_str(&render_edges(view, node, &view.callees(node), EdgeRole::Callee, palette));
    out.push('\n');
    out.push_str(&render_source(&node.filename, node.start_line, Some(source_context)));
    out
}

fn share(value: i64, total: i64) -> String {
    let percent = format_percent(value, total);
    if percent.is_empty() { "-".to_string() } else { percent }
}

/// Change description coloured by the sign of `delta`, padded to `width`.
fn change_cell(palette: &Palette, ratio: f64, delta: i64, unit: &str, width: usize) -> String {
    let text = format_ratio_display(ratio, delta, unit);
    let pad = " ".repeat(width.saturating_sub(text.chars().count()));
    let styled = match delta.signum() {
        1 => palette.good(&text),
        -1 => palette.bad(&text),
        _ => text,
    };
    styled + &pad
}
