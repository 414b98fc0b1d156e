//! Flame graph layout in terminal cells.
//!
//! Widths are apportioned with the largest remainder method so that the
//! widths of a node's children plus its self-time gap add up exactly to the
//! node's own width.

use std::collections::{HashMap, VecDeque};

use crate::flame::{FlameNodeId, FlameTree};

/// Split `width` cells between `values` in proportion.
///
/// Every value gets the floor of its exact share; the cells left over go
/// one each to the largest fractional remainders, ties broken by position.
/// Negative values are treated as zero. When every value is zero nothing is
/// apportioned.
pub fn apportion(width: usize, values: &[i64]) -> Vec<usize> {
    let weights: Vec<u128> = values.iter().map(|&v| v.max(0) as u128).collect();
    let total: u128 = weights.iter().sum();
    if total == 0 {
        return vec![0; values.len()];
    }

    let width = width as u128;
    let mut widths = Vec::with_capacity(weights.len());
    let mut remainders = Vec::with_capacity(weights.len());
    for &w in &weights {
        let scaled = width * w;
        widths.push((scaled / total) as usize);
        remainders.push(scaled % total);
    }

    let assigned: usize = widths.iter().sum();
    let shortfall = width as usize - assigned;
    let mut order: Vec<usize> = (0..weights.len()).collect();
    order.sort_by(|&a, &b| remainders[b].cmp(&remainders[a]));
    for &idx in order.iter().take(shortfall) {
        widths[idx] += 1;
    }
    widths
}

/// Horizontal extent of a node in cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    pub offset: usize,
    pub width: usize,
}

/// One rendered bar; `y` is the depth below the focus.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderRecord {
    pub node: FlameNodeId,
    pub x: usize,
    pub y: usize,
    pub width: usize,
}

impl RenderRecord {
    fn center(&self) -> usize {
        self.x + self.width / 2
    }

    fn contains(&self, x: usize) -> bool {
        x >= self.x && x < self.x + self.width
    }
}

/// Placement of every visible node for one focus and terminal width.
#[derive(Debug, Clone)]
pub struct FlameLayout {
    width: usize,
    focus: FlameNodeId,
    spans: HashMap<FlameNodeId, Span>,
    records: Vec<RenderRecord>,
    by_node: HashMap<FlameNodeId, usize>,
}

impl FlameLayout {
    /// Lay out the subtree under `focus` across `width` cells.
    ///
    /// The focus and all of its ancestors get the full width. Nodes whose
    /// apportioned width is zero are omitted along with their subtrees.
    pub fn compute(tree: &FlameTree, focus: FlameNodeId, width: usize) -> Self {
        let mut layout = Self {
            width,
            focus,
            spans: HashMap::new(),
            records: Vec::new(),
            by_node: HashMap::new(),
        };
        if width == 0 {
            return layout;
        }

        let full = Span { offset: 0, width };
        for ancestor in tree.path(focus) {
            layout.spans.insert(ancestor, full);
        }
        layout.push(focus, full, 0);

        let mut queue = VecDeque::from([(focus, 0usize)]);
        while let Some((id, depth)) = queue.pop_front() {
            let span = layout.spans[&id];
            let children = tree.children(id);

            let mut values: Vec<i64> = children.iter().map(|&c| tree.node(c).value).collect();
            let self_value = tree.self_value(id);
            if self_value > 0 {
                values.push(self_value);
            }

            let widths = apportion(span.width, &values);
            let mut offset = span.offset;
            for (&child, &w) in children.iter().zip(&widths) {
                if w > 0 {
                    let child_span = Span { offset, width: w };
                    layout.spans.insert(child, child_span);
                    layout.push(child, child_span, depth + 1);
                    queue.push_back((child, depth + 1));
                }
                offset += w;
            }
        }
        layout
    }

    fn push(&mut self, node: FlameNodeId, span: Span, y: usize) {
        self.by_node.insert(node, self.records.len());
        self.records.push(RenderRecord {
            node,
            x: span.offset,
            y,
            width: span.width,
        });
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn focus(&self) -> FlameNodeId {
        self.focus
    }

    /// Extent of a node, including ancestors of the focus.
    pub fn span(&self, node: FlameNodeId) -> Option<Span> {
        self.spans.get(&node).copied()
    }

    /// Render records in row-major order.
    pub fn records(&self) -> &[RenderRecord] {
        &self.records
    }

    pub fn record(&self, node: FlameNodeId) -> Option<&RenderRecord> {
        self.by_node.get(&node).map(|&i| &self.records[i])
    }

    pub fn row(&self, y: usize) -> impl Iterator<Item = &RenderRecord> {
        self.records.iter().filter(move |r| r.y == y)
    }

    /// Number of rendered rows.
    pub fn depth(&self) -> usize {
        self.records.last().map(|r| r.y + 1).unwrap_or(0)
    }

    /// Node drawn at a cell, if any.
    pub fn hit_test(&self, x: usize, y: usize) -> Option<FlameNodeId> {
        self.row(y).find(|r| r.contains(x)).map(|r| r.node)
    }

    /// Node on the next row under `node`'s centre, or the nearest one.
    pub fn below(&self, node: FlameNodeId) -> Option<FlameNodeId> {
        let current = self.record(node)?;
        let center = current.center();
        let row: Vec<&RenderRecord> = self.row(current.y + 1).collect();
        if let Some(hit) = row.iter().find(|r| r.contains(center)) {
            return Some(hit.node);
        }

        let mut best: Option<(usize, FlameNodeId)> = None;
        for r in row {
            let right = r.x + r.width - 1;
            let distance = center.abs_diff(r.x).min(center.abs_diff(right));
            if best.is_none_or(|(d, _)| distance < d) {
                best = Some((distance, r.node));
            }
        }
        best.map(|(_, n)| n)
    }

    /// Nearest node on the same row starting strictly left of `node`.
    pub fn left_of(&self, node: FlameNodeId) -> Option<FlameNodeId> {
        let current = self.record(node)?;
        self.row(current.y)
            .filter(|r| r.x < current.x)
            .max_by_key(|r| r.x)
            .map(|r| r.node)
    }

    /// Nearest node on the same row starting strictly right of `node`.
    pub fn right_of(&self, node: FlameNodeId) -> Option<FlameNodeId> {
        let current = self.record(node)?;
        self.row(current.y)
            .filter(|r| r.x > current.x)
            .min_by_key(|r| r.x)
            .map(|r| r.node)
    }
}
