//! Interactive state of a flame graph: focus, selection and hover.

use crate::flame::{FlameNodeId, FlameTree};
use crate::layout::FlameLayout;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Up,
    Down,
    Left,
    Right,
}

/// Focus, selection and hover over a [`FlameTree`], with the layout cached
/// until the focus or width changes.
#[derive(Debug, Clone)]
pub struct FlameState {
    tree: FlameTree,
    focus: FlameNodeId,
    selected: Option<FlameNodeId>,
    hover: Option<FlameNodeId>,
    layout: Option<FlameLayout>,
}

impl FlameState {
    pub fn new(tree: FlameTree) -> Self {
        let focus = tree.root();
        Self {
            tree,
            focus,
            selected: None,
            hover: None,
            layout: None,
        }
    }

    pub fn tree(&self) -> &FlameTree {
        &self.tree
    }

    pub fn focus(&self) -> FlameNodeId {
        self.focus
    }

    pub fn selected(&self) -> Option<FlameNodeId> {
        self.selected
    }

    pub fn hover(&self) -> Option<FlameNodeId> {
        self.hover
    }

    /// Layout for the given width, recomputed only when stale.
    pub fn layout(&mut self, width: usize) -> &FlameLayout {
        let stale = self
            .layout
            .as_ref()
            .is_none_or(|l| l.width() != width || l.focus() != self.focus);
        if stale {
            self.layout = None;
        }
        let (tree, focus) = (&self.tree, self.focus);
        self.layout
            .get_or_insert_with(|| FlameLayout::compute(tree, focus, width))
    }

    /// Drop the cached layout, e.g. after a terminal resize.
    pub fn invalidate(&mut self) {
        self.layout = None;
    }

    pub fn select(&mut self, node: FlameNodeId) {
        if self.tree.get(node).is_some() {
            self.selected = Some(node);
        }
    }

    /// Make `node` the focus and select it.
    pub fn zoom_in(&mut self, node: FlameNodeId) {
        if self.tree.get(node).is_none() {
            return;
        }
        self.focus = node;
        self.selected = Some(node);
        self.hover = None;
        self.invalidate();
    }

    /// Move the focus to its parent, or to the root when it has none.
    pub fn zoom_out(&mut self) {
        self.focus = self.tree.parent(self.focus).unwrap_or(self.tree.root());
        self.selected = Some(self.focus);
        self.hover = None;
        self.invalidate();
    }

    /// Zoom into the current selection, if any.
    pub fn zoom_selected(&mut self) {
        if let Some(node) = self.selected {
            self.zoom_in(node);
        }
    }

    /// Move the selection one step. With no selection the focus is selected
    /// first. Returns the new selection when it moved.
    pub fn navigate(&mut self, direction: Direction, width: usize) -> Option<FlameNodeId> {
        let current = match self.selected {
            Some(node) => node,
            None => {
                self.selected = Some(self.focus);
                return self.selected;
            }
        };

        let focus = self.focus;
        let target = match direction {
            Direction::Up if current == focus => None,
            Direction::Up => self.tree.parent(current),
            Direction::Down => self.layout(width).below(current),
            Direction::Left => self.layout(width).left_of(current),
            Direction::Right => self.layout(width).right_of(current),
        };
        if let Some(node) = target {
            self.selected = Some(node);
        }
        target
    }

    /// Track the node under a cell, clearing hover over empty space.
    pub fn hover_at(&mut self, x: usize, y: usize, width: usize) -> Option<FlameNodeId> {
        self.hover = self.layout(width).hit_test(x, y);
        self.hover
    }

    pub fn clear_hover(&mut self) {
        self.hover = None;
    }

    /// Select the node under a cell, if any.
    pub fn click_at(&mut self, x: usize, y: usize, width: usize) -> Option<FlameNodeId> {
        let hit = self.layout(width).hit_test(x, y);
        if let Some(node) = hit {
            self.selected = Some(node);
        }
        hit
    }

    /// Name of the selected node, or of the focus when nothing is selected.
    pub fn selected_name(&self) -> &str {
        &self.tree.node(self.selected.unwrap_or(self.focus)).name
    }
}
