//! Interactive session state consumed by a frontend.
//!
//! A [`Session`] owns the active [`ProfileData`] and everything a list,
//! graph or flame view needs to draw itself: the active view, sort order,
//! project-only filter, display mode, selected function and the flame
//! graph's zoom state. In live mode it also applies [`LiveEvent`]s.

use std::cmp::Reverse;
use tracing::{debug, info};

use crate::flame::build_flame_tree;
use crate::format::{format_nanos, round_to_millis};
use crate::live::LiveEvent;
use crate::model::{Edge, FuncNode, ProfileData, ProfileView};
use crate::navigate::FlameState;
use crate::palette::Palette;
use crate::project::ProjectFilter;
use crate::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum SortOrder {
    #[default]
    Flat,
    Cum,
    Name,
}

impl SortOrder {
    pub fn next(self) -> Self {
        match self {
            SortOrder::Flat => SortOrder::Cum,
            SortOrder::Cum => SortOrder::Name,
            SortOrder::Name => SortOrder::Flat,
        }
    }

    pub fn label(self, is_diff: bool) -> &'static str {
        match (self, is_diff) {
            (SortOrder::Flat, false) => "flat",
            (SortOrder::Cum, false) => "cum",
            (SortOrder::Flat, true) => "flat Δ",
            (SortOrder::Cum, true) => "cum Δ",
            (SortOrder::Name, _) => "name",
        }
    }
}

/// What the main pane shows next to the function list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mode {
    #[default]
    Source,
    Graph,
    Flame,
}

/// Result of applying a [`LiveEvent`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LiveOutcome {
    /// A tick arrived while running; the caller should dispatch a fetch.
    Fetch,
    /// A new snapshot replaced the data.
    Applied,
    /// A fetch failed; the previous data is kept.
    Failed,
    /// Paused, stale, or not in live mode.
    Ignored,
}

#[derive(Debug, Clone, Default)]
struct LiveStatus {
    paused: bool,
    last_error: Option<String>,
    applied_generation: u64,
}

#[derive(Debug)]
pub struct Session {
    data: Option<ProfileData>,
    view_index: usize,
    sort: SortOrder,
    project_only: bool,
    mode: Mode,
    selected: Option<String>,
    flame: Option<FlameState>,
    filter: Option<ProjectFilter>,
    source_info: String,
    live: Option<LiveStatus>,
}

impl Session {
    pub fn new(data: ProfileData, source_info: impl Into<String>, filter: Option<ProjectFilter>) -> Self {
        let view_index = data.default_view();
        Self {
            data: Some(data),
            view_index,
            sort: SortOrder::default(),
            project_only: false,
            mode: Mode::default(),
            selected: None,
            flame: None,
            filter,
            source_info: source_info.into(),
            live: None,
        }
    }

    /// A live session with no data until the first snapshot arrives.
    pub fn live(source_info: impl Into<String>, filter: Option<ProjectFilter>) -> Self {
        Self {
            data: None,
            view_index: 0,
            sort: SortOrder::default(),
            project_only: false,
            mode: Mode::default(),
            selected: None,
            flame: None,
            filter,
            source_info: source_info.into(),
            live: Some(LiveStatus::default()),
        }
    }

    pub fn data(&self) -> Option<&ProfileData> {
        self.data.as_ref()
    }

    pub fn view(&self) -> Option<&ProfileView> {
        self.data.as_ref()?.views.get(self.view_index)
    }

    pub fn view_index(&self) -> usize {
        self.view_index
    }

    pub fn sort(&self) -> SortOrder {
        self.sort
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn project_only(&self) -> bool {
        self.project_only
    }

    pub fn is_diff(&self) -> bool {
        self.data.as_ref().is_some_and(|d| d.is_diff)
    }

    pub fn is_live(&self) -> bool {
        self.live.is_some()
    }

    pub fn is_paused(&self) -> bool {
        self.live.as_ref().is_some_and(|l| l.paused)
    }

    pub fn last_error(&self) -> Option<&str> {
        self.live.as_ref()?.last_error.as_deref()
    }

    pub fn source_info(&self) -> &str {
        &self.source_info
    }

    pub fn set_view(&mut self, index: usize) -> Result<()> {
        let count = self.data.as_ref().map(|d| d.views.len()).unwrap_or(0);
        if index >= count {
            return Err(Error::UnknownView(index.to_string()));
        }
        self.view_index = index;
        self.reset_flame();
        Ok(())
    }

    /// Switch to the view named by an index, kind or full name.
    pub fn select_view(&mut self, selector: &str) -> Result<()> {
        let index = match &self.data {
            Some(data) => data.resolve_view(selector)?,
            None => return Err(Error::UnknownView(selector.to_string())),
        };
        self.set_view(index)
    }

    /// Cycle to the next view, wrapping around.
    pub fn next_view(&mut self) {
        let count = self.data.as_ref().map(|d| d.views.len()).unwrap_or(0);
        if count == 0 {
            return;
        }
        self.view_index = (self.view_index + 1) % count;
        self.reset_flame();
    }

    pub fn cycle_sort(&mut self) {
        self.sort = self.sort.next();
    }

    pub fn set_sort(&mut self, sort: SortOrder) {
        self.sort = sort;
    }

    /// Toggle the project-only filter. Does nothing without a module path.
    pub fn toggle_project_only(&mut self) -> bool {
        if self.filter.is_none() {
            return false;
        }
        self.set_project_only(!self.project_only);
        true
    }

    pub fn set_project_only(&mut self, on: bool) {
        if self.filter.is_none() || self.project_only == on {
            return;
        }
        self.project_only = on;
        self.reset_flame();
    }

    /// Switch between the flame graph and the source view. Diffs have no
    /// flame graph, so this does nothing for them.
    pub fn toggle_flame(&mut self) -> bool {
        if self.is_diff() {
            return false;
        }
        self.mode = match self.mode {
            Mode::Flame => Mode::Source,
            _ => Mode::Flame,
        };
        if self.mode == Mode::Flame {
            self.sync_flame_to_selection();
        }
        true
    }

    /// Switch between the caller/callee graph and the source view.
    pub fn toggle_graph(&mut self) {
        self.mode = match self.mode {
            Mode::Graph => Mode::Source,
            _ => Mode::Graph,
        };
    }

    /// Nodes of the active view in list order.
    pub fn sorted_nodes(&self) -> Vec<&FuncNode> {
        let Some(view) = self.view() else {
            return Vec::new();
        };
        let mut nodes: Vec<&FuncNode> = view
            .nodes
            .iter()
            .filter(|n| !self.project_only || n.is_project_code)
            .collect();

        let flat = |n: &FuncNode| match n.diff {
            Some(d) => d.flat_delta.unsigned_abs(),
            None => n.flat.unsigned_abs(),
        };
        let cum = |n: &FuncNode| match n.diff {
            Some(d) => d.cum_delta.unsigned_abs(),
            None => n.cum.unsigned_abs(),
        };
        match self.sort {
            SortOrder::Flat => nodes.sort_by_key(|n| (Reverse(flat(*n)), n.name.clone())),
            SortOrder::Cum => nodes.sort_by_key(|n| (Reverse(cum(*n)), n.name.clone())),
            SortOrder::Name => nodes.sort_by(|a, b| a.name.cmp(&b.name)),
        }
        nodes
    }

    /// Select a function by name in the active view.
    pub fn select_function(&mut self, name: &str) -> Result<()> {
        if self.view().and_then(|v| v.find_by_name(name)).is_none() {
            return Err(Error::UnknownFunction(name.to_string()));
        }
        self.selected = Some(name.to_string());
        self.sync_flame_to_selection();
        Ok(())
    }

    /// The selected function, defaulting to the top of the list.
    pub fn selected_node(&self) -> Option<&FuncNode> {
        let view = self.view()?;
        self.selected
            .as_deref()
            .and_then(|name| view.find_by_name(name))
            .or_else(|| self.sorted_nodes().first().copied())
    }

    pub fn callers(&self) -> Vec<Edge<'_>> {
        match (self.view(), self.selected_node()) {
            (Some(view), Some(node)) => view.callers(node),
            _ => Vec::new(),
        }
    }

    pub fn callees(&self) -> Vec<Edge<'_>> {
        match (self.view(), self.selected_node()) {
            (Some(view), Some(node)) => view.callees(node),
            _ => Vec::new(),
        }
    }

    /// Flame graph of the active view, built on first use.
    pub fn flame_state(&mut self) -> Option<&mut FlameState> {
        if self.is_diff() {
            return None;
        }
        if self.flame.is_none() {
            let data = self.data.as_ref()?;
            let view = data.views.get(self.view_index)?;
            let filter = if self.project_only { self.filter.as_ref() } else { None };
            let tree = build_flame_tree(&data.profile, view.sample_index, filter);
            self.flame = Some(FlameState::new(tree));
        }
        self.flame.as_mut()
    }

    /// Adopt the flame graph's selection as the selected function.
    pub fn sync_selection_from_flame(&mut self) {
        let Some(flame) = &self.flame else {
            return;
        };
        let Some(node) = flame.selected() else {
            return;
        };
        if node == flame.tree().root() {
            return;
        }
        let name = flame.tree().node(node).name.clone();
        if self.view().is_some_and(|v| v.find_by_name(&name).is_some()) {
            self.selected = Some(name);
        }
    }

    fn sync_flame_to_selection(&mut self) {
        if self.mode != Mode::Flame {
            return;
        }
        let Some(name) = self.selected_node().map(|n| n.name.clone()) else {
            return;
        };
        if let Some(flame) = self.flame_state() {
            if let Some(node) = flame.tree().find_by_name(&name) {
                flame.select(node);
            }
        }
    }

    /// Drop the flame tree along with its focus, selection, hover and layout.
    fn reset_flame(&mut self) {
        self.flame = None;
    }

    /// Pause or resume live polling. Returns the new paused state.
    pub fn toggle_pause(&mut self) -> bool {
        match &mut self.live {
            Some(live) => {
                live.paused = !live.paused;
                live.last_error = None;
                live.paused
            }
            None => false,
        }
    }

    /// Apply a live-mode event.
    pub fn apply(&mut self, event: LiveEvent) -> LiveOutcome {
        let Some(live) = &mut self.live else {
            return LiveOutcome::Ignored;
        };
        match event {
            LiveEvent::Tick if live.paused => LiveOutcome::Ignored,
            LiveEvent::Tick => LiveOutcome::Fetch,
            LiveEvent::Loaded { generation, .. } | LiveEvent::Failed { generation, .. }
                if live.paused || generation <= live.applied_generation =>
            {
                debug!(generation, applied = live.applied_generation, paused = live.paused, "discarding live result");
                LiveOutcome::Ignored
            }
            LiveEvent::Failed { error, .. } => {
                live.last_error = Some(error.to_string());
                LiveOutcome::Failed
            }
            LiveEvent::Loaded { generation, data } => {
                live.applied_generation = generation;
                live.last_error = None;
                info!(generation, views = data.views.len(), "applied live snapshot");
                self.replace_data(*data);
                LiveOutcome::Applied
            }
        }
    }

    /// Swap in a new snapshot, keeping the active view kind and the
    /// selected function when they still exist.
    fn replace_data(&mut self, data: ProfileData) {
        let kind = self.view().map(|v| v.kind.clone());
        let view_index = kind
            .and_then(|kind| data.views.iter().position(|v| v.kind == kind))
            .unwrap_or_else(|| data.default_view());

        let selected = self.selected.take().filter(|name| {
            data.views
                .get(view_index)
                .is_some_and(|v| v.find_by_name(name).is_some())
        });

        self.data = Some(data);
        self.view_index = view_index;
        self.selected = selected;
        self.reset_flame();
        self.sync_flame_to_selection();
    }

    /// Status and diagnostic lines shown above the panes.
    pub fn diagnostic_header(&self, palette: &Palette) -> String {
        let mut top = self.source_info.clone();
        if let Some(live) = &self.live {
            let status = if let Some(err) = &live.last_error {
                palette.bad(&format!("LIVE (ERROR): {}", err))
            } else if live.paused {
                palette.warn("LIVE (PAUSED)")
            } else {
                palette.good("LIVE (RUNNING)")
            };
            top = format!("{} {}", top, status);
        }

        let (Some(data), Some(view)) = (&self.data, self.view()) else {
            return top;
        };

        let hint = if data.is_diff {
            Some("Comparing two profiles. Green (+) means more time or memory in the second profile; red (-) means less.".to_string())
        } else if view.kind == "cpu" || view.kind == "samples" {
            busy_summary(data, view)
        } else if view.kind.starts_with("inuse") {
            Some("In-use memory is what was held when the profile was taken. Use it to find leaks.".to_string())
        } else if view.kind.starts_with("alloc") {
            Some("Allocated memory counts everything allocated over time. Use it to find code that causes GC pressure.".to_string())
        } else {
            None
        };

        match hint {
            Some(hint) => format!("{}\n{}", top, hint),
            None => top,
        }
    }
}

/// How busy the program was while it was profiled.
fn busy_summary(data: &ProfileData, view: &ProfileView) -> Option<String> {
    let cpu = data
        .views
        .iter()
        .find(|v| v.kind == "cpu" && v.unit == "nanoseconds")
        .unwrap_or(view);
    if data.duration_nanos <= 0 || cpu.unit != "nanoseconds" {
        return None;
    }

    let busy = cpu.total as f64 / data.duration_nanos as f64 * 100.0;
    let summary = format!(
        "Profiled for {}. Your program was busy for {} ({:.1}%).",
        format_nanos(round_to_millis(data.duration_nanos)),
        format_nanos(round_to_millis(cpu.total)),
        busy
    );
    let hint = if busy < 5.0 {
        "This program is likely I/O-bound or blocked. The CPU profile may not show the real bottleneck."
    } else if busy > 95.0 {
        "This program is CPU-bound. The functions below are the main contributors to CPU usage."
    } else {
        "This program has a mix of CPU and I/O or blocking work."
    };
    Some(format!("{}\n{}", summary, hint))
}
