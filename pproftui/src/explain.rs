//! Help texts for profile types and concepts.

use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Explanation {
    pub title: &'static str,
    pub body: &'static str,
}

/// Read-only table of help topics, built once and shared.
#[derive(Debug, Clone)]
pub struct Explainer {
    topics: BTreeMap<&'static str, Explanation>,
}

impl Default for Explainer {
    fn default() -> Self {
        Self::new()
    }
}

impl Explainer {
    pub fn new() -> Self {
        let entries = [
            (
                "cpu",
                "CPU Profile (cpu, samples)",
                "Where the program spent active CPU time, not wall-clock time.\n\n\
                 While profiling, the runtime interrupts the program at a fixed rate \
                 (100 times per second by default) and records the running stack. \
                 Each record is a sample; functions that show up in many samples \
                 kept the CPU busy.\n\n\
                 Time spent sleeping or blocked on I/O, channels or locks is not \
                 included.",
            ),
            (
                "inuse_space",
                "Heap Profile: In-Use Space (bytes)",
                "Memory still held by each function when the profile was taken.\n\n\
                 Compare several snapshots taken under a steady workload: memory \
                 that keeps rising without coming back down points to a leak.",
            ),
            (
                "alloc_space",
                "Heap Profile: Allocated Space (bytes)",
                "Every byte each function allocated over the life of the program, \
                 including memory that was later garbage collected.\n\n\
                 Heavy short-lived allocation (slices, strings and structs built in \
                 loops) creates churn and garbage-collector pressure. Use this view \
                 to find it.",
            ),
            (
                "inuse_objects",
                "Heap Profile: In-Use Objects",
                "How many objects each function still holds, regardless of their \
                 size.\n\nUseful when many small objects are retained even though \
                 total memory looks stable.",
            ),
            (
                "alloc_objects",
                "Heap Profile: Allocated Objects",
                "How many objects each function allocated over the life of the \
                 program, freed or not.\n\nHigh counts usually come from object \
                 creation in tight loops or hot call paths.",
            ),
            (
                "goroutine",
                "Goroutine Profile",
                "Where every goroutine was running or waiting when the profile was \
                 taken.\n\nLarge groups parked on the same channel, lock or I/O \
                 call suggest contention, leaks or a deadlock.",
            ),
            (
                "mutex",
                "Mutex Contention Profile",
                "Where goroutines waited to acquire a lock, and for how long.\n\n\
                 Use it to find locks that serialise otherwise concurrent work.",
            ),
            (
                "block",
                "Blocking Profile",
                "Where goroutines blocked on synchronisation primitives such as \
                 channels, select statements and condition variables.",
            ),
            (
                "flat_vs_cum",
                "Flat vs. Cumulative",
                "Flat is what a function consumed while it was itself running. \
                 Cumulative (cum) adds everything it called.\n\n\
                 A function with a small flat share but a large cumulative share \
                 mostly delegates; the cost lives in its callees. A function whose \
                 flat and cumulative values are close does the work itself.\n\n\
                 Percentages are shares of the view's total.",
            ),
            (
                "flamegraph",
                "Flame Graph (icicle layout)",
                "Call stacks drawn top-down: callers above, callees below.\n\n\
                 The width of each bar is proportional to the value of every stack \
                 passing through it. Depth is call nesting. Wide bars near the \
                 bottom do the most work themselves.\n\n\
                 Zoom into a bar to make it fill the width; zoom out to return to \
                 its parent.",
            ),
            (
                "diff",
                "Profile Comparison",
                "Two profiles compared function by function.\n\n\
                 Positive deltas (+) mean more time or memory in the second \
                 profile; negative deltas (-) mean less.\n\n\
                 \"new\" marks functions that only appear in the second profile and \
                 \"removed\" those that disappeared. Ratios such as \"2.0x slower\" \
                 compare the two values directly, and small changes are shown as a \
                 percentage. Filter to project code to cut down on runtime noise.",
            ),
        ];

        let topics = entries
            .into_iter()
            .map(|(key, title, body)| (key, Explanation { title, body }))
            .collect();
        Self { topics }
    }

    pub fn topic(&self, key: &str) -> Option<&Explanation> {
        self.topics.get(key)
    }

    pub fn topics(&self) -> impl Iterator<Item = (&'static str, &Explanation)> {
        self.topics.iter().map(|(k, v)| (*k, v))
    }

    /// Help for a view name such as `"alloc_space (bytes)"` or
    /// `"Diff: cpu (nanoseconds)"`, falling back to the flat/cum primer.
    pub fn for_view(&self, view_name: &str) -> &Explanation {
        let key = if view_name.starts_with("Diff:") {
            "diff"
        } else {
            let kind = view_name.split(' ').next().unwrap_or_default();
            match kind {
                "cpu" | "samples" => "cpu",
                "contentions" | "delay" => "mutex",
                other if self.topics.contains_key(other) => other,
                _ => "flat_vs_cum",
            }
        };
        self.topic(key)
            .or_else(|| self.topic("flat_vs_cum"))
            .unwrap_or(&FALLBACK)
    }
}

static FALLBACK: Explanation = Explanation {
    title: "Profile",
    body: "No help is available for this view.",
};
