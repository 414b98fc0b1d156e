//! Call-graph construction from a decoded stack-sample stream.
//!
//! Each sample type becomes one [`ProfileView`]. Building a view takes two
//! passes over the samples: the first assigns flat and cumulative value to
//! every function on each stack, the second walks each stack root-to-leaf and
//! records caller/callee edges between adjacent functions.

use pprof_parse::{FrameFunction, Profile};
use std::io::Read;
use std::sync::Arc;
use tracing::debug;

use crate::model::{FunctionKey, NodeId, ProfileData, ProfileView};
use crate::project::ProjectFilter;
use crate::{Error, Result};

/// Build the view for one sample type.
pub fn build_view(profile: &Profile, index: usize) -> ProfileView {
    let (kind, unit) = profile
        .sample_types
        .get(index)
        .map(|t| (t.kind.as_str(), t.unit.as_str()))
        .unwrap_or(("", ""));
    let mut view = ProfileView::new(kind, unit, index);

    // Pass 1: every appearance gets cumulative value, including repeated
    // appearances on a recursive stack. Only the innermost function of the
    // leaf frame gets flat value.
    for sample in &profile.samples {
        let value = sample.value(index);
        if value == 0 {
            continue;
        }
        view.total += value;

        for (depth, frame) in sample.frames.iter().enumerate() {
            for (pos, ff) in frame.functions.iter().enumerate() {
                let id = intern(&mut view, ff);
                let node = view.node_mut(id);
                node.cum += value;
                if depth == 0 && pos == 0 {
                    node.flat += value;
                }
            }
        }
    }

    // Pass 2: flatten each stack into its root-to-leaf chain of functions
    // (outermost frame first, inlined callers before their inlinees) and
    // add an edge for every adjacent pair.
    let mut chain: Vec<NodeId> = Vec::new();
    for sample in &profile.samples {
        let value = sample.value(index);
        if value == 0 {
            continue;
        }

        chain.clear();
        for frame in sample.frames.iter().rev() {
            for ff in frame.functions.iter().rev() {
                if let Some(id) = view.lookup(&function_key(ff)) {
                    chain.push(id);
                }
            }
        }
        for pair in chain.windows(2) {
            view.add_edge(pair[0], pair[1], value);
        }
    }

    view
}

fn intern(view: &mut ProfileView, ff: &FrameFunction) -> NodeId {
    let function = &ff.function;
    view.intern(function.id, &function.name, &function.filename, function.start_line)
}

/// Identity of a frame's function. The start line is taken as decoded, 0
/// included, so the same function keys identically in every profile.
fn function_key(ff: &FrameFunction) -> FunctionKey {
    FunctionKey {
        name: ff.function.name.clone(),
        filename: ff.function.filename.clone(),
        start_line: ff.function.start_line,
    }
}

/// Build one view per sample type, empty dimensions included, so that a
/// dimension that dropped to zero still lines up in a diff.
///
/// Fails with [`Error::NoValidSampleData`] when no dimension has any node.
pub fn build_profile(profile: Profile) -> Result<ProfileData> {
    let views: Vec<ProfileView> = (0..profile.sample_types.len())
        .map(|index| build_view(&profile, index))
        .collect();

    if views.iter().all(|view| view.nodes.is_empty()) {
        return Err(Error::NoValidSampleData);
    }

    for view in &views {
        debug!(
            view = %view.name,
            nodes = view.nodes.len(),
            total = view.total,
            "built call graph"
        );
    }

    Ok(ProfileData {
        duration_nanos: profile.duration_nanos,
        views,
        profile: Arc::new(profile),
        is_diff: false,
    })
}

/// Mark every node whose file belongs to the project.
pub fn annotate_project_code(data: &mut ProfileData, filter: &ProjectFilter) {
    let mut marked = 0usize;
    for view in &mut data.views {
        for node in &mut view.nodes {
            node.is_project_code = filter.matches(&node.filename);
            if node.is_project_code {
                marked += 1;
            }
        }
    }
    debug!(module = filter.module_path(), marked, "annotated project code");
}

/// Decode a profile from raw bytes and build all of its views.
pub fn load_bytes(bytes: &[u8], filter: Option<&ProjectFilter>) -> Result<ProfileData> {
    let profile = Profile::from_bytes(bytes)?;
    let mut data = build_profile(profile)?;
    if let Some(filter) = filter {
        annotate_project_code(&mut data, filter);
    }
    Ok(data)
}

/// Decode a profile from any reader and build all of its views.
pub fn load<R: Read>(mut reader: R, filter: Option<&ProjectFilter>) -> Result<ProfileData> {
    let mut bytes = Vec::new();
    reader.read_to_end(&mut bytes)?;
    load_bytes(&bytes, filter)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pprof_parse::ProfileBuilder;

    fn cpu_profile(stacks: &[(&[&str], i64)]) -> Profile {
        let mut builder = ProfileBuilder::new(&[("samples", "count"), ("cpu", "nanoseconds")]);
        for (names, value) in stacks {
            builder.add_stack(names, &[1, *value]);
        }
        Profile::from_raw(builder.into_inner())
    }

    fn node<'a>(view: &'a ProfileView, name: &str) -> &'a crate::model::FuncNode {
        view.find_by_name(name).unwrap()
    }

    #[test]
    fn flat_and_cum_on_simple_stack() {
        let profile = cpu_profile(&[
            (&["work", "main"], 30),
            (&["main"], 10),
            (&["helper", "work", "main"], 60),
        ]);
        let view = build_view(&profile, 1);

        assert_eq!(view.name, "cpu (nanoseconds)");
        assert_eq!(view.kind, "cpu");
        assert_eq!(view.total, 100);
        assert_eq!(node(&view, "main").flat, 10);
        assert_eq!(node(&view, "main").cum, 100);
        assert_eq!(node(&view, "work").flat, 30);
        assert_eq!(node(&view, "work").cum, 90);
        assert_eq!(node(&view, "helper").flat, 60);
        assert_eq!(node(&view, "helper").cum, 60);
        assert_eq!(view.flat_sum(), view.total);
    }

    #[test]
    fn edges_follow_adjacent_pairs() {
        let profile = cpu_profile(&[(&["work", "main"], 30), (&["helper", "work", "main"], 60)]);
        let view = build_view(&profile, 1);

        let main = node(&view, "main");
        let work = node(&view, "work");
        let helper = node(&view, "helper");

        assert_eq!(main.callees[&work.id], 90);
        assert_eq!(work.callers[&main.id], 90);
        assert_eq!(work.callees[&helper.id], 60);
        assert_eq!(helper.callers[&work.id], 60);
        assert!(main.callers.is_empty());
        assert!(helper.callees.is_empty());
    }

    #[test]
    fn self_recursion_counts_each_appearance() {
        let profile = cpu_profile(&[(&["A", "A", "A"], 10)]);
        let view = build_view(&profile, 1);
        let a = node(&view, "A");

        assert_eq!(a.flat, 10);
        assert_eq!(a.cum, 30);
        assert_eq!(a.callees[&a.id], 20);
        assert_eq!(a.callers[&a.id], 20);
        assert!(a.is_recursive());
        assert_eq!(view.nodes.len(), 1);
    }

    #[test]
    fn zero_valued_samples_create_no_nodes() {
        let mut builder = ProfileBuilder::new(&[("alloc_objects", "count"), ("alloc_space", "bytes")]);
        builder.add_stack(&["alloc", "main"], &[0, 4096]);
        let profile = Profile::from_raw(builder.into_inner());

        assert!(build_view(&profile, 0).nodes.is_empty());
        assert_eq!(build_view(&profile, 1).nodes.len(), 2);

        let data = build_profile(profile).unwrap();
        assert_eq!(data.views.len(), 2);
        assert_eq!(data.views[0].kind, "alloc_objects");
        assert_eq!(data.views[0].total, 0);
        assert!(data.views[0].nodes.is_empty());
        assert_eq!(data.views[1].kind, "alloc_space");
        assert_eq!(data.views[1].sample_index, 1);
    }

    #[test]
    fn inlined_frames_expand_into_chain() {
        let mut builder = ProfileBuilder::new(&[("cpu", "nanoseconds")]);
        let main = builder.add_function("main.main", "/src/main.go", 3);
        let parse = builder.add_function("main.parse", "/src/parse.go", 10);
        let index = builder.add_function("strings.Index", "/go/strings.go", 100);
        let leaf = builder.add_location(&[(index, 105), (parse, 14)]);
        let root = builder.add_location(&[(main, 5)]);
        builder.add_sample(&[leaf, root], &[50]);
        let view = build_view(&Profile::from_raw(builder.into_inner()), 0);

        let main = node(&view, "main.main");
        let parse = node(&view, "main.parse");
        let index = node(&view, "strings.Index");

        assert_eq!(index.flat, 50);
        assert_eq!(parse.flat, 0);
        assert_eq!(parse.cum, 50);
        assert_eq!(main.callees[&parse.id], 50);
        assert_eq!(parse.callees[&index.id], 50);
    }

    #[test]
    fn unset_start_line_is_kept() {
        let mut builder = ProfileBuilder::new(&[("cpu", "nanoseconds")]);
        let f = builder.add_function("main.main", "/src/main.go", 0);
        let loc = builder.add_location(&[(f, 42)]);
        let other = builder.add_location(&[(f, 50)]);
        builder.add_sample(&[loc], &[5]);
        builder.add_sample(&[other], &[7]);
        let view = build_view(&Profile::from_raw(builder.into_inner()), 0);

        assert_eq!(view.nodes.len(), 1);
        assert_eq!(node(&view, "main.main").start_line, 0);
        assert_eq!(node(&view, "main.main").flat, 12);
    }

    #[test]
    fn duplicate_function_records_merge() {
        let mut builder = ProfileBuilder::new(&[("cpu", "nanoseconds")]);
        let first = builder.add_function("main.work", "/src/w.go", 7);
        let second = builder.add_function("main.work.copy", "/src/w.go", 7);
        let main = builder.add_function("main.main", "/src/main.go", 1);
        let first_loc = builder.add_location(&[(first, 8)]);
        let second_loc = builder.add_location(&[(second, 9)]);
        let main_loc = builder.add_location(&[(main, 2)]);
        builder.add_sample(&[first_loc, main_loc], &[10]);
        builder.add_sample(&[second_loc, main_loc], &[10]);

        // Two function records with the same identity but distinct ids, as
        // found in merged profiles.
        let mut raw = builder.into_inner();
        raw.function[1].name = raw.function[0].name;
        raw.function[1].system_name = raw.function[0].system_name;
        assert_ne!(raw.function[0].id, raw.function[1].id);
        let view = build_view(&Profile::from_raw(raw), 0);

        assert_eq!(view.nodes.len(), 2);
        let work = node(&view, "main.work");
        assert_eq!(work.flat, 20);
        assert_eq!(work.cum, 20);
        assert_eq!(node(&view, "main.main").callees[&work.id], 20);
    }

    #[test]
    fn empty_profile_has_no_valid_data() {
        let builder = ProfileBuilder::new(&[("cpu", "nanoseconds")]);
        let result = build_profile(Profile::from_raw(builder.into_inner()));
        assert!(matches!(result, Err(Error::NoValidSampleData)));

        let no_types = ProfileBuilder::new(&[]);
        let result = build_profile(Profile::from_raw(no_types.into_inner()));
        assert!(matches!(result, Err(Error::NoValidSampleData)));
    }

    #[test]
    fn load_marks_project_code() {
        let mut builder = ProfileBuilder::new(&[("cpu", "nanoseconds")]);
        let main = builder.add_function("main.main", "/home/dev/acme/app/main.go", 1);
        let lib = builder.add_function("fmt.Println", "/usr/go/src/fmt/print.go", 1);
        let leaf = builder.add_location(&[(lib, 2)]);
        let root = builder.add_location(&[(main, 2)]);
        builder.add_sample(&[leaf, root], &[10]);
        builder.set_duration_nanos(1_000);

        let mut gz = Vec::new();
        builder.write(&mut gz).unwrap();
        let filter = ProjectFilter::new("acme/app").unwrap();
        let data = load(gz.as_slice(), Some(&filter)).unwrap();

        assert_eq!(data.duration_nanos, 1_000);
        assert!(!data.is_diff);
        let view = &data.views[0];
        assert!(node(view, "main.main").is_project_code);
        assert!(!node(view, "fmt.Println").is_project_code);
    }

    #[test]
    fn load_rejects_garbage() {
        let result = load_bytes(&[0xff, 0xff, 0xff, 0xff], None);
        assert!(matches!(result, Err(Error::Decode(_))));
    }

    #[test]
    fn cum_never_below_flat() {
        let profile = cpu_profile(&[
            (&["c", "b", "a"], 7),
            (&["b", "a"], 3),
            (&["a", "b", "a"], 5),
            (&["c"], 2),
        ]);
        let view = build_view(&profile, 1);
        for n in &view.nodes {
            assert!(n.cum >= n.flat, "{}: cum {} < flat {}", n.name, n.cum, n.flat);
        }
        assert_eq!(view.flat_sum(), view.total);
    }

    #[test]
    fn roots_account_for_total_without_recursion() {
        let profile = cpu_profile(&[
            (&["work", "main"], 30),
            (&["helper", "work", "main"], 60),
            (&["gcBgMarkWorker"], 25),
            (&["flush", "gcBgMarkWorker"], 5),
        ]);
        let view = build_view(&profile, 1);
        let roots: i64 = view
            .nodes
            .iter()
            .filter(|n| n.callers.is_empty())
            .map(|n| n.cum)
            .sum();
        assert_eq!(roots, view.total);
    }

    #[test]
    fn rebuilding_is_deterministic() {
        let stacks: &[(&[&str], i64)] = &[
            (&["c", "b", "a"], 7),
            (&["b", "a"], 3),
            (&["a", "b", "a"], 5),
            (&["d"], 2),
        ];
        let first = build_profile(cpu_profile(stacks)).unwrap();
        let second = build_profile(cpu_profile(stacks)).unwrap();
        assert_eq!(first.views, second.views);
    }
}
