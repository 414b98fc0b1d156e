//! Machine-readable output as newline-delimited JSON.
//!
//! The first record is a header naming the view; one record per function
//! follows.

use std::io::Write;

use crate::Result;
use crate::model::{FuncNode, ProfileView};

const FORMAT_VERSION: &str = "0.1";

/// Write a flat/cum table.
pub fn write_top_ndjson<W: Write>(
    mut writer: W,
    source: &str,
    view: &ProfileView,
    nodes: &[&FuncNode],
) -> Result<()> {
    let header = serde_json::json!({
        "type": "header",
        "format": "pproftui-top",
        "version": FORMAT_VERSION,
        "source": source,
        "view": view.name,
        "unit": view.unit,
        "total": view.total
    });
    writeln!(writer, "{}", serde_json::to_string(&header)?)?;

    for node in nodes {
        let record = serde_json::json!({
            "type": "function",
            "name": node.name,
            "file": node.filename,
            "start_line": node.start_line,
            "flat": node.flat,
            "cum": node.cum,
            "project": node.is_project_code
        });
        writeln!(writer, "{}", serde_json::to_string(&record)?)?;
    }
    Ok(())
}

/// Write the deltas of a diff view.
pub fn write_diff_ndjson<W: Write>(
    mut writer: W,
    before: &str,
    after: &str,
    view: &ProfileView,
    nodes: &[&FuncNode],
) -> Result<()> {
    let header = serde_json::json!({
        "type": "header",
        "format": "pproftui-diff",
        "version": FORMAT_VERSION,
        "before": before,
        "after": after,
        "view": view.name,
        "unit": view.unit,
        "total_delta": view.total
    });
    writeln!(writer, "{}", serde_json::to_string(&header)?)?;

    for node in nodes {
        let Some(diff) = node.diff else {
            continue;
        };
        let record = serde_json::json!({
            "type": "delta",
            "name": node.name,
            "file": node.filename,
            "start_line": node.start_line,
            "change": diff.change,
            "flat_delta": diff.flat_delta,
            "cum_delta": diff.cum_delta,
            // Infinity is not representable in JSON.
            "flat_ratio": finite(diff.flat_ratio),
            "cum_ratio": finite(diff.cum_ratio),
            "project": node.is_project_code
        });
        writeln!(writer, "{}", serde_json::to_string(&record)?)?;
    }
    Ok(())
}

fn finite(ratio: f64) -> Option<f64> {
    ratio.is_finite().then_some(ratio)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diff::diff_profiles;
    use crate::graph::build_profile;
    use crate::model::ProfileData;
    use pprof_parse::{Profile, ProfileBuilder};
    use serde_json::Value;

    fn data(stacks: &[(&[&str], i64)]) -> ProfileData {
        let mut builder = ProfileBuilder::new(&[("alloc_space", "bytes")]);
        for (names, value) in stacks {
            builder.add_stack(names, &[*value]);
        }
        build_profile(Profile::from_raw(builder.into_inner())).unwrap()
    }

    fn lines(buf: &[u8]) -> Vec<Value> {
        std::str::from_utf8(buf)
            .unwrap()
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect()
    }

    #[test]
    fn top_records() {
        let d = data(&[(&["work", "main"], 64), (&["main"], 16)]);
        let view = &d.views[0];
        let nodes: Vec<&FuncNode> = view.nodes.iter().collect();

        let mut buf = Vec::new();
        write_top_ndjson(&mut buf, "heap.pb.gz", view, &nodes).unwrap();
        let records = lines(&buf);

        assert_eq!(records.len(), 3);
        assert_eq!(records[0]["type"], "header");
        assert_eq!(records[0]["source"], "heap.pb.gz");
        assert_eq!(records[0]["total"], 80);
        let work = records.iter().find(|r| r["name"] == "work").unwrap();
        assert_eq!(work["flat"], 64);
        assert_eq!(work["cum"], 64);
        assert_eq!(work["project"], false);
    }

    #[test]
    fn diff_records() {
        let before = data(&[(&["old", "main"], 10), (&["work", "main"], 10)]);
        let after = data(&[(&["work", "main"], 30)]);
        let diff = diff_profiles(&before, &after).unwrap();
        let view = &diff.views[0];
        let nodes: Vec<&FuncNode> = view.nodes.iter().collect();

        let mut buf = Vec::new();
        write_diff_ndjson(&mut buf, "a.pb.gz", "b.pb.gz", view, &nodes).unwrap();
        let records = lines(&buf);

        assert_eq!(records[0]["format"], "pproftui-diff");
        assert_eq!(records[0]["total_delta"], 10);

        let work = records.iter().find(|r| r["name"] == "work").unwrap();
        assert_eq!(work["change"], "modified");
        assert_eq!(work["flat_delta"], 20);
        assert_eq!(work["flat_ratio"], 3.0);

        let old = records.iter().find(|r| r["name"] == "old").unwrap();
        assert_eq!(old["change"], "removed");
        assert_eq!(old["flat_ratio"], 0.0);
    }

    #[test]
    fn new_functions_have_null_ratio() {
        let before = data(&[(&["main"], 10)]);
        let after = data(&[(&["main"], 10), (&["fresh", "main"], 5)]);
        let diff = diff_profiles(&before, &after).unwrap();
        let view = &diff.views[0];
        let nodes: Vec<&FuncNode> = view.nodes.iter().collect();

        let mut buf = Vec::new();
        write_diff_ndjson(&mut buf, "a", "b", view, &nodes).unwrap();
        let fresh = lines(&buf).into_iter().find(|r| r["name"] == "fresh").unwrap();
        assert_eq!(fresh["change"], "new");
        assert!(fresh["flat_ratio"].is_null());
    }
}
