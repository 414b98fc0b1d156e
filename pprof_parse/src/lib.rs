//! pprof profile decoder library.
//!
//! This library decodes pprof profiles (the `profile.proto` format written by
//! Go's `runtime/pprof`, `net/http/pprof` and many other producers) from any
//! `Read`-able source and resolves them into a stack-sample stream.
//!
//! Both gzip-compressed and raw protobuf input are accepted.
//!
//! # Example
//!
//! ```no_run
//! use std::fs::File;
//! use pprof_parse::Profile;
//!
//! let file = File::open("cpu.pprof").unwrap();
//! let profile = Profile::parse(file).unwrap();
//!
//! for sample_type in &profile.sample_types {
//!     println!("{} ({})", sample_type.kind, sample_type.unit);
//! }
//! println!("Samples: {}", profile.samples.len());
//! ```

use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use prost::Message;
use serde::Serialize;
use std::collections::HashMap;
use std::io::{Read, Write};
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

pub mod proto;

/// Errors that can occur while decoding a profile.
#[derive(Error, Debug)]
pub enum ParseError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("protobuf decode error: {0}")]
    Decode(#[from] prost::DecodeError),

    #[error("profile input is empty")]
    Empty,
}

/// Result type for profile decoding operations.
pub type Result<T> = std::result::Result<T, ParseError>;

/// Errors that can occur while writing a profile.
#[derive(Error, Debug)]
pub enum WriteError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for profile writing operations.
pub type WriteResult<T> = std::result::Result<T, WriteError>;

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

// ============================================================================
// Resolved types
// ============================================================================

/// Semantics of one measurement dimension, e.g. `cpu`/`nanoseconds`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValueType {
    /// Sample type name (`cpu`, `samples`, `alloc_space`, ...).
    pub kind: String,
    pub unit: String,
}

/// A function referenced by one or more frames.
///
/// The `id` is only meaningful inside the profile that produced it; two
/// independently decoded profiles assign ids independently.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Function {
    pub id: u64,
    pub name: String,
    pub system_name: String,
    pub filename: String,
    pub start_line: i64,
}

/// One logical function within a physical frame.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameFunction {
    pub function: Arc<Function>,
    /// Source line being executed within the function.
    pub line: i64,
}

/// One physical stack frame.
///
/// `functions` is ordered innermost-first: entry 0 is the function that was
/// actually executing, and every following entry is the caller the previous
/// ones were inlined into.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pub address: u64,
    pub functions: Vec<FrameFunction>,
}

impl Frame {
    /// The innermost inlined function of this frame.
    pub fn innermost(&self) -> Option<&FrameFunction> {
        self.functions.first()
    }
}

/// One observation: a leaf-first stack with a value per sample type.
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    pub values: Vec<i64>,
    pub frames: Vec<Frame>,
}

impl Sample {
    /// Value for the given sample type, 0 when the producer omitted it.
    pub fn value(&self, index: usize) -> i64 {
        self.values.get(index).copied().unwrap_or(0)
    }
}

/// A decoded profile.
#[derive(Debug, Clone, PartialEq)]
pub struct Profile {
    pub sample_types: Vec<ValueType>,
    pub samples: Vec<Sample>,
    /// Function dictionary, keyed by function id.
    pub functions: HashMap<u64, Arc<Function>>,
    pub time_nanos: i64,
    pub duration_nanos: i64,
    pub period_type: Option<ValueType>,
    pub period: i64,
    pub comments: Vec<String>,
    /// Preferred sample type, if the producer named one.
    pub default_sample_type: Option<String>,
}

impl Profile {
    /// Decode a profile from any `Read`-able source.
    pub fn parse<R: Read>(mut reader: R) -> Result<Self> {
        let mut bytes = Vec::new();
        reader.read_to_end(&mut bytes)?;
        Self::from_bytes(&bytes)
    }

    /// Decode a profile from an in-memory buffer, inflating gzip if needed.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.is_empty() {
            return Err(ParseError::Empty);
        }

        let raw = if bytes.starts_with(&GZIP_MAGIC) {
            let mut inflated = Vec::new();
            GzDecoder::new(bytes).read_to_end(&mut inflated)?;
            proto::Profile::decode(inflated.as_slice())?
        } else {
            proto::Profile::decode(bytes)?
        };

        Ok(Self::from_raw(raw))
    }

    /// Resolve a wire-level profile.
    ///
    /// Dangling references are dropped rather than rejected: a location id
    /// with no location, a line with an unknown function, and a location with
    /// no resolvable lines are all skipped.
    pub fn from_raw(raw: proto::Profile) -> Self {
        let strings = &raw.string_table;
        let lookup = |idx: i64| -> String {
            usize::try_from(idx)
                .ok()
                .and_then(|i| strings.get(i))
                .cloned()
                .unwrap_or_default()
        };
        let value_type = |vt: &proto::ValueType| ValueType {
            kind: lookup(vt.r#type),
            unit: lookup(vt.unit),
        };

        let functions: HashMap<u64, Arc<Function>> = raw
            .function
            .iter()
            .map(|f| {
                let function = Function {
                    id: f.id,
                    name: lookup(f.name),
                    system_name: lookup(f.system_name),
                    filename: lookup(f.filename),
                    start_line: f.start_line,
                };
                (f.id, Arc::new(function))
            })
            .collect();

        let mut skipped = 0usize;
        let mut locations: HashMap<u64, Frame> = HashMap::with_capacity(raw.location.len());
        for loc in &raw.location {
            let mut frame_functions = Vec::with_capacity(loc.line.len());
            for line in &loc.line {
                match functions.get(&line.function_id) {
                    Some(function) => frame_functions.push(FrameFunction {
                        function: Arc::clone(function),
                        line: line.line,
                    }),
                    None => skipped += 1,
                }
            }
            if frame_functions.is_empty() {
                skipped += 1;
                continue;
            }
            locations.insert(
                loc.id,
                Frame {
                    address: loc.address,
                    functions: frame_functions,
                },
            );
        }

        let samples: Vec<Sample> = raw
            .sample
            .iter()
            .map(|s| {
                let frames: Vec<Frame> = s
                    .location_id
                    .iter()
                    .filter_map(|id| {
                        let frame = locations.get(id).cloned();
                        if frame.is_none() {
                            skipped += 1;
                        }
                        frame
                    })
                    .collect();
                Sample {
                    values: s.value.clone(),
                    frames,
                }
            })
            .collect();

        if skipped > 0 {
            debug!(skipped, "dropped malformed stack elements while resolving profile");
        }

        let default_sample_type = match raw.default_sample_type {
            0 => None,
            idx => Some(lookup(idx)),
        };

        Profile {
            sample_types: raw.sample_type.iter().map(value_type).collect(),
            samples,
            functions,
            time_nanos: raw.time_nanos,
            duration_nanos: raw.duration_nanos,
            period_type: raw.period_type.as_ref().map(value_type),
            period: raw.period,
            comments: raw.comment.iter().map(|&c| lookup(c)).collect(),
            default_sample_type,
        }
    }

    /// Index of the sample type with the given name.
    pub fn sample_type_index(&self, kind: &str) -> Option<usize> {
        self.sample_types.iter().position(|t| t.kind == kind)
    }

    /// Sum of all values recorded for a sample type.
    pub fn total(&self, index: usize) -> i64 {
        self.samples.iter().map(|s| s.value(index)).sum()
    }
}

// ============================================================================
// Writer
// ============================================================================

/// Builder for creating pprof profiles.
///
/// Strings, functions and locations are interned, so adding the same function
/// twice yields the same id. This is mostly useful for fixtures and for tools
/// that synthesize profiles.
///
/// # Example
///
/// ```no_run
/// use pprof_parse::ProfileBuilder;
/// use std::fs::File;
///
/// let mut builder = ProfileBuilder::new(&[("cpu", "nanoseconds")]);
/// let main = builder.add_function("main.main", "/src/main.go", 10);
/// let work = builder.add_function("main.work", "/src/main.go", 20);
/// let leaf = builder.add_location(&[(work, 22)]);
/// let root = builder.add_location(&[(main, 12)]);
/// builder.add_sample(&[leaf, root], &[1_000_000]);
///
/// let file = File::create("cpu.pprof").unwrap();
/// builder.write(file).unwrap();
/// ```
pub struct ProfileBuilder {
    profile: proto::Profile,
    strings: HashMap<String, i64>,
    functions: HashMap<(String, String, i64), u64>,
    stack_locations: HashMap<u64, u64>,
}

impl ProfileBuilder {
    /// Create a builder with the given `(type, unit)` sample types.
    pub fn new(sample_types: &[(&str, &str)]) -> Self {
        let mut builder = Self {
            profile: proto::Profile {
                string_table: vec![String::new()],
                ..Default::default()
            },
            strings: HashMap::from([(String::new(), 0)]),
            functions: HashMap::new(),
            stack_locations: HashMap::new(),
        };
        for (kind, unit) in sample_types {
            let sample_type = proto::ValueType {
                r#type: builder.intern(kind),
                unit: builder.intern(unit),
            };
            builder.profile.sample_type.push(sample_type);
        }
        builder
    }

    /// Set the wall-clock duration the profile covers.
    pub fn set_duration_nanos(&mut self, nanos: i64) {
        self.profile.duration_nanos = nanos;
    }

    /// Set the preferred sample type.
    pub fn set_default_sample_type(&mut self, kind: &str) {
        self.profile.default_sample_type = self.intern(kind);
    }

    /// Add a function record, returning its id.
    pub fn add_function(&mut self, name: &str, filename: &str, start_line: i64) -> u64 {
        let key = (name.to_string(), filename.to_string(), start_line);
        if let Some(&id) = self.functions.get(&key) {
            return id;
        }

        let id = self.profile.function.len() as u64 + 1;
        let function = proto::Function {
            id,
            name: self.intern(name),
            system_name: self.intern(name),
            filename: self.intern(filename),
            start_line,
        };
        self.profile.function.push(function);
        self.functions.insert(key, id);
        id
    }

    /// Add a location made of `(function id, line)` pairs, innermost first.
    pub fn add_location(&mut self, lines: &[(u64, i64)]) -> u64 {
        let id = self.profile.location.len() as u64 + 1;
        self.profile.location.push(proto::Location {
            id,
            address: 0x1000 + id * 0x10,
            line: lines
                .iter()
                .map(|&(function_id, line)| proto::Line {
                    function_id,
                    line,
                    column: 0,
                })
                .collect(),
            ..Default::default()
        });
        id
    }

    /// Add a sample over leaf-first location ids.
    pub fn add_sample(&mut self, location_ids: &[u64], values: &[i64]) {
        self.profile.sample.push(proto::Sample {
            location_id: location_ids.to_vec(),
            value: values.to_vec(),
            label: Vec::new(),
        });
    }

    /// Add a sample over leaf-first function names.
    ///
    /// Each name becomes a non-inlined function in `main.go`, and each
    /// function gets one shared location.
    pub fn add_stack(&mut self, names: &[&str], values: &[i64]) {
        let location_ids: Vec<u64> = names
            .iter()
            .map(|name| {
                let function_id = self.add_function(name, "main.go", 0);
                match self.stack_locations.get(&function_id) {
                    Some(&location_id) => location_id,
                    None => {
                        let location_id = self.add_location(&[(function_id, 0)]);
                        self.stack_locations.insert(function_id, location_id);
                        location_id
                    }
                }
            })
            .collect();
        self.add_sample(&location_ids, values);
    }

    /// Get the wire-level profile built so far.
    pub fn build(&self) -> proto::Profile {
        self.profile.clone()
    }

    /// Encode as raw, uncompressed protobuf.
    pub fn to_bytes(&self) -> Vec<u8> {
        self.profile.encode_to_vec()
    }

    /// Write as gzip-compressed protobuf, the format pprof tools emit.
    pub fn write<W: Write>(&self, writer: W) -> WriteResult<()> {
        let mut encoder = GzEncoder::new(writer, Compression::default());
        encoder.write_all(&self.to_bytes())?;
        encoder.finish()?;
        Ok(())
    }

    /// Consume the builder and return the wire-level profile.
    pub fn into_inner(self) -> proto::Profile {
        self.profile
    }

    fn intern(&mut self, s: &str) -> i64 {
        if let Some(&idx) = self.strings.get(s) {
            return idx;
        }
        let idx = self.profile.string_table.len() as i64;
        self.profile.string_table.push(s.to_string());
        self.strings.insert(s.to_string(), idx);
        idx
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn cpu_builder() -> ProfileBuilder {
        let mut builder = ProfileBuilder::new(&[("samples", "count"), ("cpu", "nanoseconds")]);
        builder.set_duration_nanos(5_000_000_000);
        builder
    }

    #[test]
    fn parse_sample_types() {
        let builder = cpu_builder();
        let profile = Profile::from_bytes(&builder.to_bytes()).unwrap();

        assert_eq!(profile.sample_types.len(), 2);
        assert_eq!(profile.sample_types[0].kind, "samples");
        assert_eq!(profile.sample_types[0].unit, "count");
        assert_eq!(profile.sample_types[1].kind, "cpu");
        assert_eq!(profile.sample_types[1].unit, "nanoseconds");
        assert_eq!(profile.duration_nanos, 5_000_000_000);
        assert_eq!(profile.sample_type_index("cpu"), Some(1));
        assert_eq!(profile.sample_type_index("alloc_space"), None);
    }

    #[test]
    fn parse_gzip_input() {
        let mut builder = cpu_builder();
        builder.add_stack(&["main.work", "main.main"], &[1, 10_000_000]);

        let mut gz = Vec::new();
        builder.write(&mut gz).unwrap();
        assert_eq!(&gz[..2], &GZIP_MAGIC);

        let profile = Profile::parse(Cursor::new(gz)).unwrap();
        assert_eq!(profile.samples.len(), 1);
        assert_eq!(profile.total(1), 10_000_000);
    }

    #[test]
    fn frames_are_leaf_first() {
        let mut builder = cpu_builder();
        builder.add_stack(&["main.work", "main.loop", "main.main"], &[1, 100]);
        let profile = Profile::from_bytes(&builder.to_bytes()).unwrap();

        let names: Vec<&str> = profile.samples[0]
            .frames
            .iter()
            .map(|f| f.innermost().unwrap().function.name.as_str())
            .collect();
        assert_eq!(names, vec!["main.work", "main.loop", "main.main"]);
    }

    #[test]
    fn inlined_lines_are_innermost_first() {
        let mut builder = cpu_builder();
        let inlined = builder.add_function("strings.Index", "/go/strings.go", 100);
        let caller = builder.add_function("main.parse", "/src/parse.go", 10);
        let loc = builder.add_location(&[(inlined, 105), (caller, 14)]);
        builder.add_sample(&[loc], &[1, 50]);

        let profile = Profile::from_bytes(&builder.to_bytes()).unwrap();
        let frame = &profile.samples[0].frames[0];

        assert_eq!(frame.functions.len(), 2);
        assert_eq!(frame.functions[0].function.name, "strings.Index");
        assert_eq!(frame.functions[0].line, 105);
        assert_eq!(frame.functions[1].function.name, "main.parse");
        assert_eq!(frame.functions[1].function.filename, "/src/parse.go");
        assert_eq!(frame.functions[1].function.start_line, 10);
    }

    #[test]
    fn dangling_location_is_skipped() {
        let mut builder = cpu_builder();
        let f = builder.add_function("main.main", "main.go", 1);
        let loc = builder.add_location(&[(f, 3)]);
        builder.add_sample(&[999, loc], &[1, 10]);

        let profile = Profile::from_bytes(&builder.to_bytes()).unwrap();
        assert_eq!(profile.samples[0].frames.len(), 1);
        assert_eq!(
            profile.samples[0].frames[0].functions[0].function.name,
            "main.main"
        );
    }

    #[test]
    fn unknown_function_line_is_skipped() {
        let mut builder = cpu_builder();
        let f = builder.add_function("main.main", "main.go", 1);
        let partial = builder.add_location(&[(42, 7), (f, 3)]);
        let empty = builder.add_location(&[(43, 7)]);
        builder.add_sample(&[empty, partial], &[1, 10]);

        let profile = Profile::from_bytes(&builder.to_bytes()).unwrap();
        let frames = &profile.samples[0].frames;
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].functions.len(), 1);
        assert_eq!(frames[0].functions[0].function.name, "main.main");
    }

    #[test]
    fn short_value_vector_reads_zero() {
        let mut builder = cpu_builder();
        builder.add_stack(&["main.main"], &[3]);
        let profile = Profile::from_bytes(&builder.to_bytes()).unwrap();

        assert_eq!(profile.samples[0].value(0), 3);
        assert_eq!(profile.samples[0].value(1), 0);
    }

    #[test]
    fn empty_input_fails() {
        let result = Profile::parse(Cursor::new(Vec::<u8>::new()));
        assert!(matches!(result, Err(ParseError::Empty)));
    }

    #[test]
    fn garbage_input_fails() {
        let result = Profile::from_bytes(&[0xff, 0xff, 0xff, 0xff]);
        assert!(matches!(result, Err(ParseError::Decode(_))));
    }

    #[test]
    fn truncated_gzip_fails() {
        let mut builder = cpu_builder();
        builder.add_stack(&["main.main"], &[1, 10]);
        let mut gz = Vec::new();
        builder.write(&mut gz).unwrap();
        gz.truncate(gz.len() / 2);

        assert!(Profile::from_bytes(&gz).is_err());
    }

    #[test]
    fn builder_interns_functions() {
        let mut builder = cpu_builder();
        let a = builder.add_function("main.a", "main.go", 1);
        let b = builder.add_function("main.b", "main.go", 5);
        let a_again = builder.add_function("main.a", "main.go", 1);

        assert_eq!(a, a_again);
        assert_ne!(a, b);
        assert_eq!(builder.build().function.len(), 2);
    }

    #[test]
    fn out_of_range_string_index_resolves_empty() {
        let mut raw = cpu_builder().into_inner();
        raw.function.push(proto::Function {
            id: 7,
            name: 999,
            ..Default::default()
        });
        let profile = Profile::from_raw(raw);

        assert_eq!(profile.functions[&7].name, "");
    }

    #[test]
    fn default_sample_type_resolves() {
        let mut builder = cpu_builder();
        builder.set_default_sample_type("cpu");
        let profile = Profile::from_bytes(&builder.to_bytes()).unwrap();

        assert_eq!(profile.default_sample_type.as_deref(), Some("cpu"));
    }
}
