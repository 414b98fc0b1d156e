//! Explore Go pprof profiles from the terminal.
//!
//! A profile is decoded with [`pprof_parse`] and turned into one
//! [`ProfileView`] per sample type: a call graph of functions with flat and
//! cumulative costs and weighted caller/callee edges. On top of that the
//! crate provides:
//!
//! - [`diff`] - compare two profiles function by function
//! - [`flame`], [`layout`] and [`navigate`] - flame graphs laid out in
//!   terminal cells, with zoom and keyboard/pointer navigation
//! - [`describe`] and [`explain`] - plain-language descriptions of costs
//! - [`live`] - poll a `net/http/pprof` endpoint in the background
//! - [`session`] - the state an interactive front end drives
//!
//! # Example
//!
//! ```no_run
//! use pproftui::{graph, palette::Palette, render};
//! use std::fs::File;
//!
//! let data = graph::load(File::open("cpu.pb.gz").unwrap(), None).unwrap();
//! let view = &data.views[data.default_view()];
//! let nodes: Vec<_> = view.nodes.iter().collect();
//! print!("{}", render::render_top(view, &nodes, &Palette::default()));
//! ```

pub mod config;
pub mod describe;
pub mod diff;
pub mod error;
pub mod explain;
pub mod flame;
pub mod format;
pub mod graph;
pub mod layout;
pub mod live;
pub mod model;
pub mod navigate;
pub mod palette;
pub mod project;
pub mod render;
pub mod report;
pub mod session;
pub mod source;

pub use error::{Error, Result};
pub use model::{FuncNode, FunctionKey, NodeId, ProfileData, ProfileView};
pub use pprof_parse;
pub use project::ProjectFilter;
pub use session::Session;
