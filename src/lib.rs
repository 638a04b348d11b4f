//! Flowchart editing core: a line-oriented Mermaid-subset parser, a layered
//! layout engine and an interactive editor over a single in-memory graph.

pub mod config;
pub mod error;
pub mod export;
pub mod flowchart;
pub mod theme;

pub use config::Config;
pub use error::{Error, Result};
