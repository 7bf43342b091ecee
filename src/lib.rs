//! tierguard - hierarchical validation pipeline
//!
//! Operations are validated against ordered layers of rules, from the most
//! fundamental to the most specific. A rejection names the layer, the
//! validator and every layer consulted before it. Each evaluation leaves
//! one audit record.

pub mod audit;
pub mod cli;
pub mod config;
pub mod observability;
pub mod pipeline;
