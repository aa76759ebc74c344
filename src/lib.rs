//! streamfield - structured content blocks
//!
//! Composite schema nodes for block-based page content: typed leaf blocks,
//! struct blocks that compose them, and the value pipeline between storage,
//! submitted forms, validation and rendering.

pub mod block;
pub mod config;
pub mod observability;
pub mod validators;
