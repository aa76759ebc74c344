//! Native value of a struct block
//!
//! An ordered name -> value mapping that keeps a handle on the block that
//! produced it, so it can be rendered and introspected on its own.

use indexmap::IndexMap;
use serde_json::Value;
use std::fmt;
use std::sync::OnceLock;

use super::base::{BoundBlock, RenderContext};
use super::struct_block::StructBlock;
use super::value::NativeValue;

#[derive(Clone)]
pub struct StructValue {
    block: StructBlock,
    entries: IndexMap<String, NativeValue>,
    bound: OnceLock<IndexMap<String, BoundBlock>>,
}

impl StructValue {
    /// Builds a value for `block`.
    ///
    /// Keys that are not children of `block` are dropped.
    pub fn new<I, S>(block: &StructBlock, entries: I) -> Self
    where
        I: IntoIterator<Item = (S, NativeValue)>,
        S: Into<String>,
    {
        let entries = entries
            .into_iter()
            .map(|(name, value)| (name.into(), value))
            .filter(|(name, _)| block.child(name).is_some())
            .collect();
        Self::from_entries(block.clone(), entries)
    }

    /// Caller guarantees every key is a child of `block`
    pub(crate) fn from_entries(block: StructBlock, entries: IndexMap<String, NativeValue>) -> Self {
        Self {
            block,
            entries,
            bound: OnceLock::new(),
        }
    }

    /// The block that produced this value
    pub fn block(&self) -> &StructBlock {
        &self.block
    }

    pub fn get(&self, name: &str) -> Option<&NativeValue> {
        self.entries.get(name)
    }

    pub fn contains_key(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &NativeValue)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn entries(&self) -> &IndexMap<String, NativeValue> {
        &self.entries
    }

    pub fn into_entries(self) -> IndexMap<String, NativeValue> {
        self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Every child of the owning block paired with its current value, in
    /// registry order. Computed on first access; recomputation yields the same
    /// map, so concurrent first access is harmless.
    pub fn bound_blocks(&self) -> &IndexMap<String, BoundBlock> {
        self.bound.get_or_init(|| {
            self.block
                .child_blocks()
                .iter()
                .map(|(name, child)| {
                    let value = self.entries.get(name).cloned().unwrap_or(NativeValue::Null);
                    (name.clone(), BoundBlock::new(child.clone(), value))
                })
                .collect()
        })
    }

    /// Human-readable value of one child, e.g. a choice label.
    ///
    /// Returns `None` if `name` is not a child of the owning block.
    pub fn display_value_for(&self, name: &str) -> Option<String> {
        let child = self.block.child(name)?;
        let value = self.entries.get(name).unwrap_or(&NativeValue::Null);
        Some(child.display_value(value))
    }

    pub fn render_as_block(&self, context: Option<&RenderContext>) -> String {
        self.block.render_value(self, context)
    }

    pub fn to_storage(&self) -> Value {
        self.block.storage_for(self)
    }
}

/// Entry-by-entry comparison; the owning block is not compared
impl PartialEq for StructValue {
    fn eq(&self, other: &Self) -> bool {
        self.entries == other.entries
    }
}

impl fmt::Debug for StructValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.entries.iter()).finish()
    }
}

impl fmt::Display for StructValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .entries
            .iter()
            .map(|(name, value)| format!("{}: {}", name, value))
            .collect();
        write!(f, "{{{}}}", parts.join(", "))
    }
}
