//! Struct block: a fixed, ordered collection of named child blocks
//!
//! Compare to a list block (a collection of similar blocks) and a stream (a
//! free-form sequence of dissimilar blocks).
//!
//! # Value pipeline
//!
//! - `default_value`: configured default, read literally (never converted)
//! - `to_native`: storage map -> `StructValue`, missing children get their default
//! - `value_from_data`: submitted form data -> `StructValue`
//! - `clean`: validates every child, failures aggregated into one error
//! - `to_storage`: `StructValue` -> plain JSON object in registry order
//! - `searchable_content`: flat text fragments in registry order

use indexmap::IndexMap;
use serde_json::{Map, Value};
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use super::base::{
    attach_names, check_name, validate_name, Block, BlockName, BlockOptions, CheckMessage, Deconstruction, Media,
    RenderContext,
};
use super::declared::{ChildBlock, DeclaredBlocks};
use super::errors::{BlockError, BlockResult, ErrorParams, ValidationError, ValidationResult};
use super::render::css_class_attr;
use super::struct_value::StructValue;
use super::value::{NativeValue, SubmittedData};
use crate::observability::{log_event_with_fields, Event};

/// Canonical constructor path reported by `deconstruct`
pub const STRUCT_BLOCK_PATH: &str = "streamfield.blocks.StructBlock";

/// Logical name of the client-side script for struct blocks
pub const STRUCT_BLOCK_JS: &str = "streamfield/js/blocks/struct.js";

struct StructBlockInner {
    name: BlockName,
    options: BlockOptions,
    children: IndexMap<String, Arc<dyn Block>>,
    child_js_initializers: IndexMap<String, String>,
}

/// Composite block. Cheap to clone: clones share one immutable definition.
#[derive(Clone)]
pub struct StructBlock {
    inner: Arc<StructBlockInner>,
}

impl StructBlock {
    /// Builds a struct block from local children only
    pub fn new<I, S>(local_blocks: I, options: BlockOptions) -> BlockResult<Self>
    where
        I: IntoIterator<Item = (S, ChildBlock)>,
        S: Into<String>,
    {
        Self::with_base(&DeclaredBlocks::empty(), local_blocks, options)
    }

    /// Builds a struct block from a declared base plus local children.
    ///
    /// Local children overwrite base children of the same name in place;
    /// new names are appended in the order supplied. The base is copied,
    /// never mutated.
    pub fn with_base<I, S>(base: &DeclaredBlocks, local_blocks: I, options: BlockOptions) -> BlockResult<Self>
    where
        I: IntoIterator<Item = (S, ChildBlock)>,
        S: Into<String>,
    {
        let mut supplied = HashSet::new();
        let mut local = Vec::new();

        for (name, child) in local_blocks {
            let name = name.into();
            validate_name(&name)?;
            if !supplied.insert(name.clone()) {
                return Err(BlockError::duplicate_name(name));
            }
            local.push((name, child.instantiate()));
        }

        let mut children = base.snapshot();
        for (name, block) in &local {
            children.insert(name.clone(), Arc::clone(block));
        }

        validate_default(&options, &children)?;
        attach_names(&local)?;

        let child_js_initializers = children
            .iter()
            .filter_map(|(name, block)| block.js_initializer().map(|js| (name.clone(), js)))
            .collect();

        let count = children.len().to_string();
        log_event_with_fields(Event::RegistryBuilt, &[("children", count.as_str())]);

        Ok(Self {
            inner: Arc::new(StructBlockInner {
                name: BlockName::new(),
                options,
                children,
                child_js_initializers,
            }),
        })
    }

    pub fn child_blocks(&self) -> &IndexMap<String, Arc<dyn Block>> {
        &self.inner.children
    }

    pub fn child(&self, name: &str) -> Option<&Arc<dyn Block>> {
        self.inner.children.get(name)
    }

    pub fn child_names(&self) -> impl Iterator<Item = &str> {
        self.inner.children.keys().map(String::as_str)
    }

    /// Initializers of the children that declare one
    pub fn child_js_initializers(&self) -> &IndexMap<String, String> {
        &self.inner.child_js_initializers
    }

    /// True if both handles share one definition
    pub fn ptr_eq(&self, other: &StructBlock) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// The configured default as a `StructValue`.
    ///
    /// Configured entries are already native and are used as-is; children
    /// without one take their own default, also unconverted.
    pub fn default_struct(&self) -> StructValue {
        let configured = self.inner.options.default.as_ref().and_then(Value::as_object);
        self.literal_struct(configured)
    }

    fn literal_struct(&self, configured: Option<&Map<String, Value>>) -> StructValue {
        let entries = self
            .inner
            .children
            .iter()
            .map(|(name, child)| {
                let value = match configured.and_then(|m| m.get(name)) {
                    Some(literal) => literal_native(child, literal),
                    None => child.default_value(),
                };
                (name.clone(), value)
            })
            .collect();
        StructValue::from_entries(self.clone(), entries)
    }

    /// Converts a stored mapping into a fully populated `StructValue`.
    ///
    /// Unknown keys are dropped. A missing child takes its default, which is
    /// not passed through the child's `to_native`.
    pub fn to_struct(&self, raw: &Value) -> StructValue {
        let raw = raw.as_object();
        let entries = self
            .inner
            .children
            .iter()
            .map(|(name, child)| {
                let value = match raw.and_then(|m| m.get(name)) {
                    Some(v) => child.to_native(v),
                    None => child.default_value(),
                };
                (name.clone(), value)
            })
            .collect();
        StructValue::from_entries(self.clone(), entries)
    }

    pub fn struct_from_data(&self, data: &SubmittedData, prefix: &str) -> StructValue {
        let entries = self
            .inner
            .children
            .iter()
            .map(|(name, child)| {
                let child_prefix = child_prefix(prefix, name);
                (name.clone(), child.value_from_data(data, &child_prefix))
            })
            .collect();
        StructValue::from_entries(self.clone(), entries)
    }

    /// Cleans every entry of `value`.
    ///
    /// Does not stop at the first failing child: every child is cleaned and
    /// all failures are returned in one aggregate error keyed by child name.
    pub fn clean_struct(&self, value: &StructValue) -> ValidationResult<StructValue> {
        let mut cleaned = IndexMap::new();
        let mut errors = ErrorParams::new();

        for (name, val) in value.iter() {
            let Some(child) = self.child(name) else {
                continue;
            };
            match child.clean(val) {
                Ok(v) => {
                    cleaned.insert(name.to_string(), v);
                }
                Err(e) => {
                    errors.insert(name.to_string(), vec![e]);
                }
            }
        }

        if !errors.is_empty() {
            let names: Vec<&str> = errors.keys().map(String::as_str).collect();
            let names = names.join(",");
            log_event_with_fields(Event::StructCleanFailed, &[("children", names.as_str())]);
            return Err(ValidationError::aggregate(errors));
        }

        Ok(StructValue::from_entries(self.clone(), cleaned))
    }

    /// Plain JSON object of the entries present in `value`, in registry order
    pub fn storage_for(&self, value: &StructValue) -> Value {
        let mut map = Map::new();
        for (name, child) in &self.inner.children {
            if let Some(v) = value.get(name) {
                map.insert(name.clone(), child.to_storage(v));
            }
        }
        Value::Object(map)
    }

    pub fn searchable_content_for(&self, value: Option<&StructValue>) -> Vec<String> {
        let mut content = Vec::new();
        for (name, child) in &self.inner.children {
            match value.and_then(|v| v.get(name)) {
                Some(v) => content.extend(child.searchable_content(v)),
                None => content.extend(child.searchable_content(&child.default_value())),
            }
        }
        content
    }

    /// Renders every child in registry order inside one `<div>`
    pub fn render_value(&self, value: &StructValue, context: Option<&RenderContext>) -> String {
        let parts: Vec<String> = self
            .inner
            .children
            .iter()
            .map(|(name, child)| {
                let default;
                let v = match value.get(name) {
                    Some(v) => v,
                    None => {
                        default = child.default_value();
                        &default
                    }
                };
                child.render(v, context)
            })
            .collect();
        format!(
            "<div{}>{}</div>",
            css_class_attr(self.inner.options.classname.as_deref()),
            parts.join("\n")
        )
    }
}

impl Block for StructBlock {
    fn block_name(&self) -> &BlockName {
        &self.inner.name
    }

    fn options(&self) -> &BlockOptions {
        &self.inner.options
    }

    fn default_value(&self) -> NativeValue {
        NativeValue::Struct(self.default_struct())
    }

    fn to_native(&self, raw: &Value) -> NativeValue {
        NativeValue::Struct(self.to_struct(raw))
    }

    fn clean(&self, value: &NativeValue) -> ValidationResult<NativeValue> {
        match value {
            NativeValue::Struct(v) => self.clean_struct(v).map(NativeValue::Struct),
            NativeValue::Null => self.clean_struct(&self.default_struct()).map(NativeValue::Struct),
            other => Err(ValidationError::new(format!("Expected a struct value, got '{}'", other))),
        }
    }

    fn value_from_data(&self, data: &SubmittedData, prefix: &str) -> NativeValue {
        NativeValue::Struct(self.struct_from_data(data, prefix))
    }

    /// Omitted only if every child is omitted
    fn value_omitted_from_data(&self, data: &SubmittedData, prefix: &str) -> bool {
        self.inner
            .children
            .iter()
            .all(|(name, child)| child.value_omitted_from_data(data, &child_prefix(prefix, name)))
    }

    fn to_storage(&self, value: &NativeValue) -> Value {
        match value {
            NativeValue::Struct(v) => self.storage_for(v),
            other => other.to_storage(),
        }
    }

    fn searchable_content(&self, value: &NativeValue) -> Vec<String> {
        self.searchable_content_for(value.as_struct())
    }

    fn js_initializer(&self) -> Option<String> {
        if self.inner.child_js_initializers.is_empty() {
            return None;
        }
        Some(format!("StructBlock({})", js_dict(&self.inner.child_js_initializers)))
    }

    fn media(&self) -> Media {
        let mut media = Media::js([STRUCT_BLOCK_JS]);
        for child in self.inner.children.values() {
            media.merge(&child.media());
        }
        media
    }

    fn render(&self, value: &NativeValue, context: Option<&RenderContext>) -> String {
        match value {
            NativeValue::Struct(v) => self.render_value(v, context),
            _ => self.render_value(&self.default_struct(), context),
        }
    }

    /// Always the generic struct form with the full child list, whatever
    /// declaration produced this block
    fn deconstruct(&self) -> Deconstruction {
        Deconstruction {
            path: STRUCT_BLOCK_PATH,
            children: self
                .inner
                .children
                .iter()
                .map(|(name, block)| (name.clone(), Arc::clone(block)))
                .collect(),
            options: serde_json::to_value(&self.inner.options).unwrap_or(Value::Null),
        }
    }

    fn check(&self) -> Vec<CheckMessage> {
        let mut messages = Vec::new();
        for (name, child) in &self.inner.children {
            messages.extend(child.check());
            messages.extend(check_name(name));
        }
        messages
    }

    fn as_struct(&self) -> Option<&StructBlock> {
        Some(self)
    }
}

impl fmt::Debug for StructBlock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StructBlock")
            .field("name", &self.inner.name.get())
            .field("children", &self.inner.children.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// `{prefix}-{name}`
pub fn child_prefix(prefix: &str, name: &str) -> String {
    format!("{}-{}", prefix, name)
}

/// A configured default read literally. Nested struct children take an
/// object literal the same way, still without conversion.
fn literal_native(child: &Arc<dyn Block>, literal: &Value) -> NativeValue {
    match (child.as_struct(), literal.as_object()) {
        (Some(nested), Some(map)) => NativeValue::Struct(nested.literal_struct(Some(map))),
        _ => NativeValue::from_storage(literal),
    }
}

fn validate_default(options: &BlockOptions, children: &IndexMap<String, Arc<dyn Block>>) -> BlockResult<()> {
    let Some(default) = &options.default else {
        return Ok(());
    };
    let map = default
        .as_object()
        .ok_or_else(|| BlockError::malformed_declaration("default", "struct default must be an object"))?;
    for key in map.keys() {
        if !children.contains_key(key) {
            log_event_with_fields(Event::DefaultKeyRejected, &[("child", key.as_str())]);
            return Err(BlockError::unknown_default_key(key.as_str()));
        }
    }
    Ok(())
}

/// `{"name":init,...}` with JSON-quoted keys and raw initializer expressions
fn js_dict(entries: &IndexMap<String, String>) -> String {
    let parts: Vec<String> = entries
        .iter()
        .map(|(k, v)| format!("{}:{}", Value::String(k.clone()), v))
        .collect();
    format!("{{{}}}", parts.join(","))
}
