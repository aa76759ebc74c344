//! The `Block` capability and the pieces every block shares
//!
//! A block is one schema unit. It knows how to produce a default, convert
//! stored data to a native value, clean a native value, pull its value out of
//! submitted form data and serialize back to storage form.

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::{Arc, LazyLock, OnceLock};

use super::errors::{BlockError, BlockResult, ErrorList, ValidationResult};
use super::render::escape_html;
use super::struct_block::StructBlock;
use super::value::{NativeValue, SubmittedData};

static IDENTIFIER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("identifier pattern is valid"));

/// Context handed through to rendering
pub type RenderContext = BTreeMap<String, String>;

/// Set-once block identity.
///
/// Populated by the first registry that claims the block. Attaching the same
/// name again is a no-op, attaching a different one fails.
#[derive(Debug, Default)]
pub struct BlockName(OnceLock<String>);

impl BlockName {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self) -> Option<&str> {
        self.0.get().map(String::as_str)
    }

    pub fn attach(&self, name: &str) -> BlockResult<()> {
        let stored = self.0.get_or_init(|| name.to_string());
        if stored == name {
            Ok(())
        } else {
            Err(BlockError::name_conflict(stored.as_str(), name))
        }
    }
}

/// Options shared by every block, as passed to its constructor
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BlockOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub help_text: Option<String>,

    /// `None` means the block's own default applies (required for most blocks)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub required: Option<bool>,

    /// CSS class used when rendering
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub classname: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub form_template: Option<String>,

    /// Configured default, already in native shape. Never passed through
    /// `to_native`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
}

impl BlockOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn help_text(mut self, help_text: impl Into<String>) -> Self {
        self.help_text = Some(help_text.into());
        self
    }

    pub fn required(mut self, required: bool) -> Self {
        self.required = Some(required);
        self
    }

    pub fn classname(mut self, classname: impl Into<String>) -> Self {
        self.classname = Some(classname.into());
        self
    }

    pub fn form_template(mut self, form_template: impl Into<String>) -> Self {
        self.form_template = Some(form_template.into());
        self
    }

    pub fn with_default(mut self, default: impl Into<Value>) -> Self {
        self.default = Some(default.into());
        self
    }

    /// Required unless explicitly disabled
    pub fn is_required(&self) -> bool {
        self.required.unwrap_or(true)
    }

    /// The configured default read literally as a native value
    pub fn literal_default(&self) -> NativeValue {
        self.default
            .as_ref()
            .map_or(NativeValue::Null, NativeValue::from_storage)
    }
}

/// Static assets a block needs on the client, by logical name
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Media {
    pub js: Vec<String>,
    pub css: Vec<String>,
}

impl Media {
    pub fn js<I, S>(paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            js: paths.into_iter().map(Into::into).collect(),
            css: Vec::new(),
        }
    }

    /// Appends assets not already present, keeping first-seen order
    pub fn merge(&mut self, other: &Media) {
        for path in &other.js {
            if !self.js.contains(path) {
                self.js.push(path.clone());
            }
        }
        for path in &other.css {
            if !self.css.contains(path) {
                self.css.push(path.clone());
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.js.is_empty() && self.css.is_empty()
    }

    pub fn resolve_js(&self, resolver: &dyn AssetResolver) -> Vec<String> {
        self.js.iter().map(|p| resolver.resolve(p)).collect()
    }

    pub fn resolve_css(&self, resolver: &dyn AssetResolver) -> Vec<String> {
        self.css.iter().map(|p| resolver.resolve(p)).collect()
    }
}

/// Maps a logical asset name to a servable path
pub trait AssetResolver {
    fn resolve(&self, logical_name: &str) -> String;
}

/// Result of a system check on a block definition
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckMessage {
    pub id: &'static str,
    pub message: String,
    pub hint: Option<String>,
}

impl CheckMessage {
    pub fn new(id: &'static str, message: impl Into<String>) -> Self {
        Self {
            id,
            message: message.into(),
            hint: None,
        }
    }

    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}

impl fmt::Display for CheckMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.id, self.message)?;
        if let Some(hint) = &self.hint {
            write!(f, " (HINT: {})", hint)?;
        }
        Ok(())
    }
}

/// Checks a child block name
pub fn check_name(name: &str) -> Vec<CheckMessage> {
    let hint = "Block names should follow standard Python conventions for variable names: \
                alphanumeric and underscores, and cannot begin with a digit";
    let mut messages = Vec::new();

    if name.is_empty() {
        messages.push(CheckMessage::new("streamfield.E001", "Block name cannot be empty").with_hint(hint));
        return messages;
    }
    if name.contains(' ') {
        messages.push(
            CheckMessage::new("streamfield.E001", format!("Block name {:?} cannot contain spaces", name))
                .with_hint(hint),
        );
    }
    if name.contains('-') {
        messages.push(
            CheckMessage::new("streamfield.E001", format!("Block name {:?} cannot contain dashes", name))
                .with_hint(hint),
        );
    }
    if name.starts_with(|c: char| c.is_ascii_digit()) {
        messages.push(
            CheckMessage::new("streamfield.E001", format!("Block name {:?} cannot begin with a digit", name))
                .with_hint(hint),
        );
    }
    if messages.is_empty() && !IDENTIFIER.is_match(name) {
        messages.push(
            CheckMessage::new("streamfield.E001", format!("Block name {:?} is not a valid identifier", name))
                .with_hint(hint),
        );
    }

    messages
}

/// Fails with a construction error if `name` does not pass `check_name`
pub fn validate_name(name: &str) -> BlockResult<()> {
    match check_name(name).into_iter().next() {
        Some(msg) => Err(BlockError::invalid_name(name, msg.message)),
        None => Ok(()),
    }
}

/// Names every block, or none of them.
///
/// All conflicts are found before the first name is attached, so a failed
/// construction never leaves a shared block named.
pub(crate) fn attach_names(blocks: &[(String, Arc<dyn Block>)]) -> BlockResult<()> {
    let mut claimed: HashMap<*const (), &str> = HashMap::new();
    for (name, block) in blocks {
        if let Some(existing) = block.name() {
            if existing != name.as_str() {
                return Err(BlockError::name_conflict(existing, name.as_str()));
            }
        }
        // the same instance listed twice under different names
        let key = Arc::as_ptr(block) as *const ();
        if let Some(previous) = claimed.insert(key, name.as_str()) {
            if previous != name.as_str() {
                return Err(BlockError::name_conflict(previous, name.as_str()));
            }
        }
    }
    for (name, block) in blocks {
        block.set_name(name)?;
    }
    Ok(())
}

/// "first_name" -> "First name"
pub fn label_from_name(name: &str) -> String {
    let spaced = name.replace('_', " ");
    let mut chars = spaced.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Structural description of a block: its canonical constructor path, child
/// list and constructor options
#[derive(Debug, Clone)]
pub struct Deconstruction {
    pub path: &'static str,
    pub children: Vec<(String, Arc<dyn Block>)>,
    pub options: Value,
}

/// A block paired with a value, ready to render
#[derive(Debug, Clone)]
pub struct BoundBlock {
    pub block: Arc<dyn Block>,
    pub value: NativeValue,
    pub prefix: Option<String>,
    pub errors: ErrorList,
}

impl BoundBlock {
    pub fn new(block: Arc<dyn Block>, value: NativeValue) -> Self {
        Self {
            block,
            value,
            prefix: None,
            errors: ErrorList::new(),
        }
    }

    pub fn render(&self, context: Option<&RenderContext>) -> String {
        self.block.render(&self.value, context)
    }

    pub fn display_value(&self) -> String {
        self.block.display_value(&self.value)
    }
}

/// The capability every schema unit implements
pub trait Block: fmt::Debug + Send + Sync {
    /// Identity slot, filled once by the owning registry
    fn block_name(&self) -> &BlockName;

    fn options(&self) -> &BlockOptions;

    /// Native value used when none is supplied
    fn default_value(&self) -> NativeValue {
        self.options().literal_default()
    }

    /// Converts a stored value into native form
    fn to_native(&self, raw: &Value) -> NativeValue {
        NativeValue::from_storage(raw)
    }

    /// Validates and normalizes a native value
    fn clean(&self, value: &NativeValue) -> ValidationResult<NativeValue>;

    /// Pulls this block's value out of submitted data
    fn value_from_data(&self, data: &SubmittedData, prefix: &str) -> NativeValue {
        data.get(prefix).map_or(NativeValue::Null, NativeValue::from)
    }

    fn value_omitted_from_data(&self, data: &SubmittedData, prefix: &str) -> bool {
        !data.contains_key(prefix)
    }

    /// Serializes a native value to storage form
    fn to_storage(&self, value: &NativeValue) -> Value {
        value.to_storage()
    }

    /// Text fragments to index
    fn searchable_content(&self, _value: &NativeValue) -> Vec<String> {
        Vec::new()
    }

    /// Human-readable form of a value
    fn display_value(&self, value: &NativeValue) -> String {
        value.to_string()
    }

    /// Client-side initialization expression, if the block needs one
    fn js_initializer(&self) -> Option<String> {
        None
    }

    fn media(&self) -> Media {
        Media::default()
    }

    fn render(&self, value: &NativeValue, _context: Option<&RenderContext>) -> String {
        escape_html(&value.to_string())
    }

    fn deconstruct(&self) -> Deconstruction;

    /// Definition problems, reported rather than raised
    fn check(&self) -> Vec<CheckMessage> {
        Vec::new()
    }

    fn as_struct(&self) -> Option<&StructBlock> {
        None
    }

    fn name(&self) -> Option<&str> {
        self.block_name().get()
    }

    fn set_name(&self, name: &str) -> BlockResult<()> {
        self.block_name().attach(name)
    }

    fn block_label(&self) -> String {
        match (&self.options().label, self.name()) {
            (Some(label), _) => label.clone(),
            (None, Some(name)) => label_from_name(name),
            (None, None) => String::new(),
        }
    }
}
