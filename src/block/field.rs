//! Leaf blocks wrapping a single form field
//!
//! Each block keeps its constructor options in a serializable struct so that
//! `deconstruct` can report them and the loader can rebuild the block.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::base::{Block, BlockName, BlockOptions, CheckMessage, Deconstruction};
use super::errors::{ValidationError, ValidationResult};
use super::value::{NativeValue, SubmittedData};
use crate::validators::RelUrlValidator;

pub const CHAR_BLOCK_PATH: &str = "streamfield.blocks.CharBlock";
pub const INTEGER_BLOCK_PATH: &str = "streamfield.blocks.IntegerBlock";
pub const FLOAT_BLOCK_PATH: &str = "streamfield.blocks.FloatBlock";
pub const BOOLEAN_BLOCK_PATH: &str = "streamfield.blocks.BooleanBlock";
pub const CHOICE_BLOCK_PATH: &str = "streamfield.blocks.ChoiceBlock";
pub const URL_BLOCK_PATH: &str = "streamfield.blocks.URLBlock";

/// Builder methods for the options every leaf block shares
macro_rules! common_builders {
    ($block:ty) => {
        impl $block {
            pub fn label(mut self, label: impl Into<String>) -> Self {
                self.options.common.label = Some(label.into());
                self
            }

            pub fn help_text(mut self, help_text: impl Into<String>) -> Self {
                self.options.common.help_text = Some(help_text.into());
                self
            }

            pub fn required(mut self, required: bool) -> Self {
                self.options.common.required = Some(required);
                self
            }

            pub fn classname(mut self, classname: impl Into<String>) -> Self {
                self.options.common.classname = Some(classname.into());
                self
            }

            /// Native default, used as-is
            pub fn with_default(mut self, default: impl Into<Value>) -> Self {
                self.options.common.default = Some(default.into());
                self
            }
        }
    };
}

fn options_value<T: Serialize>(options: &T) -> Value {
    serde_json::to_value(options).unwrap_or(Value::Null)
}

/// Stored scalars read as text; null stays null
fn text_from_storage(raw: &Value) -> NativeValue {
    match raw {
        Value::Null => NativeValue::Null,
        Value::String(s) => NativeValue::Text(s.clone()),
        other => NativeValue::Text(other.to_string()),
    }
}

/// Trimmed text of a scalar value; `None` for null
fn trimmed_text(value: &NativeValue) -> Option<String> {
    match value {
        NativeValue::Null => None,
        NativeValue::Text(s) => Some(s.trim().to_string()),
        other => Some(other.to_string().trim().to_string()),
    }
}

fn check_lengths(text: &str, min: Option<usize>, max: Option<usize>) -> ValidationResult<()> {
    let len = text.chars().count();
    if let Some(max) = max {
        if len > max {
            return Err(ValidationError::with_code(
                format!("Ensure this value has at most {} characters (it has {}).", max, len),
                "max_length",
            ));
        }
    }
    if let Some(min) = min {
        if len < min {
            return Err(ValidationError::with_code(
                format!("Ensure this value has at least {} characters (it has {}).", min, len),
                "min_length",
            ));
        }
    }
    Ok(())
}

fn check_length_options(min: Option<usize>, max: Option<usize>) -> Vec<CheckMessage> {
    match (min, max) {
        (Some(min), Some(max)) if min > max => vec![CheckMessage::new(
            "streamfield.E002",
            format!("min_length ({}) is greater than max_length ({})", min, max),
        )],
        _ => Vec::new(),
    }
}

/// `f` as an `i64` if it is integral and in range
fn whole_number(f: f64) -> Option<i64> {
    let in_range = f >= i64::MIN as f64 && f < i64::MAX as f64;
    (f.is_finite() && f.fract() == 0.0 && in_range).then_some(f as i64)
}

/// Options for text blocks
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CharOptions {
    #[serde(flatten)]
    pub common: BlockOptions,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_length: Option<usize>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_length: Option<usize>,
}

/// Single line of text
#[derive(Debug, Default)]
pub struct CharBlock {
    name: BlockName,
    options: CharOptions,
}

impl CharBlock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_options(options: CharOptions) -> Self {
        Self {
            name: BlockName::new(),
            options,
        }
    }

    pub fn max_length(mut self, max_length: usize) -> Self {
        self.options.max_length = Some(max_length);
        self
    }

    pub fn min_length(mut self, min_length: usize) -> Self {
        self.options.min_length = Some(min_length);
        self
    }
}

common_builders!(CharBlock);

impl Block for CharBlock {
    fn block_name(&self) -> &BlockName {
        &self.name
    }

    fn options(&self) -> &BlockOptions {
        &self.options.common
    }

    fn to_native(&self, raw: &Value) -> NativeValue {
        text_from_storage(raw)
    }

    fn clean(&self, value: &NativeValue) -> ValidationResult<NativeValue> {
        let text = trimmed_text(value).unwrap_or_default();
        if text.is_empty() {
            if self.options.common.is_required() {
                return Err(ValidationError::required());
            }
            return Ok(NativeValue::Text(text));
        }
        check_lengths(&text, self.options.min_length, self.options.max_length)?;
        Ok(NativeValue::Text(text))
    }

    fn searchable_content(&self, value: &NativeValue) -> Vec<String> {
        match value {
            NativeValue::Null => Vec::new(),
            NativeValue::Text(s) if s.is_empty() => Vec::new(),
            other => vec![other.to_string()],
        }
    }

    fn deconstruct(&self) -> Deconstruction {
        Deconstruction {
            path: CHAR_BLOCK_PATH,
            children: Vec::new(),
            options: options_value(&self.options),
        }
    }

    fn check(&self) -> Vec<CheckMessage> {
        check_length_options(self.options.min_length, self.options.max_length)
    }
}

/// Options for integer blocks
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IntegerOptions {
    #[serde(flatten)]
    pub common: BlockOptions,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_value: Option<i64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_value: Option<i64>,
}

/// Whole number
#[derive(Debug, Default)]
pub struct IntegerBlock {
    name: BlockName,
    options: IntegerOptions,
}

impl IntegerBlock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_options(options: IntegerOptions) -> Self {
        Self {
            name: BlockName::new(),
            options,
        }
    }

    pub fn min_value(mut self, min_value: i64) -> Self {
        self.options.min_value = Some(min_value);
        self
    }

    pub fn max_value(mut self, max_value: i64) -> Self {
        self.options.max_value = Some(max_value);
        self
    }

    fn parse(value: &NativeValue) -> ValidationResult<Option<i64>> {
        let invalid = || ValidationError::with_code("Enter a whole number.", "invalid");
        match value {
            NativeValue::Null => Ok(None),
            NativeValue::Int(n) => Ok(Some(*n)),
            NativeValue::Float(f) => whole_number(*f).map(Some).ok_or_else(invalid),
            NativeValue::Text(s) => {
                let s = s.trim();
                if s.is_empty() {
                    return Ok(None);
                }
                if let Ok(n) = s.parse::<i64>() {
                    return Ok(Some(n));
                }
                s.parse::<f64>()
                    .ok()
                    .and_then(whole_number)
                    .map(Some)
                    .ok_or_else(invalid)
            }
            _ => Err(invalid()),
        }
    }
}

common_builders!(IntegerBlock);

impl Block for IntegerBlock {
    fn block_name(&self) -> &BlockName {
        &self.name
    }

    fn options(&self) -> &BlockOptions {
        &self.options.common
    }

    /// Unparseable input is kept as-is so `clean` can reject it
    fn to_native(&self, raw: &Value) -> NativeValue {
        match raw {
            Value::Null => NativeValue::Null,
            Value::Number(n) => match n.as_i64() {
                Some(i) => NativeValue::Int(i),
                None => match n.as_f64() {
                    Some(f) => whole_number(f).map_or(NativeValue::Float(f), NativeValue::Int),
                    None => NativeValue::Text(n.to_string()),
                },
            },
            Value::String(s) => s
                .trim()
                .parse()
                .map_or_else(|_| NativeValue::Text(s.clone()), NativeValue::Int),
            other => NativeValue::Text(other.to_string()),
        }
    }

    fn clean(&self, value: &NativeValue) -> ValidationResult<NativeValue> {
        let Some(n) = Self::parse(value)? else {
            if self.options.common.is_required() {
                return Err(ValidationError::required());
            }
            return Ok(NativeValue::Null);
        };
        if let Some(max) = self.options.max_value {
            if n > max {
                return Err(ValidationError::with_code(
                    format!("Ensure this value is less than or equal to {}.", max),
                    "max_value",
                ));
            }
        }
        if let Some(min) = self.options.min_value {
            if n < min {
                return Err(ValidationError::with_code(
                    format!("Ensure this value is greater than or equal to {}.", min),
                    "min_value",
                ));
            }
        }
        Ok(NativeValue::Int(n))
    }

    fn deconstruct(&self) -> Deconstruction {
        Deconstruction {
            path: INTEGER_BLOCK_PATH,
            children: Vec::new(),
            options: options_value(&self.options),
        }
    }

    fn check(&self) -> Vec<CheckMessage> {
        match (self.options.min_value, self.options.max_value) {
            (Some(min), Some(max)) if min > max => vec![CheckMessage::new(
                "streamfield.E002",
                format!("min_value ({}) is greater than max_value ({})", min, max),
            )],
            _ => Vec::new(),
        }
    }
}

/// Options for float blocks
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FloatOptions {
    #[serde(flatten)]
    pub common: BlockOptions,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_value: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_value: Option<f64>,
}

/// Floating point number
#[derive(Debug, Default)]
pub struct FloatBlock {
    name: BlockName,
    options: FloatOptions,
}

impl FloatBlock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_options(options: FloatOptions) -> Self {
        Self {
            name: BlockName::new(),
            options,
        }
    }

    pub fn min_value(mut self, min_value: f64) -> Self {
        self.options.min_value = Some(min_value);
        self
    }

    pub fn max_value(mut self, max_value: f64) -> Self {
        self.options.max_value = Some(max_value);
        self
    }
}

common_builders!(FloatBlock);

impl Block for FloatBlock {
    fn block_name(&self) -> &BlockName {
        &self.name
    }

    fn options(&self) -> &BlockOptions {
        &self.options.common
    }

    /// Unparseable input is kept as-is so `clean` can reject it
    fn to_native(&self, raw: &Value) -> NativeValue {
        match raw {
            Value::Null => NativeValue::Null,
            Value::Number(n) => n
                .as_f64()
                .map_or_else(|| NativeValue::Text(n.to_string()), NativeValue::Float),
            Value::String(s) => s
                .trim()
                .parse()
                .map_or_else(|_| NativeValue::Text(s.clone()), NativeValue::Float),
            other => NativeValue::Text(other.to_string()),
        }
    }

    fn clean(&self, value: &NativeValue) -> ValidationResult<NativeValue> {
        let invalid = || ValidationError::with_code("Enter a number.", "invalid");
        let n = match value {
            NativeValue::Null => None,
            NativeValue::Int(n) => Some(*n as f64),
            NativeValue::Float(f) => Some(*f),
            NativeValue::Text(s) if s.trim().is_empty() => None,
            NativeValue::Text(s) => Some(s.trim().parse::<f64>().map_err(|_| invalid())?),
            _ => return Err(invalid()),
        };
        let Some(n) = n else {
            if self.options.common.is_required() {
                return Err(ValidationError::required());
            }
            return Ok(NativeValue::Null);
        };
        if !n.is_finite() {
            return Err(invalid());
        }
        if let Some(max) = self.options.max_value {
            if n > max {
                return Err(ValidationError::with_code(
                    format!("Ensure this value is less than or equal to {}.", max),
                    "max_value",
                ));
            }
        }
        if let Some(min) = self.options.min_value {
            if n < min {
                return Err(ValidationError::with_code(
                    format!("Ensure this value is greater than or equal to {}.", min),
                    "min_value",
                ));
            }
        }
        Ok(NativeValue::Float(n))
    }

    fn deconstruct(&self) -> Deconstruction {
        Deconstruction {
            path: FLOAT_BLOCK_PATH,
            children: Vec::new(),
            options: options_value(&self.options),
        }
    }
}

/// Options for boolean blocks
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BooleanOptions {
    #[serde(flatten)]
    pub common: BlockOptions,
}

/// Checkbox. When required, the box must be ticked.
#[derive(Debug, Default)]
pub struct BooleanBlock {
    name: BlockName,
    options: BooleanOptions,
}

impl BooleanBlock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_options(options: BooleanOptions) -> Self {
        Self {
            name: BlockName::new(),
            options,
        }
    }

    fn truthy(value: &NativeValue) -> bool {
        match value {
            NativeValue::Bool(b) => *b,
            NativeValue::Text(s) => !matches!(s.to_lowercase().as_str(), "" | "false" | "0"),
            NativeValue::Int(n) => *n != 0,
            NativeValue::Float(f) => *f != 0.0,
            other => !other.is_empty(),
        }
    }
}

common_builders!(BooleanBlock);

impl Block for BooleanBlock {
    fn block_name(&self) -> &BlockName {
        &self.name
    }

    fn options(&self) -> &BlockOptions {
        &self.options.common
    }

    fn default_value(&self) -> NativeValue {
        match self.options.common.literal_default() {
            NativeValue::Null => NativeValue::Bool(false),
            other => other,
        }
    }

    fn to_native(&self, raw: &Value) -> NativeValue {
        NativeValue::Bool(Self::truthy(&NativeValue::from_storage(raw)))
    }

    /// An unticked checkbox is absent from the submission, so absence means false
    fn value_from_data(&self, data: &SubmittedData, prefix: &str) -> NativeValue {
        let checked = match data.get(prefix) {
            None => false,
            Some(v) => match v.to_lowercase().as_str() {
                "true" => true,
                "false" => false,
                _ => !v.is_empty(),
            },
        };
        NativeValue::Bool(checked)
    }

    fn value_omitted_from_data(&self, _data: &SubmittedData, _prefix: &str) -> bool {
        false
    }

    fn clean(&self, value: &NativeValue) -> ValidationResult<NativeValue> {
        let checked = Self::truthy(value);
        if !checked && self.options.common.is_required() {
            return Err(ValidationError::required());
        }
        Ok(NativeValue::Bool(checked))
    }

    fn deconstruct(&self) -> Deconstruction {
        Deconstruction {
            path: BOOLEAN_BLOCK_PATH,
            children: Vec::new(),
            options: options_value(&self.options),
        }
    }
}

/// Options for choice blocks
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChoiceOptions {
    #[serde(flatten)]
    pub common: BlockOptions,

    /// (value, label) pairs in display order
    #[serde(default)]
    pub choices: Vec<(String, String)>,
}

/// One value out of a fixed list
#[derive(Debug, Default)]
pub struct ChoiceBlock {
    name: BlockName,
    options: ChoiceOptions,
}

impl ChoiceBlock {
    pub fn new<I, V, L>(choices: I) -> Self
    where
        I: IntoIterator<Item = (V, L)>,
        V: Into<String>,
        L: Into<String>,
    {
        Self::from_options(ChoiceOptions {
            common: BlockOptions::default(),
            choices: choices.into_iter().map(|(v, l)| (v.into(), l.into())).collect(),
        })
    }

    pub fn from_options(options: ChoiceOptions) -> Self {
        Self {
            name: BlockName::new(),
            options,
        }
    }

    pub fn choices(&self) -> &[(String, String)] {
        &self.options.choices
    }

    pub fn label_for(&self, value: &str) -> Option<&str> {
        self.options
            .choices
            .iter()
            .find(|(v, _)| v == value)
            .map(|(_, label)| label.as_str())
    }
}

common_builders!(ChoiceBlock);

impl Block for ChoiceBlock {
    fn block_name(&self) -> &BlockName {
        &self.name
    }

    fn options(&self) -> &BlockOptions {
        &self.options.common
    }

    fn to_native(&self, raw: &Value) -> NativeValue {
        text_from_storage(raw)
    }

    fn clean(&self, value: &NativeValue) -> ValidationResult<NativeValue> {
        let text = match value {
            NativeValue::Null => String::new(),
            other => other.to_string(),
        };
        if text.is_empty() {
            if self.options.common.is_required() {
                return Err(ValidationError::required());
            }
            return Ok(NativeValue::Text(text));
        }
        if self.label_for(&text).is_none() {
            return Err(ValidationError::with_code(
                format!("Select a valid choice. {} is not one of the available choices.", text),
                "invalid_choice",
            ));
        }
        Ok(NativeValue::Text(text))
    }

    /// The label of the selected choice
    fn searchable_content(&self, value: &NativeValue) -> Vec<String> {
        value
            .as_str()
            .and_then(|v| self.label_for(v))
            .map(|label| vec![label.to_string()])
            .unwrap_or_default()
    }

    fn display_value(&self, value: &NativeValue) -> String {
        let text = value.to_string();
        match self.label_for(&text) {
            Some(label) => label.to_string(),
            None => text,
        }
    }

    fn deconstruct(&self) -> Deconstruction {
        Deconstruction {
            path: CHOICE_BLOCK_PATH,
            children: Vec::new(),
            options: options_value(&self.options),
        }
    }

    fn check(&self) -> Vec<CheckMessage> {
        if self.options.choices.is_empty() {
            return vec![CheckMessage::new("streamfield.W001", "ChoiceBlock has no choices")];
        }
        Vec::new()
    }
}

/// Absolute or relative URL
#[derive(Debug, Default)]
pub struct UrlBlock {
    name: BlockName,
    options: CharOptions,
}

impl UrlBlock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_options(options: CharOptions) -> Self {
        Self {
            name: BlockName::new(),
            options,
        }
    }

    pub fn max_length(mut self, max_length: usize) -> Self {
        self.options.max_length = Some(max_length);
        self
    }
}

common_builders!(UrlBlock);

impl Block for UrlBlock {
    fn block_name(&self) -> &BlockName {
        &self.name
    }

    fn options(&self) -> &BlockOptions {
        &self.options.common
    }

    fn to_native(&self, raw: &Value) -> NativeValue {
        text_from_storage(raw)
    }

    fn clean(&self, value: &NativeValue) -> ValidationResult<NativeValue> {
        let text = trimmed_text(value).unwrap_or_default();
        if text.is_empty() {
            if self.options.common.is_required() {
                return Err(ValidationError::required());
            }
            return Ok(NativeValue::Text(text));
        }
        check_lengths(&text, self.options.min_length, self.options.max_length)?;
        RelUrlValidator::new().validate(&text)?;
        Ok(NativeValue::Text(text))
    }

    fn deconstruct(&self) -> Deconstruction {
        Deconstruction {
            path: URL_BLOCK_PATH,
            children: Vec::new(),
            options: options_value(&self.options),
        }
    }

    fn check(&self) -> Vec<CheckMessage> {
        check_length_options(self.options.min_length, self.options.max_length)
    }
}
