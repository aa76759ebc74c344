//! Block subsystem
//!
//! Blocks are schema units for structured page content. Leaf blocks hold a
//! single value; a `StructBlock` composes a fixed, ordered set of named
//! children and maps a native `StructValue` to and from storage, submitted
//! form data and search content.
//!
//! # Design Principles
//!
//! - Child order is declaration order, everywhere
//! - Block definitions are immutable once built and shared by handle
//! - A block's name is assigned once, by the registry that owns it
//! - Construction errors are fatal; validation errors are aggregated, never short-circuited
//! - Configured defaults are native values and are never converted

mod base;
mod declared;
mod errors;
mod field;
mod form;
mod loader;
mod render;
mod struct_block;
mod struct_value;
mod value;

pub use base::{
    check_name, label_from_name, validate_name, AssetResolver, Block, BlockName, BlockOptions, BoundBlock,
    CheckMessage, Deconstruction, Media, RenderContext,
};
pub use declared::{ChildBlock, DeclaredBlocks, DeclaredBlocksBuilder, StructDefinition};
pub use errors::{
    BlockError, BlockErrorCode, BlockResult, ContractViolation, ErrorList, ErrorParams, Severity,
    ValidationError, ValidationResult,
};
pub use field::{
    BooleanBlock, BooleanOptions, CharBlock, CharOptions, ChoiceBlock, ChoiceOptions, FloatBlock,
    FloatOptions, IntegerBlock, IntegerOptions, UrlBlock, BOOLEAN_BLOCK_PATH, CHAR_BLOCK_PATH,
    CHOICE_BLOCK_PATH, FLOAT_BLOCK_PATH, INTEGER_BLOCK_PATH, URL_BLOCK_PATH,
};
pub use form::FormContext;
pub use loader::{BlockDeclaration, DeclarationLoader};
pub use render::escape_html;
pub use struct_block::{child_prefix, StructBlock, STRUCT_BLOCK_JS, STRUCT_BLOCK_PATH};
pub use struct_value::StructValue;
pub use value::{NativeValue, SubmittedData};
