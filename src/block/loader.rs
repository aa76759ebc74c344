//! Block declarations on disk
//!
//! A declaration is the serialized form of `Block::deconstruct`: a
//! constructor path, the ordered child declarations and the constructor
//! options. Declarations are stored one per file as
//! `<declaration_dir>/<name>.json` and rebuilt into live blocks at startup.
//!
//! Malformed or unknown declarations fail the load; nothing is skipped.

use indexmap::IndexMap;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::base::{validate_name, Block, BlockOptions, Deconstruction};
use super::declared::ChildBlock;
use super::errors::{BlockError, BlockResult};
use super::field::{
    BooleanBlock, CharBlock, ChoiceBlock, FloatBlock, IntegerBlock, UrlBlock, BOOLEAN_BLOCK_PATH,
    CHAR_BLOCK_PATH, CHOICE_BLOCK_PATH, FLOAT_BLOCK_PATH, INTEGER_BLOCK_PATH, URL_BLOCK_PATH,
};
use super::struct_block::{StructBlock, STRUCT_BLOCK_PATH};
use crate::observability::{log_event_with_fields, Event};

/// Serializable structural description of a block tree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlockDeclaration {
    pub path: String,

    /// Ordered `[name, declaration]` pairs; empty for leaf blocks
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<(String, BlockDeclaration)>,

    #[serde(default)]
    pub options: Value,
}

impl Deconstruction {
    /// Recursively describes the block tree
    pub fn to_declaration(&self) -> BlockDeclaration {
        BlockDeclaration {
            path: self.path.to_string(),
            children: self
                .children
                .iter()
                .map(|(name, block)| (name.clone(), block.deconstruct().to_declaration()))
                .collect(),
            options: self.options.clone(),
        }
    }
}

impl BlockDeclaration {
    /// Rebuilds a fresh, unnamed block tree from this declaration
    pub fn build(&self) -> BlockResult<Arc<dyn Block>> {
        if self.path != STRUCT_BLOCK_PATH && !self.children.is_empty() {
            return Err(BlockError::malformed_declaration(
                &self.path,
                "only struct blocks take children",
            ));
        }

        let block: Arc<dyn Block> = match self.path.as_str() {
            STRUCT_BLOCK_PATH => Arc::new(self.build_struct()?),
            CHAR_BLOCK_PATH => Arc::new(CharBlock::from_options(self.options()?)),
            INTEGER_BLOCK_PATH => Arc::new(IntegerBlock::from_options(self.options()?)),
            FLOAT_BLOCK_PATH => Arc::new(FloatBlock::from_options(self.options()?)),
            BOOLEAN_BLOCK_PATH => Arc::new(BooleanBlock::from_options(self.options()?)),
            CHOICE_BLOCK_PATH => Arc::new(ChoiceBlock::from_options(self.options()?)),
            URL_BLOCK_PATH => Arc::new(UrlBlock::from_options(self.options()?)),
            other => {
                return Err(BlockError::malformed_declaration(other, "unknown block path"));
            }
        };
        Ok(block)
    }

    fn build_struct(&self) -> BlockResult<StructBlock> {
        let children = self
            .children
            .iter()
            .map(|(name, decl)| Ok((name.clone(), ChildBlock::shared(decl.build()?))))
            .collect::<BlockResult<Vec<_>>>()?;
        let options: BlockOptions = self.options()?;
        StructBlock::new(children, options)
    }

    fn options<T: DeserializeOwned + Default>(&self) -> BlockResult<T> {
        if self.options.is_null() {
            return Ok(T::default());
        }
        serde_json::from_value(self.options.clone())
            .map_err(|e| BlockError::malformed_declaration(&self.path, format!("invalid options: {}", e)))
    }
}

/// Reads declaration files from disk and keeps the rebuilt blocks by name
pub struct DeclarationLoader {
    declaration_dir: PathBuf,
    blocks: IndexMap<String, Arc<dyn Block>>,
}

impl DeclarationLoader {
    pub fn new(declaration_dir: &Path) -> Self {
        Self {
            declaration_dir: declaration_dir.to_path_buf(),
            blocks: IndexMap::new(),
        }
    }

    pub fn declaration_dir(&self) -> &Path {
        &self.declaration_dir
    }

    /// Loads every `*.json` file in the declaration directory, in file name
    /// order. A missing directory holds no declarations.
    pub fn load_all(&mut self) -> BlockResult<()> {
        if !self.declaration_dir.exists() {
            return Ok(());
        }

        let entries = fs::read_dir(&self.declaration_dir).map_err(|e| {
            BlockError::malformed_declaration(
                self.declaration_dir.display().to_string(),
                format!("Failed to read declaration directory: {}", e),
            )
        })?;

        let mut paths = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| {
                BlockError::malformed_declaration(
                    self.declaration_dir.display().to_string(),
                    format!("Failed to read directory entry: {}", e),
                )
            })?;
            let path = entry.path();
            if path.extension().is_some_and(|ext| ext == "json") {
                paths.push(path);
            }
        }
        paths.sort();

        for path in &paths {
            self.load_file(path)?;
        }

        let count = self.blocks.len().to_string();
        let dir = self.declaration_dir.display().to_string();
        log_event_with_fields(
            Event::DeclarationsLoaded,
            &[("count", count.as_str()), ("dir", dir.as_str())],
        );
        Ok(())
    }

    fn load_file(&mut self, path: &Path) -> BlockResult<()> {
        let display = path.display().to_string();
        let name = path
            .file_stem()
            .and_then(|s| s.to_str())
            .ok_or_else(|| BlockError::malformed_declaration(&display, "file name is not valid UTF-8"))?;

        let content = fs::read_to_string(path)
            .map_err(|e| BlockError::malformed_declaration(&display, format!("Failed to read file: {}", e)))?;
        let declaration: BlockDeclaration = serde_json::from_str(&content)
            .map_err(|e| BlockError::malformed_declaration(&display, format!("Invalid JSON: {}", e)))?;

        self.register(name, &declaration)
    }

    /// Builds and registers a declaration under `name`
    pub fn register(&mut self, name: &str, declaration: &BlockDeclaration) -> BlockResult<()> {
        validate_name(name)?;
        if self.blocks.contains_key(name) {
            return Err(BlockError::duplicate_name(name));
        }
        let block = declaration.build()?;
        block.set_name(name)?;
        self.blocks.insert(name.to_string(), block);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn Block>> {
        self.blocks.get(name)
    }

    /// Convenience lookup for struct declarations
    pub fn get_struct(&self, name: &str) -> Option<&StructBlock> {
        self.get(name).and_then(|b| b.as_struct())
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.blocks.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Writes `block`'s declaration to `<declaration_dir>/<name>.json`.
    ///
    /// Existing files are never overwritten.
    pub fn save(&self, name: &str, block: &dyn Block) -> BlockResult<PathBuf> {
        validate_name(name)?;
        let path = self.declaration_dir.join(format!("{}.json", name));
        let display = path.display().to_string();

        if path.exists() {
            return Err(BlockError::duplicate_name(name));
        }

        fs::create_dir_all(&self.declaration_dir).map_err(|e| {
            BlockError::malformed_declaration(
                self.declaration_dir.display().to_string(),
                format!("Failed to create declaration directory: {}", e),
            )
        })?;

        let content = serde_json::to_string_pretty(&block.deconstruct().to_declaration())
            .map_err(|e| BlockError::malformed_declaration(&display, format!("Failed to serialize: {}", e)))?;
        fs::write(&path, content)
            .map_err(|e| BlockError::malformed_declaration(&display, format!("Failed to write file: {}", e)))?;

        Ok(path)
    }
}
