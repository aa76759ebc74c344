//! Statically declared child blocks
//!
//! A struct type declares its children once through `DeclaredBlocks::builder()`.
//! The result is an immutable ordered snapshot that every `StructBlock` built
//! from the type copies before applying its own additions.

use indexmap::IndexMap;
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use super::base::{attach_names, validate_name, Block, BlockOptions};
use super::errors::{BlockError, BlockResult};
use super::struct_block::StructBlock;
use crate::observability::{log_event_with_fields, Event};

type BlockFactory = Box<dyn Fn() -> Arc<dyn Block> + Send + Sync>;

/// A child supplied at construction time: an instance or a zero-argument factory
pub enum ChildBlock {
    Instance(Arc<dyn Block>),
    Factory(BlockFactory),
}

impl ChildBlock {
    pub fn instance<B: Block + 'static>(block: B) -> Self {
        ChildBlock::Instance(Arc::new(block))
    }

    /// An instance that may already be shared elsewhere
    pub fn shared(block: Arc<dyn Block>) -> Self {
        ChildBlock::Instance(block)
    }

    pub fn factory<B, F>(factory: F) -> Self
    where
        B: Block + 'static,
        F: Fn() -> B + Send + Sync + 'static,
    {
        ChildBlock::Factory(Box::new(move || Arc::new(factory()) as Arc<dyn Block>))
    }

    pub fn instantiate(self) -> Arc<dyn Block> {
        match self {
            ChildBlock::Instance(block) => block,
            ChildBlock::Factory(factory) => factory(),
        }
    }
}

impl fmt::Debug for ChildBlock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChildBlock::Instance(block) => f.debug_tuple("Instance").field(block).finish(),
            ChildBlock::Factory(_) => f.write_str("Factory(..)"),
        }
    }
}

/// Immutable ordered name -> block snapshot
#[derive(Debug, Clone, Default)]
pub struct DeclaredBlocks {
    blocks: Arc<IndexMap<String, Arc<dyn Block>>>,
}

impl DeclaredBlocks {
    pub fn builder() -> DeclaredBlocksBuilder {
        DeclaredBlocksBuilder::default()
    }

    pub fn empty() -> Self {
        Self::default()
    }

    /// Shallow copy; the snapshot itself is never mutated
    pub fn snapshot(&self) -> IndexMap<String, Arc<dyn Block>> {
        (*self.blocks).clone()
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn Block>> {
        self.blocks.get(name)
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
}

/// Collects declared children in order.
///
/// Names inherited through `extend` may be redeclared and keep their position;
/// declaring the same name twice on one builder is an error. The first error
/// is kept and reported by `build()`.
#[derive(Default)]
pub struct DeclaredBlocksBuilder {
    blocks: IndexMap<String, Arc<dyn Block>>,
    declared: HashSet<String>,
    error: Option<BlockError>,
}

impl DeclaredBlocksBuilder {
    /// Inherits every child of `parent`
    pub fn extend(mut self, parent: &DeclaredBlocks) -> Self {
        for (name, block) in parent.blocks.iter() {
            self.blocks.insert(name.clone(), Arc::clone(block));
        }
        self
    }

    pub fn child(mut self, name: impl Into<String>, block: ChildBlock) -> Self {
        if self.error.is_some() {
            return self;
        }
        let name = name.into();
        if let Err(e) = self.declare(&name, block) {
            self.error = Some(e);
        }
        self
    }

    fn declare(&mut self, name: &str, block: ChildBlock) -> BlockResult<()> {
        validate_name(name)?;
        if !self.declared.insert(name.to_string()) {
            return Err(BlockError::duplicate_name(name));
        }
        self.blocks.insert(name.to_string(), block.instantiate());
        Ok(())
    }

    /// Names the locally declared children once every declaration is known
    /// to be valid
    pub fn build(self) -> BlockResult<DeclaredBlocks> {
        if let Some(e) = self.error {
            return Err(e);
        }
        let local: Vec<(String, Arc<dyn Block>)> = self
            .blocks
            .iter()
            .filter(|(name, _)| self.declared.contains(name.as_str()))
            .map(|(name, block)| (name.clone(), Arc::clone(block)))
            .collect();
        attach_names(&local)?;
        let count = self.blocks.len().to_string();
        log_event_with_fields(Event::DeclaredBlocksBuilt, &[("children", count.as_str())]);
        Ok(DeclaredBlocks {
            blocks: Arc::new(self.blocks),
        })
    }
}

/// A struct type with statically declared children.
///
/// Implementors cache their declaration so it is evaluated once:
///
/// ```ignore
/// struct Person;
///
/// impl StructDefinition for Person {
///     fn declared_blocks() -> BlockResult<DeclaredBlocks> {
///         static DECLARED: OnceLock<BlockResult<DeclaredBlocks>> = OnceLock::new();
///         DECLARED
///             .get_or_init(|| {
///                 DeclaredBlocks::builder()
///                     .child("first_name", ChildBlock::instance(CharBlock::new()))
///                     .build()
///             })
///             .clone()
///     }
/// }
///
/// let person = Person::build(Vec::<(String, ChildBlock)>::new(), BlockOptions::new())?;
/// ```
pub trait StructDefinition {
    fn declared_blocks() -> BlockResult<DeclaredBlocks>;

    fn build<I, S>(local_blocks: I, options: BlockOptions) -> BlockResult<StructBlock>
    where
        I: IntoIterator<Item = (S, ChildBlock)>,
        S: Into<String>,
    {
        StructBlock::with_base(&Self::declared_blocks()?, local_blocks, options)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::errors::BlockErrorCode;
    use crate::block::field::CharBlock;

    #[test]
    fn test_builder_preserves_order() {
        let declared = DeclaredBlocks::builder()
            .child("b", ChildBlock::instance(CharBlock::new()))
            .child("a", ChildBlock::instance(CharBlock::new()))
            .build()
            .unwrap();
        assert_eq!(declared.names().collect::<Vec<_>>(), vec!["b", "a"]);
        assert_eq!(declared.get("a").unwrap().name(), Some("a"));
    }

    #[test]
    fn test_builder_rejects_duplicates() {
        let err = DeclaredBlocks::builder()
            .child("a", ChildBlock::instance(CharBlock::new()))
            .child("a", ChildBlock::instance(CharBlock::new()))
            .build()
            .unwrap_err();
        assert_eq!(err.code(), BlockErrorCode::SfDuplicateBlockName);
    }

    #[test]
    fn test_failed_build_leaves_shared_child_unnamed() {
        let shared: Arc<dyn Block> = Arc::new(CharBlock::new());
        let err = DeclaredBlocks::builder()
            .child("a", ChildBlock::shared(shared.clone()))
            .child("a", ChildBlock::instance(CharBlock::new()))
            .build()
            .unwrap_err();
        assert_eq!(err.code(), BlockErrorCode::SfDuplicateBlockName);
        assert_eq!(shared.name(), None);

        let declared = DeclaredBlocks::builder()
            .child("b", ChildBlock::shared(shared.clone()))
            .build()
            .unwrap();
        assert_eq!(declared.get("b").unwrap().name(), Some("b"));
    }

    #[test]
    fn test_builder_rejects_invalid_names() {
        let err = DeclaredBlocks::builder()
            .child("not valid", ChildBlock::instance(CharBlock::new()))
            .build()
            .unwrap_err();
        assert_eq!(err.code(), BlockErrorCode::SfInvalidBlockName);
    }

    #[test]
    fn test_extend_allows_redeclaring_inherited_names() {
        let parent = DeclaredBlocks::builder()
            .child("a", ChildBlock::instance(CharBlock::new()))
            .child("b", ChildBlock::instance(CharBlock::new()))
            .build()
            .unwrap();
        let child = DeclaredBlocks::builder()
            .extend(&parent)
            .child("a", ChildBlock::instance(CharBlock::new().max_length(3)))
            .child("c", ChildBlock::instance(CharBlock::new()))
            .build()
            .unwrap();

        assert_eq!(child.names().collect::<Vec<_>>(), vec!["a", "b", "c"]);
        assert!(!Arc::ptr_eq(child.get("a").unwrap(), parent.get("a").unwrap()));
        assert!(Arc::ptr_eq(child.get("b").unwrap(), parent.get("b").unwrap()));
        assert_eq!(parent.len(), 2);
    }

    #[test]
    fn test_factory_is_instantiated() {
        let block = ChildBlock::factory(CharBlock::new).instantiate();
        assert_eq!(block.name(), None);
    }
}
