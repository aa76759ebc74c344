//! Struct Block Invariant Tests
//!
//! - Storage round-trip is lossless for round-trip-safe children
//! - Child order: base order, overrides keep position, additions appended
//! - A struct is omitted from a submission only if every child is
//! - Validation never short-circuits
//! - Configured defaults bypass native conversion
//! - Construction rejects duplicate additions and never mutates the base
//! - Searchable content is flattened in registry order
//! - Bound children are built once, even under concurrent access

use serde_json::{json, Value};
use std::sync::{Arc, OnceLock};
use streamfield::block::{
    Block, BlockName, BlockOptions, BlockResult, BooleanBlock, CharBlock, ChildBlock, ChoiceBlock,
    DeclaredBlocks, Deconstruction, IntegerBlock, Media, NativeValue, StructBlock, StructDefinition,
    StructValue, SubmittedData, ValidationError, ValidationResult, STRUCT_BLOCK_JS, STRUCT_BLOCK_PATH,
};

// =============================================================================
// Helper Blocks
// =============================================================================

/// Doubles integers on the way in from storage
#[derive(Debug, Default)]
struct DoublingBlock {
    name: BlockName,
    options: BlockOptions,
}

impl Block for DoublingBlock {
    fn block_name(&self) -> &BlockName {
        &self.name
    }

    fn options(&self) -> &BlockOptions {
        &self.options
    }

    fn to_native(&self, raw: &Value) -> NativeValue {
        raw.as_i64().map_or(NativeValue::Null, |n| NativeValue::Int(n * 2))
    }

    fn clean(&self, value: &NativeValue) -> ValidationResult<NativeValue> {
        Ok(value.clone())
    }

    fn deconstruct(&self) -> Deconstruction {
        Deconstruction {
            path: "tests.DoublingBlock",
            children: Vec::new(),
            options: Value::Null,
        }
    }
}

/// Rejects every value
#[derive(Debug, Default)]
struct AlwaysFailBlock {
    name: BlockName,
    options: BlockOptions,
}

impl Block for AlwaysFailBlock {
    fn block_name(&self) -> &BlockName {
        &self.name
    }

    fn options(&self) -> &BlockOptions {
        &self.options
    }

    fn clean(&self, _value: &NativeValue) -> ValidationResult<NativeValue> {
        Err(ValidationError::with_code("Always fails.", "always"))
    }

    fn deconstruct(&self) -> Deconstruction {
        Deconstruction {
            path: "tests.AlwaysFailBlock",
            children: Vec::new(),
            options: Value::Null,
        }
    }
}

/// Needs client-side initialization
#[derive(Debug, Default)]
struct WidgetBlock {
    name: BlockName,
    options: BlockOptions,
}

impl Block for WidgetBlock {
    fn block_name(&self) -> &BlockName {
        &self.name
    }

    fn options(&self) -> &BlockOptions {
        &self.options
    }

    fn clean(&self, value: &NativeValue) -> ValidationResult<NativeValue> {
        Ok(value.clone())
    }

    fn js_initializer(&self) -> Option<String> {
        Some("Widget()".to_string())
    }

    fn media(&self) -> Media {
        Media::js(["widget.js"])
    }

    fn deconstruct(&self) -> Deconstruction {
        Deconstruction {
            path: "tests.WidgetBlock",
            children: Vec::new(),
            options: Value::Null,
        }
    }
}

fn char_child() -> ChildBlock {
    ChildBlock::instance(CharBlock::new())
}

fn abc_base() -> DeclaredBlocks {
    DeclaredBlocks::builder()
        .child("a", char_child())
        .child("b", char_child())
        .child("c", char_child())
        .build()
        .unwrap()
}

fn names(block: &StructBlock) -> Vec<&str> {
    block.child_names().collect()
}

/// Statically declared person type
struct PersonBlock;

impl StructDefinition for PersonBlock {
    fn declared_blocks() -> BlockResult<DeclaredBlocks> {
        static DECLARED: OnceLock<BlockResult<DeclaredBlocks>> = OnceLock::new();
        DECLARED
            .get_or_init(|| {
                DeclaredBlocks::builder()
                    .child("first_name", ChildBlock::instance(CharBlock::new()))
                    .child("surname", ChildBlock::instance(CharBlock::new()))
                    .child(
                        "role",
                        ChildBlock::instance(ChoiceBlock::new([("dev", "Developer"), ("ops", "Operations")])),
                    )
                    .build()
            })
            .clone()
    }
}

// =============================================================================
// Round-trip Tests
// =============================================================================

#[test]
fn test_storage_round_trip() {
    let inner = StructBlock::new(
        vec![("count", ChildBlock::instance(IntegerBlock::new()))],
        BlockOptions::new(),
    )
    .unwrap();
    let block = StructBlock::new(
        vec![
            ("title", char_child()),
            ("published", ChildBlock::instance(BooleanBlock::new())),
            ("kind", ChildBlock::instance(ChoiceBlock::new([("a", "A"), ("b", "B")]))),
            ("stats", ChildBlock::instance(inner)),
        ],
        BlockOptions::new(),
    )
    .unwrap();

    let stored = json!({
        "title": "Hello",
        "published": true,
        "kind": "b",
        "stats": { "count": 4 }
    });

    let value = block.to_native(&stored);
    let storage = block.to_storage(&value);
    assert_eq!(storage, stored);
    assert_eq!(block.to_native(&storage), value);
}

#[test]
fn test_storage_is_plain_json_in_registry_order() {
    let block = StructBlock::new(vec![("z", char_child()), ("a", char_child())], BlockOptions::new()).unwrap();
    let value = block.to_native(&json!({ "a": "1", "z": "2" }));
    let storage = block.to_storage(&value);
    let keys: Vec<&String> = storage.as_object().unwrap().keys().collect();
    assert_eq!(keys, vec!["z", "a"]);
}

// =============================================================================
// Ordering Tests
// =============================================================================

/// base = [a, b, c]; supplement = [(b, B2), (d, D)] -> [a, b(=B2), c, d]
#[test]
fn test_override_keeps_position_and_additions_append() {
    let base = abc_base();
    let b2: Arc<dyn Block> = Arc::new(CharBlock::new().max_length(2));

    let block = StructBlock::with_base(
        &base,
        vec![("b", ChildBlock::shared(b2.clone())), ("d", char_child())],
        BlockOptions::new(),
    )
    .unwrap();

    assert_eq!(names(&block), vec!["a", "b", "c", "d"]);
    assert!(Arc::ptr_eq(block.child("b").unwrap(), &b2));
    assert!(Arc::ptr_eq(block.child("a").unwrap(), base.get("a").unwrap()));
    assert_eq!(b2.name(), Some("b"));
}

#[test]
fn test_order_is_stable_across_operations() {
    let block = StructBlock::with_base(&abc_base(), vec![("d", char_child())], BlockOptions::new()).unwrap();
    let value = block.to_native(&json!({ "d": "4", "c": "3", "b": "2", "a": "1" }));
    let value = value.as_struct().unwrap();

    assert_eq!(value.keys().collect::<Vec<_>>(), vec!["a", "b", "c", "d"]);
    assert_eq!(value.bound_blocks().keys().collect::<Vec<_>>(), vec!["a", "b", "c", "d"]);
    assert_eq!(block.searchable_content(&NativeValue::Struct(value.clone())), vec!["1", "2", "3", "4"]);
}

// =============================================================================
// Omission Tests
// =============================================================================

#[test]
fn test_omitted_only_when_every_child_omitted() {
    let block = StructBlock::new(vec![("x", char_child()), ("y", char_child())], BlockOptions::new()).unwrap();

    let partial: SubmittedData = [("link-x", "value")].into_iter().collect();
    assert!(!block.value_omitted_from_data(&partial, "link"));
    assert!(block.value_omitted_from_data(&SubmittedData::new(), "link"));

    let other_prefix: SubmittedData = [("other-x", "value")].into_iter().collect();
    assert!(block.value_omitted_from_data(&other_prefix, "link"));
}

#[test]
fn test_value_from_data_uses_child_prefixes() {
    let block = StructBlock::new(
        vec![("title", char_child()), ("count", ChildBlock::instance(IntegerBlock::new()))],
        BlockOptions::new(),
    )
    .unwrap();
    let data: SubmittedData = [("body-0-title", "Hi"), ("body-0-count", "3")].into_iter().collect();

    let value = block.struct_from_data(&data, "body-0");
    assert_eq!(value.get("title"), Some(&NativeValue::from("Hi")));
    assert_eq!(value.get("count"), Some(&NativeValue::from("3")));

    let cleaned = block.clean_struct(&value).unwrap();
    assert_eq!(cleaned.get("count"), Some(&NativeValue::Int(3)));
}

// =============================================================================
// Validation Tests
// =============================================================================

#[test]
fn test_validation_does_not_short_circuit() {
    let block = StructBlock::new(
        vec![
            ("first", ChildBlock::instance(AlwaysFailBlock::default())),
            ("ok", char_child()),
            ("second", ChildBlock::instance(AlwaysFailBlock::default())),
        ],
        BlockOptions::new(),
    )
    .unwrap();
    let value = block.to_native(&json!({ "first": "x", "ok": "fine", "second": "y" }));

    let err = block.clean(&value).unwrap_err();
    let params = err.params().unwrap();
    assert_eq!(params.keys().collect::<Vec<_>>(), vec!["first", "second"]);
    assert_eq!(params["first"][0].code(), "always");
    assert_eq!(params["second"][0].code(), "always");
}

#[test]
fn test_clean_is_deterministic() {
    let block = StructBlock::new(
        vec![("title", ChildBlock::instance(CharBlock::new().max_length(3)))],
        BlockOptions::new(),
    )
    .unwrap();
    let value = block.to_native(&json!({ "title": "too long" }));
    for _ in 0..50 {
        let err = block.clean(&value).unwrap_err();
        assert_eq!(err.params().unwrap()["title"][0].code(), "max_length");
    }
}

#[test]
fn test_failed_clean_redisplays_per_child() {
    let block = StructBlock::new(
        vec![("title", char_child()), ("url", ChildBlock::instance(CharBlock::new().required(false)))],
        BlockOptions::new(),
    )
    .unwrap();
    let data: SubmittedData = [("s-url", "/x/")].into_iter().collect();
    let value = block.struct_from_data(&data, "s");
    let err = block.clean_struct(&value).unwrap_err();

    let ctx = block.form_context(&value, "s", &[err]).unwrap();
    assert_eq!(ctx.children["title"].errors[0].code(), "required");
    assert!(ctx.children["url"].errors.is_empty());
    assert_eq!(ctx.children["url"].value, NativeValue::from("/x/"));
}

// =============================================================================
// Default Tests
// =============================================================================

#[test]
fn test_default_bypasses_conversion() {
    let block = StructBlock::new(
        vec![("a", ChildBlock::instance(DoublingBlock::default()))],
        BlockOptions::new().with_default(json!({ "a": 5 })),
    )
    .unwrap();

    assert_eq!(block.default_struct().get("a"), Some(&NativeValue::Int(5)));
    assert_eq!(block.to_struct(&json!({ "a": 5 })).get("a"), Some(&NativeValue::Int(10)));
}

#[test]
fn test_missing_children_take_their_own_default() {
    let block = StructBlock::new(
        vec![
            ("a", ChildBlock::instance(DoublingBlock::default())),
            ("n", ChildBlock::instance(IntegerBlock::new().with_default(3))),
        ],
        BlockOptions::new().with_default(json!({ "a": 1 })),
    )
    .unwrap();

    let default = block.default_struct();
    assert_eq!(default.get("n"), Some(&NativeValue::Int(3)));

    let converted = block.to_struct(&json!({ "a": 1 }));
    assert_eq!(converted.get("n"), Some(&NativeValue::Int(3)));
}

// =============================================================================
// Construction Tests
// =============================================================================

#[test]
fn test_duplicate_additions_fail() {
    let result = StructBlock::with_base(
        &abc_base(),
        vec![("d", char_child()), ("d", char_child())],
        BlockOptions::new(),
    );
    assert!(result.is_err());
}

#[test]
fn test_zero_additions_copy_the_base() {
    let base = abc_base();
    let block = StructBlock::with_base(&base, Vec::<(String, ChildBlock)>::new(), BlockOptions::new()).unwrap();

    assert_eq!(names(&block), base.names().collect::<Vec<_>>());
    for name in base.names() {
        assert!(Arc::ptr_eq(block.child(name).unwrap(), base.get(name).unwrap()));
    }
}

#[test]
fn test_registry_copies_are_isolated() {
    let base = abc_base();
    let mut copy = base.snapshot();
    copy.shift_remove("a");
    copy.insert("z".to_string(), Arc::new(CharBlock::new()));

    let first = StructBlock::with_base(&base, vec![("d", char_child())], BlockOptions::new()).unwrap();
    let second = StructBlock::with_base(&base, Vec::<(String, ChildBlock)>::new(), BlockOptions::new()).unwrap();

    assert_eq!(names(&first), vec!["a", "b", "c", "d"]);
    assert_eq!(names(&second), vec!["a", "b", "c"]);
    assert_eq!(base.len(), 3);
}

#[test]
fn test_named_block_cannot_be_renamed() {
    let shared: Arc<dyn Block> = Arc::new(CharBlock::new());
    StructBlock::new(vec![("title", ChildBlock::shared(shared.clone()))], BlockOptions::new()).unwrap();

    let same = StructBlock::new(vec![("title", ChildBlock::shared(shared.clone()))], BlockOptions::new());
    assert!(same.is_ok());

    let renamed = StructBlock::new(vec![("heading", ChildBlock::shared(shared))], BlockOptions::new());
    assert!(renamed.is_err());
}

#[test]
fn test_invalid_child_name_fails() {
    assert!(StructBlock::new(vec![("bad name", char_child())], BlockOptions::new()).is_err());
    assert!(StructBlock::new(vec![("2nd", char_child())], BlockOptions::new()).is_err());
}

// =============================================================================
// Search Tests
// =============================================================================

#[test]
fn test_search_content_is_flattened() {
    let inner = StructBlock::new(vec![("greeting", char_child())], BlockOptions::new()).unwrap();
    let block = StructBlock::new(
        vec![("a", char_child()), ("b", ChildBlock::instance(inner))],
        BlockOptions::new(),
    )
    .unwrap();

    let value = block.to_native(&json!({ "a": "hello", "b": { "greeting": "hi" } }));
    assert_eq!(block.searchable_content(&value), vec!["hello", "hi"]);
}

// =============================================================================
// Client-side Tests
// =============================================================================

#[test]
fn test_js_initializer_propagates() {
    let plain = StructBlock::new(vec![("title", char_child())], BlockOptions::new()).unwrap();
    assert_eq!(plain.js_initializer(), None);

    let inner = StructBlock::new(
        vec![("w", ChildBlock::instance(WidgetBlock::default()))],
        BlockOptions::new(),
    )
    .unwrap();
    assert_eq!(inner.js_initializer().as_deref(), Some("StructBlock({\"w\":Widget()})"));

    let outer = StructBlock::new(
        vec![("title", char_child()), ("nested", ChildBlock::instance(inner))],
        BlockOptions::new(),
    )
    .unwrap();
    assert_eq!(
        outer.js_initializer().as_deref(),
        Some("StructBlock({\"nested\":StructBlock({\"w\":Widget()})})")
    );
    assert_eq!(outer.media().js, vec![STRUCT_BLOCK_JS, "widget.js"]);
}

// =============================================================================
// Declaration Tests
// =============================================================================

#[test]
fn test_declared_type_deconstructs_to_generic_form() {
    let block = PersonBlock::build(vec![("age", ChildBlock::instance(IntegerBlock::new()))], BlockOptions::new()).unwrap();

    let deconstructed = block.deconstruct();
    assert_eq!(deconstructed.path, STRUCT_BLOCK_PATH);
    let child_names: Vec<&str> = deconstructed.children.iter().map(|(n, _)| n.as_str()).collect();
    assert_eq!(child_names, vec!["first_name", "surname", "role", "age"]);
}

#[test]
fn test_declaration_is_evaluated_once() {
    let first = PersonBlock::declared_blocks().unwrap();
    let second = PersonBlock::declared_blocks().unwrap();
    assert!(Arc::ptr_eq(first.get("role").unwrap(), second.get("role").unwrap()));

    let a = PersonBlock::build(Vec::<(String, ChildBlock)>::new(), BlockOptions::new()).unwrap();
    let b = PersonBlock::build(Vec::<(String, ChildBlock)>::new(), BlockOptions::new()).unwrap();
    assert!(!a.ptr_eq(&b));
    assert!(Arc::ptr_eq(a.child("surname").unwrap(), b.child("surname").unwrap()));
}

#[test]
fn test_value_knows_its_block() {
    let block = PersonBlock::build(Vec::<(String, ChildBlock)>::new(), BlockOptions::new()).unwrap();
    let value = block.to_struct(&json!({ "first_name": "Ada", "role": "ops" }));

    assert!(value.block().ptr_eq(&block));
    assert_eq!(value.display_value_for("role").as_deref(), Some("Operations"));
    assert_eq!(value.render_as_block(None), "<div>Ada\n\nops</div>");

    let detached: StructValue = value.clone();
    drop(block);
    assert_eq!(detached.bound_blocks().len(), 3);
}

// =============================================================================
// Concurrency Tests
// =============================================================================

#[test]
fn test_bound_blocks_are_built_once_across_threads() {
    let block = StructBlock::with_base(&abc_base(), vec![("d", char_child())], BlockOptions::new()).unwrap();
    let value = block.to_struct(&json!({ "a": "1", "b": "2", "c": "3", "d": "4" }));

    let addresses: Vec<usize> = std::thread::scope(|s| {
        let handles: Vec<_> = (0..8)
            .map(|_| {
                s.spawn(|| {
                    let bound = value.bound_blocks();
                    assert_eq!(bound.keys().collect::<Vec<_>>(), vec!["a", "b", "c", "d"]);
                    assert_eq!(bound["c"].value, NativeValue::from("3"));
                    bound as *const _ as usize
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    let cached = value.bound_blocks() as *const _ as usize;
    assert!(addresses.iter().all(|addr| *addr == cached));
    for (name, bound) in value.bound_blocks() {
        assert!(Arc::ptr_eq(&bound.block, block.child(name).unwrap()));
    }
}
