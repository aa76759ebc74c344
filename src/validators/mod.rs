//! Value validators shared by leaf blocks

use regex::Regex;
use std::sync::LazyLock;

use crate::block::{ValidationError, ValidationResult};

static ABSOLUTE_URL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)^(?:https?|ftps?)://(?:[^\s:@/]+(?::[^\s:@/]*)?@)?(?:localhost|[a-z0-9](?:[a-z0-9-]*[a-z0-9])?(?:\.[a-z0-9](?:[a-z0-9-]*[a-z0-9])?)*|\d{1,3}(?:\.\d{1,3}){3}|\[[0-9a-f:.]+\])(?::\d{1,5})?(?:[/?#][^\s\\~]*)?$",
    )
    .expect("absolute url pattern is valid")
});

static RELATIVE_URL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9_\-./#?=&%+:;@!$'()*,]+$").expect("relative url pattern is valid")
});

/// Accepts absolute URLs and site-relative references.
///
/// Relative references may be rooted ("/page/1/"), bare ("page/1/") or a
/// fragment ("#top"). Whitespace, backslashes and tildes are rejected.
#[derive(Debug, Clone, Copy, Default)]
pub struct RelUrlValidator;

impl RelUrlValidator {
    pub fn new() -> Self {
        Self
    }

    pub fn is_valid(&self, value: &str) -> bool {
        if value.contains("://") {
            ABSOLUTE_URL.is_match(value)
        } else {
            !value.starts_with("//") && RELATIVE_URL.is_match(value)
        }
    }

    pub fn validate(&self, value: &str) -> ValidationResult<()> {
        if self.is_valid(value) {
            Ok(())
        } else {
            Err(ValidationError::with_code("Enter a valid URL.", "invalid"))
        }
    }
}
