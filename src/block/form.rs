//! Redisplay path for struct blocks
//!
//! After a failed `clean`, the form layer hands the aggregate error back so it
//! can be pulled apart and attached to each child. Exactly one aggregate error
//! is expected; anything else is a contract violation.

use indexmap::IndexMap;

use super::base::{Block, BoundBlock};
use super::errors::{ContractViolation, ErrorParams, ValidationError};
use super::struct_block::{child_prefix, StructBlock};
use super::struct_value::StructValue;
use crate::observability::{log_event_with_fields, Event};

/// Everything a form renderer needs for one struct block
#[derive(Debug, Clone)]
pub struct FormContext {
    /// Each child bound to its value, prefix and errors, in registry order
    pub children: IndexMap<String, BoundBlock>,
    pub help_text: Option<String>,
    pub prefix: String,
    pub block_definition: StructBlock,
}

impl FormContext {
    /// True if any child carries an error
    pub fn has_errors(&self) -> bool {
        self.children.values().any(|c| !c.errors.is_empty())
    }
}

impl StructBlock {
    /// Binds every child for redisplay.
    ///
    /// `errors` is the error list produced by one `clean()` call: empty, or a
    /// single aggregate error whose payload is redistributed to the children.
    ///
    /// # Errors
    ///
    /// Returns `ContractViolation` if more than one error is supplied or the
    /// single error is not an aggregate.
    pub fn form_context(
        &self,
        value: &StructValue,
        prefix: &str,
        errors: &[ValidationError],
    ) -> Result<FormContext, ContractViolation> {
        let params = aggregate_params(errors)?;

        let children = self
            .child_blocks()
            .iter()
            .map(|(name, child)| {
                let value = value
                    .get(name)
                    .cloned()
                    .unwrap_or_else(|| child.default_value());
                let bound = BoundBlock {
                    block: child.clone(),
                    value,
                    prefix: Some(child_prefix(prefix, name)),
                    errors: params.and_then(|p| p.get(name)).cloned().unwrap_or_default(),
                };
                (name.clone(), bound)
            })
            .collect();

        Ok(FormContext {
            children,
            help_text: self.options().help_text.clone(),
            prefix: prefix.to_string(),
            block_definition: self.clone(),
        })
    }
}

fn aggregate_params(errors: &[ValidationError]) -> Result<Option<&ErrorParams>, ContractViolation> {
    match errors {
        [] => Ok(None),
        [single] => match single.params() {
            Some(params) => Ok(Some(params)),
            None => {
                log_event_with_fields(Event::RedisplayContractViolation, &[("received", "1")]);
                Err(ContractViolation::not_aggregate(single.message()))
            }
        },
        many => {
            let count = many.len().to_string();
            log_event_with_fields(Event::RedisplayContractViolation, &[("received", count.as_str())]);
            Err(ContractViolation::multiple_errors(many.len()))
        }
    }
}
