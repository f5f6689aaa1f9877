// SPDX-License-Identifier: MIT OR Apache-2.0
//! Schema validation over source-side event fields.

use sca_core::{Condition, FieldType};

use crate::context::DecodeContext;

/// Check every condition against the event's source side.
///
/// A present field must match its declared type; an absent field fails only
/// when mandatory. The first failing condition short-circuits, but the
/// conditions are independent, so ordering cannot change the verdict.
pub(crate) fn is_valid_event(ctx: &DecodeContext<'_>, conditions: &[Condition]) -> bool {
    conditions.iter().all(|condition| {
        let path = ctx.paths.src(condition.field);
        if !ctx.view.exists(path) {
            return !condition.mandatory;
        }
        match condition.kind {
            FieldType::String => ctx.view.is_string(path),
            FieldType::Int => ctx.view.is_int(path),
            FieldType::Bool => ctx.view.is_bool(path),
            FieldType::Array => ctx.view.is_array(path),
            FieldType::Object => ctx.view.is_object(path),
        }
    })
}
