// SPDX-License-Identifier: MIT OR Apache-2.0
//! Handler for `check` events: per-check store reconciliation.

use sca_core::{Condition, Field, FieldType};
use sca_store::SearchResult;
use tracing::warn;

use crate::DecodeError;
use crate::context::DecodeContext;
use crate::helpers::{insert_compliance, insert_rules};
use crate::validate::is_valid_event;

const SCHEMA: &[Condition] = &[
    Condition::required(Field::Check, FieldType::Object),
    Condition::required(Field::CheckId, FieldType::Int),
    Condition::required(Field::CheckTitle, FieldType::String),
    Condition::required(Field::Id, FieldType::Int),
    Condition::required(Field::Policy, FieldType::String),
    Condition::required(Field::PolicyId, FieldType::String),
    Condition::optional(Field::CheckResult, FieldType::String),
    Condition::optional(Field::CheckStatus, FieldType::String),
    Condition::optional(Field::CheckReason, FieldType::String),
    Condition::optional(Field::CheckCompliance, FieldType::Object),
    Condition::optional(Field::CheckRules, FieldType::Array),
    Condition::optional(Field::CheckFile, FieldType::String),
    Condition::optional(Field::CheckDirectory, FieldType::String),
    Condition::optional(Field::CheckRegistry, FieldType::String),
    Condition::optional(Field::CheckProcess, FieldType::String),
    Condition::optional(Field::CheckCommand, FieldType::String),
];

/// Reconcile one check against the store and normalize it when its outcome
/// changed since the last scan.
pub(crate) fn handle(ctx: &mut DecodeContext<'_>) -> Result<(), DecodeError> {
    if !is_valid_event(ctx, SCHEMA) {
        return Err(DecodeError::InvalidCheckEvent);
    }
    // a check carries either a result or a status with its reason
    if !ctx.present(Field::CheckResult)
        && !(ctx.present(Field::CheckStatus) && ctx.present(Field::CheckReason))
    {
        return Err(DecodeError::InvalidCheckEvent);
    }

    let check_id = ctx.source_int(Field::CheckId);
    let event_id = ctx.source_int(Field::Id);
    let result = ctx.source_string(Field::CheckResult);
    let status = ctx.source_string(Field::CheckStatus);
    let reason = ctx.source_string(Field::CheckReason);

    let lookup = ctx.request("query", &check_id.to_string());
    let previous = match ctx.search(&lookup, true) {
        SearchResult::Found(previous) => {
            let save = ctx.request(
                "update",
                &format!("{check_id}|{result}|{status}|{reason}|{event_id}"),
            );
            if !ctx.apply(&save) {
                warn!(target: "sca.decoder", agent_id = %ctx.agent_id, check_id, "check update rejected by store");
            }
            previous
        }
        SearchResult::NotFound => {
            let body = ctx
                .view
                .render(ctx.paths.src(Field::Root))
                .unwrap_or_else(|| "{}".to_string());
            let save = ctx.request("insert", &body);
            if !ctx.apply(&save) {
                warn!(target: "sca.decoder", agent_id = %ctx.agent_id, check_id, "check insert rejected by store");
            }
            insert_compliance(ctx, check_id);
            insert_rules(ctx, check_id);
            String::new()
        }
        SearchResult::Error => return Err(DecodeError::PreviousResultLookup),
    };

    let normalize = if result.is_empty() {
        !status.is_empty() && previous != status
    } else {
        previous != result
    };
    if normalize {
        fill_check_event(ctx, &previous);
    }
    Ok(())
}

/// Materialize the check under `/sca` for downstream alerting.
fn fill_check_event(ctx: &mut DecodeContext<'_>, previous: &str) {
    ctx.set_dest_string("check", Field::Type);
    if !previous.is_empty() {
        ctx.set_dest_string(previous, Field::CheckPreviousResult);
    }
    for field in [
        Field::Id,
        Field::Policy,
        Field::PolicyId,
        Field::CheckId,
        Field::CheckTitle,
    ] {
        ctx.copy_if_present(field);
    }
    // comma-separated scanner targets become arrays downstream
    for field in [
        Field::CheckFile,
        Field::CheckDirectory,
        Field::CheckRegistry,
        Field::CheckProcess,
        Field::CheckCommand,
    ] {
        ctx.split_csv_to_dest(field);
    }
    if ctx.present(Field::CheckResult) {
        ctx.copy_if_present(Field::CheckResult);
    } else {
        ctx.copy_if_present(Field::CheckStatus);
        ctx.copy_if_present(Field::CheckReason);
    }
}
