// SPDX-License-Identifier: MIT OR Apache-2.0
//! Handler for `summary` events: scan bookkeeping and integrity checks.
//!
//! A summary closes one scan of a policy. The handler saves the scan info,
//! keeps the policy row current, and compares the agent's integrity hash with
//! the stored one; any divergence ends in a dump request so the agent
//! re-sends its full results.

use sca_core::{Condition, Field, FieldType};
use sca_store::SearchResult;
use tracing::{debug, warn};

use crate::DecodeError;
use crate::context::DecodeContext;
use crate::helpers::delete_policy_and_check;
use crate::validate::is_valid_event;

const SCHEMA: &[Condition] = &[
    Condition::required(Field::PolicyId, FieldType::String),
    Condition::required(Field::ScanId, FieldType::Int),
    Condition::required(Field::StartTime, FieldType::Int),
    Condition::required(Field::EndTime, FieldType::Int),
    Condition::required(Field::Passed, FieldType::Int),
    Condition::required(Field::Failed, FieldType::Int),
    Condition::required(Field::Invalid, FieldType::Int),
    Condition::required(Field::TotalChecks, FieldType::Int),
    Condition::required(Field::Score, FieldType::Int),
    Condition::required(Field::Hash, FieldType::String),
    Condition::required(Field::HashFile, FieldType::String),
    Condition::required(Field::File, FieldType::String),
    Condition::required(Field::Name, FieldType::String),
    Condition::optional(Field::Description, FieldType::String),
    Condition::optional(Field::References, FieldType::String),
];

pub(crate) fn handle(ctx: &mut DecodeContext<'_>) -> Result<(), DecodeError> {
    if !is_valid_event(ctx, SCHEMA) {
        return Err(DecodeError::InvalidScanInfoEvent);
    }
    let policy_id = ctx.source_string(Field::PolicyId);
    let event_hash = ctx.source_string(Field::Hash);
    // first_scan and force_alert are presence-only sentinels
    let first_scan = ctx.present(Field::FirstScan);
    let force_alert = ctx.present(Field::ForceAlert);

    let lookup = ctx.request("query_scan", &policy_id);
    match ctx.search(&lookup, true) {
        SearchResult::Found(payload) => {
            // the payload is "{hash} {scan_id...}", only the first token counts
            let stored_hash = payload.split(' ').next().unwrap_or_default();
            let normalize = (stored_hash != event_hash && !first_scan) || force_alert;
            save_scan_info(ctx, &policy_id, true, normalize, first_scan);
        }
        SearchResult::NotFound => save_scan_info(ctx, &policy_id, false, true, first_scan),
        SearchResult::Error => {
            warn!(target: "sca.decoder", agent_id = %ctx.agent_id, %policy_id, "scan info lookup failed, skipping save");
        }
    }

    let lookup = ctx.request("query_policy", &policy_id);
    match ctx.search(&lookup, false) {
        SearchResult::Found(_) => update_policy_info(ctx, &policy_id),
        SearchResult::NotFound => insert_policy_info(ctx, &policy_id),
        SearchResult::Error => {
            warn!(target: "sca.decoder", agent_id = %ctx.agent_id, %policy_id, "policy lookup failed");
        }
    }

    check_results_and_dump(ctx, &policy_id, first_scan, &event_hash);
    Ok(())
}

/// Persist the scan info row, then normalize and request the initial dump as
/// decided by the caller. A rejected save skips both follow-ups; the next
/// summary reconciles.
fn save_scan_info(
    ctx: &mut DecodeContext<'_>,
    policy_id: &str,
    update: bool,
    normalize: bool,
    first_scan: bool,
) {
    let start_time = ctx.source_int(Field::StartTime);
    let end_time = ctx.source_int(Field::EndTime);
    let scan_id = ctx.source_int(Field::ScanId);
    let passed = ctx.source_int(Field::Passed);
    let failed = ctx.source_int(Field::Failed);
    let invalid = ctx.source_int(Field::Invalid);
    let total_checks = ctx.source_int(Field::TotalChecks);
    let score = ctx.source_int(Field::Score);
    let hash = ctx.source_string(Field::Hash);

    let (verb, args) = if update {
        (
            "update_scan_info_start",
            format!(
                "{policy_id}|{start_time}|{end_time}|{scan_id}|{passed}|{failed}|{invalid}|{total_checks}|{score}|{hash}"
            ),
        )
    } else {
        (
            "insert_scan_info",
            format!(
                "{start_time}|{end_time}|{scan_id}|{policy_id}|{passed}|{failed}|{invalid}|{total_checks}|{score}|{hash}"
            ),
        )
    };
    let save = ctx.request(verb, &args);
    if !ctx.apply(&save) {
        warn!(target: "sca.decoder", agent_id = %ctx.agent_id, %policy_id, "scan info save rejected by store");
        return;
    }
    if normalize {
        fill_scan_info(ctx);
    }
    if !update && first_scan {
        ctx.push_dump(policy_id, true);
    }
}

/// Materialize the summary under `/sca`.
fn fill_scan_info(ctx: &mut DecodeContext<'_>) {
    ctx.set_dest_string("summary", Field::Type);
    let name = ctx.source_string(Field::Name);
    ctx.set_dest_string(&name, Field::Policy);
    for field in [
        Field::ScanId,
        Field::Description,
        Field::PolicyId,
        Field::Passed,
        Field::Failed,
        Field::Invalid,
        Field::TotalChecks,
        Field::Score,
        Field::File,
    ] {
        ctx.copy_if_present(field);
    }
}

/// The policy row exists; rebuild it when the policy file itself changed.
fn update_policy_info(ctx: &DecodeContext<'_>, policy_id: &str) {
    let event_hash_file = ctx.source_string(Field::HashFile);
    let lookup = ctx.request("query_policy_sha256", policy_id);
    match ctx.search(&lookup, true) {
        SearchResult::Found(stored_hash_file) => {
            if stored_hash_file != event_hash_file {
                debug!(target: "sca.decoder", agent_id = %ctx.agent_id, %policy_id, "policy file changed, dropping stored policy");
                if delete_policy_and_check(ctx, policy_id) {
                    ctx.push_dump(policy_id, true);
                }
            }
        }
        SearchResult::NotFound => {}
        SearchResult::Error => {
            warn!(target: "sca.decoder", agent_id = %ctx.agent_id, %policy_id, "policy hash lookup failed");
        }
    }
}

/// First sighting of this policy: insert its descriptive row.
fn insert_policy_info(ctx: &DecodeContext<'_>, policy_id: &str) {
    let text = |field: Field| {
        ctx.view
            .get_str(ctx.paths.src(field))
            .unwrap_or("NULL")
            .to_string()
    };
    let args = format!(
        "{}|{}|{policy_id}|{}|{}|{}",
        text(Field::Name),
        text(Field::File),
        text(Field::Description),
        text(Field::References),
        text(Field::HashFile),
    );
    if !ctx.apply(&ctx.request("insert_policy", &args)) {
        warn!(target: "sca.decoder", agent_id = %ctx.agent_id, %policy_id, "policy insert rejected by store");
    }
}

/// Compare the stored check-results hash with the event's; missing or
/// diverging results mean the agent must re-send them.
fn check_results_and_dump(
    ctx: &DecodeContext<'_>,
    policy_id: &str,
    first_scan: bool,
    event_hash: &str,
) {
    let lookup = ctx.request("query_results", policy_id);
    match ctx.search(&lookup, true) {
        SearchResult::Found(stored_hash) => {
            if stored_hash != event_hash {
                debug!(target: "sca.decoder", agent_id = %ctx.agent_id, %policy_id, "check results hash mismatch");
                ctx.push_dump(policy_id, first_scan);
            }
        }
        SearchResult::NotFound => ctx.push_dump(policy_id, first_scan),
        SearchResult::Error => {
            warn!(target: "sca.decoder", agent_id = %ctx.agent_id, %policy_id, "check results lookup failed");
        }
    }
}
