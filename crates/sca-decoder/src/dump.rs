// SPDX-License-Identifier: MIT OR Apache-2.0
//! Handler for `dump_end` events: post-resync integrity verification.

use sca_core::{Condition, Field, FieldType};
use sca_store::SearchResult;
use tracing::warn;

use crate::DecodeError;
use crate::context::DecodeContext;
use crate::validate::is_valid_event;

const SCHEMA: &[Condition] = &[
    Condition::required(Field::ElementsSent, FieldType::Int),
    Condition::required(Field::PolicyId, FieldType::String),
    Condition::required(Field::ScanId, FieldType::Int),
];

pub(crate) fn handle(ctx: &mut DecodeContext<'_>) -> Result<(), DecodeError> {
    if !is_valid_event(ctx, SCHEMA) {
        return Err(DecodeError::InvalidDumpEvent);
    }
    let policy_id = ctx.source_string(Field::PolicyId);
    let scan_id = ctx.source_int(Field::ScanId);

    // checks that did not reappear in this dump belong to older scans
    let cleanup = ctx.request("delete_check_distinct", &format!("{policy_id}|{scan_id}"));
    if !ctx.apply(&cleanup) {
        warn!(target: "sca.decoder", agent_id = %ctx.agent_id, %policy_id, "stale check cleanup rejected by store");
    }

    let results = ctx.request("query_results", &policy_id);
    match ctx.search(&results, true) {
        SearchResult::Found(hash_check_results) => {
            let scan = ctx.request("query_scan", &policy_id);
            match ctx.search(&scan, true) {
                // the whole payload is the comparison key here, trailing
                // tokens included
                SearchResult::Found(hash_scan_info) => {
                    if hash_scan_info != hash_check_results {
                        ctx.push_dump(&policy_id, false);
                    }
                }
                SearchResult::NotFound => {}
                SearchResult::Error => {
                    warn!(target: "sca.decoder", agent_id = %ctx.agent_id, %policy_id, "scan info lookup failed after dump");
                }
            }
        }
        SearchResult::NotFound => {}
        SearchResult::Error => {
            warn!(target: "sca.decoder", agent_id = %ctx.agent_id, %policy_id, "check results lookup failed after dump");
        }
    }
    Ok(())
}
