// SPDX-License-Identifier: MIT OR Apache-2.0
//! Handler for `policies` events: garbage-collect policies the agent no
//! longer applies.

use sca_core::{Condition, Field, FieldType};
use sca_store::SearchResult;
use tracing::{debug, warn};

use crate::DecodeError;
use crate::context::DecodeContext;
use crate::helpers::delete_policy_and_check;
use crate::validate::is_valid_event;

const SCHEMA: &[Condition] = &[Condition::required(Field::Policies, FieldType::Array)];

pub(crate) fn handle(ctx: &mut DecodeContext<'_>) -> Result<(), DecodeError> {
    if !is_valid_event(ctx, SCHEMA) {
        return Err(DecodeError::InvalidPoliciesEvent);
    }
    let Some(items) = ctx.view.get_array(ctx.paths.src(Field::Policies)) else {
        return Err(DecodeError::InvalidPoliciesEvent);
    };
    if items.is_empty() {
        debug!(target: "sca.decoder", agent_id = %ctx.agent_id, "agent reports no policies");
        return Ok(());
    }
    let reported: Vec<String> = items
        .iter()
        .filter_map(|item| item.as_str().map(str::to_owned))
        .collect();

    let lookup = ctx.request("query_policies", "");
    match ctx.search(&lookup, true) {
        SearchResult::Found(stored) => {
            for stored_id in stored.split(',').filter(|id| !id.is_empty()) {
                if !reported.iter().any(|id| id == stored_id) {
                    debug!(target: "sca.decoder", agent_id = %ctx.agent_id, policy_id = %stored_id, "policy no longer reported by agent, deleting");
                    delete_policy_and_check(ctx, stored_id);
                }
            }
        }
        SearchResult::NotFound => {}
        SearchResult::Error => {
            warn!(target: "sca.decoder", agent_id = %ctx.agent_id, "stored policy list lookup failed");
        }
    }
    Ok(())
}
