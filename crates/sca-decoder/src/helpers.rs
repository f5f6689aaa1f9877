// SPDX-License-Identifier: MIT OR Apache-2.0
//! Store mutations derived from per-check auxiliary data.

use sca_core::Field;
use tracing::warn;

use crate::context::DecodeContext;

/// Persist every string entry of the check's compliance mapping.
pub(crate) fn insert_compliance(ctx: &DecodeContext<'_>, check_id: i64) {
    let Some(entries) = ctx.view.get_object(ctx.paths.src(Field::CheckCompliance)) else {
        return;
    };
    for (key, value) in entries {
        let Some(value) = value.as_str() else {
            warn!(target: "sca.decoder", agent_id = %ctx.agent_id, check_id, compliance_key = %key, "skipping non-string compliance value");
            continue;
        };
        let save = ctx.request("insert_compliance", &format!("{check_id}|{key}|{value}"));
        if !ctx.apply(&save) {
            warn!(target: "sca.decoder", agent_id = %ctx.agent_id, check_id, compliance_key = %key, "compliance insert rejected by store");
        }
    }
}

/// Persist every rule string of the check, tagged by its leading type
/// character.
pub(crate) fn insert_rules(ctx: &DecodeContext<'_>, check_id: i64) {
    let Some(rules) = ctx.view.get_array(ctx.paths.src(Field::CheckRules)) else {
        return;
    };
    for rule in rules {
        let Some(rule) = rule.as_str() else {
            warn!(target: "sca.decoder", agent_id = %ctx.agent_id, check_id, "skipping non-string rule");
            continue;
        };
        let Some(kind) = rule_kind(rule) else {
            warn!(target: "sca.decoder", agent_id = %ctx.agent_id, check_id, rule = %rule, "skipping rule with unknown type tag");
            continue;
        };
        let save = ctx.request("insert_rules", &format!("{check_id}|{kind}|{rule}"));
        if !ctx.apply(&save) {
            warn!(target: "sca.decoder", agent_id = %ctx.agent_id, check_id, "rule insert rejected by store");
        }
    }
}

/// Map a rule's leading character to its scanner type.
fn rule_kind(rule: &str) -> Option<&'static str> {
    match rule.chars().next()? {
        'f' => Some("file"),
        'd' => Some("directory"),
        'r' => Some("registry"),
        'c' => Some("command"),
        'p' => Some("process"),
        'n' => Some("numeric"),
        _ => None,
    }
}

/// Drop a policy and its checks from the store.
///
/// Returns whether the primary policy deletion succeeded; a failing check
/// deletion is logged and tolerated, the orphaned rows are rebuilt by the
/// next dump.
pub(crate) fn delete_policy_and_check(ctx: &DecodeContext<'_>, policy_id: &str) -> bool {
    if !ctx.apply(&ctx.request("delete_policy", policy_id)) {
        warn!(target: "sca.decoder", agent_id = %ctx.agent_id, %policy_id, "policy delete rejected by store");
        return false;
    }
    if !ctx.apply(&ctx.request("delete_check", policy_id)) {
        warn!(target: "sca.decoder", agent_id = %ctx.agent_id, %policy_id, "check delete rejected by store");
    }
    true
}
