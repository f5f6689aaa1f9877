// SPDX-License-Identifier: MIT OR Apache-2.0
//! Check-event scenarios: store reconciliation and conditional normalization.

mod common;

use common::*;
use proptest::prelude::*;
use sca_decoder::{DecodeError, EventKind};
use serde_json::{Value, json};

fn check_event() -> Value {
    json!({
        "agent": {"id": "007"},
        "event": {
            "type": "check",
            "id": 1,
            "policy": "P",
            "policy_id": "PID",
            "check": {
                "id": 42,
                "title": "t",
                "result": "passed"
            }
        }
    })
}

#[test]
fn new_check_is_inserted_and_normalized() {
    let h = Harness::new(&[("query", not_found())]);
    let mut event = check_event();
    assert_eq!(h.decoder.decode(&mut event), Ok(EventKind::Check));

    // the insert body is the event subtree as the decoder serialized it
    let body = event.pointer("/event").expect("event subtree").to_string();
    assert_eq!(
        h.log(),
        vec![
            "agent 007 sca query 42".to_string(),
            format!("agent 007 sca insert {body}"),
        ]
    );
    assert_eq!(event.pointer(TARGET), Some(&json!(true)));
    assert_eq!(event.pointer("/sca/type"), Some(&json!("check")));
    assert_eq!(event.pointer("/sca/check/result"), Some(&json!("passed")));
    assert_eq!(event.pointer("/sca/check/id"), Some(&json!(42)));
    assert_eq!(event.pointer("/sca/policy"), Some(&json!("P")));
    assert!(event.pointer("/sca/check/previous_result").is_none());
    assert!(h.dumps().is_empty());
}

#[test]
fn changed_result_is_updated_and_carries_the_previous_one() {
    let h = Harness::new(&[("query", found("failed"))]);
    let mut event = check_event();
    assert_eq!(h.decoder.decode(&mut event), Ok(EventKind::Check));

    assert_eq!(
        h.log(),
        vec![
            "agent 007 sca query 42".to_string(),
            "agent 007 sca update 42|passed|||1".to_string(),
        ]
    );
    assert_eq!(event.pointer("/sca/type"), Some(&json!("check")));
    assert_eq!(
        event.pointer("/sca/check/previous_result"),
        Some(&json!("failed"))
    );
    assert_eq!(event.pointer("/sca/check/result"), Some(&json!("passed")));
}

#[test]
fn unchanged_result_updates_the_store_but_does_not_normalize() {
    let h = Harness::new(&[("query", found("passed"))]);
    let mut event = check_event();
    assert_eq!(h.decoder.decode(&mut event), Ok(EventKind::Check));

    assert_eq!(
        h.log(),
        vec![
            "agent 007 sca query 42".to_string(),
            "agent 007 sca update 42|passed|||1".to_string(),
        ]
    );
    assert!(event.pointer("/sca").is_none());
    assert_eq!(event.pointer(TARGET), Some(&json!(true)));
}

#[test]
fn status_and_reason_replace_a_missing_result() {
    let h = Harness::new(&[("query", found("passed"))]);
    let mut event = check_event();
    let check = event
        .pointer_mut("/event/check")
        .and_then(Value::as_object_mut)
        .expect("check object");
    check.remove("result");
    check.insert("status".into(), json!("Not applicable"));
    check.insert("reason".into(), json!("package not installed"));

    assert_eq!(h.decoder.decode(&mut event), Ok(EventKind::Check));
    assert_eq!(
        h.log()[1],
        "agent 007 sca update 42||Not applicable|package not installed|1"
    );
    // status differs from the stored result, so the event normalizes
    assert_eq!(
        event.pointer("/sca/check/status"),
        Some(&json!("Not applicable"))
    );
    assert_eq!(
        event.pointer("/sca/check/reason"),
        Some(&json!("package not installed"))
    );
    assert!(event.pointer("/sca/check/result").is_none());
}

#[test]
fn first_sighting_also_persists_compliance_and_rules() {
    let h = Harness::new(&[("query", not_found())]);
    let mut event = check_event();
    let check = event
        .pointer_mut("/event/check")
        .and_then(Value::as_object_mut)
        .expect("check object");
    check.insert(
        "compliance".into(),
        json!({"cis": "1.5.2", "pci_dss": ["1.1"]}),
    );
    check.insert(
        "rules".into(),
        json!(["f:/etc/ssh/sshd_config -> exists", "x:unknown tag"]),
    );

    assert_eq!(h.decoder.decode(&mut event), Ok(EventKind::Check));
    let log = h.log();
    assert_eq!(log.len(), 4);
    assert_eq!(log[0], "agent 007 sca query 42");
    assert!(log[1].starts_with("agent 007 sca insert {"));
    // non-string compliance values and unknown rule tags are skipped
    assert_eq!(log[2], "agent 007 sca insert_compliance 42|cis|1.5.2");
    assert_eq!(
        log[3],
        "agent 007 sca insert_rules 42|file|f:/etc/ssh/sshd_config -> exists"
    );
}

#[test]
fn compliance_entries_are_written_in_key_order() {
    let h = Harness::new(&[("query", not_found())]);
    let mut event = check_event();
    // keys arrive out of alphabetical order; the document map sorts them
    event
        .pointer_mut("/event/check")
        .and_then(Value::as_object_mut)
        .expect("check object")
        .insert(
            "compliance".into(),
            json!({"pci_dss": "1.1", "cis": "1.5.2"}),
        );

    assert_eq!(h.decoder.decode(&mut event), Ok(EventKind::Check));
    let log = h.log();
    assert_eq!(
        log[2..].to_vec(),
        vec![
            "agent 007 sca insert_compliance 42|cis|1.5.2".to_string(),
            "agent 007 sca insert_compliance 42|pci_dss|1.1".to_string(),
        ]
    );
}

#[test]
fn comma_separated_targets_become_arrays() {
    let h = Harness::new(&[("query", not_found())]);
    let mut event = check_event();
    let check = event
        .pointer_mut("/event/check")
        .and_then(Value::as_object_mut)
        .expect("check object");
    check.insert("file".into(), json!("/etc/passwd,/etc/shadow"));
    check.insert("command".into(), json!("sysctl net.ipv4.ip_forward"));

    assert_eq!(h.decoder.decode(&mut event), Ok(EventKind::Check));
    assert_eq!(
        event.pointer("/sca/check/file"),
        Some(&json!(["/etc/passwd", "/etc/shadow"]))
    );
    assert_eq!(
        event.pointer("/sca/check/command"),
        Some(&json!(["sysctl net.ipv4.ip_forward"]))
    );
    assert!(event.pointer("/sca/check/directory").is_none());
}

#[test]
fn rejected_save_is_not_fatal() {
    // the update failure is logged and the event still succeeds
    let h = Harness::new(&[("query", found("failed")), ("update", store_err())]);
    let mut event = check_event();
    assert_eq!(h.decoder.decode(&mut event), Ok(EventKind::Check));
    assert_eq!(event.pointer(TARGET), Some(&json!(true)));
    assert_eq!(event.pointer("/sca/check/result"), Some(&json!("passed")));
}

#[test]
fn failed_previous_result_lookup_rejects_the_event() {
    let h = Harness::new(&[("query", store_err())]);
    let mut event = check_event();
    assert_eq!(
        h.decoder.decode(&mut event),
        Err(DecodeError::PreviousResultLookup)
    );
    assert_eq!(h.log(), vec!["agent 007 sca query 42".to_string()]);
    assert_eq!(event.pointer(TARGET), Some(&json!(false)));
    assert!(event.pointer("/sca").is_none());
}

#[test]
fn schema_violations_reject_the_event_before_any_store_traffic() {
    let h = Harness::new(&[]);
    let mut event = check_event();
    event
        .pointer_mut("/event/check")
        .and_then(Value::as_object_mut)
        .expect("check object")
        .remove("title");
    assert_eq!(
        h.decoder.decode(&mut event),
        Err(DecodeError::InvalidCheckEvent)
    );
    assert!(h.log().is_empty());
    assert_eq!(event.pointer(TARGET), Some(&json!(false)));
}

#[test]
fn a_status_without_its_reason_is_invalid() {
    let h = Harness::new(&[]);
    let mut event = check_event();
    let check = event
        .pointer_mut("/event/check")
        .and_then(Value::as_object_mut)
        .expect("check object");
    check.remove("result");
    check.insert("status".into(), json!("Not applicable"));
    assert_eq!(
        h.decoder.decode(&mut event),
        Err(DecodeError::InvalidCheckEvent)
    );
    assert!(h.log().is_empty());
}

proptest! {
    // splitting a comma-separated field and rejoining it must restore the
    // original string
    #[test]
    fn csv_split_is_lossless(parts in proptest::collection::vec("[a-zA-Z0-9 /_.-]*", 1..5)) {
        let joined = parts.join(",");
        let h = Harness::new(&[("query", not_found())]);
        let mut event = check_event();
        event
            .pointer_mut("/event/check")
            .and_then(Value::as_object_mut)
            .expect("check object")
            .insert("file".into(), json!(joined.clone()));
        h.decoder.decode(&mut event).expect("decoded");

        let split: Vec<String> = event
            .pointer("/sca/check/file")
            .and_then(Value::as_array)
            .expect("file array")
            .iter()
            .map(|v| v.as_str().expect("string element").to_string())
            .collect();
        prop_assert_eq!(split.join(","), joined);
    }
}
