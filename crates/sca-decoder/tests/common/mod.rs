// SPDX-License-Identifier: MIT OR Apache-2.0
//! Shared harness: a scripted store that records every request, and a
//! recording dump sink.
#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use sca_decoder::{ScaDecoder, SharedSink, SharedStore};
use sca_forwarder::{DumpSink, SendStatus};
use sca_store::{StoreQuery, StoreReply};

/// Target field used by every harness decoder.
pub const TARGET: &str = "/decoded/sca";

/// An `ok found {tail}` reply.
pub fn found(tail: &str) -> StoreReply {
    StoreReply::ok(Some(format!("found {tail}")))
}

/// An `ok not found` reply.
pub fn not_found() -> StoreReply {
    StoreReply::ok(Some("not found".to_string()))
}

/// An `err` reply.
pub fn store_err() -> StoreReply {
    StoreReply::error(Some("err".to_string()))
}

/// Store double answering by verb and recording every request in order.
///
/// Verbs without a scripted reply are acknowledged with a bare `ok`, which
/// is what writes receive.
#[derive(Default)]
pub struct MockStore {
    replies: HashMap<String, StoreReply>,
    pub log: Vec<String>,
}

impl MockStore {
    pub fn with_replies(replies: &[(&str, StoreReply)]) -> Self {
        Self {
            replies: replies
                .iter()
                .map(|(verb, reply)| ((*verb).to_string(), reply.clone()))
                .collect(),
            log: Vec::new(),
        }
    }
}

impl StoreQuery for MockStore {
    fn query(&mut self, request: &str) -> StoreReply {
        self.log.push(request.to_string());
        let verb = request.split_whitespace().nth(3).unwrap_or_default();
        self.replies
            .get(verb)
            .cloned()
            .unwrap_or(StoreReply::ok(None))
    }
}

/// Dump sink double recording every message.
#[derive(Default)]
pub struct MockSink {
    pub connected: bool,
    pub sent: Vec<String>,
}

impl DumpSink for MockSink {
    fn is_connected(&self) -> bool {
        self.connected
    }

    fn connect(&mut self) -> std::io::Result<()> {
        self.connected = true;
        Ok(())
    }

    fn send(&mut self, msg: &str) -> SendStatus {
        self.sent.push(msg.to_string());
        SendStatus::Success
    }

    fn disconnect(&mut self) {
        self.connected = false;
    }
}

/// A decoder wired to the mock store and sink, with inspection helpers.
pub struct Harness {
    pub store: Arc<Mutex<MockStore>>,
    pub sink: Arc<Mutex<MockSink>>,
    pub decoder: ScaDecoder,
}

impl Harness {
    pub fn new(replies: &[(&str, StoreReply)]) -> Self {
        let store = Arc::new(Mutex::new(MockStore::with_replies(replies)));
        let sink = Arc::new(Mutex::new(MockSink::default()));
        let shared_store: SharedStore = store.clone();
        let shared_sink: SharedSink = sink.clone();
        let decoder = ScaDecoder::new("/event", "/agent/id", TARGET, shared_store, shared_sink);
        Self {
            store,
            sink,
            decoder,
        }
    }

    /// Every store request, in the order it was issued.
    pub fn log(&self) -> Vec<String> {
        self.store.lock().expect("store lock").log.clone()
    }

    /// Every dump request, in the order it was sent.
    pub fn dumps(&self) -> Vec<String> {
        self.sink.lock().expect("sink lock").sent.clone()
    }
}
