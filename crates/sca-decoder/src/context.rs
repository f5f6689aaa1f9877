// SPDX-License-Identifier: MIT OR Apache-2.0
//! Per-invocation decode context and prebuilt field paths.

use std::sync::{Arc, Mutex};

use sca_core::{EventView, Field};
use sca_forwarder::{DumpSink, push_dump_request};
use sca_store::{SearchResult, StoreQuery, apply, search_and_parse};

/// Shared handle to the policy-monitoring store client.
pub type SharedStore = Arc<Mutex<dyn StoreQuery + Send>>;

/// Shared handle to the dump-request forwarder.
pub type SharedSink = Arc<Mutex<dyn DumpSink + Send>>;

/// Destination prefix for normalized output.
const DEST_PREFIX: &str = "/sca";

// ---------------------------------------------------------------------------
// FieldPaths
// ---------------------------------------------------------------------------

/// Absolute source and destination pointers for every [`Field`].
///
/// Built once when the decoder is constructed; both sides are populated for
/// all fields simultaneously so handlers never assemble a pointer by hand.
#[derive(Debug)]
pub struct FieldPaths {
    source: Vec<String>,
    dest: Vec<String>,
}

impl FieldPaths {
    /// Root every field's relative path under `source_prefix` (input side)
    /// and under `/sca` (output side).
    #[must_use]
    pub fn new(source_prefix: &str) -> Self {
        let mut source = Vec::with_capacity(Field::ALL.len());
        let mut dest = Vec::with_capacity(Field::ALL.len());
        for field in Field::ALL {
            source.push(format!("{source_prefix}{}", field.relative_path()));
            dest.push(format!("{DEST_PREFIX}{}", field.relative_path()));
        }
        Self { source, dest }
    }

    /// Source-side pointer of `field`.
    #[must_use]
    pub fn src(&self, field: Field) -> &str {
        &self.source[field.index()]
    }

    /// Destination-side pointer of `field`.
    #[must_use]
    pub fn dst(&self, field: Field) -> &str {
        &self.dest[field.index()]
    }
}

// ---------------------------------------------------------------------------
// DecodeContext
// ---------------------------------------------------------------------------

/// Everything a handler needs for one event: the event view, the agent
/// identity, the path maps, and the shared client handles.
///
/// No state survives the invocation; whatever must persist lives in the
/// store.
pub(crate) struct DecodeContext<'a> {
    /// Mutable view over the event document.
    pub view: EventView<'a>,
    /// Identity of the reporting agent.
    pub agent_id: String,
    /// Prebuilt source/destination pointers.
    pub paths: &'a FieldPaths,
    store: &'a SharedStore,
    sink: &'a SharedSink,
}

impl<'a> DecodeContext<'a> {
    pub(crate) fn new(
        view: EventView<'a>,
        agent_id: String,
        paths: &'a FieldPaths,
        store: &'a SharedStore,
        sink: &'a SharedSink,
    ) -> Self {
        Self {
            view,
            agent_id,
            paths,
            store,
            sink,
        }
    }

    // -- store access -------------------------------------------------------

    /// Build a store request for this agent.
    pub(crate) fn request(&self, verb: &str, args: &str) -> String {
        sca_store::request(&self.agent_id, verb, args)
    }

    /// Run a lookup and interpret its `found` payload.
    pub(crate) fn search(&self, request: &str, parse_tail: bool) -> SearchResult {
        let mut store = self.store.lock().expect("store lock poisoned");
        search_and_parse(&mut *store, request, parse_tail)
    }

    /// Run a write, reporting acknowledgement only.
    pub(crate) fn apply(&self, request: &str) -> bool {
        let mut store = self.store.lock().expect("store lock poisoned");
        apply(&mut *store, request)
    }

    /// Ask the agent to re-send its check results for `policy_id`.
    pub(crate) fn push_dump(&self, policy_id: &str, first_scan: bool) {
        let mut sink = self.sink.lock().expect("dump sink lock poisoned");
        push_dump_request(&mut *sink, &self.agent_id, policy_id, first_scan);
    }

    // -- event access -------------------------------------------------------

    /// Whether `field` exists on the source side.
    pub(crate) fn present(&self, field: Field) -> bool {
        self.view.exists(self.paths.src(field))
    }

    /// Source string, empty when absent or not a string.
    pub(crate) fn source_string(&self, field: Field) -> String {
        self.view
            .get_str(self.paths.src(field))
            .unwrap_or_default()
            .to_string()
    }

    /// Source integer, zero when absent or not integral.
    pub(crate) fn source_int(&self, field: Field) -> i64 {
        self.view.get_int(self.paths.src(field)).unwrap_or_default()
    }

    /// Write a string at the field's destination pointer.
    pub(crate) fn set_dest_string(&mut self, value: &str, field: Field) {
        let paths = self.paths;
        self.view.set_string(value, paths.dst(field));
    }

    /// Clone the field's source subtree to its destination pointer, when
    /// present.
    pub(crate) fn copy_if_present(&mut self, field: Field) {
        let paths = self.paths;
        self.view.copy(paths.dst(field), paths.src(field));
    }

    /// Split a comma-separated source string into an array at the field's
    /// destination pointer. Absent fields are left alone.
    pub(crate) fn split_csv_to_dest(&mut self, field: Field) {
        let paths = self.paths;
        let Some(value) = self.view.get_str(paths.src(field)).map(str::to_owned) else {
            return;
        };
        self.view.set_array(paths.dst(field));
        for part in value.split(',') {
            self.view.append_string(part, paths.dst(field));
        }
    }
}
