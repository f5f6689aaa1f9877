// SPDX-License-Identifier: MIT OR Apache-2.0
#![doc = include_str!("../README.md")]
//! sca-decoder
#![deny(unsafe_code)]
#![warn(missing_docs)]

use sca_config::DecoderSettings;
use sca_core::{EventView, Field};
use serde_json::Value;
use tracing::debug;

mod check;
mod context;
mod dump;
mod helpers;
mod policies;
mod summary;
mod validate;

pub use context::{FieldPaths, SharedSink, SharedStore};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Why an event was rejected.
///
/// Every variant marks the event's target field `false`; none of them stops
/// the enclosing engine.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    /// The check event failed schema or cross-field validation.
    #[error("invalid check event")]
    InvalidCheckEvent,

    /// The summary event failed schema validation.
    #[error("invalid scan info event")]
    InvalidScanInfoEvent,

    /// The policies event failed schema validation.
    #[error("invalid policies event")]
    InvalidPoliciesEvent,

    /// The dump_end event failed schema validation.
    #[error("invalid dump event")]
    InvalidDumpEvent,

    /// The store could not answer the previous-result lookup, so the check
    /// cannot be reconciled.
    #[error("store lookup for previous check result failed")]
    PreviousResultLookup,

    /// The source prefix or the agent id is missing from the document.
    #[error("event prefix or agent id not found")]
    MissingPrefix,

    /// The event carries no type discriminator.
    #[error("event type not found")]
    MissingType,

    /// The type discriminator is not one of the four known kinds.
    #[error("unknown event type: {found}")]
    UnknownType {
        /// The discriminator that was found.
        found: String,
    },
}

// ---------------------------------------------------------------------------
// EventKind
// ---------------------------------------------------------------------------

/// The four event kinds the decoder understands, parsed once at dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    /// One compliance check outcome.
    Check,
    /// End-of-scan summary for a policy.
    Summary,
    /// The agent's full list of applied policies.
    Policies,
    /// End of a requested check-results dump.
    DumpEnd,
}

impl EventKind {
    /// Wire-level discriminator of this kind.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            EventKind::Check => "check",
            EventKind::Summary => "summary",
            EventKind::Policies => "policies",
            EventKind::DumpEnd => "dump_end",
        }
    }

    fn from_type(value: &str) -> Option<Self> {
        match value {
            "check" => Some(EventKind::Check),
            "summary" => Some(EventKind::Summary),
            "policies" => Some(EventKind::Policies),
            "dump_end" => Some(EventKind::DumpEnd),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// ScaDecoder
// ---------------------------------------------------------------------------

/// The SCA decoding stage.
///
/// Built once per configured rule; [`ScaDecoder::decode`] is then invoked
/// per event with exclusive access to the document. The decoder itself keeps
/// no per-event state — everything durable lives in the store behind the
/// shared client handles.
pub struct ScaDecoder {
    agent_id_path: String,
    target_field: String,
    paths: FieldPaths,
    store: SharedStore,
    sink: SharedSink,
}

impl ScaDecoder {
    /// Bind the event pointers and client handles.
    ///
    /// `source_prefix` roots all source-side field paths; `agent_id_path`
    /// locates the reporting agent's id string; `target_field` receives the
    /// per-event success boolean.
    #[must_use]
    pub fn new(
        source_prefix: &str,
        agent_id_path: &str,
        target_field: &str,
        store: SharedStore,
        sink: SharedSink,
    ) -> Self {
        Self {
            agent_id_path: agent_id_path.to_string(),
            target_field: target_field.to_string(),
            paths: FieldPaths::new(source_prefix),
            store,
            sink,
        }
    }

    /// Build a decoder from loaded settings.
    #[must_use]
    pub fn from_settings(settings: &DecoderSettings, store: SharedStore, sink: SharedSink) -> Self {
        Self::new(
            &settings.source_prefix,
            &settings.agent_id_path,
            &settings.target_field,
            store,
            sink,
        )
    }

    /// Decode one event in place.
    ///
    /// Exactly one boolean is written to the target field: `true` when the
    /// matching handler completed, `false` otherwise. The returned error is
    /// the failure trace for engine-level logging.
    ///
    /// # Errors
    ///
    /// Returns a [`DecodeError`] when the document lacks the configured
    /// prefix, the agent id, or a known event type, or when a handler
    /// rejects the event.
    pub fn decode(&self, event: &mut Value) -> Result<EventKind, DecodeError> {
        let outcome = self.dispatch(event);
        EventView::new(event).set_bool(outcome.is_ok(), &self.target_field);
        if let Err(err) = &outcome {
            debug!(target: "sca.decoder", %err, "event rejected");
        }
        outcome
    }

    fn dispatch(&self, event: &mut Value) -> Result<EventKind, DecodeError> {
        if event.pointer(self.paths.src(Field::Root)).is_none() {
            return Err(DecodeError::MissingPrefix);
        }
        let agent_id = event
            .pointer(&self.agent_id_path)
            .and_then(Value::as_str)
            .map(str::to_owned)
            .ok_or(DecodeError::MissingPrefix)?;
        let kind = match event.pointer(self.paths.src(Field::Type)).and_then(Value::as_str) {
            None => return Err(DecodeError::MissingType),
            Some(value) => EventKind::from_type(value).ok_or_else(|| DecodeError::UnknownType {
                found: value.to_string(),
            })?,
        };

        let mut ctx = context::DecodeContext::new(
            EventView::new(event),
            agent_id,
            &self.paths,
            &self.store,
            &self.sink,
        );
        match kind {
            EventKind::Check => check::handle(&mut ctx)?,
            EventKind::Summary => summary::handle(&mut ctx)?,
            EventKind::Policies => policies::handle(&mut ctx)?,
            EventKind::DumpEnd => dump::handle(&mut ctx)?,
        }
        Ok(kind)
    }
}
