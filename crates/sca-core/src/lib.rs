// SPDX-License-Identifier: MIT OR Apache-2.0
#![doc = include_str!("../README.md")]
//! sca-core
#![deny(unsafe_code)]
#![warn(missing_docs)]

/// Closed field enumeration and path registry.
pub mod fields;
/// Typed accessors over a mutable JSON event document.
pub mod view;

pub use fields::{Condition, Field, FieldType, UnknownField};
pub use view::EventView;
