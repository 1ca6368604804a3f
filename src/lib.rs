//! # Livepoll Session Library
//!
//! This library provides the server-side core of a live classroom
//! polling system. A single teacher creates multiple-choice polls and
//! opens them to the connected students; each student votes once per
//! poll within a time window; tallies are broadcast live to everyone; a
//! shared chat channel rides along.
//!
//! The crate owns the poll lifecycle, vote acceptance, deadline timing,
//! result aggregation, and the event protocol that keeps disconnected,
//! independently-clocked clients in sync. It is transport-agnostic: the
//! embedding layer owns the actual connections and drives a
//! [`classroom::Classroom`] with incoming events, a tunnel-finder
//! closure for outbound delivery, and a scheduler for deadline alarms.

#![cfg_attr(all(coverage_nightly, test), feature(coverage_attribute))]
#![deny(missing_docs)]
#![deny(rustdoc::missing_crate_level_docs)]
#![warn(clippy::pedantic)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::doc_markdown)]

pub mod classroom;
pub mod constants;
pub mod events;
pub mod poll;
pub mod results;
pub mod roster;
pub mod session;
