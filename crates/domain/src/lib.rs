//! # roomstate-domain
//!
//! Pure domain model for the roomstate activity and automation core.
//!
//! ## Responsibilities
//! - Foundational types: typed identifiers, error conventions, timestamps
//! - Define **Areas** (rooms, zones) and **entity snapshots** read from the host
//! - Define **Activities** (empty, movement, occupied, …) and their catalog
//! - Define **Conditions** (tagged union evaluated against live state)
//! - Define **Apps**, **Action sets** and **Assignments** binding areas to rules
//! - Environmental snapshots and cooldown bookkeeping (pure, clock-free logic)
//!
//! ## Dependency rule
//! This crate has **no internal dependencies**.
//! It must never import anything from `app`, adapters, or external IO crates.
//! All IO boundaries are expressed as traits in the `app` crate (ports).

pub mod error;
pub mod id;
pub mod time;

pub mod activity;
pub mod area;
pub mod automation;
pub mod cooldown;
pub mod definitions;
pub mod entity;
pub mod environment;
pub mod event;
