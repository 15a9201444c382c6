//! # collab-kit
//!
//! Replicated data types for collaborative editing backends.
//!
//! A CRDT (Conflict-free Replicated Data Type) is a data structure that can be
//! replicated across multiple devices and updated independently. Replicas that
//! have seen the same updates, in any order and with duplicates, end up in the
//! same state without coordination.
//!
//! ## `no_std` Support
//!
//! This crate supports `no_std` environments with the `alloc` crate.
//! Disable the default `std` feature in your `Cargo.toml`:
//!
//! ```toml
//! [dependencies]
//! collab-kit = { version = "0.1", default-features = false }
//! ```
//!
//! ## Quick Start
//!
//! ```
//! use collab_kit::prelude::*;
//!
//! let mut clock = LamportClock::new(1);
//!
//! let mut doc: LWWMap<&str, i32> = LWWMap::new();
//! doc.insert("x", 1, clock.tick());
//! doc.remove("x", clock.tick());
//! assert_eq!(doc.query(&"x"), None);
//!
//! // Grow-only counter
//! let mut c1: GCounter = GCounter::new("device-1");
//! c1.increment();
//!
//! let mut c2: GCounter = GCounter::new("device-2");
//! c2.increment();
//!
//! c1.merge(&c2);
//! assert_eq!(c1.value(), 2);
//! ```
//!
//! ## Available CRDTs
//!
//! ### State-based
//! - [`GCounter`] - Grow-only counter (increment only, slot-wise max merge)
//! - [`LWWRegister`] - Last-writer-wins register (stamp-based resolution)
//!
//! ### Operation-based
//! - [`LWWMap`] - Last-writer-wins map with tombstoned removal
//!
//! ## Stamps
//!
//! Every update carries a caller-supplied stamp with a strict total order.
//! [`clock::Stamp`] pairs a Lamport counter with a replica id so that two
//! distinct events never compare equal.

#![cfg_attr(not(feature = "std"), no_std)]
#![warn(missing_docs)]

extern crate alloc;

mod crdt;
mod gcounter;
mod lww_map;
mod lww_register;

pub mod clock;
pub mod prelude;

pub use crdt::{Crdt, OpCrdt};
pub use gcounter::GCounter;
pub use lww_map::{Entry, LWWMap, MapOp};
pub use lww_register::LWWRegister;
