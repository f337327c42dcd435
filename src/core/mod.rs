//! Core modules for the consensus reality check.
//!
//! Probe contract, the run fan-out, aggregation, the compliance gate and
//! the shared primitives they lean on (config, storage, event log).

pub mod assets;
pub mod audit;
pub mod config;
pub mod consensus;
pub mod db;
pub mod drift;
pub mod error;
pub mod events;
pub mod gate;
pub mod observation;
pub mod output;
pub mod probe;
pub mod runner;
pub mod store;
pub mod time;
pub mod trust;
