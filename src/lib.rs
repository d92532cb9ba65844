//! Material stock estimation for building registers
//!
//! Turns sparse cadastral attributes into a per-building bill of material
//! masses: geometry is estimated from the register, a construction archetype
//! is drawn for each building component, and the archetypes' bills of
//! materials are scaled by the estimated geometry.

pub mod assignment;
pub mod bom;
pub mod calculator;
pub mod catalog;
pub mod config;
pub mod db;
pub mod error;
pub mod geometry;
pub mod models;
pub mod pipeline;
pub mod sample;

pub use error::{Error, Result};
