//! Dispatch-driven simulation.
//!
//! Provides a discrete-event simulator that places activities on resources
//! in the order the dispatching core ranks them.
//!
//! # Algorithm
//!
//! `DispatchSimulator` advances a clock from event to event (a resource
//! becoming free, an activity being released). At each event every idle
//! resource builds a sorted dispatch list and starts its best candidate.
//! Greedy and myopic, but fast and fully deterministic.
//!
//! # References
//!
//! - Pinedo (2016), "Scheduling: Theory, Algorithms, and Systems", Ch. 14
//! - Panwalkar & Iskander (1977), "A Survey of Scheduling Rules"

mod simulation;

pub use simulation::{DispatchSimulator, SimulationOutcome};
