//! Collections shared between the simulator and its harnesses.
pub mod pq;
