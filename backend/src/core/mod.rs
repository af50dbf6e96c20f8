//! Time, clocks and periodic cadences

pub mod clock;
pub mod schedule;
pub mod time;
