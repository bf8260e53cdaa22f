//! # Equipment Interface
//!
//! This module defines the interface structures which are exchanged with the flight controller
//! bridge and the trajectory planner.

// -----------------------------------------------------------------------------------------------
// MODULES
// -----------------------------------------------------------------------------------------------

pub mod fc;
pub mod planner;
