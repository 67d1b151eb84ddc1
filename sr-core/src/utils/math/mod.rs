//! Decision logic for the Sonar Rover.
//!
//! This module holds the pure behavior selector. Nothing in here touches a peripheral.

pub mod behavior;
