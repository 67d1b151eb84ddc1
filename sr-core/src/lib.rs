//! Core drivers and control loop for the Sonar Rover on no-std embedded platforms.
//!
//! For a host-side simulation, see the `mock-mcu` application.
#![no_std]

pub mod utils;
