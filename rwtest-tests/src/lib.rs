//! Host-based tests for the receive-window test controller

pub mod tokio_clock;

#[cfg(test)]
mod scenario_tests;
#[cfg(test)]
mod property_tests;
#[cfg(test)]
mod edge_input_tests;
