//! Integration test driver for `tests/integration/`.
//!
//! Device clients run against in-memory serial links and GPIO built
//! from config; no hardware is needed.

mod actuator_tests;
mod gauge_tests;
mod mock_link;
mod qtm_tests;
mod vfd_tests;
