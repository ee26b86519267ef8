//! Cross-crate integration tests for AttestBridge
//!
//! This test suite validates:
//! - Configuration driving provider selection end to end
//! - Hardware provider behavior over a mocked foreign bridge
//! - Cloud integrity tokens layered over the hardware provider
//! - The process-scoped registry used by host bridges
//! - Mapping of host bridge failures into request faults

pub mod test_utils;

#[cfg(test)]
mod end_to_end_tests;

#[cfg(test)]
mod registry_tests;
