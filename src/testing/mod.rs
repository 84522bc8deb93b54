//! Test-only fakes for the node-environment traits. Not part of the
//! public API surface an embedding node integrates against; gated behind
//! the `testing` feature/module boundary the same way `lib-network`
//! keeps `testing::test_utils` separate from its production modules.

pub mod fakes;
