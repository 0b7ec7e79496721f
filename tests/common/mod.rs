//! Common test utilities for integration tests

pub mod provider_mock;

#[allow(unused_imports)]
pub use provider_mock::{
    API_KEY, FixedUsers, PROJECT_ID, ProviderMock, TestClaims, TestKeyPair, auth_options, keys,
};
