//! Value Resolver Chain (C6) and its supporting stores (spec.md §4.6, §6).

pub mod chain;
pub mod credential_store;
pub mod otp;

pub use chain::{resolve_missing_values, ConfiguredResolver, ResolveContext, ResolveInput, ResolveOutput, SecretSource};
pub use credential_store::CredentialStore;
