//! Session token handling.
//!
//! This module provides:
//! - `TokenStore`: the single owner of the persisted session token
//! - `Claims` / `User`: identity and expiry decoded from the token payload
//! - `TokenStorage` backends: in-memory, session file, OS keychain
//!
//! A token counts as valid only while its payload decodes and `exp` lies
//! in the future. Decode failures are never surfaced as errors.

pub mod claims;
pub mod storage;
pub mod token_store;

pub use claims::{Claims, User};
pub use storage::{FileStorage, KeyringStorage, MemoryStorage, TokenStorage, TOKEN_KEY};
pub use token_store::TokenStore;
