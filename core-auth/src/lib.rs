//! # Authentication Module
//!
//! Provider credentials as seen by the sync core.
//!
//! ## Overview
//!
//! Sign-in flows run in the host app. Once a flow completes, the host stores
//! the resulting [`OAuthTokens`] through [`TokenStore`]; each provider client
//! reads its own slot to authorize requests and to answer
//! `is_authenticated()`. The sync engine never mutates credentials.

pub mod error;
pub mod token_store;
pub mod types;

pub use error::{AuthError, Result};
pub use token_store::TokenStore;
pub use types::{OAuthTokens, ProviderKind};
