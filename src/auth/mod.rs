//! OAuth access token provider for the Daraja API

pub mod fetcher;
pub mod token;

pub use fetcher::{basic_credentials, CredentialFetcher, DarajaCredentialFetcher, TokenGrant};
pub use token::{
    parse_expires_in, AccessTokenProvider, DEFAULT_TOKEN_LIFETIME_SECS, TOKEN_EXPIRY_BUFFER,
};
