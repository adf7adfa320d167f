use alloy_primitives::B256;
use thiserror::Error;

/// Failures talking to the chain. `Unavailable` and `UnsupportedChain` mean
/// queries should not be attempted at all; the rest are query failures.
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("no chain provider is connected")]
    Unavailable,

    #[error("chain id {0} is not in the supported network list")]
    UnsupportedChain(u64),

    #[error("HTTP request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("rpc error {code}: {message}")]
    Rpc { code: i64, message: String },

    #[error("failed to decode {what}: {reason}")]
    Decode { what: &'static str, reason: String },

    #[error("receipt for {0} not confirmed after {1} polls")]
    Unconfirmed(B256, u32),
}

impl GatewayError {
    pub fn decode(what: &'static str, reason: impl Into<String>) -> Self {
        GatewayError::Decode { what, reason: reason.into() }
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum AddressError {
    #[error("'{0}' is not a valid address")]
    InvalidAddress(String),
}

#[derive(Debug, Error)]
pub enum PositionError {
    #[error(transparent)]
    Gateway(#[from] GatewayError),

    #[error("vault decimals {0} out of range")]
    DecimalsOutOfRange(u8),

    #[error("arithmetic overflow while computing {0}")]
    Overflow(&'static str),
}
