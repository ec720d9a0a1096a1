//! Chain data providers.
//!
//! - `ChainDataProvider`: read interface the listener consumes
//! - `EvmRpcProvider`: JSON-RPC implementation for EVM chains
//! - `HttpTransportClient`: HTTP transport with weighted endpoint failover
//! - `ProviderPool`: providers cached per pair

mod error;
mod pool;
mod provider;
mod providers;
mod transports;

pub use error::ProviderError;
pub use pool::{ProviderPool, ProviderPoolTrait};
pub use provider::ChainDataProvider;
pub use providers::EvmRpcProvider;
pub use transports::{
	rpc_request, BlockchainTransport, HttpTransportClient, TransientErrorRetryStrategy,
	TransportError, ROTATE_ON_ERROR_CODES,
};
