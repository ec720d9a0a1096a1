//! Chain data provider implementations.

mod evm;

pub use evm::EvmRpcProvider;
