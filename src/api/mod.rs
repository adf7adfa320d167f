pub mod abi;
pub mod fixture;
pub mod pager;
pub mod provider;
pub mod rpc;
