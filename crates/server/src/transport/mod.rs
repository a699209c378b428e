//! Transport layer for geopin server
//!
//! Only tarpc RPC over TCP with JSON framing is provided.

pub mod rpc;
