//! # Message Bus
//!
//! The canonical envelope the gateway publishes on behalf of HTTP clients and
//! the request/reply RPC client that carries it over the broker.

pub mod envelope;
pub mod rpc;

pub use envelope::{BusEnvelope, HealthState, MicroserviceHealth};
pub use rpc::{AmqpRpcClient, CorrelationMap, RpcClient};
