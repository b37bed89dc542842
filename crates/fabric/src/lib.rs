//! Hive Fabric - In-process event bus for the swarm
//!
//! Every worker of a mission talks through one `MessageFabric`. Delivery is
//! fire-and-forget and a faulty subscriber never disturbs the others.

mod fabric;

pub use fabric::{FabricStats, Handler, HandlerFuture, MessageFabric, SubscriptionId};
