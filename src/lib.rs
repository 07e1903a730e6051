//! A Redis-compatible server.
//!
//! The crate covers:
//!
//! - Strings with expiry (GET, SET, INCR), lists (LPUSH, RPUSH, LPOP, RPOP, LRANGE,
//!   LLEN), streams (XADD, XRANGE, XREAD) and sorted sets (ZADD, ZRANK, ZRANGE, ...)
//! - Blocking reads (BLPOP, BRPOP, XREAD BLOCK) that suspend only their own connection
//! - MULTI / EXEC / DISCARD transactions
//! - Pub/Sub (SUBSCRIBE, UNSUBSCRIBE, PUBLISH)
//! - Master-replica replication: handshake, write propagation, offsets and WAIT
//! - Loading an RDB snapshot at startup
//!
//! Clients speak RESP. Every connection runs in its own Tokio task and all of them
//! share one [`server::RedisServer`].

pub mod blocking;
pub mod commands;
pub mod connection;
pub mod input;
pub mod key_value_store;
pub mod pub_sub;
pub mod rdb;
pub mod replication;
pub mod resp;
pub mod server;
pub mod transactions;
