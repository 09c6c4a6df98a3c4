//! Work-item producers: backfill sweeper, new-block listener, event
//! listener.
//!
//! Each producer is an independent task holding the gateway, a queue
//! sender and a supervisor handle. Producers never share state; the only
//! backpressure they feel is a full queue.

pub mod backfill;
pub mod blocks;
pub mod events;
