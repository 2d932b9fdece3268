//! roomd is a room-booking engine that speaks the Postgres wire protocol.
//! Bookings are exclusive per room over half-open millisecond intervals;
//! state lives in memory and is rebuilt from a write-ahead log on start.

pub mod auth;
pub mod compactor;
pub mod engine;
pub mod limits;
pub mod model;
pub mod notify;
pub mod observability;
pub mod sql;
pub mod tls;
pub mod wal;
pub mod wire;
