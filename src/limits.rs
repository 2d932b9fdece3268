//! Hard limits. Every externally supplied quantity is bounded before it
//! reaches the engine, so a single client cannot balloon memory or the WAL.

use crate::model::Ms;

/// Rooms a single server will hold.
pub const MAX_ROOMS: usize = 10_000;

/// Live bookings per room.
pub const MAX_BOOKINGS_PER_ROOM: usize = 100_000;

/// Room name length, in bytes, after trimming.
pub const MAX_NAME_LEN: usize = 256;

/// `created_by` length, in bytes, after trimming.
pub const MAX_CREATED_BY_LEN: usize = 256;

/// Widest single booking: 366 days.
pub const MAX_SPAN_DURATION_MS: Ms = 366 * 24 * 3_600_000;

/// Widest availability query window: 10 years.
pub const MAX_QUERY_WINDOW_MS: Ms = 3_653 * 24 * 3_600_000;

/// Timestamps must be on or after the Unix epoch...
pub const MIN_VALID_TIMESTAMP_MS: Ms = 0;

/// ...and before the year 3000.
pub const MAX_VALID_TIMESTAMP_MS: Ms = 32_503_680_000_000;
