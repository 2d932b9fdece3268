use ulid::Ulid;

use crate::model::Ms;

/// Every way a request can be rejected, as an explicit kind. The wire layer
/// maps each kind to its own SQLSTATE; nothing is classified by catching
/// broad error categories. All kinds reject with zero mutation.
#[derive(Debug)]
pub enum EngineError {
    /// A booking or query interval with `end <= start`.
    InvalidInterval { start: Ms, end: Ms },
    /// Malformed input: blank room name, zero capacity, over-long text.
    InvalidArgument(&'static str),
    RoomNotFound(Ulid),
    BookingNotFound(Ulid),
    /// The requested span overlaps the carried existing booking.
    SlotConflict(Ulid),
    /// A room or booking with this id is already registered.
    AlreadyExists(Ulid),
    /// Room name already taken (case-insensitive).
    NameTaken(String),
    /// Room still has live bookings and cannot be deleted.
    RoomOccupied(Ulid),
    LimitExceeded(&'static str),
    /// Storage failure. Detail is for the log; callers get a generic message.
    Wal(String),
}

impl std::fmt::Display for EngineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EngineError::InvalidInterval { start, end } => {
                write!(f, "invalid interval: [{start}, {end}) is empty or reversed")
            }
            EngineError::InvalidArgument(msg) => write!(f, "invalid argument: {msg}"),
            EngineError::RoomNotFound(id) => write!(f, "room not found: {id}"),
            EngineError::BookingNotFound(id) => write!(f, "booking not found: {id}"),
            EngineError::SlotConflict(id) => {
                write!(f, "time slot already booked by: {id}")
            }
            EngineError::AlreadyExists(id) => write!(f, "already exists: {id}"),
            EngineError::NameTaken(name) => {
                write!(f, "room name already exists: {name}")
            }
            EngineError::RoomOccupied(id) => {
                write!(f, "cannot delete room {id}: bookings still exist")
            }
            EngineError::LimitExceeded(msg) => write!(f, "limit exceeded: {msg}"),
            EngineError::Wal(e) => write!(f, "WAL error: {e}"),
        }
    }
}

impl std::error::Error for EngineError {}
