use crate::model::*;

use super::EngineError;

/// Reject an empty or reversed interval before anything else, then apply the
/// range guard-rails. Returns the validated span so callers never construct
/// one from unchecked input.
pub(crate) fn validate_interval(start: Ms, end: Ms) -> Result<Span, EngineError> {
    use crate::limits::*;
    if end <= start {
        return Err(EngineError::InvalidInterval { start, end });
    }
    if start < MIN_VALID_TIMESTAMP_MS || end > MAX_VALID_TIMESTAMP_MS {
        return Err(EngineError::LimitExceeded("timestamp out of range"));
    }
    let span = Span::new(start, end);
    if span.duration_ms() > MAX_SPAN_DURATION_MS {
        return Err(EngineError::LimitExceeded("interval too wide"));
    }
    Ok(span)
}

/// The overlap test of the conflict guard. Must be called with the room's
/// write lock held, and the caller must keep holding it until the booking is
/// persisted — that lock is the only thing making check-then-insert atomic.
pub(crate) fn check_no_conflict(room: &RoomState, span: &Span) -> Result<(), EngineError> {
    if let Some(existing) = room.overlapping(span).next() {
        return Err(EngineError::SlotConflict(existing.id));
    }
    Ok(())
}
