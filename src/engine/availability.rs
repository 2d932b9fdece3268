use crate::model::*;

// ── Free-slot computation ─────────────────────────────────────────

/// Compute the maximal unbooked sub-intervals of `query` for one room, in
/// ascending order.
///
/// Single left-to-right sweep over the bookings intersecting the window
/// (already sorted by start): a gap before a booking becomes a free slot,
/// then the cursor jumps to that booking's end. `max` keeps the cursor
/// monotone, which clamps bookings straddling the window start and merges
/// overlapping or touching spans should the interval list ever contain any.
pub fn free_slots(room: &RoomState, query: &Span) -> Vec<Span> {
    let mut free = Vec::new();
    let mut cursor = query.start;
    for b in room.overlapping(query) {
        if b.span.start > cursor {
            free.push(Span::new(cursor, b.span.start));
        }
        cursor = cursor.max(b.span.end);
    }
    if query.end > cursor {
        free.push(Span::new(cursor, query.end));
    }
    free
}
