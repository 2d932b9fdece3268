use ulid::Ulid;

use crate::limits::*;
use crate::model::*;

use super::availability::free_slots;
use super::{Engine, EngineError, SharedRoomState};

impl Engine {
    /// Free slots of one room within `[query_start, query_end)`, under the
    /// room's read lock: a consistent committed view that never blocks other
    /// readers and only waits on in-flight writes to the same room.
    pub async fn compute_availability(
        &self,
        room_id: Ulid,
        query_start: Ms,
        query_end: Ms,
    ) -> Result<Vec<Span>, EngineError> {
        if query_end <= query_start {
            return Err(EngineError::InvalidInterval {
                start: query_start,
                end: query_end,
            });
        }
        // Range before width: the subtraction below is only safe once both
        // bounds are confined to the representable window.
        if query_start < MIN_VALID_TIMESTAMP_MS || query_end > MAX_VALID_TIMESTAMP_MS {
            return Err(EngineError::LimitExceeded("timestamp out of range"));
        }
        if query_end - query_start > MAX_QUERY_WINDOW_MS {
            return Err(EngineError::LimitExceeded("query window too wide"));
        }
        let rs = self
            .get_room(&room_id)
            .ok_or(EngineError::RoomNotFound(room_id))?;
        let guard = rs.read().await;

        let query = Span::new(query_start, query_end);
        Ok(free_slots(&guard, &query))
    }

    pub async fn list_rooms(&self) -> Vec<RoomInfo> {
        let rooms: Vec<SharedRoomState> =
            self.state.iter().map(|entry| entry.value().clone()).collect();
        let mut infos = Vec::with_capacity(rooms.len());
        for rs in rooms {
            let guard = rs.read().await;
            infos.push(guard.room_info());
        }
        // ULIDs are time-ordered, so this is creation order.
        infos.sort_by_key(|r| r.id);
        infos
    }

    pub async fn get_room_info(&self, room_id: Ulid) -> Result<RoomInfo, EngineError> {
        let rs = self
            .get_room(&room_id)
            .ok_or(EngineError::RoomNotFound(room_id))?;
        let guard = rs.read().await;
        Ok(guard.room_info())
    }

    /// All bookings of a room, ascending by start time. An unknown room id
    /// yields an empty list; existence is not this operation's concern.
    pub async fn bookings_by_room(&self, room_id: Ulid) -> Result<Vec<BookingInfo>, EngineError> {
        let rs = match self.get_room(&room_id) {
            Some(rs) => rs,
            None => return Ok(vec![]),
        };
        let guard = rs.read().await;
        Ok(guard
            .bookings
            .iter()
            .map(|b| guard.booking_info(b))
            .collect())
    }
}
