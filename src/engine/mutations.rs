use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use tokio::sync::{oneshot, RwLock};
use ulid::Ulid;

use crate::limits::*;
use crate::model::*;
use crate::observability;

use super::conflict::{check_no_conflict, validate_interval};
use super::{Engine, EngineError, SharedRoomState, WalCommand};

impl Engine {
    pub async fn create_room(
        &self,
        id: Ulid,
        name: &str,
        capacity: u32,
    ) -> Result<RoomInfo, EngineError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(EngineError::InvalidArgument("room name must not be blank"));
        }
        if name.len() > MAX_NAME_LEN {
            return Err(EngineError::InvalidArgument("room name too long"));
        }
        if capacity == 0 {
            return Err(EngineError::InvalidArgument("capacity must be at least 1"));
        }
        if capacity > i32::MAX as u32 {
            return Err(EngineError::InvalidArgument("capacity too large"));
        }
        if self.state.len() >= MAX_ROOMS {
            return Err(EngineError::LimitExceeded("too many rooms"));
        }

        // Shared side of the compaction gate, held until the append is acked.
        let _gate = self.compact_gate.read().await;

        // Reserve the name (case-insensitive) before the WAL append so two
        // concurrent creates with the same name cannot both pass the check.
        let key = name.to_lowercase();
        match self.names.entry(key.clone()) {
            Entry::Occupied(_) => return Err(EngineError::NameTaken(name.to_string())),
            Entry::Vacant(slot) => {
                slot.insert(id);
            }
        }

        // Reserve the id the same way: of two concurrent creates with one id,
        // the loser must see AlreadyExists, not overwrite the winner's room.
        let rs = RoomState::new(id, name.to_string(), capacity);
        let info = rs.room_info();
        match self.state.entry(id) {
            Entry::Occupied(_) => {
                self.names.remove(&key);
                return Err(EngineError::AlreadyExists(id));
            }
            Entry::Vacant(slot) => {
                slot.insert(Arc::new(RwLock::new(rs)));
            }
        }

        let event = Event::RoomCreated {
            id,
            name: name.to_string(),
            capacity,
        };
        if let Err(e) = self.wal_append(&event).await {
            self.state.remove(&id);
            self.names.remove(&key);
            return Err(e);
        }
        metrics::gauge!(observability::ROOMS_ACTIVE).increment(1.0);
        self.notify.send(id, &event);
        Ok(info)
    }

    pub async fn delete_room(&self, id: Ulid) -> Result<(), EngineError> {
        let rs = self.get_room(&id).ok_or(EngineError::RoomNotFound(id))?;
        let _gate = self.compact_gate.read().await;
        // Hold the write lock across the emptiness check and the map removal
        // so no booking can land in a room that is going away.
        let guard = rs.write().await;
        if !self.state.contains_key(&id) {
            // Lost a delete/delete race; the other call already removed it.
            return Err(EngineError::RoomNotFound(id));
        }
        if !guard.bookings.is_empty() {
            return Err(EngineError::RoomOccupied(id));
        }

        let event = Event::RoomDeleted { id };
        self.wal_append(&event).await?;
        self.state.remove(&id);
        self.names.remove(&guard.name.to_lowercase());
        metrics::gauge!(observability::ROOMS_ACTIVE).decrement(1.0);
        self.notify.send(id, &event);
        self.notify.remove(&id);
        Ok(())
    }

    /// The conflict guard. The room's write lock is held from before the
    /// overlap check until the booking is persisted and applied, so two
    /// agents racing for one slot serialize and exactly one wins. Different
    /// rooms use different locks and never wait on each other.
    pub async fn create_booking(
        &self,
        id: Ulid,
        room_id: Ulid,
        start: Ms,
        end: Ms,
        created_by: Option<String>,
    ) -> Result<BookingInfo, EngineError> {
        let span = validate_interval(start, end)?;
        let created_by = normalize_created_by(created_by);
        if created_by.len() > MAX_CREATED_BY_LEN {
            return Err(EngineError::InvalidArgument("created_by too long"));
        }
        if self.booking_to_room.contains_key(&id) {
            return Err(EngineError::AlreadyExists(id));
        }

        let rs = self
            .get_room(&room_id)
            .ok_or(EngineError::RoomNotFound(room_id))?;
        let _gate = self.compact_gate.read().await;
        let mut guard = rs.write().await;
        // The room may have been deleted between map lookup and lock grant.
        if !self.state.contains_key(&room_id) {
            return Err(EngineError::RoomNotFound(room_id));
        }
        if guard.bookings.len() >= MAX_BOOKINGS_PER_ROOM {
            return Err(EngineError::LimitExceeded("too many bookings on room"));
        }

        if let Err(e) = check_no_conflict(&guard, &span) {
            metrics::counter!(observability::BOOKING_CONFLICTS_TOTAL).increment(1);
            return Err(e);
        }

        let event = Event::BookingCreated {
            id,
            room_id,
            span,
            created_by: created_by.clone(),
        };
        self.persist_and_apply(room_id, &mut guard, &event).await?;
        Ok(BookingInfo {
            id,
            room_id,
            room_name: guard.name.clone(),
            start: span.start,
            end: span.end,
            created_by,
        })
    }

    pub async fn cancel_booking(&self, id: Ulid) -> Result<Ulid, EngineError> {
        let _gate = self.compact_gate.read().await;
        let (room_id, mut guard) = self.resolve_booking_write(&id).await?;
        let event = Event::BookingCancelled { id, room_id };
        self.persist_and_apply(room_id, &mut guard, &event).await?;
        Ok(room_id)
    }

    /// Compact the WAL by rewriting it with only the events needed to
    /// recreate the current state. Runs under the exclusive side of the
    /// compaction gate, so mutations queue behind the swap: every event is
    /// either in the snapshot or flushed to the new file, never dropped.
    pub async fn compact_wal(&self) -> Result<(), EngineError> {
        let _gate = self.compact_gate.write().await;

        let mut events = Vec::new();
        let rooms: Vec<SharedRoomState> =
            self.state.iter().map(|entry| entry.value().clone()).collect();
        for rs in rooms {
            let guard = rs.read().await;
            events.push(Event::RoomCreated {
                id: guard.id,
                name: guard.name.clone(),
                capacity: guard.capacity,
            });
            for b in &guard.bookings {
                events.push(Event::BookingCreated {
                    id: b.id,
                    room_id: guard.id,
                    span: b.span,
                    created_by: b.created_by.clone(),
                });
            }
        }

        let (tx, rx) = oneshot::channel();
        self.wal_tx
            .send(WalCommand::Compact { events, response: tx })
            .await
            .map_err(|_| EngineError::Wal("WAL writer shut down".into()))?;
        rx.await
            .map_err(|_| EngineError::Wal("WAL writer dropped response".into()))?
            .map_err(|e| EngineError::Wal(e.to_string()))
    }

    pub async fn wal_appends_since_compact(&self) -> u64 {
        let (tx, rx) = oneshot::channel();
        if self
            .wal_tx
            .send(WalCommand::AppendsSinceCompact { response: tx })
            .await
            .is_err()
        {
            return 0;
        }
        rx.await.unwrap_or(0)
    }
}

/// Trim, defaulting `NULL` and all-whitespace input to "anonymous".
fn normalize_created_by(raw: Option<String>) -> String {
    let trimmed = raw.as_deref().map(str::trim).unwrap_or("");
    if trimmed.is_empty() {
        "anonymous".into()
    } else {
        trimmed.into()
    }
}
