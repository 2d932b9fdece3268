use super::*;
use crate::limits::*;

const H: Ms = 3_600_000; // 1 hour in ms
const M: Ms = 60_000; // 1 minute in ms

fn test_wal_path(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join("roomd_test_engine");
    std::fs::create_dir_all(&dir).unwrap();
    let path = dir.join(name);
    let _ = std::fs::remove_file(&path);
    path
}

/// Most tests need a room; capacity is descriptive and arbitrary here.
async fn make_room(engine: &Engine, name: &str) -> Ulid {
    let id = Ulid::new();
    engine.create_room(id, name, 4).await.unwrap();
    id
}

// ── Room lifecycle ───────────────────────────────────────

#[tokio::test]
async fn engine_create_and_get_room() {
    let path = test_wal_path("create_room.wal");
    let notify = Arc::new(NotifyHub::new());
    let engine = Engine::new(path, notify).unwrap();

    let id = Ulid::new();
    let info = engine.create_room(id, "Blue Room", 12).await.unwrap();
    assert_eq!(info.id, id);
    assert_eq!(info.name, "Blue Room");
    assert_eq!(info.capacity, 12);

    let fetched = engine.get_room_info(id).await.unwrap();
    assert_eq!(fetched, info);
}

#[tokio::test]
async fn engine_room_name_is_trimmed() {
    let path = test_wal_path("trim_name.wal");
    let notify = Arc::new(NotifyHub::new());
    let engine = Engine::new(path, notify).unwrap();

    let info = engine
        .create_room(Ulid::new(), "  Blue Room  ", 4)
        .await
        .unwrap();
    assert_eq!(info.name, "Blue Room");
}

#[tokio::test]
async fn engine_blank_room_name_rejected() {
    let path = test_wal_path("blank_name.wal");
    let notify = Arc::new(NotifyHub::new());
    let engine = Engine::new(path, notify).unwrap();

    let result = engine.create_room(Ulid::new(), "   ", 4).await;
    assert!(matches!(result, Err(EngineError::InvalidArgument(_))));
    let result = engine.create_room(Ulid::new(), "", 4).await;
    assert!(matches!(result, Err(EngineError::InvalidArgument(_))));
}

#[tokio::test]
async fn engine_zero_capacity_rejected() {
    let path = test_wal_path("zero_capacity.wal");
    let notify = Arc::new(NotifyHub::new());
    let engine = Engine::new(path, notify).unwrap();

    let result = engine.create_room(Ulid::new(), "Atlas", 0).await;
    assert!(matches!(result, Err(EngineError::InvalidArgument(_))));
}

#[tokio::test]
async fn engine_duplicate_room_id_rejected() {
    let path = test_wal_path("dup_room_id.wal");
    let notify = Arc::new(NotifyHub::new());
    let engine = Engine::new(path, notify).unwrap();

    let id = Ulid::new();
    engine.create_room(id, "Atlas", 4).await.unwrap();
    let result = engine.create_room(id, "Other", 4).await;
    assert!(matches!(result, Err(EngineError::AlreadyExists(_))));
}

#[tokio::test]
async fn engine_duplicate_name_rejected_case_insensitive() {
    let path = test_wal_path("dup_name.wal");
    let notify = Arc::new(NotifyHub::new());
    let engine = Engine::new(path, notify).unwrap();

    engine.create_room(Ulid::new(), "Atlas", 4).await.unwrap();
    let result = engine.create_room(Ulid::new(), "atlas", 4).await;
    assert!(matches!(result, Err(EngineError::NameTaken(_))));
    // Trimming happens before the uniqueness check.
    let result = engine.create_room(Ulid::new(), "  ATLAS ", 4).await;
    assert!(matches!(result, Err(EngineError::NameTaken(_))));
}

#[tokio::test]
async fn engine_name_freed_after_delete() {
    let path = test_wal_path("name_freed.wal");
    let notify = Arc::new(NotifyHub::new());
    let engine = Engine::new(path, notify).unwrap();

    let id = make_room(&engine, "Atlas").await;
    engine.delete_room(id).await.unwrap();
    engine.create_room(Ulid::new(), "Atlas", 4).await.unwrap();
}

#[tokio::test]
async fn engine_delete_room_with_bookings_refused() {
    let path = test_wal_path("delete_occupied.wal");
    let notify = Arc::new(NotifyHub::new());
    let engine = Engine::new(path, notify).unwrap();

    let rid = make_room(&engine, "Atlas").await;
    let bid = Ulid::new();
    engine
        .create_booking(bid, rid, 1000, 2000, None)
        .await
        .unwrap();

    let result = engine.delete_room(rid).await;
    assert!(matches!(result, Err(EngineError::RoomOccupied(_))));

    // Cancelling the booking unblocks the deletion.
    engine.cancel_booking(bid).await.unwrap();
    engine.delete_room(rid).await.unwrap();
    assert!(engine.get_room(&rid).is_none());
}

#[tokio::test]
async fn engine_delete_unknown_room() {
    let path = test_wal_path("delete_unknown_room.wal");
    let notify = Arc::new(NotifyHub::new());
    let engine = Engine::new(path, notify).unwrap();

    let result = engine.delete_room(Ulid::new()).await;
    assert!(matches!(result, Err(EngineError::RoomNotFound(_))));
}

#[tokio::test]
async fn engine_get_unknown_room() {
    let path = test_wal_path("get_unknown_room.wal");
    let notify = Arc::new(NotifyHub::new());
    let engine = Engine::new(path, notify).unwrap();

    let result = engine.get_room_info(Ulid::new()).await;
    assert!(matches!(result, Err(EngineError::RoomNotFound(_))));
}

#[tokio::test]
async fn engine_list_rooms_in_creation_order() {
    let path = test_wal_path("list_rooms.wal");
    let notify = Arc::new(NotifyHub::new());
    let engine = Engine::new(path, notify).unwrap();

    let a = make_room(&engine, "Alpha").await;
    let b = make_room(&engine, "Beta").await;
    let c = make_room(&engine, "Gamma").await;

    let rooms = engine.list_rooms().await;
    let ids: Vec<Ulid> = rooms.iter().map(|r| r.id).collect();
    assert_eq!(ids, vec![a, b, c]);
}

// ── Booking lifecycle ────────────────────────────────────

#[tokio::test]
async fn engine_booking_lifecycle() {
    let path = test_wal_path("booking_lifecycle.wal");
    let notify = Arc::new(NotifyHub::new());
    let engine = Engine::new(path, notify).unwrap();

    let rid = make_room(&engine, "Atlas").await;
    let bid = Ulid::new();
    let info = engine
        .create_booking(bid, rid, 1000, 2000, Some("alice".into()))
        .await
        .unwrap();
    assert_eq!(info.id, bid);
    assert_eq!(info.room_id, rid);
    assert_eq!(info.room_name, "Atlas");
    assert_eq!(info.start, 1000);
    assert_eq!(info.end, 2000);
    assert_eq!(info.created_by, "alice");

    let listed = engine.bookings_by_room(rid).await.unwrap();
    assert_eq!(listed, vec![info]);

    engine.cancel_booking(bid).await.unwrap();
    assert!(engine.bookings_by_room(rid).await.unwrap().is_empty());
}

#[tokio::test]
async fn engine_booking_conflict_carries_existing_id() {
    let path = test_wal_path("booking_conflict.wal");
    let notify = Arc::new(NotifyHub::new());
    let engine = Engine::new(path, notify).unwrap();

    let rid = make_room(&engine, "Atlas").await;
    let first = Ulid::new();
    engine
        .create_booking(first, rid, 1000, 2000, None)
        .await
        .unwrap();

    let result = engine
        .create_booking(Ulid::new(), rid, 1500, 2500, None)
        .await;
    match result {
        Err(EngineError::SlotConflict(id)) => assert_eq!(id, first),
        other => panic!("expected SlotConflict, got {other:?}"),
    }
    // The losing request leaves nothing behind.
    assert_eq!(engine.bookings_by_room(rid).await.unwrap().len(), 1);
}

#[tokio::test]
async fn engine_adjacent_bookings_no_conflict() {
    // [100,200) and [200,300) share only the boundary instant.
    let path = test_wal_path("adjacent_ok.wal");
    let notify = Arc::new(NotifyHub::new());
    let engine = Engine::new(path, notify).unwrap();

    let rid = make_room(&engine, "Atlas").await;
    engine
        .create_booking(Ulid::new(), rid, 100, 200, None)
        .await
        .unwrap();
    engine
        .create_booking(Ulid::new(), rid, 200, 300, None)
        .await
        .unwrap();
    assert_eq!(engine.bookings_by_room(rid).await.unwrap().len(), 2);
}

#[tokio::test]
async fn engine_conflict_all_overlap_shapes() {
    let path = test_wal_path("conflict_shapes.wal");
    let notify = Arc::new(NotifyHub::new());
    let engine = Engine::new(path, notify).unwrap();

    let rid = make_room(&engine, "Atlas").await;
    engine
        .create_booking(Ulid::new(), rid, 1000, 2000, None)
        .await
        .unwrap();

    for (start, end) in [
        (1000, 2000), // identical
        (1200, 1800), // contained
        (500, 1500),  // straddles the start
        (1500, 2500), // straddles the end
        (500, 2500),  // contains
        (1999, 2001), // 1ms overlap at the tail
    ] {
        let result = engine
            .create_booking(Ulid::new(), rid, start, end, None)
            .await;
        assert!(
            matches!(result, Err(EngineError::SlotConflict(_))),
            "[{start},{end}) should conflict"
        );
    }
}

#[tokio::test]
async fn engine_invalid_interval_rejected() {
    let path = test_wal_path("invalid_interval.wal");
    let notify = Arc::new(NotifyHub::new());
    let engine = Engine::new(path, notify).unwrap();

    let rid = make_room(&engine, "Atlas").await;
    let result = engine
        .create_booking(Ulid::new(), rid, 2000, 2000, None)
        .await;
    assert!(matches!(result, Err(EngineError::InvalidInterval { .. })));
    let result = engine
        .create_booking(Ulid::new(), rid, 2000, 1000, None)
        .await;
    assert!(matches!(result, Err(EngineError::InvalidInterval { .. })));
    assert!(engine.bookings_by_room(rid).await.unwrap().is_empty());
}

#[tokio::test]
async fn engine_booking_unknown_room() {
    let path = test_wal_path("booking_unknown_room.wal");
    let notify = Arc::new(NotifyHub::new());
    let engine = Engine::new(path, notify).unwrap();

    let result = engine
        .create_booking(Ulid::new(), Ulid::new(), 1000, 2000, None)
        .await;
    assert!(matches!(result, Err(EngineError::RoomNotFound(_))));
}

#[tokio::test]
async fn engine_cancel_unknown_booking() {
    let path = test_wal_path("cancel_unknown.wal");
    let notify = Arc::new(NotifyHub::new());
    let engine = Engine::new(path, notify).unwrap();

    let result = engine.cancel_booking(Ulid::new()).await;
    assert!(matches!(result, Err(EngineError::BookingNotFound(_))));
}

#[tokio::test]
async fn engine_repeated_cancel_reports_not_found() {
    let path = test_wal_path("cancel_twice.wal");
    let notify = Arc::new(NotifyHub::new());
    let engine = Engine::new(path, notify).unwrap();

    let rid = make_room(&engine, "Atlas").await;
    let bid = Ulid::new();
    engine
        .create_booking(bid, rid, 1000, 2000, None)
        .await
        .unwrap();
    engine.cancel_booking(bid).await.unwrap();

    // The second cancel must fail, never silently succeed.
    let result = engine.cancel_booking(bid).await;
    assert!(matches!(result, Err(EngineError::BookingNotFound(_))));
}

#[tokio::test]
async fn engine_cancel_frees_slot_for_rebooking() {
    let path = test_wal_path("cancel_rebook.wal");
    let notify = Arc::new(NotifyHub::new());
    let engine = Engine::new(path, notify).unwrap();

    let rid = make_room(&engine, "Atlas").await;
    let bid = Ulid::new();
    engine
        .create_booking(bid, rid, 1000, 2000, None)
        .await
        .unwrap();
    engine.cancel_booking(bid).await.unwrap();

    engine
        .create_booking(Ulid::new(), rid, 1000, 2000, None)
        .await
        .unwrap();
}

#[tokio::test]
async fn engine_created_by_normalized() {
    let path = test_wal_path("created_by.wal");
    let notify = Arc::new(NotifyHub::new());
    let engine = Engine::new(path, notify).unwrap();

    let rid = make_room(&engine, "Atlas").await;
    let a = engine
        .create_booking(Ulid::new(), rid, 1000, 2000, None)
        .await
        .unwrap();
    assert_eq!(a.created_by, "anonymous");

    let b = engine
        .create_booking(Ulid::new(), rid, 3000, 4000, Some("   ".into()))
        .await
        .unwrap();
    assert_eq!(b.created_by, "anonymous");

    let c = engine
        .create_booking(Ulid::new(), rid, 5000, 6000, Some("  Alice  ".into()))
        .await
        .unwrap();
    assert_eq!(c.created_by, "Alice");
}

#[tokio::test]
async fn engine_duplicate_booking_id_rejected() {
    let path = test_wal_path("dup_booking_id.wal");
    let notify = Arc::new(NotifyHub::new());
    let engine = Engine::new(path, notify).unwrap();

    let rid = make_room(&engine, "Atlas").await;
    let bid = Ulid::new();
    engine
        .create_booking(bid, rid, 1000, 2000, None)
        .await
        .unwrap();
    let result = engine.create_booking(bid, rid, 5000, 6000, None).await;
    assert!(matches!(result, Err(EngineError::AlreadyExists(_))));
}

#[tokio::test]
async fn engine_bookings_by_room_sorted_by_start() {
    let path = test_wal_path("bookings_sorted.wal");
    let notify = Arc::new(NotifyHub::new());
    let engine = Engine::new(path, notify).unwrap();

    let rid = make_room(&engine, "Atlas").await;
    engine
        .create_booking(Ulid::new(), rid, 5000, 6000, None)
        .await
        .unwrap();
    engine
        .create_booking(Ulid::new(), rid, 1000, 2000, None)
        .await
        .unwrap();
    engine
        .create_booking(Ulid::new(), rid, 3000, 4000, None)
        .await
        .unwrap();

    let listed = engine.bookings_by_room(rid).await.unwrap();
    let starts: Vec<Ms> = listed.iter().map(|b| b.start).collect();
    assert_eq!(starts, vec![1000, 3000, 5000]);
}

#[tokio::test]
async fn engine_bookings_by_unknown_room_is_empty() {
    let path = test_wal_path("bookings_unknown_room.wal");
    let notify = Arc::new(NotifyHub::new());
    let engine = Engine::new(path, notify).unwrap();

    let listed = engine.bookings_by_room(Ulid::new()).await.unwrap();
    assert!(listed.is_empty());
}

// ── Availability through the engine ──────────────────────

#[tokio::test]
async fn engine_availability_empty_room_is_whole_window() {
    let path = test_wal_path("avail_empty.wal");
    let notify = Arc::new(NotifyHub::new());
    let engine = Engine::new(path, notify).unwrap();

    let rid = make_room(&engine, "Atlas").await;
    let free = engine
        .compute_availability(rid, 9 * H, 12 * H)
        .await
        .unwrap();
    assert_eq!(free, vec![Span::new(9 * H, 12 * H)]);
}

#[tokio::test]
async fn engine_availability_scenario() {
    // Book 10:00-11:00; a 10:30-10:45 attempt conflicts; availability for
    // 09:00-12:00 is exactly [09:00,10:00) and [11:00,12:00).
    let path = test_wal_path("avail_scenario.wal");
    let notify = Arc::new(NotifyHub::new());
    let engine = Engine::new(path, notify).unwrap();

    let rid = make_room(&engine, "Atlas").await;
    engine
        .create_booking(Ulid::new(), rid, 10 * H, 11 * H, None)
        .await
        .unwrap();

    let result = engine
        .create_booking(Ulid::new(), rid, 10 * H + 30 * M, 10 * H + 45 * M, None)
        .await;
    assert!(matches!(result, Err(EngineError::SlotConflict(_))));

    let free = engine
        .compute_availability(rid, 9 * H, 12 * H)
        .await
        .unwrap();
    assert_eq!(
        free,
        vec![Span::new(9 * H, 10 * H), Span::new(11 * H, 12 * H)]
    );
}

#[tokio::test]
async fn engine_availability_invalid_window() {
    let path = test_wal_path("avail_invalid.wal");
    let notify = Arc::new(NotifyHub::new());
    let engine = Engine::new(path, notify).unwrap();

    let rid = make_room(&engine, "Atlas").await;
    let result = engine.compute_availability(rid, 12 * H, 12 * H).await;
    assert!(matches!(result, Err(EngineError::InvalidInterval { .. })));
    let result = engine.compute_availability(rid, 12 * H, 9 * H).await;
    assert!(matches!(result, Err(EngineError::InvalidInterval { .. })));
}

#[tokio::test]
async fn engine_availability_unknown_room() {
    let path = test_wal_path("avail_unknown.wal");
    let notify = Arc::new(NotifyHub::new());
    let engine = Engine::new(path, notify).unwrap();

    let result = engine.compute_availability(Ulid::new(), 0, H).await;
    assert!(matches!(result, Err(EngineError::RoomNotFound(_))));
}

#[tokio::test]
async fn engine_availability_window_too_wide() {
    let path = test_wal_path("avail_too_wide.wal");
    let notify = Arc::new(NotifyHub::new());
    let engine = Engine::new(path, notify).unwrap();

    let rid = make_room(&engine, "Atlas").await;
    let result = engine
        .compute_availability(rid, 0, MAX_QUERY_WINDOW_MS + 1)
        .await;
    assert!(matches!(result, Err(EngineError::LimitExceeded(_))));
}

#[tokio::test]
async fn engine_availability_window_out_of_range_rejected() {
    let path = test_wal_path("avail_out_of_range.wal");
    let notify = Arc::new(NotifyHub::new());
    let engine = Engine::new(path, notify).unwrap();

    let rid = make_room(&engine, "Atlas").await;
    // Bounds outside the valid range are refused before any width
    // arithmetic touches them.
    let result = engine.compute_availability(rid, i64::MIN + 1, 10).await;
    assert!(matches!(result, Err(EngineError::LimitExceeded(_))));
    let result = engine.compute_availability(rid, -5, H).await;
    assert!(matches!(result, Err(EngineError::LimitExceeded(_))));
    let result = engine
        .compute_availability(rid, 0, MAX_VALID_TIMESTAMP_MS + 1)
        .await;
    assert!(matches!(result, Err(EngineError::LimitExceeded(_))));
}

#[tokio::test]
async fn engine_availability_fully_booked() {
    let path = test_wal_path("avail_full.wal");
    let notify = Arc::new(NotifyHub::new());
    let engine = Engine::new(path, notify).unwrap();

    let rid = make_room(&engine, "Atlas").await;
    engine
        .create_booking(Ulid::new(), rid, 9 * H, 12 * H, None)
        .await
        .unwrap();
    let free = engine
        .compute_availability(rid, 9 * H, 12 * H)
        .await
        .unwrap();
    assert!(free.is_empty());
}

// ── Guard-rail limits ────────────────────────────────────

#[tokio::test]
async fn engine_interval_too_wide_rejected() {
    let path = test_wal_path("interval_too_wide.wal");
    let notify = Arc::new(NotifyHub::new());
    let engine = Engine::new(path, notify).unwrap();

    let rid = make_room(&engine, "Atlas").await;
    let result = engine
        .create_booking(Ulid::new(), rid, 0, MAX_SPAN_DURATION_MS + 1, None)
        .await;
    assert!(matches!(result, Err(EngineError::LimitExceeded(_))));
}

#[tokio::test]
async fn engine_timestamp_out_of_range_rejected() {
    let path = test_wal_path("timestamp_range.wal");
    let notify = Arc::new(NotifyHub::new());
    let engine = Engine::new(path, notify).unwrap();

    let rid = make_room(&engine, "Atlas").await;
    let result = engine.create_booking(Ulid::new(), rid, -5, 1000, None).await;
    assert!(matches!(result, Err(EngineError::LimitExceeded(_))));
}

#[tokio::test]
async fn engine_over_long_created_by_rejected() {
    let path = test_wal_path("created_by_long.wal");
    let notify = Arc::new(NotifyHub::new());
    let engine = Engine::new(path, notify).unwrap();

    let rid = make_room(&engine, "Atlas").await;
    let long = "x".repeat(MAX_CREATED_BY_LEN + 1);
    let result = engine
        .create_booking(Ulid::new(), rid, 1000, 2000, Some(long))
        .await;
    assert!(matches!(result, Err(EngineError::InvalidArgument(_))));
}

// ── Concurrency ──────────────────────────────────────────

#[tokio::test]
async fn engine_race_for_one_slot_has_one_winner() {
    let path = test_wal_path("race_one_winner.wal");
    let notify = Arc::new(NotifyHub::new());
    let engine = Arc::new(Engine::new(path, notify).unwrap());

    let rid = make_room(&engine, "Atlas").await;
    let a = {
        let engine = engine.clone();
        tokio::spawn(async move {
            engine
                .create_booking(Ulid::new(), rid, 1000, 2000, None)
                .await
        })
    };
    let b = {
        let engine = engine.clone();
        tokio::spawn(async move {
            engine
                .create_booking(Ulid::new(), rid, 1000, 2000, None)
                .await
        })
    };

    let results = [a.await.unwrap(), b.await.unwrap()];
    let wins = results.iter().filter(|r| r.is_ok()).count();
    assert_eq!(wins, 1, "exactly one writer must win: {results:?}");
    for r in &results {
        if let Err(e) = r {
            assert!(matches!(e, EngineError::SlotConflict(_)));
        }
    }
    assert_eq!(engine.bookings_by_room(rid).await.unwrap().len(), 1);
}

#[tokio::test]
async fn engine_race_for_one_room_id_has_one_winner() {
    let path = test_wal_path("race_room_id.wal");
    let notify = Arc::new(NotifyHub::new());
    let engine = Arc::new(Engine::new(path, notify).unwrap());

    let id = Ulid::new();
    let a = {
        let engine = engine.clone();
        tokio::spawn(async move { engine.create_room(id, "Alpha", 4).await })
    };
    let b = {
        let engine = engine.clone();
        tokio::spawn(async move { engine.create_room(id, "Beta", 4).await })
    };

    let results = [a.await.unwrap(), b.await.unwrap()];
    let wins = results.iter().filter(|r| r.is_ok()).count();
    assert_eq!(wins, 1, "exactly one create must win: {results:?}");
    for r in &results {
        if let Err(e) = r {
            assert!(matches!(e, EngineError::AlreadyExists(_)));
        }
    }
    assert_eq!(engine.list_rooms().await.len(), 1);

    // The loser's name reservation is rolled back.
    let winner = engine.get_room_info(id).await.unwrap().name;
    let loser = if winner == "Alpha" { "Beta" } else { "Alpha" };
    engine.create_room(Ulid::new(), loser, 4).await.unwrap();
}

#[tokio::test]
async fn engine_concurrent_burst_never_overlaps() {
    // 10 writers with spans overlapping their neighbors; whichever subset
    // wins, the surviving bookings must be pairwise disjoint.
    let path = test_wal_path("burst_no_overlap.wal");
    let notify = Arc::new(NotifyHub::new());
    let engine = Arc::new(Engine::new(path, notify).unwrap());

    let rid = make_room(&engine, "Atlas").await;
    let mut handles = Vec::new();
    for i in 0..10i64 {
        let engine = engine.clone();
        handles.push(tokio::spawn(async move {
            let start = i * 500;
            engine
                .create_booking(Ulid::new(), rid, start, start + 1000, None)
                .await
        }));
    }

    let mut wins = 0;
    for h in handles {
        if h.await.unwrap().is_ok() {
            wins += 1;
        }
    }

    let listed = engine.bookings_by_room(rid).await.unwrap();
    assert_eq!(listed.len(), wins);
    for pair in listed.windows(2) {
        assert!(
            pair[0].end <= pair[1].start,
            "overlapping bookings survived: {pair:?}"
        );
    }
}

#[tokio::test]
async fn engine_disjoint_rooms_do_not_block_each_other() {
    let path = test_wal_path("disjoint_rooms.wal");
    let notify = Arc::new(NotifyHub::new());
    let engine = Arc::new(Engine::new(path, notify).unwrap());

    let room_a = make_room(&engine, "Alpha").await;
    let room_b = make_room(&engine, "Beta").await;

    let a = {
        let engine = engine.clone();
        tokio::spawn(async move {
            engine
                .create_booking(Ulid::new(), room_a, 1000, 2000, None)
                .await
        })
    };
    let b = {
        let engine = engine.clone();
        tokio::spawn(async move {
            engine
                .create_booking(Ulid::new(), room_b, 1000, 2000, None)
                .await
        })
    };

    // Identical spans on different rooms both win.
    a.await.unwrap().unwrap();
    b.await.unwrap().unwrap();
}

#[tokio::test]
async fn engine_concurrent_cancel_single_winner() {
    let path = test_wal_path("concurrent_cancel.wal");
    let notify = Arc::new(NotifyHub::new());
    let engine = Arc::new(Engine::new(path, notify).unwrap());

    let rid = make_room(&engine, "Atlas").await;
    let bid = Ulid::new();
    engine
        .create_booking(bid, rid, 1000, 2000, None)
        .await
        .unwrap();

    let a = {
        let engine = engine.clone();
        tokio::spawn(async move { engine.cancel_booking(bid).await })
    };
    let b = {
        let engine = engine.clone();
        tokio::spawn(async move { engine.cancel_booking(bid).await })
    };

    let results = [a.await.unwrap(), b.await.unwrap()];
    let wins = results.iter().filter(|r| r.is_ok()).count();
    assert_eq!(wins, 1, "exactly one cancel must win: {results:?}");
    for r in &results {
        if let Err(e) = r {
            assert!(matches!(e, EngineError::BookingNotFound(_)));
        }
    }
}

#[tokio::test]
async fn engine_group_commit_handles_concurrent_writers() {
    // Writers on distinct rooms all commit; the WAL writer batches them.
    let path = test_wal_path("group_commit.wal");
    let notify = Arc::new(NotifyHub::new());
    let engine = Arc::new(Engine::new(path, notify).unwrap());

    let mut rooms = Vec::new();
    for i in 0..8 {
        rooms.push(make_room(&engine, &format!("Room {i}")).await);
    }

    let mut handles = Vec::new();
    for rid in rooms.clone() {
        let engine = engine.clone();
        handles.push(tokio::spawn(async move {
            engine
                .create_booking(Ulid::new(), rid, 1000, 2000, None)
                .await
        }));
    }
    for h in handles {
        h.await.unwrap().unwrap();
    }
    for rid in rooms {
        assert_eq!(engine.bookings_by_room(rid).await.unwrap().len(), 1);
    }
}

// ── Durability ───────────────────────────────────────────

#[tokio::test]
async fn engine_wal_replay_restores_rooms_and_bookings() {
    let path = test_wal_path("replay_restore.wal");
    let notify = Arc::new(NotifyHub::new());

    let rid = Ulid::new();
    let bid = Ulid::new();
    {
        let engine = Engine::new(path.clone(), notify.clone()).unwrap();
        engine.create_room(rid, "Atlas", 6).await.unwrap();
        engine
            .create_booking(bid, rid, 1000, 2000, Some("alice".into()))
            .await
            .unwrap();
    }

    let engine2 = Engine::new(path, notify).unwrap();
    let info = engine2.get_room_info(rid).await.unwrap();
    assert_eq!(info.name, "Atlas");
    assert_eq!(info.capacity, 6);

    let listed = engine2.bookings_by_room(rid).await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].id, bid);
    assert_eq!(listed[0].created_by, "alice");

    // The unique-name index is rebuilt too.
    let result = engine2.create_room(Ulid::new(), "atlas", 4).await;
    assert!(matches!(result, Err(EngineError::NameTaken(_))));
}

#[tokio::test]
async fn engine_replayed_booking_still_conflicts() {
    let path = test_wal_path("replay_conflict.wal");
    let notify = Arc::new(NotifyHub::new());

    let rid = Ulid::new();
    {
        let engine = Engine::new(path.clone(), notify.clone()).unwrap();
        engine.create_room(rid, "Atlas", 4).await.unwrap();
        engine
            .create_booking(Ulid::new(), rid, 1000, 2000, None)
            .await
            .unwrap();
    }

    let engine2 = Engine::new(path, notify).unwrap();
    let result = engine2
        .create_booking(Ulid::new(), rid, 1500, 2500, None)
        .await;
    assert!(matches!(result, Err(EngineError::SlotConflict(_))));
}

#[tokio::test]
async fn engine_replay_after_cancel() {
    let path = test_wal_path("replay_cancel.wal");
    let notify = Arc::new(NotifyHub::new());

    let rid = Ulid::new();
    let bid = Ulid::new();
    {
        let engine = Engine::new(path.clone(), notify.clone()).unwrap();
        engine.create_room(rid, "Atlas", 4).await.unwrap();
        engine
            .create_booking(bid, rid, 1000, 2000, None)
            .await
            .unwrap();
        engine.cancel_booking(bid).await.unwrap();
    }

    let engine2 = Engine::new(path, notify).unwrap();
    assert!(engine2.bookings_by_room(rid).await.unwrap().is_empty());
    // The cancelled slot is bookable again.
    engine2
        .create_booking(Ulid::new(), rid, 1000, 2000, None)
        .await
        .unwrap();
    // And the cancelled id stays gone.
    let result = engine2.cancel_booking(bid).await;
    assert!(matches!(result, Err(EngineError::BookingNotFound(_))));
}

#[tokio::test]
async fn engine_replay_after_room_delete() {
    let path = test_wal_path("replay_room_delete.wal");
    let notify = Arc::new(NotifyHub::new());

    let rid = Ulid::new();
    {
        let engine = Engine::new(path.clone(), notify.clone()).unwrap();
        engine.create_room(rid, "Atlas", 4).await.unwrap();
        engine.delete_room(rid).await.unwrap();
    }

    let engine2 = Engine::new(path, notify).unwrap();
    assert!(engine2.get_room(&rid).is_none());
    // The name is free after replay.
    engine2.create_room(Ulid::new(), "Atlas", 4).await.unwrap();
}

#[tokio::test]
async fn engine_compact_preserves_state() {
    let path = test_wal_path("compact_preserve.wal");
    let notify = Arc::new(NotifyHub::new());

    let rid = Ulid::new();
    let keep = Ulid::new();
    {
        let engine = Engine::new(path.clone(), notify.clone()).unwrap();
        engine.create_room(rid, "Atlas", 4).await.unwrap();
        // Churn: bookings created and cancelled still occupy log entries.
        for i in 0..10i64 {
            let bid = Ulid::new();
            engine
                .create_booking(bid, rid, i * 1000, i * 1000 + 500, None)
                .await
                .unwrap();
            engine.cancel_booking(bid).await.unwrap();
        }
        engine
            .create_booking(keep, rid, 100_000, 200_000, None)
            .await
            .unwrap();

        assert!(engine.wal_appends_since_compact().await > 0);
        engine.compact_wal().await.unwrap();
        assert_eq!(engine.wal_appends_since_compact().await, 0);
    }

    let engine2 = Engine::new(path, notify).unwrap();
    let listed = engine2.bookings_by_room(rid).await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].id, keep);
    // Uniqueness is still enforced from the compacted log.
    let result = engine2.create_room(Ulid::new(), "Atlas", 4).await;
    assert!(matches!(result, Err(EngineError::NameTaken(_))));
}

#[tokio::test]
async fn engine_compact_keeps_booking_made_mid_compaction() {
    let path = test_wal_path("compact_mid_booking.wal");
    let notify = Arc::new(NotifyHub::new());

    let room_a = Ulid::new();
    let room_b = Ulid::new();
    let bid = Ulid::new();
    {
        let engine = Arc::new(Engine::new(path.clone(), notify.clone()).unwrap());
        engine.create_room(room_a, "Alpha", 4).await.unwrap();
        engine.create_room(room_b, "Beta", 4).await.unwrap();

        // Park the compaction sweep on room B's lock so the booking request
        // for room A arrives while the sweep is in flight.
        let held = engine.get_room(&room_b).unwrap();
        let parked = held.write_owned().await;

        let compact = {
            let engine = engine.clone();
            tokio::spawn(async move { engine.compact_wal().await })
        };
        let book = {
            let engine = engine.clone();
            tokio::spawn(async move {
                engine.create_booking(bid, room_a, 1000, 2000, None).await
            })
        };
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;

        drop(parked);
        compact.await.unwrap().unwrap();
        book.await.unwrap().unwrap();
    }

    // The booking was acknowledged, so it must survive the swap and restart.
    let engine2 = Engine::new(path, notify).unwrap();
    let listed = engine2.bookings_by_room(room_a).await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].id, bid);
}

// ── Notifications ────────────────────────────────────────

#[tokio::test]
async fn engine_mutations_notify_room_subscribers() {
    let path = test_wal_path("notify_subscribers.wal");
    let notify = Arc::new(NotifyHub::new());
    let engine = Engine::new(path, notify.clone()).unwrap();

    let rid = make_room(&engine, "Atlas").await;
    let mut rx = notify.subscribe(rid);

    let bid = Ulid::new();
    engine
        .create_booking(bid, rid, 1000, 2000, None)
        .await
        .unwrap();

    match rx.recv().await.unwrap() {
        Event::BookingCreated {
            id, room_id, span, ..
        } => {
            assert_eq!(id, bid);
            assert_eq!(room_id, rid);
            assert_eq!(span, Span::new(1000, 2000));
        }
        other => panic!("unexpected event: {other:?}"),
    }
}
