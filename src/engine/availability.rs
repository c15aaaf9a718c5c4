use crate::model::*;

use super::conflict::has_conflict;

// ── Room search ───────────────────────────────────────────────────

/// A space is a search candidate when it is a room and, if a minimum is given,
/// declares at least that capacity. Rooms without a capacity only match
/// unfiltered searches.
pub fn is_candidate(overlay: &Overlay, min_capacity: Option<u32>) -> bool {
    if !overlay.is_room() {
        return false;
    }
    match min_capacity {
        None => true,
        Some(min) => overlay.capacity.is_some_and(|c| c >= min),
    }
}

/// True when `space` is a candidate and has no blocking booking in `window`.
pub fn is_available(space: &SpaceState, window: &Span, min_capacity: Option<u32>) -> bool {
    !space.retired && is_candidate(&space.overlay, min_capacity) && !has_conflict(space, window, None)
}

// ── Free slots within one space ──────────────────────────────────

/// Sub-windows of `window` not covered by any blocking booking.
pub fn free_slots(space: &SpaceState, window: &Span) -> Vec<Span> {
    // `overlapping` yields bookings in start order, so clamped spans stay sorted.
    let busy: Vec<Span> = space
        .overlapping(window)
        .filter(|b| b.status.is_blocking())
        .map(|b| b.span.clamp_to(window))
        .collect();
    if busy.is_empty() {
        return vec![*window];
    }
    subtract_intervals(&[*window], &merge_overlapping(&busy))
}

/// Merge sorted overlapping/adjacent intervals into disjoint intervals.
pub fn merge_overlapping(sorted: &[Span]) -> Vec<Span> {
    let mut merged: Vec<Span> = Vec::new();
    for &span in sorted {
        if let Some(last) = merged.last_mut()
            && span.start <= last.end
        {
            last.end = last.end.max(span.end);
            continue;
        }
        merged.push(span);
    }
    merged
}

/// `base` minus `to_remove`; both sorted and disjoint.
pub fn subtract_intervals(base: &[Span], to_remove: &[Span]) -> Vec<Span> {
    let mut result = Vec::new();
    let mut ri = 0;

    for &b in base {
        let mut current_start = b.start;

        while ri < to_remove.len() && to_remove[ri].end <= current_start {
            ri += 1;
        }

        let mut j = ri;
        while j < to_remove.len() && to_remove[j].start < b.end {
            let r = &to_remove[j];
            if r.start > current_start {
                result.push(Span::new(current_start, r.start));
            }
            current_start = current_start.max(r.end);
            j += 1;
        }

        if current_start < b.end {
            result.push(Span::new(current_start, b.end));
        }
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use ulid::Ulid;

    const H: Ms = 3_600_000;
    const DAY: Ms = 1_700_000_000_000 - 1_700_000_000_000 % (24 * H);

    fn overlay(kind: OverlayKind, capacity: Option<u32>) -> Overlay {
        Overlay {
            id: Ulid::new(),
            floor_plan_id: Ulid::new(),
            kind,
            label: None,
            capacity,
            rect: Rect { x: 0, y: 0, width: 5, height: 5 },
            props: Props::new(),
            created_by: None,
            created_at: 0,
        }
    }

    fn space_with(capacity: Option<u32>, bookings: &[(Ms, Ms, BookingStatus)]) -> SpaceState {
        let mut space = SpaceState::new(overlay(OverlayKind::Room, capacity));
        for &(start, end, status) in bookings {
            space.insert_booking(Booking {
                id: Ulid::new(),
                space_id: space.overlay.id,
                organizer_id: None,
                span: Span::new(DAY + start, DAY + end),
                participants: None,
                status,
                created_at: 0,
            });
        }
        space
    }

    fn window(start: Ms, end: Ms) -> Span {
        Span::new(DAY + start, DAY + end)
    }

    // ── candidates ───────────────────────────────────────

    #[test]
    fn seats_are_never_candidates() {
        assert!(!is_candidate(&overlay(OverlayKind::Seat, Some(1)), None));
        assert!(is_candidate(&overlay(OverlayKind::Room, Some(1)), None));
    }

    #[test]
    fn capacity_filter() {
        let big = overlay(OverlayKind::Room, Some(10));
        let small = overlay(OverlayKind::Room, Some(4));
        let unknown = overlay(OverlayKind::Room, None);
        assert!(is_candidate(&big, Some(8)));
        assert!(is_candidate(&big, Some(10)));
        assert!(!is_candidate(&small, Some(8)));
        assert!(!is_candidate(&unknown, Some(1)));
        assert!(is_candidate(&unknown, None));
    }

    #[test]
    fn booking_ending_at_window_start_keeps_room_available() {
        let space = space_with(Some(6), &[(8 * H, 9 * H, BookingStatus::Confirmed)]);
        assert!(is_available(&space, &window(9 * H, 10 * H), Some(6)));
        assert!(!is_available(&space, &window(8 * H + 30, 10 * H), Some(6)));
    }

    #[test]
    fn cancelled_booking_does_not_hide_room() {
        let space = space_with(Some(6), &[(9 * H, 10 * H, BookingStatus::Cancelled)]);
        assert!(is_available(&space, &window(9 * H, 10 * H), None));
    }

    #[test]
    fn retired_space_is_never_available() {
        let mut space = space_with(Some(6), &[]);
        space.retired = true;
        assert!(!is_available(&space, &window(9 * H, 10 * H), None));
    }

    // ── free_slots ───────────────────────────────────────

    #[test]
    fn free_slots_empty_space_is_whole_window() {
        let space = space_with(None, &[]);
        assert_eq!(free_slots(&space, &window(9 * H, 17 * H)), vec![window(9 * H, 17 * H)]);
    }

    #[test]
    fn free_slots_punches_bookings_out() {
        let space = space_with(
            None,
            &[
                (8 * H, 10 * H, BookingStatus::Confirmed),
                (12 * H, 13 * H, BookingStatus::Pending),
                (12 * H + H / 2, 14 * H, BookingStatus::Confirmed),
                (15 * H, 16 * H, BookingStatus::Cancelled),
            ],
        );
        assert_eq!(
            free_slots(&space, &window(9 * H, 17 * H)),
            vec![window(10 * H, 12 * H), window(14 * H, 17 * H)]
        );
    }

    #[test]
    fn free_slots_fully_booked() {
        let space = space_with(None, &[(0, 24 * H, BookingStatus::Confirmed)]);
        assert!(free_slots(&space, &window(9 * H, 17 * H)).is_empty());
    }

    // ── subtract_intervals ────────────────────────────────

    #[test]
    fn subtract_no_overlap() {
        let base = vec![Span::new(100, 200), Span::new(300, 400)];
        let remove = vec![Span::new(200, 300)];
        assert_eq!(subtract_intervals(&base, &remove), base);
    }

    #[test]
    fn subtract_full_overlap() {
        let result = subtract_intervals(&[Span::new(100, 200)], &[Span::new(50, 250)]);
        assert!(result.is_empty());
    }

    #[test]
    fn subtract_middle_punch() {
        let result = subtract_intervals(&[Span::new(100, 300)], &[Span::new(150, 200)]);
        assert_eq!(result, vec![Span::new(100, 150), Span::new(200, 300)]);
    }

    #[test]
    fn subtract_multiple_punches() {
        let remove = vec![Span::new(100, 200), Span::new(400, 500), Span::new(800, 900)];
        let result = subtract_intervals(&[Span::new(0, 1000)], &remove);
        assert_eq!(
            result,
            vec![
                Span::new(0, 100),
                Span::new(200, 400),
                Span::new(500, 800),
                Span::new(900, 1000),
            ]
        );
    }

    // ── merge_overlapping ────────────────────────────────

    #[test]
    fn merge_overlapping_basic() {
        let spans = vec![Span::new(100, 300), Span::new(200, 400), Span::new(500, 600)];
        assert_eq!(
            merge_overlapping(&spans),
            vec![Span::new(100, 400), Span::new(500, 600)]
        );
    }

    #[test]
    fn merge_overlapping_adjacent() {
        let spans = vec![Span::new(100, 200), Span::new(200, 300)];
        assert_eq!(merge_overlapping(&spans), vec![Span::new(100, 300)]);
    }
}
