use ulid::Ulid;

use crate::model::*;

use super::EngineError;

pub(crate) fn now_ms() -> Ms {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as Ms)
        .unwrap_or_default()
}

/// Reject empty or inverted intervals and out-of-range timestamps before
/// anything reaches the overlap predicate.
pub(crate) fn validate_span(start: Ms, end: Ms, max_duration: Ms) -> Result<Span, EngineError> {
    use crate::limits::*;
    if start >= end {
        return Err(EngineError::InvalidSpan { start, end });
    }
    if start < MIN_VALID_TIMESTAMP_MS || end > MAX_VALID_TIMESTAMP_MS {
        return Err(EngineError::LimitExceeded("timestamp out of range"));
    }
    let span = Span::new(start, end);
    if span.duration_ms() > max_duration {
        return Err(EngineError::LimitExceeded("span too wide"));
    }
    Ok(span)
}

/// Every blocking booking on `space` that overlaps `span`, in start order.
pub fn find_conflicts(space: &SpaceState, span: &Span) -> Vec<Booking> {
    space
        .overlapping(span)
        .filter(|b| b.status.is_blocking())
        .cloned()
        .collect()
}

/// Same predicate as [`find_conflicts`], short-circuiting. `exclude` skips one
/// booking, so a booking can be checked against everything but itself.
pub fn has_conflict(space: &SpaceState, span: &Span, exclude: Option<Ulid>) -> bool {
    space
        .overlapping(span)
        .any(|b| b.status.is_blocking() && Some(b.id) != exclude)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::limits::MAX_SPAN_DURATION_MS;

    const T0: Ms = 1_700_000_000_000;

    fn room() -> SpaceState {
        SpaceState::new(Overlay {
            id: Ulid::new(),
            floor_plan_id: Ulid::new(),
            kind: OverlayKind::Room,
            label: None,
            capacity: Some(6),
            rect: Rect { x: 0, y: 0, width: 1, height: 1 },
            props: Props::new(),
            created_by: None,
            created_at: 0,
        })
    }

    fn add(space: &mut SpaceState, start: Ms, end: Ms, status: BookingStatus) -> Ulid {
        let id = Ulid::new();
        space.insert_booking(Booking {
            id,
            space_id: space.overlay.id,
            organizer_id: Some(1),
            span: Span::new(start, end),
            participants: None,
            status,
            created_at: 0,
        });
        id
    }

    #[test]
    fn touching_is_not_a_conflict() {
        let mut space = room();
        add(&mut space, T0, T0 + 10, BookingStatus::Confirmed);
        assert!(!has_conflict(&space, &Span::new(T0 + 10, T0 + 20), None));
        assert!(!has_conflict(&space, &Span::new(T0 - 10, T0), None));
        assert!(find_conflicts(&space, &Span::new(T0 + 10, T0 + 20)).is_empty());
    }

    #[test]
    fn partial_overlap_lists_the_existing_booking() {
        let mut space = room();
        let first = add(&mut space, T0, T0 + 10, BookingStatus::Confirmed);
        let conflicts = find_conflicts(&space, &Span::new(T0 + 5, T0 + 15));
        assert_eq!(conflicts.len(), 1);
        assert_eq!(conflicts[0].id, first);
    }

    #[test]
    fn all_overlapping_bookings_reported() {
        let mut space = room();
        add(&mut space, T0, T0 + 10, BookingStatus::Confirmed);
        add(&mut space, T0 + 20, T0 + 30, BookingStatus::Pending);
        add(&mut space, T0 + 40, T0 + 50, BookingStatus::Confirmed);
        let conflicts = find_conflicts(&space, &Span::new(T0 + 5, T0 + 25));
        assert_eq!(conflicts.len(), 2);
        assert!(conflicts[0].span.start < conflicts[1].span.start);
    }

    #[test]
    fn cancelled_bookings_do_not_conflict() {
        let mut space = room();
        add(&mut space, T0, T0 + 10, BookingStatus::Cancelled);
        assert!(!has_conflict(&space, &Span::new(T0, T0 + 10), None));
        assert!(find_conflicts(&space, &Span::new(T0, T0 + 10)).is_empty());
    }

    #[test]
    fn has_conflict_agrees_with_find_conflicts() {
        let mut space = room();
        add(&mut space, T0, T0 + 100, BookingStatus::Confirmed);
        add(&mut space, T0 + 150, T0 + 200, BookingStatus::Cancelled);
        add(&mut space, T0 + 300, T0 + 400, BookingStatus::Pending);
        for (s, e) in [(0, 50), (100, 150), (120, 180), (90, 310), (400, 500), (350, 360)] {
            let span = Span::new(T0 + s, T0 + e);
            assert_eq!(
                has_conflict(&space, &span, None),
                !find_conflicts(&space, &span).is_empty(),
                "[{s}, {e})"
            );
        }
    }

    #[test]
    fn excluded_booking_is_ignored() {
        let mut space = room();
        let own = add(&mut space, T0, T0 + 10, BookingStatus::Confirmed);
        let span = Span::new(T0, T0 + 10);
        assert!(has_conflict(&space, &span, None));
        assert!(!has_conflict(&space, &span, Some(own)));
        add(&mut space, T0 + 5, T0 + 15, BookingStatus::Pending);
        assert!(has_conflict(&space, &span, Some(own)));
    }

    #[test]
    fn zero_and_inverted_spans_rejected() {
        assert!(matches!(
            validate_span(T0, T0, MAX_SPAN_DURATION_MS),
            Err(EngineError::InvalidSpan { .. })
        ));
        assert!(matches!(
            validate_span(T0 + 1, T0, MAX_SPAN_DURATION_MS),
            Err(EngineError::InvalidSpan { .. })
        ));
        assert!(validate_span(T0, T0 + 1, MAX_SPAN_DURATION_MS).is_ok());
    }

    #[test]
    fn out_of_range_and_too_wide_rejected() {
        assert!(matches!(
            validate_span(0, 10, MAX_SPAN_DURATION_MS),
            Err(EngineError::LimitExceeded(_))
        ));
        assert!(matches!(
            validate_span(T0, T0 + MAX_SPAN_DURATION_MS + 1, MAX_SPAN_DURATION_MS),
            Err(EngineError::LimitExceeded("span too wide"))
        ));
    }
}
