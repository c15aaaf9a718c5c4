use tracing::{debug, info, warn};
use ulid::Ulid;

use crate::auth::Principal;
use crate::limits::*;
use crate::model::*;

use super::conflict::{find_conflicts, now_ms, validate_span};
use super::{Engine, EngineError};

#[derive(Debug, Clone)]
pub struct NewBooking {
    pub space_id: Ulid,
    pub start: Ms,
    pub end: Ms,
    pub participants: Option<u32>,
    pub organizer_id: Option<UserId>,
}

impl Engine {
    /// Book a room. The conflict check and the insert run under the space's
    /// write lock, so two overlapping requests for one room cannot both land.
    pub async fn create_booking(&self, new: NewBooking) -> Result<Booking, EngineError> {
        let span = validate_span(new.start, new.end, MAX_SPAN_DURATION_MS)?;
        if new.participants.is_some_and(|p| p > MAX_PARTICIPANTS) {
            return Err(EngineError::LimitExceeded("too many participants"));
        }

        self.with_store_retry("create_booking", || self.try_create_booking(&new, span))
            .await
    }

    async fn try_create_booking(&self, new: &NewBooking, span: Span) -> Result<Booking, EngineError> {
        let _permit = self.commit_permit().await?;
        let mut space = self.write_space(new.space_id).await?;
        if !space.overlay.is_room() {
            return Err(EngineError::NotFound("room", new.space_id));
        }
        if space.blocking_count() >= MAX_BOOKINGS_PER_SPACE {
            return Err(EngineError::LimitExceeded("too many bookings on space"));
        }

        let conflicts = find_conflicts(&space, &span);
        if !conflicts.is_empty() {
            warn!(
                "booking on {} [{}, {}) conflicts with {} booking(s)",
                new.space_id,
                span.start,
                span.end,
                conflicts.len()
            );
            metrics::counter!(crate::observability::BOOKING_CONFLICTS_TOTAL).increment(1);
            return Err(EngineError::BookingConflict(conflicts));
        }

        let booking = Booking {
            id: Ulid::new(),
            space_id: new.space_id,
            organizer_id: new.organizer_id,
            span,
            participants: new.participants,
            status: BookingStatus::Confirmed,
            created_at: now_ms(),
        };
        self.wal_append(&Event::BookingCreated { booking: booking.clone() })
            .await?;
        self.store.insert_booking(&mut space, booking.clone());
        info!("booking {} confirmed on {}", booking.id, booking.space_id);
        Ok(booking)
    }

    /// Mark a booking cancelled. It stays listed but stops blocking the space.
    /// Only the organizer or an admin may cancel; the check and the write share
    /// the space lock. Cancelling twice is a no-op.
    pub async fn cancel_booking(&self, id: Ulid, by: Principal) -> Result<Booking, EngineError> {
        self.with_store_retry("cancel_booking", || self.try_cancel_booking(id, by))
            .await
    }

    async fn try_cancel_booking(&self, id: Ulid, by: Principal) -> Result<Booking, EngineError> {
        let _permit = self.commit_permit().await?;
        let space_id = self
            .store
            .space_for_booking(&id)
            .ok_or(EngineError::NotFound("booking", id))?;
        let mut space = self.write_space(space_id).await?;
        let current = space
            .booking_mut(id)
            .cloned()
            .ok_or(EngineError::NotFound("booking", id))?;
        if current.organizer_id != Some(by.user_id) && !by.is_admin() {
            return Err(EngineError::Forbidden("only the organizer or an admin may cancel"));
        }
        if current.status == BookingStatus::Cancelled {
            debug!("booking {id} already cancelled");
            return Ok(current);
        }

        let status = BookingStatus::Cancelled;
        self.wal_append(&Event::BookingStatusChanged { id, space_id, status })
            .await?;
        self.store.set_booking_status(&mut space, id, status);
        info!("booking {id} cancelled");
        Ok(Booking { status, ..current })
    }
}
