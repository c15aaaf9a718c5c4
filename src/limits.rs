//! Hard caps applied at the engine boundary.

use crate::model::Ms;

pub const MAX_FLOOR_PLANS: usize = 100_000;
pub const MAX_OVERLAYS_PER_SAVE: usize = 5_000;
pub const MAX_BOOKINGS_PER_SPACE: usize = 100_000;
pub const MAX_NAME_LEN: usize = 256;
pub const MAX_LABEL_LEN: usize = 256;
pub const MAX_IMAGE_PATH_LEN: usize = 1024;
pub const MAX_PARTICIPANTS: u32 = 100_000;

/// 2000-01-01T00:00:00Z
pub const MIN_VALID_TIMESTAMP_MS: Ms = 946_684_800_000;
/// 2100-01-01T00:00:00Z
pub const MAX_VALID_TIMESTAMP_MS: Ms = 4_102_444_800_000;
/// A single booking may not exceed one year.
pub const MAX_SPAN_DURATION_MS: Ms = 366 * 24 * 3_600_000;
/// Availability / free-slot windows may not exceed one year.
pub const MAX_QUERY_WINDOW_MS: Ms = 366 * 24 * 3_600_000;
