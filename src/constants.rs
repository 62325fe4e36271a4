/*!
Defaults and fixed bounds used by the sequencing core when a track has never carried an
explicit tempo or time signature, and the maximum fan-out of a single `ev_cancel`/`ev_restore`
call.
!*/

/// Beats-per-measure assumed before any `EV_TIMESIG` frame has been seen on a track.
pub const DEFAULT_BPM: u8 = 4;

/// Tics-per-beat assumed before any `EV_TIMESIG` frame has been seen on a track.
pub const DEFAULT_TPB: u32 = 24;

/// Microseconds-per-24-tics assumed before any `EV_TEMPO` frame has been seen on a track.
/// 500_000 usec24 corresponds to 120 quarter notes per minute.
pub const DEFAULT_USEC24: u32 = 500_000;

/// Upper bound on the number of events `ev_cancel`/`ev_restore` may synthesize for a single
/// frame. No frame kind modeled here needs more than one, but callers may rely on this bound
/// when sizing buffers.
pub const REVMAX: usize = 4;
