use snafu::Snafu;

/// The public Error type for this crate.
#[derive(Debug, Snafu)]
pub struct Error(LibError);

/// The public Result type for this crate.
pub type Result<T> = std::result::Result<T, Error>;

/// The internal Result type for this crate.
pub(crate) type LibResult<T> = std::result::Result<T, LibError>;

/// The internal Error type for this crate.
#[derive(Debug, Snafu)]
#[snafu(visibility = "pub(crate)")]
pub(crate) enum LibError {
    /// A seek ran out of track before consuming all of the requested tics. The residual
    /// count is carried so the caller can decide whether to pad with `ticput` or stop.
    #[snafu(display("{}: end of track reached with {} tics remaining", site, residual))]
    EndOfTrack { site: String, residual: u32 },

    /// A BOGUS or NESTED state survived to a point where the caller asked to be told about
    /// it (e.g. `check`'s post-condition). Editors otherwise drop these silently per spec.
    #[snafu(display("{}: inconsistent state left in track: {}", site, description))]
    Inconsistent { site: String, description: String },
}

macro_rules! site {
    () => {
        format!("{}:{}", file!(), line!())
    };
}

/// Reports a programming-invariant violation: panics when `debug` is set (so tests can
/// exercise the panic path deterministically), or logs and lets the caller drop the
/// offending event when it is not. Replaces the original's compile-time `FRAME_DEBUG`.
macro_rules! invariant {
    ($debug:expr, $($arg:tt)*) => {{
        let description = format!($($arg)*);
        if $debug {
            panic!("invariant violated at {}: {}", site!(), description);
        } else {
            log::warn!("invariant violated at {}: {}", site!(), description);
        }
    }};
}

pub(crate) use invariant;
pub(crate) use site;

#[test]
fn site_test() {
    let line = line!() + 1;
    let site = site!();
    assert!(site.contains("error.rs"));
    assert!(site.contains(format!("{}", line).as_str()));
}

#[test]
fn end_of_track_display_test() {
    let err: LibError = EndOfTrackSnafu {
        site: "x.rs:1".to_string(),
        residual: 3u32,
    }
    .build();
    let message = format!("{}", err);
    assert!(message.contains("3 tics remaining"));
}

#[test]
#[should_panic(expected = "invariant violated")]
fn invariant_panics_in_debug_mode() {
    invariant!(true, "write attempted mid-track outside a rewrite");
}

#[test]
fn invariant_logs_in_release_mode() {
    // does not panic
    invariant!(false, "write attempted mid-track outside a rewrite");
}
