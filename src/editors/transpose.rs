/*!
`transpose` shifts note pitch within a region, built the same way as [`quantize`](super::quantize)
(spec §4.6 `transpose`).
!*/

use crate::event::{frame_id, ChannelAddr, Command, Ev, FrameId, NoteNumber};
use crate::seqptr::SeqPtr;
use crate::track::Track;

fn collect_timeline(track: &mut Track) -> Vec<(u64, Ev)> {
    let mut ptr = SeqPtr::new(track);
    let mut out = Vec::new();
    loop {
        if ptr.evavail() {
            let tic = ptr.tic();
            if let Some(ev) = ptr.evget() {
                out.push((tic, ev));
            }
            continue;
        }
        if ptr.eot() {
            break;
        }
        if ptr.ticskip(u32::MAX) > 0 {
            break;
        }
    }
    out
}

fn transposed(addr: ChannelAddr, cmd: Command, halftones: i32) -> Ev {
    let shift = |note: NoteNumber| NoteNumber::new(((note.get() as i32 + halftones) & 0x7f) as u8);
    let cmd = match cmd {
        Command::NoteOn { note, velocity } => Command::NoteOn {
            note: shift(note),
            velocity,
        },
        Command::NoteOff { note, velocity } => Command::NoteOff {
            note: shift(note),
            velocity,
        },
        Command::KeyAfterTouch { note, value } => Command::KeyAfterTouch {
            note: shift(note),
            value,
        },
        other => other,
    };
    Ev::new(addr, cmd)
}

/// Transposes every note event within `[start, start+len)` by `halftones` (wrapping mod 128).
/// Non-note events and notes outside the region are untouched.
pub fn transpose(src: &mut Track, start: u64, len: u64, halftones: i32) {
    if halftones.rem_euclid(128) == 0 {
        return;
    }
    let total_len = src.len_tics();
    let timeline = collect_timeline(src);
    let mut scratch_events: Vec<(i64, Ev)> = Vec::with_capacity(timeline.len());

    for (tic, ev) in timeline {
        let is_note = matches!(frame_id(&ev), FrameId::Note { .. });
        let in_region = tic >= start && tic < start + len;
        let out_ev = if is_note && in_region {
            transposed(ev.addr, ev.cmd, halftones)
        } else {
            ev
        };
        scratch_events.push((tic as i64, out_ev));
    }

    // Every event is present exactly once, at its original tic, so the re-pitched timeline
    // replaces `src` outright; routing it through `merge` would re-admit the untransposed
    // original note alongside its replacement instead of substituting it.
    scratch_events.sort_by_key(|(t, _)| *t);
    src.clear();
    let mut prev = 0i64;
    for (t, ev) in scratch_events {
        let delta = (t - prev).max(0) as u32;
        src.push(delta, ev);
        prev = t;
    }
    let trailing = (total_len as i64 - prev).max(0) as u32;
    src.set_delta(src.tail(), trailing);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{Channel, Device, Velocity};

    fn addr() -> ChannelAddr {
        ChannelAddr::new(Device::new(0), Channel::new(0))
    }

    fn note_on(note: u8) -> Ev {
        Ev::new(
            addr(),
            Command::NoteOn {
                note: NoteNumber::new(note),
                velocity: Velocity::new(100),
            },
        )
    }

    fn note_off(note: u8) -> Ev {
        Ev::new(
            addr(),
            Command::NoteOff {
                note: NoteNumber::new(note),
                velocity: Velocity::new(0),
            },
        )
    }

    #[test]
    fn transpose_shifts_note_pitch_up() {
        let mut track = Track::new();
        track.push(0, note_on(60));
        track.push(480, note_off(60));
        transpose(&mut track, 0, 960, 12);
        let evs = collect_timeline(&mut track);
        assert!(evs.iter().any(|(_, ev)| *ev == note_on(72)));
        assert!(evs.iter().any(|(_, ev)| *ev == note_off(72)));
    }

    #[test]
    fn transpose_wraps_past_127() {
        let mut track = Track::new();
        track.push(0, note_on(127));
        track.push(10, note_off(127));
        transpose(&mut track, 0, 20, 2);
        let evs = collect_timeline(&mut track);
        assert!(evs.iter().any(|(_, ev)| *ev == note_on(1)));
    }

    #[test]
    fn zero_halftones_is_noop() {
        let mut track = Track::new();
        track.push(0, note_on(60));
        track.push(480, note_off(60));
        transpose(&mut track, 0, 960, 0);
        let evs = collect_timeline(&mut track);
        assert_eq!(evs, vec![(0, note_on(60)), (480, note_off(60))]);
    }
}
