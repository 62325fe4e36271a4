/*!
`quantize` snaps note starts inside a region toward a grid, leaving every other event (and
every note-off) exactly where it was (spec §4.6 `quantize`).
!*/

use crate::event::{classify_phase, frame_id, Command, Ev, FrameId};
use crate::seqptr::SeqPtr;
use crate::state::StateList;
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

fn ceil_div(a: i64, b: i64) -> i64 {
    (a + b - 1) / b
}

/// The signed tic shift a note-start at region-relative tic `r0 = (t - start + offset) mod
/// quant` receives at the given `rate` (a percentage, 0..=100) of `quant`.
fn quantize_offset(r0: i64, quant: i64, rate: u8) -> i64 {
    let rate = rate as i64;
    if r0 * 2 < quant {
        -ceil_div(r0 * rate, 100)
    } else {
        ceil_div((quant - r0) * rate, 100)
    }
}

fn rebuild(track: &mut Track, mut events: Vec<(i64, Ev)>, total_len: u64) {
    events.sort_by_key(|(t, _)| *t);
    track.clear();
    let mut prev = 0i64;
    for (t, ev) in events {
        let delta = (t - prev).max(0) as u32;
        track.push(delta, ev);
        prev = t;
    }
    let trailing = (total_len as i64 - prev).max(0) as u32;
    track.set_delta(track.tail(), trailing);
}

/// Quantizes note-start events within `[start, start+len)` toward a `quant`-tic grid at
/// `rate` percent strength, `offset` tics of grid phase. `rate=0` is a no-op; `rate=100`
/// snaps fully. Non-note events and note-ends are left exactly where they were.
pub fn quantize(src: &mut Track, start: u64, len: u64, offset: i64, quant: u32, rate: u8) {
    if quant == 0 || rate == 0 {
        return;
    }
    let total_len = src.len_tics();
    let timeline = collect_timeline(src);
    let mut state = StateList::new();
    let mut scratch_events: Vec<(i64, Ev)> = Vec::with_capacity(timeline.len());

    for (tic, ev) in timeline {
        let existing = state.lookup(&ev);
        let phase = classify_phase(&ev, existing);
        let is_note_start = matches!(ev.cmd, Command::NoteOn { velocity, .. } if velocity.get() > 0)
            && phase.has_first()
            && matches!(frame_id(&ev), FrameId::Note { .. });
        state.update(ev);

        let in_region = tic >= start && tic < start + len;
        let out_tic = if is_note_start && in_region {
            let r0 = (tic as i64 - start as i64 + offset).rem_euclid(quant as i64);
            let ofs = quantize_offset(r0, quant as i64, rate);
            debug_assert!(tic as i64 + ofs >= 0, "quantize must not move a note before tic 0");
            (tic as i64 + ofs).max(0)
        } else {
            tic as i64
        };
        scratch_events.push((out_tic, ev));
    }

    // Every event is present exactly once in `scratch_events` (untouched or re-timed), so the
    // result replaces `src` outright rather than being folded in through `merge` — that avoids
    // re-admitting the unshifted original note-on alongside its quantized replacement.
    rebuild(src, scratch_events, total_len);
}
