/*!
`check` rewrites a track dropping BOGUS and NESTED events and duplicate values, then closes
off any frame left open at the end of the walk (spec §4.6 `check`).
!*/

use crate::event::Ev;
use crate::seqptr::SeqPtr;
use crate::state::StateList;
use crate::track::Track;

/// Rewrites `track` in place: out-of-order (BOGUS) and re-entrant (NESTED) events are
/// dropped, consecutive value-equal events on the same frame are collapsed, and any frame
/// still open at end-of-track is cut via `rmprev`.
pub fn check(track: &mut Track) {
    let events = collect_with_tic(track);

    let mut state = StateList::new();
    let mut out: Vec<(u64, Ev)> = Vec::new();

    for (tic, ev) in events {
        let prev = state.lookup(&ev).cloned();
        let s = state.update(ev);
        if s.flags.bogus || s.flags.nested {
            continue;
        }
        if let Some(prev) = prev {
            if prev.ev == ev && prev.phase == s.phase {
                // duplicate value, no state change worth re-emitting
                continue;
            }
        }
        out.push((tic, ev));
    }

    // Any frame not yet LAST at the end of the walk is unterminated; drop it entirely
    // (rmprev) rather than emit a synthetic close.
    let unterminated: std::collections::HashSet<_> = state
        .iter()
        .filter(|(_, s)| !s.phase.has_last())
        .map(|(id, _)| *id)
        .collect();
    out.retain(|(_, ev)| !unterminated.contains(&crate::event::frame_id(ev)));

    let total_len = track.len_tics();
    track.clear();
    let mut prev_tic = 0u64;
    for (t, ev) in out {
        track.push((t - prev_tic) as u32, ev);
        prev_tic = t;
    }
    let trailing = total_len.saturating_sub(prev_tic) as u32;
    track.set_delta(track.tail(), trailing);
}

fn collect_with_tic(track: &mut Track) -> Vec<(u64, Ev)> {
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
