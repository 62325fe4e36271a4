/*!
`move_span` copies and/or cuts the `selector`-matching frames of a `[start, start+len)`
excerpt between two tracks (spec §4.6 `move`). The copy is made self-contained by canceling
any frame still open at the excerpt's end; a cut restores whatever non-note frame was live
and selector-matching right before the excerpt, immediately after it.
!*/

use crate::event::{ev_cancel, ev_restore, Ev, Selector};
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

/// Copies (if `copy`) and/or cuts (if `blank`) the `selector`-matching frames of
/// `[start, start+len)` from `src` into `dst`. Neither flag set is a no-op. `dst` receives a
/// self-contained excerpt (any frame still open at `start+len` is canceled at the excerpt's
/// own end); a cut closes the gap in `src` and, for non-note frames that were live going in,
/// restores them immediately past the excerpt.
pub fn move_span(
    src: &mut Track,
    start: u64,
    len: u64,
    selector: Selector,
    dst: &mut Track,
    copy: bool,
    blank: bool,
) {
    if !copy && !blank {
        return;
    }
    let total_len = src.len_tics();
    let timeline = collect_timeline(src);

    let mut state = StateList::new();
    let mut kept_events: Vec<(i64, Ev)> = Vec::new();
    let mut dst_events: Vec<(i64, Ev)> = Vec::new();

    for &(tic, ev) in timeline.iter().filter(|(t, _)| *t < start) {
        state.update(ev);
        kept_events.push((tic as i64, ev));
    }

    // Opening boundary: frames already live and selector-matching at `start` get restored
    // into the copy (so it plays correctly alone) and, if cutting, canceled in src. A live
    // non-note frame's value stays outstanding regardless of its own phase being `FirstLast`
    // (every plain controller message is a complete frame by itself, but the value it set
    // persists); `ev_cancel`/`ev_restore` already no-op for notes and one-shot config events,
    // so the selector match is the only filter needed here.
    if copy {
        for s in state.values().filter(|s| selector.matches(&s.ev)) {
            for rev in ev_restore(s) {
                dst_events.push((0, rev));
            }
        }
    }
    if blank {
        for s in state.values().filter(|s| selector.matches(&s.ev)) {
            for cev in ev_cancel(s) {
                kept_events.push((start as i64, cev));
            }
        }
    }

    let mut dst_state = StateList::new();
    for &(_, ev) in &dst_events {
        dst_state.update(ev);
    }

    for &(tic, ev) in timeline.iter().filter(|(t, _)| *t >= start && *t < start + len) {
        state.update(ev);
        if selector.matches(&ev) {
            if copy {
                let rel = tic as i64 - start as i64;
                dst_events.push((rel, ev));
                dst_state.update(ev);
            }
            if !blank {
                kept_events.push((tic as i64, ev));
            }
        } else {
            kept_events.push((tic as i64, ev));
        }
    }

    // Closing boundary: the copy must not leave a frame dangling past its own length.
    if copy {
        for s in dst_state.values() {
            for cev in ev_cancel(s) {
                dst_events.push((len as i64, cev));
            }
        }
    }
    // A cut restores whatever non-note frame was live right before the excerpt, so it
    // continues playing past the gap just closed.
    if blank {
        for s in state.values().filter(|s| selector.matches(&s.ev)) {
            for rev in ev_restore(s) {
                kept_events.push(((start + len) as i64, rev));
            }
        }
    }

    for &(tic, ev) in timeline.iter().filter(|(t, _)| *t >= start + len) {
        kept_events.push((tic as i64, ev));
    }

    if blank {
        rebuild(src, kept_events, total_len);
    }
    if copy {
        rebuild(dst, dst_events, len);
    }
}
