/*!
`merge` overlays one track onto another, giving the second (`src`) priority at every tic
where both carry a live frame of the same identity (spec §4.6 `merge`). A live `dst` note on
the same channel as a newly-arriving `src` note of a *different* pitch cannot coexist either
(a channel only sounds so many notes the way the caller intends once `src` starts driving it)
and is truncated in place rather than left to ring to its original note-off.
!*/

use crate::event::{frame_id, is_note, Command, Ev, FrameId, NoteNumber, Velocity};
use crate::seqptr::SeqPtr;
use crate::state::StateList;
use crate::track::Track;
use std::collections::{HashMap, HashSet};

fn note_of(ev: &Ev) -> Option<NoteNumber> {
    match ev.cmd {
        Command::NoteOn { note, .. } | Command::NoteOff { note, .. } => Some(note),
        _ => None,
    }
}

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

/// Overlays `src` onto `dst` in place: wherever `src` has a live frame, `dst`'s conflicting
/// frame is suspended for the overlap and restored (non-notes only) once `src`'s frame ends.
/// Notes cannot be cancelled, so a dst note overridden mid-flight is simply cut short.
pub fn merge(dst: &mut Track, src: &mut Track) {
    let dst_events = collect_timeline(dst);
    let src_events = collect_timeline(src);

    let mut dst_state = StateList::new();
    let mut src_state = StateList::new();
    let mut suspended: HashSet<FrameId> = HashSet::new();
    let mut suspended_values: HashMap<FrameId, Ev> = HashMap::new();
    let mut truncated: HashSet<FrameId> = HashSet::new();
    let mut out: Vec<(u64, Ev)> = Vec::new();

    let mut timeline: Vec<u64> = dst_events
        .iter()
        .map(|(t, _)| *t)
        .chain(src_events.iter().map(|(t, _)| *t))
        .collect();
    timeline.sort_unstable();
    timeline.dedup();

    let mut di = 0usize;
    let mut si = 0usize;

    for &t in &timeline {
        while si < src_events.len() && src_events[si].0 == t {
            let ev = src_events[si].1;
            si += 1;
            let id = frame_id(&ev);
            let phase = src_state.update(ev).phase;
            if phase.has_first() {
                if dst_state.lookup_id(&id).is_some() {
                    suspended.insert(id);
                } else if is_note(&ev) {
                    // A dst note on the same channel but a different pitch can't keep
                    // ringing once src starts driving a new note there; cut it short.
                    let conflicts: Vec<FrameId> = dst_state
                        .iter()
                        .filter(|(other_id, other)| {
                            **other_id != id
                                && is_note(&other.ev)
                                && other.ev.addr == ev.addr
                                && !other.phase.has_last()
                        })
                        .map(|(other_id, _)| *other_id)
                        .collect();
                    for other_id in conflicts {
                        if let Some(other) = dst_state.lookup_id(&other_id) {
                            if let Some(note) = note_of(&other.ev) {
                                out.push((
                                    t,
                                    Ev::new(
                                        ev.addr,
                                        Command::NoteOff {
                                            note,
                                            velocity: Velocity::new(0),
                                        },
                                    ),
                                ));
                            }
                        }
                        dst_state.rm(&other_id);
                        truncated.insert(other_id);
                    }
                }
            }
            out.push((t, ev));
            if phase.has_last() && suspended.remove(&id) {
                if let Some(prev_ev) = suspended_values.remove(&id) {
                    if !is_note(&prev_ev) {
                        out.push((t, prev_ev));
                    }
                }
                dst_state.rm(&id);
            }
        }
        while di < dst_events.len() && dst_events[di].0 == t {
            let ev = dst_events[di].1;
            di += 1;
            let id = frame_id(&ev);
            if truncated.remove(&id) {
                // The frame's closing event was already synthesized early; this is its
                // original (now stale) terminator.
                continue;
            }
            if suspended.contains(&id) {
                suspended_values.insert(id, ev);
                dst_state.update(ev);
                continue;
            }
            dst_state.update(ev);
            out.push((t, ev));
        }
    }

    let total_len = dst.len_tics().max(src.len_tics());
    dst.clear();
    let mut prev = 0u64;
    for (t, ev) in out {
        let delta = (t - prev) as u32;
        dst.push(delta, ev);
        prev = t;
    }
    let trailing = total_len.saturating_sub(prev) as u32;
    dst.set_delta(dst.tail(), trailing);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{Channel, ChannelAddr, Command, ControlNumber, ControlValue, Device, NoteNumber, Velocity};

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

    fn cc(number: u8, value: u8) -> Ev {
        Ev::new(
            addr(),
            Command::Controller {
                number: ControlNumber::new(number),
                value: ControlValue::new(value),
            },
        )
    }

    fn events_of(track: &mut Track) -> Vec<Ev> {
        collect_timeline(track).into_iter().map(|(_, ev)| ev).collect()
    }

    #[test]
    fn merge_with_empty_src_is_idempotent() {
        let mut dst = Track::new();
        dst.push(0, note_on(60));
        dst.push(480, note_off(60));
        let before = vec![note_on(60), note_off(60)];
        let mut src = Track::new();
        merge(&mut dst, &mut src);
        assert_eq!(events_of(&mut dst), before);
    }

    #[test]
    fn merge_gives_src_priority_on_controller_overlap() {
        let mut dst = Track::new();
        dst.push(0, cc(7, 100));
        let mut src = Track::new();
        src.push(50, cc(7, 50));
        merge(&mut dst, &mut src);
        let evs = events_of(&mut dst);
        assert!(evs.contains(&cc(7, 50)));
    }

    #[test]
    fn merge_cuts_short_a_conflicting_note_of_same_pitch() {
        let mut dst = Track::new();
        dst.push(0, note_on(60));
        dst.push(480, note_off(60));
        let mut src = Track::new();
        src.push(240, note_on(60));
        src.push(240, note_off(60));
        merge(&mut dst, &mut src);
        let evs = events_of(&mut dst);
        // the dst note-off at 480 is suspended (overridden), src's own note-on/off survive
        assert!(evs.contains(&note_on(60)));
        assert!(evs.contains(&note_off(60)));
        assert_eq!(evs.iter().filter(|e| **e == note_off(60)).count(), 1);
    }

    #[test]
    fn merge_truncates_a_conflicting_note_of_different_pitch() {
        let mut dst = Track::new();
        dst.push(0, note_on(60));
        dst.push(480, note_off(60));
        let mut src = Track::new();
        src.push(240, note_on(64));
        src.push(240, note_off(64));
        merge(&mut dst, &mut src);
        let evs = events_of(&mut dst);
        // dst's C4 is cut short at tic 240 instead of ringing to its original note-off at 480
        assert_eq!(evs, vec![note_on(60), note_off(60), note_on(64), note_off(64)]);
    }
}
