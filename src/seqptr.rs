/*!
A [`SeqPtr`] is a cursor over a [`Track`] paired with its own [`StateList`] tracking every
frame alive at the cursor's current position (spec §4). It borrows the track mutably for its
whole lifetime, which is this crate's compile-time stand-in for the single-writer contract
spec §4's Design Notes ask callers to respect by convention.
!*/

use crate::error::{invariant, site, EndOfTrackSnafu, Result};
use crate::event::{frame_id, is_note, Ev};
use crate::state::StateList;
use crate::track::{CellId, Track};
use log::trace;

/// A cursor into a track plus the live-frame bookkeeping needed to edit around it (spec §4
/// "SeqPtr").
pub struct SeqPtr<'t> {
    track: &'t mut Track,
    /// Cell immediately at or after the cursor; `None` only transiently inside `evput`.
    pos: CellId,
    /// Tics between the previous event and `pos`, not yet "consumed" by a read.
    delta: u32,
    /// Absolute tic of the cursor.
    tic: u64,
    states: StateList,
    /// Set by `evdel`, cleared by anything else; `evput` asserts it is clear (spec §4.4).
    last_op_was_delete: bool,
    /// Controls whether invariant violations panic (tests, dev builds) or only log.
    debug: bool,
}

impl<'t> SeqPtr<'t> {
    /// A cursor at the head of `track` with an empty state list (spec §4 `seqptr_new`).
    pub fn new(track: &'t mut Track) -> Self {
        let pos = track.head();
        Self {
            track,
            pos,
            delta: 0,
            tic: 0,
            states: StateList::new(),
            last_op_was_delete: false,
            debug: cfg!(debug_assertions),
        }
    }

    pub fn states(&self) -> &StateList {
        &self.states
    }

    pub fn states_mut(&mut self) -> &mut StateList {
        &mut self.states
    }

    pub fn tic(&self) -> u64 {
        self.tic
    }

    pub fn pos(&self) -> CellId {
        self.pos
    }

    /// True once the sentinel is the only thing left ahead of the cursor (spec §4.4 `eot`).
    pub fn eot(&self) -> bool {
        self.pos == self.track.tail()
    }

    /// True if an event (not the sentinel) is available at the cursor without advancing tics
    /// (spec §4.4 `evavail`).
    pub fn evavail(&self) -> bool {
        self.delta == 0 && !self.eot()
    }

    /// Inserts `tics` of new blank time ahead of the cursor (before whatever currently sits
    /// at `pos`), without moving the cursor itself. Unlike `ticput`, this works anywhere in
    /// the track, not just at genuine end-of-track.
    pub fn insert_silence(&mut self, tics: u32) {
        if tics == 0 {
            return;
        }
        let cur = self.track.cell(self.pos).delta;
        self.track.set_delta(self.pos, cur + tics);
    }

    /// Reads and advances past the event at the cursor. Panics (via `invariant!`) if called
    /// with no event available — callers must check `evavail` first (spec §4.4 `evget`).
    pub fn evget(&mut self) -> Option<Ev> {
        if !self.evavail() {
            invariant!(self.debug, "evget called with no event available");
            return None;
        }
        let cell_id = self.pos;
        let tic = self.tic;
        let ev = self.track.cell(self.pos).ev;
        let next = self
            .track
            .cell(self.pos)
            .next
            .expect("non-sentinel cell always has a next");
        self.pos = next;
        self.delta = 0;
        self.last_op_was_delete = false;
        if let Some(ev) = ev {
            trace!("evget at tic {}: {:?}", self.tic, ev);
            let was_live = self.states.lookup(&ev).is_some();
            let state = self.states.update(ev);
            if !was_live {
                state.pos = Some(cell_id);
                state.tic = tic;
            }
        }
        ev
    }

    /// The event at the cursor, if any, without advancing or modifying anything (used by
    /// editors that need to inspect an event before deciding whether to `evget` or `evdel`
    /// it).
    pub fn peek(&self) -> Option<Ev> {
        if self.evavail() {
            self.track.cell(self.pos).ev
        } else {
            None
        }
    }

    /// Deletes the event at the cursor, donating its delta into `self.delta` rather than
    /// advancing the absolute tic (spec §4.4 `evdel`).
    pub fn evdel(&mut self) {
        if !self.evavail() {
            invariant!(self.debug, "evdel called with no event available");
            return;
        }
        let removed = self.track.unlink(self.pos);
        self.pos = removed;
        self.delta = 0;
        self.last_op_was_delete = true;
        trace!("evdel at tic {}", self.tic);
    }

    /// `evdel`, additionally recording the removed event into `erase_list` as `evget` would
    /// have (spec §4.4 `evdel(erase_list?)`).
    pub fn evdel_into(&mut self, erase_list: &mut StateList) -> Option<Ev> {
        let ev = self.peek()?;
        erase_list.update(ev);
        self.evdel();
        Some(ev)
    }

    /// Inserts `ev` at the cursor, splitting the current gap so the new cell lands exactly
    /// `self.delta` tics after the previous event. `evput` must not directly follow another
    /// `evput`/`evdel` at the same position without an intervening `ticput`/`evget` advancing
    /// past it, mirroring spec §4.4's prohibition on stacking writes (spec §4.4 `evput`).
    pub fn evput(&mut self, ev: Ev) {
        if self.last_op_was_delete {
            invariant!(
                self.debug,
                "evput directly following evdel without an intervening advance"
            );
        }
        let new_id = self.track.insert_before(self.pos, self.delta, Some(ev));
        self.track.set_delta(self.pos, 0);
        self.pos = new_id;
        // Re-run evget's advance-and-classify step so state bookkeeping stays uniform.
        self.delta = 0;
        self.evget();
    }

    /// Advances the cursor by up to `n` tics without reading any event crossed, stopping
    /// early (and returning the shortfall) at end of track (spec §4.4 `ticskip`).
    pub fn ticskip(&mut self, n: u32) -> u32 {
        let before = self.tic;
        let mut remaining = n;
        while remaining > 0 {
            if self.evavail() {
                break;
            }
            let avail_here = self.track.cell(self.pos).delta - self.delta;
            if avail_here == 0 {
                if self.eot() {
                    break;
                }
                self.advance_cell();
                continue;
            }
            let step = avail_here.min(remaining);
            self.delta += step;
            self.tic += step as u64;
            remaining -= step;
        }
        // The statelist's invariant is `update` folded over prior events interleaved with
        // `outdate` after each tic advance (spec §3/§4.4) — a cursor that only ever calls
        // `evget` would self-maintain this via `evget`'s own bookkeeping, but skipping tics
        // without reading never touches the statelist otherwise.
        if self.tic != before {
            self.states.outdate();
        }
        remaining
    }

    /// Advances by `n` tics, deleting every event crossed along the way (spec §4.4
    /// `ticdel`).
    pub fn ticdel(&mut self, n: u32) -> u32 {
        let before = self.tic;
        let mut remaining = n;
        while remaining > 0 {
            if self.evavail() {
                self.evdel();
                continue;
            }
            let cur_delta = self.track.cell(self.pos).delta;
            let avail_here = cur_delta - self.delta;
            if avail_here == 0 {
                if self.eot() {
                    break;
                }
                self.advance_cell();
                continue;
            }
            let step = avail_here.min(remaining);
            // Unlike ticskip, the removed span is cut out of the track structurally rather
            // than just walked over.
            self.track.set_delta(self.pos, cur_delta - step);
            self.tic += step as u64;
            remaining -= step;
        }
        if self.tic != before {
            self.states.outdate();
        }
        remaining
    }

    /// `ticdel`, additionally recording every deleted event into `erase_list` (spec §4.4
    /// `ticdel(max, erase_list?)`).
    pub fn ticdel_into(&mut self, n: u32, erase_list: &mut StateList) -> u32 {
        let before = self.tic;
        let mut remaining = n;
        while remaining > 0 {
            if self.evavail() {
                self.evdel_into(erase_list);
                continue;
            }
            let cur_delta = self.track.cell(self.pos).delta;
            let avail_here = cur_delta - self.delta;
            if avail_here == 0 {
                if self.eot() {
                    break;
                }
                self.advance_cell();
                continue;
            }
            let step = avail_here.min(remaining);
            self.track.set_delta(self.pos, cur_delta - step);
            self.tic += step as u64;
            remaining -= step;
        }
        if self.tic != before {
            self.states.outdate();
        }
        remaining
    }

    /// Advances by exactly `n` tics, extending the track with blank time at the sentinel if
    /// it runs out. Callers must only invoke this once genuinely at end-of-track (e.g. via
    /// `skip`'s residual) — calling it while an event is still pending would silently donate
    /// padding in front of that event (spec §4.4 `ticput`).
    pub fn ticput(&mut self, n: u32) {
        let shortfall = self.ticskip(n);
        if shortfall > 0 {
            if !self.eot() {
                invariant!(self.debug, "ticput called with an event still pending");
            }
            self.track.set_delta(self.track.tail(), self.delta + shortfall);
            self.delta = 0;
            self.tic += shortfall as u64;
            self.states.outdate();
        }
    }

    fn advance_cell(&mut self) {
        let next = self
            .track
            .cell(self.pos)
            .next
            .expect("non-sentinel cell always has a next");
        self.pos = next;
        self.delta = 0;
    }

    /// Advances by up to `n` tics, reading (via `evget`) every event crossed along the way;
    /// returns the residual left unconsumed if the track runs out first (spec §4.5 `skip`).
    pub fn skip(&mut self, n: u32) -> u32 {
        let mut remaining = n;
        while remaining > 0 {
            if self.evavail() {
                self.evget();
                continue;
            }
            if self.eot() {
                break;
            }
            remaining = self.ticskip(remaining);
        }
        remaining
    }

    /// Like `skip`, but pads any residual with `ticput` so the cursor always ends up exactly
    /// `n` tics ahead of where it started (spec §4.5 `seek`).
    pub fn seek(&mut self, n: u32) {
        let left = self.skip(n);
        if left > 0 {
            self.ticput(left);
        }
    }

    /// Like `seek`, but reports a genuine end-of-track shortfall as an error instead of
    /// padding it; for callers that need to know the track was too short rather than have it
    /// silently extended.
    pub fn try_seek(&mut self, n: u32) -> Result<()> {
        let residual = self.skip(n);
        if residual > 0 {
            return Err(EndOfTrackSnafu {
                site: site!(),
                residual,
            }
            .build()
            .into());
        }
        Ok(())
    }

    /// Synthesizes and writes the cancel events for every live frame, without advancing the
    /// cursor position otherwise (spec §4.5 `cancel`).
    pub fn cancel(&mut self) {
        let evs: Vec<Ev> = self
            .states
            .values()
            .flat_map(crate::event::ev_cancel)
            .collect();
        for ev in evs {
            self.evput(ev);
        }
    }

    /// Synthesizes and writes the restore events for every live frame (spec §4.5 `restore`).
    pub fn restore(&mut self) {
        let evs: Vec<Ev> = self
            .states
            .values()
            .flat_map(crate::event::ev_restore)
            .collect();
        for ev in evs {
            self.evput(ev);
        }
    }

    /// Walks backward from the cursor, removing the most recent cell belonging to `ev`'s
    /// frame. If that cell was the frame's only cell, the frame's state is dropped entirely
    /// (spec §4.5 `rmlast`).
    pub fn rmlast(&mut self, ev: &Ev) -> bool {
        let id = frame_id(ev);
        let Some(state) = self.states.lookup_id(&id) else {
            return false;
        };
        let Some(start) = state.pos else {
            return false;
        };
        let mut cur = self.track.cell(self.pos).prev;
        while let Some(c) = cur {
            if c == start {
                break;
            }
            if self
                .track
                .cell(c)
                .ev
                .map(|e| frame_id(&e) == id)
                .unwrap_or(false)
            {
                self.remove_cell(c);
                return true;
            }
            cur = self.track.cell(c).prev;
        }
        // Only the frame-start cell itself carried this frame; remove it and drop the state.
        if let Some(c) = cur {
            if c == start {
                self.remove_cell(c);
                self.states.rm(&id);
                return true;
            }
        }
        false
    }

    /// Removes every cell belonging to `ev`'s frame back to and including the frame-start
    /// cell, dropping the frame's state (spec §4.5 `rmprev`).
    pub fn rmprev(&mut self, ev: &Ev) -> bool {
        let id = frame_id(ev);
        let Some(state) = self.states.lookup_id(&id) else {
            return false;
        };
        let Some(start) = state.pos else {
            return false;
        };
        let mut removed_any = false;
        loop {
            let cur = self.track.cell(self.pos).prev;
            let Some(c) = cur else { break };
            let is_member = self
                .track
                .cell(c)
                .ev
                .map(|e| frame_id(&e) == id)
                .unwrap_or(false);
            if !is_member {
                break;
            }
            let is_start = c == start;
            self.remove_cell(c);
            removed_any = true;
            if is_start {
                break;
            }
        }
        if removed_any {
            self.states.rm(&id);
        }
        removed_any
    }

    /// Removes a cell strictly behind the cursor, donating its delta forward. Does not touch
    /// `self.pos`/`self.delta` since `c` is known to precede them.
    fn remove_cell(&mut self, c: CellId) {
        self.track.unlink(c);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{Channel, ChannelAddr, Command, Device, NoteNumber, Velocity};

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
    fn fresh_pointer_is_at_eot() {
        let mut track = Track::new();
        let ptr = SeqPtr::new(&mut track);
        assert!(ptr.eot());
        assert!(!ptr.evavail());
    }

    #[test]
    fn evput_then_evget_roundtrips() {
        let mut track = Track::new();
        {
            let mut ptr = SeqPtr::new(&mut track);
            ptr.ticput(10);
            ptr.evput(note_on(60));
        }
        let mut ptr = SeqPtr::new(&mut track);
        let shortfall = ptr.ticskip(10);
        assert_eq!(shortfall, 0);
        assert!(ptr.evavail());
        let got = ptr.evget();
        assert_eq!(got, Some(note_on(60)));
        assert_eq!(ptr.states().len(), 1);
    }

    #[test]
    fn ticput_extends_track_past_end() {
        let mut track = Track::new();
        let mut ptr = SeqPtr::new(&mut track);
        ptr.ticput(40);
        assert_eq!(ptr.tic(), 40);
        assert!(ptr.eot());
    }

    #[test]
    fn evdel_removes_event_and_donates_delta() {
        let mut track = Track::new();
        track.push(10, note_on(60));
        track.push(5, note_off(60));
        let mut ptr = SeqPtr::new(&mut track);
        ptr.ticskip(10);
        assert!(ptr.evavail());
        ptr.evdel();
        assert_eq!(track.events_len(), 1);
        let shortfall = ptr.ticskip(5);
        assert_eq!(shortfall, 0);
        assert!(ptr.evavail());
    }

    #[test]
    fn ticskip_outdates_terminated_frame() {
        let mut track = Track::new();
        track.push(5, note_on(60));
        track.push(5, note_off(60));
        track.push(10, note_on(62)); // padding so the cursor isn't at end of track yet
        let mut ptr = SeqPtr::new(&mut track);
        ptr.seek(10);
        assert_eq!(ptr.states().len(), 1);
        // the terminated note survives one outdate sweep (it was still NEW) but is pruned
        // by the next one, same as a fresh cursor replaying the same events would see.
        ptr.ticskip(1);
        assert_eq!(ptr.states().len(), 1);
        ptr.ticskip(1);
        assert_eq!(ptr.states().len(), 0);
    }

    #[test]
    fn seek_reads_through_events_updating_state() {
        let mut track = Track::new();
        track.push(5, note_on(60));
        track.push(5, note_off(60));
        let mut ptr = SeqPtr::new(&mut track);
        ptr.seek(10);
        assert_eq!(ptr.tic(), 10);
    }

    #[test]
    fn seek_pads_past_end_of_track() {
        let mut track = Track::new();
        let mut ptr = SeqPtr::new(&mut track);
        ptr.seek(30);
        assert_eq!(ptr.tic(), 30);
        assert!(ptr.eot());
    }

    #[test]
    fn try_seek_errors_on_shortfall_instead_of_padding() {
        let mut track = Track::new();
        let mut ptr = SeqPtr::new(&mut track);
        let err = ptr.try_seek(30).unwrap_err();
        assert!(format!("{}", err).contains("30 tics remaining"));
        assert!(ptr.eot());
    }

    #[test]
    fn try_seek_succeeds_when_track_is_long_enough() {
        let mut track = Track::new();
        track.push(30, note_on(60));
        let mut ptr = SeqPtr::new(&mut track);
        assert!(ptr.try_seek(10).is_ok());
    }

    #[test]
    fn cancel_writes_cancel_event_for_live_controller() {
        let mut track = Track::new();
        let mut ptr = SeqPtr::new(&mut track);
        ptr.evput(Ev::new(
            addr(),
            Command::Controller {
                number: crate::event::ControlNumber::new(7),
                value: crate::event::ControlValue::new(100),
            },
        ));
        ptr.cancel();
        assert_eq!(track.events_len(), 2);
    }

    #[test]
    fn rmlast_drops_frame_state_when_only_cell() {
        let mut track = Track::new();
        let mut ptr = SeqPtr::new(&mut track);
        ptr.evput(note_on(60));
        assert_eq!(ptr.states().len(), 1);
        let removed = ptr.rmlast(&note_on(60));
        assert!(removed);
        assert_eq!(track.events_len(), 0);
    }
}
