/*!
A [`State`] collapses all prior events belonging to one frame into a single record; a
[`StateList`] is the set of frames alive at a cursor position (spec §3/§4.2).
!*/

use crate::error::{site, InconsistentSnafu, Result};
use crate::event::{classify_phase, frame_id, Ev, FrameId, Phase};
use crate::track::CellId;
use std::collections::HashMap;

/// The flag bits carried alongside a state (spec §3 "State flags").
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Hash)]
pub struct StateFlags {
    /// Set by `update` for the current call, cleared on the next `outdate`.
    pub new: bool,
    /// The most recent update changed the value but not the phase.
    pub changed: bool,
    /// An out-of-order event (e.g. note-off without matching note-on).
    pub bogus: bool,
    /// A second `First` arrived on an already-live frame.
    pub nested: bool,
}

/// The record summarizing a frame up to a cursor position (spec §3 "State").
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct State {
    pub ev: Ev,
    pub phase: Phase,
    pub flags: StateFlags,
    /// Editor-local scratch word. Not copied by [`StateList::dup`] (spec §3).
    pub tag: i64,
    /// Arena handle to the frame-start cell. Not copied by [`StateList::dup`] (spec §3).
    pub pos: Option<CellId>,
    /// Absolute tic of the frame-start cell. Not copied by [`StateList::dup`] (spec §3).
    pub tic: u64,
}

impl State {
    /// Builds a fresh state as `update` would for a never-before-seen frame.
    pub(crate) fn fresh(ev: Ev, phase: Phase) -> Self {
        Self {
            ev,
            phase,
            flags: StateFlags {
                new: true,
                ..Default::default()
            },
            tag: 0,
            pos: None,
            tic: 0,
        }
    }

    #[cfg(test)]
    pub(crate) fn new_for_test(ev: Ev, phase: Phase) -> Self {
        Self::fresh(ev, phase)
    }
}

/// An unordered set of live frames, keyed by frame identity (spec §3/§4.2 `StateList`).
#[derive(Clone, Debug, Default)]
pub struct StateList {
    states: HashMap<FrameId, State>,
}

impl StateList {
    pub fn new() -> Self {
        Self {
            states: HashMap::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    /// Frame-identity lookup (spec §4.2 `lookup`).
    pub fn lookup(&self, ev: &Ev) -> Option<&State> {
        self.states.get(&frame_id(ev))
    }

    pub fn lookup_id(&self, id: &FrameId) -> Option<&State> {
        self.states.get(id)
    }

    pub fn lookup_id_mut(&mut self, id: &FrameId) -> Option<&mut State> {
        self.states.get_mut(id)
    }

    /// Looks up the frame for `ev`, allocates a new state if absent, classifies the event's
    /// phase, marks `CHANGED`/`BOGUS`/`NESTED` as appropriate, and returns the updated state
    /// (spec §4.2 `update`).
    pub fn update(&mut self, ev: Ev) -> &mut State {
        use crate::event::Command;

        let id = frame_id(&ev);
        let existing_phase = self.states.get(&id).map(|s| s.phase);
        let phase = classify_phase(&ev, self.states.get(&id));

        // A frame-opening event (currently only a nonzero-velocity note-on) arriving while
        // its frame is already live is a re-entry, regardless of the phase `classify_phase`
        // assigns it to keep the frame going (`Next`) rather than starting over.
        let reopens = matches!(ev.cmd, Command::NoteOn { velocity, .. } if velocity.get() > 0);
        let nested = reopens && existing_phase.map(|p| !p.has_last()).unwrap_or(false);
        let bogus = match existing_phase {
            // A frame is already open: bogus only if a terminator arrives on a frame that
            // was already terminal (a double note-off).
            Some(prev) => phase.has_last() && prev.has_last(),
            // No frame to continue or terminate: a bare terminator, or a continuation-only
            // kind (KeyAfterTouch) with nothing open.
            None => phase.has_last() || matches!(ev.cmd, Command::KeyAfterTouch { .. }),
        };

        match self.states.get_mut(&id) {
            Some(existing) => {
                let changed = existing.ev != ev;
                existing.ev = ev;
                existing.phase = phase;
                existing.flags.new = true;
                existing.flags.changed = changed && !nested;
                existing.flags.nested = nested;
                existing.flags.bogus = bogus;
            }
            None => {
                let mut state = State::fresh(ev, phase);
                state.flags.bogus = bogus;
                self.states.insert(id, state);
            }
        }
        self.states.get_mut(&id).expect("just inserted or updated")
    }

    /// Drops terminal states that were not refreshed since the last sweep, and clears the
    /// `NEW`/`CHANGED` flags on survivors (spec §4.2 `outdate`).
    pub fn outdate(&mut self) {
        self.states.retain(|_, state| !(state.phase.has_last() && !state.flags.new));
        for state in self.states.values_mut() {
            state.flags.new = false;
            state.flags.changed = false;
        }
    }

    /// Explicit removal (spec §4.2 `rm`).
    pub fn rm(&mut self, id: &FrameId) -> Option<State> {
        self.states.remove(id)
    }

    /// Copies only the behavioural fields (`ev`, `phase`, flags excluding `NEW`/`CHANGED`);
    /// `tag`/`pos`/`tic` are reset (spec §3 `dup`).
    pub fn dup(&self) -> StateList {
        let states = self
            .states
            .iter()
            .map(|(id, state)| {
                let copy = State {
                    ev: state.ev,
                    phase: state.phase,
                    flags: StateFlags {
                        new: false,
                        changed: false,
                        bogus: state.flags.bogus,
                        nested: state.flags.nested,
                    },
                    tag: 0,
                    pos: None,
                    tic: 0,
                };
                (*id, copy)
            })
            .collect();
        StateList { states }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&FrameId, &State)> {
        self.states.iter()
    }

    pub fn values(&self) -> impl Iterator<Item = &State> {
        self.states.values()
    }

    /// Reports the first BOGUS or NESTED state found, for callers that want to be told about
    /// inconsistency rather than have it silently dropped the way `check` does.
    pub fn assert_consistent(&self) -> Result<()> {
        for state in self.states.values() {
            if state.flags.bogus {
                return Err(InconsistentSnafu {
                    site: site!(),
                    description: format!("bogus state for frame {:?}", frame_id(&state.ev)),
                }
                .build()
                .into());
            }
            if state.flags.nested {
                return Err(InconsistentSnafu {
                    site: site!(),
                    description: format!("nested state for frame {:?}", frame_id(&state.ev)),
                }
                .build()
                .into());
            }
        }
        Ok(())
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
    fn update_creates_new_state_flagged_new() {
        let mut list = StateList::new();
        let state = list.update(note_on(60));
        assert!(state.flags.new);
        assert_eq!(list.len(), 1);
    }

    #[test]
    fn note_off_without_note_on_is_bogus() {
        let mut list = StateList::new();
        let state = list.update(note_off(60));
        assert!(state.flags.bogus);
    }

    #[test]
    fn second_note_on_while_live_is_nested() {
        let mut list = StateList::new();
        list.update(note_on(60));
        let state = list.update(note_on(60));
        assert!(state.flags.nested);
    }

    #[test]
    fn outdate_removes_unrefreshed_terminal_state() {
        let mut list = StateList::new();
        list.update(note_off(60));
        list.outdate(); // survives: was NEW
        assert_eq!(list.len(), 1);
        list.outdate(); // removed: LAST and no longer NEW
        assert_eq!(list.len(), 0);
    }

    #[test]
    fn outdate_keeps_open_note() {
        let mut list = StateList::new();
        list.update(note_on(60));
        list.outdate();
        list.outdate();
        assert_eq!(list.len(), 1);
    }

    #[test]
    fn assert_consistent_reports_bogus_state() {
        let mut list = StateList::new();
        list.update(note_off(60));
        assert!(list.assert_consistent().is_err());
    }

    #[test]
    fn assert_consistent_ok_for_clean_list() {
        let mut list = StateList::new();
        list.update(note_on(60));
        assert!(list.assert_consistent().is_ok());
    }

    #[test]
    fn dup_does_not_copy_tag_or_pos() {
        let mut list = StateList::new();
        let state = list.update(note_on(60));
        state.tag = 42;
        let copy = list.dup();
        let id = crate::event::frame_id(&note_on(60));
        let copied = copy.lookup_id(&id).unwrap();
        assert_eq!(copied.tag, 0);
        assert!(copied.pos.is_none());
    }
}
