/*!
The `event` module classifies a single MIDI event: its command payload, its channel address,
and — relative to whatever state preceded it — its phase within a frame. None of this module
knows about tracks or cursors; it is pure classification (spec §4.1).
!*/

use crate::constants::REVMAX;
use crate::state::State;

clamp!(Device, u8, 0, 15, 0, pub);
clamp!(Channel, u8, 0, 15, 0, pub);
clamp!(NoteNumber, u8, 0, 127, 60, pub);
clamp!(Velocity, u8, 0, 127, 72, pub);
clamp!(Program, u8, 0, 127, 0, pub);
clamp!(ControlNumber, u8, 0, 127, 0, pub);
clamp!(ControlValue, u8, 0, 127, 0, pub);

/// The device+channel pair named in spec §3 ("channel device+channel pair"). Meaningless for
/// [`Command::Tempo`] and [`Command::TimeSig`], which are singleton-per-track frames.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Hash)]
pub struct ChannelAddr {
    pub device: Device,
    pub channel: Channel,
}

impl ChannelAddr {
    pub fn new(device: Device, channel: Channel) -> Self {
        Self { device, channel }
    }
}

/// A 14-bit RPN/NRPN/pitchbend-style value, `0..=16383`.
pub type U14 = u16;

/// The command kinds named in spec §3. `Ev`'s payload.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum Command {
    NoteOn {
        note: NoteNumber,
        velocity: Velocity,
    },
    NoteOff {
        note: NoteNumber,
        velocity: Velocity,
    },
    KeyAfterTouch {
        note: NoteNumber,
        value: ControlValue,
    },
    /// A plain 7-bit controller message. Always phase `FirstLast` — see
    /// SPEC_FULL.md's Open Question resolution (d).
    Controller {
        number: ControlNumber,
        value: ControlValue,
    },
    /// An already-resolved 14-bit controller pair (MSB/LSB combination is a transport
    /// concern and is not modeled here).
    Controller14 {
        number: ControlNumber,
        value: U14,
    },
    Nrpn {
        param: U14,
        value: U14,
    },
    Rpn {
        param: U14,
        value: U14,
    },
    PitchBend {
        value: i16,
    },
    Program {
        program: Program,
    },
    ChannelAfterTouch {
        value: ControlValue,
    },
    Tempo {
        usec24: u32,
    },
    TimeSig {
        beats: u8,
        tics_per_beat: u32,
    },
}

/// `RPN Null` (101=127, 100=127): the conventional "no active parameter" park value.
pub const RPN_NULL_PARAM: U14 = 0x3FFF;

/// A single classified MIDI event: a channel address plus a command payload. There is no
/// `NULL` command variant — the track's sentinel cell carries `None` instead (spec §3's
/// `ev.cmd == NULL` is represented as `Option<Ev>` on the cell; see DESIGN.md).
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub struct Ev {
    pub addr: ChannelAddr,
    pub cmd: Command,
}

impl Ev {
    pub fn new(addr: ChannelAddr, cmd: Command) -> Self {
        Self { addr, cmd }
    }
}

/// The role an event plays within its frame (spec §3/GLOSSARY). Always recomputed from
/// `(event, prior state)`, never stored as a field of `Ev` (Design Notes: "Phase is a view,
/// not a field").
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum Phase {
    First,
    Next,
    Last,
    FirstLast,
}

impl Phase {
    pub fn has_first(&self) -> bool {
        matches!(self, Phase::First | Phase::FirstLast)
    }

    pub fn has_last(&self) -> bool {
        matches!(self, Phase::Last | Phase::FirstLast)
    }
}

/// The frame-identity key described in spec §3 ("Frame identity"). Two events belong to the
/// same frame iff their `FrameId`s are equal.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum FrameId {
    Note {
        addr: ChannelAddr,
        note: NoteNumber,
    },
    Controller {
        addr: ChannelAddr,
        number: ControlNumber,
    },
    Controller14 {
        addr: ChannelAddr,
        number: ControlNumber,
    },
    Nrpn {
        addr: ChannelAddr,
        param: U14,
    },
    Rpn {
        addr: ChannelAddr,
        param: U14,
    },
    PitchBend {
        addr: ChannelAddr,
    },
    Program {
        addr: ChannelAddr,
    },
    ChannelAfterTouch {
        addr: ChannelAddr,
    },
    /// Singleton per track.
    Tempo,
    /// Singleton per track.
    TimeSig,
}

/// Computes the frame identity of `ev` (spec §3 "Frame identity").
pub fn frame_id(ev: &Ev) -> FrameId {
    match ev.cmd {
        Command::NoteOn { note, .. } | Command::NoteOff { note, .. } => FrameId::Note {
            addr: ev.addr,
            note,
        },
        Command::KeyAfterTouch { note, .. } => FrameId::Note {
            addr: ev.addr,
            note,
        },
        Command::Controller { number, .. } => FrameId::Controller {
            addr: ev.addr,
            number,
        },
        Command::Controller14 { number, .. } => FrameId::Controller14 {
            addr: ev.addr,
            number,
        },
        Command::Nrpn { param, .. } => FrameId::Nrpn {
            addr: ev.addr,
            param,
        },
        Command::Rpn { param, .. } => FrameId::Rpn {
            addr: ev.addr,
            param,
        },
        Command::PitchBend { .. } => FrameId::PitchBend { addr: ev.addr },
        Command::Program { .. } => FrameId::Program { addr: ev.addr },
        Command::ChannelAfterTouch { .. } => FrameId::ChannelAfterTouch { addr: ev.addr },
        Command::Tempo { .. } => FrameId::Tempo,
        Command::TimeSig { .. } => FrameId::TimeSig,
    }
}

/// Returns `true` for the command kinds spec §4.1 groups together as "notes": NoteOn,
/// NoteOff, KeyAfterTouch. Notes cannot be cancelled or restored; callers handle note
/// suspension by structural deletion instead (`rmprev`).
pub fn is_note(ev: &Ev) -> bool {
    matches!(
        ev.cmd,
        Command::NoteOn { .. } | Command::NoteOff { .. } | Command::KeyAfterTouch { .. }
    )
}

/// Classifies the phase of `ev`, given the state (if any) already on record for its frame.
/// Pure function of `(event kind, event value, prior state)` — never stores a result back
/// anywhere; `StateList::update` is the only caller that persists the answer.
pub fn classify_phase(ev: &Ev, existing: Option<&State>) -> Phase {
    match ev.cmd {
        Command::NoteOn { velocity, .. } if velocity.get() == 0 => Phase::Last,
        Command::NoteOn { .. } => {
            let live = existing
                .map(|s| !s.phase.has_last())
                .unwrap_or(false);
            if live {
                Phase::Next
            } else {
                Phase::First
            }
        }
        Command::NoteOff { .. } => Phase::Last,
        Command::KeyAfterTouch { .. } => Phase::Next,
        Command::Controller { .. } => Phase::FirstLast,
        Command::Controller14 { .. } | Command::Nrpn { .. } | Command::Rpn { .. } => {
            if existing.is_some() {
                Phase::Next
            } else {
                Phase::First
            }
        }
        Command::PitchBend { .. } | Command::ChannelAfterTouch { .. } => {
            if existing.is_some() {
                Phase::Next
            } else {
                Phase::First
            }
        }
        Command::Program { .. } => Phase::FirstLast,
        Command::Tempo { .. } => Phase::FirstLast,
        Command::TimeSig { .. } => Phase::FirstLast,
    }
}

/// Deep equality of two events, including payload (spec §4.1 `state_eq`).
pub fn state_eq(state: &State, ev: &Ev) -> bool {
    state.ev == *ev
}

/// Frame-identity equality between `state` and `ev` (spec §4.1 `state_match`).
pub fn state_match(state: &State, ev: &Ev) -> bool {
    frame_id(&state.ev) == frame_id(ev)
}

/// Synthesizes up to [`REVMAX`] events that suspend `state`'s frame at an arbitrary point.
/// Notes return no events (spec §4.1): callers must handle note suspension structurally.
pub fn ev_cancel(state: &State) -> Vec<Ev> {
    if is_note(&state.ev) {
        return Vec::new();
    }
    let addr = state.ev.addr;
    let out = match state.ev.cmd {
        Command::Controller { number, .. } => Some(Ev::new(
            addr,
            Command::Controller {
                number,
                value: ControlValue::new(0),
            },
        )),
        Command::Controller14 { number, .. } => Some(Ev::new(
            addr,
            Command::Controller14 { number, value: 0 },
        )),
        Command::Rpn { .. } => Some(Ev::new(
            addr,
            Command::Rpn {
                param: RPN_NULL_PARAM,
                value: 0,
            },
        )),
        Command::Nrpn { .. } => Some(Ev::new(
            addr,
            Command::Nrpn {
                param: RPN_NULL_PARAM,
                value: 0,
            },
        )),
        Command::PitchBend { .. } => Some(Ev::new(addr, Command::PitchBend { value: 0 })),
        Command::ChannelAfterTouch { .. } => Some(Ev::new(
            addr,
            Command::ChannelAfterTouch {
                value: ControlValue::new(0),
            },
        )),
        // Program/Tempo/TimeSig are one-shot (always FirstLast) and are not cancellable.
        Command::Program { .. } | Command::Tempo { .. } | Command::TimeSig { .. } => None,
        Command::NoteOn { .. } | Command::NoteOff { .. } | Command::KeyAfterTouch { .. } => None,
    };
    let events: Vec<Ev> = out.into_iter().collect();
    debug_assert!(events.len() <= REVMAX);
    events
}

/// Synthesizes up to [`REVMAX`] events that reinstate `state`'s current value at an
/// arbitrary point. Dual to [`ev_cancel`]; notes return no events.
pub fn ev_restore(state: &State) -> Vec<Ev> {
    if is_note(&state.ev) {
        return Vec::new();
    }
    let out = match state.ev.cmd {
        Command::Controller { .. }
        | Command::Controller14 { .. }
        | Command::Rpn { .. }
        | Command::Nrpn { .. }
        | Command::PitchBend { .. }
        | Command::ChannelAfterTouch { .. } => Some(state.ev),
        Command::Program { .. } | Command::Tempo { .. } | Command::TimeSig { .. } => None,
        Command::NoteOn { .. } | Command::NoteOff { .. } | Command::KeyAfterTouch { .. } => None,
    };
    let events: Vec<Ev> = out.into_iter().collect();
    debug_assert!(events.len() <= REVMAX);
    events
}

/// A set of frames a `move` can select, per SPEC_FULL.md's "selector" supplement.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Selector {
    All,
    Notes,
    Controller(ControlNumber),
    Channel(ChannelAddr),
}

impl Selector {
    pub fn matches(&self, ev: &Ev) -> bool {
        match self {
            Selector::All => true,
            Selector::Notes => is_note(ev),
            Selector::Controller(number) => {
                matches!(ev.cmd, Command::Controller { number: n, .. } if n == *number)
            }
            Selector::Channel(addr) => ev.addr == *addr,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr() -> ChannelAddr {
        ChannelAddr::new(Device::new(0), Channel::new(0))
    }

    fn note_on(note: u8, vel: u8) -> Ev {
        Ev::new(
            addr(),
            Command::NoteOn {
                note: NoteNumber::new(note),
                velocity: Velocity::new(vel),
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
    fn velocity_zero_note_on_is_last_phase() {
        let ev = note_on(60, 0);
        assert_eq!(classify_phase(&ev, None), Phase::Last);
    }

    #[test]
    fn note_on_without_prior_state_is_first() {
        let ev = note_on(60, 100);
        assert_eq!(classify_phase(&ev, None), Phase::First);
    }

    #[test]
    fn note_off_is_always_last() {
        assert_eq!(classify_phase(&note_off(60), None), Phase::Last);
    }

    #[test]
    fn controller_is_always_first_last() {
        let ev = Ev::new(
            addr(),
            Command::Controller {
                number: ControlNumber::new(7),
                value: ControlValue::new(100),
            },
        );
        assert_eq!(classify_phase(&ev, None), Phase::FirstLast);
    }

    #[test]
    fn frame_identity_ignores_velocity() {
        let on = note_on(60, 100);
        let off = note_off(60);
        assert_eq!(frame_id(&on), frame_id(&off));
    }

    #[test]
    fn frame_identity_distinguishes_pitch() {
        let c4 = note_on(60, 100);
        let e4 = note_on(64, 100);
        assert_ne!(frame_id(&c4), frame_id(&e4));
    }

    #[test]
    fn notes_have_no_cancel_or_restore_events() {
        let state = State::new_for_test(note_on(60, 100), Phase::First);
        assert!(ev_cancel(&state).is_empty());
        assert!(ev_restore(&state).is_empty());
    }

    #[test]
    fn controller_cancel_emits_zero_value() {
        let ev = Ev::new(
            addr(),
            Command::Controller {
                number: ControlNumber::new(7),
                value: ControlValue::new(100),
            },
        );
        let state = State::new_for_test(ev, Phase::FirstLast);
        let cancel = ev_cancel(&state);
        assert_eq!(cancel.len(), 1);
        match cancel[0].cmd {
            Command::Controller { value, .. } => assert_eq!(value.get(), 0),
            _ => panic!("expected Controller"),
        }
        let restore = ev_restore(&state);
        assert_eq!(restore.len(), 1);
        assert_eq!(restore[0], ev);
    }

    #[test]
    fn selector_notes_matches_only_notes() {
        assert!(Selector::Notes.matches(&note_on(60, 100)));
        let cc = Ev::new(
            addr(),
            Command::Controller {
                number: ControlNumber::new(7),
                value: ControlValue::new(1),
            },
        );
        assert!(!Selector::Notes.matches(&cc));
    }
}
