/*!
Tempo and measure bookkeeping: a track carries `Tempo`/`TimeSig` as singleton frames, and this
module answers "where is measure `m`" and lets callers retime the track around that boundary
(spec §4.6 "Tempo/measure operations").
!*/

use crate::constants::{DEFAULT_BPM, DEFAULT_TPB, DEFAULT_USEC24};
use crate::event::{ChannelAddr, Channel, Command, Device, Ev};
use crate::seqptr::SeqPtr;
use crate::track::Track;

/// The live tempo/time-signature reading at a cursor position.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TimeInfo {
    pub abs_tic: u64,
    pub usec24: u32,
    pub bpm: u8,
    pub tpb: u32,
}

fn current_signature(ptr: &SeqPtr) -> (u8, u32, u32) {
    let mut bpm = DEFAULT_BPM;
    let mut tpb = DEFAULT_TPB;
    let mut usec24 = DEFAULT_USEC24;
    for state in ptr.states().values() {
        match state.ev.cmd {
            Command::TimeSig {
                beats,
                tics_per_beat,
            } => {
                bpm = beats;
                tpb = tics_per_beat;
            }
            Command::Tempo { usec24: u } => usec24 = u,
            _ => {}
        }
    }
    (bpm, tpb, usec24)
}

fn ticks_per_measure(bpm: u8, tpb: u32) -> u32 {
    bpm as u32 * tpb
}

fn drain_available(ptr: &mut SeqPtr) {
    while ptr.evavail() {
        ptr.evget();
    }
}

/// Walks `m` measures forward from the head of `track` and returns the absolute tic reached,
/// reading the live time signature as it goes (spec §4.6 `findmeasure`). If the track ends
/// before `m` measures have elapsed, `seek`'s own padding extends it as if it continued.
pub fn findmeasure(track: &mut Track, m: u32) -> u64 {
    let mut ptr = SeqPtr::new(track);
    drain_available(&mut ptr);
    for _ in 0..m {
        let (bpm, tpb, _) = current_signature(&ptr);
        ptr.seek(ticks_per_measure(bpm, tpb));
        drain_available(&mut ptr);
    }
    ptr.tic()
}

/// Like `findmeasure`, but returns the tempo/signature reading at the arrival tic (spec §4.6
/// `timeinfo`).
pub fn timeinfo(track: &mut Track, m: u32) -> TimeInfo {
    let mut ptr = SeqPtr::new(track);
    drain_available(&mut ptr);
    for _ in 0..m {
        let (bpm, tpb, _) = current_signature(&ptr);
        ptr.seek(ticks_per_measure(bpm, tpb));
        drain_available(&mut ptr);
    }
    let (bpm, tpb, usec24) = current_signature(&ptr);
    TimeInfo {
        abs_tic: ptr.tic(),
        usec24,
        bpm,
        tpb,
    }
}

fn tempo_ev(usec24: u32) -> Ev {
    Ev::new(
        ChannelAddr::new(Device::new(0), Channel::new(0)),
        Command::Tempo { usec24 },
    )
}

fn timesig_ev(beats: u8, tics_per_beat: u32) -> Ev {
    Ev::new(
        ChannelAddr::new(Device::new(0), Channel::new(0)),
        Command::TimeSig {
            beats,
            tics_per_beat,
        },
    )
}

/// Sets the tempo at measure `m` to `usec24`, removing any tempo event already at that tic,
/// and inserting the new one only if it differs from whatever tempo was in effect just
/// before (spec §4.6 `settempo`).
pub fn settempo(track: &mut Track, m: u32, usec24: u32) {
    let target = findmeasure(track, m);
    let mut ptr = SeqPtr::new(track);
    ptr.seek(target as u32);
    let (_, _, prior_usec24) = current_signature(&ptr);
    while ptr.evavail() {
        if matches!(ptr.peek(), Some(Ev { cmd: Command::Tempo { .. }, .. })) {
            ptr.evdel();
        } else {
            ptr.evget();
        }
    }
    if usec24 != prior_usec24 {
        ptr.evput(tempo_ev(usec24));
    }
}

/// Inserts `amount` measures carrying the given signature at measure `m`, restoring the
/// prior signature immediately afterward if it differed (spec §4.6 `timeins`).
pub fn timeins(track: &mut Track, m: u32, amount: u32, bpm: u8, tpb: u32) {
    let target = findmeasure(track, m);
    let mut ptr = SeqPtr::new(track);
    ptr.seek(target as u32);
    let (prior_bpm, prior_tpb, _) = current_signature(&ptr);
    ptr.evput(timesig_ev(bpm, tpb));
    let inserted = amount * ticks_per_measure(bpm, tpb);
    ptr.insert_silence(inserted);
    ptr.seek(inserted);
    if prior_bpm != bpm || prior_tpb != tpb {
        ptr.evput(timesig_ev(prior_bpm, prior_tpb));
    }
}

/// Deletes `amount` measures starting at measure `m`: any frame live at the cut is restored
/// just past it unless it already restores itself from events surviving the cut (spec §4.6
/// `timerm`).
pub fn timerm(track: &mut Track, m: u32, amount: u32) {
    let target = findmeasure(track, m);
    let (bpm, tpb, _) = {
        let mut probe = SeqPtr::new(track);
        probe.seek(target as u32);
        current_signature(&probe)
    };
    if amount == 0 {
        return;
    }
    let cut_tics = amount * ticks_per_measure(bpm, tpb);

    let mut ptr = SeqPtr::new(track);
    ptr.seek(target as u32);
    let live_before: Vec<_> = ptr.states().values().cloned().collect();

    ptr.ticdel(cut_tics);

    for state in &live_before {
        if !ptr.states().values().any(|s| s.ev == state.ev) {
            ptr.evput(state.ev);
        }
    }
}
