/*!
A configuration track holds only one-shot (`FIRST|LAST`) frames representing persistent
setup (controller defaults, program selections). `confev` replaces the frame for a new event
while preserving the relative update order of every other frame (spec §4.6 `confev`).
!*/

use crate::error::{invariant, Result};
use crate::event::{frame_id, Ev, FrameId, Phase};
use crate::seqptr::SeqPtr;
use crate::state::StateList;
use crate::track::Track;

struct Tagged {
    ev: Ev,
    tag: i64,
}

/// Replaces `ev`'s frame on the config track, moving it to the front of the update order;
/// every other frame keeps its relative order. `ev`'s phase must be `FIRST|LAST` (a one-shot
/// configuration event); anything else is an invariant violation.
pub fn confev(track: &mut Track, ev: Ev, debug: bool) -> Result<()> {
    let mut by_id: std::collections::HashMap<FrameId, Tagged> = std::collections::HashMap::new();
    let mut serial = 0i64;

    {
        let mut ptr = SeqPtr::new(track);
        let mut erase_list = StateList::new();
        loop {
            if ptr.evavail() {
                if let Some(got) = ptr.evdel_into(&mut erase_list) {
                    serial += 1;
                    by_id.insert(frame_id(&got), Tagged { ev: got, tag: serial });
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
    }

    let new_id = frame_id(&ev);
    let new_phase = crate::event::classify_phase(&ev, None);
    if new_phase != Phase::FirstLast {
        invariant!(debug, "confev called with a non-FIRST|LAST event");
    }
    serial += 1;
    by_id.insert(new_id, Tagged { ev, tag: serial });

    let mut ordered: Vec<&Tagged> = by_id.values().collect();
    ordered.sort_by_key(|t| t.tag);

    track.clear();
    for tagged in ordered {
        track.push(0, tagged.ev);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{Channel, ChannelAddr, Command, Device, Program};

    fn addr() -> ChannelAddr {
        ChannelAddr::new(Device::new(0), Channel::new(0))
    }

    fn program(n: u8) -> Ev {
        Ev::new(
            addr(),
            Command::Program {
                program: Program::new(n),
            },
        )
    }

    fn events(track: &mut Track) -> Vec<Ev> {
        let mut ptr = SeqPtr::new(track);
        let mut out = Vec::new();
        while ptr.evavail() {
            out.push(ptr.evget().unwrap());
        }
        out
    }

    #[test]
    fn confev_on_empty_track_inserts_one_event() {
        let mut track = Track::new();
        confev(&mut track, program(5), true).unwrap();
        assert_eq!(events(&mut track), vec![program(5)]);
    }

    #[test]
    fn confev_replaces_prior_value_for_same_frame() {
        let mut track = Track::new();
        confev(&mut track, program(5), true).unwrap();
        confev(&mut track, program(7), true).unwrap();
        assert_eq!(events(&mut track), vec![program(7)]);
    }
}
