/*!
A [`Track`] is an intrusive doubly-linked list of `(delta-tics, event)` cells terminated by a
null sentinel (spec §3/§4.3). Cells live in an arena and are addressed by [`CellId`], a stable
index rather than a pointer — this is the arena-of-cells design Design Notes recommends, and it
makes a [`crate::state::State`]'s `pos` backreference a plain, copyable handle instead of a
raw pointer.
!*/

use crate::event::Ev;
use log::trace;

/// An index into a [`Track`]'s cell arena. Never reused once freed (see DESIGN.md), so a
/// stale handle can never silently alias an unrelated cell.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub struct CellId(usize);

#[derive(Clone, Debug)]
pub(crate) struct Cell {
    pub(crate) delta: u32,
    /// `None` marks the sentinel, spec §3's `ev.cmd == NULL`.
    pub(crate) ev: Option<Ev>,
    pub(crate) prev: Option<CellId>,
    pub(crate) next: Option<CellId>,
}

/// A track: a doubly-linked sequence of timed events ending in a blank sentinel. Invariant:
/// the sum of `delta` fields equals the total track length; the last cell is always the
/// sentinel (spec §3 "Track").
#[derive(Debug)]
pub struct Track {
    cells: Vec<Option<Cell>>,
    head: CellId,
    tail: CellId,
}

impl Default for Track {
    fn default() -> Self {
        Self::new()
    }
}

impl Track {
    /// An empty track: a single sentinel cell with zero trailing tics.
    pub fn new() -> Self {
        let sentinel = Cell {
            delta: 0,
            ev: None,
            prev: None,
            next: None,
        };
        Self {
            cells: vec![Some(sentinel)],
            head: CellId(0),
            tail: CellId(0),
        }
    }

    /// Resets the track to a single, empty sentinel (spec §4.3 `clear`).
    pub fn clear(&mut self) {
        *self = Self::new();
    }

    pub fn head(&self) -> CellId {
        self.head
    }

    pub fn tail(&self) -> CellId {
        self.tail
    }

    pub(crate) fn cell(&self, id: CellId) -> &Cell {
        self.cells[id.0]
            .as_ref()
            .expect("CellId must reference a live cell")
    }

    pub(crate) fn cell_mut(&mut self, id: CellId) -> &mut Cell {
        self.cells[id.0]
            .as_mut()
            .expect("CellId must reference a live cell")
    }

    pub(crate) fn set_delta(&mut self, id: CellId, delta: u32) {
        self.cell_mut(id).delta = delta;
    }

    /// Total tics spanned by the track (sum of every cell's `delta`, including the trailing
    /// sentinel).
    pub fn len_tics(&self) -> u64 {
        let mut total = 0u64;
        let mut cur = Some(self.head);
        while let Some(id) = cur {
            total += self.cell(id).delta as u64;
            cur = self.cell(id).next;
        }
        total
    }

    /// Number of non-sentinel events currently on the track.
    pub fn events_len(&self) -> usize {
        let mut n = 0usize;
        let mut cur = Some(self.head);
        while let Some(id) = cur {
            if self.cell(id).ev.is_some() {
                n += 1;
            }
            cur = self.cell(id).next;
        }
        n
    }

    /// Iterates `(delta, event)` pairs in track order, the sentinel's trailing blank tics
    /// last (event absent).
    pub fn iter(&self) -> TrackIter<'_> {
        TrackIter {
            track: self,
            cur: Some(self.head),
        }
    }

    /// Normalizes the sentinel's trailing blank tics to zero (spec §4.3 `chomp`).
    pub fn chomp(&mut self) {
        self.cell_mut(self.tail).delta = 0;
    }

    /// Appends `ev` at `delta` tics after the current last event (i.e. before the sentinel).
    /// Pure structural helper used by tests and by editors seeding scratch tracks; does not
    /// move any cursor.
    pub fn push(&mut self, delta: u32, ev: Ev) -> CellId {
        self.insert_before(self.tail, delta, Some(ev))
    }

    /// Splices a new cell carrying `payload` with the given `delta`, immediately before
    /// `before`, and returns its id. `before`'s own `delta` is left untouched by this
    /// primitive — callers that need to preserve total elapsed time (e.g. `SeqPtr::evput`)
    /// adjust it themselves.
    pub(crate) fn insert_before(
        &mut self,
        before: CellId,
        delta: u32,
        payload: Option<Ev>,
    ) -> CellId {
        let prev = self.cell(before).prev;
        let new_id = CellId(self.cells.len());
        self.cells.push(Some(Cell {
            delta,
            ev: payload,
            prev,
            next: Some(before),
        }));
        self.cell_mut(before).prev = Some(new_id);
        match prev {
            Some(p) => self.cell_mut(p).next = Some(new_id),
            None => self.head = new_id,
        }
        trace!("inserted cell {:?} before {:?}", new_id, before);
        new_id
    }

    /// Removes `id` from the chain, donating its `delta` to its successor, and frees its
    /// arena slot. Returns the id of the (former) successor. `id` must not be the sentinel.
    pub(crate) fn unlink(&mut self, id: CellId) -> CellId {
        assert_ne!(id, self.tail, "cannot unlink the sentinel cell");
        let cell = self.cells[id.0].take().expect("double free of track cell");
        let next = cell.next.expect("non-sentinel cell always has a next");
        self.cell_mut(next).delta += cell.delta;
        self.cell_mut(next).prev = cell.prev;
        match cell.prev {
            Some(p) => self.cell_mut(p).next = Some(next),
            None => self.head = next,
        }
        trace!("unlinked cell {:?}, donated delta to {:?}", id, next);
        next
    }
}

pub struct TrackIter<'t> {
    track: &'t Track,
    cur: Option<CellId>,
}

impl<'t> Iterator for TrackIter<'t> {
    type Item = (u32, Option<Ev>);

    fn next(&mut self) -> Option<Self::Item> {
        let id = self.cur?;
        let cell = self.track.cell(id);
        self.cur = cell.next;
        Some((cell.delta, cell.ev))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{Channel, ChannelAddr, Command, Device, NoteNumber, Velocity};

    fn ev(note: u8) -> Ev {
        Ev::new(
            ChannelAddr::new(Device::new(0), Channel::new(0)),
            Command::NoteOn {
                note: NoteNumber::new(note),
                velocity: Velocity::new(100),
            },
        )
    }

    #[test]
    fn new_track_is_one_empty_sentinel() {
        let t = Track::new();
        assert_eq!(t.events_len(), 0);
        assert_eq!(t.len_tics(), 0);
        assert_eq!(t.head(), t.tail());
    }

    #[test]
    fn push_grows_len_tics_and_events() {
        let mut t = Track::new();
        t.push(10, ev(60));
        t.push(20, ev(64));
        assert_eq!(t.events_len(), 2);
        assert_eq!(t.len_tics(), 30);
        let collected: Vec<_> = t.iter().collect();
        assert_eq!(collected.len(), 3); // 2 events + sentinel
        assert_eq!(collected[0].0, 10);
        assert_eq!(collected[1].0, 20);
        assert!(collected[2].1.is_none());
    }

    #[test]
    fn unlink_donates_delta_to_successor() {
        let mut t = Track::new();
        let a = t.push(10, ev(60));
        t.push(20, ev(64));
        let next = t.unlink(a);
        assert_eq!(t.events_len(), 1);
        assert_eq!(t.cell(next).delta, 30);
    }

    #[test]
    fn chomp_zeroes_trailing_sentinel_delta() {
        let mut t = Track::new();
        t.push(10, ev(60));
        t.cell_mut(t.tail()).delta = 50;
        assert_eq!(t.len_tics(), 60);
        t.chomp();
        assert_eq!(t.len_tics(), 10);
    }

    #[test]
    fn clear_resets_to_empty() {
        let mut t = Track::new();
        t.push(10, ev(60));
        t.clear();
        assert_eq!(t.events_len(), 0);
    }
}
