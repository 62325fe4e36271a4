/*!
A headless MIDI sequencing core: track storage, live per-frame state tracking, and the
editing primitives (merge, quantize, transpose, move/copy, tempo/measure bookkeeping) built
on top of them.

The crate has no notion of a wall clock, an audio backend, or a file format — it only knows
how to hold, read, and rewrite a stream of timed MIDI-like events. [`Track`] stores the
events; [`SeqPtr`] is the cursor used to read and edit a track; [`StateList`] is what lets a
cursor answer "what is currently sounding/active at this position" without rescanning from
the start.
!*/

#![allow(dead_code)]

#[macro_use]
mod clamp;
mod constants;
mod error;

pub mod editors;
pub mod event;
pub mod state;
pub mod track;

mod seqptr;

pub use error::{Error, Result};
pub use event::{ChannelAddr, Command, Ev, FrameId, Phase, Selector};
pub use seqptr::SeqPtr;
pub use state::{State, StateFlags, StateList};
pub use track::{CellId, Track};
