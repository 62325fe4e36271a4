/*!
The high-level editors built on [`SeqPtr`](crate::seqptr::SeqPtr) and its primitives: track
merging, note quantization and transposition, excerpt move/copy/cut, consistency repair,
one-shot configuration tracks, and tempo/measure bookkeeping (spec §4.6).
!*/

mod check;
mod confev;
mod merge;
mod quantize;
mod tempo;
mod transform;
mod transpose;

pub use check::check;
pub use confev::confev;
pub use merge::merge;
pub use quantize::quantize;
pub use tempo::{findmeasure, settempo, timeinfo, timeins, timerm, TimeInfo};
pub use transform::move_span;
pub use transpose::transpose;
