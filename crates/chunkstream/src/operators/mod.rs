//! Composable stream operators (spec §4.6).
//!
//! Every operator here follows the same shape: spawn a private task reading
//! from a source [`crate::Reader`] and writing into a private
//! [`crate::Writer`], whose channel backs the returned `Reader`. When the
//! source ends, the operator closes its Writer so the output stream ends
//! cleanly; `isLast` chunks are always forwarded so the terminal sentinel
//! survives the transform.

mod batch;
mod buffer;
mod collect;
mod filter;
mod map;
mod merge;
mod reduce;
mod retry;
mod tee;
mod throttle;

pub use batch::batch;
pub use buffer::buffer;
pub use collect::{collect, collect_text};
pub use filter::filter;
pub use map::map;
pub use merge::merge;
pub use reduce::reduce;
pub use retry::retry;
pub use tee::tee;
pub use throttle::{rate_limit, throttle};

use crate::reader::Reader;
use crate::writer::Writer;
use chunkstream_core::StreamOptions;

/// Spawns `source`'s output channel, matching its caller-visible options so
/// an operator's output stream behaves like any other Writer/Reader pair
/// (spec §4.6: "Operators wrap a source Reader into a new Reader").
pub(crate) fn output_channel(options: StreamOptions) -> (Writer, Reader) {
    crate::channel(options)
}
