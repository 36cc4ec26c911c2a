//! Decoders for the three worker output protocols.
//!
//! - [`Utf8ChunkDecoder`]: raw text streaming (chat generation)
//! - [`LineDecoder`]: line-delimited progress frames (downloads, fine-tuning)
//! - [`BufferedDecoder`]: one JSON document read after exit
//!
//! Decoders never fail. Bad input becomes a replacement character, a
//! synthetic error frame or an `Invalid` result, and the caller decides
//! what that means for the operation.

pub mod buffered;
pub mod lines;
pub mod utf8;

pub use buffered::{BufferedDecoder, BufferedOutput};
pub use lines::{parse_frame, DecodedLine, LineDecoder, DEFAULT_LINE_MAX_BYTES};
pub use utf8::Utf8ChunkDecoder;
