pub mod framing;
pub mod multiplexer;

pub use framing::{read_frame, trim_line_end, FRAME_HEADER_LEN};
pub use multiplexer::{StreamMultiplexer, StreamSummary};
