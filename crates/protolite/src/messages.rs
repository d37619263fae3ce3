//! Bundled message types for playback files
//!
//! A playback file is a single `PlaybackFile` record: a fixed header followed
//! by an opaque body.

use crate::define_message;

/// Schema text equivalent to the types below
pub const PLAYBACK_SCHEMA: &str = "\
message PlaybackHeader {
    int32 magic = 1;
    float testfloat = 2;
    double testdouble = 3;
}

message PlaybackFile {
    PlaybackHeader header = 1;
    bytes body = 2;
}
";

define_message! {
    pub struct PlaybackHeader {
        /// File identifier written by the producer
        magic: int32 = 1,
        testfloat: float = 2,
        testdouble: double = 3,
    }
}

impl PlaybackHeader {
    pub fn new(magic: i32, testfloat: f32, testdouble: f64) -> Self {
        Self {
            magic,
            testfloat,
            testdouble,
        }
    }
}

define_message! {
    pub struct PlaybackFile {
        header: message<PlaybackHeader> = 1,
        body: bytes = 2,
    }
}

impl PlaybackFile {
    pub fn new(header: PlaybackHeader, body: impl Into<Vec<u8>>) -> Self {
        Self {
            header,
            body: body.into(),
        }
    }
}
