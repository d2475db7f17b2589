//! Telephony media-stream protocol.
//!
//! The bridge consumes and produces frames on an already-established duplex
//! media connection; placing the call that creates the connection is an
//! upstream concern and is not implemented here.

pub mod frames;

pub use frames::{
    MarkLabel, MediaChunk, OutboundFrame, OutboundPayload, RESPONSE_MARK, StreamStart,
    TelephonyFrame, TelephonyRoute,
};
