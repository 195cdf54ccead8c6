//! # storecast-protocol
//!
//! Wire format spoken on storecast's streaming endpoint.
//!
//! Messages travel as `text/event-stream` frames: each payload line is sent
//! as a `data:` field and a frame ends with a blank line. Keep-alive frames
//! are comments, which clients ignore.
//!
//! ## Example
//!
//! ```rust
//! use storecast_protocol::{codec, Frame};
//!
//! let encoded = codec::encode(&Frame::data(r#"{"message":"hi"}"#)).unwrap();
//! assert_eq!(&encoded[..], b"data: {\"message\":\"hi\"}\n\n");
//!
//! let mut buf = bytes::BytesMut::from(&encoded[..]);
//! let decoded = codec::decode_from(&mut buf).unwrap().unwrap();
//! assert_eq!(decoded.data_str(), Some(r#"{"message":"hi"}"#));
//! ```

pub mod codec;
pub mod frames;
pub mod payload;

pub use codec::{decode_from, encode, ProtocolError};
pub use frames::Frame;
pub use payload::{InvalidStatus, PushEnvelope, TableSnapshot, TableStatus};
