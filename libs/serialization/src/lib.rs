//! # Remoting Serialization
//!
//! Capability traits for the codecs that encode message bodies, the
//! content-type id table shared with peers, and the two codecs that ship
//! with the transport.
//!
//! ## What This Crate Contains
//! - [`Serialization`]: a codec, identified on the wire by its content-type id
//! - [`ObjectOutput`] / [`ObjectInput`]: primitive writer/reader opened by a codec
//! - [`BincodeSerialization`] and [`JsonSerialization`]
//! - Content-type id constants and the generic-object family
//!
//! ## What This Crate Does NOT Contain
//! - The id -> codec registry and its wire validation (belongs in `remoting`)
//! - Message framing

pub mod binary;
pub mod constants;
pub mod error;
pub mod json;

use std::io::{Read, Write};
use std::sync::Arc;

pub use binary::BincodeSerialization;
pub use constants::*;
pub use error::{Result, SerializationError};
pub use json::JsonSerialization;

/// A message body codec
pub trait Serialization: Send + Sync {
    /// Id written into the message header
    fn content_type_id(&self) -> u8;

    /// MIME-style description of the format
    fn content_type(&self) -> &'static str;

    /// Open a writer over `output`
    fn serialize(&self, output: Box<dyn Write + Send>) -> Result<Box<dyn ObjectOutput>>;

    /// Open a reader over `input`
    fn deserialize(&self, input: Box<dyn Read + Send>) -> Result<Box<dyn ObjectInput>>;
}

/// Primitive writer opened by a [`Serialization`]
pub trait ObjectOutput: Send {
    fn write_bool(&mut self, value: bool) -> Result<()>;
    fn write_i32(&mut self, value: i32) -> Result<()>;
    fn write_i64(&mut self, value: i64) -> Result<()>;
    fn write_f64(&mut self, value: f64) -> Result<()>;
    fn write_str(&mut self, value: &str) -> Result<()>;
    fn write_bytes(&mut self, value: &[u8]) -> Result<()>;

    /// Push buffered data down to the underlying stream
    fn flush_buffer(&mut self) -> Result<()>;
}

/// Primitive reader opened by a [`Serialization`]
pub trait ObjectInput: Send {
    fn read_bool(&mut self) -> Result<bool>;
    fn read_i32(&mut self) -> Result<i32>;
    fn read_i64(&mut self) -> Result<i64>;
    fn read_f64(&mut self) -> Result<f64>;
    fn read_string(&mut self) -> Result<String>;
    fn read_bytes(&mut self) -> Result<Vec<u8>>;
}

/// The codecs compiled into this crate, in registration order
pub fn builtin() -> Vec<(&'static str, Arc<dyn Serialization>)> {
    vec![
        ("bincode", Arc::new(BincodeSerialization) as Arc<dyn Serialization>),
        ("json", Arc::new(JsonSerialization) as Arc<dyn Serialization>),
    ]
}
