//! Bincode codec
//!
//! Each primitive is written as its own bincode value, so a reader must
//! consume values in the order they were written.

use crate::{ObjectInput, ObjectOutput, Result, Serialization, BINCODE_SERIALIZATION_ID};
use std::io::{Read, Write};

/// Compact binary codec, registered as `bincode`
#[derive(Debug, Clone, Copy, Default)]
pub struct BincodeSerialization;

impl Serialization for BincodeSerialization {
    fn content_type_id(&self) -> u8 {
        BINCODE_SERIALIZATION_ID
    }

    fn content_type(&self) -> &'static str {
        "x-application/bincode"
    }

    fn serialize(&self, output: Box<dyn Write + Send>) -> Result<Box<dyn ObjectOutput>> {
        Ok(Box::new(BincodeObjectOutput { output }))
    }

    fn deserialize(&self, input: Box<dyn Read + Send>) -> Result<Box<dyn ObjectInput>> {
        Ok(Box::new(BincodeObjectInput { input }))
    }
}

struct BincodeObjectOutput {
    output: Box<dyn Write + Send>,
}

impl BincodeObjectOutput {
    fn put<T: serde::Serialize + ?Sized>(&mut self, value: &T) -> Result<()> {
        bincode::serialize_into(&mut self.output, value)?;
        Ok(())
    }
}

impl ObjectOutput for BincodeObjectOutput {
    fn write_bool(&mut self, value: bool) -> Result<()> {
        self.put(&value)
    }

    fn write_i32(&mut self, value: i32) -> Result<()> {
        self.put(&value)
    }

    fn write_i64(&mut self, value: i64) -> Result<()> {
        self.put(&value)
    }

    fn write_f64(&mut self, value: f64) -> Result<()> {
        self.put(&value)
    }

    fn write_str(&mut self, value: &str) -> Result<()> {
        self.put(value)
    }

    fn write_bytes(&mut self, value: &[u8]) -> Result<()> {
        self.put(value)
    }

    fn flush_buffer(&mut self) -> Result<()> {
        self.output.flush()?;
        Ok(())
    }
}

struct BincodeObjectInput {
    input: Box<dyn Read + Send>,
}

impl BincodeObjectInput {
    fn take<T: serde::de::DeserializeOwned>(&mut self) -> Result<T> {
        Ok(bincode::deserialize_from(&mut self.input)?)
    }
}

impl ObjectInput for BincodeObjectInput {
    fn read_bool(&mut self) -> Result<bool> {
        self.take()
    }

    fn read_i32(&mut self) -> Result<i32> {
        self.take()
    }

    fn read_i64(&mut self) -> Result<i64> {
        self.take()
    }

    fn read_f64(&mut self) -> Result<f64> {
        self.take()
    }

    fn read_string(&mut self) -> Result<String> {
        self.take()
    }

    fn read_bytes(&mut self) -> Result<Vec<u8>> {
        self.take()
    }
}
