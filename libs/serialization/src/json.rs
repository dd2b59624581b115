//! JSON codec
//!
//! Values are written one per line and read back with a single streaming
//! deserializer, so the reader never loses bytes between values.

use crate::{ObjectInput, ObjectOutput, Result, Serialization, JSON_SERIALIZATION_ID};
use std::io::{Read, Write};

/// Text codec, registered as `json`
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonSerialization;

impl Serialization for JsonSerialization {
    fn content_type_id(&self) -> u8 {
        JSON_SERIALIZATION_ID
    }

    fn content_type(&self) -> &'static str {
        "text/json"
    }

    fn serialize(&self, output: Box<dyn Write + Send>) -> Result<Box<dyn ObjectOutput>> {
        Ok(Box::new(JsonObjectOutput { output }))
    }

    fn deserialize(&self, input: Box<dyn Read + Send>) -> Result<Box<dyn ObjectInput>> {
        Ok(Box::new(JsonObjectInput {
            de: serde_json::Deserializer::from_reader(input),
        }))
    }
}

struct JsonObjectOutput {
    output: Box<dyn Write + Send>,
}

impl JsonObjectOutput {
    fn put<T: serde::Serialize + ?Sized>(&mut self, value: &T) -> Result<()> {
        serde_json::to_writer(&mut self.output, value)?;
        self.output.write_all(b"\n")?;
        Ok(())
    }
}

impl ObjectOutput for JsonObjectOutput {
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

struct JsonObjectInput {
    de: serde_json::Deserializer<serde_json::de::IoRead<Box<dyn Read + Send>>>,
}

impl JsonObjectInput {
    fn take<T: serde::de::DeserializeOwned>(&mut self) -> Result<T> {
        Ok(T::deserialize(&mut self.de)?)
    }
}

impl ObjectInput for JsonObjectInput {
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::SerializationError;
    use std::io::Cursor;

    #[test]
    fn test_reads_line_separated_values() {
        let text = "\"echo\"\n42\n[104,105]\nfalse\n1.5\n";
        let mut input = JsonSerialization
            .deserialize(Box::new(Cursor::new(text.as_bytes().to_vec())))
            .unwrap();
        assert_eq!(input.read_string().unwrap(), "echo");
        assert_eq!(input.read_i64().unwrap(), 42);
        assert_eq!(input.read_bytes().unwrap(), b"hi".to_vec());
        assert!(!input.read_bool().unwrap());
        assert_eq!(input.read_f64().unwrap(), 1.5);
    }

    #[test]
    fn test_type_mismatch_is_an_error() {
        let mut input = JsonSerialization
            .deserialize(Box::new(Cursor::new(b"\"not a number\"".to_vec())))
            .unwrap();
        assert!(matches!(input.read_i32(), Err(SerializationError::Json(_))));
    }

    #[test]
    fn test_content_type() {
        assert_eq!(JsonSerialization.content_type_id(), JSON_SERIALIZATION_ID);
        assert_eq!(JsonSerialization.content_type(), "text/json");
    }
}
