//! Content-type identifiers
//!
//! Every message on the wire carries a single small-integer content-type id
//! selecting the serialization format of its body. The header reserves five
//! bits for it, so valid ids are `0..=MAX_CONTENT_TYPE_ID`.
//!
//! Ids are shared with peers written in other languages, which is why the
//! generic-object codecs keep their historical numbers even though no
//! implementation of them ships with this crate.

/// Highest id that fits the 5-bit content-type field of the message header
pub const MAX_CONTENT_TYPE_ID: u8 = 0x1f;

/// Compact binary codec (bincode), the default on this side
pub const BINCODE_SERIALIZATION_ID: u8 = 2;

/// JDK object stream serialization
pub const JAVA_SERIALIZATION_ID: u8 = 3;

/// JDK object stream with compacted class descriptors
pub const COMPACTED_JAVA_SERIALIZATION_ID: u8 = 4;

/// Whitespace-separated JSON values
pub const JSON_SERIALIZATION_ID: u8 = 6;

/// Native JDK object stream serialization
pub const NATIVE_JAVA_SERIALIZATION_ID: u8 = 7;

/// Codec name used when the configuration does not name one
pub const DEFAULT_SERIALIZATION: &str = "bincode";

/// Codecs able to instantiate arbitrary types from the stream.
///
/// Accepting one of these ids from a peer that negotiated a different codec
/// would let it pick the unsafe decoder, so the registry checks the
/// configured name for exactly these ids.
pub const GENERIC_OBJECT_SERIALIZATION_IDS: [u8; 3] = [
    JAVA_SERIALIZATION_ID,
    COMPACTED_JAVA_SERIALIZATION_ID,
    NATIVE_JAVA_SERIALIZATION_ID,
];

/// Whether `id` belongs to the generic-object codec family
#[inline]
pub fn is_generic_object_id(id: u8) -> bool {
    GENERIC_OBJECT_SERIALIZATION_IDS.contains(&id)
}

/// Whether `id` fits the wire header field
#[inline]
pub fn is_valid_content_type_id(id: u8) -> bool {
    id <= MAX_CONTENT_TYPE_ID
}
