//! Schema Codec Module
//!
//! Turns typed, schema-versioned values into payload bytes and back.

use serde::{de::DeserializeOwned, Serialize};

use crate::error::{CacheError, Result};

// == Cacheable ==
/// A value type that can live in the cache.
///
/// `SCHEMA_VERSION` is recorded next to every stored payload. Bump it
/// whenever the serialized shape changes; entries written under another
/// version are then treated as misses and dropped.
pub trait Cacheable: Serialize + DeserializeOwned {
    const SCHEMA_VERSION: &'static str;
}

// == Encoded ==
/// Payload bytes plus the schema tag they were written under.
#[derive(Debug, Clone, PartialEq)]
pub struct Encoded {
    pub bytes: Vec<u8>,
    pub schema_version: String,
}

// == Schema Codec ==
/// Stateless JSON codec for `Cacheable` values.
#[derive(Debug, Clone, Copy, Default)]
pub struct SchemaCodec;

impl SchemaCodec {
    /// Serializes `value`, tagging it with `T::SCHEMA_VERSION`.
    pub fn encode<T: Cacheable>(value: &T) -> Result<Encoded> {
        Ok(Encoded {
            bytes: serde_json::to_vec(value)?,
            schema_version: T::SCHEMA_VERSION.to_string(),
        })
    }

    /// Deserializes `bytes` if `schema_version` equals `expected_version`.
    pub fn decode<T: DeserializeOwned>(
        bytes: &[u8],
        schema_version: &str,
        expected_version: &str,
    ) -> Result<T> {
        Self::check_version(schema_version, expected_version)?;
        Ok(serde_json::from_slice(bytes)?)
    }

    /// Decodes a payload stored for `T`.
    pub fn decode_as<T: Cacheable>(bytes: &[u8], schema_version: &str) -> Result<T> {
        Self::decode(bytes, schema_version, T::SCHEMA_VERSION)
    }

    /// Version check alone, without touching the payload.
    pub fn check_version(schema_version: &str, expected_version: &str) -> Result<()> {
        if schema_version != expected_version {
            return Err(CacheError::SchemaMismatch {
                expected: expected_version.to_string(),
                found: schema_version.to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Profile {
        name: String,
        value: i64,
    }

    impl Cacheable for Profile {
        const SCHEMA_VERSION: &'static str = "1.0.0";
    }

    #[test]
    fn test_encode_tags_schema_version() {
        let encoded = SchemaCodec::encode(&Profile {
            name: "test".to_string(),
            value: 42,
        })
        .unwrap();

        assert_eq!(encoded.schema_version, "1.0.0");
        assert_eq!(encoded.bytes, br#"{"name":"test","value":42}"#.to_vec());
    }

    #[test]
    fn test_decode_matching_version() {
        let value = Profile {
            name: "test".to_string(),
            value: 42,
        };
        let encoded = SchemaCodec::encode(&value).unwrap();

        let decoded: Profile =
            SchemaCodec::decode_as(&encoded.bytes, &encoded.schema_version).unwrap();
        assert_eq!(decoded, value);
    }

    #[test]
    fn test_decode_version_mismatch() {
        let encoded = SchemaCodec::encode(&Profile {
            name: "test".to_string(),
            value: 1,
        })
        .unwrap();

        let result: Result<Profile> = SchemaCodec::decode(&encoded.bytes, "1.0.0", "2.0.0");
        match result {
            Err(CacheError::SchemaMismatch { expected, found }) => {
                assert_eq!(expected, "2.0.0");
                assert_eq!(found, "1.0.0");
            }
            other => panic!("expected schema mismatch, got {:?}", other),
        }
    }

    #[test]
    fn test_decode_garbage_is_corrupt() {
        let result: Result<Profile> = SchemaCodec::decode_as(b"not json", "1.0.0");
        assert!(matches!(result, Err(CacheError::Corrupt(_))));
    }
}
