//! codec.rs
//!
//! Serialization used for RPC arguments and replies.
//!
//! Every value crossing the simulated network is encoded to bytes and decoded
//! on the other side, so handlers never share program objects with callers.
//! The codec is chosen once per network as a type parameter; callers and
//! handlers registered on the same network therefore always agree on it.

use serde::{de::DeserializeOwned, Serialize};

use crate::errors::CodecError;

/// An encode/decode pair over serde types.
pub trait Codec: Send + Sync + 'static {
    fn encode<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>, CodecError>;

    fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, CodecError>;
}

/// Compact binary encoding. The default for every network.
#[derive(Debug, Default, Clone, Copy)]
pub struct BincodeCodec;

impl Codec for BincodeCodec {
    fn encode<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>, CodecError> {
        Ok(bincode::serialize(value)?)
    }

    fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, CodecError> {
        Ok(bincode::deserialize(bytes)?)
    }
}

/// Human-readable encoding, handy when inspecting traffic in logs.
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonCodec;

impl Codec for JsonCodec {
    fn encode<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>, CodecError> {
        Ok(serde_json::to_vec(value)?)
    }

    fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, CodecError> {
        Ok(serde_json::from_slice(bytes)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct AppendArgs {
        term: u64,
        leader: String,
        entries: Vec<String>,
    }

    fn sample() -> AppendArgs {
        AppendArgs {
            term: 7,
            leader: "s1".to_string(),
            entries: vec!["put x 1".to_string()],
        }
    }

    #[test]
    fn test_bincode_roundtrip() {
        let bytes = BincodeCodec::encode(&sample()).unwrap();
        let back: AppendArgs = BincodeCodec::decode(&bytes).unwrap();
        assert_eq!(back, sample());
    }

    #[test]
    fn test_json_is_readable() {
        let bytes = JsonCodec::encode(&sample()).unwrap();
        let text = String::from_utf8(bytes).unwrap();
        assert!(text.contains("\"leader\":\"s1\""));
    }

    #[test]
    fn test_decode_into_wrong_type_fails() {
        let bytes = JsonCodec::encode(&"not a struct").unwrap();
        let res: Result<AppendArgs, _> = JsonCodec::decode(&bytes);
        assert!(matches!(res, Err(CodecError::Json(_))));

        let res: Result<AppendArgs, _> = BincodeCodec::decode(&[1, 2]);
        assert!(matches!(res, Err(CodecError::Bincode(_))));
    }
}
