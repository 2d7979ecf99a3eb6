// Copyright (c) Starcoin, Inc.
// SPDX-License-Identifier: Apache-2.0

//! CBOR auxdata footer decoding.
//!
//! The Solidity compiler appends a CBOR map to deployed bytecode,
//! followed by a two-byte big-endian length of that map. Recognized keys
//! are `bzzr1` (32-byte Swarm hash) and `ipfs` (multihash, Base58-encoded
//! into a CID); unknown keys are ignored. Anything that does not decode
//! cleanly yields `None` and the contract is dropped.

use crate::types::MetadataPointer;
use ciborium::value::Value;

/// Extract the metadata pointer from deployed bytecode, if any.
///
/// When the footer carries both recognized keys, `bzzr1` wins.
pub fn decode_footer(code: &[u8]) -> Option<MetadataPointer> {
    if code.len() < 2 {
        return None;
    }
    let footer_len = u16::from_be_bytes([code[code.len() - 2], code[code.len() - 1]]) as usize;
    if footer_len == 0 || footer_len + 2 > code.len() {
        return None;
    }
    let payload = &code[code.len() - 2 - footer_len..code.len() - 2];

    let value: Value = ciborium::de::from_reader(payload).ok()?;
    let Value::Map(entries) = value else {
        return None;
    };

    let mut bzzr1 = None;
    let mut ipfs = None;
    for (key, value) in entries {
        let Value::Text(key) = key else {
            continue;
        };
        match (key.as_str(), value) {
            ("bzzr1", Value::Bytes(bytes)) => {
                bzzr1 = <[u8; 32]>::try_from(bytes.as_slice()).ok();
            }
            ("ipfs", Value::Bytes(bytes)) if !bytes.is_empty() => {
                ipfs = Some(bs58::encode(&bytes).into_string());
            }
            _ => {}
        }
    }

    if let Some(hash) = bzzr1 {
        return Some(MetadataPointer::Bzzr1(hash));
    }
    ipfs.map(MetadataPointer::Ipfs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{bytecode_with_footer, encode_footer};

    #[test]
    fn test_bzzr1_round_trip() {
        let hash = [0x11u8; 32];
        let code = bytecode_with_footer(&[("bzzr1", hash.to_vec())]);
        assert_eq!(decode_footer(&code), Some(MetadataPointer::Bzzr1(hash)));
    }

    #[test]
    fn test_ipfs_round_trip() {
        // 0x12 0x20 prefix marks a sha2-256 multihash
        let mut multihash = vec![0x12, 0x20];
        multihash.extend_from_slice(&[0xabu8; 32]);
        let code = bytecode_with_footer(&[("ipfs", multihash.clone())]);

        let expected = bs58::encode(&multihash).into_string();
        assert_eq!(decode_footer(&code), Some(MetadataPointer::Ipfs(expected)));
    }

    #[test]
    fn test_bzzr1_preferred_over_ipfs() {
        let hash = [0x22u8; 32];
        let code = bytecode_with_footer(&[
            ("ipfs", vec![0x12, 0x20, 0x01, 0x02]),
            ("bzzr1", hash.to_vec()),
        ]);
        assert_eq!(decode_footer(&code), Some(MetadataPointer::Bzzr1(hash)));
    }

    #[test]
    fn test_unknown_keys_ignored() {
        let hash = [0x33u8; 32];
        let code = bytecode_with_footer(&[
            ("solc", vec![0x00, 0x05, 0x0b]),
            ("bzzr1", hash.to_vec()),
            ("experimental", vec![0x01]),
        ]);
        assert_eq!(decode_footer(&code), Some(MetadataPointer::Bzzr1(hash)));
    }

    #[test]
    fn test_no_recognized_keys_drops_contract() {
        let code = bytecode_with_footer(&[("solc", vec![0x00, 0x05, 0x0b])]);
        assert_eq!(decode_footer(&code), None);
    }

    #[test]
    fn test_wrong_bzzr1_length_rejected() {
        let code = bytecode_with_footer(&[("bzzr1", vec![0x11; 31])]);
        assert_eq!(decode_footer(&code), None);
    }

    #[test]
    fn test_garbage_and_truncated_inputs() {
        assert_eq!(decode_footer(&[]), None);
        assert_eq!(decode_footer(&[0x00]), None);
        // Length larger than the bytecode itself
        assert_eq!(decode_footer(&[0x01, 0x02, 0xff, 0xff]), None);
        // Valid length but payload is not CBOR
        let mut code = vec![0xde, 0xad, 0xbe, 0xef];
        code.extend_from_slice(&4u16.to_be_bytes());
        assert_eq!(decode_footer(&code), None);
    }

    #[test]
    fn test_non_map_footer_rejected() {
        // CBOR array instead of a map
        let mut payload = Vec::new();
        ciborium::ser::into_writer(&Value::Array(vec![Value::Integer(1.into())]), &mut payload)
            .unwrap();
        let len = payload.len() as u16;
        payload.extend_from_slice(&len.to_be_bytes());
        assert_eq!(decode_footer(&payload), None);
    }

    #[test]
    fn test_footer_after_runtime_code() {
        // The decoder only looks at the trailing length-delimited region,
        // whatever precedes it
        let hash = [0x44u8; 32];
        let footer = encode_footer(&[("bzzr1", hash.to_vec())]);
        let mut code = vec![0x60, 0x80, 0x60, 0x40, 0x52];
        code.extend_from_slice(&footer);
        assert_eq!(decode_footer(&code), Some(MetadataPointer::Bzzr1(hash)));
    }
}
