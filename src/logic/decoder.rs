use crate::errors::DecodeError;
use crate::logic::registry::PoolRegistry;
use crate::logic::types::{PoolKey, SwapRecord};
use crate::utils::constants::{RAY_LOG_PREFIX, RAY_LOG_VERSION_3};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use std::sync::Arc;
use tracing::{debug, trace};

/// Decoder for the binary ray_log payload emitted by AMM swap instructions.
///
/// The payload has accumulated several incompatible encodings over time:
/// four fixed-width little-endian u64 layouts, an optional one-byte version
/// tag, and free-form u64/u32 sequences. Layouts are tried strictly by
/// remaining byte length; whatever matches first wins. A payload from which
/// no positive `amount_in`/`amount_out` pair can be recovered is a decode
/// failure, never a zero-valued swap.
pub struct RayLogDecoder {
    registry: Arc<PoolRegistry>,
    /// When set, fallback layouts that carry no pool id leave the record
    /// unresolved instead of assuming the primary pair.
    strict_pool_resolution: bool,
}

impl RayLogDecoder {
    pub fn new(registry: Arc<PoolRegistry>, strict_pool_resolution: bool) -> Self {
        Self {
            registry,
            strict_pool_resolution,
        }
    }

    /// Decode one ray_log line into a swap record.
    ///
    /// Accepts the raw base64 payload with or without the literal
    /// `ray_log: ` prefix.
    pub fn decode(&self, raw: &str) -> Result<SwapRecord, DecodeError> {
        let payload = raw.strip_prefix(RAY_LOG_PREFIX).unwrap_or(raw);
        if payload.is_empty() {
            return Err(DecodeError::Empty);
        }

        let mut bytes = BASE64.decode(payload)?;
        trace!(len = bytes.len(), "decoded ray_log bytes");

        // Version-tagged payloads carry the same body after the tag byte.
        if bytes.first() == Some(&RAY_LOG_VERSION_3) {
            bytes.remove(0);
        }

        let record = match bytes.len() {
            56 => self.decode_full(&bytes),
            48 => self.decode_without_extra(&bytes),
            32 => self.decode_compact(&bytes),
            24 => self.decode_minimal(&bytes),
            len if len % 8 == 0 && len >= 16 => self.decode_u64_sequence(&bytes),
            _ => self.decode_u32_sequence(&bytes),
        }?;

        if record.amount_in == 0 || record.amount_out == 0 {
            return Err(DecodeError::ZeroAmounts);
        }
        Ok(record)
    }

    /// 56 bytes: `[timestamp_in, amount_in, pool_id, timestamp_out,
    /// amount_out, pool_token, extra_data]`.
    fn decode_full(&self, bytes: &[u8]) -> Result<SwapRecord, DecodeError> {
        let values = read_u64s(bytes);
        Ok(SwapRecord {
            timestamp_in: Some(values[0]),
            amount_in: values[1],
            pool_id: Some(values[2]),
            pool: self.registry.identify_pool(values[2]),
            timestamp_out: Some(values[3]),
            amount_out: values[4],
            pool_token: Some(values[5]),
            extra: vec![values[6]],
        })
    }

    /// 48 bytes: the 56-byte layout without the trailing extra value.
    fn decode_without_extra(&self, bytes: &[u8]) -> Result<SwapRecord, DecodeError> {
        let values = read_u64s(bytes);
        Ok(SwapRecord {
            timestamp_in: Some(values[0]),
            amount_in: values[1],
            pool_id: Some(values[2]),
            pool: self.registry.identify_pool(values[2]),
            timestamp_out: Some(values[3]),
            amount_out: values[4],
            pool_token: Some(values[5]),
            extra: Vec::new(),
        })
    }

    /// 32 bytes: `[timestamp_in, amount_in, amount_out, pool_id]`.
    ///
    /// Historical decoders disagreed on this width's field order; this
    /// ordering is the canonical one and is pinned by test fixture.
    fn decode_compact(&self, bytes: &[u8]) -> Result<SwapRecord, DecodeError> {
        let values = read_u64s(bytes);
        Ok(SwapRecord {
            timestamp_in: Some(values[0]),
            amount_in: values[1],
            pool_id: Some(values[3]),
            pool: self.registry.identify_pool(values[3]),
            timestamp_out: None,
            amount_out: values[2],
            pool_token: None,
            extra: Vec::new(),
        })
    }

    /// 24 bytes: `[amount_in, amount_out, pool_id]`.
    fn decode_minimal(&self, bytes: &[u8]) -> Result<SwapRecord, DecodeError> {
        let values = read_u64s(bytes);
        Ok(SwapRecord {
            timestamp_in: None,
            amount_in: values[0],
            pool_id: Some(values[2]),
            pool: self.registry.identify_pool(values[2]),
            timestamp_out: None,
            amount_out: values[1],
            pool_token: None,
            extra: Vec::new(),
        })
    }

    /// Flat u64 sequence of unrecognized length: first two values are the
    /// amounts, the rest is kept opaque.
    fn decode_u64_sequence(&self, bytes: &[u8]) -> Result<SwapRecord, DecodeError> {
        let values = read_u64s(bytes);
        debug!(count = values.len(), "ray_log fell back to u64 sequence");
        let mut record = SwapRecord::from_amounts(values[0], values[1]);
        record.extra = values[2..].to_vec();
        record.pool = self.fallback_pool();
        Ok(record)
    }

    /// Last resort: little-endian u32 sequence, pairs recombined into u64.
    fn decode_u32_sequence(&self, bytes: &[u8]) -> Result<SwapRecord, DecodeError> {
        if bytes.len() % 4 != 0 {
            return Err(DecodeError::UnknownLayout(bytes.len()));
        }
        let values: Vec<u64> = bytes
            .chunks_exact(4)
            .map(|chunk| u32::from_le_bytes(chunk.try_into().unwrap()) as u64)
            .collect();
        if values.len() < 3 {
            return Err(DecodeError::UnknownLayout(bytes.len()));
        }
        debug!(count = values.len(), "ray_log fell back to u32 sequence");

        let amount_in = values[0] | (values[1] << 32);
        let amount_out = if values.len() > 3 {
            values[2] | (values[3] << 32)
        } else {
            values[2]
        };
        let mut record = SwapRecord::from_amounts(amount_in, amount_out);
        record.pool = self.fallback_pool();
        Ok(record)
    }

    fn fallback_pool(&self) -> Option<PoolKey> {
        if self.strict_pool_resolution {
            None
        } else {
            Some(self.registry.primary_pair())
        }
    }
}

fn read_u64s(bytes: &[u8]) -> Vec<u64> {
    bytes
        .chunks_exact(8)
        .map(|chunk| u64::from_le_bytes(chunk.try_into().unwrap()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logic::types::PoolKey;
    use lazy_static::lazy_static;

    lazy_static! {
        static ref REGISTRY: Arc<PoolRegistry> = Arc::new(PoolRegistry::with_default_pairs());
    }

    fn decoder() -> RayLogDecoder {
        RayLogDecoder::new(Arc::clone(&REGISTRY), false)
    }

    fn strict_decoder() -> RayLogDecoder {
        RayLogDecoder::new(Arc::clone(&REGISTRY), true)
    }

    fn pack(values: &[u64]) -> String {
        let bytes: Vec<u8> = values.iter().flat_map(|v| v.to_le_bytes()).collect();
        BASE64.encode(bytes)
    }

    #[test]
    fn decodes_seven_value_layout() {
        let log = pack(&[1_700_000_000, 2_000_000_000, 1, 1_700_000_001, 1_900_000_000, 7, 0]);
        let record = decoder().decode(&log).unwrap();

        assert_eq!(record.timestamp_in, Some(1_700_000_000));
        assert_eq!(record.amount_in, 2_000_000_000);
        assert_eq!(record.pool_id, Some(1));
        assert_eq!(record.pool, Some(PoolKey::SolUsdc));
        assert_eq!(record.timestamp_out, Some(1_700_000_001));
        assert_eq!(record.amount_out, 1_900_000_000);
        assert_eq!(record.pool_token, Some(7));
        assert_eq!(record.extra, vec![0]);
    }

    #[test]
    fn decodes_six_value_layout() {
        let log = pack(&[11, 1_000_000_000, 2, 12, 950_000_000, 3]);
        let record = decoder().decode(&log).unwrap();

        assert_eq!(record.amount_in, 1_000_000_000);
        assert_eq!(record.amount_out, 950_000_000);
        assert_eq!(record.pool, Some(PoolKey::SolUsdt));
        assert!(record.extra.is_empty());
    }

    #[test]
    fn decodes_four_value_layout_with_pinned_field_order() {
        // [timestamp_in, amount_in, amount_out, pool_id]
        let log = pack(&[1_234_567_890, 1_000_000_000, 950_000_000, 2]);
        let record = decoder().decode(&log).unwrap();

        assert_eq!(record.timestamp_in, Some(1_234_567_890));
        assert_eq!(record.amount_in, 1_000_000_000);
        assert_eq!(record.amount_out, 950_000_000);
        assert_eq!(record.pool_id, Some(2));
        assert_eq!(record.pool, Some(PoolKey::SolUsdt));
    }

    #[test]
    fn decodes_three_value_layout() {
        let log = pack(&[1_000_000_000, 950_000_000, 1]);
        let record = decoder().decode(&log).unwrap();

        assert_eq!(record.amount_in, 1_000_000_000);
        assert_eq!(record.amount_out, 950_000_000);
        assert_eq!(record.pool_id, Some(1));
    }

    #[test]
    fn version_tag_is_transparent() {
        let body: Vec<u8> = [1_234_567_890u64, 1_000_000_000, 950_000_000, 2]
            .iter()
            .flat_map(|v| v.to_le_bytes())
            .collect();
        let untagged = BASE64.encode(&body);
        let tagged = {
            let mut bytes = vec![RAY_LOG_VERSION_3];
            bytes.extend_from_slice(&body);
            BASE64.encode(bytes)
        };

        let plain = decoder().decode(&untagged).unwrap();
        let versioned = decoder().decode(&tagged).unwrap();
        assert_eq!(plain, versioned);
    }

    #[test]
    fn ray_log_prefix_is_stripped() {
        let log = pack(&[1_000_000_000, 950_000_000, 1]);
        let prefixed = format!("ray_log: {log}");

        assert_eq!(
            decoder().decode(&prefixed).unwrap(),
            decoder().decode(&log).unwrap()
        );
    }

    #[test]
    fn generic_u64_sequence_takes_first_two_amounts() {
        // 40 bytes: not one of the special widths.
        let log = pack(&[1_000_000_000, 950_000_000, 5, 6, 7]);
        let record = decoder().decode(&log).unwrap();

        assert_eq!(record.amount_in, 1_000_000_000);
        assert_eq!(record.amount_out, 950_000_000);
        assert_eq!(record.extra, vec![5, 6, 7]);
        assert_eq!(record.pool, Some(PoolKey::SolUsdc));
        assert_eq!(record.pool_id, None);
    }

    #[test]
    fn two_value_payload_decodes() {
        let log = pack(&[1_000_000_000, 950_000_000]);
        let record = decoder().decode(&log).unwrap();

        assert_eq!(record.amount_in, 1_000_000_000);
        assert_eq!(record.amount_out, 950_000_000);
        assert!(record.extra.is_empty());
    }

    #[test]
    fn strict_resolution_leaves_fallback_pool_unresolved() {
        let log = pack(&[1_000_000_000, 950_000_000]);
        let record = strict_decoder().decode(&log).unwrap();
        assert_eq!(record.pool, None);
    }

    #[test]
    fn u32_sequence_recombines_pairs() {
        // 12 bytes: three u32 values, not divisible by 8.
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&5u32.to_le_bytes());
        bytes.extend_from_slice(&0u32.to_le_bytes());
        bytes.extend_from_slice(&7u32.to_le_bytes());
        let log = BASE64.encode(bytes);

        let record = decoder().decode(&log).unwrap();
        assert_eq!(record.amount_in, 5);
        assert_eq!(record.amount_out, 7);
    }

    #[test]
    fn u32_sequence_uses_high_words_when_present() {
        // 20 bytes: five u32 values.
        let mut bytes = Vec::new();
        for v in [1u32, 2, 3, 4, 9] {
            bytes.extend_from_slice(&v.to_le_bytes());
        }
        let log = BASE64.encode(bytes);

        let record = decoder().decode(&log).unwrap();
        assert_eq!(record.amount_in, 1 | (2 << 32));
        assert_eq!(record.amount_out, 3 | (4 << 32));
    }

    #[test]
    fn rejects_invalid_base64() {
        assert!(matches!(
            decoder().decode("not base64!!!"),
            Err(DecodeError::InvalidBase64(_))
        ));
    }

    #[test]
    fn rejects_empty_input() {
        assert!(matches!(decoder().decode(""), Err(DecodeError::Empty)));
        assert!(matches!(
            decoder().decode("ray_log: "),
            Err(DecodeError::Empty)
        ));
    }

    #[test]
    fn rejects_zero_amounts() {
        let log = pack(&[0, 0, 1]);
        assert!(matches!(
            decoder().decode(&log),
            Err(DecodeError::ZeroAmounts)
        ));
    }

    #[test]
    fn rejects_unmatchable_lengths() {
        // 10 bytes: not divisible by 8 or 4.
        let log = BASE64.encode([0u8; 10]);
        assert!(matches!(
            decoder().decode(&log),
            Err(DecodeError::UnknownLayout(10))
        ));

        // 8 bytes: one u64 is not enough for a pair of amounts, and the u32
        // view only yields two values.
        let log = BASE64.encode([1u8; 8]);
        assert!(matches!(
            decoder().decode(&log),
            Err(DecodeError::UnknownLayout(8))
        ));
    }

    #[test]
    fn unknown_pool_id_stays_unresolved() {
        let log = pack(&[1_000_000_000, 950_000_000, 999]);
        let record = decoder().decode(&log).unwrap();
        assert_eq!(record.pool_id, Some(999));
        assert_eq!(record.pool, None);
    }
}
