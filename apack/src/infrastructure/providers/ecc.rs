// /////////////////////////////////////////////////////////////////////////////
// APACK
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Reed–Solomon ECC Provider
//!
//! Frames a chunk payload with Reed–Solomon parity so localized on-disk
//! damage can be repaired on read. The frame layout is:
//!
//! ```text
//! [payload, zero-padded to data_shards × shard_len]
//! [parity_shards × shard_len]
//! [shard checksum table: (data_shards + parity_shards) × u64]
//! [footer: payload_len (u32) | shard_len (u32) | data_shards (u16) | parity_shards (u16)]
//! ```
//!
//! Reed–Solomon erasure coding reconstructs *known-missing* shards; it
//! cannot locate errors on its own. The shard checksum table supplies the
//! locations: on decode every shard is checksummed (XXH3-64), shards that
//! fail are treated as erasures, and reconstruction runs once when at most
//! `parity_shards` shards are damaged. More damage than that is an
//! integrity error.
//!
//! `shard_len` is `ceil(payload_len / data_shards)` rounded up to a
//! multiple of 2 (a codec requirement), with a floor of 2.

use apack_domain::{ApackError, EccConfig, EccOutcome, EccProvider};
use reed_solomon_simd::{ReedSolomonDecoder, ReedSolomonEncoder};
use xxhash_rust::xxh3::xxh3_64;

const FOOTER_LEN: usize = 12;

/// Reed–Solomon parity framing with a fixed shard geometry.
#[derive(Debug)]
pub struct ReedSolomonEcc {
    config: EccConfig,
}

impl ReedSolomonEcc {
    pub fn new(config: EccConfig) -> Self {
        ReedSolomonEcc { config }
    }

    fn shard_len_for(&self, payload_len: usize) -> usize {
        let data_shards = usize::from(self.config.data_shards);
        let raw = payload_len.div_ceil(data_shards).max(2);
        raw + (raw & 1)
    }
}

impl EccProvider for ReedSolomonEcc {
    fn config(&self) -> EccConfig {
        self.config
    }

    fn encode(&self, payload: &[u8]) -> Result<Vec<u8>, ApackError> {
        self.config.validate()?;
        let data_shards = usize::from(self.config.data_shards);
        let parity_shards = usize::from(self.config.parity_shards);
        let shard_len = self.shard_len_for(payload.len());

        let payload_len = u32::try_from(payload.len())
            .map_err(|_| ApackError::Format("ECC payload exceeds a 32-bit length".to_string()))?;

        // Data region: the payload zero-padded to a whole number of shards.
        let mut framed = Vec::with_capacity(
            (data_shards + parity_shards) * shard_len + (data_shards + parity_shards) * 8 + FOOTER_LEN,
        );
        framed.extend_from_slice(payload);
        framed.resize(data_shards * shard_len, 0);

        let mut encoder = ReedSolomonEncoder::new(data_shards, parity_shards, shard_len)
            .map_err(|err| ApackError::Integrity(format!("reed-solomon encoder setup failed: {}", err)))?;
        for shard_index in 0..data_shards {
            encoder
                .add_original_shard(&framed[shard_index * shard_len..(shard_index + 1) * shard_len])
                .map_err(|err| ApackError::Integrity(format!("reed-solomon encode failed: {}", err)))?;
        }
        let encoding = encoder
            .encode()
            .map_err(|err| ApackError::Integrity(format!("reed-solomon encode failed: {}", err)))?;
        for parity in encoding.recovery_iter() {
            framed.extend_from_slice(parity);
        }

        // Shard checksum table: the erasure locations for decode.
        let mut table = Vec::with_capacity((data_shards + parity_shards) * 8);
        for shard_index in 0..data_shards + parity_shards {
            let shard = &framed[shard_index * shard_len..(shard_index + 1) * shard_len];
            table.extend_from_slice(&xxh3_64(shard).to_le_bytes());
        }
        framed.extend_from_slice(&table);

        framed.extend_from_slice(&payload_len.to_le_bytes());
        framed.extend_from_slice(&(shard_len as u32).to_le_bytes());
        framed.extend_from_slice(&self.config.data_shards.to_le_bytes());
        framed.extend_from_slice(&self.config.parity_shards.to_le_bytes());
        Ok(framed)
    }

    fn decode(&self, framed: &[u8]) -> Result<EccOutcome, ApackError> {
        if framed.len() < FOOTER_LEN {
            return Err(ApackError::Integrity("ECC frame shorter than its footer".to_string()));
        }
        let footer = &framed[framed.len() - FOOTER_LEN..];
        let payload_len = u32::from_le_bytes([footer[0], footer[1], footer[2], footer[3]]) as usize;
        let shard_len = u32::from_le_bytes([footer[4], footer[5], footer[6], footer[7]]) as usize;
        let data_shards = usize::from(u16::from_le_bytes([footer[8], footer[9]]));
        let parity_shards = usize::from(u16::from_le_bytes([footer[10], footer[11]]));

        let total_shards = data_shards + parity_shards;
        if data_shards == 0 || parity_shards == 0 || shard_len < 2 || shard_len % 2 != 0 {
            return Err(ApackError::Integrity("ECC frame footer is damaged".to_string()));
        }
        let expected_len = total_shards * shard_len + total_shards * 8 + FOOTER_LEN;
        if framed.len() != expected_len || payload_len > data_shards * shard_len {
            return Err(ApackError::Integrity("ECC frame footer is damaged".to_string()));
        }

        let shards = &framed[..total_shards * shard_len];
        let table = &framed[total_shards * shard_len..total_shards * shard_len + total_shards * 8];

        let mut damaged = Vec::new();
        for shard_index in 0..total_shards {
            let shard = &shards[shard_index * shard_len..(shard_index + 1) * shard_len];
            let mut stored = [0u8; 8];
            stored.copy_from_slice(&table[shard_index * 8..shard_index * 8 + 8]);
            if xxh3_64(shard) != u64::from_le_bytes(stored) {
                damaged.push(shard_index);
            }
        }

        if damaged.is_empty() {
            return Ok(EccOutcome {
                payload: framed[..payload_len].to_vec(),
                corrected_shards: 0,
            });
        }
        if damaged.len() > parity_shards {
            return Err(ApackError::Integrity(format!(
                "{} of {} shards damaged, parity can repair at most {}",
                damaged.len(),
                total_shards,
                parity_shards
            )));
        }

        // Single correction attempt: feed every intact shard to the decoder
        // and let it reconstruct the damaged data shards.
        let mut decoder = ReedSolomonDecoder::new(data_shards, parity_shards, shard_len)
            .map_err(|err| ApackError::Integrity(format!("reed-solomon decoder setup failed: {}", err)))?;
        for shard_index in 0..total_shards {
            if damaged.contains(&shard_index) {
                continue;
            }
            let shard = &shards[shard_index * shard_len..(shard_index + 1) * shard_len];
            if shard_index < data_shards {
                decoder.add_original_shard(shard_index, shard)
            } else {
                decoder.add_recovery_shard(shard_index - data_shards, shard)
            }
            .map_err(|err| ApackError::Integrity(format!("reed-solomon decode failed: {}", err)))?;
        }
        let decoding = decoder
            .decode()
            .map_err(|err| ApackError::Integrity(format!("reed-solomon correction failed: {}", err)))?;

        let mut payload = vec![0u8; data_shards * shard_len];
        for shard_index in 0..data_shards {
            let target = &mut payload[shard_index * shard_len..(shard_index + 1) * shard_len];
            if damaged.contains(&shard_index) {
                let restored = decoding.restored_original(shard_index).ok_or_else(|| {
                    ApackError::Integrity(format!("reed-solomon did not restore shard {}", shard_index))
                })?;
                target.copy_from_slice(restored);
            } else {
                target.copy_from_slice(&shards[shard_index * shard_len..(shard_index + 1) * shard_len]);
            }
        }
        payload.truncate(payload_len);
        Ok(EccOutcome {
            payload,
            corrected_shards: damaged.len(),
        })
    }
}
