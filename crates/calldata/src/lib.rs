//! Terminal-proof extraction into on-chain verifier calldata.
//!
//! The backend's raw terminal proof blob is a fixed-size header, then
//! `public_input_count` elements of `element_size` bytes, then the opaque
//! proof body. None of this is self-describing: the layout constants must
//! match the terminal circuit's declared interface, and beyond a minimum-
//! length check a wrong constant silently misaligns the split.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("terminal proof blob is {got} bytes, need at least {need} for header and public inputs")]
    Truncated { need: usize, got: usize },
    #[error("layout element size must be non-zero")]
    ZeroElementSize,
    #[error("failed to write calldata file {path}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Byte layout of the terminal proof blob. The defaults are the backend's
/// current output: a 4-byte header it prepends to keccak-oracle proofs, and
/// 16 public inputs of 32 bytes each exposed by the root circuit.
#[derive(Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Debug)]
pub struct ExtractLayout {
    pub header_size: usize,
    pub public_input_count: usize,
    pub element_size: usize,
}

impl Default for ExtractLayout {
    fn default() -> Self {
        ExtractLayout {
            header_size: 4,
            public_input_count: 16,
            element_size: 32,
        }
    }
}

/// What an on-chain verifier call takes: the public inputs as 0x-prefixed
/// fixed-width hex words, and the proof body as one hex string.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize, Debug)]
pub struct Calldata {
    pub public_inputs: Vec<String>,
    pub proof_hex: String,
}

impl Calldata {
    /// Writes `public_inputs.json` and `proof_clean.hex` under `dir`.
    pub fn write(&self, dir: &Path) -> Result<(), ExtractError> {
        let write_err = |path: &Path, source| ExtractError::Write {
            path: path.to_path_buf(),
            source,
        };
        fs::create_dir_all(dir).map_err(|e| write_err(dir, e))?;
        let inputs_path = dir.join("public_inputs.json");
        let json = serde_json::to_vec_pretty(&self.public_inputs)
            .map_err(|e| write_err(&inputs_path, io::Error::other(e)))?;
        fs::write(&inputs_path, json).map_err(|e| write_err(&inputs_path, e))?;
        let proof_path = dir.join("proof_clean.hex");
        fs::write(&proof_path, &self.proof_hex).map_err(|e| write_err(&proof_path, e))?;
        Ok(())
    }
}

/// Splits the terminal proof blob per `layout`: strip the header, cut the
/// public-input region into `element_size`-byte big-endian hex words, and
/// hex-encode the remainder as the proof body.
pub fn extract(blob: &[u8], layout: &ExtractLayout) -> Result<Calldata, ExtractError> {
    if layout.element_size == 0 {
        return Err(ExtractError::ZeroElementSize);
    }
    let inputs_len = layout.public_input_count * layout.element_size;
    let need = layout.header_size + inputs_len;
    if blob.len() < need {
        return Err(ExtractError::Truncated {
            need,
            got: blob.len(),
        });
    }
    let body = &blob[layout.header_size..];
    let (inputs_raw, proof_raw) = body.split_at(inputs_len);
    let public_inputs = inputs_raw
        .chunks(layout.element_size)
        .map(|chunk| format!("0x{}", hex::encode(chunk)))
        .collect();
    Ok(Calldata {
        public_inputs,
        proof_hex: format!("0x{}", hex::encode(proof_raw)),
    })
}
