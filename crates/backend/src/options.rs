//! Proving-option sets for the three roles a stage can play.

use serde::{Deserialize, Serialize};

/// The one proof scheme the pipeline uses; recursion-friendly and supported
/// by the on-chain verifier.
pub const SCHEME: &str = "ultra_honk";

/// Hash used inside the proof transcript. Must match between prover and
/// verifier; mixing schemes within one recursive chain breaks verification,
/// so every interior node uses `Default` and only the terminal
/// (on-chain-facing) proof uses `Keccak`.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Debug, Default)]
pub enum OracleHash {
    #[default]
    Default,
    Keccak,
}

impl OracleHash {
    pub fn as_arg(self) -> Option<&'static str> {
        match self {
            OracleHash::Default => None,
            OracleHash::Keccak => Some("keccak"),
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Debug, Default)]
pub enum OutputFormat {
    #[default]
    Bytes,
    BytesAndFields,
}

impl OutputFormat {
    pub fn as_arg(self) -> Option<&'static str> {
        match self {
            OutputFormat::Bytes => None,
            OutputFormat::BytesAndFields => Some("bytes_and_fields"),
        }
    }
}

/// Backend invocation options for one stage.
#[derive(Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Debug)]
pub struct ProveOptions {
    /// Mark the proof for consumption by a parent recursive circuit.
    pub recursive: bool,
    /// Emit the recursion-friendly transcript layout (`--honk_recursion 1`).
    pub honk_recursion: bool,
    /// Initialize the KZG accumulator. Set at the leaves, where each proving
    /// chain starts; never at interior nodes.
    pub init_kzg_accumulator: bool,
    pub oracle_hash: OracleHash,
    pub output_format: OutputFormat,
}

impl ProveOptions {
    /// Leaf circuits: recursive, recursion transcript, accumulator init.
    pub fn leaf() -> Self {
        ProveOptions {
            recursive: true,
            honk_recursion: true,
            init_kzg_accumulator: true,
            oracle_hash: OracleHash::Default,
            output_format: OutputFormat::BytesAndFields,
        }
    }

    /// Interior join/aggregate nodes: recursive, default oracle hash.
    pub fn interior() -> Self {
        ProveOptions {
            recursive: true,
            honk_recursion: true,
            init_kzg_accumulator: false,
            oracle_hash: OracleHash::Default,
            output_format: OutputFormat::BytesAndFields,
        }
    }

    /// The terminal root node: keccak transcript for on-chain verification.
    /// Fields output stays on so the driver can count the root proof's
    /// public inputs before extraction.
    pub fn root() -> Self {
        ProveOptions {
            recursive: true,
            honk_recursion: true,
            init_kzg_accumulator: false,
            oracle_hash: OracleHash::Keccak,
            output_format: OutputFormat::BytesAndFields,
        }
    }
}
