//! Collaborator interfaces and per-stage orchestration.
//!
//! The pipeline never does cryptography itself: circuit compilation, witness
//! execution and proving are delegated through the traits below. The traits
//! are synchronous and implementation-agnostic; the shipped implementations
//! ([`subprocess`]) shell out to the `nargo` and `bb` binaries, but an
//! in-process library or an RPC client fits behind the same seams.

use std::path::Path;

use serde::{Deserialize, Serialize};

use fields::{FieldElement, VerificationKey};

pub mod circuit;
pub mod options;
pub mod runner;
pub mod subprocess;
pub mod vk_cache;

pub use circuit::{Circuit, InputValue, Witness, WitnessInputRecord};
pub use options::{OracleHash, OutputFormat, ProveOptions, SCHEME};
pub use runner::StageRunner;
pub use subprocess::{BbCli, NargoCompiler, NargoExecutor};
pub use vk_cache::VkCache;

/// What one `prove` invocation yields under `bytes_and_fields` output: the
/// raw proof blob and its field decomposition (public inputs still in front).
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize, Debug)]
pub struct ProveOutput {
    pub proof_bytes: Vec<u8>,
    pub proof_fields: Vec<FieldElement>,
}

/// Turns circuit source into a compiled artifact. Non-zero exit from the
/// compiler is fatal for the whole run.
pub trait CircuitCompiler {
    fn compile(&self, circuit_dir: &Path, name: &str) -> anyhow::Result<Circuit>;
}

/// Evaluates a circuit's ABI against concrete inputs, yielding an opaque
/// witness blob. Rejects malformed input records (unknown parameter name,
/// value out of field range).
pub trait WitnessExecutor {
    fn execute(&self, circuit: &Circuit, inputs: &WitnessInputRecord) -> anyhow::Result<Witness>;
}

/// The proving backend proper. Every call is blocking and long-running;
/// non-success aborts the pipeline (no retries).
pub trait ProvingBackend {
    fn prove(
        &self,
        circuit: &Circuit,
        witness: &Witness,
        opts: &ProveOptions,
        out_dir: &Path,
    ) -> anyhow::Result<ProveOutput>;

    /// Derives the circuit's verification key. Deterministic for a given
    /// compiled circuit and option set; callers memoize through [`VkCache`].
    fn write_vk(
        &self,
        circuit: &Circuit,
        opts: &ProveOptions,
        out_dir: &Path,
    ) -> anyhow::Result<VerificationKey>;

    fn verify(&self, vk_path: &Path, proof_path: &Path, oracle_hash: OracleHash)
        -> anyhow::Result<()>;

    fn write_solidity_verifier(&self, vk_path: &Path, out_path: &Path) -> anyhow::Result<()>;
}
