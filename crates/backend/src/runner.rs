//! Per-stage orchestration: execute the witness, prove, split the proof
//! fields at the circuit's public-input count, resolve the verification key
//! through the memoizing cache, and stage every artifact.

use std::path::PathBuf;
use std::time::Instant;

use anyhow::{Context, Result};
use tracing::{info, info_span};

use artifacts::{Artifact, ArtifactStore, ProofArtifact, StageId};
use fields::Proof;

use crate::circuit::{Circuit, WitnessInputRecord};
use crate::options::{OracleHash, ProveOptions};
use crate::vk_cache::VkCache;
use crate::{ProvingBackend, WitnessExecutor};

pub struct StageRunner<E, P> {
    executor: E,
    backend: P,
    vk_cache: VkCache,
    work_dir: PathBuf,
}

impl<E: WitnessExecutor, P: ProvingBackend> StageRunner<E, P> {
    pub fn new(executor: E, backend: P, work_dir: impl Into<PathBuf>) -> Self {
        StageRunner {
            executor,
            backend,
            vk_cache: VkCache::new(),
            work_dir: work_dir.into(),
        }
    }

    pub fn backend(&self) -> &P {
        &self.backend
    }

    pub fn executor(&self) -> &E {
        &self.executor
    }

    /// Backend output directory for one stage.
    pub fn stage_dir(&self, stage: &StageId) -> PathBuf {
        self.work_dir.join(&stage.0)
    }

    /// Output directory for a circuit's derived verification key; one per
    /// (circuit, oracle hash), shared by every stage proving that circuit.
    pub fn vk_dir(&self, circuit: &Circuit, oracle_hash: OracleHash) -> PathBuf {
        let leaf = match oracle_hash {
            OracleHash::Default => circuit.name.clone(),
            OracleHash::Keccak => format!("{}_keccak", circuit.name),
        };
        self.work_dir.join("vk").join(leaf)
    }

    /// Runs one stage to completion and stages witness, proof and
    /// verification-key artifacts under `stage`. Any collaborator failure
    /// aborts with the stage named; there are no retries.
    pub fn run_stage(
        &self,
        store: &mut ArtifactStore,
        stage: &StageId,
        circuit: &Circuit,
        inputs: &WitnessInputRecord,
        opts: &ProveOptions,
        public_input_count: usize,
    ) -> Result<()> {
        let span = info_span!("stage", id = %stage, circuit = %circuit.name);
        let _guard = span.enter();
        let started = Instant::now();

        let witness = self
            .executor
            .execute(circuit, inputs)
            .with_context(|| format!("stage {stage}: witness execution"))?;
        store.put(stage, Artifact::Witness(witness.0.clone()))?;

        let out_dir = self.stage_dir(stage);
        let output = self
            .backend
            .prove(circuit, &witness, opts, &out_dir)
            .with_context(|| format!("stage {stage}: proof generation"))?;

        // The declared public-input count must hold before any parent node
        // consumes this proof; a mismatch here means the configured constant
        // and the circuit interface disagree.
        let proof = Proof::split(output.proof_fields, public_input_count)
            .with_context(|| format!("stage {stage}: proof fields"))?;

        let vk = self
            .vk_cache
            .get_or_derive(&circuit.name, opts.oracle_hash, || {
                self.backend
                    .write_vk(circuit, opts, &self.vk_dir(circuit, opts.oracle_hash))
            })
            .with_context(|| format!("stage {stage}: verification key"))?;

        store.put(
            stage,
            Artifact::Proof(ProofArtifact {
                proof,
                bytes: output.proof_bytes,
            }),
        )?;
        store.put(stage, Artifact::VerificationKey(vk.bytes))?;
        store.put(stage, Artifact::VerificationKeyFields(vk.fields))?;
        store.discard_witness(stage);

        info!(elapsed_ms = started.elapsed().as_millis() as u64, "stage complete");
        Ok(())
    }
}
