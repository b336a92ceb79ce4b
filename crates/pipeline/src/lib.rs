//! Bottom-up driver for the composition tree.
//!
//! Walks a [`TreeConfig`] leaves-first, left to right: every leaf proof is
//! generated with the recursion-friendly options, every interior node's
//! witness record is assembled from its two children's staged artifacts, and
//! the root is proven with the keccak transcript, verified, and split into
//! on-chain calldata. Single logical thread; the long-running backend
//! invocations are the only suspension points. Any failure aborts the whole
//! run with the stage named — no retries, no partial salvage, no resume.

use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{Context, Result};
use tracing::info;

use artifacts::{ArtifactStore, StageId};
use backend::{
    Circuit, CircuitCompiler, OracleHash, ProveOptions, ProvingBackend, StageRunner,
    WitnessExecutor,
};
use calldata::{Calldata, ExtractLayout};
use comptree::{
    assemble_aggregate_input, assemble_join_input, ChildArtifacts, JoinCircuit, JoinSpec,
    TreeConfig,
};

/// The compiled circuits one aggregation run proves against, with their
/// circuit-level public-input counts.
pub struct CircuitSet {
    pub leaf: Circuit,
    /// Public inputs exposed by the leaf circuit (a circuit constant).
    pub leaf_public_inputs: usize,
    pub join: Circuit,
    pub aggregate: Circuit,
    /// Public inputs exposed by the recursive join/aggregate circuits.
    pub interior_public_inputs: usize,
}

impl CircuitSet {
    /// Compiles the three circuit packages. Each directory name doubles as
    /// the circuit name, mirroring the compiler's `target/<name>.json`
    /// convention.
    pub fn compile(
        compiler: &impl CircuitCompiler,
        leaf_dir: &Path,
        join_dir: &Path,
        aggregate_dir: &Path,
        leaf_public_inputs: usize,
        interior_public_inputs: usize,
    ) -> Result<Self> {
        let name_of = |dir: &Path| -> Result<String> {
            dir.file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .ok_or_else(|| anyhow::anyhow!("circuit directory {} has no name", dir.display()))
        };
        Ok(CircuitSet {
            leaf: compiler.compile(leaf_dir, &name_of(leaf_dir)?)?,
            leaf_public_inputs,
            join: compiler.compile(join_dir, &name_of(join_dir)?)?,
            aggregate: compiler.compile(aggregate_dir, &name_of(aggregate_dir)?)?,
            interior_public_inputs,
        })
    }

    fn for_join(&self, join: &JoinSpec) -> &Circuit {
        match join.circuit {
            JoinCircuit::Join => &self.join,
            JoinCircuit::Aggregate => &self.aggregate,
        }
    }
}

/// Everything the run leaves behind at the root: the raw terminal proof, the
/// extracted verifier calldata, and the emitted verifier contract path.
#[derive(Debug)]
pub struct RootArtifacts {
    pub proof_bytes: Vec<u8>,
    pub calldata: Calldata,
    pub verifier_contract: PathBuf,
}

pub struct Pipeline<E, P> {
    runner: StageRunner<E, P>,
    store: ArtifactStore,
    layout: ExtractLayout,
}

impl<E: WitnessExecutor, P: ProvingBackend> Pipeline<E, P> {
    pub fn new(
        executor: E,
        backend: P,
        store: ArtifactStore,
        work_dir: impl Into<PathBuf>,
    ) -> Self {
        Pipeline {
            runner: StageRunner::new(executor, backend, work_dir),
            store,
            layout: ExtractLayout::default(),
        }
    }

    /// Overrides the terminal-proof byte layout (backend-version specific).
    pub fn with_layout(mut self, layout: ExtractLayout) -> Self {
        self.layout = layout;
        self
    }

    pub fn store(&self) -> &ArtifactStore {
        &self.store
    }

    pub fn backend(&self) -> &P {
        self.runner.backend()
    }

    pub fn executor(&self) -> &E {
        self.runner.executor()
    }

    /// Runs the whole tree and produces the on-chain artifacts.
    pub fn run(&mut self, tree: &TreeConfig, circuits: &CircuitSet) -> Result<RootArtifacts> {
        let started = Instant::now();
        info!(
            leaves = tree.leaves().len(),
            joins = tree.joins().len(),
            "starting aggregation run"
        );

        for leaf in tree.leaves() {
            self.runner.run_stage(
                &mut self.store,
                &leaf.stage,
                &circuits.leaf,
                &leaf.inputs,
                &ProveOptions::leaf(),
                circuits.leaf_public_inputs,
            )?;
        }

        let last = tree.joins().len() - 1;
        for (i, join) in tree.joins().iter().enumerate() {
            let left = self.child_artifacts(tree.stage_of(join.left))?;
            let right = self.child_artifacts(tree.stage_of(join.right))?;
            let record = match join.circuit {
                JoinCircuit::Join => assemble_join_input(&left, &right, &join.schema),
                JoinCircuit::Aggregate => assemble_aggregate_input(&left, &right, &join.schema),
            }
            .with_context(|| format!("stage {}: input assembly", join.stage))?;
            let opts = if i == last {
                ProveOptions::root()
            } else {
                ProveOptions::interior()
            };
            self.runner.run_stage(
                &mut self.store,
                &join.stage,
                circuits.for_join(join),
                &record,
                &opts,
                circuits.interior_public_inputs,
            )?;
        }

        let root = tree.root();
        let root_circuit = circuits.for_join(root);
        let root_dir = self.runner.stage_dir(&root.stage);
        let vk_path = self
            .runner
            .vk_dir(root_circuit, OracleHash::Keccak)
            .join("vk");

        // Final self-check against the keccak-transcript key, then the
        // on-chain verifier contract for the same key.
        self.runner
            .backend()
            .verify(&vk_path, &root_dir.join("proof"), OracleHash::Keccak)
            .context("root proof verification")?;
        let verifier_contract = root_dir.join("Verifier.sol");
        self.runner
            .backend()
            .write_solidity_verifier(&vk_path, &verifier_contract)
            .context("emit verifier contract")?;

        let proof_bytes = self.store.proof(&root.stage)?.bytes.clone();
        let calldata = calldata::extract(&proof_bytes, &self.layout)
            .context("extract root proof calldata")?;
        calldata
            .write(&root_dir)
            .context("write root calldata files")?;

        info!(
            elapsed_ms = started.elapsed().as_millis() as u64,
            proof_bytes = proof_bytes.len(),
            "aggregation run complete"
        );
        Ok(RootArtifacts {
            proof_bytes,
            calldata,
            verifier_contract,
        })
    }

    fn child_artifacts(&self, stage: &StageId) -> Result<ChildArtifacts> {
        Ok(ChildArtifacts {
            proof: self.store.proof(stage)?.proof.clone(),
            vk_fields: self.store.verification_key_fields(stage)?.to_vec(),
        })
    }
}
