//! Per-stage artifact staging for the aggregation pipeline.
//!
//! Every stage deposits its outputs (witness, proof, verification key) here
//! and every downstream node looks them up by stage id. Lookups that miss are
//! dependency-ordering bugs, not recoverable conditions: the driver runs the
//! tree bottom-up, so a producer always finishes before its consumer starts.
//!
//! A staging directory may be configured for durable inspection copies. It is
//! deliberately not a checkpoint: runs never resume from it.

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use blake2b_simd::Params as Blake2bParams;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use fields::{fields_to_bytes, FieldElement, Proof};

/// Domain separator for artifact content digests.
const DS_ARTIFACT_V1: &[u8; 16] = b"agg.artifact.v1\0"; // 15 + 1 = 16

/// Stage identifier, e.g. `leaf_1`, `join_2`, `root`.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Debug)]
#[serde(transparent)]
pub struct StageId(pub String);

impl StageId {
    pub fn new(name: impl Into<String>) -> Self {
        StageId(name.into())
    }
}

impl core::fmt::Display for StageId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for StageId {
    fn from(s: &str) -> Self {
        StageId(s.to_string())
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum ArtifactKind {
    Witness,
    Proof,
    VerificationKey,
    VerificationKeyFields,
}

impl ArtifactKind {
    /// Durable-copy file name, matching the backend's own output layout so
    /// staged stages look exactly like backend output directories.
    fn file_name(self) -> &'static str {
        match self {
            ArtifactKind::Witness => "witness.gz",
            ArtifactKind::Proof => "proof",
            ArtifactKind::VerificationKey => "vk",
            ArtifactKind::VerificationKeyFields => "vk_fields.json",
        }
    }
}

impl core::fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let name = match self {
            ArtifactKind::Witness => "witness",
            ArtifactKind::Proof => "proof",
            ArtifactKind::VerificationKey => "verification_key",
            ArtifactKind::VerificationKeyFields => "verification_key_fields",
        };
        f.write_str(name)
    }
}

/// A stage's proof in both wire forms the backend emits
/// (`--output_format bytes_and_fields`): the raw blob for byte-exact
/// extraction at the root, the field split for recursive consumption.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize, Debug)]
pub struct ProofArtifact {
    pub proof: Proof,
    pub bytes: Vec<u8>,
}

/// One artifact, tagged with its kind.
#[derive(Clone, PartialEq, Eq, Debug)]
pub enum Artifact {
    Witness(Vec<u8>),
    Proof(ProofArtifact),
    VerificationKey(Vec<u8>),
    VerificationKeyFields(Vec<FieldElement>),
}

impl Artifact {
    pub fn kind(&self) -> ArtifactKind {
        match self {
            Artifact::Witness(_) => ArtifactKind::Witness,
            Artifact::Proof(_) => ArtifactKind::Proof,
            Artifact::VerificationKey(_) => ArtifactKind::VerificationKey,
            Artifact::VerificationKeyFields(_) => ArtifactKind::VerificationKeyFields,
        }
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("artifact {kind} for stage {stage} was never produced (dependency-ordering bug)")]
    Missing { stage: StageId, kind: ArtifactKind },
    #[error("failed to persist artifact copy to {path}")]
    Persist {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// BLAKE2b-256 content digest of an artifact's canonical bytes. Logged on
/// every `put` so supposedly deterministic artifacts (verification keys in
/// particular) can be compared across runs.
pub fn digest(artifact: &Artifact) -> [u8; 32] {
    let bytes = match artifact {
        Artifact::Witness(b) | Artifact::VerificationKey(b) => b.clone(),
        Artifact::Proof(p) => p.bytes.clone(),
        Artifact::VerificationKeyFields(f) => fields_to_bytes(f),
    };
    let hash = Blake2bParams::new()
        .hash_length(32)
        .personal(DS_ARTIFACT_V1)
        .hash(&bytes);
    let mut out = [0u8; 32];
    out.copy_from_slice(hash.as_bytes());
    out
}

#[derive(Default)]
struct StageSlots {
    witness: Option<Vec<u8>>,
    proof: Option<ProofArtifact>,
    vk: Option<Vec<u8>>,
    vk_fields: Option<Vec<FieldElement>>,
}

/// In-memory artifact map keyed by (stage, kind), with optional durable
/// copies under a staging directory.
#[derive(Default)]
pub struct ArtifactStore {
    stages: HashMap<StageId, StageSlots>,
    staging_dir: Option<PathBuf>,
}

impl ArtifactStore {
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// A store that additionally writes every artifact under
    /// `<dir>/<stage>/<kind file>`, mirroring backend output directories.
    pub fn with_staging_dir(dir: impl Into<PathBuf>) -> Self {
        ArtifactStore {
            stages: HashMap::new(),
            staging_dir: Some(dir.into()),
        }
    }

    /// Stores an artifact, replacing any previous value for the same
    /// (stage, kind) slot. Persistence failures are fatal like everything
    /// else in the pipeline.
    pub fn put(&mut self, stage: &StageId, artifact: Artifact) -> Result<(), StoreError> {
        debug!(
            stage = %stage,
            kind = %artifact.kind(),
            digest = %hex_digest(&artifact),
            "staging artifact"
        );
        if let Some(dir) = &self.staging_dir {
            persist(dir, stage, &artifact)?;
        }
        let slots = self.stages.entry(stage.clone()).or_default();
        match artifact {
            Artifact::Witness(w) => slots.witness = Some(w),
            Artifact::Proof(p) => slots.proof = Some(p),
            Artifact::VerificationKey(k) => slots.vk = Some(k),
            Artifact::VerificationKeyFields(f) => slots.vk_fields = Some(f),
        }
        Ok(())
    }

    pub fn witness(&self, stage: &StageId) -> Result<&[u8], StoreError> {
        self.stages
            .get(stage)
            .and_then(|s| s.witness.as_deref())
            .ok_or_else(|| missing(stage, ArtifactKind::Witness))
    }

    pub fn proof(&self, stage: &StageId) -> Result<&ProofArtifact, StoreError> {
        self.stages
            .get(stage)
            .and_then(|s| s.proof.as_ref())
            .ok_or_else(|| missing(stage, ArtifactKind::Proof))
    }

    pub fn verification_key(&self, stage: &StageId) -> Result<&[u8], StoreError> {
        self.stages
            .get(stage)
            .and_then(|s| s.vk.as_deref())
            .ok_or_else(|| missing(stage, ArtifactKind::VerificationKey))
    }

    pub fn verification_key_fields(&self, stage: &StageId) -> Result<&[FieldElement], StoreError> {
        self.stages
            .get(stage)
            .and_then(|s| s.vk_fields.as_deref())
            .ok_or_else(|| missing(stage, ArtifactKind::VerificationKeyFields))
    }

    /// Drops a stage's witness once its proof exists; witnesses are large and
    /// nothing downstream reads them.
    pub fn discard_witness(&mut self, stage: &StageId) {
        if let Some(slots) = self.stages.get_mut(stage) {
            slots.witness = None;
        }
    }
}

fn missing(stage: &StageId, kind: ArtifactKind) -> StoreError {
    StoreError::Missing {
        stage: stage.clone(),
        kind,
    }
}

fn hex_digest(artifact: &Artifact) -> String {
    let d = digest(artifact);
    let mut out = String::with_capacity(64);
    for b in d {
        out.push_str(&format!("{b:02x}"));
    }
    out
}

fn persist(dir: &Path, stage: &StageId, artifact: &Artifact) -> Result<(), StoreError> {
    let stage_dir = dir.join(&stage.0);
    let write_err = |path: &Path, source| StoreError::Persist {
        path: path.to_path_buf(),
        source,
    };
    fs::create_dir_all(&stage_dir).map_err(|e| write_err(&stage_dir, e))?;
    let path = stage_dir.join(artifact.kind().file_name());
    match artifact {
        Artifact::Witness(b) | Artifact::VerificationKey(b) => {
            fs::write(&path, b).map_err(|e| write_err(&path, e))?;
        }
        Artifact::Proof(p) => {
            fs::write(&path, &p.bytes).map_err(|e| write_err(&path, e))?;
            let fields_path = stage_dir.join("proof_fields.json");
            let json = serde_json::to_vec_pretty(&p.proof.all_fields())
                .map_err(|e| write_err(&fields_path, io::Error::other(e)))?;
            fs::write(&fields_path, json).map_err(|e| write_err(&fields_path, e))?;
        }
        Artifact::VerificationKeyFields(f) => {
            let json = serde_json::to_vec_pretty(f)
                .map_err(|e| write_err(&path, io::Error::other(e)))?;
            fs::write(&path, json).map_err(|e| write_err(&path, e))?;
        }
    }
    Ok(())
}
