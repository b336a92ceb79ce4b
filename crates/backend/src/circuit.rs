//! Compiled circuit artifacts and witness input records.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Opaque witness blob produced by the executor for one
/// (circuit, input record) pair. Consumed exactly once by `prove`.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize, Debug)]
#[serde(transparent)]
pub struct Witness(pub Vec<u8>);

/// On-disk shape of the compiler's JSON artifact. Bytecode stays base64,
/// the ABI stays an opaque JSON value; this layer never interprets either.
#[derive(Deserialize)]
struct CircuitArtifact {
    bytecode: String,
    #[serde(default)]
    abi: serde_json::Value,
}

/// Immutable compiled circuit: bytecode plus parameter schema, identified by
/// name. Shared across every stage that proves against it.
#[derive(Clone, Debug)]
pub struct Circuit {
    pub name: String,
    /// Path to the compiled JSON artifact; subprocess backends reference the
    /// circuit by this path rather than re-serializing the bytecode.
    pub artifact_path: PathBuf,
    pub bytecode: String,
    pub abi: serde_json::Value,
}

impl Circuit {
    /// Loads `target/<name>.json` as produced by the compiler.
    pub fn load(name: impl Into<String>, artifact_path: impl Into<PathBuf>) -> Result<Self> {
        let name = name.into();
        let artifact_path = artifact_path.into();
        let raw = fs::read(&artifact_path)
            .with_context(|| format!("read circuit artifact {}", artifact_path.display()))?;
        let artifact: CircuitArtifact = serde_json::from_slice(&raw)
            .with_context(|| format!("parse circuit artifact {}", artifact_path.display()))?;
        Ok(Circuit {
            name,
            artifact_path,
            bytecode: artifact.bytecode,
            abi: artifact.abi,
        })
    }

    /// The circuit's package directory (the artifact lives in
    /// `<package>/target/<name>.json`).
    pub fn package_dir(&self) -> Option<&Path> {
        self.artifact_path.parent().and_then(Path::parent)
    }
}

/// One named circuit input: a field literal (decimal or hex string, as the
/// executor accepts) or a fixed-length sequence of them.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize, Debug)]
#[serde(untagged)]
pub enum InputValue {
    Scalar(String),
    Array(Vec<String>),
}

impl From<&str> for InputValue {
    fn from(s: &str) -> Self {
        InputValue::Scalar(s.to_string())
    }
}

impl From<String> for InputValue {
    fn from(s: String) -> Self {
        InputValue::Scalar(s)
    }
}

impl From<Vec<String>> for InputValue {
    fn from(v: Vec<String>) -> Self {
        InputValue::Array(v)
    }
}

/// Ordered mapping from circuit parameter names to values, built fresh for
/// each stage invocation. Order is preserved because the consuming circuit's
/// parameter schema is positional in the executor's input file.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize, Debug, Default)]
#[serde(transparent)]
pub struct WitnessInputRecord(Vec<(String, InputValue)>);

impl WitnessInputRecord {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, name: impl Into<String>, value: impl Into<InputValue>) {
        self.0.push((name.into(), value.into()));
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &InputValue)> {
        self.0.iter().map(|(n, v)| (n.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&InputValue> {
        self.0.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    /// Renders the record as the executor's `Prover.toml`. All values are
    /// quoted strings; the executor parses field literals itself.
    pub fn to_prover_toml(&self) -> String {
        let mut out = String::new();
        for (name, value) in &self.0 {
            match value {
                InputValue::Scalar(s) => {
                    out.push_str(&format!("{name} = \"{s}\"\n"));
                }
                InputValue::Array(items) => {
                    out.push_str(&format!("{name} = ["));
                    for (i, item) in items.iter().enumerate() {
                        if i > 0 {
                            out.push_str(", ");
                        }
                        out.push_str(&format!("\"{item}\""));
                    }
                    out.push_str("]\n");
                }
            }
        }
        out
    }
}
