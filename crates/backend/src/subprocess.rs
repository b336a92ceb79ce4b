//! Subprocess-backed collaborators: `nargo` for compilation and witness
//! execution, `bb` for proving, key derivation and verification.
//!
//! Argument assembly is split into pure functions so the exact command lines
//! are testable without the binaries installed.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::process::Command;

use anyhow::{anyhow, Context, Result};
use thiserror::Error;
use tracing::info;

use fields::{FieldElement, VerificationKey};

use crate::circuit::{Circuit, Witness, WitnessInputRecord};
use crate::options::{OracleHash, OutputFormat, ProveOptions, SCHEME};
use crate::{CircuitCompiler, ProveOutput, ProvingBackend, WitnessExecutor};

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("failed to spawn `{program}`: {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },
    #[error("`{program} {args}` exited with {status}")]
    Command {
        program: String,
        args: String,
        status: String,
    },
    #[error("backend wrote no output file at {path}")]
    MissingOutput { path: PathBuf },
}

/// Runs a collaborator binary to completion, inheriting stdio so backend
/// diagnostics reach the operator directly. Non-zero exit is fatal.
fn run(program: &str, args: &[String], cwd: Option<&Path>) -> Result<(), BackendError> {
    info!(program, args = %args.join(" "), "running collaborator");
    let mut cmd = Command::new(program);
    cmd.args(args);
    if let Some(dir) = cwd {
        cmd.current_dir(dir);
    }
    let status = cmd.status().map_err(|source| BackendError::Spawn {
        program: program.to_string(),
        source,
    })?;
    if !status.success() {
        return Err(BackendError::Command {
            program: program.to_string(),
            args: args.join(" "),
            status: status.to_string(),
        });
    }
    Ok(())
}

fn read_output(path: &Path) -> Result<Vec<u8>> {
    if !path.exists() {
        return Err(BackendError::MissingOutput {
            path: path.to_path_buf(),
        }
        .into());
    }
    fs::read(path).with_context(|| format!("read backend output {}", path.display()))
}

fn read_fields_json(path: &Path) -> Result<Vec<FieldElement>> {
    let raw = read_output(path)?;
    serde_json::from_slice(&raw).with_context(|| format!("parse {}", path.display()))
}

// ——— nargo ———

/// `nargo compile` in the circuit's package directory, then loads the
/// artifact from `target/<name>.json`.
#[derive(Clone, Debug)]
pub struct NargoCompiler {
    pub program: String,
}

impl Default for NargoCompiler {
    fn default() -> Self {
        NargoCompiler {
            program: "nargo".to_string(),
        }
    }
}

impl CircuitCompiler for NargoCompiler {
    fn compile(&self, circuit_dir: &Path, name: &str) -> Result<Circuit> {
        run(&self.program, &["compile".to_string()], Some(circuit_dir))
            .with_context(|| format!("compile circuit `{name}` in {}", circuit_dir.display()))?;
        Circuit::load(name, circuit_dir.join("target").join(format!("{name}.json")))
    }
}

/// `nargo execute`: writes the input record as `Prover.toml` in the package
/// directory and reads the witness the executor leaves under `target/`.
#[derive(Clone, Debug)]
pub struct NargoExecutor {
    pub program: String,
}

impl Default for NargoExecutor {
    fn default() -> Self {
        NargoExecutor {
            program: "nargo".to_string(),
        }
    }
}

/// Witness file name passed to `nargo execute`. The pipeline is sequential,
/// so reusing one name per package is safe; the blob is read back and staged
/// under the stage id immediately.
const WITNESS_NAME: &str = "witness";

impl WitnessExecutor for NargoExecutor {
    fn execute(&self, circuit: &Circuit, inputs: &WitnessInputRecord) -> Result<Witness> {
        let package_dir = circuit.package_dir().ok_or_else(|| {
            anyhow!(
                "circuit `{}` artifact path {} has no package directory",
                circuit.name,
                circuit.artifact_path.display()
            )
        })?;
        let prover_toml = package_dir.join("Prover.toml");
        fs::write(&prover_toml, inputs.to_prover_toml())
            .with_context(|| format!("write {}", prover_toml.display()))?;
        run(
            &self.program,
            &["execute".to_string(), WITNESS_NAME.to_string()],
            Some(package_dir),
        )
        .with_context(|| format!("execute witness for circuit `{}`", circuit.name))?;
        let witness_path = package_dir.join("target").join(format!("{WITNESS_NAME}.gz"));
        Ok(Witness(read_output(&witness_path)?))
    }
}

// ——— bb ———

/// The `bb` CLI backend. Output files land in the per-stage directory the
/// caller supplies: `proof`, `proof_fields.json`, `vk`, `vk_fields.json`.
#[derive(Clone, Debug)]
pub struct BbCli {
    pub program: String,
}

impl Default for BbCli {
    fn default() -> Self {
        BbCli {
            program: "bb".to_string(),
        }
    }
}

fn push_option_flags(args: &mut Vec<String>, opts: &ProveOptions, proving: bool) {
    if let Some(fmt) = opts.output_format.as_arg() {
        args.push("--output_format".to_string());
        args.push(fmt.to_string());
    }
    if opts.honk_recursion {
        args.push("--honk_recursion".to_string());
        args.push("1".to_string());
    }
    // `--recursive` only applies to proof generation.
    if proving && opts.recursive {
        args.push("--recursive".to_string());
    }
    if opts.init_kzg_accumulator {
        args.push("--init_kzg_accumulator".to_string());
    }
    if let Some(hash) = opts.oracle_hash.as_arg() {
        args.push("--oracle_hash".to_string());
        args.push(hash.to_string());
    }
}

pub fn prove_args(
    circuit_path: &Path,
    witness_path: &Path,
    out_dir: &Path,
    opts: &ProveOptions,
) -> Vec<String> {
    let mut args = vec![
        "prove".to_string(),
        "-v".to_string(),
        "--scheme".to_string(),
        SCHEME.to_string(),
        "-b".to_string(),
        circuit_path.display().to_string(),
        "-w".to_string(),
        witness_path.display().to_string(),
        "-o".to_string(),
        out_dir.display().to_string(),
    ];
    push_option_flags(&mut args, opts, true);
    args
}

pub fn write_vk_args(circuit_path: &Path, out_dir: &Path, opts: &ProveOptions) -> Vec<String> {
    let mut args = vec![
        "write_vk".to_string(),
        "-v".to_string(),
        "--scheme".to_string(),
        SCHEME.to_string(),
        "-b".to_string(),
        circuit_path.display().to_string(),
        "-o".to_string(),
        out_dir.display().to_string(),
    ];
    push_option_flags(&mut args, opts, false);
    args
}

pub fn verify_args(vk_path: &Path, proof_path: &Path, oracle_hash: OracleHash) -> Vec<String> {
    let mut args = vec![
        "verify".to_string(),
        "--scheme".to_string(),
        SCHEME.to_string(),
        "-k".to_string(),
        vk_path.display().to_string(),
        "-p".to_string(),
        proof_path.display().to_string(),
    ];
    if let Some(hash) = oracle_hash.as_arg() {
        args.push("--oracle_hash".to_string());
        args.push(hash.to_string());
    }
    args
}

pub fn write_solidity_verifier_args(vk_path: &Path, out_path: &Path) -> Vec<String> {
    vec![
        "write_solidity_verifier".to_string(),
        "--scheme".to_string(),
        SCHEME.to_string(),
        "-k".to_string(),
        vk_path.display().to_string(),
        "-o".to_string(),
        out_path.display().to_string(),
    ]
}

impl ProvingBackend for BbCli {
    fn prove(
        &self,
        circuit: &Circuit,
        witness: &Witness,
        opts: &ProveOptions,
        out_dir: &Path,
    ) -> Result<ProveOutput> {
        fs::create_dir_all(out_dir).with_context(|| format!("create {}", out_dir.display()))?;
        let witness_path = out_dir.join("witness.gz");
        fs::write(&witness_path, &witness.0)
            .with_context(|| format!("write {}", witness_path.display()))?;
        run(
            &self.program,
            &prove_args(&circuit.artifact_path, &witness_path, out_dir, opts),
            None,
        )
        .with_context(|| format!("prove circuit `{}`", circuit.name))?;
        let proof_bytes = read_output(&out_dir.join("proof"))?;
        let proof_fields = match opts.output_format {
            OutputFormat::BytesAndFields => read_fields_json(&out_dir.join("proof_fields.json"))?,
            OutputFormat::Bytes => Vec::new(),
        };
        Ok(ProveOutput {
            proof_bytes,
            proof_fields,
        })
    }

    fn write_vk(
        &self,
        circuit: &Circuit,
        opts: &ProveOptions,
        out_dir: &Path,
    ) -> Result<VerificationKey> {
        fs::create_dir_all(out_dir).with_context(|| format!("create {}", out_dir.display()))?;
        run(
            &self.program,
            &write_vk_args(&circuit.artifact_path, out_dir, opts),
            None,
        )
        .with_context(|| format!("write vk for circuit `{}`", circuit.name))?;
        let bytes = read_output(&out_dir.join("vk"))?;
        let vk_fields = match opts.output_format {
            OutputFormat::BytesAndFields => read_fields_json(&out_dir.join("vk_fields.json"))?,
            OutputFormat::Bytes => Vec::new(),
        };
        Ok(VerificationKey {
            bytes,
            fields: vk_fields,
        })
    }

    fn verify(
        &self,
        vk_path: &Path,
        proof_path: &Path,
        oracle_hash: OracleHash,
    ) -> Result<()> {
        run(&self.program, &verify_args(vk_path, proof_path, oracle_hash), None)
            .context("verify proof")?;
        Ok(())
    }

    fn write_solidity_verifier(&self, vk_path: &Path, out_path: &Path) -> Result<()> {
        run(
            &self.program,
            &write_solidity_verifier_args(vk_path, out_path),
            None,
        )
        .context("write solidity verifier")?;
        Ok(())
    }
}
