//! End-to-end pipeline run over mock collaborators: four leaf proofs joined
//! pairwise, then combined into one root proof with the keccak transcript.

use std::cell::RefCell;
use std::path::Path;

use anyhow::anyhow;
use artifacts::{ArtifactStore, StageId};
use backend::{
    Circuit, OracleHash, ProveOptions, ProveOutput, ProvingBackend, Witness, WitnessExecutor,
    WitnessInputRecord,
};
use calldata::ExtractLayout;
use comptree::{LeafSpec, SlotSchema, TreeConfig};
use fields::{bytes_to_fields, FieldElement, VerificationKey};
use pipeline::{CircuitSet, Pipeline};

const LEAF_PUBLIC_INPUTS: usize = 4;
const LEAF_PROOF_BODY: usize = 456;
const INTERIOR_PUBLIC_INPUTS: usize = 16;
const INTERIOR_PROOF_BODY: usize = 440;
const HEADER: [u8; 4] = [0, 0, 0, 1];

fn init_logging() {
    tracing_subscriber::fmt::try_init().ok();
}

fn circuit(name: &str) -> Circuit {
    Circuit {
        name: name.to_string(),
        artifact_path: format!("./{name}/target/{name}.json").into(),
        bytecode: String::new(),
        abi: serde_json::Value::Null,
    }
}

fn circuits() -> CircuitSet {
    CircuitSet {
        leaf: circuit("semaphore"),
        leaf_public_inputs: LEAF_PUBLIC_INPUTS,
        join: circuit("join_semaphore_proofs"),
        aggregate: circuit("join_aggregated_proofs"),
        interior_public_inputs: INTERIOR_PUBLIC_INPUTS,
    }
}

fn leaf_inputs(
    secret_key: &str,
    indexes: &str,
    hash_path: [&str; 10],
    proof_length: &str,
    tree_root: &str,
    scope: &str,
    message: &str,
) -> WitnessInputRecord {
    let mut record = WitnessInputRecord::new();
    record.push("secretKey", secret_key);
    record.push(
        "hashPath",
        hash_path.iter().map(|s| s.to_string()).collect::<Vec<_>>(),
    );
    record.push("indexes", indexes);
    record.push("merkleProofLength", proof_length);
    record.push("merkleTreeRoot", tree_root);
    record.push("hashedScope", scope);
    record.push("hashedMessage", message);
    record
}

/// The four dataset vectors, Merkle path lengths 1, 2, 9 and 10.
fn leaves() -> Vec<LeafSpec> {
    let secret =
        "2736030358979909402780800718157159386076813972158567259200215660948447373040";
    vec![
        LeafSpec {
            stage: StageId::from("leaf_1"),
            inputs: leaf_inputs(
                secret,
                "1",
                [
                    "17197790661637433027297685226742709599380837544520340689137581733613433332983",
                    "0", "0", "0", "0", "0", "0", "0", "0", "0",
                ],
                "1",
                "14749601632619677010117355190090900871659822873947496064081607008658671249718",
                "32",
                "43",
            ),
        },
        LeafSpec {
            stage: StageId::from("leaf_2"),
            inputs: leaf_inputs(
                secret,
                "3",
                [
                    "222",
                    "5580148635681152038824579634153994374025422922042242905608547916566050510583",
                    "0", "0", "0", "0", "0", "0", "0", "0",
                ],
                "2",
                "15463896243170667872144918581954291954064138644202866266871757140238856236252",
                "32",
                "43",
            ),
        },
        LeafSpec {
            stage: StageId::from("leaf_3"),
            inputs: leaf_inputs(
                "123",
                "512",
                ["111", "222", "333", "444", "555", "666", "777", "888", "999", "0"],
                "9",
                "5274611616714568986968667627590641996389994354429856948343448712098966975250",
                "42",
                "99",
            ),
        },
        LeafSpec {
            stage: StageId::from("leaf_4"),
            inputs: leaf_inputs(
                secret,
                "1023",
                [
                    "1023",
                    "7703609393926148861806470850414101587282113463695008072842235608796379066550",
                    "11844355347052921836263554861941946966048634969958623466081587590542465759133",
                    "19139877065885635288462009770448247355705152266967089952432395406553642434273",
                    "15968895708437223385516840363948747630018846839139338811061474982723265688336",
                    "1157389113544196424312834359849712044068249869160475042631259223915679649526",
                    "9850169485007128596840836882853679679304108948486378818337816937810456934767",
                    "7328698264973484546168581905250553935177218888248684409634832044961836320061",
                    "3637363514134115024343666241307349483158812906758472113070175697206757306389",
                    "7516686158158401448998320090358910253731148596461412688165783659432576569650",
                ],
                "10",
                "2057311462964865392236711171061056405638996999335557516757935831793017666139",
                "32",
                "43",
            ),
        },
    ]
}

fn tree() -> TreeConfig {
    TreeConfig::balanced(
        leaves(),
        SlotSchema::join("sem1", "sem2", LEAF_PUBLIC_INPUTS),
        SlotSchema::aggregate("agg1", "agg2"),
    )
    .unwrap()
}

// ——— Mock collaborators ———

#[derive(Default)]
struct RecordingExecutor {
    records: RefCell<Vec<WitnessInputRecord>>,
}

impl WitnessExecutor for RecordingExecutor {
    fn execute(&self, _circuit: &Circuit, inputs: &WitnessInputRecord) -> anyhow::Result<Witness> {
        self.records.borrow_mut().push(inputs.clone());
        Ok(Witness(inputs.to_prover_toml().into_bytes()))
    }
}

#[derive(Default)]
struct Calls {
    proves: Vec<(String, String, ProveOptions)>, // (stage, circuit, options)
    vks: Vec<(String, OracleHash)>,
    verifies: Vec<OracleHash>,
    contracts: Vec<std::path::PathBuf>,
}

/// Emulates the proving backend shape-wise: field counts per circuit role,
/// proof bytes = 4-byte header followed by the field bytes.
#[derive(Default)]
struct MockBackend {
    calls: RefCell<Calls>,
    fail_stage: Option<String>,
}

impl MockBackend {
    fn field_count(circuit: &Circuit) -> usize {
        if circuit.name == "semaphore" {
            LEAF_PUBLIC_INPUTS + LEAF_PROOF_BODY
        } else {
            INTERIOR_PUBLIC_INPUTS + INTERIOR_PROOF_BODY
        }
    }
}

impl ProvingBackend for MockBackend {
    fn prove(
        &self,
        circuit: &Circuit,
        witness: &Witness,
        opts: &ProveOptions,
        out_dir: &Path,
    ) -> anyhow::Result<ProveOutput> {
        let stage = out_dir
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        if self.fail_stage.as_deref() == Some(stage.as_str()) {
            return Err(anyhow!("bb exited with exit status: 1"));
        }
        self.calls
            .borrow_mut()
            .proves
            .push((stage, circuit.name.clone(), *opts));
        // Deterministic stand-in fields, seeded from the witness so sibling
        // stages produce distinct proofs.
        let seed = witness.0.iter().fold(0u8, |acc, b| acc.wrapping_add(*b));
        let proof_fields: Vec<FieldElement> = (0..Self::field_count(circuit))
            .map(|i| {
                let mut raw = [0u8; 32];
                raw[0] = seed;
                raw[31] = (i % 251) as u8;
                FieldElement(raw)
            })
            .collect();
        let mut proof_bytes = HEADER.to_vec();
        proof_bytes.extend(fields::fields_to_bytes(&proof_fields));
        Ok(ProveOutput {
            proof_bytes,
            proof_fields,
        })
    }

    fn write_vk(
        &self,
        circuit: &Circuit,
        opts: &ProveOptions,
        _out_dir: &Path,
    ) -> anyhow::Result<VerificationKey> {
        self.calls
            .borrow_mut()
            .vks
            .push((circuit.name.clone(), opts.oracle_hash));
        Ok(VerificationKey {
            bytes: circuit.name.as_bytes().to_vec(),
            fields: bytes_to_fields(circuit.name.as_bytes()),
        })
    }

    fn verify(
        &self,
        _vk_path: &Path,
        _proof_path: &Path,
        oracle_hash: OracleHash,
    ) -> anyhow::Result<()> {
        self.calls.borrow_mut().verifies.push(oracle_hash);
        Ok(())
    }

    fn write_solidity_verifier(&self, _vk_path: &Path, out_path: &Path) -> anyhow::Result<()> {
        self.calls.borrow_mut().contracts.push(out_path.to_path_buf());
        Ok(())
    }
}

// ——— Tests ———

#[test]
fn four_leaf_aggregation_end_to_end() {
    init_logging();
    let work = tempfile::tempdir().unwrap();
    let staging = tempfile::tempdir().unwrap();
    let layout = ExtractLayout {
        header_size: HEADER.len(),
        public_input_count: INTERIOR_PUBLIC_INPUTS,
        element_size: 32,
    };
    let mut pipeline = Pipeline::new(
        RecordingExecutor::default(),
        MockBackend::default(),
        ArtifactStore::with_staging_dir(staging.path()),
        work.path(),
    )
    .with_layout(layout);

    let root = pipeline.run(&tree(), &circuits()).unwrap();

    // The root proof exposes exactly 16 public-input field elements.
    let root_proof = pipeline.store().proof(&StageId::from("root")).unwrap();
    assert_eq!(root_proof.proof.public_inputs.len(), INTERIOR_PUBLIC_INPUTS);

    assert_eq!(root.calldata.public_inputs.len(), 16);
    for word in &root.calldata.public_inputs {
        assert_eq!(word.len(), 66);
        assert!(word.starts_with("0x"));
    }
    let body_len = root.proof_bytes.len() - HEADER.len() - 16 * 32;
    assert_eq!(root.calldata.proof_hex.len(), 2 + body_len * 2);

    // Durable copies for inspection.
    assert!(staging.path().join("root").join("proof").exists());
    assert!(staging.path().join("leaf_3").join("proof_fields.json").exists());
}

#[test]
fn oracle_hash_and_accumulator_schedule() {
    init_logging();
    let work = tempfile::tempdir().unwrap();
    let mut pipeline = Pipeline::new(
        RecordingExecutor::default(),
        MockBackend::default(),
        ArtifactStore::in_memory(),
        work.path(),
    );
    pipeline.run(&tree(), &circuits()).unwrap();
    let calls = pipeline.backend().calls.borrow();

    let stages: Vec<&str> = calls.proves.iter().map(|(s, _, _)| s.as_str()).collect();
    assert_eq!(
        stages,
        vec!["leaf_1", "leaf_2", "leaf_3", "leaf_4", "join_1", "join_2", "root"]
    );
    for (stage, circuit, opts) in &calls.proves {
        match stage.as_str() {
            s if s.starts_with("leaf") => {
                assert_eq!(circuit, "semaphore");
                assert!(opts.init_kzg_accumulator);
                assert_eq!(opts.oracle_hash, OracleHash::Default);
            }
            "join_1" | "join_2" => {
                assert_eq!(circuit, "join_semaphore_proofs");
                assert!(!opts.init_kzg_accumulator);
                assert_eq!(opts.oracle_hash, OracleHash::Default);
            }
            "root" => {
                assert_eq!(circuit, "join_aggregated_proofs");
                assert!(!opts.init_kzg_accumulator);
                assert_eq!(opts.oracle_hash, OracleHash::Keccak);
            }
            other => panic!("unexpected stage {other}"),
        }
        assert!(opts.recursive);
    }

    // One vk derivation per (circuit, transcript): semaphore and the join
    // circuit with the default oracle, the aggregate circuit with keccak.
    assert_eq!(
        calls.vks,
        vec![
            ("semaphore".to_string(), OracleHash::Default),
            ("join_semaphore_proofs".to_string(), OracleHash::Default),
            ("join_aggregated_proofs".to_string(), OracleHash::Keccak),
        ]
    );

    // Root self-check ran once, with keccak, and the contract was emitted.
    assert_eq!(calls.verifies, vec![OracleHash::Keccak]);
    assert_eq!(calls.contracts.len(), 1);
    assert!(calls.contracts[0].ends_with("Verifier.sol"));
}

#[test]
fn join_records_use_the_slot_naming_convention() {
    init_logging();
    let work = tempfile::tempdir().unwrap();
    let mut pipeline = Pipeline::new(
        RecordingExecutor::default(),
        MockBackend::default(),
        ArtifactStore::in_memory(),
        work.path(),
    );
    pipeline.run(&tree(), &circuits()).unwrap();
    let records = pipeline.executor().records.borrow();

    // leaf_1..4, join_1, join_2, root.
    assert_eq!(records.len(), 7);
    let join_names: Vec<&str> = records[4].iter().map(|(n, _)| n).collect();
    assert_eq!(
        join_names,
        vec![
            "sem1_verification_key",
            "sem1_proof",
            "sem1_public_inputs",
            "sem1_key_hash",
            "sem2_verification_key",
            "sem2_proof",
            "sem2_public_inputs",
            "sem2_key_hash",
        ]
    );
    let root_names: Vec<&str> = records[6].iter().map(|(n, _)| n).collect();
    assert_eq!(
        root_names,
        vec![
            "agg1_verification_key",
            "agg1_proof",
            "agg1_key_hash",
            "agg2_verification_key",
            "agg2_proof",
            "agg2_key_hash",
        ]
    );
    // Sibling leaves produced distinct proofs, so the two slots differ.
    assert_ne!(
        records[4].get("sem1_proof"),
        records[4].get("sem2_proof")
    );
}

#[test]
fn backend_failure_aborts_with_stage_named() {
    init_logging();
    let work = tempfile::tempdir().unwrap();
    let backend = MockBackend {
        fail_stage: Some("join_2".to_string()),
        ..MockBackend::default()
    };
    let mut pipeline = Pipeline::new(
        RecordingExecutor::default(),
        backend,
        ArtifactStore::in_memory(),
        work.path(),
    );
    let err = pipeline.run(&tree(), &circuits()).unwrap_err();
    let message = format!("{err:#}");
    assert!(message.contains("join_2"), "got: {message}");
    // Nothing past the failing stage ran.
    assert!(pipeline.store().proof(&StageId::from("root")).is_err());
    assert!(pipeline.store().proof(&StageId::from("join_1")).is_ok());
}
