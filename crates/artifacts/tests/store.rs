use artifacts::{digest, Artifact, ArtifactStore, ProofArtifact, StageId, StoreError};
use fields::{bytes_to_fields, Proof};

fn sample_proof() -> ProofArtifact {
    let bytes: Vec<u8> = (0..64u8).collect();
    let fields = bytes_to_fields(&bytes);
    ProofArtifact {
        proof: Proof::split(fields, 1).unwrap(),
        bytes,
    }
}

#[test]
fn put_then_get_typed() {
    let mut store = ArtifactStore::in_memory();
    let stage = StageId::from("leaf_1");
    store.put(&stage, Artifact::Witness(vec![1, 2, 3])).unwrap();
    store.put(&stage, Artifact::Proof(sample_proof())).unwrap();
    store
        .put(&stage, Artifact::VerificationKey(vec![9; 16]))
        .unwrap();
    store
        .put(
            &stage,
            Artifact::VerificationKeyFields(bytes_to_fields(&[7; 64])),
        )
        .unwrap();

    assert_eq!(store.witness(&stage).unwrap(), &[1, 2, 3]);
    assert_eq!(store.proof(&stage).unwrap().proof.public_inputs.len(), 1);
    assert_eq!(store.verification_key(&stage).unwrap(), &[9; 16]);
    assert_eq!(store.verification_key_fields(&stage).unwrap().len(), 2);
}

#[test]
fn missing_lookup_names_stage_and_kind() {
    let store = ArtifactStore::in_memory();
    let err = store.proof(&StageId::from("join_1")).unwrap_err();
    match err {
        StoreError::Missing { stage, .. } => assert_eq!(stage.0, "join_1"),
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn missing_slot_within_existing_stage() {
    let mut store = ArtifactStore::in_memory();
    let stage = StageId::from("leaf_1");
    store.put(&stage, Artifact::Witness(vec![1])).unwrap();
    assert!(store.proof(&stage).is_err());
}

#[test]
fn discard_witness_keeps_proof() {
    let mut store = ArtifactStore::in_memory();
    let stage = StageId::from("leaf_1");
    store.put(&stage, Artifact::Witness(vec![1])).unwrap();
    store.put(&stage, Artifact::Proof(sample_proof())).unwrap();
    store.discard_witness(&stage);
    assert!(store.witness(&stage).is_err());
    assert!(store.proof(&stage).is_ok());
}

#[test]
fn staging_dir_mirrors_backend_layout() {
    let dir = tempfile::tempdir().unwrap();
    let mut store = ArtifactStore::with_staging_dir(dir.path());
    let stage = StageId::from("leaf_1");
    store.put(&stage, Artifact::Witness(vec![5; 8])).unwrap();
    store.put(&stage, Artifact::Proof(sample_proof())).unwrap();
    store
        .put(&stage, Artifact::VerificationKey(vec![9; 16]))
        .unwrap();
    store
        .put(
            &stage,
            Artifact::VerificationKeyFields(bytes_to_fields(&[7; 32])),
        )
        .unwrap();

    let base = dir.path().join("leaf_1");
    assert_eq!(std::fs::read(base.join("witness.gz")).unwrap(), vec![5; 8]);
    assert_eq!(
        std::fs::read(base.join("proof")).unwrap(),
        sample_proof().bytes
    );
    assert!(base.join("proof_fields.json").exists());
    assert!(base.join("vk").exists());
    let vk_fields: Vec<String> =
        serde_json::from_slice(&std::fs::read(base.join("vk_fields.json")).unwrap()).unwrap();
    assert_eq!(vk_fields.len(), 1);
    assert!(vk_fields[0].starts_with("0x"));
}

#[test]
fn digest_is_stable_and_content_sensitive() {
    let a = Artifact::VerificationKey(vec![1, 2, 3]);
    let b = Artifact::VerificationKey(vec![1, 2, 3]);
    let c = Artifact::VerificationKey(vec![1, 2, 4]);
    assert_eq!(digest(&a), digest(&b));
    assert_ne!(digest(&a), digest(&c));
}
