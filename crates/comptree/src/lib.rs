//! Binary composition-tree topology and join-input assembly.
//!
//! The tree is static configuration: a list of leaf slots and a list of join
//! nodes referencing earlier nodes by index. Each join consumes its two
//! children's proof + verification-key pairs and produces one proof a level
//! up; the last join is the root. Slot naming must match the consuming
//! circuit's parameter schema exactly — a swapped or misnamed slot still
//! proves, but for the wrong pairing, and only surfaces as an unattributed
//! verification failure later.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use artifacts::StageId;
use backend::{InputValue, WitnessInputRecord};
use fields::{FieldElement, Proof, KEY_HASH_PLACEHOLDER};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TreeError {
    #[error("composition tree needs at least two leaves and one join")]
    Empty,
    #[error("join `{stage}` references undefined node {reference}")]
    UnknownNode { stage: String, reference: String },
    #[error("join `{stage}` references join {index}, which is not defined before it")]
    ForwardReference { stage: String, index: usize },
    #[error("node `{stage}` is consumed by {uses} joins; every non-root node must feed exactly one")]
    BadFanOut { stage: String, uses: usize },
    #[error("the root join must not be consumed by another join")]
    ConsumedRoot,
    #[error("{0} leaves; only power-of-two leaf counts are supported (no padding policy)")]
    LeafCount(usize),
    #[error("{slot} slot expects {expected} public inputs, child proof has {got}")]
    PublicInputCount {
        slot: String,
        expected: usize,
        got: usize,
    },
    #[error("slot schema does not match the assembler for this node kind")]
    SchemaMismatch,
}

/// Reference to an earlier node: a leaf slot or a previously defined join.
#[derive(Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Debug)]
pub enum NodeRef {
    Leaf(usize),
    Join(usize),
}

/// Which recursive circuit proves a join node. The first level verifies two
/// leaf proofs; every level above verifies two join/aggregate proofs.
#[derive(Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Debug)]
pub enum JoinCircuit {
    Join,
    Aggregate,
}

/// Slot-naming convention binding an assembled record to the consuming
/// circuit's parameter schema. Each child slot contributes
/// `<prefix>_verification_key`, `<prefix>_proof`, optionally
/// `<prefix>_public_inputs`, and `<prefix>_key_hash`, in that order.
///
/// `public_inputs` is the per-slot count for circuits that take the child's
/// public inputs separately (proof body stripped); `None` means the child
/// proof is passed whole, public inputs in front.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize, Debug)]
pub struct SlotSchema {
    pub left_prefix: String,
    pub right_prefix: String,
    pub public_inputs: Option<usize>,
}

impl SlotSchema {
    pub fn join(left: &str, right: &str, public_inputs: usize) -> Self {
        SlotSchema {
            left_prefix: left.to_string(),
            right_prefix: right.to_string(),
            public_inputs: Some(public_inputs),
        }
    }

    pub fn aggregate(left: &str, right: &str) -> Self {
        SlotSchema {
            left_prefix: left.to_string(),
            right_prefix: right.to_string(),
            public_inputs: None,
        }
    }
}

/// One leaf: the stage id and the witness inputs for the leaf circuit.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize, Debug)]
pub struct LeafSpec {
    pub stage: StageId,
    pub inputs: WitnessInputRecord,
}

/// One interior node.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize, Debug)]
pub struct JoinSpec {
    pub stage: StageId,
    pub left: NodeRef,
    pub right: NodeRef,
    pub circuit: JoinCircuit,
    pub schema: SlotSchema,
}

/// Static tree topology. Joins are listed in dependency order (children
/// before parents, validated at construction); the last join is the root.
/// Deserialization runs the same validation, so a config loaded from JSON
/// carries the construction invariants too.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize, Debug)]
#[serde(try_from = "RawTreeConfig")]
pub struct TreeConfig {
    leaves: Vec<LeafSpec>,
    joins: Vec<JoinSpec>,
}

/// Unvalidated wire form of [`TreeConfig`].
#[derive(Deserialize)]
struct RawTreeConfig {
    leaves: Vec<LeafSpec>,
    joins: Vec<JoinSpec>,
}

impl TryFrom<RawTreeConfig> for TreeConfig {
    type Error = TreeError;

    fn try_from(raw: RawTreeConfig) -> Result<Self, TreeError> {
        TreeConfig::new(raw.leaves, raw.joins)
    }
}

impl TreeConfig {
    pub fn new(leaves: Vec<LeafSpec>, joins: Vec<JoinSpec>) -> Result<Self, TreeError> {
        let config = TreeConfig { leaves, joins };
        config.validate()?;
        Ok(config)
    }

    /// Standard balanced shape over a power-of-two leaf count: one level of
    /// `Join` nodes over the leaves, `Aggregate` nodes above, the final node
    /// named `root`. Non-power-of-two counts are rejected; there is no dummy
    /// proof to pad with at this layer.
    pub fn balanced(
        leaves: Vec<LeafSpec>,
        join_schema: SlotSchema,
        aggregate_schema: SlotSchema,
    ) -> Result<Self, TreeError> {
        let n = leaves.len();
        if n < 2 || !n.is_power_of_two() {
            return Err(TreeError::LeafCount(n));
        }
        let mut joins: Vec<JoinSpec> = Vec::with_capacity(n - 1);
        let mut current: Vec<NodeRef> = (0..n).map(NodeRef::Leaf).collect();
        let mut level = 0usize;
        let mut join_count = 0usize;
        let mut agg_count = 0usize;
        while current.len() > 1 {
            let is_root_level = current.len() == 2;
            let mut next = Vec::with_capacity(current.len() / 2);
            for pair in current.chunks(2) {
                let (circuit, schema) = if level == 0 {
                    (JoinCircuit::Join, join_schema.clone())
                } else {
                    (JoinCircuit::Aggregate, aggregate_schema.clone())
                };
                let stage = if is_root_level {
                    StageId::from("root")
                } else if level == 0 {
                    join_count += 1;
                    StageId::new(format!("join_{join_count}"))
                } else {
                    agg_count += 1;
                    StageId::new(format!("agg_{agg_count}"))
                };
                joins.push(JoinSpec {
                    stage,
                    left: pair[0],
                    right: pair[1],
                    circuit,
                    schema,
                });
                next.push(NodeRef::Join(joins.len() - 1));
            }
            current = next;
            level += 1;
        }
        TreeConfig::new(leaves, joins)
    }

    pub fn leaves(&self) -> &[LeafSpec] {
        &self.leaves
    }

    pub fn joins(&self) -> &[JoinSpec] {
        &self.joins
    }

    pub fn root(&self) -> &JoinSpec {
        // Non-emptiness is a construction invariant.
        self.joins.last().unwrap()
    }

    pub fn stage_of(&self, node: NodeRef) -> &StageId {
        match node {
            NodeRef::Leaf(i) => &self.leaves[i].stage,
            NodeRef::Join(i) => &self.joins[i].stage,
        }
    }

    fn validate(&self) -> Result<(), TreeError> {
        if self.leaves.len() < 2 || self.joins.is_empty() {
            return Err(TreeError::Empty);
        }
        let mut leaf_uses = vec![0usize; self.leaves.len()];
        let mut join_uses = vec![0usize; self.joins.len()];
        for (i, join) in self.joins.iter().enumerate() {
            for child in [join.left, join.right] {
                match child {
                    NodeRef::Leaf(j) => {
                        if j >= self.leaves.len() {
                            return Err(TreeError::UnknownNode {
                                stage: join.stage.0.clone(),
                                reference: format!("leaf {j}"),
                            });
                        }
                        leaf_uses[j] += 1;
                    }
                    NodeRef::Join(j) => {
                        if j >= self.joins.len() {
                            return Err(TreeError::UnknownNode {
                                stage: join.stage.0.clone(),
                                reference: format!("join {j}"),
                            });
                        }
                        if j >= i {
                            return Err(TreeError::ForwardReference {
                                stage: join.stage.0.clone(),
                                index: j,
                            });
                        }
                        join_uses[j] += 1;
                    }
                }
            }
        }
        for (i, &uses) in leaf_uses.iter().enumerate() {
            if uses != 1 {
                return Err(TreeError::BadFanOut {
                    stage: self.leaves[i].stage.0.clone(),
                    uses,
                });
            }
        }
        let root = self.joins.len() - 1;
        for (i, &uses) in join_uses.iter().enumerate() {
            if i == root && uses != 0 {
                return Err(TreeError::ConsumedRoot);
            }
            if i != root && uses != 1 {
                return Err(TreeError::BadFanOut {
                    stage: self.joins[i].stage.0.clone(),
                    uses,
                });
            }
        }
        Ok(())
    }
}

// ——— Input assembly ———

/// What one child slot contributes to its parent's witness record.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct ChildArtifacts {
    pub proof: Proof,
    pub vk_fields: Vec<FieldElement>,
}

fn hex_array(fields: &[FieldElement]) -> InputValue {
    InputValue::Array(fields.iter().map(FieldElement::to_hex).collect())
}

fn push_slot(
    record: &mut WitnessInputRecord,
    prefix: &str,
    child: &ChildArtifacts,
    public_inputs: Option<usize>,
) -> Result<(), TreeError> {
    if let Some(expected) = public_inputs {
        if child.proof.public_inputs.len() != expected {
            return Err(TreeError::PublicInputCount {
                slot: prefix.to_string(),
                expected,
                got: child.proof.public_inputs.len(),
            });
        }
    }
    record.push(format!("{prefix}_verification_key"), hex_array(&child.vk_fields));
    match public_inputs {
        Some(_) => {
            record.push(format!("{prefix}_proof"), hex_array(&child.proof.body));
            record.push(
                format!("{prefix}_public_inputs"),
                hex_array(&child.proof.public_inputs),
            );
        }
        None => {
            record.push(format!("{prefix}_proof"), hex_array(&child.proof.all_fields()));
        }
    }
    record.push(format!("{prefix}_key_hash"), KEY_HASH_PLACEHOLDER.to_hex());
    Ok(())
}

/// Assembles the witness record for any two-child node under `schema`,
/// left slot first. Both slots carry the key-hash placeholder.
pub fn assemble_inputs(
    left: &ChildArtifacts,
    right: &ChildArtifacts,
    schema: &SlotSchema,
) -> Result<WitnessInputRecord, TreeError> {
    let mut record = WitnessInputRecord::new();
    push_slot(&mut record, &schema.left_prefix, left, schema.public_inputs)?;
    push_slot(&mut record, &schema.right_prefix, right, schema.public_inputs)?;
    Ok(record)
}

/// First-level join: children are leaf proofs, public inputs passed in their
/// own slot with the proof body stripped.
pub fn assemble_join_input(
    left: &ChildArtifacts,
    right: &ChildArtifacts,
    schema: &SlotSchema,
) -> Result<WitnessInputRecord, TreeError> {
    if schema.public_inputs.is_none() {
        return Err(TreeError::SchemaMismatch);
    }
    assemble_inputs(left, right, schema)
}

/// Higher-level node combining two prior join/aggregate outputs; the child
/// proof fields are passed whole.
pub fn assemble_aggregate_input(
    left: &ChildArtifacts,
    right: &ChildArtifacts,
    schema: &SlotSchema,
) -> Result<WitnessInputRecord, TreeError> {
    if schema.public_inputs.is_some() {
        return Err(TreeError::SchemaMismatch);
    }
    assemble_inputs(left, right, schema)
}
