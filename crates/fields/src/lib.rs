//! Field-element encoding primitives for the aggregation pipeline.
//!
//! Everything the orchestrator exchanges with the proving backend is either an
//! opaque byte blob or a sequence of 32-byte big-endian field elements; this
//! crate owns the conversion rules between the two.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Width of one encoded field element in bytes.
pub const FIELD_BYTES: usize = 32;

/// All-zero key-hash stand-in, used verbatim wherever a recursive circuit
/// expects a `*_key_hash` input. The current join circuits do not enforce
/// key-hash binding, so no value is derived from key material.
pub const KEY_HASH_PLACEHOLDER: FieldElement = FieldElement([0u8; FIELD_BYTES]);

#[derive(Debug, Error, PartialEq, Eq)]
pub enum FieldError {
    #[error("invalid field hex literal: {0}")]
    InvalidHex(String),
    #[error("field hex literal longer than {FIELD_BYTES} bytes: {0}")]
    Overlength(String),
    #[error("proof has {got} fields, fewer than the {expected} declared public inputs")]
    PublicInputCount { expected: usize, got: usize },
}

/// Big-endian fixed-width encoding of a field residue. The backend's
/// `*_fields.json` files carry these as `0x`-prefixed hex strings, which is
/// also the serde form.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(transparent)]
pub struct FieldElement(pub [u8; FIELD_BYTES]);

impl FieldElement {
    /// Canonical hex form: `0x` + 64 digits, zero-padded.
    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.0))
    }

    /// Parses a `0x`-prefixed (or bare) hex literal of up to 64 digits,
    /// left-padding short literals. The backend zero-pads its own output but
    /// witness-side field literals may be minimal-width.
    pub fn from_hex(s: &str) -> Result<Self, FieldError> {
        let digits = s.strip_prefix("0x").unwrap_or(s);
        if digits.is_empty() {
            return Err(FieldError::InvalidHex(s.to_string()));
        }
        if digits.len() > FIELD_BYTES * 2 {
            return Err(FieldError::Overlength(s.to_string()));
        }
        let mut padded = String::with_capacity(FIELD_BYTES * 2);
        for _ in digits.len()..FIELD_BYTES * 2 {
            padded.push('0');
        }
        padded.push_str(digits);
        let bytes = hex::decode(&padded).map_err(|_| FieldError::InvalidHex(s.to_string()))?;
        let mut out = [0u8; FIELD_BYTES];
        out.copy_from_slice(&bytes);
        Ok(FieldElement(out))
    }
}

impl core::fmt::Debug for FieldElement {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "FieldElement({})", self.to_hex())
    }
}

impl core::fmt::Display for FieldElement {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl Serialize for FieldElement {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for FieldElement {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        struct FieldVisitor;
        impl serde::de::Visitor<'_> for FieldVisitor {
            type Value = FieldElement;
            fn expecting(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
                write!(f, "a 0x-prefixed field element hex string")
            }
            fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                FieldElement::from_hex(v).map_err(E::custom)
            }
        }
        deserializer.deserialize_str(FieldVisitor)
    }
}

// ——— Byte blob ↔ field sequence conversion ———

/// Splits a byte blob into 32-byte big-endian chunks, zero-padding the final
/// chunk on the right. Total element count is `ceil(len / 32)`; the empty
/// blob maps to the empty sequence. Never fails.
pub fn bytes_to_fields(bytes: &[u8]) -> Vec<FieldElement> {
    let mut fields = Vec::with_capacity(bytes.len().div_ceil(FIELD_BYTES));
    for chunk in bytes.chunks(FIELD_BYTES) {
        let mut elem = [0u8; FIELD_BYTES];
        elem[..chunk.len()].copy_from_slice(chunk);
        fields.push(FieldElement(elem));
    }
    fields
}

/// Concatenates elements back into a blob. Inverse of [`bytes_to_fields`] up
/// to the documented zero padding of the final chunk.
pub fn fields_to_bytes(fields: &[FieldElement]) -> Vec<u8> {
    let mut out = Vec::with_capacity(fields.len() * FIELD_BYTES);
    for f in fields {
        out.extend_from_slice(&f.0);
    }
    out
}

/// Concatenated canonical hex of a field sequence. Presentational only.
pub fn fields_to_hex(fields: &[FieldElement]) -> String {
    let mut out = String::with_capacity(2 + fields.len() * FIELD_BYTES * 2);
    out.push_str("0x");
    for f in fields {
        out.push_str(&hex::encode(f.0));
    }
    out
}

// ——— Proof and verification key ———

/// Field-decomposed proof with the circuit's public inputs split off the
/// front of the backend's `proof_fields` sequence.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize, Debug)]
pub struct Proof {
    pub public_inputs: Vec<FieldElement>,
    pub body: Vec<FieldElement>,
}

impl Proof {
    /// Splits a raw `proof_fields` sequence at the circuit's declared
    /// public-input count. A sequence shorter than the declared count means
    /// the backend and the configuration disagree about the circuit
    /// interface; that must be caught here, before a join node consumes the
    /// proof.
    pub fn split(fields: Vec<FieldElement>, public_input_count: usize) -> Result<Self, FieldError> {
        if fields.len() < public_input_count {
            return Err(FieldError::PublicInputCount {
                expected: public_input_count,
                got: fields.len(),
            });
        }
        let mut public_inputs = fields;
        let body = public_inputs.split_off(public_input_count);
        Ok(Proof { public_inputs, body })
    }

    /// Public inputs followed by body, as one sequence. Aggregate-level
    /// circuits take the child proof in this undivided form.
    pub fn all_fields(&self) -> Vec<FieldElement> {
        let mut out = Vec::with_capacity(self.public_inputs.len() + self.body.len());
        out.extend_from_slice(&self.public_inputs);
        out.extend_from_slice(&self.body);
        out
    }
}

/// Per-circuit verification key in both representations: the opaque blob the
/// backend verifies against, and the field encoding a recursive circuit
/// consumes. Derived at most once per circuit per run.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize, Debug)]
pub struct VerificationKey {
    pub bytes: Vec<u8>,
    pub fields: Vec<FieldElement>,
}
