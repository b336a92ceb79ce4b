use fields::{
    bytes_to_fields, fields_to_bytes, fields_to_hex, FieldElement, FieldError, Proof,
    FIELD_BYTES, KEY_HASH_PLACEHOLDER,
};

#[test]
fn roundtrip_aligned() {
    let blob: Vec<u8> = (0..96).map(|i| i as u8).collect();
    let fields = bytes_to_fields(&blob);
    assert_eq!(fields.len(), 3);
    assert_eq!(fields_to_bytes(&fields), blob);
}

#[test]
fn roundtrip_ragged_pads_with_zeros() {
    let blob: Vec<u8> = (0..70).map(|i| i as u8).collect();
    let fields = bytes_to_fields(&blob);
    // ceil(70 / 32) = 3 elements.
    assert_eq!(fields.len(), 3);
    let back = fields_to_bytes(&fields);
    assert_eq!(&back[..70], &blob[..]);
    assert!(back[70..].iter().all(|&b| b == 0));
    assert_eq!(back.len(), 96);
}

#[test]
fn empty_blob_is_empty_sequence() {
    assert!(bytes_to_fields(&[]).is_empty());
    assert!(fields_to_bytes(&[]).is_empty());
    assert_eq!(fields_to_hex(&[]), "0x");
}

#[test]
fn hex_is_66_chars_zero_padded() {
    let mut raw = [0u8; FIELD_BYTES];
    raw[31] = 0x2a;
    let f = FieldElement(raw);
    let hex = f.to_hex();
    assert_eq!(hex.len(), 66);
    assert_eq!(
        hex,
        "0x000000000000000000000000000000000000000000000000000000000000002a"
    );
}

#[test]
fn from_hex_left_pads_short_literals() {
    let f = FieldElement::from_hex("0x2a").unwrap();
    assert_eq!(f.0[31], 0x2a);
    assert!(f.0[..31].iter().all(|&b| b == 0));
    // Bare literals are accepted too.
    assert_eq!(FieldElement::from_hex("2a").unwrap(), f);
}

#[test]
fn from_hex_rejects_garbage_and_overlength() {
    assert!(matches!(
        FieldElement::from_hex("0xzz"),
        Err(FieldError::InvalidHex(_))
    ));
    assert!(matches!(
        FieldElement::from_hex("0x"),
        Err(FieldError::InvalidHex(_))
    ));
    let long = format!("0x{}", "ab".repeat(FIELD_BYTES + 1));
    assert!(matches!(
        FieldElement::from_hex(&long),
        Err(FieldError::Overlength(_))
    ));
}

#[test]
fn serde_uses_hex_strings() {
    let f = FieldElement::from_hex("0x2a").unwrap();
    let json = serde_json::to_string(&f).unwrap();
    assert_eq!(json.len(), 68); // 66 + quotes
    let back: FieldElement = serde_json::from_str(&json).unwrap();
    assert_eq!(back, f);
    // Short wire form, as emitted for witness-side literals.
    let short: FieldElement = serde_json::from_str("\"0x2a\"").unwrap();
    assert_eq!(short, f);
}

#[test]
fn proof_split_respects_public_input_count() {
    let fields = bytes_to_fields(&[7u8; 32 * 6]);
    let proof = Proof::split(fields.clone(), 4).unwrap();
    assert_eq!(proof.public_inputs.len(), 4);
    assert_eq!(proof.body.len(), 2);
    assert_eq!(proof.all_fields(), fields);
}

#[test]
fn proof_split_detects_interface_mismatch() {
    let fields = bytes_to_fields(&[7u8; 32 * 2]);
    let err = Proof::split(fields, 4).unwrap_err();
    assert_eq!(err, FieldError::PublicInputCount { expected: 4, got: 2 });
}

#[test]
fn key_hash_placeholder_is_all_zero() {
    assert_eq!(
        KEY_HASH_PLACEHOLDER.to_hex(),
        format!("0x{}", "0".repeat(64))
    );
}
