// crates/engine/tests/sign_read_tests.rs
#![cfg(all(feature = "c2pa", feature = "openssl"))]

mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use credsign_engine::{
    Assertion, AssertionData, AssertionKind, AssertionType, BuilderSettings, BuilderState, CallbackSigner,
    EngineError, ManifestBuilder, ManifestStoreReader, ReaderSettings, ResourceRef, SignerCapability,
    TrustPolicyConfig,
};
use serde_json::json;

#[test]
fn signed_asset_reads_back_with_typed_assertions() {
    common::init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let input = common::write_test_jpeg(dir.path(), "in.jpg");
    let output = dir.path().join("out.jpg");

    let def = common::creative_work_def("T", "jpg", "Grace Hopper");
    let mut builder = ManifestBuilder::from_json(BuilderSettings::default(), &def, common::local_signer()).unwrap();
    builder.sign(&input, &output).unwrap();
    assert_eq!(builder.state(), BuilderState::Signed);

    let mut reader = ManifestStoreReader::new(ReaderSettings::default());
    let store = reader.read_from_file(&output).unwrap().expect("manifest store");
    let active = store.active().expect("active manifest");

    assert_eq!(active.title.as_deref(), Some("T"));
    assert_eq!(active.claim_generator_info[0].name, "X");

    let work = active
        .assertions_of(AssertionType::CreativeWork)
        .next()
        .and_then(Assertion::as_creative_work)
        .expect("creative work assertion");
    assert_eq!(work.author[0].name, "Grace Hopper");
}

#[test]
fn signer_is_called_exactly_once_per_sign() {
    let dir = tempfile::tempdir().unwrap();
    let input = common::write_test_jpeg(dir.path(), "in.jpg");

    let local = common::local_signer();
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();
    let inner = local.clone();
    let signer = CallbackSigner::new(local.config().unwrap(), move |data| {
        counter.fetch_add(1, Ordering::SeqCst);
        inner.sign(data)
    });

    let def = common::creative_work_def("once", "image/jpeg", "A");
    let mut builder = ManifestBuilder::from_json(BuilderSettings::default(), &def, Arc::new(signer)).unwrap();
    builder.sign(&input, dir.path().join("out.jpg")).unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[test]
fn custom_cbor_assertion_survives_the_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let input = common::write_test_jpeg(dir.path(), "in.jpg");
    let output = dir.path().join("out.jpg");

    let review = Assertion::custom(
        "com.example.review",
        json!({ "verdict": "approved", "score": 4.5, "reviewers": ["a", "b"] }),
    )
    .unwrap()
    .with_kind(AssertionKind::Cbor);

    let def = common::creative_work_def("custom", "image/jpeg", "A");
    let mut builder = ManifestBuilder::from_json(BuilderSettings::default(), &def, common::local_signer()).unwrap();
    builder.add_assertion(review).unwrap();
    builder.sign(&input, &output).unwrap();

    let store = ManifestStoreReader::new(ReaderSettings::default())
        .read_from_file(&output)
        .unwrap()
        .unwrap();
    let assertion = store.active().unwrap().assertion("com.example.review").expect("custom assertion");
    let data = match assertion.data() {
        AssertionData::Custom(d) => d,
        other => panic!("expected custom data, got {other:?}"),
    };
    assert_eq!(data.str_at("/verdict"), Some("approved"));
    assert_eq!(data.f64_at("/score"), Some(4.5));
    assert_eq!(data.array_at("/reviewers").map(Vec::len), Some(2));
}

#[test]
fn thumbnail_resource_is_embedded_and_extractable() {
    let dir = tempfile::tempdir().unwrap();
    let input = common::write_test_jpeg(dir.path(), "in.jpg");
    let output = dir.path().join("out.jpg");

    let def = common::creative_work_def("thumb", "image/jpeg", "A");
    let mut builder = ManifestBuilder::from_json(BuilderSettings::default(), &def, common::local_signer()).unwrap();
    builder.add_resource("thumb.jpg", common::make_test_jpeg_bytes()).unwrap();
    builder.set_thumbnail(ResourceRef::new("image/jpeg", "thumb.jpg")).unwrap();
    builder.sign(&input, &output).unwrap();

    let mut reader = ManifestStoreReader::new(ReaderSettings::default());
    let store = reader.read_from_file(&output).unwrap().unwrap();
    let label = store.active_manifest().unwrap().to_string();
    let thumb = store.active().unwrap().thumbnail.clone().expect("thumbnail ref");

    let bytes = reader.resource(&label, &thumb.identifier).unwrap();
    assert!(!bytes.is_empty());

    let extracted = dir.path().join("extracted.jpg");
    let n = reader.resource_to_file(&label, &thumb.identifier, &extracted).unwrap();
    assert_eq!(n as usize, bytes.len());
    assert_eq!(std::fs::read(extracted).unwrap(), bytes);
}

#[test]
fn unsigned_asset_has_no_store() {
    let dir = tempfile::tempdir().unwrap();
    let plain = common::write_test_jpeg(dir.path(), "plain.jpg");
    let mut reader = ManifestStoreReader::new(ReaderSettings::default());
    assert!(reader.read_from_file(&plain).unwrap().is_none());
    assert!(reader.read_json_from_file(&plain).unwrap().is_none());
}

#[test]
fn raw_json_matches_parsed_store() {
    let dir = tempfile::tempdir().unwrap();
    let input = common::write_test_jpeg(dir.path(), "in.jpg");
    let output = dir.path().join("out.jpg");

    let def = common::creative_work_def("json", "image/jpeg", "A");
    ManifestBuilder::from_json(BuilderSettings::default(), &def, common::local_signer())
        .unwrap()
        .sign(&input, &output)
        .unwrap();

    let mut reader = ManifestStoreReader::new(ReaderSettings::default());
    let raw = reader.read_json_from_file(&output).unwrap().unwrap();
    let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
    let active = value["active_manifest"].as_str().unwrap();
    assert_eq!(value["manifests"][active]["title"], "json");
}

#[test]
fn invalid_paths_fail_before_signing() {
    let dir = tempfile::tempdir().unwrap();
    let input = common::write_test_jpeg(dir.path(), "in.jpg");
    let def = common::creative_work_def("paths", "image/jpeg", "A");
    let mut builder = ManifestBuilder::from_json(BuilderSettings::default(), &def, common::local_signer()).unwrap();

    let missing = dir.path().join("missing.jpg");
    assert!(matches!(builder.sign(&missing, dir.path().join("o.jpg")), Err(EngineError::InvalidPath { .. })));
    assert!(matches!(builder.sign("", dir.path().join("o.jpg")), Err(EngineError::InvalidPath { .. })));
    assert!(matches!(
        builder.sign(&input, dir.path().join("no/such/dir/o.jpg")),
        Err(EngineError::InvalidPath { .. })
    ));
    assert_eq!(builder.state(), BuilderState::Created);

    let mut reader = ManifestStoreReader::new(ReaderSettings::default());
    let a = reader.read_from_file("").unwrap_err().to_string();
    let b = reader.read_from_file(&missing).unwrap_err();
    assert!(matches!(b, EngineError::InvalidPath { .. }));
    assert!(a.starts_with("Invalid file path provided."));
}

#[test]
fn malformed_definition_is_rejected() {
    let signer = common::local_signer();
    let bad_json = ManifestBuilder::from_json(BuilderSettings::default(), "{not json", signer.clone());
    assert!(matches!(bad_json, Err(EngineError::MalformedManifest(_))));

    let wrong_shape = json!({
        "format": "image/jpeg",
        "assertions": [{ "label": "c2pa.thumbnail.claim.jpeg", "data": { "unexpected": true } }]
    })
    .to_string();
    assert!(matches!(
        ManifestBuilder::from_json(BuilderSettings::default(), &wrong_shape, signer),
        Err(EngineError::MalformedManifest(_))
    ));
}

#[test]
fn reading_with_trust_anchors_still_returns_the_store() {
    let dir = tempfile::tempdir().unwrap();
    let input = common::write_test_jpeg(dir.path(), "in.jpg");
    let output = dir.path().join("out.jpg");
    let (chain, key) = common::generate_es256_chain();
    let signer = credsign_engine::LocalSigner::from_pem(chain.as_bytes(), key.into_bytes(), credsign_engine::SigAlg::Es256)
        .unwrap();

    let def = common::creative_work_def("trust", "image/jpeg", "A");
    ManifestBuilder::from_json(BuilderSettings::default(), &def, Arc::new(signer))
        .unwrap()
        .sign(&input, &output)
        .unwrap();

    // the last certificate in the chain is the root
    let root = chain
        .split_inclusive("-----END CERTIFICATE-----")
        .map(str::trim)
        .filter(|block| !block.is_empty())
        .last()
        .unwrap()
        .to_string();
    let settings = ReaderSettings {
        trust_policy: Some(TrustPolicyConfig { anchors: Some(root.into_bytes()), ..Default::default() }),
        ..Default::default()
    };
    let store = ManifestStoreReader::new(settings).read_from_file(&output).unwrap();
    assert!(store.is_some());
}
