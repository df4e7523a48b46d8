#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::Arc;

use credsign_engine::{LocalSigner, SigAlg, SignerCapability};
use image::{ImageBuffer, Rgb};
use rcgen::{
    BasicConstraints, Certificate, CertificateParams, DnType, ExtendedKeyUsagePurpose, IsCa, KeyUsagePurpose,
};

/// Install a test subscriber once; `RUST_LOG=credsign_engine=debug` shows engine events.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Create a tiny RGB JPEG image and return its bytes.
pub fn make_test_jpeg_bytes() -> Vec<u8> {
    let img: ImageBuffer<Rgb<u8>, Vec<u8>> = ImageBuffer::from_fn(16, 16, |x, y| Rgb([(x * 16) as u8, (y * 16) as u8, 90]));
    let dynimg = image::DynamicImage::ImageRgb8(img);
    let mut out: Vec<u8> = Vec::new();
    let mut cursor = std::io::Cursor::new(&mut out);
    dynimg.write_to(&mut cursor, image::ImageOutputFormat::Jpeg(80)).expect("jpeg encode");
    out
}

pub fn write_test_jpeg(dir: &Path, name: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, make_test_jpeg_bytes()).expect("write jpeg");
    path
}

/// ES256 leaf certificate issued by a throwaway CA, in the shape c2pa accepts
/// for signing: not self-signed, digitalSignature, emailProtection EKU.
/// Returns (chain PEM leaf-first, leaf key PEM).
pub fn generate_es256_chain() -> (String, String) {
    let alg = &rcgen::PKCS_ECDSA_P256_SHA256;

    let mut ca_params = CertificateParams::new(vec![]);
    ca_params.alg = alg;
    ca_params.is_ca = IsCa::Ca(BasicConstraints::Unconstrained);
    ca_params.distinguished_name.push(DnType::CommonName, "credsign test root");
    ca_params.distinguished_name.push(DnType::OrganizationName, "credsign tests");
    ca_params.key_usages = vec![
        KeyUsagePurpose::KeyCertSign,
        KeyUsagePurpose::CrlSign,
        KeyUsagePurpose::DigitalSignature,
    ];
    let ca = Certificate::from_params(ca_params).expect("ca cert");

    let mut leaf_params = CertificateParams::new(vec![]);
    leaf_params.alg = alg;
    leaf_params.distinguished_name.push(DnType::CommonName, "credsign test signer");
    leaf_params.distinguished_name.push(DnType::OrganizationName, "credsign tests");
    leaf_params.key_usages = vec![KeyUsagePurpose::DigitalSignature];
    leaf_params.extended_key_usages = vec![ExtendedKeyUsagePurpose::EmailProtection];
    leaf_params.use_authority_key_identifier_extension = true;
    let leaf = Certificate::from_params(leaf_params).expect("leaf cert");

    let leaf_pem = leaf.serialize_pem_with_signer(&ca).expect("leaf pem");
    let ca_pem = ca.serialize_pem().expect("ca pem");
    (format!("{leaf_pem}{ca_pem}"), leaf.serialize_private_key_pem())
}

pub fn local_signer() -> Arc<dyn SignerCapability> {
    let (chain, key) = generate_es256_chain();
    Arc::new(LocalSigner::from_pem(chain.as_bytes(), key.into_bytes(), SigAlg::Es256).expect("local signer"))
}

/// Configure env vars with a generated chain and key; returns an `env:` signer URI.
pub fn setup_env_signer_vars(prefix: &str) -> String {
    let (chain, key) = generate_es256_chain();
    let cert_var = format!("{prefix}_CERT_PEM");
    let key_var = format!("{prefix}_KEY_PEM");
    std::env::set_var(&cert_var, chain);
    std::env::set_var(&key_var, key);
    format!("env:{cert_var},{key_var}")
}

/// Write the chain and key to `dir`; returns a `local:` signer URI.
pub fn setup_local_signer_files(dir: &Path) -> String {
    let (chain, key) = generate_es256_chain();
    let cert_path = dir.join("chain.pem");
    let key_path = dir.join("key.pem");
    std::fs::write(&cert_path, chain).expect("write chain");
    std::fs::write(&key_path, key).expect("write key");
    format!("local:{},{}", cert_path.display(), key_path.display())
}

/// Definition with a title, one generator and one CreativeWork author.
pub fn creative_work_def(title: &str, format: &str, author: &str) -> String {
    serde_json::json!({
        "title": title,
        "format": format,
        "claim_generator_info": [{ "name": "X", "version": "1.0.0" }],
        "assertions": [
            {
                "label": "stds.schema-org.CreativeWork",
                "data": {
                    "@context": "https://schema.org",
                    "@type": "CreativeWork",
                    "author": [{ "@type": "Person", "name": author }]
                }
            }
        ]
    })
    .to_string()
}
