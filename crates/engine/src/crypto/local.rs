//! OpenSSL-backed signer over a PEM private key and certificate chain.

use std::path::Path;

use openssl::ecdsa::EcdsaSig;
use openssl::hash::MessageDigest;
use openssl::pkey::{Id, PKey, Private};
use openssl::rsa::Padding;
use openssl::sign::{RsaPssSaltlen, Signer};
use zeroize::Zeroizing;

use super::signer::{SignerCapability, SignerConfig, SignerError};
use crate::domain::types::SigAlg;

pub struct LocalSigner {
    alg: SigAlg,
    key: PKey<Private>,
    config: SignerConfig,
}

impl std::fmt::Debug for LocalSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalSigner")
            .field("alg", &self.alg)
            .field("time_authority_url", &self.config.time_authority_url)
            .finish_non_exhaustive()
    }
}

fn digest(alg: SigAlg) -> MessageDigest {
    match alg {
        SigAlg::Es256 | SigAlg::Ps256 => MessageDigest::sha256(),
        SigAlg::Es384 | SigAlg::Ps384 => MessageDigest::sha384(),
        SigAlg::Es512 | SigAlg::Ps512 => MessageDigest::sha512(),
        SigAlg::Ed25519 => MessageDigest::null(),
    }
}

/// Byte length of one P1363 coordinate for the curve behind `alg`.
fn coordinate_len(alg: SigAlg) -> i32 {
    match alg {
        SigAlg::Es384 => 48,
        SigAlg::Es512 => 66,
        _ => 32,
    }
}

fn key_matches(alg: SigAlg, id: Id) -> bool {
    match alg {
        SigAlg::Es256 | SigAlg::Es384 | SigAlg::Es512 => id == Id::EC,
        SigAlg::Ps256 | SigAlg::Ps384 | SigAlg::Ps512 => id == Id::RSA || id == Id::RSA_PSS,
        SigAlg::Ed25519 => id == Id::ED25519,
    }
}

impl LocalSigner {
    /// Build from a PEM chain (leaf first) and a PEM private key. The key
    /// buffer is wiped once parsed.
    pub fn from_pem(cert_pem: &[u8], key_pem: Vec<u8>, alg: SigAlg) -> Result<Self, SignerError> {
        let key_pem = Zeroizing::new(key_pem);
        let key = PKey::private_key_from_pem(&key_pem)?;
        if !key_matches(alg, key.id()) {
            return Err(SignerError::InvalidConfig(format!(
                "private key type does not match algorithm {alg}"
            )));
        }

        let certs = std::str::from_utf8(cert_pem)
            .map_err(|_| SignerError::InvalidConfig("certificate chain must be UTF-8 PEM".into()))?;
        let config = SignerConfig::new(alg, certs);
        config.cert_chain_der()?;
        config.validate_chain_order()?;

        Ok(Self { alg, key, config })
    }

    pub fn from_files(
        cert_path: impl AsRef<Path>,
        key_path: impl AsRef<Path>,
        alg: SigAlg,
    ) -> Result<Self, SignerError> {
        let certs = std::fs::read(cert_path)?;
        let key = std::fs::read(key_path)?;
        Self::from_pem(&certs, key, alg)
    }

    pub fn with_time_authority_url(mut self, url: impl Into<String>) -> Self {
        self.config.time_authority_url = Some(url.into());
        self
    }

    pub fn alg(&self) -> SigAlg {
        self.alg
    }

    fn sign_ecdsa(&self, data: &[u8]) -> Result<Vec<u8>, SignerError> {
        let mut signer = Signer::new(digest(self.alg), &self.key)?;
        signer.update(data)?;
        let der = signer.sign_to_vec()?;

        // COSE wants r | s, each left-padded to the curve size
        let sig = EcdsaSig::from_der(&der)?;
        let n = coordinate_len(self.alg);
        let mut out = sig.r().to_vec_padded(n)?;
        out.extend(sig.s().to_vec_padded(n)?);
        Ok(out)
    }

    fn sign_pss(&self, data: &[u8]) -> Result<Vec<u8>, SignerError> {
        let md = digest(self.alg);
        let mut signer = Signer::new(md, &self.key)?;
        signer.set_rsa_padding(Padding::PKCS1_PSS)?;
        signer.set_rsa_mgf1_md(md)?;
        signer.set_rsa_pss_saltlen(RsaPssSaltlen::DIGEST_LENGTH)?;
        signer.update(data)?;
        Ok(signer.sign_to_vec()?)
    }

    fn sign_ed25519(&self, data: &[u8]) -> Result<Vec<u8>, SignerError> {
        let mut signer = Signer::new_without_digest(&self.key)?;
        Ok(signer.sign_oneshot_to_vec(data)?)
    }
}

impl SignerCapability for LocalSigner {
    fn sign(&self, data: &[u8]) -> Result<Vec<u8>, SignerError> {
        match self.alg {
            SigAlg::Es256 | SigAlg::Es384 | SigAlg::Es512 => self.sign_ecdsa(data),
            SigAlg::Ps256 | SigAlg::Ps384 | SigAlg::Ps512 => self.sign_pss(data),
            SigAlg::Ed25519 => self.sign_ed25519(data),
        }
    }

    fn config(&self) -> Result<SignerConfig, SignerError> {
        Ok(self.config.clone())
    }
}
