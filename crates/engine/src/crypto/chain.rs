//! Certificate chain helpers: ordering checks, leaf-first sorting, PKCS7 unpacking.

use openssl::pkcs7::Pkcs7;
use openssl::x509::{X509VerifyResult, X509};

use super::signer::SignerError;

fn to_pem(certs: &[X509]) -> Result<String, SignerError> {
    let mut out = String::new();
    for c in certs {
        let pem = c.to_pem()?;
        out.push_str(
            std::str::from_utf8(&pem)
                .map_err(|_| SignerError::InvalidConfig("certificate PEM is not UTF-8".into()))?,
        );
    }
    Ok(out)
}

/// Each certificate must be signed by the next one in the list.
pub fn validate_chain_order(pem_chain: &str) -> Result<(), SignerError> {
    let certs = X509::stack_from_pem(pem_chain.as_bytes())?;
    if certs.is_empty() {
        return Err(SignerError::InvalidConfig("certificate chain is empty".into()));
    }
    for (i, pair) in certs.windows(2).enumerate() {
        let issuer_key = pair[1].public_key()?;
        if !pair[0].verify(&issuer_key)? {
            tracing::warn!(position = i, "certificate chain is not ordered leaf first");
            return Err(SignerError::InvalidConfig(
                "certificate chain is not in correct order".into(),
            ));
        }
    }
    Ok(())
}

/// Reorder a PEM bundle so the leaf comes first and each certificate is
/// followed by its issuer.
pub fn order_leaf_first(pem_bundle: &str) -> Result<String, SignerError> {
    let certs = X509::stack_from_pem(pem_bundle.as_bytes())?;
    let n = certs.len();
    if n < 2 {
        return to_pem(&certs);
    }

    let issued_by = |issuer: usize, subject: usize| {
        issuer != subject && certs[issuer].issued(&certs[subject]) == X509VerifyResult::OK
    };

    // The leaf issued nothing else in the bundle.
    let leaf = (0..n)
        .find(|&i| !(0..n).any(|j| issued_by(i, j)))
        .ok_or_else(|| SignerError::InvalidConfig("certificate bundle has no leaf".into()))?;

    let mut order = vec![leaf];
    let mut used = vec![false; n];
    used[leaf] = true;
    while let Some(&current) = order.last() {
        match (0..n).find(|&j| !used[j] && issued_by(j, current)) {
            Some(next) => {
                used[next] = true;
                order.push(next);
            }
            None => break,
        }
    }

    if order.len() != n {
        return Err(SignerError::InvalidConfig(format!(
            "certificate bundle is not a single chain ({} of {} certificates linked)",
            order.len(),
            n
        )));
    }

    let ordered: Vec<X509> = order.into_iter().map(|i| certs[i].clone()).collect();
    to_pem(&ordered)
}

/// Extract the certificates of a PKCS7 (`.p7b`) bundle, DER or PEM encoded,
/// as a leaf-first PEM chain.
pub fn pkcs7_to_pem_chain(bundle: &[u8]) -> Result<String, SignerError> {
    let p7 = Pkcs7::from_der(bundle).or_else(|_| Pkcs7::from_pem(bundle))?;
    let certs = p7
        .signed()
        .and_then(|s| s.certificates())
        .ok_or_else(|| SignerError::InvalidConfig("PKCS7 bundle carries no certificates".into()))?;
    let certs: Vec<X509> = certs.iter().map(|c| c.to_owned()).collect();
    order_leaf_first(&to_pem(&certs)?)
}

#[cfg(test)]
pub(crate) mod test_certs {
    use openssl::asn1::Asn1Time;
    use openssl::bn::BigNum;
    use openssl::ec::{EcGroup, EcKey};
    use openssl::hash::MessageDigest;
    use openssl::nid::Nid;
    use openssl::pkey::{PKey, Private};
    use openssl::x509::extension::BasicConstraints;
    use openssl::x509::{X509Builder, X509NameBuilder, X509};

    pub fn ec_key() -> PKey<Private> {
        let group = EcGroup::from_curve_name(Nid::X9_62_PRIME256V1).unwrap();
        PKey::from_ec_key(EcKey::generate(&group).unwrap()).unwrap()
    }

    /// Certificate for `key` with subject `cn`, signed by `issuer` (self-signed when `None`).
    pub fn issue(
        cn: &str,
        key: &PKey<Private>,
        issuer: Option<(&X509, &PKey<Private>)>,
        md: MessageDigest,
        serial: u32,
    ) -> X509 {
        let mut name = X509NameBuilder::new().unwrap();
        name.append_entry_by_text("CN", cn).unwrap();
        let name = name.build();

        let mut b = X509Builder::new().unwrap();
        b.set_version(2).unwrap();
        let serial = BigNum::from_u32(serial).unwrap().to_asn1_integer().unwrap();
        b.set_serial_number(&serial).unwrap();
        b.set_subject_name(&name).unwrap();
        b.set_pubkey(key).unwrap();
        b.set_not_before(&Asn1Time::days_from_now(0).unwrap()).unwrap();
        b.set_not_after(&Asn1Time::days_from_now(2).unwrap()).unwrap();
        match issuer {
            Some((ca, ca_key)) => {
                b.set_issuer_name(ca.subject_name()).unwrap();
                b.sign(ca_key, md).unwrap();
            }
            None => {
                b.append_extension(BasicConstraints::new().critical().ca().build().unwrap())
                    .unwrap();
                b.set_issuer_name(&name).unwrap();
                b.sign(key, md).unwrap();
            }
        }
        b.build()
    }

    pub fn pem(cert: &X509) -> String {
        String::from_utf8(cert.to_pem().unwrap()).unwrap()
    }

    /// (leaf key, leaf cert, CA cert)
    pub fn ec_chain() -> (PKey<Private>, X509, X509) {
        let ca_key = ec_key();
        let ca = issue("credsign test ca", &ca_key, None, MessageDigest::sha256(), 1);
        let leaf_key = ec_key();
        let leaf = issue("credsign test leaf", &leaf_key, Some((&ca, &ca_key)), MessageDigest::sha256(), 2);
        (leaf_key, leaf, ca)
    }
}

#[cfg(test)]
mod tests {
    use super::test_certs::*;
    use super::*;
    use openssl::hash::MessageDigest;
    use openssl::pkcs7::Pkcs7Flags;
    use openssl::stack::Stack;

    #[test]
    fn ordered_chain_validates() {
        let (_, leaf, ca) = ec_chain();
        assert!(validate_chain_order(&format!("{}{}", pem(&leaf), pem(&ca))).is_ok());
    }

    #[test]
    fn reversed_chain_is_rejected() {
        let (_, leaf, ca) = ec_chain();
        assert!(matches!(
            validate_chain_order(&format!("{}{}", pem(&ca), pem(&leaf))),
            Err(SignerError::InvalidConfig(_))
        ));
    }

    #[test]
    fn sorting_puts_leaf_first() {
        let (_, leaf, ca) = ec_chain();
        let sorted = order_leaf_first(&format!("{}{}", pem(&ca), pem(&leaf))).unwrap();
        assert_eq!(sorted, format!("{}{}", pem(&leaf), pem(&ca)));
        assert!(validate_chain_order(&sorted).is_ok());
    }

    #[test]
    fn unrelated_certificates_do_not_form_a_chain() {
        let (_, leaf, _) = ec_chain();
        let other_key = ec_key();
        let other_ca = issue("unrelated ca", &other_key, None, MessageDigest::sha256(), 9);
        assert!(order_leaf_first(&format!("{}{}", pem(&leaf), pem(&other_ca))).is_err());
    }

    #[test]
    fn pkcs7_bundle_unpacks_to_ordered_chain() {
        let (leaf_key, leaf, ca) = ec_chain();
        let mut extra = Stack::new().unwrap();
        extra.push(ca.clone()).unwrap();
        let p7 = Pkcs7::sign(&leaf, &leaf_key, &extra, b"bundle", Pkcs7Flags::BINARY).unwrap();

        let from_der = pkcs7_to_pem_chain(&p7.to_der().unwrap()).unwrap();
        assert_eq!(from_der, format!("{}{}", pem(&leaf), pem(&ca)));

        let from_pem = pkcs7_to_pem_chain(&p7.to_pem().unwrap()).unwrap();
        assert_eq!(from_pem, from_der);
    }

    #[test]
    fn garbage_is_not_a_pkcs7_bundle() {
        assert!(pkcs7_to_pem_chain(b"not a bundle").is_err());
    }
}
