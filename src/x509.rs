//! X.509 attestation certificate parsing and checks.
//!
//! Certificates are kept as DER and re-parsed per query; `x509-parser`
//! borrows from the input, so the owned form is the raw encoding.

use der_parser::der::{parse_der_integer, parse_der_octetstring, parse_der_sequence};
use x509_parser::oid_registry::Oid;
use x509_parser::prelude::*;
use x509_parser::public_key::PublicKey;

use crate::bytes::ByteArray;
use crate::crypto;
use crate::error::{Result, WebAuthnError};

const OID_EC_PUBLIC_KEY: Oid<'static> = der_parser::oid!(1.2.840 .10045 .2 .1);
const OID_PRIME256V1: Oid<'static> = der_parser::oid!(1.2.840 .10045 .3 .1 .7);
const OID_ECDSA_WITH_SHA256: Oid<'static> = der_parser::oid!(1.2.840 .10045 .4 .3 .2);
const OID_SHA256_WITH_RSA: Oid<'static> = der_parser::oid!(1.2.840 .113549 .1 .1 .11);

/// id-fido-gen-ce-aaguid: non-critical extension carrying the AAGUID.
pub const OID_FIDO_GEN_CE_AAGUID: Oid<'static> = der_parser::oid!(1.3.6 .1 .4 .1 .45724 .1 .1 .4);

// NIST P-256 domain parameters, for attestation certificates that spell
// out explicit ECParameters instead of the named-curve OID.
const P256_ORDER: [u8; 32] = [
    0xff, 0xff, 0xff, 0xff, 0x00, 0x00, 0x00, 0x00, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff,
    0xff, 0xbc, 0xe6, 0xfa, 0xad, 0xa7, 0x17, 0x9e, 0x84, 0xf3, 0xb9, 0xca, 0xc2, 0xfc, 0x63,
    0x25, 0x51,
];
const P256_GENERATOR: [u8; 65] = [
    0x04, // uncompressed
    0x6b, 0x17, 0xd1, 0xf2, 0xe1, 0x2c, 0x42, 0x47, 0xf8, 0xbc, 0xe6, 0xe5, 0x63, 0xa4, 0x40,
    0xf2, 0x77, 0x03, 0x7d, 0x81, 0x2d, 0xeb, 0x33, 0xa0, 0xf4, 0xa1, 0x39, 0x45, 0xd8, 0x98,
    0xc2, 0x96, // Gx
    0x4f, 0xe3, 0x42, 0xe2, 0xfe, 0x1a, 0x7f, 0x9b, 0x8e, 0xe7, 0xeb, 0x4a, 0x7c, 0x0f, 0x9e,
    0x16, 0x2b, 0xce, 0x33, 0x57, 0x6b, 0x31, 0x5e, 0xce, 0xcb, 0xb6, 0x40, 0x68, 0x37, 0xbf,
    0x51, 0xf5, // Gy
];

/// Public key material extracted from a certificate's SPKI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CertificatePublicKey {
    /// EC key on P-256, as an uncompressed SEC1 point.
    EcP256 { point: Vec<u8> },
    /// EC key on some other curve (secp256k1 and friends).
    EcOther,
    /// RSA key, big-endian modulus and exponent.
    Rsa { n: Vec<u8>, e: Vec<u8> },
    /// Anything else.
    Other,
}

/// A DER-encoded X.509 certificate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Certificate {
    der: ByteArray,
}

impl Certificate {
    /// Parse a DER certificate, rejecting trailing bytes.
    pub fn from_der(der: &[u8]) -> Result<Self> {
        let (remaining, _) = X509Certificate::from_der(der)
            .map_err(|e| WebAuthnError::MalformedInput(format!("invalid X.509 DER: {e}")))?;
        if !remaining.is_empty() {
            return Err(WebAuthnError::MalformedInput(format!(
                "{} stray bytes after X.509 certificate",
                remaining.len()
            )));
        }
        Ok(Self {
            der: ByteArray::new(der),
        })
    }

    /// The raw DER encoding.
    #[must_use]
    pub fn der(&self) -> &ByteArray {
        &self.der
    }

    fn parse(&self) -> Result<X509Certificate<'_>> {
        let (_, cert) = X509Certificate::from_der(self.der.as_bytes())
            .map_err(|e| WebAuthnError::MalformedInput(format!("invalid X.509 DER: {e}")))?;
        Ok(cert)
    }

    /// The X.509 version number (3 for v3 certificates).
    pub fn version(&self) -> Result<u32> {
        Ok(self.parse()?.version().0 + 1)
    }

    /// First value of the given subject DN attribute, if any.
    fn subject_attr(
        &self,
        pick: impl Fn(&X509Name<'_>) -> Option<String>,
    ) -> Result<Option<String>> {
        let cert = self.parse()?;
        Ok(pick(cert.subject()))
    }

    pub fn subject_country(&self) -> Result<Option<String>> {
        self.subject_attr(|name| {
            name.iter_country()
                .next()
                .and_then(|attr| attr.as_str().ok().map(str::to_owned))
        })
    }

    pub fn subject_organization(&self) -> Result<Option<String>> {
        self.subject_attr(|name| {
            name.iter_organization()
                .next()
                .and_then(|attr| attr.as_str().ok().map(str::to_owned))
        })
    }

    pub fn subject_organizational_unit(&self) -> Result<Option<String>> {
        self.subject_attr(|name| {
            name.iter_organizational_unit()
                .next()
                .and_then(|attr| attr.as_str().ok().map(str::to_owned))
        })
    }

    pub fn subject_common_name(&self) -> Result<Option<String>> {
        self.subject_attr(|name| {
            name.iter_common_name()
                .next()
                .and_then(|attr| attr.as_str().ok().map(str::to_owned))
        })
    }

    /// Whether the certificate is a CA per BasicConstraints. Absent
    /// extension means not a CA.
    pub fn is_ca(&self) -> Result<bool> {
        let cert = self.parse()?;
        let constraints = cert.basic_constraints().map_err(|e| {
            WebAuthnError::MalformedInput(format!("invalid BasicConstraints: {e}"))
        })?;
        Ok(constraints.map(|ext| ext.value.ca).unwrap_or(false))
    }

    /// Raw value octets of the extension with the given OID, if present.
    pub fn extension_value(&self, oid: &Oid<'_>) -> Result<Option<Vec<u8>>> {
        let cert = self.parse()?;
        let ext = cert.get_extension_unique(oid).map_err(|e| {
            WebAuthnError::MalformedInput(format!("invalid certificate extensions: {e}"))
        })?;
        Ok(ext.map(|e| e.value.to_vec()))
    }

    /// The AAGUID from the id-fido-gen-ce-aaguid extension, if present.
    /// The extension value is a DER OCTET STRING wrapping the 16 bytes.
    pub fn fido_gen_ce_aaguid(&self) -> Result<Option<ByteArray>> {
        let Some(value) = self.extension_value(&OID_FIDO_GEN_CE_AAGUID)? else {
            return Ok(None);
        };
        let (_, inner) = parse_der_octetstring(&value).map_err(|_| {
            WebAuthnError::MalformedInput(
                "id-fido-gen-ce-aaguid extension is not an octet string".into(),
            )
        })?;
        let aaguid = inner.as_slice().map_err(|_| {
            WebAuthnError::MalformedInput("id-fido-gen-ce-aaguid octet string is empty".into())
        })?;
        Ok(Some(ByteArray::new(aaguid)))
    }

    /// Classify the subject public key.
    pub fn public_key(&self) -> Result<CertificatePublicKey> {
        let cert = self.parse()?;
        let spki = cert.public_key();
        if spki.algorithm.algorithm == OID_EC_PUBLIC_KEY {
            let point = spki.subject_public_key.data.to_vec();
            if ec_parameters_are_p256(&spki.algorithm) {
                Ok(CertificatePublicKey::EcP256 { point })
            } else {
                Ok(CertificatePublicKey::EcOther)
            }
        } else {
            match spki.parsed() {
                Ok(PublicKey::RSA(rsa)) => Ok(CertificatePublicKey::Rsa {
                    n: rsa.modulus.to_vec(),
                    e: rsa.exponent.to_vec(),
                }),
                _ => Ok(CertificatePublicKey::Other),
            }
        }
    }

    /// Whether subject and issuer are the same DN and the certificate's
    /// signature verifies under its own public key.
    pub fn is_self_signed(&self) -> Result<bool> {
        let cert = self.parse()?;
        if cert.subject().as_raw() != cert.issuer().as_raw() {
            return Ok(false);
        }
        let tbs = cert.tbs_certificate.as_ref();
        let signature = cert.signature_value.data.as_ref();
        let algorithm = &cert.signature_algorithm.algorithm;

        if *algorithm == OID_ECDSA_WITH_SHA256 {
            match self.public_key()? {
                CertificatePublicKey::EcP256 { point } => {
                    Ok(crypto::verify_ecdsa_p256(&point, tbs, signature))
                }
                _ => Ok(false),
            }
        } else if *algorithm == OID_SHA256_WITH_RSA {
            match self.public_key()? {
                CertificatePublicKey::Rsa { n, e } => {
                    Ok(crypto::verify_rsa_pkcs1_sha256(&n, &e, tbs, signature))
                }
                _ => Ok(false),
            }
        } else {
            Ok(false)
        }
    }
}

/// Whether the SPKI algorithm parameters name (or spell out) P-256.
///
/// A named curve is the common case; explicit `ECParameters` are compared
/// against the P-256 order, generator and cofactor, which also rules out
/// secp256k1 re-encodings.
fn ec_parameters_are_p256(algorithm: &AlgorithmIdentifier<'_>) -> bool {
    let Some(params) = algorithm.parameters.as_ref() else {
        return false;
    };
    if let Ok(oid) = params.as_oid() {
        return oid == OID_PRIME256V1;
    }
    explicit_parameters_are_p256(params.data).unwrap_or(false)
}

/// ECParameters ::= SEQUENCE { version, fieldID, curve, base, order, cofactor? }
fn explicit_parameters_are_p256(content: &[u8]) -> Option<bool> {
    let (rest, _version) = parse_der_integer(content).ok()?;
    let (rest, _field_id) = parse_der_sequence(rest).ok()?;
    let (rest, _curve) = parse_der_sequence(rest).ok()?;
    let (rest, base) = parse_der_octetstring(rest).ok()?;
    let (rest, order) = parse_der_integer(rest).ok()?;

    let generator = base.as_slice().ok()?;
    let order_bytes = order.as_slice().ok()?;
    let order_bytes = match order_bytes.split_first() {
        Some((0, tail)) => tail,
        _ => order_bytes,
    };

    let cofactor_is_one = match parse_der_integer(rest) {
        Ok((_, cofactor)) => cofactor.as_slice().ok()? == [1],
        // Cofactor is optional; P-256's is 1, so absence is acceptable.
        Err(_) => true,
    };

    Some(generator == P256_GENERATOR && order_bytes == P256_ORDER && cofactor_is_one)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_garbage_der() {
        assert!(matches!(
            Certificate::from_der(&[0x30, 0x03, 0x01, 0x01, 0xff]),
            Err(WebAuthnError::MalformedInput(_))
        ));
    }

    #[test]
    fn explicit_p256_parameters_accepted() {
        // SEQUENCE { version 1, fieldID {}, curve {}, base, order, cofactor 1 }
        // with empty fieldID/curve sequences; only the compared fields matter.
        let mut content = Vec::new();
        content.extend_from_slice(&[0x02, 0x01, 0x01]); // version
        content.extend_from_slice(&[0x30, 0x00]); // fieldID
        content.extend_from_slice(&[0x30, 0x00]); // curve
        content.push(0x04);
        content.push(P256_GENERATOR.len() as u8);
        content.extend_from_slice(&P256_GENERATOR);
        content.extend_from_slice(&[0x02, 0x21, 0x00]); // order, padded
        content.extend_from_slice(&P256_ORDER);
        content.extend_from_slice(&[0x02, 0x01, 0x01]); // cofactor
        assert_eq!(explicit_parameters_are_p256(&content), Some(true));

        // secp256k1 order differs.
        let mut bogus = content.clone();
        let order_offset = content.len() - 3 - 32;
        bogus[order_offset] ^= 0x01;
        assert_eq!(explicit_parameters_are_p256(&bogus), Some(false));
    }
}
