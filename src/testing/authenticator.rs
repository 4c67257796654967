//! A software authenticator producing real, verifiable responses.
//!
//! Backed by `ring` key pairs, so every signature and certificate the
//! simulator emits actually verifies; tests tamper with the outputs to
//! produce the failing cases.

use ciborium::value::Value;

use ring::rand::{SecureRandom, SystemRandom};
use ring::signature::{EcdsaKeyPair, KeyPair, ECDSA_P256_SHA256_ASN1_SIGNING};

use crate::bytes::ByteArray;
use crate::crypto::{der_tagged, sha256};
use crate::repository::RegisteredCredential;

// DER-encoded OIDs used in the attestation certificate.
const OID_COUNTRY: &[u8] = &[0x55, 0x04, 0x06];
const OID_ORGANIZATION: &[u8] = &[0x55, 0x04, 0x0a];
const OID_ORGANIZATIONAL_UNIT: &[u8] = &[0x55, 0x04, 0x0b];
const OID_COMMON_NAME: &[u8] = &[0x55, 0x04, 0x03];
const OID_EC_PUBLIC_KEY: &[u8] = &[0x2a, 0x86, 0x48, 0xce, 0x3d, 0x02, 0x01];
const OID_PRIME256V1: &[u8] = &[0x2a, 0x86, 0x48, 0xce, 0x3d, 0x03, 0x01, 0x07];
const OID_SECP256K1: &[u8] = &[0x2b, 0x81, 0x04, 0x00, 0x0a];
const OID_ECDSA_WITH_SHA256: &[u8] = &[0x2a, 0x86, 0x48, 0xce, 0x3d, 0x04, 0x03, 0x02];
const OID_BASIC_CONSTRAINTS: &[u8] = &[0x55, 0x1d, 0x13];
const OID_FIDO_GEN_CE_AAGUID: &[u8] = &[
    0x2b, 0x06, 0x01, 0x04, 0x01, 0x82, 0xe5, 0x1c, 0x01, 0x01, 0x04,
];

fn generate_key_pair(rng: &SystemRandom) -> EcdsaKeyPair {
    let pkcs8 = EcdsaKeyPair::generate_pkcs8(&ECDSA_P256_SHA256_ASN1_SIGNING, rng)
        .expect("P-256 key generation");
    import_key_pair(pkcs8.as_ref(), rng)
}

fn import_key_pair(pkcs8: &[u8], rng: &SystemRandom) -> EcdsaKeyPair {
    EcdsaKeyPair::from_pkcs8(&ECDSA_P256_SHA256_ASN1_SIGNING, pkcs8, rng)
        .expect("P-256 key import")
}

/// A per-test authenticator holding one P-256 credential key.
pub struct SoftwareAuthenticator {
    rp_id: String,
    key_pair: EcdsaKeyPair,
    pkcs8: Vec<u8>,
    rng: SystemRandom,
    pub aaguid: [u8; 16],
    pub credential_id: Vec<u8>,
}

impl SoftwareAuthenticator {
    #[must_use]
    pub fn new(rp_id: &str) -> Self {
        let rng = SystemRandom::new();
        let pkcs8 = EcdsaKeyPair::generate_pkcs8(&ECDSA_P256_SHA256_ASN1_SIGNING, &rng)
            .expect("P-256 key generation")
            .as_ref()
            .to_vec();
        let key_pair = EcdsaKeyPair::from_pkcs8(&ECDSA_P256_SHA256_ASN1_SIGNING, &pkcs8, &rng)
            .expect("P-256 key import");
        let mut credential_id = vec![0u8; 32];
        rng.fill(&mut credential_id).expect("credential id");
        Self {
            rp_id: rp_id.to_string(),
            key_pair,
            pkcs8,
            rng,
            aaguid: *b"software-authntr",
            credential_id,
        }
    }

    /// PKCS#8 encoding of the credential key, for building a certificate
    /// that shares it.
    #[must_use]
    pub fn pkcs8(&self) -> &[u8] {
        &self.pkcs8
    }

    /// The credential public key as an uncompressed SEC1 point.
    #[must_use]
    pub fn public_key_point(&self) -> Vec<u8> {
        self.key_pair.public_key().as_ref().to_vec()
    }

    /// The credential public key as a COSE_Key map (EC2, ES256, P-256).
    #[must_use]
    pub fn cose_public_key(&self) -> ByteArray {
        let point = self.public_key_point();
        cose_es256_key(&point[1..33], &point[33..65])
    }

    /// Sign with the credential key; ASN.1 DER ECDSA-SHA256 signature.
    #[must_use]
    pub fn sign(&self, message: &[u8]) -> Vec<u8> {
        self.key_pair
            .sign(&self.rng, message)
            .expect("ECDSA signing")
            .as_ref()
            .to_vec()
    }

    /// Sign `authenticatorData || SHA-256(clientDataJSON)` as an
    /// authenticator does for assertions and packed attestation.
    #[must_use]
    pub fn sign_over(&self, auth_data: &[u8], client_data_hash: &ByteArray) -> Vec<u8> {
        let mut message = auth_data.to_vec();
        message.extend_from_slice(client_data_hash.as_bytes());
        self.sign(&message)
    }

    /// Authenticator data with attested credential data (AT set).
    #[must_use]
    pub fn registration_auth_data(&self, counter: u32, user_verified: bool) -> Vec<u8> {
        let mut flags = 0x41; // UP | AT
        if user_verified {
            flags |= 0x04;
        }
        let mut data = self.fixed_auth_data(flags, counter);
        data.extend_from_slice(&self.aaguid);
        data.extend_from_slice(&(self.credential_id.len() as u16).to_be_bytes());
        data.extend_from_slice(&self.credential_id);
        data.extend_from_slice(self.cose_public_key().as_bytes());
        data
    }

    /// Authenticator data without attested credential data.
    #[must_use]
    pub fn assertion_auth_data(&self, counter: u32, user_verified: bool) -> Vec<u8> {
        let mut flags = 0x01; // UP
        if user_verified {
            flags |= 0x04;
        }
        self.fixed_auth_data(flags, counter)
    }

    fn fixed_auth_data(&self, flags: u8, counter: u32) -> Vec<u8> {
        let mut data = sha256(self.rp_id.as_bytes()).as_bytes().to_vec();
        data.push(flags);
        data.extend_from_slice(&counter.to_be_bytes());
        data
    }

    /// Raw `clientDataJSON` bytes for a ceremony.
    #[must_use]
    pub fn client_data(
        &self,
        ceremony_type: &str,
        challenge: &ByteArray,
        origin: &str,
    ) -> Vec<u8> {
        serde_json::to_vec(&serde_json::json!({
            "type": ceremony_type,
            "challenge": challenge.base64url(),
            "origin": origin,
        }))
        .expect("client data JSON")
    }

    /// `clientDataJSON` with a `tokenBinding` declaration.
    #[must_use]
    pub fn client_data_with_token_binding(
        &self,
        ceremony_type: &str,
        challenge: &ByteArray,
        origin: &str,
        status: &str,
        token_binding_id: Option<&ByteArray>,
    ) -> Vec<u8> {
        let mut token_binding = serde_json::json!({ "status": status });
        if let Some(id) = token_binding_id {
            token_binding["id"] = serde_json::Value::String(id.base64url().to_string());
        }
        serde_json::to_vec(&serde_json::json!({
            "type": ceremony_type,
            "challenge": challenge.base64url(),
            "origin": origin,
            "tokenBinding": token_binding,
        }))
        .expect("client data JSON")
    }

    /// The payload a U2F authenticator signs at registration:
    /// `0x00 || rpIdHash || clientDataHash || credentialId || publicKey`.
    #[must_use]
    pub fn u2f_signed_payload(&self, auth_data: &[u8], client_data_hash: &ByteArray) -> Vec<u8> {
        let mut payload = vec![0x00];
        payload.extend_from_slice(&auth_data[..32]);
        payload.extend_from_slice(client_data_hash.as_bytes());
        payload.extend_from_slice(&self.credential_id);
        payload.extend_from_slice(&self.public_key_point());
        payload
    }

    /// The credential as the repository would store it after registration.
    #[must_use]
    pub fn registered_credential(
        &self,
        user_handle: &ByteArray,
        signature_count: u32,
    ) -> RegisteredCredential {
        RegisteredCredential {
            credential_id: ByteArray::new(&self.credential_id),
            user_handle: user_handle.clone(),
            public_key_cose: self.cose_public_key(),
            signature_count,
        }
    }
}

/// Encode a COSE_Key EC2/ES256 map from affine coordinates.
#[must_use]
pub fn cose_es256_key(x: &[u8], y: &[u8]) -> ByteArray {
    encode_cbor(&Value::Map(vec![
        (Value::Integer(1.into()), Value::Integer(2.into())),
        (Value::Integer(3.into()), Value::Integer((-7).into())),
        (Value::Integer((-1).into()), Value::Integer(1.into())),
        (Value::Integer((-2).into()), Value::Bytes(x.to_vec())),
        (Value::Integer((-3).into()), Value::Bytes(y.to_vec())),
    ]))
}

/// Assemble a `none` attestation object.
#[must_use]
pub fn none_attestation_object(auth_data: &[u8]) -> ByteArray {
    attestation_object("none", auth_data, Value::Map(vec![]))
}

/// Assemble a `packed` attestation object without `x5c` (self attestation).
#[must_use]
pub fn packed_self_attestation_object(auth_data: &[u8], alg: i64, signature: &[u8]) -> ByteArray {
    attestation_object(
        "packed",
        auth_data,
        Value::Map(vec![
            (Value::Text("alg".into()), Value::Integer(alg.into())),
            (Value::Text("sig".into()), Value::Bytes(signature.to_vec())),
        ]),
    )
}

/// Assemble a `packed` attestation object with an `x5c` chain.
#[must_use]
pub fn packed_basic_attestation_object(
    auth_data: &[u8],
    alg: i64,
    signature: &[u8],
    x5c: &[&ByteArray],
) -> ByteArray {
    attestation_object(
        "packed",
        auth_data,
        Value::Map(vec![
            (Value::Text("alg".into()), Value::Integer(alg.into())),
            (Value::Text("sig".into()), Value::Bytes(signature.to_vec())),
            (Value::Text("x5c".into()), x5c_value(x5c)),
        ]),
    )
}

/// Assemble a `fido-u2f` attestation object.
#[must_use]
pub fn fido_u2f_attestation_object(
    auth_data: &[u8],
    signature: &[u8],
    x5c: &[&ByteArray],
) -> ByteArray {
    attestation_object(
        "fido-u2f",
        auth_data,
        Value::Map(vec![
            (Value::Text("sig".into()), Value::Bytes(signature.to_vec())),
            (Value::Text("x5c".into()), x5c_value(x5c)),
        ]),
    )
}

/// Assemble an attestation object with an arbitrary format string.
#[must_use]
pub fn attestation_object(format: &str, auth_data: &[u8], att_stmt: Value) -> ByteArray {
    encode_cbor(&Value::Map(vec![
        (Value::Text("fmt".into()), Value::Text(format.to_string())),
        (
            Value::Text("authData".into()),
            Value::Bytes(auth_data.to_vec()),
        ),
        (Value::Text("attStmt".into()), att_stmt),
    ]))
}

fn x5c_value(certificates: &[&ByteArray]) -> Value {
    Value::Array(
        certificates
            .iter()
            .map(|der| Value::Bytes(der.as_bytes().to_vec()))
            .collect(),
    )
}

fn encode_cbor(value: &Value) -> ByteArray {
    let mut buf = Vec::new();
    ciborium::into_writer(value, &mut buf).expect("CBOR encoding");
    ByteArray::from(buf)
}

/// A self-signed attestation certificate with its signing key.
pub struct AttestationCertificate {
    der: ByteArray,
    key_pair: EcdsaKeyPair,
    rng: SystemRandom,
}

impl AttestationCertificate {
    /// The DER encoding, as carried in `x5c`.
    #[must_use]
    pub fn der(&self) -> &ByteArray {
        &self.der
    }

    /// The certificate public key as an uncompressed SEC1 point.
    #[must_use]
    pub fn public_key_point(&self) -> Vec<u8> {
        self.key_pair.public_key().as_ref().to_vec()
    }

    /// Sign with the attestation key.
    #[must_use]
    pub fn sign(&self, message: &[u8]) -> Vec<u8> {
        self.key_pair
            .sign(&self.rng, message)
            .expect("ECDSA signing")
            .as_ref()
            .to_vec()
    }
}

/// Builds minimal self-signed v3 attestation certificates, defaulting to
/// the subject the packed format requires.
pub struct AttestationCertificateBuilder {
    country: String,
    organization: String,
    organizational_unit: String,
    common_name: String,
    ca: bool,
    version_v1: bool,
    curve_oid: &'static [u8],
    aaguid_extension: Option<[u8; 16]>,
    pkcs8: Option<Vec<u8>>,
}

impl Default for AttestationCertificateBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl AttestationCertificateBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self {
            country: "SE".to_string(),
            organization: "Example Vendor AB".to_string(),
            organizational_unit: "Authenticator Attestation".to_string(),
            common_name: "Example Attestation".to_string(),
            ca: false,
            version_v1: false,
            curve_oid: OID_PRIME256V1,
            aaguid_extension: None,
            pkcs8: None,
        }
    }

    #[must_use]
    pub fn with_country(mut self, country: &str) -> Self {
        self.country = country.to_string();
        self
    }

    #[must_use]
    pub fn with_organization(mut self, organization: &str) -> Self {
        self.organization = organization.to_string();
        self
    }

    #[must_use]
    pub fn with_organizational_unit(mut self, unit: &str) -> Self {
        self.organizational_unit = unit.to_string();
        self
    }

    /// Mark the certificate as a CA via BasicConstraints.
    #[must_use]
    pub fn with_ca(mut self) -> Self {
        self.ca = true;
        self
    }

    /// Emit a v1 certificate instead of v3.
    #[must_use]
    pub fn with_version_v1(mut self) -> Self {
        self.version_v1 = true;
        self
    }

    /// Declare the key's curve as secp256k1 in the SPKI.
    #[must_use]
    pub fn with_secp256k1_curve(mut self) -> Self {
        self.curve_oid = OID_SECP256K1;
        self
    }

    /// Include the id-fido-gen-ce-aaguid extension with this value.
    #[must_use]
    pub fn with_aaguid_extension(mut self, aaguid: [u8; 16]) -> Self {
        self.aaguid_extension = Some(aaguid);
        self
    }

    /// Use this PKCS#8 key instead of generating a fresh one; used to
    /// make the certificate key equal the credential key.
    #[must_use]
    pub fn with_pkcs8(mut self, pkcs8: &[u8]) -> Self {
        self.pkcs8 = Some(pkcs8.to_vec());
        self
    }

    #[must_use]
    pub fn build(self) -> AttestationCertificate {
        let rng = SystemRandom::new();
        let key_pair = match &self.pkcs8 {
            Some(pkcs8) => import_key_pair(pkcs8, &rng),
            None => generate_key_pair(&rng),
        };
        let tbs = self.tbs_certificate(key_pair.public_key().as_ref());
        let signature = key_pair
            .sign(&rng, &tbs)
            .expect("certificate signing")
            .as_ref()
            .to_vec();

        let mut body = tbs;
        body.extend_from_slice(&der_tagged(
            0x30,
            &der_tagged(0x06, OID_ECDSA_WITH_SHA256),
        ));
        body.extend_from_slice(&bit_string(&signature));
        let der = ByteArray::from(der_tagged(0x30, &body));

        AttestationCertificate { der, key_pair, rng }
    }

    fn tbs_certificate(&self, public_key_point: &[u8]) -> Vec<u8> {
        let mut body = Vec::new();
        if !self.version_v1 {
            // [0] EXPLICIT version: INTEGER 2 means v3.
            body.extend_from_slice(&der_tagged(0xa0, &der_tagged(0x02, &[0x02])));
        }
        body.extend_from_slice(&der_tagged(0x02, &[0x01])); // serial
        body.extend_from_slice(&der_tagged(
            0x30,
            &der_tagged(0x06, OID_ECDSA_WITH_SHA256),
        ));
        let name = self.subject_name();
        body.extend_from_slice(&name); // issuer == subject: self-signed
        body.extend_from_slice(&validity());
        body.extend_from_slice(&name);
        body.extend_from_slice(&self.subject_public_key_info(public_key_point));
        if !self.version_v1 {
            body.extend_from_slice(&self.extensions());
        }
        der_tagged(0x30, &body)
    }

    fn subject_name(&self) -> Vec<u8> {
        let mut rdns = Vec::new();
        rdns.extend_from_slice(&rdn(OID_COUNTRY, &self.country));
        rdns.extend_from_slice(&rdn(OID_ORGANIZATION, &self.organization));
        rdns.extend_from_slice(&rdn(OID_ORGANIZATIONAL_UNIT, &self.organizational_unit));
        rdns.extend_from_slice(&rdn(OID_COMMON_NAME, &self.common_name));
        der_tagged(0x30, &rdns)
    }

    fn subject_public_key_info(&self, point: &[u8]) -> Vec<u8> {
        let mut algorithm = der_tagged(0x06, OID_EC_PUBLIC_KEY);
        algorithm.extend_from_slice(&der_tagged(0x06, self.curve_oid));
        let mut body = der_tagged(0x30, &algorithm);
        body.extend_from_slice(&bit_string(point));
        der_tagged(0x30, &body)
    }

    fn extensions(&self) -> Vec<u8> {
        let basic_constraints_value = if self.ca {
            // SEQUENCE { BOOLEAN TRUE }
            der_tagged(0x30, &der_tagged(0x01, &[0xff]))
        } else {
            der_tagged(0x30, &[])
        };
        let mut list = extension(OID_BASIC_CONSTRAINTS, &basic_constraints_value);
        if let Some(aaguid) = &self.aaguid_extension {
            list.extend_from_slice(&extension(
                OID_FIDO_GEN_CE_AAGUID,
                &der_tagged(0x04, aaguid),
            ));
        }
        // [3] EXPLICIT SEQUENCE OF Extension
        der_tagged(0xa3, &der_tagged(0x30, &list))
    }
}

fn rdn(oid: &[u8], value: &str) -> Vec<u8> {
    let mut attribute = der_tagged(0x06, oid);
    attribute.extend_from_slice(&der_tagged(0x0c, value.as_bytes()));
    der_tagged(0x31, &der_tagged(0x30, &attribute))
}

fn validity() -> Vec<u8> {
    let mut body = der_tagged(0x17, b"200101000000Z");
    body.extend_from_slice(&der_tagged(0x17, b"400101000000Z"));
    der_tagged(0x30, &body)
}

fn extension(oid: &[u8], value: &[u8]) -> Vec<u8> {
    let mut body = der_tagged(0x06, oid);
    body.extend_from_slice(&der_tagged(0x04, value));
    der_tagged(0x30, &body)
}

fn bit_string(bytes: &[u8]) -> Vec<u8> {
    let mut body = vec![0x00]; // no unused bits
    body.extend_from_slice(bytes);
    der_tagged(0x03, &body)
}
