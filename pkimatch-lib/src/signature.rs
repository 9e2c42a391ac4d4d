//! Signature verification of an issued certificate against an issuer key.
//!
//! PKCS#1 v1.5, ECDSA and Ed25519 go through x509-parser's verifier. RSA-PSS
//! carries its hash in the algorithm parameters, so it is dispatched to ring
//! here after reading them.

use crate::oid;
use ring::signature::{self, UnparsedPublicKey, VerificationAlgorithm};
use x509_parser::error::X509Error;
use x509_parser::prelude::*;
use x509_parser::signature_algorithm::SignatureAlgorithm;

/// Verify that `issued` was signed by the private key matching `issuer_key`,
/// using the signature algorithm declared in `issued`.
pub(crate) fn check_signature(
    issued: &X509Certificate<'_>,
    issuer_key: &SubjectPublicKeyInfo<'_>,
) -> Result<(), X509Error> {
    if issued.signature_algorithm.algorithm.to_id_string() == oid::RSASSA_PSS {
        return verify_rsa_pss(issued, issuer_key);
    }
    issued.verify_signature(Some(issuer_key))
}

fn verify_rsa_pss(
    issued: &X509Certificate<'_>,
    issuer_key: &SubjectPublicKeyInfo<'_>,
) -> Result<(), X509Error> {
    let algorithm = SignatureAlgorithm::try_from(&issued.signature_algorithm)
        .map_err(|_| X509Error::SignatureUnsupportedAlgorithm)?;
    let SignatureAlgorithm::RSASSA_PSS(params) = algorithm else {
        return Err(X509Error::SignatureUnsupportedAlgorithm);
    };

    // ring fixes the salt length to the digest length, which is what every
    // mainstream CA emits.
    let verification: &'static dyn VerificationAlgorithm =
        match params.hash_algorithm_oid().to_id_string().as_str() {
            oid::SHA256 => &signature::RSA_PSS_2048_8192_SHA256,
            oid::SHA384 => &signature::RSA_PSS_2048_8192_SHA384,
            oid::SHA512 => &signature::RSA_PSS_2048_8192_SHA512,
            _ => return Err(X509Error::SignatureUnsupportedAlgorithm),
        };

    let key = UnparsedPublicKey::new(verification, &issuer_key.subject_public_key.data);
    key.verify(
        issued.tbs_certificate.as_ref(),
        &issued.signature_value.data,
    )
    .map_err(|_| X509Error::SignatureVerificationError)
}
