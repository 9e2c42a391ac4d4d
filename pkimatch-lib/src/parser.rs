//! PEM decoding of certificates returned by the store.

use crate::PkiMatchError;
use x509_parser::prelude::*;

/// Parse a PEM buffer containing one or more certificates into individual
/// DER-encoded certificates, in order.
///
/// Every block must decode to a well-formed X.509 certificate. Trailing
/// garbage after at least one good block is ignored.
pub fn parse_pem_chain(input: &[u8]) -> Result<Vec<Vec<u8>>, PkiMatchError> {
    let mut certs = Vec::new();

    for pem_result in Pem::iter_from_buffer(input) {
        match pem_result {
            Ok(pem) => {
                if pem.label == "CERTIFICATE" || pem.label == "TRUSTED CERTIFICATE" {
                    check_der(&pem.contents)?;
                    certs.push(pem.contents);
                }
            }
            Err(e) => {
                if !certs.is_empty() {
                    break;
                }
                return Err(PkiMatchError::PemError(format!("failed to parse PEM: {}", e)));
            }
        }
    }

    if certs.is_empty() {
        return Err(PkiMatchError::PemError(
            "no certificates found in PEM input".into(),
        ));
    }

    Ok(certs)
}

/// Parse a PEM string and return the DER of its first certificate.
pub fn parse_certificate_pem(input: &str) -> Result<Vec<u8>, PkiMatchError> {
    parse_pem_chain(input.as_bytes())?
        .into_iter()
        .next()
        .ok_or_else(|| PkiMatchError::PemError("no certificates found in PEM input".into()))
}

/// Parse DER bytes as a certificate, mapping failures to [`PkiMatchError::DerError`].
pub(crate) fn parse_x509(der: &[u8]) -> Result<X509Certificate<'_>, PkiMatchError> {
    let (_, x509) =
        X509Certificate::from_der(der).map_err(|e| PkiMatchError::DerError(format!("{}", e)))?;
    Ok(x509)
}

fn check_der(der: &[u8]) -> Result<(), PkiMatchError> {
    parse_x509(der).map(|_| ())
}
