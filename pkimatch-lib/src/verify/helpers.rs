//! Small helper functions for path validation.

use crate::oid;
use crate::util;
use x509_parser::prelude::*;

/// Check if a certificate is self-issued (subject == issuer).
pub(crate) fn is_self_issued(cert: &X509Certificate) -> bool {
    cert.subject().as_raw() == cert.issuer().as_raw()
}

/// Extract the Common Name from the certificate subject.
pub(crate) fn extract_cn(cert: &X509Certificate) -> Option<String> {
    first_attribute(cert, oid::COMMON_NAME)
}

fn first_attribute(cert: &X509Certificate, attr_oid: &str) -> Option<String> {
    for rdn in cert.subject().iter() {
        for attr in rdn.iter() {
            if attr.attr_type().to_id_string() == attr_oid {
                if let Ok(val) = attr.as_str() {
                    return Some(val.to_string());
                }
            }
        }
    }
    None
}

/// Extract a short human-readable identifier from a certificate.
///
/// Tries in order: CN, O, OU. Falls back to "Unknown".
pub(crate) fn extract_short_name(cert: &X509Certificate) -> String {
    extract_cn(cert)
        .or_else(|| first_attribute(cert, oid::ORGANIZATION))
        .or_else(|| first_attribute(cert, oid::ORGANIZATIONAL_UNIT))
        .unwrap_or_else(|| "Unknown".to_string())
}

/// Serial number as a colon-separated hex string.
pub(crate) fn extract_serial_hex(cert: &X509Certificate) -> String {
    util::hex_colon_upper(&cert.serial.to_bytes_be())
}

/// Check if an extension OID is one path validation understands.
///
/// RFC 5280 Section 4.2: certificates carrying an unrecognized critical
/// extension must be rejected.
pub(crate) fn is_known_extension(oid: &str) -> bool {
    matches!(
        oid,
        oid::EXT_SUBJECT_KEY_ID
            | oid::EXT_KEY_USAGE
            | oid::EXT_SUBJECT_ALT_NAME
            | oid::EXT_ISSUER_ALT_NAME
            | oid::EXT_BASIC_CONSTRAINTS
            | oid::EXT_NAME_CONSTRAINTS
            | oid::EXT_CRL_DISTRIBUTION_POINTS
            | oid::EXT_CERTIFICATE_POLICIES
            | oid::EXT_POLICY_MAPPINGS
            | oid::EXT_AUTHORITY_KEY_ID
            | oid::EXT_POLICY_CONSTRAINTS
            | oid::EXT_EXTENDED_KEY_USAGE
            | oid::EXT_INHIBIT_ANY_POLICY
            | oid::EXT_AUTHORITY_INFO_ACCESS
            | oid::EXT_SUBJECT_INFO_ACCESS
    )
}
