// src/cert_parser.rs
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use x509_parser::extensions::ParsedExtension;
use x509_parser::prelude::*;

/// Owned summary of a logged certificate, extracted at decode time so it can
/// be moved across the match-event channel.
#[derive(Debug, Clone)]
pub struct CertInfo {
    pub subject: String,
    pub common_name: String,
    pub issuer: String,
    pub dns_names: Vec<String>,
    pub not_before: DateTime<Utc>,
    pub not_after: DateTime<Utc>,
    /// Serial number in decimal, the dedup key
    pub serial: String,
    /// Serial number in uppercase hexadecimal, for the notification text
    pub serial_hex: String,
}

/// Decoder for RFC 6962 Merkle tree leaves
pub struct LeafDecoder;

impl LeafDecoder {
    /// Decode a (leaf_input, extra_data) pair at the given absolute log index
    /// into a certificate summary. Handles both x509_entry (certificate in
    /// the leaf) and precert_entry (real DER at the head of extra_data).
    pub fn decode(
        base64_leaf_input: &str,
        base64_extra_data: &str,
        index: i64,
    ) -> Result<CertInfo> {
        use base64::Engine;

        let leaf_bytes = base64::engine::general_purpose::STANDARD
            .decode(base64_leaf_input)
            .with_context(|| format!("Failed to decode base64 leaf_input at index {}", index))?;

        if leaf_bytes.len() < 12 {
            anyhow::bail!(
                "Leaf input too short at index {}: {} bytes",
                index,
                leaf_bytes.len()
            );
        }

        // MerkleTreeLeaf: version(1) leaf_type(1) timestamp(8) entry_type(2)
        let entry_type = ((leaf_bytes[10] as u16) << 8) | (leaf_bytes[11] as u16);

        match entry_type {
            0 => {
                // x509_entry: 3-byte length followed by the certificate DER
                if leaf_bytes.len() < 15 {
                    anyhow::bail!("x509_entry too short at index {}", index);
                }

                let cert_len = ((leaf_bytes[12] as usize) << 16)
                    | ((leaf_bytes[13] as usize) << 8)
                    | (leaf_bytes[14] as usize);

                let end_pos = std::cmp::min(15 + cert_len, leaf_bytes.len());
                let cert_der = &leaf_bytes[15..end_pos];

                Self::parse_der(cert_der)
            }
            1 => {
                // precert_entry: the leaf holds only the TBS certificate; the
                // full precertificate DER leads the extra_data chain.
                let extra_bytes = base64::engine::general_purpose::STANDARD
                    .decode(base64_extra_data)
                    .with_context(|| {
                        format!("Failed to decode base64 extra_data at index {}", index)
                    })?;

                if extra_bytes.len() < 3 {
                    anyhow::bail!("extra_data too short for precert_entry at index {}", index);
                }

                let precert_len = ((extra_bytes[0] as usize) << 16)
                    | ((extra_bytes[1] as usize) << 8)
                    | (extra_bytes[2] as usize);

                if extra_bytes.len() < 3 + precert_len {
                    anyhow::bail!(
                        "extra_data truncated at index {}: expected {} bytes",
                        index,
                        3 + precert_len
                    );
                }

                let precert_der = &extra_bytes[3..3 + precert_len];

                Self::parse_der(precert_der)
            }
            other => {
                anyhow::bail!("Unknown entry type {} at index {}", other, index);
            }
        }
    }

    /// Parse DER certificate bytes into an owned summary.
    fn parse_der(der_bytes: &[u8]) -> Result<CertInfo> {
        let (_, cert) = X509Certificate::from_der(der_bytes)
            .map_err(|e| anyhow::anyhow!("Failed to parse X.509 certificate: {:?}", e))?;

        let mut dns_names = Vec::new();

        for ext in cert.extensions() {
            if let ParsedExtension::SubjectAlternativeName(san) = ext.parsed_extension() {
                for general_name in &san.general_names {
                    if let GeneralName::DNSName(dns_name) = general_name {
                        dns_names.push(dns_name.to_string());
                    }
                }
            }
        }

        let serial = &cert.tbs_certificate.serial;

        Ok(CertInfo {
            subject: cert.subject().to_string(),
            common_name: Self::extract_cn(&cert).unwrap_or_default(),
            issuer: cert.issuer().to_string(),
            dns_names,
            not_before: timestamp_to_utc(cert.validity().not_before.timestamp()),
            not_after: timestamp_to_utc(cert.validity().not_after.timestamp()),
            serial: serial.to_string(),
            serial_hex: format!("{:X}", serial),
        })
    }

    /// Extract the Common Name from the certificate subject
    fn extract_cn(cert: &X509Certificate) -> Option<String> {
        for rdn in cert.subject().iter() {
            for attr in rdn.iter() {
                if attr.attr_type() == &oid_registry::OID_X509_COMMON_NAME {
                    if let Ok(cn) = attr.attr_value().as_str() {
                        return Some(cn.to_string());
                    }
                }
            }
        }
        None
    }
}

fn timestamp_to_utc(ts: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(ts, 0).unwrap_or(DateTime::UNIX_EPOCH)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_invalid_base64() {
        assert!(LeafDecoder::decode("not-base64!!", "", 0).is_err());
    }

    #[test]
    fn test_decode_leaf_too_short() {
        use base64::Engine;
        let short_input = base64::engine::general_purpose::STANDARD.encode(b"short");
        assert!(LeafDecoder::decode(&short_input, "", 7).is_err());
    }

    #[test]
    fn test_decode_unknown_entry_type() {
        use base64::Engine;
        let mut leaf = vec![0u8; 12];
        leaf[10] = 0;
        leaf[11] = 9; // entry type 9 does not exist
        let encoded = base64::engine::general_purpose::STANDARD.encode(&leaf);
        let err = LeafDecoder::decode(&encoded, "", 42).unwrap_err();
        assert!(err.to_string().contains("Unknown entry type"));
    }

    #[test]
    fn test_decode_precert_truncated_extra_data() {
        use base64::Engine;
        let mut leaf = vec![0u8; 12];
        leaf[11] = 1; // precert_entry
        let encoded_leaf = base64::engine::general_purpose::STANDARD.encode(&leaf);

        // Claims 1000 bytes of precert but carries none
        let extra = vec![0u8, 3, 0xe8];
        let encoded_extra = base64::engine::general_purpose::STANDARD.encode(&extra);

        assert!(LeafDecoder::decode(&encoded_leaf, &encoded_extra, 0).is_err());
    }
}
