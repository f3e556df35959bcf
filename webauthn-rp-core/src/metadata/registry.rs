//! Registry construction and the pinned-root JWS chain check for the MDS
//! blob, [MODULE C7] parts 1, 3 and 4.

use std::collections::HashMap;

use openssl::asn1::Asn1Time;
use openssl::x509;

use crate::error::{WebauthnError, WebauthnResult};
use crate::metadata::jws::verify_compact_jws;
use crate::metadata::{
    decode_entry, DecodeOutcome, MetadataBLOBPayload, MetadataBLOBPayloadEntry, MetadataDecodeOptions,
    MetadataEntry,
};
use crate::proto::credential::AuthenticatorIdentifier;

/// An immutable identifier → entry mapping. Built once per fetch cycle
/// and replaced atomically by the caller - this type itself has no
/// interior mutability.
#[derive(Debug, Clone, Default)]
pub struct MetadataRegistry {
    entries: HashMap<AuthenticatorIdentifier, MetadataEntry>,
}

impl MetadataRegistry {
    /// Build a registry from decoded entries. Duplicate identifier keys
    /// are last-writer-wins, logged at `warn!` - the external contract
    /// is "at most one entry per identifier".
    pub fn build(entries: Vec<MetadataEntry>) -> Self {
        let mut map = HashMap::with_capacity(entries.len());
        for entry in entries {
            if map.insert(entry.identifier, entry).is_some() {
                warn!("duplicate metadata entry for the same authenticator identifier; keeping the later one");
            }
        }
        MetadataRegistry { entries: map }
    }

    /// Total lookup: returns `None` for unknown identifiers rather than
    /// erroring.
    pub fn lookup(&self, identifier: &AuthenticatorIdentifier) -> Option<&MetadataEntry> {
        self.entries.get(identifier)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// The three-state outcome of processing an MDS payload's entries:
/// some/all/none decoded successfully.
pub enum ProcessingResult {
    /// Entries existed but every one failed to decode.
    This(Vec<WebauthnError>),
    /// All entries decoded cleanly.
    That(MetadataRegistry),
    /// Partial success - the registry holds the entries that decoded.
    These(Vec<WebauthnError>, MetadataRegistry),
}

/// Apply [MODULE C6] to every entry in a decoded payload and fold the
/// results into a [`ProcessingResult`].
pub fn process_entries(payload: &MetadataBLOBPayload, opts: MetadataDecodeOptions) -> ProcessingResult {
    let mut ok_entries = Vec::new();
    let mut errors = Vec::new();

    for entry in &payload.entries {
        match decode_entry(entry, opts) {
            DecodeOutcome::Ok(mut decoded) => ok_entries.append(&mut decoded),
            DecodeOutcome::Skip => {}
            DecodeOutcome::Err(e) => errors.push(e),
        }
    }

    let registry = MetadataRegistry::build(ok_entries);

    if payload.entries.is_empty() {
        return ProcessingResult::That(registry);
    }
    match (errors.is_empty(), registry.is_empty()) {
        (true, _) => ProcessingResult::That(registry),
        (false, true) => ProcessingResult::This(errors),
        (false, false) => ProcessingResult::These(errors, registry),
    }
}

/// Verify the JWS signing chain is rooted at `pinned_root_der` and that
/// the leaf's subject common name matches `expected_cn`
/// (`mds.fidoalliance.org` in production). Certificate validity is
/// checked against `now_unix` (seconds since epoch) rather than a wall
/// clock read internally, per the "time as an input" design note.
fn verify_mds_chain(
    chain: &[x509::X509],
    pinned_root_der: &[u8],
    expected_cn: &str,
    now_unix: i64,
) -> WebauthnResult<()> {
    if chain.is_empty() {
        return Err(WebauthnError::MdsCertificateChainInvalid);
    }
    let now = Asn1Time::from_unix(now_unix).map_err(WebauthnError::OpenSSLError)?;

    for cert in chain {
        if cert.not_before().compare(&now).map_err(WebauthnError::OpenSSLError)? == std::cmp::Ordering::Greater
            || cert.not_after().compare(&now).map_err(WebauthnError::OpenSSLError)? == std::cmp::Ordering::Less
        {
            return Err(WebauthnError::MdsCertificateChainInvalid);
        }
    }

    let leaf = &chain[0];
    let leaf_der_parsed = leaf.to_der().map_err(WebauthnError::OpenSSLError)?;
    let (_, leaf_parsed) = x509_parser::parse_x509_certificate(&leaf_der_parsed)
        .map_err(|_| WebauthnError::MdsCertificateChainInvalid)?;
    let cn = leaf_parsed
        .subject()
        .iter_common_name()
        .next()
        .and_then(|a| a.attr_value().as_str().ok())
        .unwrap_or_default();
    if cn != expected_cn {
        return Err(WebauthnError::MdsCertificateChainInvalid);
    }

    // Each certificate's signature must verify under the next one's
    // public key; the final certificate in the chain must verify under
    // the pinned root.
    let root = x509::X509::from_der(pinned_root_der).map_err(WebauthnError::OpenSSLError)?;
    let mut issuers: Vec<&x509::X509> = chain.iter().skip(1).collect();
    issuers.push(&root);

    for (cert, issuer) in chain.iter().zip(issuers.iter()) {
        let issuer_pkey = issuer.public_key().map_err(WebauthnError::OpenSSLError)?;
        let verified = cert.verify(&issuer_pkey).map_err(WebauthnError::OpenSSLError)?;
        if !verified {
            return Err(WebauthnError::MdsCertificateChainInvalid);
        }
    }

    Ok(())
}

/// Verify and decode a full MDS blob: JWS signature rooted at the pinned
/// FIDO Alliance root, JSON payload parse, then [`process_entries`].
pub fn process_mds_blob(
    jws: &str,
    pinned_root_der: &[u8],
    expected_cn: &str,
    now_unix: i64,
    opts: MetadataDecodeOptions,
) -> WebauthnResult<(ProcessingResult, String)> {
    let verified = verify_compact_jws(jws)?;
    verify_mds_chain(&verified.chain, pinned_root_der, expected_cn, now_unix)?;

    let payload: MetadataBLOBPayload = serde_json::from_slice(&verified.payload).map_err(|e| {
        debug!(error = %e, "MDS payload schema mismatch");
        WebauthnError::PayloadSchemaMismatch
    })?;

    let next_update = payload.next_update.clone();
    Ok((process_entries(&payload, opts), next_update))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::{AuthenticatorAttestationType, MetadataStatementOnWire, StatusReport};

    fn statement(schema: u32, aaguid: &str) -> MetadataStatementOnWire {
        MetadataStatementOnWire {
            schema,
            aaguid: Some(aaguid.into()),
            attestation_certificate_key_identifiers: vec![],
            description: "test".into(),
            attestation_types: vec!["basic_full".into()],
            attestation_root_certificates: vec![],
        }
    }

    #[test]
    fn mixed_payload_processes_as_these_with_errors_and_a_partial_registry() {
        let payload = MetadataBLOBPayload {
            legal_header: None,
            no: 1,
            next_update: "2030-01-01".into(),
            entries: vec![
                MetadataBLOBPayloadEntry {
                    metadata_statement: Some(statement(3, "00000000-0000-0000-0000-000000000001")),
                    status_reports: vec![],
                },
                MetadataBLOBPayloadEntry {
                    // unsupported schema version - fails to decode
                    metadata_statement: Some(statement(2, "00000000-0000-0000-0000-000000000002")),
                    status_reports: vec![],
                },
            ],
        };

        match process_entries(&payload, MetadataDecodeOptions::default()) {
            ProcessingResult::These(errors, registry) => {
                assert_eq!(errors.len(), 1);
                assert_eq!(registry.len(), 1);
            }
            ProcessingResult::This(_) => panic!("expected These, got This"),
            ProcessingResult::That(_) => panic!("expected These, got That"),
        }
    }

    #[test]
    fn empty_payload_processes_as_that() {
        let payload = MetadataBLOBPayload {
            legal_header: None,
            no: 1,
            next_update: "2030-01-01".into(),
            entries: vec![],
        };
        match process_entries(&payload, MetadataDecodeOptions::default()) {
            ProcessingResult::That(r) => assert!(r.is_empty()),
            _ => panic!("expected That"),
        }
    }

    #[test]
    fn registry_last_writer_wins_on_duplicate_identifier() {
        let id = AuthenticatorIdentifier::Aaguid([1u8; 16]);
        let first = MetadataEntry {
            identifier: id,
            attestation_root_certificates: vec![],
            description: "first".into(),
            attestation_types: vec![AuthenticatorAttestationType::BasicFull],
            status_reports: vec![StatusReport {
                status: "FIDO_CERTIFIED".into(),
                effective_date: None,
            }],
        };
        let second = MetadataEntry {
            description: "second".into(),
            ..first.clone()
        };
        let registry = MetadataRegistry::build(vec![first, second]);
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.lookup(&id).unwrap().description, "second");
    }
}
