//! Archive assembly - the top-level orchestrator.
//!
//! For each case it resolves the best-available signature, generates the
//! legal letter and the supplementary info sheet as PDF and Word, fetches
//! the uploaded evidence files, and packs everything into one deterministic
//! zip layout. Any single entry that cannot be produced becomes a short
//! textual stand-in; only a failure to finalize the container itself
//! surfaces as a request failure.

use std::collections::HashSet;
use std::io::{Cursor, Write};
use std::sync::Arc;

use chrono::{Local, Utc};
use futures::future::join_all;
use log::{info, warn};
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::docgen::common::{short_ref, slugify};
use crate::docgen::pdf::{DocumentInfo, PdfRenderRequest, PdfRenderer};
use crate::docgen::signature::{self, DecodedSignature};
use crate::docgen::template;
use crate::docgen::word::WordRenderer;
use crate::docgen::{validate_request, ValidationErrors};
use crate::storage::{fetch_with_timeout, EvidenceStorage, EVIDENCE_FETCH_TIMEOUT};
use crate::store::{best_signature, CaseRecord, CaseStore, ClientRecord, StoreError};

pub const ZIP_MIME: &str = "application/zip";

#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("invalid generation request: {0}")]
    InputInvalid(ValidationErrors),
    #[error("failed to finalize archive container: {0}")]
    Container(String),
}

/// One realized archive entry: a name inside the zip and its bytes.
#[derive(Debug, Clone)]
pub struct ArchiveEntry {
    pub name: String,
    pub bytes: Vec<u8>,
}

/// A finished archive ready to stream back to the caller.
#[derive(Debug)]
pub struct AssembledArchive {
    pub filename: String,
    pub bytes: Vec<u8>,
    pub mime_type: &'static str,
}

#[derive(Debug, Serialize)]
struct CaseManifest {
    case_id: Uuid,
    client_id: Uuid,
    client_name: String,
    generated_at: String,
    signature_embedded: bool,
    entries: Vec<String>,
    failures: Vec<String>,
}

#[derive(Debug, Serialize)]
struct ClientManifest {
    client_id: Uuid,
    client_name: String,
    case_ids: Vec<Uuid>,
    generated_at: String,
    failures: Vec<String>,
}

struct CaseBundle {
    entries: Vec<ArchiveEntry>,
    failures: Vec<String>,
}

pub struct ArchiveAssembler {
    store: Arc<dyn CaseStore>,
    evidence: Arc<dyn EvidenceStorage>,
}

impl ArchiveAssembler {
    pub fn new(store: Arc<dyn CaseStore>, evidence: Arc<dyn EvidenceStorage>) -> Self {
        Self { store, evidence }
    }

    /// Assemble the archive of one case.
    pub async fn assemble_case(&self, case_id: Uuid) -> Result<AssembledArchive, ArchiveError> {
        let case = self.store.get_case(case_id).await?;
        let client = self.store.get_client(case.client_id).await.ok();
        validate_request(&case.request).map_err(ArchiveError::InputInvalid)?;

        let bundle = self.case_bundle(&case, client.as_ref(), "").await?;
        info!(
            "assembled case {} archive: {} entries, {} failure(s)",
            case_id,
            bundle.entries.len(),
            bundle.failures.len()
        );

        let bytes = write_zip(&bundle.entries)?;
        Ok(AssembledArchive {
            filename: format!(
                "dossier-{}-{}.zip",
                short_ref(case_id),
                Local::now().format("%Y%m%d")
            ),
            bytes,
            mime_type: ZIP_MIME,
        })
    }

    /// Assemble one archive covering every case of a client, each case
    /// namespaced under its own sub-folder.
    pub async fn assemble_client(
        &self,
        client_id: Uuid,
    ) -> Result<AssembledArchive, ArchiveError> {
        let client = self.store.get_client(client_id).await?;

        let mut cases = Vec::new();
        let mut failures = Vec::new();
        for case_id in &client.case_ids {
            match self.store.get_case(*case_id).await {
                Ok(case) => cases.push(case),
                Err(e) => {
                    warn!("client {} references unavailable case: {}", client_id, e);
                    failures.push(format!("Dossier {} indisponible : {}", case_id, e));
                }
            }
        }

        // Refuse before rendering anything if any case is invalid.
        let mut errors = ValidationErrors::new();
        for case in &cases {
            if let Err(e) = validate_request(&case.request) {
                errors.merge(e);
            }
        }
        errors.into_result().map_err(ArchiveError::InputInvalid)?;

        let bundles = join_all(cases.iter().map(|case| {
            let prefix = format!("dossier-{}/", short_ref(case.request.case_id));
            let client = &client;
            async move { self.case_bundle(case, Some(client), &prefix).await }
        }))
        .await;

        let mut entries = Vec::new();
        for bundle in bundles {
            let bundle = bundle?;
            failures.extend(bundle.failures.clone());
            entries.extend(bundle.entries);
        }

        let manifest = ClientManifest {
            client_id,
            client_name: client.name.clone(),
            case_ids: client.case_ids.clone(),
            generated_at: Utc::now().to_rfc3339(),
            failures,
        };
        entries.push(ArchiveEntry {
            name: "metadata.json".to_string(),
            bytes: serde_json::to_vec_pretty(&manifest)
                .map_err(|e| ArchiveError::Container(e.to_string()))?,
        });

        let bytes = write_zip(&entries)?;
        Ok(AssembledArchive {
            filename: format!(
                "client-{}-{}.zip",
                short_ref(client_id),
                Local::now().format("%Y%m%d")
            ),
            bytes,
            mime_type: ZIP_MIME,
        })
    }

    /// Produce every entry of one case: generated documents, evidence
    /// files, the standalone signature image and the case manifest.
    async fn case_bundle(
        &self,
        case: &CaseRecord,
        client: Option<&ClientRecord>,
        prefix: &str,
    ) -> Result<CaseBundle, ArchiveError> {
        let mut used_names: HashSet<String> = HashSet::new();
        let mut entries: Vec<ArchiveEntry> = Vec::new();
        let mut failures: Vec<String> = Vec::new();

        let decoded = resolve_signature(case, client);
        let marker = template::signature_marker(decoded.as_ref());

        for doc in template::case_documents(&case.request, &marker) {
            let info = DocumentInfo {
                title: doc.title.to_string(),
                author: case.client_name.clone(),
                subject: format!("{} - dossier {}", doc.title, short_ref(case.request.case_id)),
                case_number: short_ref(case.request.case_id),
                client_name: case.client_name.clone(),
            };
            let pdf_request = PdfRenderRequest {
                title: doc.title.to_string(),
                body: doc.body.clone(),
                info,
                signature: decoded.clone(),
            };

            match PdfRenderer::render(&pdf_request) {
                Ok(rendered) => entries.push(ArchiveEntry {
                    name: unique_name(&mut used_names, format!("{}{}", prefix, rendered.filename)),
                    bytes: rendered.bytes,
                }),
                Err(e) => {
                    warn!("PDF render failed for '{}': {}", doc.title, e);
                    failures.push(format!("PDF « {} » : {}", doc.title, e));
                    entries.push(render_stand_in(&mut used_names, prefix, doc.title, "pdf", &e));
                }
            }

            match WordRenderer::render(doc.title, &doc.body, decoded.as_ref()) {
                Ok(rendered) => entries.push(ArchiveEntry {
                    name: unique_name(&mut used_names, format!("{}{}", prefix, rendered.filename)),
                    bytes: rendered.bytes,
                }),
                Err(e) => {
                    warn!("Word render failed for '{}': {}", doc.title, e);
                    failures.push(format!("Word « {} » : {}", doc.title, e));
                    entries.push(render_stand_in(&mut used_names, prefix, doc.title, "docx", &e));
                }
            }
        }

        for evidence in &case.evidence {
            let declared = sanitize_filename::sanitize(&evidence.original_name);
            match fetch_with_timeout(
                self.evidence.as_ref(),
                &evidence.stored_path,
                EVIDENCE_FETCH_TIMEOUT,
            )
            .await
            {
                Ok(bytes) => entries.push(ArchiveEntry {
                    name: unique_name(&mut used_names, format!("{}{}", prefix, declared)),
                    bytes,
                }),
                Err(e) => {
                    warn!(
                        "evidence fetch failed for '{}': {}",
                        evidence.stored_path, e
                    );
                    failures.push(format!("Pièce « {} » : {}", evidence.original_name, e));
                    entries.push(ArchiveEntry {
                        name: unique_name(
                            &mut used_names,
                            format!("{}{}.indisponible.txt", prefix, declared),
                        ),
                        bytes: format!(
                            "Le fichier « {} » n'a pas pu être récupéré : {}\n",
                            evidence.original_name, e
                        )
                        .into_bytes(),
                    });
                }
            }
        }

        // Exactly one signature image per case, regardless of how many
        // documents embedded the same bytes.
        if let Some(sig) = &decoded {
            entries.push(ArchiveEntry {
                name: unique_name(
                    &mut used_names,
                    format!("{}signature.{}", prefix, sig.format.extension()),
                ),
                bytes: sig.bytes.clone(),
            });
        }

        let manifest = CaseManifest {
            case_id: case.request.case_id,
            client_id: case.client_id,
            client_name: case.client_name.clone(),
            generated_at: Utc::now().to_rfc3339(),
            signature_embedded: decoded.is_some(),
            entries: entries.iter().map(|e| e.name.clone()).collect(),
            failures: failures.clone(),
        };
        entries.push(ArchiveEntry {
            name: format!("{}metadata.json", prefix),
            bytes: serde_json::to_vec_pretty(&manifest)
                .map_err(|e| ArchiveError::Container(e.to_string()))?,
        });

        Ok(CaseBundle { entries, failures })
    }
}

/// Case-scoped signature first, then the client default; a rejected
/// signature degrades to "no signature" and the placeholder policy.
fn resolve_signature(
    case: &CaseRecord,
    client: Option<&ClientRecord>,
) -> Option<DecodedSignature> {
    let asset = best_signature(case, client)?;
    match signature::decode(&asset) {
        Ok(decoded) => Some(decoded),
        Err(e) => {
            warn!(
                "signature for case {} rejected, using placeholder: {}",
                case.request.case_id, e
            );
            None
        }
    }
}

fn render_stand_in(
    used_names: &mut HashSet<String>,
    prefix: &str,
    title: &str,
    kind: &str,
    error: &crate::docgen::GeneratorError,
) -> ArchiveEntry {
    ArchiveEntry {
        name: unique_name(
            used_names,
            format!("{}{}-{}.erreur.txt", prefix, slugify(title, "document"), kind),
        ),
        bytes: format!(
            "Le document « {} » ({}) n'a pas pu être généré : {}\n",
            title, kind, error
        )
        .into_bytes(),
    }
}

/// Deterministic, collision-free entry naming: duplicates get a numeric
/// suffix before the extension.
fn unique_name(used: &mut HashSet<String>, candidate: String) -> String {
    if used.insert(candidate.clone()) {
        return candidate;
    }
    let (stem, extension) = match candidate.rsplit_once('.') {
        Some((stem, ext)) => (stem.to_string(), Some(ext.to_string())),
        None => (candidate.clone(), None),
    };
    let mut n = 2;
    loop {
        let alternative = match &extension {
            Some(ext) => format!("{} ({}).{}", stem, n, ext),
            None => format!("{} ({})", stem, n),
        };
        if used.insert(alternative.clone()) {
            return alternative;
        }
        n += 1;
    }
}

/// Realize the entries as one compressed zip byte stream.
fn write_zip(entries: &[ArchiveEntry]) -> Result<Vec<u8>, ArchiveError> {
    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    let options: FileOptions = FileOptions::default().compression_method(CompressionMethod::Deflated);

    for entry in entries {
        zip.start_file(entry.name.as_str(), options)
            .map_err(|e| ArchiveError::Container(e.to_string()))?;
        zip.write_all(&entry.bytes)
            .map_err(|e| ArchiveError::Container(e.to_string()))?;
    }

    let cursor = zip
        .finish()
        .map_err(|e| ArchiveError::Container(e.to_string()))?;
    Ok(cursor.into_inner())
}
