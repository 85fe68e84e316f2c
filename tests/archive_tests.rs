use std::io::Cursor;
use std::sync::Arc;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use resilia_server::archive::{ArchiveAssembler, ArchiveError};
use resilia_server::models::{CaseDocumentRequest, InsuredPerson, SignatureAsset};
use resilia_server::storage::FsEvidenceStorage;
use resilia_server::store::{CaseRecord, ClientRecord, EvidenceRef, InMemoryCaseStore};
use uuid::Uuid;

fn request(case_id: Uuid) -> CaseDocumentRequest {
    CaseDocumentRequest {
        case_id,
        insured: vec![InsuredPerson {
            name: "Jean Dupont".to_string(),
            birth_date: "1990-01-01".to_string(),
            policy_number: Some("POL1".to_string()),
            adult: true,
        }],
        insurer: "Assura SA".to_string(),
        lamal_end: "2024-12-31".to_string(),
        lca_end: "2024-11-30".to_string(),
        client_address: "Rue du Lac 12\n1000 Lausanne".to_string(),
        variant: String::new(),
    }
}

fn image_data_uri(format: &str) -> String {
    let img = image::RgbImage::from_fn(120, 40, |x, y| {
        image::Rgb([(x % 256) as u8, (y % 256) as u8, ((x + y) % 256) as u8])
    });
    let mut bytes = Vec::new();
    let output = match format {
        "image/png" => image::ImageOutputFormat::Png,
        _ => image::ImageOutputFormat::Jpeg(80),
    };
    image::DynamicImage::ImageRgb8(img)
        .write_to(&mut Cursor::new(&mut bytes), output)
        .unwrap();
    assert!(bytes.len() >= 100);
    format!("data:{};base64,{}", format, BASE64.encode(&bytes))
}

fn signature(format: &str) -> SignatureAsset {
    SignatureAsset {
        data_uri: image_data_uri(format),
        mime_hint: format.to_string(),
        signed_at: None,
    }
}

fn entry_names(archive_bytes: &[u8]) -> Vec<String> {
    let mut archive = zip::ZipArchive::new(Cursor::new(archive_bytes.to_vec())).unwrap();
    (0..archive.len())
        .map(|i| archive.by_index(i).unwrap().name().to_string())
        .collect()
}

fn read_entry(archive_bytes: &[u8], name: &str) -> Vec<u8> {
    let mut archive = zip::ZipArchive::new(Cursor::new(archive_bytes.to_vec())).unwrap();
    let mut file = archive.by_name(name).unwrap();
    let mut out = Vec::new();
    std::io::copy(&mut file, &mut out).unwrap();
    out
}

struct Fixture {
    assembler: ArchiveAssembler,
    store: Arc<InMemoryCaseStore>,
    _evidence_dir: tempfile::TempDir,
}

fn fixture() -> Fixture {
    let evidence_dir = tempfile::tempdir().unwrap();
    std::fs::write(evidence_dir.path().join("piece-identite.pdf"), b"scan 1").unwrap();
    std::fs::write(evidence_dir.path().join("contrat.pdf"), b"scan 2").unwrap();

    let store = Arc::new(InMemoryCaseStore::new());
    let storage = Arc::new(FsEvidenceStorage::new(evidence_dir.path()));
    Fixture {
        assembler: ArchiveAssembler::new(store.clone(), storage),
        store,
        _evidence_dir: evidence_dir,
    }
}

fn seed_case(
    fixture: &Fixture,
    evidence: Vec<EvidenceRef>,
    case_signature: Option<SignatureAsset>,
) -> Uuid {
    let case_id = Uuid::new_v4();
    fixture.store.insert_case(
        case_id,
        CaseRecord {
            client_id: Uuid::new_v4(),
            client_name: "Jean Dupont".to_string(),
            request: request(case_id),
            evidence,
            signature: case_signature,
        },
    );
    case_id
}

fn evidence_ref(name: &str, path: &str) -> EvidenceRef {
    EvidenceRef {
        original_name: name.to_string(),
        stored_path: path.to_string(),
    }
}

#[tokio::test]
async fn test_single_case_archive_contains_documents_and_evidence() {
    let fx = fixture();
    let case_id = seed_case(
        &fx,
        vec![
            evidence_ref("piece-identite.pdf", "piece-identite.pdf"),
            evidence_ref("contrat.pdf", "contrat.pdf"),
        ],
        None,
    );

    let archive = fx.assembler.assemble_case(case_id).await.unwrap();
    assert_eq!(archive.mime_type, "application/zip");
    assert!(archive.filename.starts_with("dossier-"));
    assert!(archive.filename.ends_with(".zip"));

    let names = entry_names(&archive.bytes);
    assert!(names.contains(&"piece-identite.pdf".to_string()));
    assert!(names.contains(&"contrat.pdf".to_string()));
    assert!(names.contains(&"metadata.json".to_string()));
    // Two templates, each as PDF and Word.
    assert_eq!(names.iter().filter(|n| n.ends_with(".pdf") && !n.contains("piece") && !n.contains("contrat")).count(), 2);
    assert_eq!(names.iter().filter(|n| n.ends_with(".docx")).count(), 2);
    // No signature was available, so no signature image entry.
    assert!(!names.iter().any(|n| n.starts_with("signature.")));
}

#[tokio::test]
async fn test_failed_evidence_fetch_degrades_to_stand_in_entry() {
    let fx = fixture();
    let case_id = seed_case(
        &fx,
        vec![
            evidence_ref("piece-identite.pdf", "piece-identite.pdf"),
            evidence_ref("contrat.pdf", "contrat.pdf"),
            evidence_ref("attestation.pdf", "does-not-exist.pdf"),
        ],
        None,
    );

    let archive = fx.assembler.assemble_case(case_id).await.unwrap();
    let names = entry_names(&archive.bytes);

    assert!(names.contains(&"piece-identite.pdf".to_string()));
    assert!(names.contains(&"contrat.pdf".to_string()));
    assert!(
        names.contains(&"attestation.pdf.indisponible.txt".to_string()),
        "expected a stand-in entry, got: {:?}",
        names
    );

    let stand_in =
        String::from_utf8(read_entry(&archive.bytes, "attestation.pdf.indisponible.txt")).unwrap();
    assert!(stand_in.contains("n'a pas pu être récupéré"));

    let manifest =
        String::from_utf8(read_entry(&archive.bytes, "metadata.json")).unwrap();
    assert!(manifest.contains("failures"));
    assert!(manifest.contains("attestation.pdf"));
}

#[tokio::test]
async fn test_signature_image_emitted_exactly_once() {
    let fx = fixture();
    let case_id = seed_case(&fx, Vec::new(), Some(signature("image/png")));

    let archive = fx.assembler.assemble_case(case_id).await.unwrap();
    let names = entry_names(&archive.bytes);
    assert_eq!(
        names.iter().filter(|n| n.starts_with("signature.")).count(),
        1
    );
    assert!(names.contains(&"signature.png".to_string()));

    let manifest = String::from_utf8(read_entry(&archive.bytes, "metadata.json")).unwrap();
    assert!(manifest.contains("\"signature_embedded\": true"));
}

#[tokio::test]
async fn test_case_signature_beats_client_default() {
    let fx = fixture();
    let client_id = Uuid::new_v4();
    let case_id = Uuid::new_v4();

    fx.store.insert_case(
        case_id,
        CaseRecord {
            client_id,
            client_name: "Jean Dupont".to_string(),
            request: request(case_id),
            evidence: Vec::new(),
            signature: Some(signature("image/jpeg")),
        },
    );
    fx.store.insert_client(ClientRecord {
        client_id,
        name: "Jean Dupont".to_string(),
        signature: Some(signature("image/png")),
        case_ids: vec![case_id],
    });

    let archive = fx.assembler.assemble_case(case_id).await.unwrap();
    let names = entry_names(&archive.bytes);
    assert!(names.contains(&"signature.jpg".to_string()));
    assert!(!names.contains(&"signature.png".to_string()));
}

#[tokio::test]
async fn test_multi_case_archive_namespaces_per_case() {
    let fx = fixture();
    let client_id = Uuid::new_v4();
    let mut case_ids = Vec::new();

    for _ in 0..2 {
        let case_id = Uuid::new_v4();
        fx.store.insert_case(
            case_id,
            CaseRecord {
                client_id,
                client_name: "Jean Dupont".to_string(),
                request: request(case_id),
                evidence: vec![evidence_ref("contrat.pdf", "contrat.pdf")],
                signature: None,
            },
        );
        case_ids.push(case_id);
    }
    fx.store.insert_client(ClientRecord {
        client_id,
        name: "Jean Dupont".to_string(),
        signature: Some(signature("image/png")),
        case_ids: case_ids.clone(),
    });

    let archive = fx.assembler.assemble_client(client_id).await.unwrap();
    assert!(archive.filename.starts_with("client-"));

    let names = entry_names(&archive.bytes);
    // One client-level manifest at the root.
    assert!(names.contains(&"metadata.json".to_string()));

    for case_id in &case_ids {
        let prefix = format!("dossier-{}/", &case_id.simple().to_string()[..8]);
        assert!(
            names.iter().any(|n| n == &format!("{}contrat.pdf", prefix)),
            "missing namespaced evidence for {}: {:?}",
            prefix,
            names
        );
        assert!(names.contains(&format!("{}metadata.json", prefix)));
        // Client default signature applies to every case.
        assert!(names.contains(&format!("{}signature.png", prefix)));
    }
}

#[tokio::test]
async fn test_unknown_case_is_a_store_error() {
    let fx = fixture();
    let err = fx.assembler.assemble_case(Uuid::new_v4()).await.unwrap_err();
    assert!(matches!(err, ArchiveError::Store(_)));
}

#[tokio::test]
async fn test_invalid_case_is_refused_before_rendering() {
    let fx = fixture();
    let case_id = Uuid::new_v4();
    let mut bad_request = request(case_id);
    bad_request.insurer = String::new();
    bad_request.insured[0].name = String::new();

    fx.store.insert_case(
        case_id,
        CaseRecord {
            client_id: Uuid::new_v4(),
            client_name: "Jean Dupont".to_string(),
            request: bad_request,
            evidence: Vec::new(),
            signature: None,
        },
    );

    match fx.assembler.assemble_case(case_id).await.unwrap_err() {
        ArchiveError::InputInvalid(errors) => {
            assert_eq!(errors.len(), 2);
        }
        other => panic!("expected InputInvalid, got: {:?}", other),
    }
}

#[tokio::test]
async fn test_rejected_signature_still_produces_archive() {
    let fx = fixture();
    let case_id = seed_case(
        &fx,
        Vec::new(),
        Some(SignatureAsset {
            data_uri: "data:image/png;base64,AAAA".to_string(),
            mime_hint: "image/png".to_string(),
            signed_at: None,
        }),
    );

    // Payload is under the minimum-size threshold: the archive is still
    // produced, with the placeholder policy and no signature entry.
    let archive = fx.assembler.assemble_case(case_id).await.unwrap();
    let names = entry_names(&archive.bytes);
    assert!(!names.iter().any(|n| n.starts_with("signature.")));

    let manifest = String::from_utf8(read_entry(&archive.bytes, "metadata.json")).unwrap();
    assert!(manifest.contains("\"signature_embedded\": false"));
}

#[tokio::test]
async fn test_non_image_signature_is_not_emitted_as_image() {
    let fx = fixture();
    // Decodes fine and passes the size threshold, but is not an image:
    // the documents will show the placeholder, so the archive must not
    // claim an embedded signature either.
    let payload = BASE64.encode(vec![0x42u8; 300]);
    let case_id = seed_case(
        &fx,
        Vec::new(),
        Some(SignatureAsset {
            data_uri: format!("data:image/png;base64,{}", payload),
            mime_hint: "image/png".to_string(),
            signed_at: None,
        }),
    );

    let archive = fx.assembler.assemble_case(case_id).await.unwrap();
    let names = entry_names(&archive.bytes);
    assert!(!names.iter().any(|n| n.starts_with("signature.")));

    let manifest = String::from_utf8(read_entry(&archive.bytes, "metadata.json")).unwrap();
    assert!(manifest.contains("\"signature_embedded\": false"));
}
