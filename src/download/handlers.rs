//! Download handlers: the delivery channel of the engine.
//!
//! Every endpoint hands the produced bytes back as an HTTP attachment with
//! an explicit content type; nothing is persisted on the way out.

use actix_web::{
    web::{self, Path},
    HttpResponse, Responder,
};
use log::{error, info, warn};
use uuid::Uuid;

use crate::archive::ArchiveError;
use crate::docgen::common::short_ref;
use crate::docgen::pdf::{DocumentInfo, PdfRenderRequest, PdfRenderer};
use crate::docgen::signature::{self, DecodedSignature};
use crate::docgen::template;
use crate::docgen::word::WordRenderer;
use crate::docgen::{validate_request, RenderedDocument};
use crate::state::AppState;
use crate::store::{best_signature, CaseRecord};
use crate::ErrorResponse;

struct CaseContext {
    case: CaseRecord,
    decoded: Option<DecodedSignature>,
    marker: String,
}

/// Load a case, refuse invalid requests before rendering, and resolve
/// the best-available signature once for all documents of the response.
async fn load_case(data: &AppState, case_id: Uuid) -> Result<CaseContext, HttpResponse> {
    let case = match data.store.get_case(case_id).await {
        Ok(case) => case,
        Err(e) => {
            error!("case lookup failed: {}", e);
            return Err(HttpResponse::NotFound().json(ErrorResponse::not_found(&e.to_string())));
        }
    };
    let client = data.store.get_client(case.client_id).await.ok();

    if let Err(errors) = validate_request(&case.request) {
        info!(
            "generation refused for case {}: {} missing field(s)",
            case_id,
            errors.len()
        );
        return Err(HttpResponse::BadRequest().json(ErrorResponse::validation(&errors)));
    }

    let decoded = best_signature(&case, client.as_ref()).and_then(|asset| {
        match signature::decode(&asset) {
            Ok(decoded) => Some(decoded),
            Err(e) => {
                warn!("signature rejected for case {}: {}", case_id, e);
                None
            }
        }
    });
    let marker = template::signature_marker(decoded.as_ref());

    Ok(CaseContext {
        case,
        decoded,
        marker,
    })
}

fn document_info(ctx: &CaseContext, title: &str) -> DocumentInfo {
    DocumentInfo {
        title: title.to_string(),
        author: ctx.case.client_name.clone(),
        subject: format!(
            "{} - dossier {}",
            title,
            short_ref(ctx.case.request.case_id)
        ),
        case_number: short_ref(ctx.case.request.case_id),
        client_name: ctx.case.client_name.clone(),
    }
}

fn attachment(document: RenderedDocument) -> HttpResponse {
    HttpResponse::Ok()
        .content_type(document.mime_type)
        .append_header((
            "Content-Disposition",
            format!("attachment; filename=\"{}\"", document.filename),
        ))
        .body(document.bytes)
}

#[utoipa::path(
    context_path = "/api",
    tag = "Document Service",
    get,
    path = "/cases/{id}/letter.pdf",
    params(("id" = Uuid, Path, description = "Case identifier")),
    responses(
        (status = 200, description = "Filled cancellation letter as PDF"),
        (status = 400, description = "Missing required fields", body = ErrorResponse),
        (status = 404, description = "Case not found", body = ErrorResponse),
        (status = 500, description = "Render failed", body = ErrorResponse)
    )
)]
pub async fn get_case_letter_pdf(
    path: Path<Uuid>,
    data: web::Data<AppState>,
) -> impl Responder {
    let case_id = path.into_inner();
    info!("Executing get_case_letter_pdf for case: {}", case_id);

    let ctx = match load_case(&data, case_id).await {
        Ok(ctx) => ctx,
        Err(response) => return response,
    };

    let request = PdfRenderRequest {
        title: template::LETTER_TITLE.to_string(),
        body: template::letter_body(&ctx.case.request, &ctx.marker),
        info: document_info(&ctx, template::LETTER_TITLE),
        signature: ctx.decoded.clone(),
    };

    match PdfRenderer::render(&request) {
        Ok(document) => attachment(document),
        Err(e) => {
            error!("PDF render failed for case {}: {}", case_id, e);
            HttpResponse::InternalServerError()
                .json(ErrorResponse::internal_error("Failed to render PDF letter"))
        }
    }
}

#[utoipa::path(
    context_path = "/api",
    tag = "Document Service",
    get,
    path = "/cases/{id}/letter.docx",
    params(("id" = Uuid, Path, description = "Case identifier")),
    responses(
        (status = 200, description = "Filled cancellation letter as Word document"),
        (status = 400, description = "Missing required fields", body = ErrorResponse),
        (status = 404, description = "Case not found", body = ErrorResponse),
        (status = 500, description = "Render failed", body = ErrorResponse)
    )
)]
pub async fn get_case_letter_docx(
    path: Path<Uuid>,
    data: web::Data<AppState>,
) -> impl Responder {
    let case_id = path.into_inner();
    info!("Executing get_case_letter_docx for case: {}", case_id);

    let ctx = match load_case(&data, case_id).await {
        Ok(ctx) => ctx,
        Err(response) => return response,
    };

    let body = template::letter_body(&ctx.case.request, &ctx.marker);
    match WordRenderer::render(template::LETTER_TITLE, &body, ctx.decoded.as_ref()) {
        Ok(document) => attachment(document),
        Err(e) => {
            error!("Word render failed for case {}: {}", case_id, e);
            HttpResponse::InternalServerError().json(ErrorResponse::internal_error(
                "Failed to render Word letter",
            ))
        }
    }
}

#[utoipa::path(
    context_path = "/api",
    tag = "Document Service",
    get,
    path = "/cases/{id}/documents.pdf",
    params(("id" = Uuid, Path, description = "Case identifier")),
    responses(
        (status = 200, description = "All generated documents merged into one PDF"),
        (status = 400, description = "Missing required fields", body = ErrorResponse),
        (status = 404, description = "Case not found", body = ErrorResponse),
        (status = 500, description = "Render failed", body = ErrorResponse)
    )
)]
pub async fn get_case_documents_pdf(
    path: Path<Uuid>,
    data: web::Data<AppState>,
) -> impl Responder {
    let case_id = path.into_inner();
    info!("Executing get_case_documents_pdf for case: {}", case_id);

    let ctx = match load_case(&data, case_id).await {
        Ok(ctx) => ctx,
        Err(response) => return response,
    };

    let requests: Vec<PdfRenderRequest> = template::case_documents(&ctx.case.request, &ctx.marker)
        .into_iter()
        .map(|doc| PdfRenderRequest {
            title: doc.title.to_string(),
            info: document_info(&ctx, doc.title),
            body: doc.body,
            signature: ctx.decoded.clone(),
        })
        .collect();

    match PdfRenderer::render_many(&requests) {
        Ok(document) => attachment(document),
        Err(e) => {
            error!("merged PDF render failed for case {}: {}", case_id, e);
            HttpResponse::InternalServerError().json(ErrorResponse::internal_error(
                "Failed to render merged PDF",
            ))
        }
    }
}

fn archive_response(result: Result<crate::archive::AssembledArchive, ArchiveError>) -> HttpResponse {
    match result {
        Ok(archive) => HttpResponse::Ok()
            .content_type(archive.mime_type)
            .append_header((
                "Content-Disposition",
                format!("attachment; filename=\"{}\"", archive.filename),
            ))
            .body(archive.bytes),
        Err(ArchiveError::Store(e)) => {
            error!("archive lookup failed: {}", e);
            HttpResponse::NotFound().json(ErrorResponse::not_found(&e.to_string()))
        }
        Err(ArchiveError::InputInvalid(errors)) => {
            info!("archive refused: {} missing field(s)", errors.len());
            HttpResponse::BadRequest().json(ErrorResponse::validation(&errors))
        }
        Err(ArchiveError::Container(e)) => {
            error!("archive container failure: {}", e);
            HttpResponse::InternalServerError()
                .json(ErrorResponse::internal_error("Failed to finalize archive"))
        }
    }
}

#[utoipa::path(
    context_path = "/api",
    tag = "Archive Service",
    get,
    path = "/cases/{id}/archive",
    params(("id" = Uuid, Path, description = "Case identifier")),
    responses(
        (status = 200, description = "Zip archive of the case's documents, evidence and signature"),
        (status = 400, description = "Missing required fields", body = ErrorResponse),
        (status = 404, description = "Case not found", body = ErrorResponse),
        (status = 500, description = "Archive could not be finalized", body = ErrorResponse)
    )
)]
pub async fn get_case_archive(path: Path<Uuid>, data: web::Data<AppState>) -> impl Responder {
    let case_id = path.into_inner();
    info!("Executing get_case_archive for case: {}", case_id);
    archive_response(data.assembler().assemble_case(case_id).await)
}

#[utoipa::path(
    context_path = "/api",
    tag = "Archive Service",
    get,
    path = "/clients/{id}/archive",
    params(("id" = Uuid, Path, description = "Client identifier")),
    responses(
        (status = 200, description = "Zip archive of all the client's cases, namespaced per case"),
        (status = 400, description = "Missing required fields", body = ErrorResponse),
        (status = 404, description = "Client not found", body = ErrorResponse),
        (status = 500, description = "Archive could not be finalized", body = ErrorResponse)
    )
)]
pub async fn get_client_archive(path: Path<Uuid>, data: web::Data<AppState>) -> impl Responder {
    let client_id = path.into_inner();
    info!("Executing get_client_archive for client: {}", client_id);
    archive_response(data.assembler().assemble_client(client_id).await)
}
