use actix_cors::Cors;
use actix_web::middleware::Compress;
use actix_web::{http::header, web, App, HttpServer};
use actix_web_prometheus::PrometheusMetricsBuilder;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::{OpenApi, ToSchema};
use utoipa_swagger_ui::SwaggerUi;

pub mod archive;
pub mod docgen;
pub mod download;
pub mod models;
pub mod state;
pub mod storage;
pub mod store;

pub use crate::state::AppState;

#[derive(Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
    pub timestamp: String,
}

impl ErrorResponse {
    pub fn new(error_type: &str, message: &str) -> Self {
        Self {
            error: error_type.to_string(),
            message: message.to_string(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }

    pub fn not_found(message: &str) -> Self {
        Self::new("NotFound", message)
    }

    pub fn bad_request(message: &str) -> Self {
        Self::new("BadRequest", message)
    }

    pub fn internal_error(message: &str) -> Self {
        Self::new("InternalServerError", message)
    }

    /// 400 body enumerating every missing field by label.
    pub fn validation(errors: &docgen::ValidationErrors) -> Self {
        Self::new("ValidationFailed", &errors.to_string())
    }
}

pub async fn run() -> std::io::Result<()> {
    if std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", "info");
    }
    env_logger::init();

    #[derive(OpenApi)]
    #[openapi(
        paths(
            crate::download::handlers::get_case_letter_pdf,
            crate::download::handlers::get_case_letter_docx,
            crate::download::handlers::get_case_documents_pdf,
            crate::download::handlers::get_case_archive,
            crate::download::handlers::get_client_archive,
        ),
        components(
            schemas(
                models::CaseDocumentRequest,
                models::InsuredPerson,
                models::SignatureAsset,
                store::EvidenceRef,
                ErrorResponse,
            )
        ),
        tags(
            (name = "Document Service", description = "Generated letter downloads (PDF / Word)."),
            (name = "Archive Service", description = "Case and client archive downloads.")
        )
    )]
    struct ApiDoc;

    dotenvy::dotenv().ok(); // Load .env file

    // RESILIA_EVIDENCE_URL selects the remote store; otherwise evidence
    // is read from a local directory.
    let evidence: Arc<dyn storage::EvidenceStorage> =
        match std::env::var("RESILIA_EVIDENCE_URL") {
            Ok(url) => {
                log::info!("Using HTTP evidence store at {}", url);
                Arc::new(storage::HttpEvidenceStorage::new(url))
            }
            Err(_) => {
                let dir = std::env::var("RESILIA_EVIDENCE_DIR")
                    .unwrap_or_else(|_| "./evidence".to_string());
                log::info!("Using filesystem evidence store at {}", dir);
                Arc::new(storage::FsEvidenceStorage::new(dir))
            }
        };
    let store = Arc::new(store::InMemoryCaseStore::new());
    let app_state = web::Data::new(AppState::new(store, evidence));

    let prometheus = PrometheusMetricsBuilder::new("resilia_server")
        .endpoint("/metrics")
        .build()
        .expect("Failed to create Prometheus metrics middleware");

    log::info!("Starting server at http://0.0.0.0:8080");

    HttpServer::new(move || {
        let app_state = app_state.clone();
        let prometheus = prometheus.clone();
        let cors = Cors::default()
            .allowed_origin("http://localhost:5173")
            .allowed_origin("http://localhost:3000")
            .allowed_origin("http://localhost:8080")
            .allowed_origin("http://127.0.0.1:8080")
            .allowed_methods(vec!["GET", "OPTIONS"])
            .allowed_headers(vec![
                header::AUTHORIZATION,
                header::ACCEPT,
                header::CONTENT_TYPE,
            ])
            .supports_credentials()
            .max_age(3600);

        App::new()
            .wrap(Compress::default())
            .wrap(prometheus)
            .wrap(cors)
            .app_data(app_state)
            .service(
                web::scope("/api")
                    .service(
                        web::resource("/cases/{id}/letter.pdf")
                            .route(web::get().to(download::handlers::get_case_letter_pdf)),
                    )
                    .service(
                        web::resource("/cases/{id}/letter.docx")
                            .route(web::get().to(download::handlers::get_case_letter_docx)),
                    )
                    .service(
                        web::resource("/cases/{id}/documents.pdf")
                            .route(web::get().to(download::handlers::get_case_documents_pdf)),
                    )
                    .service(
                        web::resource("/cases/{id}/archive")
                            .route(web::get().to(download::handlers::get_case_archive)),
                    )
                    .service(
                        web::resource("/clients/{id}/archive")
                            .route(web::get().to(download::handlers::get_client_archive)),
                    ),
            )
            .service(
                SwaggerUi::new("/swagger-ui/{_:.*}")
                    .url("/api-doc/openapi.json", ApiDoc::openapi()),
            )
    })
    .backlog(8192)
    .max_connections(25000)
    .keep_alive(actix_web::http::KeepAlive::Os)
    .bind(("0.0.0.0", 8080))?
    .run()
    .await
}
