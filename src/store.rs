//! Case/Client store collaborator.
//!
//! Read-only lookup of a case's insured-person data, termination dates,
//! recipient and best-available signature, keyed by case or client id.
//! Persistence of this data belongs to the surrounding system; the engine
//! only consumes it through the [`CaseStore`] trait.

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::models::{CaseDocumentRequest, SignatureAsset};

/// Reference to a previously uploaded evidence file.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct EvidenceRef {
    /// Name the client gave the file; kept as the archive entry name.
    pub original_name: String,
    /// Path inside the evidence store.
    pub stored_path: String,
}

/// One cancellation case as the store hands it out.
#[derive(Debug, Clone)]
pub struct CaseRecord {
    pub client_id: Uuid,
    pub client_name: String,
    pub request: CaseDocumentRequest,
    pub evidence: Vec<EvidenceRef>,
    /// Case-scoped signature; takes priority over the client default.
    pub signature: Option<SignatureAsset>,
}

#[derive(Debug, Clone)]
pub struct ClientRecord {
    pub client_id: Uuid,
    pub name: String,
    /// Client-level default signature.
    pub signature: Option<SignatureAsset>,
    pub case_ids: Vec<Uuid>,
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("case {0} not found")]
    CaseNotFound(Uuid),
    #[error("client {0} not found")]
    ClientNotFound(Uuid),
}

#[async_trait]
pub trait CaseStore: Send + Sync {
    async fn get_case(&self, case_id: Uuid) -> Result<CaseRecord, StoreError>;
    async fn get_client(&self, client_id: Uuid) -> Result<ClientRecord, StoreError>;
}

/// The case-scoped signature wins; the client default is the fallback.
pub fn best_signature(
    case: &CaseRecord,
    client: Option<&ClientRecord>,
) -> Option<SignatureAsset> {
    case.signature
        .clone()
        .or_else(|| client.and_then(|c| c.signature.clone()))
}

/// In-memory store used by the default wiring and by tests.
#[derive(Default)]
pub struct InMemoryCaseStore {
    cases: RwLock<HashMap<Uuid, CaseRecord>>,
    clients: RwLock<HashMap<Uuid, ClientRecord>>,
}

impl InMemoryCaseStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_case(&self, case_id: Uuid, record: CaseRecord) {
        self.cases.write().insert(case_id, record);
    }

    pub fn insert_client(&self, record: ClientRecord) {
        self.clients.write().insert(record.client_id, record);
    }
}

#[async_trait]
impl CaseStore for InMemoryCaseStore {
    async fn get_case(&self, case_id: Uuid) -> Result<CaseRecord, StoreError> {
        self.cases
            .read()
            .get(&case_id)
            .cloned()
            .ok_or(StoreError::CaseNotFound(case_id))
    }

    async fn get_client(&self, client_id: Uuid) -> Result<ClientRecord, StoreError> {
        self.clients
            .read()
            .get(&client_id)
            .cloned()
            .ok_or(StoreError::ClientNotFound(client_id))
    }
}
