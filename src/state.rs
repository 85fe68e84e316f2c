//! Shared application state handed to every handler.

use std::sync::Arc;

use crate::archive::ArchiveAssembler;
use crate::storage::EvidenceStorage;
use crate::store::CaseStore;

pub struct AppState {
    pub store: Arc<dyn CaseStore>,
    pub evidence: Arc<dyn EvidenceStorage>,
}

impl AppState {
    pub fn new(store: Arc<dyn CaseStore>, evidence: Arc<dyn EvidenceStorage>) -> Self {
        Self { store, evidence }
    }

    /// Assemblers are cheap per-request values; nothing is shared or
    /// mutated between concurrent requests.
    pub fn assembler(&self) -> ArchiveAssembler {
        ArchiveAssembler::new(self.store.clone(), self.evidence.clone())
    }
}
