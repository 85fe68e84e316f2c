//! Input validation for document generation.
//!
//! Generation is refused before any rendering starts when required fields
//! are missing; every missing field is reported by its human label so the
//! operator can fix the case data in one pass.

use std::fmt;

use crate::models::{CaseDocumentRequest, LetterVariant};

/// Validation error with a user-friendly message in French.
#[derive(Debug, Clone)]
pub struct ValidationError {
    /// The field that failed validation
    pub field: String,
    /// Human-readable error message
    pub message: String,
    /// Suggestion for how to fix the error
    pub suggestion: Option<String>,
}

impl ValidationError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
            suggestion: None,
        }
    }

    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }

    /// Create error for empty required field
    pub fn empty_field(field: &str, label: &str) -> Self {
        Self::new(field, format!("{} ne doit pas être vide", label))
            .with_suggestion(format!("Veuillez renseigner « {} »", label))
    }

    /// Create error for an invalid ISO date
    pub fn invalid_date(field: &str, label: &str, value: &str) -> Self {
        Self::new(
            field,
            format!("{} : la date « {} » est invalide", label, value),
        )
        .with_suggestion("Utilisez le format AAAA-MM-JJ (exemple : 1990-01-01)")
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.field, self.message)?;
        if let Some(ref suggestion) = self.suggestion {
            write!(f, ". {}", suggestion)?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationError {}

/// Collection of validation errors with formatted output.
#[derive(Debug, Default, Clone)]
pub struct ValidationErrors {
    errors: Vec<ValidationError>,
}

impl ValidationErrors {
    pub fn new() -> Self {
        Self { errors: Vec::new() }
    }

    pub fn add(&mut self, error: ValidationError) {
        self.errors.push(error);
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    /// Field identifiers of every missing or invalid field.
    pub fn fields(&self) -> Vec<String> {
        self.errors.iter().map(|e| e.field.clone()).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ValidationError> {
        self.errors.iter()
    }

    /// Fold another collection into this one (multi-case requests).
    pub fn merge(&mut self, other: ValidationErrors) {
        self.errors.extend(other.errors);
    }

    /// Convert to Result - Ok if no errors, Err with the collected errors.
    pub fn into_result(self) -> Result<(), ValidationErrors> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Validation échouée : {} erreur(s) trouvée(s)",
            self.errors.len()
        )?;
        for (i, error) in self.errors.iter().enumerate() {
            writeln!(f, "{}. {}", i + 1, error)?;
        }
        Ok(())
    }
}

// ============================================================================
// Validation functions
// ============================================================================

/// Validate that a string is not empty after trimming
pub fn validate_required(value: &str, field: &str, label: &str, errors: &mut ValidationErrors) {
    if value.trim().is_empty() {
        errors.add(ValidationError::empty_field(field, label));
    }
}

/// Validate an ISO `YYYY-MM-DD` date.
pub fn validate_iso_date(value: &str, field: &str, label: &str, errors: &mut ValidationErrors) {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        errors.add(ValidationError::empty_field(field, label));
        return;
    }

    if chrono::NaiveDate::parse_from_str(trimmed, "%Y-%m-%d").is_err() {
        errors.add(ValidationError::invalid_date(field, label, trimmed));
    }
}

/// Validate an ISO date only when one is provided.
pub fn validate_iso_date_optional(
    value: &str,
    field: &str,
    label: &str,
    errors: &mut ValidationErrors,
) {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return;
    }

    if chrono::NaiveDate::parse_from_str(trimmed, "%Y-%m-%d").is_err() {
        errors.add(ValidationError::invalid_date(field, label, trimmed));
    }
}

/// Validate a full generation request.
///
/// Each insured person is checked individually so a request with three
/// persons missing their birth dates reports three distinct errors.
/// A policy number is required for the primary person only; dependents
/// are usually covered under the primary policy.
pub fn validate_request(request: &CaseDocumentRequest) -> Result<(), ValidationErrors> {
    let mut errors = ValidationErrors::new();
    let variant = LetterVariant::from_selector(&request.variant);

    validate_required(
        &request.insurer,
        "insurer",
        "Nom de l'assureur",
        &mut errors,
    );
    validate_required(
        &request.client_address,
        "client_address",
        "Adresse du client",
        &mut errors,
    );

    if request.insured.is_empty() {
        errors.add(
            ValidationError::new("insured", "Aucune personne assurée n'est renseignée")
                .with_suggestion("Ajoutez au moins une personne assurée au dossier"),
        );
    }

    for (i, person) in request.insured.iter().enumerate() {
        let n = i + 1;
        validate_required(
            &person.name,
            &format!("insured[{}].name", i),
            &format!("Nom et prénom (personne {})", n),
            &mut errors,
        );
        validate_iso_date(
            &person.birth_date,
            &format!("insured[{}].birth_date", i),
            &format!("Date de naissance (personne {})", n),
            &mut errors,
        );
        if i == 0 {
            let policy = person.policy_number.as_deref().unwrap_or("");
            validate_required(
                policy,
                "insured[0].policy_number",
                "Numéro de police (personne 1)",
                &mut errors,
            );
        }
    }

    // The variant decides which termination date is required; the other
    // one is still checked for format when present.
    if variant.includes_lamal() {
        validate_iso_date(
            &request.lamal_end,
            "lamal_end",
            "Date de résiliation LAMal",
            &mut errors,
        );
    } else {
        validate_iso_date_optional(
            &request.lamal_end,
            "lamal_end",
            "Date de résiliation LAMal",
            &mut errors,
        );
    }
    if variant.includes_lca() {
        validate_iso_date(
            &request.lca_end,
            "lca_end",
            "Date de résiliation LCA",
            &mut errors,
        );
    } else {
        validate_iso_date_optional(
            &request.lca_end,
            "lca_end",
            "Date de résiliation LCA",
            &mut errors,
        );
    }

    errors.into_result()
}
