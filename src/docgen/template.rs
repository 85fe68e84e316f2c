//! Letter templates and the template filler.
//!
//! Placeholders are `{{...}}` tokens resolved by literal substring
//! replacement, so a token must never collide with substituted content.
//! The insured-person list is the single place where one placeholder
//! expands to N repeated blocks.

use crate::docgen::common::{format_display_date, today_display_date};
use crate::docgen::signature::DecodedSignature;
use crate::models::{CaseDocumentRequest, InsuredPerson, LetterVariant};

pub const LETTER_TITLE: &str = "Résiliation de l'assurance maladie";
pub const INFO_SHEET_TITLE: &str = "Feuille d'information complémentaire";

/// Drawn instead of an embedded signature image when no usable
/// signature exists; the client signs the printed letter by hand.
pub const SIGNATURE_PLACEHOLDER_LINE: &str = "________________________________";

const LETTER_TEMPLATE: &str = "\
{{adresse_client}}

{{assureur}}

Objet : Résiliation de l'assurance maladie

Madame, Monsieur,

Par la présente, je vous informe de la résiliation des contrats d'assurance maladie pour les personnes suivantes :

{{liste_personnes}}

{{dates_resiliation}}

Je vous prie de bien vouloir me confirmer la résiliation par écrit à l'adresse indiquée ci-dessus.

Veuillez agréer, Madame, Monsieur, mes salutations distinguées.

Fait le {{date_du_jour}}

{{signature}}
";

const INFO_SHEET_TEMPLATE: &str = "\
Feuille d'information complémentaire

Assureur concerné : {{assureur}}

Personnes assurées :

{{liste_personnes}}

{{dates_resiliation}}

Adresse de correspondance :
{{adresse_client}}

Document établi le {{date_du_jour}}

{{signature}}
";

/// One generated document before rendering: a title and a filled body.
#[derive(Debug, Clone)]
pub struct DocumentContent {
    pub title: &'static str,
    pub body: String,
}

/// Resolve the signature placeholder once per fill call.
///
/// Both renderers must receive the same resolved marker so the PDF and
/// Word outputs of one generation stay consistent.
pub fn signature_marker(signature: Option<&DecodedSignature>) -> String {
    match signature {
        Some(sig) => {
            let at = sig
                .signed_at
                .map(|ts| ts.format("%d/%m/%Y %H:%M").to_string())
                .unwrap_or_else(today_display_date);
            format!("[Signé électroniquement le {}]", at)
        }
        None => SIGNATURE_PLACEHOLDER_LINE.to_string(),
    }
}

/// Render the ordinally-numbered insured-person block.
pub fn person_block(insured: &[InsuredPerson]) -> String {
    let mut blocks = Vec::with_capacity(insured.len());
    for (i, person) in insured.iter().enumerate() {
        let mut lines = vec![
            format!("{}. Nom et prénom : {}", i + 1, person.name),
            format!(
                "   Date de naissance : {}",
                format_display_date(&person.birth_date)
            ),
        ];
        if let Some(policy) = person
            .policy_number
            .as_deref()
            .filter(|p| !p.trim().is_empty())
        {
            lines.push(format!("   Numéro de police : {}", policy));
        }
        blocks.push(lines.join("\n"));
    }
    blocks.join("\n")
}

fn termination_block(request: &CaseDocumentRequest) -> String {
    let variant = LetterVariant::from_selector(&request.variant);
    let mut lines = Vec::new();
    if variant.includes_lamal() {
        lines.push(format!(
            "La couverture d'assurance de base (LAMal) prendra fin le {}.",
            format_display_date(&request.lamal_end)
        ));
    }
    if variant.includes_lca() {
        lines.push(format!(
            "Les assurances complémentaires (LCA) prendront fin le {}.",
            format_display_date(&request.lca_end)
        ));
    }
    lines.join("\n")
}

/// Fill a template with the request data and the pre-resolved
/// signature marker.
pub fn fill(template: &str, request: &CaseDocumentRequest, signature_marker: &str) -> String {
    template
        .replace("{{adresse_client}}", request.client_address.trim())
        .replace("{{assureur}}", request.insurer.trim())
        .replace("{{liste_personnes}}", &person_block(&request.insured))
        .replace("{{dates_resiliation}}", &termination_block(request))
        .replace("{{date_du_jour}}", &today_display_date())
        .replace("{{signature}}", signature_marker)
}

/// The filled legal letter.
pub fn letter_body(request: &CaseDocumentRequest, signature_marker: &str) -> String {
    fill(LETTER_TEMPLATE, request, signature_marker)
}

/// The filled supplementary info sheet.
pub fn info_sheet_body(request: &CaseDocumentRequest, signature_marker: &str) -> String {
    fill(INFO_SHEET_TEMPLATE, request, signature_marker)
}

/// Every document a case produces, in output order.
pub fn case_documents(request: &CaseDocumentRequest, signature_marker: &str) -> Vec<DocumentContent> {
    vec![
        DocumentContent {
            title: LETTER_TITLE,
            body: letter_body(request, signature_marker),
        },
        DocumentContent {
            title: INFO_SHEET_TITLE,
            body: info_sheet_body(request, signature_marker),
        },
    ]
}
