use resilia_server::docgen::template::{
    self, SIGNATURE_PLACEHOLDER_LINE,
};
use resilia_server::docgen::validation::validate_request;
use resilia_server::models::{CaseDocumentRequest, InsuredPerson};
use uuid::Uuid;

fn person(name: &str, birth: &str, policy: Option<&str>) -> InsuredPerson {
    InsuredPerson {
        name: name.to_string(),
        birth_date: birth.to_string(),
        policy_number: policy.map(|p| p.to_string()),
        adult: true,
    }
}

fn request_with_persons(persons: Vec<InsuredPerson>) -> CaseDocumentRequest {
    CaseDocumentRequest {
        case_id: Uuid::new_v4(),
        insured: persons,
        insurer: "Assura SA".to_string(),
        lamal_end: "2024-12-31".to_string(),
        lca_end: "2024-11-30".to_string(),
        client_address: "Rue du Lac 12\n1000 Lausanne".to_string(),
        variant: String::new(),
    }
}

#[test]
fn test_filled_template_has_one_block_per_person() {
    for n in 1..=5 {
        let persons = (0..n)
            .map(|i| person(&format!("Personne {}", i + 1), "1990-01-01", None))
            .collect::<Vec<_>>();
        let mut request = request_with_persons(persons);
        request.insured[0].policy_number = Some("POL1".to_string());

        let body = template::letter_body(&request, SIGNATURE_PLACEHOLDER_LINE);
        assert_eq!(body.matches("Nom et prénom :").count(), n);
        for i in 1..=n {
            assert!(
                body.contains(&format!("{}. Nom et prénom : Personne {}", i, i)),
                "missing ordinal block {} in:\n{}",
                i,
                body
            );
        }
    }
}

#[test]
fn test_no_placeholder_tokens_survive_filling() {
    let request = request_with_persons(vec![person("Jean Dupont", "1990-01-01", Some("POL1"))]);
    for body in [
        template::letter_body(&request, SIGNATURE_PLACEHOLDER_LINE),
        template::info_sheet_body(&request, SIGNATURE_PLACEHOLDER_LINE),
    ] {
        assert!(!body.contains("{{"), "unresolved token:\n{}", body);
        assert!(!body.contains("}}"));
    }
}

// End-to-end example from the product requirements: Jean Dupont,
// LAMal ending 2024-12-31, no signature.
#[test]
fn test_jean_dupont_end_to_end_text() {
    let request = request_with_persons(vec![person("Jean Dupont", "1990-01-01", Some("POL1"))]);
    assert!(validate_request(&request).is_ok());

    let marker = template::signature_marker(None);
    let body = template::letter_body(&request, &marker);

    assert!(body.contains("1. Nom et prénom : Jean Dupont"));
    assert!(body.contains("31/12/2024"));
    assert!(body.contains(SIGNATURE_PLACEHOLDER_LINE));
    assert!(!body.contains("Signé électroniquement"));
}

#[test]
fn test_missing_optional_date_renders_empty_not_panic() {
    let mut request = request_with_persons(vec![person("Jean Dupont", "", Some("POL1"))]);
    request.variant = "lamal".to_string();
    request.lca_end = String::new();

    // Filling never throws, even with the empty birth date.
    let body = template::letter_body(&request, SIGNATURE_PLACEHOLDER_LINE);
    assert!(body.contains("Date de naissance : \n") || body.contains("Date de naissance : "));
}
