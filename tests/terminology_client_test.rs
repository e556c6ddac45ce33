//! Integration tests for the HTTP terminology client against a mock server

mod common;

use eicr_refiner::adapters::terminology::{HttpTerminologyClient, TerminologyLookup};
use eicr_refiner::config::{secret_string, RetryConfig, SectionCatalog, TerminologyConfig};
use eicr_refiner::core::refine::Refiner;
use eicr_refiner::core::resolver::CodeSetResolver;
use eicr_refiner::document::Document;
use eicr_refiner::domain::{CodeSystem, ConditionId, LookupError, RefinerError, SectionActions};
use std::sync::Arc;

const COVID_GROUPER: &str = r#"{
    "condition": "840539006",
    "display_name": "COVID-19",
    "loinc_codes": [{"code": "94500-6", "display": "SARS-CoV-2 RNA"}],
    "snomed_codes": "[[\"840539006\", \"COVID-19\"]]",
    "icd10_codes": null,
    "rxnorm_codes": []
}"#;

fn config(server: &mockito::Server, api_key: Option<&str>) -> TerminologyConfig {
    TerminologyConfig {
        base_url: format!("{}/api/v1", server.url()),
        api_key: api_key.map(|k| secret_string(k.to_string())),
        timeout_seconds: 5,
        retry: RetryConfig {
            max_retries: 3,
            initial_delay_ms: 1,
            max_delay_ms: 5,
            backoff_multiplier: 2.0,
        },
        ..TerminologyConfig::default()
    }
}

fn covid() -> ConditionId {
    ConditionId::new("840539006").unwrap()
}

#[tokio::test]
async fn test_lookup_success_with_bearer_token() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("GET", "/api/v1/groupers/840539006")
        .match_header("authorization", "Bearer test-token")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(COVID_GROUPER)
        .create_async()
        .await;

    let client = HttpTerminologyClient::new(&config(&server, Some("test-token"))).unwrap();
    let record = client.lookup_grouper(&covid()).await.unwrap();

    mock.assert_async().await;
    assert_eq!(record.condition, "840539006");
    assert_eq!(record.display_name.as_deref(), Some("COVID-19"));
    assert_eq!(record.codes(CodeSystem::Loinc).len(), 1);
    assert_eq!(record.codes(CodeSystem::Snomed)[0].code, "840539006");
    assert!(record.codes(CodeSystem::Icd10).is_empty());
}

#[tokio::test]
async fn test_not_found_is_not_retried() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("GET", "/api/v1/groupers/840539006")
        .with_status(404)
        .expect(1)
        .create_async()
        .await;

    let client = HttpTerminologyClient::new(&config(&server, None)).unwrap();
    let err = client.lookup_grouper(&covid()).await.unwrap_err();

    mock.assert_async().await;
    assert!(matches!(err, LookupError::NotFound(_)));
    assert!(err.is_recoverable());
}

#[tokio::test]
async fn test_server_error_retried_until_exhausted() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("GET", "/api/v1/groupers/840539006")
        .with_status(503)
        .with_body("maintenance")
        .expect(3)
        .create_async()
        .await;

    let client = HttpTerminologyClient::new(&config(&server, None)).unwrap();
    let err = client.lookup_grouper(&covid()).await.unwrap_err();

    mock.assert_async().await;
    assert!(matches!(err, LookupError::Connection(_)));
}

#[tokio::test]
async fn test_rejected_credentials_are_unavailable() {
    let mut server = mockito::Server::new_async().await;
    let _mock = server
        .mock("GET", "/api/v1/groupers/840539006")
        .with_status(401)
        .create_async()
        .await;

    let client = HttpTerminologyClient::new(&config(&server, Some("wrong"))).unwrap();
    let err = client.lookup_grouper(&covid()).await.unwrap_err();

    assert!(matches!(err, LookupError::Unavailable(_)));
    assert!(!err.is_recoverable());
}

#[tokio::test]
async fn test_invalid_body() {
    let mut server = mockito::Server::new_async().await;
    let _mock = server
        .mock("GET", "/api/v1/groupers/840539006")
        .with_status(200)
        .with_body("<html>not json</html>")
        .create_async()
        .await;

    let client = HttpTerminologyClient::new(&config(&server, None)).unwrap();
    let err = client.lookup_grouper(&covid()).await.unwrap_err();
    assert!(matches!(err, LookupError::InvalidResponse(_)));
}

#[tokio::test]
async fn test_resolver_skips_missing_groupers() {
    let mut server = mockito::Server::new_async().await;
    let _found = server
        .mock("GET", "/api/v1/groupers/840539006")
        .with_status(200)
        .with_body(COVID_GROUPER)
        .create_async()
        .await;
    let _missing = server
        .mock("GET", "/api/v1/groupers/27836007")
        .with_status(404)
        .create_async()
        .await;

    let client = HttpTerminologyClient::new(&config(&server, None)).unwrap();
    let resolver = CodeSetResolver::new(Arc::new(client));
    let pertussis = ConditionId::new("27836007").unwrap();

    let resolution = resolver.resolve(&[covid(), pertussis.clone()]).await.unwrap();

    assert_eq!(resolution.groupers.len(), 1);
    assert_eq!(resolution.codes().len(), 2);
    assert_eq!(resolution.skipped.len(), 1);
    assert_eq!(resolution.skipped[0].0, pertussis);
}

#[tokio::test]
async fn test_unavailable_service_fails_refinement() {
    let mut server = mockito::Server::new_async().await;
    let _mock = server
        .mock("GET", "/api/v1/groupers/840539006")
        .with_status(403)
        .create_async()
        .await;

    let client = HttpTerminologyClient::new(&config(&server, Some("expired"))).unwrap();
    let refiner = Refiner::new(Arc::new(SectionCatalog::builtin()), Arc::new(client));
    let document = Document::new(
        common::eicr(
            common::EICR_V1_1,
            &[common::section(common::RESULTS, "Results", &[])],
        ),
        None,
    );

    let err = refiner
        .refine(&document, &SectionActions::new(), &[vec![covid()]])
        .await
        .unwrap_err();
    assert!(matches!(err, RefinerError::Lookup(LookupError::Unavailable(_))));
    assert!(!err.is_client_error());
}
