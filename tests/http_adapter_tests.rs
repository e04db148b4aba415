mod common;

use chrono::{NaiveDate, Utc};
use loan_disbursal::config::{LedgerConfig, PaymentConfig};
use loan_disbursal::domain::batch::{BatchItemRequest, DisburseCommand};
use loan_disbursal::domain::ports::{BatchCommandService, CandidateSource, PaymentTransferService};
use loan_disbursal::domain::transfer::TransferRequest;
use loan_disbursal::error::DisbursalError;
use loan_disbursal::infrastructure::http::{
    LEDGER_TENANT_HEADER, LedgerClient, PAYMENT_TENANT_HEADER, PaymentHubClient,
};
use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn ledger_config(server: &MockServer) -> LedgerConfig {
    LedgerConfig {
        base_url: format!("{}/api/v1", server.uri()),
        tenant: "default".to_string(),
        ..LedgerConfig::default()
    }
}

fn payment_config(server: &MockServer) -> PaymentConfig {
    PaymentConfig {
        base_url: server.uri(),
        tenant: "gorilla".to_string(),
        ..PaymentConfig::default()
    }
}

fn disburse_rows() -> Vec<BatchItemRequest> {
    let date = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap();
    let command = DisburseCommand::new(date, "en", "dd MMMM yyyy");
    vec![
        BatchItemRequest::disburse(1, 11, &command).unwrap(),
        BatchItemRequest::disburse(2, 12, &command).unwrap(),
    ]
}

#[tokio::test]
async fn test_ledger_batch_round_trip() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v1/batches"))
        .and(query_param("enclosingTransaction", "false"))
        .and(header(LEDGER_TENANT_HEADER, "default"))
        .and(body_partial_json(json!([
            { "requestId": 1, "relativeUrl": "loans/11?command=disburse", "method": "POST" },
            { "requestId": 2, "relativeUrl": "loans/12?command=disburse", "method": "POST" }
        ])))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "requestId": 2, "statusCode": 403, "body": "{\"defaultUserMessage\":\"Loan is not approved\"}" },
            { "requestId": 1, "statusCode": 200, "body": "{\"resourceId\":11}" }
        ])))
        .expect(1)
        .mount(&server)
        .await;

    let client = LedgerClient::new(ledger_config(&server)).unwrap();
    let results = client.submit_batch(&disburse_rows()).await.unwrap();

    assert_eq!(results.len(), 2);
    let first = results.iter().find(|r| r.request_id == 1).unwrap();
    assert!(first.is_success());
    let second = results.iter().find(|r| r.request_id == 2).unwrap();
    assert_eq!(second.status_code, "403");
}

#[tokio::test]
async fn test_ledger_batch_http_error_is_submission_failure() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v1/batches"))
        .respond_with(ResponseTemplate::new(503).set_body_string("maintenance"))
        .mount(&server)
        .await;

    let client = LedgerClient::new(ledger_config(&server)).unwrap();
    let result = client.submit_batch(&disburse_rows()).await;

    assert!(matches!(
        result,
        Err(DisbursalError::BatchSubmissionFailed(msg)) if msg.contains("503")
    ));
}

#[tokio::test]
async fn test_ledger_listing_passes_staff_filter() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/loans"))
        .and(query_param("staffId", "4"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "totalFilteredRecords": 1,
            "pageItems": [{
                "id": 77,
                "accountNo": "000000077",
                "clientName": "Faith Njeri",
                "loanProductName": "Starter",
                "principal": 12000,
                "status": { "waitingForDisbursal": true },
                "loanOfficerId": 4
            }]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = LedgerClient::new(ledger_config(&server)).unwrap();
    let loans = client.loans_awaiting_disbursal(Some(4)).await.unwrap();

    assert_eq!(loans.len(), 1);
    assert_eq!(loans[0].id, 77);
    assert_eq!(loans[0].staff_id, Some(4));
}

#[tokio::test]
async fn test_payment_hub_transfer() {
    let server = MockServer::start().await;
    let request = TransferRequest::for_loan(
        &common::loan(5),
        &PaymentConfig::default().sender,
        "KES",
        Utc::now(),
    )
    .unwrap();

    Mock::given(method("POST"))
        .and(path("/channel/transfer"))
        .and(header(PAYMENT_TENANT_HEADER, "gorilla"))
        .and(body_partial_json(json!({
            "currency": "KES",
            "transactionId": request.transaction_id.clone(),
            "to": { "partyIdType": "MSISDN", "partyIdentifier": "254711000005" }
        })))
        .respond_with(ResponseTemplate::new(202).set_body_json(json!({ "transactionId": "hub-1" })))
        .expect(1)
        .mount(&server)
        .await;

    let client = PaymentHubClient::new(payment_config(&server)).unwrap();
    let receipt = client.initiate_transfer(&request).await.unwrap();

    assert_eq!(receipt.transaction_id.as_deref(), Some("hub-1"));
}

#[tokio::test]
async fn test_payment_hub_rejection_is_transfer_failure() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/channel/transfer"))
        .respond_with(ResponseTemplate::new(400).set_body_string("invalid msisdn"))
        .mount(&server)
        .await;

    let request = TransferRequest::for_loan(
        &common::loan(6),
        &PaymentConfig::default().sender,
        "KES",
        Utc::now(),
    )
    .unwrap();
    let client = PaymentHubClient::new(payment_config(&server)).unwrap();

    match client.initiate_transfer(&request).await {
        Err(DisbursalError::TransferFailed { loan_id, reason }) => {
            assert_eq!(loan_id, 6);
            assert!(reason.contains("invalid msisdn"));
        }
        other => panic!("expected TransferFailed, got {other:?}"),
    }
}
