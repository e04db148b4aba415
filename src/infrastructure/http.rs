use crate::config::{LedgerConfig, PaymentConfig};
use crate::domain::batch::{BatchItemRequest, BatchItemResult};
use crate::domain::loan::{LoanCandidate, StaffId};
use crate::domain::ports::{BatchCommandService, CandidateSource, PaymentTransferService};
use crate::domain::transfer::{TransferReceipt, TransferRequest};
use crate::error::{DisbursalError, Result};
use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

/// Header carrying the ledger tenant.
pub const LEDGER_TENANT_HEADER: &str = "Fineract-Platform-TenantId";
/// Header carrying the payment-hub tenant.
pub const PAYMENT_TENANT_HEADER: &str = "Platform-TenantId";

/// JSON client for the core ledger's REST API.
#[derive(Clone)]
pub struct LedgerClient {
    http: reqwest::Client,
    config: LedgerConfig,
}

impl LedgerClient {
    pub fn new(config: LedgerConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()?;
        Ok(Self { http, config })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.config.base_url.trim_end_matches('/'), path)
    }

    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        self.http
            .request(method, self.url(path))
            .header(LEDGER_TENANT_HEADER, &self.config.tenant)
            .basic_auth(&self.config.username, Some(&self.config.password))
    }
}

#[async_trait]
impl BatchCommandService for LedgerClient {
    async fn submit_batch(&self, requests: &[BatchItemRequest]) -> Result<Vec<BatchItemResult>> {
        debug!(rows = requests.len(), "POST batches");
        let response = self
            .request(reqwest::Method::POST, "batches")
            .query(&[("enclosingTransaction", "false")])
            .json(requests)
            .send()
            .await
            .map_err(|e| DisbursalError::BatchSubmissionFailed(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(DisbursalError::BatchSubmissionFailed(format!(
                "ledger returned {status}: {body}"
            )));
        }

        response
            .json()
            .await
            .map_err(|e| {
                DisbursalError::BatchSubmissionFailed(format!("unreadable batch response: {e}"))
            })
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LoanPage {
    #[serde(default)]
    page_items: Vec<LoanCandidate>,
}

#[async_trait]
impl CandidateSource for LedgerClient {
    async fn loans_awaiting_disbursal(&self, staff: Option<StaffId>) -> Result<Vec<LoanCandidate>> {
        let mut request = self.request(reqwest::Method::GET, "loans");
        if let Some(staff) = staff {
            request = request.query(&[("staffId", staff)]);
        }
        let page: LoanPage = request.send().await?.error_for_status()?.json().await?;
        debug!(loans = page.page_items.len(), "Fetched loan listing");
        Ok(page.page_items)
    }
}

/// JSON client for the payment hub's B2C transfer endpoint.
#[derive(Clone)]
pub struct PaymentHubClient {
    http: reqwest::Client,
    config: PaymentConfig,
}

impl PaymentHubClient {
    pub fn new(config: PaymentConfig) -> Result<Self> {
        let http = reqwest::Client::builder().build()?;
        Ok(Self { http, config })
    }
}

#[async_trait]
impl PaymentTransferService for PaymentHubClient {
    async fn initiate_transfer(&self, request: &TransferRequest) -> Result<TransferReceipt> {
        let url = format!(
            "{}/channel/transfer",
            self.config.base_url.trim_end_matches('/')
        );
        let response = self
            .http
            .post(url)
            .header(PAYMENT_TENANT_HEADER, &self.config.tenant)
            .header("X-CorrelationID", &request.transaction_id)
            .json(request)
            .send()
            .await
            .map_err(|e| DisbursalError::TransferFailed {
                loan_id: request.loan_id,
                reason: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(DisbursalError::TransferFailed {
                loan_id: request.loan_id,
                reason: format!("payment hub returned {status}: {body}"),
            });
        }

        // An empty body is a valid acknowledgement.
        let bytes = response.bytes().await?;
        if bytes.is_empty() {
            return Ok(TransferReceipt::default());
        }
        Ok(serde_json::from_slice(&bytes).unwrap_or_default())
    }
}
