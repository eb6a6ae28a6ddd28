use serde::Deserialize;
use serde_json::json;

use crate::config::AppConfig;
use crate::error::AppError;

/// Consumed interface of the external per-property ledger.
///
/// A ledger is a tabular document addressed by an opaque id plus a named
/// sheet and A1-style ranges. The pipeline needs exactly three
/// capabilities: read a range, write one cell, and append one row at the
/// first empty row of a range.
pub trait LedgerApi {
    fn read_range(
        &self,
        document_id: &str,
        sheet: &str,
        range: &str,
    ) -> impl std::future::Future<Output = Result<Vec<Vec<String>>, AppError>> + Send;

    fn write_cell(
        &self,
        document_id: &str,
        sheet: &str,
        address: &str,
        value: &str,
    ) -> impl std::future::Future<Output = Result<(), AppError>> + Send;

    fn append_row(
        &self,
        document_id: &str,
        sheet: &str,
        range: &str,
        values: &[String],
    ) -> impl std::future::Future<Output = Result<(), AppError>> + Send;
}

#[derive(Debug, Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<String>>,
}

/// HTTP client for the spreadsheet-backed ledger API.
///
/// Constructed once from [`AppConfig`] in `main` and injected into the
/// sync service. Errors surface verbatim as upstream errors; there is no
/// retry at this layer.
#[derive(Debug, Clone)]
pub struct SheetsLedgerClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl SheetsLedgerClient {
    pub fn new(config: &AppConfig) -> Self {
        SheetsLedgerClient {
            http: reqwest::Client::new(),
            base_url: config.ledger_base_url.clone(),
            api_key: config.ledger_api_key.clone(),
        }
    }

    fn values_url(&self, document_id: &str, sheet: &str, reference: &str) -> String {
        format!(
            "{}/v1/documents/{}/values/{}!{}",
            self.base_url, document_id, sheet, reference
        )
    }
}

impl LedgerApi for SheetsLedgerClient {
    async fn read_range(
        &self,
        document_id: &str,
        sheet: &str,
        range: &str,
    ) -> Result<Vec<Vec<String>>, AppError> {
        let response = self
            .http
            .get(self.values_url(document_id, sheet, range))
            .bearer_auth(&self.api_key)
            .send()
            .await?
            .error_for_status()?;

        let body: ValueRange = response.json().await?;
        Ok(body.values)
    }

    async fn write_cell(
        &self,
        document_id: &str,
        sheet: &str,
        address: &str,
        value: &str,
    ) -> Result<(), AppError> {
        self.http
            .put(self.values_url(document_id, sheet, address))
            .bearer_auth(&self.api_key)
            .json(&json!({ "values": [[value]] }))
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }

    async fn append_row(
        &self,
        document_id: &str,
        sheet: &str,
        range: &str,
        values: &[String],
    ) -> Result<(), AppError> {
        let url = format!("{}:append", self.values_url(document_id, sheet, range));
        self.http
            .post(url)
            .bearer_auth(&self.api_key)
            .json(&json!({ "values": [values] }))
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }
}
