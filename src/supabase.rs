//! Supabase (PostgREST) client for the hosted backend.
//!
//! Talks to the `customers` and `transactions` tables and the
//! `generate_receipt_number` RPC. The guarded counter update is expressed
//! as a row-filtered `PATCH`: the guard columns ride along as `eq.`
//! filters, so the check and the write are a single request and a stale
//! snapshot simply matches zero rows.

use reqwest::{Client, Method, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::time::Duration;
use tracing::{info, warn};

use crate::config::StoreConfig;
use crate::error::PosError;
use crate::store::{
    AdminAccount, CounterGuard, Customer, CustomerCounters, TransactionFilter, TransactionRecord,
    TransactionStore,
};
use crate::validation::validate_receipt_number;

/// Default timeout for store requests (30 seconds).
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

// ---------------------------------------------------------------------------
// URL normalisation
// ---------------------------------------------------------------------------

/// Normalise the store URL:
/// - strip trailing slashes
/// - strip a trailing `/rest/v1` segment
/// - ensure a scheme is present (https, or http for localhost)
pub fn normalize_store_url(url: &str) -> String {
    let mut url = url.trim().to_string();

    // Ensure scheme
    if !url.starts_with("http://") && !url.starts_with("https://") {
        if url.starts_with("localhost") || url.starts_with("127.0.0.1") {
            url = format!("http://{url}");
        } else {
            url = format!("https://{url}");
        }
    }

    // Strip trailing slashes
    while url.ends_with('/') {
        url.pop();
    }

    // Strip trailing /rest/v1
    if url.ends_with("/rest/v1") {
        url.truncate(url.len() - 8);
    }

    while url.ends_with('/') {
        url.pop();
    }

    url
}

// ---------------------------------------------------------------------------
// Error mapping
// ---------------------------------------------------------------------------

/// Convert a `reqwest::Error` into a user-friendly message.
fn friendly_error(url: &str, err: &reqwest::Error) -> String {
    if err.is_connect() {
        return format!("Cannot reach the transaction store at {url}");
    }
    if err.is_timeout() {
        return format!("Connection to {url} timed out");
    }
    if err.is_builder() {
        return format!("Invalid store URL: {url}");
    }
    format!("Network error communicating with {url}: {err}")
}

/// Convert an HTTP status code into a user-friendly message.
fn status_error(status: StatusCode) -> String {
    match status.as_u16() {
        401 => "Store API key is invalid or expired".to_string(),
        403 => "This terminal is not authorized for that operation".to_string(),
        404 => "Store endpoint not found".to_string(),
        s if s >= 500 => format!("Store server error (HTTP {s})"),
        s => format!("Unexpected response from the store (HTTP {s})"),
    }
}

/// Build the diagnostic detail for a failed response, preserving the
/// PostgREST error payload (`message`/`details`/`hint`) when present.
fn response_detail(status: StatusCode, body: &str) -> String {
    if let Ok(json) = serde_json::from_str::<Value>(body) {
        let message = json
            .get("message")
            .or_else(|| json.get("error"))
            .and_then(Value::as_str)
            .map(|s| s.to_string())
            .unwrap_or_else(|| status_error(status));
        if let Some(details) = json.get("details").or_else(|| json.get("hint")).and_then(Value::as_str) {
            return format!("{message} (HTTP {}): {details}", status.as_u16());
        }
        return format!("{message} (HTTP {})", status.as_u16());
    }
    if !body.trim().is_empty() {
        format!("{} (HTTP {}): {}", status_error(status), status.as_u16(), body.trim())
    } else {
        format!("{} (HTTP {})", status_error(status), status.as_u16())
    }
}

// ---------------------------------------------------------------------------
// Query helpers
// ---------------------------------------------------------------------------

/// Percent-encode a single query value (phones carry `+`, categories carry
/// spaces).
fn encode_component(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for byte in value.bytes() {
        match byte {
            b'a'..=b'z' | b'A'..=b'Z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(byte as char)
            }
            _ => out.push_str(&format!("%{byte:02X}")),
        }
    }
    out
}

/// Format an amount for an `eq.` filter: whole naira without a decimal
/// point, fractional amounts with two places (numeric comparison on the
/// server side ignores trailing zeros).
fn fmt_amount(amount: f64) -> String {
    if amount == amount.trunc() {
        format!("{}", amount as i64)
    } else {
        format!("{amount:.2}")
    }
}

/// Build the query string for a transaction listing.
fn build_list_query(filter: &TransactionFilter) -> String {
    let mut query = String::from("select=*&order=transaction_date.desc");
    if let Some(from) = filter.from {
        query.push_str(&format!(
            "&transaction_date=gte.{}",
            from.to_rfc3339_opts(chrono::SecondsFormat::Secs, true)
        ));
    }
    if let Some(to) = filter.to {
        query.push_str(&format!(
            "&transaction_date=lte.{}",
            to.to_rfc3339_opts(chrono::SecondsFormat::Secs, true)
        ));
    }
    if let Some(category) = filter.category {
        query.push_str(&format!(
            "&service_category=eq.{}",
            encode_component(category.label())
        ));
    }
    if let Some(ref needle) = filter.needle {
        // Strip PostgREST structural characters before embedding in or=().
        let clean: String = needle
            .chars()
            .filter(|c| !matches!(c, ',' | '(' | ')' | '*'))
            .collect();
        let clean = clean.trim();
        if !clean.is_empty() {
            let pattern = encode_component(&format!("*{clean}*"));
            query.push_str(&format!(
                "&or=(customer_name.ilike.{pattern},customer_phone.ilike.{pattern},receipt_number.ilike.{pattern})"
            ));
        }
    }
    query
}

// ---------------------------------------------------------------------------
// The client
// ---------------------------------------------------------------------------

pub struct SupabaseStore {
    client: Client,
    base_url: String,
    api_key: String,
}

impl SupabaseStore {
    pub fn new(config: &StoreConfig) -> Result<Self, PosError> {
        let client = Client::builder()
            .timeout(DEFAULT_TIMEOUT)
            .build()
            .map_err(|e| PosError::Remote(format!("Failed to create HTTP client: {e}")))?;
        Ok(Self {
            client,
            base_url: normalize_store_url(&config.url),
            api_key: config.anon_key.clone(),
        })
    }

    fn rest_url(&self, path_and_query: &str) -> String {
        format!("{}/rest/v1{path_and_query}", self.base_url)
    }

    fn request(&self, method: Method, url: &str) -> reqwest::RequestBuilder {
        self.client
            .request(method, url)
            .header("apikey", &self.api_key)
            .bearer_auth(&self.api_key)
            .header("Content-Type", "application/json")
    }

    async fn execute(
        &self,
        req: reqwest::RequestBuilder,
    ) -> Result<(StatusCode, String), PosError> {
        let resp = req
            .send()
            .await
            .map_err(|e| PosError::Remote(friendly_error(&self.base_url, &e)))?;
        let status = resp.status();
        let body = resp.text().await.unwrap_or_default();
        Ok((status, body))
    }

    /// GET a row set and deserialize it.
    async fn get_rows<T: DeserializeOwned>(
        &self,
        path_and_query: &str,
    ) -> Result<Vec<T>, PosError> {
        let url = self.rest_url(path_and_query);
        let (status, body) = self.execute(self.request(Method::GET, &url)).await?;
        if !status.is_success() {
            return Err(PosError::Remote(response_detail(status, &body)));
        }
        serde_json::from_str(&body)
            .map_err(|e| PosError::Remote(format!("Invalid JSON from the store: {e}")))
    }
}

impl TransactionStore for SupabaseStore {
    async fn fetch_customer(&self, phone: &str) -> Result<Option<Customer>, PosError> {
        let query = format!(
            "/customers?select=*&phone_number=eq.{}&limit=1",
            encode_component(phone)
        );
        let mut rows: Vec<Customer> = self.get_rows(&query).await?;
        Ok(rows.pop())
    }

    async fn create_customer(&self, customer: &Customer) -> Result<(), PosError> {
        let url = self.rest_url("/customers");
        let (status, body) = self
            .execute(
                self.request(Method::POST, &url)
                    .header("Prefer", "return=minimal")
                    .json(customer),
            )
            .await?;
        if status == StatusCode::CONFLICT {
            // Duplicate primary key: another terminal created the row first.
            return Err(PosError::Conflict {
                phone: customer.phone_number.clone(),
            });
        }
        if !status.is_success() {
            return Err(PosError::Remote(response_detail(status, &body)));
        }
        Ok(())
    }

    async fn update_customer_counters(
        &self,
        phone: &str,
        guard: CounterGuard,
        counters: CustomerCounters,
    ) -> Result<(), PosError> {
        // The guard columns are part of the row filter: if the snapshot is
        // stale the PATCH matches zero rows and nothing is written.
        let query = format!(
            "/customers?phone_number=eq.{}&total_transactions=eq.{}&cashback_balance=eq.{}",
            encode_component(phone),
            guard.total_transactions,
            fmt_amount(guard.cashback_balance),
        );
        let url = self.rest_url(&query);
        let (status, body) = self
            .execute(
                self.request(Method::PATCH, &url)
                    .header("Prefer", "return=representation")
                    .json(&counters),
            )
            .await?;
        if !status.is_success() {
            return Err(PosError::Remote(response_detail(status, &body)));
        }
        let updated: Vec<Value> = serde_json::from_str(&body)
            .map_err(|e| PosError::Remote(format!("Invalid JSON from the store: {e}")))?;
        if updated.is_empty() {
            warn!(phone, "guarded customer update matched no rows");
            return Err(PosError::Conflict {
                phone: phone.to_string(),
            });
        }
        Ok(())
    }

    async fn insert_transaction(&self, record: &TransactionRecord) -> Result<(), PosError> {
        let url = self.rest_url("/transactions");
        let (status, body) = self
            .execute(
                self.request(Method::POST, &url)
                    .header("Prefer", "return=minimal")
                    .json(record),
            )
            .await?;
        if !status.is_success() {
            return Err(PosError::Remote(response_detail(status, &body)));
        }
        Ok(())
    }

    async fn generate_receipt_number(&self) -> Result<String, PosError> {
        let url = format!("{}/rest/v1/rpc/generate_receipt_number", self.base_url);
        let (status, body) = self
            .execute(self.request(Method::POST, &url).json(&serde_json::json!({})))
            .await?;
        if !status.is_success() {
            return Err(PosError::Remote(response_detail(status, &body)));
        }
        let receipt_number: String = serde_json::from_str(&body)
            .map_err(|e| PosError::Remote(format!("Invalid receipt number payload: {e}")))?;
        if !validate_receipt_number(&receipt_number) {
            return Err(PosError::Remote(format!(
                "Store returned a malformed receipt number: {receipt_number}"
            )));
        }
        Ok(receipt_number)
    }

    async fn list_transactions(
        &self,
        filter: &TransactionFilter,
    ) -> Result<Vec<TransactionRecord>, PosError> {
        let query = format!("/transactions?{}", build_list_query(filter));
        self.get_rows(&query).await
    }

    async fn fetch_admin(&self, username: &str) -> Result<Option<AdminAccount>, PosError> {
        let query = format!(
            "/admin?select=*&username=eq.{}&limit=1",
            encode_component(username)
        );
        let mut rows: Vec<AdminAccount> = self.get_rows(&query).await?;
        Ok(rows.pop())
    }

    async fn delete_customer(&self, phone: &str) -> Result<(), PosError> {
        let url = self.rest_url(&format!(
            "/customers?phone_number=eq.{}",
            encode_component(phone)
        ));
        let (status, body) = self.execute(self.request(Method::DELETE, &url)).await?;
        if !status.is_success() {
            return Err(PosError::Remote(response_detail(status, &body)));
        }
        info!(phone, "customer deleted");
        Ok(())
    }

    async fn wipe_history(&self) -> Result<(), PosError> {
        // PostgREST refuses unfiltered mutations; `not.is.null` on the key
        // column matches every row.
        let url = self.rest_url("/transactions?id=not.is.null");
        let (status, body) = self.execute(self.request(Method::DELETE, &url)).await?;
        if !status.is_success() {
            return Err(PosError::Remote(response_detail(status, &body)));
        }

        let url = self.rest_url("/customers?phone_number=not.is.null");
        let reset = CustomerCounters {
            total_transactions: 0,
            total_spent: 0.0,
            cashback_balance: 0.0,
        };
        let (status, body) = self
            .execute(
                self.request(Method::PATCH, &url)
                    .header("Prefer", "return=minimal")
                    .json(&reset),
            )
            .await?;
        if !status.is_success() {
            return Err(PosError::Remote(response_detail(status, &body)));
        }
        warn!("all transaction history cleared and customer counters reset");
        Ok(())
    }
}

// ===========================================================================
// Tests
// ===========================================================================
