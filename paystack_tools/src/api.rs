use std::{sync::Arc, time::Duration};

use log::*;
use reqwest::{
    header::{HeaderMap, HeaderValue},
    Client,
    Method,
};
use serde::de::DeserializeOwned;

use crate::{config::PaystackConfig, data_objects::VerifyResponse, PaystackApiError, TransactionData};

/// Thin REST client for the card gateway's admin API. Verification is the only call the payment engine makes;
/// it is a read-only lookup and is never retried here. Retry policy belongs to whoever drives the pipeline.
#[derive(Clone)]
pub struct PaystackApi {
    config: PaystackConfig,
    client: Arc<Client>,
}

impl PaystackApi {
    pub fn new(config: PaystackConfig) -> Result<Self, PaystackApiError> {
        let mut headers = HeaderMap::with_capacity(2);
        let bearer = format!("Bearer {}", config.secret_key.reveal());
        let val = HeaderValue::from_str(&bearer).map_err(|e| PaystackApiError::Initialization(e.to_string()))?;
        headers.insert("Authorization", val);
        headers.insert("Content-Type", HeaderValue::from_static("application/json"));
        let client = Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| PaystackApiError::Initialization(e.to_string()))?;
        Ok(Self { config, client: Arc::new(client) })
    }

    pub async fn rest_query<T: DeserializeOwned>(&self, method: Method, path: &str) -> Result<T, PaystackApiError> {
        let url = self.url(path);
        trace!("Sending REST query: {url}");
        let req = self.client.request(method, url);
        let response = req.send().await.map_err(|e| PaystackApiError::TransportError(e.to_string()))?;
        if response.status().is_success() {
            trace!("REST query successful. {}", response.status());
            response.json::<T>().await.map_err(|e| PaystackApiError::JsonError(e.to_string()))
        } else {
            let status = response.status().as_u16();
            let message = response.text().await.map_err(|e| PaystackApiError::TransportError(e.to_string()))?;
            Err(PaystackApiError::QueryError { status, message })
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.config.api_url)
    }

    /// Look up the authoritative state of a transaction by its reference.
    ///
    /// A `Ok` here only means the *lookup* succeeded; callers must still inspect `TransactionData::status` to
    /// learn whether the charge itself went through.
    pub async fn verify_transaction(&self, reference: &str) -> Result<TransactionData, PaystackApiError> {
        let path = format!("/transaction/verify/{reference}");
        debug!("Verifying transaction [{reference}]");
        let result = self.rest_query::<VerifyResponse>(Method::GET, &path).await?;
        if !result.status {
            return Err(PaystackApiError::QueryError { status: 200, message: result.message });
        }
        let data = result
            .data
            .ok_or_else(|| PaystackApiError::JsonError("Verification response carried no data object".to_string()))?;
        info!("Verified transaction [{reference}]: gateway says '{}'", data.status);
        Ok(data)
    }
}
