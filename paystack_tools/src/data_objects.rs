use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Envelope returned by `GET /transaction/verify/{reference}`.
///
/// `status` reports whether the *lookup* succeeded; the transaction's own outcome lives in `data.status`.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct VerifyResponse {
    pub status: bool,
    #[serde(default)]
    pub message: String,
    pub data: Option<TransactionData>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TransactionData {
    pub reference: String,
    /// "success", "failed", "abandoned", ...
    pub status: String,
    /// Amount charged, in minor currency units.
    pub amount: i64,
    #[serde(default)]
    pub currency: String,
    #[serde(default, deserialize_with = "lenient_i64")]
    pub fees: Option<i64>,
    pub paid_at: Option<DateTime<Utc>>,
    pub gateway_response: Option<String>,
    /// Metadata echoed back from transaction initialization. The gateway round-trips this as loosely typed
    /// JSON (numbers frequently come back as strings), so every field is optional and leniently parsed.
    #[serde(default, deserialize_with = "lenient_metadata")]
    pub metadata: Option<TransactionMetadata>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct TransactionMetadata {
    #[serde(default, deserialize_with = "lenient_string")]
    pub vendor_id: Option<String>,
    #[serde(default, deserialize_with = "lenient_i64")]
    pub food_amount: Option<i64>,
    #[serde(default, deserialize_with = "lenient_i64")]
    pub delivery_fee: Option<i64>,
    #[serde(default, deserialize_with = "lenient_i64")]
    pub vat_amount: Option<i64>,
    #[serde(default, deserialize_with = "lenient_i64")]
    pub service_request_id: Option<i64>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub order_id: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub payment_id: Option<String>,
}

/// Accepts `123`, `"123"`, `"123.0"` or null.
fn lenient_i64<'de, D: Deserializer<'de>>(de: D) -> Result<Option<i64>, D::Error> {
    let v = Option::<Value>::deserialize(de)?;
    Ok(v.and_then(|v| match v {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f.round() as i64)),
        Value::String(s) => {
            let s = s.trim();
            s.parse::<i64>().ok().or_else(|| s.parse::<f64>().ok().map(|f| f.round() as i64))
        },
        _ => None,
    }))
}

/// Accepts strings and bare numbers (vendor ids are numeric in some client builds).
fn lenient_string<'de, D: Deserializer<'de>>(de: D) -> Result<Option<String>, D::Error> {
    let v = Option::<Value>::deserialize(de)?;
    Ok(v.and_then(|v| match v {
        Value::String(s) if !s.trim().is_empty() => Some(s),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }))
}

/// The metadata field itself is sometimes the literal string `""` rather than an object.
fn lenient_metadata<'de, D: Deserializer<'de>>(de: D) -> Result<Option<TransactionMetadata>, D::Error> {
    let v = Option::<Value>::deserialize(de)?;
    match v {
        Some(v @ Value::Object(_)) => serde_json::from_value(v).map(Some).map_err(serde::de::Error::custom),
        _ => Ok(None),
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn deserialize_successful_verification() {
        let body = r#"{
            "status": true,
            "message": "Verification successful",
            "data": {
                "reference": "MPS-1001",
                "status": "success",
                "amount": 10000,
                "currency": "NGN",
                "fees": "150",
                "paid_at": "2024-06-01T10:15:00Z",
                "gateway_response": "Successful",
                "metadata": {
                    "vendor_id": 42,
                    "food_amount": "9000",
                    "delivery_fee": 500,
                    "vat_amount": "500"
                }
            }
        }"#;
        let resp: VerifyResponse = serde_json::from_str(body).unwrap();
        assert!(resp.status);
        let data = resp.data.unwrap();
        assert_eq!(data.status, "success");
        assert_eq!(data.amount, 10000);
        assert_eq!(data.fees, Some(150));
        let meta = data.metadata.unwrap();
        assert_eq!(meta.vendor_id.as_deref(), Some("42"));
        assert_eq!(meta.food_amount, Some(9000));
        assert_eq!(meta.vat_amount, Some(500));
        assert_eq!(meta.service_request_id, None);
    }

    #[test]
    fn deserialize_empty_metadata_string() {
        let body = r#"{
            "status": true,
            "message": "Verification successful",
            "data": { "reference": "MPS-1002", "status": "failed", "amount": 5000, "metadata": "" }
        }"#;
        let resp: VerifyResponse = serde_json::from_str(body).unwrap();
        let data = resp.data.unwrap();
        assert_eq!(data.status, "failed");
        assert!(data.metadata.is_none());
    }
}
