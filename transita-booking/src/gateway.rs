use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use serde::Deserialize;
use serde_json::json;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::warn;

use transita_core::payment::{GatewayError, GatewayVerdict, InitiatedPayment, PaymentGateway};
use transita_store::app_config::GatewayConfig;

const PAY_PATH: &str = "/pg/v1/pay";

/// Client for PhonePe's page-redirect checkout. Every request carries an
/// X-VERIFY checksum: sha256 of the request material concatenated with the
/// salt key, suffixed with the salt index.
pub struct PhonePeGateway {
    http: reqwest::Client,
    config: GatewayConfig,
}

impl PhonePeGateway {
    pub fn new(config: GatewayConfig) -> Result<Self, GatewayError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|e| GatewayError::Transport(e.to_string()))?;
        Ok(Self { http, config })
    }

    fn x_verify(&self, material: &str) -> String {
        checksum(material, &self.config.salt_key, &self.config.salt_index)
    }
}

fn checksum(material: &str, salt_key: &str, salt_index: &str) -> String {
    let digest = Sha256::digest(format!("{}{}", material, salt_key).as_bytes());
    format!("{}###{}", hex::encode(digest), salt_index)
}

fn map_transport(e: reqwest::Error) -> GatewayError {
    if e.is_timeout() {
        GatewayError::Timeout
    } else {
        GatewayError::Transport(e.to_string())
    }
}

#[derive(Debug, Deserialize)]
struct PayResponse {
    success: bool,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    data: Option<PayData>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PayData {
    #[serde(default)]
    instrument_response: Option<InstrumentResponse>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InstrumentResponse {
    #[serde(default)]
    redirect_info: Option<RedirectInfo>,
}

#[derive(Debug, Deserialize)]
struct RedirectInfo {
    url: String,
}

#[derive(Debug, Deserialize)]
struct StatusResponse {
    #[serde(default)]
    code: Option<String>,
}

#[async_trait]
impl PaymentGateway for PhonePeGateway {
    async fn initiate(
        &self,
        requester_id: &str,
        transaction_id: &str,
        amount: i64,
    ) -> Result<InitiatedPayment, GatewayError> {
        let payload = json!({
            "merchantId": self.config.merchant_id,
            "merchantTransactionId": transaction_id,
            "merchantUserId": requester_id,
            "amount": amount,
            "redirectUrl": format!("{}/{}", self.config.redirect_url, transaction_id),
            "redirectMode": "REDIRECT",
            "paymentInstrument": { "type": "PAY_PAGE" },
            "callbackUrl": self.config.callback_url,
        });

        let encoded = BASE64.encode(payload.to_string());
        let x_verify = self.x_verify(&format!("{}{}", encoded, PAY_PATH));

        let response = self
            .http
            .post(format!("{}{}", self.config.base_url, PAY_PATH))
            .header("X-VERIFY", x_verify)
            .header("accept", "application/json")
            .json(&json!({ "request": encoded }))
            .send()
            .await
            .map_err(map_transport)?;

        let body: PayResponse = response.json().await.map_err(map_transport)?;
        if !body.success {
            return Err(GatewayError::Rejected(
                body.message
                    .unwrap_or_else(|| "payment initiation failed".to_string()),
            ));
        }

        let redirect_url = body
            .data
            .and_then(|d| d.instrument_response)
            .and_then(|i| i.redirect_info)
            .map(|r| r.url)
            .ok_or_else(|| {
                GatewayError::Rejected("provider response carried no redirect target".to_string())
            })?;

        Ok(InitiatedPayment {
            transaction_id: transaction_id.to_string(),
            redirect_url,
        })
    }

    async fn check_status(&self, transaction_id: &str) -> Result<GatewayVerdict, GatewayError> {
        let path = format!(
            "/pg/v1/status/{}/{}",
            self.config.merchant_id, transaction_id
        );
        let x_verify = self.x_verify(&path);

        let response = self
            .http
            .get(format!("{}{}", self.config.base_url, path))
            .header("X-VERIFY", x_verify)
            .header("accept", "application/json")
            .send()
            .await
            .map_err(map_transport)?;

        let body: StatusResponse = response.json().await.map_err(map_transport)?;
        Ok(classify_provider_code(body.code.as_deref()))
    }
}

/// Anything the provider reports that is neither success nor still in
/// flight settles as failed.
pub fn classify_provider_code(code: Option<&str>) -> GatewayVerdict {
    match code {
        Some("PAYMENT_SUCCESS") => GatewayVerdict::Success,
        Some("PAYMENT_PENDING") => GatewayVerdict::Pending,
        other => {
            if other.is_none() {
                warn!("provider status response carried no code, settling as failed");
            }
            GatewayVerdict::Failed
        }
    }
}

/// Scripted stand-in for the provider, used in tests and local wiring.
/// Verdicts default to Pending until set; initiate can be armed to fail
/// once to exercise the compensation path.
pub struct MockPaymentGateway {
    fail_next_initiate: AtomicBool,
    verdicts: Mutex<HashMap<String, GatewayVerdict>>,
}

impl MockPaymentGateway {
    pub fn new() -> Self {
        Self {
            fail_next_initiate: AtomicBool::new(false),
            verdicts: Mutex::new(HashMap::new()),
        }
    }

    pub fn fail_next_initiate(&self) {
        self.fail_next_initiate.store(true, Ordering::SeqCst);
    }

    pub async fn set_verdict(&self, transaction_id: &str, verdict: GatewayVerdict) {
        self.verdicts
            .lock()
            .await
            .insert(transaction_id.to_string(), verdict);
    }
}

impl Default for MockPaymentGateway {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PaymentGateway for MockPaymentGateway {
    async fn initiate(
        &self,
        _requester_id: &str,
        transaction_id: &str,
        _amount: i64,
    ) -> Result<InitiatedPayment, GatewayError> {
        if self.fail_next_initiate.swap(false, Ordering::SeqCst) {
            return Err(GatewayError::Transport(
                "simulated provider outage".to_string(),
            ));
        }
        Ok(InitiatedPayment {
            transaction_id: transaction_id.to_string(),
            redirect_url: format!("https://pay.example.test/redirect/{}", transaction_id),
        })
    }

    async fn check_status(&self, transaction_id: &str) -> Result<GatewayVerdict, GatewayError> {
        Ok(self
            .verdicts
            .lock()
            .await
            .get(transaction_id)
            .copied()
            .unwrap_or(GatewayVerdict::Pending))
    }
}
