//! Payment gateway adapters.
//!
//! `HttpPaymentGateway` talks to a virtual-account style REST API over
//! reqwest. Raw replies are decoded into optional-field wire structs and then
//! validated, so a reply missing a field becomes
//! `RentalError::UpstreamContractViolation` and never a panic.

use crate::config::GatewayConfig;
use crate::domain::money::Money;
use crate::domain::payment::{ExternalRef, PaymentConfirmation, PaymentInstrument, PaymentStatus};
use crate::domain::ports::PaymentGateway;
use crate::error::{RentalError, Result};
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::debug;
use uuid::Uuid;

pub const IDEMPOTENCY_HEADER: &str = "x-idempotency-key";
const ACCOUNT_HOLDER_NAME: &str = "Customer Payment";

#[derive(Serialize)]
struct OpenInstrumentBody<'a> {
    external_id: &'a str,
    bank_code: &'a str,
    name: &'a str,
}

#[derive(Serialize)]
struct ConfirmPaymentBody {
    #[serde(with = "rust_decimal::serde::float")]
    amount: rust_decimal::Decimal,
}

#[derive(Debug, Deserialize)]
struct InstrumentReply {
    id: Option<String>,
    external_id: Option<String>,
    account_number: Option<String>,
}

impl InstrumentReply {
    fn validate(self) -> Result<PaymentInstrument> {
        Ok(PaymentInstrument {
            external_ref: ExternalRef::from(required(self.external_id, "external_id")?),
            account_number: required(self.account_number, "account_number")?,
            gateway_id: required(self.id, "id")?,
        })
    }
}

#[derive(Debug, Deserialize)]
struct ConfirmationReply {
    status: Option<String>,
}

impl ConfirmationReply {
    fn validate(self) -> Result<PaymentConfirmation> {
        Ok(PaymentConfirmation {
            status: PaymentStatus::from(required(self.status, "status")?),
        })
    }
}

fn required(field: Option<String>, name: &str) -> Result<String> {
    field.filter(|value| !value.is_empty()).ok_or_else(|| {
        RentalError::UpstreamContractViolation(format!("gateway reply is missing '{name}'"))
    })
}

fn transport(err: reqwest::Error) -> RentalError {
    if err.is_decode() {
        RentalError::UpstreamContractViolation(format!("undecodable gateway reply: {err}"))
    } else {
        RentalError::UpstreamTransport(err.to_string())
    }
}

#[derive(Clone)]
pub struct HttpPaymentGateway {
    client: reqwest::Client,
    config: GatewayConfig,
}

impl HttpPaymentGateway {
    pub fn new(config: GatewayConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| RentalError::UpstreamTransport(format!("cannot build HTTP client: {e}")))?;
        Ok(Self { client, config })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url.trim_end_matches('/'), path)
    }

    async fn post<B, R>(&self, url: String, body: &B, idempotency_key: Option<&str>) -> Result<R>
    where
        B: Serialize + Sync,
        R: DeserializeOwned,
    {
        let mut request = self
            .client
            .post(&url)
            .basic_auth(&self.config.secret_key, None::<&str>)
            .json(body);
        if let Some(key) = idempotency_key {
            request = request.header(IDEMPOTENCY_HEADER, key);
        }

        let response = request.send().await.map_err(transport)?;
        let status = response.status();
        let bytes = response.bytes().await.map_err(transport)?;
        debug!(%url, %status, "Gateway replied");

        if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS {
            return Err(RentalError::UpstreamTransport(format!(
                "gateway returned {status}"
            )));
        }
        if !status.is_success() {
            return Err(RentalError::UpstreamContractViolation(format!(
                "gateway rejected request with {status}: {}",
                String::from_utf8_lossy(&bytes)
            )));
        }

        serde_json::from_slice(&bytes).map_err(|e| {
            RentalError::UpstreamContractViolation(format!("malformed gateway reply: {e}"))
        })
    }
}

#[async_trait]
impl PaymentGateway for HttpPaymentGateway {
    async fn open_instrument(
        &self,
        external_ref: &ExternalRef,
        channel: &str,
    ) -> Result<PaymentInstrument> {
        let body = OpenInstrumentBody {
            external_id: external_ref.as_str(),
            bank_code: channel,
            name: ACCOUNT_HOLDER_NAME,
        };
        let reply: InstrumentReply = self
            .post(
                self.url("/callback_virtual_accounts"),
                &body,
                Some(external_ref.as_str()),
            )
            .await?;
        let instrument = reply.validate()?;
        if instrument.external_ref != *external_ref {
            return Err(RentalError::UpstreamContractViolation(format!(
                "gateway echoed external_id '{}' for request '{external_ref}'",
                instrument.external_ref
            )));
        }
        Ok(instrument)
    }

    async fn confirm_payment(
        &self,
        external_ref: &ExternalRef,
        amount: Money,
    ) -> Result<PaymentConfirmation> {
        let path = format!(
            "/callback_virtual_accounts/external_id={}/simulate_payment",
            external_ref.as_str()
        );
        let reply: ConfirmationReply = self
            .post(
                self.url(&path),
                &ConfirmPaymentBody {
                    amount: amount.value(),
                },
                None,
            )
            .await?;
        reply.validate()
    }
}

/// Offline gateway that opens an instrument for every request and reports
/// every confirmation with a fixed status.
pub struct SandboxGateway {
    status: PaymentStatus,
    sequence: AtomicU64,
}

impl SandboxGateway {
    pub fn new() -> Self {
        Self::with_status(PaymentStatus::Completed)
    }

    pub fn with_status(status: PaymentStatus) -> Self {
        Self {
            status,
            sequence: AtomicU64::new(0),
        }
    }
}

impl Default for SandboxGateway {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PaymentGateway for SandboxGateway {
    async fn open_instrument(
        &self,
        external_ref: &ExternalRef,
        _channel: &str,
    ) -> Result<PaymentInstrument> {
        let n = self.sequence.fetch_add(1, Ordering::Relaxed) + 1;
        Ok(PaymentInstrument {
            external_ref: external_ref.clone(),
            account_number: format!("9999{n:08}"),
            gateway_id: Uuid::new_v4().to_string(),
        })
    }

    async fn confirm_payment(
        &self,
        _external_ref: &ExternalRef,
        _amount: Money,
    ) -> Result<PaymentConfirmation> {
        Ok(PaymentConfirmation {
            status: self.status.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::reservation::ReservationId;

    #[test]
    fn test_instrument_reply_validation() {
        let reply: InstrumentReply = serde_json::from_str(
            r#"{"id":"va-1","external_id":"RSV-1","account_number":"8808123","bank_code":"BCA"}"#,
        )
        .unwrap();
        let instrument = reply.validate().unwrap();
        assert_eq!(instrument.gateway_id, "va-1");
        assert_eq!(instrument.account_number, "8808123");
        assert_eq!(instrument.external_ref.as_str(), "RSV-1");
    }

    #[test]
    fn test_missing_fields_are_contract_violations() {
        let reply: InstrumentReply =
            serde_json::from_str(r#"{"id":"va-1","external_id":"RSV-1"}"#).unwrap();
        assert!(matches!(
            reply.validate(),
            Err(RentalError::UpstreamContractViolation(msg)) if msg.contains("account_number")
        ));

        let reply: ConfirmationReply = serde_json::from_str(r#"{"status":""}"#).unwrap();
        assert!(matches!(
            reply.validate(),
            Err(RentalError::UpstreamContractViolation(_))
        ));
    }

    #[test]
    fn test_confirmation_status_passes_through() {
        let reply: ConfirmationReply = serde_json::from_str(r#"{"status":"EXPIRED"}"#).unwrap();
        assert_eq!(
            reply.validate().unwrap().status,
            PaymentStatus::Other("EXPIRED".to_string())
        );
    }

    #[tokio::test]
    async fn test_sandbox_gateway() {
        let gateway = SandboxGateway::new();
        let external_ref = ExternalRef::for_reservation(ReservationId::new());
        let first = gateway.open_instrument(&external_ref, "BCA").await.unwrap();
        let second = gateway.open_instrument(&external_ref, "BCA").await.unwrap();
        assert_eq!(first.external_ref, external_ref);
        assert_ne!(first.account_number, second.account_number);

        let confirmation = gateway
            .confirm_payment(&external_ref, Money::ZERO)
            .await
            .unwrap();
        assert_eq!(confirmation.status, PaymentStatus::Completed);
    }
}
