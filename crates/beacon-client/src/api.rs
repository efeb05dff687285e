//! Typed HTTP client for the node's REST endpoints.

use reqwest::StatusCode;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use uuid::Uuid;

use beacon_shared::payment::PaymentPayload;
use beacon_shared::types::{EmergencyInfo, Location, Message, WalletAddress};
use beacon_shared::wallet::AuthPayload;

use crate::error::{ClientError, Result};

/// HTTP client bound to one server. Cheap to clone; carries the bearer
/// token once a session exists.
#[derive(Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

#[derive(Deserialize)]
struct NonceResponse {
    nonce: String,
}

#[derive(Serialize)]
struct CompleteSiweRequest {
    payload: AuthPayload,
    nonce: String,
}

/// Outcome of the sign-in verification endpoint.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SiweVerification {
    pub is_valid: bool,
    #[serde(default)]
    pub address: Option<WalletAddress>,
    #[serde(default)]
    pub session_token: Option<String>,
}

#[derive(Serialize)]
struct AddLocationRequest<'a> {
    lat: f64,
    lng: f64,
    emergency_info: Option<&'a EmergencyInfo>,
}

#[derive(Deserialize)]
struct ClearLocationsResponse {
    deleted: usize,
}

#[derive(Serialize)]
struct SendMessageRequest<'a> {
    content: &'a str,
    receiver_address: Option<&'a WalletAddress>,
    is_global: bool,
}

#[derive(Deserialize)]
struct InitiatePaymentResponse {
    id: Uuid,
}

#[derive(Serialize)]
struct ConfirmPaymentRequest<'a> {
    payload: &'a PaymentPayload,
}

#[derive(Deserialize)]
struct ConfirmPaymentResponse {
    success: bool,
}

#[derive(Deserialize)]
struct ErrorBody {
    error: String,
}

impl ApiClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: None,
        }
    }

    /// The same client with a session token attached to every request.
    pub fn with_token(&self, token: impl Into<String>) -> Self {
        Self {
            http: self.http.clone(),
            base_url: self.base_url.clone(),
            token: Some(token.into()),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// The WebSocket endpoint corresponding to this server.
    pub fn ws_url(&self) -> String {
        let ws_base = if let Some(rest) = self.base_url.strip_prefix("https://") {
            format!("wss://{rest}")
        } else if let Some(rest) = self.base_url.strip_prefix("http://") {
            format!("ws://{rest}")
        } else {
            format!("ws://{}", self.base_url)
        };
        format!("{ws_base}/ws")
    }

    fn authorize(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.token {
            Some(token) => req.bearer_auth(token),
            None => req,
        }
    }

    async fn decode<T: DeserializeOwned>(response: reqwest::Response) -> Result<T> {
        let status = response.status();
        if status.is_success() {
            return Ok(response.json().await?);
        }
        let message = match response.json::<ErrorBody>().await {
            Ok(body) => body.error,
            Err(_) => status
                .canonical_reason()
                .unwrap_or("request failed")
                .to_string(),
        };
        if status == StatusCode::UNAUTHORIZED {
            return Err(ClientError::NotAuthenticated);
        }
        Err(ClientError::Api {
            status: status.as_u16(),
            message,
        })
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let url = format!("{}{path}", self.base_url);
        let response = self.authorize(self.http.get(&url)).send().await?;
        Self::decode(response).await
    }

    async fn post_json<B: Serialize, T: DeserializeOwned>(&self, path: &str, body: &B) -> Result<T> {
        let url = format!("{}{path}", self.base_url);
        let response = self.authorize(self.http.post(&url)).json(body).send().await?;
        Self::decode(response).await
    }

    async fn delete_json<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let url = format!("{}{path}", self.base_url);
        let response = self.authorize(self.http.delete(&url)).send().await?;
        Self::decode(response).await
    }

    pub async fn nonce(&self) -> Result<String> {
        let response: NonceResponse = self.get_json("/api/nonce").await?;
        Ok(response.nonce)
    }

    pub async fn complete_siwe(&self, payload: AuthPayload, nonce: String) -> Result<SiweVerification> {
        self.post_json("/api/complete-siwe", &CompleteSiweRequest { payload, nonce })
            .await
    }

    pub async fn list_locations(&self) -> Result<Vec<Location>> {
        self.get_json("/api/locations").await
    }

    pub async fn add_location(
        &self,
        lat: f64,
        lng: f64,
        emergency_info: Option<&EmergencyInfo>,
    ) -> Result<Location> {
        self.post_json(
            "/api/locations",
            &AddLocationRequest {
                lat,
                lng,
                emergency_info,
            },
        )
        .await
    }

    /// Delete every location owned by the signed-in wallet, returning the
    /// number removed.
    pub async fn clear_locations(&self) -> Result<usize> {
        let response: ClearLocationsResponse = self.delete_json("/api/locations").await?;
        Ok(response.deleted)
    }

    pub async fn global_messages(&self) -> Result<Vec<Message>> {
        self.get_json("/api/messages?scope=global").await
    }

    pub async fn direct_messages(&self, peer: &WalletAddress) -> Result<Vec<Message>> {
        self.get_json(&format!("/api/messages?peer={peer}")).await
    }

    pub async fn send_message(
        &self,
        content: &str,
        receiver_address: Option<&WalletAddress>,
        is_global: bool,
    ) -> Result<Message> {
        self.post_json(
            "/api/messages",
            &SendMessageRequest {
                content,
                receiver_address,
                is_global,
            },
        )
        .await
    }

    /// Ask the server for a fresh payment reference.
    pub async fn initiate_payment(&self) -> Result<Uuid> {
        let response: InitiatePaymentResponse =
            self.post_json("/api/initiate-payment", &serde_json::json!({})).await?;
        Ok(response.id)
    }

    pub async fn confirm_payment(&self, payload: &PaymentPayload) -> Result<bool> {
        let response: ConfirmPaymentResponse = self
            .post_json("/api/confirm-payment", &ConfirmPaymentRequest { payload })
            .await?;
        Ok(response.success)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ws_url_from_http_base() {
        let api = ApiClient::new("http://127.0.0.1:8080/");
        assert_eq!(api.ws_url(), "ws://127.0.0.1:8080/ws");

        let api = ApiClient::new("https://beacon.example.org");
        assert_eq!(api.ws_url(), "wss://beacon.example.org/ws");
    }
}
