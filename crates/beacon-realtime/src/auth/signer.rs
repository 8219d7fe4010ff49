//! HMAC-SHA256 signing for channel subscriptions, user sign-in, and the
//! HTTP API.

use std::collections::BTreeMap;

use hmac::{Hmac, Mac};
use sha2::Sha256;

use beacon_core::error::AppError;

type HmacSha256 = Hmac<Sha256>;

/// Signs and verifies payloads with one application's secret.
///
/// The keyed MAC state is prepared once; each signature clones it.
#[derive(Clone)]
pub struct AuthSigner {
    key: String,
    mac: HmacSha256,
}

impl std::fmt::Debug for AuthSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthSigner").field("key", &self.key).finish()
    }
}

impl AuthSigner {
    /// Creates a signer for an application key/secret pair.
    pub fn new(key: impl Into<String>, secret: &str) -> Result<Self, AppError> {
        let mac = HmacSha256::new_from_slice(secret.as_bytes())
            .map_err(|e| AppError::configuration(format!("Invalid application secret: {e}")))?;
        Ok(Self {
            key: key.into(),
            mac,
        })
    }

    /// Application key this signer belongs to.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Lowercase hex HMAC of `payload`.
    pub fn sign(&self, payload: &str) -> String {
        let mut mac = self.mac.clone();
        mac.update(payload.as_bytes());
        hex::encode(mac.finalize().into_bytes())
    }

    /// Constant-time comparison of `signature` (hex) against `payload`.
    pub fn verify(&self, payload: &str, signature: &str) -> bool {
        let Ok(expected) = hex::decode(signature) else {
            return false;
        };
        let mut mac = self.mac.clone();
        mac.update(payload.as_bytes());
        mac.verify_slice(&expected).is_ok()
    }

    /// `key:signature` for a private or presence channel subscription.
    pub fn channel_auth(&self, socket_id: &str, channel: &str, channel_data: Option<&str>) -> String {
        let payload = channel_payload(socket_id, channel, channel_data);
        format!("{}:{}", self.key, self.sign(&payload))
    }

    /// Checks a subscription signature presented by a client.
    pub fn verify_channel_auth(
        &self,
        auth: &str,
        socket_id: &str,
        channel: &str,
        channel_data: Option<&str>,
    ) -> Result<(), AppError> {
        let signature = self.strip_key(auth).ok_or_else(|| {
            AppError::unauthorized(format!("Invalid signature for channel '{channel}'"))
        })?;
        let payload = channel_payload(socket_id, channel, channel_data);
        if self.verify(&payload, signature) {
            Ok(())
        } else {
            Err(AppError::unauthorized(format!(
                "Invalid signature for channel '{channel}'"
            )))
        }
    }

    /// `key:signature` for a user sign-in.
    pub fn user_auth(&self, socket_id: &str, user_data: &str) -> String {
        let payload = format!("{socket_id}::user::{user_data}");
        format!("{}:{}", self.key, self.sign(&payload))
    }

    /// Checks a sign-in signature presented by a client.
    pub fn verify_user_auth(
        &self,
        auth: &str,
        socket_id: &str,
        user_data: &str,
    ) -> Result<(), AppError> {
        let payload = format!("{socket_id}::user::{user_data}");
        match self.strip_key(auth) {
            Some(signature) if self.verify(&payload, signature) => Ok(()),
            _ => Err(AppError::unauthorized("Invalid user authentication signature")),
        }
    }

    /// Signature of an HTTP API request.
    ///
    /// `params` excludes `auth_signature`; keys are compared lowercase.
    pub fn request_signature(&self, method: &str, path: &str, params: &BTreeMap<String, String>) -> String {
        self.sign(&request_payload(method, path, params))
    }

    /// Checks the `auth_signature` of an HTTP API request.
    pub fn verify_request(
        &self,
        method: &str,
        path: &str,
        params: &BTreeMap<String, String>,
        signature: &str,
    ) -> Result<(), AppError> {
        if self.verify(&request_payload(method, path, params), signature) {
            Ok(())
        } else {
            Err(AppError::authentication("Invalid auth signature"))
        }
    }

    fn strip_key<'a>(&self, auth: &'a str) -> Option<&'a str> {
        let (key, signature) = auth.split_once(':')?;
        (key == self.key).then_some(signature)
    }
}

fn channel_payload(socket_id: &str, channel: &str, channel_data: Option<&str>) -> String {
    match channel_data {
        Some(data) => format!("{socket_id}:{channel}:{data}"),
        None => format!("{socket_id}:{channel}"),
    }
}

fn request_payload(method: &str, path: &str, params: &BTreeMap<String, String>) -> String {
    let mut sorted: Vec<(String, &str)> = params
        .iter()
        .filter(|(k, _)| !k.eq_ignore_ascii_case("auth_signature"))
        .map(|(k, v)| (k.to_ascii_lowercase(), v.as_str()))
        .collect();
    sorted.sort();

    let query = sorted
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join("&");

    format!("{}\n{}\n{}", method.to_ascii_uppercase(), path, query)
}
