use anyhow::Context;
use async_trait::async_trait;
use serde::Deserialize;

#[async_trait]
pub trait CaptchaVerifier: Send + Sync {
    async fn verify(&self, token: &str) -> anyhow::Result<bool>;
}

/// Cloudflare Turnstile siteverify call. The public booking form submits a
/// challenge token; anything the upstream does not vouch for is rejected.
pub struct TurnstileVerifier {
    secret: String,
    client: reqwest::Client,
}

impl TurnstileVerifier {
    pub fn new(secret: String) -> Self {
        Self {
            secret,
            client: reqwest::Client::new(),
        }
    }
}

#[derive(Deserialize)]
struct SiteverifyResponse {
    success: bool,
}

#[async_trait]
impl CaptchaVerifier for TurnstileVerifier {
    async fn verify(&self, token: &str) -> anyhow::Result<bool> {
        let response: SiteverifyResponse = self
            .client
            .post("https://challenges.cloudflare.com/turnstile/v0/siteverify")
            .form(&[("secret", self.secret.as_str()), ("response", token)])
            .send()
            .await
            .context("failed to reach captcha verifier")?
            .error_for_status()
            .context("captcha verifier returned error")?
            .json()
            .await
            .context("failed to parse captcha verifier response")?;

        Ok(response.success)
    }
}
