//! Resend mail client and message templates

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult, ResultExt};
use crate::services::MailConfig;
use crate::traits::Mailer;

const DEFAULT_RESEND_BASE_URL: &str = "https://api.resend.com";
const MAIL_TIMEOUT_SECS: u64 = 30;

pub const WELCOME_SUBJECT: &str = "Welcome to Threadmind";

pub struct ResendMailer {
    client: Client,
    api_key: String,
    enabled: bool,
    endpoint: String,
    from: String,
}

impl ResendMailer {
    pub fn new(config: &MailConfig) -> AppResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(MAIL_TIMEOUT_SECS))
            .build()
            .config_err("build http client")?;
        let base = config
            .provider
            .base_url
            .as_deref()
            .map(str::trim)
            .filter(|b| !b.is_empty())
            .unwrap_or(DEFAULT_RESEND_BASE_URL)
            .trim_end_matches('/');

        Ok(Self {
            client,
            api_key: config.provider.api_key.trim().to_string(),
            enabled: config.provider.enabled,
            endpoint: format!("{base}/emails"),
            from: config.from_address.clone(),
        })
    }
}

#[derive(Serialize)]
struct SendEmailRequest<'a> {
    from: &'a str,
    to: [&'a str; 1],
    subject: &'a str,
    html: &'a str,
}

#[derive(Deserialize)]
struct SendEmailResponse {
    id: String,
}

#[async_trait]
impl Mailer for ResendMailer {
    async fn send(&self, to: &str, subject: &str, html: &str) -> AppResult<String> {
        if !self.enabled {
            return Err(AppError::Config("mail provider is disabled".to_string()));
        }
        if self.api_key.is_empty() {
            return Err(AppError::Config("missing resend api key".to_string()));
        }

        let request = SendEmailRequest {
            from: &self.from,
            to: [to],
            subject,
            html,
        };
        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .dependency_err("resend request failed")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::Dependency(format!("resend request failed: {status} {body}")));
        }

        let sent: SendEmailResponse = response
            .json()
            .await
            .dependency_err("resend response invalid")?;
        Ok(sent.id)
    }
}

pub fn welcome_email_html() -> String {
    r#"<div style="max-width: 500px; margin: 0 auto; font-family: Arial, sans-serif; background-color: #ffffff; padding: 30px; border-radius: 8px; border: 1px solid #e5e7eb;">
  <h2 style="color: #111827; text-align: center; margin-bottom: 10px;">Welcome to Threadmind</h2>
  <p style="color: #374151; font-size: 15px; text-align: center;">Hey there,</p>
  <p style="color: #374151; font-size: 15px; text-align: center; line-height: 1.5;">
    Your account has been created. You're all set to explore communities, share ideas and join the conversations that matter to you.
  </p>
  <p style="color: #6b7280; font-size: 14px; text-align: center; line-height: 1.4;">
    If you have any questions, just reply to this email.
  </p>
</div>
"#
    .to_string()
}
