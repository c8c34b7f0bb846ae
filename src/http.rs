//! Shared HTTP plumbing for the remote lookups

use crate::config::HttpSettings;
use crate::error::{IntrastatError, Result};
use reqwest::Client;
use std::time::Duration;

/// Build a client from explicit settings
pub fn build_client(settings: &HttpSettings) -> Result<Client> {
    if settings.accept_invalid_certs {
        log::warn!("Certificate verification disabled for this HTTP client");
    }

    Client::builder()
        .timeout(Duration::from_secs(settings.timeout_secs))
        .user_agent(settings.user_agent.as_str())
        .danger_accept_invalid_certs(settings.accept_invalid_certs)
        .build()
        .map_err(|e| IntrastatError::HttpError(format!("Failed to create HTTP client: {}", e)))
}

/// GET a URL, returning the status code and body text
pub async fn get_text(client: &Client, url: &str) -> Result<(u16, String)> {
    log::debug!("GET {}", url);

    let response = client
        .get(url)
        .send()
        .await
        .map_err(|e| IntrastatError::HttpError(format!("HTTP request failed: {}", e)))?;

    let status = response.status().as_u16();
    let text = response
        .text()
        .await
        .map_err(|e| IntrastatError::HttpError(format!("Failed to read response: {}", e)))?;

    Ok((status, text))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_creation() {
        assert!(build_client(&HttpSettings::default()).is_ok());

        let insecure = HttpSettings {
            accept_invalid_certs: true,
            ..HttpSettings::default()
        };
        assert!(build_client(&insecure).is_ok());
    }
}
