// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! `loadspin send` command - Post a scenario to running instances.

use std::time::Duration;

use loadspin_core::Scenario;

use crate::api::MessageRequest;

/// Bound on each POST.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

pub async fn execute(scenario: &str, endpoints: &[String]) -> Result<(), Box<dyn std::error::Error>> {
    if let Scenario::Unknown(tag) = Scenario::parse(scenario) {
        tracing::warn!(scenario = %tag, "Unrecognised scenario; instances will ignore it");
    }

    let client = reqwest::Client::builder().timeout(REQUEST_TIMEOUT).build()?;
    let body = MessageRequest {
        scenario: scenario.to_string(),
    };

    let mut failed = 0;
    for endpoint in endpoints {
        let url = messages_url(endpoint);
        let result = client.post(&url).json(&body).send().await;

        match result {
            Ok(resp) if resp.status().is_success() => {
                println!("✓ {} -> {}", scenario, endpoint);
            }
            Ok(resp) => {
                failed += 1;
                println!("✗ {} -> {} ({})", scenario, endpoint, resp.status());
            }
            Err(e) => {
                failed += 1;
                println!("✗ {} -> {} ({})", scenario, endpoint, e);
                tracing::debug!(endpoint = %endpoint, error = %e, "Publish failed");
            }
        }
    }

    if failed > 0 {
        return Err(format!("failed to publish to {} of {} endpoints", failed, endpoints.len()).into());
    }

    Ok(())
}

fn messages_url(endpoint: &str) -> String {
    format!("{}/messages", endpoint.trim_end_matches('/'))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_url() {
        assert_eq!(messages_url("http://a:3000"), "http://a:3000/messages");
        assert_eq!(messages_url("http://a:3000/"), "http://a:3000/messages");
    }
}
