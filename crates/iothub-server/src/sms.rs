//! SMS delivery adapters for `msgService` fan-out. Grounded in
//! `msg.NewTwilio`/`SendSMS` and the `PointValueTwilio` provider tag.

use async_trait::async_trait;
use iothub_core::{point_type, HubError, Node, Result};

#[async_trait]
pub trait SmsProvider: Send + Sync {
    async fn send(&self, phone: &str, body: &str) -> Result<()>;
}

/// Sends via the Twilio REST API using basic auth over the account SID and
/// auth token, matching the original's `Twilio{SID, AuthToken, From}`.
pub struct TwilioSmsProvider {
    http: reqwest::Client,
    account_sid: String,
    auth_token: String,
    from: String,
}

impl TwilioSmsProvider {
    pub fn new(account_sid: impl Into<String>, auth_token: impl Into<String>, from: impl Into<String>) -> Self {
        TwilioSmsProvider {
            http: reqwest::Client::new(),
            account_sid: account_sid.into(),
            auth_token: auth_token.into(),
            from: from.into(),
        }
    }
}

#[async_trait]
impl SmsProvider for TwilioSmsProvider {
    async fn send(&self, phone: &str, body: &str) -> Result<()> {
        let url = format!(
            "https://api.twilio.com/2010-04-01/Accounts/{}/Messages.json",
            self.account_sid
        );
        let params = [("To", phone), ("From", self.from.as_str()), ("Body", body)];
        self.http
            .post(&url)
            .basic_auth(&self.account_sid, Some(&self.auth_token))
            .form(&params)
            .send()
            .await
            .map_err(|e| HubError::Adapter(e.to_string()))?
            .error_for_status()
            .map_err(|e| HubError::Adapter(e.to_string()))?;
        Ok(())
    }
}

/// Used when a `msgService` node has no recognised provider configured, and
/// in tests.
pub struct NullSmsProvider;

#[async_trait]
impl SmsProvider for NullSmsProvider {
    async fn send(&self, _phone: &str, _body: &str) -> Result<()> {
        Ok(())
    }
}

/// Build the provider a `msgService` node specifies via its `provider`
/// point, e.g. `"twilio"` (the original's `PointValueTwilio`).
pub fn provider_for_node(node: &Node) -> Box<dyn SmsProvider> {
    match node.point_text(point_type::PROVIDER) {
        Some("twilio") => Box::new(TwilioSmsProvider::new(
            node.point_text(point_type::SID).unwrap_or_default(),
            node.point_text(point_type::AUTH_TOKEN).unwrap_or_default(),
            node.point_text(point_type::FROM).unwrap_or_default(),
        )),
        _ => Box::new(NullSmsProvider),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use iothub_core::Point;

    #[tokio::test]
    async fn null_provider_accepts_any_message() {
        let provider = NullSmsProvider;
        assert!(provider.send("+15555550100", "hi").await.is_ok());
    }

    #[test]
    fn node_without_provider_point_falls_back_to_null() {
        let node = Node::new(iothub_core::node_type::MSG_SERVICE);
        let provider = provider_for_node(&node);
        // NullSmsProvider is the only provider that can't fail a real send;
        // exercise it through the trait to confirm the fallback picked it.
        let result = futures::executor::block_on(provider.send("+1", "x"));
        assert!(result.is_ok());
    }

    #[test]
    fn unrecognised_provider_tag_falls_back_to_null() {
        let mut node = Node::new(iothub_core::node_type::MSG_SERVICE);
        node.points.push(Point::new_text(point_type::PROVIDER, "carrier-pigeon"));
        let provider = provider_for_node(&node);
        let result = futures::executor::block_on(provider.send("+1", "x"));
        assert!(result.is_ok());
    }
}
