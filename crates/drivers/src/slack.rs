use async_trait::async_trait;
use serde::Deserialize;
use sluice_common::RequestContext;

use crate::spec::{DriverSpec, PropertySchema, PropertyType};
use crate::{decode_props, Driver, DriverError, Properties};

const DRIVER: &str = "slack";

/// Notifier properties for a Slack delivery.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct SlackProps {
    #[serde(default)]
    pub users: Vec<String>,
    #[serde(default)]
    pub channels: Vec<String>,
    #[serde(default)]
    pub webhooks: Vec<String>,
}

impl SlackProps {
    /// Posting only through incoming webhooks needs no bot token.
    pub fn webhooks_only(&self) -> bool {
        self.users.is_empty() && self.channels.is_empty()
    }
}

pub fn decode_slack_props(props: &Properties) -> Result<SlackProps, DriverError> {
    decode_props(DRIVER, props)
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SlackDriver;

#[async_trait]
impl Driver for SlackDriver {
    fn spec(&self) -> DriverSpec {
        DriverSpec {
            display_name: "Slack".to_string(),
            description: "Slack Notifier".to_string(),
            config_properties: vec![PropertySchema::new("bot_token", "Bot token", PropertyType::String)
                .description("Bot token used for sending Slack notifications")
                .secret()],
            implements_notifier: true,
            ..Default::default()
        }
    }

    async fn has_anonymous_source_access(
        &self,
        _ctx: &RequestContext,
        _props: &Properties,
    ) -> Result<bool, DriverError> {
        Ok(false)
    }

    async fn tertiary_source_connectors(
        &self,
        _ctx: &RequestContext,
        _props: &Properties,
    ) -> Result<Vec<String>, DriverError> {
        Ok(Vec::new())
    }
}
