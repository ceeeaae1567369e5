use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use tracing::debug;

use rerouter_bridge::{BridgeClient, Request, ResponseBody, Transport};
use rerouter_core::{Rule, RuleDraft};

use crate::config::Resolved;

/// Connection to the background process.
pub struct Remote {
    client: BridgeClient,
    timeout: Duration,
}

impl Remote {
    pub async fn connect(resolved: &Resolved) -> Result<Self> {
        let transport: Transport = resolved
            .endpoint
            .parse()
            .with_context(|| format!("invalid endpoint {}", resolved.endpoint))?;
        let client = BridgeClient::connect(&transport)
            .await
            .with_context(|| format!("failed to connect to {transport}"))?;
        Ok(Self {
            client,
            timeout: resolved.timeout,
        })
    }

    /// Send a request; `{ok: false}` replies become errors carrying their text.
    pub async fn send(&self, request: Request) -> Result<ResponseBody> {
        let kind = request.kind();
        let response = self
            .client
            .call(&request, self.timeout)
            .await
            .with_context(|| format!("{kind} request failed (is rerouter-background running?)"))?;
        debug!(request = kind, ok = response.ok, "reply received");
        response.into_result().map_err(|e| anyhow!(e))
    }

    pub async fn list(&self) -> Result<Vec<Rule>> {
        match self.send(Request::ListRules).await? {
            ResponseBody::Rules { rules } => Ok(rules),
            other => bail!("unexpected reply to LIST_RULES: {other:?}"),
        }
    }

    /// Rules without ids, ready to write to an export file.
    pub async fn export(&self) -> Result<Vec<RuleDraft>> {
        match self.send(Request::ExportRules).await? {
            ResponseBody::Exported { rules } => Ok(rules),
            // `[]` matches the stored-rule shape first.
            ResponseBody::Rules { rules } if rules.is_empty() => Ok(Vec::new()),
            other => bail!("unexpected reply to EXPORT_RULES: {other:?}"),
        }
    }

    pub async fn find(&self, id: u64) -> Result<Rule> {
        self.list()
            .await?
            .into_iter()
            .find(|r| r.id == id)
            .ok_or_else(|| anyhow!("rule not found: {id}"))
    }
}
