use std::sync::Arc;

use tracing::info;
use trialdesk_core::AppResult;

use super::shared_actions::MESSAGE;
use super::{ActionInvocation, EntityPluginRegistry, StaticAction};

/// Writes the `MESSAGE` parameter, or the caller message, to the log.
struct Log;

impl StaticAction for Log {
    fn id(&self) -> &'static str {
        "LOG"
    }

    fn execute(&self, invocation: &ActionInvocation<'_>) -> AppResult<()> {
        let message = match invocation.parameters.text(MESSAGE)? {
            Some(message) => message,
            None => invocation.message.unwrap_or_default().to_owned(),
        };
        let data_keys: Vec<&str> = invocation.data.keys().map(String::as_str).collect();
        info!(
            actor = invocation.context.actor_name(),
            parameters = %invocation.parameters.to_json(),
            data_keys = ?data_keys,
            "{message}"
        );
        Ok(())
    }
}

pub(super) fn register(registry: &mut EntityPluginRegistry) -> AppResult<()> {
    registry.register_static_action(Arc::new(Log))
}
