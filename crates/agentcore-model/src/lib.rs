// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
mod types;
mod provider;
mod mock;

pub use types::*;
pub use provider::{ModelProvider, ResponseStream};
pub use mock::{MockProvider, ScriptedMockProvider};

/// Construct a boxed [`ModelProvider`] from configuration.
///
/// `"mock"` is the only provider id this crate ships a full implementation
/// for. Anything else is rejected — plug a real backend in at the
/// [`ModelProvider`] seam and extend this factory to select it.
pub fn from_config(cfg: &agentcore_config::ModelConfig) -> anyhow::Result<Box<dyn ModelProvider>> {
    match cfg.provider.as_str() {
        "mock" => Ok(Box::new(MockProvider)),
        other => anyhow::bail!(
            "unknown model provider: {other:?}; only \"mock\" is built in, plug in a \
             ModelProvider implementation for anything else"
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_config_mock_succeeds() {
        let cfg = agentcore_config::ModelConfig { provider: "mock".into(), ..Default::default() };
        assert!(from_config(&cfg).is_ok());
    }

    #[test]
    fn from_config_unknown_provider_errors() {
        let cfg =
            agentcore_config::ModelConfig { provider: "totally-unknown".into(), ..Default::default() };
        let err = from_config(&cfg).unwrap_err();
        assert!(err.to_string().contains("unknown model provider"));
    }
}
