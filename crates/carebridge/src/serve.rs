// SPDX-FileCopyrightText: 2026 Carebridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `carebridge serve` command implementation.
//!
//! Builds the Anthropic provider and the EHR and reference-data clients,
//! registers the clinical tools, assembles the agent with its verifier,
//! session store, and audit sink, then serves the HTTP gateway until a
//! shutdown signal arrives.

use std::sync::Arc;
use std::time::Duration;

use carebridge_agent::context::load_system_prompt;
use carebridge_agent::shutdown;
use carebridge_agent::sweeper::spawn_eviction_sweeper;
use carebridge_agent::{ClinicalAgent, ReasoningLoop, SessionStore};
use carebridge_anthropic::AnthropicProvider;
use carebridge_audit::{AuditSink, JsonlAuditSink, MemoryAuditSink};
use carebridge_clients::{Icd10Client, OpenEmrClient, PubMedClient, RxNavClient};
use carebridge_config::model::CarebridgeConfig;
use carebridge_core::{CarebridgeError, Clock, PluginAdapter, SystemClock};
use carebridge_gateway::{GatewayState, ServerConfig, start_server};
use carebridge_tools::{ClinicalCollaborators, ToolRegistry, register_clinical_tools};
use carebridge_verify::Verifier;
use tracing::{info, warn};

/// Runs the `carebridge serve` command.
pub async fn run_serve(config: CarebridgeConfig) -> Result<(), CarebridgeError> {
    init_tracing(&config.agent.log_level);

    info!(agent = %config.agent.name, "starting carebridge serve");

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let tool_timeout = Duration::from_secs(config.reference.tool_timeout_secs);

    let provider = Arc::new(AnthropicProvider::new(&config.anthropic)?);
    let ehr = Arc::new(OpenEmrClient::new(&config.ehr, tool_timeout)?);
    let drugs = Arc::new(RxNavClient::new(
        &config.reference.rxnav_base_url,
        tool_timeout,
    )?);
    let icd10 = Arc::new(Icd10Client::new(
        &config.reference.icd10_base_url,
        tool_timeout,
    )?);
    let literature = Arc::new(PubMedClient::new(
        &config.reference.pubmed_base_url,
        config.reference.pubmed_api_key.clone(),
        tool_timeout,
    )?);

    let mut registry = ToolRegistry::new().with_timeout(tool_timeout);
    register_clinical_tools(
        &mut registry,
        &ClinicalCollaborators {
            ehr: ehr.clone(),
            drugs: drugs.clone(),
            icd10: icd10.clone(),
            literature: literature.clone(),
            clock: clock.clone(),
        },
    )?;
    info!(tools = registry.len(), "tool registry initialized");

    let mut reasoning = ReasoningLoop::new(
        provider.clone(),
        Arc::new(registry),
        config.anthropic.primary_model.clone(),
    )
    .with_max_iterations(config.agent.max_iterations)
    .with_max_tokens(config.anthropic.max_tokens)
    .with_system_prompt(load_system_prompt(&config.agent)?);
    if config.verification.enabled {
        reasoning = reasoning.with_verifier(Arc::new(Verifier::from_config(
            &config.verification,
            provider.clone(),
            &config.anthropic.verification_model,
        )));
    } else {
        warn!("answer verification is disabled");
    }

    let audit: Arc<dyn AuditSink> = if config.audit.enabled {
        Arc::new(JsonlAuditSink::open(&config.audit.path).await?)
    } else {
        warn!("audit log is disabled, events are kept in memory only");
        Arc::new(MemoryAuditSink::new())
    };

    let sessions = Arc::new(SessionStore::in_memory(clock.clone()));
    let agent = ClinicalAgent::new(reasoning, sessions.clone(), ehr.clone(), audit)
        .with_turn_timeout(Duration::from_secs(config.agent.turn_timeout_secs))
        .with_draft_ttl(seconds(config.approval.draft_ttl_secs));

    let cancel = shutdown::install_signal_handler();
    let sweeper = spawn_eviction_sweeper(
        sessions,
        Duration::from_secs(config.session.eviction_interval_secs),
        seconds(config.session.idle_eviction_secs),
        cancel.clone(),
    );

    let collaborators = vec![
        provider as Arc<dyn PluginAdapter>,
        ehr as Arc<dyn PluginAdapter>,
        drugs as Arc<dyn PluginAdapter>,
        icd10 as Arc<dyn PluginAdapter>,
        literature as Arc<dyn PluginAdapter>,
    ];
    let state = GatewayState::new(Arc::new(agent), collaborators);
    let server = ServerConfig::from(&config.gateway);
    start_server(&server, state, cancel.clone()).await?;

    cancel.cancel();
    if let Err(e) = sweeper.await {
        warn!(error = %e, "eviction sweeper did not stop cleanly");
    }
    info!("carebridge serve stopped");
    Ok(())
}

fn seconds(secs: u64) -> chrono::Duration {
    i64::try_from(secs)
        .ok()
        .and_then(chrono::Duration::try_seconds)
        .unwrap_or(chrono::Duration::MAX)
}

/// Initialize the tracing subscriber with the given log level.
fn init_tracing(log_level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("carebridge={log_level},warn")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .init();
}
