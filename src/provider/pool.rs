// src/provider/pool.rs — Role-segregated client pool
//
// The pool is the only place a model call originates. It is built once,
// fully validated, and never mutated; sessions share it through an Arc.

use std::sync::{Arc, RwLock};
use std::time::Duration;

use super::openai_compat::OpenAICompatProvider;
use super::retry::{RetryPolicy, RetryProvider};
use super::roles::{ModelRole, ModelRoles, RoleConfig};
use super::{ChatRequest, ChatResponse, Message, ModelProvider};
use crate::infra::errors::PromptLoopError;

struct RoleClient {
    provider: Arc<dyn ModelProvider>,
    config: RoleConfig,
}

/// Three independent clients, one per role.
pub struct ClientPool {
    optimize: RoleClient,
    evaluate: RoleClient,
    execute: RoleClient,
}

impl ClientPool {
    /// Validate every role, then build one HTTP client per role.
    /// Nothing is constructed when any role is invalid.
    pub fn initialize(
        roles: ModelRoles,
        timeout: Duration,
        retry: RetryPolicy,
    ) -> Result<Self, PromptLoopError> {
        roles.validate()?;

        let build = |role: ModelRole| -> Result<Arc<dyn ModelProvider>, PromptLoopError> {
            let cfg = roles.get(role);
            let http = OpenAICompatProvider::new(
                role.as_str(),
                cfg.credential.clone(),
                cfg.endpoint.clone(),
                timeout,
            )?;
            Ok(Arc::new(RetryProvider::new(Arc::new(http), retry)))
        };

        let optimize = build(ModelRole::Optimize)?;
        let evaluate = build(ModelRole::Evaluate)?;
        let execute = build(ModelRole::Execute)?;
        Self::with_providers(roles, optimize, evaluate, execute)
    }

    /// Bind caller-supplied transports to the role configurations.
    pub fn with_providers(
        roles: ModelRoles,
        optimize: Arc<dyn ModelProvider>,
        evaluate: Arc<dyn ModelProvider>,
        execute: Arc<dyn ModelProvider>,
    ) -> Result<Self, PromptLoopError> {
        roles.validate()?;
        let ModelRoles {
            optimize: optimize_cfg,
            evaluate: evaluate_cfg,
            execute: execute_cfg,
        } = roles;

        Ok(Self {
            optimize: RoleClient {
                provider: optimize,
                config: optimize_cfg,
            },
            evaluate: RoleClient {
                provider: evaluate,
                config: evaluate_cfg,
            },
            execute: RoleClient {
                provider: execute,
                config: execute_cfg,
            },
        })
    }

    /// One transport shared by all roles; models and temperatures stay per role.
    pub fn with_shared_provider(
        roles: ModelRoles,
        provider: Arc<dyn ModelProvider>,
    ) -> Result<Self, PromptLoopError> {
        Self::with_providers(roles, provider.clone(), provider.clone(), provider)
    }

    fn client(&self, role: ModelRole) -> &RoleClient {
        match role {
            ModelRole::Optimize => &self.optimize,
            ModelRole::Evaluate => &self.evaluate,
            ModelRole::Execute => &self.execute,
        }
    }

    pub fn role_config(&self, role: ModelRole) -> &RoleConfig {
        &self.client(role).config
    }

    /// Send `messages` to the model bound to `role`.
    pub async fn dispatch(
        &self,
        role: ModelRole,
        messages: Vec<Message>,
    ) -> Result<ChatResponse, PromptLoopError> {
        let client = self.client(role);
        let request = ChatRequest {
            model: client.config.model_id.clone(),
            messages,
            max_tokens: client.config.max_tokens,
            temperature: Some(client.config.temperature),
        };

        let response = client.provider.chat(request).await?;
        tracing::debug!(
            role = role.as_str(),
            model = %client.config.model_id,
            tokens = response.tokens(),
            "dispatch complete"
        );
        Ok(response)
    }
}

/// A replaceable shared handle to a pool.
///
/// `install` publishes a fully built pool in one swap, so concurrent
/// `get_instance` callers see either the old pool or the new one.
#[derive(Default)]
pub struct PoolSlot {
    inner: RwLock<Option<Arc<ClientPool>>>,
}

impl PoolSlot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn install(&self, pool: ClientPool) -> Arc<ClientPool> {
        let pool = Arc::new(pool);
        let mut guard = self.inner.write().unwrap_or_else(|e| e.into_inner());
        *guard = Some(pool.clone());
        pool
    }

    pub fn get_instance(&self) -> Result<Arc<ClientPool>, PromptLoopError> {
        let guard = self.inner.read().unwrap_or_else(|e| e.into_inner());
        guard.clone().ok_or(PromptLoopError::NotInitialized)
    }
}
