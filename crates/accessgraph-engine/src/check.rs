//! Permission resolution.
//!
//! Two modes, chosen per request:
//!
//! - **Local**: the subject's roles are its direct roles plus the roles of
//!   the groups it belongs to (one level, groups do not nest). The check
//!   passes if any of those roles holds the `(resource, action)` permission.
//! - **Relationship**: the `(subject, relation, object)` triple is forwarded
//!   to the tuple engine and its answer is returned unchanged. The local
//!   graph is not consulted.
//!
//! Either mode may be served from the decision cache. Keys embed the
//! organization's generation, so a mutation makes older decisions
//! unreachable; with the flush-all strategy the whole cache is dropped
//! instead.

use std::collections::BTreeSet;
use std::sync::Arc;

use accessgraph_core::cache::{CacheKey, DecisionCache, DecisionMode};
use accessgraph_core::error::{GraphError, GraphResult};
use accessgraph_core::models::user::User;
use accessgraph_core::repository::{
    GraphStore, GroupRepository, OrganizationRepository, RoleRepository, UserRepository,
};
use accessgraph_core::tuple::{RelationTuple, Subject, TupleEngine};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};
use uuid::Uuid;

use crate::cache::Generations;
use crate::config::{EngineConfig, InvalidationStrategy};
use crate::deadline::within;

/// One authorization question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum CheckRequest {
    /// May `subject` (a user identifier or id) perform `action` on `resource`?
    Local {
        subject: String,
        resource: String,
        action: String,
    },
    /// Does the tuple engine relate `subject` to `object` via `relation`?
    Relationship {
        /// Falls back to the configured default namespace.
        #[serde(default)]
        namespace: Option<String>,
        subject: String,
        relation: String,
        object: String,
    },
}

impl CheckRequest {
    pub fn local(
        subject: impl Into<String>,
        resource: impl Into<String>,
        action: impl Into<String>,
    ) -> Self {
        CheckRequest::Local {
            subject: subject.into(),
            resource: resource.into(),
            action: action.into(),
        }
    }

    pub fn relationship(
        subject: impl Into<String>,
        relation: impl Into<String>,
        object: impl Into<String>,
    ) -> Self {
        CheckRequest::Relationship {
            namespace: None,
            subject: subject.into(),
            relation: relation.into(),
            object: object.into(),
        }
    }

    fn validate(&self) -> GraphResult<()> {
        let fields: [(&str, &str); 3] = match self {
            CheckRequest::Local {
                subject,
                resource,
                action,
            } => [
                ("subject", subject.as_str()),
                ("resource", resource.as_str()),
                ("action", action.as_str()),
            ],
            CheckRequest::Relationship {
                subject,
                relation,
                object,
                ..
            } => [
                ("subject", subject.as_str()),
                ("relation", relation.as_str()),
                ("object", object.as_str()),
            ],
        };
        match fields.iter().find(|(_, value)| value.trim().is_empty()) {
            Some((label, _)) => Err(GraphError::invalid_input(format!("{label} is required"))),
            None => Ok(()),
        }
    }
}

/// Where a decision came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionSource {
    Cache,
    Local,
    Relationship,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CheckOutcome {
    pub allowed: bool,
    pub source: DecisionSource,
}

pub struct CheckEngine<S, T, C> {
    store: Arc<S>,
    tuples: Arc<T>,
    cache: Arc<C>,
    generations: Arc<Generations>,
    config: EngineConfig,
}

impl<S, T, C> CheckEngine<S, T, C>
where
    S: GraphStore,
    T: TupleEngine,
    C: DecisionCache,
{
    pub fn new(
        store: Arc<S>,
        tuples: Arc<T>,
        cache: Arc<C>,
        generations: Arc<Generations>,
        config: EngineConfig,
    ) -> Self {
        Self {
            store,
            tuples,
            cache,
            generations,
            config,
        }
    }

    /// Decide `request` within `org_id`, caching under the organization id.
    pub async fn check(&self, org_id: Uuid, request: CheckRequest) -> GraphResult<CheckOutcome> {
        self.check_in(org_id, org_id.to_string(), request).await
    }

    /// Decide `request` within `org_id`, caching under `namespace` (for
    /// example the caller's API key). An unknown organization is `NotFound`.
    #[instrument(skip(self, namespace), fields(org_id = %org_id))]
    pub async fn check_in(
        &self,
        org_id: Uuid,
        namespace: String,
        request: CheckRequest,
    ) -> GraphResult<CheckOutcome> {
        request.validate()?;
        within(
            self.config.store_timeout(),
            "organization.get",
            self.store.organizations().get_by_id(org_id),
        )
        .await?;
        let key = self.cache_key(org_id, namespace, &request);

        if self.config.cache.enabled {
            match within(self.config.store_timeout(), "cache.get", self.cache.get(&key)).await {
                Ok(Some(allowed)) => {
                    debug!(allowed, "Decision served from cache");
                    return Ok(CheckOutcome {
                        allowed,
                        source: DecisionSource::Cache,
                    });
                }
                Ok(None) => {}
                Err(e) => warn!(error = %e, "Decision cache lookup failed, resolving live"),
            }
        }

        let outcome = match &request {
            CheckRequest::Local {
                subject,
                resource,
                action,
            } => CheckOutcome {
                allowed: self.resolve_local(org_id, subject, resource, action).await?,
                source: DecisionSource::Local,
            },
            CheckRequest::Relationship {
                namespace,
                subject,
                relation,
                object,
            } => {
                let namespace = namespace
                    .clone()
                    .unwrap_or_else(|| self.config.default_namespace.clone());
                let tuple = RelationTuple::new(
                    namespace,
                    object.clone(),
                    relation.clone(),
                    Subject::parse(subject),
                );
                CheckOutcome {
                    allowed: within(
                        self.config.tuple_timeout(),
                        "tuple.check",
                        self.tuples.check_tuple(&tuple),
                    )
                    .await?,
                    source: DecisionSource::Relationship,
                }
            }
        };

        if self.config.cache.enabled
            && let Err(e) = within(
                self.config.store_timeout(),
                "cache.set",
                self.cache.set(key, outcome.allowed, self.config.cache.ttl()),
            )
            .await
        {
            warn!(error = %e, "Failed to cache decision");
        }

        debug!(allowed = outcome.allowed, source = ?outcome.source, "Decision resolved");
        Ok(outcome)
    }

    /// Make every cached decision for `org_id` unreachable.
    pub async fn invalidate(&self, org_id: Uuid) {
        match self.config.cache.invalidation {
            InvalidationStrategy::Generation => {
                let generation = self.generations.bump(org_id);
                debug!(org_id = %org_id, generation, "Decision generation advanced");
            }
            InvalidationStrategy::FlushAll => self.flush().await,
        }
    }

    /// Drop every cached decision for every organization.
    pub async fn flush(&self) {
        if let Err(e) = within(
            self.config.store_timeout(),
            "cache.flush_all",
            self.cache.flush_all(),
        )
        .await
        {
            warn!(error = %e, "Failed to flush decision cache");
        }
    }

    /// Forget a deleted organization's generation counter.
    pub async fn forget(&self, org_id: Uuid) {
        self.invalidate(org_id).await;
        self.generations.remove(org_id);
    }

    fn cache_key(&self, org_id: Uuid, namespace: String, request: &CheckRequest) -> CacheKey {
        let generation = self.generations.current(org_id);
        match request {
            CheckRequest::Local {
                subject,
                resource,
                action,
            } => CacheKey {
                namespace,
                generation,
                mode: DecisionMode::Local,
                subject: subject.clone(),
                relation: action.clone(),
                object: resource.clone(),
            },
            CheckRequest::Relationship {
                namespace: tuple_namespace,
                subject,
                relation,
                object,
            } => CacheKey {
                namespace,
                generation,
                mode: DecisionMode::Relationship,
                subject: subject.clone(),
                relation: relation.clone(),
                object: format!(
                    "{}:{object}",
                    tuple_namespace
                        .as_deref()
                        .unwrap_or(&self.config.default_namespace)
                ),
            },
        }
    }

    async fn resolve_local(
        &self,
        org_id: Uuid,
        subject: &str,
        resource: &str,
        action: &str,
    ) -> GraphResult<bool> {
        let Some(user) = self.find_subject(org_id, subject).await? else {
            debug!(subject, "Unknown subject");
            return Ok(false);
        };

        let timeout = self.config.store_timeout();
        let mut role_ids: BTreeSet<Uuid> = user.roles.clone();
        for group_id in &user.groups {
            match within(
                timeout,
                "group.get",
                self.store.groups().get_by_id(org_id, *group_id),
            )
            .await
            {
                Ok(group) => role_ids.extend(group.roles),
                Err(e) if e.is_not_found() => {
                    warn!(user_id = %user.id, group_id = %group_id, "Skipping dangling group reference");
                }
                Err(e) => return Err(e),
            }
        }

        for role_id in role_ids {
            match within(
                timeout,
                "role.get",
                self.store.roles().get_by_id(org_id, role_id),
            )
            .await
            {
                Ok(role) if role.grants(resource, action) => return Ok(true),
                Ok(_) => {}
                Err(e) if e.is_not_found() => {
                    warn!(user_id = %user.id, role_id = %role_id, "Skipping dangling role reference");
                }
                Err(e) => return Err(e),
            }
        }
        Ok(false)
    }

    /// Look the subject up by identifier, then by id.
    async fn find_subject(&self, org_id: Uuid, subject: &str) -> GraphResult<Option<User>> {
        let timeout = self.config.store_timeout();
        let users = self.store.users();
        match within(timeout, "user.get", users.get_by_identifier(org_id, subject)).await {
            Ok(user) => return Ok(Some(user)),
            Err(e) if e.is_not_found() => {}
            Err(e) => return Err(e),
        }
        let Ok(id) = Uuid::parse_str(subject) else {
            return Ok(None);
        };
        match within(timeout, "user.get", users.get_by_id(org_id, id)).await {
            Ok(user) => Ok(Some(user)),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }
}
