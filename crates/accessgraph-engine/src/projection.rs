//! Query projection: entities rendered with their links resolved.
//!
//! Reference sets hold bare ids. Views replace each set with summaries of
//! the linked entities, in id order. Ids that no longer resolve (a dangling
//! edge from an interrupted write) are left out of the view.

use std::collections::BTreeSet;
use std::sync::Arc;

use accessgraph_core::error::GraphResult;
use accessgraph_core::models::group::Group;
use accessgraph_core::models::permission::Permission;
use accessgraph_core::models::policy::{Policy, PolicyContent};
use accessgraph_core::models::reference::EntityKind;
use accessgraph_core::models::resource::{Action, Resource};
use accessgraph_core::models::role::Role;
use accessgraph_core::models::summary::EntitySummary;
use accessgraph_core::models::user::User;
use accessgraph_core::repository::{GraphStore, ReferenceRepository};
use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::config::EngineConfig;
use crate::deadline::within;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UserView {
    pub id: Uuid,
    pub username: String,
    pub identifier: String,
    pub properties: serde_json::Map<String, serde_json::Value>,
    pub roles: Vec<EntitySummary>,
    pub groups: Vec<EntitySummary>,
    pub policies: Vec<EntitySummary>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RoleView {
    pub id: Uuid,
    pub identifier: String,
    pub name: String,
    pub users: Vec<EntitySummary>,
    pub groups: Vec<EntitySummary>,
    pub permissions: Vec<Permission>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupView {
    pub id: Uuid,
    pub identifier: String,
    pub name: String,
    pub users: Vec<EntitySummary>,
    pub roles: Vec<EntitySummary>,
    pub policies: Vec<EntitySummary>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PolicyView {
    pub id: Uuid,
    pub identifier: String,
    pub name: String,
    pub active_version: Option<String>,
    pub contents: Vec<PolicyContent>,
    pub users: Vec<EntitySummary>,
    pub groups: Vec<EntitySummary>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Resources have no links; the view exists for a uniform read surface.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResourceView {
    pub id: Uuid,
    pub identifier: String,
    pub name: String,
    pub actions: Vec<Action>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Resource> for ResourceView {
    fn from(resource: Resource) -> Self {
        Self {
            id: resource.id,
            identifier: resource.identifier,
            name: resource.name,
            actions: resource.actions,
            created_at: resource.created_at,
            updated_at: resource.updated_at,
        }
    }
}

pub struct Projector<S> {
    store: Arc<S>,
    config: EngineConfig,
}

impl<S: GraphStore> Projector<S> {
    pub fn new(store: Arc<S>, config: EngineConfig) -> Self {
        Self { store, config }
    }

    async fn summarize(
        &self,
        org_id: Uuid,
        kind: EntityKind,
        ids: &BTreeSet<Uuid>,
    ) -> GraphResult<Vec<EntitySummary>> {
        within(
            self.config.store_timeout(),
            "reference.summaries",
            self.store
                .references()
                .summaries(org_id, kind, ids.iter().copied().collect()),
        )
        .await
    }

    pub async fn user(&self, user: User) -> GraphResult<UserView> {
        let org_id = user.org_id;
        Ok(UserView {
            roles: self.summarize(org_id, EntityKind::Role, &user.roles).await?,
            groups: self.summarize(org_id, EntityKind::Group, &user.groups).await?,
            policies: self
                .summarize(org_id, EntityKind::Policy, &user.policies)
                .await?,
            id: user.id,
            username: user.username,
            identifier: user.identifier,
            properties: user.properties,
            created_at: user.created_at,
            updated_at: user.updated_at,
        })
    }

    pub async fn role(&self, role: Role) -> GraphResult<RoleView> {
        let org_id = role.org_id;
        Ok(RoleView {
            users: self.summarize(org_id, EntityKind::User, &role.users).await?,
            groups: self.summarize(org_id, EntityKind::Group, &role.groups).await?,
            id: role.id,
            identifier: role.identifier,
            name: role.name,
            permissions: role.permissions,
            created_at: role.created_at,
            updated_at: role.updated_at,
        })
    }

    pub async fn group(&self, group: Group) -> GraphResult<GroupView> {
        let org_id = group.org_id;
        Ok(GroupView {
            users: self.summarize(org_id, EntityKind::User, &group.users).await?,
            roles: self.summarize(org_id, EntityKind::Role, &group.roles).await?,
            policies: self
                .summarize(org_id, EntityKind::Policy, &group.policies)
                .await?,
            id: group.id,
            identifier: group.identifier,
            name: group.name,
            created_at: group.created_at,
            updated_at: group.updated_at,
        })
    }

    pub async fn policy(&self, policy: Policy) -> GraphResult<PolicyView> {
        let org_id = policy.org_id;
        Ok(PolicyView {
            users: self.summarize(org_id, EntityKind::User, &policy.users).await?,
            groups: self
                .summarize(org_id, EntityKind::Group, &policy.groups)
                .await?,
            id: policy.id,
            identifier: policy.identifier,
            name: policy.name,
            active_version: policy.active_version,
            contents: policy.contents,
            created_at: policy.created_at,
            updated_at: policy.updated_at,
        })
    }
}
