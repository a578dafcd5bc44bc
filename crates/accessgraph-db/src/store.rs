//! SurrealDB-backed [`GraphStore`].

use accessgraph_core::repository::GraphStore;
use surrealdb::{Connection, Surreal};

use crate::repository::{
    SurrealGroupRepository, SurrealOrganizationRepository, SurrealPolicyRepository,
    SurrealReferenceRepository, SurrealResourceRepository, SurrealRoleRepository,
    SurrealUserRepository,
};

/// All repositories over one SurrealDB client. Clones share the client.
#[derive(Clone)]
pub struct SurrealGraphStore<C: Connection> {
    organizations: SurrealOrganizationRepository<C>,
    resources: SurrealResourceRepository<C>,
    users: SurrealUserRepository<C>,
    roles: SurrealRoleRepository<C>,
    groups: SurrealGroupRepository<C>,
    policies: SurrealPolicyRepository<C>,
    references: SurrealReferenceRepository<C>,
}

impl<C: Connection> SurrealGraphStore<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self {
            organizations: SurrealOrganizationRepository::new(db.clone()),
            resources: SurrealResourceRepository::new(db.clone()),
            users: SurrealUserRepository::new(db.clone()),
            roles: SurrealRoleRepository::new(db.clone()),
            groups: SurrealGroupRepository::new(db.clone()),
            policies: SurrealPolicyRepository::new(db.clone()),
            references: SurrealReferenceRepository::new(db),
        }
    }
}

impl<C: Connection> GraphStore for SurrealGraphStore<C> {
    type Organizations = SurrealOrganizationRepository<C>;
    type Resources = SurrealResourceRepository<C>;
    type Users = SurrealUserRepository<C>;
    type Roles = SurrealRoleRepository<C>;
    type Groups = SurrealGroupRepository<C>;
    type Policies = SurrealPolicyRepository<C>;
    type References = SurrealReferenceRepository<C>;

    fn organizations(&self) -> &Self::Organizations {
        &self.organizations
    }

    fn resources(&self) -> &Self::Resources {
        &self.resources
    }

    fn users(&self) -> &Self::Users {
        &self.users
    }

    fn roles(&self) -> &Self::Roles {
        &self.roles
    }

    fn groups(&self) -> &Self::Groups {
        &self.groups
    }

    fn policies(&self) -> &Self::Policies {
        &self.policies
    }

    fn references(&self) -> &Self::References {
        &self.references
    }
}
