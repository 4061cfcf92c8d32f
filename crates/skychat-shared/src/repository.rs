//! Persistence collaborators consumed by the messenger.
//!
//! Besides the plain `get → mutate copy → set` operations, a visor repository
//! offers atomic read-modify-write through [`VisorRepository::update`] and
//! friends. Implementations run the mutation under the same lock as the read
//! and the write, so concurrent handlers never lose each other's updates. A
//! mutation that fails leaves the stored aggregate untouched.

use crate::error::{DomainError, RepositoryError};
use crate::types::PeerId;
use crate::user::User;
use crate::visor::Visor;

/// In-place mutation applied to the latest stored aggregate.
pub type Mutation<'a> = &'a mut dyn FnMut(&mut Visor) -> Result<(), DomainError>;

pub trait VisorRepository: Send + Sync {
    fn get_by_pk(&self, pk: &PeerId) -> Result<Visor, RepositoryError>;

    fn get_all(&self) -> Result<Vec<Visor>, RepositoryError>;

    /// Fails with `AlreadyExists` when a visor with the same pk is stored.
    fn add(&self, visor: Visor) -> Result<(), RepositoryError>;

    /// Fails with `NotFound` when no visor with the same pk is stored.
    fn set(&self, visor: Visor) -> Result<(), RepositoryError>;

    fn delete(&self, pk: &PeerId) -> Result<(), RepositoryError>;

    /// Atomically mutate an existing visor and return the stored result.
    fn update(&self, pk: &PeerId, mutation: Mutation<'_>) -> Result<Visor, RepositoryError>;

    /// Like [`update`](Self::update), seeding a missing visor with `init` first.
    fn upsert(
        &self,
        pk: &PeerId,
        init: &dyn Fn() -> Visor,
        mutation: Mutation<'_>,
    ) -> Result<Visor, RepositoryError>;

    /// Atomically delete the visor if `pred` holds. Returns whether it was
    /// deleted; a missing visor is not an error.
    fn delete_if(
        &self,
        pk: &PeerId,
        pred: &dyn Fn(&Visor) -> bool,
    ) -> Result<bool, RepositoryError>;
}

pub trait UserRepository: Send + Sync {
    fn get_user(&self) -> Result<User, RepositoryError>;

    fn set_user(&self, user: User) -> Result<(), RepositoryError>;
}
