//! Map-backed repositories, used for ephemeral nodes and tests.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use skychat_shared::repository::Mutation;
use skychat_shared::{PeerId, RepositoryError, User, UserRepository, Visor, VisorRepository};

fn poisoned() -> RepositoryError {
    RepositoryError::Storage("repository lock poisoned".to_string())
}

#[derive(Default)]
pub struct InMemoryVisorRepository {
    visors: Mutex<HashMap<PeerId, Visor>>,
}

impl InMemoryVisorRepository {
    pub fn new() -> Self {
        Self::default()
    }

    fn visors(&self) -> Result<MutexGuard<'_, HashMap<PeerId, Visor>>, RepositoryError> {
        self.visors.lock().map_err(|_| poisoned())
    }

    fn mutate(
        &self,
        pk: &PeerId,
        init: Option<&dyn Fn() -> Visor>,
        mutation: Mutation<'_>,
    ) -> Result<Visor, RepositoryError> {
        let mut visors = self.visors()?;
        // mutate a copy so a failing mutation leaves the map untouched
        let mut visor = match (visors.get(pk), init) {
            (Some(visor), _) => visor.clone(),
            (None, Some(init)) => init(),
            (None, None) => return Err(RepositoryError::NotFound(*pk)),
        };
        mutation(&mut visor)?;
        visors.insert(*pk, visor.clone());
        Ok(visor)
    }
}

impl VisorRepository for InMemoryVisorRepository {
    fn get_by_pk(&self, pk: &PeerId) -> Result<Visor, RepositoryError> {
        self.visors()?
            .get(pk)
            .cloned()
            .ok_or(RepositoryError::NotFound(*pk))
    }

    fn get_all(&self) -> Result<Vec<Visor>, RepositoryError> {
        Ok(self.visors()?.values().cloned().collect())
    }

    fn add(&self, visor: Visor) -> Result<(), RepositoryError> {
        let mut visors = self.visors()?;
        if visors.contains_key(&visor.pk()) {
            return Err(RepositoryError::AlreadyExists(visor.pk()));
        }
        visors.insert(visor.pk(), visor);
        Ok(())
    }

    fn set(&self, visor: Visor) -> Result<(), RepositoryError> {
        let mut visors = self.visors()?;
        let slot = visors
            .get_mut(&visor.pk())
            .ok_or(RepositoryError::NotFound(visor.pk()))?;
        *slot = visor;
        Ok(())
    }

    fn delete(&self, pk: &PeerId) -> Result<(), RepositoryError> {
        self.visors()?
            .remove(pk)
            .map(|_| ())
            .ok_or(RepositoryError::NotFound(*pk))
    }

    fn update(&self, pk: &PeerId, mutation: Mutation<'_>) -> Result<Visor, RepositoryError> {
        self.mutate(pk, None, mutation)
    }

    fn upsert(
        &self,
        pk: &PeerId,
        init: &dyn Fn() -> Visor,
        mutation: Mutation<'_>,
    ) -> Result<Visor, RepositoryError> {
        self.mutate(pk, Some(init), mutation)
    }

    fn delete_if(
        &self,
        pk: &PeerId,
        pred: &dyn Fn(&Visor) -> bool,
    ) -> Result<bool, RepositoryError> {
        let mut visors = self.visors()?;
        match visors.get(pk) {
            Some(visor) if pred(visor) => {
                visors.remove(pk);
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

#[derive(Default)]
pub struct InMemoryUserRepository {
    user: Mutex<Option<User>>,
}

impl InMemoryUserRepository {
    pub fn new(user: User) -> Self {
        Self {
            user: Mutex::new(Some(user)),
        }
    }
}

impl UserRepository for InMemoryUserRepository {
    fn get_user(&self) -> Result<User, RepositoryError> {
        self.user
            .lock()
            .map_err(|_| poisoned())?
            .clone()
            .ok_or(RepositoryError::UserNotFound)
    }

    fn set_user(&self, user: User) -> Result<(), RepositoryError> {
        *self.user.lock().map_err(|_| poisoned())? = Some(user);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use skychat_shared::{Info, Message, Route};

    fn pk(b: u8) -> PeerId {
        PeerId([b; 32])
    }

    #[test]
    fn test_crud() {
        let repo = InMemoryVisorRepository::new();
        repo.add(Visor::new_default_p2p(pk(1))).unwrap();
        assert!(matches!(
            repo.add(Visor::new_default_p2p(pk(1))),
            Err(RepositoryError::AlreadyExists(_))
        ));
        assert_eq!(repo.get_all().unwrap().len(), 1);
        repo.delete(&pk(1)).unwrap();
        assert!(matches!(repo.get_by_pk(&pk(1)), Err(RepositoryError::NotFound(_))));
    }

    #[test]
    fn test_concurrent_updates_are_not_lost() {
        let repo = Arc::new(InMemoryVisorRepository::new());
        repo.add(Visor::new_default_p2p(pk(1))).unwrap();

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let repo = repo.clone();
                std::thread::spawn(move || {
                    for _ in 0..25 {
                        let msg = Message::text(pk(i + 10), Route::p2p(pk(1)), "x");
                        repo.update(&pk(1), &mut |v| v.add_message(&Route::p2p(pk(1)), msg.clone()))
                            .unwrap();
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        let visor = repo.get_by_pk(&pk(1)).unwrap();
        assert_eq!(visor.p2p().unwrap().messages().len(), 200);
    }

    #[test]
    fn test_user_repository() {
        let repo = InMemoryUserRepository::default();
        assert!(matches!(repo.get_user(), Err(RepositoryError::UserNotFound)));
        repo.set_user(User::new(Info::default_for(pk(1)))).unwrap();
        assert_eq!(repo.get_user().unwrap().pk(), pk(1));
    }
}
