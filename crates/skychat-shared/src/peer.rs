use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::error::{DomainError, PeerSet};
use crate::info::Info;
use crate::types::PeerId;

/// A member of a server or room.
///
/// `alias` is the name the local user chose for this peer and survives
/// updates of the peer's own `info`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Peer {
    pub info: Info,
    pub alias: String,
}

impl Peer {
    pub fn new(info: Info, alias: impl Into<String>) -> Self {
        Self {
            info,
            alias: alias.into(),
        }
    }

    /// Member we only know the key of.
    pub fn with_default_info(pk: PeerId) -> Self {
        let info = Info::default_for(pk);
        let alias = info.alias.clone();
        Self { info, alias }
    }

    pub fn pk(&self) -> PeerId {
        self.info.pk
    }
}

impl From<Info> for Peer {
    fn from(info: Info) -> Self {
        let alias = info.alias.clone();
        Self { info, alias }
    }
}

/// Add-if-absent; a duplicate is an error.
pub(crate) fn insert_unique(
    set: &mut BTreeSet<PeerId>,
    kind: PeerSet,
    peer: PeerId,
) -> Result<(), DomainError> {
    if !set.insert(peer) {
        return Err(DomainError::AlreadyInSet { set: kind, peer });
    }
    Ok(())
}

/// Delete-if-present; a missing entry is an error.
pub(crate) fn remove_present(
    set: &mut BTreeSet<PeerId>,
    kind: PeerSet,
    peer: &PeerId,
) -> Result<(), DomainError> {
    if !set.remove(peer) {
        return Err(DomainError::NotInSet {
            set: kind,
            peer: *peer,
        });
    }
    Ok(())
}
