use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::error::{DomainError, PeerSet};
use crate::info::Info;
use crate::peer::{insert_unique, remove_present};
use crate::types::PeerId;

/// Local user preferences.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Settings {
    pub blacklist: BTreeSet<PeerId>,
}

/// The person operating the local visor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct User {
    pub info: Info,
    pub settings: Settings,
}

impl User {
    pub fn new(info: Info) -> Self {
        Self {
            info,
            settings: Settings::default(),
        }
    }

    pub fn pk(&self) -> PeerId {
        self.info.pk
    }

    pub fn set_info(&mut self, info: Info) {
        self.info = info;
    }

    pub fn in_blacklist(&self, pk: &PeerId) -> bool {
        self.settings.blacklist.contains(pk)
    }

    pub fn add_to_blacklist(&mut self, pk: PeerId) -> Result<(), DomainError> {
        insert_unique(&mut self.settings.blacklist, PeerSet::Blacklist, pk)
    }

    pub fn remove_from_blacklist(&mut self, pk: &PeerId) -> Result<(), DomainError> {
        remove_present(&mut self.settings.blacklist, PeerSet::Blacklist, pk)
    }
}
