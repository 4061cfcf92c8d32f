use serde::{Deserialize, Serialize};

use crate::constants::{DEFAULT_ALIAS, DEFAULT_DESC};
use crate::types::PeerId;

/// Public profile of a visor, server or room.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Info {
    pub pk: PeerId,
    pub alias: String,
    pub desc: String,
    pub img: String,
}

impl Info {
    pub fn new(
        pk: PeerId,
        alias: impl Into<String>,
        desc: impl Into<String>,
        img: impl Into<String>,
    ) -> Self {
        Self {
            pk,
            alias: alias.into(),
            desc: desc.into(),
            img: img.into(),
        }
    }

    /// Placeholder profile for something we have not heard from yet.
    pub fn default_for(pk: PeerId) -> Self {
        Self::new(pk, DEFAULT_ALIAS, DEFAULT_DESC, "")
    }
}
