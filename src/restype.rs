#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

//===========================================================================//

#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
#[cfg_attr(feature = "serde", derive(Deserialize, Serialize))]
/// The type of resource stored in a container.
pub enum ResourceType {
    /// Plain images (ICO files)
    Icon,
    /// Images with cursor hotspots (CUR files)
    Cursor,
}

impl ResourceType {
    pub(crate) fn from_number(number: u16) -> Option<ResourceType> {
        match number {
            1 => Some(ResourceType::Icon),
            2 => Some(ResourceType::Cursor),
            _ => None,
        }
    }

    pub(crate) fn number(&self) -> u16 {
        match *self {
            ResourceType::Icon => 1,
            ResourceType::Cursor => 2,
        }
    }

    /// Returns the four bytes every file of this type starts with.
    pub fn magic(&self) -> [u8; 4] {
        let [low, high] = self.number().to_le_bytes();
        [0, 0, low, high]
    }

    /// Guesses the resource type from the first bytes of a file.
    pub fn from_magic(prefix: &[u8]) -> Option<ResourceType> {
        [ResourceType::Icon, ResourceType::Cursor]
            .into_iter()
            .find(|restype| prefix.starts_with(&restype.magic()))
    }

    pub(crate) fn not_this_kind(&self) -> &'static str {
        match *self {
            ResourceType::Icon => "not an ICO file",
            ResourceType::Cursor => "not a CUR file",
        }
    }

    pub(crate) fn none_stored(&self) -> &'static str {
        match *self {
            ResourceType::Icon => "no icons",
            ResourceType::Cursor => "no cursors",
        }
    }
}

//===========================================================================//


//===========================================================================//
