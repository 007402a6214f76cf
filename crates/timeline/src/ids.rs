use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;
use uuid::Uuid;

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub fn new() -> Self {
                Self(Uuid::new_v4().to_string())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }
    };
}

string_id!(
    /// Opaque clip identifier (timeline or master clip).
    ClipId
);
string_id!(TrackId);
string_id!(SequenceId);
string_id!(MediaId);
string_id!(ProjectId);
string_id!(LinkGroupId);

/// Ids a command handed out, kept with its undo data.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssuedIds {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub clips: Vec<ClipId>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub link_groups: Vec<LinkGroupId>,
}

/// Hands out ids for the clips and link groups a plan creates.
///
/// On redo the allocator is seeded with the ids issued the first time, so
/// re-executing a command recreates the same rows.
#[derive(Debug, Clone, Default)]
pub struct IdAllocator {
    reserved_clips: VecDeque<ClipId>,
    reserved_groups: VecDeque<LinkGroupId>,
    issued: IssuedIds,
}

impl IdAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn replaying(ids: IssuedIds) -> Self {
        Self {
            reserved_clips: ids.clips.into(),
            reserved_groups: ids.link_groups.into(),
            issued: IssuedIds::default(),
        }
    }

    pub fn next_clip_id(&mut self) -> ClipId {
        let id = self.reserved_clips.pop_front().unwrap_or_else(ClipId::new);
        self.issued.clips.push(id.clone());
        id
    }

    pub fn next_link_group_id(&mut self) -> LinkGroupId {
        let id = self
            .reserved_groups
            .pop_front()
            .unwrap_or_else(LinkGroupId::new);
        self.issued.link_groups.push(id.clone());
        id
    }

    /// Clip ids issued so far.
    pub fn issued(&self) -> &[ClipId] {
        &self.issued.clips
    }

    pub fn into_issued(self) -> IssuedIds {
        self.issued
    }
}
