//! Opaque identifiers handed out by the identity provider and cloud controller.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

macro_rules! upstream_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(pub Uuid);

        impl $name {
            pub fn as_uuid(&self) -> Uuid {
                self.0
            }
        }

        impl From<Uuid> for $name {
            fn from(id: Uuid) -> Self {
                Self(id)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                self.0.fmt(f)
            }
        }
    };
}

upstream_id!(
    /// Identity-provider account id; also used as the platform user guid.
    AccountId
);
upstream_id!(OrgId);
upstream_id!(SpaceId);
