//! Core types for Dingilink
//!
//! Identifiers, chat targets and the plain entity models handed out by the
//! batched loaders. Every identifier is a thin newtype over the store's
//! integer key so the loaders cannot mix up kinds.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use dingilink_common::{DingilinkError, Result};
use serde::{Deserialize, Serialize};

macro_rules! id_type {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub i64);

        impl $name {
            /// Get the raw store key
            pub fn get(self) -> i64 {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<i64> for $name {
            fn from(id: i64) -> Self {
                Self(id)
            }
        }
    };
}

id_type!(
    /// A user identifier
    UserId
);
id_type!(
    /// A group identifier
    GroupId
);
id_type!(
    /// A message identifier; ids grow monotonically with send time
    MessageId
);

/// The conversation a history query or a message belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChatTarget {
    /// Direct chat with the given counterpart
    Direct(UserId),
    /// Group chat
    Group(GroupId),
}

impl ChatTarget {
    pub fn user(self) -> Option<UserId> {
        match self {
            ChatTarget::Direct(id) => Some(id),
            ChatTarget::Group(_) => None,
        }
    }

    pub fn group(self) -> Option<GroupId> {
        match self {
            ChatTarget::Direct(_) => None,
            ChatTarget::Group(id) => Some(id),
        }
    }
}

impl fmt::Display for ChatTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChatTarget::Direct(id) => write!(f, "direct_{}", id),
            ChatTarget::Group(id) => write!(f, "group_{}", id),
        }
    }
}

impl FromStr for ChatTarget {
    type Err = DingilinkError;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = || DingilinkError::InvalidChatId(s.to_string());

        let (scope, raw_id) = s.split_once('_').ok_or_else(invalid)?;
        let id: i64 = raw_id.parse().map_err(|_| invalid())?;

        match scope {
            "direct" => Ok(ChatTarget::Direct(UserId(id))),
            "group" => Ok(ChatTarget::Group(GroupId(id))),
            _ => Err(invalid()),
        }
    }
}

/// A geographic point
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lng: f64,
}

impl GeoPoint {
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    /// Latitude must lie in [-90, 90] and longitude in [-180, 180]
    pub fn validate(&self) -> Result<()> {
        if !(-90.0..=90.0).contains(&self.lat) {
            return Err(DingilinkError::Validation(format!(
                "latitude {} out of range",
                self.lat
            )));
        }
        if !(-180.0..=180.0).contains(&self.lng) {
            return Err(DingilinkError::Validation(format!(
                "longitude {} out of range",
                self.lng
            )));
        }
        Ok(())
    }
}

/// A registered user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub username: String,
    pub email: String,
    pub name: String,
    pub bio: Option<String>,
    pub image: Option<String>,
    pub online: bool,
    pub friend_count: i64,
}

/// A chat group
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Group {
    pub id: GroupId,
    pub name: String,
    pub description: Option<String>,
    pub image: Option<String>,
    pub created_by: UserId,
}

/// Membership of one user in one group
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupMember {
    pub id: i64,
    pub group_id: GroupId,
    pub user_id: UserId,
    pub is_admin: bool,
    pub is_owner: bool,
    pub joined_at: DateTime<Utc>,
}
