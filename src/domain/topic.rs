use std::fmt;
use std::str::FromStr;

use serde::{Serialize, Serializer};
use thiserror::Error;
use uuid::Uuid;

const PRIVATE_PREFIX: &str = "private-";
const ADMIN_TOPIC: &str = "admin-channel";

/// A private real-time subscription target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Topic {
    User(Uuid),
    Admin,
    Group(Uuid),
}

#[derive(Debug, Error, PartialEq)]
pub enum TopicError {
    #[error("unknown topic: {0}")]
    Unknown(String),
    #[error("invalid identifier in topic: {0}")]
    InvalidId(String),
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Topic::User(id) => write!(f, "user.{}", id),
            Topic::Admin => f.write_str(ADMIN_TOPIC),
            Topic::Group(id) => write!(f, "group.{}", id),
        }
    }
}

impl FromStr for Topic {
    type Err = TopicError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s.strip_prefix(PRIVATE_PREFIX).unwrap_or(s);

        if name == ADMIN_TOPIC {
            return Ok(Topic::Admin);
        }

        let (scope, id) = name
            .split_once('.')
            .ok_or_else(|| TopicError::Unknown(s.to_string()))?;

        let parse_id = |id: &str| Uuid::parse_str(id).map_err(|_| TopicError::InvalidId(s.to_string()));

        match scope {
            "user" => Ok(Topic::User(parse_id(id)?)),
            "group" => Ok(Topic::Group(parse_id(id)?)),
            _ => Err(TopicError::Unknown(s.to_string())),
        }
    }
}

impl Serialize for Topic {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}
