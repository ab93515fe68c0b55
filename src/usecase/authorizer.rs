use std::sync::Arc;

use crate::domain::{topic::Topic, user::Identity};
use crate::usecase::contracts::GroupRepository;

/// Decides whether an identity may subscribe to a private topic.
/// Anything that cannot be positively verified is denied.
pub struct BroadcastAuthorizer<G>
where
    G: GroupRepository + ?Sized,
{
    group_repository: Arc<G>,
}

impl<G> BroadcastAuthorizer<G>
where
    G: GroupRepository + ?Sized,
{
    pub fn new(group_repository: Arc<G>) -> Self {
        Self { group_repository }
    }

    /// Returns the parsed topic when access is granted.
    #[tracing::instrument(skip(self, identity), fields(user_id = %identity.user_id))]
    pub async fn authorize(&self, identity: &Identity, topic: &str) -> Option<Topic> {
        let parsed = match topic.parse::<Topic>() {
            Ok(parsed) => parsed,
            Err(e) => {
                tracing::debug!(error = %e, "denied: unparseable topic");
                return None;
            }
        };

        let granted = match parsed {
            Topic::User(id) => id == identity.user_id,
            Topic::Admin => identity.is_admin(),
            Topic::Group(group_id) => {
                match self
                    .group_repository
                    .is_member_or_teacher(group_id, identity.user_id)
                    .await
                {
                    Ok(member) => member,
                    Err(e) => {
                        tracing::error!(%group_id, error = %e, "denied: group membership lookup failed");
                        false
                    }
                }
            }
        };

        if granted {
            tracing::debug!(topic = %parsed, "subscription authorized");
            Some(parsed)
        } else {
            tracing::info!(topic = %parsed, "subscription denied");
            None
        }
    }
}
