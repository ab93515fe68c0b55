use std::sync::Arc;

use uuid::Uuid;

use crate::domain::definition::{ActorRef, GroupRef, NotificationDefinition};
use crate::domain::user::Identity;
use crate::usecase::contracts::{GroupRepository, NotificationRepository, UserDirectory};
use crate::usecase::dispatcher::NotificationDispatcher;
use crate::usecase::error::UsecaseError;

/// Adds students to groups. The `student_added_to_group` notification is only
/// dispatched once the enrollment is committed and only when a row was inserted.
pub struct EnrollmentUseCase<G, U, N>
where
    G: GroupRepository + ?Sized,
    U: UserDirectory + ?Sized,
    N: NotificationRepository + ?Sized,
{
    group_repository: Arc<G>,
    user_directory: Arc<U>,
    dispatcher: Arc<NotificationDispatcher<N>>,
}

impl<G, U, N> EnrollmentUseCase<G, U, N>
where
    G: GroupRepository + ?Sized,
    U: UserDirectory + ?Sized,
    N: NotificationRepository + ?Sized,
{
    pub fn new(
        group_repository: Arc<G>,
        user_directory: Arc<U>,
        dispatcher: Arc<NotificationDispatcher<N>>,
    ) -> Self {
        Self {
            group_repository,
            user_directory,
            dispatcher,
        }
    }

    /// Returns `true` when the student was newly enrolled.
    #[tracing::instrument(skip(self, actor), fields(actor_id = %actor.user_id, group_id = %group_id, student_id = %student_id))]
    pub async fn enroll_student(
        &self,
        actor: &Identity,
        group_id: Uuid,
        student_id: Uuid,
    ) -> Result<bool, UsecaseError> {
        tracing::debug!("enrolling student");

        let group = self
            .group_repository
            .find_by_id(group_id)
            .await?
            .ok_or_else(|| UsecaseError::NotFound("Group".to_string()))?;

        if !actor.manages_groups() && !group.is_taught_by(actor.user_id) {
            return Err(UsecaseError::Forbidden(
                "You are not allowed to manage this group".to_string(),
            ));
        }

        let student = self
            .user_directory
            .find_recipient(student_id)
            .await?
            .ok_or_else(|| UsecaseError::NotFound("Student".to_string()))?;
        let actor_name = self
            .user_directory
            .find_recipient(actor.user_id)
            .await?
            .map(|recipient| recipient.name)
            .ok_or_else(|| UsecaseError::NotFound("User".to_string()))?;

        let inserted = self
            .group_repository
            .enroll_student(group_id, student_id)
            .await?;

        if !inserted {
            tracing::info!("student already enrolled, nothing to notify");
            return Ok(false);
        }

        let definition = NotificationDefinition::StudentAddedToGroup {
            added_by: ActorRef {
                id: actor.user_id,
                name: actor_name,
                role: actor.role,
            },
            group: Some(GroupRef {
                id: group.id,
                name: group.name,
                subject: group.subject,
            }),
        };
        if let Err(e) = self.dispatcher.notify(&student, &definition).await {
            tracing::error!(error = %e, "student enrolled but notification failed");
        }

        tracing::info!("student enrolled");
        Ok(true)
    }
}
