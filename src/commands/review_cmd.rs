//! Review Mutations
//!
//! Save (create or update) and delete of the signed-in user's review on a
//! food or pokemon. Callers re-fetch the parent's reviews afterwards.

use std::marker::PhantomData;
use std::sync::Arc;

use serde_json::Value;

use super::form::{Confirm, MutationError};
use super::forms::validate_comment;
use crate::domain::{ChildRecord, Row, UserId};
use crate::notice::NoticeBoard;
use crate::repository::{RecordBackend, RowScope};
use crate::session::SessionProvider;

pub const DELETE_REVIEW_PROMPT: &str = "Delete this review?";

pub struct ReviewMutations<C: ChildRecord> {
    backend: Arc<dyn RecordBackend>,
    session: Arc<dyn SessionProvider>,
    notices: NoticeBoard,
    _review: PhantomData<fn() -> C>,
}

impl<C: ChildRecord> ReviewMutations<C> {
    pub fn new(
        backend: Arc<dyn RecordBackend>,
        session: Arc<dyn SessionProvider>,
        notices: NoticeBoard,
    ) -> Self {
        Self {
            backend,
            session,
            notices,
            _review: PhantomData,
        }
    }

    /// Create a review on `parent_id`, or update `review_id` when given
    pub async fn save(
        &self,
        parent_id: &str,
        review_id: Option<&str>,
        comment: &str,
    ) -> Result<(), MutationError> {
        validate_comment(comment)?;
        let result = self.write(parent_id, review_id, comment.trim()).await;
        match &result {
            Ok(()) if review_id.is_some() => {
                self.notices.success("Review updated!");
            }
            Ok(()) => {
                self.notices.success("Review added!");
            }
            Err(e) => self.report(e),
        }
        result
    }

    async fn write(
        &self,
        parent_id: &str,
        review_id: Option<&str>,
        comment: &str,
    ) -> Result<(), MutationError> {
        let user = self.require_user()?;
        match review_id {
            Some(id) => {
                let mut patch = Row::new();
                patch.insert("comment".to_string(), Value::String(comment.to_string()));
                let scope = RowScope::by_id(id).owned_by(&user);
                if self.backend.update(C::TABLE, &scope, patch).await? == 0 {
                    return Err(MutationError::NotFound);
                }
                tracing::info!("updated review {} on {}", id, parent_id);
            }
            None => {
                let row = C::new_row(parent_id, &user, comment);
                self.backend.insert(C::TABLE, row).await?;
                tracing::info!("added review on {}", parent_id);
            }
        }
        Ok(())
    }

    pub async fn delete(&self, review_id: &str, confirm: &dyn Confirm) -> Result<(), MutationError> {
        if !confirm.confirm(DELETE_REVIEW_PROMPT) {
            return Err(MutationError::Cancelled);
        }
        let result = self.remove(review_id).await;
        match &result {
            Ok(()) => {
                self.notices.success("Review deleted");
            }
            Err(e) => self.report(e),
        }
        result
    }

    async fn remove(&self, review_id: &str) -> Result<(), MutationError> {
        let user = self.require_user()?;
        let scope = RowScope::by_id(review_id).owned_by(&user);
        if self.backend.delete(C::TABLE, &scope).await? == 0 {
            return Err(MutationError::NotFound);
        }
        tracing::info!("deleted review {}", review_id);
        Ok(())
    }

    fn require_user(&self) -> Result<UserId, MutationError> {
        self.session.user_id().ok_or(MutationError::Unauthenticated)
    }

    fn report(&self, error: &MutationError) {
        if !matches!(error, MutationError::Validation(_) | MutationError::Cancelled) {
            tracing::error!("review mutation failed: {}", error);
            self.notices.error(error.to_string());
        }
    }
}
