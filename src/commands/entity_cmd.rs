//! Entity Mutations
//!
//! Create, update and delete for one domain. Writes go to the backend
//! only; the list catches up through the change feed. Photos are uploaded
//! first and their public URL stored in the record.

use std::sync::Arc;

use serde_json::Value;

use super::form::{Confirm, EntityForm, FormState, MutationError, PhotoInput, PhotoUpload};
use crate::domain::{Bucket, Entity, Row, UserId, OWNER_COLUMN};
use crate::notice::NoticeBoard;
use crate::repository::{ObjectStorage, RecordBackend, RowScope};
use crate::session::SessionProvider;
use crate::store::{ChildPurge, RecordStore};

pub struct EntityMutations<F: EntityForm> {
    backend: Arc<dyn RecordBackend>,
    storage: Arc<dyn ObjectStorage>,
    session: Arc<dyn SessionProvider>,
    notices: NoticeBoard,
    store: RecordStore<F::Record>,
    children: Option<Arc<dyn ChildPurge>>,
}

impl<F: EntityForm> EntityMutations<F> {
    pub fn new(
        backend: Arc<dyn RecordBackend>,
        storage: Arc<dyn ObjectStorage>,
        session: Arc<dyn SessionProvider>,
        notices: NoticeBoard,
        store: RecordStore<F::Record>,
    ) -> Self {
        Self {
            backend,
            storage,
            session,
            notices,
            store,
            children: None,
        }
    }

    /// Cached reviews to drop when a parent is deleted
    pub fn with_child_purge(mut self, children: Arc<dyn ChildPurge>) -> Self {
        self.children = Some(children);
        self
    }

    /// Select `record` and load it into a form
    pub fn start_edit(&self, record: &F::Record) -> FormState<F> {
        self.store.select(record.clone());
        FormState::editing(record)
    }

    pub fn cancel_edit(&self, form: &mut FormState<F>) {
        self.store.clear_selection();
        form.reset();
    }

    /// Create, or update the selected record
    pub async fn submit(&self, form: &mut FormState<F>) -> Result<(), MutationError> {
        if !form.validate() {
            return Err(MutationError::Validation(form.errors.clone()));
        }
        let selected = self.store.selected();
        let result = self.write(&form.values, selected.as_ref()).await;

        match result {
            Ok(()) => {
                if selected.is_some() {
                    self.store.clear_selection();
                    self.notices
                        .success(format!("Successfully updated {}!", F::NOUN));
                } else {
                    self.notices
                        .success(format!("Successfully added {}!", F::NOUN));
                }
                form.reset();
                Ok(())
            }
            Err(e) => {
                self.report(&e);
                Err(e)
            }
        }
    }

    async fn write(&self, values: &F, selected: Option<&F::Record>) -> Result<(), MutationError> {
        let user = self.require_user()?;
        let mut row = values.to_row();

        if let Some((bucket, column)) = F::PHOTO {
            match values.photo() {
                PhotoInput::New(upload) => match self.upload(bucket, upload).await {
                    Some(url) => {
                        row.insert(column.to_string(), Value::String(url));
                    }
                    // A failed upload keeps an existing record's photo
                    None if selected.is_none() => {
                        row.insert(column.to_string(), Value::Null);
                    }
                    None => {}
                },
                // Unchanged photo is left out of an update
                PhotoInput::Existing(url) if selected.is_none() => {
                    row.insert(column.to_string(), Value::String(url.clone()));
                }
                _ => {}
            }
        }

        match selected {
            Some(record) => self.update(record.id(), &user, row).await,
            None => self.create(&user, row).await,
        }
    }

    async fn create(&self, user: &str, mut row: Row) -> Result<(), MutationError> {
        row.insert(OWNER_COLUMN.to_string(), Value::String(user.to_string()));
        let stored = self.backend.insert(<F::Record as Entity>::TABLE, row).await?;
        tracing::info!(
            "created {} {}",
            F::NOUN,
            stored.get("id").and_then(serde_json::Value::as_str).unwrap_or_default()
        );
        Ok(())
    }

    async fn update(&self, id: &str, user: &str, row: Row) -> Result<(), MutationError> {
        let scope = RowScope::by_id(id).owned_by(user);
        let changed = self
            .backend
            .update(<F::Record as Entity>::TABLE, &scope, row)
            .await?;
        if changed == 0 {
            return Err(MutationError::NotFound);
        }
        tracing::info!("updated {} {}", F::NOUN, id);
        Ok(())
    }

    /// Upload a picked file; failures are reported and yield no URL
    async fn upload(&self, bucket: Bucket, upload: &PhotoUpload) -> Option<String> {
        let key = upload.storage_key();
        match self
            .storage
            .upload(bucket, &key, upload.bytes.clone(), &upload.content_type())
            .await
        {
            Ok(()) => Some(self.storage.public_url(bucket, &key)),
            Err(e) => {
                tracing::error!("upload of {} failed: {}", upload.file_name, e);
                self.notices.error(e.to_string());
                None
            }
        }
    }

    /// Delete after confirmation, dropping cached reviews and selection
    pub async fn delete(&self, record: &F::Record, confirm: &dyn Confirm) -> Result<(), MutationError> {
        if !confirm.confirm(F::DELETE_PROMPT) {
            return Err(MutationError::Cancelled);
        }
        let result = self.remove(record.id()).await;
        if let Err(e) = &result {
            self.report(e);
        }
        result
    }

    async fn remove(&self, id: &str) -> Result<(), MutationError> {
        let user = self.require_user()?;
        let scope = RowScope::by_id(id).owned_by(&user);
        let removed = self
            .backend
            .delete(<F::Record as Entity>::TABLE, &scope)
            .await?;
        if removed == 0 {
            return Err(MutationError::NotFound);
        }

        tracing::info!("deleted {} {}", F::NOUN, id);
        self.notices.success(F::DELETED_MESSAGE);
        if let Some(children) = &self.children {
            children.purge_parent(id);
        }
        self.store.clear_selection_if(id);
        Ok(())
    }

    fn require_user(&self) -> Result<UserId, MutationError> {
        self.session.user_id().ok_or(MutationError::Unauthenticated)
    }

    fn report(&self, error: &MutationError) {
        match error {
            MutationError::Validation(_) | MutationError::Cancelled => {}
            other => {
                tracing::error!("{} mutation failed: {}", F::NOUN, other);
                self.notices.error(other.to_string());
            }
        }
    }
}
