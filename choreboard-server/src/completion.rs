use tracing::warn;

use crate::photos::{PhotoError, PhotoStore};
use crate::storage::models::Completion;
use crate::storage::{StorageError, Store, validate_minutes};

#[derive(Debug, thiserror::Error)]
pub enum CompleteError {
    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("photo error: {0}")]
    Photo(#[from] PhotoError),
}

/// An uploaded photo as received from the client.
pub struct PhotoInput<'a> {
    pub bytes: &'a [u8],
    pub filename: &'a str,
}

/// Marks an assignment done, storing the optional photo first.
///
/// If the photo cannot be written nothing is recorded. If the completion
/// row cannot be inserted the freshly written photo is removed again.
pub async fn complete_assignment(
    store: &Store,
    photos: &dyn PhotoStore,
    assignment_id: i32,
    actual_minutes: i32,
    photo: Option<PhotoInput<'_>>,
) -> Result<Completion, CompleteError> {
    validate_minutes(actual_minutes)?;

    let saved = match photo {
        Some(p) => Some(photos.save(p.bytes, p.filename).await?),
        None => None,
    };

    match store
        .mark_complete(assignment_id, actual_minutes, saved.clone())
        .await
    {
        Ok(c) => Ok(c),
        Err(e) => {
            if let Some(id) = &saved
                && let Err(rm) = photos.remove(id).await
            {
                warn!(photo = %id, error = %rm, "failed to remove photo of rejected completion");
            }
            Err(e.into())
        }
    }
}
