//! Progress cursor storage trait.

use attest_types::Progress;

use crate::StoreError;

/// Named cursors for indexing streams and cronjobs.
pub trait ProgressStore {
    /// The cursor for `name`, or `None` if the stream has never run.
    fn get_progress(&self, name: &str) -> Result<Option<Progress>, StoreError>;

    /// Overwrite the cursor for `progress.name` in its own transaction.
    ///
    /// Used by cronjobs whose state advances independently of any other row.
    /// Indexing streams write their cursor through a
    /// [`WriteBatch`](crate::WriteBatch) together with the rows it describes.
    fn put_progress(&self, progress: &Progress) -> Result<(), StoreError>;
}
