//! Mock record store for testing.

use parking_lot::Mutex;

use crate::composer::{PreparedVideo, PreparedVideoFilter, RecordError, RecordStore};

/// In-memory implementation of the RecordStore trait.
#[derive(Debug, Default)]
pub struct MockRecordStore {
    videos: Mutex<Vec<PreparedVideo>>,
    next_error: Mutex<Option<RecordError>>,
}

impl MockRecordStore {
    /// Create a new empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// All stored records in insertion order.
    pub fn stored(&self) -> Vec<PreparedVideo> {
        self.videos.lock().clone()
    }

    /// Make the next add fail.
    pub fn set_next_error(&self, error: RecordError) {
        *self.next_error.lock() = Some(error);
    }
}

impl RecordStore for MockRecordStore {
    fn add_prepared_video(&self, video: &PreparedVideo) -> Result<(), RecordError> {
        if let Some(err) = self.next_error.lock().take() {
            return Err(err);
        }
        self.videos.lock().push(video.clone());
        Ok(())
    }

    fn get_one_prepared_video(
        &self,
        filter: &PreparedVideoFilter,
    ) -> Result<Option<PreparedVideo>, RecordError> {
        let videos = self.videos.lock();
        let found = videos.iter().find(|v| {
            filter.job_id.as_ref().is_none_or(|j| &v.job_id == j)
                && filter.scenario.as_ref().is_none_or(|s| &v.scenario == s)
                && filter
                    .account
                    .as_ref()
                    .is_none_or(|a| v.accounts.contains(a))
        });
        Ok(found.cloned())
    }
}
