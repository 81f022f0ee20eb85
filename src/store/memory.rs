//! In-memory [RemoteStore] with failure injection, used by unit tests
//! to exercise the pipeline without network calls.

use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::errors::StoreError;
use crate::store::{RemoteObject, RemoteStore};

#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<State>,
}

#[derive(Default)]
struct State {
    objects: BTreeMap<String, StoredObject>,
    fail_uploads: bool,
    fail_lists: bool,
    swallow_uploads: bool,
    fail_delete_ids: HashSet<String>,
}

struct StoredObject {
    location: String,
    name: String,
    size: u64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every upload fails with a network error.
    pub fn fail_uploads(&self) {
        self.state.lock().unwrap().fail_uploads = true;
    }

    /// Every listing fails with a network error.
    pub fn fail_lists(&self) {
        self.state.lock().unwrap().fail_lists = true;
    }

    /// Uploads report success but the object never lands, as a store
    /// with broken read-after-write would behave.
    pub fn swallow_uploads(&self) {
        self.state.lock().unwrap().swallow_uploads = true;
    }

    /// Deleting the given object id fails with an authorization error.
    pub fn fail_delete(&self, object_id: &str) {
        self.state
            .lock()
            .unwrap()
            .fail_delete_ids
            .insert(object_id.to_string());
    }

    /// Seeds an object directly, returning its id.
    pub fn insert(&self, location: &str, name: &str, size: u64) -> String {
        let id = Self::object_id(location, name);
        self.state.lock().unwrap().objects.insert(
            id.clone(),
            StoredObject {
                location: location.to_string(),
                name: name.to_string(),
                size,
            },
        );
        id
    }

    pub fn object_names(&self, location: &str) -> Vec<String> {
        self.state
            .lock()
            .unwrap()
            .objects
            .values()
            .filter(|o| o.location == location)
            .map(|o| o.name.clone())
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.state.lock().unwrap().objects.is_empty()
    }

    fn object_id(location: &str, name: &str) -> String {
        if location.is_empty() {
            name.to_string()
        } else {
            format!("{location}/{name}")
        }
    }
}

#[async_trait]
impl RemoteStore for MemoryStore {
    async fn list(&self, location_id: &str) -> Result<Vec<RemoteObject>, StoreError> {
        let state = self.state.lock().unwrap();
        if state.fail_lists {
            return Err(StoreError::Network("simulated listing outage".to_string()));
        }
        Ok(state
            .objects
            .iter()
            .filter(|(_, o)| o.location == location_id)
            .map(|(id, o)| RemoteObject {
                id: id.clone(),
                name: o.name.clone(),
                size: o.size,
                created_at: None,
            })
            .collect())
    }

    async fn upload(
        &self,
        location_id: &str,
        name: &str,
        source: &Path,
    ) -> Result<String, StoreError> {
        {
            let state = self.state.lock().unwrap();
            if state.fail_uploads {
                return Err(StoreError::Network(
                    "simulated network failure during upload".to_string(),
                ));
            }
        }
        let size = std::fs::metadata(source)
            .map_err(|e| StoreError::Other(format!("cannot read upload source: {e}")))?
            .len();

        let mut state = self.state.lock().unwrap();
        let id = Self::object_id(location_id, name);
        if !state.swallow_uploads {
            state.objects.insert(
                id.clone(),
                StoredObject {
                    location: location_id.to_string(),
                    name: name.to_string(),
                    size,
                },
            );
        }
        Ok(id)
    }

    async fn delete(&self, object_id: &str) -> Result<(), StoreError> {
        let mut state = self.state.lock().unwrap();
        if state.fail_delete_ids.contains(object_id) {
            return Err(StoreError::AccessDenied(format!(
                "simulated denial deleting {object_id}"
            )));
        }
        if state.objects.remove(object_id).is_none() {
            return Err(StoreError::LocationNotFound(object_id.to_string()));
        }
        Ok(())
    }
}
