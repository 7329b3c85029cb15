//! Shared application state: the coordinator, an in-memory region cache,
//! and the worker pool the scan/start|stop|worker endpoints drive.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use geo_codec::region::Region;
use geo_coordinator::Coordinator;

use crate::worker_pool::WorkerPool;

#[derive(Clone)]
pub struct AppState {
    pub coordinator: Arc<Coordinator>,
    pub region_cache: Arc<Mutex<HashMap<String, Region>>>,
    pub output_dir: PathBuf,
    pub worker_pool: Arc<WorkerPool>,
}

impl AppState {
    pub fn new(coordinator: Arc<Coordinator>, output_dir: PathBuf, login_addr: String, account_prefix: String, password: String) -> Self {
        let worker_pool = Arc::new(WorkerPool::new(
            Arc::clone(&coordinator),
            output_dir.clone(),
            login_addr,
            account_prefix,
            password,
        ));
        Self {
            coordinator,
            region_cache: Arc::new(Mutex::new(HashMap::new())),
            output_dir,
            worker_pool,
        }
    }

    /// Loads a region from the cache, or from disk into the cache.
    pub fn load_region(&self, name: &str) -> std::io::Result<Option<Region>> {
        {
            let cache = self.region_cache.lock().unwrap();
            if let Some(region) = cache.get(name) {
                return Ok(Some(region.clone()));
            }
        }

        let path = self.output_dir.join(format!("{name}.l2d"));
        if !path.exists() {
            return Ok(None);
        }
        let region = Region::read_from_file(&path).map_err(|e| match e {
            geo_codec::FormatError::Io(io) => io,
            other => std::io::Error::new(std::io::ErrorKind::InvalidData, other.to_string()),
        })?;

        self.region_cache
            .lock()
            .unwrap()
            .insert(name.to_string(), region.clone());
        Ok(Some(region))
    }

    pub fn with_region_mut<F, R>(&self, name: &str, f: F) -> std::io::Result<Option<R>>
    where
        F: FnOnce(&mut Region) -> R,
    {
        if self.load_region(name)?.is_none() {
            return Ok(None);
        }
        let mut cache = self.region_cache.lock().unwrap();
        let region = cache.get_mut(name).expect("just loaded above");
        Ok(Some(f(region)))
    }

    /// Writes the cached region to disk and evicts it from the cache.
    pub fn save_region(&self, name: &str) -> std::io::Result<bool> {
        let region = {
            let mut cache = self.region_cache.lock().unwrap();
            cache.remove(name)
        };
        match region {
            Some(region) => {
                let path = self.output_dir.join(region.file_name());
                region
                    .write_to_file(&path)
                    .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e.to_string()))?;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}
