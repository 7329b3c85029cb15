//! Runtime pool of scan workers, started/stopped/resized from the HTTP
//! layer. Each worker owns its own OS thread, socket, and cipher state.

use std::collections::HashMap;
use std::net::{Shutdown, TcpStream};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use geo_coordinator::Coordinator;
use geo_harvest::worker::{run_worker, WorkerConfig};

const STAGGER: Duration = Duration::from_secs(2);
const JOIN_TIMEOUT: Duration = Duration::from_secs(10);

struct Handle {
    stop: Arc<AtomicBool>,
    join: Option<JoinHandle<()>>,
    socket: Arc<Mutex<Option<TcpStream>>>,
}

pub struct WorkerPool {
    coordinator: Arc<Coordinator>,
    output_dir: PathBuf,
    login_addr: String,
    account_prefix: String,
    password: String,
    handles: Mutex<HashMap<String, Handle>>,
}

fn worker_name(prefix: &str, index: usize, total: usize) -> String {
    let width = if total >= 100 { 3 } else { 2 };
    format!("{prefix}{index:0width$}", width = width)
}

impl WorkerPool {
    pub fn new(
        coordinator: Arc<Coordinator>,
        output_dir: PathBuf,
        login_addr: String,
        account_prefix: String,
        password: String,
    ) -> Self {
        Self {
            coordinator,
            output_dir,
            login_addr,
            account_prefix,
            password,
            handles: Mutex::new(HashMap::new()),
        }
    }

    pub fn active_count(&self) -> usize {
        self.handles.lock().unwrap().len()
    }

    pub fn login_addr(&self) -> &str {
        &self.login_addr
    }

    pub fn account_prefix(&self) -> &str {
        &self.account_prefix
    }

    pub fn password(&self) -> &str {
        &self.password
    }

    /// Starts `count` workers, staggered 2s apart, each pulling regions
    /// from the coordinator until none remain or it is told to stop.
    pub fn start(&self, count: usize) {
        let existing = self.active_count();
        for i in 0..count {
            let name = worker_name(&self.account_prefix, existing + i + 1, existing + count);
            self.spawn_worker(name, i as u32 * STAGGER.as_secs() as u32);
        }
    }

    pub fn add_worker(&self, name: Option<String>) {
        let name = name.unwrap_or_else(|| {
            let idx = self.active_count() + 1;
            worker_name(&self.account_prefix, idx, idx)
        });
        self.spawn_worker(name, 0);
    }

    fn spawn_worker(&self, name: String, stagger_secs: u32) {
        if self.handles.lock().unwrap().contains_key(&name) {
            self.coordinator.push_log("warn", format!("worker {name} already exists"));
            return;
        }

        let stop = Arc::new(AtomicBool::new(false));
        let socket = Arc::new(Mutex::new(None));
        let config = WorkerConfig {
            name: name.clone(),
            login_addr: self.login_addr.clone(),
            username: name.clone(),
            password: self.password.clone(),
            output_dir: self.output_dir.clone(),
            socket: Arc::clone(&socket),
        };
        let coordinator = Arc::clone(&self.coordinator);
        let stop_for_thread = Arc::clone(&stop);

        let join = thread::spawn(move || {
            if stagger_secs > 0 {
                thread::sleep(Duration::from_secs(stagger_secs as u64));
            }
            if !stop_for_thread.load(Ordering::SeqCst) {
                run_worker(config, coordinator, stop_for_thread);
            }
        });

        self.handles.lock().unwrap().insert(
            name,
            Handle {
                stop,
                join: Some(join),
                socket,
            },
        );
    }

    pub fn remove_worker(&self, name: &str) {
        let handle = self.handles.lock().unwrap().remove(name);
        if let Some(handle) = handle {
            handle.stop.store(true, Ordering::SeqCst);
            join_with_timeout(handle.join, handle.socket, JOIN_TIMEOUT);
        }
    }

    /// Signals every worker to stop and joins each with a bounded wait.
    pub fn stop_all(&self) {
        let handles: Vec<Handle> = self.handles.lock().unwrap().drain().map(|(_, h)| h).collect();
        for handle in &handles {
            handle.stop.store(true, Ordering::SeqCst);
        }
        for handle in handles {
            join_with_timeout(handle.join, handle.socket, JOIN_TIMEOUT);
        }
    }
}

/// `std::thread::JoinHandle` has no timed join; we approximate the
/// bounded-wait requirement by polling `is_finished` and, if the deadline
/// passes first, force-closing the worker's live socket so a blocking read
/// inside the dispatch loop errors out and the thread can unwind on its own.
fn join_with_timeout(join: Option<JoinHandle<()>>, socket: Arc<Mutex<Option<TcpStream>>>, timeout: Duration) {
    let Some(join) = join else { return };
    let deadline = std::time::Instant::now() + timeout;
    loop {
        if join.is_finished() {
            let _ = join.join();
            return;
        }
        if std::time::Instant::now() >= deadline {
            if let Some(stream) = socket.lock().unwrap().as_ref() {
                let _ = stream.shutdown(Shutdown::Both);
            }
            let _ = join.join();
            return;
        }
        thread::sleep(Duration::from_millis(50));
    }
}
