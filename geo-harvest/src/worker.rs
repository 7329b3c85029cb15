//! The worker lifecycle: connect, claim regions until none remain or a
//! stop signal arrives, disconnect. One thread owns one worker's socket
//! and cipher state exclusively; only registry updates cross threads.

use std::net::TcpStream;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use geo_codec::region::Region;
use geo_coordinator::{Coordinator, RegionStatus, WorkerStatus, WorkerUpdate};
use geo_protocol::game::GameSession;
use geo_protocol::login::run_login_handshake;

use crate::{harvest_region, HarvestError};

const RECONNECT_BACKOFF: Duration = Duration::from_secs(5);

pub struct WorkerConfig {
    pub name: String,
    pub login_addr: String,
    pub username: String,
    pub password: String,
    pub output_dir: std::path::PathBuf,
    /// Holds a clone of the worker's live game socket while a region scan
    /// is in flight, so the pool can force-close it if this worker outlives
    /// its stop deadline.
    pub socket: Arc<Mutex<Option<TcpStream>>>,
}

/// Runs one worker's full lifecycle on the calling thread. Intended to be
/// invoked from inside a dedicated `std::thread::spawn`.
pub fn run_worker(config: WorkerConfig, coordinator: Arc<Coordinator>, stop: Arc<AtomicBool>) {
    coordinator.register_worker(config.name.clone());

    while !stop.load(Ordering::SeqCst) {
        coordinator.update_worker(
            &config.name,
            WorkerUpdate {
                status: Some(WorkerStatus::Connecting),
                ..Default::default()
            },
        );

        let region = match coordinator.get_next_region(&config.name) {
            Ok(Some(region)) => region,
            Ok(None) => {
                coordinator.update_worker(
                    &config.name,
                    WorkerUpdate {
                        status: Some(WorkerStatus::Idle),
                        ..Default::default()
                    },
                );
                break;
            }
            Err(err) => {
                tracing::error!(worker = %config.name, %err, "registry lookup failed");
                thread::sleep(RECONNECT_BACKOFF);
                continue;
            }
        };
        let region_key = region.key();

        let outcome = scan_one_region(&config, &coordinator, &stop, region.region_x, region.region_y);
        *config.socket.lock().unwrap() = None;
        match outcome {
            Ok(()) => {
                let _ = coordinator.release_region(&region_key, RegionStatus::Complete, None);
            }
            Err(WorkerOutcome::Retry(err)) => {
                tracing::warn!(worker = %config.name, region = %region_key, %err, "scan failed, retrying region");
                let _ = coordinator.release_region(&region_key, RegionStatus::Pending, Some(err.to_string()));
                thread::sleep(RECONNECT_BACKOFF);
            }
            Err(WorkerOutcome::Fatal(err)) => {
                tracing::error!(worker = %config.name, region = %region_key, %err, "scan failed, marking region as error");
                let _ = coordinator.release_region(&region_key, RegionStatus::Error, Some(err.to_string()));
                coordinator.update_worker(
                    &config.name,
                    WorkerUpdate {
                        status: Some(WorkerStatus::Error),
                        errors: Some(1),
                        ..Default::default()
                    },
                );
            }
            Err(WorkerOutcome::Stopped) => {
                let _ = coordinator.release_region(&region_key, RegionStatus::Pending, None);
                break;
            }
        }
    }

    coordinator.update_worker(
        &config.name,
        WorkerUpdate {
            status: Some(WorkerStatus::Stopped),
            ..Default::default()
        },
    );
}

enum WorkerOutcome {
    /// Transport/crypto trouble: release to PENDING, back off, try again.
    Retry(HarvestError),
    /// Server-signaled rejection: release as ERROR, stop retrying this one.
    Fatal(HarvestError),
    Stopped,
}

fn scan_one_region(
    config: &WorkerConfig,
    coordinator: &Arc<Coordinator>,
    stop: &Arc<AtomicBool>,
    rx: i64,
    ry: i64,
) -> Result<(), WorkerOutcome> {
    let (keys, server) = run_login_handshake(&config.login_addr, &config.username, &config.password)
        .map_err(|e| WorkerOutcome::Retry(HarvestError::Protocol(e)))?;

    let game_addr = format!(
        "{}.{}.{}.{}:{}",
        server.ip[0], server.ip[1], server.ip[2], server.ip[3], server.port
    );
    let mut session = GameSession::connect(&game_addr)
        .map_err(|e| WorkerOutcome::Retry(HarvestError::Protocol(e)))?;
    if let Ok(clone) = session.try_clone_stream() {
        *config.socket.lock().unwrap() = Some(clone);
    }
    session
        .auth_login(&config.username, keys.play_key2, keys.play_key1, keys.login_key1, keys.login_key2)
        .map_err(|e| match e {
            geo_protocol::ProtocolError::AuthRejected => WorkerOutcome::Fatal(HarvestError::Protocol(e)),
            other => WorkerOutcome::Retry(HarvestError::Protocol(other)),
        })?;
    session
        .select_char_and_enter_world(0)
        .map_err(|e| WorkerOutcome::Retry(HarvestError::Protocol(e)))?;

    coordinator.update_worker(
        &config.name,
        WorkerUpdate {
            status: Some(WorkerStatus::Scanning),
            current_region: Some(format!("{rx}_{ry}")),
            ..Default::default()
        },
    );

    let region_key = format!("{rx}_{ry}");
    let worker_name = config.name.clone();
    let coordinator_for_progress = Arc::clone(coordinator);
    let mut last_sample = (Instant::now(), 0usize);
    let region = harvest_region(&mut session, rx, ry, move |progress| {
        let now = Instant::now();
        let elapsed = now.duration_since(last_sample.0).as_secs_f64();
        let rate = if elapsed > 0.0 {
            (progress.cells_scanned - last_sample.1) as f64 / elapsed
        } else {
            0.0
        };
        last_sample = (now, progress.cells_scanned);

        coordinator_for_progress.update_worker(
            &worker_name,
            WorkerUpdate {
                cells_scanned: Some(progress.cells_scanned as u64),
                cells_per_sec: Some(rate),
                ..Default::default()
            },
        );
    });

    if stop.load(Ordering::SeqCst) {
        return Err(WorkerOutcome::Stopped);
    }

    let region: Region = region.map_err(WorkerOutcome::Retry)?;
    let path = config.output_dir.join(region.file_name());
    region
        .write_to_file(&path)
        .map_err(|e| WorkerOutcome::Retry(HarvestError::Format(e)))?;

    let _ = region_key;
    Ok(())
}
