//! One-shot account-creation job: logs a headless client in, and on
//! login failure walks the character-create branch to produce a usable
//! game account. GM promotion is left to an external SQL tool — this
//! job only creates the account and character.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use geo_coordinator::{Coordinator, Event};
use geo_protocol::game::GameSession;
use geo_protocol::login::run_login_handshake;

static BOOTSTRAP_RUNNING: AtomicBool = AtomicBool::new(false);

pub struct BootstrapOutcome {
    pub created: usize,
    pub failed: usize,
}

fn account_name(prefix: &str, index: usize, total: usize) -> String {
    let width = if total >= 100 { 3 } else { 2 };
    format!("{prefix}{index:0width$}", width = width)
}

/// Runs synchronously on the caller's thread; the HTTP handler spawns a
/// background thread for this so the request returns immediately.
pub fn run_bootstrap(
    coordinator: Arc<Coordinator>,
    login_addr: String,
    account_prefix: String,
    password: String,
    count: usize,
) -> BootstrapOutcome {
    if BOOTSTRAP_RUNNING.swap(true, Ordering::SeqCst) {
        coordinator.push_log("warn", "bootstrap already running");
        return BootstrapOutcome { created: 0, failed: 0 };
    }

    let outcome = do_bootstrap(&coordinator, &login_addr, &account_prefix, &password, count);
    BOOTSTRAP_RUNNING.store(false, Ordering::SeqCst);
    outcome
}

fn do_bootstrap(
    coordinator: &Arc<Coordinator>,
    login_addr: &str,
    account_prefix: &str,
    password: &str,
    count: usize,
) -> BootstrapOutcome {
    let mut created = 0;
    let mut failed = 0;

    for i in 0..count {
        let name = account_name(account_prefix, i + 1, count);
        coordinator.push_log("info", format!("creating account {}/{count}: {name}", i + 1));

        match create_one_account(login_addr, &name, password) {
            Ok(()) => created += 1,
            Err(err) => {
                failed += 1;
                coordinator.push_log("error", format!("failed to create {name}: {err}"));
            }
        }

        coordinator.publish(Event::BootstrapProgress {
            current: i + 1,
            total: count,
            created,
            failed,
            phase: "creating".to_string(),
        });

        if i + 1 < count {
            std::thread::sleep(std::time::Duration::from_secs(2));
        }
    }

    coordinator.publish(Event::BootstrapProgress {
        current: count,
        total: count,
        created,
        failed,
        phase: "done".to_string(),
    });

    BootstrapOutcome { created, failed }
}

/// Relies on the login server's own auto-create-account behavior: a
/// fresh username/password pair simply succeeds here. If the returned
/// character list is empty, a character is created before entering
/// world, matching `full_connect_or_create`'s branch.
fn create_one_account(login_addr: &str, name: &str, password: &str) -> Result<(), geo_protocol::ProtocolError> {
    let (keys, server) = run_login_handshake(login_addr, name, password)?;
    let game_addr = format!(
        "{}.{}.{}.{}:{}",
        server.ip[0], server.ip[1], server.ip[2], server.ip[3], server.port
    );
    let mut session = GameSession::connect(&game_addr)?;
    let characters = session.auth_login(name, keys.play_key2, keys.play_key1, keys.login_key1, keys.login_key2)?;
    if characters.is_empty() {
        session.create_character(name, 0x00, 0, 0, 0, 0)?;
    }
    session.select_char_and_enter_world(0)?;
    Ok(())
}
