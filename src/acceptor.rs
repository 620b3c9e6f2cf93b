//! TCP accept loop: one worker thread per connected legacy client.
//! Grounded on the original bridge's `FSForceListener.Run` - a blocking
//! accept loop handing each new socket off to its own handler, except
//! here each handler gets its own OS thread instead of being polled from
//! a single `select()` over every connection.

use std::net::TcpListener;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;

use crate::connection::Connection;
use crate::dispatcher::{Dispatcher, Session};

/// Binds the TCP listener and accepts connections until `running` is
/// cleared, spawning one worker thread per session.
pub fn run(addr: &str, dispatcher: Arc<Dispatcher>, running: Arc<AtomicBool>) -> std::io::Result<()> {
    let listener = TcpListener::bind(addr)?;
    // accept() must not block forever past shutdown, so poll it nonblocking.
    listener.set_nonblocking(true)?;
    log::info!("listening for legacy clients on {addr}");

    let next_id = AtomicU64::new(1);

    while running.load(Ordering::Relaxed) {
        match listener.accept() {
            Ok((sock, peer)) => {
                let id = next_id.fetch_add(1, Ordering::Relaxed);
                log::info!("session {id} accepted from {peer}");

                let conn = match Connection::new(sock) {
                    Ok(c) => c,
                    Err(e) => {
                        log::warn!("session {id} failed to configure socket: {e}");
                        continue;
                    }
                };
                let session = Session::new(id, conn);
                dispatcher.register(session.clone());

                let worker_dispatcher = dispatcher.clone();
                let worker_running = running.clone();
                thread::spawn(move || {
                    worker_dispatcher.run_session(session, &worker_running);
                });
            }
            Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                thread::sleep(std::time::Duration::from_millis(50));
            }
            Err(e) => {
                log::warn!("accept() failed: {e}");
                thread::sleep(std::time::Duration::from_millis(50));
            }
        }
    }
    Ok(())
}
