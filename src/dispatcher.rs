//! Owns the session registry and the live-sim state derived each tick.
//! Grounded on the original bridge's `FSForceListener` - same
//! `scConnections` dict-of-handlers, same `Tick()` pause/sim-running
//! derivation and named-event fan-out, rewritten around a guarded
//! registry instead of a single-threaded select loop.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use codec::{Exception, ServerMessage};
use simlink::SimCache;

use crate::connection::{Connection, RecvOutcome};
use crate::evaluator;
use crate::session::{SessionContext, SessionState, Outbound, SYSTEM_GROUP_ID};

const TICK_INTERVAL: Duration = Duration::from_millis(250);

pub struct SessionInner {
    pub conn: Connection,
    pub state: SessionState,
}

/// One connected legacy client: its socket pump and protocol state behind
/// a single guard, so a tick or a fan-out never needs two locks in a
/// fixed order to touch one session.
pub struct Session {
    pub id: u64,
    inner: Mutex<SessionInner>,
}

impl Session {
    pub fn new(id: u64, conn: Connection) -> Arc<Self> {
        Arc::new(Session { id, inner: Mutex::new(SessionInner { conn, state: SessionState::new(id) }) })
    }

    /// Pumps the socket once, handles at most one inbound message, and
    /// reports whether the session is still alive. Named/system events
    /// produced by the handled message are fanned out only after this
    /// session's own lock is released, so a client transmitting an event
    /// that loops back to itself can't deadlock against its own guard.
    pub fn pump(self: &Arc<Self>, dispatcher: &Dispatcher) -> bool {
        let mut fire_queue = Vec::new();
        let alive = {
            let mut guard = match self.inner.lock() {
                Ok(g) => g,
                Err(poisoned) => poisoned.into_inner(),
            };
            let SessionInner { conn, state } = &mut *guard;

            match conn.recv() {
                Ok(RecvOutcome::Closed) => false,
                Ok(RecvOutcome::None) => true,
                Ok(RecvOutcome::Message(msg, protocol, _counter)) => {
                    log::debug!("session {} received {:?}", self.id, msg);
                    let ctx = dispatcher.session_context();
                    match state.handle(msg, protocol, &ctx) {
                        Ok(actions) => {
                            for action in actions {
                                match action {
                                    Outbound::Send(reply) => conn.send(&reply, state.protocol),
                                    Outbound::FireEvent { name, group_id, data } => {
                                        fire_queue.push((name, group_id, data))
                                    }
                                }
                            }
                            true
                        }
                        Err(e) => {
                            log::warn!("session {} fatal error, closing: {e}", self.id);
                            conn.send(&ServerMessage::Exception(Exception { exception: 0, send_id: 0, index: 0 }), state.protocol);
                            conn.send(&ServerMessage::Quit, state.protocol);
                            let _ = conn.recv(); // best-effort flush of the messages just queued
                            false
                        }
                    }
                }
                Err(e) => {
                    log::warn!("session {} protocol decode error, closing: {e}", self.id);
                    false
                }
            }
        };

        for (name, group_id, data) in fire_queue {
            dispatcher.fire_event(&name, group_id, data);
        }
        alive
    }

    /// Runs the evaluator and derived-axis pass for this session alone,
    /// holding only this session's guard while doing so.
    pub fn tick(&self, cache: &SimCache) {
        let mut guard = match self.inner.lock() {
            Ok(g) => g,
            Err(poisoned) => poisoned.into_inner(),
        };
        let SessionInner { conn, state } = &mut *guard;
        for msg in evaluator::evaluate(&mut state.active_data_requests, &mut state.data_definitions, cache) {
            conn.send(&msg, state.protocol);
        }
        for msg in state.derive_axis_events(cache) {
            conn.send(&msg, state.protocol);
        }
    }
}

/// The session registry plus the process-wide `simRunning`/`paused`
/// derivation. One instance is shared between every session worker
/// thread and the tick-driver thread.
pub struct Dispatcher {
    cache: Arc<SimCache>,
    sessions: Mutex<HashMap<u64, Arc<Session>>>,
    sim_running: AtomicBool,
    paused: AtomicBool,
    /// Whether `paused` holds a real observation yet. The original tracks
    /// this as `lastPaused = None`; a plain bool can't represent "unknown"
    /// on its own, so this flag stands in for that third state and forces
    /// the pause transition to fire on the very first tick regardless of
    /// which way `paused` happens to default.
    paused_known: AtomicBool,
}

impl Dispatcher {
    pub fn new(cache: Arc<SimCache>) -> Self {
        Dispatcher {
            cache,
            sessions: Mutex::new(HashMap::new()),
            sim_running: AtomicBool::new(false),
            paused: AtomicBool::new(false),
            paused_known: AtomicBool::new(false),
        }
    }

    pub fn register(&self, session: Arc<Session>) {
        let id = session.id;
        self.sessions.lock().unwrap().insert(id, session);
        log::info!("session {id} connected");
    }

    pub fn remove(&self, id: u64) {
        if self.sessions.lock().unwrap().remove(&id).is_some() {
            log::info!("session {id} disconnected");
        }
    }

    pub fn session_context(&self) -> SessionContext<'_> {
        SessionContext {
            cache: &self.cache,
            sim_running: self.sim_running.load(Ordering::Relaxed),
            paused: self.paused.load(Ordering::Relaxed),
        }
    }

    /// Delivers a named live-sim or client event to every session
    /// subscribed to it. A session whose lock turns out to be poisoned
    /// (its worker thread panicked) is dropped from the registry rather
    /// than aborting the whole fan-out.
    pub fn fire_event(&self, name: &str, group_id: u32, data: i32) {
        let targets: Vec<Arc<Session>> = self.sessions.lock().unwrap().values().cloned().collect();
        for session in targets {
            let mut guard = match session.inner.lock() {
                Ok(g) => g,
                Err(poisoned) => poisoned.into_inner(),
            };
            if let Some(msg) = guard.state.deliver_named_event(name, group_id, data) {
                guard.conn.send(&msg, guard.state.protocol);
            }
        }
    }

    /// Runs a session's worker pump loop until the session closes or
    /// `running` is cleared. Grounded on the original's per-connection
    /// select loop: nonblocking I/O plus a short sleep when nothing
    /// happened, instead of busy-spinning.
    pub fn run_session(&self, session: Arc<Session>, running: &AtomicBool) {
        loop {
            if !running.load(Ordering::Relaxed) {
                break;
            }
            let did_work = session.pump(self);
            if !did_work {
                break;
            }
            std::thread::sleep(Duration::from_millis(50));
        }
        self.remove(session.id);
    }

    /// Runs the 250ms tick driver: derives `simRunning`/`paused`
    /// transitions and fans out the matching system events, then ticks
    /// every registered session's data-request evaluator and derived axis
    /// events.
    pub fn run(&self, running: &AtomicBool) {
        while running.load(Ordering::Relaxed) {
            self.tick();
            std::thread::sleep(TICK_INTERVAL);
        }
    }

    pub fn tick(&self) {
        if !self.cache.has_data() {
            // nothing has arrived from the live sim yet - nothing to derive
            return;
        }

        let paused_now = self.cache.is_paused();

        // simRunning latches true the first time we observe the sim
        // unpaused; there is no live-sim signal for "sim stopped" to
        // unlatch it, so SimStop is wired up but never fires in practice
        // (see the open question recorded for this decision). Checked and
        // fired ahead of the pause transition below, matching the
        // original's Tick() ordering.
        let prev_sim_running = self.sim_running.load(Ordering::Relaxed);
        let sim_running_now = prev_sim_running || !paused_now;
        if sim_running_now != prev_sim_running {
            self.sim_running.store(sim_running_now, Ordering::Relaxed);
            self.fire_event("sim", SYSTEM_GROUP_ID, sim_running_now as i32);
            self.fire_event(if sim_running_now { "simstart" } else { "simstop" }, SYSTEM_GROUP_ID, 0);
        }

        let sessions: Vec<Arc<Session>> = self.sessions.lock().unwrap().values().cloned().collect();
        for session in &sessions {
            session.tick(&self.cache);
        }

        let was_paused = self.paused.swap(paused_now, Ordering::Relaxed);
        let first_observation = !self.paused_known.swap(true, Ordering::Relaxed);
        if first_observation || paused_now != was_paused {
            self.fire_event("pause", SYSTEM_GROUP_ID, paused_now as i32);
            self.fire_event(if paused_now { "paused" } else { "unpaused" }, SYSTEM_GROUP_ID, 0);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use codec::{ClientMessage, SubscribeToSystemEvent};
    use simlink::Value;
    use std::net::{TcpListener, TcpStream};

    fn connected_pair() -> (TcpStream, TcpStream) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let client = TcpStream::connect(addr).unwrap();
        let (server, _) = listener.accept().unwrap();
        (client, server)
    }

    #[test]
    fn fire_event_reaches_a_subscribed_session() {
        let cache = Arc::new(SimCache::new());
        let dispatcher = Dispatcher::new(cache.clone());
        let (_client, server) = connected_pair();
        let conn = Connection::new(server).unwrap();
        let session = Session::new(1, conn);

        {
            let mut guard = session.inner.lock().unwrap();
            let ctx = SessionContext { cache: &cache, sim_running: false, paused: false };
            guard
                .state
                .handle(
                    ClientMessage::SubscribeToSystemEvent(SubscribeToSystemEvent {
                        client_event_id: 42,
                        event_name: "Pause".to_string(),
                    }),
                    2,
                    &ctx,
                )
                .unwrap();
        }

        dispatcher.register(session.clone());
        dispatcher.fire_event("pause", SYSTEM_GROUP_ID, 1);

        let mut guard = session.inner.lock().unwrap();
        match guard.conn.recv().unwrap() {
            RecvOutcome::None => {} // the reply was queued; actual transmission happens on the pump
            other => panic!("unexpected immediate recv result: {other:?}"),
        }
    }

    #[test]
    fn tick_latches_sim_running_on_first_unpaused_observation() {
        let cache = Arc::new(SimCache::new());
        let dispatcher = Dispatcher::new(cache.clone());
        cache.set_for_test("SimState.Paused", Value::Number(0.0));
        dispatcher.tick();
        assert!(dispatcher.sim_running.load(Ordering::Relaxed));
    }
}
