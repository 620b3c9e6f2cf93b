//! UDP link to the live sim: a tiny `CMD:payload` line protocol carrying
//! variable definitions and value updates, mirroring how `xp_sim_data`
//! parsed X-Plane's own line-oriented UDP feed.

use std::collections::HashMap;
use std::io;
use std::net::UdpSocket;
use std::sync::{Mutex, RwLock};
use std::time::Duration;

/// A value read from the live sim, keyed by its live variable name.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Number(f64),
    Text(String),
}

impl Value {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            Value::Text(_) => None,
        }
    }

    fn truthy(&self) -> bool {
        match self {
            Value::Number(n) => *n != 0.0,
            Value::Text(s) => !s.is_empty(),
        }
    }
}

/// The process-wide table of the most recently received value per live
/// variable name. One UDP worker thread writes to it; every session
/// worker and the dispatcher read from it.
#[derive(Default)]
pub struct SimCache {
    values: RwLock<HashMap<String, Value>>,
}

impl SimCache {
    pub fn new() -> Self {
        Self { values: RwLock::new(HashMap::new()) }
    }

    pub fn get(&self, name: &str) -> Option<Value> {
        self.values.read().unwrap().get(name).cloned()
    }

    fn set(&self, name: String, value: Value) {
        self.values.write().unwrap().insert(name, value);
    }

    /// Lets callers outside this crate seed the cache directly, for
    /// exercising the dispatcher's tick derivation without a real
    /// `SimLink` socket pair.
    pub fn set_for_test(&self, name: &str, value: Value) {
        self.set(name.to_string(), value);
    }

    /// True once at least one value has arrived - mirrors the original's
    /// "startup, nothing to do yet" guard against an empty cache.
    pub fn has_data(&self) -> bool {
        !self.values.read().unwrap().is_empty()
    }

    /// `SimState.Paused`, read as a boolean the way the original's
    /// `IsPaused` did (`not not self.varToValues.get(...)`).
    pub fn is_paused(&self) -> bool {
        self.values
            .read()
            .unwrap()
            .get("SimState.Paused")
            .map(Value::truthy)
            .unwrap_or(false)
    }
}

/// The UDP socket pair and handshake/command-queue state for talking to
/// the live sim. One instance is shared process-wide; its `pump_once` is
/// driven from a single dedicated worker thread (the sole writer of the
/// `SimCache` it's given).
pub struct SimLink {
    recv_sock: UdpSocket,
    send_sock: UdpSocket,
    send_addr: String,
    id_to_var: HashMap<String, String>,
    need_reset: bool,
    outgoing: Mutex<Vec<String>>,
}

impl SimLink {
    /// Binds both sockets and queues the initial `RES:1` reset handshake.
    /// `recv_sock`'s read timeout is 500ms, matching the original's
    /// `recvSock.settimeout(0.5)` - short enough to notice shutdown
    /// promptly, long enough not to spin.
    pub fn bind(recv_port: u16, send_port: u16, send_addr: &str) -> io::Result<Self> {
        let recv_sock = UdpSocket::bind(("0.0.0.0", recv_port))?;
        recv_sock.set_read_timeout(Some(Duration::from_millis(500)))?;
        let send_sock = UdpSocket::bind(("0.0.0.0", 0))?;

        let link = Self {
            recv_sock,
            send_sock,
            send_addr: format!("{send_addr}:{send_port}"),
            id_to_var: HashMap::new(),
            need_reset: true,
            outgoing: Mutex::new(vec!["RES:1".to_string()]),
        };
        Ok(link)
    }

    /// Queues a command to be sent to the live sim on the next pump.
    pub fn queue(&self, cmd: impl Into<String>) {
        self.outgoing.lock().unwrap().push(cmd.into());
    }

    /// Resets the handshake and re-sends `RES:1`, used when the live sim
    /// appears to have been restarted (its variable IDs are no longer
    /// valid once it forgets our mapping).
    pub fn reset(&mut self) {
        self.need_reset = true;
        self.id_to_var.clear();
        self.queue("RES:1");
    }

    /// One iteration: block for up to the read timeout waiting for a
    /// datagram, apply it to `cache` if one arrived, then flush whatever
    /// is queued to send. Returns whether a datagram was processed.
    pub fn pump_once(&mut self, cache: &SimCache) -> io::Result<bool> {
        let mut buf = [0u8; 4096];
        let did_work = match self.recv_sock.recv_from(&mut buf) {
            Ok((n, _)) => {
                let msg = String::from_utf8_lossy(&buf[..n]).into_owned();
                self.handle_message(&msg, cache);
                true
            }
            Err(e) if e.kind() == io::ErrorKind::WouldBlock || e.kind() == io::ErrorKind::TimedOut => false,
            Err(e) => return Err(e),
        };

        self.flush_outgoing()?;
        Ok(did_work)
    }

    fn flush_outgoing(&mut self) -> io::Result<()> {
        let mut queue = self.outgoing.lock().unwrap();
        for msg in queue.drain(..) {
            self.send_sock.send_to(msg.as_bytes(), &self.send_addr)?;
        }
        Ok(())
    }

    fn handle_message(&mut self, msg: &str, cache: &SimCache) {
        if self.need_reset {
            if msg == "RES:1" {
                self.need_reset = false;
            } else {
                log::debug!("ignoring simlink message before reset handshake: {msg:?}");
            }
            return;
        }

        let parts: Vec<&str> = msg.split(':').collect();
        if parts.len() != 2 {
            log::warn!("malformed simlink message: {msg:?}");
            return;
        }
        let (cmd, payload) = (parts[0], parts[1]);

        match cmd {
            "DEF" => match payload.split_once('=') {
                Some((var_name, var_id)) => {
                    self.id_to_var.insert(var_id.to_string(), var_name.to_string());
                }
                None => log::warn!("malformed DEF payload: {payload:?}"),
            },
            "VF" => match payload.split_once('=') {
                Some((var_id, value)) => match (self.id_to_var.get(var_id), value.parse::<f64>()) {
                    (Some(name), Ok(v)) => cache.set(name.clone(), Value::Number(v)),
                    _ => log::warn!("unrecognised VF update: {payload:?}"),
                },
                None => log::warn!("malformed VF payload: {payload:?}"),
            },
            "VS" => match payload.split_once('=') {
                Some((var_id, value)) => match self.id_to_var.get(var_id) {
                    Some(name) => cache.set(name.clone(), Value::Text(value.to_string())),
                    None => log::warn!("unrecognised VS update: {payload:?}"),
                },
                None => log::warn!("malformed VS payload: {payload:?}"),
            },
            other => log::warn!("unhandled simlink command {other:?}: {payload:?}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn is_paused_reads_truthy_values() {
        let cache = SimCache::new();
        assert!(!cache.is_paused());
        cache.set("SimState.Paused".to_string(), Value::Number(1.0));
        assert!(cache.is_paused());
        cache.set("SimState.Paused".to_string(), Value::Number(0.0));
        assert!(!cache.is_paused());
    }

    #[test]
    fn has_data_false_until_first_value() {
        let cache = SimCache::new();
        assert!(!cache.has_data());
        cache.set("foo".to_string(), Value::Number(1.0));
        assert!(cache.has_data());
    }
}
