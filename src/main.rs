use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

use simbridge::config::Config;
use simbridge::dispatcher::Dispatcher;
use simbridge::acceptor;
use simlink::{SimCache, SimLink};

fn main() {
    env_logger::init();

    let config = Config::load(Path::new("simbridge.conf")).unwrap_or_else(|e| {
        log::warn!("failed to read config file: {e}, using defaults");
        Config::default()
    });
    if config.addon_dir.is_none() {
        log::warn!("no addon_dir configured in simbridge.conf");
    }

    let cache = Arc::new(SimCache::new());
    let dispatcher = Arc::new(Dispatcher::new(cache.clone()));
    let running = Arc::new(AtomicBool::new(true));

    let mut link = match SimLink::bind(config.udp_recv_port, config.udp_send_port, &config.udp_send_addr) {
        Ok(link) => link,
        Err(e) => {
            log::error!("failed to bind simlink UDP sockets: {e}");
            std::process::exit(1);
        }
    };

    let link_cache = cache.clone();
    let link_running = running.clone();
    let (recv_port, send_port) = (config.udp_recv_port, config.udp_send_port);
    thread::spawn(move || {
        log::info!("simlink worker started on {recv_port}/{send_port}");
        while link_running.load(Ordering::Relaxed) {
            if let Err(e) = link.pump_once(&link_cache) {
                log::warn!("simlink pump error: {e}");
            }
        }
    });

    let tick_dispatcher = dispatcher.clone();
    let tick_running = running.clone();
    thread::spawn(move || tick_dispatcher.run(&tick_running));

    let addr = format!("127.0.0.1:{}", config.tcp_port);
    if let Err(e) = acceptor::run(&addr, dispatcher, running) {
        log::error!("listener failed to bind {addr}: {e}");
        std::process::exit(1);
    }
}
