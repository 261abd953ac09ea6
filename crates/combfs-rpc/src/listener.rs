// Copyright © 2025 Lukas Bower
// SPDX-License-Identifier: Apache-2.0
// Purpose: Accept loop and per-connection workers for one combfs interface.
// Author: Lukas Bower

//! Server side of the transport.
//!
//! A [`Listener`] binds one TCP socket and serves one interface. The accept
//! loop runs on its own thread; every accepted connection is handled to
//! completion on a dedicated worker thread, so a slow handler never stalls
//! the loop. Lifecycle is `new → listening → stopped`, with `stopped`
//! terminal: a listener is never restarted.

use std::io;
use std::net::{IpAddr, Ipv4Addr, SocketAddr, TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};

use log::{debug, info, warn};

use combfs_wire::{decode_call, encode_reply, FaultKind, RemoteFault, ReplyFrame};

use crate::error::RpcError;
use crate::frame::read_frame;
use crate::iface::Dispatch;

type ListenErrorHook = Box<dyn Fn(&io::Error) -> bool + Send + Sync>;
type StoppedHook = Box<dyn Fn(Option<&io::Error>) + Send + Sync>;
type ServiceErrorHook = Box<dyn Fn(&RpcError) + Send + Sync>;

enum State {
    New,
    Listening {
        addr: SocketAddr,
        accept: JoinHandle<()>,
    },
    Stopped,
}

#[derive(Default)]
struct Hooks {
    listen_error: Mutex<Option<ListenErrorHook>>,
    stopped: Mutex<Option<StoppedHook>>,
    service_error: Mutex<Option<ServiceErrorHook>>,
}

impl Hooks {
    /// Decide whether the accept loop survives a top-level error. Without a
    /// hook the loop shuts down, matching the conservative default.
    fn on_listen_error(&self, err: &io::Error) -> bool {
        match self
            .listen_error
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
        {
            Some(hook) => hook(err),
            None => false,
        }
    }

    fn on_stopped(&self, cause: Option<&io::Error>) {
        if let Some(hook) = self
            .stopped
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
        {
            hook(cause);
        }
    }

    fn on_service_error(&self, iface: &'static str, err: &RpcError) {
        match self
            .service_error
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
        {
            Some(hook) => hook(err),
            None => warn!("{iface}: connection worker failed: {err}"),
        }
    }
}

/// Multithreaded TCP server for a single interface.
pub struct Listener {
    service: Arc<dyn Dispatch>,
    requested: Option<SocketAddr>,
    state: Arc<Mutex<State>>,
    stopping: Arc<AtomicBool>,
    hooks: Arc<Hooks>,
}

impl Listener {
    /// Create a listener bound to nothing yet. `addr` fixes the bind
    /// address; when `None`, the system assigns one at [`Listener::start`].
    ///
    /// # Panics
    ///
    /// Panics if the service's interface fails validation (a method missing
    /// the transport error declaration), which is a programmer error.
    pub fn new(service: Arc<dyn Dispatch>, addr: Option<SocketAddr>) -> Self {
        service.interface().validate();
        Self {
            service,
            requested: addr,
            state: Arc::new(Mutex::new(State::New)),
            stopping: Arc::new(AtomicBool::new(false)),
            hooks: Arc::new(Hooks::default()),
        }
    }

    /// Install the hook consulted on a top-level accept-loop error. Return
    /// `true` to keep accepting, `false` to shut the listener down.
    pub fn set_listen_error_hook(
        &self,
        hook: impl Fn(&io::Error) -> bool + Send + Sync + 'static,
    ) {
        *self
            .hooks
            .listen_error
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(Box::new(hook));
    }

    /// Install the hook called exactly once when the listener stops; the
    /// argument is the fatal cause, or `None` for a clean stop.
    pub fn set_stopped_hook(&self, hook: impl Fn(Option<&io::Error>) + Send + Sync + 'static) {
        *self
            .hooks
            .stopped
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(Box::new(hook));
    }

    /// Install the hook called when a connection worker fails at top level
    /// (malformed frame, broken socket). Defaults to a log warning.
    pub fn set_service_error_hook(&self, hook: impl Fn(&RpcError) + Send + Sync + 'static) {
        *self
            .hooks
            .service_error
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(Box::new(hook));
    }

    /// Bind the socket, spawn the accept loop, and return the bound address.
    pub fn start(&self) -> Result<SocketAddr, RpcError> {
        let mut state = self.lock_state();
        match *state {
            State::New => {}
            State::Listening { .. } => {
                return Err(RpcError::Lifecycle("listener is already running"))
            }
            State::Stopped => {
                return Err(RpcError::Lifecycle("stopped listeners cannot be restarted"))
            }
        }
        let bind_addr = self
            .requested
            .unwrap_or_else(|| SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), 0));
        let socket = TcpListener::bind(bind_addr)?;
        let addr = socket.local_addr()?;
        let iface = self.service.interface().name;
        info!("{iface}: listening on {addr}");
        let accept = {
            let service = Arc::clone(&self.service);
            let hooks = Arc::clone(&self.hooks);
            let stopping = Arc::clone(&self.stopping);
            let shared_state = Arc::clone(&self.state);
            thread::spawn(move || accept_loop(socket, service, hooks, stopping, shared_state))
        };
        *state = State::Listening { addr, accept };
        Ok(addr)
    }

    /// The bound address, observable while listening.
    #[must_use]
    pub fn local_addr(&self) -> Option<SocketAddr> {
        match *self.lock_state() {
            State::Listening { addr, .. } => Some(addr),
            _ => None,
        }
    }

    /// Stop accepting connections. In-flight workers run to completion; the
    /// stopped hook fires once the accept loop has exited. No-op unless the
    /// listener is currently listening.
    pub fn stop(&self) {
        let (addr, accept) = {
            let mut state = self.lock_state();
            match std::mem::replace(&mut *state, State::Stopped) {
                State::Listening { addr, accept } => (addr, accept),
                other => {
                    // Leave terminal states terminal; a never-started
                    // listener just parks in `Stopped`.
                    if matches!(other, State::New) {
                        debug!("stop on a listener that never started");
                    }
                    return;
                }
            }
        };
        self.stopping.store(true, Ordering::SeqCst);
        // The accept call has no cancellation primitive; a throwaway
        // loopback connection wakes it so it can observe the flag.
        let poke = SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), addr.port());
        let _ = TcpStream::connect(poke);
        let _ = accept.join();
    }

    fn lock_state(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn accept_loop(
    socket: TcpListener,
    service: Arc<dyn Dispatch>,
    hooks: Arc<Hooks>,
    stopping: Arc<AtomicBool>,
    state: Arc<Mutex<State>>,
) {
    let iface = service.interface().name;
    let mut cause: Option<io::Error> = None;
    loop {
        match socket.accept() {
            Ok((stream, peer)) => {
                if stopping.load(Ordering::SeqCst) {
                    break;
                }
                debug!("{iface}: accepted connection from {peer}");
                let service = Arc::clone(&service);
                let hooks = Arc::clone(&hooks);
                thread::spawn(move || {
                    if let Err(err) = serve_connection(service.as_ref(), stream) {
                        hooks.on_service_error(service.interface().name, &err);
                    }
                });
            }
            Err(err) => {
                if stopping.load(Ordering::SeqCst) {
                    break;
                }
                if hooks.on_listen_error(&err) {
                    continue;
                }
                warn!("{iface}: accept loop shutting down: {err}");
                cause = Some(err);
                break;
            }
        }
    }
    *state.lock().unwrap_or_else(PoisonError::into_inner) = State::Stopped;
    info!("{iface}: listener stopped");
    hooks.on_stopped(cause.as_ref());
}

/// Handle one connection: one call frame in, one reply frame out, socket
/// closed.
fn serve_connection(service: &dyn Dispatch, mut stream: TcpStream) -> Result<(), RpcError> {
    use std::io::Write;

    let frame = read_frame(&mut stream)?;
    let call = decode_call(&frame)?;
    let iface = service.interface();
    let reply = if iface.resolve(&call.method, &call.params).is_some() {
        match service.dispatch(&call) {
            Ok(value) => ReplyFrame::Return(value),
            Err(fault) => ReplyFrame::Fault(fault),
        }
    } else {
        ReplyFrame::Fault(RemoteFault::new(
            FaultKind::Rpc,
            format!(
                "interface {} has no method {} with the supplied parameter shape",
                iface.name, call.method
            ),
        ))
    };
    let bytes = encode_reply(&reply)?;
    stream.write_all(&bytes)?;
    Ok(())
}
