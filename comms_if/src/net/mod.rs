//! # Network Module
//!
//! This module provides networking abstractions over ZMQ. All feeds in the bridge are
//! publish/subscribe: the exec subscribes to the flight controller bridge and the planner, and
//! publishes setpoints and telemetry.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use std::{sync::{Arc, atomic::{AtomicBool, AtomicUsize}, atomic::Ordering}, thread};
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use zmq::{Socket, Context, SocketType, SocketEvent};

// Export zmq
pub use zmq;

// ------------------------------------------------------------------------------------------------
// MACROS
// ------------------------------------------------------------------------------------------------

macro_rules! set_sockopts {
    ($socket:expr, $(($opt:ident, $val:expr)),+) => {
        $(
            $socket.$opt($val)
                .map_err(|e| MonitoredSocketError::SocketOptionError(stringify!($opt).into(), e))?;
        )+
    };
}

// ------------------------------------------------------------------------------------------------
// STATICS
// ------------------------------------------------------------------------------------------------

/// Used to give each monitor a unique inproc endpoint.
static NUM_MONITORS: AtomicUsize = AtomicUsize::new(0);

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Network endpoints used by the exec.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetParams {
    /// Endpoint of the flight controller bridge publisher (pose, link state, RC input)
    pub fc_endpoint: String,

    /// Endpoint of the planner publisher (trajectory commands, goals)
    pub planner_endpoint: String,

    /// Endpoint the setpoint publisher binds to
    pub setpoint_endpoint: String,

    /// Endpoint the telemetry publisher binds to
    pub tm_endpoint: String,
}

/// A zmq socket with a monitor attached.
///
/// The monitor runs on its own thread and counts the peers currently attached to the socket, so
/// a publisher can tell whether anyone is listening and a subscriber whether its publisher is
/// still there. The socket itself is reached through `Deref`.
pub struct MonitoredSocket {
    socket: Socket,

    monitor_jh: Option<thread::JoinHandle<()>>,

    shutdown: Arc<AtomicBool>,

    num_peers: Arc<AtomicUsize>,
}

/// Options applied to a [`MonitoredSocket`] on creation.
///
/// Timeouts and intervals are in milliseconds and follow the meaning given in the
/// [`zmq_setsockopt`](http://api.zeromq.org/4-2:zmq-setsockopt) documentation. Start from
/// [`SocketOptions::publisher`] or [`SocketOptions::subscriber`] and override as needed.
#[derive(Debug, Clone)]
pub struct SocketOptions {

    /// Bind to the endpoint rather than connecting to it.
    pub bind: bool,

    /// Topic prefix for `SUB` sockets, the empty prefix receives everything.
    pub subscribe: Vec<u8>,

    /// How long unsent messages are kept after the socket is closed
    pub linger: i32,

    /// Delay before reconnecting to a lost peer
    pub reconnect_ivl: i32,

    /// Upper bound of the reconnection backoff, 0 disables backoff
    pub reconnect_ivl_max: i32,

    /// Timeout of the TCP connection handshake
    pub connect_timeout: i32,

    /// Time a blocking receive waits before returning `EAGAIN`, -1 waits forever
    pub recv_timeout: i32,

    /// Time a blocking send waits before returning `EAGAIN`, -1 waits forever
    pub send_timeout: i32,

    /// Number of outbound messages queued per peer before new ones are dropped
    pub send_hwm: i32,

    /// Interval between ZMTP heartbeats, 0 disables heartbeats
    pub heartbeat_ivl: i32,

    /// Time without a heartbeat reply after which the peer is dropped
    pub heartbeat_timeout: i32,

    /// Time the remote peer waits for a heartbeat before dropping this socket
    pub heartbeat_ttl: i32
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

#[derive(thiserror::Error, Debug)]
pub enum MonitoredSocketError {
    #[error("Error creating the socket: {0}")]
    CreateSocketError(zmq::Error),

    #[error("Error enabling monitoring for the socket: {0}")]
    MonitoringEnableError(zmq::Error),

    #[error("Could not connect the monitor: {0}")]
    MonitorConnectError(zmq::Error),

    #[error("Could not bind or connect the socket to {0}: {1}")]
    EndpointError(String, zmq::Error),

    #[error("Could not set the {0} socket option: {1}")]
    SocketOptionError(String, zmq::Error)
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl MonitoredSocket {
    /// Create a new monitored socket.
    ///
    /// ## Arguments
    /// - `ctx`: the zmq context which will be used to create the socket
    /// - `socket_type`: the type of zmq socket to create
    /// - `socket_options`: a [`SocketOptions`] struct specifying how to configure the socket
    /// - `endpoint`: a zmq endpoint string, such as `"tcp://localhost:4000"`
    ///
    /// Connecting never blocks, zmq establishes the connection in the background.
    pub fn new(
        ctx: &Context,
        socket_type: SocketType,
        socket_options: SocketOptions,
        endpoint: &str
    ) -> Result<Self, MonitoredSocketError> {
        let socket = ctx.socket(socket_type)
            .map_err(MonitoredSocketError::CreateSocketError)?;

        // The monitor has to be attached before connecting so no event is missed
        let monitor_endpoint = format!(
            "inproc://monitor_{}",
            NUM_MONITORS.fetch_add(1, Ordering::Relaxed)
        );
        let events = SocketEvent::CONNECTED as i32
            | SocketEvent::ACCEPTED as i32
            | SocketEvent::DISCONNECTED as i32
            | SocketEvent::MONITOR_STOPPED as i32;
        socket.monitor(&monitor_endpoint, events)
            .map_err(MonitoredSocketError::MonitoringEnableError)?;
        let monitor = ctx.socket(zmq::PAIR)
            .map_err(MonitoredSocketError::CreateSocketError)?;
        monitor.connect(&monitor_endpoint)
            .map_err(MonitoredSocketError::MonitorConnectError)?;

        socket_options.set(&socket)?;

        match socket_options.bind {
            false => socket.connect(endpoint),
            true => socket.bind(endpoint)
        }.map_err(|e| MonitoredSocketError::EndpointError(endpoint.into(), e))?;

        let shutdown = Arc::new(AtomicBool::new(false));
        let num_peers = Arc::new(AtomicUsize::new(0));

        let shutdown_clone = shutdown.clone();
        let num_peers_clone = num_peers.clone();
        let endpoint_clone = String::from(endpoint);

        let monitor_jh = thread::spawn(move || monitor_socket(
            monitor,
            endpoint_clone,
            shutdown_clone,
            num_peers_clone
        ));

        Ok(Self {
            socket,
            monitor_jh: Some(monitor_jh),
            shutdown,
            num_peers
        })
    }

    /// Return true if at least one peer is attached to the socket.
    pub fn connected(&self) -> bool {
        self.num_peers() > 0
    }

    /// Number of peers currently attached to the socket.
    pub fn num_peers(&self) -> usize {
        self.num_peers.load(Ordering::Relaxed)
    }
}

impl Drop for MonitoredSocket {
    fn drop(&mut self) {
        self.shutdown.store(true, Ordering::Relaxed);

        // The monitor wakes on MONITOR_STOPPED once the socket closes, which happens after this
        // function returns, so it can't be joined here.
        self.monitor_jh.take();
    }
}

impl std::ops::Deref for MonitoredSocket {
    type Target = Socket;

    fn deref(&self) -> &Self::Target {
        &self.socket
    }
}

impl std::ops::DerefMut for MonitoredSocket {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.socket
    }
}

impl SocketOptions {
    /// Options for a publisher: binds, never blocks on send, and drops peers which stop
    /// answering heartbeats.
    pub fn publisher() -> Self {
        Self {
            bind: true,
            linger: 1,
            send_timeout: 0,
            heartbeat_ivl: 500,
            heartbeat_timeout: 1000,
            heartbeat_ttl: 1000,
            ..Default::default()
        }
    }

    /// Options for a subscriber: connects, receives everything, and returns from a receive often
    /// enough for the receiving thread to notice a shutdown.
    pub fn subscriber() -> Self {
        Self {
            bind: false,
            linger: 1,
            connect_timeout: 1000,
            recv_timeout: 100,
            heartbeat_ivl: 500,
            heartbeat_timeout: 1000,
            heartbeat_ttl: 1000,
            ..Default::default()
        }
    }

    /// Set these options on the given socket.
    pub fn set(&self, socket: &Socket) -> Result<(), MonitoredSocketError> {
        set_sockopts!(
            socket,
            (set_connect_timeout, self.connect_timeout),
            (set_heartbeat_ivl, self.heartbeat_ivl),
            (set_heartbeat_timeout, self.heartbeat_timeout),
            (set_heartbeat_ttl, self.heartbeat_ttl),
            (set_linger, self.linger),
            (set_reconnect_ivl, self.reconnect_ivl),
            (set_reconnect_ivl_max, self.reconnect_ivl_max),
            (set_rcvtimeo, self.recv_timeout),
            (set_sndtimeo, self.send_timeout),
            (set_sndhwm, self.send_hwm)
        );

        // Subscribers receive nothing until a topic is registered
        if let Ok(SocketType::SUB) = socket.get_socket_type() {
            set_sockopts!(
                socket,
                (set_subscribe, &self.subscribe)
            );
        }

        Ok(())
    }
}

impl Default for SocketOptions {
    /// The zmq library defaults.
    fn default() -> Self {
        Self {
            bind: false,
            subscribe: Vec::new(),
            connect_timeout: 0,
            heartbeat_ivl: 0,
            heartbeat_timeout: 0,
            heartbeat_ttl: 0,
            linger: 30_000,
            reconnect_ivl: 100,
            reconnect_ivl_max: 0,
            recv_timeout: -1,
            send_timeout: -1,
            send_hwm: 1000
        }
    }
}

// ------------------------------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ------------------------------------------------------------------------------------------------

/// Read one event from a monitor socket.
fn read_event(monitor: &Socket) -> Result<SocketEvent, zmq::Error> {
    let msg = monitor.recv_msg(0)?;

    // First frame holds the event ID followed by a 32 bit value
    if msg.len() < 2 {
        return Err(zmq::Error::EINVAL)
    }
    let event = u16::from_ne_bytes([msg[0], msg[1]]);

    // Second frame is the peer address
    if monitor.get_rcvmore()? {
        monitor.recv_msg(0)?;
    }

    Ok(SocketEvent::from_raw(event))
}

fn monitor_socket(
    monitor: Socket,
    endpoint: String,
    shutdown: Arc<AtomicBool>,
    num_peers: Arc<AtomicUsize>
) {
    while !shutdown.load(Ordering::Relaxed) {
        let event = match read_event(&monitor) {
            Ok(e) => e,
            Err(e) => {
                warn!("Error reading event from the monitor of {}: {}", endpoint, e);
                break
            }
        };

        match event {
            SocketEvent::CONNECTED | SocketEvent::ACCEPTED => {
                let n = num_peers.fetch_add(1, Ordering::Relaxed) + 1;
                debug!("Peer attached to {} ({} attached)", endpoint, n);
            },
            SocketEvent::DISCONNECTED => {
                let prev = num_peers
                    .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |n| n.checked_sub(1))
                    .unwrap_or(0);
                debug!("Peer detached from {} ({} attached)", endpoint, prev.saturating_sub(1));
            },
            SocketEvent::MONITOR_STOPPED => break,
            _ => ()
        }
    }
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_presets() {
        let pub_opts = SocketOptions::publisher();
        assert!(pub_opts.bind);
        assert_eq!(pub_opts.send_timeout, 0);

        let sub_opts = SocketOptions::subscriber();
        assert!(!sub_opts.bind);
        assert!(sub_opts.recv_timeout > 0);
        assert!(sub_opts.subscribe.is_empty());
    }

    #[test]
    fn test_pub_sub() {
        let ctx = Context::new();

        let publisher = MonitoredSocket::new(
            &ctx,
            zmq::PUB,
            SocketOptions::publisher(),
            "inproc://test_pub_sub"
        ).unwrap();
        let subscriber = MonitoredSocket::new(
            &ctx,
            zmq::SUB,
            SocketOptions::subscriber(),
            "inproc://test_pub_sub"
        ).unwrap();

        // Subscriptions propagate asynchronously, so publish until one gets through
        let mut received = None;
        for _ in 0..50 {
            publisher.send("hello", 0).unwrap();
            if let Ok(Ok(s)) = subscriber.recv_string(0) {
                received = Some(s);
                break
            }
        }

        assert_eq!(received.as_deref(), Some("hello"));
    }
}
