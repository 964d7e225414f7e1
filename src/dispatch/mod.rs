//! UDP command dispatcher and composition root.
//!
//! [`MechWarfare`] owns the command socket, the robot [`Members`] and the handler table. Each
//! datagram goes through `Idle → Receiving → Decoding → Routing → Idle`; nothing that happens to a
//! single datagram stops the loop. Only bring-up failures are reported, through the callback given
//! to [`MechWarfare::run`].
//!
//! - [`registry`]: the kind to handler table.
//! - [`handlers`]: built-in handlers, `gait` being the only one registered by default.
pub mod handlers;
pub mod registry;

use embassy_futures::join::join;
use log::{debug, error, info, warn};

use crate::config::Parameters;
use crate::error::MechError;
use crate::net::{DatagramSocket, ReceiveBuffer};
use crate::protocol::InboundMessage;
use crate::robot::imu::ImuDriver;
use crate::robot::servo::ServoBus;
use crate::robot::Members;
use handlers::{handle_gait, GAIT_KIND};
use registry::HandlerRegistry;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DispatchState {
    #[default]
    Idle,
    Receiving,
    Decoding,
    Routing,
}

/// What happened to one datagram.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    Handled,
    /// Well formed, but no handler for its kind.
    Ignored,
    /// Not a valid message.
    Discarded,
    /// The handler rejected it.
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DispatchStats {
    pub received: u32,
    pub handled: u32,
    pub ignored: u32,
    pub discarded: u32,
    pub failed: u32,
    pub receive_errors: u32,
}

impl DispatchStats {
    fn record(&mut self, outcome: DispatchOutcome) {
        let counter = match outcome {
            DispatchOutcome::Handled => &mut self.handled,
            DispatchOutcome::Ignored => &mut self.ignored,
            DispatchOutcome::Discarded => &mut self.discarded,
            DispatchOutcome::Failed => &mut self.failed,
        };
        *counter = counter.wrapping_add(1);
    }
}

/// Decodes and routes datagrams, keeping the loop state and counters.
#[derive(Debug, Default)]
struct Router {
    state: DispatchState,
    stats: DispatchStats,
}

impl Router {
    fn dispatch<B: ServoBus, D: ImuDriver>(
        &mut self,
        bytes: &[u8],
        members: &Members<B, D>,
        handlers: &HandlerRegistry<B, D>,
    ) -> DispatchOutcome {
        self.stats.received = self.stats.received.wrapping_add(1);
        let outcome = self.route(bytes, members, handlers);
        self.stats.record(outcome);
        self.state = DispatchState::Idle;
        outcome
    }

    fn route<B: ServoBus, D: ImuDriver>(
        &mut self,
        bytes: &[u8],
        members: &Members<B, D>,
        handlers: &HandlerRegistry<B, D>,
    ) -> DispatchOutcome {
        self.state = DispatchState::Decoding;
        let message = match InboundMessage::decode(bytes) {
            Ok(message) => message,
            Err(e) => {
                debug!("[DISPATCH] discarding datagram: {}", e);
                return DispatchOutcome::Discarded;
            }
        };

        self.state = DispatchState::Routing;
        let Some(handler) = handlers.lookup(message.kind()) else {
            debug!("[DISPATCH] no handler for `{}`", message.kind());
            return DispatchOutcome::Ignored;
        };
        match handler(members, message.body()) {
            Ok(()) => DispatchOutcome::Handled,
            Err(e) => {
                warn!("[DISPATCH] `{}` rejected: {}", message.kind(), e);
                DispatchOutcome::Failed
            }
        }
    }
}

/// The command socket with its reusable buffer.
struct CommandLink<S> {
    socket: S,
    buffer: ReceiveBuffer,
    router: Router,
}

impl<S: DatagramSocket> CommandLink<S> {
    async fn serve<B: ServoBus, D: ImuDriver>(
        &mut self,
        members: &Members<B, D>,
        handlers: &HandlerRegistry<B, D>,
    ) {
        loop {
            self.router.state = DispatchState::Receiving;
            let datagram = match self.socket.receive(self.buffer.as_mut_slice()).await {
                Ok(datagram) => datagram,
                Err(e) => {
                    self.router.state = DispatchState::Idle;
                    self.router.stats.receive_errors =
                        self.router.stats.receive_errors.wrapping_add(1);
                    error!("[NET] receive failed: {}", e);
                    continue;
                }
            };
            debug!("[NET] {} bytes from {}", datagram.len, datagram.endpoint);
            self.router
                .dispatch(self.buffer.filled(datagram.len), members, handlers);
        }
    }
}

pub struct MechWarfare<S, B, D> {
    link: CommandLink<S>,
    members: Members<B, D>,
    handlers: HandlerRegistry<B, D>,
    parameters: Parameters,
}

impl<S: DatagramSocket, B: ServoBus, D: ImuDriver> MechWarfare<S, B, D> {
    /// Wires the dispatcher. `gait` is routed to the gait driver.
    pub fn new(socket: S, members: Members<B, D>, parameters: Parameters) -> Self {
        let mut handlers = HandlerRegistry::new();
        if handlers.register(GAIT_KIND, handle_gait::<B, D>).is_err() {
            error!("[DISPATCH] no room for the {} handler", GAIT_KIND);
        }
        Self {
            link: CommandLink {
                socket,
                buffer: ReceiveBuffer::new(),
                router: Router::default(),
            },
            members,
            handlers,
            parameters,
        }
    }

    pub fn handlers_mut(&mut self) -> &mut HandlerRegistry<B, D> {
        &mut self.handlers
    }

    pub fn members(&self) -> &Members<B, D> {
        &self.members
    }

    pub fn parameters(&self) -> &Parameters {
        &self.parameters
    }

    pub fn stats(&self) -> DispatchStats {
        self.link.router.stats
    }

    pub fn state(&self) -> DispatchState {
        self.link.router.state
    }

    /// Binds the command socket, then brings up the members.
    pub async fn start(&mut self) -> Result<(), MechError> {
        let port = self.parameters.port;
        self.link
            .socket
            .open(port)
            .inspect_err(|e| error!("[NET] {}", e))?;
        info!("[NET] listening for commands on udp port {}", port);
        self.members.start().await?;
        Ok(())
    }

    /// Starts everything and reports the outcome to `on_started`, then serves commands forever.
    ///
    /// Returns right after the callback when bring-up failed.
    pub async fn run(&mut self, on_started: impl FnOnce(Result<(), MechError>)) {
        let started = self.start().await;
        let failed = started.is_err();
        on_started(started);
        if failed {
            return;
        }

        let Self {
            link,
            members,
            handlers,
            ..
        } = self;
        join(link.serve(members, handlers), members.run()).await;
    }

    /// Decodes and routes one datagram payload.
    pub fn handle_datagram(&mut self, bytes: &[u8]) -> DispatchOutcome {
        self.link
            .router
            .dispatch(bytes, &self.members, &self.handlers)
    }
}
