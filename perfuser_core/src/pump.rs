//! Pump command/acknowledgement protocol.
//!
//! Commands are encoded as request frames, sent over the `PumpLink`,
//! and confirmed by the drive's echoed register value. An unconfirmed
//! command is re-issued on the next service tick, indefinitely; after
//! `reply_timeout_ms` of silence the drive is reported offline while
//! retries continue. The service loop is poll-based and never blocks:
//! one tick sends, the next polls for the reply.

use std::sync::Arc;
use std::time::Instant;

use perfuser_traits::{Clock, PumpLink};

use crate::config::PumpCfg;
use crate::error::{Result, map_link_error};
use crate::protocol::{self, CommandKind, PumpCommand, RotateDirection};

/// Receive scratch size; replies are 8 bytes but the drive may pad.
pub const REPLY_BUF_LEN: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PumpState {
    On,
    Off,
}

/// Per-command-kind acknowledgement flags.
#[derive(Debug, Clone, Copy, Default)]
pub struct CommandAcks {
    pub start: bool,
    pub stop: bool,
    pub speed: bool,
    pub direction: bool,
}

impl CommandAcks {
    fn set(&mut self, kind: CommandKind, v: bool) {
        match kind {
            CommandKind::Start => self.start = v,
            CommandKind::Stop => self.stop = v,
            CommandKind::Speed => self.speed = v,
            CommandKind::Direction => self.direction = v,
        }
    }

    pub fn get(&self, kind: CommandKind) -> bool {
        match kind {
            CommandKind::Start => self.start,
            CommandKind::Stop => self.stop,
            CommandKind::Speed => self.speed,
            CommandKind::Direction => self.direction,
        }
    }
}

/// Logical pump state as last commanded. Mutated by the protocol;
/// read by the alarm monitor and telemetry.
#[derive(Debug, Clone, Copy)]
pub struct PumpStatus {
    pub state: PumpState,
    /// Commanded speed, 0-100 unitless rate.
    pub speed: f32,
    pub direction: RotateDirection,
    pub acks: CommandAcks,
    /// Set when the drive has been silent past the reply timeout.
    pub offline: bool,
}

impl Default for PumpStatus {
    fn default() -> Self {
        Self {
            state: PumpState::Off,
            speed: 0.0,
            direction: RotateDirection::Clockwise,
            acks: CommandAcks::default(),
            offline: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LinkPhase {
    Idle,
    AwaitingReply,
}

pub struct PumpProtocol<L: PumpLink> {
    link: L,
    device_id: u8,
    reply_timeout_ms: u64,
    phase: LinkPhase,
    pending: Option<PumpCommand>,
    status: PumpStatus,
    clock: Arc<dyn Clock + Send + Sync>,
    epoch: Instant,
    sent_at_ms: u64,
    /// Sends of the current pending command; >1 means retries happened.
    attempts: u32,
    rx_buf: [u8; REPLY_BUF_LEN],
}

impl<L: PumpLink> PumpProtocol<L> {
    pub fn new(link: L, cfg: &PumpCfg, clock: Arc<dyn Clock + Send + Sync>) -> Self {
        let epoch = clock.now();
        Self {
            link,
            device_id: cfg.device_id,
            reply_timeout_ms: cfg.reply_timeout_ms,
            phase: LinkPhase::Idle,
            pending: None,
            status: PumpStatus::default(),
            clock,
            epoch,
            sent_at_ms: 0,
            attempts: 0,
            rx_buf: [0; REPLY_BUF_LEN],
        }
    }

    /// Queue a command for delivery and mark its kind unacknowledged.
    ///
    /// The logical status is updated immediately (the control policies
    /// key off the commanded state, not the confirmed one); the ack flag
    /// flips once the drive echoes the write back. A newer command
    /// replaces an unconfirmed older one.
    pub fn issue(&mut self, cmd: PumpCommand) {
        match cmd {
            PumpCommand::Start => self.status.state = PumpState::On,
            PumpCommand::Stop => self.status.state = PumpState::Off,
            PumpCommand::SetSpeed(v) => self.status.speed = v,
            PumpCommand::SetDirection(d) => self.status.direction = d,
        }
        self.status.acks.set(cmd.kind(), false);

        if let Some(prev) = self.pending
            && prev != cmd
        {
            tracing::debug!(?prev, ?cmd, "unconfirmed pump command replaced");
        }
        self.pending = Some(cmd);
        self.attempts = 0;
        self.phase = LinkPhase::Idle;
    }

    /// One protocol tick: send the pending frame or poll for its reply.
    pub fn service(&mut self) -> Result<()> {
        match self.phase {
            LinkPhase::Idle => {
                if let Some(cmd) = self.pending {
                    let frame = protocol::encode_request(self.device_id, &cmd);
                    self.link
                        .send(&frame)
                        .map_err(|e| eyre::Report::new(map_link_error(&*e)))?;
                    self.sent_at_ms = self.clock.ms_since(self.epoch);
                    self.attempts = self.attempts.saturating_add(1);
                    if self.attempts > 1 {
                        tracing::debug!(?cmd, attempts = self.attempts, "pump command re-issued");
                    }
                    self.phase = LinkPhase::AwaitingReply;
                }
            }
            LinkPhase::AwaitingReply => self.check_reply()?,
        }
        Ok(())
    }

    fn check_reply(&mut self) -> Result<()> {
        let Some(cmd) = self.pending else {
            self.phase = LinkPhase::Idle;
            return Ok(());
        };

        let n = self
            .link
            .recv(&mut self.rx_buf)
            .map_err(|e| eyre::Report::new(map_link_error(&*e)))?;

        if n > 0 {
            let echo = protocol::reply_echo(&self.rx_buf[..n], self.device_id);
            if echo == Some(cmd.expected_echo()) {
                self.status.acks.set(cmd.kind(), true);
                if self.status.offline {
                    tracing::info!(?cmd, "pump drive back online");
                }
                self.status.offline = false;
                self.pending = None;
                self.attempts = 0;
                self.phase = LinkPhase::Idle;
                return Ok(());
            }
            tracing::debug!(?cmd, ?echo, "pump echo mismatch, will re-issue");
            self.phase = LinkPhase::Idle;
            return Ok(());
        }

        let now = self.clock.ms_since(self.epoch);
        if now.saturating_sub(self.sent_at_ms) >= self.reply_timeout_ms {
            if !self.status.offline {
                tracing::warn!(
                    ?cmd,
                    attempts = self.attempts,
                    "pump drive unresponsive, reporting offline"
                );
            }
            self.status.offline = true;
            self.phase = LinkPhase::Idle;
        }
        Ok(())
    }

    /// Reset the commanded speed locally without a register write; used
    /// when a stop policy winds the speed back to the start-up minimum.
    pub fn reset_speed(&mut self, speed: f32) {
        self.status.speed = speed;
    }

    pub fn status(&self) -> &PumpStatus {
        &self.status
    }

    pub fn is_on(&self) -> bool {
        self.status.state == PumpState::On
    }

    pub fn pending(&self) -> Option<PumpCommand> {
        self.pending
    }

    /// Sends of the current pending command so far.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }
}

impl<L: PumpLink> core::fmt::Debug for PumpProtocol<L> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("PumpProtocol")
            .field("state", &self.status.state)
            .field("speed", &self.status.speed)
            .field("pending", &self.pending)
            .field("offline", &self.status.offline)
            .finish()
    }
}
