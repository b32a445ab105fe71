//! In-process session: one authority, one owner, one observer
//!
//! All three roles run their own clock and their own [`SimpleRig`]; bytes
//! travel over [`LoopbackLink`]s so the full encode → queue → decode path is
//! exercised. Used by the headless binary and the integration tests.

use std::sync::Arc;
use std::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio::time::{interval, Instant, MissedTickBehavior};
use tracing::info;
use uuid::Uuid;

use crate::config::SimConfig;
use crate::game::clock::Tick;
use crate::game::constants::net::QUEUE_CAPACITY;
use crate::game::rig::SimpleRig;
use crate::metrics::Metrics;
use crate::net::authority::AuthorityServer;
use crate::net::observer::ObserverReplica;
use crate::net::owner::{InputSource, OwnerClient};
use crate::net::protocol::{ActorId, InputCommand};
use crate::net::transport::{Broadcast, LinkEndpoint, LoopbackLink};

/// Ticks run by each role during one frame
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameReport {
    pub owner_ticks: usize,
    pub authority_ticks: usize,
    pub observer_ticks: usize,
}

pub struct LoopbackSession {
    actor: ActorId,
    owner: OwnerClient<SimpleRig>,
    authority: AuthorityServer<SimpleRig>,
    observer: ObserverReplica<SimpleRig>,
    uplink: LoopbackLink,
    uplink_tx: LinkEndpoint,
    owner_downlink: LoopbackLink,
    observer_downlink: LoopbackLink,
    broadcast: Broadcast,
    metrics: Arc<Metrics>,
}

impl LoopbackSession {
    pub fn new(config: &SimConfig, metrics: Arc<Metrics>) -> Self {
        let actor = Uuid::new_v4();
        let link = || {
            LoopbackLink::new(QUEUE_CAPACITY)
                .with_latency(config.loopback_latency_ticks)
                .with_reorder(config.loopback_reorder)
        };

        let uplink = link();
        let uplink_tx = uplink.endpoint();
        let owner_downlink = link();
        let observer_downlink = link();

        let mut broadcast = Broadcast::new();
        broadcast.subscribe(owner_downlink.endpoint());
        broadcast.subscribe(observer_downlink.endpoint());

        let mut authority = AuthorityServer::new(config, metrics.clone());
        authority.spawn_actor(actor, SimpleRig::default());

        info!(
            %actor,
            tick_rate = config.tick_rate,
            latency = config.loopback_latency_ticks,
            reorder = config.loopback_reorder,
            "Loopback session created"
        );

        Self {
            actor,
            owner: OwnerClient::new(actor, config, SimpleRig::default(), metrics.clone()),
            authority,
            observer: ObserverReplica::new(actor, config, SimpleRig::default(), metrics.clone()),
            uplink,
            uplink_tx,
            owner_downlink,
            observer_downlink,
            broadcast,
            metrics,
        }
    }

    /// Advance every role by one frame delta.
    ///
    /// Order: owner predicts and sends, authority receives and simulates,
    /// broadcasts reach owner and observer, observer dead-reckons.
    pub fn frame<S: InputSource + ?Sized>(
        &mut self,
        elapsed: Duration,
        source: &mut S,
    ) -> FrameReport {
        self.set_link_clocks(self.owner.current_tick());
        let owner_ticks = self.owner.frame(elapsed, source, &self.uplink_tx);
        self.set_link_clocks(self.owner.current_tick());

        for bytes in self.uplink.recv_ready() {
            self.authority.receive(&bytes);
        }
        let authority_ticks = self.authority.frame(elapsed, &self.broadcast);

        for bytes in self.owner_downlink.recv_ready() {
            self.owner.handle_message(&bytes);
        }
        for bytes in self.observer_downlink.recv_ready() {
            self.observer.handle_message(&bytes);
        }
        let observer_ticks = self.observer.frame(elapsed);

        FrameReport {
            owner_ticks,
            authority_ticks,
            observer_ticks,
        }
    }

    fn set_link_clocks(&self, now: Tick) {
        self.uplink.set_now(now);
        self.owner_downlink.set_now(now);
        self.observer_downlink.set_now(now);
    }

    #[inline]
    pub fn actor(&self) -> ActorId {
        self.actor
    }

    pub fn owner(&self) -> &OwnerClient<SimpleRig> {
        &self.owner
    }

    pub fn owner_mut(&mut self) -> &mut OwnerClient<SimpleRig> {
        &mut self.owner
    }

    pub fn authority(&self) -> &AuthorityServer<SimpleRig> {
        &self.authority
    }

    pub fn authority_mut(&mut self) -> &mut AuthorityServer<SimpleRig> {
        &mut self.authority
    }

    pub fn observer(&self) -> &ObserverReplica<SimpleRig> {
        &self.observer
    }

    pub fn metrics(&self) -> &Arc<Metrics> {
        &self.metrics
    }

    /// Log where each role thinks the actor is
    pub fn log_status(&self) {
        let owner = self.owner.body().position();
        let authority = self.authority.body(&self.actor).map(|b| b.position());
        let observer = self.observer.body().position();
        let drift = self.owner.last_drift().map(|d| d.position_error);
        info!(
            tick = self.owner.current_tick(),
            owner = ?owner,
            authority = ?authority,
            observer = ?observer,
            drift = ?drift,
            balanced = self.owner.state().is_balanced(),
            "Session status"
        );
    }
}

/// Seeded pseudo-player: holds a random move for a random number of ticks,
/// with occasional punches, reaches and jumps
pub struct ScriptedInput {
    rng: StdRng,
    current: InputCommand,
    hold_until: Tick,
}

impl ScriptedInput {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            current: InputCommand::default(),
            hold_until: 0,
        }
    }

    fn next_action(&mut self, tick: Tick) {
        let rng = &mut self.rng;
        let mut command = InputCommand::new(tick);

        match rng.gen_range(0..6) {
            0 => {}
            1 | 2 => {
                let angle = rng.gen_range(-0.6f32..0.6);
                command.move_axis = glam::Vec2::new(angle.sin(), angle.cos());
            }
            3 => command.punch_right = rng.gen_bool(0.5),
            4 => {
                command.reach_left = rng.gen_range(0.2..1.0);
                command.mouse_y = rng.gen_range(-5.0..5.0);
            }
            _ => command.jump = 1.0,
        }

        let angle = rng.gen_range(-std::f32::consts::PI..std::f32::consts::PI);
        command.cam_forward = glam::Vec3::new(angle.sin(), 0.0, angle.cos());

        self.current = command;
        self.hold_until = tick + rng.gen_range(15..90);
    }
}

impl InputSource for ScriptedInput {
    fn sample(&mut self, tick: Tick) -> InputCommand {
        if tick >= self.hold_until {
            self.next_action(tick);
        }
        // jumps are a single-tick press
        if self.current.jump > 0.0 && tick > self.current.tick {
            self.current.jump = 0.0;
        }
        InputCommand {
            tick,
            ..self.current
        }
    }
}

/// Drive `session` from a tokio interval, measuring real frame deltas.
///
/// Runs `frames` frames, or forever when `None`. Logs status about once a
/// second. Returns the number of frames run.
pub async fn run_frames<S: InputSource + ?Sized>(
    session: &mut LoopbackSession,
    source: &mut S,
    period: Duration,
    frames: Option<u64>,
) -> u64 {
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let status_every = (Duration::from_secs(1).as_secs_f64() / period.as_secs_f64().max(1e-6))
        .round()
        .max(1.0) as u64;

    let mut last = Instant::now();
    let mut count = 0;
    while frames.map_or(true, |limit| count < limit) {
        ticker.tick().await;
        let now = Instant::now();
        session.frame(now - last, source);
        last = now;
        count += 1;

        if count % status_every == 0 {
            session.log_status();
        }
    }
    count
}
