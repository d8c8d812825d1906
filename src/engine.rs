//! Diffusion simulation engine.
//!
//! A tick visits every node in [`Topology`] order. A node with a pending
//! message dequeues the oldest one, logs it as received and draws once from
//! the PRNG against its outgoing compatibility:
//!
//! - draw below the score and not relayed before: the node is `Sending` and
//!   every follower gets one acceptance draw against its incoming
//!   compatibility;
//! - draw below the score but already relayed: the node is `Repeated` and the
//!   message is consumed;
//! - otherwise the node is `Rejecting` and the message is dropped.
//!
//! An accepted message is queued on the follower and the connecting link
//! turns `Sending`. A rejected one, or one the follower has already received,
//! turns the link `Rejecting`. Only probabilistic rejections count towards
//! [`RunStatistics::rejected`]. A follower reached twice before it dequeues
//! holds two copies; the second is logged once and ends up `Repeated`.
//!
//! PRNG draws happen in a fixed order (nodes outer, followers inner), so a
//! fixed seed, graph and set of messages always replay identically.

use std::time::Duration;

use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, trace, warn};

use crate::compat::compatibility_score;
use crate::control::StopSignal;
use crate::error::{SpreadError, SpreadResult};
use crate::graph::{Graph, LinkKey, LinkState, Message, MessageId, NodeKey, NodeState};
use crate::rng::SeededRandom;
use crate::topology::Topology;
use crate::traits::Direction;

/// Cumulative propagation counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunStatistics {
    /// Relay attempts, one per follower reached by a sending node.
    pub sent: u64,
    /// Messages queued on a follower.
    pub accepted: u64,
    /// Messages a follower turned down on probability.
    pub rejected: u64,
}

impl RunStatistics {
    /// Zero every counter.
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Add another set of counters to this one.
    pub fn absorb(&mut self, other: &Self) {
        self.sent += other.sent;
        self.accepted += other.accepted;
        self.rejected += other.rejected;
    }
}

/// What happened during a single tick.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepReport {
    /// Nodes that dequeued a message.
    pub processed: usize,
    /// Nodes that relayed their message.
    pub relayed: usize,
    /// Ids of the relayed messages, one entry per relaying node.
    pub relayed_ids: Vec<MessageId>,
    /// Nodes that consumed a message they had relayed before.
    pub repeated: usize,
    /// Nodes that dropped their message.
    pub dropped: usize,
    /// Counters accumulated during this tick.
    pub stats: RunStatistics,
    /// No node holds a pending message after this tick.
    pub done: bool,
}

/// Advance `graph` by one tick.
///
/// # Errors
///
/// Returns [`SpreadError::PrngUninitialized`] without touching the graph if
/// `prng` is `None`.
pub fn run_diffusion_step(
    graph: &mut Graph,
    prng: Option<&mut SeededRandom>,
    stats: &mut RunStatistics,
) -> SpreadResult<StepReport> {
    let Some(prng) = prng else {
        error!("diffusion step requested before the PRNG was initialized");
        return Err(SpreadError::PrngUninitialized);
    };
    let topology = Topology::from_graph(graph);
    Ok(step_with_topology(graph, &topology, prng, stats))
}

/// Advance `graph` by one tick using a precomputed follower table.
///
/// `topology` must have been built from `graph` (or from a structurally
/// identical copy of it). Queue and state changes do not invalidate it.
pub fn step_with_topology(
    graph: &mut Graph,
    topology: &Topology,
    prng: &mut SeededRandom,
    stats: &mut RunStatistics,
) -> StepReport {
    let mut report = StepReport::default();

    for (idx, &key) in topology.order().iter().enumerate() {
        let Some(node) = graph.nodes.get_mut(key) else {
            continue;
        };
        let Some(message) = node.queue.pop_front() else {
            continue;
        };
        if !node.has_received(&message.id) {
            node.received_log.push(message.id.clone());
        }
        report.processed += 1;

        let p_send = compatibility_score(&node.profile, &message.traits, Direction::Out);
        if prng.next_f64() >= p_send {
            node.state = NodeState::Rejecting;
            report.dropped += 1;
            trace!(node = node.id(), message = %message.id, p_send, "dropped");
            continue;
        }
        if node.has_sent(&message.id) {
            node.state = NodeState::Repeated;
            report.repeated += 1;
            trace!(node = node.id(), message = %message.id, "already relayed");
            continue;
        }
        node.state = NodeState::Sending;
        node.sent_log.push(message.id.clone());
        report.relayed += 1;
        report.relayed_ids.push(message.id.clone());

        for &(follower, link) in topology.followers(idx) {
            deliver(graph, follower, link, &message, prng, &mut report.stats);
            report.stats.sent += 1;
        }
    }

    stats.absorb(&report.stats);
    report.done = graph.is_quiescent();
    debug!(
        processed = report.processed,
        relayed = report.relayed,
        accepted = report.stats.accepted,
        rejected = report.stats.rejected,
        done = report.done,
        "tick complete"
    );
    report
}

/// Acceptance step for one follower of a relaying node.
fn deliver(
    graph: &mut Graph,
    follower: NodeKey,
    link: LinkKey,
    message: &Message,
    prng: &mut SeededRandom,
    stats: &mut RunStatistics,
) {
    let Some(node) = graph.nodes.get_mut(follower) else {
        return;
    };

    let p_accept = compatibility_score(&node.profile, &message.traits, Direction::In);
    let accepted = prng.next_f64() < p_accept;

    let link_state = if accepted && !node.has_received(&message.id) {
        node.queue.push_back(message.clone());
        stats.accepted += 1;
        trace!(node = node.id(), message = %message.id, p_accept, "accepted");
        LinkState::Sending
    } else {
        if !accepted {
            stats.rejected += 1;
            trace!(node = node.id(), message = %message.id, p_accept, "rejected");
        }
        LinkState::Rejecting
    };

    if let Some(link) = graph.links.get_mut(link) {
        link.state = link_state;
    }
}

/// A frame handed to a [`PresentationSink`] after every tick.
#[derive(Debug, Clone, Copy)]
pub struct TickFrame<'a> {
    /// Index of the tick that just ran (1-based).
    pub tick: u64,
    /// Graph state after the tick.
    pub graph: &'a Graph,
    /// Counters accumulated so far in this run.
    pub stats: &'a RunStatistics,
    /// What happened during the tick.
    pub report: &'a StepReport,
}

/// Receives per-tick frames from a continuous run.
pub trait PresentationSink {
    /// Called once after every tick.
    fn on_tick(&mut self, frame: &TickFrame<'_>);
}

impl<F> PresentationSink for F
where
    F: FnMut(&TickFrame<'_>),
{
    fn on_tick(&mut self, frame: &TickFrame<'_>) {
        self(frame);
    }
}

/// A sink that discards every frame.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl PresentationSink for NullSink {
    fn on_tick(&mut self, _frame: &TickFrame<'_>) {}
}

/// Forwards frames to another sink, collecting relayed message ids on the way.
struct RelayRecorder<'a, S: ?Sized> {
    relayed: &'a mut Vec<MessageId>,
    inner: &'a mut S,
}

impl<S: PresentationSink + ?Sized> PresentationSink for RelayRecorder<'_, S> {
    fn on_tick(&mut self, frame: &TickFrame<'_>) {
        record_relayed(self.relayed, &frame.report.relayed_ids);
        self.inner.on_tick(frame);
    }
}

/// Append the ids in `ids` not yet present in `relayed`, keeping first-relay order.
fn record_relayed(relayed: &mut Vec<MessageId>, ids: &[MessageId]) {
    for id in ids {
        if !relayed.contains(id) {
            relayed.push(id.clone());
        }
    }
}

/// How a continuous run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Completion {
    /// Ticks executed by this call.
    pub ticks: u64,
    /// `true` if the run ended because no messages were left, `false` if it
    /// was interrupted by its stop signal.
    pub finished: bool,
}

#[allow(clippy::too_many_arguments)]
fn drive<S: PresentationSink + ?Sized>(
    graph: &mut Graph,
    topology: &Topology,
    prng: &mut SeededRandom,
    stats: &mut RunStatistics,
    tick: &mut u64,
    interval: Duration,
    stop: &StopSignal,
    sink: &mut S,
) -> Completion {
    let mut ticks = 0;
    loop {
        if graph.is_quiescent() {
            graph.reset_states();
            return Completion {
                ticks,
                finished: true,
            };
        }
        if stop.is_stopped() {
            return Completion {
                ticks,
                finished: false,
            };
        }
        if !interval.is_zero() {
            std::thread::sleep(interval);
        }

        *tick += 1;
        ticks += 1;
        let report = step_with_topology(graph, topology, prng, stats);
        sink.on_tick(&TickFrame {
            tick: *tick,
            graph,
            stats,
            report: &report,
        });
    }
}

/// Tick `graph` on a fixed cadence until no messages are left.
///
/// Before every tick the stop signal is checked; raising it ends the run
/// early, leaving the graph mid-propagation. When the run finishes all
/// display states are reset.
///
/// # Errors
///
/// Returns [`SpreadError::PrngUninitialized`] without touching the graph if
/// `prng` is `None`.
pub fn run_diffusion_to_completion<S: PresentationSink + ?Sized>(
    graph: &mut Graph,
    prng: Option<&mut SeededRandom>,
    stats: &mut RunStatistics,
    interval: Duration,
    stop: &StopSignal,
    sink: &mut S,
) -> SpreadResult<Completion> {
    let Some(prng) = prng else {
        error!("continuous run requested before the PRNG was initialized");
        return Err(SpreadError::PrngUninitialized);
    };
    let topology = Topology::from_graph(graph);
    let mut tick = 0;
    Ok(drive(
        graph, &topology, prng, stats, &mut tick, interval, stop, sink,
    ))
}

/// Settings of an interactive simulation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// PRNG seed. Blank means "generate one at start".
    pub seed: String,
    /// Delay between ticks of a continuous run, in milliseconds.
    pub tick_interval_ms: u64,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            seed: String::new(),
            tick_interval_ms: 1000,
        }
    }
}

impl SimulationConfig {
    /// A config with a fixed seed and no delay between ticks.
    #[must_use]
    pub fn seeded(seed: impl Into<String>) -> Self {
        Self {
            seed: seed.into(),
            tick_interval_ms: 0,
        }
    }
}

/// Lifecycle of a [`DiffusionEngine`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum EngineStatus {
    /// Not started, or stopped. No PRNG.
    #[default]
    Stopped,
    /// Started and advancing.
    Running,
    /// Started but not advancing; resumable.
    Paused,
}

/// Full copy of node and link state at a given tick.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    /// Tick the snapshot was taken at.
    pub tick: u64,
    /// Graph state, including queues and logs.
    pub graph: Graph,
}

/// An interactive simulation: one graph, one PRNG, one set of counters.
///
/// The engine owns its graph exclusively. Anything else that needs to run a
/// simulation (the genetic optimizer in particular) works on its own copy
/// with its own PRNG.
#[derive(Debug)]
pub struct DiffusionEngine {
    graph: Graph,
    config: SimulationConfig,
    tick_interval: Duration,
    prng: Option<SeededRandom>,
    active_seed: Option<String>,
    topology: Option<Topology>,
    stats: RunStatistics,
    tick: u64,
    status: EngineStatus,
    initial_messages: usize,
    relayed_messages: Vec<MessageId>,
    pause: StopSignal,
}

impl DiffusionEngine {
    /// Create a stopped engine over `graph`.
    #[must_use]
    pub fn new(graph: Graph, config: SimulationConfig) -> Self {
        let tick_interval = Duration::from_millis(config.tick_interval_ms);
        Self {
            graph,
            config,
            tick_interval,
            prng: None,
            active_seed: None,
            topology: None,
            stats: RunStatistics::default(),
            tick: 0,
            status: EngineStatus::Stopped,
            initial_messages: 0,
            relayed_messages: Vec::new(),
            pause: StopSignal::new(),
        }
    }

    /// The simulated graph.
    #[inline]
    #[must_use]
    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    /// Mutable access to the simulated graph, for repository edits.
    pub fn graph_mut(&mut self) -> &mut Graph {
        self.topology = None;
        &mut self.graph
    }

    /// Consume the engine and return its graph.
    #[must_use]
    pub fn into_graph(self) -> Graph {
        self.graph
    }

    /// Engine settings.
    #[must_use]
    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    /// Current lifecycle status.
    #[inline]
    #[must_use]
    pub fn status(&self) -> EngineStatus {
        self.status
    }

    /// Number of ticks run since start.
    #[inline]
    #[must_use]
    pub fn tick(&self) -> u64 {
        self.tick
    }

    /// Counters accumulated since start.
    #[must_use]
    pub fn stats(&self) -> &RunStatistics {
        &self.stats
    }

    /// Seed in use, once started.
    #[must_use]
    pub fn seed(&self) -> Option<&str> {
        self.active_seed.as_deref()
    }

    /// Number of pending messages when the run started.
    #[must_use]
    pub fn initial_message_count(&self) -> usize {
        self.initial_messages
    }

    /// Distinct ids of the messages relayed since start, in first-relay order.
    #[must_use]
    pub fn relayed_messages(&self) -> &[MessageId] {
        &self.relayed_messages
    }

    /// Delay between ticks of a continuous run.
    #[must_use]
    pub fn tick_interval(&self) -> Duration {
        self.tick_interval
    }

    /// Handle that pauses a continuous run from another thread.
    ///
    /// The run notices the signal before its next tick.
    #[must_use]
    pub fn pause_signal(&self) -> StopSignal {
        self.pause.clone()
    }

    /// Start a fresh run, or resume a paused one.
    ///
    /// A fresh start seeds the PRNG (generating a random seed if the config
    /// has none), zeroes the counters and tick index and resets every display
    /// state. Returns the seed in use.
    pub fn start(&mut self) -> &str {
        match self.status {
            EngineStatus::Stopped => {
                let seed = match self.config.seed.trim() {
                    "" => {
                        let generated = generate_seed(&mut rand::rng());
                        info!(seed = %generated, "no seed configured, generated one");
                        generated
                    }
                    seed => seed.to_string(),
                };
                self.prng = Some(SeededRandom::new(&seed));
                self.stats.reset();
                self.tick = 0;
                self.initial_messages = self.graph.pending_count();
                self.relayed_messages.clear();
                self.graph.reset_states();
                info!(seed = %seed, messages = self.initial_messages, "simulation started");
                self.active_seed = Some(seed);
            }
            EngineStatus::Paused => info!(tick = self.tick, "simulation resumed"),
            EngineStatus::Running => {}
        }
        self.pause.reset();
        self.status = EngineStatus::Running;
        self.active_seed.as_deref().unwrap_or_default()
    }

    /// Pause the run; [`start`](Self::start) resumes it.
    pub fn pause(&mut self) {
        if self.status == EngineStatus::Running {
            self.status = EngineStatus::Paused;
            self.pause.stop();
            info!(tick = self.tick, "simulation paused");
        }
    }

    /// Stop the run: drop the PRNG, zero the counters and tick index and reset
    /// every display state. Queues and logs are kept.
    pub fn stop(&mut self) {
        self.pause.stop();
        self.status = EngineStatus::Stopped;
        self.prng = None;
        self.active_seed = None;
        self.stats.reset();
        self.tick = 0;
        self.initial_messages = 0;
        self.relayed_messages.clear();
        self.graph.reset_states();
        info!("simulation stopped");
    }

    /// Divide the tick interval by `multiplier`.
    ///
    /// # Errors
    ///
    /// Returns [`SpreadError::InvalidSpeed`] and keeps the current interval if
    /// `multiplier` is not a positive finite number (or the resulting interval
    /// is not representable).
    pub fn set_speed_multiplier(&mut self, multiplier: f64) -> SpreadResult<Duration> {
        if !(multiplier.is_finite() && multiplier > 0.0) {
            warn!(multiplier, "speed multiplier must be positive; no change applied");
            return Err(SpreadError::InvalidSpeed(multiplier));
        }
        let interval = Duration::try_from_secs_f64(self.tick_interval.as_secs_f64() / multiplier)
            .map_err(|_| {
                warn!(multiplier, "speed multiplier out of range; no change applied");
                SpreadError::InvalidSpeed(multiplier)
            })?;
        self.tick_interval = interval;
        info!(interval_ms = interval.as_millis(), "simulation speed changed");
        Ok(interval)
    }

    /// Advance exactly one tick.
    ///
    /// The caller decides what to do once [`StepReport::done`] is set.
    ///
    /// # Errors
    ///
    /// Returns [`SpreadError::PrngUninitialized`] if the engine has not been
    /// started; nothing is mutated in that case.
    pub fn step(&mut self) -> SpreadResult<StepReport> {
        let Some(prng) = self.prng.as_mut() else {
            error!("step requested before the simulation was started");
            return Err(SpreadError::PrngUninitialized);
        };
        let topology = self
            .topology
            .get_or_insert_with(|| Topology::from_graph(&self.graph));
        self.tick += 1;
        let report = step_with_topology(&mut self.graph, topology, prng, &mut self.stats);
        record_relayed(&mut self.relayed_messages, &report.relayed_ids);
        Ok(report)
    }

    /// Run on the configured cadence until no messages are left or the run is
    /// paused through [`pause_signal`](Self::pause_signal).
    ///
    /// Starts (or resumes) the engine first. Once every message has been
    /// consumed the engine pauses itself and resets all display states.
    pub fn run_to_completion<S: PresentationSink + ?Sized>(&mut self, sink: &mut S) -> Completion {
        self.start();
        let Some(prng) = self.prng.as_mut() else {
            // start() always seeds a stopped engine
            return Completion {
                ticks: 0,
                finished: false,
            };
        };
        let topology = self
            .topology
            .get_or_insert_with(|| Topology::from_graph(&self.graph));

        let completion = drive(
            &mut self.graph,
            topology,
            prng,
            &mut self.stats,
            &mut self.tick,
            self.tick_interval,
            &self.pause,
            &mut RelayRecorder {
                relayed: &mut self.relayed_messages,
                inner: sink,
            },
        );

        self.status = EngineStatus::Paused;
        self.pause.stop();
        info!(
            ticks = completion.ticks,
            finished = completion.finished,
            sent = self.stats.sent,
            accepted = self.stats.accepted,
            rejected = self.stats.rejected,
            "continuous run ended"
        );
        completion
    }

    /// Deep copy of the current node and link state, tagged with the tick.
    #[must_use]
    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            tick: self.tick,
            graph: self.graph.clone(),
        }
    }

    /// Replace the current state with `snapshot`.
    ///
    /// # Errors
    ///
    /// Returns [`SpreadError::InvalidSnapshot`] and keeps the current state if
    /// the snapshot's graph violates the graph invariants.
    pub fn restore(&mut self, snapshot: Snapshot) -> SpreadResult<()> {
        if let Err(err) = snapshot.graph.validate() {
            warn!(%err, "snapshot rejected");
            return Err(err);
        }
        self.graph = snapshot.graph;
        self.tick = snapshot.tick;
        self.topology = None;
        debug!(tick = self.tick, "snapshot restored");
        Ok(())
    }
}

/// A random 16-character seed of uppercase letters and digits.
fn generate_seed<R: Rng>(rng: &mut R) -> String {
    const ALPHABET: &[u8] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ";
    (0..16)
        .map(|_| char::from(ALPHABET[rng.random_range(0..ALPHABET.len())]))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::{TraitProfile, TraitVector};

    fn node_profile(value: f64) -> TraitProfile {
        TraitProfile::symmetric(TraitVector::splat(value))
    }

    /// A -> B with perfectly aligned profiles and a matching message on A.
    fn aligned_pair() -> Graph {
        let mut graph = Graph::new();
        graph.add_node("A", node_profile(0.5)).unwrap();
        graph.add_node("B", node_profile(0.5)).unwrap();
        graph.add_link("A", "B").unwrap();
        graph
            .insert_message("A", Message::new("m1", TraitVector::splat(0.5)))
            .unwrap();
        graph
    }

    #[test]
    fn test_step_without_prng_fails_without_mutation() {
        let mut graph = aligned_pair();
        let mut stats = RunStatistics::default();
        let before = serde_json::to_string(&graph).unwrap();

        let result = run_diffusion_step(&mut graph, None, &mut stats);
        assert_eq!(result, Err(SpreadError::PrngUninitialized));
        assert_eq!(serde_json::to_string(&graph).unwrap(), before);
        assert_eq!(stats, RunStatistics::default());
    }

    #[test]
    fn test_aligned_message_is_relayed_and_accepted() {
        let mut graph = aligned_pair();
        let mut prng = SeededRandom::new("genetic-algorithm");
        let mut stats = RunStatistics::default();

        let report = run_diffusion_step(&mut graph, Some(&mut prng), &mut stats).unwrap();
        // A relays to B, then B (later in arena order) relays to nobody
        assert_eq!(report.relayed, 2);
        assert_eq!(stats.sent, 1);
        assert_eq!(stats.accepted, 1);
        assert_eq!(stats.rejected, 0);

        assert_eq!(graph.node("A").unwrap().state, NodeState::Sending);
        assert_eq!(graph.link("A", "B").unwrap().state, LinkState::Sending);
        let b = graph.node("B").unwrap();
        assert_eq!(b.received_log, vec!["m1".to_string()]);
        assert_eq!(b.state, NodeState::Sending);
        assert!(report.done);
    }

    #[test]
    fn test_incompatible_sender_drops_message() {
        let mut graph = aligned_pair();
        graph.node_mut("A").unwrap().profile = node_profile(2.0);
        let mut prng = SeededRandom::new("seed");
        let mut stats = RunStatistics::default();

        let report = run_diffusion_step(&mut graph, Some(&mut prng), &mut stats).unwrap();
        assert_eq!(report.dropped, 1);
        assert_eq!(graph.node("A").unwrap().state, NodeState::Rejecting);
        assert_eq!(graph.link("A", "B").unwrap().state, LinkState::Waiting);
        assert_eq!(stats, RunStatistics::default());
        assert!(graph.node("A").unwrap().sent_log.is_empty());
    }

    #[test]
    fn test_incompatible_follower_rejects() {
        let mut graph = aligned_pair();
        graph.node_mut("B").unwrap().profile = node_profile(2.0);
        let mut prng = SeededRandom::new("seed");
        let mut stats = RunStatistics::default();

        run_diffusion_step(&mut graph, Some(&mut prng), &mut stats).unwrap();
        assert_eq!(graph.link("A", "B").unwrap().state, LinkState::Rejecting);
        assert_eq!(stats.sent, 1);
        assert_eq!(stats.accepted, 0);
        assert_eq!(stats.rejected, 1);
        assert!(graph.node("B").unwrap().queue.is_empty());
    }

    #[test]
    fn test_already_sent_message_is_repeated() {
        let mut graph = aligned_pair();
        graph.node_mut("A").unwrap().sent_log.push("m1".into());
        let mut prng = SeededRandom::new("seed");
        let mut stats = RunStatistics::default();

        let report = run_diffusion_step(&mut graph, Some(&mut prng), &mut stats).unwrap();
        let a = graph.node("A").unwrap();
        assert_eq!(a.state, NodeState::Repeated);
        assert_eq!(a.sent_log, vec!["m1".to_string()]);
        assert!(a.queue.is_empty());
        assert_eq!(report.repeated, 1);
        assert_eq!(stats, RunStatistics::default());
    }

    #[test]
    fn test_follower_duplicate_is_not_counted_as_rejection() {
        let mut graph = aligned_pair();
        graph.node_mut("B").unwrap().received_log.push("m1".into());
        let mut prng = SeededRandom::new("seed");
        let mut stats = RunStatistics::default();

        run_diffusion_step(&mut graph, Some(&mut prng), &mut stats).unwrap();
        assert_eq!(graph.link("A", "B").unwrap().state, LinkState::Rejecting);
        assert_eq!(stats.sent, 1);
        assert_eq!(stats.accepted, 0);
        assert_eq!(stats.rejected, 0);
    }

    #[test]
    fn test_follower_reached_twice_accepts_both_copies() {
        // S -> A, S -> B, A -> F, B -> F: F is reached by A and B in one tick
        let mut graph = Graph::new();
        for id in ["S", "A", "B", "F"] {
            graph.add_node(id, node_profile(0.5)).unwrap();
        }
        for (s, t) in [("S", "A"), ("S", "B"), ("A", "F"), ("B", "F")] {
            graph.add_link(s, t).unwrap();
        }
        graph
            .insert_message("S", Message::new("m", TraitVector::splat(0.5)))
            .unwrap();
        let mut prng = SeededRandom::new("genetic-algorithm");
        let mut stats = RunStatistics::default();

        let report = run_diffusion_step(&mut graph, Some(&mut prng), &mut stats).unwrap();
        assert_eq!(stats.accepted, 4);
        assert_eq!(stats.rejected, 0);
        assert_eq!(graph.link("B", "F").unwrap().state, LinkState::Sending);
        let f = graph.node("F").unwrap();
        assert_eq!(f.queue.len(), 1);
        assert_eq!(f.received_log, vec!["m".to_string()]);
        assert!(!report.done);

        let report = run_diffusion_step(&mut graph, Some(&mut prng), &mut stats).unwrap();
        let f = graph.node("F").unwrap();
        assert_eq!(f.state, NodeState::Repeated);
        assert_eq!(f.received_log, vec!["m".to_string()]);
        assert_eq!(f.sent_log, vec!["m".to_string()]);
        assert!(report.done);
        assert_eq!(stats.accepted, 4);
    }

    #[test]
    fn test_engine_records_distinct_relayed_messages() {
        let mut graph = aligned_pair();
        graph
            .insert_message("B", Message::new("m2", TraitVector::splat(0.5)))
            .unwrap();
        let mut engine = DiffusionEngine::new(graph, SimulationConfig::seeded("relay"));
        assert!(engine.relayed_messages().is_empty());

        engine.start();
        let report = engine.step().unwrap();
        assert_eq!(report.relayed_ids, vec!["m1".to_string(), "m2".to_string()]);
        assert_eq!(engine.relayed_messages(), ["m1".to_string(), "m2".to_string()]);

        // B relays m1 on the next tick; it is recorded only once
        let report = engine.step().unwrap();
        assert_eq!(report.relayed_ids, vec!["m1".to_string()]);
        assert_eq!(
            engine.relayed_messages(),
            ["m1".to_string(), "m2".to_string()],
            "relayed ids must stay distinct"
        );

        engine.stop();
        assert!(engine.relayed_messages().is_empty());
    }

    #[test]
    fn test_continuous_run_records_relayed_messages() {
        let mut engine = DiffusionEngine::new(aligned_pair(), SimulationConfig::seeded("relay"));
        engine.run_to_completion(&mut NullSink);
        assert_eq!(engine.relayed_messages(), ["m1".to_string()]);
    }

    #[test]
    fn test_fifo_one_message_per_tick() {
        let mut graph = Graph::new();
        graph.add_node("solo", node_profile(0.5)).unwrap();
        for id in ["first", "second"] {
            graph
                .insert_message("solo", Message::new(id, TraitVector::splat(0.5)))
                .unwrap();
        }
        let mut prng = SeededRandom::new("fifo");
        let mut stats = RunStatistics::default();

        let report = run_diffusion_step(&mut graph, Some(&mut prng), &mut stats).unwrap();
        assert!(!report.done);
        let solo = graph.node("solo").unwrap();
        assert_eq!(solo.received_log, vec!["first".to_string()]);
        assert_eq!(solo.queue.len(), 1);
    }

    #[test]
    fn test_engine_requires_start() {
        let mut engine = DiffusionEngine::new(aligned_pair(), SimulationConfig::seeded("x"));
        assert_eq!(engine.step(), Err(SpreadError::PrngUninitialized));
        assert_eq!(engine.tick(), 0);

        engine.start();
        assert!(engine.step().is_ok());
        assert_eq!(engine.tick(), 1);
    }

    #[test]
    fn test_engine_generates_seed_when_blank() {
        let mut engine = DiffusionEngine::new(aligned_pair(), SimulationConfig::default());
        let seed = engine.start().to_string();
        assert_eq!(seed.len(), 16);
        assert!(seed.chars().all(|c| c.is_ascii_uppercase() || c.is_ascii_digit()));
        assert_eq!(engine.seed(), Some(seed.as_str()));
    }

    #[test]
    fn test_engine_stop_clears_run_state() {
        let mut engine = DiffusionEngine::new(aligned_pair(), SimulationConfig::seeded("x"));
        engine.start();
        assert_eq!(engine.initial_message_count(), 1);
        engine.step().unwrap();
        engine.stop();

        assert_eq!(engine.status(), EngineStatus::Stopped);
        assert_eq!(engine.tick(), 0);
        assert_eq!(engine.stats(), &RunStatistics::default());
        assert!(engine
            .graph()
            .nodes()
            .all(|(_, n)| n.state == NodeState::Waiting));
        assert_eq!(engine.step(), Err(SpreadError::PrngUninitialized));
    }

    #[test]
    fn test_speed_multiplier() {
        let mut engine = DiffusionEngine::new(Graph::new(), SimulationConfig::default());
        assert_eq!(engine.tick_interval(), Duration::from_millis(1000));

        let interval = engine.set_speed_multiplier(4.0).unwrap();
        assert_eq!(interval, Duration::from_millis(250));

        for bad in [0.0, -2.0, f64::NAN, f64::INFINITY] {
            assert!(matches!(
                engine.set_speed_multiplier(bad),
                Err(SpreadError::InvalidSpeed(_))
            ));
            assert_eq!(engine.tick_interval(), Duration::from_millis(250));
        }
    }

    #[test]
    fn test_run_to_completion_resets_states() {
        let mut engine = DiffusionEngine::new(aligned_pair(), SimulationConfig::seeded("run"));
        let mut frames = Vec::new();
        let mut sink = |frame: &TickFrame<'_>| frames.push((frame.tick, frame.stats.accepted));

        let completion = engine.run_to_completion(&mut sink);
        assert!(completion.finished);
        assert!(engine.graph().is_quiescent());
        assert_eq!(engine.status(), EngineStatus::Paused);
        assert!(engine
            .graph()
            .links()
            .all(|(_, l)| l.state == LinkState::Waiting));
        assert_eq!(frames.len() as u64, completion.ticks);
        assert_eq!(frames.first(), Some(&(1, 1)));
    }

    #[test]
    fn test_raised_pause_signal_interrupts_run() {
        let mut prng = SeededRandom::new("pause");
        let mut graph = aligned_pair();
        let mut stats = RunStatistics::default();
        let stop = StopSignal::new();
        stop.stop();

        let completion = run_diffusion_to_completion(
            &mut graph,
            Some(&mut prng),
            &mut stats,
            Duration::ZERO,
            &stop,
            &mut NullSink,
        )
        .unwrap();
        assert_eq!(completion.ticks, 0);
        assert!(!completion.finished);
        assert_eq!(graph.pending_count(), 1);
    }

    #[test]
    fn test_snapshot_restore() {
        let mut engine = DiffusionEngine::new(aligned_pair(), SimulationConfig::seeded("snap"));
        engine.start();
        let snapshot = engine.snapshot();
        engine.step().unwrap();
        assert!(engine.graph().is_quiescent());

        engine.restore(snapshot).unwrap();
        assert_eq!(engine.tick(), 0);
        assert_eq!(engine.graph().pending_count(), 1);
    }

    #[test]
    fn test_invalid_snapshot_is_rejected() {
        let mut engine = DiffusionEngine::new(aligned_pair(), SimulationConfig::seeded("snap"));
        let mut bad = engine.snapshot();
        bad.tick = 42;
        let key = bad.graph.node_key("B").unwrap();
        bad.graph.nodes.remove(key);

        assert!(matches!(
            engine.restore(bad),
            Err(SpreadError::InvalidSnapshot(_))
        ));
        assert_eq!(engine.tick(), 0);
        assert_eq!(engine.graph().node_count(), 2);
    }
}
