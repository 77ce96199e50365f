//! Deadline-based timers re-delivered into the session command queue.
//!
//! A timer never mutates state from its own task: it sends a generation-
//! tagged message back into the session's serialized queue, and the session
//! discards messages whose generation or context is stale. Remaining time is
//! always derived from the absolute deadline, so every observer computes the
//! same value.

use std::time::Duration;

use tokio::{
    sync::mpsc,
    task::JoinHandle,
    time::{Instant, sleep_until},
};

use crate::{dto::relay::RelayPhase, engine::Command};

/// Identifies which schedule produced a timer message and the state it was
/// armed against. A message whose context no longer matches is a silent
/// no-op.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TimerKind {
    /// Quiz per-question countdown.
    QuestionTimeout {
        /// Question the countdown was armed for.
        question: usize,
    },
    /// Quiz everyone-answered grace delay.
    AnswerGrace {
        /// Question the grace was armed for.
        question: usize,
    },
    /// Pictionary passage countdown.
    RoundTimeout {
        /// Passage the countdown was armed for.
        round: usize,
    },
    /// Pictionary gap before the next passage (celebration or reveal).
    PassageGap {
        /// Passage the gap follows.
        round: usize,
    },
    /// Pictionary drawer-rotation interval.
    DrawerRotation {
        /// Passage the rotation belongs to.
        round: usize,
    },
    /// Relay phase countdown.
    PhaseTimeout {
        /// Round the phase belongs to.
        round: usize,
        /// Phase the countdown was armed for.
        phase: RelayPhase,
    },
}

/// The three independent schedules a session may hold at once.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SlotId {
    Primary,
    Grace,
    Rotation,
}

impl TimerKind {
    fn slot(self) -> SlotId {
        match self {
            TimerKind::QuestionTimeout { .. }
            | TimerKind::RoundTimeout { .. }
            | TimerKind::PassageGap { .. }
            | TimerKind::PhaseTimeout { .. } => SlotId::Primary,
            TimerKind::AnswerGrace { .. } => SlotId::Grace,
            TimerKind::DrawerRotation { .. } => SlotId::Rotation,
        }
    }
}

#[derive(Debug, Default)]
struct TimerSlot {
    generation: u64,
    deadline: Option<Instant>,
    task: Option<JoinHandle<()>>,
}

impl TimerSlot {
    fn arm(
        &mut self,
        tx: mpsc::Sender<Command>,
        duration: Duration,
        kind: TimerKind,
        tick: Option<Duration>,
    ) {
        self.cancel();
        self.generation += 1;
        let generation = self.generation;
        let deadline = Instant::now() + duration;
        self.deadline = Some(deadline);
        self.task = Some(tokio::spawn(async move {
            if let Some(every) = tick {
                let mut next = Instant::now() + every;
                while next < deadline {
                    sleep_until(next).await;
                    let remaining = deadline.saturating_duration_since(Instant::now());
                    let message = Command::TimerTick {
                        generation,
                        kind,
                        remaining_secs: remaining.as_secs(),
                    };
                    if tx.send(message).await.is_err() {
                        return;
                    }
                    next += every;
                }
            }
            sleep_until(deadline).await;
            let _ = tx.send(Command::TimerFired { generation, kind }).await;
        }));
    }

    fn cancel(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
        self.deadline = None;
    }

    fn remaining(&self) -> Option<Duration> {
        self.deadline
            .map(|deadline| deadline.saturating_duration_since(Instant::now()))
    }
}

/// Per-session timer service. Each slot holds at most one schedule; arming a
/// slot cancels its predecessor, which is what prevents two races advancing
/// the same state twice.
pub(crate) struct TimerService {
    tx: mpsc::Sender<Command>,
    tick_interval: Option<Duration>,
    primary: TimerSlot,
    grace: TimerSlot,
    rotation: TimerSlot,
}

impl TimerService {
    /// Build the service for one session; messages are delivered on `tx`.
    pub fn new(tx: mpsc::Sender<Command>, tick_interval: Option<Duration>) -> Self {
        Self {
            tx,
            tick_interval,
            primary: TimerSlot::default(),
            grace: TimerSlot::default(),
            rotation: TimerSlot::default(),
        }
    }

    /// Arm the slot `kind` belongs to. Countdown ticks are emitted for the
    /// primary slot only.
    pub fn arm(&mut self, duration: Duration, kind: TimerKind) {
        let tick = match kind.slot() {
            SlotId::Primary => self.tick_interval,
            _ => None,
        };
        let tx = self.tx.clone();
        self.slot_mut(kind.slot()).arm(tx, duration, kind, tick);
    }

    /// Whether a delivered timer message is still current for its slot.
    pub fn accepts(&self, generation: u64, kind: TimerKind) -> bool {
        let slot = self.slot(kind.slot());
        slot.deadline.is_some() && slot.generation == generation
    }

    /// Cancel the schedule of the slot `kind` belongs to.
    pub fn disarm(&mut self, kind: TimerKind) {
        self.slot_mut(kind.slot()).cancel();
    }

    /// Cancel every pending schedule. Required on stop and delete; a stale
    /// timer firing into a stopped session is the main race hazard.
    pub fn cancel_all(&mut self) {
        self.primary.cancel();
        self.grace.cancel();
        self.rotation.cancel();
    }

    /// Remaining time of the primary countdown, `deadline - now`.
    pub fn remaining(&self) -> Option<Duration> {
        self.primary.remaining()
    }

    fn slot(&self, id: SlotId) -> &TimerSlot {
        match id {
            SlotId::Primary => &self.primary,
            SlotId::Grace => &self.grace,
            SlotId::Rotation => &self.rotation,
        }
    }

    fn slot_mut(&mut self, id: SlotId) -> &mut TimerSlot {
        match id {
            SlotId::Primary => &mut self.primary,
            SlotId::Grace => &mut self.grace,
            SlotId::Rotation => &mut self.rotation,
        }
    }
}

impl Drop for TimerService {
    fn drop(&mut self) {
        self.cancel_all();
    }
}
