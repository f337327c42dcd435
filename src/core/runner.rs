//! Fan-out/fan-in probe execution.
//!
//! Every probe runs on its own named thread and reports back over a channel.
//! The runner is the only synchronization point: it waits until each probe
//! has answered or hit its own deadline, the run deadline passes, or a
//! configured quorum of successful observations has been collected.
//!
//! Threads of probes that time out are detached; their late answers are
//! discarded.

use crate::core::error::RealityError;
use crate::core::observation::Observation;
use crate::core::probe::{Probe, ProbeOutcome, ProbeStatus};
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread;
use std::time::{Duration, Instant};

/// Default run-level timeout.
pub const DEFAULT_RUN_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone)]
pub struct RunOptions {
    pub run_timeout: Duration,
    /// Stop waiting once this many probes have produced observations.
    pub quorum: Option<usize>,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            run_timeout: DEFAULT_RUN_TIMEOUT,
            quorum: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ProbeRun {
    pub run_id: String,
    /// One outcome per scheduled probe, in scheduling order.
    pub outcomes: Vec<ProbeOutcome>,
    /// Set when the run deadline or quorum cut pending probes short.
    pub partial: bool,
}

impl ProbeRun {
    pub fn observations(&self) -> Vec<Observation> {
        self.outcomes
            .iter()
            .filter_map(|o| o.observation.clone())
            .collect()
    }
}

type ProbeMessage = (usize, Result<Observation, RealityError>, u64);

fn millis(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

/// Fill the slot for an answered probe. Returns 1 on a successful observation.
fn accept(slots: &mut [Option<ProbeOutcome>], probes: &[Arc<dyn Probe>], msg: ProbeMessage) -> usize {
    let (idx, result, elapsed_ms) = msg;
    if slots[idx].is_some() {
        return 0;
    }
    let outcome = ProbeOutcome::from_result(probes[idx].id(), probes[idx].kind(), result, elapsed_ms);
    let ok = usize::from(outcome.status == ProbeStatus::Ok);
    slots[idx] = Some(outcome);
    ok
}

pub fn run_probes(run_id: &str, probes: &[Arc<dyn Probe>], opts: &RunOptions) -> ProbeRun {
    let started = Instant::now();
    let far_future = started + Duration::from_secs(u32::MAX as u64);
    let run_deadline = started.checked_add(opts.run_timeout).unwrap_or(far_future);

    let (tx, rx) = mpsc::channel::<ProbeMessage>();
    let mut slots: Vec<Option<ProbeOutcome>> = (0..probes.len()).map(|_| None).collect();
    let mut deadlines = Vec::with_capacity(probes.len());

    for (idx, probe) in probes.iter().enumerate() {
        let deadline = started
            .checked_add(probe.timeout())
            .unwrap_or(far_future)
            .min(run_deadline);
        deadlines.push(deadline);

        let tx = tx.clone();
        let worker = Arc::clone(probe);
        let spawned = thread::Builder::new()
            .name(format!("probe-{}", probe.id()))
            .spawn(move || {
                let t0 = Instant::now();
                let result = catch_unwind(AssertUnwindSafe(|| worker.observe())).unwrap_or_else(
                    |_| Err(RealityError::unavailable(worker.id(), "probe panicked")),
                );
                let _ = tx.send((idx, result, millis(t0.elapsed())));
            });
        if let Err(e) = spawned {
            slots[idx] = Some(ProbeOutcome::failed(
                probe.id(),
                probe.kind(),
                ProbeStatus::Unavailable,
                format!("failed to spawn probe thread: {}", e),
                0,
            ));
        }
    }
    drop(tx);

    let mut partial = false;
    let mut successes = 0usize;

    loop {
        // Answers already queued count even when their deadline has passed since.
        while let Ok(msg) = rx.try_recv() {
            successes += accept(&mut slots, probes, msg);
        }

        let pending: Vec<usize> = (0..slots.len()).filter(|i| slots[*i].is_none()).collect();
        if pending.is_empty() {
            break;
        }

        if opts.quorum.is_some_and(|q| q > 0 && successes >= q) {
            for i in pending {
                slots[i] = Some(ProbeOutcome::failed(
                    probes[i].id(),
                    probes[i].kind(),
                    ProbeStatus::Skipped,
                    "quorum reached before probe answered".to_string(),
                    millis(started.elapsed()),
                ));
            }
            partial = true;
            break;
        }

        let now = Instant::now();
        let run_expired = now >= run_deadline;
        let mut expired_any = false;
        for &i in &pending {
            if run_expired || now >= deadlines[i] {
                let waited = millis(deadlines[i].saturating_duration_since(started));
                slots[i] = Some(ProbeOutcome::from_result(
                    probes[i].id(),
                    probes[i].kind(),
                    Err(RealityError::ProbeTimeout {
                        source_id: probes[i].id().to_string(),
                        timeout_ms: waited,
                    }),
                    waited,
                ));
                expired_any = true;
            }
        }
        if run_expired {
            partial = true;
            break;
        }
        if expired_any {
            continue;
        }

        let next_deadline = pending
            .iter()
            .map(|i| deadlines[*i])
            .min()
            .unwrap_or(run_deadline);
        match rx.recv_timeout(next_deadline.saturating_duration_since(now)) {
            Ok(msg) => successes += accept(&mut slots, probes, msg),
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => {
                for i in pending {
                    if slots[i].is_none() {
                        slots[i] = Some(ProbeOutcome::failed(
                            probes[i].id(),
                            probes[i].kind(),
                            ProbeStatus::Unavailable,
                            "probe thread exited without reporting".to_string(),
                            millis(started.elapsed()),
                        ));
                    }
                }
                break;
            }
        }
    }

    ProbeRun {
        run_id: run_id.to_string(),
        outcomes: slots.into_iter().flatten().collect(),
        partial,
    }
}
