//! Run status, counters and transitions of the control loop.
//!
//! Everything here is synchronous and owned by exactly one [`ControllerState`];
//! the async driver in the parent module turns the returned effects into
//! router requests and timers.

use super::ip::{IpClass, classify, extract_wan_ip};
use crate::{
    clock::{self, Timestamp},
    config::{ControllerConfig, LanNetwork},
};
use anyhow::Result;
use log::{debug, info, warn};
use serde::Serialize;
use std::{fmt, net::Ipv4Addr};

/// Minutes an operator pause lasts before polling resumes on its own.
pub const PAUSE_MINUTES: i64 = 10;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunStatus {
    Running,
    Stopped,
    Rebooting,
    Paused,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunOutcome {
    Skipped,
    Unauthenticated,
    FoundExternal,
    FoundInternal,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct OutcomeCounts {
    pub skipped: u64,
    pub unauthenticated: u64,
    pub external: u64,
    pub internal: u64,
    pub total: u64,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct AttemptCounters {
    /// Consecutive failed logins, cleared by a successful login or restart
    pub login_attempts: u32,
    /// Consecutive reboots without seeing an external IP again
    pub reboot_attempts: u32,
    pub total_login_attempts: u64,
    pub total_login_count: u64,
    pub total_reboot_attempts: u64,
    pub total_reboot_count: u64,
}

/// What the driver has to do at the start of a tick
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CycleStart {
    /// Not running, outcome already recorded, just schedule the next tick
    Skipped,
    /// Fetch the router status page and hand the result to `complete_cycle`
    Fetch,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NextTick {
    /// Regular poll interval
    Interval,
    /// Short backoff after a failed login
    AuthRetry,
}

/// Side effects requested by a completed cycle
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CycleEffects {
    pub next_tick: NextTick,
    /// Fire a priming fetch
    pub prime: bool,
    /// Issue the reboot command and arm the grace timer for this generation
    pub reboot: Option<u64>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RestartRejected {
    pub status: RunStatus,
}

#[derive(Clone, Debug, Serialize)]
pub struct StatusSnapshot {
    pub status: RunStatus,
    pub status_since: String,
    pub pause_until: Option<String>,
    pub last_ip: Option<Ipv4Addr>,
    pub last_ip_timestamp: Option<String>,
    pub last_outcome: Option<RunOutcome>,
    pub last_run_attempt: Option<String>,
    pub last_login: Option<String>,
    pub last_reboot: Option<String>,
    pub outcome_counts: OutcomeCounts,
    pub counters: AttemptCounters,
    pub allowed_login_attempts: u32,
    pub allowed_restart_attempts: u32,
    pub started_at: String,
}

pub struct ControllerState {
    allowed_login_attempts: u32,
    allowed_restart_attempts: u32,
    lan_network: LanNetwork,

    status: RunStatus,
    status_update_time: Timestamp,
    last_ip: Option<Ipv4Addr>,
    last_ip_timestamp: Option<Timestamp>,
    last_outcome: Option<RunOutcome>,
    last_run_attempt: Option<Timestamp>,
    login_timestamp: Option<Timestamp>,
    reboot_timestamp: Option<Timestamp>,
    pause_until: Option<Timestamp>,
    started_at: Timestamp,

    counters: AttemptCounters,
    outcome_counts: OutcomeCounts,

    // timers are never cancelled, expiry only applies to the latest arming
    pause_generation: u64,
    reboot_generation: u64,
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunStatus::Running => write!(f, "RUNNING"),
            RunStatus::Stopped => write!(f, "STOPPED"),
            RunStatus::Rebooting => write!(f, "REBOOTING"),
            RunStatus::Paused => write!(f, "PAUSED"),
        }
    }
}

impl RunOutcome {
    pub fn description(&self) -> &'static str {
        match self {
            RunOutcome::Skipped => "Skipped due to non-running status",
            RunOutcome::Unauthenticated => "Unauthenticated (logging into router)",
            RunOutcome::FoundExternal => "External IP found (no operation)",
            RunOutcome::FoundInternal => "Internal IP found (rebooting router)",
        }
    }
}

impl OutcomeCounts {
    fn record(&mut self, outcome: RunOutcome) {
        match outcome {
            RunOutcome::Skipped => self.skipped += 1,
            RunOutcome::Unauthenticated => self.unauthenticated += 1,
            RunOutcome::FoundExternal => self.external += 1,
            RunOutcome::FoundInternal => self.internal += 1,
        }
        self.total += 1;
    }
}

impl CycleEffects {
    fn interval() -> Self {
        CycleEffects {
            next_tick: NextTick::Interval,
            prime: false,
            reboot: None,
        }
    }
}

impl fmt::Display for RestartRejected {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Did not restart, status [{}] does not allow restarting, try again later",
            self.status
        )
    }
}

impl ControllerState {
    pub fn new(config: &ControllerConfig, lan_network: LanNetwork) -> Self {
        let now = clock::now();

        ControllerState {
            allowed_login_attempts: config.allowed_login_attempts,
            allowed_restart_attempts: config.allowed_restart_attempts,
            lan_network,
            status: RunStatus::Running,
            status_update_time: now,
            last_ip: None,
            last_ip_timestamp: None,
            last_outcome: None,
            last_run_attempt: None,
            login_timestamp: None,
            reboot_timestamp: None,
            pause_until: None,
            started_at: now,
            counters: AttemptCounters::default(),
            outcome_counts: OutcomeCounts::default(),
            pause_generation: 0,
            reboot_generation: 0,
        }
    }

    pub fn status(&self) -> RunStatus {
        self.status
    }

    pub fn counters(&self) -> &AttemptCounters {
        &self.counters
    }

    pub fn outcome_counts(&self) -> &OutcomeCounts {
        &self.outcome_counts
    }

    pub fn last_outcome(&self) -> Option<RunOutcome> {
        self.last_outcome
    }

    pub fn last_ip(&self) -> Option<Ipv4Addr> {
        self.last_ip
    }

    /// Start a poll cycle
    pub fn begin_cycle(&mut self) -> CycleStart {
        self.last_run_attempt = Some(clock::now());

        if self.status == RunStatus::Running {
            CycleStart::Fetch
        } else {
            self.record(RunOutcome::Skipped);
            CycleStart::Skipped
        }
    }

    /// Finish a poll cycle with the result of the status page fetch
    pub fn complete_cycle(&mut self, page: Result<String>) -> CycleEffects {
        // an operator command may have arrived while the request was in flight
        if self.status != RunStatus::Running {
            debug!("discarding router answer, status changed to {}", self.status);
            self.record(RunOutcome::Skipped);
            return CycleEffects::interval();
        }

        match page {
            Ok(body) => self.handle_page(&body),
            Err(e) => self.handle_login_failure(e),
        }
    }

    fn handle_login_failure(&mut self, error: anyhow::Error) -> CycleEffects {
        warn!("Unauthenticated - logging into router ({error:#})");
        self.record(RunOutcome::Unauthenticated);
        self.counters.total_login_attempts += 1;

        if self.counters.login_attempts >= self.allowed_login_attempts {
            warn!("Too many failed login attempts - Shutting down");
            self.transition(RunStatus::Stopped);
        } else {
            self.counters.login_attempts += 1;
        }

        CycleEffects {
            next_tick: NextTick::AuthRetry,
            prime: true,
            reboot: None,
        }
    }

    fn handle_page(&mut self, body: &str) -> CycleEffects {
        let Some(ip) = extract_wan_ip(body) else {
            warn!("No WAN IP found in router status page");
            return CycleEffects::interval();
        };

        let now = clock::now();

        if self.last_outcome == Some(RunOutcome::Unauthenticated) {
            info!("Login successful");
            self.login_timestamp = Some(now);
            self.counters.login_attempts = 0;
            self.counters.total_login_count += 1;
        }

        self.last_ip = Some(ip);
        self.last_ip_timestamp = Some(now);

        let mut effects = CycleEffects::interval();

        match classify(ip, &self.lan_network) {
            IpClass::Internal => {
                warn!("Internal IP detected [{ip}]");
                self.record(RunOutcome::FoundInternal);
                effects.reboot = self.trigger_reboot();
            }
            IpClass::External => {
                if self.counters.reboot_attempts > 0 {
                    info!("Restored to external IP [{ip}]");
                    self.counters.total_reboot_count += 1;
                } else {
                    debug!("Found external IP [{ip}] - No operation");
                }
                self.record(RunOutcome::FoundExternal);
                self.counters.reboot_attempts = 0;
            }
        }

        effects
    }

    /// Returns the reboot generation when the reboot command has to be sent
    fn trigger_reboot(&mut self) -> Option<u64> {
        self.counters.total_reboot_attempts += 1;

        if self.counters.reboot_attempts >= self.allowed_restart_attempts {
            warn!("Too many consecutive restarts - Shutting down");
            self.transition(RunStatus::Stopped);
            return None;
        }

        self.counters.reboot_attempts += 1;
        warn!("Restarting router");
        self.transition(RunStatus::Rebooting);
        self.reboot_timestamp = Some(clock::now());
        self.reboot_generation += 1;

        Some(self.reboot_generation)
    }

    /// Grace period after a reboot command is over
    pub fn reboot_elapsed(&mut self, generation: u64) -> bool {
        if self.status != RunStatus::Rebooting || generation != self.reboot_generation {
            debug!("ignoring stale reboot timer ({generation})");
            return false;
        }

        info!("Reboot grace period over - resuming checks");
        self.transition(RunStatus::Running);
        true
    }

    pub fn stop(&mut self) {
        info!("Stop requested");
        self.pause_until = None;
        self.transition(RunStatus::Stopped);
    }

    /// Pause polling; returns the generation the resume timer has to carry
    pub fn pause(&mut self) -> u64 {
        info!("Pause requested for {PAUSE_MINUTES} minutes");
        self.transition(RunStatus::Paused);
        self.pause_until = Some(clock::now_plus_minutes(PAUSE_MINUTES));
        self.pause_generation += 1;
        self.pause_generation
    }

    /// Pause duration is over
    pub fn pause_elapsed(&mut self, generation: u64) -> bool {
        if self.status != RunStatus::Paused || generation != self.pause_generation {
            debug!("ignoring stale pause timer ({generation})");
            return false;
        }

        info!("Pause over - resuming checks");
        self.pause_until = None;
        self.transition(RunStatus::Running);
        true
    }

    pub fn restart(&mut self) -> Result<(), RestartRejected> {
        match self.status {
            RunStatus::Stopped | RunStatus::Paused => {
                info!("Restart requested");
                self.counters.login_attempts = 0;
                self.counters.reboot_attempts = 0;
                self.pause_until = None;
                self.transition(RunStatus::Running);
                Ok(())
            }
            status => {
                let rejected = RestartRejected { status };
                warn!("{rejected}");
                Err(rejected)
            }
        }
    }

    pub fn snapshot(&self) -> StatusSnapshot {
        StatusSnapshot {
            status: self.status,
            status_since: clock::format(&self.status_update_time),
            pause_until: self.pause_until.as_ref().map(clock::format),
            last_ip: self.last_ip,
            last_ip_timestamp: self.last_ip_timestamp.as_ref().map(clock::format),
            last_outcome: self.last_outcome,
            last_run_attempt: self.last_run_attempt.as_ref().map(clock::format),
            last_login: self.login_timestamp.as_ref().map(clock::format),
            last_reboot: self.reboot_timestamp.as_ref().map(clock::format),
            outcome_counts: self.outcome_counts.clone(),
            counters: self.counters.clone(),
            allowed_login_attempts: self.allowed_login_attempts,
            allowed_restart_attempts: self.allowed_restart_attempts,
            started_at: clock::format(&self.started_at),
        }
    }

    fn record(&mut self, outcome: RunOutcome) {
        self.last_outcome = Some(outcome);
        self.outcome_counts.record(outcome);
    }

    fn transition(&mut self, status: RunStatus) {
        if self.status == status {
            return;
        }

        debug!("status {} -> {status}", self.status);
        self.status = status;
        self.status_update_time = clock::now();
    }
}
