//! Schedule descriptors: `once` and `cron-spec` variants, and the tagged-union
//! wire format they're persisted as in the replicated log.

use crate::error::DcronError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};

/// Computes the next fire instant for a schedule. `None` is the "zero
/// instant" sentinel: no further fires.
pub trait Schedule: Send + Sync + std::fmt::Debug {
    /// Returns the next instant at or after `from`, or `None` if exhausted.
    fn next(&self, from: DateTime<Utc>) -> Option<DateTime<Utc>>;

    /// Called by the runner immediately before dispatching an execution.
    fn before_job(&self) {}

    /// Called by the runner after an execution completes (success or failure).
    fn after_job(&self) {}
}

/// Fires at a single fixed instant, then never again.
#[derive(Debug)]
pub struct OnceSchedule {
    at: DateTime<Utc>,
    ran: AtomicBool,
    running: AtomicBool,
}

impl Clone for OnceSchedule {
    fn clone(&self) -> Self {
        Self {
            at: self.at,
            ran: AtomicBool::new(self.ran.load(Ordering::SeqCst)),
            running: AtomicBool::new(self.running.load(Ordering::SeqCst)),
        }
    }
}

impl OnceSchedule {
    /// Builds a schedule that fires once at `at`.
    pub fn new(at: DateTime<Utc>) -> Self {
        Self {
            at,
            ran: AtomicBool::new(false),
            running: AtomicBool::new(false),
        }
    }

    /// Deserializes the `{at, ran}` JSON payload this type round-trips
    /// through the replicated log and the `PUT /{job}/once` request body.
    pub fn from_payload(payload: &str) -> Result<Self, DcronError> {
        #[derive(Deserialize)]
        struct OncePayload {
            at: i64,
            ran: bool,
        }
        let p: OncePayload = serde_json::from_str(payload)?;
        let at = DateTime::<Utc>::from_timestamp(p.at, 0)
            .ok_or_else(|| DcronError::InvalidInput(format!("invalid unix timestamp {}", p.at)))?;
        Ok(Self {
            at,
            ran: AtomicBool::new(p.ran),
            running: AtomicBool::new(false),
        })
    }

    /// Serializes to the `{at, ran}` JSON payload.
    pub fn to_payload(&self) -> String {
        #[derive(Serialize)]
        struct OncePayload {
            at: i64,
            ran: bool,
        }
        let payload = OncePayload {
            at: self.at.timestamp(),
            ran: self.ran.load(Ordering::SeqCst),
        };
        serde_json::to_string(&payload).expect("OncePayload always serializes")
    }
}

impl Schedule for OnceSchedule {
    fn next(&self, _from: DateTime<Utc>) -> Option<DateTime<Utc>> {
        if self.ran.load(Ordering::SeqCst) || self.running.load(Ordering::SeqCst) {
            None
        } else {
            Some(self.at)
        }
    }

    fn before_job(&self) {
        self.running.store(true, Ordering::SeqCst);
    }

    fn after_job(&self) {
        self.ran.store(true, Ordering::SeqCst);
        self.running.store(false, Ordering::SeqCst);
    }
}

/// Recurring schedule parsed from an external cron expression (seconds
/// optional, minute, hour, dom, month, dow, or named descriptor forms).
#[derive(Debug, Clone)]
pub struct CronSchedule {
    expr: String,
    inner: cron::Schedule,
}

impl CronSchedule {
    /// Parses a cron expression, failing with [`DcronError::InvalidInput`] on
    /// a malformed descriptor.
    pub fn new(expr: impl Into<String>) -> Result<Self, DcronError> {
        let expr = expr.into();
        let inner = cron::Schedule::from_str(&expr)
            .map_err(|e| DcronError::InvalidInput(format!("invalid cron expression: {e}")))?;
        Ok(Self { expr, inner })
    }
}

impl Schedule for CronSchedule {
    fn next(&self, from: DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.inner.after(&from).next()
    }
}

/// The discriminated sum persisted in the replicated log as
/// `{"type": u8, "schedule": string}`. Dispatches on `type` at deserialize
/// time rather than via subclassing.
#[derive(Debug, Clone)]
pub enum ScheduleDescriptor {
    /// `type = 0`.
    Once(OnceSchedule),
    /// `type = 1`.
    Cron(CronSchedule),
}

const TYPE_ONCE: u8 = 0;
const TYPE_CRON: u8 = 1;

#[derive(Serialize, Deserialize)]
struct Wire {
    #[serde(rename = "type")]
    kind: u8,
    schedule: String,
}

impl ScheduleDescriptor {
    /// Parses a `{type, schedule}` wire payload, failing with
    /// [`DcronError::UnknownScheduleType`] for an unrecognised `type`.
    pub fn from_wire(kind: u8, payload: &str) -> Result<Self, DcronError> {
        match kind {
            TYPE_ONCE => Ok(ScheduleDescriptor::Once(OnceSchedule::from_payload(
                payload,
            )?)),
            TYPE_CRON => Ok(ScheduleDescriptor::Cron(CronSchedule::new(payload)?)),
            other => Err(DcronError::UnknownScheduleType(other)),
        }
    }

    /// Encodes the `(type, schedule)` pair this descriptor serializes as.
    pub fn to_wire(&self) -> (u8, String) {
        match self {
            ScheduleDescriptor::Once(o) => (TYPE_ONCE, o.to_payload()),
            ScheduleDescriptor::Cron(c) => (TYPE_CRON, c.expr.clone()),
        }
    }
}

impl Schedule for ScheduleDescriptor {
    fn next(&self, from: DateTime<Utc>) -> Option<DateTime<Utc>> {
        match self {
            ScheduleDescriptor::Once(o) => o.next(from),
            ScheduleDescriptor::Cron(c) => c.next(from),
        }
    }

    fn before_job(&self) {
        match self {
            ScheduleDescriptor::Once(o) => o.before_job(),
            ScheduleDescriptor::Cron(c) => c.before_job(),
        }
    }

    fn after_job(&self) {
        match self {
            ScheduleDescriptor::Once(o) => o.after_job(),
            ScheduleDescriptor::Cron(c) => c.after_job(),
        }
    }
}

impl Serialize for ScheduleDescriptor {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        let (kind, schedule) = self.to_wire();
        Wire { kind, schedule }.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for ScheduleDescriptor {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let wire = Wire::deserialize(deserializer)?;
        ScheduleDescriptor::from_wire(wire.kind, &wire.schedule).map_err(serde::de::Error::custom)
    }
}
