//! Signal records and the types exchanged with notifier and store

use crate::config::Interval;
use crate::data::{Candle, Pair};
use crate::strategy::SignalCandidate;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Trade direction of a signal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Long,
    Short,
}

impl Side {
    pub fn as_str(&self) -> &'static str {
        match self {
            Side::Long => "long",
            Side::Short => "short",
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Side {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "long" => Ok(Side::Long),
            "short" => Ok(Side::Short),
            other => Err(format!("unknown side '{}'", other)),
        }
    }
}

/// `Active` is the only non-terminal state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SignalStatus {
    Active,
    Success,
    Failure,
}

impl SignalStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SignalStatus::Active => "active",
            SignalStatus::Success => "success",
            SignalStatus::Failure => "failure",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, SignalStatus::Active)
    }
}

impl fmt::Display for SignalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SignalStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(SignalStatus::Active),
            "success" => Ok(SignalStatus::Success),
            "failure" => Ok(SignalStatus::Failure),
            other => Err(format!("unknown signal status '{}'", other)),
        }
    }
}

/// Audience a signal belongs to; uniqueness of active signals is per scope
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum SignalScope {
    /// Broadcast chat fed by the top-volume symbols
    Channel(i64),
    /// A single subscriber
    User(i64),
}

impl SignalScope {
    pub fn kind(&self) -> &'static str {
        match self {
            SignalScope::Channel(_) => "channel",
            SignalScope::User(_) => "user",
        }
    }

    /// Chat or user id behind the scope
    pub fn target_id(&self) -> i64 {
        match self {
            SignalScope::Channel(id) | SignalScope::User(id) => *id,
        }
    }

    pub fn from_parts(kind: &str, target_id: i64) -> Option<Self> {
        match kind {
            "channel" => Some(SignalScope::Channel(target_id)),
            "user" => Some(SignalScope::User(target_id)),
            _ => None,
        }
    }
}

impl fmt::Display for SignalScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind(), self.target_id())
    }
}

/// A scope interested in a pair, with its take profit override if any
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScopeTarget {
    pub scope: SignalScope,
    pub take_profit_override: Option<f64>,
}

impl ScopeTarget {
    pub fn new(scope: SignalScope) -> Self {
        Self {
            scope,
            take_profit_override: None,
        }
    }

    pub fn with_take_profit(scope: SignalScope, take_profit_percent: Option<f64>) -> Self {
        Self {
            scope,
            take_profit_override: take_profit_percent,
        }
    }

    /// Override if positive, otherwise the interval default
    pub fn take_profit_for(&self, interval: Interval) -> f64 {
        match self.take_profit_override {
            Some(tp) if tp > 0.0 => tp,
            _ => interval.config().take_profit_percent,
        }
    }
}

/// Reference to the message announcing a signal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MessageRef(pub i32);

/// Tracked trading signal
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Signal {
    pub id: Uuid,
    pub scope: SignalScope,
    pub pair: Pair,
    pub side: Side,
    pub entry_price: f64,
    /// Close time of the candle that produced the signal
    pub entry_time: DateTime<Utc>,
    pub take_profit_percent: f64,
    pub validity_hours: u32,
    pub status: SignalStatus,
    /// Best favorable move seen so far, in percent
    pub max_favorable_excursion: f64,
    pub notified: bool,
    pub message_ref: Option<MessageRef>,
    pub exit_price: Option<f64>,
    pub pnl_percent: Option<f64>,
    pub closed_at: Option<DateTime<Utc>>,
}

impl Signal {
    /// New active signal for one scope
    pub fn open(candidate: &SignalCandidate, target: &ScopeTarget) -> Self {
        let interval = candidate.pair.interval;
        Self {
            id: Uuid::new_v4(),
            scope: target.scope,
            pair: candidate.pair.clone(),
            side: candidate.side,
            entry_price: candidate.entry_price,
            entry_time: candidate.time,
            take_profit_percent: target.take_profit_for(interval),
            validity_hours: interval.config().validity_hours,
            status: SignalStatus::Active,
            max_favorable_excursion: 0.0,
            notified: false,
            message_ref: None,
            exit_price: None,
            pnl_percent: None,
            closed_at: None,
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == SignalStatus::Active
    }

    /// Favorable move reached inside `candle`: its high for longs, its low for shorts
    pub fn excursion(&self, candle: &Candle) -> f64 {
        if self.entry_price <= 0.0 {
            return 0.0;
        }
        match self.side {
            Side::Long => (candle.high - self.entry_price) / self.entry_price * 100.0,
            Side::Short => (self.entry_price - candle.low) / self.entry_price * 100.0,
        }
    }

    /// Signed result of exiting at `price`, positive when in the signal's favor
    pub fn move_percent(&self, price: f64) -> f64 {
        if self.entry_price <= 0.0 {
            return 0.0;
        }
        let raw = (price - self.entry_price) / self.entry_price * 100.0;
        match self.side {
            Side::Long => raw,
            Side::Short => -raw,
        }
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        self.entry_time + Duration::hours(i64::from(self.validity_hours))
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at()
    }
}

/// Terminal transition reported as a reply to the creation message
#[derive(Debug, Clone, PartialEq)]
pub struct SignalUpdate {
    /// The signal with its terminal fields filled in
    pub signal: Signal,
    pub status: SignalStatus,
    pub exit_price: f64,
    pub pnl_percent: f64,
    pub closed_at: DateTime<Utc>,
}

impl SignalUpdate {
    pub fn held_for(&self) -> Duration {
        self.closed_at - self.signal.entry_time
    }
}
