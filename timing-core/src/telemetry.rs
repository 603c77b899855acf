//! Timing telemetry catalog and the ring buffer that retains it.
//!
//! Events are keyed by output channel and encode to compact `u16` codes so
//! the firmware can mirror them over a diagnostics link without carrying the
//! payload structs. Everything here is allocation free; the ring simply
//! overwrites its oldest entry once full.

use core::{fmt, time::Duration};

use heapless::{HistoryBuf, OldestOrdered};

use crate::angle::{Angle, EventAngles, Micros};

/// Monotonic identifier assigned to each telemetry record.
pub type EventId = u32;

/// Output channel index as carried in event codes.
pub type ChannelId = u8;

/// Channels addressable per event kind in the raw encoding.
pub const CHANNELS_PER_KIND: u16 = 0x10;

/// Discriminated timing events.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TelemetryEventKind {
    AnglesResolved(ChannelId),
    Armed(ChannelId),
    TimeoutOverdue(ChannelId),
    DwellStarted(ChannelId),
    SparkFired(ChannelId),
    Custom(u16),
}

impl fmt::Display for TelemetryEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TelemetryEventKind::AnglesResolved(channel) => write!(f, "angles-resolved {channel}"),
            TelemetryEventKind::Armed(channel) => write!(f, "armed {channel}"),
            TelemetryEventKind::TimeoutOverdue(channel) => write!(f, "overdue {channel}"),
            TelemetryEventKind::DwellStarted(channel) => write!(f, "dwell-started {channel}"),
            TelemetryEventKind::SparkFired(channel) => write!(f, "spark {channel}"),
            TelemetryEventKind::Custom(code) => write!(f, "custom({code})"),
        }
    }
}

impl TelemetryEventKind {
    const ANGLES_RESOLVED_BASE: u16 = 0x0000;
    const ARMED_BASE: u16 = Self::ANGLES_RESOLVED_BASE + CHANNELS_PER_KIND;
    const OVERDUE_BASE: u16 = Self::ARMED_BASE + CHANNELS_PER_KIND;
    const DWELL_STARTED_BASE: u16 = Self::OVERDUE_BASE + CHANNELS_PER_KIND;
    const SPARK_FIRED_BASE: u16 = Self::DWELL_STARTED_BASE + CHANNELS_PER_KIND;
    const CATALOG_END: u16 = Self::SPARK_FIRED_BASE + CHANNELS_PER_KIND;

    /// Encodes the event into a compact transport-friendly discriminant.
    ///
    /// Channel indices past [`CHANNELS_PER_KIND`] cannot be represented and
    /// encode as [`Custom`](Self::Custom) codes past the catalog.
    #[must_use]
    pub const fn to_raw(self) -> u16 {
        match self {
            TelemetryEventKind::AnglesResolved(channel) => {
                encode(Self::ANGLES_RESOLVED_BASE, channel)
            }
            TelemetryEventKind::Armed(channel) => encode(Self::ARMED_BASE, channel),
            TelemetryEventKind::TimeoutOverdue(channel) => encode(Self::OVERDUE_BASE, channel),
            TelemetryEventKind::DwellStarted(channel) => encode(Self::DWELL_STARTED_BASE, channel),
            TelemetryEventKind::SparkFired(channel) => encode(Self::SPARK_FIRED_BASE, channel),
            TelemetryEventKind::Custom(code) => code,
        }
    }

    /// Decodes a raw discriminant, falling back to [`Custom`](Self::Custom).
    #[must_use]
    pub const fn from_raw(code: u16) -> Self {
        if code >= Self::CATALOG_END {
            return TelemetryEventKind::Custom(code);
        }

        #[allow(clippy::cast_possible_truncation)]
        let channel = (code % CHANNELS_PER_KIND) as ChannelId;
        match code / CHANNELS_PER_KIND {
            0 => TelemetryEventKind::AnglesResolved(channel),
            1 => TelemetryEventKind::Armed(channel),
            2 => TelemetryEventKind::TimeoutOverdue(channel),
            3 => TelemetryEventKind::DwellStarted(channel),
            _ => TelemetryEventKind::SparkFired(channel),
        }
    }

    /// Channel the event refers to, if any.
    #[must_use]
    pub const fn channel(self) -> Option<ChannelId> {
        match self {
            TelemetryEventKind::AnglesResolved(channel)
            | TelemetryEventKind::Armed(channel)
            | TelemetryEventKind::TimeoutOverdue(channel)
            | TelemetryEventKind::DwellStarted(channel)
            | TelemetryEventKind::SparkFired(channel) => Some(channel),
            TelemetryEventKind::Custom(_) => None,
        }
    }
}

const fn encode(base: u16, channel: ChannelId) -> u16 {
    if (channel as u16) < CHANNELS_PER_KIND {
        base + channel as u16
    } else {
        TelemetryEventKind::CATALOG_END + channel as u16
    }
}

/// Payloads carried alongside telemetry events.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum TelemetryPayload {
    /// No additional metadata accompanies the event.
    None,
    /// Freshly resolved dwell-on and fire angles.
    Angles(EventAngles),
    /// Delay handed to the timer layer and the crank angle it was computed from.
    Timeout(TimeoutTelemetry),
    /// Time since the previous spark on any channel.
    Spark(SparkTelemetry),
}

impl TelemetryPayload {
    /// Convenience constructor when no payload data is needed.
    #[must_use]
    pub const fn none() -> Self {
        TelemetryPayload::None
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct TimeoutTelemetry {
    pub crank_angle: Angle,
    pub delay: Micros,
}

impl TimeoutTelemetry {
    #[must_use]
    pub const fn new(crank_angle: Angle, delay: Micros) -> Self {
        Self { crank_angle, delay }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct SparkTelemetry {
    pub elapsed_since_previous: Option<Duration>,
}

/// Total number of telemetry entries retained in memory.
pub const TELEMETRY_RING_CAPACITY: usize = 64;

/// Trait implemented by monotonic instant wrappers used for telemetry tracking.
pub trait TelemetryInstant: Copy {
    /// Returns the saturating duration from `earlier` to `self`.
    fn saturating_duration_since(&self, earlier: Self) -> Duration;
}

/// Telemetry record stored in the ring buffer.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct TelemetryRecord<TInstant>
where
    TInstant: Copy,
{
    pub id: EventId,
    pub timestamp: TInstant,
    pub event: TelemetryEventKind,
    pub details: TelemetryPayload,
}

/// Telemetry ring buffer type alias.
pub type TelemetryRing<TInstant, const CAPACITY: usize = TELEMETRY_RING_CAPACITY> =
    HistoryBuf<TelemetryRecord<TInstant>, CAPACITY>;

/// Records timing events into a fixed-size ring buffer.
pub struct TelemetryRecorder<TInstant, const CAPACITY: usize = TELEMETRY_RING_CAPACITY>
where
    TInstant: Copy,
{
    ring: TelemetryRing<TInstant, CAPACITY>,
    last_spark_at: Option<TInstant>,
    next_event_id: EventId,
}

impl<TInstant, const CAPACITY: usize> TelemetryRecorder<TInstant, CAPACITY>
where
    TInstant: TelemetryInstant,
{
    /// Creates a new telemetry recorder with an empty history.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            ring: HistoryBuf::new(),
            last_spark_at: None,
            next_event_id: 0,
        }
    }

    /// Returns an iterator over the recorded telemetry in chronological order.
    pub fn oldest_first(&self) -> OldestOrdered<'_, TelemetryRecord<TInstant>> {
        self.ring.oldest_ordered()
    }

    /// Returns the most recent telemetry record, if available.
    pub fn latest(&self) -> Option<&TelemetryRecord<TInstant>> {
        self.ring.recent()
    }

    pub fn len(&self) -> usize {
        self.ring.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ring.is_empty()
    }

    pub fn record_angles(
        &mut self,
        channel: ChannelId,
        angles: EventAngles,
        timestamp: TInstant,
    ) -> EventId {
        self.record(
            TelemetryEventKind::AnglesResolved(channel),
            TelemetryPayload::Angles(angles),
            timestamp,
        )
    }

    /// Records the delay handed to the timer layer for a freshly armed channel.
    pub fn record_armed(
        &mut self,
        channel: ChannelId,
        crank_angle: Angle,
        delay: Micros,
        timestamp: TInstant,
    ) -> EventId {
        self.record(
            TelemetryEventKind::Armed(channel),
            TelemetryPayload::Timeout(TimeoutTelemetry::new(crank_angle, delay)),
            timestamp,
        )
    }

    /// Records an armed channel whose dwell-on point had already passed.
    pub fn record_overdue(
        &mut self,
        channel: ChannelId,
        crank_angle: Angle,
        timestamp: TInstant,
    ) -> EventId {
        self.record(
            TelemetryEventKind::TimeoutOverdue(channel),
            TelemetryPayload::Timeout(TimeoutTelemetry::new(crank_angle, 0)),
            timestamp,
        )
    }

    pub fn record_dwell_started(&mut self, channel: ChannelId, timestamp: TInstant) -> EventId {
        self.record(
            TelemetryEventKind::DwellStarted(channel),
            TelemetryPayload::none(),
            timestamp,
        )
    }

    /// Records a spark and captures the elapsed time since the previous one.
    pub fn record_spark(&mut self, channel: ChannelId, timestamp: TInstant) -> EventId {
        let elapsed = self
            .last_spark_at
            .map(|previous| timestamp.saturating_duration_since(previous));
        self.last_spark_at = Some(timestamp);

        self.record(
            TelemetryEventKind::SparkFired(channel),
            TelemetryPayload::Spark(SparkTelemetry {
                elapsed_since_previous: elapsed,
            }),
            timestamp,
        )
    }

    /// Records an arbitrary telemetry event with the supplied payload.
    pub fn record(
        &mut self,
        event: TelemetryEventKind,
        payload: TelemetryPayload,
        timestamp: TInstant,
    ) -> EventId {
        let id = self.next_event_id;
        self.next_event_id = self.next_event_id.wrapping_add(1);

        self.ring.write(TelemetryRecord {
            id,
            timestamp,
            event,
            details: payload,
        });

        id
    }
}

impl<TInstant, const CAPACITY: usize> Default for TelemetryRecorder<TInstant, CAPACITY>
where
    TInstant: TelemetryInstant,
{
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
    struct MicrosInstant(u64);

    impl TelemetryInstant for MicrosInstant {
        fn saturating_duration_since(&self, earlier: Self) -> Duration {
            Duration::from_micros(self.0.saturating_sub(earlier.0))
        }
    }

    #[test]
    fn event_codes_round_trip() {
        let fixtures = [
            (TelemetryEventKind::AnglesResolved(0), 0x00),
            (TelemetryEventKind::Armed(3), 0x13),
            (TelemetryEventKind::TimeoutOverdue(1), 0x21),
            (TelemetryEventKind::DwellStarted(7), 0x37),
            (TelemetryEventKind::SparkFired(15), 0x4F),
            (TelemetryEventKind::Custom(0xBEEF), 0xBEEF),
        ];

        for (event, code) in fixtures {
            assert_eq!(event.to_raw(), code);
            assert_eq!(TelemetryEventKind::from_raw(code), event);
        }
    }

    #[test]
    fn out_of_range_channel_encodes_past_catalog() {
        let raw = TelemetryEventKind::SparkFired(16).to_raw();
        assert!(matches!(
            TelemetryEventKind::from_raw(raw),
            TelemetryEventKind::Custom(_)
        ));
        assert_eq!(TelemetryEventKind::Custom(9).channel(), None);
        assert_eq!(TelemetryEventKind::Armed(2).channel(), Some(2));
    }

    #[test]
    fn records_elapsed_between_sparks() {
        let mut recorder = TelemetryRecorder::<MicrosInstant>::new();

        let first = recorder.record_spark(0, MicrosInstant(1_000));
        assert_eq!(first, 0);
        let record = recorder.latest().copied().expect("record");
        assert_eq!(
            record.details,
            TelemetryPayload::Spark(SparkTelemetry {
                elapsed_since_previous: None
            })
        );

        recorder.record_spark(1, MicrosInstant(8_500));
        match recorder.latest().map(|record| record.details) {
            Some(TelemetryPayload::Spark(details)) => {
                let elapsed = details.elapsed_since_previous.expect("missing elapsed");
                assert_eq!(elapsed.as_micros(), 7_500);
            }
            other => panic!("expected spark payload, got {other:?}"),
        }
    }

    #[test]
    fn overdue_carries_zero_delay() {
        let mut recorder = TelemetryRecorder::<MicrosInstant>::new();
        recorder.record_overdue(2, 315, MicrosInstant(10));

        let record = recorder.latest().copied().expect("record");
        assert_eq!(record.event, TelemetryEventKind::TimeoutOverdue(2));
        assert_eq!(
            record.details,
            TelemetryPayload::Timeout(TimeoutTelemetry::new(315, 0))
        );
    }

    #[test]
    fn ring_keeps_most_recent_records_in_order() {
        let mut recorder = TelemetryRecorder::<MicrosInstant, 4>::new();
        for tick in 0..6_u64 {
            recorder.record_dwell_started(0, MicrosInstant(tick));
        }

        assert_eq!(recorder.len(), 4);
        let mut ids = recorder.oldest_first().map(|record| record.id);
        assert_eq!(ids.next(), Some(2));
        assert_eq!(ids.last(), Some(5));
    }
}
