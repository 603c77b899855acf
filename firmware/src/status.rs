#![cfg_attr(not(target_os = "none"), allow(dead_code))]

//! Shared engine position storage for the firmware target.
//!
//! The crank decoder runs from a faster interrupt and publishes the live
//! crank angle and the last revolution period here; the ignition task only
//! ever reads them. Angle and period share one 64-bit word so a snapshot
//! never pairs an angle from one revolution with the period of another.
//! The requested advance lives alongside so the tuning side can change it
//! without touching the scheduler.

use portable_atomic::{AtomicI32, AtomicU64, Ordering};
use timing_core::{Angle, RevolutionPeriod};

/// Period value marking a stalled engine.
const STALLED: u32 = 0;

/// Revolution period in microseconds (high half, 0 == stalled) and live crank
/// angle in degrees (low half).
static POSITION: AtomicU64 = AtomicU64::new(pack(0, STALLED));
/// Advance requested by the tuning side, degrees before the channel angle.
static ADVANCE: AtomicI32 = AtomicI32::new(0);

/// Position and advance readings taken at one instant.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct EngineSnapshot {
    pub crank_angle: Angle,
    pub period: RevolutionPeriod,
    pub advance: Angle,
}

const fn pack(crank_angle: Angle, period_us: u32) -> u64 {
    ((period_us as u64) << 32) | u32::from_ne_bytes(crank_angle.to_ne_bytes()) as u64
}

#[allow(clippy::cast_possible_truncation)]
const fn unpack(word: u64) -> (Angle, u32) {
    let crank_angle = Angle::from_ne_bytes((word as u32).to_ne_bytes());
    (crank_angle, (word >> 32) as u32)
}

fn update(change: impl Fn(Angle, u32) -> (Angle, u32)) {
    let _ = POSITION.fetch_update(Ordering::AcqRel, Ordering::Acquire, |word| {
        let (crank_angle, period_us) = unpack(word);
        let (crank_angle, period_us) = change(crank_angle, period_us);
        Some(pack(crank_angle, period_us))
    });
}

/// Stores a crank angle and the revolution period it was measured in.
pub fn record_position(angle: Angle, period_us: u32) {
    POSITION.store(pack(angle, period_us), Ordering::Release);
}

/// Stores the crank angle reported by the decoder.
pub fn record_crank_angle(angle: Angle) {
    update(|_, period_us| (angle, period_us));
}

/// Stores the period of the last full revolution.
pub fn record_revolution(period_us: u32) {
    update(|crank_angle, _| (crank_angle, period_us));
}

/// Marks the engine as stopped; the next snapshot reports no period.
pub fn mark_stalled() {
    record_revolution(STALLED);
}

/// Stores the advance the ignition task should apply next.
pub fn record_advance(advance: Angle) {
    ADVANCE.store(advance, Ordering::Relaxed);
}

/// Returns the current readings, or `None` while the engine is stalled.
pub fn snapshot() -> Option<EngineSnapshot> {
    let (crank_angle, period_us) = unpack(POSITION.load(Ordering::Acquire));
    let period = RevolutionPeriod::from_micros(period_us)?;
    Some(EngineSnapshot {
        crank_angle,
        period,
        advance: ADVANCE.load(Ordering::Relaxed),
    })
}
