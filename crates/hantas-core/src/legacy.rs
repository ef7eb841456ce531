//! Legacy vendor-serial probe sub-state-machine (spec.md §4.9, last
//! paragraph).
//!
//! Some legacy devices never send an unsolicited Info frame; the only way to
//! know the link is alive is to alternate calibration-data and setting-data
//! requests until both come back looking real. This is purely an
//! implementation detail of `hantas-transport`'s vendor-serial adapter, not
//! part of the public `Connection` state machine — it is folded into
//! `Connected` once it completes.

/// Probe state, advancing strictly forward until `Connected`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LegacyProbeState {
    /// No probe requests sent yet.
    Disconnected,
    /// Waiting for a calibration-data reply with a non-zero max torque.
    Calibration,
    /// Waiting for a setting-data reply with a firmware string other than
    /// `"0.0.0"`.
    Setting,
    /// Both predicates satisfied; the device is considered reachable.
    Connected,
}

/// What the driver should request next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LegacyProbeAction {
    /// Send a `ReqCalData` request.
    RequestCalData,
    /// Send a `ReqSetData` request.
    RequestSetData,
    /// The probe is satisfied; the connection may be treated as connected.
    Connected,
}

/// The calibration/setting probe state machine.
#[derive(Debug, Clone, Copy, Default)]
pub struct LegacyProbe {
    state: LegacyProbeState,
}

impl Default for LegacyProbeState {
    fn default() -> Self {
        Self::Disconnected
    }
}

impl LegacyProbe {
    /// Creates a probe in [`LegacyProbeState::Disconnected`].
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> LegacyProbeState {
        self.state
    }

    /// Begins probing: `Disconnected` → `Calibration`, requesting
    /// calibration data.
    pub fn start(&mut self) -> LegacyProbeAction {
        self.state = LegacyProbeState::Calibration;
        LegacyProbeAction::RequestCalData
    }

    /// Feeds an observed calibration-data reply's max-torque field. A
    /// non-zero value satisfies the predicate and advances to `Setting`;
    /// zero retries the same request.
    pub fn observe_cal_data(&mut self, max_torque: u32) -> LegacyProbeAction {
        if self.state == LegacyProbeState::Calibration && max_torque != 0 {
            self.state = LegacyProbeState::Setting;
            tracing::debug!("legacy probe: calibration satisfied");
            LegacyProbeAction::RequestSetData
        } else {
            LegacyProbeAction::RequestCalData
        }
    }

    /// Feeds an observed setting-data reply's firmware string. Any value
    /// other than `"0.0.0"` satisfies the predicate and completes the
    /// probe; `"0.0.0"` retries the same request.
    pub fn observe_set_data(&mut self, firmware: &str) -> LegacyProbeAction {
        if self.state == LegacyProbeState::Setting && firmware != "0.0.0" {
            self.state = LegacyProbeState::Connected;
            tracing::info!("legacy probe: device reachable");
            LegacyProbeAction::Connected
        } else {
            LegacyProbeAction::RequestSetData
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn probe_advances_through_both_predicates() {
        let mut probe = LegacyProbe::new();
        assert_eq!(probe.start(), LegacyProbeAction::RequestCalData);
        assert_eq!(probe.state(), LegacyProbeState::Calibration);

        assert_eq!(probe.observe_cal_data(0), LegacyProbeAction::RequestCalData);
        assert_eq!(probe.state(), LegacyProbeState::Calibration);

        assert_eq!(probe.observe_cal_data(500), LegacyProbeAction::RequestSetData);
        assert_eq!(probe.state(), LegacyProbeState::Setting);

        assert_eq!(probe.observe_set_data("0.0.0"), LegacyProbeAction::RequestSetData);
        assert_eq!(probe.state(), LegacyProbeState::Setting);

        assert_eq!(probe.observe_set_data("1.2.3"), LegacyProbeAction::Connected);
        assert_eq!(probe.state(), LegacyProbeState::Connected);
    }
}
