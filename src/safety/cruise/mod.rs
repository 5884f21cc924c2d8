//! Cruise engagement state machine: derives `controls_allowed` from the
//! edges of the vehicle's own ACC-engaged signal, gated by the pedals.
//!
//! ```text
//!              rising edge of ACC-engaged, no gas, no brake
//!  DISENGAGED ─────────────────────────────────────────────▶ ENGAGED
//!      ▲                                                        │
//!      └──── ACC-engaged low │ gas │ brake │ integrity fault ◀──┘
//! ```

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum EngagementState {
    Disengaged,
    Engaged,
}

/// Why controls were withdrawn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DisengageReason {
    /// The vehicle's ACC reports not engaged.
    CruiseOff,
    GasPressed,
    BrakePressed,
    /// A monitored message failed its integrity checks or went stale.
    IntegrityFault,
    /// The stock ECU is reaching the bus this system owns.
    RelayMalfunction,
}

/// Edge produced by one update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Transition {
    Engaged,
    Disengaged(DisengageReason),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct CruiseEngagement {
    state: EngagementState,
    /// Previous raw ACC-engaged sample; `None` until the first one is seen,
    /// so a level already high at startup is never taken for a rising edge.
    cruise_engaged_prev: Option<bool>,
    /// Master cruise switch, exposed for other layers only.
    acc_main_on: bool,
}

impl Default for CruiseEngagement {
    fn default() -> Self {
        Self::new()
    }
}

impl CruiseEngagement {
    pub const fn new() -> Self {
        Self {
            state: EngagementState::Disengaged,
            cruise_engaged_prev: None,
            acc_main_on: false,
        }
    }

    pub fn state(&self) -> EngagementState {
        self.state
    }

    pub fn is_engaged(&self) -> bool {
        self.state == EngagementState::Engaged
    }

    pub fn acc_main_on(&self) -> bool {
        self.acc_main_on
    }

    /// Feed one raw ACC-engaged sample together with the current pedal state.
    pub fn on_cruise_state(
        &mut self,
        cruise_engaged: bool,
        gas_pressed: bool,
        brake_pressed: bool,
    ) -> Option<Transition> {
        let rising_edge = cruise_engaged && self.cruise_engaged_prev == Some(false);
        self.cruise_engaged_prev = Some(cruise_engaged);

        if !cruise_engaged {
            return self.disengage(DisengageReason::CruiseOff);
        }

        if rising_edge && !gas_pressed && !brake_pressed && !self.is_engaged() {
            self.state = EngagementState::Engaged;
            #[cfg(feature = "defmt")]
            defmt::info!("Controls engaged on ACC rising edge");
            return Some(Transition::Engaged);
        }

        None
    }

    /// Pedal override: any press ends engagement.
    pub fn on_pedals(&mut self, gas_pressed: bool, brake_pressed: bool) -> Option<Transition> {
        if brake_pressed {
            self.disengage(DisengageReason::BrakePressed)
        } else if gas_pressed {
            self.disengage(DisengageReason::GasPressed)
        } else {
            None
        }
    }

    pub fn set_acc_main_on(&mut self, acc_main_on: bool) {
        self.acc_main_on = acc_main_on;
    }

    /// Withdraw controls. Returns the transition only when it actually happened.
    pub fn disengage(&mut self, reason: DisengageReason) -> Option<Transition> {
        if !self.is_engaged() {
            return None;
        }
        self.state = EngagementState::Disengaged;
        #[cfg(feature = "defmt")]
        defmt::info!("Controls disengaged: {}", reason);
        Some(Transition::Disengaged(reason))
    }
}
