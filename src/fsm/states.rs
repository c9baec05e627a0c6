//! Transition tables for the two device families.
//!
//! ```text
//!  Relay                                Actuator
//!
//!  INITIALIZATION                       INITIALIZATION
//!    │ [normally off]  │ [normally on]    │ [normally off]  │ [normally on]
//!    ▼                 ▼                  ▼                 ▼
//!   OFF ──switch──▶ ON                   OFF ─change[on]──▶ ON
//!    ▲               │                   ▲ ◀─change[off]── │
//!    └────switch─────┘                   └─┘ [off]   [on] └─┘
//! ```

use super::Event::{ChangeValue, Initialize, Switch};
use super::Guard::{Always, IsOff, IsOn, NormallyOff, NormallyOn};
use super::State::{Initialization, Off, On};
use super::Transition;

/// Relay: plain toggle between `Off` and `On`.
pub static RELAY_TABLE: [Transition; 4] = [
    Transition::new(Initialize, Initialization, Off, NormallyOff),
    Transition::new(Initialize, Initialization, On, NormallyOn),
    Transition::new(Switch, Off, On, Always),
    Transition::new(Switch, On, Off, Always),
];

/// Actuator: every value change is a transition, the target depends on
/// whether the new value is positive.
pub static ACTUATOR_TABLE: [Transition; 6] = [
    Transition::new(Initialize, Initialization, Off, NormallyOff),
    Transition::new(Initialize, Initialization, On, NormallyOn),
    Transition::new(ChangeValue, Off, Off, IsOff),
    Transition::new(ChangeValue, Off, On, IsOn),
    Transition::new(ChangeValue, On, On, IsOn),
    Transition::new(ChangeValue, On, Off, IsOff),
];
