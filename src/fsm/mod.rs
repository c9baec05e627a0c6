//! Table-driven on/off state machine shared by relays and actuators.
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────────┐
//! │  Transition table                                             │
//! │  ┌─────────────┬────────────────┬────────┬─────────────────┐  │
//! │  │ Event       │ Source         │ Target │ Guard           │  │
//! │  ├─────────────┼────────────────┼────────┼─────────────────┤  │
//! │  │ initialize  │ initialization │ off    │ normally off    │  │
//! │  │ initialize  │ initialization │ on     │ normally on     │  │
//! │  │ switch      │ off            │ on     │ -               │  │
//! │  │ ...         │ ...            │ ...    │ ...             │  │
//! │  └─────────────┴────────────────┴────────┴─────────────────┘  │
//! └───────────────────────────────────────────────────────────────┘
//! ```
//!
//! [`Machine::send`] picks the first row whose event and source match
//! and whose guard holds for the caller's [`Flags`].  The owning device
//! runs its side effects through [`Machine::send_with`]; the state only
//! moves when the action succeeds, so a failed pin write leaves the
//! machine where it was.

pub mod states;

use core::fmt::Write as _;

use log::debug;

use crate::error::{Result, TransitionError};

pub use states::{ACTUATOR_TABLE, RELAY_TABLE};

// ---------------------------------------------------------------------------
// States and events
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum State {
    Initialization = 0,
    Off = 1,
    On = 2,
}

impl State {
    pub const COUNT: usize = 3;
    pub const ALL: [State; Self::COUNT] = [Self::Initialization, Self::Off, Self::On];

    pub const fn name(self) -> &'static str {
        match self {
            Self::Initialization => "initialization",
            Self::Off => "off",
            Self::On => "on",
        }
    }

    /// Only `Initialization` is a start state.
    pub const fn is_initial(self) -> bool {
        matches!(self, Self::Initialization)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Event {
    Initialize,
    Switch,
    ChangeValue,
}

impl Event {
    pub const COUNT: usize = 3;
    pub const ALL: [Event; Self::COUNT] = [Self::Initialize, Self::Switch, Self::ChangeValue];

    pub const fn name(self) -> &'static str {
        match self {
            Self::Initialize => "initialize",
            Self::Switch => "switch",
            Self::ChangeValue => "change_value",
        }
    }
}

// ---------------------------------------------------------------------------
// Guards
// ---------------------------------------------------------------------------

/// Inputs the guards are evaluated against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Flags {
    pub normally_off: bool,
    pub is_on: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Guard {
    Always,
    NormallyOff,
    NormallyOn,
    IsOn,
    IsOff,
}

impl Guard {
    pub const fn holds(self, flags: &Flags) -> bool {
        match self {
            Self::Always => true,
            Self::NormallyOff => flags.normally_off,
            Self::NormallyOn => !flags.normally_off,
            Self::IsOn => flags.is_on,
            Self::IsOff => !flags.is_on,
        }
    }

    const fn label(self) -> Option<&'static str> {
        match self {
            Self::Always => None,
            Self::NormallyOff => Some("normally_off"),
            Self::NormallyOn => Some("!normally_off"),
            Self::IsOn => Some("is_on"),
            Self::IsOff => Some("!is_on"),
        }
    }
}

/// One row of a transition table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub event: Event,
    pub source: State,
    pub target: State,
    pub guard: Guard,
}

impl Transition {
    pub const fn new(event: Event, source: State, target: State, guard: Guard) -> Self {
        Self {
            event,
            source,
            target,
            guard,
        }
    }

    /// Source and target are the same state.
    pub fn is_self_loop(&self) -> bool {
        self.source == self.target
    }
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

pub struct Machine {
    table: &'static [Transition],
    current: State,
    transition_count: u64,
}

impl Machine {
    /// New machine sitting in `Initialization`.
    pub fn new(table: &'static [Transition]) -> Self {
        Self {
            table,
            current: State::Initialization,
            transition_count: 0,
        }
    }

    pub fn current_state(&self) -> State {
        self.current
    }

    pub fn table(&self) -> &'static [Transition] {
        self.table
    }

    /// Number of transitions taken, self-loops included.
    pub fn transition_count(&self) -> u64 {
        self.transition_count
    }

    /// Find the transition `event` would take, without moving.
    pub fn resolve(&self, event: Event, flags: &Flags) -> Result<Transition> {
        self.table
            .iter()
            .find(|t| t.event == event && t.source == self.current && t.guard.holds(flags))
            .copied()
            .ok_or_else(|| {
                TransitionError::NotAllowed {
                    event,
                    state: self.current,
                }
                .into()
            })
    }

    /// Events that have at least one row leaving the current state.
    pub fn allowed_events(&self) -> impl Iterator<Item = Event> + '_ {
        // distinct events only, so Event::COUNT slots always suffice
        let mut seen: heapless::Vec<Event, { Event::COUNT }> = heapless::Vec::new();
        for t in self.table.iter().filter(|t| t.source == self.current) {
            if !seen.contains(&t.event) {
                let pushed = seen.push(t.event);
                debug_assert!(pushed.is_ok(), "more distinct events than Event::COUNT");
            }
        }
        seen.into_iter()
    }

    /// Take the transition for `event`.
    pub fn send(&mut self, event: Event, flags: &Flags) -> Result<Transition> {
        self.send_with(event, flags, |_| Ok(()))
    }

    /// Take the transition for `event`, running `action` before the state
    /// pointer moves.  An error from `action` aborts the transition.
    pub fn send_with<F>(&mut self, event: Event, flags: &Flags, action: F) -> Result<Transition>
    where
        F: FnOnce(&Transition) -> Result<()>,
    {
        let transition = self.resolve(event, flags)?;
        action(&transition)?;
        debug!(
            "fsm: {} {} -> {}",
            event.name(),
            transition.source.name(),
            transition.target.name()
        );
        self.current = transition.target;
        self.transition_count += 1;
        Ok(transition)
    }
}

/// Render a transition table as Graphviz DOT.
pub fn to_dot(table: &[Transition], name: &str) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "digraph {name} {{");
    let _ = writeln!(out, "    rankdir=LR;");
    for state in State::ALL {
        if table.iter().any(|t| t.source == state || t.target == state) {
            let shape = if state.is_initial() {
                "doublecircle"
            } else {
                "circle"
            };
            let _ = writeln!(out, "    {} [shape={shape}];", state.name());
        }
    }
    for t in table {
        let label = match t.guard.label() {
            Some(g) => format!("{} [{g}]", t.event.name()),
            None => t.event.name().to_owned(),
        };
        let _ = writeln!(
            out,
            "    {} -> {} [label=\"{label}\"];",
            t.source.name(),
            t.target.name()
        );
    }
    out.push('}');
    out.push('\n');
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    const OFF: Flags = Flags {
        normally_off: true,
        is_on: false,
    };

    #[test]
    fn starts_in_initialization() {
        let m = Machine::new(&RELAY_TABLE);
        assert_eq!(m.current_state(), State::Initialization);
        assert_eq!(m.transition_count(), 0);
    }

    #[test]
    fn initialize_follows_normally_off_guard() {
        let mut m = Machine::new(&RELAY_TABLE);
        m.send(Event::Initialize, &OFF).unwrap();
        assert_eq!(m.current_state(), State::Off);

        let mut m = Machine::new(&RELAY_TABLE);
        let on = Flags {
            normally_off: false,
            is_on: true,
        };
        m.send(Event::Initialize, &on).unwrap();
        assert_eq!(m.current_state(), State::On);
    }

    #[test]
    fn disallowed_event_is_reported_and_state_kept() {
        let mut m = Machine::new(&RELAY_TABLE);
        let err = m.send(Event::Switch, &OFF).unwrap_err();
        assert_eq!(
            err,
            Error::Transition(TransitionError::NotAllowed {
                event: Event::Switch,
                state: State::Initialization,
            })
        );
        assert_eq!(m.current_state(), State::Initialization);
    }

    #[test]
    fn failed_action_aborts_transition() {
        let mut m = Machine::new(&RELAY_TABLE);
        m.send(Event::Initialize, &OFF).unwrap();
        let res = m.send_with(Event::Switch, &OFF, |_| {
            Err(crate::error::GpioError::WriteFailed.into())
        });
        assert!(res.is_err());
        assert_eq!(m.current_state(), State::Off);
        assert_eq!(m.transition_count(), 1);
    }

    #[test]
    fn allowed_events_lists_outgoing_rows() {
        let mut m = Machine::new(&ACTUATOR_TABLE);
        assert_eq!(m.allowed_events().collect::<Vec<_>>(), [Event::Initialize]);
        m.send(Event::Initialize, &OFF).unwrap();
        assert_eq!(m.allowed_events().collect::<Vec<_>>(), [Event::ChangeValue]);
    }

    #[test]
    fn allowed_events_are_distinct_however_many_rows_match() {
        static BUSY: [Transition; 6] = [
            Transition::new(Event::Switch, State::Off, State::On, Guard::IsOn),
            Transition::new(Event::Switch, State::Off, State::Off, Guard::IsOff),
            Transition::new(Event::ChangeValue, State::Off, State::On, Guard::IsOn),
            Transition::new(Event::ChangeValue, State::Off, State::Off, Guard::IsOff),
            Transition::new(Event::Initialize, State::Off, State::Off, Guard::Always),
            Transition::new(Event::Switch, State::Off, State::On, Guard::Always),
        ];
        let mut m = Machine::new(&BUSY);
        m.current = State::Off;
        assert_eq!(m.allowed_events().collect::<Vec<_>>(), [
            Event::Switch,
            Event::ChangeValue,
            Event::Initialize
        ]);
        let mut m = Machine::new(&RELAY_TABLE);
        assert_eq!(m.allowed_events().count(), 1);
        m.current = State::On;
        assert_eq!(m.allowed_events().collect::<Vec<_>>(), [Event::Switch]);
    }

    #[test]
    fn dot_output_contains_every_row() {
        let dot = to_dot(&RELAY_TABLE, "Relay");
        assert!(dot.starts_with("digraph Relay {"));
        assert!(dot.contains("initialization [shape=doublecircle];"));
        assert!(dot.contains("initialization -> off [label=\"initialize [normally_off]\"];"));
        assert!(dot.contains("off -> on [label=\"switch\"];"));
        assert_eq!(dot.matches("->").count(), RELAY_TABLE.len());
    }
}
