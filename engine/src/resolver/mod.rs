//! Module state resolver
//!
//! Pure functions that turn a `ModuleRecord` plus the global switch into an
//! effective `ModuleState` and the set of actions a front-end may offer.
//!
//! Resolution order:
//!
//! 1. hidden → `Absent`
//! 2. restricted while the global switch is off → `NeverActivate(GlobalPolicy)`
//! 3. not installed → `NeverActivate(NotInstalled)`
//! 4. not enabled → `NeverActivate(DisabledByUser)`
//! 5. otherwise → `AlwaysActivate`
//!
//! # Examples
//!
//! ```
//! use cdm_engine::resolver::effective_state;
//! use sdk::catalog::is_restricted_id;
//! use sdk::types::{GlobalSwitch, ModuleRecord, ModuleState};
//!
//! let record = ModuleRecord::new("gmp-gmpopenh264")
//!     .with_version("1.2.3.4")
//!     .with_enabled(true);
//! let state = effective_state(&record, GlobalSwitch::default(), is_restricted_id);
//! assert_eq!(state, ModuleState::AlwaysActivate);
//! ```

use sdk::types::{DisabledReason, GlobalSwitch, ModuleActions, ModuleRecord, ModuleState};

/// Compute the effective state of a module
pub fn effective_state<F>(record: &ModuleRecord, switch: GlobalSwitch, is_restricted: F) -> ModuleState
where
    F: Fn(&str) -> bool,
{
    if record.hidden {
        return ModuleState::Absent;
    }

    if !switch.eme_enabled && is_restricted(&record.id) {
        return ModuleState::NeverActivate(DisabledReason::GlobalPolicy);
    }

    if !record.is_installed() {
        return ModuleState::NeverActivate(DisabledReason::NotInstalled);
    }

    if !record.enabled {
        return ModuleState::NeverActivate(DisabledReason::DisabledByUser);
    }

    ModuleState::AlwaysActivate
}

/// Actions available for a module in `state`
pub fn available_actions(record: &ModuleRecord, state: ModuleState) -> ModuleActions {
    match state {
        ModuleState::Absent => ModuleActions::NONE,
        ModuleState::NeverActivate(_) => ModuleActions {
            find_updates: true,
            preferences: record.is_installed(),
        },
        ModuleState::AlwaysActivate => ModuleActions {
            find_updates: true,
            preferences: true,
        },
    }
}

/// State and actions resolved together
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resolution {
    pub state: ModuleState,
    pub actions: ModuleActions,
}

/// Resolve state and actions in one call
pub fn resolve<F>(record: &ModuleRecord, switch: GlobalSwitch, is_restricted: F) -> Resolution
where
    F: Fn(&str) -> bool,
{
    let state = effective_state(record, switch, is_restricted);
    Resolution {
        state,
        actions: available_actions(record, state),
    }
}
