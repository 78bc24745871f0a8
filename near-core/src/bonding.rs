//! Bonding state machine for nearlink.
//!
//! One [`BondState`] tracks one bonding attempt. It consumes the platform's
//! bond-state-changed signals and produces a list of actions for the
//! `near-client` bonder to execute. Only a *terminal* signal for the
//! *target* address settles the attempt: intermediate "bonding" signals and
//! signals for other devices leave it untouched.

use nearlink_types::BtAddress;

/// Bond state as reported by the platform for one remote device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlatformBondState {
    /// No bond.
    None,
    /// Ceremony in progress.
    Bonding,
    /// Bonded.
    Bonded,
}

impl PlatformBondState {
    /// Whether this state ends a bonding ceremony.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Bonding)
    }
}

/// Bond attempt state machine - NO I/O, just state transitions.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum BondState {
    /// No attempt started.
    #[default]
    NotBonded,
    /// Bonding requested, waiting for a terminal signal.
    Bonding {
        /// Device being bonded.
        target: BtAddress,
    },
    /// Bonded (terminal).
    Bonded {
        /// Device that was bonded.
        target: BtAddress,
    },
    /// Attempt failed (terminal).
    Failed {
        /// Device that failed to bond.
        target: BtAddress,
        /// Why it failed.
        failure: BondFailure,
    },
}

impl BondState {
    /// Create a new state machine in the NotBonded state.
    pub fn new() -> Self {
        Self::NotBonded
    }

    /// Process an event and return the new state plus actions to execute.
    pub fn on_event(self, event: BondEvent) -> (Self, Vec<BondAction>) {
        match (self, event) {
            // From NotBonded
            (Self::NotBonded, BondEvent::Requested { target, current }) => {
                if current == PlatformBondState::Bonded {
                    (
                        Self::Bonded {
                            target: target.clone(),
                        },
                        vec![BondAction::Succeed {
                            address: target,
                            already_bonded: true,
                        }],
                    )
                } else {
                    (
                        Self::Bonding {
                            target: target.clone(),
                        },
                        vec![
                            BondAction::Subscribe,
                            BondAction::RequestBond { address: target },
                        ],
                    )
                }
            }

            // From Bonding
            (Self::Bonding { target }, BondEvent::RequestRejected { error }) => {
                let failure = BondFailure::Request(error);
                (
                    Self::Failed {
                        target: target.clone(),
                        failure: failure.clone(),
                    },
                    vec![
                        BondAction::Unsubscribe,
                        BondAction::Fail {
                            address: target,
                            failure,
                        },
                    ],
                )
            }
            (Self::Bonding { target }, BondEvent::StateChanged { address, state })
                if address == target && state.is_terminal() =>
            {
                if state == PlatformBondState::Bonded {
                    (
                        Self::Bonded {
                            target: target.clone(),
                        },
                        vec![
                            BondAction::Unsubscribe,
                            BondAction::Succeed {
                                address: target,
                                already_bonded: false,
                            },
                        ],
                    )
                } else {
                    (
                        Self::Failed {
                            target: target.clone(),
                            failure: BondFailure::Rejected,
                        },
                        vec![
                            BondAction::Unsubscribe,
                            BondAction::Fail {
                                address: target,
                                failure: BondFailure::Rejected,
                            },
                        ],
                    )
                }
            }
            (Self::Bonding { target }, BondEvent::TimedOut) => (
                Self::Failed {
                    target: target.clone(),
                    failure: BondFailure::Timeout,
                },
                vec![
                    BondAction::Unsubscribe,
                    BondAction::Fail {
                        address: target,
                        failure: BondFailure::Timeout,
                    },
                ],
            ),

            // Other addresses, intermediate signals, late signals after a
            // terminal state - stay in current state
            (state, _) => (state, vec![]),
        }
    }

    /// Whether the attempt has settled.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Bonded { .. } | Self::Failed { .. })
    }

    /// Whether a platform request is outstanding.
    pub fn is_pending(&self) -> bool {
        matches!(self, Self::Bonding { .. })
    }
}

/// Inputs to the bond state machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BondEvent {
    /// Caller asked to bond with `target`, whose current platform state is
    /// `current`.
    Requested {
        /// Device to bond with.
        target: BtAddress,
        /// Platform bond state at request time.
        current: PlatformBondState,
    },
    /// Platform refused the bonding request outright.
    RequestRejected {
        /// Platform error text.
        error: String,
    },
    /// Platform bond-state-changed signal (for any device).
    StateChanged {
        /// Device the signal is about.
        address: BtAddress,
        /// New platform state.
        state: PlatformBondState,
    },
    /// The bounded wait for a terminal signal elapsed.
    TimedOut,
}

/// Why a bond attempt failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BondFailure {
    /// Platform reported a terminal unbonded state.
    Rejected,
    /// Platform refused the request synchronously.
    Request(String),
    /// No terminal signal arrived in time.
    Timeout,
}

/// Actions for the bonder to execute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BondAction {
    /// Start listening for bond-state-changed signals.
    Subscribe,
    /// Stop listening for bond-state-changed signals.
    Unsubscribe,
    /// Ask the platform to start the bonding ceremony.
    RequestBond {
        /// Device to bond with.
        address: BtAddress,
    },
    /// Resolve the pending completion with success.
    Succeed {
        /// Bonded device.
        address: BtAddress,
        /// True when no ceremony was needed.
        already_bonded: bool,
    },
    /// Reject the pending completion.
    Fail {
        /// Device that failed to bond.
        address: BtAddress,
        /// Why.
        failure: BondFailure,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    fn target() -> BtAddress {
        BtAddress::new("AA:BB:CC:DD:EE:FF")
    }

    fn other() -> BtAddress {
        BtAddress::new("11:22:33:44:55:66")
    }

    fn bonding() -> BondState {
        BondState::Bonding { target: target() }
    }

    // ===========================================
    // Request
    // ===========================================

    #[test]
    fn already_bonded_short_circuits() {
        let (state, actions) = BondState::new().on_event(BondEvent::Requested {
            target: target(),
            current: PlatformBondState::Bonded,
        });

        assert!(matches!(state, BondState::Bonded { .. }));
        assert_eq!(
            actions,
            vec![BondAction::Succeed {
                address: target(),
                already_bonded: true
            }]
        );
        assert!(!actions
            .iter()
            .any(|a| matches!(a, BondAction::RequestBond { .. })));
    }

    #[test]
    fn request_subscribes_before_bonding() {
        let (state, actions) = BondState::new().on_event(BondEvent::Requested {
            target: target(),
            current: PlatformBondState::None,
        });

        assert!(state.is_pending());
        assert_eq!(
            actions,
            vec![
                BondAction::Subscribe,
                BondAction::RequestBond { address: target() }
            ]
        );
    }

    #[test]
    fn rejected_request_unsubscribes_immediately() {
        let (state, actions) = bonding().on_event(BondEvent::RequestRejected {
            error: "busy".into(),
        });

        assert!(matches!(
            state,
            BondState::Failed {
                failure: BondFailure::Request(_),
                ..
            }
        ));
        assert_eq!(actions[0], BondAction::Unsubscribe);
    }

    // ===========================================
    // Signals
    // ===========================================

    #[test]
    fn terminal_bonded_signal_succeeds() {
        let (state, actions) = bonding().on_event(BondEvent::StateChanged {
            address: target(),
            state: PlatformBondState::Bonded,
        });

        assert!(matches!(state, BondState::Bonded { .. }));
        assert!(actions.contains(&BondAction::Unsubscribe));
        assert!(actions.contains(&BondAction::Succeed {
            address: target(),
            already_bonded: false
        }));
    }

    #[test]
    fn terminal_none_signal_fails() {
        let (state, actions) = bonding().on_event(BondEvent::StateChanged {
            address: target(),
            state: PlatformBondState::None,
        });

        assert!(matches!(
            state,
            BondState::Failed {
                failure: BondFailure::Rejected,
                ..
            }
        ));
        assert!(actions
            .iter()
            .any(|a| matches!(a, BondAction::Fail { .. })));
    }

    #[test]
    fn intermediate_signal_is_ignored() {
        let (state, actions) = bonding().on_event(BondEvent::StateChanged {
            address: target(),
            state: PlatformBondState::Bonding,
        });

        assert_eq!(state, bonding());
        assert!(actions.is_empty());
    }

    #[test]
    fn other_address_is_ignored() {
        let (state, actions) = bonding().on_event(BondEvent::StateChanged {
            address: other(),
            state: PlatformBondState::Bonded,
        });

        assert_eq!(state, bonding());
        assert!(actions.is_empty());
    }

    #[test]
    fn late_signal_after_terminal_is_noop() {
        let (state, _) = bonding().on_event(BondEvent::StateChanged {
            address: target(),
            state: PlatformBondState::Bonded,
        });
        let (state, actions) = state.on_event(BondEvent::StateChanged {
            address: target(),
            state: PlatformBondState::None,
        });

        assert!(matches!(state, BondState::Bonded { .. }));
        assert!(actions.is_empty());
    }

    #[test]
    fn timeout_fails_pending_attempt() {
        let (state, actions) = bonding().on_event(BondEvent::TimedOut);

        assert!(state.is_terminal());
        assert!(actions.contains(&BondAction::Fail {
            address: target(),
            failure: BondFailure::Timeout
        }));
    }

    #[test]
    fn timeout_without_attempt_is_noop() {
        let (state, actions) = BondState::new().on_event(BondEvent::TimedOut);
        assert_eq!(state, BondState::NotBonded);
        assert!(actions.is_empty());
    }
}
