//! Replication action catalog: the protection-group lifecycle.
//!
//! The catalog is the single definition of which replication actions exist
//! and from which protection-group states each one is legal.  Capability
//! advertisement ([`crate::registry`]) builds its action list from
//! [`ActionType::ALL`], and the replication execution side is expected to
//! validate requests with [`apply`], so the two never drift apart.
//!
//! ```text
//!  Unprotected             --create-->     [Synchronizing] --> Synced
//!  Synced                  --suspend-->    Suspended
//!  Suspended               --resume-->     Synced
//!  Synced | Suspended      --sync-->       Synced
//!  Synced | Suspended      --failover-->   FailedOver
//!  any but Unprotected     --unplanned-->  FailedOver
//!  FailedOver              --failback-->   [Reprotecting] --> Synced
//!  FailedOver | Suspended  --reprotect-->  Synced
//!  any                     --delete-->     Unprotected
//! ```
//!
//! States in brackets are transient; the group passes through them while
//! the operation runs.
//!
//! Nothing here executes a transition.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::CsiError;
use ProtectionGroupState::{
    FailedOver, Reprotecting, Suspended, Synced, Synchronizing, Unprotected,
};

/// Replication actions a plugin may advertise.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum ActionType {
    /// Planned failover: the target assumes the source role.
    FailoverRemote,
    /// Target takes over unilaterally because the source is unreachable.
    UnplannedFailoverLocal,
    /// Original source resumes its role, replaying changes made meanwhile.
    FailbackLocal,
    /// Original source resumes its role, discarding changes made meanwhile.
    FailbackDiscardChangesLocal,
    /// Re-establish protection direction without a full resync.
    ReprotectLocal,
    /// Halt replication while keeping the pairing.
    Suspend,
    /// Resume replication from the suspension point.
    Resume,
    /// Force an out-of-cycle synchronization.
    Sync,
}

impl ActionType {
    /// Every action, in advertisement order.
    pub const ALL: [ActionType; 8] = [
        Self::FailoverRemote,
        Self::UnplannedFailoverLocal,
        Self::FailbackLocal,
        Self::FailbackDiscardChangesLocal,
        Self::ReprotectLocal,
        Self::Suspend,
        Self::Resume,
        Self::Sync,
    ];

    /// Whether the action throws away data and cannot be undone.
    pub fn is_destructive(self) -> bool {
        matches!(self, Self::FailbackDiscardChangesLocal)
    }
}

impl fmt::Display for ActionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Replication state of a protection group.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum ProtectionGroupState {
    /// No pairing exists.
    Unprotected,
    /// Initial copy to the target is in progress.
    Synchronizing,
    /// Source and target are paired and current.
    Synced,
    /// Pairing kept, replication halted.
    Suspended,
    /// The target has taken over the source role.
    FailedOver,
    /// Changing replication direction back after a failover.
    Reprotecting,
}

impl ProtectionGroupState {
    /// Every state.
    pub const ALL: [ProtectionGroupState; 6] = [
        Self::Unprotected,
        Self::Synchronizing,
        Self::Synced,
        Self::Suspended,
        Self::FailedOver,
        Self::Reprotecting,
    ];
}

impl fmt::Display for ProtectionGroupState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

impl std::str::FromStr for ProtectionGroupState {
    type Err = CsiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|state| state.to_string().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| CsiError::InvalidArgument(format!("unknown protection group state {s:?}")))
    }
}

/// Anything that moves a protection group between states.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum LifecycleOperation {
    /// Pair a source and target across clusters.
    CreateProtectionGroup,
    /// Tear down the pairing and release resources on both clusters.
    DeleteProtectionGroup,
    /// One of the advertised replication actions.
    Action(ActionType),
}

impl LifecycleOperation {
    /// Every operation, group management first.
    pub fn all() -> impl Iterator<Item = LifecycleOperation> {
        [Self::CreateProtectionGroup, Self::DeleteProtectionGroup]
            .into_iter()
            .chain(ActionType::ALL.into_iter().map(Self::Action))
    }
}

impl fmt::Display for LifecycleOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CreateProtectionGroup => f.write_str("CreateProtectionGroup"),
            Self::DeleteProtectionGroup => f.write_str("DeleteProtectionGroup"),
            Self::Action(action) => fmt::Display::fmt(action, f),
        }
    }
}

/// Which states an operation starts from and where it leads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    /// States the operation may be invoked from.
    pub legal_from: &'static [ProtectionGroupState],
    /// Transient state passed through on the way, if any.
    pub via: Option<ProtectionGroupState>,
    /// State once the operation completes.
    pub result: ProtectionGroupState,
}

const ANY: &[ProtectionGroupState] = &ProtectionGroupState::ALL;
const ANY_BUT_UNPROTECTED: &[ProtectionGroupState] =
    &[Synchronizing, Synced, Suspended, FailedOver, Reprotecting];

/// Lifecycle table entry for `op`.
pub fn transition(op: LifecycleOperation) -> Transition {
    let (legal_from, via, result): (&'static [ProtectionGroupState], _, _) = match op {
        LifecycleOperation::CreateProtectionGroup => (&[Unprotected], Some(Synchronizing), Synced),
        LifecycleOperation::DeleteProtectionGroup => (ANY, None, Unprotected),
        LifecycleOperation::Action(action) => match action {
            ActionType::Sync => (&[Synced, Suspended], None, Synced),
            ActionType::Suspend => (&[Synced], None, Suspended),
            ActionType::Resume => (&[Suspended], None, Synced),
            ActionType::FailoverRemote => (&[Synced, Suspended], None, FailedOver),
            // Invoked when the source is gone, so the last known state may
            // be anything but unpaired.
            ActionType::UnplannedFailoverLocal => (ANY_BUT_UNPROTECTED, None, FailedOver),
            ActionType::FailbackLocal | ActionType::FailbackDiscardChangesLocal => {
                (&[FailedOver], Some(Reprotecting), Synced)
            }
            ActionType::ReprotectLocal => (&[FailedOver, Suspended], None, Synced),
        },
    };
    Transition {
        legal_from,
        via,
        result,
    }
}

/// Whether `op` may be invoked on a group in state `from`.
pub fn is_legal(op: LifecycleOperation, from: ProtectionGroupState) -> bool {
    transition(op).legal_from.contains(&from)
}

/// Validate `op` against `from`, returning the transition it would make.
pub fn apply(
    op: LifecycleOperation,
    from: ProtectionGroupState,
) -> Result<Transition, CsiError> {
    let t = transition(op);
    if t.legal_from.contains(&from) {
        Ok(t)
    } else {
        Err(CsiError::IllegalTransition {
            operation: op.to_string(),
            state: from.to_string(),
        })
    }
}

/// Every operation that is legal from `from`.
pub fn legal_operations(from: ProtectionGroupState) -> Vec<LifecycleOperation> {
    LifecycleOperation::all()
        .filter(|op| is_legal(*op, from))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lifecycle_table() {
        use LifecycleOperation::{Action, CreateProtectionGroup, DeleteProtectionGroup};

        let all: &[ProtectionGroupState] = &ProtectionGroupState::ALL;
        #[rustfmt::skip]
        let table: [(LifecycleOperation, &[ProtectionGroupState], Option<ProtectionGroupState>, ProtectionGroupState); 10] = [
            (CreateProtectionGroup, &[Unprotected], Some(Synchronizing), Synced),
            (DeleteProtectionGroup, all, None, Unprotected),
            (Action(ActionType::FailoverRemote), &[Synced, Suspended], None, FailedOver),
            (Action(ActionType::UnplannedFailoverLocal), &[Synchronizing, Synced, Suspended, FailedOver, Reprotecting], None, FailedOver),
            (Action(ActionType::FailbackLocal), &[FailedOver], Some(Reprotecting), Synced),
            (Action(ActionType::FailbackDiscardChangesLocal), &[FailedOver], Some(Reprotecting), Synced),
            (Action(ActionType::ReprotectLocal), &[FailedOver, Suspended], None, Synced),
            (Action(ActionType::Suspend), &[Synced], None, Suspended),
            (Action(ActionType::Resume), &[Suspended], None, Synced),
            (Action(ActionType::Sync), &[Synced, Suspended], None, Synced),
        ];

        assert_eq!(
            table.iter().map(|row| row.0).collect::<Vec<_>>(),
            LifecycleOperation::all().collect::<Vec<_>>()
        );
        for (op, legal_from, via, result) in table {
            let t = transition(op);
            assert_eq!(t.via, via, "{op} via");
            assert_eq!(t.result, result, "{op} result");
            for state in ProtectionGroupState::ALL {
                let expected = legal_from.contains(&state);
                assert_eq!(is_legal(op, state), expected, "{op} from {state}");
                assert_eq!(apply(op, state).is_ok(), expected, "{op} from {state}");
            }
        }
    }

    #[test]
    fn unplanned_failover_legal_everywhere_but_unprotected() {
        let op = LifecycleOperation::Action(ActionType::UnplannedFailoverLocal);
        for state in ProtectionGroupState::ALL {
            assert_eq!(is_legal(op, state), state != Unprotected, "{state}");
        }
    }

    #[test]
    fn delete_legal_everywhere() {
        for state in ProtectionGroupState::ALL {
            let t = apply(LifecycleOperation::DeleteProtectionGroup, state).unwrap();
            assert_eq!(t.result, Unprotected);
        }
    }

    #[test]
    fn failback_only_from_failed_over() {
        for action in [ActionType::FailbackLocal, ActionType::FailbackDiscardChangesLocal] {
            for state in ProtectionGroupState::ALL {
                assert_eq!(
                    is_legal(LifecycleOperation::Action(action), state),
                    state == FailedOver,
                    "{action} from {state}"
                );
            }
            let t = transition(LifecycleOperation::Action(action));
            assert_eq!(t.via, Some(Reprotecting));
            assert_eq!(t.result, Synced);
        }
    }

    #[test]
    fn create_passes_through_synchronizing() {
        let t = apply(LifecycleOperation::CreateProtectionGroup, Unprotected).unwrap();
        assert_eq!(t.via, Some(Synchronizing));
        assert_eq!(t.result, Synced);
        assert!(apply(LifecycleOperation::CreateProtectionGroup, Synced).is_err());
    }

    #[test]
    fn suspend_resume_cycle() {
        let suspend = apply(LifecycleOperation::Action(ActionType::Suspend), Synced).unwrap();
        assert_eq!(suspend.result, Suspended);
        let resume = apply(LifecycleOperation::Action(ActionType::Resume), suspend.result).unwrap();
        assert_eq!(resume.result, Synced);

        let err = apply(LifecycleOperation::Action(ActionType::Resume), Synced).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Resume is not legal from protection group state Synced"
        );
    }

    #[test]
    fn legal_operations_from_suspended() {
        let ops = legal_operations(Suspended);
        assert_eq!(
            ops,
            vec![
                LifecycleOperation::DeleteProtectionGroup,
                LifecycleOperation::Action(ActionType::FailoverRemote),
                LifecycleOperation::Action(ActionType::UnplannedFailoverLocal),
                LifecycleOperation::Action(ActionType::ReprotectLocal),
                LifecycleOperation::Action(ActionType::Resume),
                LifecycleOperation::Action(ActionType::Sync),
            ]
        );
    }

    #[test]
    fn only_discard_failback_is_destructive() {
        let destructive: Vec<_> = ActionType::ALL
            .into_iter()
            .filter(|a| a.is_destructive())
            .collect();
        assert_eq!(destructive, [ActionType::FailbackDiscardChangesLocal]);
    }

    #[test]
    fn state_parse() {
        assert_eq!("failedover".parse::<ProtectionGroupState>().unwrap(), FailedOver);
        assert!("gone".parse::<ProtectionGroupState>().is_err());
    }
}
