//! Agent lifecycle transitions

use crate::error::AgentError;
use crate::types::{AgentId, AgentState};

/// Validates a lifecycle transition.
///
/// A failed start hook returns the agent from `Starting` to `Stopped`.
pub fn validate_transition(
    agent: &AgentId,
    from: AgentState,
    to: AgentState,
) -> Result<(), AgentError> {
    if allowed_transitions(from).contains(&to) {
        Ok(())
    } else {
        Err(AgentError::IllegalTransition {
            agent: agent.clone(),
            from,
            to,
        })
    }
}

pub fn allowed_transitions(from: AgentState) -> &'static [AgentState] {
    match from {
        AgentState::Stopped => &[AgentState::Starting],
        AgentState::Starting => &[AgentState::Running, AgentState::Stopped],
        AgentState::Running => &[AgentState::Stopping],
        AgentState::Stopping => &[AgentState::Stopped],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use AgentState::{Running, Starting, Stopped, Stopping};

    #[test]
    fn happy_path_cycle() {
        let id = AgentId::new("a");
        assert!(validate_transition(&id, Stopped, Starting).is_ok());
        assert!(validate_transition(&id, Starting, Running).is_ok());
        assert!(validate_transition(&id, Running, Stopping).is_ok());
        assert!(validate_transition(&id, Stopping, Stopped).is_ok());
    }

    #[test]
    fn only_lifecycle_edges_are_allowed() {
        for from in [Stopped, Starting, Running, Stopping] {
            for to in [Stopped, Starting, Running, Stopping] {
                let expected = matches!(
                    (from, to),
                    (Stopped, Starting)
                        | (Starting, Running | Stopped)
                        | (Running, Stopping)
                        | (Stopping, Stopped)
                );
                assert_eq!(allowed_transitions(from).contains(&to), expected, "{from:?} -> {to:?}");
            }
        }
    }

    #[test]
    fn shortcuts_are_rejected() {
        let id = AgentId::new("a");
        assert!(validate_transition(&id, Stopped, Running).is_err());
        assert!(validate_transition(&id, Running, Stopped).is_err());
        assert!(validate_transition(&id, Running, Starting).is_err());
        assert!(matches!(
            validate_transition(&id, Stopping, Running),
            Err(AgentError::IllegalTransition { from: Stopping, to: Running, .. })
        ));
    }
}
