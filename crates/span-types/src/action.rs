//! Scheduler actions

use std::fmt;

use serde::{Deserialize, Serialize};

/// An action the reaction loop can take against the provisioning program.
///
/// `Terminate` and `Destroy` are terminal: the loop ends after executing
/// them and publishes the final state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    /// Run the provisioning program against current offers/wishes
    Deploy,

    /// Stop reacting, leave provisioned resources in place
    Terminate,

    /// Stop reacting and tear provisioned resources down
    Destroy,
}

impl Action {
    /// Whether this action ends the reaction loop.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Action::Terminate | Action::Destroy)
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Action::Deploy => "deploy",
            Action::Terminate => "terminate",
            Action::Destroy => "destroy",
        };
        f.write_str(s)
    }
}
