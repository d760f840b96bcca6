use serde::{Deserialize, Serialize};

use crate::handler::NativeManager;
use crate::package::PackageName;

/// A deferred action staged to run at the next shutdown.
///
/// `InstallTpt` replays an install that needed privileges the interactive
/// session didn't have (or that the user chose to defer); `SysUpdate` runs
/// the host's native package manager's upgrade command, which is slow
/// enough that running it at login would be worse than deferring it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum AadpoAction {
    InstallTpt {
        name: PackageName,
        #[serde(default, rename = "file")]
        staged_file: Option<String>,
    },
    SysUpdate {
        manager: NativeManager,
    },
}

/// The staging manifest written by the orchestrator and consumed by
/// `tpt-apply-updates`. Actions are applied strictly in order; a later
/// action never depends on an earlier one having succeeded, since the
/// applier runs every action and only logs per-action failures (see
/// `AadpoApplyOutcome`).
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AadpoManifest {
    pub actions: Vec<AadpoAction>,
}

impl AadpoManifest {
    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    pub fn push(&mut self, action: AadpoAction) {
        self.actions.push(action);
    }
}

/// Result of applying one staged action, used by `tpt-apply-updates` to
/// build its run summary and exit non-zero if anything failed.
#[derive(Debug, Clone, Serialize)]
pub struct AadpoActionOutcome {
    pub action: AadpoAction,
    pub succeeded: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manifest_round_trips_through_json() {
        let mut m = AadpoManifest::default();
        m.push(AadpoAction::InstallTpt {
            name: "foo".into(),
            staged_file: Some("/var/cache/tpt/staged/foo.deb".into()),
        });
        m.push(AadpoAction::SysUpdate {
            manager: NativeManager::Apt,
        });
        let json = serde_json::to_string(&m).unwrap();
        let back: AadpoManifest = serde_json::from_str(&json).unwrap();
        assert_eq!(back.actions.len(), 2);
    }

    #[test]
    fn empty_manifest_reports_empty() {
        assert!(AadpoManifest::default().is_empty());
    }
}
