//! Up to one normal and one escalated session for a single pass

use crate::bus::OutputBus;
use crate::elevator::PrivilegeElevator;
use crate::error::Result;
use crate::session::{CommandSession, SessionKind, SessionSettings};

/// Which sessions a pool should own
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolRequest {
    pub normal: bool,
    pub escalated: bool,
}

impl PoolRequest {
    /// Request exactly the sessions a set of privilege requirements needs
    pub fn from_privileges<I>(requirements: I) -> Self
    where
        I: IntoIterator<Item = bool>,
    {
        requirements
            .into_iter()
            .fold(Self::default(), |mut request, escalated| {
                if escalated {
                    request.escalated = true;
                } else {
                    request.normal = true;
                }
                request
            })
    }

    pub fn is_empty(&self) -> bool {
        !self.normal && !self.escalated
    }
}

/// Sessions for one execution pass.
///
/// Only requested sessions are ever spawned, so a pass without privileged
/// work never triggers an elevation prompt.
#[derive(Debug)]
pub struct SessionPool {
    normal: Option<CommandSession>,
    escalated: Option<CommandSession>,
}

impl SessionPool {
    pub fn new(
        request: PoolRequest,
        settings: &SessionSettings,
        elevator: &dyn PrivilegeElevator,
        bus: &OutputBus,
    ) -> Self {
        Self {
            normal: request
                .normal
                .then(|| CommandSession::normal(settings, bus)),
            escalated: request
                .escalated
                .then(|| CommandSession::escalated(settings, elevator, bus)),
        }
    }

    /// Start every requested session concurrently.
    ///
    /// If either fails, both are stopped and the first error is returned.
    pub async fn start_all(&mut self) -> Result<()> {
        let (normal, escalated) = tokio::join!(
            start_optional(self.normal.as_mut()),
            start_optional(self.escalated.as_mut()),
        );

        if let Err(e) = escalated.and(normal) {
            log::warn!("Session pool failed to start: {e}");
            self.stop_all().await;
            return Err(e);
        }
        Ok(())
    }

    /// Stop the escalated session, then the normal one
    pub async fn stop_all(&self) {
        if let Some(session) = &self.escalated {
            session.stop().await;
        }
        if let Some(session) = &self.normal {
            session.stop().await;
        }
    }

    /// The session for a privilege requirement, if it was requested
    pub fn session(&self, escalated: bool) -> Option<&CommandSession> {
        if escalated {
            self.escalated.as_ref()
        } else {
            self.normal.as_ref()
        }
    }

    /// Kinds of the sessions this pool owns
    pub fn kinds(&self) -> Vec<SessionKind> {
        self.normal
            .iter()
            .chain(self.escalated.iter())
            .map(CommandSession::kind)
            .collect()
    }
}

async fn start_optional(session: Option<&mut CommandSession>) -> Result<()> {
    match session {
        Some(session) => session.start().await,
        None => Ok(()),
    }
}
