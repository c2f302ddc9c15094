//! Principal identity, captured once per request into a [`Session`]

use crate::error::Result;
use crate::model::Sid;

/// An authenticated user
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub name: String,
    pub is_admin: bool,
}

/// Identity subsystem contract
pub trait PrincipalContext {
    fn current_principal(&self) -> Option<Principal>;
    fn groups_of(&self, principal: &Principal) -> Result<Vec<String>>;
}

/// Explicit request identity passed to every resolver call
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Session {
    principal: Option<Principal>,
    groups: Vec<String>,
}

impl Session {
    /// Snapshot the current principal and its groups
    pub fn from_context(ctx: &dyn PrincipalContext) -> Result<Session> {
        match ctx.current_principal() {
            Some(p) => {
                let groups = ctx.groups_of(&p)?;
                Ok(Session { principal: Some(p), groups })
            }
            None => Ok(Session::anonymous()),
        }
    }

    pub fn anonymous() -> Session {
        Session::default()
    }

    pub fn user(name: impl Into<String>) -> Session {
        Session { principal: Some(Principal { name: name.into(), is_admin: false }), groups: Vec::new() }
    }

    pub fn admin(name: impl Into<String>) -> Session {
        Session { principal: Some(Principal { name: name.into(), is_admin: true }), groups: Vec::new() }
    }

    pub fn with_groups<I, S>(mut self, groups: I) -> Session
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.groups = groups.into_iter().map(Into::into).collect();
        self
    }

    pub fn principal(&self) -> Option<&Principal> {
        self.principal.as_ref()
    }

    pub fn groups(&self) -> &[String] {
        &self.groups
    }

    pub fn is_admin(&self) -> bool {
        self.principal.as_ref().map(|p| p.is_admin).unwrap_or(false)
    }

    /// The user sid followed by the group sids; empty for anonymous sessions
    pub fn sids(&self) -> Vec<Sid> {
        let Some(p) = &self.principal else { return Vec::new() };
        let mut out = Vec::with_capacity(self.groups.len() + 1);
        out.push(Sid::user(&p.name));
        out.extend(self.groups.iter().map(Sid::group));
        out
    }
}
