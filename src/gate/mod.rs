//! Access gate for the portal's pages.
//!
//! Every page declares an ordered chain of [`AccessPolicy`] values. Before a
//! handler runs, the web layer resolves the current [`Visitor`] (from the
//! session cookie) and, where the page addresses a concrete record, the
//! [`Target`] it belongs to, then asks the gate for a [`Decision`]. The gate
//! itself is a pure function over those two inputs: it performs no I/O, reads
//! no ambient state, holds nothing across calls, and cannot fail — every
//! input combination maps to exactly one decision.

use std::fmt;

use uuid::Uuid;

/// Opaque reference to an account.
///
/// The gate only ever compares identities; creating, loading or mutating the
/// underlying account record is the storage layer's business.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AccountId(Uuid);

impl AccountId {
    pub const fn new(id: Uuid) -> Self {
        Self(id)
    }
}

impl From<Uuid> for AccountId {
    fn from(id: Uuid) -> Self {
        Self(id)
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// The actor making the current request.
///
/// Carries an identity only when the visitor is authenticated; an anonymous
/// visitor has none.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Visitor {
    identity: Option<AccountId>,
}

impl Visitor {
    pub const fn anonymous() -> Self {
        Self { identity: None }
    }

    pub const fn signed_in(identity: AccountId) -> Self {
        Self {
            identity: Some(identity),
        }
    }

    pub const fn is_authenticated(&self) -> bool {
        self.identity.is_some()
    }

    pub const fn identity(&self) -> Option<AccountId> {
        self.identity
    }
}

/// The record a request addresses, reduced to the one attribute the gate
/// cares about: who owns it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Target {
    owner: AccountId,
}

impl Target {
    pub const fn owned_by(owner: AccountId) -> Self {
        Self { owner }
    }

    pub const fn owner(&self) -> AccountId {
        self.owner
    }
}

/// Outcome of a gate evaluation.
///
/// Both denial variants are terminal for the request; the page handler never
/// runs. `DenyNotFound` is deliberately indistinguishable from the resource
/// not existing, so an unauthorized caller learns nothing about the record
/// they probed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// The request proceeds to its handler unmodified.
    Allow,
    /// The visitor is redirected to the given fixed location.
    DenyRedirect(&'static str),
    /// The visitor receives the site's not-found response.
    DenyNotFound,
}

impl Decision {
    pub const fn is_allow(&self) -> bool {
        matches!(self, Self::Allow)
    }
}

/// A named predicate over (visitor, target).
///
/// The redirect destinations are fixed per policy at declaration time, so a
/// page's whole gate chain can live in a `const`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessPolicy {
    /// Only signed-in visitors pass; everyone else is redirected to the
    /// sign-in page.
    AuthenticatedOnly { sign_in: &'static str },
    /// Only signed-out visitors pass; a signed-in visitor is redirected to
    /// the member home page.
    UnauthenticatedOnly { home: &'static str },
    /// Only the owner of the target passes. Anyone else — including an
    /// anonymous visitor, or a request with no resolvable target — gets the
    /// not-found denial.
    OwnerOnly,
}

impl AccessPolicy {
    pub const fn authenticated_only(sign_in: &'static str) -> Self {
        Self::AuthenticatedOnly { sign_in }
    }

    pub const fn unauthenticated_only(home: &'static str) -> Self {
        Self::UnauthenticatedOnly { home }
    }

    pub const fn owner_only() -> Self {
        Self::OwnerOnly
    }

    /// Evaluates this single policy.
    ///
    /// A missing identity or missing target is never an error: for
    /// `OwnerOnly` it simply cannot match the owner, which degrades to the
    /// most restrictive denial.
    pub fn evaluate(&self, visitor: &Visitor, target: Option<&Target>) -> Decision {
        match *self {
            Self::AuthenticatedOnly { sign_in } => {
                if visitor.is_authenticated() {
                    Decision::Allow
                } else {
                    Decision::DenyRedirect(sign_in)
                }
            }
            Self::UnauthenticatedOnly { home } => {
                if visitor.is_authenticated() {
                    Decision::DenyRedirect(home)
                } else {
                    Decision::Allow
                }
            }
            Self::OwnerOnly => match (visitor.identity(), target) {
                (Some(identity), Some(target)) if identity == target.owner() => Decision::Allow,
                _ => Decision::DenyNotFound,
            },
        }
    }
}

/// Evaluates an ordered policy chain.
///
/// Policies run left to right; the first non-`Allow` decision wins and the
/// remaining policies are not consulted. An empty chain allows.
pub fn evaluate(
    policies: &[AccessPolicy],
    visitor: &Visitor,
    target: Option<&Target>,
) -> Decision {
    for policy in policies {
        let decision = policy.evaluate(visitor, target);
        if !decision.is_allow() {
            return decision;
        }
    }
    Decision::Allow
}
