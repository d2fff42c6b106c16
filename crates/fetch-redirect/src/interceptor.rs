//! The redirecting fetch interceptor.
//!
//! An [`Interceptor`] wraps another [`Fetch`] capability. Textual addresses
//! containing the rule's pattern are replaced with the rule's target and sent
//! without options; everything else reaches the wrapped capability untouched.
//! Exactly one call is made to the wrapped capability per fetch, and its
//! result (success or error) is returned unmodified.

use std::future::Future;

use tracing::Instrument;

use crate::address::Address;
use crate::fetch::{Fetch, FetchOptions, FetchResponse};

/// Substring that marks an address for redirection. Case-sensitive.
pub const MATCH_PATTERN: &str = "api.cosmic-claw.com";

/// Address substituted for matching requests.
pub const REDIRECT_TARGET: &str = "https://dzongy.github.io/tcc-sovereignty-lite/zenith-memory.json";

/// A single substring-to-address redirect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedirectRule {
    pattern: String,
    target: String,
}

impl Default for RedirectRule {
    fn default() -> Self {
        Self::new(MATCH_PATTERN, REDIRECT_TARGET)
    }
}

impl RedirectRule {
    pub fn new(pattern: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            pattern: pattern.into(),
            target: target.into(),
        }
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    /// Whether `address` is textual and contains the pattern.
    pub fn matches(&self, address: &Address) -> bool {
        address
            .as_text()
            .is_some_and(|text| text.contains(self.pattern.as_str()))
    }

    /// The replacement address for `address`, if it matches.
    pub fn redirect_for(&self, address: &Address) -> Option<Address> {
        self.matches(address)
            .then(|| Address::Text(self.target.clone()))
    }

    /// Apply the rule to a full set of fetch arguments.
    ///
    /// Matching addresses become the target with no options; anything else is
    /// returned unchanged.
    pub fn rewrite(
        &self,
        address: Address,
        options: Option<FetchOptions>,
    ) -> (Address, Option<FetchOptions>) {
        match self.redirect_for(&address) {
            Some(target) => (target, None),
            None => (address, options),
        }
    }
}

/// A [`Fetch`] capability that redirects requests matching a [`RedirectRule`].
///
/// Interceptors nest: wrapping one interceptor in another keeps the same
/// externally observable behavior.
#[derive(Debug, Clone)]
pub struct Interceptor<F> {
    inner: F,
    rule: RedirectRule,
}

impl<F: Fetch> Interceptor<F> {
    pub fn new(inner: F, rule: RedirectRule) -> Self {
        Self { inner, rule }
    }

    pub fn rule(&self) -> &RedirectRule {
        &self.rule
    }

    /// The wrapped capability.
    pub fn inner(&self) -> &F {
        &self.inner
    }

    /// Unwrap, returning the original capability.
    pub fn into_inner(self) -> F {
        self.inner
    }
}

/// Wrap `inner` with the default redirect rule.
pub fn install<F: Fetch>(inner: F) -> Interceptor<F> {
    Interceptor::new(inner, RedirectRule::default())
}

impl<F: Fetch> Fetch for Interceptor<F> {
    type Error = F::Error;

    fn fetch(
        &self,
        address: Address,
        options: Option<FetchOptions>,
    ) -> impl Future<Output = Result<FetchResponse, Self::Error>> + Send {
        let redirected = self.rule.matches(&address);
        if redirected {
            tracing::debug!(
                original = %address,
                target = %self.rule.target(),
                "Redirecting matched fetch"
            );
        }
        let (address, options) = self.rule.rewrite(address, options);

        let span = redirect_tracing::upstream_fetch_span!(address, redirected);
        self.inner.fetch(address, options).instrument(span)
    }
}

/// Extension methods for wrapping any [`Fetch`] capability.
pub trait FetchExt: Fetch + Sized {
    /// Wrap with the default redirect rule.
    fn intercept(self) -> Interceptor<Self> {
        install(self)
    }

    /// Wrap with a custom redirect rule.
    fn intercept_with(self, rule: RedirectRule) -> Interceptor<Self> {
        Interceptor::new(self, rule)
    }
}

impl<F: Fetch> FetchExt for F {}
