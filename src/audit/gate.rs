//! Request gating
//!
//! Decides whether the before-snapshot should be captured for the current
//! request. Listing actions load many records and change none of them, so
//! they are bypassed.

use std::collections::BTreeSet;
use std::net::IpAddr;

/// What the recorder knows about the current request
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    /// Routed path, `controller/action[/...]`
    pub route: String,
    /// Address of the client that issued the request
    pub client_ip: Option<IpAddr>,
}

impl RequestContext {
    pub fn new(route: impl Into<String>) -> Self {
        Self {
            route: route.into(),
            client_ip: None,
        }
    }

    pub fn with_client_ip(mut self, ip: IpAddr) -> Self {
        self.client_ip = Some(ip);
        self
    }

    /// The action segment of the route, if any
    pub fn action(&self) -> Option<&str> {
        self.route
            .trim_matches('/')
            .split('/')
            .nth(1)
            .filter(|segment| !segment.is_empty())
    }
}

/// Whether snapshot capture should run for a request
pub trait CaptureGate {
    fn should_capture(&self, ctx: &RequestContext) -> bool;
}

impl<F> CaptureGate for F
where
    F: Fn(&RequestContext) -> bool,
{
    fn should_capture(&self, ctx: &RequestContext) -> bool {
        self(ctx)
    }
}

/// Captures unless the route has no action or the action is bypassed
#[derive(Debug, Clone)]
pub struct ActionGate {
    bypassed: BTreeSet<String>,
}

impl ActionGate {
    pub fn new(bypassed: BTreeSet<String>) -> Self {
        Self { bypassed }
    }
}

impl Default for ActionGate {
    fn default() -> Self {
        Self::new(std::iter::once("index".to_string()).collect())
    }
}

impl CaptureGate for ActionGate {
    fn should_capture(&self, ctx: &RequestContext) -> bool {
        ctx.action()
            .is_some_and(|action| !self.bypassed.contains(action))
    }
}
