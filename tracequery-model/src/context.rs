use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// A request-scoped collection of values.
///
/// A `RequestContext` carries request-scoped values, such as the caller's
/// tenant or bearer token, from the wire-facing handlers down to the
/// storage collaborators. Cross-cutting concerns access their data using
/// application-specific types, which avoids collisions between concerns.
///
/// Contexts are immutable. Write operations return a new context holding
/// the original values plus the new one, so a handler can extend the
/// context it was given without affecting the caller's copy. Values travel
/// with the context itself, never in thread-local state.
///
/// # Examples
///
/// ```
/// use tracequery_model::RequestContext;
///
/// #[derive(Debug, PartialEq)]
/// struct Deadline(u64);
///
/// let ctx = RequestContext::new().with_value(Deadline(250));
/// assert_eq!(ctx.get::<Deadline>(), Some(&Deadline(250)));
/// ```
#[derive(Clone, Default)]
pub struct RequestContext {
    entries: HashMap<TypeId, Arc<dyn Any + Send + Sync>>,
}

impl RequestContext {
    /// Creates an empty context.
    pub fn new() -> Self {
        RequestContext::default()
    }

    /// Returns a reference to the entry of type `T`, if one is present.
    pub fn get<T: 'static>(&self) -> Option<&T> {
        self.entries
            .get(&TypeId::of::<T>())
            .and_then(|rc| rc.downcast_ref())
    }

    /// Returns a copy of this context with the given value set, replacing
    /// any previous entry of the same type.
    pub fn with_value<T: Send + Sync + 'static>(&self, value: T) -> Self {
        let mut new_context = self.clone();
        new_context
            .entries
            .insert(TypeId::of::<T>(), Arc::new(value));
        new_context
    }

    /// The tenant carried by this request, if any.
    pub fn tenant(&self) -> Option<&str> {
        self.get::<TenantName>().map(|t| t.0.as_str())
    }

    /// The bearer token carried by this request, if any.
    pub fn bearer_token(&self) -> Option<&str> {
        self.get::<BearerToken>().map(|t| t.0.as_str())
    }
}

impl fmt::Debug for RequestContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestContext")
            .field("entries", &self.entries.len())
            .finish()
    }
}

/// The logical namespace of a request. Isolates queries across customers.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TenantName(pub String);

/// An opaque token from an `Authorization` header, forwarded to storage
/// for per-tenant auth. The core never inspects it.
#[derive(Clone, PartialEq, Eq)]
pub struct BearerToken(pub String);

impl fmt::Debug for BearerToken {
    // Tokens are secrets; keep them out of logs.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("BearerToken(***)")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq)]
    struct ValueA(&'static str);
    #[derive(Debug, PartialEq)]
    struct ValueB(u64);

    #[test]
    fn nested_contexts_do_not_leak_writes() {
        let outer = RequestContext::new().with_value(ValueA("a"));
        let inner = outer.with_value(ValueB(42));

        assert_eq!(outer.get::<ValueA>(), Some(&ValueA("a")));
        assert_eq!(outer.get::<ValueB>(), None);
        assert_eq!(inner.get::<ValueA>(), Some(&ValueA("a")));
        assert_eq!(inner.get::<ValueB>(), Some(&ValueB(42)));
    }

    #[test]
    fn later_values_replace_earlier_ones() {
        let ctx = RequestContext::new()
            .with_value(ValueA("first"))
            .with_value(ValueA("second"));
        assert_eq!(ctx.get::<ValueA>(), Some(&ValueA("second")));
    }

    #[test]
    fn tenant_and_token_accessors() {
        let ctx = RequestContext::new()
            .with_value(TenantName("acme".into()))
            .with_value(BearerToken("tok".into()));
        assert_eq!(ctx.tenant(), Some("acme"));
        assert_eq!(ctx.bearer_token(), Some("tok"));
        assert_eq!(format!("{:?}", ctx.get::<BearerToken>().unwrap()), "BearerToken(***)");
    }
}
