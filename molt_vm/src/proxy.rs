//! Dynamic proxies bound to class identities.
//!
//! A proxy handle is created against a set of interface *identities* and a
//! handler. It caches no method table: every invocation and every reflective
//! query re-resolves against the identities' currently active tables through
//! the dispatch resolver. A proxy created before a version switch therefore
//! behaves exactly like one created after it.
//!
//! Handles register themselves with their identities (a binding counter) so
//! the redefinition engine can reject dropping an interface that live
//! proxies still depend on; `Drop` releases the bindings.

use crate::dispatch::DispatchResolver;
use molt_core::intern::InternedString;
use molt_core::{MoltError, MoltResult, Value};
use molt_runtime::class::identity::{ClassId, ClassIdentity};
use molt_runtime::class::registry::VersionRegistry;
use molt_runtime::class::table::{MethodDescriptor, Signature};
use molt_runtime::instance::Instance;
use rustc_hash::FxHashSet;
use smallvec::SmallVec;
use std::sync::Arc;

// =============================================================================
// Invocation Handler
// =============================================================================

/// Receives proxy invocations with the descriptor resolved against the live
/// table at call time.
pub trait InvocationHandler: Send + Sync {
    /// Handle one invocation.
    fn invoke(&self, method: &MethodDescriptor, args: &[Value]) -> MoltResult<Value>;
}

/// Handler that forwards every invocation to a wrapped instance, re-resolving
/// the signature on the target's own identity.
pub struct ForwardingHandler {
    target: Arc<Instance>,
    resolver: DispatchResolver,
}

impl ForwardingHandler {
    /// Create a handler forwarding to `target`.
    pub fn new(target: Arc<Instance>, resolver: DispatchResolver) -> Self {
        Self { target, resolver }
    }

    /// The wrapped instance.
    #[inline]
    pub fn target(&self) -> &Arc<Instance> {
        &self.target
    }
}

impl InvocationHandler for ForwardingHandler {
    fn invoke(&self, method: &MethodDescriptor, args: &[Value]) -> MoltResult<Value> {
        // The interface descriptor is abstract; find the concrete method on
        // the target's identity and call that.
        let concrete = self
            .resolver
            .resolve_on(self.target.identity(), &method.signature)?;
        concrete.invoke(&self.target, args)
    }
}

// =============================================================================
// Proxy Handle
// =============================================================================

/// A dynamic proxy bound to interface identities and a handler.
pub struct ProxyHandle {
    /// Bound identities. Identities, not tables: the binding survives any
    /// number of redefinitions.
    interfaces: SmallVec<[Arc<ClassIdentity>; 2]>,
    /// Invocation target.
    handler: Arc<dyn InvocationHandler>,
    /// Resolver consulted on every call.
    resolver: DispatchResolver,
}

impl ProxyHandle {
    /// The bound interface identities.
    #[inline]
    pub fn interfaces(&self) -> &[Arc<ClassIdentity>] {
        &self.interfaces
    }

    /// Resolve an exact signature against the bound identities' active
    /// tables, first match in binding order.
    pub fn resolve(&self, signature: &Signature) -> MoltResult<MethodDescriptor> {
        for identity in &self.interfaces {
            if let Ok(method) = self.resolver.resolve_on(identity, signature) {
                return Ok(method);
            }
        }
        Err(MoltError::method_not_found(
            self.describe(),
            signature.name.as_str(),
        ))
    }

    /// Reflective name-only lookup across the bound identities.
    pub fn resolve_named(&self, name: InternedString) -> MoltResult<MethodDescriptor> {
        for identity in &self.interfaces {
            if let Ok(method) = self.resolver.resolve_named_on(identity, name) {
                return Ok(method);
            }
        }
        Err(MoltError::method_not_found(self.describe(), name.as_str()))
    }

    /// Resolve a signature at call time and forward to the handler.
    pub fn invoke(&self, signature: &Signature, args: &[Value]) -> MoltResult<Value> {
        let method = self.resolve(signature)?;
        self.handler.invoke(&method, args)
    }

    /// Resolve by name at call time and forward to the handler.
    pub fn invoke_named(&self, name: InternedString, args: &[Value]) -> MoltResult<Value> {
        let method = self.resolve_named(name)?;
        self.handler.invoke(&method, args)
    }

    /// Union of the bound identities' active method sets, deduplicated by
    /// signature in binding order.
    pub fn methods_of(&self) -> Vec<MethodDescriptor> {
        let mut seen: FxHashSet<Signature> = FxHashSet::default();
        let mut methods = Vec::new();
        for identity in &self.interfaces {
            for method in identity.current().methods() {
                if seen.insert(method.signature.clone()) {
                    methods.push(method.clone());
                }
            }
        }
        methods
    }

    /// Interface names joined for error messages.
    fn describe(&self) -> String {
        let names: Vec<&str> = self
            .interfaces
            .iter()
            .map(|i| i.name().as_str())
            .collect();
        names.join("+")
    }
}

impl Drop for ProxyHandle {
    fn drop(&mut self) {
        for identity in &self.interfaces {
            identity.unbind_proxy();
        }
    }
}

impl std::fmt::Debug for ProxyHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProxyHandle")
            .field("interfaces", &self.describe())
            .finish()
    }
}

// =============================================================================
// Proxy Adapter
// =============================================================================

/// Creates proxy handles bound to live identities.
#[derive(Clone)]
pub struct ProxyAdapter {
    registry: Arc<VersionRegistry>,
    resolver: DispatchResolver,
}

impl ProxyAdapter {
    /// Create an adapter over a registry.
    pub fn new(registry: Arc<VersionRegistry>) -> Self {
        let resolver = DispatchResolver::new(registry.clone());
        Self { registry, resolver }
    }

    /// The resolver proxies created by this adapter consult.
    #[inline]
    pub fn resolver(&self) -> &DispatchResolver {
        &self.resolver
    }

    /// Bind a new proxy to a set of identities.
    ///
    /// Binds to the identities themselves; whether the proxy is created
    /// before or after a version switch is irrelevant to later behavior.
    pub fn create_proxy(
        &self,
        interface_ids: &[ClassId],
        handler: Arc<dyn InvocationHandler>,
    ) -> MoltResult<Arc<ProxyHandle>> {
        let mut interfaces: SmallVec<[Arc<ClassIdentity>; 2]> =
            SmallVec::with_capacity(interface_ids.len());
        for &id in interface_ids {
            interfaces.push(self.registry.identity(id)?);
        }
        for identity in &interfaces {
            identity.bind_proxy();
        }
        Ok(Arc::new(ProxyHandle {
            interfaces,
            handler,
            resolver: self.resolver.clone(),
        }))
    }

    /// Convenience: proxy an instance behind a set of interfaces with a
    /// forwarding handler.
    pub fn proxy_instance(
        &self,
        interface_ids: &[ClassId],
        target: Arc<Instance>,
    ) -> MoltResult<Arc<ProxyHandle>> {
        let handler = Arc::new(ForwardingHandler::new(target, self.resolver.clone()));
        self.create_proxy(interface_ids, handler)
    }
}

// =============================================================================
// Tests
// =============================================================================
