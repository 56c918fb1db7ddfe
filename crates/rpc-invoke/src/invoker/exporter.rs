//! Locally exported services.
//!
//! An [`Exporter`] pairs a service URL (interface + alias + port) with its
//! method table and the provider filter chain built in front of it.

use crate::domain::{
    format_error, codes, CallResult, InterfaceDescriptor, RequestEnvelope, RpcError, ServiceUrl,
};
use crate::filter::{FilterChainFactory, FilterTarget, Role};
use crate::invoker::Invoker;
use crate::ports::MethodHandler;
use async_trait::async_trait;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info};

/// Parameter key carrying the exporter alias
pub const ALIAS_OPTION: &str = "alias";

/// Method name → implementation
#[derive(Clone, Default)]
pub struct MethodTable {
    methods: HashMap<String, Arc<dyn MethodHandler>>,
}

impl MethodTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder: register a method implementation
    pub fn with(mut self, name: impl Into<String>, handler: impl MethodHandler + 'static) -> Self {
        self.methods.insert(name.into(), Arc::new(handler));
        self
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn MethodHandler>> {
        self.methods.get(name)
    }

    pub fn len(&self) -> usize {
        self.methods.len()
    }

    pub fn is_empty(&self) -> bool {
        self.methods.is_empty()
    }
}

/// Terminal invoker of a provider chain: dispatches to the method table
pub struct LocalInvoker {
    name: String,
    methods: MethodTable,
}

impl LocalInvoker {
    pub fn new(name: impl Into<String>, methods: MethodTable) -> Self {
        Self {
            name: name.into(),
            methods,
        }
    }
}

#[async_trait]
impl Invoker for LocalInvoker {
    fn name(&self) -> &str {
        &self.name
    }

    async fn invoke(&self, request: &mut RequestEnvelope) -> Result<CallResult, RpcError> {
        let invocation = &request.payload;
        let method_name = invocation
            .method
            .as_ref()
            .map(|m| m.name.as_str())
            .unwrap_or(invocation.method_name.as_str());

        match self.methods.get(method_name) {
            Some(handler) => Ok(handler.call(invocation, &request.context)),
            None => {
                let cause = format!("method {} is not implemented by {}", method_name, self.name);
                Err(RpcError::NoSuchMethod(match (request.remote_addr, request.local_addr) {
                    (Some(remote), Some(local)) => format_error(
                        codes::PROVIDER_NO_SUCH_METHOD,
                        invocation,
                        remote,
                        local,
                        &cause,
                    ),
                    _ => cause,
                }))
            }
        }
    }

    async fn close(&self) -> Result<(), RpcError> {
        debug!(name = %self.name, "Local invoker closed");
        Ok(())
    }
}

/// A locally hosted service instance
pub struct Exporter {
    name: String,
    interface: String,
    alias: String,
    url: ServiceUrl,
    chain: Arc<dyn Invoker>,
}

impl Exporter {
    /// Export `methods` at `url`, building the provider filter chain in front.
    ///
    /// The interface name is the URL path; the alias comes from the `alias`
    /// parameter.
    pub fn new(
        url: ServiceUrl,
        class: Option<Arc<InterfaceDescriptor>>,
        methods: MethodTable,
        chains: &FilterChainFactory,
    ) -> Self {
        let interface = url.path.clone();
        let alias = url.get_or(ALIAS_OPTION, "").to_string();
        let name = format!("{}/{}:{}", interface, alias, url.port);

        let terminal: Arc<dyn Invoker> = Arc::new(LocalInvoker::new(name.clone(), methods));
        let target = FilterTarget {
            name: name.clone(),
            interface: interface.clone(),
            class,
            url: url.clone(),
        };
        let chain = chains.build(Role::Provider, &target, terminal);

        info!(exporter = %name, url = %url, "Service exported");

        Self {
            name,
            interface,
            alias,
            url,
            chain,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn interface(&self) -> &str {
        &self.interface
    }

    pub fn alias(&self) -> &str {
        &self.alias
    }

    pub fn port(&self) -> u16 {
        self.url.port
    }

    pub fn url(&self) -> &ServiceUrl {
        &self.url
    }

    /// Run the request through the provider chain
    pub async fn invoke(&self, request: &mut RequestEnvelope) -> Result<CallResult, RpcError> {
        self.chain.invoke(request).await
    }

    /// Withdraw the service: close every filter and the terminal invoker
    pub async fn close(&self) -> Result<(), RpcError> {
        info!(exporter = %self.name, "Closing exporter");
        self.chain.close().await
    }
}

impl fmt::Debug for Exporter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Exporter")
            .field("name", &self.name)
            .field("url", &self.url)
            .finish()
    }
}
