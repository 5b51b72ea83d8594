//! Endpoint construction: binds a consumer to a supervised scope and
//! reports bind failures to the endpoint observers.

use std::sync::Arc;

use super::coordinator::ReceiveEndpoint;
use super::events::ReceiveEndpointFaulted;
use crate::context::ReceiveContext;
use crate::error::EndpointError;
use crate::labels::ComponentId;
use crate::observers::{ObserverSet, ReceiveEndpointObserver, ReceiveObserver};
use crate::pipe::Pipe;
use crate::supervision::Supervisor;
use crate::transport::{Broker, Consumer, ConsumerParts, HostSettings, ReceiveSettings};

/// Builder for a [`ReceiveEndpoint`].
pub struct ReceiveEndpointBuilder {
    supervisor: Supervisor,
    broker: Arc<dyn Broker>,
    host: HostSettings,
    settings: ReceiveSettings,
    pipe: Pipe<ReceiveContext>,
    endpoint_observers: Vec<Arc<dyn ReceiveEndpointObserver>>,
    receive_observers: Vec<Arc<dyn ReceiveObserver>>,
}

impl ReceiveEndpointBuilder {
    /// Creates a builder with an empty pipe and no observers.
    pub fn new(
        supervisor: &Supervisor,
        broker: Arc<dyn Broker>,
        host: HostSettings,
        settings: ReceiveSettings,
    ) -> Self {
        Self {
            supervisor: supervisor.clone(),
            broker,
            host,
            settings,
            pipe: Pipe::empty(),
            endpoint_observers: Vec::new(),
            receive_observers: Vec::new(),
        }
    }

    /// Sets the receive pipe every delivery is sent through.
    pub fn with_pipe(mut self, pipe: Pipe<ReceiveContext>) -> Self {
        self.pipe = pipe;
        self
    }

    /// Sets the lifecycle observers (ready, completed, faulted).
    pub fn with_endpoint_observers(
        mut self,
        observers: Vec<Arc<dyn ReceiveEndpointObserver>>,
    ) -> Self {
        self.endpoint_observers = observers;
        self
    }

    /// Sets the per-delivery observers.
    pub fn with_receive_observers(mut self, observers: Vec<Arc<dyn ReceiveObserver>>) -> Self {
        self.receive_observers = observers;
        self
    }

    /// Adds one observer of both kinds, such as [`LogWriter`](crate::LogWriter).
    pub fn observe<O>(mut self, observer: O) -> Self
    where
        O: ReceiveEndpointObserver + ReceiveObserver,
    {
        let observer = Arc::new(observer);
        self.endpoint_observers.push(observer.clone());
        self.receive_observers.push(observer);
        self
    }

    /// Subscribes and waits until the endpoint is ready.
    ///
    /// On a subscribe failure the endpoint scope completes as faulted, the
    /// `faulted` observers are notified, and [`EndpointError::Bind`] is returned.
    /// No Ready or Completed event is emitted in that case.
    pub async fn start(self) -> Result<ReceiveEndpoint, EndpointError> {
        let input_address = self.settings.input_address(&self.host)?;
        let scope = self
            .supervisor
            .create_scope(ComponentId::Consumer.scope_name(&input_address))?;

        let endpoint_observers = ObserverSet::new(self.endpoint_observers);
        let consumer = Consumer::new(ConsumerParts {
            input_address: input_address.clone(),
            scope,
            broker: self.broker,
            host: Arc::new(self.host),
            settings: Arc::new(self.settings),
            pipe: self.pipe.clone(),
            endpoint_observers: endpoint_observers.clone(),
            receive_observers: ObserverSet::new(self.receive_observers),
        });

        if let Err(source) = consumer.start().await {
            let event = ReceiveEndpointFaulted {
                input_address: input_address.clone(),
                error: source.to_string(),
            };
            endpoint_observers.faulted(&event).await;
            return Err(EndpointError::Bind {
                input_address: input_address.to_string(),
                source,
            });
        }
        consumer.scope().ready().await?;

        tracing::debug!(
            input_address = %input_address,
            consumer_tag = %consumer.consumer_tag(),
            "endpoint started"
        );
        Ok(ReceiveEndpoint::new(
            consumer,
            self.pipe,
            self.supervisor.config().stop_timeout(),
        ))
    }
}
