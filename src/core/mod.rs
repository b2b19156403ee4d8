use anyhow::Result;
use std::sync::Arc;
use tracing::info;

use crate::config::Config;
use crate::connection::{
    CachingConnectionFactory, ClientConnectionFactory, Connection, ConnectionError,
    ConnectionFactory, FailoverConnectionFactory,
};
use crate::transport::Transport;

/// Wires configuration and a transport into the factory stack.
///
/// One [`ClientConnectionFactory`] per configured endpoint, each wrapped
/// in a [`CachingConnectionFactory`] unless caching is disabled, the list
/// wrapped in a single [`FailoverConnectionFactory`] that callers obtain
/// connections from.
pub struct Core {
    config: Arc<Config>,
    factory: Arc<FailoverConnectionFactory>,
}

impl Core {
    pub fn new(config: Config, transport: Arc<dyn Transport>) -> Result<Self> {
        let endpoints = config.parsed_endpoints()?;
        if endpoints.is_empty() {
            anyhow::bail!("No endpoints configured");
        }

        let mut delegates: Vec<Arc<dyn ConnectionFactory>> = Vec::with_capacity(endpoints.len());
        for (index, (host, port)) in endpoints.into_iter().enumerate() {
            let client = ClientConnectionFactory::new(
                format!("client{}", index + 1),
                host,
                port,
                Arc::clone(&transport),
            )
            .with_connect_timeout(config.connect_timeout());
            client.set_single_use(config.single_use);

            // Single-use connections must never be pooled, so the caching
            // wrapper is skipped entirely in that mode.
            let delegate: Arc<dyn ConnectionFactory> =
                if config.pool.size > 0 && !config.single_use {
                    Arc::new(
                        CachingConnectionFactory::new(Arc::new(client), config.pool.size)
                            .with_acquire_timeout(config.acquire_timeout()),
                    )
                } else {
                    Arc::new(client)
                };
            delegates.push(delegate);
        }

        info!(
            endpoints = delegates.len(),
            pool_size = config.pool.size,
            single_use = config.single_use,
            "assembled connection factory stack"
        );

        let factory = Arc::new(FailoverConnectionFactory::new("failover", delegates));

        Ok(Self {
            config: Arc::new(config),
            factory,
        })
    }

    pub async fn start(&self) {
        self.factory.start().await;
    }

    pub async fn stop(&self) {
        self.factory.stop().await;
    }

    /// Obtain a usable connection from the outermost factory.
    pub async fn get_connection(&self) -> Result<Box<dyn Connection>, ConnectionError> {
        self.factory.get_connection().await
    }

    pub fn factory(&self) -> Arc<FailoverConnectionFactory> {
        Arc::clone(&self.factory)
    }

    pub fn config(&self) -> &Config {
        &self.config
    }
}
