//! Generic typed client over a pluggable transport.
//!
//! # Design
//! `ApiClient<S>` decodes every response into `S` (or `Vec<S>`). Both
//! execution modes share one path: `prepare` turns the bound configuration
//! into an `HttpRequest`, `send` runs it through the transport, and the codec
//! decodes the body. Blocking calls return the outcome directly. Non-blocking
//! calls run the same steps on a worker from the client's pool and hand the
//! outcome to a `Callback`, which is consumed by value so exactly one of its
//! two methods can ever run.
//!
//! The client owns its transport and pool. Dropping it shuts the pool down,
//! waiting for in-flight callbacks, and then releases the transport. Clients
//! derived through `rebind`/`reconfigure` share both, and release happens when
//! the last of them goes out of scope.

use std::marker::PhantomData;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use tokio::runtime::{Builder, Handle, Runtime};
use tokio::task::JoinHandle;

use crate::codec::{self, Decoded, ResponseShape};
use crate::config::{ClientConfig, ClientConfigBuilder};
use crate::error::ClientError;
use crate::http::{Header, HttpMethod, HttpRequest, HttpResponse, APPLICATION_JSON, CONTENT_TYPE};
use crate::transport::{Transport, UreqTransport};

/// Receives the outcome of a non-blocking call.
///
/// Both methods take `self`, so an implementation is invoked at most once;
/// the client guarantees it is invoked exactly once.
pub trait Callback<S>: Send + 'static {
    fn on_success(self, value: Decoded<S>);
    fn on_error(self, error: ClientError);
}

impl<S, F> Callback<S> for F
where
    F: FnOnce(Result<Decoded<S>, ClientError>) + Send + 'static,
{
    fn on_success(self, value: Decoded<S>) {
        self(Ok(value))
    }

    fn on_error(self, error: ClientError) {
        self(Err(error))
    }
}

/// Threads that run non-blocking exchanges and their callbacks.
struct WorkerPool {
    handle: Handle,
    runtime: Option<Runtime>,
}

impl WorkerPool {
    fn owned() -> Result<Self, ClientError> {
        let runtime = Builder::new_multi_thread()
            .worker_threads(1)
            .thread_name("mpesa-client-worker")
            .enable_all()
            .build()
            .map_err(|e| ClientError::transport(format!("worker pool unavailable: {e}")))?;
        Ok(Self {
            handle: runtime.handle().clone(),
            runtime: Some(runtime),
        })
    }

    fn shared(handle: Handle) -> Self {
        Self {
            handle,
            runtime: None,
        }
    }

    fn spawn<F>(&self, work: F) -> JoinHandle<()>
    where
        F: FnOnce() + Send + 'static,
    {
        self.handle.spawn_blocking(work)
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        let Some(runtime) = self.runtime.take() else {
            return;
        };
        if Handle::try_current().is_ok() {
            // A runtime cannot block inside another runtime's context.
            log::warn!("client pool dropped inside an async context, detaching in-flight calls");
            runtime.shutdown_background();
        } else {
            drop(runtime);
        }
    }
}

/// HTTP client bound to one [`ClientConfig`], decoding responses into `S`.
pub struct ApiClient<S> {
    config: ClientConfig,
    // Dropped before `transport` so in-flight calls finish first.
    workers: Arc<WorkerPool>,
    transport: Arc<dyn Transport>,
    _response: PhantomData<fn() -> S>,
}

impl<S> ApiClient<S>
where
    S: DeserializeOwned + Send + 'static,
{
    /// Client over the default `UreqTransport` with its own worker pool.
    pub fn new(config: ClientConfig) -> Result<Self, ClientError> {
        Self::with_transport(config, Arc::new(UreqTransport::new()))
    }

    pub fn with_transport(config: ClientConfig, transport: Arc<dyn Transport>) -> Result<Self, ClientError> {
        Ok(Self {
            config,
            workers: Arc::new(WorkerPool::owned()?),
            transport,
            _response: PhantomData,
        })
    }

    /// Client that runs non-blocking calls on an existing tokio runtime.
    pub fn with_handle(config: ClientConfig, transport: Arc<dyn Transport>, handle: Handle) -> Self {
        Self {
            config,
            workers: Arc::new(WorkerPool::shared(handle)),
            transport,
            _response: PhantomData,
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// A client for another response type and config, sharing this client's
    /// transport and pool.
    pub fn rebind<T>(&self, config: ClientConfig) -> ApiClient<T>
    where
        T: DeserializeOwned + Send + 'static,
    {
        ApiClient {
            config,
            workers: Arc::clone(&self.workers),
            transport: Arc::clone(&self.transport),
            _response: PhantomData,
        }
    }

    /// A client with selected config bindings overridden.
    pub fn reconfigure<F>(&self, overrides: F) -> Result<Self, ClientError>
    where
        F: FnOnce(ClientConfigBuilder) -> ClientConfigBuilder,
    {
        let config = overrides(self.config.to_builder()).build()?;
        Ok(self.rebind(config))
    }

    pub fn get(&self) -> Result<S, ClientError> {
        let response = self.round_trip(HttpMethod::Get)?;
        codec::decode_single(response.body.as_deref())
    }

    pub fn get_list(&self) -> Result<Vec<S>, ClientError> {
        let response = self.round_trip(HttpMethod::Get)?;
        codec::decode_list(response.body.as_deref())
    }

    pub fn post(&self) -> Result<S, ClientError> {
        let response = self.round_trip(HttpMethod::Post)?;
        codec::decode_single(response.body.as_deref())
    }

    pub fn post_list(&self) -> Result<Vec<S>, ClientError> {
        let response = self.round_trip(HttpMethod::Post)?;
        codec::decode_list(response.body.as_deref())
    }

    /// Blocking call decoded into the config's bound response shape.
    pub fn execute(&self, method: HttpMethod) -> Result<Decoded<S>, ClientError> {
        let response = self.round_trip(method)?;
        codec::decode(response.body.as_deref(), self.config.response_shape())
    }

    pub fn get_async<C>(&self, shape: ResponseShape, callback: C) -> JoinHandle<()>
    where
        C: Callback<S>,
    {
        self.execute_async(HttpMethod::Get, shape, callback)
    }

    pub fn post_async<C>(&self, shape: ResponseShape, callback: C) -> JoinHandle<()>
    where
        C: Callback<S>,
    {
        self.execute_async(HttpMethod::Post, shape, callback)
    }

    /// Issue the request on a pooled worker and deliver the outcome to
    /// `callback`. Configuration errors are delivered the same way, without
    /// touching the transport.
    pub fn execute_async<C>(&self, method: HttpMethod, shape: ResponseShape, callback: C) -> JoinHandle<()>
    where
        C: Callback<S>,
    {
        let prepared = self.prepare(method);
        let transport = Arc::clone(&self.transport);
        self.workers.spawn(move || {
            let outcome = prepared
                .and_then(|request| send(transport.as_ref(), &request))
                .and_then(|response| codec::decode(response.body.as_deref(), shape));
            match outcome {
                Ok(value) => callback.on_success(value),
                Err(error) => callback.on_error(error),
            }
        })
    }

    /// Explicitly end the client's scope; equivalent to dropping it.
    pub fn close(self) {}

    fn round_trip(&self, method: HttpMethod) -> Result<HttpResponse, ClientError> {
        let request = self.prepare(method)?;
        send(self.transport.as_ref(), &request)
    }

    /// Build the outgoing request from the bound configuration.
    pub fn prepare(&self, method: HttpMethod) -> Result<HttpRequest, ClientError> {
        let mut headers = Vec::with_capacity(self.config.headers().len() + 2);
        let body = if method.has_body() {
            let payload = self
                .config
                .payload()
                .ok_or_else(|| ClientError::configuration(format!("{method} requires a request payload")))?;
            headers.push(Header::new(CONTENT_TYPE, APPLICATION_JSON));
            Some(payload.to_request_body()?)
        } else {
            None
        };
        headers.extend(self.config.request_headers());

        Ok(HttpRequest {
            method,
            url: self.config.base_uri().to_string(),
            headers,
            body,
        })
    }
}

impl<S> Drop for ApiClient<S> {
    fn drop(&mut self) {
        if Arc::strong_count(&self.workers) == 1 {
            log::debug!("closing client for {}, releasing transport", self.config.base_uri());
        }
    }
}

fn send(transport: &dyn Transport, request: &HttpRequest) -> Result<HttpResponse, ClientError> {
    log::debug!("{} {}", request.method, request.url);
    let response = transport.execute(request)?;
    if !response.is_success() {
        log::warn!("{} {} returned status {}", request.method, request.url, response.status);
    }
    Ok(response)
}
