use std::time::Duration;

use serde::{Serialize, de::DeserializeOwned};
use studio_ox_common::{
    BoxStream, Endpoint, MultipartForm, RequestBuilder, RequestConfig, SseParser, StreamOptions,
    StreamPayload,
};

use crate::error::StudioRequestError;

/// Studio client helper methods using the common RequestBuilder
#[derive(Debug, Clone)]
pub struct StudioRequestHelper {
    request_builder: RequestBuilder,
}

impl StudioRequestHelper {
    pub fn new(client: reqwest::Client, api_url: &str, timeout: Duration) -> Self {
        let config = RequestConfig::new(api_url)
            .with_timeout(timeout)
            .with_user_agent(concat!("studio-ox/", env!("CARGO_PKG_VERSION")));

        Self {
            request_builder: RequestBuilder::new(client, config),
        }
    }

    pub fn url(&self, path: &str) -> String {
        self.request_builder.url(path)
    }

    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, StudioRequestError> {
        self.request_builder.request(&Endpoint::get(path)).await
    }

    pub async fn post<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, StudioRequestError> {
        self.send(&Endpoint::post(path), body).await
    }

    pub async fn send<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        endpoint: &Endpoint,
        body: &B,
    ) -> Result<T, StudioRequestError> {
        self.request_builder.request_json(endpoint, Some(body)).await
    }

    pub async fn get_bytes(&self, path: &str) -> Result<bytes::Bytes, StudioRequestError> {
        self.request_builder.request_bytes(&Endpoint::get(path)).await
    }

    pub async fn post_multipart<T: DeserializeOwned>(
        &self,
        path: &str,
        form: MultipartForm,
    ) -> Result<T, StudioRequestError> {
        self.request_builder
            .request_multipart(&Endpoint::post(path), form.build())
            .await
    }

    pub async fn open_stream<B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
        options: StreamOptions,
    ) -> Result<SseParser, StudioRequestError> {
        let body = serde_json::to_value(body)?;
        self.request_builder
            .open_stream(&Endpoint::post(path), Some(body), options)
            .await
    }

    pub fn stream<T, B>(
        &self,
        path: &str,
        body: &B,
        options: StreamOptions,
    ) -> BoxStream<'static, Result<T, StudioRequestError>>
    where
        T: StreamPayload + Send + 'static,
        B: Serialize + ?Sized,
    {
        self.request_builder
            .stream(&Endpoint::post(path), Some(body), options)
    }
}
