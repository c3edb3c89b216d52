use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest::multipart::{Form, Part};
use tracing::debug;

use crate::error::{ProtocolError, ProtocolResult};
use crate::transport::{FormValue, Headers, NetResponse, NetworkProvider, RequestBody};

/// [`NetworkProvider`] over HTTP using `reqwest`.
#[derive(Clone, Debug, Default)]
pub struct HttpNetwork {
    client: reqwest::Client,
}

impl HttpNetwork {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }

    async fn send(&self, req: reqwest::RequestBuilder, headers: &Headers) -> ProtocolResult<NetResponse> {
        let mut req = req;
        for (name, value) in headers {
            req = req.header(name.as_str(), value.as_str());
        }
        let resp = req
            .send()
            .await
            .map_err(|e| ProtocolError::Network(e.to_string()))?;
        let status = resp.status().as_u16();
        let data = resp
            .bytes()
            .await
            .map_err(|e| ProtocolError::Network(e.to_string()))?;
        Ok(NetResponse { status, data })
    }
}

#[async_trait]
impl NetworkProvider for HttpNetwork {
    async fn get(&self, url: &str, headers: &Headers) -> ProtocolResult<NetResponse> {
        debug!(url, "GET");
        self.send(self.client.get(url), headers).await
    }

    async fn post(
        &self,
        url: &str,
        headers: &Headers,
        body: RequestBody,
    ) -> ProtocolResult<NetResponse> {
        debug!(url, "POST");
        let req = self.client.post(url);
        let req = match body {
            RequestBody::Empty => req,
            RequestBody::Json(json) => req.header(CONTENT_TYPE, "application/json").body(json),
            RequestBody::Form(fields) => {
                let mut form = Form::new();
                for field in fields {
                    form = match field.value {
                        FormValue::Text(text) => form.text(field.name, text),
                        FormValue::Bytes(bytes) => {
                            let part = Part::bytes(bytes).file_name(field.name.clone());
                            form.part(field.name, part)
                        }
                    };
                }
                req.multipart(form)
            }
        };
        self.send(req, headers).await
    }
}
