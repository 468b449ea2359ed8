//! HTTP transport: stateless request/response, "connect" is a `HEAD` probe,
//! and request templates support `{{placeholder}}` substitution via handlebars.

use crate::connection::adapter::Transport;
use async_trait::async_trait;
use handlebars::Handlebars;
use reqwest::{Client, Method};
use serde_json::Value;

pub struct HttpTransport {
    base_url: url::Url,
    client: Client,
}

impl HttpTransport {
    pub fn new(base_url: impl AsRef<str>) -> anyhow::Result<Self> {
        Ok(Self {
            base_url: url::Url::parse(base_url.as_ref())?,
            client: Client::new(),
        })
    }

    /// Renders `{{placeholder}}` tokens in `template` against `context`.
    pub fn render_template(template: &str, context: &Value) -> anyhow::Result<String> {
        let hb = Handlebars::new();
        Ok(hb.render_template(template, context)?)
    }

    pub async fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
    ) -> anyhow::Result<Value> {
        let url = self.base_url.join(path.trim_start_matches('/'))?;
        let mut req = self.client.request(method, url);
        if let Some(body) = body {
            req = req.json(body);
        }
        let response = req.send().await?;
        let status = response.status();
        let body: Value = response.json().await.unwrap_or(Value::Null);
        if !status.is_success() {
            anyhow::bail!("http {status}: {body}");
        }
        Ok(body)
    }

    pub async fn get(&self, path: &str) -> anyhow::Result<Value> {
        self.request(Method::GET, path, None).await
    }

    pub async fn post(&self, path: &str, body: &Value) -> anyhow::Result<Value> {
        self.request(Method::POST, path, Some(body)).await
    }

    pub async fn put(&self, path: &str, body: &Value) -> anyhow::Result<Value> {
        self.request(Method::PUT, path, Some(body)).await
    }

    pub async fn patch(&self, path: &str, body: &Value) -> anyhow::Result<Value> {
        self.request(Method::PATCH, path, Some(body)).await
    }

    pub async fn delete(&self, path: &str) -> anyhow::Result<Value> {
        self.request(Method::DELETE, path, None).await
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn do_connect(&self) -> anyhow::Result<()> {
        let response = self.client.head(self.base_url.clone()).send().await?;
        if !response.status().is_success() && !response.status().is_redirection() {
            anyhow::bail!("probe HEAD {} returned {}", self.base_url, response.status());
        }
        Ok(())
    }

    async fn do_disconnect(&self) -> anyhow::Result<()> {
        // HTTP has no persistent session to tear down.
        Ok(())
    }

    async fn do_send(&self, topic: &str, payload: &Value) -> anyhow::Result<()> {
        self.post(topic, payload).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn renders_placeholder_substitution() {
        let rendered =
            HttpTransport::render_template("hello {{name}}", &json!({"name": "world"})).unwrap();
        assert_eq!(rendered, "hello world");
    }
}
