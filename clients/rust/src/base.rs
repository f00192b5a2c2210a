use reqwest::{Client, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;

pub(crate) struct BaseClient {
    client: Client,
    address: String,
}

#[derive(Debug)]
pub enum APIErrorVariant {
    Network,
    MalformedResponse,
    UnexpectedStatusCode,
}

#[derive(Debug)]
pub struct APIError {
    pub variant: APIErrorVariant,
    pub message: String,
}

pub type APIResponse<T> = Result<T, APIError>;

impl BaseClient {
    pub fn new(address: String) -> Self {
        let address = address.trim_end_matches('/').to_string();
        Self {
            client: Client::new(),
            address: format!("{}/api/v1", address),
        }
    }

    fn get_client(&self, path: &str) -> RequestBuilder {
        self.client.get(format!("{}/{}", self.address, path))
    }

    async fn handle_api_response<T: DeserializeOwned>(
        &self,
        res: reqwest::Response,
        expected_status_code: StatusCode,
    ) -> APIResponse<T> {
        let status = res.status();
        if status != expected_status_code {
            return Err(APIError {
                variant: APIErrorVariant::UnexpectedStatusCode,
                message: res.text().await.unwrap_or_else(|_| status.to_string()),
            });
        }

        res.json::<T>().await.map_err(|e| APIError {
            variant: APIErrorVariant::MalformedResponse,
            message: e.to_string(),
        })
    }

    pub async fn get<T: DeserializeOwned>(
        &self,
        path: String,
        expected_status_code: StatusCode,
    ) -> APIResponse<T> {
        let res = self
            .get_client(&path)
            .send()
            .await
            .map_err(|e| APIError {
                variant: APIErrorVariant::Network,
                message: e.to_string(),
            })?;
        self.handle_api_response(res, expected_status_code).await
    }
}
