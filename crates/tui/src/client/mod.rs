use std::time::Duration;

use api_types::{
    ErrorResponse,
    catalogue::{ProductView, UnitView},
    save::{CellUpsert, CellsSave, PriceUpsert, PricesSave, RowUpsert, RowsSave},
    snapshot::SnapshotEntry,
};
use engine::{BackendError, PlanKey, PlanningBackend};
use reqwest::{RequestBuilder, Response, Url};
use serde::{Serialize, de::DeserializeOwned};

use crate::{
    config::EndpointsConfig,
    error::{AppError, Result},
};

#[derive(Debug)]
pub enum ClientError {
    MissingToken,
    InvalidUrl(String),
    Unauthorized,
    Forbidden,
    NotFound,
    Conflict(String),
    Validation(String),
    Server { status: u16, message: String },
    Transport(reqwest::Error),
}

impl ClientError {
    fn from_status(status: u16, body: String) -> Self {
        match status {
            401 => Self::Unauthorized,
            403 => Self::Forbidden,
            404 => Self::NotFound,
            409 => Self::Conflict(body),
            422 => Self::Validation(body),
            _ => Self::Server {
                status,
                message: body,
            },
        }
    }
}

impl From<ClientError> for BackendError {
    fn from(err: ClientError) -> Self {
        match err {
            ClientError::MissingToken => Self::MissingToken,
            ClientError::InvalidUrl(message) => Self::Transport(message),
            ClientError::Unauthorized => Self::Rejected {
                status: 401,
                message: "not authorized, sign in again".to_string(),
            },
            ClientError::Forbidden => Self::Rejected {
                status: 403,
                message: "this plan is not accessible with the current role".to_string(),
            },
            ClientError::NotFound => Self::Rejected {
                status: 404,
                message: "plan or endpoint not found".to_string(),
            },
            ClientError::Conflict(message) => Self::Rejected {
                status: 409,
                message,
            },
            ClientError::Validation(message) => Self::Rejected {
                status: 422,
                message,
            },
            ClientError::Server { status, message } => Self::Rejected { status, message },
            ClientError::Transport(err) if err.is_decode() => Self::Decode(err.to_string()),
            ClientError::Transport(err) => Self::Transport(err.to_string()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Client {
    base_url: Url,
    http: reqwest::Client,
    token: Option<String>,
    endpoints: EndpointsConfig,
}

impl Client {
    pub fn new(base_url: &str, token: Option<String>, endpoints: EndpointsConfig) -> Result<Self> {
        let mut base_url = Url::parse(base_url)
            .map_err(|err| AppError::Invalid(format!("invalid base_url: {err}")))?;
        // Without a trailing slash `join` would replace the last segment.
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }
        let http = reqwest::Client::builder()
            .user_agent(format!("planner_tui/{}", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(30))
            .build()?;
        Ok(Self {
            base_url,
            http,
            token,
            endpoints,
        })
    }

    fn endpoint(&self, path: &str, query: &[(&str, i64)]) -> std::result::Result<Url, ClientError> {
        let mut url = self
            .base_url
            .join(path.trim_start_matches('/'))
            .map_err(|err| ClientError::InvalidUrl(format!("invalid endpoint \"{path}\": {err}")))?;
        if !query.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (name, value) in query {
                pairs.append_pair(name, &value.to_string());
            }
        }
        Ok(url)
    }

    fn authorized(
        &self,
        request: RequestBuilder,
    ) -> std::result::Result<RequestBuilder, ClientError> {
        let token = self
            .token
            .as_deref()
            .filter(|t| !t.is_empty())
            .ok_or(ClientError::MissingToken)?;
        Ok(request.bearer_auth(token))
    }

    async fn get_json<T: DeserializeOwned>(&self, url: Url) -> std::result::Result<T, ClientError> {
        tracing::debug!(%url, "GET");
        let res = self
            .authorized(self.http.get(url))?
            .send()
            .await
            .map_err(ClientError::Transport)?;
        if res.status().is_success() {
            return res.json::<T>().await.map_err(ClientError::Transport);
        }
        Err(error_from(res).await)
    }

    async fn post_json<T: Serialize + ?Sized>(
        &self,
        url: Url,
        body: &T,
    ) -> std::result::Result<(), ClientError> {
        tracing::debug!(%url, "POST");
        let res = self
            .authorized(self.http.post(url))?
            .json(body)
            .send()
            .await
            .map_err(ClientError::Transport)?;
        if res.status().is_success() {
            return Ok(());
        }
        Err(error_from(res).await)
    }

    pub async fn units(&self, branch_id: i64) -> std::result::Result<Vec<UnitView>, ClientError> {
        let url = self.endpoint(&self.endpoints.units, &[("branch_id", branch_id)])?;
        self.get_json(url).await
    }

    pub async fn catalogue(
        &self,
        plan_id: i64,
    ) -> std::result::Result<Vec<ProductView>, ClientError> {
        let url = self.endpoint(&self.endpoints.rows, &[("plan_id", plan_id)])?;
        self.get_json(url).await
    }

    pub async fn snapshot(
        &self,
        key: PlanKey,
    ) -> std::result::Result<Vec<SnapshotEntry>, ClientError> {
        let url = self.endpoint(
            &self.endpoints.snapshot,
            &[("plan_id", key.plan_id), ("branch_id", key.branch_id)],
        )?;
        self.get_json(url).await
    }
}

async fn error_from(res: Response) -> ClientError {
    let status = res.status().as_u16();
    let body = res
        .json::<ErrorResponse>()
        .await
        .map(|err| err.error)
        .unwrap_or_else(|_| "unknown error".to_string());
    tracing::warn!(status, "planning service rejected request: {body}");
    ClientError::from_status(status, body)
}

impl PlanningBackend for Client {
    async fn load_snapshot(
        &self,
        key: PlanKey,
    ) -> std::result::Result<Vec<SnapshotEntry>, BackendError> {
        Ok(self.snapshot(key).await?)
    }

    async fn save_rows(
        &self,
        key: PlanKey,
        rows: Vec<RowUpsert>,
    ) -> std::result::Result<(), BackendError> {
        let url = self.endpoint(&self.endpoints.save, &[])?;
        let payload = RowsSave {
            plan_id: key.plan_id,
            branch_id: key.branch_id,
            rows,
        };
        Ok(self.post_json(url, &payload).await?)
    }

    async fn save_cells(
        &self,
        key: PlanKey,
        cells: Vec<CellUpsert>,
    ) -> std::result::Result<(), BackendError> {
        let url = self.endpoint(&self.endpoints.save, &[])?;
        let payload = CellsSave {
            plan_id: key.plan_id,
            branch_id: key.branch_id,
            cells,
        };
        Ok(self.post_json(url, &payload).await?)
    }

    async fn save_prices(
        &self,
        key: PlanKey,
        prices: Vec<PriceUpsert>,
    ) -> std::result::Result<(), BackendError> {
        let url = self.endpoint(&self.endpoints.prices, &[])?;
        let payload = PricesSave {
            plan_id: key.plan_id,
            prices,
        };
        Ok(self.post_json(url, &payload).await?)
    }
}
