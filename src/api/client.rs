use crate::api::session::Session;
use crate::api::traits::ListingQueryService;
use crate::config::ApiConfig;
use crate::error::ApiError;
use crate::models::{Category, Complex, FilterCriteria, ListingSummary};
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{Client, Method, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};
use url::Url;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RefreshRequest {
    refresh_token: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RefreshResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
}

/// REST implementation of [`ListingQueryService`]
pub struct HttpListingService {
    client: Client,
    base_url: Url,
    media_base_url: Url,
    refresh_path: String,
    session: Session,
}

impl HttpListingService {
    pub fn new(config: &ApiConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .user_agent(&config.user_agent)
            .build()
            .context("Failed to create HTTP client")?;

        let base_url = directory_url(&config.base_url)
            .with_context(|| format!("Invalid API base URL '{}'", config.base_url))?;
        let media_base_url = match &config.media_base_url {
            Some(raw) => directory_url(raw)
                .with_context(|| format!("Invalid media base URL '{}'", raw))?,
            None => base_url.clone(),
        };

        Ok(Self {
            client,
            base_url,
            media_base_url,
            refresh_path: config.refresh_path.clone(),
            session: Session::new(config.access_token.clone(), config.refresh_token.clone()),
        })
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    fn endpoint(&self, path: &str) -> Result<Url, ApiError> {
        Ok(self.base_url.join(path.trim_start_matches('/'))?)
    }

    /// Turns a media path from the backend into an absolute URL
    fn resolve_media(&self, path: &str) -> String {
        if Url::parse(path).is_ok() {
            return path.to_string();
        }
        match self.media_base_url.join(path.trim_start_matches('/')) {
            Ok(url) => url.to_string(),
            Err(e) => {
                warn!("Keeping unresolvable media path '{}': {}", path, e);
                path.to_string()
            }
        }
    }

    fn resolve_listings(&self, mut listings: Vec<ListingSummary>) -> Vec<ListingSummary> {
        for listing in &mut listings {
            for image in &mut listing.images {
                *image = self.resolve_media(image);
            }
        }
        listings
    }

    /// Endpoint for `segments`, each percent-encoded as a single path segment
    fn segment_endpoint(&self, segments: &[&str]) -> Result<Url, ApiError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| ApiError::NotABase(self.base_url.to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn send(
        &self,
        method: Method,
        url: &Url,
        body: Option<&Value>,
    ) -> Result<Response, ApiError> {
        let mut request = self.client.request(method, url.clone());
        if let Some(token) = self.session.access_token() {
            request = request.bearer_auth(token);
        }
        if let Some(body) = body {
            request = request.json(body);
        }
        request.send().await.map_err(|source| ApiError::Transport {
            url: url.to_string(),
            source,
        })
    }

    async fn request<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
    ) -> Result<T, ApiError> {
        let url = self.endpoint(path)?;
        self.request_url(method, url, body).await
    }

    /// Sends a request, refreshing the session and retrying once on 401.
    async fn request_url<T: DeserializeOwned>(
        &self,
        method: Method,
        url: Url,
        body: Option<&Value>,
    ) -> Result<T, ApiError> {
        debug!("{} {}", method, url);

        let mut response = self.send(method.clone(), &url, body).await?;
        if response.status() == StatusCode::UNAUTHORIZED {
            if !self.refresh().await? {
                self.session.clear();
                return Err(ApiError::Unauthorized);
            }
            response = self.send(method, &url, body).await?;
            if response.status() == StatusCode::UNAUTHORIZED {
                warn!("Still unauthorized after token refresh");
                self.session.clear();
                return Err(ApiError::Unauthorized);
            }
        }

        let status = response.status();
        if !status.is_success() {
            warn!("{} returned status: {}", url, status);
            return Err(ApiError::Status {
                url: url.to_string(),
                status,
            });
        }

        response.json::<T>().await.map_err(|source| ApiError::Decode {
            url: url.to_string(),
            source,
        })
    }

    /// Exchanges the refresh token for a new access token. Returns `false`
    /// when there is nothing to refresh with or the backend refused.
    async fn refresh(&self) -> Result<bool, ApiError> {
        let Some(refresh_token) = self.session.refresh_token() else {
            return Ok(false);
        };

        let url = self.endpoint(&self.refresh_path)?;
        info!("Access token rejected, refreshing session");
        let response = self
            .client
            .post(url.clone())
            .json(&RefreshRequest { refresh_token })
            .send()
            .await
            .map_err(|source| ApiError::Transport {
                url: url.to_string(),
                source,
            })?;

        if !response.status().is_success() {
            warn!("Token refresh returned status: {}", response.status());
            return Ok(false);
        }

        let tokens: RefreshResponse = response.json().await.map_err(|source| ApiError::Decode {
            url: url.to_string(),
            source,
        })?;
        self.session.update(tokens.access_token, tokens.refresh_token);
        Ok(true)
    }
}

/// Parses `raw` so that relative joins append to its path instead of
/// replacing the last segment.
fn directory_url(raw: &str) -> Result<Url, url::ParseError> {
    if raw.ends_with('/') {
        Url::parse(raw)
    } else {
        Url::parse(&format!("{raw}/"))
    }
}

#[async_trait]
impl ListingQueryService for HttpListingService {
    async fn search(&self, criteria: &FilterCriteria) -> Result<Vec<ListingSummary>> {
        let body = Value::Object(criteria.to_query());
        let listings: Vec<ListingSummary> = self
            .request(Method::POST, "search", Some(&body))
            .await
            .context("Failed to search listings")?;
        debug!("Search matched {} listings", listings.len());
        Ok(self.resolve_listings(listings))
    }

    async fn listings(&self) -> Result<Vec<ListingSummary>> {
        let listings = self
            .request(Method::GET, "flats", None)
            .await
            .context("Failed to fetch listings")?;
        Ok(self.resolve_listings(listings))
    }

    async fn complexes(&self) -> Result<Vec<Complex>> {
        let mut complexes: Vec<Complex> = self
            .request(Method::GET, "homes", None)
            .await
            .context("Failed to fetch complexes")?;
        for complex in &mut complexes {
            for image in &mut complex.images {
                *image = self.resolve_media(image);
            }
        }
        Ok(complexes)
    }

    async fn categories(&self) -> Result<Vec<Category>> {
        let categories = self
            .request(Method::GET, "categories", None)
            .await
            .context("Failed to fetch categories")?;
        Ok(categories)
    }

    async fn listings_in_category(&self, category_id: &str) -> Result<Vec<ListingSummary>> {
        let url = self.segment_endpoint(&["flats", "categories", category_id])?;
        let listings = self
            .request_url(Method::GET, url, None)
            .await
            .with_context(|| format!("Failed to fetch listings of category {category_id}"))?;
        Ok(self.resolve_listings(listings))
    }

    fn is_authenticated(&self) -> bool {
        self.session.is_authenticated()
    }
}
