use crate::config::Settings;
use crate::ingest::error::FetchError;
use crate::ingest::provider::{decode, get_json, join_url, RetryPolicy, TimezoneSource};
use crate::ingest::types::WorldTimeResponse;
use crate::time::offset::{derive_timezone_info, parse_local_datetime, TimezoneInfo};
use anyhow::Result;

const PROVIDER: &str = "world-time";

#[derive(Debug, Clone)]
pub struct WorldTimeClient {
    http: reqwest::Client,
    base_url: String,
    retry: RetryPolicy,
}

impl WorldTimeClient {
    pub fn new(http: reqwest::Client, base_url: impl Into<String>, retry: RetryPolicy) -> Self {
        Self {
            http,
            base_url: base_url.into(),
            retry,
        }
    }

    pub fn from_settings(http: reqwest::Client, settings: &Settings) -> Self {
        Self::new(
            http,
            settings.time_base_url.clone(),
            RetryPolicy::from_settings(settings),
        )
    }

    /// Local datetime string for `zone`, checked to carry a UTC offset.
    async fn local_time_once(&self, zone: &str) -> std::result::Result<String, FetchError> {
        let url = join_url(&self.base_url, &format!("/api/timezone/{zone}"));
        let raw = get_json(&self.http, PROVIDER, &url, &[]).await?;

        if raw.get("datetime").is_none() {
            return Err(FetchError::structural(
                PROVIDER,
                format!("response for {zone} has no `datetime`"),
            ));
        }
        let res: WorldTimeResponse = decode(PROVIDER, raw)?;
        parse_local_datetime(&res.datetime)
            .map_err(|e| FetchError::structural(PROVIDER, format!("{e:#}")))?;
        Ok(res.datetime)
    }

    async fn local_time(&self, zone: &str) -> std::result::Result<String, FetchError> {
        self.retry.run(move || self.local_time_once(zone)).await
    }
}

#[async_trait::async_trait]
impl TimezoneSource for WorldTimeClient {
    fn provider_name(&self) -> &'static str {
        PROVIDER
    }

    async fn fetch_timezone(&self, timezone: &str, reference_zone: &str) -> Result<TimezoneInfo> {
        let local = self.local_time(timezone).await?;
        let reference = self.local_time(reference_zone).await?;
        let info = derive_timezone_info(timezone, &local, reference_zone, &reference)
            .map_err(|e| FetchError::structural(PROVIDER, format!("{e:#}")))?;

        tracing::info!(
            timezone,
            offset_hours = info.offset_hours,
            "timezone resolved"
        );
        Ok(info)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::error::FetchErrorKind;
    use serde_json::json;
    use std::time::Duration;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(server: &MockServer) -> WorldTimeClient {
        WorldTimeClient::new(
            reqwest::Client::new(),
            server.uri(),
            RetryPolicy {
                attempts: 3,
                delay: Duration::from_millis(1),
            },
        )
    }

    async fn mount_zone(server: &MockServer, zone: &str, datetime: &str) {
        Mock::given(method("GET"))
            .and(path(format!("/api/timezone/{zone}")))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "abbreviation": "-",
                "timezone": zone,
                "datetime": datetime,
                "utc_offset": "-",
            })))
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn derives_offset_from_both_zones() {
        let server = MockServer::start().await;
        mount_zone(&server, "Europe/Madrid", "2026-10-18T17:30:12.482193+02:00").await;
        mount_zone(&server, "America/Bogota", "2026-10-18T10:30:12.601877-05:00").await;

        let info = client(&server)
            .fetch_timezone("Europe/Madrid", "America/Bogota")
            .await
            .unwrap();
        assert_eq!(info.timezone, "Europe/Madrid");
        assert_eq!(info.reference_zone, "America/Bogota");
        assert_eq!(info.local_time, "2026-10-18T17:30:12.482193+02:00");
        assert_eq!(info.offset_hours, 7.0);
    }

    #[tokio::test]
    async fn same_zone_has_zero_offset() {
        let server = MockServer::start().await;
        mount_zone(&server, "America/Bogota", "2026-10-18T10:30:12-05:00").await;

        let info = client(&server)
            .fetch_timezone("America/Bogota", "America/Bogota")
            .await
            .unwrap();
        assert_eq!(info.offset_hours, 0.0);
    }

    #[tokio::test]
    async fn unparsable_datetime_is_structural() {
        let server = MockServer::start().await;
        mount_zone(&server, "Europe/Madrid", "half past five").await;

        let err = client(&server)
            .fetch_timezone("Europe/Madrid", "America/Bogota")
            .await
            .unwrap_err();
        let fetch = err.downcast_ref::<FetchError>().unwrap();
        assert_eq!(fetch.kind, FetchErrorKind::Structural);
    }

    #[tokio::test]
    async fn missing_datetime_is_structural_and_not_retried() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/timezone/Europe/Madrid"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"error": "unknown location"})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let err = client(&server)
            .fetch_timezone("Europe/Madrid", "America/Bogota")
            .await
            .unwrap_err();
        let fetch = err.downcast_ref::<FetchError>().unwrap();
        assert_eq!(fetch.kind, FetchErrorKind::Structural);
    }

    #[tokio::test]
    async fn unreachable_reference_zone_exhausts_retries() {
        let server = MockServer::start().await;
        mount_zone(&server, "Europe/Madrid", "2026-10-18T17:30:12+02:00").await;
        Mock::given(method("GET"))
            .and(path("/api/timezone/America/Bogota"))
            .respond_with(ResponseTemplate::new(502))
            .expect(3)
            .mount(&server)
            .await;

        let err = client(&server)
            .fetch_timezone("Europe/Madrid", "America/Bogota")
            .await
            .unwrap_err();
        let fetch = err.downcast_ref::<FetchError>().unwrap();
        assert_eq!(fetch.kind, FetchErrorKind::RetriesExhausted { attempts: 3 });
    }
}
