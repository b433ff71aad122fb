//! Caller attribution for log rows.

use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

const UNKNOWN: &str = "Unknown";
const LOOKUP_TIMEOUT: Duration = Duration::from_secs(3);

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeoLookup {
    #[serde(default)]
    region_name: Option<String>,
    #[serde(default)]
    country: Option<String>,
}

/// Turns a caller address into the `sender` column value.
///
/// Without a lookup URL the address is used as is; with one it becomes
/// `ip-region-country`, where parts the lookup could not supply read `Unknown`.
#[derive(Clone)]
pub struct SenderResolver {
    client: Client,
    lookup_url: Option<String>,
}

impl SenderResolver {
    pub fn new(lookup_url: Option<String>) -> Self {
        Self {
            client: Client::new(),
            lookup_url: lookup_url.map(|u| u.trim_end_matches('/').to_string()),
        }
    }

    pub async fn resolve(&self, ip: &str) -> String {
        let Some(base) = &self.lookup_url else {
            return ip.to_string();
        };

        let lookup = match self
            .client
            .get(format!("{}/{}", base, ip))
            .timeout(LOOKUP_TIMEOUT)
            .send()
            .await
        {
            Ok(response) => response.json::<GeoLookup>().await.ok(),
            Err(e) => {
                debug!(error = %e, ip = %ip, "Geo lookup failed");
                None
            }
        };

        let (region, country) = lookup
            .map(|l| (l.region_name, l.country))
            .unwrap_or((None, None));

        format!(
            "{}-{}-{}",
            ip,
            region.as_deref().unwrap_or(UNKNOWN),
            country.as_deref().unwrap_or(UNKNOWN)
        )
    }
}
