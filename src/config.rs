//! Configuration for ocean-pulse
//!
//! CLI arguments and environment variable handling using clap.

use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;

use crate::cache::CacheTtls;
use crate::fishing::{BoundingBox, DateRange, ProtectionLevel, RegionArea};
use crate::gateway::{GatewayConfig, RetryPolicy, Secret, DEFAULT_BASE_URL};
use crate::health::DataServiceConfig;
use crate::logging::LogFormat;
use crate::types::{PulseError, Result};

/// Ocean PULSE - region health from fishing, habitat and species data
#[derive(Parser, Debug, Clone)]
#[command(name = "ocean-pulse")]
#[command(about = "Fishing-activity and composite health scoring for marine protected areas")]
pub struct Args {
    /// Surveillance API configuration
    #[command(flatten)]
    pub gateway: GatewayArgs,

    /// Data service base URL for precomputed health scores (optional)
    #[arg(long, env = "DATA_SERVICE_URL")]
    pub data_service_url: Option<String>,

    /// Client-side timeout for each upstream request
    #[arg(long, env = "REQUEST_TIMEOUT_MS", default_value = "60000")]
    pub request_timeout_ms: u64,

    /// TTL for cached fishing summaries
    #[arg(long, env = "FISHING_CACHE_TTL_SECS", default_value = "86400")]
    pub fishing_cache_ttl_secs: u64,

    /// TTL for cached remote health scores
    #[arg(long, env = "ENVIRONMENTAL_CACHE_TTL_SECS", default_value = "3600")]
    pub environmental_cache_ttl_secs: u64,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// Log format (pretty, json)
    #[arg(long, env = "LOG_FORMAT", default_value = "pretty")]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Command,
}

/// Surveillance API connection
#[derive(Parser, Debug, Clone)]
pub struct GatewayArgs {
    /// Bearer token for the surveillance API
    #[arg(long, env = "GFW_API_TOKEN", hide_env_values = true)]
    pub gfw_api_token: Option<String>,

    /// Surveillance API base URL
    #[arg(long, env = "GFW_BASE_URL", default_value = DEFAULT_BASE_URL)]
    pub gfw_base_url: String,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Print fishing effort, compliance and IUU risk for one region as JSON
    Fishing(FishingArgs),
    /// Print each recomputed composite health score until inputs settle
    Health(HealthArgs),
}

/// Region shape, by bounds or GeoJSON file
#[derive(Parser, Debug, Clone)]
pub struct AreaArgs {
    /// Bounding box as min_lon,min_lat,max_lon,max_lat
    #[arg(long, allow_hyphen_values = true)]
    pub bbox: Option<BoundingBox>,

    /// File holding a GeoJSON Polygon or MultiPolygon geometry
    #[arg(long, value_name = "FILE")]
    pub geometry: Option<PathBuf>,

    /// Protection regime (no_take, partial)
    #[arg(long, default_value = "partial")]
    pub protection: ProtectionLevel,

    /// Year the region was designated
    #[arg(long)]
    pub established_year: Option<i32>,
}

#[derive(Parser, Debug, Clone)]
pub struct FishingArgs {
    /// Region identifier, used as the cache key
    #[arg(long)]
    pub region_id: String,

    #[command(flatten)]
    pub area: AreaArgs,

    /// Report start date (default: one year before end)
    #[arg(long)]
    pub start: Option<NaiveDate>,

    /// Report end date (default: today)
    #[arg(long)]
    pub end: Option<NaiveDate>,
}

#[derive(Parser, Debug, Clone)]
pub struct HealthArgs {
    /// Region identifier
    #[arg(long)]
    pub region_id: String,

    /// Region display name
    #[arg(long)]
    pub name: String,

    /// Representative latitude
    #[arg(long, allow_hyphen_values = true)]
    pub lat: f64,

    /// Representative longitude
    #[arg(long, allow_hyphen_values = true)]
    pub lon: f64,

    /// Indicator species known for the region
    #[arg(long, default_value = "0")]
    pub indicator_species: u32,

    #[command(flatten)]
    pub area: AreaArgs,
}

impl FishingArgs {
    /// Requested range, defaulting to the trailing year
    pub fn date_range(&self, today: NaiveDate) -> DateRange {
        let end = self.end.unwrap_or(today);
        match self.start {
            Some(start) => DateRange::new(start, end),
            None => DateRange::trailing_year(end),
        }
    }
}

impl Args {
    pub fn gateway_config(&self) -> GatewayConfig {
        GatewayConfig {
            base_url: self.gateway.gfw_base_url.clone(),
            token: self.gateway.gfw_api_token.as_deref().map(Secret::new),
            timeout: self.request_timeout(),
            retry: RetryPolicy::default(),
        }
    }

    pub fn data_service_config(&self) -> Option<DataServiceConfig> {
        self.data_service_url.as_ref().map(|url| DataServiceConfig {
            base_url: url.clone(),
            request_timeout: self.request_timeout(),
        })
    }

    pub fn cache_ttls(&self) -> CacheTtls {
        CacheTtls {
            fishing: Duration::from_secs(self.fishing_cache_ttl_secs),
            environmental: Duration::from_secs(self.environmental_cache_ttl_secs),
            ..CacheTtls::default()
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn has_gfw_token(&self) -> bool {
        self.gateway
            .gfw_api_token
            .as_deref()
            .is_some_and(|t| !t.trim().is_empty())
    }

    /// Validate configuration
    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.request_timeout_ms == 0 {
            return Err("REQUEST_TIMEOUT_MS must be greater than zero".to_string());
        }
        if self.fishing_cache_ttl_secs == 0 || self.environmental_cache_ttl_secs == 0 {
            return Err("cache TTLs must be greater than zero".to_string());
        }

        match &self.command {
            Command::Fishing(fishing) => {
                if !self.has_gfw_token() {
                    return Err("GFW_API_TOKEN is required for the fishing command".to_string());
                }
                fishing.area.validate(true)?;
                if let (Some(start), Some(end)) = (fishing.start, fishing.end) {
                    if start > end {
                        return Err("--start must not be after --end".to_string());
                    }
                }
            }
            Command::Health(health) => {
                if !(-90.0..=90.0).contains(&health.lat) {
                    return Err("--lat must be between -90 and 90".to_string());
                }
                if !(-180.0..=180.0).contains(&health.lon) {
                    return Err("--lon must be between -180 and 180".to_string());
                }
                health.area.validate(false)?;
            }
        }

        Ok(())
    }
}

impl AreaArgs {
    pub fn has_area(&self) -> bool {
        self.bbox.is_some() || self.geometry.is_some()
    }

    fn validate(&self, required: bool) -> std::result::Result<(), String> {
        if self.bbox.is_some() && self.geometry.is_some() {
            return Err("use either --bbox or --geometry, not both".to_string());
        }
        if required && !self.has_area() {
            return Err("--bbox or --geometry is required".to_string());
        }
        Ok(())
    }

    /// Resolve the region shape; a GeoJSON Feature is unwrapped to its geometry
    pub fn load_area(&self) -> Result<Option<RegionArea>> {
        if let Some(bbox) = self.bbox {
            return Ok(Some(RegionArea::Bounds(bbox)));
        }
        let Some(path) = &self.geometry else {
            return Ok(None);
        };

        let raw = std::fs::read_to_string(path).map_err(|e| {
            PulseError::Config(format!("failed to read geometry file {}: {}", path.display(), e))
        })?;
        let mut value: serde_json::Value = serde_json::from_str(&raw)?;

        if value.get("type").and_then(|t| t.as_str()) == Some("Feature") {
            value = value
                .get_mut("geometry")
                .filter(|g| !g.is_null())
                .map(serde_json::Value::take)
                .ok_or_else(|| PulseError::Config(format!("{} holds a Feature without geometry", path.display())))?;
        }
        Ok(Some(RegionArea::Geometry(value)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn area_file(contents: &str) -> PathBuf {
        let path = std::env::temp_dir().join(format!("ocean-pulse-{}.geojson", uuid::Uuid::new_v4()));
        std::fs::write(&path, contents).unwrap();
        path
    }

    fn area(geometry: Option<PathBuf>) -> AreaArgs {
        AreaArgs {
            bbox: None,
            geometry,
            protection: ProtectionLevel::Partial,
            established_year: None,
        }
    }

    #[test]
    fn test_load_area_unwraps_feature() {
        let path = area_file(
            r#"{"type":"Feature","properties":{},"geometry":{"type":"Polygon","coordinates":[[[0,0],[1,0],[1,1],[0,0]]]}}"#,
        );
        let loaded = area(Some(path.clone())).load_area().unwrap();
        std::fs::remove_file(path).ok();

        let Some(RegionArea::Geometry(geometry)) = loaded else {
            panic!("expected geometry");
        };
        assert_eq!(geometry["type"], "Polygon");
        assert!(area(None).load_area().unwrap().is_none());
    }

    #[test]
    fn test_load_area_errors() {
        let invalid = area_file("{not json");
        let err = area(Some(invalid.clone())).load_area().unwrap_err();
        std::fs::remove_file(invalid).ok();
        assert!(matches!(err, PulseError::Json(_)));

        let empty = area_file(r#"{"type":"Feature","geometry":null}"#);
        let err = area(Some(empty.clone())).load_area().unwrap_err();
        std::fs::remove_file(empty).ok();
        assert!(matches!(err, PulseError::Config(_)));

        let missing = area(Some(PathBuf::from("/nonexistent/ocean-pulse.geojson")));
        assert!(matches!(missing.load_area().unwrap_err(), PulseError::Config(_)));
    }

    fn parse(args: &[&str]) -> Args {
        Args::try_parse_from(std::iter::once("ocean-pulse").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn test_fishing_command_requires_token() {
        let args = parse(&[
            "--gfw-api-token",
            " ",
            "fishing",
            "--region-id",
            "mpa-1",
            "--bbox",
            "-80.5,24.0,-80.0,25.5",
        ]);
        assert!(args.validate().is_err());

        let args = parse(&[
            "--gfw-api-token",
            "abc",
            "fishing",
            "--region-id",
            "mpa-1",
            "--bbox",
            "-80.5,24.0,-80.0,25.5",
            "--protection",
            "no-take",
        ]);
        assert!(args.validate().is_ok());
        let Command::Fishing(fishing) = &args.command else {
            panic!("expected fishing command");
        };
        assert_eq!(fishing.area.protection, ProtectionLevel::NoTake);
        assert_eq!(args.gateway_config().token.unwrap().expose(), "abc");
    }

    #[test]
    fn test_fishing_date_range_defaults_to_trailing_year() {
        let args = parse(&[
            "fishing",
            "--region-id",
            "mpa-1",
            "--bbox",
            "0,0,1,1",
            "--end",
            "2024-06-30",
        ]);
        let Command::Fishing(fishing) = &args.command else {
            panic!("expected fishing command");
        };
        let today = NaiveDate::from_ymd_opt(2025, 1, 1).unwrap();
        assert_eq!(
            fishing.date_range(today),
            DateRange::trailing_year(NaiveDate::from_ymd_opt(2024, 6, 30).unwrap())
        );
    }

    #[test]
    fn test_health_command_bounds() {
        let args = parse(&[
            "health",
            "--region-id",
            "mpa-1",
            "--name",
            "Reef",
            "--lat",
            "95",
            "--lon",
            "10",
        ]);
        assert!(args.validate().is_err());

        let args = parse(&[
            "health",
            "--region-id",
            "mpa-1",
            "--name",
            "Reef",
            "--lat",
            "-12.5",
            "--lon",
            "130",
        ]);
        assert!(args.validate().is_ok());
        assert_eq!(args.cache_ttls().environmental, Duration::from_secs(3600));
        assert!(args.data_service_config().is_none());
    }
}
