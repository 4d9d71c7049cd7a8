//! # Region Classifier
//!
//! Coarse place naming without an external geocoding service.
//!
//! A [`Gazetteer`] holds a priority-ordered list of circular named regions and
//! a set of latitude bands used as a fallback. Classification is
//! first-match-wins over the ordered list, so smaller regions must be listed
//! before the larger regions that contain them. Points outside every region
//! fall through to the bands, which always produce a name.
//!
//! The gazetteer is plain data: deployments for other areas can load their
//! own from JSON with [`Gazetteer::from_json`]. The built-in default covers
//! Israel.
//!
//! ```rust
//! use location_analytics::{classify_region, Gazetteer};
//!
//! assert_eq!(classify_region(32.7940, 34.9896), "Haifa");
//! assert_eq!(classify_region(33.5, 35.0), "Northern Border");
//!
//! let custom = Gazetteer::from_json(r#"{
//!     "regions": [{"name": "Null Island", "latitude": 0.0, "longitude": 0.0, "radius_m": 1000.0}],
//!     "fallback": {"bands": [{"min_latitude": 0.0, "name": "North"}], "default_name": "South"}
//! }"#).unwrap();
//! assert_eq!(custom.classify(0.001, 0.001), "Null Island");
//! assert_eq!(custom.classify(-10.0, 5.0), "South");
//! ```

use log::debug;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

use crate::error::{AnalyticsError, Result};
use crate::geo_utils::distance_meters;

/// A circular named area.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NamedRegion {
    pub name: String,
    pub latitude: f64,
    pub longitude: f64,
    /// Inclusive radius in meters
    pub radius_m: f64,
}

impl NamedRegion {
    pub fn new(name: impl Into<String>, latitude: f64, longitude: f64, radius_m: f64) -> Self {
        Self {
            name: name.into(),
            latitude,
            longitude,
            radius_m,
        }
    }

    /// True when the point lies within `radius_m` of the region center.
    #[inline]
    pub fn contains(&self, latitude: f64, longitude: f64) -> bool {
        distance_meters(self.latitude, self.longitude, latitude, longitude) <= self.radius_m
    }
}

/// Optional east/west split of a latitude band.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LongitudeSplit {
    /// Points with longitude <= this value take `west_name`
    pub max_longitude: f64,
    pub west_name: String,
    pub east_name: String,
}

/// One step of the fallback chain: every point with latitude >= `min_latitude`
/// not claimed by an earlier band.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LatitudeBand {
    pub min_latitude: f64,
    /// Name used when the band has no split
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub split: Option<LongitudeSplit>,
}

impl LatitudeBand {
    pub fn new(min_latitude: f64, name: impl Into<String>) -> Self {
        Self {
            min_latitude,
            name: name.into(),
            split: None,
        }
    }

    pub fn split(
        min_latitude: f64,
        max_longitude: f64,
        west_name: impl Into<String>,
        east_name: impl Into<String>,
    ) -> Self {
        Self {
            min_latitude,
            name: String::new(),
            split: Some(LongitudeSplit {
                max_longitude,
                west_name: west_name.into(),
                east_name: east_name.into(),
            }),
        }
    }

    fn label(&self, longitude: f64) -> &str {
        match &self.split {
            Some(split) if longitude <= split.max_longitude => split.west_name.as_str(),
            Some(split) => split.east_name.as_str(),
            None => self.name.as_str(),
        }
    }
}

/// Exhaustive fallback partition: bands ordered by strictly descending
/// `min_latitude`, then `default_name` for everything south of the last band.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegionBands {
    pub bands: Vec<LatitudeBand>,
    pub default_name: String,
}

impl RegionBands {
    /// Name for a point outside every gazetteer region. Never empty for a
    /// validated configuration.
    pub fn label(&self, latitude: f64, longitude: f64) -> &str {
        self.bands
            .iter()
            .find(|band| latitude >= band.min_latitude)
            .map(|band| band.label(longitude))
            .unwrap_or(self.default_name.as_str())
    }
}

/// Priority-ordered named regions plus a total fallback.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Gazetteer {
    pub regions: Vec<NamedRegion>,
    pub fallback: RegionBands,
}

impl Gazetteer {
    /// Build a gazetteer, rejecting data that could yield an empty name or an
    /// overlapping band chain.
    pub fn new(regions: Vec<NamedRegion>, fallback: RegionBands) -> Result<Self> {
        let gazetteer = Self { regions, fallback };
        gazetteer.validate()?;
        Ok(gazetteer)
    }

    /// Parse and validate a gazetteer from JSON.
    pub fn from_json(json: &str) -> Result<Self> {
        let gazetteer: Gazetteer = serde_json::from_str(json)?;
        gazetteer.validate()?;
        debug!(
            "[Regions] Loaded gazetteer: {} regions, {} fallback bands",
            gazetteer.regions.len(),
            gazetteer.fallback.bands.len()
        );
        Ok(gazetteer)
    }

    /// Serialize to JSON.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Check names, radii and band ordering.
    pub fn validate(&self) -> Result<()> {
        for region in &self.regions {
            if region.name.is_empty() {
                return Err(invalid("region with empty name"));
            }
            let center_ok = region.latitude.is_finite()
                && region.longitude.is_finite()
                && (-90.0..=90.0).contains(&region.latitude)
                && (-180.0..=180.0).contains(&region.longitude);
            if !center_ok {
                return Err(invalid(format!("region '{}' has an invalid center", region.name)));
            }
            if !(region.radius_m.is_finite() && region.radius_m > 0.0) {
                return Err(invalid(format!(
                    "region '{}' has radius {}",
                    region.name, region.radius_m
                )));
            }
        }

        if self.fallback.default_name.is_empty() {
            return Err(invalid("fallback default name is empty"));
        }

        let mut previous = f64::INFINITY;
        for band in &self.fallback.bands {
            if !band.min_latitude.is_finite() || band.min_latitude >= previous {
                return Err(invalid(format!(
                    "band thresholds must be finite and strictly descending (got {} after {})",
                    band.min_latitude, previous
                )));
            }
            previous = band.min_latitude;

            let names_ok = match &band.split {
                Some(split) => {
                    split.max_longitude.is_finite()
                        && !split.west_name.is_empty()
                        && !split.east_name.is_empty()
                }
                None => !band.name.is_empty(),
            };
            if !names_ok {
                return Err(invalid(format!(
                    "band at latitude {} has an empty name",
                    band.min_latitude
                )));
            }
        }

        Ok(())
    }

    /// Name of the first listed region containing the point, or the fallback
    /// band label.
    ///
    /// Non-finite coordinates skip both lookups and get the fallback default
    /// name, which is not a real classification.
    pub fn classify(&self, latitude: f64, longitude: f64) -> &str {
        if !(latitude.is_finite() && longitude.is_finite()) {
            return self.fallback.default_name.as_str();
        }
        self.regions
            .iter()
            .find(|region| region.contains(latitude, longitude))
            .map(|region| region.name.as_str())
            .unwrap_or_else(|| self.fallback.label(latitude, longitude))
    }

    /// First listed region containing the point, without fallback.
    pub fn region_at(&self, latitude: f64, longitude: f64) -> Option<&NamedRegion> {
        self.regions
            .iter()
            .find(|region| region.contains(latitude, longitude))
    }

    /// Built-in Israeli gazetteer.
    ///
    /// Small towns come first, then medium cities, then the large metro areas
    /// and finally broad geographic regions.
    pub fn israel() -> Self {
        let regions = ISRAEL_REGIONS
            .iter()
            .map(|&(name, lat, lon, radius)| NamedRegion::new(name, lat, lon, radius))
            .collect();

        let fallback = RegionBands {
            bands: vec![
                LatitudeBand::new(33.0, "Northern Border"),
                LatitudeBand::new(32.5, "Upper Galilee"),
                LatitudeBand::split(32.0, 35.0, "Central Coast", "Lower Galilee"),
                LatitudeBand::split(31.5, 34.8, "Central Plain", "West Bank"),
                LatitudeBand::split(31.0, 34.7, "Southern Coast", "Judean Hills"),
                LatitudeBand::new(30.0, "Northern Negev"),
            ],
            default_name: "Southern Desert".to_string(),
        };

        Self { regions, fallback }
    }

    /// Shared default gazetteer.
    pub fn default_ref() -> &'static Gazetteer {
        &DEFAULT_GAZETTEER
    }
}

impl Default for Gazetteer {
    fn default() -> Self {
        Self::israel()
    }
}

fn invalid(message: impl Into<String>) -> AnalyticsError {
    AnalyticsError::InvalidGazetteer {
        message: message.into(),
    }
}

static DEFAULT_GAZETTEER: Lazy<Gazetteer> = Lazy::new(Gazetteer::israel);

/// Classify a coordinate with the default gazetteer.
///
/// Total: any pair of finite coordinates yields a non-empty name. NaN or
/// infinite input yields the fallback default ("Southern Desert" for the
/// built-in table); validate samples first to tell the two apart.
pub fn classify_region(latitude: f64, longitude: f64) -> String {
    DEFAULT_GAZETTEER.classify(latitude, longitude).to_string()
}

// (name, latitude, longitude, radius in meters), most specific first
const ISRAEL_REGIONS: &[(&str, f64, f64, f64)] = &[
    ("Caesarea", 32.5016, 34.8933, 4000.0),
    ("Herzliya", 32.1624, 34.8441, 5000.0),
    ("Ramat Gan", 32.0823, 34.8140, 4000.0),
    ("Bnei Brak", 32.0808, 34.8338, 3500.0),
    ("Holon", 32.0167, 34.7667, 4000.0),
    ("Petah Tikva", 32.0878, 34.8878, 5000.0),
    ("Maaleh Adumim", 31.7730, 35.2954, 4000.0),
    ("Metula", 33.2824, 35.5691, 3000.0),
    ("Ein Gedi", 31.4619, 35.3888, 4000.0),
    ("Sderot", 31.5240, 34.5965, 4000.0),
    ("Umm al-Fahm", 32.5189, 35.1522, 4000.0),
    ("Netanya", 32.3226, 34.8533, 6000.0),
    ("Hadera", 32.4341, 34.9191, 5000.0),
    ("Nahariya", 33.0073, 35.0950, 5000.0),
    ("Acre", 32.9234, 35.0818, 5000.0),
    ("Ashkelon", 31.6688, 34.5742, 7000.0),
    ("Ashdod", 31.8040, 34.6550, 8000.0),
    ("Kiryat Gat", 31.6100, 34.7642, 5000.0),
    ("Bethlehem", 31.7054, 35.2024, 5000.0),
    ("Ramallah", 31.8996, 35.2042, 6000.0),
    ("Hebron", 31.5326, 35.0998, 6000.0),
    ("Kiryat Shmona", 33.2072, 35.5695, 5000.0),
    ("Safed", 32.9647, 35.4950, 5000.0),
    ("Tiberias", 32.7940, 35.5300, 6000.0),
    ("Afula", 32.6044, 35.2897, 6000.0),
    ("Nazareth", 32.7018, 35.2985, 6000.0),
    ("Jenin", 32.4615, 35.2969, 5000.0),
    ("Beit Shean", 32.4969, 35.4997, 5000.0),
    ("Arad", 31.2587, 35.2137, 5000.0),
    ("Dimona", 31.0686, 35.0299, 5000.0),
    ("Mitzpe Ramon", 30.6103, 34.8011, 5000.0),
    ("Gaza", 31.5017, 34.4668, 6000.0),
    ("Jericho", 31.8607, 35.4444, 5000.0),
    ("Jordan Valley", 32.2000, 35.5500, 8000.0),
    ("Tel Aviv", 32.0853, 34.7818, 8000.0),
    ("Jerusalem", 31.7683, 35.2137, 12000.0),
    ("Haifa", 32.7940, 34.9896, 10000.0),
    ("Beer Sheva", 31.2530, 34.7915, 10000.0),
    ("Eilat", 29.5577, 34.9519, 8000.0),
    ("Dead Sea Region", 31.3000, 35.4500, 15000.0),
    ("Golan Heights", 32.9000, 35.7500, 12000.0),
    ("Negev Desert", 30.5000, 34.8000, 25000.0),
];
