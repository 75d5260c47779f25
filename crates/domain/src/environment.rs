//! Environmental snapshot — boolean attributes derived from an area's sensors.
//!
//! Only *crossings* of these attributes matter to the rule engine: a change
//! from 40 lux to 30 lux while already dark is not an event, a change from
//! 60 lux to 40 lux (bright enough → dark) is.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Sensor domain that feeds environmental readings.
pub const SENSOR_DOMAIN: &str = "sensor";

/// A boolean environmental attribute of an area.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnvironmentalAttribute {
    IsDark,
    IsBright,
    IsHumid,
    IsHot,
    IsCold,
}

impl EnvironmentalAttribute {
    /// Sensor device class the attribute is derived from.
    #[must_use]
    pub fn source(self) -> Quantity {
        match self {
            Self::IsDark | Self::IsBright => Quantity::Illuminance,
            Self::IsHumid => Quantity::Humidity,
            Self::IsHot | Self::IsCold => Quantity::Temperature,
        }
    }
}

impl std::fmt::Display for EnvironmentalAttribute {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::IsDark => "is_dark",
            Self::IsBright => "is_bright",
            Self::IsHumid => "is_humid",
            Self::IsHot => "is_hot",
            Self::IsCold => "is_cold",
        })
    }
}

/// A measured physical quantity, identified by sensor device class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Quantity {
    Illuminance,
    Humidity,
    Temperature,
}

impl Quantity {
    pub const ALL: [Self; 3] = [Self::Illuminance, Self::Humidity, Self::Temperature];

    /// The device class sensors report for this quantity.
    #[must_use]
    pub fn device_class(self) -> &'static str {
        match self {
            Self::Illuminance => "illuminance",
            Self::Humidity => "humidity",
            Self::Temperature => "temperature",
        }
    }

    /// Map a device class back to a quantity.
    #[must_use]
    pub fn from_device_class(device_class: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|q| q.device_class().eq_ignore_ascii_case(device_class))
    }
}

/// Thresholds turning readings into boolean attributes.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnvironmentalThresholds {
    /// Below this illuminance (lx) the area is dark.
    pub dark_lux: f64,
    /// At or above this illuminance (lx) the area is bright.
    pub bright_lux: f64,
    /// At or above this relative humidity (%) the area is humid.
    pub humid_percent: f64,
    /// At or above this temperature (°C) the area is hot.
    pub hot_celsius: f64,
    /// At or below this temperature (°C) the area is cold.
    pub cold_celsius: f64,
}

impl Default for EnvironmentalThresholds {
    fn default() -> Self {
        Self {
            dark_lux: 50.0,
            bright_lux: 500.0,
            humid_percent: 70.0,
            hot_celsius: 26.0,
            cold_celsius: 16.0,
        }
    }
}

/// Averaged sensor readings for one area.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct EnvironmentalReadings {
    pub illuminance: Option<f64>,
    pub humidity: Option<f64>,
    pub temperature: Option<f64>,
}

impl EnvironmentalReadings {
    /// Average every valid reading per quantity.
    #[must_use]
    pub fn average<I>(samples: I) -> Self
    where
        I: IntoIterator<Item = (Quantity, f64)>,
    {
        let mut sums: [(f64, u32); 3] = [(0.0, 0); 3];
        for (quantity, value) in samples {
            if !value.is_finite() {
                continue;
            }
            let slot = &mut sums[quantity as usize];
            slot.0 += value;
            slot.1 += 1;
        }
        let mean = |(sum, n): (f64, u32)| (n > 0).then(|| sum / f64::from(n));
        Self {
            illuminance: mean(sums[Quantity::Illuminance as usize]),
            humidity: mean(sums[Quantity::Humidity as usize]),
            temperature: mean(sums[Quantity::Temperature as usize]),
        }
    }
}

/// Cached boolean attributes of an area.
///
/// Attributes whose source quantity has no reading are absent, not false.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct EnvironmentalSnapshot {
    attributes: BTreeMap<EnvironmentalAttribute, bool>,
}

impl EnvironmentalSnapshot {
    /// Derive a snapshot from readings.
    #[must_use]
    pub fn derive(readings: &EnvironmentalReadings, thresholds: &EnvironmentalThresholds) -> Self {
        let mut attributes = BTreeMap::new();
        if let Some(lux) = readings.illuminance {
            attributes.insert(EnvironmentalAttribute::IsDark, lux < thresholds.dark_lux);
            attributes.insert(EnvironmentalAttribute::IsBright, lux >= thresholds.bright_lux);
        }
        if let Some(humidity) = readings.humidity {
            attributes.insert(
                EnvironmentalAttribute::IsHumid,
                humidity >= thresholds.humid_percent,
            );
        }
        if let Some(celsius) = readings.temperature {
            attributes.insert(EnvironmentalAttribute::IsHot, celsius >= thresholds.hot_celsius);
            attributes.insert(EnvironmentalAttribute::IsCold, celsius <= thresholds.cold_celsius);
        }
        Self { attributes }
    }

    /// Build a snapshot from explicit attribute values.
    #[must_use]
    pub fn from_attributes<I>(attributes: I) -> Self
    where
        I: IntoIterator<Item = (EnvironmentalAttribute, bool)>,
    {
        Self {
            attributes: attributes.into_iter().collect(),
        }
    }

    /// The value of `attribute`, if known.
    #[must_use]
    pub fn get(&self, attribute: EnvironmentalAttribute) -> Option<bool> {
        self.attributes.get(&attribute).copied()
    }

    /// Whether no attribute is known.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty()
    }

    /// Attributes known in both snapshots whose value flipped.
    #[must_use]
    pub fn crossings(&self, previous: &Self) -> Vec<Crossing> {
        self.attributes
            .iter()
            .filter_map(|(attribute, &now)| {
                let before = previous.get(*attribute)?;
                (before != now).then_some(Crossing {
                    attribute: *attribute,
                    value: now,
                })
            })
            .collect()
    }
}

/// A boolean attribute that crossed its boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Crossing {
    pub attribute: EnvironmentalAttribute,
    /// The new value.
    pub value: bool,
}
