//! Attack-layer categories the captured logs are organised by.

use std::fmt;
use std::str::FromStr;

use bitflags::bitflags;

use crate::error::LabelError;

/// Protocol layer an attack scenario targets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Layer {
    Application,
    Network,
    /// Data-link and transport protocol attacks
    DataLink,
    Wireless,
}

impl Layer {
    pub const ALL: [Layer; 4] = [
        Layer::Application,
        Layer::Network,
        Layer::DataLink,
        Layer::Wireless,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Layer::Application => "application",
            Layer::Network => "network",
            Layer::DataLink => "data-link",
            Layer::Wireless => "wireless",
        }
    }
}

impl FromStr for Layer {
    type Err = LabelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace([' ', '_'], "-");
        let normalized = normalized.trim_end_matches("-layer");
        match normalized {
            "application" | "app" => Ok(Layer::Application),
            "network" | "net" => Ok(Layer::Network),
            "data-link" | "datalink" | "transport" | "data-link/transport" | "tp" => {
                Ok(Layer::DataLink)
            }
            "wireless" => Ok(Layer::Wireless),
            _ => Err(LabelError::InvalidParameter(format!("unknown layer '{}'", s))),
        }
    }
}

impl fmt::Display for Layer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

bitflags! {
    /// Set of layers whose rules are applied
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct LayerSet: u8 {
        const APPLICATION = 0x01;
        const NETWORK = 0x02;
        const DATA_LINK = 0x04;
        const WIRELESS = 0x08;
    }
}

impl From<Layer> for LayerSet {
    fn from(layer: Layer) -> Self {
        match layer {
            Layer::Application => LayerSet::APPLICATION,
            Layer::Network => LayerSet::NETWORK,
            Layer::DataLink => LayerSet::DATA_LINK,
            Layer::Wireless => LayerSet::WIRELESS,
        }
    }
}

impl LayerSet {
    pub fn includes(&self, layer: Layer) -> bool {
        self.contains(LayerSet::from(layer))
    }
}

impl Default for LayerSet {
    fn default() -> Self {
        LayerSet::all()
    }
}

impl FromStr for LayerSet {
    type Err = LabelError;

    /// Parses a comma-separated list such as `application,network`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.trim().eq_ignore_ascii_case("all") {
            return Ok(LayerSet::all());
        }
        let mut set = LayerSet::empty();
        for part in s.split(',').filter(|p| !p.trim().is_empty()) {
            set |= LayerSet::from(part.parse::<Layer>()?);
        }
        if set.is_empty() {
            return Err(LabelError::InvalidParameter("empty layer list".into()));
        }
        Ok(set)
    }
}

/// Kind of capture in the dataset collection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DatasetCategory {
    Attack(Layer),
    /// Baseline drive with no injected attacks
    NormalDrive,
}

impl DatasetCategory {
    pub const ALL: [DatasetCategory; 5] = [
        DatasetCategory::Attack(Layer::Application),
        DatasetCategory::Attack(Layer::Network),
        DatasetCategory::Attack(Layer::DataLink),
        DatasetCategory::Attack(Layer::Wireless),
        DatasetCategory::NormalDrive,
    ];

    pub fn is_attack(&self) -> bool {
        matches!(self, DatasetCategory::Attack(_))
    }

    pub fn layer(&self) -> Option<Layer> {
        match self {
            DatasetCategory::Attack(layer) => Some(*layer),
            DatasetCategory::NormalDrive => None,
        }
    }
}

impl fmt::Display for DatasetCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DatasetCategory::Attack(Layer::Application) => write!(f, "Application Layer Attacks"),
            DatasetCategory::Attack(Layer::Network) => write!(f, "Network Layer Attacks"),
            DatasetCategory::Attack(Layer::DataLink) => {
                write!(f, "Data-Link Layer (Transport Protocol) Attacks")
            }
            DatasetCategory::Attack(Layer::Wireless) => write!(f, "Wireless Attacks"),
            DatasetCategory::NormalDrive => write!(f, "Normal Drive"),
        }
    }
}
