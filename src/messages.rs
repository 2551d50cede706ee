use mac_address::MacAddress;
use serde_derive::Serialize;

use crate::config::OutputFormat;
use crate::decoder::Weight;

#[derive(Clone, Debug, PartialEq)]
pub enum Reading {
    /// A weight decoded from a single advertisement.
    Weight {
        address: MacAddress,
        manufacturer_id: u16,
        weight: Weight,
    },
    /// A weight that has stopped changing.
    Stable { address: MacAddress, weight: Weight },
}

#[derive(Debug, Serialize)]
struct ReadingJson {
    address: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    manufacturer_id: Option<u16>,
    weight_kg: f64,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    stable: bool,
}

impl Reading {
    pub fn render(&self, format: OutputFormat) -> Result<String, serde_json::Error> {
        match format {
            OutputFormat::Text => Ok(match self {
                Reading::Weight { weight, .. } => weight.to_string(),
                Reading::Stable { weight, .. } => format!("Stable weight detected: {}", weight),
            }),
            OutputFormat::Json => serde_json::to_string(&self.to_json()),
        }
    }

    fn to_json(&self) -> ReadingJson {
        match self {
            Reading::Weight {
                address,
                manufacturer_id,
                weight,
            } => ReadingJson {
                address: address.to_string(),
                manufacturer_id: Some(*manufacturer_id),
                weight_kg: weight.kilograms(),
                stable: false,
            },
            Reading::Stable { address, weight } => ReadingJson {
                address: address.to_string(),
                manufacturer_id: None,
                weight_kg: weight.kilograms(),
                stable: true,
            },
        }
    }
}
