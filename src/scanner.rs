use std::collections::BTreeMap;
use std::pin::Pin;

use anyhow::{Context as _, anyhow};
use async_trait::async_trait;
use btleplug::api::{Central as _, CentralEvent, Manager as _, Peripheral as _, ScanFilter};
use btleplug::platform::{Adapter, Manager};
use futures::{Stream, StreamExt as _};
use log::{debug, info, trace};
use mac_address::MacAddress;

/// Manufacturer data seen in one advertisement, keyed by company identifier.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Advertisement {
    pub address: MacAddress,
    pub manufacturer_data: BTreeMap<u16, Vec<u8>>,
}

/// The BLE scanning capability a scan session drives.
#[async_trait]
pub trait AdvertisementScanner: Send {
    async fn start(&mut self) -> anyhow::Result<()>;

    async fn stop(&mut self) -> anyhow::Result<()>;

    /// Waits for the next manufacturer-data advertisement. `None` once the
    /// underlying event stream has ended or the scan is not running.
    async fn next_advertisement(&mut self) -> Option<Advertisement>;
}

pub struct BleScanner {
    adapter: Adapter,
    events: Option<Pin<Box<dyn Stream<Item = CentralEvent> + Send>>>,
}

impl BleScanner {
    pub fn new(adapter: Adapter) -> Self {
        BleScanner {
            adapter,
            events: None,
        }
    }

    /// Uses the first Bluetooth adapter the platform reports.
    pub async fn first_adapter() -> anyhow::Result<Self> {
        let manager = Manager::new()
            .await
            .context("failed to open Bluetooth manager")?;
        let adapter = manager
            .adapters()
            .await
            .context("failed to list Bluetooth adapters")?
            .into_iter()
            .next()
            .ok_or_else(|| anyhow!("no Bluetooth adapter found"))?;

        if let Ok(info) = adapter.adapter_info().await {
            info!("Using Bluetooth adapter {}", info);
        }
        Ok(BleScanner::new(adapter))
    }
}

#[async_trait]
impl AdvertisementScanner for BleScanner {
    async fn start(&mut self) -> anyhow::Result<()> {
        let events = self
            .adapter
            .events()
            .await
            .context("failed to subscribe to adapter events")?;
        self.adapter
            .start_scan(ScanFilter::default())
            .await
            .context("failed to start BLE scan")?;
        self.events = Some(events);
        Ok(())
    }

    async fn stop(&mut self) -> anyhow::Result<()> {
        self.events = None;
        self.adapter
            .stop_scan()
            .await
            .context("failed to stop BLE scan")
    }

    async fn next_advertisement(&mut self) -> Option<Advertisement> {
        let events = self.events.as_mut()?;
        loop {
            match events.next().await? {
                CentralEvent::ManufacturerDataAdvertisement {
                    id,
                    manufacturer_data,
                } => {
                    let peripheral = match self.adapter.peripheral(&id).await {
                        Ok(peripheral) => peripheral,
                        Err(err) => {
                            debug!("Dropping advertisement from unknown peripheral {:?}: {}", id, err);
                            continue;
                        }
                    };
                    return Some(Advertisement {
                        address: MacAddress::new(peripheral.address().into_inner()),
                        manufacturer_data: manufacturer_data.into_iter().collect(),
                    });
                }
                event => trace!("Ignoring event {:?}", event),
            }
        }
    }
}
