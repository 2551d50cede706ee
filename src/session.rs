use std::future::Future;
use std::io::Write;
use std::time::Duration;

use anyhow::Context as _;
use log::{debug, error, info, trace, warn};
use mac_address::MacAddress;
use tokio::time::{Instant, sleep};

use crate::config::{OutputFormat, ShortPayloadPolicy};
use crate::decoder::{decode_weight, format_raw_hex};
use crate::messages::Reading;
use crate::scanner::{Advertisement, AdvertisementScanner};
use crate::stability::StabilityTracker;

#[derive(Debug, Clone, PartialEq)]
pub struct SessionSettings {
    /// Only advertisements from this address are decoded.
    pub target: MacAddress,
    pub weight_offset: usize,
    /// How long the scan runs before stopping on its own.
    pub duration: Duration,
    pub short_payload: ShortPayloadPolicy,
    pub stable_for: Option<Duration>,
    pub format: OutputFormat,
}

/// One bounded scan: start, report readings from the target scale until the
/// duration elapses or `shutdown` fires, then stop.
pub struct Session<S, W> {
    scanner: S,
    settings: SessionSettings,
    out: W,
    stability: Option<StabilityTracker>,
}

impl<S: AdvertisementScanner, W: Write> Session<S, W> {
    pub fn new(scanner: S, settings: SessionSettings, out: W) -> Self {
        let stability = settings.stable_for.map(StabilityTracker::new);
        Session {
            scanner,
            settings,
            out,
            stability,
        }
    }

    pub async fn run<F>(&mut self, shutdown: F) -> anyhow::Result<()>
    where
        F: Future<Output = ()>,
    {
        writeln!(self.out, "Starting BLE scan...")?;
        info!(
            "Scanning for {} for {}s",
            self.settings.target,
            self.settings.duration.as_secs()
        );

        self.scanner.start().await?;

        // Whatever ends the watch, the scanner is stopped exactly once.
        let watched = self.watch(shutdown).await;
        let stopped = self.scanner.stop().await;

        if let Err(err) = writeln!(self.out, "Scan complete.") {
            warn!("Cannot write completion banner: {}", err);
        }

        match (watched, stopped) {
            (Err(err), Err(stop_err)) => {
                error!("{:#}", stop_err);
                Err(err)
            }
            (Err(err), Ok(())) => Err(err),
            (Ok(()), stopped) => stopped,
        }
    }

    async fn watch<F>(&mut self, shutdown: F) -> anyhow::Result<()>
    where
        F: Future<Output = ()>,
    {
        let deadline = sleep(self.settings.duration);
        tokio::pin!(deadline);
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = &mut deadline => {
                    debug!("Scan duration elapsed");
                    return Ok(());
                }
                _ = &mut shutdown => {
                    info!("Scan interrupted");
                    return Ok(());
                }
                advertisement = self.scanner.next_advertisement() => match advertisement {
                    Some(advertisement) => self.handle(advertisement)?,
                    None => {
                        warn!("Advertisement stream ended before the scan duration");
                        return Ok(());
                    }
                }
            }
        }
    }

    fn handle(&mut self, advertisement: Advertisement) -> anyhow::Result<()> {
        let address = advertisement.address;
        if address != self.settings.target {
            trace!("Skipping advertisement from {}", address);
            return Ok(());
        }

        for (&manufacturer_id, raw) in &advertisement.manufacturer_data {
            debug!("{} [{:04X}] {}", address, manufacturer_id, format_raw_hex(raw));

            let weight = match decode_weight(raw, self.settings.weight_offset) {
                Ok(weight) => weight,
                Err(err) => match self.settings.short_payload {
                    ShortPayloadPolicy::Skip => {
                        trace!("Skipping payload from {}: {}", address, err);
                        continue;
                    }
                    ShortPayloadPolicy::Warn => {
                        warn!(
                            "Ignoring payload from {} [{:04X}]: {} ({})",
                            address,
                            manufacturer_id,
                            err,
                            format_raw_hex(raw)
                        );
                        continue;
                    }
                    ShortPayloadPolicy::Fail => {
                        return Err(err).with_context(|| {
                            format!("cannot decode payload from {} [{:04X}]", address, manufacturer_id)
                        });
                    }
                },
            };

            self.emit(&Reading::Weight {
                address,
                manufacturer_id,
                weight,
            })?;

            let settled = self
                .stability
                .as_mut()
                .and_then(|tracker| tracker.observe(weight, Instant::now()));
            if let Some(weight) = settled {
                self.emit(&Reading::Stable { address, weight })?;
            }
        }
        Ok(())
    }

    fn emit(&mut self, reading: &Reading) -> anyhow::Result<()> {
        let line = reading.render(self.settings.format)?;
        writeln!(self.out, "{}", line)?;
        self.out.flush()?;
        Ok(())
    }
}
