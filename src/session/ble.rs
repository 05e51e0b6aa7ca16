//! # BLE Peripheral Session
//!
//! [`PeripheralLink`] over btleplug.
//!
//! btleplug is async; the session owns a small tokio runtime and blocks on
//! it so the acquisition thread sees plain blocking calls. The runtime is
//! private to the session and is never shared with the consumer side.

use async_trait::async_trait;
use btleplug::api::{
    BDAddr, Central, CharPropFlags, Manager as _, Peripheral as _, ScanFilter, ValueNotification,
};
use btleplug::platform::{Adapter, Manager, Peripheral};
use futures::stream::{Stream, StreamExt};
use std::pin::Pin;
use std::str::FromStr;
use std::time::Duration;
use tokio::runtime::Runtime;
use tokio::time::Instant;
use tracing::{debug, info, trace, warn};
use uuid::Uuid;

use super::link::{LinkEvent, PeripheralLink};
use crate::config::DeviceConfig;
use crate::error::{Result, TelemetryError};
use crate::frame::protocol::{DataCharacteristic, CCCD_UUID, NOTIFY_ENABLE_VALUE};

/// Interval between adapter cache checks while resolving the address
const ADDRESS_POLL_INTERVAL: Duration = Duration::from_millis(200);

/// Settle time between connect and GATT discovery
///
/// BlueZ reports the connection before its GATT cache is populated.
#[cfg(target_os = "linux")]
const GATT_SETTLE: Duration = Duration::from_millis(600);
#[cfg(not(target_os = "linux"))]
const GATT_SETTLE: Duration = Duration::ZERO;

type NotificationStream = Pin<Box<dyn Stream<Item = ValueNotification> + Send>>;

/// Static identity of the peripheral a session talks to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BleSettings {
    /// Link-layer address of the peripheral
    pub address: BDAddr,

    /// Service UUID used as the scan filter while resolving the address
    pub service_uuid: Uuid,

    /// Bound on locate + connect + discovery, subscribe and disconnect
    pub connect_timeout: Duration,
}

impl BleSettings {
    pub fn from_config(device: &DeviceConfig) -> Result<Self> {
        let address = BDAddr::from_str(&device.address).map_err(|e| {
            TelemetryError::Connection(format!("Invalid device address {}: {}", device.address, e))
        })?;

        Ok(Self {
            address,
            service_uuid: device.service_uuid,
            connect_timeout: Duration::from_millis(device.connect_timeout_ms),
        })
    }
}

/// Adapter operations used while resolving the peripheral's address
#[async_trait(?Send)]
trait AddressCache {
    type Device;

    async fn lookup(&self, address: BDAddr) -> btleplug::Result<Option<Self::Device>>;
    async fn begin_scan(&self, service_uuid: Uuid) -> btleplug::Result<()>;
    async fn end_scan(&self) -> btleplug::Result<()>;
}

#[async_trait(?Send)]
impl AddressCache for Adapter {
    type Device = Peripheral;

    async fn lookup(&self, address: BDAddr) -> btleplug::Result<Option<Peripheral>> {
        let peripherals = self.peripherals().await?;
        Ok(peripherals.into_iter().find(|p| p.address() == address))
    }

    async fn begin_scan(&self, service_uuid: Uuid) -> btleplug::Result<()> {
        self.start_scan(ScanFilter { services: vec![service_uuid] }).await
    }

    async fn end_scan(&self) -> btleplug::Result<()> {
        self.stop_scan().await
    }
}

/// Link-level peripheral operations around connect and teardown
#[async_trait(?Send)]
trait GattLink {
    async fn link_connect(&self) -> btleplug::Result<()>;
    async fn link_discover(&self) -> btleplug::Result<()>;
    async fn link_is_up(&self) -> btleplug::Result<bool>;
    async fn link_disconnect(&self) -> btleplug::Result<()>;
}

#[async_trait(?Send)]
impl GattLink for Peripheral {
    async fn link_connect(&self) -> btleplug::Result<()> {
        self.connect().await
    }

    async fn link_discover(&self) -> btleplug::Result<()> {
        self.discover_services().await
    }

    async fn link_is_up(&self) -> btleplug::Result<bool> {
        self.is_connected().await
    }

    async fn link_disconnect(&self) -> btleplug::Result<()> {
        self.disconnect().await
    }
}

/// btleplug-backed peripheral session
pub struct BleSession {
    settings: BleSettings,
    runtime: Runtime,
    adapter: Option<Adapter>,
    peripheral: Option<Peripheral>,
    data_uuid: Option<Uuid>,
    notifications: Option<NotificationStream>,
}

impl std::fmt::Debug for BleSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BleSession")
            .field("address", &self.settings.address)
            .field("connected", &self.peripheral.is_some())
            .field("subscribed", &self.notifications.is_some())
            .finish_non_exhaustive()
    }
}

impl BleSession {
    /// Create a disconnected session
    ///
    /// # Errors
    ///
    /// Returns `Io` if the session runtime cannot be created
    pub fn new(settings: BleSettings) -> Result<Self> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .thread_name("ble-session")
            .enable_all()
            .build()?;

        Ok(Self {
            settings,
            runtime,
            adapter: None,
            peripheral: None,
            data_uuid: None,
            notifications: None,
        })
    }
}

impl PeripheralLink for BleSession {
    fn connect(&mut self) -> Result<()> {
        let BleSettings { address, service_uuid, connect_timeout } = self.settings;
        let deadline = Instant::now() + connect_timeout;

        info!("Connecting to {}...", address);
        let adapter = self.runtime.block_on(first_adapter())?;
        let peripheral = self
            .runtime
            .block_on(locate(&adapter, address, service_uuid, deadline))?;

        // Held before the link comes up so disconnect() can reach a link
        // that connected but then failed discovery or timed out.
        self.adapter = Some(adapter);
        self.peripheral = Some(peripheral.clone());

        self.runtime.block_on(bring_up(&peripheral, GATT_SETTLE, deadline))?;
        debug!("Discovered {} characteristics", peripheral.characteristics().len());
        info!("Connected to {}", address);
        Ok(())
    }

    fn enable_notifications(&mut self, characteristic: &DataCharacteristic) -> Result<()> {
        let peripheral = self
            .peripheral
            .clone()
            .ok_or_else(|| TelemetryError::Subscription("Not connected".to_string()))?;

        let target = peripheral
            .characteristics()
            .into_iter()
            .find(|c| c.uuid == characteristic.uuid)
            .ok_or_else(|| {
                TelemetryError::Subscription(format!("Characteristic {} not found", characteristic.uuid))
            })?;

        if !target.properties.contains(CharPropFlags::NOTIFY) {
            return Err(TelemetryError::Subscription(format!(
                "Characteristic {} does not support notifications",
                characteristic.uuid
            )));
        }

        if !target.descriptors.iter().any(|d| d.uuid == CCCD_UUID) {
            return Err(TelemetryError::Subscription(format!(
                "Characteristic {} has no notification-control descriptor",
                characteristic.uuid
            )));
        }

        // btleplug writes the CCCD itself and waits for the write response.
        debug!(
            "Writing {:02X?} to CCCD of handle 0x{:04X} (cccd {:?})",
            NOTIFY_ENABLE_VALUE,
            characteristic.handle,
            characteristic.cccd_handle()
        );

        // The stream is opened before subscribing so the first
        // notification after the CCCD write is not missed.
        let timeout = self.settings.connect_timeout;
        let stream = self.runtime.block_on(async {
            tokio::time::timeout(timeout, async {
                let notifications = peripheral.notifications().await?;
                peripheral.subscribe(&target).await?;
                Ok::<_, btleplug::Error>(notifications)
            })
            .await
        });

        let stream = match stream {
            Ok(Ok(stream)) => stream,
            Ok(Err(e)) => return Err(TelemetryError::Subscription(format!("Enable rejected: {}", e))),
            Err(_) => {
                return Err(TelemetryError::Subscription(format!(
                    "Enable unacknowledged after {} ms",
                    timeout.as_millis()
                )))
            }
        };

        info!("Notifications enabled on {}", characteristic.uuid);
        self.data_uuid = Some(characteristic.uuid);
        self.notifications = Some(stream);
        Ok(())
    }

    fn wait_for_event(&mut self, timeout: Duration) -> Result<LinkEvent> {
        let data_uuid = self
            .data_uuid
            .ok_or_else(|| TelemetryError::Link("Notifications not enabled".to_string()))?;
        let stream = self
            .notifications
            .as_mut()
            .ok_or_else(|| TelemetryError::Link("Notifications not enabled".to_string()))?;

        self.runtime.block_on(async {
            let deadline = Instant::now() + timeout;
            loop {
                match tokio::time::timeout_at(deadline, stream.next()).await {
                    Err(_) => return Ok(LinkEvent::Timeout),
                    Ok(None) => {
                        return Err(TelemetryError::Link("Notification stream ended".to_string()))
                    }
                    Ok(Some(notification)) if notification.uuid == data_uuid => {
                        return Ok(LinkEvent::Notification(notification.value))
                    }
                    Ok(Some(notification)) => {
                        trace!("Ignoring notification from {}", notification.uuid);
                    }
                }
            }
        })
    }

    fn disconnect(&mut self) {
        self.notifications = None;
        self.data_uuid = None;
        self.adapter = None;

        let Some(peripheral) = self.peripheral.take() else {
            debug!("Disconnect requested while not connected");
            return;
        };

        let timeout = self.settings.connect_timeout;
        match self.runtime.block_on(tear_down(&peripheral, timeout)) {
            Ok(true) => info!("Disconnected from {}", self.settings.address),
            Ok(false) => debug!("{} was not connected, nothing to tear down", self.settings.address),
            Err(e) => warn!("{} ({})", e, self.settings.address),
        }
    }
}

impl Drop for BleSession {
    fn drop(&mut self) {
        self.disconnect();
    }
}

async fn first_adapter() -> Result<Adapter> {
    let manager = Manager::new().await.map_err(connection_error)?;
    manager
        .adapters()
        .await
        .map_err(connection_error)?
        .into_iter()
        .next()
        .ok_or_else(|| TelemetryError::Connection("No Bluetooth adapter found".to_string()))
}

/// Find the device with `address`, scanning only if the adapter has not
/// cached it yet
///
/// The scan is bounded by `deadline` and is stopped on every exit path.
async fn locate<C: AddressCache>(
    cache: &C,
    address: BDAddr,
    service_uuid: Uuid,
    deadline: Instant,
) -> Result<C::Device> {
    if let Some(device) = cache.lookup(address).await.map_err(connection_error)? {
        return Ok(device);
    }

    debug!("{} not cached by adapter, scanning for service {}", address, service_uuid);
    cache.begin_scan(service_uuid).await.map_err(connection_error)?;

    let polled = tokio::time::timeout_at(deadline, async {
        loop {
            match cache.lookup(address).await {
                Ok(Some(device)) => return Ok(device),
                Ok(None) => tokio::time::sleep(ADDRESS_POLL_INTERVAL).await,
                Err(e) => return Err(connection_error(e)),
            }
        }
    })
    .await;

    if let Err(e) = cache.end_scan().await {
        debug!("Failed to stop scan: {}", e);
    }

    polled.map_err(|_| {
        TelemetryError::Connection(format!("{} not found before connect timeout", address))
    })?
}

/// Connect and discover services, bounded by `deadline`
async fn bring_up<G: GattLink>(link: &G, settle: Duration, deadline: Instant) -> Result<()> {
    let steps = async {
        link.link_connect().await.map_err(connection_error)?;
        if !settle.is_zero() {
            tokio::time::sleep(settle).await;
        }
        link.link_discover().await.map_err(connection_error)
    };

    tokio::time::timeout_at(deadline, steps)
        .await
        .map_err(|_| TelemetryError::Connection("Timed out connecting".to_string()))?
}

/// Disconnect a link that is up
///
/// Returns `Ok(false)` when the link never came up.
async fn tear_down<G: GattLink>(link: &G, timeout: Duration) -> Result<bool> {
    let steps = async {
        // If the state query fails, try the disconnect anyway.
        if !link.link_is_up().await.unwrap_or(true) {
            return Ok(false);
        }
        link.link_disconnect().await.map(|()| true)
    };

    match tokio::time::timeout(timeout, steps).await {
        Ok(Ok(disconnected)) => Ok(disconnected),
        Ok(Err(e)) => Err(TelemetryError::Disconnect(e.to_string())),
        Err(_) => Err(TelemetryError::Disconnect(format!(
            "Timed out after {} ms",
            timeout.as_millis()
        ))),
    }
}

fn connection_error(e: btleplug::Error) -> TelemetryError {
    TelemetryError::Connection(e.to_string())
}
