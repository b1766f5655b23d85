// ── Opener facade ──
//
// Full lifecycle management for one garage door opener: session login,
// device verification, state polling, and command dispatch with the
// settle-and-verify engine. One `Opener` drives one physical unit; a
// multi-door host runs one instance per door, each on its own task.

use chrono::{DateTime, Utc};
use secrecy::SecretString;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use ryobi_gdo_api::{CommandChannel, SessionClient};

use crate::command::DeviceCommand;
use crate::config::{DeviceConfig, SettleSchedule};
use crate::error::CoreError;
use crate::model::{DoorState, LightState, StateSnapshot};

// ── Lifecycle ────────────────────────────────────────────────────

/// Where the device sits in its known lifecycle, from the host's
/// perspective.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    /// Constructed; no session yet.
    Uninitialized,
    /// Login succeeded; the device id is not yet checked.
    Authenticated,
    /// The device id is confirmed to exist on the account.
    Ready,
}

// ── Opener ───────────────────────────────────────────────────────

/// The main entry point for hosts.
///
/// Owns the session client, the command channel, the session API key,
/// and the last-known state snapshot. Methods take `&mut self`: one
/// logical flow per device instance, never two overlapping network
/// operations. Instances are independent; run one per door.
pub struct Opener {
    config: DeviceConfig,
    session: SessionClient,
    channel: CommandChannel,
    api_key: Option<SecretString>,
    lifecycle: Lifecycle,
    state: Option<StateSnapshot>,
}

impl Opener {
    /// Create an opener from configuration. Does NOT talk to the cloud --
    /// call [`login()`](Self::login) to derive the session API key.
    pub fn new(config: DeviceConfig) -> Result<Self, CoreError> {
        let session =
            SessionClient::new(config.rest_url.clone(), &config.transport).map_err(|e| {
                CoreError::Config {
                    message: e.to_string(),
                }
            })?;
        let channel = CommandChannel::new(config.rpc_url.clone(), &config.transport);

        Ok(Self {
            config,
            session,
            channel,
            api_key: None,
            lifecycle: Lifecycle::Uninitialized,
            state: None,
        })
    }

    /// Access the device configuration.
    pub fn config(&self) -> &DeviceConfig {
        &self.config
    }

    // ── Session lifecycle ────────────────────────────────────────

    /// Authenticate against the vendor cloud and store the session API
    /// key for the command channel.
    ///
    /// May be re-called at any time to derive a fresh key (the cloud
    /// eventually expires keys; nothing refreshes them automatically).
    /// Failure leaves the previous key and lifecycle untouched.
    pub async fn login(&mut self) -> Result<(), CoreError> {
        let creds = &self.config.credentials;
        let key = self
            .session
            .login(&creds.username, &creds.password)
            .await
            .map_err(|e| {
                error!(error = %e, "login failed");
                CoreError::authentication(&e)
            })?;

        self.api_key = Some(key);
        if self.lifecycle == Lifecycle::Uninitialized {
            self.lifecycle = Lifecycle::Authenticated;
        }
        info!("session authenticated");
        Ok(())
    }

    /// Check that the configured device id exists on the account.
    ///
    /// `Ok(false)` means the account answered and the id is absent --
    /// the host should abandon this device id, not retry. Requires a
    /// prior successful [`login()`](Self::login).
    pub async fn verify_device(&mut self) -> Result<bool, CoreError> {
        if self.lifecycle == Lifecycle::Uninitialized {
            return Err(CoreError::NotAuthenticated);
        }

        let creds = &self.config.credentials;
        let found = self
            .session
            .contains_device(&creds.username, &creds.password, &self.config.device_id)
            .await
            .map_err(|e| {
                error!(error = %e, "device discovery failed");
                CoreError::discovery(&e)
            })?;

        if found {
            self.lifecycle = Lifecycle::Ready;
            debug!(device_id = %self.config.device_id, "device verified");
        } else {
            warn!(device_id = %self.config.device_id, "device not on this account");
        }
        Ok(found)
    }

    // ── State polling ────────────────────────────────────────────

    /// Poll the cloud and replace the state snapshot.
    ///
    /// On any failure -- transport, parse, unmapped code -- the previous
    /// snapshot stays entirely untouched; hosts keep reporting the last
    /// known state until a poll succeeds.
    pub async fn update(&mut self) -> Result<(), CoreError> {
        self.require_ready()?;

        let creds = &self.config.credentials;
        let report = self
            .session
            .query_device(&creds.username, &creds.password, &self.config.device_id)
            .await
            .map_err(|e| {
                warn!(error = %e, "state poll failed; keeping last known state");
                CoreError::update(&e)
            })?;

        let snapshot = StateSnapshot::from_report(&report).inspect_err(
            |e| warn!(error = %e, "state response unusable; keeping last known state"),
        )?;

        debug!(
            door = %snapshot.door,
            light = %snapshot.light,
            battery = snapshot.battery_level,
            "state updated"
        );
        self.state = Some(snapshot);
        Ok(())
    }

    // ── Commands ─────────────────────────────────────────────────

    /// Start opening the door. State is not refreshed here; poll
    /// afterwards, or use [`open_and_settle()`](Self::open_and_settle).
    pub async fn open(&mut self) -> Result<(), CoreError> {
        self.send_command(DeviceCommand::OpenDoor).await
    }

    /// Start closing the door.
    pub async fn close(&mut self) -> Result<(), CoreError> {
        self.send_command(DeviceCommand::CloseDoor).await
    }

    /// Switch the opener light on.
    pub async fn light_on(&mut self) -> Result<(), CoreError> {
        self.send_command(DeviceCommand::Light { on: true }).await
    }

    /// Switch the opener light off.
    pub async fn light_off(&mut self) -> Result<(), CoreError> {
        self.send_command(DeviceCommand::Light { on: false }).await
    }

    /// Deliver `command` over the realtime channel.
    ///
    /// After a failure the physical state is indeterminate until the
    /// next successful poll.
    pub async fn send_command(&mut self, command: DeviceCommand) -> Result<(), CoreError> {
        self.require_ready()?;
        let Some(api_key) = self.api_key.as_ref() else {
            return Err(CoreError::NotAuthenticated);
        };

        self.channel
            .send(
                &self.config.credentials.username,
                api_key,
                &self.config.device_id,
                command.attribute(),
                command.value(),
            )
            .await
            .map_err(|e| {
                error!(error = %e, %command, "command delivery failed");
                CoreError::command(command, e)
            })?;

        info!(%command, "command delivered");
        Ok(())
    }

    // ── Settle-and-verify ────────────────────────────────────────

    /// Open the door, then poll at the configured offsets until it
    /// reports open.
    pub async fn open_and_settle(
        &mut self,
        cancel: &CancellationToken,
    ) -> Result<bool, CoreError> {
        self.execute_and_settle(DeviceCommand::OpenDoor, cancel).await
    }

    /// Close the door, then poll until it reports closed. The default
    /// schedule waits longest in the middle, where door travel happens.
    pub async fn close_and_settle(
        &mut self,
        cancel: &CancellationToken,
    ) -> Result<bool, CoreError> {
        self.execute_and_settle(DeviceCommand::CloseDoor, cancel).await
    }

    /// Switch the light, then poll once to confirm.
    pub async fn set_light_and_settle(
        &mut self,
        on: bool,
        cancel: &CancellationToken,
    ) -> Result<bool, CoreError> {
        self.execute_and_settle(DeviceCommand::Light { on }, cancel).await
    }

    /// Deliver `command`, then poll state at the offsets of its settle
    /// schedule until a poll confirms the target state.
    ///
    /// Returns `Ok(true)` on confirmation, `Ok(false)` if the schedule
    /// runs out or `cancel` fires first -- state is then whatever the
    /// last poll observed. Poll failures are logged and the schedule
    /// continues; only the command itself failing is an error.
    /// Cancellation is honored between polls, never mid-request.
    pub async fn execute_and_settle(
        &mut self,
        command: DeviceCommand,
        cancel: &CancellationToken,
    ) -> Result<bool, CoreError> {
        self.send_command(command).await?;

        let schedule = self.schedule_for(command).clone();
        for (poll, offset) in schedule.offsets().iter().enumerate() {
            tokio::select! {
                biased;
                () = cancel.cancelled() => {
                    debug!(%command, "settle cancelled");
                    return Ok(false);
                }
                () = tokio::time::sleep(*offset) => {}
            }

            match self.update().await {
                Ok(()) => {
                    if let Some(state) = &self.state {
                        if command.confirmed_by(state) {
                            debug!(%command, polls = poll + 1, "settle confirmed");
                            return Ok(true);
                        }
                    }
                }
                Err(e) => warn!(error = %e, poll, %command, "settle poll failed"),
            }
        }

        warn!(%command, "settle schedule exhausted without confirmation");
        Ok(false)
    }

    // ── Accessors ────────────────────────────────────────────────

    /// Lifecycle position, from the host's perspective.
    pub fn lifecycle(&self) -> Lifecycle {
        self.lifecycle
    }

    /// The configured device id.
    pub fn device_id(&self) -> &str {
        &self.config.device_id
    }

    /// Last observed state, if any update has succeeded yet.
    pub fn state(&self) -> Option<&StateSnapshot> {
        self.state.as_ref()
    }

    /// Door position from the last snapshot.
    pub fn door_state(&self) -> Option<DoorState> {
        self.state.as_ref().map(|s| s.door)
    }

    /// Light state from the last snapshot.
    pub fn light_state(&self) -> Option<LightState> {
        self.state.as_ref().map(|s| s.light)
    }

    /// Battery charge (percent) from the last snapshot.
    pub fn battery_level(&self) -> Option<f64> {
        self.state.as_ref().map(|s| s.battery_level)
    }

    /// When the last successful update happened.
    pub fn updated_at(&self) -> Option<DateTime<Utc>> {
        self.state.as_ref().map(|s| s.updated_at)
    }

    // ── Helpers ──────────────────────────────────────────────────

    fn require_ready(&self) -> Result<(), CoreError> {
        match self.lifecycle {
            Lifecycle::Uninitialized => Err(CoreError::NotAuthenticated),
            Lifecycle::Authenticated => Err(CoreError::NotVerified {
                device_id: self.config.device_id.clone(),
            }),
            Lifecycle::Ready => Ok(()),
        }
    }

    fn schedule_for(&self, command: DeviceCommand) -> &SettleSchedule {
        match command {
            DeviceCommand::OpenDoor => &self.config.settle.open,
            DeviceCommand::CloseDoor => &self.config.settle.close,
            DeviceCommand::Light { .. } => &self.config.settle.light,
        }
    }
}
