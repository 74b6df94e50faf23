//! Inbound event routing.
//!
//! [`EventRouter`] decorates the caller's [`SessionCallbacks`]: the session
//! calls the router, the router serves a small set of built-in routes and
//! forwards everything else untouched.
//!
//! | callback   | interface                                   | path                  |
//! |------------|---------------------------------------------|-----------------------|
//! | individual | `io.edgehog.devicemanager.Commands`         | `/request`            |
//! | individual | `io.edgehog.devicemanager.LedBehavior`      | `/indicator/behavior` |
//! | object     | `io.edgehog.devicemanager.OTARequest`       | `/request`            |
//! | set/unset  | `io.edgehog.devicemanager.config.Telemetry` | any                   |

use log::{info, warn};

use super::state::DeviceState;
use crate::app::events::{
    ConnectionEvent, DataEvent, DisconnectionEvent, IndividualEvent, ObjectEvent,
    PropertySetEvent,
};
use crate::app::ports::{DeviceCommand, ServicePort, SessionCallbacks};
use crate::error::{Error, Result};
use crate::telemetry::{CONFIG_INTERFACE, TelemetryScheduler, config_event};

pub const COMMANDS_INTERFACE: &str = "io.edgehog.devicemanager.Commands";
pub const LED_BEHAVIOR_INTERFACE: &str = "io.edgehog.devicemanager.LedBehavior";
pub const OTA_REQUEST_INTERFACE: &str = "io.edgehog.devicemanager.OTARequest";

const COMMANDS_PATH: &str = "/request";
const LED_BEHAVIOR_PATH: &str = "/indicator/behavior";
const OTA_REQUEST_PATH: &str = "/request";

/// Built-in handlers reachable through the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Command,
    LedBehavior,
    OtaRequest,
    TelemetryConfig,
}

impl Route {
    pub fn individual(data: &DataEvent) -> Option<Self> {
        match (data.interface.as_str(), data.path.as_str()) {
            (COMMANDS_INTERFACE, COMMANDS_PATH) => Some(Self::Command),
            (LED_BEHAVIOR_INTERFACE, LED_BEHAVIOR_PATH) => Some(Self::LedBehavior),
            _ => None,
        }
    }

    pub fn object(data: &DataEvent) -> Option<Self> {
        (data.interface == OTA_REQUEST_INTERFACE && data.path == OTA_REQUEST_PATH)
            .then_some(Self::OtaRequest)
    }

    pub fn property(data: &DataEvent) -> Option<Self> {
        (data.interface == CONFIG_INTERFACE).then_some(Self::TelemetryConfig)
    }
}

/// Per-poll decorator over the caller's callbacks.
///
/// Borrows the device's moving parts for the duration of one
/// [`Session::poll`](crate::app::ports::Session::poll).
pub(crate) struct EventRouter<'a> {
    pub state: &'a mut DeviceState,
    pub scheduler: &'a mut TelemetryScheduler,
    pub services: Option<&'a mut (dyn ServicePort + 'static)>,
    pub user: Option<&'a mut (dyn SessionCallbacks + Send + 'static)>,
}

impl EventRouter<'_> {
    fn command(&mut self, event: &IndividualEvent) -> Result<()> {
        let command = event
            .value
            .as_str()
            .and_then(DeviceCommand::parse)
            .ok_or(Error::UnsupportedRequest)?;
        info!("Device: command {:?}", command);
        self.services()?.command(command)
    }

    fn led_behavior(&mut self, event: &IndividualEvent) -> Result<()> {
        let behavior = event.value.as_str().ok_or(Error::UnsupportedRequest)?;
        self.services()?.led_behavior(behavior)
    }

    fn services(&mut self) -> Result<&mut (dyn ServicePort + 'static)> {
        self.services.as_deref_mut().ok_or(Error::UnsupportedRequest)
    }
}

fn report(route: Route, data: &DataEvent, result: Result<()>) {
    if let Err(e) = result {
        warn!(
            "Device: {:?} request on {}{} failed: {}",
            route, data.interface, data.path, e
        );
    }
}

impl SessionCallbacks for EventRouter<'_> {
    fn on_connected(&mut self, event: &ConnectionEvent) {
        self.state.transition(self.state.on_connected());
        if let Some(user) = self.user.as_deref_mut() {
            user.on_connected(event);
        }
    }

    fn on_disconnected(&mut self, event: &DisconnectionEvent) {
        self.state.transition(self.state.on_disconnected());
        if let Some(user) = self.user.as_deref_mut() {
            user.on_disconnected(event);
        }
    }

    fn on_datastream_individual(&mut self, event: &IndividualEvent) {
        match Route::individual(&event.data) {
            Some(route @ Route::Command) => {
                let result = self.command(event);
                report(route, &event.data, result);
            }
            Some(route) => {
                let result = self.led_behavior(event);
                report(route, &event.data, result);
            }
            None => {
                if let Some(user) = self.user.as_deref_mut() {
                    user.on_datastream_individual(event);
                }
            }
        }
    }

    fn on_datastream_object(&mut self, event: &ObjectEvent) {
        match Route::object(&event.data) {
            Some(route) => {
                let result = self.services().and_then(|s| s.ota_request(event));
                report(route, &event.data, result);
            }
            None => {
                if let Some(user) = self.user.as_deref_mut() {
                    user.on_datastream_object(event);
                }
            }
        }
    }

    fn on_property_set(&mut self, event: &PropertySetEvent) {
        match Route::property(&event.data) {
            Some(route) => {
                let result =
                    config_event::handle_set(self.scheduler, &event.data.path, &event.value);
                report(route, &event.data, result);
            }
            None => {
                if let Some(user) = self.user.as_deref_mut() {
                    user.on_property_set(event);
                }
            }
        }
    }

    fn on_property_unset(&mut self, event: &DataEvent) {
        match Route::property(event) {
            Some(route) => {
                let result = config_event::handle_unset(self.scheduler, &event.path);
                report(route, event, result);
            }
            None => {
                if let Some(user) = self.user.as_deref_mut() {
                    user.on_property_unset(event);
                }
            }
        }
    }
}
