//! Per-client protocol state: data definitions, event maps, notification
//! and input groups, and the active data request list. Grounded on the
//! original bridge's `ConnectionHandler` - the message handler bodies
//! below are a close rewrite of its `OnC*` methods with attribute-bag
//! messages replaced by typed fields.

use std::collections::{HashMap, VecDeque};
use std::time::{Duration, Instant};

use codec::{
    AddClientEventToNotificationGroup, AddToDataDefinition, ClientMessage, DataType, DatumValue,
    Event, JoystickDeviceInfo, JoystickInfo, MapClientEventToSimEvent, MapInputEventToClientEvent,
    RequestDataOnSimObject, RequestJoystickDeviceInfo, RequestSystemState, ServerMessage,
    ServerOpen, SetInputGroupPriority, SetInputGroupState, SetNotificationGroupPriority,
    SubscribeToSystemEvent, SystemState, TransmitClientEvent,
};
use simlink::SimCache;
use translation::LiveSource;

use crate::axis;
use crate::error::SessionError;

/// The user's own aircraft - the only object this bridge serves.
pub const OBJECT_ID_USER: u32 = 0;

/// Reserved group id system events are fired under.
pub const SYSTEM_GROUP_ID: u32 = 0xFFFF_FFFF;

const FLAG_CHANGED: u32 = 0x01;
const FLAG_TAGGED: u32 = 0x02;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Period {
    Never,
    Once,
    VisualFrame,
    SimFrame,
    Second,
}

impl Period {
    pub fn from_wire(code: u32) -> Self {
        match code {
            0 => Period::Never,
            1 => Period::Once,
            2 => Period::VisualFrame,
            3 => Period::SimFrame,
            _ => Period::Second,
        }
    }
}

/// One variable within a data definition, after being resolved against
/// the translation table.
#[derive(Clone)]
pub struct DatumSpec {
    pub client_name: String,
    pub client_unit: String,
    pub client_type: DataType,
    pub epsilon: f32,
    pub datum_id: u32,
    pub live: LiveSource,
    pub live_unit: Option<&'static str>,
    pub default: DatumValue,
    pub previous_value: Option<DatumValue>,
}

#[derive(Default)]
pub struct NotificationGroup {
    pub priority: Option<u32>,
    /// event id -> maskable
    pub members: HashMap<u32, bool>,
}

#[derive(Clone)]
pub struct InputBinding {
    pub down_event_id: u32,
    pub down_value: u32,
    pub up_event_id: u32,
    pub up_value: u32,
    pub maskable: bool,
}

pub struct InputGroup {
    pub priority: Option<u32>,
    pub enabled: bool,
    /// input definition string (lowercased) -> binding
    pub members: HashMap<String, InputBinding>,
}

impl Default for InputGroup {
    fn default() -> Self {
        // input groups start disabled until SetInputGroupState says otherwise
        InputGroup { priority: None, enabled: false, members: HashMap::new() }
    }
}

pub struct DataRequest {
    pub request_id: u32,
    pub object_id: u32,
    pub definition_id: u32,
    pub period: Period,
    pub interval: u32,
    pub flags: u32,
    pub tagged_format: bool,
    pub only_when_changed: bool,
    pub send_countdown: u32,
    pub last_sent_at: Option<Instant>,
}

impl DataRequest {
    pub fn new(msg: &RequestDataOnSimObject) -> Self {
        if msg.limit != 0 {
            log::warn!("data request {} set a nonzero limit, which is ignored", msg.request_id);
        }
        DataRequest {
            request_id: msg.request_id,
            object_id: msg.object_id,
            definition_id: msg.definition_id,
            period: Period::from_wire(msg.period),
            interval: msg.interval,
            flags: msg.flags,
            tagged_format: msg.flags & FLAG_TAGGED != 0,
            only_when_changed: msg.flags & FLAG_CHANGED != 0,
            send_countdown: msg.origin,
            last_sent_at: None,
        }
    }

    /// Returns `true` once the countdown has reached zero, reloading it
    /// to `interval` for the next cycle.
    pub fn countdown_interval(&mut self) -> bool {
        if self.send_countdown > 0 {
            self.send_countdown -= 1;
            return false;
        }
        self.send_countdown = self.interval;
        true
    }

    pub fn is_due(&self) -> bool {
        match self.period {
            Period::Never => false,
            Period::Once => self.last_sent_at.is_none(),
            Period::Second => self
                .last_sent_at
                .map_or(true, |t| t.elapsed() >= Duration::from_secs_f64(1.0)),
            Period::VisualFrame | Period::SimFrame => true,
        }
    }
}

/// What a handled message produces: a reply to the same client, or a
/// system/sim event to fan out to every subscribing session.
pub enum Outbound {
    Send(ServerMessage),
    FireEvent { name: String, group_id: u32, data: i32 },
}

/// State known at the moment a message is handled or a tick runs -
/// threaded in rather than stored per-session, since `simRunning`/`paused`
/// are process-wide facts derived by the dispatcher.
pub struct SessionContext<'a> {
    pub cache: &'a SimCache,
    pub sim_running: bool,
    pub paused: bool,
}

pub struct SessionState {
    pub id: u64,
    pub protocol: u32,
    protocol_pinned: bool,
    pub data_definitions: HashMap<u32, Vec<DatumSpec>>,
    client_event_by_name: HashMap<String, u32>,
    name_by_client_event: HashMap<u32, String>,
    notification_groups: HashMap<u32, NotificationGroup>,
    input_groups: HashMap<u32, InputGroup>,
    pub active_data_requests: VecDeque<DataRequest>,
}

impl SessionState {
    pub fn new(id: u64) -> Self {
        SessionState {
            id,
            protocol: 0,
            protocol_pinned: false,
            data_definitions: HashMap::new(),
            client_event_by_name: HashMap::new(),
            name_by_client_event: HashMap::new(),
            notification_groups: HashMap::new(),
            input_groups: HashMap::new(),
            active_data_requests: VecDeque::new(),
        }
    }

    pub fn handle(
        &mut self,
        msg: ClientMessage,
        protocol: u32,
        ctx: &SessionContext,
    ) -> Result<Vec<Outbound>, SessionError> {
        if !self.protocol_pinned {
            self.protocol = protocol;
            self.protocol_pinned = true;
        }

        let mut out = Vec::new();
        match msg {
            ClientMessage::Open(_) => {
                out.push(Outbound::Send(ServerMessage::Open(ServerOpen {
                    app_name: "Lockheed Martin® Prepar3D® v4".to_string(),
                    app_ver: [4, 3],
                    app_build: [29, 25520],
                    sc_ver: [4, 3],
                    sc_build: [0, 0],
                    reserved1: 5,
                    reserved2: 0,
                })));
            }

            ClientMessage::AddToDataDefinition(m) => self.on_add_to_data_definition(m)?,

            ClientMessage::MapClientEventToSimEvent(m) => self.on_map_client_event_to_sim_event(m),

            ClientMessage::AddClientEventToNotificationGroup(m) => {
                self.on_add_client_event_to_notification_group(m)
            }

            ClientMessage::SetNotificationGroupPriority(m) => {
                self.on_set_notification_group_priority(m)
            }

            ClientMessage::MapInputEventToClientEvent(m) => self.on_map_input_event_to_client_event(m),

            ClientMessage::SetInputGroupPriority(m) => self.on_set_input_group_priority(m),

            ClientMessage::SetInputGroupState(m) => self.on_set_input_group_state(m),

            ClientMessage::SubscribeToSystemEvent(m) => {
                out.extend(self.on_subscribe_to_system_event(m, ctx))
            }

            ClientMessage::RequestSystemState(m) => out.extend(self.on_request_system_state(m, ctx)),

            ClientMessage::RequestJoystickDeviceInfo(m) => {
                out.push(self.on_request_joystick_device_info(m))
            }

            ClientMessage::RequestDataOnSimObject(m) => self.on_request_data_on_sim_object(m),

            ClientMessage::TransmitClientEvent(m) => {
                if let Some(action) = self.on_transmit_client_event(m) {
                    out.push(action);
                }
            }
        }
        Ok(out)
    }

    fn on_add_to_data_definition(&mut self, m: AddToDataDefinition) -> Result<(), SessionError> {
        let client_type = DataType::from_wire(m.data_type)?;
        let entry = translation::lookup(&m.datum_name)
            .ok_or_else(|| SessionError::UnmappedVariable(m.datum_name.clone()))?;

        let spec = DatumSpec {
            client_name: m.datum_name,
            client_unit: m.units_name,
            client_type,
            epsilon: m.epsilon,
            datum_id: m.datum_id,
            live: entry.live,
            live_unit: entry.live_unit,
            default: entry.default.to_datum(),
            previous_value: None,
        };
        self.data_definitions.entry(m.definition_id).or_default().push(spec);
        Ok(())
    }

    fn on_map_client_event_to_sim_event(&mut self, m: MapClientEventToSimEvent) {
        if m.event_name.is_empty() {
            // a reservation: the client will map an input event to this id later
            return;
        }
        let is_custom = m.event_name.contains('.');
        let lower = m.event_name.to_lowercase();
        if !is_custom && !translation::KNOWN_SIM_EVENT_NAMES.contains(&lower.as_str()) {
            log::warn!("session {}: will not handle unknown sim event {:?}", self.id, m.event_name);
            return;
        }
        self.name_by_client_event.insert(m.event_id, lower.clone());
        self.client_event_by_name.insert(lower, m.event_id);
    }

    fn on_add_client_event_to_notification_group(&mut self, m: AddClientEventToNotificationGroup) {
        let g = self.notification_groups.entry(m.group_id).or_default();
        g.members.insert(m.event_id, m.maskable != 0);
    }

    fn on_set_notification_group_priority(&mut self, m: SetNotificationGroupPriority) {
        let g = self.notification_groups.entry(m.group_id).or_default();
        g.priority = Some(m.priority);
    }

    fn on_map_input_event_to_client_event(&mut self, m: MapInputEventToClientEvent) {
        let lower = m.definition.to_lowercase();
        if !translation::KNOWN_INPUT_EVENT_NAMES.contains(&lower.as_str()) {
            log::warn!("session {}: will not handle unknown input definition {:?}", self.id, m.definition);
            return;
        }
        let g = self.input_groups.entry(m.group_id).or_default();
        g.members.insert(
            lower,
            InputBinding {
                down_event_id: m.down_id,
                down_value: m.down_value,
                up_event_id: m.up_id,
                up_value: m.up_value,
                maskable: m.maskable != 0,
            },
        );
    }

    fn on_set_input_group_priority(&mut self, m: SetInputGroupPriority) {
        let g = self.input_groups.entry(m.group_id).or_default();
        g.priority = Some(m.priority);
    }

    fn on_set_input_group_state(&mut self, m: SetInputGroupState) {
        let g = self.input_groups.entry(m.group_id).or_default();
        g.enabled = m.state != 0;
    }

    fn on_subscribe_to_system_event(&mut self, m: SubscribeToSystemEvent, ctx: &SessionContext) -> Option<Outbound> {
        let lower = m.event_name.to_lowercase();
        self.name_by_client_event.insert(m.client_event_id, lower.clone());
        self.client_event_by_name.insert(lower.clone(), m.client_event_id);

        match lower.as_str() {
            "pause" => Some(Outbound::Send(ServerMessage::Event(Event {
                group_id: SYSTEM_GROUP_ID,
                event_id: m.client_event_id,
                data: ctx.paused as i32,
                flags: 0,
            }))),
            "sim" => Some(Outbound::Send(ServerMessage::Event(Event {
                group_id: SYSTEM_GROUP_ID,
                event_id: m.client_event_id,
                data: ctx.sim_running as i32,
                flags: 0,
            }))),
            _ => None,
        }
    }

    fn on_request_system_state(&self, m: RequestSystemState, ctx: &SessionContext) -> Option<Outbound> {
        if m.state_name == "Sim" {
            Some(Outbound::Send(ServerMessage::SystemState(SystemState {
                request_id: m.request_id,
                data_integer: ctx.sim_running as u32,
                data_float: 0.0,
                data_string: String::new(),
            })))
        } else {
            log::error!("session {}: unhandled system state request {:?}", self.id, m.state_name);
            None
        }
    }

    fn on_request_joystick_device_info(&self, m: RequestJoystickDeviceInfo) -> Outbound {
        Outbound::Send(ServerMessage::JoystickDeviceInfo(JoystickDeviceInfo {
            request_id: m.request_id,
            joysticks: vec![
                JoystickInfo { name: "Saitek Pro Flight Rudder Pedals".to_string(), number: 0 },
                JoystickInfo { name: "Iris Dynamics Yoke".to_string(), number: 1 },
            ],
        }))
    }

    fn on_request_data_on_sim_object(&mut self, m: RequestDataOnSimObject) {
        if m.object_id != OBJECT_ID_USER {
            log::warn!("session {}: ignoring data request for non-user object {}", self.id, m.object_id);
            return;
        }
        self.active_data_requests.push_back(DataRequest::new(&m));
    }

    fn on_transmit_client_event(&mut self, m: TransmitClientEvent) -> Option<Outbound> {
        if m.object_id != OBJECT_ID_USER {
            log::warn!("session {}: ignoring transmit for non-user object {}", self.id, m.object_id);
            return None;
        }
        match self.name_by_client_event.get(&m.event_id) {
            Some(name) => Some(Outbound::FireEvent { name: name.clone(), group_id: m.group_id, data: m.data as i32 }),
            None => {
                log::warn!("session {}: transmit of unmapped client event {}", self.id, m.event_id);
                None
            }
        }
    }

    /// Called by `FireSimEvent`-equivalent fan-out: if this session
    /// subscribes to `event_name`, returns the message to send it.
    pub fn deliver_named_event(&self, event_name: &str, group_id: u32, data: i32) -> Option<ServerMessage> {
        self.client_event_by_name.get(event_name).map(|&event_id| {
            ServerMessage::Event(Event { group_id, event_id, data, flags: 0 })
        })
    }

    /// Re-scales the fixed axis variables into SimConnect events for
    /// whichever ones this session has actually mapped. Input-group
    /// delivery is gated on `enabled`, per the dispatcher's noted
    /// redesign (the source captured this bit but never consulted it).
    pub fn derive_axis_events(&self, cache: &SimCache) -> Vec<ServerMessage> {
        let mut out = Vec::new();

        for axis in axis::SIM_AXES {
            let Some(&event_id) = self.client_event_by_name.get(axis.event_name) else { continue };
            let Some(value) = cache.get(axis.live_var).and_then(|v| v.as_f64()) else { continue };
            let group_id = self
                .notification_groups
                .iter()
                .find(|(_, g)| g.members.contains_key(&event_id))
                .map(|(id, _)| *id);
            let Some(group_id) = group_id else {
                log::error!(
                    "session {}: axis event {:?} is mapped but no notification group contains it",
                    self.id,
                    axis.event_name
                );
                continue;
            };
            let data = axis::scale_and_clamp(value, axis.scale, axis.offset, axis.min, axis.max);
            out.push(ServerMessage::Event(Event { group_id, event_id, data, flags: 0 }));
        }

        for axis in axis::INPUT_AXES {
            let Some(&event_id) = self.client_event_by_name.get(axis.definition) else { continue };
            let Some(value) = cache.get(axis.live_var).and_then(|v| v.as_f64()) else { continue };
            let group = self
                .input_groups
                .iter()
                .find(|(_, g)| g.members.contains_key(axis.definition));
            let Some((&group_id, group)) = group else { continue };
            if !group.enabled {
                continue;
            }
            let data = axis::scale_and_clamp(value, axis.scale, axis.offset, axis.min, axis.max);
            out.push(ServerMessage::Event(Event { group_id, event_id, data, flags: 0 }));
        }

        out
    }
}
