//! The message catalog: one explicit struct per wire message, with plain
//! `read`/`write` methods. This replaces the source's runtime
//! `classMap[(fromAgent, code)]` reflection with an ordinary Rust `match`
//! over a tagged enum - message-type identity is the enum variant, not a
//! class name string.

use crate::error::{CodecError, Direction};
use crate::frame::{Reader, Writer};

pub const CLIENT_HEADER_SIZE: usize = 16;
pub const SERVER_HEADER_SIZE: usize = 12;

fn mask_code(code: u32) -> u32 {
    code & 0x0FFF_FFFF
}

// ----------------------------------------------------------------------
// Client -> Server
// ----------------------------------------------------------------------

#[derive(Clone, Debug, PartialEq)]
pub struct Open {
    pub app_name: String,
    pub reserved1: u32,
    pub reserved2: u8,
    pub sim_id: String,
    pub version: [u32; 2],
    pub build: [u32; 2],
}

#[derive(Clone, Debug, PartialEq)]
pub struct MapClientEventToSimEvent {
    pub event_id: u32,
    pub event_name: String,
}

#[derive(Clone, Debug, PartialEq)]
pub struct TransmitClientEvent {
    pub object_id: u32,
    pub event_id: u32,
    pub data: u32,
    pub group_id: u32,
    pub flags: u32,
}

#[derive(Clone, Debug, PartialEq)]
pub struct AddClientEventToNotificationGroup {
    pub group_id: u32,
    pub event_id: u32,
    pub maskable: u32,
}

#[derive(Clone, Debug, PartialEq)]
pub struct SetNotificationGroupPriority {
    pub group_id: u32,
    pub priority: u32,
}

#[derive(Clone, Debug, PartialEq)]
pub struct AddToDataDefinition {
    pub definition_id: u32,
    pub datum_name: String,
    pub units_name: String,
    pub data_type: u32,
    pub epsilon: f32,
    pub datum_id: u32,
}

#[derive(Clone, Debug, PartialEq)]
pub struct RequestDataOnSimObject {
    pub request_id: u32,
    pub definition_id: u32,
    pub object_id: u32,
    pub period: u32,
    pub flags: u32,
    pub origin: u32,
    pub interval: u32,
    pub limit: u32,
}

#[derive(Clone, Debug, PartialEq)]
pub struct MapInputEventToClientEvent {
    pub group_id: u32,
    pub definition: String,
    pub down_id: u32,
    pub down_value: u32,
    pub up_id: u32,
    pub up_value: u32,
    pub maskable: u32,
}

#[derive(Clone, Debug, PartialEq)]
pub struct SetInputGroupPriority {
    pub group_id: u32,
    pub priority: u32,
}

#[derive(Clone, Debug, PartialEq)]
pub struct SetInputGroupState {
    pub group_id: u32,
    pub state: u32,
}

#[derive(Clone, Debug, PartialEq)]
pub struct SubscribeToSystemEvent {
    pub client_event_id: u32,
    pub event_name: String,
}

#[derive(Clone, Debug, PartialEq)]
pub struct RequestSystemState {
    pub request_id: u32,
    pub state_name: String,
}

#[derive(Clone, Debug, PartialEq)]
pub struct RequestJoystickDeviceInfo {
    pub request_id: u32,
}

#[derive(Clone, Debug, PartialEq)]
pub enum ClientMessage {
    Open(Open),
    MapClientEventToSimEvent(MapClientEventToSimEvent),
    TransmitClientEvent(TransmitClientEvent),
    AddClientEventToNotificationGroup(AddClientEventToNotificationGroup),
    SetNotificationGroupPriority(SetNotificationGroupPriority),
    AddToDataDefinition(AddToDataDefinition),
    RequestDataOnSimObject(RequestDataOnSimObject),
    MapInputEventToClientEvent(MapInputEventToClientEvent),
    SetInputGroupPriority(SetInputGroupPriority),
    SetInputGroupState(SetInputGroupState),
    SubscribeToSystemEvent(SubscribeToSystemEvent),
    RequestSystemState(RequestSystemState),
    RequestJoystickDeviceInfo(RequestJoystickDeviceInfo),
}

impl ClientMessage {
    pub fn code(&self) -> u32 {
        match self {
            ClientMessage::Open(_) => 0x01,
            ClientMessage::MapClientEventToSimEvent(_) => 0x04,
            ClientMessage::TransmitClientEvent(_) => 0x05,
            ClientMessage::AddClientEventToNotificationGroup(_) => 0x07,
            ClientMessage::SetNotificationGroupPriority(_) => 0x09,
            ClientMessage::AddToDataDefinition(_) => 0x0C,
            ClientMessage::RequestDataOnSimObject(_) => 0x0E,
            ClientMessage::MapInputEventToClientEvent(_) => 0x11,
            ClientMessage::SetInputGroupPriority(_) => 0x12,
            ClientMessage::SetInputGroupState(_) => 0x15,
            ClientMessage::SubscribeToSystemEvent(_) => 0x17,
            ClientMessage::RequestSystemState(_) => 0x35,
            ClientMessage::RequestJoystickDeviceInfo(_) => 0xB9,
        }
    }

    fn write_body(&self, w: &mut Writer) {
        match self {
            ClientMessage::Open(m) => {
                w.fixed_str(&m.app_name, 256);
                w.u32(m.reserved1);
                w.u8(m.reserved2);
                w.fixed_str(&m.sim_id, 3);
                w.u32(m.version[0]);
                w.u32(m.version[1]);
                w.u32(m.build[0]);
                w.u32(m.build[1]);
            }
            ClientMessage::MapClientEventToSimEvent(m) => {
                w.u32(m.event_id);
                w.fixed_str(&m.event_name, 256);
            }
            ClientMessage::TransmitClientEvent(m) => {
                w.u32(m.object_id);
                w.u32(m.event_id);
                w.u32(m.data);
                w.u32(m.group_id);
                w.u32(m.flags);
            }
            ClientMessage::AddClientEventToNotificationGroup(m) => {
                w.u32(m.group_id);
                w.u32(m.event_id);
                w.u32(m.maskable);
            }
            ClientMessage::SetNotificationGroupPriority(m) => {
                w.u32(m.group_id);
                w.u32(m.priority);
            }
            ClientMessage::AddToDataDefinition(m) => {
                w.u32(m.definition_id);
                w.fixed_str(&m.datum_name, 256);
                w.fixed_str(&m.units_name, 256);
                w.u32(m.data_type);
                w.f32(m.epsilon);
                w.u32(m.datum_id);
            }
            ClientMessage::RequestDataOnSimObject(m) => {
                w.u32(m.request_id);
                w.u32(m.definition_id);
                w.u32(m.object_id);
                w.u32(m.period);
                w.u32(m.flags);
                w.u32(m.origin);
                w.u32(m.interval);
                w.u32(m.limit);
            }
            ClientMessage::MapInputEventToClientEvent(m) => {
                w.u32(m.group_id);
                w.fixed_str(&m.definition, 256);
                w.u32(m.down_id);
                w.u32(m.down_value);
                w.u32(m.up_id);
                w.u32(m.up_value);
                w.u32(m.maskable);
            }
            ClientMessage::SetInputGroupPriority(m) => {
                w.u32(m.group_id);
                w.u32(m.priority);
            }
            ClientMessage::SetInputGroupState(m) => {
                w.u32(m.group_id);
                w.u32(m.state);
            }
            ClientMessage::SubscribeToSystemEvent(m) => {
                w.u32(m.client_event_id);
                w.fixed_str(&m.event_name, 256);
            }
            ClientMessage::RequestSystemState(m) => {
                w.u32(m.request_id);
                w.fixed_str(&m.state_name, 256);
            }
            ClientMessage::RequestJoystickDeviceInfo(m) => {
                w.u32(m.request_id);
            }
        }
    }

    fn read_body(code: u32, r: &mut Reader) -> Result<Self, CodecError> {
        Ok(match code {
            0x01 => ClientMessage::Open(Open {
                app_name: r.fixed_str(256)?,
                reserved1: r.u32()?,
                reserved2: r.u8()?,
                sim_id: r.fixed_str(3)?,
                version: [r.u32()?, r.u32()?],
                build: [r.u32()?, r.u32()?],
            }),
            0x04 => ClientMessage::MapClientEventToSimEvent(MapClientEventToSimEvent {
                event_id: r.u32()?,
                event_name: r.fixed_str(256)?,
            }),
            0x05 => ClientMessage::TransmitClientEvent(TransmitClientEvent {
                object_id: r.u32()?,
                event_id: r.u32()?,
                data: r.u32()?,
                group_id: r.u32()?,
                flags: r.u32()?,
            }),
            0x07 => ClientMessage::AddClientEventToNotificationGroup(AddClientEventToNotificationGroup {
                group_id: r.u32()?,
                event_id: r.u32()?,
                maskable: r.u32()?,
            }),
            0x09 => ClientMessage::SetNotificationGroupPriority(SetNotificationGroupPriority {
                group_id: r.u32()?,
                priority: r.u32()?,
            }),
            0x0C => ClientMessage::AddToDataDefinition(AddToDataDefinition {
                definition_id: r.u32()?,
                datum_name: r.fixed_str(256)?,
                units_name: r.fixed_str(256)?,
                data_type: r.u32()?,
                epsilon: r.f32()?,
                datum_id: r.u32()?,
            }),
            0x0E => ClientMessage::RequestDataOnSimObject(RequestDataOnSimObject {
                request_id: r.u32()?,
                definition_id: r.u32()?,
                object_id: r.u32()?,
                period: r.u32()?,
                flags: r.u32()?,
                origin: r.u32()?,
                interval: r.u32()?,
                limit: r.u32()?,
            }),
            0x11 => ClientMessage::MapInputEventToClientEvent(MapInputEventToClientEvent {
                group_id: r.u32()?,
                definition: r.fixed_str(256)?,
                down_id: r.u32()?,
                down_value: r.u32()?,
                up_id: r.u32()?,
                up_value: r.u32()?,
                maskable: r.u32()?,
            }),
            0x12 => ClientMessage::SetInputGroupPriority(SetInputGroupPriority {
                group_id: r.u32()?,
                priority: r.u32()?,
            }),
            0x15 => ClientMessage::SetInputGroupState(SetInputGroupState {
                group_id: r.u32()?,
                state: r.u32()?,
            }),
            0x17 => ClientMessage::SubscribeToSystemEvent(SubscribeToSystemEvent {
                client_event_id: r.u32()?,
                event_name: r.fixed_str(256)?,
            }),
            0x35 => ClientMessage::RequestSystemState(RequestSystemState {
                request_id: r.u32()?,
                state_name: r.fixed_str(256)?,
            }),
            0xB9 => ClientMessage::RequestJoystickDeviceInfo(RequestJoystickDeviceInfo {
                request_id: r.u32()?,
            }),
            other => {
                return Err(CodecError::UnknownCode {
                    direction: Direction::Client,
                    code: other,
                })
            }
        })
    }
}

// ----------------------------------------------------------------------
// Server -> Client
// ----------------------------------------------------------------------

#[derive(Clone, Debug, PartialEq)]
pub struct Exception {
    pub exception: u32,
    pub send_id: u32,
    pub index: u32,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ServerOpen {
    pub app_name: String,
    pub app_ver: [u32; 2],
    pub app_build: [u32; 2],
    pub sc_ver: [u32; 2],
    pub sc_build: [u32; 2],
    pub reserved1: u32,
    pub reserved2: u32,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Event {
    pub group_id: u32,
    pub event_id: u32,
    pub data: i32,
    pub flags: u32,
}

#[derive(Clone, Debug, PartialEq)]
pub struct SimObjectData {
    pub request_id: u32,
    pub object_id: u32,
    pub definition_id: u32,
    pub flags: u32,
    pub entry_number: u32,
    pub out_of: u32,
    pub define_count: u32,
    pub data: Vec<u8>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct SystemState {
    pub request_id: u32,
    pub data_integer: u32,
    pub data_float: f32,
    pub data_string: String,
}

#[derive(Clone, Debug, PartialEq)]
pub struct JoystickInfo {
    pub name: String,
    pub number: u32,
}

#[derive(Clone, Debug, PartialEq)]
pub struct JoystickDeviceInfo {
    pub request_id: u32,
    pub joysticks: Vec<JoystickInfo>,
}

#[derive(Clone, Debug, PartialEq)]
pub enum ServerMessage {
    Exception(Exception),
    Open(ServerOpen),
    Quit,
    Event(Event),
    SimObjectData(SimObjectData),
    SystemState(SystemState),
    JoystickDeviceInfo(JoystickDeviceInfo),
}

impl ServerMessage {
    pub fn code(&self) -> u32 {
        match self {
            ServerMessage::Exception(_) => 0x01,
            ServerMessage::Open(_) => 0x02,
            ServerMessage::Quit => 0x03,
            ServerMessage::Event(_) => 0x04,
            ServerMessage::SimObjectData(_) => 0x08,
            ServerMessage::SystemState(_) => 0x0F,
            ServerMessage::JoystickDeviceInfo(_) => 0x40,
        }
    }

    fn write_body(&self, w: &mut Writer) {
        match self {
            ServerMessage::Exception(m) => {
                w.u32(m.exception);
                w.u32(m.send_id);
                w.u32(m.index);
            }
            ServerMessage::Open(m) => {
                w.fixed_str(&m.app_name, 256);
                w.u32(m.app_ver[0]);
                w.u32(m.app_ver[1]);
                w.u32(m.app_build[0]);
                w.u32(m.app_build[1]);
                w.u32(m.sc_ver[0]);
                w.u32(m.sc_ver[1]);
                w.u32(m.sc_build[0]);
                w.u32(m.sc_build[1]);
                w.u32(m.reserved1);
                w.u32(m.reserved2);
            }
            ServerMessage::Quit => {}
            ServerMessage::Event(m) => {
                w.u32(m.group_id);
                w.u32(m.event_id);
                w.i32(m.data);
                w.u32(m.flags);
            }
            ServerMessage::SimObjectData(m) => {
                w.u32(m.request_id);
                w.u32(m.object_id);
                w.u32(m.definition_id);
                w.u32(m.flags);
                w.u32(m.entry_number);
                w.u32(m.out_of);
                w.u32(m.define_count);
                w.bytes(&m.data);
            }
            ServerMessage::SystemState(m) => {
                w.u32(m.request_id);
                w.u32(m.data_integer);
                w.f32(m.data_float);
                w.fixed_str(&m.data_string, 260);
            }
            ServerMessage::JoystickDeviceInfo(m) => {
                w.u32(m.request_id);
                // count is auto-derived from the array length before serialisation.
                w.u32(m.joysticks.len() as u32);
                for j in &m.joysticks {
                    w.fixed_str(&j.name, 128);
                    w.u32(j.number);
                }
            }
        }
    }

    fn read_body(code: u32, r: &mut Reader) -> Result<Self, CodecError> {
        Ok(match code {
            0x01 => ServerMessage::Exception(Exception {
                exception: r.u32()?,
                send_id: r.u32()?,
                index: r.u32()?,
            }),
            0x02 => ServerMessage::Open(ServerOpen {
                app_name: r.fixed_str(256)?,
                app_ver: [r.u32()?, r.u32()?],
                app_build: [r.u32()?, r.u32()?],
                sc_ver: [r.u32()?, r.u32()?],
                sc_build: [r.u32()?, r.u32()?],
                reserved1: r.u32()?,
                reserved2: r.u32()?,
            }),
            0x03 => ServerMessage::Quit,
            0x04 => ServerMessage::Event(Event {
                group_id: r.u32()?,
                event_id: r.u32()?,
                data: r.i32()?,
                flags: r.u32()?,
            }),
            0x08 => {
                let request_id = r.u32()?;
                let object_id = r.u32()?;
                let definition_id = r.u32()?;
                let flags = r.u32()?;
                let entry_number = r.u32()?;
                let out_of = r.u32()?;
                let define_count = r.u32()?;
                let data = r.remaining().to_vec();
                ServerMessage::SimObjectData(SimObjectData {
                    request_id,
                    object_id,
                    definition_id,
                    flags,
                    entry_number,
                    out_of,
                    define_count,
                    data,
                })
            }
            0x0F => ServerMessage::SystemState(SystemState {
                request_id: r.u32()?,
                data_integer: r.u32()?,
                data_float: r.f32()?,
                data_string: r.fixed_str(260)?,
            }),
            0x40 => {
                let request_id = r.u32()?;
                let count = r.u32()? as usize;
                let mut joysticks = Vec::with_capacity(count);
                for _ in 0..count {
                    joysticks.push(JoystickInfo {
                        name: r.fixed_str(128)?,
                        number: r.u32()?,
                    });
                }
                ServerMessage::JoystickDeviceInfo(JoystickDeviceInfo { request_id, joysticks })
            }
            other => {
                return Err(CodecError::UnknownCode {
                    direction: Direction::Server,
                    code: other,
                })
            }
        })
    }
}

/// `SimObjectData` (and, were it implemented, `SimObjectDataByType`) is the
/// only message whose wire size can legitimately exceed what its declared
/// fields account for - the slack is the data blob. Every other message
/// must consume its body exactly.
fn allows_tail(code: u32) -> bool {
    code == 0x08
}

pub fn encode_client(msg: &ClientMessage, protocol: u32, counter: u32) -> Vec<u8> {
    let mut body = Writer::new();
    msg.write_body(&mut body);
    let body = body.into_vec();
    let size = (CLIENT_HEADER_SIZE + body.len()) as u32;
    let code = msg.code() | 0xF000_0000;

    let mut w = Writer::new();
    w.u32(size);
    w.u32(protocol);
    w.u32(code);
    w.u32(counter);
    w.bytes(&body);
    w.into_vec()
}

pub fn encode_server(msg: &ServerMessage, protocol: u32) -> Vec<u8> {
    let mut body = Writer::new();
    msg.write_body(&mut body);
    let body = body.into_vec();
    let size = (SERVER_HEADER_SIZE + body.len()) as u32;

    let mut w = Writer::new();
    w.u32(size);
    w.u32(protocol);
    w.u32(msg.code());
    w.bytes(&body);
    w.into_vec()
}

/// Parses one client message from the front of `buf`. Returns `Ok(None)` if
/// there isn't a full frame yet (never consumes in that case).
pub fn decode_client(buf: &[u8]) -> Result<Option<(ClientMessage, u32, u32, usize)>, CodecError> {
    if buf.len() < CLIENT_HEADER_SIZE {
        return Ok(None);
    }
    let mut header = Reader::new(&buf[..CLIENT_HEADER_SIZE]);
    let total_size = header.u32()?;
    let protocol = header.u32()?;
    let code_raw = header.u32()?;
    let counter = header.u32()?;

    if (total_size as usize) < CLIENT_HEADER_SIZE {
        return Err(CodecError::ShortFrame {
            declared: total_size,
            header: CLIENT_HEADER_SIZE,
        });
    }
    if buf.len() < total_size as usize {
        return Ok(None);
    }

    let code = mask_code(code_raw);
    let body = &buf[CLIENT_HEADER_SIZE..total_size as usize];
    let mut r = Reader::new(body);
    let msg = ClientMessage::read_body(code, &mut r)?;
    if r.consumed() != body.len() {
        return Err(CodecError::TailMismatch {
            code,
            declared: body.len(),
            consumed: r.consumed(),
        });
    }
    Ok(Some((msg, protocol, counter, total_size as usize)))
}

/// Parses one server message from the front of `buf`. Used by the codec's
/// own tests to verify the round-trip guarantee; the core itself never
/// needs to decode its own outbound traffic in production.
pub fn decode_server(buf: &[u8]) -> Result<Option<(ServerMessage, u32, usize)>, CodecError> {
    if buf.len() < SERVER_HEADER_SIZE {
        return Ok(None);
    }
    let mut header = Reader::new(&buf[..SERVER_HEADER_SIZE]);
    let total_size = header.u32()?;
    let protocol = header.u32()?;
    let code_raw = header.u32()?;

    if (total_size as usize) < SERVER_HEADER_SIZE {
        return Err(CodecError::ShortFrame {
            declared: total_size,
            header: SERVER_HEADER_SIZE,
        });
    }
    if buf.len() < total_size as usize {
        return Ok(None);
    }

    let code = mask_code(code_raw);
    let body = &buf[SERVER_HEADER_SIZE..total_size as usize];
    let mut r = Reader::new(body);
    let msg = ServerMessage::read_body(code, &mut r)?;
    if r.consumed() != body.len() && !allows_tail(code) {
        return Err(CodecError::TailMismatch {
            code,
            declared: body.len(),
            consumed: r.consumed(),
        });
    }
    Ok(Some((msg, protocol, total_size as usize)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_open_round_trips() {
        let msg = ClientMessage::Open(Open {
            app_name: "FSForce".into(),
            reserved1: 0,
            reserved2: 0,
            sim_id: "D3P".into(),
            version: [4, 3],
            build: [0, 0],
        });
        let bytes = encode_client(&msg, 2, 7);
        let (decoded, protocol, counter, consumed) = decode_client(&bytes).unwrap().unwrap();
        assert_eq!(decoded, msg);
        assert_eq!(protocol, 2);
        assert_eq!(counter, 7);
        assert_eq!(consumed, bytes.len());
    }

    #[test]
    fn masks_high_bits_of_client_code() {
        let msg = ClientMessage::RequestJoystickDeviceInfo(RequestJoystickDeviceInfo { request_id: 3 });
        let bytes = encode_client(&msg, 1, 1);
        // high nibble of the code word must read back as 0xF on the wire
        assert_eq!(bytes[11] & 0xF0, 0xF0);
        let (decoded, ..) = decode_client(&bytes).unwrap().unwrap();
        assert_eq!(decoded, msg);
    }

    #[test]
    fn unknown_client_code_is_an_error() {
        let mut w = Writer::new();
        w.u32(16);
        w.u32(1);
        w.u32(0xF000_1234);
        w.u32(0);
        let bytes = w.into_vec();
        let err = decode_client(&bytes).unwrap_err();
        assert!(matches!(
            err,
            CodecError::UnknownCode {
                direction: Direction::Client,
                code: 0x1234
            }
        ));
    }

    #[test]
    fn incomplete_frame_yields_none_without_consuming() {
        let msg = ClientMessage::SetInputGroupState(SetInputGroupState { group_id: 1, state: 1 });
        let bytes = encode_client(&msg, 1, 1);
        assert!(decode_client(&bytes[..bytes.len() - 1]).unwrap().is_none());
    }

    #[test]
    fn server_sim_object_data_round_trips_with_tail() {
        let msg = ServerMessage::SimObjectData(SimObjectData {
            request_id: 9,
            object_id: 0,
            definition_id: 1,
            flags: 0,
            entry_number: 1,
            out_of: 1,
            define_count: 1,
            data: 97.192_f64.to_le_bytes().to_vec(),
        });
        let bytes = encode_server(&msg, 2);
        let (decoded, protocol, consumed) = decode_server(&bytes).unwrap().unwrap();
        assert_eq!(decoded, msg);
        assert_eq!(protocol, 2);
        assert_eq!(consumed, bytes.len());
    }

    #[test]
    fn server_open_round_trips() {
        let msg = ServerMessage::Open(ServerOpen {
            app_name: "Lockheed Martin® Prepar3D® v4".into(),
            app_ver: [4, 3],
            app_build: [29, 25520],
            sc_ver: [4, 3],
            sc_build: [0, 0],
            reserved1: 5,
            reserved2: 0,
        });
        let bytes = encode_server(&msg, 2);
        let (decoded, ..) = decode_server(&bytes).unwrap().unwrap();
        assert_eq!(decoded, msg);
    }

    #[test]
    fn joystick_device_info_auto_updates_count() {
        let msg = ServerMessage::JoystickDeviceInfo(JoystickDeviceInfo {
            request_id: 1,
            joysticks: vec![
                JoystickInfo { name: "Saitek Pro Flight Rudder Pedals".into(), number: 0 },
                JoystickInfo { name: "Iris Dynamics Yoke".into(), number: 1 },
            ],
        });
        let bytes = encode_server(&msg, 1);
        let (decoded, ..) = decode_server(&bytes).unwrap().unwrap();
        match decoded {
            ServerMessage::JoystickDeviceInfo(j) => assert_eq!(j.joysticks.len(), 2),
            _ => panic!("wrong variant"),
        }
    }
}
