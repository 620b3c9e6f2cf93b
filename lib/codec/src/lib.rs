//! Wire framing and message catalog for the legacy SimConnect-style TCP
//! protocol this bridge speaks to its clients.

mod error;
mod frame;
mod messages;
mod strings;
mod value;

pub use error::{CodecError, Direction};
pub use frame::{Reader, Writer};
pub use messages::{
    decode_client, decode_server, encode_client, encode_server, AddClientEventToNotificationGroup,
    AddToDataDefinition, ClientMessage, Event, Exception, JoystickDeviceInfo, JoystickInfo,
    MapClientEventToSimEvent, MapInputEventToClientEvent, Open, RequestDataOnSimObject,
    RequestJoystickDeviceInfo, RequestSystemState, ServerMessage, ServerOpen,
    SetInputGroupPriority, SetInputGroupState, SetNotificationGroupPriority, SimObjectData,
    SubscribeToSystemEvent, SystemState, TransmitClientEvent, CLIENT_HEADER_SIZE,
    SERVER_HEADER_SIZE,
};
pub use strings::{decode_fixed, encode_fixed};
pub use value::{encode_value, DataType, DatumValue};
