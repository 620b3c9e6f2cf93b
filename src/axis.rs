//! The fixed table of live-sim axis variables that get re-scaled into
//! legacy SimConnect axis event values every tick. Grounded directly on
//! the original bridge's hardcoded `GenSimEvent`/`GenInputEvent` calls -
//! there was no configuration for this, just four axis lines and two
//! input lines.

/// A live-sim axis mapped onto an official SimConnect event name, routed
/// through a session's notification groups.
pub struct SimAxis {
    pub live_var: &'static str,
    pub event_name: &'static str,
    pub scale: f64,
    pub offset: f64,
    pub min: f64,
    pub max: f64,
}

/// A live-sim axis mapped onto a raw input definition string (e.g. a
/// joystick axis), routed through a session's input groups.
pub struct InputAxis {
    pub live_var: &'static str,
    pub definition: &'static str,
    pub scale: f64,
    pub offset: f64,
    pub min: f64,
    pub max: f64,
}

pub static SIM_AXES: &[SimAxis] = &[
    SimAxis {
        live_var: "Aircraft.Surfaces.Aileron.Left.Percent",
        event_name: "axis_ailerons_set",
        scale: -163.84,
        offset: 0.0,
        min: -16384.0,
        max: 16384.0,
    },
    SimAxis {
        live_var: "Aircraft.Surfaces.Elevator.Percent",
        event_name: "axis_elevator_set",
        scale: -163.84,
        offset: 0.0,
        min: -16384.0,
        max: 16384.0,
    },
    SimAxis {
        live_var: "Aircraft.Wheel.Left.Input.BrakeStrength",
        event_name: "axis_left_brake_set",
        scale: 327.68,
        offset: -16384.0,
        min: -16384.0,
        max: 16384.0,
    },
    SimAxis {
        live_var: "Aircraft.Wheel.Right.Input.BrakeStrength",
        event_name: "axis_right_brake_set",
        scale: 327.68,
        offset: -16384.0,
        min: -16384.0,
        max: 16384.0,
    },
];

pub static INPUT_AXES: &[InputAxis] = &[
    InputAxis {
        live_var: "Aircraft.Input.Pitch",
        definition: "joystick:0:xaxis",
        scale: 327.68,
        offset: 0.0,
        min: -32767.0,
        max: 32768.0,
    },
    InputAxis {
        live_var: "Aircraft.Input.Roll",
        definition: "joystick:0:yaxis",
        scale: 327.68,
        offset: 0.0,
        min: -32767.0,
        max: 32768.0,
    },
];

/// `value * scale + offset`, clamped to `[min, max]`, truncated to an
/// integer - matches the original's scale/offset/clamp/`int()` pipeline.
pub fn scale_and_clamp(value: f64, scale: f64, offset: f64, min: f64, max: f64) -> i32 {
    let v = value * scale + offset;
    let v = v.min(max).max(min);
    v as i32
}
