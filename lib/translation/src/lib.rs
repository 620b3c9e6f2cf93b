//! Translates SimConnect variable names into the live sim's own variable
//! names and units, the way `geo` translated raw coordinates into the
//! units a logbook entry wanted.

use std::collections::HashMap;

use codec::DatumValue;

/// Whatever backs the current variable values a synthesizer function may
/// need to consult. Implemented by the session's cache wrapper in the
/// main crate; implemented here for `HashMap` too, for tests.
pub trait VarSource {
    fn get(&self, name: &str) -> Option<DatumValue>;
}

impl VarSource for HashMap<String, DatumValue> {
    fn get(&self, name: &str) -> Option<DatumValue> {
        HashMap::get(self, name).cloned()
    }
}

/// Either a direct rename of a live variable, a function that fabricates a
/// value the live sim doesn't expose, or nothing (the default is always
/// returned).
#[derive(Clone, Copy)]
pub enum LiveSource {
    Variable(&'static str),
    Synthesizer(fn(&dyn VarSource) -> DatumValue),
    None,
}

#[derive(Clone, Copy)]
pub struct TranslationEntry {
    pub live: LiveSource,
    pub live_unit: Option<&'static str>,
    pub default: DefaultValue,
}

#[derive(Clone, Copy)]
pub enum DefaultValue {
    Number(f64),
    Bool(bool),
    Text(&'static str),
}

impl DefaultValue {
    pub fn to_datum(self) -> DatumValue {
        match self {
            DefaultValue::Number(n) => DatumValue::Number(n),
            DefaultValue::Bool(b) => DatumValue::Bool(b),
            DefaultValue::Text(s) => DatumValue::Text(s.to_string()),
        }
    }
}

fn spoof_airplane_name(_vars: &dyn VarSource) -> DatumValue {
    DatumValue::Text("Alabeo Extra 300s Halcones".to_string())
}

fn spoof_center_wheel_rpm(vars: &dyn VarSource) -> DatumValue {
    let on_ground = matches!(vars.get("Aircraft.Status.OnGround"), Some(DatumValue::Bool(true)));
    if !on_ground {
        return DatumValue::Number(0.0);
    }
    let ground_speed = vars
        .get("Aircraft.Position.GroundSpeed.Value")
        .and_then(|v| v.as_f64())
        .unwrap_or(0.0);
    let tire_circumference = 1.5;
    let revs_per_sec = ground_speed / tire_circumference;
    DatumValue::Number(revs_per_sec * 60.0)
}

macro_rules! entry {
    (None, $unit:expr, $default:expr) => {
        TranslationEntry { live: LiveSource::None, live_unit: $unit, default: $default }
    };
    ($live:expr, $unit:expr, $default:expr) => {
        TranslationEntry { live: LiveSource::Variable($live), live_unit: $unit, default: $default }
    };
}

/// The SimConnect-variable-name (lowercased) to live-sim-variable mapping.
/// Grounded directly on the original bridge's variable table; every row
/// here has a matching row there, including the two synthesizer functions.
pub fn lookup(sim_connect_name: &str) -> Option<TranslationEntry> {
    let key = sim_connect_name.to_lowercase();
    TABLE.iter().find(|(name, _)| *name == key).map(|(_, e)| *e)
}

static TABLE: &[(&str, TranslationEntry)] = &[
    ("title", (TranslationEntry {
        live: LiveSource::Synthesizer(spoof_airplane_name),
        live_unit: None,
        default: DefaultValue::Text("my plane"),
    })),
    ("category", entry!(None, None, DefaultValue::Text("Airplane"))),
    ("is slew active", entry!(None, None, DefaultValue::Bool(false))),
    ("airspeed true", entry!("Aircraft.Position.Airspeed.True", Some("meters per second"), DefaultValue::Number(0.0))),
    ("airspeed indicated", entry!("Aircraft.Position.Airspeed.Indicated", Some("meters per second"), DefaultValue::Number(0.0))),
    ("ground velocity", entry!("Aircraft.Position.GroundSpeed.Value", Some("meters per second"), DefaultValue::Number(0.0))),
    ("autopilot altitude lock", entry!(None, Some("bool"), DefaultValue::Bool(false))),
    ("autopilot approach hold", entry!(None, Some("bool"), DefaultValue::Bool(false))),
    ("autopilot attitude hold", entry!(None, Some("bool"), DefaultValue::Bool(false))),
    ("autopilot backcourse hold", entry!(None, Some("bool"), DefaultValue::Bool(false))),
    ("autopilot glideslope hold", entry!(None, Some("bool"), DefaultValue::Bool(false))),
    ("autopilot heading lock", entry!(None, Some("bool"), DefaultValue::Bool(false))),
    ("autopilot master", entry!(None, Some("bool"), DefaultValue::Bool(false))),
    ("autopilot nav1 lock", entry!(None, Some("bool"), DefaultValue::Bool(false))),
    ("autopilot vertical hold", entry!(None, Some("bool"), DefaultValue::Bool(false))),
    ("sim on ground", entry!("Aircraft.Status.OnGround", Some("bool"), DefaultValue::Bool(true))),
    ("stall alpha", entry!("Aircraft.Properties.Dynamics.StallAlpha", Some("radians"), DefaultValue::Number(0.26))),
    ("pitot ice pct", entry!("Aircraft.Status.PitotIce.Percent", Some("percent over 100"), DefaultValue::Number(0.0))),
    ("plane latitude", entry!("Aircraft.Position.Latitude", Some("degrees"), DefaultValue::Number(0.0))),
    ("plane longitude", entry!("Aircraft.Position.Longitude", Some("degrees"), DefaultValue::Number(0.0))),
    ("cable caught by tailhook", entry!(None, Some("bool"), DefaultValue::Bool(false))),
    ("plane alt above ground", entry!("Aircraft.Position.Altitude.Radar", Some("meters"), DefaultValue::Number(0.0))),
    ("plane altitude", entry!("Aircraft.Position.Altitude.True", Some("meters"), DefaultValue::Number(0.0))),
    ("center wheel rpm", (TranslationEntry {
        live: LiveSource::Synthesizer(spoof_center_wheel_rpm),
        live_unit: Some("rpm"),
        default: DefaultValue::Number(0.0),
    })),
    ("velocity world y", entry!("Aircraft.Position.VerticalSpeed.Value", Some("meters per second"), DefaultValue::Number(0.0))),
    ("gear handle position", entry!("Aircraft.Input.GearLever.Down", Some("percent"), DefaultValue::Bool(true))),
    ("general eng pct max rpm:1", entry!("Aircraft.Engine.1.Piston.RPMPercent", Some("percent"), DefaultValue::Number(50.0))),
    ("general eng throttle lever position:1", entry!("Aircraft.Controls.Engine.Throttle", Some("percent"), DefaultValue::Number(50.0))),
    ("turb eng afterburner:1", entry!(None, None, DefaultValue::Bool(false))),
    ("turb eng n1:1", entry!(None, None, DefaultValue::Number(0.0))),
    ("plane bank degrees", entry!("Aircraft.Position.Bank.Value", Some("radians"), DefaultValue::Number(0.0))),
    ("elevator position", entry!("Aircraft.Input.Pitch", Some("percent"), DefaultValue::Number(0.0))),
    ("aileron left deflection pct", entry!("Aircraft.Surfaces.Aileron.Left.Percent", Some("percent"), DefaultValue::Number(0.0))),
    ("elevator trim position", entry!("Aircraft.Surfaces.Elevator.Trim.Angle", Some("radians"), DefaultValue::Number(0.0))),
    ("rotation velocity body x", entry!("Aircraft.Velocity.Rotation.Local.X", Some("radians per second"), DefaultValue::Number(0.0))),
    ("rotation velocity body y", entry!("Aircraft.Velocity.Rotation.Local.Y", Some("radians per second"), DefaultValue::Number(0.0))),
    ("rotation velocity body z", entry!("Aircraft.Velocity.Rotation.Local.Z", Some("radians per second"), DefaultValue::Number(0.0))),
    ("aircraft wind y", entry!("World.Wind.Velocity.Local.Y", Some("meters per second"), DefaultValue::Number(5.0))),
    ("incidence alpha", entry!("Aircraft.Dynamics.Alpha", Some("radians"), DefaultValue::Number(0.1))),
    ("stall warning", entry!(None, Some("bool"), DefaultValue::Bool(false))),
    ("surface type", entry!(None, None, DefaultValue::Number(4.0))),
    ("gear center position", entry!(None, None, DefaultValue::Number(0.0))),
    ("gear left position", entry!(None, None, DefaultValue::Number(0.0))),
    ("gear right position", entry!(None, None, DefaultValue::Number(0.0))),
    ("is gear retractable", entry!(None, Some("bool"), DefaultValue::Bool(true))),
    ("visual model radius", entry!(None, None, DefaultValue::Number(16.4))),
    ("is tail dragger", entry!(None, Some("bool"), DefaultValue::Bool(false))),
    ("design speed vc", entry!(None, None, DefaultValue::Number(20.0))),
    ("design speed vs0", entry!(None, None, DefaultValue::Number(20.0))),
    ("engine type", entry!(None, None, DefaultValue::Number(0.0))),
];

/// Converts a value expressed in `live_unit` into `sim_connect_unit`.
/// Unrecognised unit pairs are logged and `None` is returned, so the
/// datum they belong to drops out of the emission entirely rather than
/// going out on the wire unconverted.
pub fn convert_unit(value: DatumValue, live_unit: Option<&str>, sim_connect_unit: &str) -> Option<DatumValue> {
    let live_unit = live_unit.unwrap_or("").trim().to_lowercase();
    let sc_unit = sim_connect_unit.trim().to_lowercase();
    if live_unit == sc_unit {
        return Some(value);
    }
    let Some(n) = value.as_f64() else { return Some(value) };

    match (live_unit.as_str(), sc_unit.as_str()) {
        ("meters per second", "knots") => Some(DatumValue::Number(n * 1.94384)),
        ("radians", "degrees") | ("radians per second", "degrees per second") => {
            Some(DatumValue::Number(n * 57.2958))
        }
        ("meters", "feet") => Some(DatumValue::Number(n * 3.28084)),
        ("meters per second", "feet per minute") => Some(DatumValue::Number(n * 196.8504)),
        ("percent", "bool") => Some(DatumValue::Bool(n > 0.0)),
        _ => {
            log::warn!("no unit conversion from {:?} to {:?}", live_unit, sc_unit);
            None
        }
    }
}

/// Official event names the dispatcher either supports or has deliberately
/// chosen not to - present so an unrecognised client event name can be
/// flagged distinctly from one we simply haven't heard of before.
pub static KNOWN_SIM_EVENT_NAMES: &[&str] = &[
    "axis_left_brake_set",
    "axis_right_brake_set",
    "axis_elevator_set",
    "app_att_hold",
    "axis_ailerons_set",
    "takeoff_assist_fire",
];

pub static KNOWN_INPUT_EVENT_NAMES: &[&str] = &["joystick:0:yaxis", "joystick:0:xaxis"];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn looks_up_case_insensitively() {
        let entry = lookup("Plane Altitude").expect("known variable");
        assert!(matches!(entry.live, LiveSource::Variable("Aircraft.Position.Altitude.True")));
    }

    #[test]
    fn unknown_variable_returns_none() {
        assert!(lookup("not a real variable").is_none());
    }

    #[test]
    fn converts_radians_to_degrees() {
        let out = convert_unit(DatumValue::Number(1.0), Some("radians"), "degrees");
        assert_eq!(out, Some(DatumValue::Number(57.2958)));
    }

    #[test]
    fn converts_percent_to_bool() {
        let out = convert_unit(DatumValue::Number(100.0), Some("percent"), "bool");
        assert_eq!(out, Some(DatumValue::Bool(true)));
    }

    #[test]
    fn same_units_pass_through_unconverted() {
        let out = convert_unit(DatumValue::Number(42.0), Some("meters"), "meters");
        assert_eq!(out, Some(DatumValue::Number(42.0)));
    }

    #[test]
    fn unrecognised_unit_pair_is_omitted() {
        let out = convert_unit(DatumValue::Number(1.0), Some("percent over 100"), "percent");
        assert_eq!(out, None);
    }

    #[test]
    fn spoofed_center_wheel_rpm_is_zero_when_airborne() {
        let mut vars: HashMap<String, DatumValue> = HashMap::new();
        vars.insert("Aircraft.Status.OnGround".to_string(), DatumValue::Bool(false));
        assert_eq!(spoof_center_wheel_rpm(&vars), DatumValue::Number(0.0));
    }
}
