//! Turns the active data request queue into outbound `SimObjectData`
//! messages once per tick. Grounded on the original bridge's
//! `DataRequestEvaluator` - same countdown/due/change-detection pipeline,
//! rewritten as a free function over owned collections instead of a
//! class holding mutable references into the connection handler.

use std::collections::{HashMap, VecDeque};

use codec::{encode_value, DatumValue, ServerMessage, SimObjectData};
use simlink::SimCache;
use translation::{LiveSource, VarSource};

use crate::session::{DataRequest, DatumSpec, Period};

/// Adapts a `SimCache` to the `translation` crate's `VarSource` trait so
/// synthesizer functions can read live values without this crate handing
/// `translation` a concrete cache type.
struct CacheSource<'a>(&'a SimCache);

impl VarSource for CacheSource<'_> {
    fn get(&self, name: &str) -> Option<DatumValue> {
        self.0.get(name).map(|v| match v {
            simlink::Value::Number(n) => DatumValue::Number(n),
            simlink::Value::Text(s) => DatumValue::Text(s),
        })
    }
}

/// Returns `None` when the datum's unit pair has no known conversion, in
/// which case it is omitted from the record entirely rather than sent
/// unconverted.
fn extract_value(spec: &DatumSpec, cache: &SimCache) -> Option<DatumValue> {
    let source = CacheSource(cache);
    let raw = match spec.live {
        LiveSource::Variable(name) => source.get(name).unwrap_or_else(|| spec.default.clone()),
        LiveSource::Synthesizer(f) => f(&source),
        LiveSource::None => spec.default.clone(),
    };
    translation::convert_unit(raw, spec.live_unit, &spec.client_unit)
}

/// Epsilon comparison matching the original: when both the previous and
/// current values are whole numbers, the epsilon itself is truncated to
/// an integer before the comparison, so a sub-1.0 epsilon can't mask a
/// real integer step on values like gear position.
fn has_changed(previous: Option<&DatumValue>, current: &DatumValue, epsilon: f32) -> bool {
    let Some(previous) = previous else { return true };
    match (previous, current) {
        (DatumValue::Number(p), DatumValue::Number(c)) => {
            let diff = (c - p).abs();
            if p.fract() == 0.0 && c.fract() == 0.0 {
                diff > (epsilon as i64) as f64
            } else {
                diff > epsilon as f64
            }
        }
        (DatumValue::Bool(p), DatumValue::Bool(c)) => p != c,
        (DatumValue::Text(p), DatumValue::Text(c)) => p != c,
        _ => true,
    }
}

/// Extracts, converts, and (if it passed the change test) encodes one
/// datum, recording its new value as the baseline for next time. A datum
/// whose unit pair doesn't convert is omitted (`extract_value` returned
/// `None`) and its baseline is left untouched.
fn gen_value(spec: &mut DatumSpec, tagged: bool, force: bool, cache: &SimCache) -> Option<Vec<u8>> {
    let current = extract_value(spec, cache)?;
    let changed = has_changed(spec.previous_value.as_ref(), &current, spec.epsilon);
    if !force && !changed {
        return None;
    }
    spec.previous_value = Some(current.clone());

    let mut bytes = Vec::new();
    if tagged {
        bytes.extend_from_slice(&spec.datum_id.to_le_bytes());
    }
    match encode_value(&current, spec.client_type) {
        Ok(encoded) => bytes.extend_from_slice(&encoded),
        Err(e) => {
            log::error!("failed to encode datum {:?}: {e}", spec.client_name);
            return None;
        }
    }
    Some(bytes)
}

/// Builds the `SimObjectData` for one due request, and whether the
/// request is now finished (`Once`/`Never` periods fire at most once).
fn gen_message(req: &mut DataRequest, defs: &mut [DatumSpec], cache: &SimCache) -> (Option<ServerMessage>, bool) {
    req.last_sent_at = Some(std::time::Instant::now());
    let finished = matches!(req.period, Period::Never | Period::Once);

    let mut entries = Vec::new();

    if req.only_when_changed && !req.tagged_format {
        // untagged + onlyWhenChanged: all-or-nothing across the whole definition
        let any_changed = defs.iter().any(|d| match extract_value(d, cache) {
            Some(current) => has_changed(d.previous_value.as_ref(), &current, d.epsilon),
            None => false,
        });
        if any_changed {
            for d in defs.iter_mut() {
                if let Some(bytes) = gen_value(d, false, true, cache) {
                    entries.push(bytes);
                }
            }
        }
    } else {
        let force = !req.only_when_changed;
        for d in defs.iter_mut() {
            if let Some(bytes) = gen_value(d, req.tagged_format, force, cache) {
                entries.push(bytes);
            }
        }
    }

    if entries.is_empty() {
        return (None, finished);
    }

    let define_count = entries.len() as u32;
    let data = entries.concat();
    let msg = ServerMessage::SimObjectData(SimObjectData {
        request_id: req.request_id,
        object_id: req.object_id,
        definition_id: req.definition_id,
        flags: req.flags,
        entry_number: 1,
        out_of: 1,
        define_count,
        data,
    });
    (Some(msg), finished)
}

/// Runs one tick of the data request evaluator over a session's active
/// requests, draining `Once`/`Never` requests that have now fired.
pub fn evaluate(
    requests: &mut VecDeque<DataRequest>,
    definitions: &mut HashMap<u32, Vec<DatumSpec>>,
    cache: &SimCache,
) -> Vec<ServerMessage> {
    let mut outgoing = Vec::new();
    let mut keep = VecDeque::with_capacity(requests.len());

    while let Some(mut req) = requests.pop_front() {
        let mut finished = false;
        if req.countdown_interval() && req.is_due() {
            match definitions.get_mut(&req.definition_id) {
                Some(defs) => {
                    let (msg, fin) = gen_message(&mut req, defs, cache);
                    finished = fin;
                    if let Some(msg) = msg {
                        outgoing.push(msg);
                    }
                }
                None => log::error!("data request {} references unknown definition {}", req.request_id, req.definition_id),
            }
        }
        if !finished {
            keep.push_back(req);
        }
    }

    *requests = keep;
    outgoing
}

#[cfg(test)]
mod tests {
    use super::*;
    use codec::DataType;
    use simlink::SimCache;

    fn spec(live: LiveSource, client_type: DataType, epsilon: f32) -> DatumSpec {
        DatumSpec {
            client_name: "test var".to_string(),
            client_unit: "meters".to_string(),
            client_type,
            epsilon,
            datum_id: 0,
            live,
            live_unit: Some("meters"),
            default: DatumValue::Number(0.0),
            previous_value: None,
        }
    }

    #[test]
    fn once_request_fires_exactly_once() {
        let cache = SimCache::new();
        let mut requests = VecDeque::new();
        requests.push_back(DataRequest {
            request_id: 1,
            object_id: 0,
            definition_id: 1,
            period: Period::Once,
            interval: 0,
            flags: 0,
            tagged_format: false,
            only_when_changed: false,
            send_countdown: 0,
            last_sent_at: None,
        });
        let mut defs = HashMap::new();
        defs.insert(1, vec![spec(LiveSource::None, DataType::Float64, 0.0)]);

        let first = evaluate(&mut requests, &mut defs, &cache);
        assert_eq!(first.len(), 1);
        assert!(requests.is_empty());

        let second = evaluate(&mut requests, &mut defs, &cache);
        assert!(second.is_empty());
    }

    #[test]
    fn untagged_unchanged_skips_emission_after_first_send() {
        let cache = SimCache::new();
        let mut requests = VecDeque::new();
        requests.push_back(DataRequest {
            request_id: 1,
            object_id: 0,
            definition_id: 1,
            period: Period::VisualFrame,
            interval: 0,
            flags: 0x01,
            tagged_format: false,
            only_when_changed: true,
            send_countdown: 0,
            last_sent_at: None,
        });
        let mut defs = HashMap::new();
        defs.insert(1, vec![spec(LiveSource::None, DataType::Float64, 0.0)]);

        let first = evaluate(&mut requests, &mut defs, &cache);
        assert_eq!(first.len(), 1);

        let second = evaluate(&mut requests, &mut defs, &cache);
        assert!(second.is_empty(), "unchanged value should not be resent");
    }

    #[test]
    fn integer_epsilon_is_truncated_for_whole_number_values() {
        // previous=10, current=10.6: both not whole so epsilon(0.5) applies directly -> changed
        assert!(has_changed(Some(&DatumValue::Number(10.0)), &DatumValue::Number(10.6), 0.5));
        // previous=10, current=11 (both whole): epsilon 0.5 truncates to 0 -> any difference counts
        assert!(has_changed(Some(&DatumValue::Number(10.0)), &DatumValue::Number(11.0), 0.5));
        // previous=10, current=10 (both whole, no change)
        assert!(!has_changed(Some(&DatumValue::Number(10.0)), &DatumValue::Number(10.0), 0.5));
    }

    #[test]
    fn unconvertible_unit_omits_the_datum_entirely() {
        let cache = SimCache::new();
        let mut requests = VecDeque::new();
        requests.push_back(DataRequest {
            request_id: 1,
            object_id: 0,
            definition_id: 1,
            period: Period::Once,
            interval: 0,
            flags: 0,
            tagged_format: true,
            only_when_changed: false,
            send_countdown: 0,
            last_sent_at: None,
        });
        let mut defs = HashMap::new();
        let mut bad_unit_spec = spec(LiveSource::None, DataType::Float64, 0.0);
        bad_unit_spec.live_unit = Some("percent over 100");
        bad_unit_spec.client_unit = "percent".to_string();
        defs.insert(1, vec![bad_unit_spec]);

        let out = evaluate(&mut requests, &mut defs, &cache);
        assert!(out.is_empty(), "a datum with no known unit conversion must not appear on the wire");
    }

    #[test]
    fn missing_definition_is_logged_and_skipped_without_panicking() {
        let cache = SimCache::new();
        let mut requests = VecDeque::new();
        requests.push_back(DataRequest {
            request_id: 1,
            object_id: 0,
            definition_id: 99,
            period: Period::Once,
            interval: 0,
            flags: 0,
            tagged_format: false,
            only_when_changed: false,
            send_countdown: 0,
            last_sent_at: None,
        });
        let mut defs = HashMap::new();
        let out = evaluate(&mut requests, &mut defs, &cache);
        assert!(out.is_empty());
    }
}
