//! Map projections and deltas over sequences of states.

use std::collections::BTreeMap;

use schema::Value;

use crate::error::CodecResult;
use crate::state::State;

/// Converts a slice of states into their map projections.
pub fn states_to_maps(states: &[State<'_>]) -> CodecResult<Vec<BTreeMap<String, Value>>> {
    states.iter().map(State::to_map).collect()
}

/// Returns the names whose value differs between two states of one schema,
/// mapped to the value in `to`.
///
/// Both canonical and decoded fields are compared. Aliases of a changed
/// name are included alongside it, mapped to the same new value; an alias
/// never changes independently of its target because every write resolves
/// aliases first.
pub fn delta_map(from: &State<'_>, to: &State<'_>) -> CodecResult<BTreeMap<String, Value>> {
    let schema = to.schema();
    let mut delta = BTreeMap::new();

    let names = schema
        .fields()
        .iter()
        .map(|f| f.name())
        .chain(schema.decoded_fields().map(|d| d.name()));
    for name in names {
        let old = from.get(name)?;
        let new = to.get(name)?;
        if old != new {
            delta.insert(name.to_owned(), new);
        }
    }

    for (alias, target) in schema.aliases() {
        if let Some(value) = delta.get(target) {
            let value = value.clone();
            delta.insert(alias.to_owned(), value);
        }
    }
    Ok(delta)
}

/// Converts a sequence of states into a full first map followed by one
/// delta per successive pair.
pub fn delta_maps(states: &[State<'_>]) -> CodecResult<Vec<BTreeMap<String, Value>>> {
    let mut out = Vec::with_capacity(states.len());
    let Some(first) = states.first() else {
        return Ok(out);
    };
    out.push(first.to_map()?);
    for pair in states.windows(2) {
        out.push(delta_map(&pair[0], &pair[1])?);
    }
    Ok(out)
}
