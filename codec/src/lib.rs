//! State records and queues for the statepack codec.
//!
//! This is the behavior crate that ties together `bitbuf` and `schema`:
//!
//! - [`State`] - one bit-packed record with typed, validated get/set,
//!   alias resolution and virtual decoded-field views
//! - [`StateQueue`] - ordered concatenation of states with the schema's
//!   encode/decode pipeline (bit transposition, gzip, zstd) and the
//!   transport envelope that couples peers through the schema hash
//! - [`delta_map`]/[`delta_maps`]/[`states_to_maps`] - map projections and
//!   change sets over sequences of states
//!
//! # Design Principles
//!
//! - **Correctness first** - Every invariant of the wire layout is tested;
//!   decode re-validates the payload structurally.
//! - **Single-threaded cooperative** - No locking; states and queues own
//!   their buffers exclusively, schemas are shared immutably.
//! - **Explicit errors** - Nothing panics on malformed input; every failure
//!   names the field, flag or map involved.

mod decoders;
mod delta;
mod error;
mod pipeline;
mod queue;
mod state;

pub use delta::{delta_map, delta_maps, states_to_maps};
pub use error::{CodecError, CodecResult};
pub use queue::{QueueEnvelope, StateQueue};
pub use state::State;

#[cfg(test)]
mod tests {
    use super::*;
    use schema::{FieldDef, StateSchema, Value};

    #[test]
    fn public_api_exports() {
        let schema = StateSchema::builder()
            .field(FieldDef::boolean("B"))
            .build()
            .unwrap();
        let _ = State::new(&schema);
        let _ = StateQueue::new(&schema);
        let _: CodecResult<()> = Ok(());
    }

    #[test]
    fn single_state_roundtrip_through_queue() {
        let schema = StateSchema::builder()
            .field(FieldDef::uint("N", 12))
            .build()
            .unwrap();
        let mut state = State::new(&schema);
        state.set("N", 0xABCu64).unwrap();

        let mut queue = StateQueue::new(&schema);
        queue.push(&state).unwrap();
        let data = queue.encode().unwrap();

        let mut decoded = StateQueue::new(&schema);
        decoded.decode(&data).unwrap();
        assert_eq!(
            decoded.state_at(0).unwrap().get("N").unwrap(),
            Value::Uint(0xABC)
        );
    }
}
