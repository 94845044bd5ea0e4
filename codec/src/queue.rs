//! Ordered queues of states sharing one schema.

use bitbuf::BitBuffer;
use schema::StateSchema;
use serde::{Deserialize, Serialize};

use crate::error::{CodecError, CodecResult};
use crate::pipeline::{decode_step, encode_step};
use crate::state::State;

/// A queue of states stored back to back in one bit buffer.
///
/// Every state occupies its byte-padded image (`schema.byte_size()` bytes),
/// so the buffer length is always a whole number of state images and
/// indexed access is a byte-offset computation. [`encode`](Self::encode)
/// runs the schema's encoder pipeline over the buffer;
/// [`decode`](Self::decode) runs the reverse pipeline and re-validates the
/// result structurally.
#[derive(Debug, Clone, PartialEq)]
pub struct StateQueue<'a> {
    schema: &'a StateSchema,
    buffer: BitBuffer,
}

impl<'a> StateQueue<'a> {
    /// Creates an empty queue over a schema.
    #[must_use]
    pub fn new(schema: &'a StateSchema) -> Self {
        Self {
            schema,
            buffer: BitBuffer::new(),
        }
    }

    /// Returns the schema this queue is bound to.
    #[must_use]
    pub fn schema(&self) -> &'a StateSchema {
        self.schema
    }

    /// Returns the number of states in the queue.
    #[must_use]
    pub fn len(&self) -> usize {
        let state_bytes = self.schema.byte_size();
        if state_bytes == 0 {
            0
        } else {
            self.buffer.byte_size() / state_bytes
        }
    }

    /// Returns `true` when the queue holds no states.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Returns the size of the internal buffer in bits.
    #[must_use]
    pub fn bit_size(&self) -> usize {
        self.buffer.bit_size()
    }

    /// Returns the size of the internal buffer in bytes.
    #[must_use]
    pub fn byte_size(&self) -> usize {
        self.buffer.byte_size()
    }

    /// Removes all states.
    pub fn clear(&mut self) {
        self.buffer.clear();
    }

    /// Appends a state's image at the end of the queue.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::SchemaMismatch`] when the state was built
    /// against a schema with a different content hash.
    pub fn push(&mut self, state: &State<'_>) -> CodecResult<()> {
        if state.schema().hash() != self.schema.hash() {
            return Err(CodecError::SchemaMismatch);
        }
        self.buffer
            .push_bits(state.as_bytes(), self.schema.byte_size() * 8);
        Ok(())
    }

    /// Pushes every state in order.
    pub fn push_all(&mut self, states: &[State<'_>]) -> CodecResult<()> {
        for state in states {
            self.push(state)?;
        }
        Ok(())
    }

    /// Removes and returns the first state.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::EmptyQueue`] when no states are stored.
    pub fn pop(&mut self) -> CodecResult<State<'a>> {
        if self.is_empty() {
            return Err(CodecError::EmptyQueue);
        }
        let image = self.buffer.pop_bits(self.schema.byte_size() * 8)?;
        let mut state = State::new(self.schema);
        state.load(image.as_bytes())?;
        Ok(state)
    }

    /// Returns the state at `index` without removing it.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::IndexOutOfRange`] past the end of the queue.
    pub fn state_at(&self, index: usize) -> CodecResult<State<'a>> {
        let len = self.len();
        if index >= len {
            return Err(CodecError::IndexOutOfRange { index, len });
        }
        let state_bytes = self.schema.byte_size();
        let start = index * state_bytes;
        let mut state = State::new(self.schema);
        state.load(&self.buffer.as_bytes()[start..start + state_bytes])?;
        Ok(state)
    }

    /// Decodes every state in the queue.
    pub fn states(&self) -> CodecResult<Vec<State<'a>>> {
        (0..self.len()).map(|i| self.state_at(i)).collect()
    }

    /// Lends each state's raw byte window to the callback, starting at state
    /// `from`; the callback may mutate the window in place and returns
    /// `true` to stop early.
    ///
    /// This allows in-place transforms across many states without
    /// re-allocating a decoded state per step.
    pub fn for_each_state_buffer<F>(&mut self, from: usize, mut f: F)
    where
        F: FnMut(&mut [u8]) -> bool,
    {
        let state_bytes = self.schema.byte_size();
        if state_bytes == 0 {
            return;
        }
        for window in self
            .buffer
            .as_bytes_mut()
            .chunks_exact_mut(state_bytes)
            .skip(from)
        {
            if f(window) {
                return;
            }
        }
    }

    /// Runs the encoder pipeline over a copy of the buffer and returns the
    /// resulting bytes.
    pub fn encode(&self) -> CodecResult<Vec<u8>> {
        let state_bits = self.schema.byte_size() * 8;
        let mut buffer = self.buffer.clone();
        for modifier in self.schema.encoder_pipeline() {
            buffer = encode_step(*modifier, buffer, state_bits)?;
        }
        Ok(buffer.into_bytes())
    }

    /// Clears the queue and repopulates it from an encoded payload.
    ///
    /// An empty payload yields an empty queue (never a decompressor error).
    /// After the decoder pipeline runs, the result must split into whole
    /// state images; each image is decoded once as a structural check, which
    /// doubles as a checksum when the payload comes from a peer.
    pub fn decode(&mut self, data: &[u8]) -> CodecResult<()> {
        self.clear();
        if data.is_empty() {
            return Ok(());
        }

        let state_bytes = self.schema.byte_size();
        let mut buffer = BitBuffer::from_bytes(data.to_vec());
        for modifier in self.schema.decoder_pipeline() {
            buffer = decode_step(modifier, buffer, state_bytes)?;
        }

        if state_bytes == 0 || buffer.byte_size() % state_bytes != 0 {
            return Err(CodecError::PayloadNotAligned {
                bytes: buffer.byte_size(),
                state_bytes,
            });
        }

        self.buffer = buffer;
        self.states()?;
        Ok(())
    }

    /// Packs the schema hash and the encoded payload into a transport
    /// envelope.
    pub fn envelope(&self) -> CodecResult<QueueEnvelope> {
        Ok(QueueEnvelope {
            schema: self.schema.hash_string(),
            payload: self.encode()?,
        })
    }

    /// Repopulates the queue from a transport envelope.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::SchemaMismatch`] when the envelope names a
    /// different schema hash.
    pub fn load_envelope(&mut self, envelope: &QueueEnvelope) -> CodecResult<()> {
        if envelope.schema != self.schema.hash_string() {
            return Err(CodecError::SchemaMismatch);
        }
        self.decode(&envelope.payload)
    }
}

/// Transport envelope pairing a schema hash with an encoded queue payload.
///
/// In JSON both members are strings: the schema hash in its standard base64
/// form, the payload base64-encoded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueEnvelope {
    /// Base64 SHA-256 of the schema both peers must share.
    pub schema: String,
    /// Encoded queue payload.
    #[serde(with = "base64_bytes")]
    pub payload: Vec<u8>,
}

mod base64_bytes {
    use base64::engine::general_purpose::STANDARD as BASE64;
    use base64::Engine as _;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&BASE64.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        BASE64
            .decode(encoded.as_bytes())
            .map_err(serde::de::Error::custom)
    }
}
