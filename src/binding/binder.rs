//! Binder: maps messages to handler arguments and back.
//!
//! Built once per handler from its [`HandlerSignature`]. Construction decides
//! which parameter receives the payload, the message, single headers, or the
//! whole header set, and rejects signatures where that choice is ambiguous.
//! After that the binder is read-only and can be shared between tasks.
//!
//! Legal signatures include:
//! - `(payload)`, `(message)`
//! - `(header "id", payload)`, `(header "a", header "b")`
//! - `(headers map, payload)`, `(headers properties, map payload)`
//! - `(properties, payload)`, where the unmarked properties loses the payload role
//!
//! Illegal ones include `(payload, payload)`, `(message, payload)` and
//! `(properties, map)`, where both mappings end up bound to the header set.

use std::collections::BTreeMap;

use serde_json::Value;
use tracing::debug;

use crate::binding::argument::{Argument, Outbound};
use crate::binding::parameter::{HandlerSignature, ParameterDescriptor, ParameterType};
use crate::error::{BindingError, SignatureError};
use crate::message::{Message, MessageBuilder, MessageHeaders};

/// Resolved role of one parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Slot {
    Payload,
    Envelope,
    Header { key: String, required: bool },
    /// Whole header set; `strings_only` for properties-typed parameters.
    Headers { strings_only: bool },
}

impl Slot {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Payload => "payload",
            Self::Envelope => "message",
            Self::Header { .. } => "header",
            Self::Headers { .. } => "headers",
        }
    }
}

/// Construction-validated mapping between messages and one handler's arguments.
#[derive(Debug, Clone)]
pub struct Binder {
    handler: String,
    descriptors: Vec<ParameterDescriptor>,
    slots: Vec<Slot>,
    payload_slot: Option<usize>,
    bulk_slot: Option<usize>,
    envelope_slot: Option<usize>,
}

impl Binder {
    /// Build a binder, failing if the signature cannot be bound unambiguously.
    pub fn new(signature: &HandlerSignature) -> Result<Self, SignatureError> {
        let descriptors = ParameterDescriptor::extract_all(signature)?;
        let handler = signature.name.clone();

        let envelopes: Vec<usize> = descriptors
            .iter()
            .filter(|d| d.is_envelope())
            .map(ParameterDescriptor::index)
            .collect();
        if envelopes.len() > 1 {
            return Err(SignatureError::MultipleEnvelopes {
                handler,
                indices: envelopes,
            });
        }

        let mut payload_candidates: Vec<&ParameterDescriptor> = descriptors
            .iter()
            .filter(|d| d.is_payload_candidate())
            .collect();

        // A mapping parameter next to another unmarked parameter is taken to
        // want the headers, not the payload.
        let mut implicit_bulk = Vec::new();
        if payload_candidates.len() > 1 {
            let (dropped, kept): (Vec<_>, Vec<_>) = payload_candidates
                .into_iter()
                .partition(|d| d.declared_type().is_bulk_capable());
            implicit_bulk = dropped.iter().map(|d| d.index()).collect();
            payload_candidates = kept;
        }

        if payload_candidates.len() + envelopes.len() > 1 {
            let candidates = payload_candidates
                .iter()
                .map(|d| d.label())
                .chain(envelopes.iter().map(|&i| descriptors[i].label()))
                .collect();
            return Err(SignatureError::AmbiguousPayload {
                handler,
                candidates,
            });
        }
        let payload_slot = payload_candidates.first().map(|d| d.index());
        let envelope_slot = envelopes.first().copied();

        let mut bulk: Vec<usize> = descriptors
            .iter()
            .filter(|d| d.is_bulk_metadata())
            .map(ParameterDescriptor::index)
            .chain(implicit_bulk)
            .collect();
        bulk.sort_unstable();
        if bulk.len() > 1 {
            return Err(SignatureError::MultipleBulkHeaders {
                handler,
                indices: bulk,
            });
        }
        let bulk_slot = bulk.first().copied();

        let slots = descriptors
            .iter()
            .map(|d| {
                if let Some(header) = d.header() {
                    Slot::Header {
                        key: header.key.clone(),
                        required: header.required,
                    }
                } else if Some(d.index()) == bulk_slot {
                    Slot::Headers {
                        strings_only: d.declared_type() == ParameterType::Properties,
                    }
                } else if Some(d.index()) == envelope_slot {
                    Slot::Envelope
                } else {
                    Slot::Payload
                }
            })
            .collect();

        debug!(
            handler = %handler,
            parameters = descriptors.len(),
            payload_slot = ?payload_slot,
            envelope_slot = ?envelope_slot,
            bulk_slot = ?bulk_slot,
            "Binder constructed"
        );

        Ok(Self {
            handler,
            descriptors,
            slots,
            payload_slot,
            bulk_slot,
            envelope_slot,
        })
    }

    pub fn handler(&self) -> &str {
        &self.handler
    }

    pub fn descriptors(&self) -> &[ParameterDescriptor] {
        &self.descriptors
    }

    pub fn slots(&self) -> &[Slot] {
        &self.slots
    }

    pub fn parameter_count(&self) -> usize {
        self.slots.len()
    }

    pub fn payload_slot(&self) -> Option<usize> {
        self.payload_slot
    }

    pub fn bulk_slot(&self) -> Option<usize> {
        self.bulk_slot
    }

    pub fn envelope_slot(&self) -> Option<usize> {
        self.envelope_slot
    }

    /// Map an inbound message onto the handler's arguments.
    ///
    /// Either every argument is bound or an error is returned; there is no
    /// partial result.
    pub fn to_arguments(&self, message: &Message) -> Result<Vec<Argument>, BindingError> {
        let arguments = self
            .slots
            .iter()
            .map(|slot| match slot {
                Slot::Payload => {
                    if message.payload().is_null() {
                        return Err(BindingError::MissingPayload);
                    }
                    Ok(Argument::Payload(message.payload().clone()))
                }
                Slot::Header { key, required } => {
                    match message.header(key).filter(|v| !v.is_null()) {
                        Some(value) => Ok(Argument::Header(Some(value.clone()))),
                        None if *required => Err(BindingError::MissingHeader(key.clone())),
                        None => Ok(Argument::Header(None)),
                    }
                }
                Slot::Headers { strings_only: true } => {
                    Ok(Argument::Properties(message.headers().string_values()))
                }
                Slot::Headers { strings_only: false } => {
                    Ok(Argument::Headers(message.headers().clone()))
                }
                Slot::Envelope => Ok(Argument::Message(message.clone())),
            })
            .collect::<Result<Vec<_>, _>>()?;

        debug!(
            handler = %self.handler,
            message_id = %message.id(),
            arguments = arguments.len(),
            "Bound message to arguments"
        );
        Ok(arguments)
    }

    /// Build a message from a full argument list.
    ///
    /// Header arguments become headers; `supplied` headers are added where the
    /// arguments did not set the key. A message argument is reused as the base
    /// and only gains headers it does not already carry.
    pub fn to_message(
        &self,
        arguments: &[Argument],
        supplied: &MessageHeaders,
    ) -> Result<Message, BindingError> {
        if arguments.len() != self.slots.len() {
            return Err(BindingError::ArgumentCount {
                expected: self.slots.len(),
                actual: arguments.len(),
            });
        }

        let mut payload = None;
        let mut envelope = None;
        let mut headers: BTreeMap<String, Value> = BTreeMap::new();

        for (index, (slot, argument)) in self.slots.iter().zip(arguments).enumerate() {
            match (slot, argument) {
                (Slot::Payload, Argument::Payload(value)) => {
                    if value.is_null() {
                        return Err(BindingError::MissingPayloadForOutbound);
                    }
                    payload = Some(value);
                }
                (Slot::Header { key, required }, Argument::Header(value)) => {
                    match value.as_ref().filter(|v| !v.is_null()) {
                        Some(value) => {
                            headers.insert(key.clone(), value.clone());
                        }
                        None if *required => {
                            return Err(BindingError::MissingHeader(key.clone()));
                        }
                        None => {}
                    }
                }
                (Slot::Headers { .. }, Argument::Headers(bulk)) => {
                    headers.extend(bulk.iter().map(|(k, v)| (k.clone(), v.clone())));
                }
                (Slot::Headers { .. }, Argument::Properties(bulk)) => {
                    headers.extend(
                        bulk.iter()
                            .map(|(k, v)| (k.clone(), Value::String(v.clone()))),
                    );
                }
                (Slot::Envelope, Argument::Message(message)) => envelope = Some(message),
                (slot, argument) => {
                    return Err(BindingError::ArgumentMismatch {
                        index,
                        expected: slot.label(),
                        actual: argument.kind(),
                    });
                }
            }
        }

        for (key, value) in supplied.iter() {
            headers.entry(key.clone()).or_insert_with(|| value.clone());
        }

        if let Some(message) = envelope {
            if headers.is_empty() {
                return Ok(message.clone());
            }
            return MessageBuilder::from_message(message)
                .copy_headers_if_absent(headers)
                .build()
                .map_err(|_| BindingError::MissingPayloadForOutbound);
        }

        let payload = payload.ok_or(BindingError::MissingPayloadForOutbound)?;
        MessageBuilder::with_payload(payload.clone())
            .copy_headers(headers)
            .build()
            .map_err(|_| BindingError::MissingPayloadForOutbound)
    }

    /// Build the reply for a handler's return value.
    ///
    /// The request's headers are carried over without overwriting anything
    /// the handler set on a returned message.
    pub fn reply_message(
        &self,
        returned: Option<Outbound>,
        request: &Message,
    ) -> Result<Message, BindingError> {
        let inherited = request
            .headers()
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()));

        let builder = match returned {
            Some(Outbound::Message(message)) => {
                MessageBuilder::from_message(&message).copy_headers_if_absent(inherited)
            }
            Some(Outbound::Payload(value)) => {
                MessageBuilder::with_payload(value).copy_headers(inherited)
            }
            None => return Err(BindingError::MissingPayloadForOutbound),
        };

        let reply = builder
            .build()
            .map_err(|_| BindingError::MissingPayloadForOutbound)?;
        debug!(
            handler = %self.handler,
            request_id = %request.id(),
            reply_id = %reply.id(),
            "Built reply message"
        );
        Ok(reply)
    }
}
