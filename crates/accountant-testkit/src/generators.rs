//! Proptest generators for property-based testing.

use std::collections::BTreeMap;

use proptest::prelude::*;
use serde_json::{json, Value};

use accountant_core::{CipherRegistry, EntryPayload, ModelRef, Properties};

/// Generate an attribute name.
pub fn attribute_name() -> impl Strategy<Value = String> {
    "[a-z][a-z0-9_]{0,15}".prop_map(String::from)
}

/// Generate a scalar JSON value.
pub fn scalar() -> impl Strategy<Value = Value> {
    prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::Bool),
        any::<i64>().prop_map(|n| json!(n)),
        "[a-zA-Z ]{0,24}".prop_map(Value::String),
    ]
}

/// Generate a JSON value with nested arrays and maps.
pub fn json_value() -> impl Strategy<Value = Value> {
    scalar().prop_recursive(3, 32, 6, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..6).prop_map(Value::Array),
            prop::collection::btree_map(attribute_name(), inner, 0..6)
                .prop_map(|map| Value::Object(map.into_iter().collect())),
        ]
    })
}

/// Generate an attribute map.
pub fn properties() -> impl Strategy<Value = Properties> {
    prop::collection::btree_map(attribute_name(), json_value(), 0..12)
}

/// Generate a model reference.
pub fn model_ref() -> impl Strategy<Value = ModelRef> {
    ("[a-z]{1,12}", 1u64..10_000).prop_map(|(kind, id)| ModelRef::new(kind, id))
}

/// Generate an event name.
pub fn event() -> impl Strategy<Value = String> {
    prop_oneof![
        Just("created".to_string()),
        Just("updated".to_string()),
        Just("deleted".to_string()),
        Just("restored".to_string()),
        Just("retrieved".to_string()),
        "[a-z]{3,12}".prop_map(String::from),
    ]
}

/// Parameters for generating a payload.
#[derive(Debug, Clone)]
pub struct PayloadParams {
    pub event: String,
    pub recordable: ModelRef,
    pub user: Option<ModelRef>,
    pub properties: Properties,
    pub modified: Vec<String>,
    /// Attributes ciphered with `base64`.
    pub ciphered: Vec<String>,
}

impl Arbitrary for PayloadParams {
    type Parameters = ();
    type Strategy = BoxedStrategy<Self>;

    fn arbitrary_with(_: Self::Parameters) -> Self::Strategy {
        (
            event(),
            model_ref(),
            prop::option::of(model_ref()),
            properties(),
            any::<u16>(), // modified mask
            any::<u16>(), // cipher mask
        )
            .prop_map(|(event, recordable, user, properties, modified, ciphered)| {
                let pick = |mask: u16| -> Vec<String> {
                    properties
                        .keys()
                        .enumerate()
                        .filter(|(i, _)| mask & (1 << (i % 16)) != 0)
                        .map(|(_, key)| key.clone())
                        .collect()
                };
                PayloadParams {
                    modified: pick(modified),
                    ciphered: pick(ciphered),
                    event,
                    recordable,
                    user,
                    properties,
                }
            })
            .boxed()
    }
}

/// Build a payload from parameters.
pub fn payload_from_params(params: &PayloadParams) -> EntryPayload {
    let ciphers: BTreeMap<String, String> = params
        .ciphered
        .iter()
        .map(|key| (key.clone(), "base64".to_string()))
        .collect();

    EntryPayload::builder(params.event.clone(), params.recordable.clone())
        .user(params.user.clone())
        .properties(params.properties.clone())
        .modified(params.modified.clone())
        .ciphers(ciphers)
        .build(&CipherRegistry::new())
        .unwrap_or_else(|e| panic!("ciphered keys come from the properties: {e}"))
}
