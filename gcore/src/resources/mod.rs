//! Resource implementations

pub mod cdn;
pub mod cloud;
pub mod common;
pub mod fastedge;
pub mod iam;
pub mod waap;

#[cfg(test)]
pub(crate) mod test_helpers {
    use crate::api::test_helpers::create_test_client;
    use crate::GcoreProviderData;
    use std::collections::HashMap;
    use tfplug::types::{Dynamic, DynamicValue};

    pub fn provider_data(url: &str) -> GcoreProviderData {
        GcoreProviderData::new(create_test_client(url))
    }

    pub fn object(fields: &[(&str, Dynamic)]) -> Dynamic {
        Dynamic::Map(
            fields
                .iter()
                .map(|(k, v)| (k.to_string(), v.clone()))
                .collect::<HashMap<_, _>>(),
        )
    }

    pub fn value(fields: &[(&str, Dynamic)]) -> DynamicValue {
        DynamicValue::new(object(fields))
    }

    pub fn strings(values: &[&str]) -> Dynamic {
        Dynamic::List(values.iter().map(|v| Dynamic::from(*v)).collect())
    }

    pub fn string_map(pairs: &[(&str, &str)]) -> Dynamic {
        Dynamic::Map(
            pairs
                .iter()
                .map(|(k, v)| (k.to_string(), Dynamic::from(*v)))
                .collect(),
        )
    }
}
