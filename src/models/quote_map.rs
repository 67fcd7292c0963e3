use serde::de::{Deserialize, Deserializer, MapAccess, Visitor};
use serde::ser::{Serialize, SerializeMap, Serializer};
use std::fmt;
use std::marker::PhantomData;

/// Currency-keyed map that keeps insertion order.
///
/// Serializes as a JSON object whose keys appear in the order currencies were
/// processed, which is what downstream consumers of the NDJSON files see.
#[derive(Debug, Clone, PartialEq)]
pub struct QuoteMap<T> {
    entries: Vec<(String, T)>,
}

impl<T> Default for QuoteMap<T> {
    fn default() -> Self {
        Self { entries: Vec::new() }
    }
}

impl<T> QuoteMap<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace the value for `currency`. Replacing keeps the original position.
    pub fn insert(&mut self, currency: impl Into<String>, value: T) {
        let currency = currency.into();
        match self.entries.iter_mut().find(|(k, _)| *k == currency) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((currency, value)),
        }
    }

    pub fn get(&self, currency: &str) -> Option<&T> {
        self.entries
            .iter()
            .find(|(k, _)| k == currency)
            .map(|(_, v)| v)
    }

    pub fn contains_key(&self, currency: &str) -> bool {
        self.get(currency).is_some()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &T)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<T: Serialize> Serialize for QuoteMap<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (k, v) in &self.entries {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }
}

impl<'de, T: Deserialize<'de>> Deserialize<'de> for QuoteMap<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct QuoteMapVisitor<T>(PhantomData<T>);

        impl<'de, T: Deserialize<'de>> Visitor<'de> for QuoteMapVisitor<T> {
            type Value = QuoteMap<T>;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a map keyed by currency code")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
                let mut map = QuoteMap::new();
                while let Some((k, v)) = access.next_entry::<String, T>()? {
                    map.insert(k, v);
                }
                Ok(map)
            }
        }

        deserializer.deserialize_map(QuoteMapVisitor(PhantomData))
    }
}
