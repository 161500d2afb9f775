use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Number, Value as JsonValue};
use std::collections::BTreeMap;

/// A backend parameter value. Serializes untagged, so the JSON encoding is the
/// natural one; `to_query_pairs` is the form-encoding for the `/select` API.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ParamValue {
    Str(String),
    Num(Number),
    Bool(bool),
    List(Vec<String>),
    Map(BTreeMap<String, ParamValue>),
}

impl ParamValue {
    /// Converts loosely-typed JSON. Nulls are dropped; array elements are
    /// stringified; nested objects become maps.
    pub fn from_json(v: JsonValue) -> Option<Self> {
        match v {
            JsonValue::Null => None,
            JsonValue::String(s) => Some(Self::Str(s)),
            JsonValue::Number(n) => Some(Self::Num(n)),
            JsonValue::Bool(b) => Some(Self::Bool(b)),
            JsonValue::Array(xs) => Some(Self::List(
                xs.into_iter().filter_map(scalar_to_string).collect(),
            )),
            JsonValue::Object(m) => Some(Self::Map(
                m.into_iter()
                    .filter_map(|(k, v)| Self::from_json(v).map(|pv| (k, pv)))
                    .collect(),
            )),
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Single-string rendering used for local-params and list coercion.
    pub fn render(&self) -> String {
        match self {
            Self::Str(s) => s.clone(),
            Self::Num(n) => n.to_string(),
            Self::Bool(b) => b.to_string(),
            Self::List(xs) => xs.join(","),
            Self::Map(m) => serde_json::to_string(m).unwrap_or_default(),
        }
    }
}

fn scalar_to_string(v: JsonValue) -> Option<String> {
    match v {
        JsonValue::Null => None,
        JsonValue::String(s) => Some(s),
        other => Some(other.to_string()),
    }
}

impl<'de> Deserialize<'de> for ParamValue {
    fn deserialize<D: Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        let v = JsonValue::deserialize(d)?;
        ParamValue::from_json(v).ok_or_else(|| D::Error::custom("null parameter value"))
    }
}

impl From<&str> for ParamValue {
    fn from(s: &str) -> Self {
        Self::Str(s.to_string())
    }
}

impl From<String> for ParamValue {
    fn from(s: String) -> Self {
        Self::Str(s)
    }
}

impl From<usize> for ParamValue {
    fn from(n: usize) -> Self {
        Self::Num(Number::from(n as u64))
    }
}

impl From<i64> for ParamValue {
    fn from(n: i64) -> Self {
        Self::Num(Number::from(n))
    }
}

impl From<bool> for ParamValue {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<Vec<String>> for ParamValue {
    fn from(xs: Vec<String>) -> Self {
        Self::List(xs)
    }
}

/// Ordered parameter map. Null values in the source JSON are skipped.
#[derive(Debug, Clone, PartialEq, Serialize, Default)]
pub struct ParamMap(pub BTreeMap<String, ParamValue>);

impl<'de> Deserialize<'de> for ParamMap {
    fn deserialize<D: Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        let raw = Option::<BTreeMap<String, JsonValue>>::deserialize(d)?.unwrap_or_default();
        Ok(ParamMap(
            raw.into_iter()
                .filter_map(|(k, v)| ParamValue::from_json(v).map(|pv| (k, pv)))
                .collect(),
        ))
    }
}

impl ParamMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<ParamValue>) {
        self.0.insert(key.into(), value.into());
    }

    /// Inserts only when `key` is absent.
    pub fn insert_default(&mut self, key: &str, value: impl Into<ParamValue>) {
        self.0.entry(key.to_string()).or_insert_with(|| value.into());
    }

    pub fn get(&self, key: &str) -> Option<&ParamValue> {
        self.0.get(key)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(ParamValue::as_str)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn remove(&mut self, key: &str) -> Option<ParamValue> {
        self.0.remove(key)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Overlays `other` on top of `self`; keys in `other` win.
    pub fn merge(&mut self, other: &ParamMap) {
        for (k, v) in other.0.iter() {
            self.0.insert(k.clone(), v.clone());
        }
    }

    /// Adds one filter under `fq`: absent becomes a one-element list, a
    /// scalar becomes a two-element list, a list is appended to.
    pub fn append_filter(&mut self, fq: impl Into<String>) {
        let fq = fq.into();
        let next = match self.0.remove("fq") {
            None | Some(ParamValue::Map(_)) => vec![fq],
            Some(ParamValue::List(mut xs)) => {
                xs.push(fq);
                xs
            }
            Some(scalar) => vec![scalar.render(), fq],
        };
        self.0.insert("fq".to_string(), ParamValue::List(next));
    }

    /// Form encoding for the relevance query API. Lists repeat the key; nested
    /// maps are flattened so their own keys become top-level parameters.
    pub fn to_query_pairs(&self) -> Vec<(String, String)> {
        let mut out = Vec::new();
        for (k, v) in self.0.iter() {
            push_pairs(&mut out, k, v);
        }
        out
    }
}

fn push_pairs(out: &mut Vec<(String, String)>, key: &str, v: &ParamValue) {
    match v {
        ParamValue::List(xs) => {
            for x in xs {
                out.push((key.to_string(), x.clone()));
            }
        }
        ParamValue::Map(m) => {
            for (sk, sv) in m.iter() {
                push_pairs(out, sk, sv);
            }
        }
        scalar => out.push((key.to_string(), scalar.render())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn decodes_mixed_values_and_drops_nulls() {
        let pm: ParamMap = serde_json::from_value(json!({
            "qf": "title^2 body",
            "rows": 20,
            "facet": true,
            "facet.field": ["cat", 3],
            "json.nl": null,
            "nested": {"hl.fl": "body", "skip": null}
        }))
        .unwrap();
        assert_eq!(pm.get_str("qf"), Some("title^2 body"));
        assert_eq!(pm.get("rows"), Some(&ParamValue::from(20usize)));
        assert_eq!(pm.get("facet"), Some(&ParamValue::Bool(true)));
        assert_eq!(
            pm.get("facet.field"),
            Some(&ParamValue::List(vec!["cat".into(), "3".into()]))
        );
        assert!(!pm.contains_key("json.nl"));
        match pm.get("nested") {
            Some(ParamValue::Map(m)) => assert_eq!(m.len(), 1),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn null_map_decodes_empty() {
        let pm: ParamMap = serde_json::from_value(json!(null)).unwrap();
        assert!(pm.is_empty());
    }

    #[test]
    fn query_pairs_repeat_lists_and_flatten_maps() {
        let mut pm = ParamMap::new();
        pm.insert("q", "gpu");
        pm.insert("rows", 10usize);
        pm.insert("fq", vec!["a:1".to_string(), "b:2".to_string()]);
        let mut nested = BTreeMap::new();
        nested.insert("hl".to_string(), ParamValue::Bool(true));
        pm.insert("params", ParamValue::Map(nested));
        let pairs = pm.to_query_pairs();
        assert_eq!(
            pairs,
            vec![
                ("fq".to_string(), "a:1".to_string()),
                ("fq".to_string(), "b:2".to_string()),
                ("hl".to_string(), "true".to_string()),
                ("q".to_string(), "gpu".to_string()),
                ("rows".to_string(), "10".to_string()),
            ]
        );
    }

    #[test]
    fn json_encoding_is_untagged() {
        let mut pm = ParamMap::new();
        pm.insert("q", "gpu");
        pm.insert("rows", 5usize);
        pm.insert("fq", vec!["x:1".to_string()]);
        assert_eq!(
            serde_json::to_value(&pm).unwrap(),
            json!({"q": "gpu", "rows": 5, "fq": ["x:1"]})
        );
    }

    #[test]
    fn append_filter_shapes() {
        let mut pm = ParamMap::new();
        pm.append_filter("new:true");
        assert_eq!(pm.get("fq"), Some(&ParamValue::List(vec!["new:true".into()])));

        let mut pm = ParamMap::new();
        pm.insert("fq", "old:true");
        pm.append_filter("new:true");
        assert_eq!(
            pm.get("fq"),
            Some(&ParamValue::List(vec!["old:true".into(), "new:true".into()]))
        );

        let mut pm = ParamMap::new();
        pm.insert("fq", vec!["old:true".to_string()]);
        pm.append_filter("new:true");
        assert_eq!(
            pm.get("fq"),
            Some(&ParamValue::List(vec!["old:true".into(), "new:true".into()]))
        );
    }

    #[test]
    fn merge_overlays_keys() {
        let mut base = ParamMap::new();
        base.insert("rows", 10usize);
        base.insert("q", "*:*");
        let mut over = ParamMap::new();
        over.insert("rows", 0usize);
        base.merge(&over);
        assert_eq!(base.get("rows"), Some(&ParamValue::from(0usize)));
        assert_eq!(base.get_str("q"), Some("*:*"));
    }
}
