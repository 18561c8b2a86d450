//! Run-scoped variable environment and `{{name}}` template rendering

use std::collections::BTreeMap;
use std::sync::OnceLock;

use regex::Regex;
use serde_json::{Map, Value};

/// Which kind of step produced a variable
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VariableSource {
    /// Forwarded by a calling StrategyTrigger
    Seed,
    Api,
    Model,
    Condition,
    Trigger,
}

#[derive(Debug, Clone)]
struct Entry {
    value: Value,
    source: VariableSource,
    /// Insertion sequence, used to find the most recent output of a kind
    seq: u64,
}

/// Key/value mapping threaded through one execution
#[derive(Debug, Clone, Default)]
pub struct VariableEnvironment {
    entries: BTreeMap<String, Entry>,
    next_seq: u64,
}

impl VariableEnvironment {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seeded(seed: Map<String, Value>) -> Self {
        let mut env = Self::new();
        for (name, value) in seed {
            env.set(name, value, VariableSource::Seed);
        }
        env
    }

    pub fn set(&mut self, name: impl Into<String>, value: Value, source: VariableSource) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.entries.insert(name.into(), Entry { value, source, seq });
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.entries.get(name).map(|e| &e.value)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Resolve `name` or a dotted path into a variable (`quote.data.price`)
    pub fn lookup(&self, path: &str) -> Option<Value> {
        let path = path.trim();
        if let Some(value) = self.get(path) {
            return Some(value.clone());
        }
        let split = path.find(|c: char| c == '.' || c == '[').unwrap_or(path.len());
        let (name, rest) = path.split_at(split);
        let root = self.get(name)?;
        let rest = rest.strip_prefix('.').unwrap_or(rest);
        extract_path(root, rest)
    }

    pub fn is_truthy(&self, name: &str) -> bool {
        self.lookup(name).map(|v| is_truthy(&v)).unwrap_or(false)
    }

    /// Name and value of the newest variable produced by `source`
    pub fn latest_from(&self, source: VariableSource) -> Option<(&str, &Value)> {
        self.entries
            .iter()
            .filter(|(_, e)| e.source == source)
            .max_by_key(|(_, e)| e.seq)
            .map(|(k, e)| (k.as_str(), &e.value))
    }

    pub fn snapshot(&self) -> Map<String, Value> {
        self.entries
            .iter()
            .map(|(k, e)| (k.clone(), e.value.clone()))
            .collect()
    }

    /// Values produced by API nodes only
    pub fn api_snapshot(&self) -> Map<String, Value> {
        self.entries
            .iter()
            .filter(|(_, e)| e.source == VariableSource::Api)
            .map(|(k, e)| (k.clone(), e.value.clone()))
            .collect()
    }

    /// Snapshot restricted to `keys`; absent keys map to null
    pub fn select(&self, keys: &[String]) -> Value {
        let map: Map<String, Value> = keys
            .iter()
            .map(|k| (k.clone(), self.lookup(k).unwrap_or(Value::Null)))
            .collect();
        Value::Object(map)
    }

    pub fn render(&self, template: &str) -> String {
        template_regex()
            .replace_all(template, |caps: &regex::Captures<'_>| {
                match self.lookup(&caps[1]) {
                    Some(value) => value_to_string(&value),
                    None => {
                        tracing::debug!(variable = &caps[1], "template variable is not set");
                        String::new()
                    }
                }
            })
            .into_owned()
    }
}

fn template_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\{\{\s*([A-Za-z0-9_][A-Za-z0-9_.\-\[\]]*)\s*\}\}").expect("valid template regex")
    })
}

/// Variable names referenced by `{{...}}` placeholders in `template`
pub fn template_keys(template: &str) -> Vec<String> {
    template_regex()
        .captures_iter(template)
        .map(|caps| caps[1].to_string())
        .collect()
}

/// Render a JSON value the way a template or comparison sees it
pub fn value_to_string(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        other => other.to_string(),
    }
}

pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(true),
        Value::String(s) => {
            let s = s.trim();
            !(s.is_empty() || s == "0" || s.eq_ignore_ascii_case("false"))
        }
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
    }
}

/// Follow `data.items[0].price` (optionally prefixed with `$.`) into a JSON value
pub fn extract_path(value: &Value, path: &str) -> Option<Value> {
    let path = path.trim();
    let path = path.strip_prefix('$').unwrap_or(path);
    let path = path.strip_prefix('.').unwrap_or(path);
    if path.is_empty() {
        return Some(value.clone());
    }

    let mut current = value;
    for segment in path.split('.') {
        let (name, indexes) = match segment.find('[') {
            Some(pos) => segment.split_at(pos),
            None => (segment, ""),
        };

        if !name.is_empty() {
            current = match current {
                Value::Object(map) => map.get(name)?,
                Value::Array(items) => items.get(name.parse::<usize>().ok()?)?,
                _ => return None,
            };
        }

        let mut rest = indexes;
        while let Some(stripped) = rest.strip_prefix('[') {
            let end = stripped.find(']')?;
            let index: usize = stripped[..end].trim().parse().ok()?;
            current = current.as_array()?.get(index)?;
            rest = &stripped[end + 1..];
        }
    }
    Some(current.clone())
}
