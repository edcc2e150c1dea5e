//! Value normalization for the audit trail.
//!
//! Anything that ends up in the audit file first passes through [`Normalizer::normalize`],
//! which turns a [`RawValue`] into a [`SafeValue`] built only from primitives,
//! sequences and string-keyed mappings, so the YAML dump can never fail.
//!
//! ## Rule chain
//!
//! Rules are tried in this order; the first one that applies and succeeds wins:
//!
//! | # | Shape | Result |
//! |---|-------|--------|
//! | 1 | [`RawValue::Named`] | the constant's symbolic name |
//! | 2 | [`RawValue::Timestamp`] | ISO-8601 string |
//! | 3 | [`RawValue::Mapping`] | same keys minus `_`-prefixed ones, values normalized |
//! | 4 | [`RawValue::SelfDescribing`] | `to_structured()` output, as-is |
//! | 5 | [`RawValue::Sequence`] / [`RawValue::Set`] | elements normalized |
//! | 6 | [`RawValue::Primitive`] | unchanged, once the YAML dump accepts it |
//! | 7 | anything left | `describe()` string, else [`SENTINEL`] |
//!
//! A rule that fails falls through to the next one. Each fall-through bumps
//! [`Normalizer::fallback_count`] and emits a `tracing` debug event.

mod yaml;

pub use yaml::to_block_yaml;

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, Offset, TimeZone, Timelike};
use once_cell::sync::Lazy;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::debug;

/// A value that is guaranteed to serialize into the audit format.
///
/// `serde_json` is built with `preserve_order`, so mappings keep insertion order.
pub type SafeValue = serde_json::Value;

/// Placeholder for "could not be represented".
pub const SENTINEL: SafeValue = SafeValue::Null;

/// Keys starting with this marker are private and never dumped.
pub const PRIVATE_KEY_MARKER: char = '_';

/// String conversion that is allowed to fail.
pub trait Describe: Send + Sync {
    fn describe(&self) -> anyhow::Result<String>;
}

/// A value that knows how to turn itself into structured form.
pub trait SelfDescribing: Describe {
    fn to_structured(&self) -> anyhow::Result<SafeValue>;
}

/// Turns a typed value into the closed set of shapes the normalizer understands.
pub trait Inspect {
    fn inspect(&self) -> RawValue;
}

/// Point in time, with or without an offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Timestamp {
    Date(NaiveDate),
    Naive(NaiveDateTime),
    Zoned(DateTime<FixedOffset>),
}

impl Timestamp {
    /// ISO-8601; microseconds only when non-zero, offset as `+HH:MM`.
    pub fn isoformat(&self) -> String {
        fn with_micros(base: String, nanos: u32) -> String {
            let micros = nanos / 1_000;
            if micros == 0 {
                base
            } else {
                format!("{}.{:06}", base, micros)
            }
        }
        match self {
            Timestamp::Date(d) => d.format("%Y-%m-%d").to_string(),
            Timestamp::Naive(dt) => with_micros(
                dt.format("%Y-%m-%dT%H:%M:%S").to_string(),
                dt.nanosecond(),
            ),
            Timestamp::Zoned(dt) => format!(
                "{}{}",
                with_micros(dt.format("%Y-%m-%dT%H:%M:%S").to_string(), dt.nanosecond()),
                dt.format("%:z")
            ),
        }
    }
}

/// Every shape the normalizer recognizes.
#[derive(Clone)]
pub enum RawValue {
    /// Enumerated / named constant.
    Named(String),
    Timestamp(Timestamp),
    /// String-keyed mapping, insertion ordered.
    Mapping(Vec<(String, RawValue)>),
    SelfDescribing(Arc<dyn SelfDescribing>),
    Sequence(Vec<RawValue>),
    /// Like a sequence, but duplicates collapse after normalization.
    Set(Vec<RawValue>),
    Primitive(serde_json::Value),
    /// No recognized shape; only its string form can be used.
    Opaque(Arc<dyn Describe>),
}

impl fmt::Debug for RawValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RawValue::Named(n) => f.debug_tuple("Named").field(n).finish(),
            RawValue::Timestamp(t) => f.debug_tuple("Timestamp").field(t).finish(),
            RawValue::Mapping(m) => f.debug_tuple("Mapping").field(m).finish(),
            RawValue::SelfDescribing(_) => f.write_str("SelfDescribing(..)"),
            RawValue::Sequence(s) => f.debug_tuple("Sequence").field(s).finish(),
            RawValue::Set(s) => f.debug_tuple("Set").field(s).finish(),
            RawValue::Primitive(v) => f.debug_tuple("Primitive").field(v).finish(),
            RawValue::Opaque(_) => f.write_str("Opaque(..)"),
        }
    }
}

impl RawValue {
    pub fn mapping<K, I>(entries: I) -> Self
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, RawValue)>,
    {
        RawValue::Mapping(entries.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    pub fn named(name: impl Into<String>) -> Self {
        RawValue::Named(name.into())
    }

    pub fn opaque(value: impl Describe + 'static) -> Self {
        RawValue::Opaque(Arc::new(value))
    }

    pub fn self_describing(value: impl SelfDescribing + 'static) -> Self {
        RawValue::SelfDescribing(Arc::new(value))
    }

    /// Bridge for any `Serialize` type. Objects become mappings so private keys are still dropped.
    pub fn from_serialize<T: Serialize + ?Sized>(value: &T) -> Self {
        match serde_json::to_value(value) {
            Ok(v) => RawValue::from(v),
            Err(e) => RawValue::opaque(Unrepresentable(e.to_string())),
        }
    }

    /// Short name of the shape, used in fall-through diagnostics.
    pub fn shape(&self) -> &'static str {
        match self {
            RawValue::Named(_) => "named",
            RawValue::Timestamp(_) => "timestamp",
            RawValue::Mapping(_) => "mapping",
            RawValue::SelfDescribing(_) => "self_describing",
            RawValue::Sequence(_) => "sequence",
            RawValue::Set(_) => "set",
            RawValue::Primitive(_) => "primitive",
            RawValue::Opaque(_) => "opaque",
        }
    }

    fn describe(&self) -> anyhow::Result<String> {
        match self {
            RawValue::Named(n) => Ok(n.clone()),
            RawValue::Timestamp(t) => Ok(t.isoformat()),
            RawValue::Primitive(serde_json::Value::String(s)) => Ok(s.clone()),
            RawValue::Primitive(v) => Ok(v.to_string()),
            RawValue::SelfDescribing(d) => d.describe(),
            RawValue::Opaque(d) => d.describe(),
            other => Ok(format!("{:?}", other)),
        }
    }
}

impl From<serde_json::Value> for RawValue {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Object(map) => {
                RawValue::Mapping(map.into_iter().map(|(k, v)| (k, RawValue::from(v))).collect())
            }
            serde_json::Value::Array(items) => {
                RawValue::Sequence(items.into_iter().map(RawValue::from).collect())
            }
            other => RawValue::Primitive(other),
        }
    }
}

struct Unrepresentable(String);

impl Describe for Unrepresentable {
    fn describe(&self) -> anyhow::Result<String> {
        Err(anyhow::anyhow!("value could not be serialized: {}", self.0))
    }
}

/// Outcome of one rule: not applicable, or applied with a result.
type RuleOutcome = Option<anyhow::Result<SafeValue>>;

/// Applies the rule chain and counts every swallowed failure.
#[derive(Debug, Default)]
pub struct Normalizer {
    fallbacks: AtomicU64,
}

impl Normalizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of rule failures swallowed so far.
    pub fn fallback_count(&self) -> u64 {
        self.fallbacks.load(Ordering::Relaxed)
    }

    /// Normalize any inspectable value. Never fails; the worst case is [`SENTINEL`].
    pub fn normalize(&self, value: &(impl Inspect + ?Sized)) -> SafeValue {
        self.normalize_raw(&value.inspect())
    }

    pub fn normalize_raw(&self, value: &RawValue) -> SafeValue {
        let rules: [(&'static str, fn(&Self, &RawValue) -> RuleOutcome); 6] = [
            ("named", Self::rule_named),
            ("timestamp", Self::rule_timestamp),
            ("mapping", Self::rule_mapping),
            ("self_describing", Self::rule_self_describing),
            ("sequence", Self::rule_sequence),
            ("primitive", Self::rule_primitive),
        ];
        for (rule, apply) in rules {
            match apply(self, value) {
                None => continue,
                Some(Ok(safe)) => return safe,
                Some(Err(e)) => self.note_fallback(rule, value, &e),
            }
        }
        self.stringify_or_sentinel(value)
    }

    /// Normalize and dump as a block-style YAML document.
    pub fn to_yaml(&self, value: &(impl Inspect + ?Sized)) -> String {
        to_block_yaml(&self.normalize(value))
    }

    fn note_fallback(&self, rule: &'static str, value: &RawValue, error: &anyhow::Error) {
        self.fallbacks.fetch_add(1, Ordering::Relaxed);
        debug!(
            rule,
            shape = value.shape(),
            error = %error,
            "normalizer rule failed, falling through"
        );
    }

    fn rule_named(&self, value: &RawValue) -> RuleOutcome {
        match value {
            RawValue::Named(name) => Some(Ok(SafeValue::String(name.clone()))),
            _ => None,
        }
    }

    fn rule_timestamp(&self, value: &RawValue) -> RuleOutcome {
        match value {
            RawValue::Timestamp(ts) => Some(Ok(SafeValue::String(ts.isoformat()))),
            _ => None,
        }
    }

    fn rule_mapping(&self, value: &RawValue) -> RuleOutcome {
        match value {
            RawValue::Mapping(entries) => {
                let map = entries
                    .iter()
                    .filter(|(k, _)| !k.starts_with(PRIVATE_KEY_MARKER))
                    .map(|(k, v)| (k.clone(), self.normalize_raw(v)))
                    .collect::<serde_json::Map<_, _>>();
                Some(Ok(SafeValue::Object(map)))
            }
            _ => None,
        }
    }

    fn rule_self_describing(&self, value: &RawValue) -> RuleOutcome {
        match value {
            RawValue::SelfDescribing(d) => Some(d.to_structured()),
            _ => None,
        }
    }

    fn rule_sequence(&self, value: &RawValue) -> RuleOutcome {
        match value {
            RawValue::Sequence(items) => Some(Ok(SafeValue::Array(
                items.iter().map(|v| self.normalize_raw(v)).collect(),
            ))),
            RawValue::Set(items) => {
                let mut out: Vec<SafeValue> = Vec::with_capacity(items.len());
                for item in items {
                    let safe = self.normalize_raw(item);
                    if !out.contains(&safe) {
                        out.push(safe);
                    }
                }
                Some(Ok(SafeValue::Array(out)))
            }
            _ => None,
        }
    }

    fn rule_primitive(&self, value: &RawValue) -> RuleOutcome {
        match value {
            RawValue::Primitive(v) => Some(
                serde_yaml::to_string(v)
                    .map(|_| v.clone())
                    .map_err(anyhow::Error::from),
            ),
            _ => None,
        }
    }

    fn stringify_or_sentinel(&self, value: &RawValue) -> SafeValue {
        match value.describe() {
            Ok(s) => SafeValue::String(s),
            Err(e) => {
                self.note_fallback("stringify", value, &e);
                SENTINEL
            }
        }
    }
}

static DEFAULT_NORMALIZER: Lazy<Normalizer> = Lazy::new(Normalizer::new);

/// Returns the process-wide default normalizer.
pub fn default_normalizer() -> &'static Normalizer {
    &DEFAULT_NORMALIZER
}

/// Normalize with the process-wide default normalizer.
pub fn normalize(value: &(impl Inspect + ?Sized)) -> SafeValue {
    DEFAULT_NORMALIZER.normalize(value)
}

/// Normalize and dump as block YAML with the process-wide default normalizer.
pub fn to_yaml_string(value: &(impl Inspect + ?Sized)) -> String {
    DEFAULT_NORMALIZER.to_yaml(value)
}

// ---- Inspect implementations for common types ----

impl Inspect for RawValue {
    fn inspect(&self) -> RawValue {
        self.clone()
    }
}

impl<T: Inspect + ?Sized> Inspect for &T {
    fn inspect(&self) -> RawValue {
        (**self).inspect()
    }
}

impl<T: Inspect + ?Sized> Inspect for Box<T> {
    fn inspect(&self) -> RawValue {
        (**self).inspect()
    }
}

impl<T: Inspect + ?Sized> Inspect for Arc<T> {
    fn inspect(&self) -> RawValue {
        (**self).inspect()
    }
}

impl Inspect for str {
    fn inspect(&self) -> RawValue {
        RawValue::Primitive(serde_json::Value::String(self.to_string()))
    }
}

impl Inspect for String {
    fn inspect(&self) -> RawValue {
        self.as_str().inspect()
    }
}

impl Inspect for bool {
    fn inspect(&self) -> RawValue {
        RawValue::Primitive(serde_json::Value::Bool(*self))
    }
}

macro_rules! inspect_integer {
    ($($t:ty),*) => {
        $(impl Inspect for $t {
            fn inspect(&self) -> RawValue {
                RawValue::Primitive(serde_json::Value::from(*self))
            }
        })*
    };
}

inspect_integer!(i8, i16, i32, i64, u8, u16, u32, u64, usize, isize);

struct NonFinite(f64);

impl Describe for NonFinite {
    fn describe(&self) -> anyhow::Result<String> {
        Ok(self.0.to_string())
    }
}

impl Inspect for f64 {
    fn inspect(&self) -> RawValue {
        match serde_json::Number::from_f64(*self) {
            Some(n) => RawValue::Primitive(serde_json::Value::Number(n)),
            None => RawValue::opaque(NonFinite(*self)),
        }
    }
}

impl Inspect for f32 {
    fn inspect(&self) -> RawValue {
        f64::from(*self).inspect()
    }
}

impl<T: Inspect> Inspect for Option<T> {
    fn inspect(&self) -> RawValue {
        match self {
            Some(v) => v.inspect(),
            None => RawValue::Primitive(serde_json::Value::Null),
        }
    }
}

impl<T: Inspect> Inspect for [T] {
    fn inspect(&self) -> RawValue {
        RawValue::Sequence(self.iter().map(Inspect::inspect).collect())
    }
}

impl<T: Inspect> Inspect for Vec<T> {
    fn inspect(&self) -> RawValue {
        self.as_slice().inspect()
    }
}

impl<T: Inspect> Inspect for BTreeSet<T> {
    fn inspect(&self) -> RawValue {
        RawValue::Set(self.iter().map(Inspect::inspect).collect())
    }
}

impl<T: Inspect, S> Inspect for HashSet<T, S> {
    fn inspect(&self) -> RawValue {
        RawValue::Set(self.iter().map(Inspect::inspect).collect())
    }
}

impl<V: Inspect> Inspect for BTreeMap<String, V> {
    fn inspect(&self) -> RawValue {
        RawValue::Mapping(self.iter().map(|(k, v)| (k.clone(), v.inspect())).collect())
    }
}

impl<V: Inspect, S> Inspect for HashMap<String, V, S> {
    fn inspect(&self) -> RawValue {
        RawValue::Mapping(self.iter().map(|(k, v)| (k.clone(), v.inspect())).collect())
    }
}

impl Inspect for serde_json::Value {
    fn inspect(&self) -> RawValue {
        RawValue::from(self.clone())
    }
}

impl Inspect for NaiveDate {
    fn inspect(&self) -> RawValue {
        RawValue::Timestamp(Timestamp::Date(*self))
    }
}

impl Inspect for NaiveDateTime {
    fn inspect(&self) -> RawValue {
        RawValue::Timestamp(Timestamp::Naive(*self))
    }
}

impl<Tz: TimeZone> Inspect for DateTime<Tz> {
    fn inspect(&self) -> RawValue {
        RawValue::Timestamp(Timestamp::Zoned(self.with_timezone(&self.offset().fix())))
    }
}
