use super::error::NativeError;
use super::heap::{HandleId, NativeHeap};
use super::node::NativeNode;
use serde_json::{Map as JsonMap, Number, Value};
use std::fmt;
use std::rc::Rc;
use tracing::warn;

/// The single owner of a live native handle.
///
/// An `Owned` is created only by its [`NativeHeap`] and is released exactly once: either
/// explicitly through [`Owned::release`] or implicitly when it goes out of scope. It is
/// deliberately not `Clone`, so a handle can neither leak past its owner nor be released a
/// second time by a copy.
///
/// Navigating into a non-value child (a vector element, an object field, a map key) yields
/// a fresh `Owned` for that child. Value children (scalars, fixed-size value arrays and
/// matrices) are copied out directly and never produce a handle.
pub struct Owned {
    heap: Rc<NativeHeap>,
    id: HandleId,
    node: Rc<NativeNode>,
}

impl Owned {
    pub(super) fn new(heap: Rc<NativeHeap>, id: HandleId, node: Rc<NativeNode>) -> Self {
        Self { heap, id, node }
    }

    pub fn id(&self) -> HandleId {
        self.id
    }

    pub fn class(&self) -> &str {
        self.node.class_name()
    }

    pub fn node(&self) -> &NativeNode {
        &self.node
    }

    pub fn heap(&self) -> &Rc<NativeHeap> {
        &self.heap
    }

    /// Returns the handle to the heap now instead of at the end of the enclosing scope.
    pub fn release(self) {
        drop(self);
    }

    fn live_node(&self) -> Result<&NativeNode, NativeError> {
        if self.heap.is_live(self.id) {
            Ok(&self.node)
        } else {
            Err(NativeError::StaleHandle {
                class: self.class().to_string(),
            })
        }
    }

    fn mismatch(&self, expected: &'static str) -> NativeError {
        NativeError::TypeMismatch {
            expected,
            found: self.class().to_string(),
        }
    }

    fn adopt(&self, child: &Rc<NativeNode>) -> Owned {
        self.heap.acquire(Rc::clone(child))
    }

    /// Number of elements in a native vector or entries in a native map.
    pub fn len(&self) -> Result<usize, NativeError> {
        match self.live_node()? {
            NativeNode::Vector(items) => Ok(items.len()),
            NativeNode::Map(entries) => Ok(entries.len()),
            _ => Err(self.mismatch("vector or map")),
        }
    }

    pub fn is_empty(&self) -> Result<bool, NativeError> {
        Ok(self.len()? == 0)
    }

    /// Acquires the element at `index` of a native vector.
    pub fn get(&self, index: usize) -> Result<Owned, NativeError> {
        match self.live_node()? {
            NativeNode::Vector(items) => items
                .get(index)
                .map(|item| self.adopt(item))
                .ok_or_else(|| NativeError::IndexOutOfRange {
                    class: self.class().to_string(),
                    index,
                    len: items.len(),
                }),
            _ => Err(self.mismatch("vector")),
        }
    }

    fn field_node(&self, name: &str) -> Result<&Rc<NativeNode>, NativeError> {
        match self.live_node()? {
            NativeNode::Object { class, fields } => {
                fields.get(name).ok_or_else(|| NativeError::MissingField {
                    class: class.clone(),
                    field: name.to_string(),
                })
            }
            _ => Err(self.mismatch("object")),
        }
    }

    pub fn has_field(&self, name: &str) -> bool {
        self.field_node(name).is_ok()
    }

    /// Acquires the object-valued field `name`.
    pub fn field(&self, name: &str) -> Result<Owned, NativeError> {
        let child = self.field_node(name)?;
        Ok(self.adopt(child))
    }

    /// Acquires a freshly allocated vector holding the keys of a native map.
    pub fn keys(&self) -> Result<Owned, NativeError> {
        match self.live_node()? {
            NativeNode::Map(entries) => {
                let keys = entries.iter().map(|(key, _)| Rc::clone(key)).collect();
                Ok(self.heap.acquire(Rc::new(NativeNode::Vector(keys))))
            }
            _ => Err(self.mismatch("map")),
        }
    }

    /// Acquires the value stored under `key` in a native map.
    pub fn lookup(&self, key: &Owned) -> Result<Owned, NativeError> {
        match self.live_node()? {
            NativeNode::Map(entries) => {
                let wanted = key.live_node()?;
                entries
                    .iter()
                    .find(|(candidate, _)| candidate.as_ref() == wanted)
                    .map(|(_, value)| self.adopt(value))
                    .ok_or_else(|| NativeError::KeyNotFound {
                        class: key.class().to_string(),
                    })
            }
            _ => Err(self.mismatch("map")),
        }
    }

    pub fn first(&self) -> Result<Owned, NativeError> {
        match self.live_node()? {
            NativeNode::Pair(first, _) => Ok(self.adopt(first)),
            _ => Err(self.mismatch("pair")),
        }
    }

    pub fn second(&self) -> Result<Owned, NativeError> {
        match self.live_node()? {
            NativeNode::Pair(_, second) => Ok(self.adopt(second)),
            _ => Err(self.mismatch("pair")),
        }
    }

    pub fn int(&self, name: &str) -> Result<i64, NativeError> {
        node_as_int(self.field_node(name)?)
    }

    pub fn float(&self, name: &str) -> Result<f64, NativeError> {
        node_as_float(self.field_node(name)?)
    }

    pub fn string(&self, name: &str) -> Result<String, NativeError> {
        node_as_string(self.field_node(name)?)
    }

    pub fn boolean(&self, name: &str) -> Result<bool, NativeError> {
        node_as_bool(self.field_node(name)?)
    }

    pub fn floats(&self, name: &str) -> Result<Vec<f64>, NativeError> {
        node_as_floats(self.field_node(name)?)
    }

    /// Copies a float value array that must have exactly `N` components.
    pub fn floats_n<const N: usize>(&self, name: &str) -> Result<[f64; N], NativeError> {
        let values = self.floats(name)?;
        let found = values.len();
        values.try_into().map_err(|_| NativeError::Arity {
            field: name.to_string(),
            expected: N,
            found,
        })
    }

    pub fn ints(&self, name: &str) -> Result<Vec<i64>, NativeError> {
        match self.field_node(name)?.as_ref() {
            NativeNode::Ints(values) => Ok(values.clone()),
            other => Err(NativeError::TypeMismatch {
                expected: "int values",
                found: other.class_name().to_string(),
            }),
        }
    }

    pub fn ints_n<const N: usize>(&self, name: &str) -> Result<[i64; N], NativeError> {
        let values = self.ints(name)?;
        let found = values.len();
        values.try_into().map_err(|_| NativeError::Arity {
            field: name.to_string(),
            expected: N,
            found,
        })
    }

    pub fn matrix(&self, name: &str) -> Result<Vec<Vec<f64>>, NativeError> {
        match self.field_node(name)?.as_ref() {
            NativeNode::Matrix(rows) => Ok(rows.clone()),
            other => Err(NativeError::TypeMismatch {
                expected: "matrix",
                found: other.class_name().to_string(),
            }),
        }
    }

    pub fn as_int(&self) -> Result<i64, NativeError> {
        node_as_int(self.live_node()?)
    }

    pub fn as_float(&self) -> Result<f64, NativeError> {
        node_as_float(self.live_node()?)
    }

    pub fn as_string(&self) -> Result<String, NativeError> {
        node_as_string(self.live_node()?)
    }

    pub fn as_bool(&self) -> Result<bool, NativeError> {
        node_as_bool(self.live_node()?)
    }

    pub fn as_floats(&self) -> Result<Vec<f64>, NativeError> {
        node_as_floats(self.live_node()?)
    }

    pub fn as_matrix(&self) -> Result<Vec<Vec<f64>>, NativeError> {
        match self.live_node()? {
            NativeNode::Matrix(rows) => Ok(rows.clone()),
            _ => Err(self.mismatch("matrix")),
        }
    }

    /// Deep-copies the node into a plain JSON value without acquiring any sub-handle.
    pub fn to_plain_value(&self) -> Result<Value, NativeError> {
        Ok(plain_value(self.live_node()?))
    }
}

impl Drop for Owned {
    fn drop(&mut self) {
        if !self.heap.release(self.id) {
            warn!(
                class = self.node.class_name(),
                "Native handle was not live when its owner was dropped"
            );
        }
    }
}

impl fmt::Debug for Owned {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Owned")
            .field("id", &self.id)
            .field("class", &self.class())
            .finish()
    }
}

fn node_as_int(node: &NativeNode) -> Result<i64, NativeError> {
    match node {
        NativeNode::Int(value) => Ok(*value),
        NativeNode::Bool(value) => Ok(i64::from(*value)),
        other => Err(NativeError::TypeMismatch {
            expected: "int",
            found: other.class_name().to_string(),
        }),
    }
}

fn node_as_float(node: &NativeNode) -> Result<f64, NativeError> {
    match node {
        NativeNode::Float(value) => Ok(*value),
        NativeNode::Int(value) => Ok(*value as f64),
        other => Err(NativeError::TypeMismatch {
            expected: "float",
            found: other.class_name().to_string(),
        }),
    }
}

fn node_as_string(node: &NativeNode) -> Result<String, NativeError> {
    match node {
        NativeNode::Str(value) => Ok(value.clone()),
        other => Err(NativeError::TypeMismatch {
            expected: "string",
            found: other.class_name().to_string(),
        }),
    }
}

fn node_as_bool(node: &NativeNode) -> Result<bool, NativeError> {
    match node {
        NativeNode::Bool(value) => Ok(*value),
        NativeNode::Int(value) => Ok(*value != 0),
        other => Err(NativeError::TypeMismatch {
            expected: "bool",
            found: other.class_name().to_string(),
        }),
    }
}

fn node_as_floats(node: &NativeNode) -> Result<Vec<f64>, NativeError> {
    match node {
        NativeNode::Floats(values) => Ok(values.clone()),
        NativeNode::Ints(values) => Ok(values.iter().map(|&v| v as f64).collect()),
        other => Err(NativeError::TypeMismatch {
            expected: "float values",
            found: other.class_name().to_string(),
        }),
    }
}

fn float_value(value: f64) -> Value {
    Number::from_f64(value).map_or(Value::Null, Value::Number)
}

fn plain_value(node: &NativeNode) -> Value {
    match node {
        NativeNode::Void => Value::Null,
        NativeNode::Bool(value) => Value::Bool(*value),
        NativeNode::Int(value) => Value::from(*value),
        NativeNode::Float(value) => float_value(*value),
        NativeNode::Str(value) => Value::String(value.clone()),
        NativeNode::Ints(values) => Value::from(values.clone()),
        NativeNode::Floats(values) => values.iter().copied().map(float_value).collect(),
        NativeNode::Matrix(rows) => rows
            .iter()
            .map(|row| row.iter().copied().map(float_value).collect::<Value>())
            .collect(),
        NativeNode::Vector(items) => items.iter().map(|item| plain_value(item)).collect(),
        NativeNode::Map(entries) => entries
            .iter()
            .map(|(key, value)| Value::Array(vec![plain_value(key), plain_value(value)]))
            .collect(),
        NativeNode::Pair(first, second) => {
            Value::Array(vec![plain_value(first), plain_value(second)])
        }
        NativeNode::Object { fields, .. } => {
            let map: JsonMap<String, Value> = fields
                .iter()
                .map(|(name, value)| (name.clone(), plain_value(value)))
                .collect();
            Value::Object(map)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn residue(chain: &str, res_no: i64) -> NativeNode {
        NativeNode::object("residue_spec_t")
            .field("chain_id", chain)
            .field("res_no", res_no)
            .field("ins_code", "")
            .build()
    }

    #[test]
    fn navigating_children_acquires_separate_handles() {
        let heap = NativeHeap::new();
        let specs = heap.allocate(NativeNode::vector(vec![residue("A", 1), residue("B", 2)]));
        {
            let first = specs.get(0).unwrap();
            assert_eq!(first.string("chain_id").unwrap(), "A");
            assert_eq!(heap.live_count(), 2);
        }
        assert_eq!(heap.live_count(), 1);
        drop(specs);
        assert!(heap.stats().is_balanced());
    }

    #[test]
    fn value_fields_are_copied_without_a_handle() {
        let heap = NativeHeap::new();
        let vertex = heap.allocate(
            NativeNode::object("vertex")
                .field("pos", [1.0, 2.0, 3.0])
                .field("color", [0.5, 0.5, 0.5, 1.0]),
        );
        assert_eq!(vertex.floats_n::<3>("pos").unwrap(), [1.0, 2.0, 3.0]);
        assert_eq!(heap.stats().acquired, 1);
    }

    #[test]
    fn arity_mismatch_is_reported() {
        let heap = NativeHeap::new();
        let vertex = heap.allocate(NativeNode::object("vertex").field("pos", [1.0, 2.0]));
        let err = vertex.floats_n::<3>("pos").unwrap_err();
        assert_eq!(
            err,
            NativeError::Arity {
                field: "pos".to_string(),
                expected: 3,
                found: 2
            }
        );
    }

    #[test]
    fn missing_field_and_out_of_range_are_errors() {
        let heap = NativeHeap::new();
        let specs = heap.allocate(NativeNode::vector(vec![residue("A", 1)]));
        assert!(matches!(
            specs.get(3),
            Err(NativeError::IndexOutOfRange { index: 3, len: 1, .. })
        ));
        let spec = specs.get(0).unwrap();
        assert!(matches!(
            spec.int("model_number"),
            Err(NativeError::MissingField { .. })
        ));
        assert!(!spec.has_field("model_number"));
        assert!(spec.has_field("res_no"));
    }

    #[test]
    fn map_keys_and_lookup_follow_structural_equality() {
        let heap = NativeHeap::new();
        let stats = heap.allocate(NativeNode::map(vec![
            (residue("A", 1), NativeNode::object("stats").field("n", 10)),
            (residue("A", 2), NativeNode::object("stats").field("n", 12)),
        ]));
        let keys = stats.keys().unwrap();
        assert_eq!(keys.len().unwrap(), 2);
        let key = keys.get(1).unwrap();
        let value = stats.lookup(&key).unwrap();
        assert_eq!(value.int("n").unwrap(), 12);
        drop((value, key, keys, stats));
        assert!(heap.stats().is_balanced());
    }

    #[test]
    fn pair_accessors_require_a_pair() {
        let heap = NativeHeap::new();
        let pair = heap.allocate(NativeNode::pair(1, "mesh"));
        assert_eq!(pair.first().unwrap().as_int().unwrap(), 1);
        assert_eq!(pair.second().unwrap().as_string().unwrap(), "mesh");

        let not_pair = heap.allocate(NativeNode::Int(3));
        assert!(matches!(
            not_pair.first(),
            Err(NativeError::TypeMismatch { expected: "pair", .. })
        ));
    }

    #[test]
    fn explicitly_released_handle_is_stale_for_its_children() {
        let heap = NativeHeap::new();
        let specs = heap.allocate(NativeNode::vector(vec![residue("A", 1)]));
        let id = specs.id();
        assert!(heap.release(id));
        assert!(matches!(specs.len(), Err(NativeError::StaleHandle { .. })));
        drop(specs);
        assert_eq!(heap.stats().rejected_releases, 1);
    }

    #[test]
    fn plain_value_copies_the_whole_subtree() {
        let heap = NativeHeap::new();
        let node = heap.allocate(NativeNode::pair(
            true,
            NativeNode::vector(vec![NativeNode::from("x"), NativeNode::Float(0.5)]),
        ));
        assert_eq!(node.to_plain_value().unwrap(), json!([true, ["x", 0.5]]));
        assert_eq!(heap.stats().acquired, 1);
    }
}
