//! In-memory live-object runtime
//!
//! An arena of objects with names, classes, a parent/child hierarchy, named
//! properties, tags and attributes. `Name` and `Parent` read and write like any
//! other property.
//!
//! When built with a schema, construction of unknown classes, access to
//! undeclared properties and writes to read-only properties fail, the way a real
//! runtime would reject them.

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::sync::Arc;

use super::{EnumNamespace, LiveObjectReader, LiveObjectWriter, RuntimeError, RuntimeResult};
use crate::schema::{ApiDump, SchemaProvider};
use crate::types::{ObjectId, NAME_PROPERTY, PARENT_PROPERTY};
use crate::value::{EnumItem, Value};

const CLASS_NAME_PROPERTY: &str = "ClassName";

#[derive(Debug, Clone)]
struct ObjectRecord {
    class_name: String,
    name: String,
    parent: Option<ObjectId>,
    children: Vec<ObjectId>,
    properties: BTreeMap<String, Value>,
    tags: Vec<String>,
    attributes: BTreeMap<String, Value>,
}

/// Arena-backed object runtime
#[derive(Debug, Clone, Default)]
pub struct MemoryRuntime {
    objects: BTreeMap<ObjectId, ObjectRecord>,
    next_id: u64,
    schema: Option<Arc<ApiDump>>,
}

impl MemoryRuntime {
    /// Runtime that accepts any class and property
    pub fn new() -> Self {
        Self::default()
    }

    /// Runtime validated against a schema
    pub fn with_schema(schema: Arc<ApiDump>) -> Self {
        Self {
            schema: Some(schema),
            ..Self::default()
        }
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    pub fn contains(&self, object: ObjectId) -> bool {
        self.objects.contains_key(&object)
    }

    /// Create a named object, optionally under a parent
    pub fn spawn(
        &mut self,
        class_name: &str,
        name: &str,
        parent: Option<ObjectId>,
    ) -> RuntimeResult<ObjectId> {
        let object = self.create(class_name)?;
        self.set_name(object, name)?;
        if parent.is_some() {
            self.set_parent(object, parent)?;
        }
        Ok(object)
    }

    /// Store a property value without schema validation
    pub fn put(&mut self, object: ObjectId, name: &str, value: impl Into<Value>) {
        if let Some(record) = self.objects.get_mut(&object) {
            record.properties.insert(name.to_string(), value.into());
        }
    }

    /// Direct children in insertion order
    pub fn children(&self, object: ObjectId) -> RuntimeResult<&[ObjectId]> {
        Ok(&self.record(object)?.children)
    }

    /// First direct child with the given name
    pub fn find_child(&self, object: ObjectId, name: &str) -> Option<ObjectId> {
        let record = self.objects.get(&object)?;
        record
            .children
            .iter()
            .copied()
            .find(|child| self.objects.get(child).is_some_and(|c| c.name == name))
    }

    /// Move `object` under `parent`, or detach it with `None`
    pub fn set_parent(&mut self, object: ObjectId, parent: Option<ObjectId>) -> RuntimeResult<()> {
        self.record(object)?;
        if let Some(parent) = parent {
            self.record(parent)?;
            if parent == object || self.is_ancestor(object, parent) {
                return Err(RuntimeError::InvalidParent {
                    object,
                    message: format!("{parent} is {object} or one of its descendants"),
                });
            }
        }

        let old_parent = self.record(object)?.parent;
        if let Some(old) = old_parent {
            if let Some(record) = self.objects.get_mut(&old) {
                record.children.retain(|child| *child != object);
            }
        }
        if let Some(parent) = parent {
            if let Some(record) = self.objects.get_mut(&parent) {
                record.children.push(object);
            }
        }
        self.record_mut(object)?.parent = parent;
        Ok(())
    }

    /// Indented `Name (Class)` outline of a subtree
    pub fn render_tree(&self, root: ObjectId) -> RuntimeResult<String> {
        let mut out = String::new();
        let mut stack = vec![(root, 0usize)];
        while let Some((object, depth)) = stack.pop() {
            let record = self.record(object)?;
            let _ = writeln!(
                out,
                "{:indent$}{} ({})",
                "",
                record.name,
                record.class_name,
                indent = depth * 2
            );
            stack.extend(record.children.iter().rev().map(|c| (*c, depth + 1)));
        }
        Ok(out)
    }

    fn record(&self, object: ObjectId) -> RuntimeResult<&ObjectRecord> {
        self.objects
            .get(&object)
            .ok_or(RuntimeError::UnknownObject { object })
    }

    fn record_mut(&mut self, object: ObjectId) -> RuntimeResult<&mut ObjectRecord> {
        self.objects
            .get_mut(&object)
            .ok_or(RuntimeError::UnknownObject { object })
    }

    /// Whether `ancestor` is a proper ancestor of `object`
    fn is_ancestor(&self, ancestor: ObjectId, object: ObjectId) -> bool {
        let mut current = self.objects.get(&object).and_then(|r| r.parent);
        while let Some(next) = current {
            if next == ancestor {
                return true;
            }
            current = self.objects.get(&next).and_then(|r| r.parent);
        }
        false
    }

    /// Schema check for a property access; `writing` also rejects read-only ones
    fn check_property(&self, class_name: &str, property: &str, writing: bool) -> RuntimeResult<()> {
        let Some(schema) = &self.schema else {
            return Ok(());
        };
        let descriptor = schema
            .class_properties(class_name)
            .into_iter()
            .find(|d| d.name == property)
            .ok_or_else(|| RuntimeError::unknown_property(class_name, property))?;
        if writing && descriptor.read_only {
            return Err(RuntimeError::read_only(class_name, property));
        }
        Ok(())
    }
}

impl LiveObjectReader for MemoryRuntime {
    fn name(&self, object: ObjectId) -> RuntimeResult<String> {
        Ok(self.record(object)?.name.clone())
    }

    fn class_name(&self, object: ObjectId) -> RuntimeResult<String> {
        Ok(self.record(object)?.class_name.clone())
    }

    fn parent(&self, object: ObjectId) -> RuntimeResult<Option<ObjectId>> {
        Ok(self.record(object)?.parent)
    }

    fn property(&self, object: ObjectId, name: &str) -> RuntimeResult<Value> {
        let record = self.record(object)?;
        match name {
            NAME_PROPERTY => Ok(Value::String(record.name.clone())),
            PARENT_PROPERTY => Ok(Value::Object(record.parent)),
            CLASS_NAME_PROPERTY => Ok(Value::String(record.class_name.clone())),
            _ => {
                self.check_property(&record.class_name, name, false)?;
                Ok(record.properties.get(name).cloned().unwrap_or(Value::Nil))
            }
        }
    }

    fn descendants(&self, object: ObjectId) -> RuntimeResult<Vec<ObjectId>> {
        let mut out = Vec::new();
        let mut stack: Vec<ObjectId> = self.record(object)?.children.iter().rev().copied().collect();
        while let Some(next) = stack.pop() {
            out.push(next);
            stack.extend(self.record(next)?.children.iter().rev().copied());
        }
        Ok(out)
    }

    fn tags(&self, object: ObjectId) -> RuntimeResult<Vec<String>> {
        Ok(self.record(object)?.tags.clone())
    }

    fn attributes(&self, object: ObjectId) -> RuntimeResult<BTreeMap<String, Value>> {
        Ok(self.record(object)?.attributes.clone())
    }
}

impl EnumNamespace for MemoryRuntime {
    fn resolve_enum(&self, category: &str, member: &str) -> Option<EnumItem> {
        match &self.schema {
            Some(schema) => schema.resolve_enum(category, member),
            None => Some(EnumItem::new(category, member)),
        }
    }
}

impl LiveObjectWriter for MemoryRuntime {
    fn create(&mut self, class_name: &str) -> RuntimeResult<ObjectId> {
        if let Some(schema) = &self.schema {
            if !schema.has_class(class_name) {
                return Err(RuntimeError::unknown_class(class_name));
            }
        }
        self.next_id += 1;
        let object = ObjectId(self.next_id);
        self.objects.insert(
            object,
            ObjectRecord {
                class_name: class_name.to_string(),
                name: class_name.to_string(),
                parent: None,
                children: Vec::new(),
                properties: BTreeMap::new(),
                tags: Vec::new(),
                attributes: BTreeMap::new(),
            },
        );
        Ok(object)
    }

    fn set_name(&mut self, object: ObjectId, name: &str) -> RuntimeResult<()> {
        self.record_mut(object)?.name = name.to_string();
        Ok(())
    }

    fn set_property(&mut self, object: ObjectId, name: &str, value: Value) -> RuntimeResult<()> {
        match (name, value) {
            (NAME_PROPERTY, Value::String(s)) => self.set_name(object, &s),
            (PARENT_PROPERTY, Value::Object(parent)) => self.set_parent(object, parent),
            (NAME_PROPERTY | PARENT_PROPERTY, other) => Err(RuntimeError::rejected(format!(
                "{name} cannot be set to a {}",
                other.type_name()
            ))),
            (_, value) => {
                let class_name = self.record(object)?.class_name.clone();
                self.check_property(&class_name, name, true)?;
                self.record_mut(object)?
                    .properties
                    .insert(name.to_string(), value);
                Ok(())
            }
        }
    }

    fn add_tag(&mut self, object: ObjectId, tag: &str) -> RuntimeResult<()> {
        let record = self.record_mut(object)?;
        if !record.tags.iter().any(|t| t == tag) {
            record.tags.push(tag.to_string());
        }
        Ok(())
    }

    fn set_attribute(&mut self, object: ObjectId, name: &str, value: Value) -> RuntimeResult<()> {
        if let Value::Object(_) = value {
            return Err(RuntimeError::rejected(format!(
                "attribute {name} cannot hold an object link"
            )));
        }
        self.record_mut(object)?
            .attributes
            .insert(name.to_string(), value);
        Ok(())
    }
}
