//! # Typed Object Serialization
//!
//! Maps aliases to registered types and rebuilds typed objects from the
//! key/value maps a document stores them as.
//!
//! A serialized object is a map carrying [`SERIALIZED_TYPE_KEY`] whose value
//! is the alias of its type. Each registered type declares an ordered set of
//! reconstruction strategies; the first one that succeeds wins:
//!
//! 1. [`ReconstructionStrategy::Deserialize`]
//! 2. [`ReconstructionStrategy::ValueOf`]
//! 3. [`ReconstructionStrategy::Constructor`]
//!
//! The registry is a plain value owned by the application and handed to the
//! codec, so separate registries never see each other's aliases.

use crate::value::SerializedMap;
use errors::SerializationError;
use std::any::{Any, TypeId};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;
use tracing::{debug, error, warn};

/// Reserved key marking a map as a serialized typed object.
pub const SERIALIZED_TYPE_KEY: &str = "==";

/// A domain object that can be stored inside a configuration tree.
pub trait ConfigSerializable: Any + fmt::Debug + Send + Sync {
    /// The object's own key/value pairs, without the type key.
    fn serialize(&self) -> SerializedMap;

    fn as_any(&self) -> &dyn Any;

    fn type_name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }
}

impl dyn ConfigSerializable {
    pub fn downcast_ref<T: ConfigSerializable>(&self) -> Option<&T> {
        self.as_any().downcast_ref::<T>()
    }
}

/// Types that know how to describe themselves to a registry.
pub trait SerializableType: ConfigSerializable + Sized {
    fn descriptor() -> TypeDescriptor;
}

/// How a registered type is rebuilt from its serialized map, in
/// precedence order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ReconstructionStrategy {
    Deserialize,
    ValueOf,
    Constructor
}

impl fmt::Display for ReconstructionStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Deserialize => f.write_str("deserialize"),
            Self::ValueOf => f.write_str("valueOf"),
            Self::Constructor => f.write_str("constructor")
        }
    }
}

type Reconstructor =
    Arc<dyn Fn(&SerializedMap) -> anyhow::Result<Arc<dyn ConfigSerializable>> + Send + Sync>;

/// Registration record of one serializable type.
#[derive(Clone)]
pub struct TypeDescriptor {
    type_id: TypeId,
    type_name: &'static str,
    alias: Option<String>,
    delegate: Option<(TypeId, &'static str)>,
    strategies: BTreeMap<ReconstructionStrategy, Reconstructor>
}

impl TypeDescriptor {
    pub fn builder<T: ConfigSerializable>() -> TypeDescriptorBuilder<T> {
        TypeDescriptorBuilder {
            inner: Self {
                type_id: TypeId::of::<T>(),
                type_name: std::any::type_name::<T>(),
                alias: None,
                delegate: None,
                strategies: BTreeMap::new()
            },
            _marker: PhantomData
        }
    }

    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    /// Fully-qualified type name, also used as the fallback alias.
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    pub fn declared_alias(&self) -> Option<&str> {
        self.alias.as_deref()
    }

    pub fn strategies(&self) -> impl Iterator<Item = ReconstructionStrategy> + '_ {
        self.strategies.keys().copied()
    }

    fn delegates_elsewhere(&self) -> Option<(TypeId, &'static str)> {
        self.delegate.filter(|(id, _)| *id != self.type_id)
    }

    /// Runs the strategies in precedence order. Every failure is logged and
    /// the next strategy is tried; `None` once all of them failed.
    pub fn reconstruct(&self, map: &SerializedMap) -> Option<Arc<dyn ConfigSerializable>> {
        if self.strategies.is_empty() {
            warn!(type_name = self.type_name, "No reconstruction strategy registered");
            return None;
        }

        for (strategy, reconstruct) in &self.strategies {
            match reconstruct(map) {
                Ok(object) => {
                    debug!(type_name = self.type_name, %strategy, "Deserialized object");
                    return Some(object);
                }
                Err(e) => {
                    error!(
                        type_name = self.type_name,
                        %strategy,
                        "Could not call {} of {} for deserialization: {:#}",
                        strategy,
                        self.type_name,
                        e
                    );
                }
            }
        }

        None
    }
}

impl fmt::Debug for TypeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeDescriptor")
            .field("type_name", &self.type_name)
            .field("alias", &self.alias)
            .field("delegate", &self.delegate.map(|(_, name)| name))
            .field("strategies", &self.strategies.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Typed builder so every strategy is checked to produce the described type.
pub struct TypeDescriptorBuilder<T> {
    inner: TypeDescriptor,
    _marker: PhantomData<fn() -> T>
}

impl<T: ConfigSerializable> TypeDescriptorBuilder<T> {
    pub fn alias(mut self, alias: impl Into<String>) -> Self {
        self.inner.alias = Some(alias.into());
        self
    }

    /// Serialize this type under the alias of `U`.
    pub fn delegate_to<U: ConfigSerializable>(mut self) -> Self {
        self.inner.delegate = Some((TypeId::of::<U>(), std::any::type_name::<U>()));
        self
    }

    pub fn deserialize_with<F>(self, f: F) -> Self
    where
        F: Fn(&SerializedMap) -> anyhow::Result<T> + Send + Sync + 'static
    {
        self.strategy(ReconstructionStrategy::Deserialize, f)
    }

    pub fn value_of<F>(self, f: F) -> Self
    where
        F: Fn(&SerializedMap) -> anyhow::Result<T> + Send + Sync + 'static
    {
        self.strategy(ReconstructionStrategy::ValueOf, f)
    }

    pub fn constructor<F>(self, f: F) -> Self
    where
        F: Fn(&SerializedMap) -> anyhow::Result<T> + Send + Sync + 'static
    {
        self.strategy(ReconstructionStrategy::Constructor, f)
    }

    pub fn strategy<F>(mut self, strategy: ReconstructionStrategy, f: F) -> Self
    where
        F: Fn(&SerializedMap) -> anyhow::Result<T> + Send + Sync + 'static
    {
        let reconstruct: Reconstructor = Arc::new(move |map: &SerializedMap| {
            f(map).map(|t| Arc::new(t) as Arc<dyn ConfigSerializable>)
        });
        self.inner.strategies.insert(strategy, reconstruct);
        self
    }

    pub fn build(self) -> TypeDescriptor {
        self.inner
    }
}

/// Alias table for typed objects.
#[derive(Debug, Clone, Default)]
pub struct SerializationRegistry {
    aliases: HashMap<String, Arc<TypeDescriptor>>,
    descriptors: HashMap<TypeId, Arc<TypeDescriptor>>
}

impl SerializationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `T` using its own descriptor.
    pub fn register<T: SerializableType>(&mut self) {
        self.register_class(T::descriptor());
    }

    /// Registers a type under its alias and under its type name.
    ///
    /// Types that delegate to another type only have their metadata recorded,
    /// so alias resolution works for them but they own no alias entry.
    pub fn register_class(&mut self, descriptor: TypeDescriptor) {
        let descriptor = Arc::new(descriptor);
        self.descriptors
            .insert(descriptor.type_id, Arc::clone(&descriptor));

        if descriptor.delegates_elsewhere().is_some() {
            debug!(
                type_name = descriptor.type_name,
                "Recorded delegating type without alias entry"
            );
            return;
        }

        let alias = self.alias_of(descriptor.type_id, descriptor.type_name);
        debug!(type_name = descriptor.type_name, %alias, "Registered serializable type");
        self.aliases.insert(alias, Arc::clone(&descriptor));
        self.aliases
            .insert(descriptor.type_name.to_string(), descriptor);
    }

    /// Registers a type under an explicit alias only. The last registration
    /// of an alias wins.
    pub fn register_class_as(&mut self, descriptor: TypeDescriptor, alias: impl Into<String>) {
        let descriptor = Arc::new(descriptor);
        self.descriptors
            .entry(descriptor.type_id)
            .or_insert_with(|| Arc::clone(&descriptor));
        self.aliases.insert(alias.into(), descriptor);
    }

    pub fn unregister_alias(&mut self, alias: &str) -> Option<Arc<TypeDescriptor>> {
        self.aliases.remove(alias)
    }

    /// Drops every alias pointing at `T`.
    pub fn unregister_class<T: 'static>(&mut self) {
        let type_id = TypeId::of::<T>();
        self.aliases.retain(|_, d| d.type_id != type_id);
    }

    pub fn class_by_alias(&self, alias: &str) -> Option<&TypeDescriptor> {
        self.aliases.get(alias).map(|d| &**d)
    }

    pub fn descriptor_of<T: 'static>(&self) -> Option<&TypeDescriptor> {
        self.descriptors.get(&TypeId::of::<T>()).map(|d| &**d)
    }

    /// Alias written into the type key when `object` is serialized.
    pub fn get_alias(&self, object: &dyn ConfigSerializable) -> String {
        self.alias_of(object.as_any().type_id(), object.type_name())
    }

    pub fn alias_for<T: ConfigSerializable>(&self) -> String {
        self.alias_of(TypeId::of::<T>(), std::any::type_name::<T>())
    }

    // Delegation chains are followed without cycle detection.
    fn alias_of(&self, type_id: TypeId, type_name: &'static str) -> String {
        let Some(descriptor) = self.descriptors.get(&type_id) else {
            return type_name.to_string();
        };

        if let Some((delegate_id, delegate_name)) = descriptor.delegates_elsewhere() {
            return self.alias_of(delegate_id, delegate_name);
        }

        descriptor
            .alias
            .clone()
            .unwrap_or_else(|| descriptor.type_name.to_string())
    }

    /// Rebuilds the object described by `map`.
    ///
    /// ## Errors
    /// - `MissingTypeKey`: `map` has no [`SERIALIZED_TYPE_KEY`]
    /// - `NullAlias`: the type key does not hold a string
    /// - `UnknownAlias`: no type is registered under the alias
    ///
    /// `Ok(None)` means the type was found but every strategy failed; the
    /// caller decides what to keep instead.
    pub fn deserialize_object(
        &self,
        map: &SerializedMap
    ) -> Result<Option<Arc<dyn ConfigSerializable>>, SerializationError> {
        let alias = map
            .get(SERIALIZED_TYPE_KEY)
            .ok_or_else(|| SerializationError::MissingTypeKey {
                type_key: SERIALIZED_TYPE_KEY.to_string()
            })?
            .as_str()
            .ok_or_else(|| SerializationError::NullAlias {
                type_key: SERIALIZED_TYPE_KEY.to_string()
            })?;

        let descriptor = self
            .aliases
            .get(alias)
            .ok_or_else(|| SerializationError::UnknownAlias {
                alias: alias.to_string()
            })?;

        Ok(descriptor.reconstruct(map))
    }

    /// Rebuilds `map` as the given type, ignoring any type key it carries.
    pub fn deserialize_object_as(
        &self,
        map: &SerializedMap,
        descriptor: &TypeDescriptor
    ) -> Option<Arc<dyn ConfigSerializable>> {
        descriptor.reconstruct(map)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Value;
    use anyhow::{Context, bail};

    #[derive(Debug, Clone, PartialEq)]
    struct Point {
        x: i64,
        y: i64
    }

    impl ConfigSerializable for Point {
        fn serialize(&self) -> SerializedMap {
            let mut map = SerializedMap::new();
            map.insert("x".to_string(), Value::Integer(self.x));
            map.insert("y".to_string(), Value::Integer(self.y));
            map
        }

        fn as_any(&self) -> &dyn Any {
            self
        }
    }

    fn point_from(map: &SerializedMap) -> anyhow::Result<Point> {
        Ok(Point {
            x: map.get("x").and_then(Value::as_i64).context("missing x")?,
            y: map.get("y").and_then(Value::as_i64).context("missing y")?
        })
    }

    impl SerializableType for Point {
        fn descriptor() -> TypeDescriptor {
            TypeDescriptor::builder::<Point>()
                .alias("Point")
                .constructor(point_from)
                .build()
        }
    }

    #[derive(Debug, Clone, PartialEq)]
    struct Vector {
        dx: i64
    }

    impl ConfigSerializable for Vector {
        fn serialize(&self) -> SerializedMap {
            let mut map = SerializedMap::new();
            map.insert("dx".to_string(), Value::Integer(self.dx));
            map
        }

        fn as_any(&self) -> &dyn Any {
            self
        }
    }

    #[derive(Debug)]
    struct LegacyPoint;

    impl ConfigSerializable for LegacyPoint {
        fn serialize(&self) -> SerializedMap {
            SerializedMap::new()
        }

        fn as_any(&self) -> &dyn Any {
            self
        }
    }

    fn serialized(alias: &str, pairs: &[(&str, i64)]) -> SerializedMap {
        let mut map = SerializedMap::new();
        map.insert(SERIALIZED_TYPE_KEY.to_string(), Value::from(alias));
        for (key, value) in pairs {
            map.insert((*key).to_string(), Value::Integer(*value));
        }
        map
    }

    #[test]
    fn test_register_stores_alias_and_type_name() {
        let mut registry = SerializationRegistry::new();
        registry.register::<Point>();

        assert!(registry.class_by_alias("Point").is_some());
        assert!(
            registry
                .class_by_alias(std::any::type_name::<Point>())
                .is_some()
        );
        assert_eq!(registry.alias_for::<Point>(), "Point");
    }

    #[test]
    fn test_deserialize_object() {
        let mut registry = SerializationRegistry::new();
        registry.register::<Point>();

        let object = registry
            .deserialize_object(&serialized("Point", &[("x", 1), ("y", 2)]))
            .unwrap()
            .unwrap();

        assert_eq!(object.downcast_ref::<Point>(), Some(&Point { x: 1, y: 2 }));
        assert_eq!(registry.get_alias(&*object), "Point");
    }

    #[test]
    fn test_missing_and_unknown_alias_are_errors() {
        let registry = SerializationRegistry::new();

        let result = registry.deserialize_object(&SerializedMap::new());
        assert!(matches!(
            result,
            Err(SerializationError::MissingTypeKey { .. })
        ));

        let result = registry.deserialize_object(&serialized("Nope", &[]));
        assert!(matches!(result, Err(SerializationError::UnknownAlias { .. })));

        let mut map = SerializedMap::new();
        map.insert(SERIALIZED_TYPE_KEY.to_string(), Value::Integer(5));
        let result = registry.deserialize_object(&map);
        assert!(matches!(result, Err(SerializationError::NullAlias { .. })));
    }

    #[test]
    fn test_strategy_precedence_falls_through_failures() {
        let mut registry = SerializationRegistry::new();
        registry.register_class(
            TypeDescriptor::builder::<Point>()
                .alias("Point")
                .constructor(|_| Ok(Point { x: 3, y: 3 }))
                .value_of(|_| Ok(Point { x: 2, y: 2 }))
                .deserialize_with(|_| bail!("deserialize is broken"))
                .build()
        );

        let object = registry
            .deserialize_object(&serialized("Point", &[]))
            .unwrap()
            .unwrap();

        assert_eq!(object.downcast_ref::<Point>(), Some(&Point { x: 2, y: 2 }));
    }

    #[test]
    fn test_all_strategies_failing_yields_none() {
        let mut registry = SerializationRegistry::new();
        registry.register::<Point>();

        let result = registry
            .deserialize_object(&serialized("Point", &[("x", 1)]))
            .unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn test_last_registration_of_alias_wins() {
        let mut registry = SerializationRegistry::new();
        registry.register::<Point>();
        registry.register_class_as(
            TypeDescriptor::builder::<Vector>()
                .constructor(|map| {
                    Ok(Vector {
                        dx: map.get("x").and_then(Value::as_i64).unwrap_or_default()
                    })
                })
                .build(),
            "Point"
        );

        let object = registry
            .deserialize_object(&serialized("Point", &[("x", 9), ("y", 1)]))
            .unwrap()
            .unwrap();

        assert_eq!(object.downcast_ref::<Vector>(), Some(&Vector { dx: 9 }));
    }

    #[test]
    fn test_delegate_resolves_alias_of_target() {
        let mut registry = SerializationRegistry::new();
        registry.register::<Point>();
        registry.register_class(
            TypeDescriptor::builder::<LegacyPoint>()
                .alias("Legacy")
                .delegate_to::<Point>()
                .build()
        );

        assert_eq!(registry.alias_for::<LegacyPoint>(), "Point");
        assert!(registry.class_by_alias("Legacy").is_none());
    }

    #[test]
    fn test_unknown_type_falls_back_to_type_name() {
        let registry = SerializationRegistry::new();
        assert_eq!(
            registry.alias_for::<Vector>(),
            std::any::type_name::<Vector>()
        );
    }

    #[test]
    fn test_unregister() {
        let mut registry = SerializationRegistry::new();
        registry.register::<Point>();

        registry.unregister_alias("Point");
        assert!(registry.class_by_alias("Point").is_none());
        assert!(
            registry
                .class_by_alias(std::any::type_name::<Point>())
                .is_some()
        );

        registry.unregister_class::<Point>();
        assert!(
            registry
                .class_by_alias(std::any::type_name::<Point>())
                .is_none()
        );
    }

    #[test]
    fn test_deserialize_object_as_ignores_type_key() {
        let registry = SerializationRegistry::new();
        let descriptor = Point::descriptor();

        let object = registry
            .deserialize_object_as(&serialized("Whatever", &[("x", 4), ("y", 5)]), &descriptor)
            .unwrap();

        assert_eq!(object.downcast_ref::<Point>(), Some(&Point { x: 4, y: 5 }));
    }
}
