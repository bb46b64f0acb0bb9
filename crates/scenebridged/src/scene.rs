//! Reference in-memory scene.
//!
//! The bridge is normally embedded in a 3D application that supplies its own
//! scene commands. This module provides a small stand-in so the daemon is
//! usable on its own: objects with a primitive shape, a location and an
//! optional material.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use scenebridge_protocol::Params;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::registry::{
    ArgSpec, CommandRegistry, HandlerError, HandlerResult, RegistryError, ToolDescriptor,
};

/// Primitive shapes the reference scene can create.
pub const SHAPES: &[&str] = &[
    "cone", "cube", "cylinder", "grid", "ico_sphere", "monkey", "plane", "torus", "uv_sphere",
];

/// One object in the scene.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SceneObject {
    /// Unique name.
    pub name: String,
    /// Primitive shape.
    pub shape: String,
    /// World-space location.
    pub location: [f64; 3],
    /// Assigned material, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub material: Option<String>,
}

/// Mutable scene state shared by the reference handlers.
#[derive(Debug, Default)]
pub struct SceneStore {
    objects: Mutex<BTreeMap<String, SceneObject>>,
}

impl SceneStore {
    /// Empty scene.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of every object, sorted by name.
    #[must_use]
    pub fn objects(&self) -> Vec<SceneObject> {
        self.lock().values().cloned().collect()
    }

    fn lock(&self) -> MutexGuard<'_, BTreeMap<String, SceneObject>> {
        self.objects.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn create(&self, request: CreateObject) -> Result<SceneObject, HandlerError> {
        let shape = request.shape.trim().to_ascii_lowercase();
        if !SHAPES.contains(&shape.as_str()) {
            return Err(HandlerError::invalid_params(format!(
                "unsupported shape '{shape}'; expected one of {}",
                SHAPES.join(", ")
            )));
        }
        let mut objects = self.lock();
        let base = request.name.unwrap_or_else(|| title_case(&shape));
        let name = unique_name(&objects, &base);
        let object = SceneObject {
            name: name.clone(),
            shape,
            location: request.location,
            material: None,
        };
        objects.insert(name, object.clone());
        Ok(object)
    }

    fn delete(&self, name: &str) -> Result<SceneObject, HandlerError> {
        self.lock().remove(name).ok_or_else(|| missing(name))
    }

    fn assign_material(&self, object: &str, material: &str) -> Result<SceneObject, HandlerError> {
        let mut objects = self.lock();
        let entry = objects.get_mut(object).ok_or_else(|| missing(object))?;
        entry.material = Some(material.to_owned());
        Ok(entry.clone())
    }

    fn clear(&self) -> usize {
        let mut objects = self.lock();
        let removed = objects.len();
        objects.clear();
        removed
    }
}

#[derive(Debug, Deserialize)]
struct CreateObject {
    #[serde(default = "default_shape", alias = "type")]
    shape: String,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    location: [f64; 3],
}

fn default_shape() -> String {
    "cube".to_owned()
}

#[derive(Debug, Deserialize)]
struct NamedObject {
    name: String,
}

#[derive(Debug, Deserialize)]
struct AssignMaterial {
    object: String,
    material: String,
}

fn parse<T: DeserializeOwned>(params: &Params) -> Result<T, HandlerError> {
    serde_json::from_value(Value::Object(params.clone())).map_err(HandlerError::invalid_params)
}

fn missing(name: &str) -> HandlerError {
    HandlerError::new(format!("Object not found: {name}"))
}

fn title_case(shape: &str) -> String {
    shape
        .split('_')
        .map(|word| {
            let mut chars = word.chars();
            chars.next().map_or_else(String::new, |first| {
                first.to_uppercase().chain(chars).collect::<String>()
            })
        })
        .collect()
}

fn unique_name(objects: &BTreeMap<String, SceneObject>, base: &str) -> String {
    if !objects.contains_key(base) {
        return base.to_owned();
    }
    (1_u32..)
        .map(|n| format!("{base}.{n:03}"))
        .find(|candidate| !objects.contains_key(candidate))
        .unwrap_or_else(|| base.to_owned())
}

fn to_value(object: &SceneObject) -> HandlerResult {
    serde_json::to_value(object).map_err(|error| HandlerError::from_error(&error))
}

/// Registry exposing the reference scene.
///
/// # Errors
///
/// Returns [`RegistryError`] if a command name collides; the names are fixed,
/// so this only fires if the registry rules change.
pub fn reference_registry(scene: Arc<SceneStore>) -> Result<CommandRegistry, RegistryError> {
    let create = Arc::clone(&scene);
    let delete = Arc::clone(&scene);
    let list = Arc::clone(&scene);
    let assign = Arc::clone(&scene);
    let clear = scene;

    CommandRegistry::builder()
        .register(
            ToolDescriptor::new("create_object", "Adds a primitive object to the scene")
                .arg(ArgSpec::new("shape", "str").describe("Primitive shape, default cube"))
                .arg(ArgSpec::new("name", "str").describe("Object name (optional)"))
                .arg(ArgSpec::new("location", "list[float]").describe("X, Y, Z location")),
            move |params: &Params| -> HandlerResult {
                let object = create.create(parse(params)?)?;
                to_value(&object)
            },
        )
        .register(
            ToolDescriptor::new("delete_object", "Removes an object by name")
                .arg(ArgSpec::new("name", "str").describe("Object name")),
            move |params: &Params| -> HandlerResult {
                let NamedObject { name } = parse(params)?;
                let object = delete.delete(&name)?;
                Ok(json!({ "deleted": object.name }))
            },
        )
        .register(
            ToolDescriptor::new("list_objects", "Lists every object in the scene"),
            move |_: &Params| -> HandlerResult {
                serde_json::to_value(list.objects()).map_err(|error| HandlerError::from_error(&error))
            },
        )
        .register(
            ToolDescriptor::new("assign_material", "Assigns a material to an object")
                .arg(ArgSpec::new("object", "str").describe("Object name"))
                .arg(ArgSpec::new("material", "str").describe("Material name")),
            move |params: &Params| -> HandlerResult {
                let AssignMaterial { object, material } = parse(params)?;
                let object = assign.assign_material(&object, &material)?;
                to_value(&object)
            },
        )
        .register(
            ToolDescriptor::new("clear_scene", "Deletes every object"),
            move |_: &Params| -> HandlerResult { Ok(json!({ "removed": clear.clear() })) },
        )
        .build()
}
