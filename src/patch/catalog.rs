//! Module catalog
//!
//! Every module type exposes the same [`ModuleCapabilities`] interface: how
//! many pins it has (possibly depending on its state), which pins a splice
//! goes through, whether it is a pass-through, and how big it draws. Editing
//! code asks the catalog instead of special-casing type tags.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::graph::SignalKind;
use super::nested::CompositeBlob;
use crate::canvas::Size;
use crate::error::Result;

pub const SINK: &str = "sink";
pub const PASSTHROUGH: &str = "passthrough";
pub const STEREO_PASSTHROUGH: &str = "stereo_passthrough";
pub const MAP_RANGE: &str = "map_range";
pub const COMPARATOR: &str = "comparator";
pub const COMPOSITE: &str = "composite";
pub const INLET: &str = "inlet";
pub const OUTLET: &str = "outlet";

const BODY_WIDTH: f32 = 160.0;
const HEADER_HEIGHT: f32 = 32.0;
const PIN_ROW_HEIGHT: f32 = 22.0;

/// Uniform per-type capability interface
pub trait ModuleCapabilities: Send + Sync + fmt::Debug {
    fn type_tag(&self) -> &str;

    /// Number of input channels for a module in `state`
    fn input_count(&self, state: &[u8]) -> u16;

    /// Number of output channels for a module in `state`
    fn output_count(&self, state: &[u8]) -> u16;

    /// Pass-through modules adopt the signal kind of whatever feeds them
    fn is_passthrough(&self) -> bool {
        false
    }

    /// Input a splice connects the upstream side to
    fn primary_input(&self) -> u16 {
        0
    }

    /// Output a splice takes the downstream side from
    fn primary_output(&self) -> u16 {
        0
    }

    /// Whether users may place this type directly
    fn user_creatable(&self) -> bool {
        true
    }

    /// Extra body height for types that draw custom content
    fn custom_body_height(&self, _state: &[u8]) -> Option<f32> {
        None
    }

    fn input_label(&self, channel: u16) -> String {
        format!("in {}", channel + 1)
    }

    fn output_label(&self, channel: u16) -> String {
        format!("out {}", channel + 1)
    }

    /// Estimated drawn size, used when the UI has not measured the module
    fn footprint(&self, state: &[u8]) -> Size {
        let rows = self.input_count(state).max(self.output_count(state)) as f32;
        let body = self.custom_body_height(state).unwrap_or(0.0);
        Size::new(BODY_WIDTH, HEADER_HEIGHT + rows * PIN_ROW_HEIGHT + body)
    }
}

/// A type with a fixed pin layout
#[derive(Debug, Clone)]
pub struct FixedModule {
    pub tag: String,
    pub inputs: u16,
    pub outputs: u16,
    pub passthrough: bool,
    pub creatable: bool,
    pub body_height: Option<f32>,
}

impl FixedModule {
    pub fn new(tag: impl Into<String>, inputs: u16, outputs: u16) -> Self {
        Self {
            tag: tag.into(),
            inputs,
            outputs,
            passthrough: false,
            creatable: true,
            body_height: None,
        }
    }

    pub fn passthrough(mut self) -> Self {
        self.passthrough = true;
        self
    }

    pub fn internal(mut self) -> Self {
        self.creatable = false;
        self
    }

    pub fn with_body(mut self, height: f32) -> Self {
        self.body_height = Some(height);
        self
    }
}

impl ModuleCapabilities for FixedModule {
    fn type_tag(&self) -> &str {
        &self.tag
    }

    fn input_count(&self, _state: &[u8]) -> u16 {
        self.inputs
    }

    fn output_count(&self, _state: &[u8]) -> u16 {
        self.outputs
    }

    fn is_passthrough(&self) -> bool {
        self.passthrough
    }

    fn user_creatable(&self) -> bool {
        self.creatable
    }

    fn custom_body_height(&self, _state: &[u8]) -> Option<f32> {
        self.body_height
    }
}

/// Composite module: pin lists come from the nested blob it carries
#[derive(Debug, Clone, Default)]
pub struct CompositeModule;

impl ModuleCapabilities for CompositeModule {
    fn type_tag(&self) -> &str {
        COMPOSITE
    }

    fn input_count(&self, state: &[u8]) -> u16 {
        CompositeBlob::from_bytes(state)
            .map(|b| b.input_width())
            .unwrap_or(0)
    }

    fn output_count(&self, state: &[u8]) -> u16 {
        CompositeBlob::from_bytes(state)
            .map(|b| b.output_width())
            .unwrap_or(0)
    }

    fn input_label(&self, channel: u16) -> String {
        format!("inlet {}", channel + 1)
    }

    fn output_label(&self, channel: u16) -> String {
        format!("outlet {}", channel + 1)
    }
}

/// Parameters written into adapter and pass-through module state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "adapter", rename_all = "snake_case")]
pub enum AdapterParams {
    /// Pass-through carrying whatever the source side produces
    Passthrough { signal: SignalKind },
    /// Linear map from the source range onto the destination range
    MapRange {
        in_min: f32,
        in_max: f32,
        out_min: f32,
        out_max: f32,
    },
    /// Emits a gate while the input is above `threshold`
    Comparator { threshold: f32 },
}

impl AdapterParams {
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }
}

/// Type tag → capabilities
#[derive(Debug, Clone, Default)]
pub struct ModuleCatalog {
    types: BTreeMap<String, Arc<dyn ModuleCapabilities>>,
}

impl ModuleCatalog {
    /// Empty catalog (no types, not even the sink)
    pub fn new() -> Self {
        Self::default()
    }

    /// Catalog with the editor's own types plus a small set of common modules
    pub fn with_builtins() -> Self {
        let mut catalog = Self::new();
        catalog.register(FixedModule::new(SINK, 2, 0).internal());
        catalog.register(FixedModule::new(PASSTHROUGH, 1, 1).passthrough());
        catalog.register(FixedModule::new(STEREO_PASSTHROUGH, 2, 2).passthrough());
        catalog.register(FixedModule::new(MAP_RANGE, 1, 1));
        catalog.register(FixedModule::new(COMPARATOR, 1, 1));
        catalog.register(FixedModule::new(INLET, 0, 1).internal());
        catalog.register(FixedModule::new(OUTLET, 1, 0).internal());
        catalog.register(CompositeModule);

        catalog.register(FixedModule::new("oscillator", 1, 1));
        catalog.register(FixedModule::new("lfo", 0, 1));
        catalog.register(FixedModule::new("noise", 0, 1));
        catalog.register(FixedModule::new("envelope", 1, 1));
        catalog.register(FixedModule::new("filter", 2, 1));
        catalog.register(FixedModule::new("vca", 2, 1));
        catalog.register(FixedModule::new("mixer", 4, 1));
        catalog.register(FixedModule::new("stereo_delay", 2, 2));
        catalog.register(FixedModule::new("scope", 1, 1).with_body(90.0));
        catalog
    }

    pub fn register(&mut self, capabilities: impl ModuleCapabilities + 'static) {
        let tag = capabilities.type_tag().to_string();
        self.types.insert(tag, Arc::new(capabilities));
    }

    pub fn get(&self, type_tag: &str) -> Option<&Arc<dyn ModuleCapabilities>> {
        self.types.get(type_tag)
    }

    pub fn contains(&self, type_tag: &str) -> bool {
        self.types.contains_key(type_tag)
    }

    pub fn is_passthrough(&self, type_tag: &str) -> bool {
        self.get(type_tag).map_or(false, |c| c.is_passthrough())
    }

    pub fn type_tags(&self) -> impl Iterator<Item = &str> {
        self.types.keys().map(String::as_str)
    }
}
