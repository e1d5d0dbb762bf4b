//! Named driver registry.
//!
//! Drivers are registered on a registry value owned by whoever assembles the
//! detector, so lookup never depends on initialization order.

use super::{Classifier, DahuaClassifier, HikvisionClassifier};
use crate::config::DetectorConfig;
use crate::detector::{Detector, DetectorError};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Builds the classifier for one driver.
pub type ClassifierFactory = Box<dyn Fn() -> Arc<dyn Classifier> + Send + Sync>;

/// Maps driver names to classifier factories.
#[derive(Default)]
pub struct DriverRegistry {
    factories: BTreeMap<String, ClassifierFactory>,
}

impl DriverRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry with the built-in `dahua` and `hikvision` drivers.
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        registry.register("dahua", || Arc::new(DahuaClassifier));
        registry.register("hikvision", || Arc::new(HikvisionClassifier));
        registry
    }

    /// Register a driver, replacing any previous driver with the same name.
    pub fn register<F>(&mut self, name: impl Into<String>, factory: F)
    where
        F: Fn() -> Arc<dyn Classifier> + Send + Sync + 'static,
    {
        self.factories.insert(name.into(), Box::new(factory));
    }

    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    /// Registered driver names in sorted order.
    pub fn names(&self) -> Vec<&str> {
        self.factories.keys().map(String::as_str).collect()
    }

    /// Build the classifier registered under `name`.
    pub fn classifier(&self, name: &str) -> Result<Arc<dyn Classifier>, DetectorError> {
        self.factories
            .get(name)
            .map(|factory| factory())
            .ok_or_else(|| DetectorError::UnsupportedDriver(name.to_string()))
    }

    /// Start a detector using the driver registered under `name`.
    pub fn open(&self, name: &str, config: DetectorConfig) -> Result<Detector, DetectorError> {
        let classifier = self.classifier(name)?;
        Detector::start(config, classifier)
    }
}

impl fmt::Debug for DriverRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DriverRegistry")
            .field("drivers", &self.names())
            .finish()
    }
}
