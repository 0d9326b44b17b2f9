use std::{collections::BTreeMap, sync::LazyLock};

use super::{AugmentorConfig, ExperimentConfig};
use crate::{ProofreaderError, Result};

static CONFIGS: LazyLock<ConfigRegistry> = LazyLock::new(register_configs);

/// A read-only set of experiments indexed by name.
#[derive(Debug, Default)]
pub struct ConfigRegistry {
    configs: BTreeMap<String, ExperimentConfig>,
}

impl ConfigRegistry {
    /// Adds a configuration.
    ///
    /// # Returns
    /// An `InvalidConfig` error if a configuration with the same name is already registered.
    pub fn register(&mut self, config: ExperimentConfig) -> Result<()> {
        if self.configs.contains_key(&config.name) {
            return Err(ProofreaderError::InvalidConfig(format!(
                "duplicate config name {}",
                config.name
            )));
        }

        self.configs.insert(config.name.clone(), config);
        Ok(())
    }

    /// Looks up a configuration by its exact name.
    pub fn get(&self, name: &str) -> Result<&ExperimentConfig> {
        self.configs
            .get(name)
            .ok_or_else(|| ProofreaderError::ConfigNotFound(name.to_string()))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.configs.keys().map(String::as_str)
    }
}

fn builtin_configs() -> Vec<ExperimentConfig> {
    let default = ExperimentConfig::new("default");

    let all_augmentations = AugmentorConfig {
        shuffle: true,
        center: true,
        rotate: true,
        scale: true,
        jitter: true,
        ..AugmentorConfig::default()
    };

    let mut curvenet = ExperimentConfig::new("curvenet");
    curvenet.model.model = "curvenet".to_string();
    curvenet.model.loss = "ce".to_string();
    curvenet.augmentor = all_augmentations.clone();

    let mut augmented = ExperimentConfig::new("augmented");
    augmented.augmentor = all_augmentations;

    let mut slice = ExperimentConfig::new("slice");
    slice.dataset.dataset = "slice".to_string();

    vec![default, curvenet, augmented, slice]
}

/// Builds the registry of every experiment this crate ships with.
///
/// # Panics
/// If two of the built-in experiments share a name.
pub fn register_configs() -> ConfigRegistry {
    let mut registry = ConfigRegistry::default();

    for config in builtin_configs() {
        if let Err(e) = registry.register(config) {
            panic!("{e}");
        }
    }

    registry
}

/// Returns the registered experiment called `name`.
///
/// # Returns
/// The experiment or `ConfigNotFound` if there's no experiment with that exact name.
pub fn get_config(name: &str) -> Result<&'static ExperimentConfig> {
    CONFIGS.get(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_is_exact() {
        assert_eq!(get_config("default").unwrap().name, "default");
        assert!(matches!(
            get_config("Default"),
            Err(ProofreaderError::ConfigNotFound(name)) if name == "Default"
        ));
    }

    #[test]
    fn duplicates_are_rejected() {
        let mut registry = ConfigRegistry::default();
        registry.register(ExperimentConfig::new("a")).unwrap();
        assert!(matches!(
            registry.register(ExperimentConfig::new("a")),
            Err(ProofreaderError::InvalidConfig(_))
        ));
    }

    #[test]
    fn builtins_are_registered() {
        let names: Vec<_> = register_configs().names().map(str::to_string).collect();
        assert_eq!(names, ["augmented", "curvenet", "default", "slice"]);
        assert_eq!(get_config("curvenet").unwrap().model.loss, "ce");
        assert!(get_config("augmented").unwrap().augmentor.rotate);
    }
}
