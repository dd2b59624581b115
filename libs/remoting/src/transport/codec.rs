//! Content-type id -> codec registry
//!
//! Decoders look up the codec for an inbound body by the id in the message
//! header. The registry is built once and then only read, so lookups take
//! no locks.

use crate::config::RemotingConfig;
use crate::error::{RemotingError, Result};
use serialization::{is_generic_object_id, is_valid_content_type_id, ObjectInput, Serialization};
use std::collections::HashMap;
use std::io::Read;
use std::sync::Arc;
use tracing::{debug, error};

#[derive(Clone)]
struct Registered {
    name: String,
    serialization: Arc<dyn Serialization>,
}

/// Collects codecs in registration order
#[derive(Default)]
pub struct CodecRegistryBuilder {
    entries: Vec<(String, Arc<dyn Serialization>)>,
}

impl CodecRegistryBuilder {
    pub fn register(
        mut self,
        name: impl Into<String>,
        serialization: Arc<dyn Serialization>,
    ) -> Self {
        self.entries.push((name.into(), serialization));
        self
    }

    /// Register the codecs compiled into the serialization crate
    pub fn register_builtin(mut self) -> Self {
        for (name, serialization) in serialization::builtin() {
            self.entries.push((name.to_string(), serialization));
        }
        self
    }

    /// Resolve conflicts and freeze the table. Conflicts are logged, never fatal.
    pub fn build(self) -> CodecRegistry {
        let mut by_id: HashMap<u8, Registered> = HashMap::new();
        let mut by_name: HashMap<String, Arc<dyn Serialization>> = HashMap::new();

        for (name, serialization) in self.entries {
            let id = serialization.content_type_id();

            if !is_valid_content_type_id(id) {
                error!(
                    name = %name,
                    id,
                    "Serialization extension {} has an id outside the wire range, ignore this Serialization extension",
                    name
                );
                continue;
            }

            if by_name.contains_key(&name) {
                error!(name = %name, id, "Duplicate serialization name, keeping the first registration");
                continue;
            }
            by_name.insert(name.clone(), serialization.clone());

            if let Some(existing) = by_id.get(&id) {
                error!(
                    id,
                    "Serialization extension {} has duplicate id to Serialization extension {}, ignore this Serialization extension",
                    name,
                    existing.name
                );
                continue;
            }

            debug!(name = %name, id, content_type = serialization.content_type(), "Registered serialization");
            by_id.insert(id, Registered { name, serialization });
        }

        CodecRegistry { by_id, by_name }
    }
}

/// Immutable view of the registered codecs
pub struct CodecRegistry {
    by_id: HashMap<u8, Registered>,
    by_name: HashMap<String, Arc<dyn Serialization>>,
}

impl CodecRegistry {
    pub fn builder() -> CodecRegistryBuilder {
        CodecRegistryBuilder::default()
    }

    /// Registry holding bincode and json
    pub fn with_builtin() -> Self {
        Self::builder().register_builtin().build()
    }

    pub fn by_id(&self, id: u8) -> Option<Arc<dyn Serialization>> {
        self.by_id.get(&id).map(|r| r.serialization.clone())
    }

    /// Name of the codec that owns `id`
    pub fn name_of(&self, id: u8) -> Option<&str> {
        self.by_id.get(&id).map(|r| r.name.as_str())
    }

    pub fn by_name(&self, name: &str) -> Option<Arc<dyn Serialization>> {
        self.by_name.get(name).cloned()
    }

    /// Registered ids, ascending
    pub fn ids(&self) -> Vec<u8> {
        let mut ids: Vec<u8> = self.by_id.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }

    /// Codec named by the configuration
    pub fn for_config(&self, config: &RemotingConfig) -> Result<Arc<dyn Serialization>> {
        let name = config.serialization();
        self.by_name(name).ok_or_else(|| {
            RemotingError::configuration(
                format!("Unknown serialization {}", name),
                Some(crate::constants::SERIALIZATION_KEY),
            )
        })
    }

    /// Codec for an id received from the network.
    ///
    /// Generic-object ids are only accepted when they belong to the codec
    /// this side was configured with.
    pub fn validated(&self, config: &RemotingConfig, id: u8) -> Result<Arc<dyn Serialization>> {
        let Some(registered) = self.by_id.get(&id) else {
            return Err(RemotingError::serialization(id, "no codec registered for id"));
        };

        let configured = config.serialization();
        if is_generic_object_id(id) && registered.name != configured {
            return Err(RemotingError::serialization(
                id,
                format!(
                    "peer selected {} but this side is configured for {}",
                    registered.name, configured
                ),
            ));
        }

        Ok(registered.serialization.clone())
    }

    /// Validate `id` and open a reader over `input`
    pub fn deserialize(
        &self,
        config: &RemotingConfig,
        input: Box<dyn Read + Send>,
        id: u8,
    ) -> Result<Box<dyn ObjectInput>> {
        let serialization = self.validated(config, id)?;
        Ok(serialization.deserialize(input)?)
    }
}

impl std::fmt::Debug for CodecRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut entries: Vec<(u8, &str)> = self
            .by_id
            .iter()
            .map(|(id, r)| (*id, r.name.as_str()))
            .collect();
        entries.sort_unstable();
        f.debug_struct("CodecRegistry")
            .field("by_id", &entries)
            .finish()
    }
}
