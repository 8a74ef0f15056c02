use super::{FieldDescriptor, SchemaFile, TypeSchema, ValueType};
use crate::errors::{AppResult, SchemaError};
use crate::record::RecordType;
use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::Path;
use std::sync::OnceLock;
use tracing::debug;

struct TypeEntry {
    schema: TypeSchema,
    resolved: OnceLock<Vec<FieldDescriptor>>,
    root: OnceLock<String>,
    contains_encrypted: OnceLock<bool>,
}

impl TypeEntry {
    fn new(schema: TypeSchema) -> Self {
        Self {
            schema,
            resolved: OnceLock::new(),
            root: OnceLock::new(),
            contains_encrypted: OnceLock::new(),
        }
    }
}

/// Registered record types and their resolved field metadata.
///
/// The set of types is fixed once built. Per-type answers are computed on
/// first use and kept for the lifetime of the registry, so a registry is
/// usually built once at startup and shared behind an `Arc`.
pub struct SchemaRegistry {
    types: HashMap<String, TypeEntry>,
}

impl SchemaRegistry {
    /// Starts an empty builder.
    pub fn builder() -> SchemaRegistryBuilder {
        SchemaRegistryBuilder::default()
    }

    /// Builds a registry from the JSON layout described by [`SchemaFile`].
    pub fn from_json(json: &str) -> Result<Self, SchemaError> {
        let file: SchemaFile = serde_json::from_str(json).map_err(SchemaError::Parse)?;
        file.types
            .into_iter()
            .fold(Self::builder(), SchemaRegistryBuilder::schema)
            .build()
    }

    /// Reads and builds a registry from a JSON schema file.
    pub fn from_json_file(path: &Path) -> AppResult<Self> {
        debug!("Loading schema file {}", path.display());
        let contents = fs::read_to_string(path)?;
        Ok(Self::from_json(&contents)?)
    }

    /// True if `name` is a registered type.
    pub fn contains(&self, name: &str) -> bool {
        self.types.contains_key(name)
    }

    /// The declaration registered under `name`.
    pub fn get(&self, name: &str) -> Option<&TypeSchema> {
        self.types.get(name).map(|entry| &entry.schema)
    }

    /// Registered type names, sorted.
    pub fn type_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.types.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// All fields of `name`, inherited ones first.
    ///
    /// A field redeclared by a subtype replaces the inherited descriptor in
    /// place, keeping the parent's position. Unregistered types have no fields.
    pub fn resolve(&self, name: &str) -> &[FieldDescriptor] {
        match self.types.get(name) {
            Some(entry) => entry.resolved.get_or_init(|| self.merge(entry)),
            None => &[],
        }
    }

    /// The resolved descriptor of one field.
    pub fn field(&self, record_type: &str, field: &str) -> Option<&FieldDescriptor> {
        self.resolve(record_type).iter().find(|f| f.name == field)
    }

    /// Encrypted (non-embedded) fields of `name` with their value-types.
    pub fn encrypted_fields<'a>(
        &'a self,
        name: &str,
    ) -> impl Iterator<Item = (&'a str, ValueType)> + 'a {
        self.resolve(name).iter().filter_map(|field| match (&field.embedded, field.encrypted) {
            (None, Some(value_type)) => Some((field.name.as_str(), value_type)),
            _ => None,
        })
    }

    /// Topmost ancestor of `name`; the type itself when it extends nothing.
    ///
    /// Records of a whole hierarchy share one decryption cache bucket keyed by
    /// this name.
    pub fn root_type<'a>(&'a self, name: &'a str) -> &'a str {
        match self.types.get(name) {
            Some(entry) => entry.root.get_or_init(|| match &entry.schema.extends {
                Some(parent) => self.root_type(parent).to_string(),
                None => name.to_string(),
            }),
            None => name,
        }
    }

    /// True if `name` or any record type it embeds, at any depth, declares an
    /// encrypted field.
    pub fn contains_encrypted(&self, name: &str) -> bool {
        match self.types.get(name) {
            Some(entry) => *entry
                .contains_encrypted
                .get_or_init(|| self.scan(name, &mut HashSet::new())),
            None => false,
        }
    }

    fn merge(&self, entry: &TypeEntry) -> Vec<FieldDescriptor> {
        let mut fields = match &entry.schema.extends {
            Some(parent) => self.resolve(parent).to_vec(),
            None => Vec::new(),
        };

        for field in &entry.schema.fields {
            match fields.iter_mut().find(|f| f.name == field.name) {
                Some(existing) => *existing = field.clone(),
                None => fields.push(field.clone()),
            }
        }

        debug!(
            "Resolved {} fields for record type '{}'",
            fields.len(),
            entry.schema.name
        );
        fields
    }

    fn scan(&self, name: &str, visiting: &mut HashSet<String>) -> bool {
        if !visiting.insert(name.to_string()) {
            return false;
        }
        self.resolve(name).iter().any(|field| match &field.embedded {
            Some(target) => self.scan(target, visiting),
            None => field.encrypted.is_some(),
        })
    }
}

impl std::fmt::Debug for SchemaRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SchemaRegistry")
            .field("types", &self.type_names())
            .finish()
    }
}

/// Collects type declarations and validates them into a [`SchemaRegistry`].
#[derive(Debug, Default)]
pub struct SchemaRegistryBuilder {
    schemas: Vec<TypeSchema>,
}

impl SchemaRegistryBuilder {
    /// Adds the declaration of a statically known record type.
    pub fn register<T: RecordType>(self) -> Self {
        self.schema(T::schema())
    }

    /// Adds a declaration.
    pub fn schema(mut self, mut schema: TypeSchema) -> Self {
        let name = schema.name.clone();
        for field in schema.fields.iter_mut() {
            field.declaring_type = name.clone();
        }
        self.schemas.push(schema);
        self
    }

    /// Validates the declarations and builds the registry.
    ///
    /// # Errors
    ///
    /// Fails on a duplicate type name, a parent or embedded target that was not
    /// declared, or an inheritance chain that loops.
    pub fn build(self) -> Result<SchemaRegistry, SchemaError> {
        let mut types = HashMap::with_capacity(self.schemas.len());
        for schema in self.schemas {
            if types.contains_key(&schema.name) {
                return Err(SchemaError::DuplicateType(schema.name));
            }
            types.insert(schema.name.clone(), TypeEntry::new(schema));
        }

        for entry in types.values() {
            let schema = &entry.schema;
            if let Some(parent) = &schema.extends {
                if !types.contains_key(parent) {
                    return Err(SchemaError::UnknownParent {
                        child: schema.name.clone(),
                        parent: parent.clone(),
                    });
                }
            }

            for field in &schema.fields {
                if let Some(target) = &field.embedded {
                    if !types.contains_key(target) {
                        return Err(SchemaError::UnknownEmbedded {
                            record_type: schema.name.clone(),
                            field: field.name.clone(),
                            target: target.clone(),
                        });
                    }
                }
            }

            let mut seen = HashSet::new();
            let mut current = Some(schema.name.as_str());
            while let Some(name) = current {
                if !seen.insert(name) {
                    return Err(SchemaError::InheritanceCycle(schema.name.clone()));
                }
                current = types
                    .get(name)
                    .and_then(|e: &TypeEntry| e.schema.extends.as_deref());
            }
        }

        debug!("Built schema registry with {} record types", types.len());
        Ok(SchemaRegistry { types })
    }
}
