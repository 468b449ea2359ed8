//! Node definition catalog: a read-only registry of known node types,
//! populated at startup either programmatically or from a directory of YAML
//! definitions. Fuzzy search stays an editor concern; `filtered_by` here is
//! the plain substring/category filter the engine needs to serve it.

use super::definition::NodeDefinition;
use bevy_ecs::prelude::Resource;
use std::collections::HashMap;

#[derive(Resource, Default, Clone)]
pub struct NodeCatalog {
    definitions: HashMap<String, NodeDefinition>,
}

impl NodeCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, def: NodeDefinition) {
        self.definitions.insert(def.node_type.clone(), def);
    }

    pub fn get(&self, node_type: &str) -> Option<&NodeDefinition> {
        self.definitions.get(node_type)
    }

    pub fn all(&self) -> impl Iterator<Item = &NodeDefinition> {
        self.definitions.values()
    }

    pub fn by_category(&self) -> HashMap<String, Vec<&NodeDefinition>> {
        let mut out: HashMap<String, Vec<&NodeDefinition>> = HashMap::new();
        for def in self.definitions.values() {
            out.entry(def.category.clone()).or_default().push(def);
        }
        out
    }

    pub fn filtered_by<'a>(
        &'a self,
        query: Option<&'a str>,
        category: Option<&'a str>,
    ) -> impl Iterator<Item = &'a NodeDefinition> {
        self.definitions.values().filter(move |def| {
            let matches_category = category.is_none_or(|c| def.category == c);
            let matches_query = query.is_none_or(|q| {
                let q = q.to_ascii_lowercase();
                def.name.to_ascii_lowercase().contains(&q)
                    || def.node_type.to_ascii_lowercase().contains(&q)
            });
            matches_category && matches_query
        })
    }

    /// Recursively loads `.yaml`/`.yml` node definitions from a directory.
    pub fn load_from_dir(&mut self, path: &std::path::Path) -> anyhow::Result<()> {
        if !path.is_dir() {
            return Ok(());
        }
        for entry in std::fs::read_dir(path)? {
            let entry = entry?;
            let path = entry.path();
            if path.is_dir() {
                self.load_from_dir(&path)?;
            } else if path
                .extension()
                .is_some_and(|ext| ext == "yaml" || ext == "yml")
            {
                let content = std::fs::read_to_string(&path)?;
                match serde_yaml::from_str::<NodeDefinition>(&content) {
                    Ok(def) => {
                        tracing::info!(node_type = %def.node_type, path = ?path, "loaded node definition");
                        self.register(def);
                    }
                    Err(e) => {
                        tracing::warn!(path = ?path, error = %e, "failed to parse node definition");
                    }
                }
            }
        }
        Ok(())
    }

    pub fn clear(&mut self) {
        self.definitions.clear();
    }

    /// JSON Schema for `NodeDefinition`, for hosts that validate
    /// editor-authored YAML/JSON definitions before calling `register`.
    pub fn definition_schema() -> schemars::schema::RootSchema {
        schemars::schema_for!(NodeDefinition)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nodes::definition::PortSchema;

    fn def(node_type: &str, category: &str) -> NodeDefinition {
        NodeDefinition {
            node_type: node_type.into(),
            name: node_type.into(),
            category: category.into(),
            icon: None,
            description: None,
            ports: PortSchema::default(),
            controls: vec![],
            platforms: vec![],
            connection: None,
        }
    }

    #[test]
    fn register_and_get() {
        let mut cat = NodeCatalog::new();
        cat.register(def("lfo", "input"));
        assert!(cat.get("lfo").is_some());
        assert!(cat.get("missing").is_none());
    }

    #[test]
    fn by_category_groups() {
        let mut cat = NodeCatalog::new();
        cat.register(def("lfo", "input"));
        cat.register(def("slider", "input"));
        cat.register(def("add", "math"));
        let groups = cat.by_category();
        assert_eq!(groups.get("input").unwrap().len(), 2);
        assert_eq!(groups.get("math").unwrap().len(), 1);
    }

    #[test]
    fn filtered_by_query_and_category() {
        let mut cat = NodeCatalog::new();
        cat.register(def("lfo", "input"));
        cat.register(def("add", "math"));
        let results: Vec<_> = cat.filtered_by(Some("lf"), None).collect();
        assert_eq!(results.len(), 1);
        let results: Vec<_> = cat.filtered_by(None, Some("math")).collect();
        assert_eq!(results.len(), 1);
    }

    #[test]
    fn definition_schema_describes_node_type_field() {
        let schema = NodeCatalog::definition_schema();
        let json = serde_json::to_value(&schema).unwrap();
        assert!(json["properties"]["node_type"].is_object());
    }
}
