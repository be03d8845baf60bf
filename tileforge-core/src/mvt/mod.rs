//! Minimal MVT v2 writer: per-layer feature accumulation with deduplicated
//! tag tables, serialized through the prost types re-exported by `geozero`.

mod geometry_encoding;
mod mvt_commands;
mod tag_builder;
mod tile_value;

use geozero::mvt::tile;
use geozero::mvt::{Message as _, Tile};

pub use crate::mvt::geometry_encoding::GeomEncoder;
pub use crate::mvt::tag_builder::TagsBuilder;
pub use crate::mvt::tile_value::TileValue;

/// Tile extent used for all emitted layers.
pub const EXTENT: u32 = 4096;

/// Collects the features of one named layer.
#[derive(Debug)]
pub struct LayerBuilder {
    name: String,
    tags: TagsBuilder,
    features: Vec<tile::Feature>,
    extent: u32,
}

impl LayerBuilder {
    #[must_use]
    pub fn new(name: impl Into<String>, extent: u32) -> Self {
        Self {
            name: name.into(),
            tags: TagsBuilder::new(),
            features: Vec::new(),
            extent,
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    /// Adds a committed feature. The encoder must hold at least one geometry.
    pub fn add_feature(
        &mut self,
        geom: GeomEncoder,
        props: impl IntoIterator<Item = (String, TileValue)>,
    ) {
        debug_assert!(!geom.is_empty());
        let mut tags = Vec::new();
        for (key, value) in props {
            let (key_idx, val_idx) = self.tags.insert(key, value);
            tags.push(key_idx);
            tags.push(val_idx);
        }
        self.features.push(tile::Feature {
            id: None,
            tags,
            r#type: Some(geom.geom_type() as i32),
            geometry: geom.into_data(),
        });
    }

    #[must_use]
    pub fn build(self) -> tile::Layer {
        let (keys, values) = self.tags.into_tags();
        tile::Layer {
            version: 2,
            name: self.name,
            features: self.features,
            keys,
            values: values.into_iter().map(Into::into).collect(),
            extent: Some(self.extent),
        }
    }
}

/// Serializes the non-empty layers; a tile with no features encodes to an
/// empty byte vector.
#[must_use]
pub fn encode_tile(layers: Vec<LayerBuilder>) -> Vec<u8> {
    let layers: Vec<tile::Layer> = layers
        .into_iter()
        .filter(|l| !l.is_empty())
        .map(LayerBuilder::build)
        .collect();
    if layers.is_empty() {
        return Vec::new();
    }
    Tile { layers }.encode_to_vec()
}

#[cfg(test)]
mod tests {
    use geozero::mvt::tile::GeomType;
    use geozero::mvt::{Message as _, Tile};

    use super::*;

    #[test]
    fn test_empty_tile_encodes_empty() {
        let layers = vec![LayerBuilder::new("water", EXTENT)];
        assert!(encode_tile(layers).is_empty());
    }

    #[test]
    fn test_layer_roundtrip() {
        let mut layer = LayerBuilder::new("poi", EXTENT);
        let mut geom = GeomEncoder::new(GeomType::Point);
        geom.add_point(100, 200);
        layer.add_feature(
            geom,
            vec![
                ("name".to_string(), TileValue::Str("A".to_string())),
                ("ele".to_string(), TileValue::Float(120.5)),
            ],
        );
        let data = encode_tile(vec![layer]);
        let tile = Tile::decode(&data[..]).unwrap();
        assert_eq!(tile.layers.len(), 1);
        let layer = &tile.layers[0];
        assert_eq!(layer.name, "poi");
        assert_eq!(layer.version, 2);
        assert_eq!(layer.extent, Some(EXTENT));
        assert_eq!(layer.keys, vec!["name", "ele"]);
        assert_eq!(layer.features.len(), 1);
        assert_eq!(layer.features[0].r#type, Some(GeomType::Point as i32));
        assert_eq!(layer.features[0].tags, vec![0, 0, 1, 1]);
    }

    #[test]
    fn test_tags_dedup_across_features() {
        let mut layer = LayerBuilder::new("building", EXTENT);
        for i in 0..3 {
            let mut geom = GeomEncoder::new(GeomType::Point);
            geom.add_point(i, i);
            layer.add_feature(
                geom,
                vec![("building".to_string(), TileValue::Str("yes".to_string()))],
            );
        }
        let built = layer.build();
        assert_eq!(built.keys.len(), 1);
        assert_eq!(built.values.len(), 1);
    }
}
