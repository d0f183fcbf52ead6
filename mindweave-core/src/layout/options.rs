//! Layout algorithm options per diagram style, keyed by ELK option names.

use std::collections::BTreeMap;

use crate::config::{Direction, LayoutSection};
use crate::types::DiagramStyle;

pub const ALGORITHM: &str = "elk.algorithm";
pub const DIRECTION: &str = "elk.direction";
pub const NODE_SPACING: &str = "elk.spacing.nodeNode";
pub const LAYER_SPACING: &str = "elk.layered.spacing.nodeNodeBetweenLayers";
pub const NODE_PLACEMENT: &str = "elk.layered.nodePlacement.strategy";
pub const CROSSING_MINIMIZATION: &str = "elk.layered.crossingMinimization.strategy";
pub const BOX_PACKING: &str = "elk.box.packingMode";
pub const ASPECT_RATIO: &str = "elk.aspectRatio";

/// String-keyed engine configuration.
pub type LayoutOptions = BTreeMap<String, String>;

/// Algorithm options for a diagram style.
///
/// - mindmap: layered, configured direction, simple placement, layer sweep
/// - timeline: layered, always left to right, linear segments
/// - quadrant: box packing, one row of boxes at a time, square aspect
pub fn algorithm_options(style: DiagramStyle, section: &LayoutSection) -> LayoutOptions {
    let mut options = LayoutOptions::new();
    options.insert(NODE_SPACING.into(), section.node_spacing.to_string());
    options.insert(LAYER_SPACING.into(), section.layer_spacing.to_string());

    match style {
        DiagramStyle::Mindmap => {
            options.insert(ALGORITHM.into(), "layered".into());
            options.insert(DIRECTION.into(), section.direction.as_str().into());
            options.insert(NODE_PLACEMENT.into(), "SIMPLE".into());
            options.insert(CROSSING_MINIMIZATION.into(), "LAYER_SWEEP".into());
        }
        DiagramStyle::Timeline => {
            options.insert(ALGORITHM.into(), "layered".into());
            options.insert(DIRECTION.into(), Direction::Right.as_str().into());
            options.insert(NODE_PLACEMENT.into(), "LINEAR_SEGMENTS".into());
        }
        DiagramStyle::Quadrant => {
            options.insert(ALGORITHM.into(), "box".into());
            options.insert(BOX_PACKING.into(), "BOX_PER_ROW".into());
            options.insert(ASPECT_RATIO.into(), "1.0".into());
        }
    }
    options
}

#[cfg(test)]
mod tests {
    use super::*;

    fn render(options: &LayoutOptions) -> String {
        options
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect::<Vec<_>>()
            .join("\n")
    }

    #[test]
    fn mindmap_options() {
        let options = algorithm_options(DiagramStyle::Mindmap, &LayoutSection::default());
        insta::assert_snapshot!(render(&options), @r"
        elk.algorithm=layered
        elk.direction=DOWN
        elk.layered.crossingMinimization.strategy=LAYER_SWEEP
        elk.layered.nodePlacement.strategy=SIMPLE
        elk.layered.spacing.nodeNodeBetweenLayers=100
        elk.spacing.nodeNode=80
        ");
    }

    #[test]
    fn timeline_options_ignore_configured_direction() {
        let section = LayoutSection {
            direction: Direction::Up,
            ..LayoutSection::default()
        };
        let options = algorithm_options(DiagramStyle::Timeline, &section);
        insta::assert_snapshot!(render(&options), @r"
        elk.algorithm=layered
        elk.direction=RIGHT
        elk.layered.nodePlacement.strategy=LINEAR_SEGMENTS
        elk.layered.spacing.nodeNodeBetweenLayers=100
        elk.spacing.nodeNode=80
        ");
    }

    #[test]
    fn quadrant_options() {
        let options = algorithm_options(DiagramStyle::Quadrant, &LayoutSection::default());
        assert_eq!(options[ALGORITHM], "box");
        assert_eq!(options[BOX_PACKING], "BOX_PER_ROW");
        assert_eq!(options[ASPECT_RATIO], "1.0");
        assert!(!options.contains_key(DIRECTION));
    }
}
