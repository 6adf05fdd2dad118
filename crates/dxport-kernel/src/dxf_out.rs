//! DXF output for the in-memory session
//!
//! Turns the committed selection into a DXF drawing: body edges and sketch
//! segments become LINE entities, notes become MTEXT.

use std::path::Path;

use glam::DVec3;

use crate::session::{CadError, CadResult};

/// Layer for exported body edges
pub const BODY_LAYER: &str = "BODY";
/// Layer for exported sketch geometry
pub const SKETCH_LAYER: &str = "SKETCH";
/// Layer for exported notes
pub const NOTE_LAYER: &str = "NOTE";

/// One item of a drawing about to be written
#[derive(Debug, Clone, PartialEq)]
pub enum DrawingItem {
    Line {
        start: DVec3,
        end: DVec3,
        layer: &'static str,
    },
    Note {
        origin: DVec3,
        lines: Vec<String>,
        height: f64,
    },
}

fn to_dxf_point(p: DVec3) -> dxf::Point {
    dxf::Point::new(p.x, p.y, p.z)
}

/// Convert a drawing item to a DXF entity
fn convert_item(item: &DrawingItem) -> dxf::entities::Entity {
    match item {
        DrawingItem::Line { start, end, layer } => {
            let line = dxf::entities::Line::new(to_dxf_point(*start), to_dxf_point(*end));
            let mut entity = dxf::entities::Entity::new(dxf::entities::EntityType::Line(line));
            entity.common.layer = layer.to_string();
            entity
        }
        DrawingItem::Note {
            origin,
            lines,
            height,
        } => {
            let mut mtext = dxf::entities::MText::default();
            mtext.insertion_point = to_dxf_point(*origin);
            mtext.initial_text_height = *height;
            mtext.attachment_point = dxf::enums::AttachmentPoint::TopLeft;
            // MTEXT paragraph break
            mtext.text = lines.join("\\P");
            let mut entity = dxf::entities::Entity::new(dxf::entities::EntityType::MText(mtext));
            entity.common.layer = NOTE_LAYER.to_string();
            entity
        }
    }
}

/// Write the items to a new DXF file at `path`
pub fn write_drawing(path: &Path, items: &[DrawingItem]) -> CadResult<()> {
    let mut drawing = dxf::Drawing::new();
    // MTEXT needs R13 or later
    drawing.header.version = dxf::enums::AcadVersion::R2000;

    for layer_name in [BODY_LAYER, SKETCH_LAYER, NOTE_LAYER] {
        let mut layer = dxf::tables::Layer::default();
        layer.name = layer_name.to_string();
        drawing.add_layer(layer);
    }

    for item in items {
        drawing.add_entity(convert_item(item));
    }

    drawing
        .save_file(path)
        .map_err(|e| CadError::Commit(e.to_string()))?;

    tracing::debug!("Wrote {} entities to {}", items.len(), path.display());

    Ok(())
}
