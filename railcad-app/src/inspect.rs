use std::collections::BTreeMap;
use std::fmt::Write;

use railcad_core::document::{Document, Entity};

/// 生成 DXF 内容摘要：图层表、线型表与按图层统计的实体数量。
pub fn summarize(document: &Document) -> String {
    let mut out = String::new();
    let styles = document.styles();

    let _ = writeln!(out, "layers:");
    for layer in styles.layers() {
        let state = if layer.is_visible { "on" } else { "off" };
        let _ = writeln!(
            out,
            "  {:<12} color={:<3} linetype={} {state}",
            layer.name,
            layer.color,
            layer.linetype_name()
        );
    }

    let _ = writeln!(out, "linetypes:");
    for linetype in styles.linetypes() {
        let _ = writeln!(out, "  {:<12} {:?}", linetype.name, linetype.pattern);
    }

    let mut counts: BTreeMap<(&str, &str), usize> = BTreeMap::new();
    for (_, entity) in document.entities() {
        *counts.entry((entity.layer_name(), kind(entity))).or_default() += 1;
    }
    let _ = writeln!(out, "entities:");
    for ((layer, kind), count) in &counts {
        let _ = writeln!(out, "  {layer:<12} {kind:<10} {count}");
    }

    if let Some(bounds) = document.bounds() {
        let _ = writeln!(
            out,
            "extents: ({}, {}) - ({}, {})",
            bounds.min().x(),
            bounds.min().y(),
            bounds.max().x(),
            bounds.max().y()
        );
    }
    out
}

fn kind(entity: &Entity) -> &'static str {
    match entity {
        Entity::Polyline(_) => "polyline",
        Entity::Line(_) => "line",
        Entity::Text(_) => "text",
        Entity::Dimension(_) => "dimension",
    }
}
