//! Sharing visualizations as text.
//!
//! A single view is exported as its JSON compressed with lz-string into
//! base64, the format the web dashboard shares views in. A bulk export is a
//! TSV with one `title<TAB>encoded` line per visualization; importing accepts
//! either form, and also plain base64 of the JSON written by older builds.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;

use logdash_shared::Guid;

use crate::error::{ClientError, Result};
use crate::snapshot::section_exists;
use crate::state::AppState;
use crate::visualization::{Visualizations, VizState};

pub fn export_view(viz: &VizState) -> Result<String> {
    let json = serde_json::to_string(viz)?;
    Ok(lz_str::compress_to_base64(json.as_str()))
}

/// One `title\tencoded` line per visualization, in display order.
pub fn bulk_export(vizs: &Visualizations) -> Result<String> {
    let lines = vizs
        .iter()
        .map(|viz| {
            let title = viz.title().replace(['\t', '\n'], " ");
            export_view(viz).map(|encoded| format!("{title}\t{encoded}"))
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(lines.join("\n"))
}

/// Decode one exported view. A leading `title\t` column is ignored.
pub fn decode_view(text: &str) -> Result<VizState> {
    let encoded = text.trim();
    let encoded = encoded
        .rsplit_once('\t')
        .map_or(encoded, |(_, encoded)| encoded.trim());

    let compressed: Option<VizState> = lz_str::decompress_from_base64(encoded)
        .and_then(|wide| String::from_utf16(&wide).ok())
        .and_then(|json| serde_json::from_str(&json).ok());
    if let Some(viz) = compressed {
        return Ok(viz);
    }

    // plain base64, as exported before views were compressed
    let bytes = STANDARD
        .decode(encoded)
        .map_err(|e| ClientError::Import(format!("invalid encoding: {e}")))?;
    serde_json::from_slice(&bytes).map_err(|e| ClientError::Import(format!("invalid view: {e}")))
}

/// Decode every non-empty line of a bulk export.
pub fn decode_bulk(text: &str) -> Result<Vec<VizState>> {
    text.lines()
        .filter(|line| !line.trim().is_empty())
        .map(decode_view)
        .collect()
}

/// Put an imported view into the state, replacing a visualization with the
/// same guid. A section reference that does not exist here is dropped.
pub fn import_into(state: &mut AppState, mut viz: VizState) -> Guid {
    if !section_exists(&state.sections, viz.section) {
        viz.section = None;
    }
    let guid = viz.guid;
    state.visualizations.upsert(viz);
    guid
}
