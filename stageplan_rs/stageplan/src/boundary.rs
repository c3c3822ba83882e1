//! Boundary edits. A single reducer applies one edit to the current boundary
//! list; sorting is left to the caller so a moved boundary may cross its
//! neighbours until the next save.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::round_to;

/// Fraction of the remaining distance at which `Add` places a new boundary.
pub const ADD_FRACTION: f64 = 0.9;

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BoundaryEdit {
    /// Replace the boundary at `index` with `distance_km`.
    Move { index: usize, distance_km: f64 },
    /// Append a boundary between the greatest boundary and the track end.
    Add,
    /// Drop the greatest boundary.
    Remove,
}

pub fn apply_edit(boundaries: &[f64], edit: BoundaryEdit, total_km: f64) -> Vec<f64> {
    apply_edit_with(boundaries, edit, total_km, ADD_FRACTION)
}

pub fn apply_edit_with(
    boundaries: &[f64],
    edit: BoundaryEdit,
    total_km: f64,
    add_fraction: f64,
) -> Vec<f64> {
    let mut out = boundaries.to_vec();
    match edit {
        BoundaryEdit::Move { index, distance_km } => {
            if !distance_km.is_finite() {
                debug!("Ignoring move of boundary {} to {}", index, distance_km);
            } else if let Some(slot) = out.get_mut(index) {
                *slot = round_to(distance_km, 2);
            } else {
                debug!(
                    "Ignoring move of boundary {}: only {} boundaries",
                    index,
                    boundaries.len()
                );
            }
        }
        BoundaryEdit::Add => {
            let last = greatest(&out).map(|(_, v)| v).unwrap_or(0.0);
            let candidate = round_to(last + (total_km - last) * add_fraction, 2);
            if candidate < total_km {
                out.push(candidate);
            } else {
                debug!(
                    "Not adding boundary at {} km: track ends at {} km",
                    candidate, total_km
                );
            }
        }
        BoundaryEdit::Remove => {
            if let Some((idx, _)) = greatest(&out) {
                out.remove(idx);
            }
        }
    }
    out
}

/// Boundaries sorted ascending, as used for rendering and persistence.
pub fn sorted_boundaries(boundaries: &[f64]) -> Vec<f64> {
    let mut sorted = boundaries.to_vec();
    sorted.sort_by(f64::total_cmp);
    sorted
}

fn greatest(boundaries: &[f64]) -> Option<(usize, f64)> {
    boundaries
        .iter()
        .copied()
        .enumerate()
        .max_by(|a, b| a.1.total_cmp(&b.1))
}
