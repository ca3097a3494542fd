//! Blast radius confirmation gate

/// Advisory guard over the computed blast radius
///
/// Returns true when the caller must obtain explicit operator confirmation
/// before dispatching. A preview count equal to the threshold does not block.
/// Client-side only: bypassing preview also bypasses the gate.
pub fn should_block(preview_count: usize, threshold: usize, require_confirmation: bool) -> bool {
    require_confirmation && preview_count > threshold
}
