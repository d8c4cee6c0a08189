//! Live toggle state supplied by the GUI collaborator.

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

/// Top-level tessellation selector (the technique combo box).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum TessellationTechnique {
    /// Non-tessellating pipeline; no variant is looked up.
    #[default]
    Disabled,
    /// PN-triangle displacement.
    PnTriangles,
    /// Phong displacement.
    Phong,
}

impl TessellationTechnique {
    #[inline]
    #[must_use]
    pub fn is_enabled(self) -> bool {
        self != Self::Disabled
    }
}

bitflags! {
    /// Tuning controls the GUI should leave enabled for the current toggles.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
    pub struct ControlAvailability: u8 {
        const EDGE_SIZE          = 1 << 0;
        const RANGE_SCALE        = 1 << 1;
        const RESOLUTION_SCALE   = 1 << 2;
        const SILHOUETTE_EPSILON = 1 << 3;
        const BACK_FACE_EPSILON  = 1 << 4;
        const FRUSTUM_EPSILON    = 1 << 5;
    }
}

/// Snapshot of every toggle that influences variant selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[allow(clippy::struct_excessive_bools)]
pub struct ToggleState {
    pub technique: TessellationTechnique,
    pub screen_space_adaptive: bool,
    pub distance_adaptive: bool,
    pub resolution_adaptive: bool,
    pub orientation_adaptive: bool,
    pub back_face_cull: bool,
    pub frustum_cull: bool,
}

impl ToggleState {
    /// Toggles with the given technique and everything else off.
    #[must_use]
    pub fn with_technique(technique: TessellationTechnique) -> Self {
        Self {
            technique,
            ..Default::default()
        }
    }

    /// Which tuning sliders apply to the current toggles.
    ///
    /// Each slider follows its checkbox. Everything is disabled when
    /// tessellation is off, and screen-space adaptivity disables the distance
    /// and resolution controls.
    #[must_use]
    pub fn controls(&self) -> ControlAvailability {
        if !self.technique.is_enabled() {
            return ControlAvailability::empty();
        }

        let mut controls = ControlAvailability::empty();
        controls.set(ControlAvailability::EDGE_SIZE, self.screen_space_adaptive);
        controls.set(
            ControlAvailability::RANGE_SCALE,
            self.distance_adaptive && !self.screen_space_adaptive,
        );
        controls.set(
            ControlAvailability::RESOLUTION_SCALE,
            self.resolution_adaptive && !self.screen_space_adaptive,
        );
        controls.set(
            ControlAvailability::SILHOUETTE_EPSILON,
            self.orientation_adaptive,
        );
        controls.set(ControlAvailability::BACK_FACE_EPSILON, self.back_face_cull);
        controls.set(ControlAvailability::FRUSTUM_EPSILON, self.frustum_cull);
        controls
    }
}
