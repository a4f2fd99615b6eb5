use nalgebra::Vector3;

/// Per-node anchor springs pulling nodes toward fixed points.
#[derive(Debug, Clone, PartialEq)]
pub struct Anchors {
    pub points: Vec<Vector3<f64>>,
    pub stiffness: Vec<f64>,
}

impl Anchors {
    fn new(count: usize) -> Self {
        Self {
            points: vec![Vector3::zeros(); count],
            stiffness: vec![0.0; count],
        }
    }

    #[inline]
    fn pull(&self, node: usize, position: &Vector3<f64>) -> Vector3<f64> {
        (self.points[node] - position) * self.stiffness[node]
    }
}

/// Forces acting on nodes that do not come from links.
///
/// The variant is fixed by which contributions have been switched on, so the per-node sum
/// is a plain match instead of a chain of optional checks.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum NodeLoading {
    #[default]
    None,
    External(Vec<Vector3<f64>>),
    Anchored(Anchors),
    ExternalAndAnchored(Vec<Vector3<f64>>, Anchors),
}

impl NodeLoading {
    /// Additional force on `node` at `position`.
    #[inline]
    pub fn contribution(&self, node: usize, position: &Vector3<f64>) -> Vector3<f64> {
        match self {
            Self::None => Vector3::zeros(),
            Self::External(forces) => forces[node],
            Self::Anchored(anchors) => anchors.pull(node, position),
            Self::ExternalAndAnchored(forces, anchors) => {
                forces[node] + anchors.pull(node, position)
            }
        }
    }

    pub fn has_external_forces(&self) -> bool {
        matches!(self, Self::External(_) | Self::ExternalAndAnchored(..))
    }

    pub fn has_anchors(&self) -> bool {
        matches!(self, Self::Anchored(_) | Self::ExternalAndAnchored(..))
    }

    /// Sets the constant external force on `node`, switching external forces on if needed.
    pub(crate) fn set_external_force(&mut self, count: usize, node: usize, force: Vector3<f64>) {
        let (external, anchors) = std::mem::take(self).into_parts();
        let mut external = external.unwrap_or_else(|| vec![Vector3::zeros(); count]);
        external[node] = force;
        *self = Self::from_parts(Some(external), anchors);
    }

    /// Anchors `node` to `point`, switching anchors on if needed.
    pub(crate) fn set_anchor(
        &mut self,
        count: usize,
        node: usize,
        point: Vector3<f64>,
        stiffness: f64,
    ) {
        let (external, anchors) = std::mem::take(self).into_parts();
        let mut anchors = anchors.unwrap_or_else(|| Anchors::new(count));
        anchors.points[node] = point;
        anchors.stiffness[node] = stiffness;
        *self = Self::from_parts(external, Some(anchors));
    }

    fn into_parts(self) -> (Option<Vec<Vector3<f64>>>, Option<Anchors>) {
        match self {
            Self::None => (None, None),
            Self::External(forces) => (Some(forces), None),
            Self::Anchored(anchors) => (None, Some(anchors)),
            Self::ExternalAndAnchored(forces, anchors) => (Some(forces), Some(anchors)),
        }
    }

    fn from_parts(external: Option<Vec<Vector3<f64>>>, anchors: Option<Anchors>) -> Self {
        match (external, anchors) {
            (None, None) => Self::None,
            (Some(forces), None) => Self::External(forces),
            (None, Some(anchors)) => Self::Anchored(anchors),
            (Some(forces), Some(anchors)) => Self::ExternalAndAnchored(forces, anchors),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_loading_contributes_nothing() {
        let loading = NodeLoading::None;
        assert_eq!(
            loading.contribution(0, &Vector3::new(1.0, 2.0, 3.0)),
            Vector3::zeros()
        );
    }

    #[test]
    fn enabling_external_forces_keeps_existing_anchors() {
        let mut loading = NodeLoading::None;
        loading.set_anchor(2, 1, Vector3::new(1.0, 0.0, 0.0), 2.0);
        loading.set_external_force(2, 1, Vector3::new(0.0, 0.5, 0.0));

        assert!(loading.has_anchors());
        assert!(loading.has_external_forces());
        let f = loading.contribution(1, &Vector3::zeros());
        assert_eq!(f, Vector3::new(2.0, 0.5, 0.0));
    }

    #[test]
    fn enabling_anchors_keeps_existing_external_forces() {
        let mut loading = NodeLoading::None;
        loading.set_external_force(3, 0, Vector3::new(1.0, 0.0, 0.0));
        loading.set_external_force(3, 2, Vector3::new(0.0, 0.0, -1.0));
        loading.set_anchor(3, 2, Vector3::new(0.0, 0.0, 1.0), 1.0);

        assert!(matches!(loading, NodeLoading::ExternalAndAnchored(..)));
        assert_eq!(loading.contribution(0, &Vector3::zeros()), Vector3::new(1.0, 0.0, 0.0));
        assert_eq!(loading.contribution(2, &Vector3::zeros()), Vector3::zeros());
    }

    #[test]
    fn anchor_pulls_toward_its_point() {
        let mut loading = NodeLoading::None;
        loading.set_anchor(1, 0, Vector3::zeros(), 3.0);
        let f = loading.contribution(0, &Vector3::new(0.0, 0.0, 2.0));
        assert_eq!(f, Vector3::new(0.0, 0.0, -6.0));
    }
}
