use crate::base::{BcModel, EntityKind, ParallelType, ParamBc, ParamBcKind};
use crate::mesh::MeshQuery;
use crate::operators::BcData;
use crate::StrError;

/// Holds the flow boundary conditions assigned to the boundary faces
///
/// The conditions are converted into operator boundary data by [FlowBcs::compute]:
///
/// * `Pressure(p)` → Dirichlet `p`
/// * `StaticHead(h)` → Dirichlet `p_atm + ρg (h - z_f)`
/// * `MassFlux(q)` → Neumann `q |f|`
/// * `Seepage(q)` → Dirichlet `p_atm` if the face pressure is at or above `p_atm`,
///   otherwise Neumann `q |f|`
pub struct FlowBcs {
    /// Condition of each (used) face
    conditions: Vec<Option<ParamBcKind>>,
}

impl FlowBcs {
    /// Allocates a new instance
    ///
    /// Faces may receive one condition only and must be on the boundary.
    pub fn new(mesh: &dyn MeshQuery, params: &[ParamBc]) -> Result<Self, StrError> {
        let nface = mesh.num_entities(EntityKind::Face, ParallelType::Used);
        let mut conditions = vec![None; nface];
        for param in params {
            for region in &param.regions {
                for f in mesh.region_entities(region, EntityKind::Face)? {
                    if f >= nface {
                        return Err("region refers to a face that does not exist");
                    }
                    if !mesh.is_boundary_face(f) {
                        log::error!("face {} of region \"{}\" is not on the boundary", f, region);
                        return Err("boundary conditions must be assigned to boundary faces");
                    }
                    if conditions[f].is_some() {
                        log::error!("face {} of region \"{}\" has more than one condition", f, region);
                        return Err("a face has more than one boundary condition");
                    }
                    conditions[f] = Some(param.kind);
                }
            }
        }
        Ok(FlowBcs { conditions })
    }

    /// Returns the number of faces with boundary conditions
    pub fn num_assigned(&self) -> usize {
        self.conditions.iter().filter(|c| c.is_some()).count()
    }

    /// Returns the condition of a face
    pub fn condition(&self, f: usize) -> Option<ParamBcKind> {
        self.conditions.get(f).copied().flatten()
    }

    /// Computes the operator boundary data
    ///
    /// # Input
    ///
    /// * `face_pressure` -- pressure at the (used) faces; selects the seepage mode
    /// * `atm_pressure` -- atmospheric pressure
    /// * `density_gravity` -- `ρ |g|`
    pub fn compute(
        &self,
        mesh: &dyn MeshQuery,
        face_pressure: &[f64],
        atm_pressure: f64,
        density_gravity: f64,
        bc: &mut BcData,
    ) -> Result<(), StrError> {
        if bc.entity != EntityKind::Face || bc.len() != self.conditions.len() {
            return Err("boundary data is incompatible with the flow boundary conditions");
        }
        if face_pressure.len() < self.conditions.len() {
            return Err("face pressure vector is too short for the boundary conditions");
        }
        bc.reset();
        for (f, condition) in self.conditions.iter().enumerate() {
            let kind = match condition {
                Some(kind) => *kind,
                None => continue,
            };
            match kind {
                ParamBcKind::Pressure(p) => bc.set(f, BcModel::Dirichlet, p),
                ParamBcKind::StaticHead(h) => {
                    let x = mesh.face_centroid(f);
                    let z = x[x.len() - 1];
                    bc.set(f, BcModel::Dirichlet, atm_pressure + density_gravity * (h - z));
                }
                ParamBcKind::MassFlux(q) => bc.set(f, BcModel::Neumann, q * mesh.face_area(f)),
                ParamBcKind::Seepage(q) => {
                    if face_pressure[f] >= atm_pressure {
                        bc.set(f, BcModel::Dirichlet, atm_pressure);
                    } else {
                        bc.set(f, BcModel::Neumann, q * mesh.face_area(f));
                    }
                }
            }
        }
        Ok(())
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::FlowBcs;
    use crate::base::{BcModel, EntityKind, ParamBc, ParamBcKind};
    use crate::mesh::MeshBox;
    use crate::operators::BcData;
    use russell_lab::approx_eq;

    fn bc(regions: &[&str], kind: ParamBcKind) -> ParamBc {
        ParamBc {
            regions: regions.iter().map(|r| r.to_string()).collect(),
            kind,
        }
    }

    #[test]
    fn new_captures_errors() {
        let mut mesh = MeshBox::new(&[0.0, 0.0], &[2.0, 1.0], &[2, 1]).unwrap();
        mesh.add_face_region("middle", &[1.0, 0.0], &[1.0, 1.0]).unwrap();
        assert_eq!(
            FlowBcs::new(&mesh, &[bc(&["middle"], ParamBcKind::Pressure(0.0))]).err(),
            Some("boundary conditions must be assigned to boundary faces")
        );
        assert_eq!(
            FlowBcs::new(
                &mesh,
                &[
                    bc(&["xmin"], ParamBcKind::Pressure(0.0)),
                    bc(&["boundary"], ParamBcKind::MassFlux(0.0)),
                ]
            )
            .err(),
            Some("a face has more than one boundary condition")
        );
        assert_eq!(
            FlowBcs::new(&mesh, &[bc(&["top"], ParamBcKind::Pressure(0.0))]).err(),
            Some("cannot find region")
        );
    }

    #[test]
    fn compute_works() {
        // 1×2 column: faces 0, 1 (cell 0 sides), 2, 3 (cell 1 sides), 4 (bottom), 5 (middle), 6 (top)
        let mesh = MeshBox::new(&[0.0, 0.0], &[1.0, 2.0], &[1, 2]).unwrap();
        let bcs = FlowBcs::new(
            &mesh,
            &[
                bc(&["ymin"], ParamBcKind::StaticHead(3.0)),
                bc(&["ymax"], ParamBcKind::MassFlux(-2.0)),
                bc(&["xmin"], ParamBcKind::Seepage(0.5)),
            ],
        )
        .unwrap();
        assert_eq!(bcs.num_assigned(), 4);
        assert_eq!(bcs.condition(5), None);

        let p_atm = 100.0;
        let rho_g = 10.0;
        let mut face_pressure = vec![0.0; 7];
        face_pressure[0] = 150.0; // saturated: acts as Dirichlet
        face_pressure[2] = 50.0; // unsaturated: acts as Neumann
        let mut data = BcData::new_scalar(EntityKind::Face, 7);
        bcs.compute(&mesh, &face_pressure, p_atm, rho_g, &mut data).unwrap();

        assert_eq!(data.model(4), BcModel::Dirichlet);
        approx_eq(data.value(4), 100.0 + 10.0 * 3.0, 1e-14);
        assert_eq!(data.model(6), BcModel::Neumann);
        approx_eq(data.value(6), -2.0, 1e-14);
        assert_eq!(data.model(0), BcModel::Dirichlet);
        approx_eq(data.value(0), 100.0, 1e-14);
        assert_eq!(data.model(2), BcModel::Neumann);
        approx_eq(data.value(2), 0.5, 1e-14);
        assert_eq!(data.model(5), BcModel::None);

        let mut wrong = BcData::new_scalar(EntityKind::Face, 3);
        assert_eq!(
            bcs.compute(&mesh, &face_pressure, p_atm, rho_g, &mut wrong).err(),
            Some("boundary data is incompatible with the flow boundary conditions")
        );
    }
}
