use super::BcData;
use crate::base::{BcModel, EntityKind, ParallelType, RelPermMethod};
use crate::linalg::Communicator;
use crate::mesh::MeshQuery;
use crate::StrError;

/// Selects where the face value of the nonlinear coefficient comes from
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum UpwindChoice {
    /// Value of a cell
    Cell(usize),

    /// Weighted average `w1 · k(c1) + (1 - w1) · k(c2)`
    Average { c1: usize, c2: usize, w1: f64 },

    /// Model of the cell evaluated at the prescribed boundary pressure
    BoundaryValue { cell: usize, pressure: f64 },
}

/// Returns the upwind choice of one face given the (signed) driving quantity
///
/// The driving quantity is positive when the flow leaves `c1` through the face.
///
/// # Input
///
/// * `drive` -- flux or projected gravity, oriented outward with respect to `c1`
/// * `threshold` -- values with `|drive| ≤ threshold` are considered zero
/// * `c1`, `v1` -- first cell and its volume
/// * `neighbor` -- second cell and its volume (None on the boundary)
/// * `dirichlet` -- prescribed boundary pressure, if any
pub fn upwind_choice(
    drive: f64,
    threshold: f64,
    c1: usize,
    v1: f64,
    neighbor: Option<(usize, f64)>,
    dirichlet: Option<f64>,
) -> UpwindChoice {
    if drive > threshold {
        return UpwindChoice::Cell(c1);
    }
    match neighbor {
        Some((c2, v2)) => {
            if drive < -threshold {
                UpwindChoice::Cell(c2)
            } else {
                UpwindChoice::Average { c1, c2, w1: v2 / (v1 + v2) }
            }
        }
        None => match dirichlet {
            Some(pressure) if drive < -threshold => UpwindChoice::BoundaryValue { cell: c1, pressure },
            _ => UpwindChoice::Cell(c1),
        },
    }
}

/// Evaluates the face values and derivatives given the upwind choices
///
/// `boundary(cell, pressure)` returns the value and derivative at a prescribed pressure.
pub fn upwind_values<F>(
    choices: &[UpwindChoice],
    cell_values: &[f64],
    cell_derivatives: &[f64],
    mut boundary: F,
) -> Result<(Vec<f64>, Vec<f64>), StrError>
where
    F: FnMut(usize, f64) -> Result<(f64, f64), StrError>,
{
    let mut values = vec![0.0; choices.len()];
    let mut derivatives = vec![0.0; choices.len()];
    for (f, choice) in choices.iter().enumerate() {
        let (k, dk) = match *choice {
            UpwindChoice::Cell(c) => (cell_values[c], cell_derivatives[c]),
            UpwindChoice::Average { c1, c2, w1 } => (
                w1 * cell_values[c1] + (1.0 - w1) * cell_values[c2],
                w1 * cell_derivatives[c1] + (1.0 - w1) * cell_derivatives[c2],
            ),
            UpwindChoice::BoundaryValue { cell, pressure } => boundary(cell, pressure)?,
        };
        values[f] = k;
        derivatives[f] = dk;
    }
    Ok((values, derivatives))
}

/// Computes the upwind choices on faces using the flux or the direction of gravity
pub struct Upwind<'a> {
    mesh: &'a dyn MeshQuery,
    method: RelPermMethod,
    tolerance: f64,
    gravity_direction: Vec<f64>,
}

impl<'a> Upwind<'a> {
    /// Allocates a new instance
    ///
    /// Gravity points toward the negative direction of the last axis.
    pub fn new(mesh: &'a dyn MeshQuery, method: RelPermMethod, tolerance: f64) -> Result<Self, StrError> {
        if tolerance < 0.0 {
            return Err("upwind tolerance must be ≥ 0.0");
        }
        let ndim = mesh.space_dimension();
        let mut gravity_direction = vec![0.0; ndim];
        gravity_direction[ndim - 1] = -1.0;
        Ok(Upwind {
            mesh,
            method,
            tolerance,
            gravity_direction,
        })
    }

    /// Returns the method
    pub fn method(&self) -> RelPermMethod {
        self.method
    }

    /// Computes the upwind choice of each (used) face
    ///
    /// # Input
    ///
    /// * `flux` -- face fluxes (including ghosts) oriented as the face normals;
    ///   required by [RelPermMethod::UpwindFlux] only
    /// * `bc` -- face boundary data; Dirichlet faces with inflow use the prescribed value
    /// * `comm` -- communicator used to find the largest flux magnitude
    pub fn choices(
        &self,
        flux: Option<&[f64]>,
        bc: &BcData,
        comm: &dyn Communicator,
    ) -> Result<Vec<UpwindChoice>, StrError> {
        let nface = self.mesh.num_entities(EntityKind::Face, ParallelType::Used);
        let nface_owned = self.mesh.num_entities(EntityKind::Face, ParallelType::Owned);
        let flux_scale = match (self.method, flux) {
            (RelPermMethod::UpwindFlux, Some(flux)) => {
                if flux.len() < nface {
                    return Err("flux vector is too short for the upwind selection");
                }
                let local = flux[..nface_owned].iter().fold(0.0, |acc, q| f64::max(acc, f64::abs(*q)));
                comm.global_max(local)
            }
            (RelPermMethod::UpwindFlux, None) => return Err("flux is required by the flux-based upwinding"),
            _ => 0.0,
        };
        let mut choices = Vec::with_capacity(nface);
        for f in 0..nface {
            let cells = self.mesh.face_cells(f);
            let c1 = cells[0];
            let v1 = self.mesh.cell_volume(c1);
            let neighbor = cells.get(1).map(|c2| (*c2, self.mesh.cell_volume(*c2)));
            let dirichlet = match bc.model(f) {
                BcModel::Dirichlet => Some(bc.value(f)),
                _ => None,
            };
            let choice = match (self.method, flux) {
                (RelPermMethod::UpwindFlux, Some(flux)) => {
                    upwind_choice(flux[f], self.tolerance * flux_scale, c1, v1, neighbor, dirichlet)
                }
                _ => {
                    let normal = self.mesh.face_normal(f);
                    let drive = normal.iter().zip(&self.gravity_direction).fold(0.0, |acc, (n, g)| acc + n * g);
                    let threshold = self.tolerance * self.mesh.face_area(f);
                    upwind_choice(drive, threshold, c1, v1, neighbor, dirichlet)
                }
            };
            choices.push(choice);
        }
        Ok(choices)
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::{upwind_choice, upwind_values, Upwind, UpwindChoice};
    use crate::base::{BcModel, EntityKind, RelPermMethod};
    use crate::linalg::SerialComm;
    use crate::mesh::{MeshBox, MeshQuery};
    use crate::operators::BcData;

    #[test]
    fn upwind_choice_works() {
        assert_eq!(upwind_choice(1.0, 1e-12, 0, 1.0, Some((1, 3.0)), None), UpwindChoice::Cell(0));
        assert_eq!(upwind_choice(-1.0, 1e-12, 0, 1.0, Some((1, 3.0)), None), UpwindChoice::Cell(1));
        assert_eq!(
            upwind_choice(1e-14, 1e-12, 0, 1.0, Some((1, 3.0)), None),
            UpwindChoice::Average { c1: 0, c2: 1, w1: 0.75 }
        );
        assert_eq!(upwind_choice(-1.0, 1e-12, 4, 1.0, None, None), UpwindChoice::Cell(4));
        assert_eq!(
            upwind_choice(-1.0, 1e-12, 4, 1.0, None, Some(5.0)),
            UpwindChoice::BoundaryValue { cell: 4, pressure: 5.0 }
        );
        assert_eq!(upwind_choice(1.0, 1e-12, 4, 1.0, None, Some(5.0)), UpwindChoice::Cell(4));
    }

    #[test]
    fn near_zero_flux_averages_with_volumes() {
        // v1 = 1, v2 = 3, k1 = 2, k2 = 6 → 2·(3/4) + 6·(1/4) = 3
        let choice = upwind_choice(0.0, 1e-12, 0, 1.0, Some((1, 3.0)), None);
        let (values, derivatives) = upwind_values(&[choice], &[2.0, 6.0], &[1.0, 1.0], |_, _| Ok((0.0, 0.0))).unwrap();
        assert_eq!(values, &[3.0]);
        assert_eq!(derivatives, &[1.0]);
    }

    #[test]
    fn gravity_upwinding_works() {
        // column of two cells: cell 0 at the bottom, cell 1 on top
        let mesh = MeshBox::new(&[0.0, 0.0], &[1.0, 2.0], &[1, 2]).unwrap();
        let comm = SerialComm::new();
        let mut bc = BcData::new_scalar(EntityKind::Face, 7);
        let bottom = mesh.cell_faces(0)[2];
        let top = mesh.cell_faces(1)[3];
        let middle = mesh.cell_faces(0)[3];
        bc.set(top, BcModel::Dirichlet, 7.0);
        let upwind = Upwind::new(&mesh, RelPermMethod::UpwindGravity, 1e-12).unwrap();
        assert_eq!(upwind.method(), RelPermMethod::UpwindGravity);
        let choices = upwind.choices(None, &bc, &comm).unwrap();
        // water flows downward: the middle face takes the upper cell
        assert_eq!(choices[middle], UpwindChoice::Cell(1));
        assert_eq!(choices[bottom], UpwindChoice::Cell(0));
        assert_eq!(choices[top], UpwindChoice::BoundaryValue { cell: 1, pressure: 7.0 });
        // vertical faces have no gravity component
        let left = mesh.cell_faces(0)[0];
        assert_eq!(choices[left], UpwindChoice::Cell(0));

        let (values, _) = upwind_values(&choices, &[0.5, 0.25], &[0.0, 0.0], |_, p| Ok((p / 10.0, 0.0))).unwrap();
        assert_eq!(values[middle], 0.25);
        assert_eq!(values[top], 0.7);
    }

    #[test]
    fn flux_upwinding_is_idempotent() {
        let mesh = MeshBox::new(&[0.0, 0.0], &[2.0, 1.0], &[2, 1]).unwrap();
        let comm = SerialComm::new();
        let bc = BcData::new_scalar(EntityKind::Face, 7);
        let upwind = Upwind::new(&mesh, RelPermMethod::UpwindFlux, 1e-12).unwrap();
        assert_eq!(upwind.choices(None, &bc, &comm).err(), Some("flux is required by the flux-based upwinding"));
        let flux = [1.0, -2.0, 0.0, 0.0, 0.0, 0.0, 0.0];
        let first = upwind.choices(Some(&flux), &bc, &comm).unwrap();
        let second = upwind.choices(Some(&flux), &bc, &comm).unwrap();
        assert_eq!(first, second);
        // negative flux on the shared face: the right cell is upwind
        assert_eq!(first[1], UpwindChoice::Cell(1));
        assert_eq!(first[3], UpwindChoice::Cell(0));
        let k = [0.3, 0.9];
        let dk = [0.1, 0.2];
        let a = upwind_values(&first, &k, &dk, |_, _| Ok((0.0, 0.0))).unwrap();
        let b = upwind_values(&second, &k, &dk, |_, _| Ok((0.0, 0.0))).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.0[1], 0.9);
    }
}
