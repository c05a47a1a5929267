use super::{allocate_water_retention, WaterRetention};
use crate::base::{EntityKind, ParallelType, ParamWrm};
use crate::mesh::MeshQuery;
use crate::StrError;

/// Holds the water retention models assigned to cell regions
///
/// The regions must partition the owned cells: every owned cell belongs to exactly one region.
/// Ghost cells are mapped through the same regions when the mesh reports them.
pub struct WrmPartition {
    /// Names of the regions
    regions: Vec<String>,

    /// Models (one per region)
    models: Vec<Box<dyn WaterRetention>>,

    /// Owned cells of each region
    cells: Vec<Vec<usize>>,

    /// Maps each (used) cell to the index of its model
    cell_to_model: Vec<Option<usize>>,
}

impl WrmPartition {
    /// Allocates a new instance and validates the partition
    pub fn new(mesh: &dyn MeshQuery, params: &[ParamWrm]) -> Result<Self, StrError> {
        if params.is_empty() {
            return Err("at least one water retention model is required");
        }
        let ncell_owned = mesh.num_entities(EntityKind::Cell, ParallelType::Owned);
        let ncell_used = mesh.num_entities(EntityKind::Cell, ParallelType::Used);
        let mut regions = Vec::with_capacity(params.len());
        let mut models = Vec::with_capacity(params.len());
        let mut cells = Vec::with_capacity(params.len());
        let mut cell_to_model: Vec<Option<usize>> = vec![None; ncell_used];
        for (i, param) in params.iter().enumerate() {
            let ids = mesh.region_entities(&param.region, EntityKind::Cell)?;
            let mut owned = Vec::new();
            for c in ids {
                if c >= ncell_used {
                    return Err("region refers to a cell that does not exist");
                }
                if let Some(j) = cell_to_model[c] {
                    log::error!(
                        "cell {} belongs to regions \"{}\" and \"{}\"",
                        c,
                        params[j].region,
                        param.region
                    );
                    return Err("water retention regions overlap");
                }
                cell_to_model[c] = Some(i);
                if c < ncell_owned {
                    owned.push(c);
                }
            }
            regions.push(param.region.clone());
            models.push(allocate_water_retention(&param.model)?);
            cells.push(owned);
        }
        if let Some(c) = (0..ncell_owned).find(|c| cell_to_model[*c].is_none()) {
            log::error!("cell {} is not covered by any water retention region", c);
            return Err("water retention regions do not cover all owned cells");
        }
        Ok(WrmPartition {
            regions,
            models,
            cells,
            cell_to_model,
        })
    }

    /// Returns the number of models
    pub fn len(&self) -> usize {
        self.models.len()
    }

    /// Returns the name of the region of model `i`
    pub fn region(&self, i: usize) -> &str {
        &self.regions[i]
    }

    /// Returns the owned cells of the region of model `i`
    pub fn cells(&self, i: usize) -> &[usize] {
        &self.cells[i]
    }

    /// Returns the model `i`
    pub fn model_at(&self, i: usize) -> &dyn WaterRetention {
        self.models[i].as_ref()
    }

    /// Returns the model assigned to a cell
    pub fn model(&self, c: usize) -> Result<&dyn WaterRetention, StrError> {
        match self.cell_to_model.get(c) {
            Some(Some(i)) => Ok(self.models[*i].as_ref()),
            _ => Err("cell has no water retention model"),
        }
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::WrmPartition;
    use crate::base::{ParamWrm, ParamWrmModel};
    use crate::mesh::MeshBox;

    fn vg(region: &str) -> ParamWrm {
        ParamWrm {
            region: region.to_string(),
            model: ParamWrmModel::VanGenuchten {
                alpha: 1e-4,
                m: 0.5,
                sr: 0.1,
            },
        }
    }

    fn bc(region: &str) -> ParamWrm {
        ParamWrm {
            region: region.to_string(),
            model: ParamWrmModel::BrooksCorey {
                lambda: 2.0,
                pc_ae: 1000.0,
                sr: 0.05,
            },
        }
    }

    #[test]
    fn new_captures_errors() {
        let mut mesh = MeshBox::new(&[0.0, 0.0], &[2.0, 1.0], &[2, 1]).unwrap();
        mesh.add_cell_region("left", &[0.0, 0.0], &[1.0, 1.0]).unwrap();
        assert_eq!(
            WrmPartition::new(&mesh, &[]).err(),
            Some("at least one water retention model is required")
        );
        assert_eq!(
            WrmPartition::new(&mesh, &[vg("All"), bc("left")]).err(),
            Some("water retention regions overlap")
        );
        assert_eq!(
            WrmPartition::new(&mesh, &[vg("left")]).err(),
            Some("water retention regions do not cover all owned cells")
        );
        assert_eq!(WrmPartition::new(&mesh, &[vg("top")]).err(), Some("cannot find region"));
    }

    #[test]
    fn new_works() {
        let mut mesh = MeshBox::new(&[0.0, 0.0], &[2.0, 1.0], &[2, 1]).unwrap();
        mesh.add_cell_region("left", &[0.0, 0.0], &[1.0, 1.0])
            .unwrap()
            .add_cell_region("right", &[1.0, 0.0], &[2.0, 1.0])
            .unwrap();
        let wrm = WrmPartition::new(&mesh, &[vg("left"), bc("right")]).unwrap();
        assert_eq!(wrm.len(), 2);
        assert_eq!(wrm.region(1), "right");
        assert_eq!(wrm.cells(0), &[0]);
        assert_eq!(wrm.cells(1), &[1]);
        assert_eq!(wrm.model(0).unwrap().residual_saturation(), 0.1);
        assert_eq!(wrm.model(1).unwrap().residual_saturation(), 0.05);
        assert_eq!(wrm.model_at(1).saturation(500.0), 1.0);
        assert_eq!(wrm.model(2).err(), Some("cell has no water retention model"));
    }
}
