use super::{effective_saturation, WaterRetention};
use crate::StrError;

/// Implements the Brooks-Corey model for water retention with Burdine's relative permeability
///
/// ```text
/// Se = (pc_ae / pc)^λ    if pc > pc_ae, otherwise 1
/// S  = sr + (1 - sr) Se
/// kr = Se^((2 + 3λ)/λ)
/// ```
///
/// # Reference
///
/// * Brooks RH and Corey AT (1964) Hydraulic properties of porous media.
///   Hydrology Papers, Colorado State University, 3
pub struct ModelBrooksCorey {
    lambda: f64, // slope coefficient
    pc_ae: f64,  // air-entry pressure
    sr: f64,     // residual saturation
}

impl ModelBrooksCorey {
    /// Allocates a new instance
    pub fn new(lambda: f64, pc_ae: f64, sr: f64) -> Result<Self, StrError> {
        if sr < 0.0 || sr >= 1.0 {
            return Err("sr parameter for the Brooks-Corey retention model is invalid");
        }
        if lambda <= 0.0 {
            return Err("lambda parameter for the Brooks-Corey retention model is invalid");
        }
        if pc_ae <= 0.0 {
            return Err("pc_ae parameter for the Brooks-Corey retention model is invalid");
        }
        Ok(ModelBrooksCorey { lambda, pc_ae, sr })
    }
}

impl WaterRetention for ModelBrooksCorey {
    fn saturation(&self, pc: f64) -> f64 {
        if pc <= self.pc_ae {
            return 1.0;
        }
        self.sr + (1.0 - self.sr) * f64::powf(self.pc_ae / pc, self.lambda)
    }

    fn dsaturation_dpc(&self, pc: f64) -> f64 {
        if pc <= self.pc_ae {
            return 0.0;
        }
        -(1.0 - self.sr) * self.lambda * f64::powf(self.pc_ae / pc, self.lambda) / pc
    }

    fn k_relative(&self, pc: f64) -> f64 {
        if pc <= self.pc_ae {
            return 1.0;
        }
        f64::powf(self.pc_ae / pc, 2.0 + 3.0 * self.lambda)
    }

    fn dk_relative_dpc(&self, pc: f64) -> f64 {
        if pc <= self.pc_ae {
            return 0.0;
        }
        -(2.0 + 3.0 * self.lambda) * self.k_relative(pc) / pc
    }

    fn capillary_pressure(&self, saturation: f64) -> Result<f64, StrError> {
        let se = effective_saturation(saturation, self.sr)?;
        if se >= 1.0 {
            return Ok(0.0);
        }
        Ok(self.pc_ae * f64::powf(se, -1.0 / self.lambda))
    }

    fn residual_saturation(&self) -> f64 {
        self.sr
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::ModelBrooksCorey;
    use crate::models::WaterRetention;
    use russell_lab::{approx_eq, deriv_central5};

    #[test]
    fn new_captures_errors() {
        assert_eq!(
            ModelBrooksCorey::new(2.0, 1000.0, -0.1).err(),
            Some("sr parameter for the Brooks-Corey retention model is invalid")
        );
        assert_eq!(
            ModelBrooksCorey::new(0.0, 1000.0, 0.1).err(),
            Some("lambda parameter for the Brooks-Corey retention model is invalid")
        );
        assert_eq!(
            ModelBrooksCorey::new(2.0, 0.0, 0.1).err(),
            Some("pc_ae parameter for the Brooks-Corey retention model is invalid")
        );
    }

    #[test]
    fn values_work() {
        let model = ModelBrooksCorey::new(1.0, 1000.0, 0.1).unwrap();
        assert_eq!(model.saturation(500.0), 1.0);
        assert_eq!(model.k_relative(1000.0), 1.0);
        approx_eq(model.saturation(2000.0), 0.1 + 0.9 * 0.5, 1e-15);
        approx_eq(model.k_relative(2000.0), 1.0 / 32.0, 1e-15);
        approx_eq(model.capillary_pressure(0.55).unwrap(), 2000.0, 1e-10);
        assert_eq!(model.capillary_pressure(1.0), Ok(0.0));
        assert_eq!(model.capillary_pressure(1.1).err(), Some("saturation must be ≤ 1.0"));
        assert_eq!(model.residual_saturation(), 0.1);
    }

    #[test]
    fn derivatives_work() {
        let model = ModelBrooksCorey::new(0.7, 800.0, 0.05).unwrap();
        let mut args = 0;
        for pc in [1500.0, 4000.0] {
            let num = deriv_central5(pc, &mut args, |x, _| model.saturation(x));
            approx_eq(model.dsaturation_dpc(pc), num, 1e-10);
            let num = deriv_central5(pc, &mut args, |x, _| model.k_relative(x));
            approx_eq(model.dk_relative_dpc(pc), num, 1e-10);
        }
    }
}
