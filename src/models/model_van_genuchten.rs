use super::{effective_saturation, WaterRetention};
use crate::StrError;

/// Implements the van Genuchten model for water retention with Mualem's relative permeability
///
/// ```text
/// Se = (1 + (α pc)ⁿ)⁻ᵐ      n = 1/(1-m)
/// S  = sr + (1 - sr) Se
/// kr = √Se (1 - (1 - Se^(1/m))ᵐ)²
/// ```
///
/// # Reference
///
/// * van Genuchten MT (1980) A closed-form equation for predicting the hydraulic conductivity
///   of unsaturated soils. Soil Science Society of America Journal, 44(5), 892-898
pub struct ModelVanGenuchten {
    // parameters
    alpha: f64, // α parameter
    m: f64,     // m parameter
    sr: f64,    // residual saturation

    // constant
    n: f64, // n = 1/(1-m)
}

impl ModelVanGenuchten {
    /// Allocates a new instance
    pub fn new(alpha: f64, m: f64, sr: f64) -> Result<Self, StrError> {
        if alpha <= 0.0 {
            return Err("alpha parameter for the van Genuchten retention model is invalid");
        }
        if m <= 0.0 || m >= 1.0 {
            return Err("m parameter for the van Genuchten retention model is invalid");
        }
        if sr < 0.0 || sr >= 1.0 {
            return Err("sr parameter for the van Genuchten retention model is invalid");
        }
        Ok(ModelVanGenuchten {
            alpha,
            m,
            sr,
            n: 1.0 / (1.0 - m),
        })
    }

    /// Returns (y, Se) with y = (α pc)ⁿ
    fn y_and_se(&self, pc: f64) -> (f64, f64) {
        let y = f64::powf(self.alpha * pc, self.n);
        (y, f64::powf(1.0 + y, -self.m))
    }
}

impl WaterRetention for ModelVanGenuchten {
    fn saturation(&self, pc: f64) -> f64 {
        if pc <= 0.0 {
            return 1.0;
        }
        let (_, se) = self.y_and_se(pc);
        self.sr + (1.0 - self.sr) * se
    }

    fn dsaturation_dpc(&self, pc: f64) -> f64 {
        if pc <= 0.0 {
            return 0.0;
        }
        let (y, _) = self.y_and_se(pc);
        let dse = -self.m * self.n * y * f64::powf(1.0 + y, -self.m - 1.0) / pc;
        (1.0 - self.sr) * dse
    }

    fn k_relative(&self, pc: f64) -> f64 {
        if pc <= 0.0 {
            return 1.0;
        }
        let (y, se) = self.y_and_se(pc);
        let a = y / (1.0 + y); // 1 - Se^(1/m)
        let b = 1.0 - f64::powf(a, self.m);
        f64::sqrt(se) * b * b
    }

    fn dk_relative_dpc(&self, pc: f64) -> f64 {
        if pc <= 0.0 {
            return 0.0;
        }
        let (y, se) = self.y_and_se(pc);
        let a = y / (1.0 + y);
        let b = 1.0 - f64::powf(a, self.m);
        let dy = self.n * y / pc;
        let dse = -self.m * dy * f64::powf(1.0 + y, -self.m - 1.0);
        let da = dy / ((1.0 + y) * (1.0 + y));
        let db = -self.m * f64::powf(a, self.m - 1.0) * da;
        0.5 * dse * b * b / f64::sqrt(se) + f64::sqrt(se) * 2.0 * b * db
    }

    fn capillary_pressure(&self, saturation: f64) -> Result<f64, StrError> {
        let se = effective_saturation(saturation, self.sr)?;
        if se >= 1.0 {
            return Ok(0.0);
        }
        Ok(f64::powf(f64::powf(se, -1.0 / self.m) - 1.0, 1.0 / self.n) / self.alpha)
    }

    fn residual_saturation(&self) -> f64 {
        self.sr
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::ModelVanGenuchten;
    use crate::models::WaterRetention;
    use russell_lab::{approx_eq, deriv_central5};

    #[test]
    fn new_captures_errors() {
        assert_eq!(
            ModelVanGenuchten::new(0.0, 0.5, 0.1).err(),
            Some("alpha parameter for the van Genuchten retention model is invalid")
        );
        assert_eq!(
            ModelVanGenuchten::new(1e-4, 1.0, 0.1).err(),
            Some("m parameter for the van Genuchten retention model is invalid")
        );
        assert_eq!(
            ModelVanGenuchten::new(1e-4, 0.5, 1.0).err(),
            Some("sr parameter for the van Genuchten retention model is invalid")
        );
    }

    #[test]
    fn saturated_state_works() {
        let model = ModelVanGenuchten::new(1e-4, 0.5, 0.1).unwrap();
        assert_eq!(model.saturation(0.0), 1.0);
        assert_eq!(model.k_relative(-100.0), 1.0);
        assert_eq!(model.dsaturation_dpc(-100.0), 0.0);
        assert_eq!(model.dk_relative_dpc(0.0), 0.0);
        assert_eq!(model.capillary_pressure(1.0), Ok(0.0));
        assert_eq!(
            model.capillary_pressure(0.1).err(),
            Some("saturation must be greater than the residual saturation")
        );
    }

    #[test]
    fn values_work() {
        // m = 0.5 → n = 2; at α pc = 1: Se = 2^(-1/2), a = 1/2
        let model = ModelVanGenuchten::new(1e-4, 0.5, 0.2).unwrap();
        let pc = 1e4;
        let se = 1.0 / f64::sqrt(2.0);
        approx_eq(model.saturation(pc), 0.2 + 0.8 * se, 1e-15);
        let b = 1.0 - f64::sqrt(0.5);
        approx_eq(model.k_relative(pc), f64::sqrt(se) * b * b, 1e-15);
        approx_eq(model.capillary_pressure(model.saturation(pc)).unwrap(), pc, 1e-6);
    }

    #[test]
    fn derivatives_work() {
        let model = ModelVanGenuchten::new(2e-4, 0.6, 0.1).unwrap();
        let mut args = 0;
        for pc in [500.0, 3000.0, 12000.0] {
            let num = deriv_central5(pc, &mut args, |x, _| model.saturation(x));
            approx_eq(model.dsaturation_dpc(pc), num, 1e-10);
            let num = deriv_central5(pc, &mut args, |x, _| model.k_relative(x));
            approx_eq(model.dk_relative_dpc(pc), num, 1e-10);
        }
    }
}
