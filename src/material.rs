//! Density interpolation laws and the plane stress constitutive relation.
use crate::nalgebra::Matrix3;
use serde::{Deserialize, Serialize};

/// The RAMP stiffness interpolation
/// $$
/// p(\rho) = \frac{\rho}{1 + q (1 - \rho)}.
/// $$
///
/// Densities are not clamped; values outside $[0, 1]$ give whatever the formula yields.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RampPenalty {
    pub q: f64,
}

impl RampPenalty {
    pub fn new(q: f64) -> Self {
        Self { q }
    }

    /// $t = 1 / (1 + q (1 - \rho))$, in terms of which all closed forms are written.
    fn t(&self, rho: f64) -> f64 {
        1.0 / (1.0 + self.q * (1.0 - rho))
    }

    pub fn value(&self, rho: f64) -> f64 {
        rho * self.t(rho)
    }

    /// $p'(\rho) = (1 + q) t^2$.
    pub fn derivative(&self, rho: f64) -> f64 {
        let t = self.t(rho);
        (1.0 + self.q) * t * t
    }

    /// $p''(\rho) = 2 q (1 + q) t^3$.
    pub fn second_derivative(&self, rho: f64) -> f64 {
        let t = self.t(rho);
        2.0 * self.q * (1.0 + self.q) * t * t * t
    }
}

/// Stress relaxation factor
/// $$
/// f(\rho) = \frac{\rho}{\epsilon (1 - \rho) + \rho},
/// $$
/// used only for stress functionals. It suppresses stresses in void regions while staying
/// finite at $\rho = 0$ for any $\epsilon > 0$.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StressRelaxation {
    pub epsilon: f64,
}

impl StressRelaxation {
    pub fn new(epsilon: f64) -> Self {
        Self { epsilon }
    }

    pub fn factor(&self, rho: f64) -> f64 {
        rho / (self.epsilon * (1.0 - rho) + rho)
    }

    /// $f'(\rho) = \epsilon / (\epsilon (1 - \rho) + \rho)^2$.
    pub fn derivative(&self, rho: f64) -> f64 {
        let denom = self.epsilon * (1.0 - rho) + rho;
        self.epsilon / (denom * denom)
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct YoungPoisson {
    pub young: f64,
    pub poisson: f64,
}

/// The $3 \times 3$ matrix $C$ relating strain $(\varepsilon_{xx}, \varepsilon_{yy}, \gamma_{xy})$
/// to stress $(\sigma_{xx}, \sigma_{yy}, \tau_{xy})$.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PlaneStressConstitutive {
    matrix: Matrix3<f64>,
}

impl PlaneStressConstitutive {
    /// Uses an arbitrary (typically symmetric) constitutive matrix.
    pub fn from_matrix(matrix: Matrix3<f64>) -> Self {
        Self { matrix }
    }

    pub fn matrix(&self) -> &Matrix3<f64> {
        &self.matrix
    }
}

impl From<YoungPoisson> for PlaneStressConstitutive {
    /// Isotropic plane stress,
    /// $$
    /// C = \frac{E}{1 - \nu^2}
    /// \begin{pmatrix} 1 & \nu & 0 \\\\ \nu & 1 & 0 \\\\ 0 & 0 & (1 - \nu)/2 \end{pmatrix}.
    /// $$
    #[rustfmt::skip]
    fn from(params: YoungPoisson) -> Self {
        let YoungPoisson { young, poisson } = params;
        let s = young / (1.0 - poisson * poisson);
        Self::from_matrix(Matrix3::new(
            s,           s * poisson, 0.0,
            s * poisson, s,           0.0,
            0.0,         0.0,         s * 0.5 * (1.0 - poisson),
        ))
    }
}
